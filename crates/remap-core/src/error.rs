//! Error types for the Remap core library
//!
//! This module defines the error handling system for Remap, using thiserror
//! for ergonomic error definitions and anyhow as the opaque carrier for
//! failures raised inside user-registered conversion callables.
//!
//! Copyright (c) 2025 Remap Team
//! Licensed under the Apache-2.0 license

use crate::engine::MappingVariant;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for Remap operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid mapping facts, detected when a planner or resolver runs
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A conversion reference whose declared types do not match the
    /// field types it connects
    #[error(
        "Conversion signature error: '{conversion}' expects ({expected}), \
         connected fields are ({found})"
    )]
    ConversionSignature {
        conversion: String,
        expected: String,
        found: String,
    },

    /// A `New`-policy variant was specialized for a destination type with
    /// neither a registered factory nor a default instance
    #[error(
        "Missing constructor: destination '{destination}' has no factory and \
         no default instance (variant {variant})"
    )]
    MissingConstructor {
        destination: String,
        variant: MappingVariant,
    },

    /// Relational dispatch found no compiled mapper for the given type
    #[error("Unmapped relation: '{related}' is not related to hub '{hub}'")]
    UnmappedRelation { hub: String, related: String },

    /// The requested variant was never compiled into the mapper's table
    #[error("Uncompiled variant: {variant} was not requested at build time")]
    UncompiledVariant { variant: MappingVariant },

    /// A user-registered conversion callable failed; the cause propagates
    /// as-is from the call site that invoked it
    #[error("Conversion '{name}' failed")]
    Conversion {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A record had the wrong shape at call time
    #[error("Mapping error: {message}")]
    Mapping { message: String },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Leniency policy for the relational convenience entry points
///
/// `Lenient` reproduces the historical behavior of swallowing per-call
/// errors: they are logged through the `log` facade and the call yields an
/// absent result. `Strict` propagates every error to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leniency {
    /// Propagate per-call errors
    Strict,
    /// Log per-call errors and return an absent result
    Lenient,
}

impl fmt::Display for Leniency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leniency::Strict => write!(f, "Strict"),
            Leniency::Lenient => write!(f, "Lenient"),
        }
    }
}

impl Error {
    /// Shorthand used by the planner and resolver for fact-level failures
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn mapping(message: impl Into<String>) -> Self {
        Error::Mapping {
            message: message.into(),
        }
    }
}
