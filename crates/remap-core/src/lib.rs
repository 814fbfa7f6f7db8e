//! Remap Core - declarative record-to-record mapping engine
//!
//! This crate converts instances of one record type into instances of
//! another according to a declarative field-correspondence configuration,
//! with no runtime reflection on the hot path. For each (Destination,
//! Source) pair it pre-builds a matrix of specialized routines, one per
//! combination of instance-reuse policy, null-guard policy and per-side
//! field-inclusion filter, and extends the same machinery to hub types
//! related to many targets.
//!
//! # Main Components
//!
//! - **Error Handling**: library error types using `thiserror`, with
//!   `anyhow` carrying user conversion failures
//! - **Mapping Facts**: the external contract describing record shapes,
//!   field correspondences and relation declarations
//! - **Specialization Engine**: planner + constructor producing an
//!   immutable [`CompiledMapper`] per type pair
//! - **Relational Mapping**: [`RelationalMapper`] indexing compiled
//!   mappers around one hub type, with strict and lenient dispatch
//!
//! # Example
//!
//! ```
//! use remap_core::{build, FieldCorrespondence, MappingFacts, Registries, TypeDescriptor};
//! use serde_json::json;
//!
//! fn example() -> remap_core::Result<()> {
//!     let mut facts = MappingFacts::new();
//!     facts.add_type(
//!         TypeDescriptor::new("User")
//!             .with_field("id", "i64")
//!             .with_default_instance(json!({"id": null})),
//!     );
//!     facts.add_type(TypeDescriptor::new("UserDto").with_field("userId", "i64"));
//!     facts.add_correspondences(
//!         "User",
//!         vec![FieldCorrespondence::new("id").from_source("UserDto", "userId")],
//!     );
//!
//!     let mapper = build("User", "UserDto", &facts, &Registries::new())?;
//!     assert_eq!(mapper.map(&json!({"userId": 7}))?, json!({"id": 7}));
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

pub mod engine;
pub mod error;
pub mod facts;
pub mod registry;
pub mod relational;

// Re-export main types for convenience
pub use error::{Error, Leniency, Result};

pub use facts::{FieldCorrespondence, GlobalRelation, MappingFacts, TypeDescriptor};

pub use registry::{ConversionRegistry, FactoryRegistry, Registries};

pub use engine::{
    build, build_variants, CompiledMapper, FieldFilter, InstancePolicy, MapRequest,
    MappingVariant, NullPolicy,
};

pub use relational::RelationalMapper;
