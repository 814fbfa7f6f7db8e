//! The specialization engine
//!
//! This module implements the core pipeline that turns field-level mapping
//! facts into specialized execution paths: plan the operations for a type
//! pair, recursively build mappers for every nested pair, then specialize
//! one routine per requested mapping variant.
//!
//! Copyright (c) 2025 Remap Team
//! Licensed under the Apache-2.0 license

pub(crate) mod compiled;
mod constructor;
pub(crate) mod operations;
mod planner;

pub use compiled::{CompiledMapper, MapRequest, MappingVariant};
pub use operations::{FieldFilter, InstancePolicy, NullPolicy};

use crate::facts::{FieldCorrespondence, MappingFacts};
use crate::registry::Registries;
use crate::{Error, Result};
use constructor::MapperConstructor;
use planner::OperationPlanner;
use std::collections::HashMap;
use std::sync::Arc;

/// Build the full 72-cell routine matrix for one (Destination, Source)
/// type pair
///
/// The correspondences are looked up under the destination type name. The
/// build fails immediately on bad facts: unknown fields, duplicate
/// destination fields, mismatched conversion signatures and nested
/// reference cycles are all detected here, never on the mapping path.
///
/// # Example
///
/// ```
/// use remap_core::{build, FieldCorrespondence, MappingFacts, Registries, TypeDescriptor};
/// use serde_json::json;
///
/// # fn example() -> remap_core::Result<()> {
/// let mut facts = MappingFacts::new();
/// facts.add_type(
///     TypeDescriptor::new("User")
///         .with_field("name", "String")
///         .with_default_instance(json!({"name": null})),
/// );
/// facts.add_type(TypeDescriptor::new("UserDto").with_field("name", "String"));
/// facts.add_correspondences("User", vec![FieldCorrespondence::new("name")]);
///
/// let mapper = build("User", "UserDto", &facts, &Registries::new())?;
/// assert_eq!(mapper.map(&json!({"name": "ada"}))?, json!({"name": "ada"}));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub fn build(
    destination: &str,
    source: &str,
    facts: &MappingFacts,
    registries: &Registries,
) -> Result<CompiledMapper> {
    let correspondences = facts.correspondences_for(destination)?;
    build_pair(
        destination,
        source,
        correspondences,
        facts,
        registries,
        &mut MappingVariant::all(),
    )
}

/// Like [`build`] but compiling only the requested variants; the table
/// stays sparse and a later lookup of an unrequested key reports
/// [`Error::UncompiledVariant`]
pub fn build_variants(
    destination: &str,
    source: &str,
    facts: &MappingFacts,
    registries: &Registries,
    variants: &[MappingVariant],
) -> Result<CompiledMapper> {
    let correspondences = facts.correspondences_for(destination)?;
    build_pair(
        destination,
        source,
        correspondences,
        facts,
        registries,
        &mut variants.iter().copied(),
    )
}

/// Build with an explicit correspondence list instead of the fact-table
/// lookup; the relational resolver uses this for inverted directions
pub(crate) fn build_pair(
    destination: &str,
    source: &str,
    correspondences: &[FieldCorrespondence],
    facts: &MappingFacts,
    registries: &Registries,
    variants: &mut dyn Iterator<Item = MappingVariant>,
) -> Result<CompiledMapper> {
    let mut visiting = Vec::new();
    build_recursive(
        destination,
        source,
        correspondences,
        facts,
        registries,
        variants,
        &mut visiting,
    )
}

fn build_recursive(
    destination: &str,
    source: &str,
    correspondences: &[FieldCorrespondence],
    facts: &MappingFacts,
    registries: &Registries,
    variants: &mut dyn Iterator<Item = MappingVariant>,
    visiting: &mut Vec<(String, String)>,
) -> Result<CompiledMapper> {
    let pair = (destination.to_string(), source.to_string());
    if visiting.contains(&pair) {
        return Err(Error::configuration(format!(
            "nested mapping cycle detected at pair {} <- {} (chain: {})",
            destination,
            source,
            visiting
                .iter()
                .map(|(d, s)| format!("{} <- {}", d, s))
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    visiting.push(pair);

    let result = (|| {
        let dest_descriptor = facts.descriptor(destination)?;
        let src_descriptor = facts.descriptor(source)?;

        let planner =
            OperationPlanner::new(dest_descriptor, src_descriptor, &registries.conversions);
        let plan = planner.plan(correspondences)?;

        // every nested pair gets its own full matrix, compiled up front
        let mut nested = HashMap::new();
        for op in &plan.complex {
            let key = (op.nested_destination.clone(), op.nested_source.clone());
            if nested.contains_key(&key) {
                continue;
            }
            let nested_correspondences = facts.correspondences_for(&op.nested_destination)?;
            let mapper = build_recursive(
                &op.nested_destination,
                &op.nested_source,
                nested_correspondences,
                facts,
                registries,
                &mut MappingVariant::all(),
                visiting,
            )?;
            nested.insert(key, Arc::new(mapper));
        }

        MapperConstructor::new(
            dest_descriptor,
            src_descriptor,
            &plan,
            &nested,
            &registries.factories,
        )
        .specialize(variants)
    })();

    visiting.pop();
    result
}
