//! Relational mapping around one hub type
//!
//! A hub is a configured type related to many target types. The resolver
//! walks the hub's ancestor chain to settle the related-type set, then
//! builds one compiled mapper per (direction, related type): the hub as
//! destination for `many_to_one`, the related type as destination for
//! `one_to_many`. Both indexes are populated entirely inside the
//! constructor and never change afterwards, so a `RelationalMapper` can be
//! shared freely across threads.
//!
//! Per-call failures on the convenience entry points are handled according
//! to the [`Leniency`] chosen at construction: `Lenient` logs them through
//! the `log` facade and yields a null result, `Strict` propagates. The
//! `try_*` entry points always propagate.
//!
//! Copyright (c) 2025 Remap Team
//! Licensed under the Apache-2.0 license

use crate::engine::{self, CompiledMapper, MapRequest, MappingVariant, NullPolicy};
use crate::facts::{FieldCorrespondence, GlobalRelation, MappingFacts};
use crate::registry::Registries;
use crate::{Error, Leniency, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Compiled mappers for every related type of one hub, in both directions
pub struct RelationalMapper {
    hub: String,
    leniency: Leniency,
    /// related type name -> mapper with the hub as destination
    many_to_one: HashMap<String, Arc<CompiledMapper>>,
    /// related type name -> mapper with the related type as destination
    one_to_many: HashMap<String, Arc<CompiledMapper>>,
}

impl RelationalMapper {
    /// Resolve the hub's related-type set and build both directional
    /// indexes. Fails on bad facts exactly like [`engine::build`], plus
    /// when the relation declarations resolve to an empty set.
    pub fn new(
        hub: &str,
        facts: &MappingFacts,
        registries: &Registries,
        leniency: Leniency,
    ) -> Result<Self> {
        let related = resolve_related_types(hub, facts)?;
        let hub_correspondences = facts.correspondences_for(hub)?;

        let mut many_to_one = HashMap::new();
        let mut one_to_many = HashMap::new();
        for related_type in &related {
            let forward = engine::build_pair(
                hub,
                related_type,
                hub_correspondences,
                facts,
                registries,
                &mut MappingVariant::all(),
            )?;
            many_to_one.insert(related_type.clone(), Arc::new(forward));

            let inverted = invert_correspondences(hub_correspondences, hub, related_type);
            let reverse = engine::build_pair(
                related_type,
                hub,
                &inverted,
                facts,
                registries,
                &mut MappingVariant::all(),
            )?;
            one_to_many.insert(related_type.clone(), Arc::new(reverse));
        }

        log::debug!(
            "relational index for hub '{}' covers {} related types ({})",
            hub,
            related.len(),
            leniency
        );
        Ok(Self {
            hub: hub.to_string(),
            leniency,
            many_to_one,
            one_to_many,
        })
    }

    pub fn hub(&self) -> &str {
        &self.hub
    }

    pub fn leniency(&self) -> Leniency {
        self.leniency
    }

    /// The resolved related-type names, sorted
    pub fn related_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.many_to_one.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    // --- strict entry points -------------------------------------------

    /// New hub instance from a related-type record; source null guard,
    /// all fields on both sides
    pub fn try_many_to_one(&self, source_type: &str, source: &Value) -> Result<Value> {
        self.forward(source_type)?.map(source)
    }

    /// Enrich a caller-supplied hub instance; guards on both sides
    pub fn try_many_to_one_into(
        &self,
        destination: Value,
        source_type: &str,
        source: &Value,
    ) -> Result<Value> {
        self.forward(source_type)?.map_into(destination, source)
    }

    /// New hub instance with no null guard at all
    pub fn try_many_to_one_without_control(
        &self,
        source_type: &str,
        source: &Value,
    ) -> Result<Value> {
        self.forward(source_type)?.map_strict(source)
    }

    /// Fully parameterized hub-from-target call
    pub fn try_many_to_one_with(
        &self,
        source_type: &str,
        request: MapRequest<'_>,
    ) -> Result<Value> {
        self.forward(source_type)?.map_with(request)
    }

    /// New target-type instance from the hub record; destination null
    /// guard, all fields on both sides
    pub fn try_one_to_many(&self, target_type: &str, source: &Value) -> Result<Value> {
        self.reverse(target_type)?
            .map_with(MapRequest::new(source).null_policy(NullPolicy::Destination))
    }

    /// Enrich a caller-supplied target instance; guards on both sides
    pub fn try_one_to_many_into(
        &self,
        destination: Value,
        target_type: &str,
        source: &Value,
    ) -> Result<Value> {
        self.reverse(target_type)?.map_into(destination, source)
    }

    /// New target-type instance with no null guard at all
    pub fn try_one_to_many_without_control(
        &self,
        target_type: &str,
        source: &Value,
    ) -> Result<Value> {
        self.reverse(target_type)?.map_strict(source)
    }

    /// Fully parameterized target-from-hub call
    pub fn try_one_to_many_with(
        &self,
        target_type: &str,
        request: MapRequest<'_>,
    ) -> Result<Value> {
        self.reverse(target_type)?.map_with(request)
    }

    // --- convenience entry points (leniency applies) -------------------

    pub fn many_to_one(&self, source_type: &str, source: &Value) -> Result<Value> {
        self.settle(self.try_many_to_one(source_type, source))
    }

    pub fn many_to_one_into(
        &self,
        destination: Value,
        source_type: &str,
        source: &Value,
    ) -> Result<Value> {
        self.settle(self.try_many_to_one_into(destination, source_type, source))
    }

    pub fn many_to_one_with(&self, source_type: &str, request: MapRequest<'_>) -> Result<Value> {
        self.settle(self.try_many_to_one_with(source_type, request))
    }

    pub fn one_to_many(&self, target_type: &str, source: &Value) -> Result<Value> {
        self.settle(self.try_one_to_many(target_type, source))
    }

    pub fn one_to_many_into(
        &self,
        destination: Value,
        target_type: &str,
        source: &Value,
    ) -> Result<Value> {
        self.settle(self.try_one_to_many_into(destination, target_type, source))
    }

    pub fn one_to_many_with(&self, target_type: &str, request: MapRequest<'_>) -> Result<Value> {
        self.settle(self.try_one_to_many_with(target_type, request))
    }

    // --- internals -----------------------------------------------------

    fn forward(&self, related: &str) -> Result<&Arc<CompiledMapper>> {
        self.lookup(&self.many_to_one, related)
    }

    fn reverse(&self, related: &str) -> Result<&Arc<CompiledMapper>> {
        self.lookup(&self.one_to_many, related)
    }

    fn lookup<'s>(
        &'s self,
        index: &'s HashMap<String, Arc<CompiledMapper>>,
        related: &str,
    ) -> Result<&'s Arc<CompiledMapper>> {
        index.get(related).ok_or_else(|| Error::UnmappedRelation {
            hub: self.hub.clone(),
            related: related.to_string(),
        })
    }

    fn settle(&self, result: Result<Value>) -> Result<Value> {
        match (self.leniency, result) {
            (_, Ok(value)) => Ok(value),
            (Leniency::Strict, Err(error)) => Err(error),
            (Leniency::Lenient, Err(error)) => {
                log::warn!("relational mapping for hub '{}' failed: {}", self.hub, error);
                Ok(Value::Null)
            }
        }
    }
}

impl std::fmt::Debug for RelationalMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalMapper")
            .field("hub", &self.hub)
            .field("leniency", &self.leniency)
            .field("related_types", &self.related_types())
            .finish()
    }
}

/// Resolve the hub's related-type set over its ancestor chain.
///
/// The first ancestor (most-derived first) carrying a global relation
/// establishes the baseline; ancestors further up are not consulted for
/// it. Per field, the nearest field-level declaration wins, and it is
/// honored only for fields the global excludes, or for every declared
/// field when no global exists. A declaration or class resolving to an
/// empty set is a configuration error, never silent.
fn resolve_related_types(hub: &str, facts: &MappingFacts) -> Result<BTreeSet<String>> {
    let chain = facts.ancestor_chain(hub);

    let mut global: Option<&GlobalRelation> = None;
    for class in &chain {
        if let Some(found) = facts.global_relations.get(*class) {
            if found.related_types.is_empty() {
                return Err(Error::configuration(format!(
                    "global relation on '{}' declares no related types",
                    class
                )));
            }
            global = Some(found);
            break;
        }
    }

    // nearest declaration per field across the chain
    let mut declared: BTreeMap<&str, &[String]> = BTreeMap::new();
    for class in &chain {
        if let Some(fields) = facts.field_relations.get(*class) {
            for (field, types) in fields {
                declared.entry(field.as_str()).or_insert(types.as_slice());
            }
        }
    }

    // relation-bearing fields: the hub's configured fields plus every
    // field with its own declaration
    let mut fields: BTreeSet<&str> = declared.keys().copied().collect();
    if let Some(correspondences) = facts.correspondences.get(hub) {
        fields.extend(
            correspondences
                .iter()
                .map(|c| c.destination_field.as_str()),
        );
    }

    let mut related = BTreeSet::new();
    for field in fields {
        let excluded = global
            .map(|g| g.excluded_fields.iter().any(|f| f == field))
            .unwrap_or(false);

        match (global, excluded, declared.get(field)) {
            // global covers every field it does not exclude
            (Some(global), false, _) => {
                related.extend(global.related_types.iter().cloned());
            }
            // an excluded field must carry its own declaration
            (Some(_), true, Some(types)) | (None, _, Some(types)) => {
                if types.is_empty() {
                    return Err(Error::configuration(format!(
                        "field-level relation on '{}' declares no related types",
                        field
                    )));
                }
                related.extend(types.iter().cloned());
            }
            (Some(_), true, None) => {
                return Err(Error::configuration(format!(
                    "field '{}' is excluded from the global relation of '{}' \
                     but declares no relation of its own",
                    field, hub
                )));
            }
            // no relation information for this field at all
            (None, _, None) => {}
        }
    }

    if related.is_empty() {
        return Err(Error::configuration(format!(
            "type '{}' resolves to no related types",
            hub
        )));
    }
    Ok(related)
}

/// Flip hub-side correspondences for the one_to_many direction.
///
/// Conversions are directional and do not carry over; inverted fields map
/// as direct copies.
fn invert_correspondences(
    correspondences: &[FieldCorrespondence],
    hub: &str,
    related: &str,
) -> Vec<FieldCorrespondence> {
    correspondences
        .iter()
        .filter_map(|correspondence| {
            let target_field = correspondence.source_field_for(related)?;
            let mut inverted = FieldCorrespondence::new(target_field)
                .from_source(hub, correspondence.destination_field.clone());
            inverted.excluded = correspondence.excluded;
            inverted.nested = correspondence.nested;
            Some(inverted)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::TypeDescriptor;
    use serde_json::json;

    fn relational_facts() -> MappingFacts {
        let mut facts = MappingFacts::new();
        facts.add_type(
            TypeDescriptor::new("Account")
                .with_field("id", "i64")
                .with_field("label", "String")
                .with_default_instance(json!({"id": null, "label": null})),
        );
        facts.add_type(
            TypeDescriptor::new("AccountDto")
                .with_field("dtoId", "i64")
                .with_field("dtoLabel", "String")
                .with_default_instance(json!({"dtoId": null, "dtoLabel": null})),
        );
        facts.add_type(
            TypeDescriptor::new("AccountRow")
                .with_field("rowId", "i64")
                .with_field("rowLabel", "String")
                .with_default_instance(json!({"rowId": null, "rowLabel": null})),
        );
        facts.add_correspondences(
            "Account",
            vec![
                FieldCorrespondence::new("id")
                    .from_source("AccountDto", "dtoId")
                    .from_source("AccountRow", "rowId"),
                FieldCorrespondence::new("label")
                    .from_source("AccountDto", "dtoLabel")
                    .from_source("AccountRow", "rowLabel"),
            ],
        );
        facts.add_global_relation(
            "Account",
            GlobalRelation {
                related_types: vec!["AccountDto".to_string(), "AccountRow".to_string()],
                excluded_fields: vec![],
            },
        );
        facts
    }

    #[test]
    fn test_many_to_one_both_targets() {
        let facts = relational_facts();
        let mapper =
            RelationalMapper::new("Account", &facts, &Registries::new(), Leniency::Strict)
                .unwrap();
        assert_eq!(mapper.related_types(), vec!["AccountDto", "AccountRow"]);

        let from_dto = mapper
            .try_many_to_one("AccountDto", &json!({"dtoId": 1, "dtoLabel": "a"}))
            .unwrap();
        assert_eq!(from_dto, json!({"id": 1, "label": "a"}));

        let from_row = mapper
            .try_many_to_one("AccountRow", &json!({"rowId": 2, "rowLabel": "b"}))
            .unwrap();
        assert_eq!(from_row, json!({"id": 2, "label": "b"}));
    }

    #[test]
    fn test_one_to_many_inverts_the_correspondences() {
        let facts = relational_facts();
        let mapper =
            RelationalMapper::new("Account", &facts, &Registries::new(), Leniency::Strict)
                .unwrap();

        let row = mapper
            .try_one_to_many("AccountRow", &json!({"id": 3, "label": "c"}))
            .unwrap();
        assert_eq!(row, json!({"rowId": 3, "rowLabel": "c"}));
    }

    #[test]
    fn test_unmapped_relation_is_strict_error() {
        let facts = relational_facts();
        let mapper =
            RelationalMapper::new("Account", &facts, &Registries::new(), Leniency::Strict)
                .unwrap();

        let err = mapper
            .try_many_to_one("Ghost", &json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::UnmappedRelation { .. }));

        // the convenience call propagates under Strict
        assert!(mapper.many_to_one("Ghost", &json!({})).is_err());
    }

    #[test]
    fn test_lenient_swallows_into_null() {
        let facts = relational_facts();
        let mapper =
            RelationalMapper::new("Account", &facts, &Registries::new(), Leniency::Lenient)
                .unwrap();

        let settled = mapper.many_to_one("Ghost", &json!({})).unwrap();
        assert_eq!(settled, Value::Null);

        // strict entry points propagate regardless of leniency
        assert!(mapper.try_many_to_one("Ghost", &json!({})).is_err());
    }

    #[test]
    fn test_override_excluding_and_adding() {
        // Base carries the global {A, B} and excludes "target"; Derived
        // overrides that field with {A, C}
        let mut facts = MappingFacts::new();
        facts.add_type(TypeDescriptor::new("Base"));
        facts.add_type(TypeDescriptor::new("Derived").with_parent("Base"));
        for name in ["A", "B", "C"] {
            facts.add_type(
                TypeDescriptor::new(name)
                    .with_field("target", "String")
                    .with_default_instance(json!({"target": null})),
            );
        }
        facts.add_correspondences(
            "Derived",
            vec![FieldCorrespondence::new("target")],
        );
        facts.add_global_relation(
            "Base",
            GlobalRelation {
                related_types: vec!["A".to_string(), "B".to_string()],
                excluded_fields: vec!["target".to_string()],
            },
        );
        facts.add_field_relation(
            "Derived",
            "target",
            vec!["A".to_string(), "C".to_string()],
        );

        let resolved = resolve_related_types("Derived", &facts).unwrap();
        let resolved: Vec<&str> = resolved.iter().map(String::as_str).collect();
        assert_eq!(resolved, vec!["A", "C"]);
    }

    #[test]
    fn test_first_global_wins_over_ancestors() {
        let mut facts = MappingFacts::new();
        facts.add_type(TypeDescriptor::new("Root"));
        facts.add_type(TypeDescriptor::new("Child").with_parent("Root"));
        facts.add_global_relation(
            "Root",
            GlobalRelation {
                related_types: vec!["FromRoot".to_string()],
                excluded_fields: vec![],
            },
        );
        facts.add_global_relation(
            "Child",
            GlobalRelation {
                related_types: vec!["FromChild".to_string()],
                excluded_fields: vec![],
            },
        );
        facts.add_correspondences("Child", vec![FieldCorrespondence::new("any")]);

        // resolution only; no descriptors needed for the set itself
        let resolved = resolve_related_types("Child", &facts).unwrap();
        assert!(resolved.contains("FromChild"));
        assert!(!resolved.contains("FromRoot"));
    }

    #[test]
    fn test_empty_relation_set_is_configuration_error() {
        let mut facts = MappingFacts::new();
        facts.add_type(TypeDescriptor::new("Lonely"));
        facts.add_correspondences("Lonely", vec![FieldCorrespondence::new("x")]);

        let err = resolve_related_types("Lonely", &facts).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_excluded_field_without_declaration_is_error() {
        let mut facts = MappingFacts::new();
        facts.add_type(TypeDescriptor::new("Hub"));
        facts.add_correspondences("Hub", vec![FieldCorrespondence::new("orphan")]);
        facts.add_global_relation(
            "Hub",
            GlobalRelation {
                related_types: vec!["A".to_string()],
                excluded_fields: vec!["orphan".to_string()],
            },
        );

        let err = resolve_related_types("Hub", &facts).unwrap_err();
        assert!(err.to_string().contains("orphan"));
    }
}
