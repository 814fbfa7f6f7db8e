//! The MappingFacts contract
//!
//! Remap never inspects types itself. Everything the engine knows about a
//! record shape arrives through the structures in this module, produced by
//! an external loader (annotation scanner, descriptor file parser, hand
//! written fixtures). All types derive serde so descriptors can be fed in
//! as JSON.
//!
//! Copyright (c) 2025 Remap Team
//! Licensed under the Apache-2.0 license

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Shape description of one record type
///
/// `fields` maps a field name to its type tag. A type tag is an opaque
/// string: scalar tags (for example `"String"`, `"i64"`) are only compared
/// for equality when validating conversion signatures, while the tag of a
/// nested field doubles as the name of the nested record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Type name, the identity used everywhere in the engine
    pub name: String,
    /// Field name to type tag
    pub fields: BTreeMap<String, String>,
    /// Direct ancestor, if any; drives the relational override walk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Product of the type's public no-argument constructor, when one
    /// exists; absent means the type cannot be instantiated empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_instance: Option<Value>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
            parent: None,
            default_instance: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        self.fields.insert(name.into(), type_tag.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_default_instance(mut self, instance: Value) -> Self {
        self.default_instance = Some(instance);
        self
    }

    /// Type tag of a declared field
    pub fn field_type(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Declarative link between one destination field and its source field(s)
///
/// `source_fields` holds one source field name per participating source
/// type. An empty map is the same-name shorthand: the field maps from a
/// source field with the destination field's own name, whatever the source
/// type. A non-empty map that lacks an entry for the current source type
/// means the field does not participate in that pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCorrespondence {
    /// Destination field name, unique per destination type
    pub destination_field: String,
    /// Source type name to source field name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_fields: BTreeMap<String, String>,
    /// Excluded fields keep the destination's default value
    #[serde(default)]
    pub excluded: bool,
    /// Name of a registered conversion, applied source to destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion: Option<String>,
    /// True when the field holds a nested record mapped recursively
    #[serde(default)]
    pub nested: bool,
}

impl FieldCorrespondence {
    pub fn new(destination_field: impl Into<String>) -> Self {
        Self {
            destination_field: destination_field.into(),
            source_fields: BTreeMap::new(),
            excluded: false,
            conversion: None,
            nested: false,
        }
    }

    pub fn from_source(
        mut self,
        source_type: impl Into<String>,
        source_field: impl Into<String>,
    ) -> Self {
        self.source_fields
            .insert(source_type.into(), source_field.into());
        self
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    pub fn with_conversion(mut self, name: impl Into<String>) -> Self {
        self.conversion = Some(name.into());
        self
    }

    pub fn nested(mut self) -> Self {
        self.nested = true;
        self
    }

    /// Source field name for the given source type, honoring the
    /// same-name shorthand; `None` means the field does not participate
    pub fn source_field_for(&self, source_type: &str) -> Option<&str> {
        if self.source_fields.is_empty() {
            return Some(self.destination_field.as_str());
        }
        self.source_fields.get(source_type).map(String::as_str)
    }
}

/// Class-level relation declaration for a hub type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRelation {
    /// Baseline set of related target types
    pub related_types: Vec<String>,
    /// Fields whose relations are delegated to field-level declarations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_fields: Vec<String>,
}

/// The complete fact list consumed, never produced, by the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingFacts {
    /// Type descriptors keyed by type name
    #[serde(default)]
    pub types: BTreeMap<String, TypeDescriptor>,
    /// Field correspondences keyed by destination type name, in
    /// declaration order
    #[serde(default)]
    pub correspondences: BTreeMap<String, Vec<FieldCorrespondence>>,
    /// Class-level relation declarations keyed by type name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub global_relations: BTreeMap<String, GlobalRelation>,
    /// Field-level relation declarations: type name, then field name, to
    /// the field's related types
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_relations: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl MappingFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.types.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn add_correspondences(
        &mut self,
        destination: impl Into<String>,
        correspondences: Vec<FieldCorrespondence>,
    ) -> &mut Self {
        self.correspondences
            .insert(destination.into(), correspondences);
        self
    }

    pub fn add_global_relation(
        &mut self,
        type_name: impl Into<String>,
        relation: GlobalRelation,
    ) -> &mut Self {
        self.global_relations.insert(type_name.into(), relation);
        self
    }

    pub fn add_field_relation(
        &mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        related: Vec<String>,
    ) -> &mut Self {
        self.field_relations
            .entry(type_name.into())
            .or_default()
            .insert(field.into(), related);
        self
    }

    /// Descriptor lookup, failing with a configuration error on a miss
    pub fn descriptor(&self, type_name: &str) -> Result<&TypeDescriptor> {
        self.types.get(type_name).ok_or_else(|| {
            Error::configuration(format!("no type descriptor for '{}'", type_name))
        })
    }

    /// Correspondence list for a destination type, failing on a miss
    pub fn correspondences_for(&self, destination: &str) -> Result<&[FieldCorrespondence]> {
        self.correspondences
            .get(destination)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no field correspondences configured for destination '{}'",
                    destination
                ))
            })
    }

    /// Ancestor chain of a type, most-derived first, the type included
    pub fn ancestor_chain<'a>(&'a self, type_name: &'a str) -> Vec<&'a str> {
        let mut chain = Vec::new();
        let mut current = Some(type_name);
        while let Some(name) = current {
            chain.push(name);
            current = self
                .types
                .get(name)
                .and_then(|d| d.parent.as_deref())
                // a self-referential parent would loop forever
                .filter(|p| !chain.contains(p));
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_name_shorthand() {
        let corr = FieldCorrespondence::new("id");
        assert_eq!(corr.source_field_for("Anything"), Some("id"));
    }

    #[test]
    fn test_non_participating_source_type() {
        let corr = FieldCorrespondence::new("id").from_source("UserDto", "userId");
        assert_eq!(corr.source_field_for("UserDto"), Some("userId"));
        assert_eq!(corr.source_field_for("OrderDto"), None);
    }

    #[test]
    fn test_ancestor_chain() {
        let mut facts = MappingFacts::new();
        facts.add_type(TypeDescriptor::new("Base"));
        facts.add_type(TypeDescriptor::new("Middle").with_parent("Base"));
        facts.add_type(TypeDescriptor::new("Derived").with_parent("Middle"));

        assert_eq!(
            facts.ancestor_chain("Derived"),
            vec!["Derived", "Middle", "Base"]
        );
        assert_eq!(facts.ancestor_chain("Base"), vec!["Base"]);
    }

    #[test]
    fn test_descriptor_miss_is_configuration_error() {
        let facts = MappingFacts::new();
        let err = facts.descriptor("Ghost").unwrap_err();
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn test_facts_round_trip_from_json() {
        let facts: MappingFacts = serde_json::from_value(json!({
            "types": {
                "User": {
                    "name": "User",
                    "fields": {"id": "i64", "name": "String"},
                    "default_instance": {}
                }
            },
            "correspondences": {
                "User": [
                    {"destination_field": "id", "source_fields": {"UserDto": "userId"}},
                    {"destination_field": "name"}
                ]
            }
        }))
        .unwrap();

        let corrs = facts.correspondences_for("User").unwrap();
        assert_eq!(corrs.len(), 2);
        assert_eq!(corrs[0].source_field_for("UserDto"), Some("userId"));
        assert!(!corrs[0].excluded);
    }
}
