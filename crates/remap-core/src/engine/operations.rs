//! Field operations and the policies that parameterize them
//!
//! The planner emits `SimpleOp` and `ComplexOp` values; the constructor
//! compiles each of them, once per mapping variant, into a `FieldStep`
//! closure with the inclusion tests already resolved. Invoking a step is a
//! synchronous computation over the two records with no shared state.
//!
//! Copyright (c) 2025 Remap Team
//! Licensed under the Apache-2.0 license

use crate::engine::compiled::{CompiledMapper, MapRequest};
use crate::registry::ConversionEntry;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Which side's nullness aborts a mapping call with a null result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NullPolicy {
    /// Never short-circuit
    None,
    /// Guard on the source being non-null
    Source,
    /// Guard on the destination being non-null
    Destination,
    /// Guard on both sides
    Both,
}

/// Per-side rule selecting which fields are eligible for assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldFilter {
    /// Always include
    All,
    /// Include only when the examined value is non-null
    ValuedOnly,
    /// Include only when the examined value is null
    NullOnly,
}

/// Whether the routine writes into a caller-supplied destination or
/// acquires a fresh one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstancePolicy {
    /// Use the caller-supplied destination instance
    Reuse,
    /// Invoke the registered factory or the default instance
    New,
}

impl fmt::Display for NullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NullPolicy::None => write!(f, "None"),
            NullPolicy::Source => write!(f, "Source"),
            NullPolicy::Destination => write!(f, "Destination"),
            NullPolicy::Both => write!(f, "Both"),
        }
    }
}

impl fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldFilter::All => write!(f, "All"),
            FieldFilter::ValuedOnly => write!(f, "ValuedOnly"),
            FieldFilter::NullOnly => write!(f, "NullOnly"),
        }
    }
}

impl fmt::Display for InstancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstancePolicy::Reuse => write!(f, "Reuse"),
            InstancePolicy::New => write!(f, "New"),
        }
    }
}

/// A compiled per-field assignment, ready to run against (source, dest)
pub(crate) type FieldStep = Box<dyn Fn(&Value, &mut Value) -> Result<()> + Send + Sync>;

/// An inclusion test with the filter choice resolved at specialization time
pub(crate) type IncludeTest = fn(&Value) -> bool;

impl FieldFilter {
    /// Resolve the filter to a plain function pointer so the compiled step
    /// carries no filter branching of its own
    pub(crate) fn compile(self) -> IncludeTest {
        fn all(_: &Value) -> bool {
            true
        }
        fn valued_only(value: &Value) -> bool {
            !value.is_null()
        }
        fn null_only(value: &Value) -> bool {
            value.is_null()
        }
        match self {
            FieldFilter::All => all,
            FieldFilter::ValuedOnly => valued_only,
            FieldFilter::NullOnly => null_only,
        }
    }
}

static NULL: Value = Value::Null;

/// Field read treating a missing key or a non-object record as null
pub(crate) fn field_of<'a>(record: &'a Value, field: &str) -> &'a Value {
    record
        .as_object()
        .and_then(|object| object.get(field))
        .unwrap_or(&NULL)
}

/// Field write; the destination record must be an object
pub(crate) fn assign(destination: &mut Value, field: &str, value: Value) -> Result<()> {
    destination
        .as_object_mut()
        .ok_or_else(|| Error::mapping(format!("destination record is not an object, cannot assign field '{}'", field)))?
        .insert(field.to_string(), value);
    Ok(())
}

/// Direct scalar assignment, with an optional conversion applied exactly
/// once per included assignment
#[derive(Debug, Clone)]
pub(crate) struct SimpleOp {
    pub destination_field: String,
    pub source_field: String,
    pub conversion: Option<Arc<ConversionEntry>>,
}

impl SimpleOp {
    pub(crate) fn compile(&self, dest_filter: FieldFilter, src_filter: FieldFilter) -> FieldStep {
        let destination_field = self.destination_field.clone();
        let source_field = self.source_field.clone();
        let conversion = self.conversion.clone();
        let dest_test = dest_filter.compile();
        let src_test = src_filter.compile();

        Box::new(move |source, destination| {
            let source_value = field_of(source, &source_field);
            if !src_test(source_value) {
                return Ok(());
            }
            if !dest_test(field_of(destination, &destination_field)) {
                return Ok(());
            }
            let assigned = match &conversion {
                Some(entry) => (entry.body)(source_value).map_err(|source| Error::Conversion {
                    name: entry.name.clone(),
                    source,
                })?,
                None => source_value.clone(),
            };
            assign(destination, &destination_field, assigned)
        })
    }
}

/// Nested object graph assignment, delegating to the compiled mapper of
/// the nested type pair
#[derive(Debug, Clone)]
pub(crate) struct ComplexOp {
    pub destination_field: String,
    pub source_field: String,
    pub nested_destination: String,
    pub nested_source: String,
}

impl ComplexOp {
    /// The nested call runs under the enclosing variant's instance policy
    /// and filters. Its own null policy is `None`: the inclusion test on
    /// the nested source value already decided that the sub-mapping runs.
    pub(crate) fn compile(
        &self,
        instance: InstancePolicy,
        dest_filter: FieldFilter,
        src_filter: FieldFilter,
        nested: Arc<CompiledMapper>,
    ) -> FieldStep {
        let destination_field = self.destination_field.clone();
        let source_field = self.source_field.clone();
        let dest_test = dest_filter.compile();
        let src_test = src_filter.compile();

        Box::new(move |source, destination| {
            let source_value = field_of(source, &source_field);
            if !src_test(source_value) {
                return Ok(());
            }
            let current = field_of(destination, &destination_field);
            if !dest_test(current) {
                return Ok(());
            }
            // a null current value cannot be reused as a sub-destination
            let existing = match instance {
                InstancePolicy::Reuse if !current.is_null() => Some(current.clone()),
                _ => None,
            };
            let mut request = MapRequest::new(source_value)
                .null_policy(NullPolicy::None)
                .filters(dest_filter, src_filter);
            if let Some(existing) = existing {
                request = request.reusing(existing);
            }
            let mapped = nested.map_with(request)?;
            assign(destination, &destination_field, mapped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_include_tests() {
        assert!(FieldFilter::All.compile()(&Value::Null));
        assert!(FieldFilter::All.compile()(&json!(1)));
        assert!(!FieldFilter::ValuedOnly.compile()(&Value::Null));
        assert!(FieldFilter::ValuedOnly.compile()(&json!(1)));
        assert!(FieldFilter::NullOnly.compile()(&Value::Null));
        assert!(!FieldFilter::NullOnly.compile()(&json!(1)));
    }

    #[test]
    fn test_field_of_tolerates_missing_and_non_object() {
        assert!(field_of(&json!({}), "id").is_null());
        assert!(field_of(&json!(42), "id").is_null());
        assert_eq!(field_of(&json!({"id": 7}), "id"), &json!(7));
    }

    #[test]
    fn test_simple_step_direct_copy() {
        let op = SimpleOp {
            destination_field: "name".to_string(),
            source_field: "fullName".to_string(),
            conversion: None,
        };
        let step = op.compile(FieldFilter::All, FieldFilter::All);

        let mut destination = json!({});
        step(&json!({"fullName": "ada"}), &mut destination).unwrap();
        assert_eq!(destination, json!({"name": "ada"}));
    }

    #[test]
    fn test_simple_step_source_filter_skips() {
        let op = SimpleOp {
            destination_field: "name".to_string(),
            source_field: "name".to_string(),
            conversion: None,
        };
        let step = op.compile(FieldFilter::All, FieldFilter::ValuedOnly);

        let mut destination = json!({"name": "kept"});
        step(&json!({"name": null}), &mut destination).unwrap();
        assert_eq!(destination, json!({"name": "kept"}));
    }

    #[test]
    fn test_simple_step_dest_filter_null_only_fills_gaps() {
        let op = SimpleOp {
            destination_field: "name".to_string(),
            source_field: "name".to_string(),
            conversion: None,
        };
        let step = op.compile(FieldFilter::NullOnly, FieldFilter::All);

        let mut populated = json!({"name": "kept"});
        step(&json!({"name": "new"}), &mut populated).unwrap();
        assert_eq!(populated, json!({"name": "kept"}));

        let mut empty = json!({"name": null});
        step(&json!({"name": "new"}), &mut empty).unwrap();
        assert_eq!(empty, json!({"name": "new"}));
    }

    #[test]
    fn test_assign_rejects_non_object_destination() {
        let mut destination = json!("scalar");
        let err = assign(&mut destination, "x", json!(1)).unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }
}
