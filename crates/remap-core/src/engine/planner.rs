//! Operation planning for one (Destination, Source) type pair
//!
//! The planner turns a list of field correspondences into ordered Simple
//! and Complex operations. Every configuration problem is detected here,
//! when the planner runs, never later on the mapping path: unknown fields,
//! duplicate destination fields and mismatched conversion signatures all
//! fail the build.
//!
//! Copyright (c) 2025 Remap Team
//! Licensed under the Apache-2.0 license

use crate::engine::operations::{ComplexOp, SimpleOp};
use crate::facts::{FieldCorrespondence, TypeDescriptor};
use crate::registry::ConversionRegistry;
use crate::{Error, Result};
use std::collections::HashSet;

/// Ordered operations for one type pair, split by kind
#[derive(Debug, Default)]
pub(crate) struct Plan {
    pub simple: Vec<SimpleOp>,
    pub complex: Vec<ComplexOp>,
}

pub(crate) struct OperationPlanner<'a> {
    destination: &'a TypeDescriptor,
    source: &'a TypeDescriptor,
    conversions: &'a ConversionRegistry,
}

impl<'a> OperationPlanner<'a> {
    pub(crate) fn new(
        destination: &'a TypeDescriptor,
        source: &'a TypeDescriptor,
        conversions: &'a ConversionRegistry,
    ) -> Self {
        Self {
            destination,
            source,
            conversions,
        }
    }

    /// Produce the ordered operation lists, in declaration order
    pub(crate) fn plan(&self, correspondences: &[FieldCorrespondence]) -> Result<Plan> {
        let mut plan = Plan::default();
        let mut seen = HashSet::new();

        for correspondence in correspondences {
            let dest_field = correspondence.destination_field.as_str();

            if !seen.insert(dest_field) {
                return Err(Error::configuration(format!(
                    "destination field '{}' configured twice for '{}'",
                    dest_field, self.destination.name
                )));
            }

            let dest_type = self.destination.field_type(dest_field).ok_or_else(|| {
                Error::configuration(format!(
                    "field '{}' is not declared on destination '{}'",
                    dest_field, self.destination.name
                ))
            })?;

            if correspondence.excluded {
                continue;
            }

            // absence from the map means the field does not participate
            // in this particular pair
            let src_field = match correspondence.source_field_for(&self.source.name) {
                Some(field) => field,
                None => continue,
            };

            let src_type = self.source.field_type(src_field).ok_or_else(|| {
                Error::configuration(format!(
                    "field '{}' is not declared on source '{}'",
                    src_field, self.source.name
                ))
            })?;

            if correspondence.nested {
                if correspondence.conversion.is_some() {
                    return Err(Error::configuration(format!(
                        "nested field '{}' on '{}' cannot carry a conversion",
                        dest_field, self.destination.name
                    )));
                }
                plan.complex.push(ComplexOp {
                    destination_field: dest_field.to_string(),
                    source_field: src_field.to_string(),
                    nested_destination: dest_type.to_string(),
                    nested_source: src_type.to_string(),
                });
                continue;
            }

            let conversion = match &correspondence.conversion {
                Some(name) => Some(self.resolve_conversion(name, src_type, dest_type)?),
                None => None,
            };

            plan.simple.push(SimpleOp {
                destination_field: dest_field.to_string(),
                source_field: src_field.to_string(),
                conversion,
            });
        }

        log::debug!(
            "planned {} simple and {} complex operations for {} <- {}",
            plan.simple.len(),
            plan.complex.len(),
            self.destination.name,
            self.source.name
        );
        Ok(plan)
    }

    fn resolve_conversion(
        &self,
        name: &str,
        src_type: &str,
        dest_type: &str,
    ) -> Result<std::sync::Arc<crate::registry::ConversionEntry>> {
        let entry = self.conversions.get(name).ok_or_else(|| {
            Error::configuration(format!("conversion '{}' is not registered", name))
        })?;
        if entry.input != src_type || entry.output != dest_type {
            return Err(Error::ConversionSignature {
                conversion: name.to_string(),
                expected: format!("{} -> {}", entry.input, entry.output),
                found: format!("{} -> {}", src_type, dest_type),
            });
        }
        Ok(entry.clone())
    }
}
