//! Variant specialization: the mapper constructor
//!
//! The constructor enumerates the requested cells of the policy matrix and
//! composes one routine per cell from the planner's operations. Everything
//! variant-dependent is resolved here, once: the destination acquisition
//! strategy, the null guard, the inclusion tests baked into each field
//! step, and the null-projection short-circuit.
//!
//! Copyright (c) 2025 Remap Team
//! Licensed under the Apache-2.0 license

use crate::engine::compiled::{Acquire, CompiledMapper, MappingVariant, Routine, RunPlan, Slot};
use crate::engine::operations::InstancePolicy;
use crate::engine::planner::Plan;
use crate::facts::TypeDescriptor;
use crate::registry::FactoryRegistry;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct MapperConstructor<'a> {
    destination: &'a TypeDescriptor,
    source: &'a TypeDescriptor,
    plan: &'a Plan,
    /// Compiled mappers for the nested pairs the plan refers to
    nested: &'a HashMap<(String, String), Arc<CompiledMapper>>,
    /// Acquisition strategy, probed once for the whole matrix
    acquire: Option<Acquire>,
}

impl<'a> MapperConstructor<'a> {
    pub(crate) fn new(
        destination: &'a TypeDescriptor,
        source: &'a TypeDescriptor,
        plan: &'a Plan,
        nested: &'a HashMap<(String, String), Arc<CompiledMapper>>,
        factories: &FactoryRegistry,
    ) -> Self {
        // registered factory first, the type's default instance second
        let acquire = factories
            .get(&destination.name)
            .cloned()
            .map(Acquire::Factory)
            .or_else(|| {
                destination
                    .default_instance
                    .clone()
                    .map(Acquire::Default)
            });
        Self {
            destination,
            source,
            plan,
            nested,
            acquire,
        }
    }

    /// Compile one routine per requested variant into a published table
    pub(crate) fn specialize(
        &self,
        variants: impl IntoIterator<Item = MappingVariant>,
    ) -> Result<CompiledMapper> {
        let mut table: Vec<Option<Slot>> =
            (0..MappingVariant::COUNT).map(|_| None).collect();
        let mut compiled = 0usize;

        for variant in variants {
            table[variant.index()] = Some(self.compile_variant(variant)?);
            compiled += 1;
        }

        log::debug!(
            "specialized {} variants for {} <- {}",
            compiled,
            self.destination.name,
            self.source.name
        );
        Ok(CompiledMapper::new(
            self.destination.name.clone(),
            self.source.name.clone(),
            table,
        ))
    }

    fn compile_variant(&self, variant: MappingVariant) -> Result<Slot> {
        // Under an all-source-fields-null projection an All/ValuedOnly
        // destination filter can never populate a field, so a fresh
        // instance must not even be constructed.
        if variant.is_null_projection() {
            return Ok(Slot::Ready(Routine::ConstNull));
        }

        let acquire = match variant.instance {
            InstancePolicy::Reuse => None,
            InstancePolicy::New => match &self.acquire {
                Some(acquire) => Some(acquire.clone()),
                None => {
                    log::debug!(
                        "recording missing constructor for '{}' variant {}",
                        self.destination.name,
                        variant
                    );
                    return Ok(Slot::MissingConstructor);
                }
            },
        };

        let mut steps = Vec::with_capacity(self.plan.simple.len() + self.plan.complex.len());
        for op in &self.plan.simple {
            steps.push(op.compile(variant.dest_filter, variant.src_filter));
        }
        for op in &self.plan.complex {
            let key = (op.nested_destination.clone(), op.nested_source.clone());
            let nested = self.nested.get(&key).ok_or_else(|| {
                Error::configuration(format!(
                    "no compiled mapper for nested pair {} <- {}",
                    op.nested_destination, op.nested_source
                ))
            })?;
            steps.push(op.compile(
                variant.instance,
                variant.dest_filter,
                variant.src_filter,
                Arc::clone(nested),
            ));
        }

        Ok(Slot::Ready(Routine::Run(RunPlan {
            null_policy: variant.null_policy,
            acquire,
            steps,
        })))
    }
}
