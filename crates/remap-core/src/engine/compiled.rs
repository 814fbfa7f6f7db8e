//! The compiled mapper: an immutable, sparse table of mapping routines
//!
//! One `CompiledMapper` exists per (Destination, Source) type pair. Its
//! table is indexed by `MappingVariant`, the four-tuple identifying one
//! specialized routine. The table is filled once by the constructor and
//! never changes after publication, so a mapper may be invoked from any
//! number of threads.
//!
//! Copyright (c) 2025 Remap Team
//! Licensed under the Apache-2.0 license

use crate::engine::operations::{FieldFilter, FieldStep, InstancePolicy, NullPolicy};
use crate::registry::FactoryFn;
use crate::{Error, Result};
use serde_json::Value;
use std::fmt;

/// Identity of one specialized routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MappingVariant {
    pub instance: InstancePolicy,
    pub null_policy: NullPolicy,
    pub dest_filter: FieldFilter,
    pub src_filter: FieldFilter,
}

impl MappingVariant {
    /// Number of cells in the full matrix: 2 x 4 x 3 x 3
    pub const COUNT: usize = 72;

    pub fn new(
        instance: InstancePolicy,
        null_policy: NullPolicy,
        dest_filter: FieldFilter,
        src_filter: FieldFilter,
    ) -> Self {
        Self {
            instance,
            null_policy,
            dest_filter,
            src_filter,
        }
    }

    /// Dense index into the routine table
    pub fn index(self) -> usize {
        ((self.instance as usize * 4 + self.null_policy as usize) * 3
            + self.dest_filter as usize)
            * 3
            + self.src_filter as usize
    }

    /// Deterministic enumeration of the full matrix
    pub fn all() -> impl Iterator<Item = MappingVariant> {
        const INSTANCES: [InstancePolicy; 2] = [InstancePolicy::Reuse, InstancePolicy::New];
        const POLICIES: [NullPolicy; 4] = [
            NullPolicy::None,
            NullPolicy::Source,
            NullPolicy::Destination,
            NullPolicy::Both,
        ];
        const FILTERS: [FieldFilter; 3] = [
            FieldFilter::All,
            FieldFilter::ValuedOnly,
            FieldFilter::NullOnly,
        ];
        INSTANCES.into_iter().flat_map(move |instance| {
            POLICIES.into_iter().flat_map(move |null_policy| {
                FILTERS.into_iter().flat_map(move |dest_filter| {
                    FILTERS.into_iter().map(move |src_filter| {
                        MappingVariant::new(instance, null_policy, dest_filter, src_filter)
                    })
                })
            })
        })
    }

    /// The projection under which no destination field can ever be
    /// populated: an all-null source view against a filter that only
    /// writes non-null values
    pub(crate) fn is_null_projection(self) -> bool {
        self.instance == InstancePolicy::New
            && matches!(self.dest_filter, FieldFilter::All | FieldFilter::ValuedOnly)
            && self.src_filter == FieldFilter::NullOnly
    }
}

impl fmt::Display for MappingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.instance, self.null_policy, self.dest_filter, self.src_filter
        )
    }
}

/// Parameters of one mapping call
///
/// The instance policy is implied: supplying a destination via
/// [`MapRequest::reusing`] selects `Reuse`, otherwise `New`.
#[derive(Debug)]
pub struct MapRequest<'a> {
    pub(crate) source: &'a Value,
    pub(crate) destination: Option<Value>,
    pub(crate) null_policy: NullPolicy,
    pub(crate) dest_filter: FieldFilter,
    pub(crate) src_filter: FieldFilter,
}

impl<'a> MapRequest<'a> {
    /// Defaults match the plain `map` entry point: fresh destination,
    /// source null guard, both filters wide open
    pub fn new(source: &'a Value) -> Self {
        Self {
            source,
            destination: None,
            null_policy: NullPolicy::Source,
            dest_filter: FieldFilter::All,
            src_filter: FieldFilter::All,
        }
    }

    pub fn reusing(mut self, destination: Value) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn null_policy(mut self, null_policy: NullPolicy) -> Self {
        self.null_policy = null_policy;
        self
    }

    pub fn filters(mut self, dest_filter: FieldFilter, src_filter: FieldFilter) -> Self {
        self.dest_filter = dest_filter;
        self.src_filter = src_filter;
        self
    }

    /// The variant key this request selects
    pub fn variant(&self) -> MappingVariant {
        let instance = if self.destination.is_some() {
            InstancePolicy::Reuse
        } else {
            InstancePolicy::New
        };
        MappingVariant::new(instance, self.null_policy, self.dest_filter, self.src_filter)
    }
}

/// Destination acquisition for `New`-policy routines, resolved once at
/// specialization time
#[derive(Clone)]
pub(crate) enum Acquire {
    Factory(FactoryFn),
    Default(Value),
}

impl Acquire {
    fn make(&self) -> Value {
        match self {
            Acquire::Factory(factory) => factory(),
            Acquire::Default(instance) => instance.clone(),
        }
    }
}

/// One specialized transformation routine
pub(crate) enum Routine {
    /// The null projection: return null without acquiring anything
    ConstNull,
    Run(RunPlan),
}

pub(crate) struct RunPlan {
    pub null_policy: NullPolicy,
    /// `Some` for `New` routines, `None` for `Reuse`
    pub acquire: Option<Acquire>,
    /// Simple steps first, complex steps after, both in planner order
    pub steps: Vec<FieldStep>,
}

impl Routine {
    fn invoke(&self, request: MapRequest<'_>) -> Result<Value> {
        let plan = match self {
            Routine::ConstNull => return Ok(Value::Null),
            Routine::Run(plan) => plan,
        };

        let mut destination = match &plan.acquire {
            Some(acquire) => acquire.make(),
            None => request
                .destination
                .ok_or_else(|| Error::mapping("reuse routine invoked without a destination"))?,
        };

        let guarded = match plan.null_policy {
            NullPolicy::None => true,
            NullPolicy::Source => !request.source.is_null(),
            NullPolicy::Destination => !destination.is_null(),
            NullPolicy::Both => !request.source.is_null() && !destination.is_null(),
        };
        if !guarded {
            return Ok(Value::Null);
        }

        for step in &plan.steps {
            step(request.source, &mut destination)?;
        }
        Ok(destination)
    }
}

/// A table cell: either a ready routine or the failure recorded for this
/// variant at specialization time
pub(crate) enum Slot {
    Ready(Routine),
    /// Recorded once; invoking reports it without re-probing
    MissingConstructor,
}

/// The immutable routine table for one (Destination, Source) pair
pub struct CompiledMapper {
    destination: String,
    source: String,
    table: Vec<Option<Slot>>,
}

impl CompiledMapper {
    pub(crate) fn new(
        destination: String,
        source: String,
        table: Vec<Option<Slot>>,
    ) -> Self {
        debug_assert_eq!(table.len(), MappingVariant::COUNT);
        Self {
            destination,
            source,
            table,
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Map `source` into a fresh destination with the default
    /// parameterization (source null guard, all fields on both sides)
    pub fn map(&self, source: &Value) -> Result<Value> {
        self.map_with(MapRequest::new(source))
    }

    /// Like [`map`](Self::map) but with no null guard at all
    pub fn map_strict(&self, source: &Value) -> Result<Value> {
        self.map_with(MapRequest::new(source).null_policy(NullPolicy::None))
    }

    /// Enrich a caller-supplied destination; guards on both sides being
    /// non-null
    pub fn map_into(&self, destination: Value, source: &Value) -> Result<Value> {
        self.map_with(
            MapRequest::new(source)
                .reusing(destination)
                .null_policy(NullPolicy::Both),
        )
    }

    /// Fully parameterized entry point
    pub fn map_with(&self, request: MapRequest<'_>) -> Result<Value> {
        let variant = request.variant();
        match &self.table[variant.index()] {
            None => Err(Error::UncompiledVariant { variant }),
            Some(Slot::MissingConstructor) => Err(Error::MissingConstructor {
                destination: self.destination.clone(),
                variant,
            }),
            Some(Slot::Ready(routine)) => routine.invoke(request),
        }
    }

    /// Whether a routine was compiled for this variant. A miss is not an
    /// error condition: unrequested keys are legitimately absent.
    pub fn has_variant(&self, variant: MappingVariant) -> bool {
        self.table[variant.index()].is_some()
    }

    /// The variant keys present in the table, in matrix order
    pub fn variants(&self) -> Vec<MappingVariant> {
        MappingVariant::all()
            .filter(|variant| self.has_variant(*variant))
            .collect()
    }
}

impl fmt::Debug for CompiledMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledMapper")
            .field("destination", &self.destination)
            .field("source", &self.source)
            .field("variants", &self.variants().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_variant_index_is_a_bijection() {
        let indices: HashSet<usize> = MappingVariant::all().map(|v| v.index()).collect();
        assert_eq!(indices.len(), MappingVariant::COUNT);
        assert!(indices.iter().all(|&i| i < MappingVariant::COUNT));
    }

    #[test]
    fn test_request_selects_instance_policy() {
        let source = json!({});
        assert_eq!(
            MapRequest::new(&source).variant().instance,
            InstancePolicy::New
        );
        assert_eq!(
            MapRequest::new(&source).reusing(json!({})).variant().instance,
            InstancePolicy::Reuse
        );
    }

    #[test]
    fn test_null_projection_membership() {
        let projection = MappingVariant::new(
            InstancePolicy::New,
            NullPolicy::None,
            FieldFilter::ValuedOnly,
            FieldFilter::NullOnly,
        );
        assert!(projection.is_null_projection());

        let reuse = MappingVariant::new(
            InstancePolicy::Reuse,
            NullPolicy::None,
            FieldFilter::All,
            FieldFilter::NullOnly,
        );
        assert!(!reuse.is_null_projection());

        let null_dest = MappingVariant::new(
            InstancePolicy::New,
            NullPolicy::None,
            FieldFilter::NullOnly,
            FieldFilter::NullOnly,
        );
        assert!(!null_dest.is_null_projection());
    }

    #[test]
    fn test_variant_display() {
        let variant = MappingVariant::new(
            InstancePolicy::New,
            NullPolicy::Source,
            FieldFilter::All,
            FieldFilter::NullOnly,
        );
        assert_eq!(variant.to_string(), "New/Source/All/NullOnly");
    }
}
