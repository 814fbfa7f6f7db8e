//! Conversion and destination-factory registries
//!
//! Conversions are named callables with a fixed (source type) -> destination
//! type signature, resolved by name when the planner runs. Factories are
//! zero-argument creation capabilities registered per destination type;
//! absence falls back to the type's default instance.
//!
//! Copyright (c) 2025 Remap Team
//! Licensed under the Apache-2.0 license

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A user-supplied conversion body; failures propagate as-is
pub type ConversionFn = Arc<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

/// A zero-argument destination creation capability
pub type FactoryFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// A registered conversion together with its declared signature
#[derive(Clone)]
pub struct ConversionEntry {
    pub name: String,
    /// Type tag the conversion accepts
    pub input: String,
    /// Type tag the conversion produces
    pub output: String,
    pub body: ConversionFn,
}

impl fmt::Debug for ConversionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionEntry")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

/// Named conversions, resolved by the planner
#[derive(Debug, Clone, Default)]
pub struct ConversionRegistry {
    entries: HashMap<String, Arc<ConversionEntry>>,
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversion under `name` with the declared signature.
    /// A later registration under the same name replaces the earlier one.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        body: F,
    ) -> &mut Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        self.entries.insert(
            name.clone(),
            Arc::new(ConversionEntry {
                name,
                input: input.into(),
                output: output.into(),
                body: Arc::new(body),
            }),
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ConversionEntry>> {
        self.entries.get(name)
    }
}

/// Destination factories keyed by destination type name
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    entries: HashMap<String, FactoryFn>,
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.entries.insert(type_name.into(), Arc::new(factory));
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&FactoryFn> {
        self.entries.get(type_name)
    }
}

/// The registries a build consumes, bundled
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub conversions: ConversionRegistry,
    pub factories: FactoryRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conversion_registration_and_lookup() {
        let mut registry = ConversionRegistry::new();
        registry.register("to_string", "i64", "String", |v| {
            Ok(Value::String(v.to_string()))
        });

        let entry = registry.get("to_string").unwrap();
        assert_eq!(entry.input, "i64");
        assert_eq!(entry.output, "String");
        assert_eq!((entry.body)(&json!(7)).unwrap(), json!("7"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_factory_registration() {
        let mut registry = FactoryRegistry::new();
        registry.register("User", || json!({"id": null, "name": null}));

        let factory = registry.get("User").unwrap();
        assert_eq!(factory(), json!({"id": null, "name": null}));
    }

    #[test]
    fn test_later_registration_replaces() {
        let mut registry = ConversionRegistry::new();
        registry.register("c", "a", "b", |_| Ok(json!(1)));
        registry.register("c", "a", "b", |_| Ok(json!(2)));
        assert_eq!((registry.get("c").unwrap().body)(&Value::Null).unwrap(), json!(2));
    }
}
