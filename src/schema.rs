//! Binding schema for diagnostics.
//!
//! Describes which handler types are bound to which message contracts,
//! and serializes to JSON so a host can log or expose it at startup.
//!
//! # Example
//!
//! ```
//! use procwire_activation::schema::BindingSchema;
//!
//! let mut schema = BindingSchema::new();
//! schema.add_binding("app::Audit:HandleMessages<app::OrderPlaced>", "app::OrderPlaced", "app::Audit");
//!
//! let json = schema.to_json().unwrap();
//! assert!(json.contains("app::Audit"));
//! ```

use serde::Serialize;
use serde_json::json;

use crate::error::Result;

/// Schema format version.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// One binding in the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingDescriptor {
    /// Binding name.
    pub name: String,
    /// Message type name.
    pub message: String,
    /// Handler type name.
    pub handler: String,
}

/// Description of all bindings known to a registry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BindingSchema {
    /// Bindings in registration order.
    pub bindings: Vec<BindingDescriptor>,
}

impl BindingSchema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding to the schema.
    pub fn add_binding(&mut self, name: &str, message: &str, handler: &str) {
        self.bindings.push(BindingDescriptor {
            name: name.to_string(),
            message: message.to_string(),
            handler: handler.to_string(),
        });
    }

    /// Get a binding by name.
    pub fn get_binding(&self, name: &str) -> Option<&BindingDescriptor> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// Bindings for a message type name.
    pub fn for_message<'a>(&'a self, message: &'a str) -> impl Iterator<Item = &'a BindingDescriptor> {
        self.bindings.iter().filter(move |b| b.message == message)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if schema is empty.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Serialize to a JSON document with a version field.
    pub fn to_json(&self) -> Result<String> {
        let doc = json!({
            "version": SCHEMA_VERSION,
            "bindings": self.bindings,
        });
        Ok(serde_json::to_string(&doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_schema() {
        let schema = BindingSchema::new();
        assert!(schema.is_empty());
        assert_eq!(schema.len(), 0);
    }

    #[test]
    fn test_lookup() {
        let mut schema = BindingSchema::new();
        schema.add_binding("a:HandleMessages<m::X>", "m::X", "a");
        schema.add_binding("b:HandleMessages<m::X>", "m::X", "b");
        schema.add_binding("b:HandleMessages<m::Y>", "m::Y", "b");

        assert_eq!(schema.for_message("m::X").count(), 2);
        assert_eq!(schema.for_message("m::Z").count(), 0);
        assert_eq!(
            schema.get_binding("b:HandleMessages<m::Y>").map(|b| b.handler.as_str()),
            Some("b")
        );
    }

    #[test]
    fn test_to_json_structure() {
        let mut schema = BindingSchema::new();
        schema.add_binding("h:HandleMessages<m>", "m", "h");

        let json = schema.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["version"], SCHEMA_VERSION);
        assert_eq!(parsed["bindings"][0]["name"], "h:HandleMessages<m>");
        assert_eq!(parsed["bindings"][0]["message"], "m");
        assert_eq!(parsed["bindings"][0]["handler"], "h");
    }
}
