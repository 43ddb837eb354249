//! Activator configuration.
//!
//! Defaults cover most hosts. Values can be set through
//! [`ActivatorBuilder`](crate::ActivatorBuilder) or loaded from JSON:
//!
//! ```
//! use procwire_activation::config::{ActivatorConfig, ResolutionOrder};
//!
//! let config = ActivatorConfig::from_json(r#"{ "resolution_order": "binding_name" }"#).unwrap();
//! assert_eq!(config.resolution_order, ResolutionOrder::BindingName);
//! assert!(!config.trace_resolutions);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Order of handlers returned for one message type.
///
/// Neither order is a priority mechanism; it only makes the tie-break
/// explicit and testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOrder {
    /// The container's registration order.
    #[default]
    Registration,
    /// Lexicographic by binding name.
    BindingName,
}

/// Configuration for a [`HandlerActivator`](crate::HandlerActivator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivatorConfig {
    /// Tie-break for handlers of the same message type.
    pub resolution_order: ResolutionOrder,
    /// Log every resolved binding at debug level.
    pub trace_resolutions: bool,
}

impl Default for ActivatorConfig {
    fn default() -> Self {
        Self {
            resolution_order: ResolutionOrder::Registration,
            trace_resolutions: false,
        }
    }
}

impl ActivatorConfig {
    /// Parse a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = ActivatorConfig::default();
        assert_eq!(config.resolution_order, ResolutionOrder::Registration);
        assert!(!config.trace_resolutions);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(ActivatorConfig::from_json("{}").unwrap(), ActivatorConfig::default());
    }

    #[test]
    fn test_full_json() {
        let config = ActivatorConfig::from_json(
            r#"{ "resolution_order": "registration", "trace_resolutions": true }"#,
        )
        .unwrap();

        assert_eq!(config.resolution_order, ResolutionOrder::Registration);
        assert!(config.trace_resolutions);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ActivatorConfig::from_json(r#"{ "priority": 1 }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_unknown_order_rejected() {
        assert!(ActivatorConfig::from_json(r#"{ "resolution_order": "random" }"#).is_err());
    }

    #[test]
    fn test_roundtrip_through_json() {
        let config = ActivatorConfig {
            resolution_order: ResolutionOrder::BindingName,
            trace_resolutions: true,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ActivatorConfig::from_json(&json).unwrap(), config);
    }
}
