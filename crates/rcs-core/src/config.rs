//! Declarative resource configuration.
//!
//! A [`ResourceConfig`] describes a resource's static identity, initial
//! attributes and policies, so resources can be declared in JSON files
//! rather than assembled in code. The server crate turns it into a builder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attributes::AttributeMap;
use crate::model::{AutoNotifyPolicy, SetRequestHandlerPolicy};

/// Errors that can occur while loading a resource configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for a resource configuration.
    #[error("Failed to parse resource configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but describes an unusable resource.
    #[error("Invalid resource configuration: {0}")]
    Invalid(String),
}

fn default_true() -> bool {
    true
}

/// Declarative description of a single resource.
///
/// # Example
/// ```json
/// {
///   "uri": "/a/temperature",
///   "resourceTypes": ["oic.r.temperature"],
///   "interfaces": ["oic.if.baseline", "oic.if.s"],
///   "defaultInterface": "oic.if.s",
///   "attributes": { "Temperature": 21 },
///   "autoNotifyPolicy": "updated"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// Resource URI, e.g. "/a/light"
    pub uri: String,

    /// Resource types; the first one is used at registration
    pub resource_types: Vec<String>,

    /// Interfaces; empty means baseline only
    #[serde(default)]
    pub interfaces: Vec<String>,

    /// Interface used when a request does not select one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_interface: Option<String>,

    #[serde(default = "default_true")]
    pub discoverable: bool,

    #[serde(default = "default_true")]
    pub observable: bool,

    #[serde(default)]
    pub secure: bool,

    /// Initial attributes
    #[serde(default)]
    pub attributes: AttributeMap,

    #[serde(default)]
    pub auto_notify_policy: AutoNotifyPolicy,

    #[serde(default)]
    pub set_request_handler_policy: SetRequestHandlerPolicy,
}

impl ResourceConfig {
    /// Parse and validate a configuration from JSON.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: ResourceConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants a builder relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uri.is_empty() {
            return Err(ConfigError::Invalid("uri must not be empty".to_string()));
        }
        if self.resource_types.iter().all(|t| t.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "resource {} needs at least one resource type",
                self.uri
            )));
        }
        if let Some(default) = &self.default_interface {
            if !self.interfaces.contains(default) {
                return Err(ConfigError::Invalid(format!(
                    "default interface {} is not listed in interfaces",
                    default
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_config_defaults() {
        let config =
            ResourceConfig::from_json(r#"{"uri":"/a/light","resourceTypes":["oic.r.light"]}"#)
                .unwrap();

        assert_eq!(config.uri, "/a/light");
        assert!(config.interfaces.is_empty());
        assert!(config.discoverable);
        assert!(config.observable);
        assert!(!config.secure);
        assert!(config.attributes.is_empty());
        assert_eq!(config.auto_notify_policy, AutoNotifyPolicy::Updated);
        assert_eq!(config.set_request_handler_policy, SetRequestHandlerPolicy::Never);
    }

    #[test]
    fn test_full_config() {
        let json = r#"{
            "uri": "/a/temperature",
            "resourceTypes": ["oic.r.temperature", "core.sensor"],
            "interfaces": ["oic.if.baseline", "oic.if.s"],
            "defaultInterface": "oic.if.s",
            "observable": false,
            "attributes": {"Temperature": 21, "Unit": "C"},
            "autoNotifyPolicy": "always",
            "setRequestHandlerPolicy": "acceptance"
        }"#;

        let config = ResourceConfig::from_json(json).unwrap();
        assert_eq!(config.default_interface.as_deref(), Some("oic.if.s"));
        assert!(!config.observable);
        assert_eq!(
            config.attributes.get("Temperature"),
            Some(&AttributeValue::Int(21))
        );
        assert_eq!(config.auto_notify_policy, AutoNotifyPolicy::Always);
        assert_eq!(
            config.set_request_handler_policy,
            SetRequestHandlerPolicy::Acceptance
        );
    }

    #[test]
    fn test_rejects_unlisted_default_interface() {
        let json = r#"{
            "uri": "/a/light",
            "resourceTypes": ["oic.r.light"],
            "interfaces": ["oic.if.baseline"],
            "defaultInterface": "oic.if.a"
        }"#;

        let err = ResourceConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_empty_uri() {
        let err = ResourceConfig::from_json(r#"{"uri":"","resourceTypes":["t"]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = ResourceConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
