//! Resource model types shared by the server and platform adapters.
//!
//! These cover:
//! - Well-known interface names
//! - Observer notification and SET acceptance policies
//! - Resource property flags used at registration

use serde::{Deserialize, Serialize};

/// Baseline interface: full representation including metadata.
pub const BASELINE_INTERFACE: &str = "oic.if.baseline";

/// Actuator interface: attributes only, writable.
pub const ACTUATOR_INTERFACE: &str = "oic.if.a";

/// Sensor interface: attributes only, read-only.
pub const SENSOR_INTERFACE: &str = "oic.if.s";

/// Batch interface: own attributes plus every bound child resource.
pub const BATCH_INTERFACE: &str = "oic.if.b";

/// Query parameter that selects the interface of a request.
pub const INTERFACE_QUERY_KEY: &str = "if";

/// Status code reported when a handler does not choose one.
pub const DEFAULT_STATUS_CODE: u16 = 200;

/// Governs whether releasing a resource lock notifies observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoNotifyPolicy {
    /// Never notify automatically
    Never,
    /// Notify only when the attributes actually changed
    #[default]
    Updated,
    /// Notify on every release
    Always,
}

/// Governs whether SET requests may create attributes the resource lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetRequestHandlerPolicy {
    /// Reject requests that contain unknown keys
    #[default]
    Never,
    /// Accept unknown keys and create them
    Acceptance,
}

/// Decides which requested attribute writes a SET response commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptanceMethod {
    /// Follow the resource's [`SetRequestHandlerPolicy`]
    #[default]
    Default,
    /// Apply every requested key
    Accept,
    /// Apply nothing
    Ignore,
}

/// Property flags a resource is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceProperties {
    pub discoverable: bool,
    pub observable: bool,
    pub secure: bool,
}

impl Default for ResourceProperties {
    fn default() -> Self {
        Self {
            discoverable: true,
            observable: true,
            secure: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        assert_eq!(AutoNotifyPolicy::default(), AutoNotifyPolicy::Updated);
        assert_eq!(SetRequestHandlerPolicy::default(), SetRequestHandlerPolicy::Never);
        assert_eq!(AcceptanceMethod::default(), AcceptanceMethod::Default);
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&AutoNotifyPolicy::Always).unwrap();
        assert_eq!(json, "\"always\"");

        let policy: SetRequestHandlerPolicy = serde_json::from_str("\"acceptance\"").unwrap();
        assert_eq!(policy, SetRequestHandlerPolicy::Acceptance);
    }

    #[test]
    fn test_default_properties() {
        let props = ResourceProperties::default();
        assert!(props.discoverable);
        assert!(props.observable);
        assert!(!props.secure);
    }
}
