//! Interface handlers: how each interface renders GET and SET responses.
//!
//! Built-in interfaces:
//! - baseline: URI, interfaces, types and every attribute (GET and SET)
//! - actuator: attributes only; SET echoes the applicable requested keys
//! - sensor: attributes only; read-only
//! - batch: own attributes plus the baseline view of every bound child

use std::fmt;
use std::sync::Arc;

use rcs_core::{
    AttributeMap, AutoNotifyPolicy, ACTUATOR_INTERFACE, BASELINE_INTERFACE, BATCH_INTERFACE,
    SENSOR_INTERFACE,
};
use rcs_protocol::Representation;

use crate::error::ResourceError;
use crate::lock::LockGuard;
use crate::request::Request;
use crate::resource::ResourceObject;

/// Renders a representation of `resource` for `request`.
pub type RepresentationBuilder =
    Arc<dyn Fn(&Request, &ResourceObject) -> Result<Representation, ResourceError> + Send + Sync>;

/// A named pair of optional GET and SET representation builders.
#[derive(Clone)]
pub struct InterfaceHandler {
    name: String,
    get_builder: Option<RepresentationBuilder>,
    set_builder: Option<RepresentationBuilder>,
}

impl InterfaceHandler {
    pub fn new(
        name: impl Into<String>,
        get_builder: Option<RepresentationBuilder>,
        set_builder: Option<RepresentationBuilder>,
    ) -> Self {
        Self {
            name: name.into(),
            get_builder,
            set_builder,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_get_supported(&self) -> bool {
        self.get_builder.is_some()
    }

    pub fn is_set_supported(&self) -> bool {
        self.set_builder.is_some()
    }

    pub fn build_get_response(
        &self,
        request: &Request,
        resource: &ResourceObject,
    ) -> Result<Representation, ResourceError> {
        let builder = self.get_builder.as_ref().ok_or_else(|| {
            ResourceError::bad_request(format!("interface {} does not support GET", self.name))
        })?;
        builder(request, resource)
    }

    pub fn build_set_response(
        &self,
        request: &Request,
        resource: &ResourceObject,
    ) -> Result<Representation, ResourceError> {
        let builder = self.set_builder.as_ref().ok_or_else(|| {
            ResourceError::bad_request(format!("interface {} does not support SET", self.name))
        })?;
        builder(request, resource)
    }
}

impl fmt::Debug for InterfaceHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceHandler")
            .field("name", &self.name)
            .field("get", &self.is_get_supported())
            .field("set", &self.is_set_supported())
            .finish()
    }
}

/// Resolve the handler for an interface name.
///
/// Exact built-in match first, then the default interface's built-in, then
/// baseline.
pub fn default_interface_handler(name: &str, default_interface: &str) -> InterfaceHandler {
    builtin_handler(name)
        .or_else(|| builtin_handler(default_interface))
        .map(|handler| InterfaceHandler { name: name.to_string(), ..handler })
        .unwrap_or_else(|| baseline_handler(name))
}

fn builtin_handler(name: &str) -> Option<InterfaceHandler> {
    match name {
        BASELINE_INTERFACE => Some(baseline_handler(name)),
        ACTUATOR_INTERFACE => Some(InterfaceHandler::new(
            name,
            Some(Arc::new(build_attributes_only)),
            Some(Arc::new(build_actuator_set)),
        )),
        SENSOR_INTERFACE => Some(InterfaceHandler::new(
            name,
            Some(Arc::new(build_attributes_only)),
            None,
        )),
        BATCH_INTERFACE => Some(InterfaceHandler::new(
            name,
            Some(Arc::new(build_batch_get)),
            Some(Arc::new(build_baseline)),
        )),
        _ => None,
    }
}

fn baseline_handler(name: &str) -> InterfaceHandler {
    InterfaceHandler::new(
        name,
        Some(Arc::new(build_baseline)),
        Some(Arc::new(build_baseline)),
    )
}

/// Full representation of a resource, read without notifying.
pub(crate) fn build_baseline(
    _request: &Request,
    resource: &ResourceObject,
) -> Result<Representation, ResourceError> {
    let _lock = LockGuard::with_policy(resource, AutoNotifyPolicy::Never);
    let attributes = resource.with_attributes(AttributeMap::clone)?;

    Ok(Representation {
        uri: resource.uri().to_string(),
        interfaces: resource.interfaces(),
        types: resource.types(),
        attributes,
        children: Vec::new(),
    })
}

fn build_attributes_only(
    _request: &Request,
    resource: &ResourceObject,
) -> Result<Representation, ResourceError> {
    let _lock = LockGuard::with_policy(resource, AutoNotifyPolicy::Never);
    let attributes = resource.with_attributes(AttributeMap::clone)?;
    Ok(Representation::with_attributes(attributes))
}

fn build_actuator_set(
    request: &Request,
    resource: &ResourceObject,
) -> Result<Representation, ResourceError> {
    let requested = request.attributes()?;

    let _lock = LockGuard::with_policy(resource, AutoNotifyPolicy::Never);
    let applicable = resource.with_attributes(|attributes| {
        requested
            .into_iter()
            .filter(|(key, _)| attributes.contains(key))
            .collect::<AttributeMap>()
    })?;

    Ok(Representation::with_attributes(applicable))
}

fn build_batch_get(
    request: &Request,
    resource: &ResourceObject,
) -> Result<Representation, ResourceError> {
    let mut rep = {
        let _lock = LockGuard::with_policy(resource, AutoNotifyPolicy::Never);
        let attributes = resource.with_attributes(AttributeMap::clone)?;
        Representation {
            uri: resource.uri().to_string(),
            attributes,
            ..Default::default()
        }
    };

    // Each child is read under its own lock, after the parent's is released
    for child in resource.bound_resources() {
        rep.children.push(build_baseline(request, &child)?);
    }

    Ok(rep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_capabilities() {
        let baseline = default_interface_handler(BASELINE_INTERFACE, BASELINE_INTERFACE);
        assert!(baseline.is_get_supported() && baseline.is_set_supported());

        let actuator = default_interface_handler(ACTUATOR_INTERFACE, BASELINE_INTERFACE);
        assert!(actuator.is_get_supported() && actuator.is_set_supported());

        let sensor = default_interface_handler(SENSOR_INTERFACE, BASELINE_INTERFACE);
        assert!(sensor.is_get_supported());
        assert!(!sensor.is_set_supported());

        let batch = default_interface_handler(BATCH_INTERFACE, BASELINE_INTERFACE);
        assert!(batch.is_get_supported() && batch.is_set_supported());
    }

    #[test]
    fn test_unknown_interface_falls_back_to_default() {
        let handler = default_interface_handler("x.custom", SENSOR_INTERFACE);
        assert_eq!(handler.name(), "x.custom");
        assert!(!handler.is_set_supported());
    }

    #[test]
    fn test_unknown_interface_falls_back_to_baseline() {
        let handler = default_interface_handler("x.custom", "x.other");
        assert_eq!(handler.name(), "x.custom");
        assert!(handler.is_get_supported() && handler.is_set_supported());
    }

    #[test]
    fn test_missing_builder_is_bad_request() {
        let platform = Arc::new(crate::platform::InMemoryPlatform::new());
        let resource = crate::Builder::new("/a/x", "t", "").build(platform).unwrap();
        let handler = InterfaceHandler::new("x.none", None, None);
        let request = Request::from_uri("/a/x");

        let err = handler.build_get_response(&request, &resource).unwrap_err();
        assert!(matches!(err, ResourceError::BadRequest(_)));
        let err = handler.build_set_response(&request, &resource).unwrap_err();
        assert!(matches!(err, ResourceError::BadRequest(_)));
    }
}
