//! Requests as seen by resource handlers.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use rcs_core::AttributeMap;
use rcs_protocol::{decode_attributes, Method, PlatformRequest};

use crate::error::ResourceError;
use crate::resource::ResourceObject;

/// A client request addressed to a resource object.
///
/// Holds only a weak reference to the resource: a request may outlive the
/// object it targets (see [`crate::SeparateResponse`]).
#[derive(Debug, Clone)]
pub struct Request {
    uri: String,
    resource: Weak<ResourceObject>,
    platform_request: Option<PlatformRequest>,
}

impl Request {
    pub(crate) fn new(resource: Weak<ResourceObject>, platform_request: PlatformRequest) -> Self {
        Self {
            uri: platform_request.uri.clone(),
            resource,
            platform_request: Some(platform_request),
        }
    }

    /// A request that names a URI but is bound to no platform request or
    /// resource. It cannot be answered.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            resource: Weak::new(),
            platform_request: None,
        }
    }

    pub fn resource_uri(&self) -> &str {
        &self.uri
    }

    /// The target resource, unless it has been destroyed.
    pub fn resource_object(&self) -> Option<Arc<ResourceObject>> {
        self.resource.upgrade()
    }

    pub fn platform_request(&self) -> Option<&PlatformRequest> {
        self.platform_request.as_ref()
    }

    /// Whether both the platform request and the target resource are present.
    pub fn is_complete(&self) -> bool {
        self.platform_request.is_some() && self.resource.strong_count() > 0
    }

    pub fn query_params(&self) -> HashMap<String, String> {
        self.platform_request
            .as_ref()
            .map(PlatformRequest::query_params)
            .unwrap_or_default()
    }

    /// Selected interface, or "" to use the resource's default.
    pub fn interface(&self) -> String {
        self.platform_request
            .as_ref()
            .map(PlatformRequest::interface)
            .unwrap_or_default()
    }

    pub fn method(&self) -> Option<Method> {
        self.platform_request
            .as_ref()
            .and_then(|r| Method::parse(&r.method))
    }

    /// Attributes carried in the request payload.
    pub fn attributes(&self) -> Result<AttributeMap, ResourceError> {
        match self.platform_request.as_ref().and_then(|r| r.payload.as_deref()) {
            Some(payload) => Ok(decode_attributes(payload)?),
            None => Ok(AttributeMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcs_protocol::ResourceHandle;

    #[test]
    fn test_detached_request_is_incomplete() {
        let req = Request::from_uri("/a/light");
        assert_eq!(req.resource_uri(), "/a/light");
        assert!(!req.is_complete());
        assert!(req.resource_object().is_none());
        assert_eq!(req.interface(), "");
        assert!(req.method().is_none());
        assert!(req.attributes().unwrap().is_empty());
    }

    #[test]
    fn test_payload_attributes() {
        let platform_request =
            PlatformRequest::post(ResourceHandle(1), "/a/light", r#"{"power":true}"#)
                .with_query("if=oic.if.a");
        let req = Request::new(Weak::new(), platform_request);

        assert_eq!(req.interface(), "oic.if.a");
        assert_eq!(req.method(), Some(Method::Post));
        assert_eq!(req.attributes().unwrap().len(), 1);
        // no live resource behind it
        assert!(!req.is_complete());
    }

    #[test]
    fn test_malformed_payload() {
        let platform_request = PlatformRequest::post(ResourceHandle(1), "/a/light", "42");
        let req = Request::new(Weak::new(), platform_request);
        assert!(matches!(req.attributes(), Err(ResourceError::Codec(_))));
    }
}
