//! Entry point for every request the platform delivers to a resource.
//!
//! ```text
//!   request ─► resolve resource ─► observe? ─► interface check ─► method
//!                                                         GET ─┤
//!                                                         SET ─┴─► Sent | Slow
//! ```
//!
//! Requests the resource cannot serve are answered with
//! [`EntityHandlerResult::Error`]. Failures while building or sending a
//! response are logged and returned as `Err`, leaving the request
//! unanswered.

use std::sync::Weak;

use rcs_core::AutoNotifyPolicy;
use rcs_protocol::{
    EntityHandlerResult, Method, PlatformRequest, PlatformResponse, RequestKind, Representation,
};
use tracing::{debug, error, trace, warn};

use crate::error::ResourceError;
use crate::interface::InterfaceHandler;
use crate::lock::LockGuard;
use crate::request::Request;
use crate::resource::ResourceObject;
use crate::response::{GetResponse, RequestHandler, SetResponse};

/// Classify and serve one platform request.
pub(crate) fn handle_request(
    resource: &Weak<ResourceObject>,
    platform_request: PlatformRequest,
) -> Result<EntityHandlerResult, ResourceError> {
    let Some(object) = resource.upgrade() else {
        warn!("Request for {} after its resource was destroyed", platform_request.uri);
        return Ok(EntityHandlerResult::Error);
    };

    if platform_request.kind == RequestKind::Observe {
        return Ok(if object.is_observable() {
            debug!("Observe accepted for {}", object.uri());
            EntityHandlerResult::Ok
        } else {
            warn!("Observe rejected, {} is not observable", object.uri());
            EntityHandlerResult::Error
        });
    }

    let request = Request::new(resource.clone(), platform_request);

    let interface = request.interface();
    if !interface.is_empty() && !object.has_interface(&interface) {
        warn!("{} has no interface {}", object.uri(), interface);
        return Ok(EntityHandlerResult::Error);
    }

    match request.method() {
        Some(Method::Get) => handle_get(&object, &request),
        Some(method) if method.is_update() => handle_set(&object, &request),
        _ => {
            let method = request
                .platform_request()
                .map(|r| r.method.as_str())
                .unwrap_or_default();
            warn!("Unsupported method {} for {}", method, object.uri());
            Ok(EntityHandlerResult::Error)
        }
    }
}

fn handle_get(
    object: &ResourceObject,
    request: &Request,
) -> Result<EntityHandlerResult, ResourceError> {
    let interface = object.interface_handler(&request.interface())?;
    if !interface.is_get_supported() {
        warn!("Interface {} of {} does not support GET", interface.name(), object.uri());
        return Ok(EntityHandlerResult::Error);
    }

    let attributes = logged(object, request.attributes())?;
    let response = match object.get_request_callback() {
        Some(callback) => callback(request, &attributes),
        None => GetResponse::default(),
    };

    let Some(handler) = response.handler() else {
        trace!("GET on {} deferred", object.uri());
        return Ok(EntityHandlerResult::Slow);
    };

    send_response(object, request, handler, interface, Method::Get)?;
    Ok(EntityHandlerResult::Ok)
}

fn handle_set(
    object: &ResourceObject,
    request: &Request,
) -> Result<EntityHandlerResult, ResourceError> {
    let interface = object.interface_handler(&request.interface())?;
    if !interface.is_set_supported() {
        warn!("Interface {} of {} does not support SET", interface.name(), object.uri());
        return Ok(EntityHandlerResult::Error);
    }

    let mut attributes = logged(object, request.attributes())?;
    let response = match object.set_request_callback() {
        Some(callback) => callback(request, &mut attributes),
        None => SetResponse::default(),
    };

    let Some(handler) = response.handler() else {
        trace!("SET on {} deferred", object.uri());
        return Ok(EntityHandlerResult::Slow);
    };

    let changed = {
        let _lock = LockGuard::with_policy(object, AutoNotifyPolicy::Never);
        let changes = logged(object, handler.apply_acceptance_method(object, &attributes))?;
        for change in &changes {
            if let Some(listener) = object.attribute_updated_listener(&change.key) {
                listener(&change.previous, &change.current);
            }
        }
        !changes.is_empty()
    };
    debug!("SET on {} changed attributes: {}", object.uri(), changed);

    logged(object, object.auto_notify(changed))?;
    send_response(object, request, handler.request_handler(), interface, Method::Post)?;
    Ok(EntityHandlerResult::Ok)
}

/// Build the representation for `request` and hand it to the platform.
///
/// `method` selects the interface's GET or SET builder; the handler's custom
/// attributes take precedence over both.
pub(crate) fn send_response(
    object: &ResourceObject,
    request: &Request,
    handler: &RequestHandler,
    interface: &InterfaceHandler,
    method: Method,
) -> Result<(), ResourceError> {
    let result = build_and_send(object, request, handler, interface, method);
    logged(object, result)
}

fn build_and_send(
    object: &ResourceObject,
    request: &Request,
    handler: &RequestHandler,
    interface: &InterfaceHandler,
    method: Method,
) -> Result<(), ResourceError> {
    let platform_request = request
        .platform_request()
        .ok_or_else(|| ResourceError::bad_request("incomplete request"))?;

    let representation: Representation = handler.build_representation(|| {
        if method.is_update() {
            interface.build_set_response(request, object)
        } else {
            interface.build_get_response(request, object)
        }
    })?;

    object.platform().send_response(PlatformResponse {
        request_handle: platform_request.request_handle,
        resource_handle: object.registered_handle()?,
        status_code: handler.status_code(),
        representation,
    })?;

    trace!(
        "Sent {} response for {} with status {}",
        method,
        object.uri(),
        handler.status_code()
    );
    Ok(())
}

fn logged<T>(
    object: &ResourceObject,
    result: Result<T, ResourceError>,
) -> Result<T, ResourceError> {
    result.map_err(|e| {
        error!("Failed to serve request for {}: {}", object.uri(), e);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::platform::InMemoryPlatform;
    use rcs_core::AttributeMap;
    use rcs_protocol::ResourceHandle;
    use std::sync::Arc;

    fn light(platform: &Arc<InMemoryPlatform>) -> Arc<ResourceObject> {
        let attributes: AttributeMap = [("power", false)].into_iter().collect();
        Builder::new("/a/light", "oic.r.light", "")
            .set_attributes(attributes)
            .build(platform.clone())
            .unwrap()
    }

    #[test]
    fn test_dropped_resource_is_error() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = light(&platform);
        let weak = Arc::downgrade(&resource);
        drop(resource);

        let result = handle_request(&weak, PlatformRequest::get(ResourceHandle(1), "/a/light"));
        assert_eq!(result.unwrap(), EntityHandlerResult::Error);
    }

    #[test]
    fn test_get_sends_baseline() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = light(&platform);
        let handle = resource.handle().unwrap();

        let result = platform.dispatch(PlatformRequest::get(handle, "/a/light")).unwrap();
        assert_eq!(result, EntityHandlerResult::Ok);

        let response = platform.last_response().unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.resource_handle, handle);
        assert_eq!(response.representation.uri, "/a/light");
        assert_eq!(response.representation.attributes.get("power"), Some(&false.into()));
    }

    #[test]
    fn test_delete_is_unsupported() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = light(&platform);
        let handle = resource.handle().unwrap();

        let request = PlatformRequest::new(handle, RequestKind::Request, "DELETE", "/a/light");
        assert_eq!(platform.dispatch(request).unwrap(), EntityHandlerResult::Error);
        assert!(platform.sent_responses().is_empty());
    }

    #[test]
    fn test_malformed_payload_propagates() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = light(&platform);
        let handle = resource.handle().unwrap();

        let result = platform.dispatch(PlatformRequest::post(handle, "/a/light", "[1, 2]"));
        assert!(matches!(result, Err(ResourceError::Codec(_))));
        assert!(platform.sent_responses().is_empty());
    }
}
