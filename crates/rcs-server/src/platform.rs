//! Registration and transport platform abstraction.
//!
//! Resource objects never talk to a network stack directly. Everything that
//! leaves the process (registration, interface/type binding, responses and
//! observer notification) goes through a [`Platform`] injected at build time.
//!
//! [`InMemoryPlatform`] is a complete in-process implementation: it keeps the
//! registry in memory, records what resources send, and can route requests
//! back into their entity handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rcs_core::ResourceProperties;
use rcs_protocol::{
    EntityHandlerResult, PlatformRequest, PlatformResponse, RequestHandle, ResourceHandle,
};
use thiserror::Error;
use tracing::debug;

use crate::error::ResourceError;

/// Callback the platform invokes for every request addressed to a resource.
///
/// An `Err` means the request was aborted while its response was being
/// prepared; no response has been sent for it.
pub type EntityHandler =
    Arc<dyn Fn(PlatformRequest) -> Result<EntityHandlerResult, ResourceError> + Send + Sync>;

/// Failures reported by the platform.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlatformError {
    #[error("Failed to register resource {uri}: {reason}")]
    Registration { uri: String, reason: String },

    #[error("Failed to bind {target} to {handle}: {reason}")]
    Bind {
        handle: ResourceHandle,
        target: String,
        reason: String,
    },

    #[error("Unknown resource handle {0}")]
    UnknownResource(ResourceHandle),

    #[error("Failed to send response for request {request}: {reason}")]
    Send { request: RequestHandle, reason: String },

    #[error("Failed to notify observers of {handle}: {reason}")]
    Notify { handle: ResourceHandle, reason: String },
}

/// Result of a notify call that reached the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Observers were notified
    Notified(usize),
    /// Nobody is observing; not an error
    NoObservers,
}

/// Services a resource object consumes from its hosting platform.
///
/// All methods are synchronous; sending is expected to be fire-and-forget.
pub trait Platform: Send + Sync {
    /// Register a resource and its entity handler, returning its handle.
    fn register_resource(
        &self,
        uri: &str,
        resource_type: &str,
        interface: &str,
        handler: EntityHandler,
        properties: ResourceProperties,
    ) -> Result<ResourceHandle, PlatformError>;

    /// Bind an additional interface to a registered resource.
    fn bind_interface(&self, handle: ResourceHandle, interface: &str) -> Result<(), PlatformError>;

    /// Bind an additional resource type to a registered resource.
    fn bind_type(&self, handle: ResourceHandle, resource_type: &str) -> Result<(), PlatformError>;

    /// Compose `child` under `parent`.
    fn bind_resource(
        &self,
        parent: ResourceHandle,
        child: ResourceHandle,
    ) -> Result<(), PlatformError>;

    /// Undo [`Platform::bind_resource`].
    fn unbind_resource(&self, parent: ResourceHandle, child: ResourceHandle)
        -> Result<(), PlatformError>;

    /// Remove a resource; its entity handler is no longer invoked afterwards.
    fn unregister_resource(&self, handle: ResourceHandle) -> Result<(), PlatformError>;

    /// Deliver a response to the client that issued the request.
    fn send_response(&self, response: PlatformResponse) -> Result<(), PlatformError>;

    /// Notify every observer of a resource.
    fn notify_all_observers(&self, handle: ResourceHandle) -> Result<NotifyOutcome, PlatformError>;
}

/// What the in-memory platform knows about a registered resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub uri: String,
    pub types: Vec<String>,
    pub interfaces: Vec<String>,
    pub properties: ResourceProperties,
    pub children: Vec<ResourceHandle>,
    pub observers: usize,
}

struct RegisteredResource {
    info: Registration,
    handler: EntityHandler,
}

/// In-process platform that keeps its registry in memory.
pub struct InMemoryPlatform {
    next_handle: AtomicU64,
    resources: Mutex<HashMap<ResourceHandle, RegisteredResource>>,
    responses: Mutex<Vec<PlatformResponse>>,
    notifications: Mutex<Vec<ResourceHandle>>,
    fail_sends: AtomicBool,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            resources: Mutex::new(HashMap::new()),
            responses: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Route a request to the entity handler registered for its handle.
    ///
    /// The registry lock is released before the handler runs, so handlers may
    /// call back into the platform.
    pub fn dispatch(&self, request: PlatformRequest) -> Result<EntityHandlerResult, ResourceError> {
        let handler = self
            .resources
            .lock()
            .get(&request.resource_handle)
            .map(|r| r.handler.clone())
            .ok_or(PlatformError::UnknownResource(request.resource_handle))?;

        debug!(
            "Dispatching {} {} to {}",
            request.method, request.uri, request.resource_handle
        );
        handler(request)
    }

    /// Snapshot of a registration, if the handle is registered.
    pub fn registration(&self, handle: ResourceHandle) -> Option<Registration> {
        self.resources.lock().get(&handle).map(|r| r.info.clone())
    }

    pub fn is_registered(&self, handle: ResourceHandle) -> bool {
        self.resources.lock().contains_key(&handle)
    }

    /// Look up a handle by URI.
    pub fn find_resource(&self, uri: &str) -> Option<ResourceHandle> {
        self.resources
            .lock()
            .iter()
            .find(|(_, r)| r.info.uri == uri)
            .map(|(h, _)| *h)
    }

    /// Record one more observer for a resource.
    pub fn add_observer(&self, handle: ResourceHandle) -> Result<(), PlatformError> {
        let mut resources = self.resources.lock();
        let resource = resources
            .get_mut(&handle)
            .ok_or(PlatformError::UnknownResource(handle))?;
        resource.info.observers += 1;
        Ok(())
    }

    /// All responses sent so far, oldest first.
    pub fn sent_responses(&self) -> Vec<PlatformResponse> {
        self.responses.lock().clone()
    }

    pub fn last_response(&self) -> Option<PlatformResponse> {
        self.responses.lock().last().cloned()
    }

    /// Number of notify calls made for a resource, with or without observers.
    pub fn notification_count(&self, handle: ResourceHandle) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|h| **h == handle)
            .count()
    }

    /// Make every subsequent send fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    fn with_resource<R>(
        &self,
        handle: ResourceHandle,
        f: impl FnOnce(&mut RegisteredResource) -> R,
    ) -> Result<R, PlatformError> {
        let mut resources = self.resources.lock();
        let resource = resources
            .get_mut(&handle)
            .ok_or(PlatformError::UnknownResource(handle))?;
        Ok(f(resource))
    }
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for InMemoryPlatform {
    fn register_resource(
        &self,
        uri: &str,
        resource_type: &str,
        interface: &str,
        handler: EntityHandler,
        properties: ResourceProperties,
    ) -> Result<ResourceHandle, PlatformError> {
        let mut resources = self.resources.lock();
        if resources.values().any(|r| r.info.uri == uri) {
            return Err(PlatformError::Registration {
                uri: uri.to_string(),
                reason: "uri already registered".to_string(),
            });
        }

        let handle = ResourceHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        resources.insert(
            handle,
            RegisteredResource {
                info: Registration {
                    uri: uri.to_string(),
                    types: vec![resource_type.to_string()],
                    interfaces: vec![interface.to_string()],
                    properties,
                    children: Vec::new(),
                    observers: 0,
                },
                handler,
            },
        );
        debug!("Registered {} as {}", uri, handle);
        Ok(handle)
    }

    fn bind_interface(&self, handle: ResourceHandle, interface: &str) -> Result<(), PlatformError> {
        self.with_resource(handle, |r| {
            if !r.info.interfaces.iter().any(|i| i == interface) {
                r.info.interfaces.push(interface.to_string());
            }
        })
    }

    fn bind_type(&self, handle: ResourceHandle, resource_type: &str) -> Result<(), PlatformError> {
        self.with_resource(handle, |r| {
            if !r.info.types.iter().any(|t| t == resource_type) {
                r.info.types.push(resource_type.to_string());
            }
        })
    }

    fn bind_resource(
        &self,
        parent: ResourceHandle,
        child: ResourceHandle,
    ) -> Result<(), PlatformError> {
        if !self.is_registered(child) {
            return Err(PlatformError::UnknownResource(child));
        }
        self.with_resource(parent, |r| {
            if r.info.children.contains(&child) {
                Err(PlatformError::Bind {
                    handle: parent,
                    target: child.to_string(),
                    reason: "already bound".to_string(),
                })
            } else {
                r.info.children.push(child);
                Ok(())
            }
        })?
    }

    fn unbind_resource(
        &self,
        parent: ResourceHandle,
        child: ResourceHandle,
    ) -> Result<(), PlatformError> {
        self.with_resource(parent, |r| r.info.children.retain(|c| *c != child))
    }

    fn unregister_resource(&self, handle: ResourceHandle) -> Result<(), PlatformError> {
        let mut resources = self.resources.lock();
        resources
            .remove(&handle)
            .ok_or(PlatformError::UnknownResource(handle))?;
        for resource in resources.values_mut() {
            resource.info.children.retain(|c| *c != handle);
        }
        debug!("Unregistered {}", handle);
        Ok(())
    }

    fn send_response(&self, response: PlatformResponse) -> Result<(), PlatformError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PlatformError::Send {
                request: response.request_handle,
                reason: "transport unavailable".to_string(),
            });
        }
        if !self.is_registered(response.resource_handle) {
            return Err(PlatformError::UnknownResource(response.resource_handle));
        }
        self.responses.lock().push(response);
        Ok(())
    }

    fn notify_all_observers(&self, handle: ResourceHandle) -> Result<NotifyOutcome, PlatformError> {
        let observers = self.with_resource(handle, |r| r.info.observers)?;
        self.notifications.lock().push(handle);

        if observers == 0 {
            Ok(NotifyOutcome::NoObservers)
        } else {
            Ok(NotifyOutcome::Notified(observers))
        }
    }
}
