//! The resource object: attributes, lock, handlers and child resources.
//!
//! Every attribute access goes through the object's reentrant lock. Accessors
//! that take the lock themselves (`set_attribute`, `remove_attribute`, ...)
//! notify observers on their own; when they run inside a caller-held
//! [`LockGuard`], the outermost guard decides instead.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexSet;
use parking_lot::{Mutex, MutexGuard, RwLock};
use rcs_core::{
    AttributeMap, AttributeValue, AutoNotifyPolicy, ResourceProperties, SetRequestHandlerPolicy,
};
use rcs_protocol::ResourceHandle;
use tracing::{debug, info, warn};

use crate::error::ResourceError;
use crate::interface::InterfaceHandler;
use crate::lock::{LockGuard, ObjectLock, WeakGuard};
use crate::platform::{NotifyOutcome, Platform};
use crate::request::Request;
use crate::response::{GetResponse, SetResponse};

/// Custom GET handler: receives the request and its payload attributes.
pub type GetRequestCallback = Arc<dyn Fn(&Request, &AttributeMap) -> GetResponse + Send + Sync>;

/// Custom SET handler: may rewrite the requested attributes before they are
/// accepted.
pub type SetRequestCallback =
    Arc<dyn Fn(&Request, &mut AttributeMap) -> SetResponse + Send + Sync>;

/// Called with (previous, current) when a SET request changes an attribute.
pub type AttributeUpdatedListener =
    Arc<dyn Fn(&AttributeValue, &AttributeValue) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default)]
struct Policies {
    auto_notify: AutoNotifyPolicy,
    set_request_handler: SetRequestHandlerPolicy,
}

/// Static identity collected by the builder.
pub(crate) struct ResourceIdentity {
    pub(crate) uri: String,
    pub(crate) interfaces: IndexSet<String>,
    pub(crate) types: IndexSet<String>,
    pub(crate) default_interface: String,
    pub(crate) properties: ResourceProperties,
}

/// A registered resource whose attributes remote clients read and write.
///
/// Created with [`crate::Builder`]; unregistered from the platform when the
/// last `Arc` is dropped.
pub struct ResourceObject {
    platform: Arc<dyn Platform>,
    handle: OnceLock<ResourceHandle>,
    identity: ResourceIdentity,
    lock: ObjectLock,
    attributes: Mutex<AttributeMap>,
    policies: RwLock<Policies>,
    get_handler: Mutex<Option<GetRequestCallback>>,
    set_handler: Mutex<Option<SetRequestCallback>>,
    listeners: Mutex<HashMap<String, AttributeUpdatedListener>>,
    interface_handlers: HashMap<String, InterfaceHandler>,
    // Guards list membership only, not the children's own state
    children: Mutex<Vec<Arc<ResourceObject>>>,
}

impl ResourceObject {
    pub(crate) fn new(
        platform: Arc<dyn Platform>,
        identity: ResourceIdentity,
        attributes: AttributeMap,
        interface_handlers: HashMap<String, InterfaceHandler>,
        auto_notify: AutoNotifyPolicy,
        set_request_handler: SetRequestHandlerPolicy,
    ) -> Self {
        Self {
            platform,
            handle: OnceLock::new(),
            identity,
            lock: ObjectLock::new(),
            attributes: Mutex::new(attributes),
            policies: RwLock::new(Policies {
                auto_notify,
                set_request_handler,
            }),
            get_handler: Mutex::new(None),
            set_handler: Mutex::new(None),
            listeners: Mutex::new(HashMap::new()),
            interface_handlers,
            children: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_handle(&self, handle: ResourceHandle) {
        if let Err(rejected) = self.handle.set(handle) {
            warn!(
                "{} is already registered as {}; ignoring {}",
                self.identity.uri,
                self.handle().map(|h| h.to_string()).unwrap_or_default(),
                rejected
            );
        }
    }

    /// Platform handle, once registration succeeded.
    pub fn handle(&self) -> Option<ResourceHandle> {
        self.handle.get().copied()
    }

    pub(crate) fn registered_handle(&self) -> Result<ResourceHandle, ResourceError> {
        self.handle()
            .ok_or_else(|| ResourceError::invalid(format!("{} is not registered", self.uri())))
    }

    pub(crate) fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub(crate) fn object_lock(&self) -> &ObjectLock {
        &self.lock
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    pub fn uri(&self) -> &str {
        &self.identity.uri
    }

    /// Interfaces in registration order; always contains baseline.
    pub fn interfaces(&self) -> Vec<String> {
        self.identity.interfaces.iter().cloned().collect()
    }

    pub fn types(&self) -> Vec<String> {
        self.identity.types.iter().cloned().collect()
    }

    pub fn default_interface(&self) -> &str {
        &self.identity.default_interface
    }

    pub fn has_interface(&self, interface: &str) -> bool {
        self.identity.interfaces.contains(interface)
    }

    pub fn is_observable(&self) -> bool {
        self.identity.properties.observable
    }

    pub fn is_discoverable(&self) -> bool {
        self.identity.properties.discoverable
    }

    pub fn is_secure(&self) -> bool {
        self.identity.properties.secure
    }

    /// Handler for `interface`; "" selects the default interface.
    pub(crate) fn interface_handler(
        &self,
        interface: &str,
    ) -> Result<&InterfaceHandler, ResourceError> {
        let name = if interface.is_empty() {
            self.default_interface()
        } else {
            interface
        };
        // Builder registers a handler for every interface, so a miss is a bug
        self.interface_handlers.get(name).ok_or_else(|| {
            ResourceError::invalid(format!("{} has no handler for interface {}", self.uri(), name))
        })
    }

    // ------------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------------

    /// Set one attribute.
    ///
    /// When this call takes the lock itself, observers are notified per the
    /// auto-notify policy using whether this key's value changed. Inside a
    /// caller-held guard it only mutates.
    pub fn set_attribute(
        &self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<(), ResourceError> {
        let key = key.into();
        let value = value.into();

        let notify_with = {
            let guard = WeakGuard::new(self);
            let mut attributes = self.lock_attributes()?;
            let changed = attributes.would_change(&key, &value);
            attributes.set(key, value);
            guard.has_locked().then_some(changed)
        };

        match notify_with {
            Some(changed) => self.auto_notify(changed),
            None => Ok(()),
        }
    }

    /// Remove one attribute, returning whether it existed.
    pub fn remove_attribute(&self, key: &str) -> Result<bool, ResourceError> {
        let (erased, notify) = {
            let guard = WeakGuard::new(self);
            let erased = self.lock_attributes()?.remove(key).is_some();
            (erased, erased && guard.has_locked())
        };

        if notify {
            self.auto_notify(true)?;
        }
        Ok(erased)
    }

    pub fn contains_attribute(&self, key: &str) -> Result<bool, ResourceError> {
        let _guard = WeakGuard::new(self);
        let attributes = self.lock_attributes()?;
        Ok(attributes.contains(key))
    }

    /// Copy of one attribute value.
    pub fn get_attribute_value(&self, key: &str) -> Result<Option<AttributeValue>, ResourceError> {
        let _guard = WeakGuard::new(self);
        let attributes = self.lock_attributes()?;
        Ok(attributes.get(key).cloned())
    }

    /// Read the whole attribute map.
    ///
    /// The calling thread must hold the lock (via [`LockGuard`] or
    /// [`WeakGuard`]), otherwise this fails with [`ResourceError::NoLock`].
    /// Attribute accessors called from inside `f` fail with
    /// [`ResourceError::ReentrantAccess`].
    pub fn with_attributes<R>(
        &self,
        f: impl FnOnce(&AttributeMap) -> R,
    ) -> Result<R, ResourceError> {
        self.expect_lock_held()?;
        let attributes = self.lock_attributes()?;
        Ok(f(&attributes))
    }

    /// Mutate the whole attribute map; same rules as [`Self::with_attributes`].
    pub fn with_attributes_mut<R>(
        &self,
        f: impl FnOnce(&mut AttributeMap) -> R,
    ) -> Result<R, ResourceError> {
        self.expect_lock_held()?;
        let mut attributes = self.lock_attributes()?;
        Ok(f(&mut attributes))
    }

    fn expect_lock_held(&self) -> Result<(), ResourceError> {
        if self.lock.is_held_by_current_thread() {
            Ok(())
        } else {
            Err(ResourceError::NoLock)
        }
    }

    // Only the thread owning the object lock takes this mutex, so finding it
    // taken means that thread is inside a `with_attributes` closure
    fn lock_attributes(&self) -> Result<MutexGuard<'_, AttributeMap>, ResourceError> {
        self.attributes
            .try_lock()
            .ok_or(ResourceError::ReentrantAccess)
    }

    pub(crate) fn snapshot_attributes(&self) -> AttributeMap {
        self.attributes.lock().clone()
    }

    pub(crate) fn attributes_differ(&self, snapshot: &AttributeMap) -> bool {
        *self.attributes.lock() != *snapshot
    }

    // ------------------------------------------------------------------------
    // Notification
    // ------------------------------------------------------------------------

    /// Notify all observers now. Having no observers is not an error.
    pub fn notify(&self) -> Result<(), ResourceError> {
        let handle = self.registered_handle()?;
        match self.platform.notify_all_observers(handle)? {
            NotifyOutcome::Notified(count) => {
                debug!("Notified {} observers of {}", count, self.uri())
            }
            NotifyOutcome::NoObservers => debug!("No observers of {}", self.uri()),
        }
        Ok(())
    }

    /// Notify if the configured policy asks for it given `changed`.
    pub(crate) fn auto_notify(&self, changed: bool) -> Result<(), ResourceError> {
        match self.auto_notify_policy() {
            AutoNotifyPolicy::Never => Ok(()),
            AutoNotifyPolicy::Updated if !changed => Ok(()),
            _ => self.notify(),
        }
    }

    pub fn auto_notify_policy(&self) -> AutoNotifyPolicy {
        self.policies.read().auto_notify
    }

    pub fn set_auto_notify_policy(&self, policy: AutoNotifyPolicy) {
        self.policies.write().auto_notify = policy;
    }

    pub fn set_request_handler_policy(&self) -> SetRequestHandlerPolicy {
        self.policies.read().set_request_handler
    }

    pub fn set_set_request_handler_policy(&self, policy: SetRequestHandlerPolicy) {
        self.policies.write().set_request_handler = policy;
    }

    // ------------------------------------------------------------------------
    // Handlers and listeners
    // ------------------------------------------------------------------------

    pub fn set_get_request_handler(
        &self,
        handler: impl Fn(&Request, &AttributeMap) -> GetResponse + Send + Sync + 'static,
    ) {
        let _guard = WeakGuard::new(self);
        *self.get_handler.lock() = Some(Arc::new(handler));
    }

    pub fn set_set_request_handler(
        &self,
        handler: impl Fn(&Request, &mut AttributeMap) -> SetResponse + Send + Sync + 'static,
    ) {
        let _guard = WeakGuard::new(self);
        *self.set_handler.lock() = Some(Arc::new(handler));
    }

    /// Listen for SET-driven changes of `key`; replaces any previous listener.
    pub fn add_attribute_updated_listener(
        &self,
        key: impl Into<String>,
        listener: impl Fn(&AttributeValue, &AttributeValue) + Send + Sync + 'static,
    ) {
        let _guard = WeakGuard::new(self);
        self.listeners.lock().insert(key.into(), Arc::new(listener));
    }

    pub fn remove_attribute_updated_listener(&self, key: &str) -> bool {
        let _guard = WeakGuard::new(self);
        self.listeners.lock().remove(key).is_some()
    }

    pub(crate) fn get_request_callback(&self) -> Option<GetRequestCallback> {
        self.get_handler.lock().clone()
    }

    pub(crate) fn set_request_callback(&self) -> Option<SetRequestCallback> {
        self.set_handler.lock().clone()
    }

    pub(crate) fn attribute_updated_listener(&self, key: &str) -> Option<AttributeUpdatedListener> {
        self.listeners.lock().get(key).cloned()
    }

    // ------------------------------------------------------------------------
    // Bound resources
    // ------------------------------------------------------------------------

    /// Compose `child` under this resource (used by the batch interface).
    pub fn bind_resource(&self, child: &Arc<ResourceObject>) -> Result<(), ResourceError> {
        if std::ptr::eq(self, Arc::as_ptr(child)) {
            return Err(ResourceError::invalid("a resource cannot be bound to itself"));
        }

        let mut children = self.children.lock();
        if children.iter().any(|c| Arc::ptr_eq(c, child)) {
            return Err(ResourceError::invalid(format!(
                "{} is already bound to {}",
                child.uri(),
                self.uri()
            )));
        }

        self.platform
            .bind_resource(self.registered_handle()?, child.registered_handle()?)?;
        children.push(child.clone());
        debug!("Bound {} to {}", child.uri(), self.uri());
        Ok(())
    }

    pub fn unbind_resource(&self, child: &Arc<ResourceObject>) -> Result<(), ResourceError> {
        let mut children = self.children.lock();
        let Some(pos) = children.iter().position(|c| Arc::ptr_eq(c, child)) else {
            return Err(ResourceError::invalid(format!(
                "{} is not bound to {}",
                child.uri(),
                self.uri()
            )));
        };

        self.platform
            .unbind_resource(self.registered_handle()?, child.registered_handle()?)?;
        children.remove(pos);
        debug!("Unbound {} from {}", child.uri(), self.uri());
        Ok(())
    }

    /// Snapshot of the bound children, in binding order.
    pub fn bound_resources(&self) -> Vec<Arc<ResourceObject>> {
        self.children.lock().clone()
    }
}

impl fmt::Debug for ResourceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceObject")
            .field("uri", &self.identity.uri)
            .field("handle", &self.handle())
            .field("interfaces", &self.identity.interfaces)
            .field("types", &self.identity.types)
            .field("default_interface", &self.identity.default_interface)
            .finish_non_exhaustive()
    }
}

impl Drop for ResourceObject {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get() {
            match self.platform.unregister_resource(*handle) {
                Ok(()) => info!("Unregistered resource {} ({})", self.identity.uri, handle),
                Err(e) => warn!("Failed to unregister {}: {}", self.identity.uri, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::platform::InMemoryPlatform;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn temperature_sensor(platform: &Arc<InMemoryPlatform>) -> Arc<ResourceObject> {
        let mut attrs = AttributeMap::new();
        attrs.set("Temperature", 21);
        Builder::new("/a/temperature", "oic.r.temperature", "")
            .set_attributes(attrs)
            .build(platform.clone())
            .unwrap()
    }

    fn notifications(platform: &InMemoryPlatform, resource: &ResourceObject) -> usize {
        platform.notification_count(resource.handle().unwrap())
    }

    #[test]
    fn test_set_attribute_notifies_only_on_change() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);

        resource.set_attribute("Temperature", 21).unwrap();
        assert_eq!(notifications(&platform, &resource), 0);

        resource.set_attribute("Temperature", 25).unwrap();
        assert_eq!(notifications(&platform, &resource), 1);
        assert_eq!(resource.get_attribute_value("Temperature").unwrap(), Some(25.into()));

        resource.set_attribute("Humidity", 40).unwrap();
        assert_eq!(notifications(&platform, &resource), 2);
    }

    #[test]
    fn test_always_policy_notifies_unchanged_set() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);
        resource.set_auto_notify_policy(AutoNotifyPolicy::Always);

        resource.set_attribute("Temperature", 21).unwrap();
        assert_eq!(notifications(&platform, &resource), 1);
    }

    #[test]
    fn test_never_policy_is_silent() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);
        resource.set_auto_notify_policy(AutoNotifyPolicy::Never);

        resource.set_attribute("Temperature", 30).unwrap();
        assert!(resource.remove_attribute("Temperature").unwrap());
        assert_eq!(notifications(&platform, &resource), 0);
    }

    #[test]
    fn test_remove_attribute() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);

        assert!(!resource.remove_attribute("Missing").unwrap());
        assert_eq!(notifications(&platform, &resource), 0);

        assert!(resource.remove_attribute("Temperature").unwrap());
        assert!(!resource.contains_attribute("Temperature").unwrap());
        assert_eq!(notifications(&platform, &resource), 1);
    }

    #[test]
    fn test_unguarded_attribute_access_fails() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);

        assert!(matches!(resource.with_attributes(|a| a.len()), Err(ResourceError::NoLock)));
        assert!(matches!(
            resource.with_attributes_mut(|a| a.set("x", 1)),
            Err(ResourceError::NoLock)
        ));

        let _lock = LockGuard::new(&resource);
        assert_eq!(resource.with_attributes(|a| a.len()).unwrap(), 1);
    }

    #[test]
    fn test_accessor_inside_attribute_closure_fails() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);
        let _lock = LockGuard::with_policy(&resource, AutoNotifyPolicy::Never);

        let nested = resource
            .with_attributes(|_| resource.get_attribute_value("Temperature"))
            .unwrap();
        assert!(matches!(nested, Err(ResourceError::ReentrantAccess)));

        let nested = resource
            .with_attributes_mut(|_| resource.set_attribute("Temperature", 1))
            .unwrap();
        assert!(matches!(nested, Err(ResourceError::ReentrantAccess)));

        let nested = resource.with_attributes(|_| resource.with_attributes(|a| a.len())).unwrap();
        assert!(matches!(nested, Err(ResourceError::ReentrantAccess)));

        assert_eq!(resource.get_attribute_value("Temperature").unwrap(), Some(21.into()));
    }

    #[test]
    fn test_second_handle_is_ignored() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);
        let handle = resource.handle().unwrap();

        resource.set_handle(ResourceHandle(handle.0 + 1000));
        assert_eq!(resource.handle(), Some(handle));
    }

    #[test]
    fn test_guard_from_other_thread_does_not_grant_access() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);
        let (locked_tx, locked_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let holder = {
            let resource = resource.clone();
            thread::spawn(move || {
                let _lock = LockGuard::with_policy(&resource, AutoNotifyPolicy::Never);
                locked_tx.send(()).unwrap();
                done_rx.recv().unwrap();
            })
        };

        locked_rx.recv().unwrap();
        assert!(matches!(resource.with_attributes(|a| a.len()), Err(ResourceError::NoLock)));
        done_tx.send(()).unwrap();
        holder.join().unwrap();
    }

    #[test]
    fn test_set_attribute_blocks_while_other_thread_holds_lock() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);
        let (locked_tx, locked_rx) = mpsc::channel();

        let writer = {
            let resource = resource.clone();
            thread::spawn(move || {
                locked_rx.recv().unwrap();
                resource.set_attribute("Temperature", 99).unwrap();
            })
        };

        {
            let _lock = LockGuard::with_policy(&resource, AutoNotifyPolicy::Never);
            locked_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(50));
            assert_eq!(
                resource.with_attributes(|a| a.get("Temperature").cloned()).unwrap(),
                Some(21.into())
            );
        }

        writer.join().unwrap();
        assert_eq!(resource.get_attribute_value("Temperature").unwrap(), Some(99.into()));
    }

    #[test]
    fn test_bind_self_rejected() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);

        let err = resource.bind_resource(&resource).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidParameter(_)));
    }

    #[test]
    fn test_bind_and_unbind_children() {
        let platform = Arc::new(InMemoryPlatform::new());
        let parent = Builder::new("/a/room", "oic.r.room", "").build(platform.clone()).unwrap();
        let child = temperature_sensor(&platform);

        parent.bind_resource(&child).unwrap();
        assert!(parent.bind_resource(&child).is_err());
        assert_eq!(parent.bound_resources().len(), 1);
        assert_eq!(
            platform.registration(parent.handle().unwrap()).unwrap().children,
            vec![child.handle().unwrap()]
        );

        parent.unbind_resource(&child).unwrap();
        assert!(parent.bound_resources().is_empty());
        assert!(parent.unbind_resource(&child).is_err());
    }

    #[test]
    fn test_listener_replacement_and_removal() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);

        resource.add_attribute_updated_listener("Temperature", |_, _| {});
        resource.add_attribute_updated_listener("Temperature", |_, _| {});
        assert!(resource.attribute_updated_listener("Temperature").is_some());

        assert!(resource.remove_attribute_updated_listener("Temperature"));
        assert!(!resource.remove_attribute_updated_listener("Temperature"));
    }

    #[test]
    fn test_drop_unregisters() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = temperature_sensor(&platform);
        let handle = resource.handle().unwrap();
        assert!(platform.is_registered(handle));

        drop(resource);
        assert!(!platform.is_registered(handle));
    }
}
