//! Fluent construction of resource objects.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;
use rcs_core::{
    AttributeMap, AutoNotifyPolicy, ResourceConfig, ResourceProperties, SetRequestHandlerPolicy,
    BASELINE_INTERFACE,
};
use tracing::info;

use crate::dispatcher;
use crate::error::ResourceError;
use crate::interface::{default_interface_handler, InterfaceHandler};
use crate::platform::{EntityHandler, Platform};
use crate::resource::{ResourceIdentity, ResourceObject};

/// Collects a resource's static identity, then registers it.
///
/// # Example
/// ```ignore
/// let light = Builder::new("/a/light", "oic.r.light", "oic.if.baseline")
///     .add_interface("oic.if.a")
///     .set_default_interface("oic.if.a")?
///     .set_attributes(attrs)
///     .build(platform)?;
/// ```
#[derive(Debug)]
pub struct Builder {
    uri: String,
    types: IndexSet<String>,
    interfaces: IndexSet<String>,
    default_interface: String,
    properties: ResourceProperties,
    attributes: AttributeMap,
    auto_notify_policy: AutoNotifyPolicy,
    set_request_handler_policy: SetRequestHandlerPolicy,
    custom_handlers: HashMap<String, InterfaceHandler>,
}

impl Builder {
    /// Start a builder; an empty `interface` means baseline.
    pub fn new(
        uri: impl Into<String>,
        resource_type: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        let mut interface = interface.into();
        if interface.is_empty() {
            interface = BASELINE_INTERFACE.to_string();
        }

        let mut types = IndexSet::new();
        let resource_type = resource_type.into();
        if !resource_type.is_empty() {
            types.insert(resource_type);
        }

        let mut interfaces = IndexSet::new();
        interfaces.insert(interface.clone());

        Self {
            uri: uri.into(),
            types,
            interfaces,
            default_interface: interface,
            properties: ResourceProperties::default(),
            attributes: AttributeMap::new(),
            auto_notify_policy: AutoNotifyPolicy::default(),
            set_request_handler_policy: SetRequestHandlerPolicy::default(),
            custom_handlers: HashMap::new(),
        }
    }

    /// Builder pre-populated from a declarative configuration.
    pub fn from_config(config: &ResourceConfig) -> Result<Self, ResourceError> {
        config
            .validate()
            .map_err(|e| ResourceError::invalid(e.to_string()))?;

        let mut types = config.resource_types.iter().filter(|t| !t.is_empty());
        let first_type = types.next().cloned().unwrap_or_default();
        let mut interfaces = config.interfaces.iter();
        let first_interface = interfaces.next().cloned().unwrap_or_default();

        let mut builder = Builder::new(config.uri.clone(), first_type, first_interface);
        for resource_type in types {
            builder = builder.add_type(resource_type.clone());
        }
        for interface in interfaces {
            builder = builder.add_interface(interface.clone());
        }
        if let Some(default) = &config.default_interface {
            builder = builder.set_default_interface(default.clone())?;
        }

        Ok(builder
            .set_discoverable(config.discoverable)
            .set_observable(config.observable)
            .set_secure_flag(config.secure)
            .set_attributes(config.attributes.clone())
            .set_auto_notify_policy(config.auto_notify_policy)
            .set_set_request_handler_policy(config.set_request_handler_policy))
    }

    /// Add an interface; empty or duplicate names are ignored.
    pub fn add_interface(mut self, interface: impl Into<String>) -> Self {
        let interface = interface.into();
        if !interface.is_empty() {
            self.interfaces.insert(interface);
        }
        self
    }

    /// Add a resource type; empty or duplicate names are ignored.
    pub fn add_type(mut self, resource_type: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        if !resource_type.is_empty() {
            self.types.insert(resource_type);
        }
        self
    }

    /// Select the default interface; it must have been added already.
    pub fn set_default_interface(
        mut self,
        interface: impl Into<String>,
    ) -> Result<Self, ResourceError> {
        let interface = interface.into();
        if !self.interfaces.contains(&interface) {
            return Err(ResourceError::invalid(format!(
                "{} is not an interface of {}",
                interface, self.uri
            )));
        }
        self.default_interface = interface;
        Ok(self)
    }

    pub fn default_interface(&self) -> &str {
        &self.default_interface
    }

    pub fn set_discoverable(mut self, discoverable: bool) -> Self {
        self.properties.discoverable = discoverable;
        self
    }

    pub fn set_observable(mut self, observable: bool) -> Self {
        self.properties.observable = observable;
        self
    }

    pub fn set_secure_flag(mut self, secure: bool) -> Self {
        self.properties.secure = secure;
        self
    }

    /// Initial attributes of the resource.
    pub fn set_attributes(mut self, attributes: AttributeMap) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn set_auto_notify_policy(mut self, policy: AutoNotifyPolicy) -> Self {
        self.auto_notify_policy = policy;
        self
    }

    pub fn set_set_request_handler_policy(mut self, policy: SetRequestHandlerPolicy) -> Self {
        self.set_request_handler_policy = policy;
        self
    }

    /// Use a custom handler for `name`, adding the interface if needed.
    pub fn set_interface_handler(
        mut self,
        name: impl Into<String>,
        handler: InterfaceHandler,
    ) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.interfaces.insert(name.clone());
            self.custom_handlers.insert(name, handler);
        }
        self
    }

    /// Register the resource with `platform` and freeze it.
    pub fn build(self, platform: Arc<dyn Platform>) -> Result<Arc<ResourceObject>, ResourceError> {
        let Builder {
            uri,
            types,
            mut interfaces,
            default_interface,
            properties,
            attributes,
            auto_notify_policy,
            set_request_handler_policy,
            mut custom_handlers,
        } = self;

        interfaces.insert(BASELINE_INTERFACE.to_string());

        let interface_handlers: HashMap<String, InterfaceHandler> = interfaces
            .iter()
            .map(|name| {
                let handler = custom_handlers
                    .remove(name)
                    .unwrap_or_else(|| default_interface_handler(name, &default_interface));
                (name.clone(), handler)
            })
            .collect();

        let resource = Arc::new(ResourceObject::new(
            platform.clone(),
            ResourceIdentity {
                uri,
                interfaces,
                types,
                default_interface,
                properties,
            },
            attributes,
            interface_handlers,
            auto_notify_policy,
            set_request_handler_policy,
        ));

        let weak = Arc::downgrade(&resource);
        let entity_handler: EntityHandler =
            Arc::new(move |request| dispatcher::handle_request(&weak, request));

        let types = resource.types();
        let interfaces = resource.interfaces();
        let first_type = types.first().map(String::as_str).unwrap_or_default();

        let handle = platform.register_resource(
            resource.uri(),
            first_type,
            &interfaces[0],
            entity_handler,
            properties,
        )?;
        resource.set_handle(handle);

        // A failed bind drops `resource`, which unregisters it again
        for interface in interfaces.iter().skip(1) {
            platform.bind_interface(handle, interface)?;
        }
        for resource_type in types.iter().skip(1) {
            platform.bind_type(handle, resource_type)?;
        }

        info!("Registered resource {} ({})", resource.uri(), handle);
        Ok(resource)
    }
}
