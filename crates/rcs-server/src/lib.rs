//! # rcs-server
//!
//! Server-side resource objects for a constrained-device resource model.
//!
//! A [`ResourceObject`] owns an attribute map guarded by a reentrant,
//! owner-tracked lock. Remote GET and SET requests arrive through a
//! [`Platform`] and are served by per-interface [`InterfaceHandler`]s;
//! attribute changes notify observers according to the object's
//! auto-notify policy.
//!
//! ```ignore
//! let platform = Arc::new(InMemoryPlatform::new());
//! let sensor = Builder::new("/a/temperature", "oic.r.temperature", "oic.if.s")
//!     .set_attributes(attrs)
//!     .build(platform.clone())?;
//!
//! {
//!     let _lock = LockGuard::new(&sensor);
//!     sensor.set_attribute("Temperature", 22)?;
//!     sensor.set_attribute("Unit", "C")?;
//! } // observers notified once
//! ```

pub mod builder;
mod dispatcher;
pub mod error;
pub mod interface;
pub mod lock;
pub mod platform;
pub mod request;
pub mod resource;
pub mod response;
pub mod separate;

pub use builder::Builder;
pub use error::ResourceError;
pub use interface::{default_interface_handler, InterfaceHandler, RepresentationBuilder};
pub use lock::{LockGuard, WeakGuard};
pub use platform::{
    EntityHandler, InMemoryPlatform, NotifyOutcome, Platform, PlatformError, Registration,
};
pub use request::Request;
pub use resource::{
    AttributeUpdatedListener, GetRequestCallback, ResourceObject, SetRequestCallback,
};
pub use response::{AttributeChange, GetResponse, RequestHandler, SetRequestHandler, SetResponse};
pub use separate::SeparateResponse;

pub use rcs_core::{
    AcceptanceMethod, AttributeMap, AttributeValue, AutoNotifyPolicy, ResourceConfig,
    ResourceProperties, SetRequestHandlerPolicy,
};
pub use rcs_protocol::{EntityHandlerResult, PlatformRequest, PlatformResponse, Representation};
