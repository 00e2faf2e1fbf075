//! Handler responses and the SET acceptance engine.
//!
//! A GET/SET handler answers with one of three shapes:
//! - default: the interface's representation builder produces the body
//! - custom: the handler supplies the attributes and status code
//! - separate: nothing is sent now; a [`crate::SeparateResponse`] completes it
//!
//! For SET, the response also carries the [`AcceptanceMethod`] that decides
//! which requested attributes are committed to the resource.

use rcs_core::{
    AcceptanceMethod, AttributeMap, AttributeValue, SetRequestHandlerPolicy, DEFAULT_STATUS_CODE,
};
use rcs_protocol::Representation;

use crate::error::ResourceError;
use crate::resource::ResourceObject;

/// The non-deferred part of a handler's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHandler {
    custom_attributes: Option<AttributeMap>,
    status_code: u16,
}

impl RequestHandler {
    pub fn new(status_code: u16) -> Self {
        Self {
            custom_attributes: None,
            status_code,
        }
    }

    pub fn with_attributes(attributes: AttributeMap, status_code: u16) -> Self {
        Self {
            custom_attributes: Some(attributes),
            status_code,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn has_custom_attributes(&self) -> bool {
        self.custom_attributes.is_some()
    }

    pub fn custom_attributes(&self) -> Option<&AttributeMap> {
        self.custom_attributes.as_ref()
    }

    /// Custom attributes if the handler supplied them, else `build()`.
    pub(crate) fn build_representation(
        &self,
        build: impl FnOnce() -> Result<Representation, ResourceError>,
    ) -> Result<Representation, ResourceError> {
        match &self.custom_attributes {
            Some(attributes) => Ok(Representation::with_attributes(attributes.clone())),
            None => build(),
        }
    }
}

impl Default for RequestHandler {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_CODE)
    }
}

/// One attribute committed by a SET request.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub key: String,
    /// Value before the request; null if the key did not exist
    pub previous: AttributeValue,
    pub current: AttributeValue,
}

/// A SET handler's answer plus its acceptance method.
#[derive(Debug, Clone, PartialEq)]
pub struct SetRequestHandler {
    handler: RequestHandler,
    acceptance_method: AcceptanceMethod,
}

impl SetRequestHandler {
    pub fn new(handler: RequestHandler) -> Self {
        Self {
            handler,
            acceptance_method: AcceptanceMethod::Default,
        }
    }

    pub fn request_handler(&self) -> &RequestHandler {
        &self.handler
    }

    pub fn acceptance_method(&self) -> AcceptanceMethod {
        self.acceptance_method
    }

    /// Commit the acceptable part of `requested` into the resource.
    ///
    /// The caller must hold the resource lock. Returns the attributes whose
    /// value actually changed; rejection is an empty list, not an error.
    pub fn apply_acceptance_method(
        &self,
        resource: &ResourceObject,
        requested: &AttributeMap,
    ) -> Result<Vec<AttributeChange>, ResourceError> {
        if self.acceptance_method == AcceptanceMethod::Ignore {
            return Ok(Vec::new());
        }

        let strict = self.acceptance_method == AcceptanceMethod::Default
            && resource.set_request_handler_policy() == SetRequestHandlerPolicy::Never;

        resource.with_attributes_mut(|attributes| {
            if strict && requested.keys().any(|key| !attributes.contains(key)) {
                return Vec::new();
            }

            let mut changes = Vec::new();
            for (key, value) in requested.iter() {
                let previous = attributes.set(key, value.clone());
                if previous.as_ref() != Some(value) {
                    changes.push(AttributeChange {
                        key: key.to_string(),
                        previous: previous.unwrap_or_default(),
                        current: value.clone(),
                    });
                }
            }
            changes
        })
    }
}

/// Answer of a GET handler.
#[derive(Debug, Clone, PartialEq)]
pub struct GetResponse {
    handler: Option<RequestHandler>,
}

impl GetResponse {
    /// Build the body with the interface's builder, status 200.
    pub fn default_response() -> Self {
        Self::with_status(DEFAULT_STATUS_CODE)
    }

    /// Build the body with the interface's builder, custom status.
    pub fn with_status(status_code: u16) -> Self {
        Self {
            handler: Some(RequestHandler::new(status_code)),
        }
    }

    /// Send `attributes` as the body, status 200.
    pub fn create(attributes: AttributeMap) -> Self {
        Self::create_with_status(attributes, DEFAULT_STATUS_CODE)
    }

    pub fn create_with_status(attributes: AttributeMap, status_code: u16) -> Self {
        Self {
            handler: Some(RequestHandler::with_attributes(attributes, status_code)),
        }
    }

    /// Defer the response; see [`crate::SeparateResponse`].
    pub fn separate() -> Self {
        Self { handler: None }
    }

    pub fn is_separate(&self) -> bool {
        self.handler.is_none()
    }

    pub fn handler(&self) -> Option<&RequestHandler> {
        self.handler.as_ref()
    }
}

impl Default for GetResponse {
    fn default() -> Self {
        Self::default_response()
    }
}

/// Answer of a SET handler.
#[derive(Debug, Clone, PartialEq)]
pub struct SetResponse {
    handler: Option<SetRequestHandler>,
}

impl SetResponse {
    pub fn default_response() -> Self {
        Self::with_status(DEFAULT_STATUS_CODE)
    }

    pub fn with_status(status_code: u16) -> Self {
        Self {
            handler: Some(SetRequestHandler::new(RequestHandler::new(status_code))),
        }
    }

    pub fn create(attributes: AttributeMap) -> Self {
        Self::create_with_status(attributes, DEFAULT_STATUS_CODE)
    }

    pub fn create_with_status(attributes: AttributeMap, status_code: u16) -> Self {
        Self {
            handler: Some(SetRequestHandler::new(RequestHandler::with_attributes(
                attributes,
                status_code,
            ))),
        }
    }

    /// Shorthand for a default response that applies every requested key.
    pub fn accept() -> Self {
        Self::default_response().set_acceptance_method(AcceptanceMethod::Accept)
    }

    /// Shorthand for a default response that applies nothing.
    pub fn ignore() -> Self {
        Self::default_response().set_acceptance_method(AcceptanceMethod::Ignore)
    }

    pub fn separate() -> Self {
        Self { handler: None }
    }

    /// Choose the acceptance method; no effect on a separate response.
    pub fn set_acceptance_method(mut self, method: AcceptanceMethod) -> Self {
        if let Some(handler) = self.handler.as_mut() {
            handler.acceptance_method = method;
        }
        self
    }

    pub fn acceptance_method(&self) -> Option<AcceptanceMethod> {
        self.handler.as_ref().map(|h| h.acceptance_method)
    }

    pub fn is_separate(&self) -> bool {
        self.handler.is_none()
    }

    pub fn handler(&self) -> Option<&SetRequestHandler> {
        self.handler.as_ref()
    }
}

impl Default for SetResponse {
    fn default() -> Self {
        Self::default_response()
    }
}
