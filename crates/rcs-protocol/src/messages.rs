//! Platform boundary message types.
//!
//! This module defines what flows between a resource object and the
//! transport/registration platform:
//! - Platform → Resource: PlatformRequest
//! - Resource → Platform: PlatformResponse carrying a Representation
//!
//! Handles are opaque identifiers minted by the platform.

use rcs_core::{AttributeMap, INTERFACE_QUERY_KEY};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identifies a registered resource on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceHandle(pub u64);

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

/// Identifies one in-flight request so a response can be matched to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestHandle(pub Uuid);

impl RequestHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    /// Parse a wire method name (case-insensitive).
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "PUT" => Some(Method::Put),
            "POST" => Some(Method::Post),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }

    /// POST and PUT both update attributes.
    pub fn is_update(&self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the platform classified an incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// A regular GET/POST style request
    Request,
    /// An observe registration
    Observe,
}

/// A request delivered by the platform to a resource's entity handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformRequest {
    pub request_handle: RequestHandle,
    pub resource_handle: ResourceHandle,
    pub kind: RequestKind,
    /// Raw wire method, e.g. "GET"
    pub method: String,
    pub uri: String,
    /// Raw query string without the leading '?', e.g. "if=oic.if.a"
    #[serde(default)]
    pub query: String,
    /// Encoded attribute payload, if the request carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl PlatformRequest {
    pub fn new(
        resource_handle: ResourceHandle,
        kind: RequestKind,
        method: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            request_handle: RequestHandle::new(),
            resource_handle,
            kind,
            method: method.into(),
            uri: uri.into(),
            query: String::new(),
            payload: None,
        }
    }

    /// Create a GET request.
    pub fn get(resource_handle: ResourceHandle, uri: impl Into<String>) -> Self {
        Self::new(resource_handle, RequestKind::Request, "GET", uri)
    }

    /// Create a POST request carrying an encoded attribute payload.
    pub fn post(
        resource_handle: ResourceHandle,
        uri: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self::new(resource_handle, RequestKind::Request, "POST", uri).with_payload(payload)
    }

    /// Create an observe registration.
    pub fn observe(resource_handle: ResourceHandle, uri: impl Into<String>) -> Self {
        Self::new(resource_handle, RequestKind::Observe, "GET", uri)
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Parse the query string into key/value pairs.
    ///
    /// Pairs are separated by '&' or ';'. A key without '=' maps to an empty
    /// value; later duplicates win.
    pub fn query_params(&self) -> HashMap<String, String> {
        self.query
            .split(['&', ';'])
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect()
    }

    /// Interface selected by the query, or "" when none was given.
    pub fn interface(&self) -> String {
        self.query_params()
            .remove(INTERFACE_QUERY_KEY)
            .unwrap_or_default()
    }
}

/// The representation of a resource sent back to a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    #[serde(rename = "href", default, skip_serializing_if = "String::is_empty")]
    pub uri: String,

    #[serde(rename = "if", default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,

    #[serde(rename = "rt", default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,

    #[serde(rename = "rep", default)]
    pub attributes: AttributeMap,

    /// Representations of bound child resources (batch interface)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Representation>,
}

impl Representation {
    /// A representation carrying attributes only, without metadata.
    pub fn with_attributes(attributes: AttributeMap) -> Self {
        Self {
            attributes,
            ..Default::default()
        }
    }
}

/// A response handed to the platform for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformResponse {
    pub request_handle: RequestHandle,
    pub resource_handle: ResourceHandle,
    pub status_code: u16,
    pub representation: Representation,
}

/// What an entity handler tells the platform about a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityHandlerResult {
    /// Handled; a response was sent
    Ok,
    /// Rejected
    Error,
    /// Response deferred; it will be sent later
    Slow,
}
