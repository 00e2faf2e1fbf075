//! JSON codec for request payloads and representations.
//!
//! Request payloads are bare attribute objects; responses are full
//! representations. This module provides encoding and decoding utilities
//! for both.
//!
//! JSON has no byte string type: an [`AttributeValue::ByteString`] is
//! written as an array of integers and decodes as an
//! [`AttributeValue::Vector`] of [`AttributeValue::Int`].

use crate::messages::Representation;
use rcs_core::{AttributeMap, AttributeValue};
use thiserror::Error;

/// Errors that can occur during payload encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON (de)serialization failed.
    #[error("Failed to (de)serialize payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload decoded to something other than an attribute object.
    #[error("Expected an attribute object, found {0}")]
    NotAnObject(&'static str),
}

/// Decode the attributes carried by a request payload.
///
/// An empty payload decodes to an empty map.
pub fn decode_attributes(payload: &str) -> Result<AttributeMap, CodecError> {
    if payload.trim().is_empty() {
        return Ok(AttributeMap::new());
    }

    match serde_json::from_str::<AttributeValue>(payload)? {
        AttributeValue::Map(map) => Ok(map),
        other => Err(CodecError::NotAnObject(other.type_name())),
    }
}

/// Encode attributes as a request payload.
pub fn encode_attributes(attributes: &AttributeMap) -> Result<String, CodecError> {
    serde_json::to_string(attributes).map_err(CodecError::from)
}

/// Encode a representation for transmission.
pub fn encode_representation(rep: &Representation) -> Result<String, CodecError> {
    serde_json::to_string(rep).map_err(CodecError::from)
}

/// Decode a representation received from the platform.
pub fn decode_representation(text: &str) -> Result<Representation, CodecError> {
    serde_json::from_str(text).map_err(CodecError::from)
}
