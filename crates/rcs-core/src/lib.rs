//! # rcs-core
//!
//! Core resource data model.
//!
//! This crate provides:
//! - Attribute values and attribute maps with deep equality
//! - Notification and acceptance policies
//! - Resource properties and well-known interface names
//! - Declarative resource configuration
//!
//! This crate is intentionally runtime-agnostic and holds no locks or I/O,
//! so both the server crate and platform adapters can share it.

pub mod attributes;
pub mod config;
pub mod model;

pub use attributes::{AttributeMap, AttributeValue};
pub use config::{ConfigError, ResourceConfig};
pub use model::*;
