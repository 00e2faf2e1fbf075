//! # rcs-protocol
//!
//! Message types exchanged with the registration/transport platform, and the
//! JSON codec for request payloads and representations.

pub mod codec;
pub mod messages;

pub use codec::*;
pub use messages::*;
