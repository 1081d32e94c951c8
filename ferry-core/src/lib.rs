//! Ferry Core Library
//!
//! This crate provides the error type, address types and frame record shared
//! by the ferry packet codec, transports and bridge engine.

pub mod error;
pub mod frame;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use frame::Frame;
pub use types::*;
