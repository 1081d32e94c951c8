//! Error types for ferry

use thiserror::Error;

/// Result type alias for ferry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ferry
#[derive(Error, Debug)]
pub enum Error {
    /// Raw buffer shorter than a layer's minimum header size
    #[error("{layer}: buffer too short ({actual} bytes, need at least {needed})")]
    InvalidLength {
        layer: &'static str,
        needed: usize,
        actual: usize,
    },

    /// A field value does not fit its bit width
    #[error("field '{field}' out of range: {value} (max {max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// A field value could not be interpreted
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Checksum computation needs an enclosing layer that is not there
    #[error("missing context: {0}")]
    MissingContext(String),

    /// A transport handle could not be bound to an interface
    #[error("transport unavailable on '{interface}': {reason}")]
    TransportUnavailable { interface: String, reason: String },

    /// Send or receive failure at the transport boundary
    #[error("transport error: {0}")]
    Transport(String),

    /// Mangle transform failure
    #[error("mangle error: {0}")]
    Mangle(String),

    /// Rejected configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Network I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid length error for `layer`
    pub fn invalid_length(layer: &'static str, needed: usize, actual: usize) -> Self {
        Error::InvalidLength {
            layer,
            needed,
            actual,
        }
    }

    /// Create an out of range error
    pub fn out_of_range(field: &'static str, value: u64, max: u64) -> Self {
        Error::OutOfRange { field, value, max }
    }

    /// Create an invalid field error with a custom message
    pub fn invalid_field<S: Into<String>>(field: &'static str, reason: S) -> Self {
        Error::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Create a missing context error
    pub fn missing_context<S: Into<String>>(msg: S) -> Self {
        Error::MissingContext(msg.into())
    }

    /// Create a transport unavailable error
    pub fn unavailable<S: Into<String>, R: Into<String>>(interface: S, reason: R) -> Self {
        Error::TransportUnavailable {
            interface: interface.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error with a custom message
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Error::Transport(msg.into())
    }

    /// Create a mangle error with a custom message
    pub fn mangle<S: Into<String>>(msg: S) -> Self {
        Error::Mangle(msg.into())
    }

    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Whether the bridge may retry after this error instead of giving up
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransportUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_length_display() {
        let err = Error::invalid_length("IPv4", 20, 7);
        assert_eq!(
            err.to_string(),
            "IPv4: buffer too short (7 bytes, need at least 20)"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::unavailable("eth0", "no such device").is_recoverable());
        assert!(!Error::transport("send failed").is_recoverable());
        assert!(!Error::out_of_range("ihl", 16, 15).is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
