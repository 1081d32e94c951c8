//! Transport collaborator interface
//!
//! The bridge engine only ever talks to a link through these two traits: a
//! [`TransportProvider`] binds an interface name to a [`Transport`] handle,
//! and the handle receives and sends raw frames.

use ferry_core::{Frame, Result};
use std::time::Duration;

/// Default upper bound on a single receive call
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Options applied when binding an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOptions {
    /// Capture filter (BPF syntax) restricting what `receive` returns
    pub filter: Option<String>,
    /// Longest time a single `receive` call may block
    pub read_timeout: Duration,
    /// The handle is only used to inject frames; transports may skip
    /// capturing on it
    pub send_only: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            filter: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            send_only: false,
        }
    }
}

impl BindOptions {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Mark the handle as injection-only
    pub fn send_only(mut self) -> Self {
        self.send_only = true;
        self
    }
}

/// A raw link-layer handle bound to one interface
pub trait Transport: Send {
    /// Name of the bound interface
    fn interface(&self) -> &str;

    /// Wait for the next frame, at most the bind-time read timeout.
    ///
    /// Returns `Ok(None)` when the timeout expires without traffic.
    fn receive(&mut self) -> Result<Option<Frame>>;

    /// Transmit one raw frame. Failures surface as [`ferry_core::Error::Transport`].
    fn send(&mut self, data: &[u8]) -> Result<()>;
}

/// Opens [`Transport`] handles by interface name
pub trait TransportProvider: Send + Sync {
    /// Bind `interface`.
    ///
    /// Fails with [`ferry_core::Error::TransportUnavailable`] when the
    /// interface cannot be opened (yet).
    fn bind(&self, interface: &str, options: &BindOptions) -> Result<Box<dyn Transport>>;
}
