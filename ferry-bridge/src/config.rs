//! Bridge configuration

use ferry_capture::{filters, BindOptions};
use ferry_core::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::mangle::{Mangle, SharedMangle};
use crate::selector::Selector;

/// Wait before retrying when an interface cannot be bound yet
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(3);

/// Upper bound on one receive call, and so on stop latency
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(250);

/// Immutable bridge configuration, built with [`BridgeConfig::builder`]
#[derive(Clone)]
pub struct BridgeConfig {
    input: String,
    output: String,
    selector: Option<Selector>,
    mangle: Option<SharedMangle>,
    retry_backoff: Duration,
    receive_timeout: Duration,
    capture_filter: Option<String>,
}

impl BridgeConfig {
    pub fn builder(input: impl Into<String>, output: impl Into<String>) -> BridgeConfigBuilder {
        BridgeConfigBuilder {
            input: input.into(),
            output: output.into(),
            selector: None,
            mangle: None,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            capture_filter: Some(filters::ipv4_filter()),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn selector(&self) -> Option<&Selector> {
        self.selector.as_ref()
    }

    pub fn mangle(&self) -> Option<&dyn Mangle> {
        self.mangle.as_deref()
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }

    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    pub fn capture_filter(&self) -> Option<&str> {
        self.capture_filter.as_deref()
    }

    /// Bind options for the input side
    pub fn input_options(&self) -> BindOptions {
        BindOptions {
            filter: self.capture_filter.clone(),
            read_timeout: self.receive_timeout,
            send_only: false,
        }
    }

    /// Bind options for the output side; nothing is read from it, so the
    /// handle is opened injection-only
    pub fn output_options(&self) -> BindOptions {
        BindOptions::default()
            .with_read_timeout(self.receive_timeout)
            .send_only()
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("selector", &self.selector)
            .field("mangle", &self.mangle.is_some())
            .field("retry_backoff", &self.retry_backoff)
            .field("receive_timeout", &self.receive_timeout)
            .field("capture_filter", &self.capture_filter)
            .finish()
    }
}

/// Builder for [`BridgeConfig`]
pub struct BridgeConfigBuilder {
    input: String,
    output: String,
    selector: Option<Selector>,
    mangle: Option<SharedMangle>,
    retry_backoff: Duration,
    receive_timeout: Duration,
    capture_filter: Option<String>,
}

impl BridgeConfigBuilder {
    /// Only frames matching `selector` are mangled and forwarded
    pub fn selector(mut self, selector: impl Into<Selector>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Transform applied to matched frames before forwarding
    pub fn mangle<M: Mangle + 'static>(mut self, mangle: M) -> Self {
        self.mangle = Some(Arc::new(mangle));
        self
    }

    pub fn shared_mangle(mut self, mangle: SharedMangle) -> Self {
        self.mangle = Some(mangle);
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Replace the input capture filter; `None` captures everything
    pub fn capture_filter(mut self, filter: Option<String>) -> Self {
        self.capture_filter = filter;
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<BridgeConfig> {
        if self.input.trim().is_empty() {
            return Err(Error::config("input interface name is empty"));
        }
        if self.output.trim().is_empty() {
            return Err(Error::config("output interface name is empty"));
        }
        if self.receive_timeout.is_zero() {
            return Err(Error::config("receive timeout must be non-zero"));
        }
        if self.retry_backoff.is_zero() {
            return Err(Error::config("retry backoff must be non-zero"));
        }

        Ok(BridgeConfig {
            input: self.input,
            output: self.output,
            selector: self.selector,
            mangle: self.mangle,
            retry_backoff: self.retry_backoff,
            receive_timeout: self.receive_timeout,
            capture_filter: self.capture_filter.filter(|f| !f.trim().is_empty()),
        })
    }
}
