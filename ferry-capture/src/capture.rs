//! Raw frame transport backed by pcap

use ferry_core::{Error, Frame, Result};
use pcap::{Active, Capture, Device};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::interface::get_interface;
use crate::transport::{BindOptions, Transport, TransportProvider};

/// Default snapshot length (maximum bytes per frame)
const DEFAULT_SNAPLEN: i32 = 65535;

/// Configuration for pcap handles
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per frame
    pub snaplen: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Buffer size (0 = default)
    pub buffer_size: i32,
    /// Enable immediate mode (deliver frames immediately)
    pub immediate_mode: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: true,
            buffer_size: 0,
            immediate_mode: true,
        }
    }
}

/// Kernel filter for injection-only handles; no frame has length zero
const SEND_ONLY_FILTER: &str = "len = 0";

/// Capture filter to install: injection-only handles capture nothing
fn effective_filter(options: &BindOptions) -> Option<&str> {
    if options.send_only {
        Some(SEND_ONLY_FILTER)
    } else {
        options.filter.as_deref()
    }
}

/// pcap read timeout in milliseconds. pcap treats 0 as "wait forever", so
/// sub-millisecond timeouts are rounded up.
fn timeout_ms(timeout: Duration) -> i32 {
    timeout.as_millis().clamp(1, i32::MAX as u128) as i32
}

/// A pcap handle used both to receive and to inject frames
pub struct PcapTransport {
    interface: String,
    capture: Capture<Active>,
}

impl PcapTransport {
    /// Open `interface` with the given capture configuration
    pub fn open(interface: &str, config: &CaptureConfig, options: &BindOptions) -> Result<Self> {
        let info = get_interface(interface)?;
        if !info.is_up {
            return Err(Error::unavailable(interface, "interface is not up"));
        }

        debug!(interface, send_only = options.send_only, "Initializing pcap handle");

        let device = Device::from(interface);
        let mut capture = Capture::from_device(device)
            .map_err(|e| Error::unavailable(interface, e.to_string()))?
            .promisc(config.promiscuous && !options.send_only)
            .snaplen(config.snaplen)
            .timeout(timeout_ms(options.read_timeout))
            .immediate_mode(config.immediate_mode);

        if config.buffer_size > 0 {
            capture = capture.buffer_size(config.buffer_size);
        }

        let mut capture = capture
            .open()
            .map_err(|e| Error::unavailable(interface, e.to_string()))?;

        if let Some(filter) = effective_filter(options) {
            capture
                .filter(filter, true)
                .map_err(|e| Error::config(format!("invalid capture filter '{}': {}", filter, e)))?;
            debug!(interface, filter, "Applied capture filter");
        }

        info!(interface, "pcap handle opened");
        Ok(Self {
            interface: interface.to_string(),
            capture,
        })
    }
}

impl Transport for PcapTransport {
    fn interface(&self) -> &str {
        &self.interface
    }

    fn receive(&mut self) -> Result<Option<Frame>> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(Some(Frame::new(self.interface.as_str(), packet.data.to_vec()))),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(Error::transport(format!(
                "receive on '{}' failed: {}",
                self.interface, e
            ))),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.capture.sendpacket(data).map_err(|e| {
            warn!(interface = %self.interface, error = %e, "Frame injection failed");
            Error::transport(format!("send on '{}' failed: {}", self.interface, e))
        })
    }
}

/// Binds [`PcapTransport`] handles
#[derive(Debug, Clone, Default)]
pub struct PcapProvider {
    config: CaptureConfig,
}

impl PcapProvider {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

impl TransportProvider for PcapProvider {
    fn bind(&self, interface: &str, options: &BindOptions) -> Result<Box<dyn Transport>> {
        Ok(Box::new(PcapTransport::open(interface, &self.config, options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_config_default() {
        let config = CaptureConfig::default();
        assert_eq!(config.snaplen, DEFAULT_SNAPLEN);
        assert!(config.promiscuous);
        assert!(config.immediate_mode);
        assert_eq!(config.buffer_size, 0);
    }

    #[test]
    fn test_timeout_never_zero() {
        assert_eq!(timeout_ms(Duration::ZERO), 1);
        assert_eq!(timeout_ms(Duration::from_micros(200)), 1);
        assert_eq!(timeout_ms(Duration::from_millis(250)), 250);
        assert_eq!(timeout_ms(Duration::from_secs(u64::MAX)), i32::MAX);
    }

    #[test]
    fn test_send_only_captures_nothing() {
        let options = BindOptions::default().with_filter("udp");
        assert_eq!(effective_filter(&options), Some("udp"));
        assert_eq!(effective_filter(&BindOptions::default()), None);
        assert_eq!(effective_filter(&options.send_only()), Some(SEND_ONLY_FILTER));
    }

    #[test]
    fn test_bind_missing_interface() {
        let provider = PcapProvider::default();
        let result = provider.bind("nonexistent_interface_xyz", &BindOptions::default());
        match result {
            Err(e) => assert!(e.is_recoverable()),
            Ok(_) => panic!("Expected TransportUnavailable error"),
        }
    }

    #[test]
    fn test_open_loopback() {
        let result = PcapTransport::open("lo", &CaptureConfig::default(), &BindOptions::default())
            .or_else(|_| {
                PcapTransport::open("lo0", &CaptureConfig::default(), &BindOptions::default())
            });

        // This might fail if not running with permissions
        match result {
            Ok(transport) => assert!(!transport.interface().is_empty()),
            Err(e) => println!("Could not open pcap handle (may need privileges): {}", e),
        }
    }
}
