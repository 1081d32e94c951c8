//! Raw frame transports for ferry
//!
//! This crate provides the link-layer side of the bridge: binding interfaces,
//! receiving and injecting raw frames.
//!
//! ## Features
//!
//! - **Transport traits**: [`Transport`] and [`TransportProvider`] decouple the
//!   bridge engine from any particular capture mechanism
//! - **pcap**: [`PcapProvider`] opens interfaces through libpcap, with bounded
//!   read timeouts and optional BPF filters
//! - **In-memory**: [`MemoryNetwork`] simulates interfaces for tests and demos
//! - **Interface Management**: list and query network interfaces
//! - **BPF Filters**: helpers for the filters a bridge typically needs
//!
//! ## Example
//!
//! ```no_run
//! use ferry_capture::{filters, BindOptions, PcapProvider, TransportProvider};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = PcapProvider::default();
//! let options = BindOptions::default().with_filter(filters::udp_port_filter(53));
//! let mut transport = provider.bind("eth0", &options)?;
//!
//! if let Some(frame) = transport.receive()? {
//!     println!("Got frame: {} bytes", frame.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod filters;
pub mod interface;
pub mod memory;
pub mod transport;

// Re-export main types
pub use capture::{CaptureConfig, PcapProvider, PcapTransport};
pub use interface::{get_interface, list_bridge_interfaces, list_interfaces, InterfaceInfo};
pub use memory::{MemoryNetwork, MemoryTransport};
pub use transport::{BindOptions, Transport, TransportProvider, DEFAULT_READ_TIMEOUT};
