//! Capture, select, mangle and forward
//!
//! A [`Bridge`] reads raw frames from one interface, keeps the ones its
//! [`Selector`] matches, rewrites them with a [`Mangle`] transform and sends
//! the result out of another interface.
//!
//! # Example
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//! use ferry_bridge::{Bridge, BridgeConfig, Rewrite, Selector};
//! use ferry_packet::{ChainBuilder, Ethernet, Ipv4, Udp};
//!
//! # fn main() -> ferry_core::Result<()> {
//! let selector = ChainBuilder::new()
//!     .ethernet(Ethernet::new())
//!     .ipv4(Ipv4::new())
//!     .udp(Udp::new().with_dst(53))
//!     .build()?;
//!
//! let config = BridgeConfig::builder("eth0", "eth1")
//!     .selector(Selector::layer(selector))
//!     .mangle(Rewrite::new().ip_dst(Ipv4Addr::new(10, 0, 0, 53)))
//!     .build()?;
//!
//! let mut bridge = Bridge::pcap(config);
//! bridge.start()?;
//! // ...
//! bridge.stop_and_join()?;
//! println!("{}", bridge.stats());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod mangle;
pub mod selector;
pub mod stats;

pub use config::{BridgeConfig, BridgeConfigBuilder, DEFAULT_RECEIVE_TIMEOUT, DEFAULT_RETRY_BACKOFF};
pub use engine::{process_frame, Bridge, BridgeState, Verdict};
pub use mangle::{Mangle, Rewrite, SharedMangle};
pub use selector::{Matcher, Selector};
pub use stats::{BridgeStats, DropReason, StatsAccumulator};
