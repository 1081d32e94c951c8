//! Layered packet codec for ferry
//!
//! This crate encodes and decodes Ethernet II, IPv4 and UDP headers, links
//! them into layer chains and computes the internet checksums they carry.
//!
//! # Architecture
//!
//! - [`checksum`] - One's-complement internet checksum with pseudo-header support
//! - [`ethernet`] - Ethernet II header codec
//! - [`ip`] - IPv4 header codec and the pseudo-header context it lends to UDP
//! - [`udp`] - UDP header codec
//! - [`layer`] - Layer chains: composition, dissection and matching
//! - [`builder`] - Fluent API for composing outbound chains
//! - [`field`] - Declared field values, for introspection and matching
//!
//! Every header field is optional. Absent fields take documented defaults on
//! serialize; length and checksum fields are derived unless pinned by the
//! caller on an outbound layer. Layers built by parsing bytes always have
//! their lengths and checksums recomputed, so a parsed chain can be edited and
//! re-serialized directly.
//!
//! # Building a UDP packet
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use ferry_packet::{Ethernet, Ipv4, Layer, Udp};
//!
//! let udp = Layer::from(Udp::new().with_dst(1234));
//! let mut ip = Layer::from(Ipv4::new().with_dst(Ipv4Addr::new(123, 1, 1, 2)));
//! ip.set_next(udp);
//! let mut eth = Layer::from(Ethernet::new().with_dst("a0:bb:cc:dd:ee:f0".parse().unwrap()));
//! eth.set_next(ip);
//!
//! let bytes = eth.serialize().unwrap();
//! assert_eq!(bytes.len(), 42);
//! assert_eq!(bytes[14], 0x45);
//! ```
//!
//! # Rewriting a captured frame
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use ferry_packet::{ChainBuilder, Ethernet, Ipv4, Layer, Udp};
//!
//! let frame = ChainBuilder::new()
//!     .ethernet(Ethernet::new())
//!     .ipv4(Ipv4::new())
//!     .udp(Udp::new())
//!     .build_bytes()
//!     .unwrap();
//!
//! let mut chain = Layer::dissect(&frame).unwrap();
//! if let Some(ip) = chain.ipv4_mut() {
//!     ip.src = Some(Ipv4Addr::new(10, 0, 0, 1));
//! }
//! let rewritten = chain.serialize().unwrap();
//! assert_eq!(&rewritten[26..30], &[10, 0, 0, 1]);
//! ```

pub mod builder;
pub mod checksum;
pub mod ethernet;
pub mod field;
pub mod ip;
pub mod layer;
pub mod udp;

// Re-export commonly used types for convenience
pub use builder::ChainBuilder;
pub use checksum::{internet_checksum, validate_checksum};
pub use ethernet::Ethernet;
pub use field::{FieldValue, Fields};
pub use ip::{Ipv4, PseudoContext};
pub use layer::{Header, Layer, LayerKind};
pub use udp::Udp;
