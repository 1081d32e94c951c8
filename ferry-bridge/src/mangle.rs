//! Mangle transforms
//!
//! A [`Mangle`] rewrites the bytes of a matched frame before it is forwarded.
//! Any `Fn(&[u8]) -> Result<Vec<u8>>` closure is a transform; [`Rewrite`] is
//! the stock one, overwriting a fixed set of header fields.

use ferry_core::{Error, MacAddr, Result};
use ferry_packet::Layer;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Rewrite of a raw frame
pub trait Mangle: Send + Sync {
    fn mangle(&self, frame: &[u8]) -> Result<Vec<u8>>;
}

impl<F> Mangle for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync,
{
    fn mangle(&self, frame: &[u8]) -> Result<Vec<u8>> {
        self(frame)
    }
}

/// Shared handle on a transform, as stored in a bridge configuration
pub type SharedMangle = Arc<dyn Mangle>;

/// Stock transform: decode Ethernet / IPv4 / UDP, overwrite the configured
/// fields, re-serialize with lengths and checksums recomputed.
///
/// Fails when a field is configured for a layer the frame does not carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewrite {
    pub eth_src: Option<MacAddr>,
    pub eth_dst: Option<MacAddr>,
    pub ip_src: Option<Ipv4Addr>,
    pub ip_dst: Option<Ipv4Addr>,
    pub ttl: Option<u8>,
    pub udp_src: Option<u16>,
    pub udp_dst: Option<u16>,
}

impl Rewrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eth_src(mut self, mac: MacAddr) -> Self {
        self.eth_src = Some(mac);
        self
    }

    pub fn eth_dst(mut self, mac: MacAddr) -> Self {
        self.eth_dst = Some(mac);
        self
    }

    pub fn ip_src(mut self, addr: Ipv4Addr) -> Self {
        self.ip_src = Some(addr);
        self
    }

    pub fn ip_dst(mut self, addr: Ipv4Addr) -> Self {
        self.ip_dst = Some(addr);
        self
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn udp_src(mut self, port: u16) -> Self {
        self.udp_src = Some(port);
        self
    }

    pub fn udp_dst(mut self, port: u16) -> Self {
        self.udp_dst = Some(port);
        self
    }

    /// Whether no field is configured
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn touches_ipv4(&self) -> bool {
        self.ip_src.is_some() || self.ip_dst.is_some() || self.ttl.is_some()
    }

    fn touches_udp(&self) -> bool {
        self.udp_src.is_some() || self.udp_dst.is_some()
    }

    /// Apply the rewrite to a decoded chain
    pub fn apply(&self, chain: &mut Layer) -> Result<()> {
        let eth = chain
            .ethernet_mut()
            .ok_or_else(|| Error::mangle("frame carries no Ethernet header"))?;
        if let Some(mac) = self.eth_src {
            eth.src = Some(mac);
        }
        if let Some(mac) = self.eth_dst {
            eth.dst = Some(mac);
        }

        if self.touches_ipv4() {
            let ip = chain
                .ipv4_mut()
                .ok_or_else(|| Error::mangle("frame carries no IPv4 header"))?;
            if let Some(addr) = self.ip_src {
                ip.src = Some(addr);
            }
            if let Some(addr) = self.ip_dst {
                ip.dst = Some(addr);
            }
            if let Some(ttl) = self.ttl {
                ip.ttl = Some(ttl);
            }
        }

        if self.touches_udp() {
            let udp = chain
                .udp_mut()
                .ok_or_else(|| Error::mangle("frame carries no UDP header"))?;
            if let Some(port) = self.udp_src {
                udp.src = Some(port);
            }
            if let Some(port) = self.udp_dst {
                udp.dst = Some(port);
            }
        }
        Ok(())
    }
}

impl Mangle for Rewrite {
    fn mangle(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let mut chain = Layer::dissect(frame)?;
        self.apply(&mut chain)?;
        Ok(chain.serialize()?.to_vec())
    }
}

impl fmt::Display for Rewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(mac) = self.eth_src {
            parts.push(format!("eth.src={}", mac));
        }
        if let Some(mac) = self.eth_dst {
            parts.push(format!("eth.dst={}", mac));
        }
        if let Some(addr) = self.ip_src {
            parts.push(format!("ip.src={}", addr));
        }
        if let Some(addr) = self.ip_dst {
            parts.push(format!("ip.dst={}", addr));
        }
        if let Some(ttl) = self.ttl {
            parts.push(format!("ip.ttl={}", ttl));
        }
        if let Some(port) = self.udp_src {
            parts.push(format!("udp.src={}", port));
        }
        if let Some(port) = self.udp_dst {
            parts.push(format!("udp.dst={}", port));
        }
        if parts.is_empty() {
            f.write_str("identity")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_packet::{validate_checksum, ChainBuilder, Ethernet, Ipv4, Udp};

    fn frame() -> Vec<u8> {
        ChainBuilder::new()
            .ethernet(Ethernet::new().with_src(MacAddr([0x02, 0, 0, 0, 0, 1])))
            .ipv4(
                Ipv4::new()
                    .with_src(Ipv4Addr::new(10, 0, 0, 1))
                    .with_dst(Ipv4Addr::new(10, 0, 0, 2))
                    .with_ttl(64),
            )
            .udp(Udp::new().with_src(5000).with_dst(53))
            .payload(vec![0xde, 0xad, 0xbe, 0xef])
            .build_bytes()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_rewrite_ip_src_preserves_other_fields() {
        let input = frame();
        let output = Rewrite::new()
            .ip_src(Ipv4Addr::new(192, 168, 0, 1))
            .mangle(&input)
            .unwrap();

        assert_eq!(output.len(), input.len());
        assert_eq!(&output[..14], &input[..14]);
        assert_eq!(&output[26..30], &[192, 168, 0, 1]);
        assert_ne!(&output[24..26], &input[24..26]);
        assert!(validate_checksum(&output[14..34]));
        assert_eq!(&output[34..40], &input[34..40]);
        assert_eq!(&output[42..], &input[42..]);
    }

    #[test]
    fn test_rewrite_same_value_is_identity() {
        let input = frame();
        let output = Rewrite::new()
            .ip_src(Ipv4Addr::new(10, 0, 0, 1))
            .mangle(&input)
            .unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_rewrite_all_fields() {
        let mac = MacAddr([0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]);
        let rewrite = Rewrite::new()
            .eth_src(mac)
            .eth_dst(MacAddr::broadcast())
            .ip_dst(Ipv4Addr::new(172, 16, 0, 9))
            .ttl(5)
            .udp_src(1111)
            .udp_dst(2222);

        let output = rewrite.mangle(&frame()).unwrap();
        let chain = Layer::dissect(&output).unwrap();

        let eth = chain.as_ethernet().unwrap();
        assert_eq!(eth.src, Some(mac));
        assert_eq!(eth.dst, Some(MacAddr::broadcast()));

        let ip = chain.as_ipv4().unwrap();
        assert_eq!(ip.dst, Some(Ipv4Addr::new(172, 16, 0, 9)));
        assert_eq!(ip.ttl, Some(5));
        assert!(ip.verify_checksum());

        let udp = chain.as_udp().unwrap();
        assert_eq!(udp.src, Some(1111));
        assert_eq!(udp.dst, Some(2222));
        assert!(udp.verify_checksum(ip.pseudo_context()));
    }

    #[test]
    fn test_rewrite_missing_layer() {
        let mut arp = Ethernet::new().with_ethertype(0x0806).with_payload(vec![0; 28]);
        let frame = arp.serialize().unwrap();

        let err = Rewrite::new().udp_dst(53).mangle(&frame).unwrap_err();
        assert!(matches!(err, Error::Mangle(_)));

        // Ethernet-only rewrites still apply
        let output = Rewrite::new().eth_dst(MacAddr::broadcast()).mangle(&frame).unwrap();
        assert_eq!(&output[0..6], &[0xff; 6]);
    }

    #[test]
    fn test_rewrite_short_frame() {
        let err = Rewrite::new().mangle(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, Error::InvalidLength { .. }));
    }

    #[test]
    fn test_closure_transform() {
        let reverse = |frame: &[u8]| -> Result<Vec<u8>> { Ok(frame.iter().rev().copied().collect()) };
        assert_eq!(reverse.mangle(&[1, 2, 3]).unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Rewrite::new().to_string(), "identity");
        assert!(Rewrite::new().is_empty());
        let rewrite = Rewrite::new().ip_src(Ipv4Addr::new(1, 2, 3, 4)).udp_dst(53);
        assert_eq!(rewrite.to_string(), "ip.src=1.2.3.4 udp.dst=53");
        assert!(!rewrite.is_empty());
    }
}
