//! Ethernet II header codec
//!
//! Wire layout: `dst(6) src(6) ethertype(2)` followed by the encapsulated
//! payload. Missing addresses serialize as all-zero, a missing ethertype as
//! IPv4 (0x0800).

use bytes::{BufMut, Bytes, BytesMut};
use ferry_core::{ethertypes, Error, MacAddr, Result};

use crate::field::{self, Fields};
use crate::layer::{Header, LayerState};

/// Ethernet II header with sparse, caller-declared fields
#[derive(Debug, Clone, Default)]
pub struct Ethernet {
    /// Destination MAC address
    pub dst: Option<MacAddr>,
    /// Source MAC address
    pub src: Option<MacAddr>,
    /// EtherType
    pub ethertype: Option<u16>,
    state: LayerState,
}

impl Ethernet {
    /// Ethernet header size (dst + src + type)
    pub const HEADER_SIZE: usize = 14;

    /// Create an outbound header with no declared fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the destination MAC address
    pub fn with_dst(mut self, dst: MacAddr) -> Self {
        self.dst = Some(dst);
        self
    }

    /// Set the source MAC address
    pub fn with_src(mut self, src: MacAddr) -> Self {
        self.src = Some(src);
        self
    }

    /// Set the EtherType
    pub fn with_ethertype(mut self, ethertype: u16) -> Self {
        self.ethertype = Some(ethertype);
        self
    }

    /// Set a raw payload, used when no `next` layer is linked
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.state.residual = payload.into();
        self
    }

    /// Parse an Ethernet header from a byte slice
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::from_bytes(Bytes::copy_from_slice(data))
    }

    /// Parse an Ethernet header, keeping everything past it as the remainder
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::invalid_length("Ethernet", Self::HEADER_SIZE, data.len()));
        }

        let dst = MacAddr::from_slice(&data[0..6]);
        let src = MacAddr::from_slice(&data[6..12]);
        let ethertype = u16::from_be_bytes([data[12], data[13]]);

        let residual = data.slice(Self::HEADER_SIZE..);

        Ok(Ethernet {
            dst,
            src,
            ethertype: Some(ethertype),
            state: LayerState::inbound(data, residual),
        })
    }

    /// Serialize the header followed by the linked `next` layer (or the raw
    /// remainder). The result is also kept as this layer's cached bytes.
    pub fn serialize(&mut self) -> Result<Bytes> {
        let payload = self.state.payload(None)?;

        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + payload.len());
        buffer.put_slice(self.dst.unwrap_or_default().as_bytes());
        buffer.put_slice(self.src.unwrap_or_default().as_bytes());
        buffer.put_u16(self.ethertype.unwrap_or(ethertypes::IPV4));
        buffer.put_slice(&payload);

        Ok(self.state.cache(buffer.freeze()))
    }
}

impl Header for Ethernet {
    fn name(&self) -> &'static str {
        "Ethernet"
    }

    fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        field::push(&mut fields, "dst", self.dst);
        field::push(&mut fields, "src", self.src);
        field::push(&mut fields, "ethertype", self.ethertype);
        fields
    }

    fn state(&self) -> &LayerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LayerState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldValue;

    fn sample_frame() -> Vec<u8> {
        vec![
            0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, // dst
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
            0x08, 0x00, // IPv4
            0x01, 0x02, 0x03, 0x04, // payload
        ]
    }

    #[test]
    fn test_defaults() {
        let mut eth = Ethernet::new();
        let bytes = eth.serialize().unwrap();

        assert_eq!(bytes.len(), Ethernet::HEADER_SIZE);
        assert_eq!(&bytes[0..12], &[0u8; 12]);
        assert_eq!(&bytes[12..14], &[0x08, 0x00]);
        assert!(!eth.is_inbound());
        assert!(eth.fields().is_empty());
    }

    #[test]
    fn test_serialize_fields() {
        let dst = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let src = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);

        let mut eth = Ethernet::new()
            .with_dst(dst)
            .with_src(src)
            .with_ethertype(ethertypes::ARP)
            .with_payload(vec![0xde, 0xad]);
        let bytes = eth.serialize().unwrap();

        assert_eq!(&bytes[0..6], dst.as_bytes());
        assert_eq!(&bytes[6..12], src.as_bytes());
        assert_eq!(&bytes[12..14], &[0x08, 0x06]);
        assert_eq!(&bytes[14..], &[0xde, 0xad]);
        assert_eq!(eth.bytes(), Some(&bytes));
    }

    #[test]
    fn test_parse() {
        let eth = Ethernet::parse(&sample_frame()).unwrap();

        assert!(eth.is_inbound());
        assert_eq!(eth.dst, Some(MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])));
        assert_eq!(eth.src, Some(MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])));
        assert_eq!(eth.ethertype, Some(0x0800));
        assert_eq!(eth.next_raw().as_ref(), &[0x01, 0x02, 0x03, 0x04]);
        assert!(eth.next().is_none());
    }

    #[test]
    fn test_parse_too_short() {
        let err = Ethernet::parse(&[0u8; 13]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidLength {
                needed: 14,
                actual: 13,
                ..
            }
        ));
    }

    #[test]
    fn test_roundtrip_preserves_residual() {
        let frame = sample_frame();
        let mut eth = Ethernet::parse(&frame).unwrap();
        assert_eq!(eth.serialize().unwrap().as_ref(), frame.as_slice());
    }

    #[test]
    fn test_fields_wire_order() {
        let eth = Ethernet::new()
            .with_ethertype(0x86DD)
            .with_dst(MacAddr::broadcast());
        let names: Vec<_> = eth.fields().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["dst", "ethertype"]);
        assert_eq!(eth.fields()[1].1, FieldValue::Uint(0x86DD));
    }
}
