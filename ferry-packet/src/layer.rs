//! Layer chains
//!
//! A [`Layer`] is one protocol header plus what it encapsulates: either an
//! owned `next` layer or the raw bytes left over after parsing. Chains are
//! built outermost-first, serialized recursively, and compared against raw
//! frames by re-parsing them.

use bytes::Bytes;
use ferry_core::{ethertypes, ip_protocols, Error, Result};
use std::fmt;

use crate::ethernet::Ethernet;
use crate::field::Fields;
use crate::ip::{Ipv4, PseudoContext};
use crate::udp::Udp;

/// Chain linkage and bookkeeping shared by every header type.
///
/// None of this is part of a header's declared fields.
#[derive(Debug, Clone, Default)]
pub struct LayerState {
    next: Option<Box<Layer>>,
    pub(crate) residual: Bytes,
    inbound: bool,
    cached: Option<Bytes>,
}

impl LayerState {
    pub(crate) fn inbound(data: Bytes, residual: Bytes) -> Self {
        Self {
            next: None,
            residual,
            inbound: true,
            cached: Some(data),
        }
    }

    /// Serialized `next` layer, or the raw remainder when nothing is linked
    pub(crate) fn payload(&mut self, context: Option<PseudoContext>) -> Result<Bytes> {
        match self.next.as_deref_mut() {
            Some(next) => next.serialize_in(context),
            None => Ok(self.residual.clone()),
        }
    }

    pub(crate) fn cache(&mut self, bytes: Bytes) -> Bytes {
        self.cached = Some(bytes.clone());
        bytes
    }

    pub(crate) fn is_inbound(&self) -> bool {
        self.inbound
    }

    pub(crate) fn bytes(&self) -> Option<&Bytes> {
        self.cached.as_ref()
    }
}

/// Behavior common to the Ethernet, IPv4 and UDP codecs
pub trait Header {
    /// Protocol tag
    fn name(&self) -> &'static str;

    /// Declared fields in wire order; internal bookkeeping is never listed
    fn fields(&self) -> Fields;

    fn state(&self) -> &LayerState;

    fn state_mut(&mut self) -> &mut LayerState;

    /// The linked inner layer
    fn next(&self) -> Option<&Layer> {
        self.state().next.as_deref()
    }

    fn next_mut(&mut self) -> Option<&mut Layer> {
        self.state_mut().next.as_deref_mut()
    }

    /// Link `next` as the encapsulated layer, returning the previous one
    fn set_next(&mut self, next: Layer) -> Option<Layer> {
        self.state_mut().next.replace(Box::new(next)).map(|layer| *layer)
    }

    fn take_next(&mut self) -> Option<Layer> {
        self.state_mut().next.take().map(|layer| *layer)
    }

    /// Bytes following this header as captured at parse time (or set as raw
    /// payload). Independent of any linked `next` layer.
    fn next_raw(&self) -> &Bytes {
        &self.state().residual
    }

    /// Whether this layer was built by parsing bytes
    fn is_inbound(&self) -> bool {
        self.state().is_inbound()
    }

    /// Bytes this layer was parsed from or last serialized to
    fn bytes(&self) -> Option<&Bytes> {
        self.state().bytes()
    }
}

/// Protocol of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Ethernet,
    Ipv4,
    Udp,
}

impl LayerKind {
    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Ethernet => "Ethernet",
            LayerKind::Ipv4 => "IPv4",
            LayerKind::Udp => "UDP",
        }
    }

    /// Fixed minimum header size
    pub fn min_len(self) -> usize {
        match self {
            LayerKind::Ethernet => Ethernet::HEADER_SIZE,
            LayerKind::Ipv4 => Ipv4::MIN_HEADER_SIZE,
            LayerKind::Udp => Udp::HEADER_SIZE,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One protocol header and its encapsulated payload
#[derive(Debug, Clone)]
pub enum Layer {
    Ethernet(Ethernet),
    Ipv4(Ipv4),
    Udp(Udp),
}

impl Layer {
    /// Parse a single header of the given kind; the rest stays raw
    pub fn parse(kind: LayerKind, data: Bytes) -> Result<Self> {
        Ok(match kind {
            LayerKind::Ethernet => Layer::Ethernet(Ethernet::from_bytes(data)?),
            LayerKind::Ipv4 => Layer::Ipv4(Ipv4::from_bytes(data)?),
            LayerKind::Udp => Layer::Udp(Udp::from_bytes(data)?),
        })
    }

    /// Parse `data` as the given stack of layers, outermost first, linking
    /// each as `next` of the one before it.
    ///
    /// An IPv4 layer directly below Ethernet is cut at its total length, as in
    /// [`Layer::dissect`]. Fails on the first layer whose header cannot be
    /// parsed.
    pub fn parse_chain(data: &[u8], kinds: &[LayerKind]) -> Result<Self> {
        Self::parse_chain_bytes(Bytes::copy_from_slice(data), kinds)
    }

    fn parse_chain_bytes(data: Bytes, kinds: &[LayerKind]) -> Result<Self> {
        let (kind, rest) = kinds
            .split_first()
            .ok_or_else(|| Error::invalid_field("chain", "no layer kinds given"))?;

        let mut layer = Layer::parse(*kind, data)?;
        if let Some(inner_kind) = rest.first() {
            let mut raw = layer.next_raw().clone();
            if *kind == LayerKind::Ethernet && *inner_kind == LayerKind::Ipv4 {
                raw = strip_link_padding(raw);
            }
            let inner = Self::parse_chain_bytes(raw, rest)?;
            layer.set_next(inner);
        }
        Ok(layer)
    }

    /// Parse an Ethernet frame and follow the encapsulation as far as it is
    /// understood: ethertype 0x0800 to IPv4, protocol 17 to UDP. Only the
    /// Ethernet header is mandatory.
    ///
    /// Fragments (more-fragments flag set or non-zero offset) keep their
    /// payload raw: a partial datagram has no UDP header whose length and
    /// checksum could be recomputed from it.
    ///
    /// The IPv4 layer is parsed from its total length rather than the whole
    /// Ethernet remainder, so trailer padding on short frames is not carried
    /// into the chain.
    pub fn dissect(frame: &[u8]) -> Result<Self> {
        let mut layer = Layer::parse(LayerKind::Ethernet, Bytes::copy_from_slice(frame))?;
        layer.dissect_inner();
        Ok(layer)
    }

    fn dissect_inner(&mut self) {
        let kind = match self {
            Layer::Ethernet(eth) if eth.ethertype == Some(ethertypes::IPV4) => LayerKind::Ipv4,
            Layer::Ipv4(ip) if ip.protocol == Some(ip_protocols::UDP) && !ip.is_fragment() => {
                LayerKind::Udp
            }
            _ => return,
        };

        let mut raw = self.next_raw().clone();
        if kind == LayerKind::Ipv4 {
            raw = strip_link_padding(raw);
        }

        if let Ok(inner) = Layer::parse(kind, raw) {
            self.set_next(inner);
            if let Some(next) = self.next_mut() {
                next.dissect_inner();
            }
        }
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Ethernet(_) => LayerKind::Ethernet,
            Layer::Ipv4(_) => LayerKind::Ipv4,
            Layer::Udp(_) => LayerKind::Udp,
        }
    }

    fn header(&self) -> &dyn Header {
        match self {
            Layer::Ethernet(eth) => eth,
            Layer::Ipv4(ip) => ip,
            Layer::Udp(udp) => udp,
        }
    }

    fn header_mut(&mut self) -> &mut dyn Header {
        match self {
            Layer::Ethernet(eth) => eth,
            Layer::Ipv4(ip) => ip,
            Layer::Udp(udp) => udp,
        }
    }

    pub fn name(&self) -> &'static str {
        self.header().name()
    }

    pub fn fields(&self) -> Fields {
        self.header().fields()
    }

    pub fn next(&self) -> Option<&Layer> {
        self.header().next()
    }

    pub fn next_mut(&mut self) -> Option<&mut Layer> {
        self.header_mut().next_mut()
    }

    /// Link `next` as the encapsulated layer, returning the previous one
    pub fn set_next(&mut self, next: Layer) -> Option<Layer> {
        self.header_mut().set_next(next)
    }

    pub fn take_next(&mut self) -> Option<Layer> {
        self.header_mut().take_next()
    }

    /// Raw bytes following this header (see [`Header::next_raw`])
    pub fn next_raw(&self) -> &Bytes {
        self.header().next_raw()
    }

    pub fn is_inbound(&self) -> bool {
        self.header().is_inbound()
    }

    /// Bytes this layer was parsed from or last serialized to
    pub fn bytes(&self) -> Option<&Bytes> {
        self.header().bytes()
    }

    /// Serialize this layer and everything linked below it
    pub fn serialize(&mut self) -> Result<Bytes> {
        self.serialize_in(None)
    }

    /// Serialize with pseudo-header context from an enclosing layer
    pub fn serialize_in(&mut self, context: Option<PseudoContext>) -> Result<Bytes> {
        match self {
            Layer::Ethernet(eth) => eth.serialize(),
            Layer::Ipv4(ip) => ip.serialize(),
            Layer::Udp(udp) => udp.serialize_in(context),
        }
    }

    /// Whether `raw` matches this layer.
    ///
    /// `raw` is parsed as a fresh layer of the same kind. Every declared field
    /// must be equal to the parsed one; then, if a `next` layer is linked, it
    /// must match the parsed layer's remainder in turn.
    pub fn matches(&self, raw: &[u8]) -> bool {
        self.matches_bytes(Bytes::copy_from_slice(raw))
    }

    fn matches_bytes(&self, raw: Bytes) -> bool {
        let parsed = match Layer::parse(self.kind(), raw) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        let theirs = parsed.fields();
        let fields_equal = self
            .fields()
            .iter()
            .all(|field| theirs.contains(field));
        if !fields_equal {
            return false;
        }

        match self.next() {
            Some(next) => next.matches_bytes(parsed.next_raw().clone()),
            None => true,
        }
    }

    /// Iterate over this layer and every layer linked below it
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        std::iter::successors(Some(self), |layer| layer.next())
    }

    /// First layer of `kind` in the chain, starting with this one
    pub fn find(&self, kind: LayerKind) -> Option<&Layer> {
        self.iter().find(|layer| layer.kind() == kind)
    }

    pub fn find_mut(&mut self, kind: LayerKind) -> Option<&mut Layer> {
        if self.kind() == kind {
            return Some(self);
        }
        self.next_mut()?.find_mut(kind)
    }

    pub fn ethernet_mut(&mut self) -> Option<&mut Ethernet> {
        match self.find_mut(LayerKind::Ethernet)? {
            Layer::Ethernet(eth) => Some(eth),
            _ => None,
        }
    }

    pub fn ipv4_mut(&mut self) -> Option<&mut Ipv4> {
        match self.find_mut(LayerKind::Ipv4)? {
            Layer::Ipv4(ip) => Some(ip),
            _ => None,
        }
    }

    pub fn udp_mut(&mut self) -> Option<&mut Udp> {
        match self.find_mut(LayerKind::Udp)? {
            Layer::Udp(udp) => Some(udp),
            _ => None,
        }
    }

    pub fn as_ethernet(&self) -> Option<&Ethernet> {
        match self.find(LayerKind::Ethernet)? {
            Layer::Ethernet(eth) => Some(eth),
            _ => None,
        }
    }

    pub fn as_ipv4(&self) -> Option<&Ipv4> {
        match self.find(LayerKind::Ipv4)? {
            Layer::Ipv4(ip) => Some(ip),
            _ => None,
        }
    }

    pub fn as_udp(&self) -> Option<&Udp> {
        match self.find(LayerKind::Udp)? {
            Layer::Udp(udp) => Some(udp),
            _ => None,
        }
    }
}

/// Cut Ethernet trailer padding off an IPv4 packet, using its total length
/// field when that is plausible.
fn strip_link_padding(raw: Bytes) -> Bytes {
    if raw.len() < Ipv4::MIN_HEADER_SIZE {
        return raw;
    }
    let total = u16::from_be_bytes([raw[2], raw[3]]) as usize;
    if (Ipv4::MIN_HEADER_SIZE..raw.len()).contains(&total) {
        raw.slice(..total)
    } else {
        raw
    }
}

impl From<Ethernet> for Layer {
    fn from(eth: Ethernet) -> Self {
        Layer::Ethernet(eth)
    }
}

impl From<Ipv4> for Layer {
    fn from(ip: Ipv4) -> Self {
        Layer::Ipv4(ip)
    }
}

impl From<Udp> for Layer {
    fn from(udp: Udp) -> Self {
        Layer::Udp(udp)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        for (i, (name, value)) in self.fields().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str(")")?;

        match self.next() {
            Some(next) => write!(f, " / {}", next),
            None if !self.next_raw().is_empty() => {
                write!(f, " / Raw({} bytes)", self.next_raw().len())
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ChainBuilder;
    use crate::checksum::validate_checksum;
    use ferry_core::MacAddr;
    use std::net::Ipv4Addr;

    fn mac(s: &str) -> MacAddr {
        s.parse().unwrap()
    }

    /// Ethernet / IPv4(dst=123.1.1.2) / UDP(dst=1234)
    fn sample_chain() -> Layer {
        let udp = Layer::from(Udp::new().with_dst(1234));

        let mut ip = Layer::from(Ipv4::new().with_dst(Ipv4Addr::new(123, 1, 1, 2)));
        ip.set_next(udp);

        let mut eth = Layer::from(Ethernet::new().with_dst(mac("a0:bb:cc:dd:ee:f0")));
        eth.set_next(ip);
        eth
    }

    #[test]
    fn test_chain_composition() {
        let mut eth = sample_chain();
        let bytes = eth.serialize().unwrap();

        assert_eq!(bytes.len(), 14 + 20 + 8);
        assert_eq!(&bytes[0..6], &[0xa0, 0xbb, 0xcc, 0xdd, 0xee, 0xf0]);
        assert_eq!(&bytes[12..14], &[0x08, 0x00]);
        assert_eq!(bytes[14], 0x45);
        assert_eq!(&bytes[30..34], &[123, 1, 1, 2]);
        assert_eq!(u16::from_be_bytes([bytes[36], bytes[37]]), 1234);
        assert_eq!(u16::from_be_bytes([bytes[16], bytes[17]]), 28);
        assert_eq!(u16::from_be_bytes([bytes[38], bytes[39]]), 8);
        assert!(validate_checksum(&bytes[14..34]));
    }

    #[test]
    fn test_chain_udp_checksum_uses_enclosing_ipv4() {
        let mut eth = sample_chain();
        let bytes = eth.serialize().unwrap();

        let ip = eth.as_ipv4().unwrap();
        let udp = eth.as_udp().unwrap();
        assert!(udp.verify_checksum(ip.pseudo_context()));
        assert_eq!(udp.bytes().map(|b| b.as_ref()), Some(&bytes[34..]));
    }

    #[test]
    fn test_udp_under_ethernet_lacks_context() {
        let mut eth = Layer::from(Ethernet::new());
        eth.set_next(Udp::new().into());
        assert!(matches!(eth.serialize(), Err(Error::MissingContext(_))));
    }

    #[test]
    fn test_dissect() {
        let frame = sample_chain().serialize().unwrap();
        let layer = Layer::dissect(&frame).unwrap();

        let kinds: Vec<_> = layer.iter().map(Layer::kind).collect();
        assert_eq!(kinds, vec![LayerKind::Ethernet, LayerKind::Ipv4, LayerKind::Udp]);
        assert_eq!(layer.as_udp().unwrap().dst, Some(1234));
        assert!(layer.iter().all(Layer::is_inbound));
    }

    #[test]
    fn test_dissect_strips_trailer_padding() {
        let frame = sample_chain().serialize().unwrap();
        let mut padded = frame.to_vec();
        padded.resize(60, 0);

        let mut layer = Layer::dissect(&padded).unwrap();
        assert_eq!(layer.next_raw().len(), 60 - 14);
        assert!(layer.as_udp().unwrap().next_raw().is_empty());
        assert_eq!(layer.serialize().unwrap(), frame);
    }

    #[test]
    fn test_dissect_stops_at_unknown_ethertype() {
        let mut arp = Ethernet::new().with_ethertype(ethertypes::ARP).with_payload(vec![0; 28]);
        let frame = arp.serialize().unwrap();

        let layer = Layer::dissect(&frame).unwrap();
        assert!(layer.next().is_none());
        assert_eq!(layer.next_raw().len(), 28);
    }

    fn fragment(flags: u8, offset: u16) -> Bytes {
        ChainBuilder::new()
            .ethernet(Ethernet::new())
            .ipv4(Ipv4::new().with_flags(flags).with_offset(offset))
            .udp(Udp::new().with_dst(1234).with_length(3008).with_checksum(0xBEEF))
            .payload(vec![0xAB; 100])
            .build_bytes()
            .unwrap()
    }

    #[test]
    fn test_dissect_stops_at_fragments() {
        // First fragment: offset 0, more-fragments set
        let first = fragment(Ipv4::MORE_FRAGMENTS, 0);
        let layer = Layer::dissect(&first).unwrap();
        let ip = layer.as_ipv4().unwrap();
        assert!(ip.next().is_none());
        assert_eq!(ip.next_raw().len(), 108);

        // Later fragment
        let later = fragment(0, 185);
        let layer = Layer::dissect(&later).unwrap();
        assert!(layer.as_ipv4().unwrap().next().is_none());
        assert!(layer.as_udp().is_none());

        // Unfragmented, don't-fragment set
        let whole = fragment(0b010, 0);
        assert!(Layer::dissect(&whole).unwrap().as_udp().is_some());
    }

    #[test]
    fn test_rewrite_first_fragment_keeps_udp_header() {
        let frame = fragment(Ipv4::MORE_FRAGMENTS, 0);
        let mut layer = Layer::dissect(&frame).unwrap();
        layer.ipv4_mut().unwrap().src = Some(Ipv4Addr::new(1, 2, 3, 4));
        let rewritten = layer.serialize().unwrap();

        assert_eq!(rewritten.len(), frame.len());
        assert_eq!(&rewritten[26..30], &[1, 2, 3, 4]);
        assert!(validate_checksum(&rewritten[14..34]));
        // UDP length (3008) and checksum pass through untouched
        assert_eq!(&rewritten[34..], &frame[34..]);
        assert_eq!(u16::from_be_bytes([rewritten[38], rewritten[39]]), 3008);
    }

    #[test]
    fn test_dissect_tolerates_short_inner_header() {
        let mut eth = Ethernet::new().with_payload(vec![0x45; 10]);
        let frame = eth.serialize().unwrap();
        let layer = Layer::dissect(&frame).unwrap();
        assert!(layer.next().is_none());
    }

    #[test]
    fn test_parse_chain_fails_on_short_layer() {
        let mut eth = Ethernet::new().with_payload(vec![0x45; 10]);
        let frame = eth.serialize().unwrap();
        let err = Layer::parse_chain(&frame, &[LayerKind::Ethernet, LayerKind::Ipv4]).unwrap_err();
        assert!(matches!(err, Error::InvalidLength { layer: "IPv4", .. }));
    }

    #[test]
    fn test_parse_chain_roundtrip_is_identity() {
        let frame = sample_chain().serialize().unwrap();
        let mut layer = Layer::parse_chain(
            &frame,
            &[LayerKind::Ethernet, LayerKind::Ipv4, LayerKind::Udp],
        )
        .unwrap();
        assert_eq!(layer.serialize().unwrap(), frame);
    }

    #[test]
    fn test_parse_chain_strips_trailer_padding() {
        let frame = sample_chain().serialize().unwrap();
        let mut padded = frame.to_vec();
        padded.resize(60, 0);

        let mut layer = Layer::parse_chain(
            &padded,
            &[LayerKind::Ethernet, LayerKind::Ipv4, LayerKind::Udp],
        )
        .unwrap();
        assert!(layer.as_udp().unwrap().next_raw().is_empty());
        assert_eq!(layer.serialize().unwrap(), frame);
    }

    #[test]
    fn test_mangle_source_address() {
        let frame = sample_chain().serialize().unwrap();
        let mut layer = Layer::dissect(&frame).unwrap();

        layer.ipv4_mut().unwrap().src = Some(Ipv4Addr::new(1, 2, 3, 4));
        let rewritten = layer.serialize().unwrap();

        assert_eq!(rewritten.len(), frame.len());
        assert_eq!(&rewritten[..14], &frame[..14]);
        assert_eq!(&rewritten[26..30], &[1, 2, 3, 4]);
        assert_ne!(&rewritten[24..26], &frame[24..26]);
        assert!(validate_checksum(&rewritten[14..34]));
        // Ports and length survive, the UDP checksum follows the new source
        assert_eq!(&rewritten[34..40], &frame[34..40]);
        let udp = layer.as_udp().unwrap();
        assert!(udp.verify_checksum(layer.as_ipv4().unwrap().pseudo_context()));
    }

    #[test]
    fn test_mangle_without_change_is_identity() {
        let frame = sample_chain().serialize().unwrap();
        let mut layer = Layer::dissect(&frame).unwrap();
        layer.ipv4_mut().unwrap().src = Some(Ipv4::DEFAULT_ADDR);
        assert_eq!(layer.serialize().unwrap(), frame);
    }

    #[test]
    fn test_matches_declared_fields() {
        let selector = sample_chain();
        let frame = sample_chain().serialize().unwrap();
        assert!(selector.matches(&frame));

        let mut other = Layer::from(
            Ethernet::new().with_dst(mac("a0:bb:cc:dd:ee:f1")),
        );
        other.set_next(Ipv4::new().with_dst(Ipv4Addr::new(123, 1, 1, 2)).into());
        let other_frame = other.serialize().unwrap();
        assert!(!selector.matches(&other_frame));
    }

    #[test]
    fn test_matches_checks_every_field() {
        // Differs only in the last declared field
        let selector = Layer::from(
            Ipv4::new()
                .with_ttl(64)
                .with_src(Ipv4Addr::new(10, 0, 0, 1))
                .with_dst(Ipv4Addr::new(10, 0, 0, 2)),
        );

        let mut same = Ipv4::new()
            .with_ttl(64)
            .with_src(Ipv4Addr::new(10, 0, 0, 1))
            .with_dst(Ipv4Addr::new(10, 0, 0, 2));
        let mut different = Ipv4::new()
            .with_ttl(64)
            .with_src(Ipv4Addr::new(10, 0, 0, 1))
            .with_dst(Ipv4Addr::new(10, 0, 0, 3));

        assert!(selector.matches(&same.serialize().unwrap()));
        assert!(!selector.matches(&different.serialize().unwrap()));
    }

    #[test]
    fn test_matches_follows_chain() {
        let selector = sample_chain();

        let mut wrong_port = sample_chain();
        wrong_port.udp_mut().unwrap().dst = Some(4321);
        let frame = wrong_port.serialize().unwrap();

        assert!(!selector.matches(&frame));
    }

    #[test]
    fn test_matches_short_frame() {
        assert!(!sample_chain().matches(&[0u8; 20]));
    }

    #[test]
    fn test_set_next_replaces() {
        let mut eth = Layer::from(Ethernet::new());
        assert!(eth.set_next(Ipv4::new().into()).is_none());
        let previous = eth.set_next(Udp::new().into());
        assert_eq!(previous.map(|layer| layer.kind()), Some(LayerKind::Ipv4));
        assert_eq!(eth.take_next().map(|layer| layer.kind()), Some(LayerKind::Udp));
        assert!(eth.next().is_none());
    }

    #[test]
    fn test_display() {
        let layer = sample_chain();
        assert_eq!(
            layer.to_string(),
            "Ethernet(dst=a0:bb:cc:dd:ee:f0) / IPv4(dst=123.1.1.2) / UDP(dst=1234)"
        );
    }
}
