//! UDP header codec
//!
//! The checksum covers an IPv4 pseudo-header, so a UDP layer can only be
//! serialized with a checksum when it knows its enclosing addresses: either
//! handed down by the IPv4 layer that owns it, or pinned with
//! [`Udp::with_context`].

use bytes::{BufMut, Bytes, BytesMut};
use ferry_core::{Error, Result};

use crate::checksum::{checksum_with_prefix, splice, validate_checksum};
use crate::field::{self, Fields};
use crate::ip::PseudoContext;
use crate::layer::{Header, LayerState};

/// UDP header with sparse, caller-declared fields
#[derive(Debug, Clone, Default)]
pub struct Udp {
    /// Source port
    pub src: Option<u16>,
    /// Destination port
    pub dst: Option<u16>,
    /// Length (header + data)
    pub length: Option<u16>,
    /// Checksum
    pub checksum: Option<u16>,
    context: Option<PseudoContext>,
    state: LayerState,
}

impl Udp {
    /// UDP header size in bytes
    pub const HEADER_SIZE: usize = 8;

    /// Port used for absent `src`/`dst`
    pub const DEFAULT_PORT: u16 = 53;

    /// Create an outbound header with no declared fields
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_src(mut self, port: u16) -> Self {
        self.src = Some(port);
        self
    }

    pub fn with_dst(mut self, port: u16) -> Self {
        self.dst = Some(port);
        self
    }

    /// Pin the length instead of deriving it
    pub fn with_length(mut self, length: u16) -> Self {
        self.length = Some(length);
        self
    }

    /// Pin the checksum instead of computing it
    pub fn with_checksum(mut self, checksum: u16) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Pseudo-header context to use when this layer is serialized on its own
    pub fn with_context(mut self, context: PseudoContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Set a raw payload, used when no `next` layer is linked
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.state.residual = payload.into();
        self
    }

    /// Pinned pseudo-header context, if any
    pub fn context(&self) -> Option<PseudoContext> {
        self.context
    }

    pub fn set_context(&mut self, context: Option<PseudoContext>) {
        self.context = context;
    }

    /// Serialize using the pinned context, if any
    pub fn serialize(&mut self) -> Result<Bytes> {
        self.serialize_in(None)
    }

    /// Serialize with `context` (the enclosing IPv4 header) taking precedence
    /// over a pinned one. Fails with [`Error::MissingContext`] when a checksum
    /// has to be computed and neither is available.
    pub fn serialize_in(&mut self, context: Option<PseudoContext>) -> Result<Bytes> {
        let payload = self.state.payload(None)?;
        let inbound = self.state.is_inbound();

        let pinned = self.length.filter(|_| !inbound);
        let mut size = Self::HEADER_SIZE + payload.len();
        let pad = if pinned.is_none() { size & 1 } else { 0 };
        size += pad;
        // The pseudo-header carries the real size in 16 bits, pinned length or not
        if size > u16::MAX as usize {
            return Err(Error::out_of_range("length", size as u64, u16::MAX as u64));
        }
        let length = pinned.unwrap_or(size as u16);

        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + payload.len() + pad);
        buffer.put_u16(self.src.unwrap_or(Self::DEFAULT_PORT));
        buffer.put_u16(self.dst.unwrap_or(Self::DEFAULT_PORT));
        buffer.put_u16(length);
        buffer.put_u16(0);
        buffer.put_slice(&payload);
        buffer.put_bytes(0, pad);

        let checksum = match self.checksum {
            Some(checksum) if !inbound => checksum,
            _ => {
                let context = context.or(self.context).ok_or_else(|| {
                    Error::missing_context("UDP checksum needs an enclosing IPv4 layer")
                })?;
                let pseudo = context.header(buffer.len() as u16);
                match checksum_with_prefix(&pseudo, &buffer) {
                    // Zero means "no checksum" on the wire (RFC 768)
                    0 => 0xFFFF,
                    sum => sum,
                }
            }
        };
        splice(&mut buffer, 6, checksum);

        Ok(self.state.cache(buffer.freeze()))
    }

    /// Parse a UDP header from a byte slice
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::from_bytes(Bytes::copy_from_slice(data))
    }

    /// Parse a UDP header, keeping everything past it as the remainder
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::invalid_length("UDP", Self::HEADER_SIZE, data.len()));
        }

        let residual = data.slice(Self::HEADER_SIZE..);

        Ok(Udp {
            src: Some(u16::from_be_bytes([data[0], data[1]])),
            dst: Some(u16::from_be_bytes([data[2], data[3]])),
            length: Some(u16::from_be_bytes([data[4], data[5]])),
            checksum: Some(u16::from_be_bytes([data[6], data[7]])),
            context: None,
            state: LayerState::inbound(data, residual),
        })
    }

    /// Check the checksum of the bytes this layer was parsed from or last
    /// serialized to, against the given enclosing addresses.
    ///
    /// A zero checksum means the sender did not compute one and is accepted.
    /// Bytes past the length field (link-layer padding) are ignored.
    pub fn verify_checksum(&self, context: PseudoContext) -> bool {
        let Some(bytes) = self.state.bytes() else {
            return false;
        };
        if bytes.len() < Self::HEADER_SIZE {
            return false;
        }
        if bytes[6] == 0 && bytes[7] == 0 {
            return true;
        }

        let length = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
        let end = length.clamp(Self::HEADER_SIZE, bytes.len());
        let mut data = context.header(end as u16).to_vec();
        data.extend_from_slice(&bytes[..end]);
        validate_checksum(&data)
    }
}

impl Header for Udp {
    fn name(&self) -> &'static str {
        "UDP"
    }

    fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        field::push(&mut fields, "src", self.src);
        field::push(&mut fields, "dst", self.dst);
        field::push(&mut fields, "length", self.length);
        field::push(&mut fields, "checksum", self.checksum);
        fields
    }

    fn state(&self) -> &LayerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LayerState {
        &mut self.state
    }
}
