//! IPv4 header codec
//!
//! This module builds and parses IPv4 headers, including options, derived
//! length and IHL values, and the header checksum. It also supplies the
//! pseudo-header context transport layers need for their own checksums.

use bytes::{BufMut, Bytes, BytesMut};
use ferry_core::{ip_protocols, Error, Result};
use std::net::Ipv4Addr;

use crate::checksum::{internet_checksum, splice, validate_checksum};
use crate::field::{self, FieldValue, Fields};
use crate::layer::{Header, LayerState};

/// Addresses and protocol an enclosing IPv4 header lends to the checksum of
/// the transport layer it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoContext {
    /// Source address
    pub src: Ipv4Addr,
    /// Destination address
    pub dst: Ipv4Addr,
    /// Protocol number
    pub protocol: u8,
}

impl PseudoContext {
    /// Pseudo-header size in bytes
    pub const SIZE: usize = 12;

    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8) -> Self {
        Self { src, dst, protocol }
    }

    /// `src(4) || dst(4) || 0x00 || protocol(1) || length(2)`
    pub fn header(&self, length: u16) -> [u8; Self::SIZE] {
        let mut header = [0u8; Self::SIZE];
        header[0..4].copy_from_slice(&self.src.octets());
        header[4..8].copy_from_slice(&self.dst.octets());
        header[9] = self.protocol;
        header[10..12].copy_from_slice(&length.to_be_bytes());
        header
    }
}

/// IPv4 header with sparse, caller-declared fields
#[derive(Debug, Clone, Default)]
pub struct Ipv4 {
    /// Version (4 bits)
    pub version: Option<u8>,
    /// Internet Header Length in 32-bit words (4 bits)
    pub ihl: Option<u8>,
    /// Type of Service
    pub tos: Option<u8>,
    /// Total length (header + data) in bytes
    pub length: Option<u16>,
    /// Identification
    pub ident: Option<u16>,
    /// Flags (3 bits)
    pub flags: Option<u8>,
    /// Fragment offset in 8-byte blocks (13 bits)
    pub offset: Option<u16>,
    /// Time to Live
    pub ttl: Option<u8>,
    /// Protocol
    pub protocol: Option<u8>,
    /// Header checksum
    pub checksum: Option<u16>,
    /// Source address
    pub src: Option<Ipv4Addr>,
    /// Destination address
    pub dst: Option<Ipv4Addr>,
    /// Options, concatenated in order on the wire
    pub options: Option<Vec<Bytes>>,
    state: LayerState,
}

impl Ipv4 {
    /// Minimum IPv4 header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Maximum IPv4 header size (with maximum options)
    pub const MAX_HEADER_SIZE: usize = 60;

    pub const DEFAULT_TTL: u8 = 128;
    pub const DEFAULT_ADDR: Ipv4Addr = Ipv4Addr::LOCALHOST;

    /// More-fragments bit of the flags field
    pub const MORE_FRAGMENTS: u8 = 0b001;

    const DEFAULT_VERSION: u8 = 4;
    const DEFAULT_IHL: u8 = 5;
    const MAX_NIBBLE: u8 = 0x0F;
    const MAX_FLAGS: u8 = 0x07;
    const MAX_OFFSET: u16 = 0x1FFF;

    /// Create an outbound header with no declared fields
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_ihl(mut self, ihl: u8) -> Self {
        self.ihl = Some(ihl);
        self
    }

    pub fn with_tos(mut self, tos: u8) -> Self {
        self.tos = Some(tos);
        self
    }

    /// Pin the total length instead of deriving it
    pub fn with_length(mut self, length: u16) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_ident(mut self, ident: u16) -> Self {
        self.ident = Some(ident);
        self
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn with_offset(mut self, offset: u16) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_protocol(mut self, protocol: u8) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Pin the header checksum instead of computing it
    pub fn with_checksum(mut self, checksum: u16) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn with_src(mut self, src: Ipv4Addr) -> Self {
        self.src = Some(src);
        self
    }

    pub fn with_dst(mut self, dst: Ipv4Addr) -> Self {
        self.dst = Some(dst);
        self
    }

    /// Append an option block
    pub fn with_option(mut self, option: impl Into<Bytes>) -> Self {
        self.options.get_or_insert_with(Vec::new).push(option.into());
        self
    }

    /// Set a raw payload, used when no `next` layer is linked
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.state.residual = payload.into();
        self
    }

    /// Pseudo-header context with defaults applied to absent fields
    pub fn pseudo_context(&self) -> PseudoContext {
        PseudoContext {
            src: self.src.unwrap_or(Self::DEFAULT_ADDR),
            dst: self.dst.unwrap_or(Self::DEFAULT_ADDR),
            protocol: self.protocol.unwrap_or(ip_protocols::UDP),
        }
    }

    /// Pseudo-header for a transport segment of `length` bytes
    pub fn pseudo_header(&self, length: u16) -> [u8; PseudoContext::SIZE] {
        self.pseudo_context().header(length)
    }

    /// Concatenated options, zero-padded to a multiple of 4 bytes
    fn option_block(&self) -> Bytes {
        let Some(options) = &self.options else {
            return Bytes::new();
        };

        let mut block = BytesMut::new();
        for option in options {
            block.put_slice(option);
        }

        let padded = (block.len() + 3) & !3;
        block.resize(padded, 0);
        block.freeze()
    }

    /// IHL in effect: derived from the options when any are present,
    /// otherwise the declared value or 5.
    fn effective_ihl(&self, options: &[u8]) -> Result<u8> {
        if options.is_empty() {
            return Ok(self.ihl.unwrap_or(Self::DEFAULT_IHL));
        }

        let words = (options.len() + Self::MIN_HEADER_SIZE) / 4;
        if words > Self::MAX_NIBBLE as usize {
            return Err(Error::out_of_range(
                "ihl",
                words as u64,
                Self::MAX_NIBBLE as u64,
            ));
        }
        Ok(words as u8)
    }

    /// Serialize with the header length, total length and checksum derived
    /// where they are not pinned. The result is also kept as this layer's
    /// cached bytes.
    pub fn serialize(&mut self) -> Result<Bytes> {
        let options = self.option_block();
        let ihl = self.effective_ihl(&options)?;

        let version = self.version.unwrap_or(Self::DEFAULT_VERSION);
        check_range("version", version as u64, Self::MAX_NIBBLE as u64)?;
        check_range("ihl", ihl as u64, Self::MAX_NIBBLE as u64)?;

        let flags = self.flags.unwrap_or(0);
        let offset = self.offset.unwrap_or(0);
        check_range("flags", flags as u64, Self::MAX_FLAGS as u64)?;
        check_range("offset", offset as u64, Self::MAX_OFFSET as u64)?;

        let context = self.pseudo_context();
        let payload = self.state.payload(Some(context))?;
        let inbound = self.state.is_inbound();

        let mut pad = 0;
        let length = match self.length {
            Some(length) if !inbound => length,
            _ => {
                let mut length = ihl as usize * 4 + payload.len();
                if length & 1 == 1 {
                    length += 1;
                    pad = 1;
                }
                check_range("length", length as u64, u16::MAX as u64)?;
                length as u16
            }
        };

        let header_len = Self::MIN_HEADER_SIZE + options.len();
        let mut buffer = BytesMut::with_capacity(header_len + payload.len() + pad);

        buffer.put_u8((version << 4) | ihl);
        buffer.put_u8(self.tos.unwrap_or(0));
        buffer.put_u16(length);
        buffer.put_u16(self.ident.unwrap_or(0));
        buffer.put_u16(((flags as u16) << 13) | offset);
        buffer.put_u8(self.ttl.unwrap_or(Self::DEFAULT_TTL));
        buffer.put_u8(context.protocol);
        buffer.put_u16(0);
        buffer.put_slice(&context.src.octets());
        buffer.put_slice(&context.dst.octets());
        buffer.put_slice(&options);

        let checksum = match self.checksum {
            Some(checksum) if !inbound => checksum,
            _ => internet_checksum(&buffer[..header_len]),
        };
        splice(&mut buffer, 10, checksum);

        buffer.put_slice(&payload);
        buffer.put_bytes(0, pad);

        Ok(self.state.cache(buffer.freeze()))
    }

    /// Parse an IPv4 header from a byte slice
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::from_bytes(Bytes::copy_from_slice(data))
    }

    /// Parse an IPv4 header, keeping everything past it as the remainder.
    ///
    /// Options are taken as the `ihl * 4 - 20` bytes following the fixed
    /// header, as far as the buffer reaches; neither they nor the total length
    /// are checked against the buffer.
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return Err(Error::invalid_length("IPv4", Self::MIN_HEADER_SIZE, data.len()));
        }

        let version = data[0] >> 4;
        let ihl = data[0] & 0x0F;
        let flags_and_offset = u16::from_be_bytes([data[6], data[7]]);

        let header_len = (ihl as usize * 4).max(Self::MIN_HEADER_SIZE);
        let end = header_len.min(data.len());
        let options = if end > Self::MIN_HEADER_SIZE {
            Some(vec![data.slice(Self::MIN_HEADER_SIZE..end)])
        } else {
            None
        };

        let residual = data.slice(end..);

        Ok(Ipv4 {
            version: Some(version),
            ihl: Some(ihl),
            tos: Some(data[1]),
            length: Some(u16::from_be_bytes([data[2], data[3]])),
            ident: Some(u16::from_be_bytes([data[4], data[5]])),
            flags: Some((flags_and_offset >> 13) as u8),
            offset: Some(flags_and_offset & Self::MAX_OFFSET),
            ttl: Some(data[8]),
            protocol: Some(data[9]),
            checksum: Some(u16::from_be_bytes([data[10], data[11]])),
            src: Some(Ipv4Addr::new(data[12], data[13], data[14], data[15])),
            dst: Some(Ipv4Addr::new(data[16], data[17], data[18], data[19])),
            options,
            state: LayerState::inbound(data, residual),
        })
    }

    /// Whether this packet is part of a fragmented datagram: more fragments
    /// follow, or it does not start at offset 0
    pub fn is_fragment(&self) -> bool {
        self.flags.unwrap_or(0) & Self::MORE_FRAGMENTS != 0 || self.offset.unwrap_or(0) != 0
    }

    /// Check the header checksum of the bytes this layer was parsed from or
    /// last serialized to.
    pub fn verify_checksum(&self) -> bool {
        let Some(bytes) = self.state.bytes() else {
            return false;
        };
        let header_len = ((bytes[0] & 0x0F) as usize * 4).max(Self::MIN_HEADER_SIZE);
        bytes.len() >= header_len && validate_checksum(&bytes[..header_len])
    }
}

fn check_range(field: &'static str, value: u64, max: u64) -> Result<()> {
    if value > max {
        return Err(Error::out_of_range(field, value, max));
    }
    Ok(())
}

impl Header for Ipv4 {
    fn name(&self) -> &'static str {
        "IPv4"
    }

    fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        field::push(&mut fields, "version", self.version);
        field::push(&mut fields, "ihl", self.ihl);
        field::push(&mut fields, "tos", self.tos);
        field::push(&mut fields, "length", self.length);
        field::push(&mut fields, "ident", self.ident);
        field::push(&mut fields, "flags", self.flags);
        field::push(&mut fields, "offset", self.offset);
        field::push(&mut fields, "ttl", self.ttl);
        field::push(&mut fields, "protocol", self.protocol);
        field::push(&mut fields, "checksum", self.checksum);
        field::push(&mut fields, "src", self.src);
        field::push(&mut fields, "dst", self.dst);
        if self.options.is_some() {
            fields.push(("options", FieldValue::Bytes(self.option_block())));
        }
        fields
    }

    fn state(&self) -> &LayerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LayerState {
        &mut self.state
    }
}
