//! Field values exposed by the layer codecs

use bytes::Bytes;
use ferry_core::MacAddr;
use std::fmt;
use std::net::Ipv4Addr;

/// A single declared header field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// 6-byte hardware address
    Mac(MacAddr),
    /// IPv4 address
    Addr(Ipv4Addr),
    /// Unsigned integer field (4, 8, 13 or 16 bits wide on the wire)
    Uint(u16),
    /// Opaque byte block (IPv4 options)
    Bytes(Bytes),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Mac(mac) => write!(f, "{}", mac),
            FieldValue::Addr(addr) => write!(f, "{}", addr),
            FieldValue::Uint(value) => write!(f, "{}", value),
            FieldValue::Bytes(bytes) => {
                for byte in bytes.iter() {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl From<MacAddr> for FieldValue {
    fn from(mac: MacAddr) -> Self {
        FieldValue::Mac(mac)
    }
}

impl From<Ipv4Addr> for FieldValue {
    fn from(addr: Ipv4Addr) -> Self {
        FieldValue::Addr(addr)
    }
}

impl From<u8> for FieldValue {
    fn from(value: u8) -> Self {
        FieldValue::Uint(value as u16)
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        FieldValue::Uint(value)
    }
}

/// Declared fields of a layer, in wire order
pub type Fields = Vec<(&'static str, FieldValue)>;

/// Pushes `(name, value)` onto `fields` when the field is declared
pub(crate) fn push<T: Into<FieldValue>>(fields: &mut Fields, name: &'static str, value: Option<T>) {
    if let Some(value) = value {
        fields.push((name, value.into()));
    }
}
