//! Chain builder for composing outbound layer chains with a fluent API
//!
//! Layers are stacked outermost-first: each call to [`ChainBuilder::ethernet`],
//! [`ChainBuilder::ipv4`] or [`ChainBuilder::udp`] adds a layer encapsulated by
//! the previous one.

use bytes::Bytes;
use ferry_core::{Error, Result};

use crate::ethernet::Ethernet;
use crate::ip::Ipv4;
use crate::layer::{Header, Layer};
use crate::udp::Udp;

/// Fluent builder for a linked chain of outbound layers
///
/// # Examples
///
/// ```
/// use std::net::Ipv4Addr;
/// use ferry_packet::{ChainBuilder, Ethernet, Ipv4, Udp};
///
/// let mut chain = ChainBuilder::new()
///     .ethernet(Ethernet::new())
///     .ipv4(Ipv4::new().with_dst(Ipv4Addr::new(123, 1, 1, 2)))
///     .udp(Udp::new().with_dst(1234))
///     .payload(vec![0x01, 0x02])
///     .build()
///     .unwrap();
///
/// assert_eq!(chain.serialize().unwrap().len(), 14 + 20 + 8 + 2);
/// ```
#[derive(Debug, Default)]
pub struct ChainBuilder {
    layers: Vec<Layer>,
    payload: Bytes,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an Ethernet layer
    pub fn ethernet(self, eth: Ethernet) -> Self {
        self.layer(eth.into())
    }

    /// Add an IPv4 layer
    pub fn ipv4(self, ip: Ipv4) -> Self {
        self.layer(ip.into())
    }

    /// Add a UDP layer
    pub fn udp(self, udp: Udp) -> Self {
        self.layer(udp.into())
    }

    /// Add any layer below the ones already stacked
    pub fn layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Raw bytes carried by the innermost layer
    pub fn payload(mut self, data: impl Into<Bytes>) -> Self {
        self.payload = data.into();
        self
    }

    /// Link the stacked layers into a chain
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no layer was added.
    pub fn build(self) -> Result<Layer> {
        let mut layers = self.layers.into_iter().rev();
        let mut chain = layers
            .next()
            .ok_or_else(|| Error::config("chain needs at least one layer"))?;

        if !self.payload.is_empty() {
            chain_payload(&mut chain, self.payload);
        }

        for mut outer in layers {
            outer.set_next(chain);
            chain = outer;
        }
        Ok(chain)
    }

    /// Build the chain and serialize it
    pub fn build_bytes(self) -> Result<Bytes> {
        self.build()?.serialize()
    }

    /// Build the chain, serialize it and hand the bytes to `tx`
    pub fn send<F>(self, mut tx: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let bytes = self.build_bytes()?;
        tx(&bytes)
    }
}

fn chain_payload(layer: &mut Layer, payload: Bytes) {
    let state = match layer {
        Layer::Ethernet(eth) => eth.state_mut(),
        Layer::Ipv4(ip) => ip.state_mut(),
        Layer::Udp(udp) => udp.state_mut(),
    };
    state.residual = payload;
}
