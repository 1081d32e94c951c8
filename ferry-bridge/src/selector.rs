//! Frame selectors
//!
//! A [`Selector`] decides which captured frames the bridge mangles and
//! forwards. It wraps any [`Matcher`]: a layer chain (matched by re-parsing
//! the frame and comparing declared fields), an exact byte sequence, or a
//! closure.

use bytes::Bytes;
use ferry_packet::Layer;
use std::fmt;
use std::sync::Arc;

/// Predicate over raw frames
pub trait Matcher: Send + Sync {
    fn matches(&self, frame: &[u8]) -> bool;
}

impl Matcher for Layer {
    fn matches(&self, frame: &[u8]) -> bool {
        Layer::matches(self, frame)
    }
}

impl Matcher for Bytes {
    fn matches(&self, frame: &[u8]) -> bool {
        self.as_ref() == frame
    }
}

impl<F> Matcher for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn matches(&self, frame: &[u8]) -> bool {
        self(frame)
    }
}

/// A configured match value; cheap to clone
#[derive(Clone)]
pub struct Selector {
    matcher: Arc<dyn Matcher>,
    description: String,
}

impl Selector {
    /// Match frames whose parsed headers equal every field declared on
    /// `layer` and its linked inner layers
    pub fn layer(layer: Layer) -> Self {
        Self {
            description: layer.to_string(),
            matcher: Arc::new(layer),
        }
    }

    /// Match frames byte for byte
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            description: format!("Raw({} bytes)", data.len()),
            matcher: Arc::new(data),
        }
    }

    /// Match frames with an arbitrary predicate
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        Self {
            description: "predicate".to_string(),
            matcher: Arc::new(f),
        }
    }

    /// Match every frame
    pub fn any() -> Self {
        Self::predicate(|_| true)
    }

    pub fn matches(&self, frame: &[u8]) -> bool {
        self.matcher.matches(frame)
    }
}

impl From<Layer> for Selector {
    fn from(layer: Layer) -> Self {
        Selector::layer(layer)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.description).finish()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_packet::{ChainBuilder, Ethernet, Ipv4, Udp};
    use std::net::Ipv4Addr;

    fn frame(dst_port: u16) -> Vec<u8> {
        ChainBuilder::new()
            .ethernet(Ethernet::new())
            .ipv4(Ipv4::new().with_dst(Ipv4Addr::new(10, 0, 0, 2)))
            .udp(Udp::new().with_dst(dst_port))
            .build_bytes()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_layer_selector() {
        let selector = Selector::layer(
            ChainBuilder::new()
                .ethernet(Ethernet::new())
                .ipv4(Ipv4::new())
                .udp(Udp::new().with_dst(1234))
                .build()
                .unwrap(),
        );

        assert!(selector.matches(&frame(1234)));
        assert!(!selector.matches(&frame(4321)));
        assert!(!selector.matches(&[0u8; 4]));
    }

    #[test]
    fn test_bytes_selector() {
        let selector = Selector::bytes(frame(1234));
        assert!(selector.matches(&frame(1234)));
        assert!(!selector.matches(&frame(1235)));
        assert_eq!(selector.to_string(), "Raw(42 bytes)");
    }

    #[test]
    fn test_predicate_selector() {
        let selector = Selector::predicate(|frame| frame.len() > 40);
        assert!(selector.matches(&frame(1)));
        assert!(!selector.matches(&[0u8; 10]));
        assert!(Selector::any().matches(&[]));
    }

    #[test]
    fn test_selector_display() {
        let selector = Selector::from(Layer::from(Udp::new().with_dst(1234)));
        assert_eq!(selector.to_string(), "UDP(dst=1234)");
        assert_eq!(format!("{:?}", selector), "Selector(\"UDP(dst=1234)\")");
    }
}
