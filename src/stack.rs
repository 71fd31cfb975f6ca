//! Composing protocol layers into a packet chain
//!
//! [`stack`] is the one place where a header's discriminant field is kept
//! consistent with its actual payload type: the inner layer's
//! `bind_to_carrier` capability back-fills the outer header before the link
//! is made. Outer layers never need compile-time knowledge of the inner
//! types they can carry.

use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::raw::Raw;

/// Stack `inner` under `outer`, returning the combined chain
///
/// The inner layer first gets the chance to mutate the outer header's
/// discriminant field; restacking with a different inner type overwrites a
/// previously propagated value.
pub fn stack(mut outer: Box<dyn Layer>, inner: Box<dyn Layer>) -> Box<dyn Layer> {
    inner.bind_to_carrier(outer.as_mut());
    outer.set_payload(inner);
    outer
}

/// Fluent builder assembling a chain from outermost to innermost
///
/// # Examples
///
/// ```
/// use pktstack::{Ipv4, Layer, StackBuilder, Tcp};
///
/// let packet = StackBuilder::new()
///     .layer(Ipv4::default())
///     .layer(Tcp::new(1200, 80))
///     .payload(b"Hello world".to_vec())
///     .build()
///     .unwrap();
///
/// assert_eq!(packet.total_len(), 20 + 20 + 11);
/// ```
#[derive(Debug, Default)]
pub struct StackBuilder {
    layers: Vec<Box<dyn Layer>>,
}

impl StackBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next (inner) layer
    pub fn layer(mut self, layer: impl Layer + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Append raw payload bytes as the innermost layer
    pub fn payload(self, data: Vec<u8>) -> Self {
        self.layer(Raw::new(data))
    }

    /// Fold the layers into one chain, innermost first
    ///
    /// # Errors
    ///
    /// Returns an error if no layer was added.
    pub fn build(mut self) -> Result<Box<dyn Layer>> {
        let mut chain = self
            .layers
            .pop()
            .ok_or_else(|| Error::construction("at least one layer is required"))?;
        while let Some(outer) = self.layers.pop() {
            chain = stack(outer, chain);
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::{IpProtocol, Ipv4};
    use crate::layer::find_layer;
    use crate::tcp::Tcp;

    #[test]
    fn test_stack_propagates_discriminant() {
        let chain = stack(Box::new(Ipv4::default()), Box::new(Tcp::default()));
        let ip = chain.as_any().downcast_ref::<Ipv4>().unwrap();
        assert_eq!(ip.protocol, IpProtocol::TCP);
        assert_eq!(ip.payload().unwrap().name(), "TCP");
    }

    #[test]
    fn test_restacking_overwrites_discriminant() {
        let chain = stack(Box::new(Ipv4::default()), Box::new(Tcp::default()));
        // Replace the transport payload with an encapsulated IPv4
        let chain = stack(chain, Box::new(Ipv4::default()));
        let ip = chain.as_any().downcast_ref::<Ipv4>().unwrap();
        assert_eq!(ip.protocol, IpProtocol::IPIP);
        assert_eq!(ip.payload().unwrap().name(), "IPv4");
    }

    #[test]
    fn test_raw_inner_leaves_discriminant_alone() {
        let outer = Ipv4::default().with_protocol(IpProtocol::UDP);
        let chain = stack(Box::new(outer), Box::new(Raw::new(vec![1, 2])));
        let ip = chain.as_any().downcast_ref::<Ipv4>().unwrap();
        assert_eq!(ip.protocol, IpProtocol::UDP);
    }

    #[test]
    fn test_builder_folds_outermost_first() {
        let chain = StackBuilder::new()
            .layer(Ipv4::default())
            .layer(Tcp::new(1200, 80))
            .payload(b"Hello world".to_vec())
            .build()
            .unwrap();

        let ip = chain.as_any().downcast_ref::<Ipv4>().unwrap();
        assert_eq!(ip.protocol, IpProtocol::TCP);
        let tcp = find_layer::<Tcp>(chain.as_ref()).unwrap();
        assert_eq!(tcp.dport, 80);
        let raw = find_layer::<Raw>(chain.as_ref()).unwrap();
        assert_eq!(raw.data, b"Hello world");
    }

    #[test]
    fn test_builder_single_layer() {
        let chain = StackBuilder::new().layer(Tcp::default()).build().unwrap();
        assert_eq!(chain.name(), "TCP");
        assert!(chain.payload().is_none());
    }

    #[test]
    fn test_builder_requires_a_layer() {
        assert!(StackBuilder::new().build().is_err());
    }
}
