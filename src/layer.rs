//! The protocol layer abstraction
//!
//! A decoded packet is a singly-linked chain of [`Layer`] instances from the
//! outermost header to the innermost payload. Each instance exclusively owns
//! the rest of the chain below it; there are no cycles and no sharing.

use std::any::Any;
use std::fmt;

use bytes::BytesMut;

use crate::context::DecodeContext;
use crate::reader::ByteReader;

/// One protocol header (or opaque payload) in a packet chain
pub trait Layer: fmt::Debug {
    /// Stable protocol name, e.g. "IPv4"
    fn name(&self) -> &'static str;

    /// Wire size of this header alone, in bytes
    fn header_len(&self) -> usize;

    /// Append this header's wire bytes (not the payload's)
    fn write_header(&self, buf: &mut BytesMut);

    /// The next layer down, if any
    fn payload(&self) -> Option<&dyn Layer>;

    /// Mutable access to the next layer down
    fn payload_mut(&mut self) -> Option<&mut (dyn Layer + 'static)>;

    /// Replace the payload link
    fn set_payload(&mut self, payload: Box<dyn Layer>);

    /// The discriminant value this header carries to identify its payload
    /// type, if it has such a field
    fn payload_discriminant(&self) -> Option<u16> {
        None
    }

    /// Back-fill the carrier's discriminant field for this layer's type
    ///
    /// Invoked by the stacking builder with the enclosing (outer) layer.
    /// The default does nothing; layers that know how they are identified
    /// inside a given carrier override this and mutate the carrier.
    fn bind_to_carrier(&self, _carrier: &mut dyn Layer) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Wire size of this layer and everything below it
    fn total_len(&self) -> usize {
        self.header_len() + self.payload().map_or(0, |p| p.total_len())
    }

    /// Serialize the whole chain, outermost header first
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.total_len());
        self.write_header(&mut buf);
        if let Some(payload) = self.payload() {
            write_chain(payload, &mut buf);
        }
        buf.to_vec()
    }
}

fn write_chain(layer: &dyn Layer, buf: &mut BytesMut) {
    layer.write_header(buf);
    if let Some(payload) = layer.payload() {
        write_chain(payload, buf);
    }
}

/// Decode entry point stored in the dispatch registry
///
/// Never panics and never surfaces an error: any internal failure is caught,
/// logged, and reported as `None`, meaning "this byte run is not a valid
/// instance of this protocol".
pub type DecodeFn = fn(&mut ByteReader<'_>, &DecodeContext) -> Option<Box<dyn Layer>>;

/// Per-protocol-type descriptor: identity, defaults, and the decode entry
///
/// Each protocol module exposes one of these as a `static`, registered into a
/// [`DecodeContext`] under the discriminant values that identify it.
pub struct LayerDescriptor {
    /// Stable protocol name
    pub name: &'static str,
    /// Decode entry point
    pub decode: DecodeFn,
    /// A default-valued instance (optional fields absent, required fields at
    /// their documented defaults)
    pub default_instance: fn() -> Box<dyn Layer>,
    /// Type-test predicate over a polymorphic layer value
    pub is_instance: fn(&dyn Layer) -> bool,
}

impl fmt::Debug for LayerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// Walk the chain from `layer` downward and return the first instance of `T`
pub fn find_layer<T: Layer + 'static>(layer: &dyn Layer) -> Option<&T> {
    let mut current = layer;
    loop {
        if let Some(found) = current.as_any().downcast_ref::<T>() {
            return Some(found);
        }
        current = current.payload()?;
    }
}

/// Whether the chain from `layer` downward contains an instance of `T`
pub fn has_layer<T: Layer + 'static>(layer: &dyn Layer) -> bool {
    find_layer::<T>(layer).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::Ipv4;
    use crate::raw::Raw;
    use crate::tcp::Tcp;

    #[test]
    fn test_find_layer_walks_the_chain() {
        let mut ip = Ipv4::default();
        let mut tcp = Tcp::default();
        tcp.set_payload(Box::new(Raw::new(vec![1, 2, 3])));
        ip.set_payload(Box::new(tcp));

        assert!(has_layer::<Tcp>(&ip));
        let raw = find_layer::<Raw>(&ip).unwrap();
        assert_eq!(raw.data, vec![1, 2, 3]);
        assert!(find_layer::<Tcp>(&ip).is_some());
    }

    #[test]
    fn test_find_layer_missing_type() {
        let ip = Ipv4::default();
        assert!(!has_layer::<Tcp>(&ip));
    }

    #[test]
    fn test_total_len_sums_the_chain() {
        let mut ip = Ipv4::default();
        let mut tcp = Tcp::default();
        tcp.set_payload(Box::new(Raw::new(vec![0; 11])));
        ip.set_payload(Box::new(tcp));

        assert_eq!(ip.total_len(), 20 + 20 + 11);
    }

    #[test]
    fn test_descriptor_type_test() {
        let ip = Ipv4::default();
        let tcp = Tcp::default();
        assert!((crate::ip::DESCRIPTOR.is_instance)(&ip));
        assert!(!(crate::ip::DESCRIPTOR.is_instance)(&tcp));
        assert!((crate::tcp::DESCRIPTOR.is_instance)(&tcp));
    }

    #[test]
    fn test_descriptor_default_instance() {
        let layer = (crate::tcp::DESCRIPTOR.default_instance)();
        assert_eq!(layer.name(), "TCP");
        assert_eq!(layer.header_len(), 20);
        assert!(layer.payload().is_none());
    }
}
