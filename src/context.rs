//! Cross-layer dispatch: which protocol decodes the bytes after a header
//!
//! The registry maps (carrier type, discriminant value) pairs to protocol
//! descriptors. It is built explicitly and passed to decode calls rather than
//! living in ambient global state, so tests can run against a minimal table.
//! During decoding it is read-only; decoding independent buffers against a
//! shared context needs no coordination.

use std::any::TypeId;
use std::collections::HashMap;

use tracing::debug;

use crate::layer::{Layer, LayerDescriptor};
use crate::raw::Raw;
use crate::reader::ByteReader;

/// Registry of payload decoders keyed by carrier type and discriminant
#[derive(Debug, Default)]
pub struct DecodeContext {
    bindings: HashMap<(TypeId, u16), &'static LayerDescriptor>,
}

impl DecodeContext {
    /// Create an empty context: every payload decodes as [`Raw`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with the built-in protocol bindings
    pub fn standard() -> Self {
        let mut ctx = Self::new();
        ctx.bind::<crate::ip::Ipv4>(
            crate::ip::IpProtocol::TCP.to_u8() as u16,
            &crate::tcp::DESCRIPTOR,
        );
        // IP-in-IP: an IPv4 header may itself carry IPv4
        ctx.bind::<crate::ip::Ipv4>(
            crate::ip::IpProtocol::IPIP.to_u8() as u16,
            &crate::ip::DESCRIPTOR,
        );
        ctx
    }

    /// Register `descriptor` as the decoder for payloads of `Carrier` headers
    /// whose discriminant field equals `discriminant`
    pub fn bind<Carrier: Layer + 'static>(
        &mut self,
        discriminant: u16,
        descriptor: &'static LayerDescriptor,
    ) {
        debug!(
            protocol = descriptor.name,
            discriminant, "binding payload decoder"
        );
        self.bindings
            .insert((TypeId::of::<Carrier>(), discriminant), descriptor);
    }

    /// Look up the descriptor bound for a carrier's discriminant value
    pub fn lookup(&self, carrier: TypeId, discriminant: u16) -> Option<&'static LayerDescriptor> {
        self.bindings.get(&(carrier, discriminant)).copied()
    }

    /// Decode the bytes remaining after `outer` as its payload
    ///
    /// Returns `None` only when no bytes remain. An unregistered discriminant,
    /// a carrier with no discriminant field, or a failing bound decoder all
    /// fall back to an opaque [`Raw`] layer holding the remaining bytes
    /// verbatim; failure never propagates upward.
    pub fn decode_payload(
        &self,
        reader: &mut ByteReader<'_>,
        outer: &dyn Layer,
    ) -> Option<Box<dyn Layer>> {
        let rest = reader.take_rest();
        if rest.is_empty() {
            return None;
        }

        let descriptor = outer
            .payload_discriminant()
            .and_then(|d| self.lookup(outer.as_any().type_id(), d));

        let Some(descriptor) = descriptor else {
            return Some(Box::new(Raw::new(rest.to_vec())));
        };

        let mut sub = ByteReader::new(rest);
        match (descriptor.decode)(&mut sub, self) {
            Some(inner) => Some(inner),
            None => {
                debug!(
                    protocol = descriptor.name,
                    len = rest.len(),
                    "payload did not decode, keeping raw bytes"
                );
                Some(Box::new(Raw::new(rest.to_vec())))
            }
        }
    }
}
