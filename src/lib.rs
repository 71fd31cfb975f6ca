//! Layered network packet construction and parsing
//!
//! This crate models a packet as a chain of protocol layers, outermost header
//! first, and converts between that representation and the wire byte
//! sequence. It ships two concrete header types (IPv4 and TCP) plus an opaque
//! raw layer, but the machinery is generic:
//!
//! - [`reader`] - forward-only big-endian reads over a byte buffer
//! - [`flags`] - immutable flag sets over closed bit enumerations
//! - [`options`] - the TLV option loop shared by every header with options
//! - [`layer`] - the [`Layer`] trait, per-protocol descriptors, chain lookup
//! - [`context`] - dispatch from a header's discriminant field to the decoder
//!   for the bytes that follow it
//! - [`stack`] - composing layers while keeping discriminant fields
//!   consistent with the actual payload type
//! - [`checksum`] - RFC 1071 checksums
//!
//! Decoding is total: a byte run that is not a valid header of the attempted
//! type yields `None` for that layer, and any payload no decoder claims is
//! kept verbatim as a [`Raw`] layer. Encoding mirrors the decode layout
//! exactly, computing length and checksum fields that were left unset.
//!
//! # Quick start
//!
//! ```
//! use pktstack::{
//!     find_layer, DecodeContext, FlagSet, Ipv4, Layer, Raw, StackBuilder, Tcp, TcpFlag,
//! };
//!
//! // Build: the TCP layer back-fills the IPv4 protocol field on stacking.
//! let wire = StackBuilder::new()
//!     .layer(Ipv4::default())
//!     .layer(Tcp::new(1200, 80).with_flags(FlagSet::of(&[TcpFlag::Syn])))
//!     .payload(b"Hello world".to_vec())
//!     .build()
//!     .unwrap()
//!     .to_bytes();
//!
//! // Parse it back against an explicit dispatch table.
//! let ctx = DecodeContext::standard();
//! let packet = Ipv4::from_bytes(&wire, &ctx).unwrap();
//!
//! let tcp = find_layer::<Tcp>(&packet).unwrap();
//! assert_eq!(tcp.dport, 80);
//! assert!(tcp.flags.contains(TcpFlag::Syn));
//! assert_eq!(find_layer::<Raw>(&packet).unwrap().data, b"Hello world");
//! ```
//!
//! There is no I/O here: capturing or transmitting the bytes belongs to the
//! caller.

pub mod checksum;
pub mod context;
pub mod error;
pub mod flags;
pub mod ip;
pub mod layer;
pub mod options;
pub mod raw;
pub mod reader;
pub mod stack;
pub mod tcp;

// Re-export commonly used types for convenience
pub use checksum::{internet_checksum, transport_checksum, validate_checksum};
pub use context::DecodeContext;
pub use error::{Error, Result};
pub use flags::{Flag, FlagSet};
pub use ip::{Ecn, IpFlag, IpOption, IpProtocol, Ipv4, ProtocolNames};
pub use layer::{find_layer, has_layer, Layer, LayerDescriptor};
pub use options::{decode_options, options_wire_len, TlvOption};
pub use raw::Raw;
pub use reader::ByteReader;
pub use stack::{stack, StackBuilder};
pub use tcp::{Tcp, TcpFlag, TcpOption};
