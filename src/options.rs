//! Generic TLV option decoding shared by every header type carrying options
//!
//! Both IPv4 and TCP append a run of type-length-value entries after their
//! fixed 20-byte header. The run is bounded by a byte budget derived from the
//! header's length-indicator field; the loop below owns the termination rules
//! so the per-protocol option types only have to know their own wire format.

use bytes::BytesMut;
use tracing::trace;

use crate::error::Result;
use crate::reader::ByteReader;

/// One variable-length option entry of a specific protocol
pub trait TlvOption: Sized {
    /// Decode a single entry, starting at its kind byte
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self>;

    /// Append this entry's wire bytes
    fn encode(&self, buf: &mut BytesMut);

    /// Encoded length in bytes (kind + length + value; 1 for the sentinels)
    fn wire_len(&self) -> usize;

    /// Whether this is the end-of-options terminator
    fn is_end(&self) -> bool;

    /// Whether this is the single-byte no-operation padding entry
    fn is_nop(&self) -> bool;
}

/// Decode a bounded run of options
///
/// `budget` is the declared size of the options area in bytes. The loop stops
/// when the budget is spent, when an entry fails to decode (the partial
/// sequence is kept, not an error), or immediately after an end-of-options
/// entry even if budget remains.
pub fn decode_options<O: TlvOption>(reader: &mut ByteReader<'_>, budget: usize) -> Vec<O> {
    let mut remaining = budget as isize;
    let mut options = Vec::new();

    while remaining > 0 {
        let option = match O::decode(reader) {
            Ok(option) => option,
            Err(e) => {
                trace!(error = %e, "stopping option loop on undecodable entry");
                break;
            }
        };
        let is_end = option.is_end();
        let step = if option.is_nop() {
            1
        } else {
            option.wire_len() as isize
        };
        options.push(option);
        if is_end {
            // The terminator ends the option area even with budget left.
            break;
        }
        remaining -= step;
    }

    options
}

/// Total encoded size of an option sequence
///
/// An option reporting a zero wire length still occupies at least its kind
/// byte, so it counts as 1 here; without the floor a malformed option could
/// make the header-size computation understate the header.
pub fn options_wire_len<O: TlvOption>(options: &[O]) -> usize {
    options
        .iter()
        .map(|o| o.wire_len().max(1))
        .sum()
}

/// Append an option sequence to `buf` in order
pub fn encode_options<O: TlvOption>(options: &[O], buf: &mut BytesMut) {
    for option in options {
        option.encode(buf);
    }
}
