//! TCP header construction and parsing
//!
//! Mirrors the IPv4 module: a fixed 20-byte header, an options area declared
//! by the data-offset field in 32-bit words, and optional computed fields.
//! The NS flag lives outside the main flags byte, in bit 0 of the data-offset
//! byte, and is folded into the [`FlagSet`] as bit 0x100.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::checksum::transport_checksum;
use crate::context::DecodeContext;
use crate::error::{Error, Result};
use crate::flags::{Flag, FlagSet};
use crate::ip::{IpProtocol, Ipv4};
use crate::layer::{Layer, LayerDescriptor};
use crate::options::{decode_options, encode_options, options_wire_len, TlvOption};
use crate::reader::ByteReader;

/// TCP header flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpFlag {
    Fin,
    Syn,
    Rst,
    Psh,
    Ack,
    Urg,
    Ece,
    Cwr,
    Ns,
}

impl Flag for TcpFlag {
    const ALL: &'static [TcpFlag] = &[
        TcpFlag::Fin,
        TcpFlag::Syn,
        TcpFlag::Rst,
        TcpFlag::Psh,
        TcpFlag::Ack,
        TcpFlag::Urg,
        TcpFlag::Ece,
        TcpFlag::Cwr,
        TcpFlag::Ns,
    ];

    fn bits(self) -> u16 {
        match self {
            TcpFlag::Fin => 0x001,
            TcpFlag::Syn => 0x002,
            TcpFlag::Rst => 0x004,
            TcpFlag::Psh => 0x008,
            TcpFlag::Ack => 0x010,
            TcpFlag::Urg => 0x020,
            TcpFlag::Ece => 0x040,
            TcpFlag::Cwr => 0x080,
            TcpFlag::Ns => 0x100,
        }
    }

    fn label(self) -> &'static str {
        match self {
            TcpFlag::Fin => "FIN",
            TcpFlag::Syn => "SYN",
            TcpFlag::Rst => "RST",
            TcpFlag::Psh => "PSH",
            TcpFlag::Ack => "ACK",
            TcpFlag::Urg => "URG",
            TcpFlag::Ece => "ECE",
            TcpFlag::Cwr => "CWR",
            TcpFlag::Ns => "NS",
        }
    }
}

/// One TCP option entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcpOption {
    /// End of options list (kind 0), terminates the option area
    EndOfOptions,
    /// No-operation padding (kind 1)
    Nop,
    /// Maximum segment size (kind 2)
    MaxSegmentSize(u16),
    /// Window scale shift count (kind 3)
    WindowScale(u8),
    /// SACK permitted (kind 4)
    SackPermitted,
    /// Timestamp value and echo reply (kind 8)
    Timestamp { tsval: u32, tsecr: u32 },
    /// Any other kind, kept as its raw value bytes
    Unknown { kind: u8, data: Vec<u8> },
}

impl TcpOption {
    fn expect_len(reader: &mut ByteReader<'_>, expected: usize) -> Result<()> {
        let len = reader.read_u8()? as usize;
        if len != expected {
            return Err(Error::malformed("tcp option length", len as u32));
        }
        Ok(())
    }
}

impl TlvOption for TcpOption {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self> {
        let kind = reader.read_u8()?;
        match kind {
            0 => Ok(TcpOption::EndOfOptions),
            1 => Ok(TcpOption::Nop),
            2 => {
                Self::expect_len(reader, 4)?;
                Ok(TcpOption::MaxSegmentSize(reader.read_u16()?))
            }
            3 => {
                Self::expect_len(reader, 3)?;
                Ok(TcpOption::WindowScale(reader.read_u8()?))
            }
            4 => {
                Self::expect_len(reader, 2)?;
                Ok(TcpOption::SackPermitted)
            }
            8 => {
                Self::expect_len(reader, 10)?;
                Ok(TcpOption::Timestamp {
                    tsval: reader.read_u32()?,
                    tsecr: reader.read_u32()?,
                })
            }
            kind => {
                let len = reader.read_u8()? as usize;
                if len < 2 {
                    return Err(Error::malformed("tcp option length", len as u32));
                }
                let data = reader.read_bytes(len - 2)?.to_vec();
                Ok(TcpOption::Unknown { kind, data })
            }
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        match self {
            TcpOption::EndOfOptions => buf.put_u8(0),
            TcpOption::Nop => buf.put_u8(1),
            TcpOption::MaxSegmentSize(mss) => {
                buf.put_u8(2);
                buf.put_u8(4);
                buf.put_u16(*mss);
            }
            TcpOption::WindowScale(shift) => {
                buf.put_u8(3);
                buf.put_u8(3);
                buf.put_u8(*shift);
            }
            TcpOption::SackPermitted => {
                buf.put_u8(4);
                buf.put_u8(2);
            }
            TcpOption::Timestamp { tsval, tsecr } => {
                buf.put_u8(8);
                buf.put_u8(10);
                buf.put_u32(*tsval);
                buf.put_u32(*tsecr);
            }
            TcpOption::Unknown { kind, data } => {
                buf.put_u8(*kind);
                buf.put_u8((data.len() + 2) as u8);
                buf.put_slice(data);
            }
        }
    }

    fn wire_len(&self) -> usize {
        match self {
            TcpOption::EndOfOptions | TcpOption::Nop => 1,
            TcpOption::SackPermitted => 2,
            TcpOption::WindowScale(_) => 3,
            TcpOption::MaxSegmentSize(_) => 4,
            TcpOption::Timestamp { .. } => 10,
            TcpOption::Unknown { data, .. } => data.len() + 2,
        }
    }

    fn is_end(&self) -> bool {
        matches!(self, TcpOption::EndOfOptions)
    }

    fn is_nop(&self) -> bool {
        matches!(self, TcpOption::Nop)
    }
}

/// A TCP header and its payload chain
#[derive(Debug)]
pub struct Tcp {
    /// Source port
    pub sport: u16,
    /// Destination port
    pub dport: u16,
    /// Sequence number
    pub seq: u32,
    /// Acknowledgment number
    pub ack: u32,
    /// Header length in 32-bit words; computed from the options when unset
    pub dataofs: Option<u8>,
    /// Reserved bits (3 bits)
    pub reserved: u8,
    /// Header flags
    pub flags: FlagSet<TcpFlag>,
    /// Receive window size
    pub window: u16,
    /// Checksum; encoded as zero when unset, see [`Tcp::compute_checksum`]
    pub checksum: Option<u16>,
    /// Urgent pointer
    pub urgptr: u16,
    /// Option entries in wire order
    pub options: Vec<TcpOption>,
    payload: Option<Box<dyn Layer>>,
}

impl Tcp {
    /// Fixed header size without options
    pub const BASE_HEADER_SIZE: usize = 20;

    /// Create a header from `sport` to `dport`
    pub fn new(sport: u16, dport: u16) -> Self {
        Tcp {
            sport,
            dport,
            ..Tcp::default()
        }
    }

    /// Set the sequence and acknowledgment numbers
    pub fn with_seq_ack(mut self, seq: u32, ack: u32) -> Self {
        self.seq = seq;
        self.ack = ack;
        self
    }

    /// Set the header flags
    pub fn with_flags(mut self, flags: FlagSet<TcpFlag>) -> Self {
        self.flags = flags;
        self
    }

    /// Set the receive window
    pub fn with_window(mut self, window: u16) -> Self {
        self.window = window;
        self
    }

    /// Set the option entries
    pub fn with_options(mut self, options: Vec<TcpOption>) -> Self {
        self.options = options;
        self
    }

    /// Fill in the checksum over the pseudo-header and the whole segment
    ///
    /// TCP checksums cover the enclosing addresses, so they cannot be derived
    /// from this layer alone; callers that want a valid checksum pass the
    /// addresses explicitly.
    pub fn compute_checksum(&mut self, src: Ipv4Addr, dst: Ipv4Addr) {
        self.checksum = Some(0);
        let segment = self.to_bytes();
        self.checksum = Some(transport_checksum(
            &src.octets(),
            &dst.octets(),
            IpProtocol::TCP.to_u8(),
            &segment,
        ));
    }

    /// Parse a TCP header and its payload chain from `data`
    pub fn from_bytes(data: &[u8], ctx: &DecodeContext) -> Option<Self> {
        Self::decode(&mut ByteReader::new(data), ctx)
    }

    /// Decode entry point; any internal failure is reported as `None`
    pub fn decode(reader: &mut ByteReader<'_>, ctx: &DecodeContext) -> Option<Self> {
        match Self::decode_inner(reader, ctx) {
            Ok(tcp) => Some(tcp),
            Err(e) => {
                debug!(error = %e, "failed to parse bytes as a TCP header");
                None
            }
        }
    }

    fn decode_inner(reader: &mut ByteReader<'_>, ctx: &DecodeContext) -> Result<Self> {
        let sport = reader.read_u16()?;
        let dport = reader.read_u16()?;
        let seq = reader.read_u32()?;
        let ack = reader.read_u32()?;

        let offset_byte = reader.read_u8()?;
        let dataofs = offset_byte >> 4;
        let reserved = (offset_byte >> 1) & 0x07;
        let ns = (offset_byte & 0x01) as u16;

        let flags_byte = reader.read_u8()?;
        let flags = FlagSet::from_bits(flags_byte as u16 | (ns << 8));

        let window = reader.read_u16()?;
        let checksum = reader.read_u16()?;
        let urgptr = reader.read_u16()?;

        let budget = (dataofs as usize).saturating_sub(5) * 4;
        let options = decode_options::<TcpOption>(reader, budget);

        let mut tcp = Tcp {
            sport,
            dport,
            seq,
            ack,
            dataofs: Some(dataofs),
            reserved,
            flags,
            window,
            checksum: Some(checksum),
            urgptr,
            options,
            payload: None,
        };
        tcp.payload = ctx.decode_payload(reader, &tcp);
        Ok(tcp)
    }
}

impl Default for Tcp {
    fn default() -> Self {
        Tcp {
            sport: 20,
            dport: 80,
            seq: 0,
            ack: 0,
            dataofs: None,
            reserved: 0,
            flags: FlagSet::of(&[TcpFlag::Syn]),
            window: 8192,
            checksum: None,
            urgptr: 0,
            options: Vec::new(),
            payload: None,
        }
    }
}

impl Layer for Tcp {
    fn name(&self) -> &'static str {
        "TCP"
    }

    fn header_len(&self) -> usize {
        let options_bytes = options_wire_len(&self.options);
        Self::BASE_HEADER_SIZE + ((options_bytes + 3) & !3)
    }

    fn write_header(&self, buf: &mut BytesMut) {
        let header_len = self.header_len();
        let dataofs = self.dataofs.unwrap_or((header_len / 4) as u8);
        let ns = if self.flags.contains(TcpFlag::Ns) { 1 } else { 0 };

        let mut header = BytesMut::with_capacity(header_len);
        header.put_u16(self.sport);
        header.put_u16(self.dport);
        header.put_u32(self.seq);
        header.put_u32(self.ack);
        header.put_u8((dataofs << 4) | ((self.reserved & 0x07) << 1) | ns);
        header.put_u8((self.flags.bits() & 0xFF) as u8);
        header.put_u16(self.window);
        header.put_u16(self.checksum.unwrap_or(0));
        header.put_u16(self.urgptr);
        encode_options(&self.options, &mut header);
        header.resize(header_len, 0);

        buf.put_slice(&header);
    }

    fn payload(&self) -> Option<&dyn Layer> {
        self.payload.as_deref()
    }

    fn payload_mut(&mut self) -> Option<&mut (dyn Layer + 'static)> {
        self.payload.as_deref_mut()
    }

    fn set_payload(&mut self, payload: Box<dyn Layer>) {
        self.payload = Some(payload);
    }

    fn bind_to_carrier(&self, carrier: &mut dyn Layer) {
        if let Some(outer) = carrier.as_any_mut().downcast_mut::<Ipv4>() {
            outer.protocol = IpProtocol::TCP;
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl fmt::Display for Tcp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TCP {} > {} seq={} ack={} flags={}",
            self.sport, self.dport, self.seq, self.ack, self.flags,
        )
    }
}

fn decode_boxed(reader: &mut ByteReader<'_>, ctx: &DecodeContext) -> Option<Box<dyn Layer>> {
    Tcp::decode(reader, ctx).map(|tcp| Box::new(tcp) as Box<dyn Layer>)
}

fn default_boxed() -> Box<dyn Layer> {
    Box::new(Tcp::default())
}

fn is_tcp(layer: &dyn Layer) -> bool {
    layer.as_any().is::<Tcp>()
}

pub static DESCRIPTOR: LayerDescriptor = LayerDescriptor {
    name: "TCP",
    decode: decode_boxed,
    default_instance: default_boxed,
    is_instance: is_tcp,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::Raw;

    #[test]
    fn test_default_header_is_20_bytes() {
        let tcp = Tcp::default();
        assert_eq!(tcp.header_len(), 20);
        assert_eq!(tcp.to_bytes().len(), 20);
    }

    #[test]
    fn test_encode_layout() {
        let tcp = Tcp::new(12345, 80)
            .with_seq_ack(1000, 2000)
            .with_flags(FlagSet::of(&[TcpFlag::Syn]))
            .with_window(65535);
        let bytes = tcp.to_bytes();

        assert_eq!(u16::from_be_bytes([bytes[0], bytes[1]]), 12345);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 80);
        assert_eq!(
            u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            1000
        );
        assert_eq!(
            u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            2000
        );
        assert_eq!(bytes[12] >> 4, 5);
        assert_eq!(bytes[13], 0x02);
        assert_eq!(u16::from_be_bytes([bytes[14], bytes[15]]), 65535);
    }

    #[test]
    fn test_roundtrip_without_options() {
        let tcp = Tcp::new(1200, 80)
            .with_seq_ack(7, 9)
            .with_flags(FlagSet::of(&[TcpFlag::Syn, TcpFlag::Ack]));
        let bytes = tcp.to_bytes();

        let ctx = DecodeContext::new();
        let decoded = Tcp::from_bytes(&bytes, &ctx).unwrap();
        assert_eq!(decoded.sport, 1200);
        assert_eq!(decoded.dport, 80);
        assert_eq!(decoded.seq, 7);
        assert_eq!(decoded.ack, 9);
        assert_eq!(decoded.dataofs, Some(5));
        assert_eq!(decoded.flags, tcp.flags);
        assert_eq!(decoded.window, 8192);
        assert!(decoded.options.is_empty());
    }

    #[test]
    fn test_roundtrip_with_options() {
        let options = vec![
            TcpOption::Nop,
            TcpOption::Nop,
            TcpOption::Timestamp {
                tsval: 1489416311,
                tsecr: 1,
            },
        ];
        let tcp = Tcp::default().with_options(options.clone());
        // 12 option bytes, already word-aligned
        assert_eq!(tcp.header_len(), 32);
        let bytes = tcp.to_bytes();

        let ctx = DecodeContext::new();
        let decoded = Tcp::from_bytes(&bytes, &ctx).unwrap();
        assert_eq!(decoded.dataofs, Some(8));
        assert_eq!(decoded.options, options);
    }

    #[test]
    fn test_header_len_rounds_up_unaligned_options() {
        // NOP + MSS is 5 bytes; the header grows by a full 8-byte area.
        let tcp = Tcp::default().with_options(vec![
            TcpOption::Nop,
            TcpOption::MaxSegmentSize(1460),
        ]);
        assert_eq!(tcp.header_len(), 28);
        assert_eq!(tcp.to_bytes().len(), 28);
    }

    #[test]
    fn test_ns_flag_rides_the_offset_byte() {
        let tcp = Tcp::default().with_flags(FlagSet::of(&[TcpFlag::Ns, TcpFlag::Ack]));
        let bytes = tcp.to_bytes();
        assert_eq!(bytes[12] & 0x01, 1);
        assert_eq!(bytes[13], 0x10);

        let ctx = DecodeContext::new();
        let decoded = Tcp::from_bytes(&bytes, &ctx).unwrap();
        assert!(decoded.flags.contains(TcpFlag::Ns));
        assert!(decoded.flags.contains(TcpFlag::Ack));
        assert_eq!(decoded.flags.len(), 2);
    }

    #[test]
    fn test_malformed_typed_option_stops_loop() {
        // MSS with a wrong declared length; the NOP before it is kept.
        let mut tcp = Tcp::default();
        tcp.dataofs = Some(7);
        let mut bytes = tcp.to_bytes();
        bytes.extend_from_slice(&[1, 2, 5, 0xB4, 0, 0, 0, 0]);

        let ctx = DecodeContext::new();
        let decoded = Tcp::from_bytes(&bytes, &ctx).unwrap();
        assert_eq!(decoded.options, vec![TcpOption::Nop]);
    }

    #[test]
    fn test_checksum_is_valid_over_pseudo_header() {
        let src = Ipv4Addr::new(192, 168, 1, 1);
        let dst = Ipv4Addr::new(192, 168, 1, 2);
        let mut tcp = Tcp::new(12345, 80);
        tcp.set_payload(Box::new(Raw::new(vec![1, 2, 3, 4])));
        tcp.compute_checksum(src, dst);
        assert_ne!(tcp.checksum, Some(0));

        let segment = tcp.to_bytes();
        let check = transport_checksum(&src.octets(), &dst.octets(), 6, &segment);
        // A correct stored checksum makes the recomputation come out as zero.
        assert_eq!(check, 0);
    }

    #[test]
    fn test_payload_decodes_as_raw() {
        let mut tcp = Tcp::default();
        tcp.set_payload(Box::new(Raw::new(b"Hello world".to_vec())));
        let bytes = tcp.to_bytes();

        let ctx = DecodeContext::standard();
        let decoded = Tcp::from_bytes(&bytes, &ctx).unwrap();
        let raw = decoded
            .payload()
            .unwrap()
            .as_any()
            .downcast_ref::<Raw>()
            .unwrap();
        assert_eq!(raw.data, b"Hello world");
    }

    #[test]
    fn test_truncated_header_fails_decode() {
        let ctx = DecodeContext::new();
        assert!(Tcp::from_bytes(&[0x30, 0x39, 0x00], &ctx).is_none());
    }
}
