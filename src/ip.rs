//! IPv4 header construction and parsing
//!
//! The header is the fixed 20 bytes followed by an options area whose size is
//! declared by the IHL field in 32-bit words. Optional fields (`ihl`,
//! `total_length`, `checksum`) are computed at encode time when unset, so a
//! hand-built header stays consistent as layers are stacked under it.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::checksum::internet_checksum;
use crate::context::DecodeContext;
use crate::error::{Error, Result};
use crate::flags::{Flag, FlagSet};
use crate::layer::{Layer, LayerDescriptor};
use crate::options::{decode_options, encode_options, options_wire_len, TlvOption};
use crate::reader::ByteReader;

/// IP protocol numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    /// ICMP (1)
    ICMP,
    /// IGMP (2)
    IGMP,
    /// IP-in-IP encapsulation (4)
    IPIP,
    /// TCP (6)
    TCP,
    /// UDP (17)
    UDP,
    /// GRE (47)
    GRE,
    /// Custom protocol number
    Custom(u8),
}

impl IpProtocol {
    pub fn to_u8(self) -> u8 {
        match self {
            IpProtocol::ICMP => 1,
            IpProtocol::IGMP => 2,
            IpProtocol::IPIP => 4,
            IpProtocol::TCP => 6,
            IpProtocol::UDP => 17,
            IpProtocol::GRE => 47,
            IpProtocol::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => IpProtocol::ICMP,
            2 => IpProtocol::IGMP,
            4 => IpProtocol::IPIP,
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            47 => IpProtocol::GRE,
            val => IpProtocol::Custom(val),
        }
    }
}

/// Display-name lookup for protocol numbers
///
/// Used only when rendering a header for humans; no decode or encode path
/// reads it. Callers may extend it at any time, but it is not internally
/// synchronized, so concurrent mutation is the caller's responsibility.
#[derive(Debug, Clone)]
pub struct ProtocolNames {
    names: HashMap<u8, String>,
}

impl ProtocolNames {
    /// Register a display name for a protocol number
    pub fn insert<S: Into<String>>(&mut self, code: u8, name: S) {
        self.names.insert(code, name.into());
    }

    /// The registered name, or the numeric value as text
    pub fn name_of(&self, code: u8) -> String {
        self.names
            .get(&code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

impl Default for ProtocolNames {
    fn default() -> Self {
        let mut names = HashMap::new();
        names.insert(1, "ICMP".to_string());
        names.insert(2, "IGMP".to_string());
        names.insert(4, "IPIP".to_string());
        names.insert(6, "TCP".to_string());
        names.insert(17, "UDP".to_string());
        names.insert(47, "GRE".to_string());
        ProtocolNames { names }
    }
}

/// IPv4 header flags, as the top three bits of the flags/fragment word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFlag {
    /// Reserved bit
    Reserved,
    /// Don't Fragment
    Df,
    /// More Fragments
    Mf,
}

impl Flag for IpFlag {
    const ALL: &'static [IpFlag] = &[IpFlag::Reserved, IpFlag::Df, IpFlag::Mf];

    fn bits(self) -> u16 {
        match self {
            IpFlag::Reserved => 0x1,
            IpFlag::Df => 0x2,
            IpFlag::Mf => 0x4,
        }
    }

    fn label(self) -> &'static str {
        match self {
            IpFlag::Reserved => "Reserved",
            IpFlag::Df => "DF",
            IpFlag::Mf => "MF",
        }
    }
}

/// Explicit congestion notification codepoint (low two bits of the ToS byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ecn {
    #[default]
    NonEct,
    Ect1,
    Ect0,
    Ce,
}

impl Ecn {
    pub fn to_bits(self) -> u8 {
        match self {
            Ecn::NonEct => 0,
            Ecn::Ect1 => 1,
            Ecn::Ect0 => 2,
            Ecn::Ce => 3,
        }
    }

    pub fn from_bits(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Ecn::NonEct),
            1 => Ok(Ecn::Ect1),
            2 => Ok(Ecn::Ect0),
            3 => Ok(Ecn::Ce),
            other => Err(Error::malformed("ecn", other as u32)),
        }
    }
}

/// One IPv4 option entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpOption {
    /// End of options list (kind 0), terminates the option area
    EndOfOptions,
    /// No-operation padding (kind 1)
    Nop,
    /// Any other kind, kept as its raw value bytes
    Unknown { kind: u8, data: Vec<u8> },
}

impl TlvOption for IpOption {
    fn decode(reader: &mut ByteReader<'_>) -> Result<Self> {
        let kind = reader.read_u8()?;
        match kind {
            0 => Ok(IpOption::EndOfOptions),
            1 => Ok(IpOption::Nop),
            kind => {
                let len = reader.read_u8()? as usize;
                if len < 2 {
                    return Err(Error::malformed("ip option length", len as u32));
                }
                let data = reader.read_bytes(len - 2)?.to_vec();
                Ok(IpOption::Unknown { kind, data })
            }
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        match self {
            IpOption::EndOfOptions => buf.put_u8(0),
            IpOption::Nop => buf.put_u8(1),
            IpOption::Unknown { kind, data } => {
                buf.put_u8(*kind);
                buf.put_u8((data.len() + 2) as u8);
                buf.put_slice(data);
            }
        }
    }

    fn wire_len(&self) -> usize {
        match self {
            IpOption::EndOfOptions | IpOption::Nop => 1,
            IpOption::Unknown { data, .. } => data.len() + 2,
        }
    }

    fn is_end(&self) -> bool {
        matches!(self, IpOption::EndOfOptions)
    }

    fn is_nop(&self) -> bool {
        matches!(self, IpOption::Nop)
    }
}

/// An IPv4 header and its payload chain
#[derive(Debug)]
pub struct Ipv4 {
    /// Version (always 4)
    pub version: u8,
    /// Header length in 32-bit words; computed from the options when unset
    pub ihl: Option<u8>,
    /// Differentiated services codepoint (6 bits)
    pub tos: u8,
    /// Congestion notification codepoint
    pub ecn: Ecn,
    /// Total length of header plus payload; computed when unset
    pub total_length: Option<u16>,
    /// Identification
    pub identification: u16,
    /// Header flags
    pub flags: FlagSet<IpFlag>,
    /// Fragment offset in 8-byte blocks (13 bits)
    pub fragment_offset: u16,
    /// Time to live
    pub ttl: u8,
    /// Payload protocol number, the discriminant for the next layer
    pub protocol: IpProtocol,
    /// Header checksum; computed on encode when unset
    pub checksum: Option<u16>,
    /// Source address; 0.0.0.0 on the wire when unset
    pub src: Option<Ipv4Addr>,
    /// Destination address
    pub dst: Ipv4Addr,
    /// Option entries in wire order
    pub options: Vec<IpOption>,
    payload: Option<Box<dyn Layer>>,
}

impl Ipv4 {
    /// Fixed header size without options
    pub const BASE_HEADER_SIZE: usize = 20;

    /// Create a header addressed from `src` to `dst`
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Ipv4 {
            src: Some(src),
            dst,
            ..Ipv4::default()
        }
    }

    /// Set the time to live
    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the payload protocol number
    pub fn with_protocol(mut self, protocol: IpProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the header flags
    pub fn with_flags(mut self, flags: FlagSet<IpFlag>) -> Self {
        self.flags = flags;
        self
    }

    /// Set the option entries
    pub fn with_options(mut self, options: Vec<IpOption>) -> Self {
        self.options = options;
        self
    }

    /// Parse an IPv4 header and its payload chain from `data`
    pub fn from_bytes(data: &[u8], ctx: &DecodeContext) -> Option<Self> {
        Self::decode(&mut ByteReader::new(data), ctx)
    }

    /// Decode entry point; any internal failure is reported as `None`
    pub fn decode(reader: &mut ByteReader<'_>, ctx: &DecodeContext) -> Option<Self> {
        match Self::decode_inner(reader, ctx) {
            Ok(ip) => Some(ip),
            Err(e) => {
                debug!(error = %e, "failed to parse bytes as an IPv4 header");
                None
            }
        }
    }

    fn decode_inner(reader: &mut ByteReader<'_>, ctx: &DecodeContext) -> Result<Self> {
        let first = reader.read_u8()?;
        let version = first >> 4;
        let ihl = first & 0x0F;

        let second = reader.read_u8()?;
        let tos = second >> 2;
        let ecn = Ecn::from_bits(second & 0x03)?;

        let total_length = reader.read_u16()?;
        let identification = reader.read_u16()?;

        let word = reader.read_u16()?;
        let flags = FlagSet::from_bits(word >> 13);
        let fragment_offset = word & 0x1FFF;

        let ttl = reader.read_u8()?;
        let protocol = IpProtocol::from_u8(reader.read_u8()?);
        let checksum = reader.read_u16()?;
        let src = Ipv4Addr::from(reader.read_u32()?);
        let dst = Ipv4Addr::from(reader.read_u32()?);

        let budget = (ihl as usize).saturating_sub(5) * 4;
        let options = decode_options::<IpOption>(reader, budget);

        let mut ip = Ipv4 {
            version,
            ihl: Some(ihl),
            tos,
            ecn,
            total_length: Some(total_length),
            identification,
            flags,
            fragment_offset,
            ttl,
            protocol,
            checksum: Some(checksum),
            src: Some(src),
            dst,
            options,
            payload: None,
        };
        ip.payload = ctx.decode_payload(reader, &ip);
        Ok(ip)
    }
}

impl Default for Ipv4 {
    fn default() -> Self {
        Ipv4 {
            version: 4,
            ihl: None,
            tos: 0,
            ecn: Ecn::NonEct,
            total_length: None,
            identification: 1,
            flags: FlagSet::empty(),
            fragment_offset: 0,
            ttl: 64,
            protocol: IpProtocol::Custom(0),
            checksum: None,
            src: None,
            dst: Ipv4Addr::LOCALHOST,
            options: Vec::new(),
            payload: None,
        }
    }
}

impl Layer for Ipv4 {
    fn name(&self) -> &'static str {
        "IPv4"
    }

    fn header_len(&self) -> usize {
        let options_bytes = options_wire_len(&self.options);
        // Options area rounded up to the next 32-bit word so the IHL field
        // stays wire-valid.
        Self::BASE_HEADER_SIZE + ((options_bytes + 3) & !3)
    }

    fn write_header(&self, buf: &mut BytesMut) {
        let header_len = self.header_len();
        let ihl = self.ihl.unwrap_or((header_len / 4) as u8);
        let total_length = self.total_length.unwrap_or(self.total_len() as u16);

        let mut header = BytesMut::with_capacity(header_len);
        header.put_u8((self.version << 4) | (ihl & 0x0F));
        header.put_u8((self.tos << 2) | self.ecn.to_bits());
        header.put_u16(total_length);
        header.put_u16(self.identification);
        header.put_u16((self.flags.bits() << 13) | (self.fragment_offset & 0x1FFF));
        header.put_u8(self.ttl);
        header.put_u8(self.protocol.to_u8());
        header.put_u16(self.checksum.unwrap_or(0));
        header.put_u32(self.src.map_or(0, u32::from));
        header.put_u32(u32::from(self.dst));
        encode_options(&self.options, &mut header);
        header.resize(header_len, 0);

        if self.checksum.is_none() {
            let checksum = internet_checksum(&header);
            header[10..12].copy_from_slice(&checksum.to_be_bytes());
        }

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

    fn payload_discriminant(&self) -> Option<u16> {
        Some(self.protocol.to_u8() as u16)
    }

    fn bind_to_carrier(&self, carrier: &mut dyn Layer) {
        if let Some(outer) = carrier.as_any_mut().downcast_mut::<Ipv4>() {
            outer.protocol = IpProtocol::IPIP;
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl fmt::Display for Ipv4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPv4 {} > {} proto={} ttl={} flags={}",
            self.src.unwrap_or(Ipv4Addr::UNSPECIFIED),
            self.dst,
            self.protocol.to_u8(),
            self.ttl,
            self.flags,
        )
    }
}

fn decode_boxed(reader: &mut ByteReader<'_>, ctx: &DecodeContext) -> Option<Box<dyn Layer>> {
    Ipv4::decode(reader, ctx).map(|ip| Box::new(ip) as Box<dyn Layer>)
}

fn default_boxed() -> Box<dyn Layer> {
    Box::new(Ipv4::default())
}

fn is_ipv4(layer: &dyn Layer) -> bool {
    layer.as_any().is::<Ipv4>()
}

pub static DESCRIPTOR: LayerDescriptor = LayerDescriptor {
    name: "IPv4",
    decode: decode_boxed,
    default_instance: default_boxed,
    is_instance: is_ipv4,
};
