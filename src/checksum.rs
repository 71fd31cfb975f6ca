//! Internet checksum (RFC 1071) used by the IPv4 and TCP headers

/// Calculate the Internet checksum over `data`
///
/// The data is treated as a sequence of big-endian 16-bit words; a trailing
/// odd byte is padded with zero. The result is the one's complement of the
/// folded sum.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        let word = u16::from_be_bytes([chunk[0], chunk[1]]);
        sum += word as u32;
    }

    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u32) << 8;
    }

    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}

/// Calculate a TCP/UDP checksum including the IPv4 pseudo-header
///
/// The pseudo-header covers the source and destination addresses, the
/// protocol number, and the segment length.
pub fn transport_checksum(src_ip: &[u8; 4], dst_ip: &[u8; 4], protocol: u8, data: &[u8]) -> u16 {
    let mut pseudo = Vec::with_capacity(12 + data.len());
    pseudo.extend_from_slice(src_ip);
    pseudo.extend_from_slice(dst_ip);
    pseudo.push(0);
    pseudo.push(protocol);
    pseudo.extend_from_slice(&(data.len() as u16).to_be_bytes());
    pseudo.extend_from_slice(data);

    internet_checksum(&pseudo)
}

/// Validate data that includes its checksum field
///
/// Recomputing over the whole run yields 0 (or the one's-complement
/// equivalent 0xFFFF) when the stored checksum is correct.
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xFFFF
}
