//! Length-prefixed key encoding for LMDB storage.
//!
//! All keys are encoded as: [len1][bytes1][len2][bytes2]...
//! where each length is a big-endian u16, so URIs up to 64 KiB fit.
//! - No delimiters, no escaping, any bytes allowed
//! - A prefix built from the leading parts scans exactly those parts

use byteorder::{BigEndian, ByteOrder};

const LEN: usize = 2;

/// Build a length-prefixed key from parts
#[inline]
pub fn build_key(parts: &[&str]) -> Vec<u8> {
    let total_len: usize = parts.iter().map(|p| LEN + p.len()).sum();
    let mut key = Vec::with_capacity(total_len);
    for part in parts {
        let mut len = [0u8; LEN];
        BigEndian::write_u16(&mut len, part.len().min(u16::MAX as usize) as u16);
        key.extend_from_slice(&len);
        key.extend_from_slice(&part.as_bytes()[..part.len().min(u16::MAX as usize)]);
    }
    key
}

/// Build a prefix for scanning (same as build_key, just clearer intent)
#[inline]
pub fn build_prefix(parts: &[&str]) -> Vec<u8> {
    build_key(parts)
}

/// Parse a length-prefixed key into parts.
///
/// Parts that are not valid UTF-8 and trailing truncated parts are skipped.
pub fn parse_key(bytes: &[u8]) -> Vec<&str> {
    let mut parts = Vec::with_capacity(3);
    let mut i = 0;
    while i + LEN <= bytes.len() {
        let len = BigEndian::read_u16(&bytes[i..i + LEN]) as usize;
        let start = i + LEN;
        if start + len > bytes.len() {
            break;
        }
        if let Ok(part) = std::str::from_utf8(&bytes[start..start + len]) {
            parts.push(part);
        }
        i = start + len;
    }
    parts
}

/// Get the Nth part from a key without allocating
#[inline]
pub fn get_part(bytes: &[u8], n: usize) -> Option<&str> {
    let mut i = 0;
    let mut count = 0;
    while i + LEN <= bytes.len() {
        let len = BigEndian::read_u16(&bytes[i..i + LEN]) as usize;
        let start = i + LEN;
        if start + len > bytes.len() {
            return None;
        }
        if count == n {
            return std::str::from_utf8(&bytes[start..start + len]).ok();
        }
        count += 1;
        i = start + len;
    }
    None
}
