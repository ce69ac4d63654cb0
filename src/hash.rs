// SPDX-License-Identifier: MIT OR Apache-2.0

//! FNV-1a 64-bit hashing for content and config fingerprints.

use std::io::{BufReader, Read};

const OFFSET64: u64 = 14695981039346656037;
const PRIME64: u64 = 1099511628211;

/// Computes the FNV-1a 64-bit hash of the provided bytes.
pub fn sum64(data: &[u8]) -> u64 {
    let mut h = OFFSET64;
    for &b in data {
        h ^= u64::from(b);
        h = h.wrapping_mul(PRIME64);
    }
    h
}

/// Computes the FNV-1a 64-bit hash over all bytes from the reader.
pub fn sum64_reader<R: Read>(reader: R) -> std::io::Result<u64> {
    let mut h = OFFSET64;
    let mut buf = [0u8; 64 * 1024];
    let mut reader = BufReader::new(reader);
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        for &b in &buf[..read] {
            h ^= u64::from(b);
            h = h.wrapping_mul(PRIME64);
        }
    }
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_offset_basis() {
        assert_eq!(sum64(b""), OFFSET64);
    }

    #[test]
    fn known_vectors() {
        // Standard FNV-1a 64 test vectors.
        assert_eq!(sum64(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(sum64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn reader_matches_slice() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let from_reader = sum64_reader(&data[..]).expect("read");
        assert_eq!(from_reader, sum64(data));
    }

    #[test]
    fn single_byte_difference_changes_hash() {
        assert_ne!(sum64(b"const a = 1;"), sum64(b"const a = 2;"));
    }
}
