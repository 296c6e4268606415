//! CACTVS substructure fingerprints and Tanimoto similarity.
//!
//! PubChem ships the fingerprint as a hex string: a 4-byte big-endian bit count,
//! the bit vector (most significant bit first) and zero padding up to a byte
//! boundary. For the standard 881-key fingerprint that is 230 hex characters.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Length of the bit-count prefix in bytes
const PREFIX_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("fingerprint is not valid hex: {0}")]
    InvalidHex(String),

    #[error("fingerprint is shorter than its 4-byte length prefix")]
    MissingPrefix,

    #[error("fingerprint declares {declared} bits but carries only {available}")]
    Truncated { declared: usize, available: usize },
}

/// Fixed-width bit vector decoded from a PubChem fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl Fingerprint {
    /// Decode the raw hex form returned by the service
    pub fn from_hex(hex_str: &str) -> Result<Self, FingerprintError> {
        let raw = hex::decode(hex_str.trim())
            .map_err(|e| FingerprintError::InvalidHex(e.to_string()))?;
        if raw.len() < PREFIX_LEN {
            return Err(FingerprintError::MissingPrefix);
        }

        let (prefix, bytes) = raw.split_at(PREFIX_LEN);
        let bit_len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if bytes.len() * 8 < bit_len {
            return Err(FingerprintError::Truncated {
                declared: bit_len,
                available: bytes.len() * 8,
            });
        }

        Ok(Self {
            bytes: bytes.to_vec(),
            bit_len,
        })
    }

    /// Build from explicit bits, most significant first
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut bytes = vec![0u8; bits.len().div_ceil(8)];
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                bytes[i / 8] |= 0x80 >> (i % 8);
            }
        }
        Self {
            bytes,
            bit_len: bits.len(),
        }
    }

    /// Number of meaningful bits
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.bit_len {
            return None;
        }
        Some(self.bytes[index / 8] & (0x80 >> (index % 8)) != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bit_len).map(move |i| self.bytes[i / 8] & (0x80 >> (i % 8)) != 0)
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.masked_bytes().map(|b| b.count_ones() as usize).sum()
    }

    /// Bits as a `0`/`1` string
    pub fn to_bit_string(&self) -> String {
        self.iter().map(|b| if b { '1' } else { '0' }).collect()
    }

    /// Hex of the bit vector and its padding, without the length prefix
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Tanimoto coefficient `|A∩B| / (|A| + |B| - |A∩B|)`
    ///
    /// Vectors of different width are compared as if the shorter one were zero
    /// padded. Two vectors with no bits set are identical and score 1.0.
    pub fn tanimoto(&self, other: &Fingerprint) -> f64 {
        let a = self.count_ones();
        let b = other.count_ones();
        let both: usize = self
            .masked_bytes()
            .zip(other.masked_bytes())
            .map(|(x, y)| (x & y).count_ones() as usize)
            .sum();

        let union = a + b - both;
        if union == 0 {
            return 1.0;
        }
        both as f64 / union as f64
    }

    /// Bytes with padding bits beyond `bit_len` cleared
    fn masked_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        let full = self.bit_len / 8;
        let rem = self.bit_len % 8;
        let used = self.bit_len.div_ceil(8);
        self.bytes[..used].iter().enumerate().map(move |(i, b)| {
            if i == full && rem != 0 {
                b & (0xFFu8 << (8 - rem))
            } else {
                *b
            }
        })
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_bit_string())
    }
}

/// Free-function form of [`Fingerprint::tanimoto`]
pub fn tanimoto(a: &Fingerprint, b: &Fingerprint) -> f64 {
    a.tanimoto(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Raw fingerprint of aspirin (CID 2244)
    const ASPIRIN_FP: &str = "00000371C0703800000000000000000000000000000000000000300000000000000000010000001A00000800000C04809800320E80000600880220D208000208002420000888010608C80C26228400000024000000000000000000000000000000000000000000000000000000000000000000";

    #[test]
    fn test_decode_standard_fingerprint() {
        let fp = Fingerprint::from_hex(ASPIRIN_FP).unwrap();
        assert_eq!(fp.bit_len(), 881);
        assert_eq!(fp.to_bit_string().len(), 881);
        // 0xC0 leads the vector: bits 0 and 1 set, bit 2 clear
        assert_eq!(fp.get(0), Some(true));
        assert_eq!(fp.get(1), Some(true));
        assert_eq!(fp.get(2), Some(false));
        assert_eq!(fp.get(881), None);
    }

    #[test]
    fn test_reencode_reproduces_trailing_bits() {
        let fp = Fingerprint::from_hex(ASPIRIN_FP).unwrap();
        assert_eq!(fp.to_hex().to_uppercase(), ASPIRIN_FP[8..]);
    }

    #[test]
    fn test_short_prefix_example() {
        let fp = Fingerprint::from_hex("00000010ABCD").unwrap();
        assert_eq!(fp.bit_len(), 16);
        assert_eq!(fp.to_bit_string(), "1010101111001101");
        assert_eq!(fp.count_ones(), 10);
        assert_eq!(fp.to_hex(), "abcd");
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            Fingerprint::from_hex("zz"),
            Err(FingerprintError::InvalidHex(_))
        ));
        assert_eq!(
            Fingerprint::from_hex("0000"),
            Err(FingerprintError::MissingPrefix)
        );
        assert_eq!(
            Fingerprint::from_hex("00000020FF"),
            Err(FingerprintError::Truncated {
                declared: 32,
                available: 8
            })
        );
    }

    #[test]
    fn test_padding_bits_do_not_count() {
        // 4 meaningful bits, padding bits set
        let fp = Fingerprint::from_hex("00000004FF").unwrap();
        assert_eq!(fp.count_ones(), 4);
    }

    #[test]
    fn test_tanimoto_self_is_one() {
        let fp = Fingerprint::from_hex(ASPIRIN_FP).unwrap();
        assert_eq!(fp.tanimoto(&fp), 1.0);
        let empty = Fingerprint::from_bits(&[false; 8]);
        assert_eq!(empty.tanimoto(&empty), 1.0);
    }

    #[test]
    fn test_tanimoto_symmetric_and_known_value() {
        let a = Fingerprint::from_bits(&[true, true, false, true]);
        let b = Fingerprint::from_bits(&[true, false, true, true]);
        // intersection 2, union 4
        assert_eq!(tanimoto(&a, &b), 0.5);
        assert_eq!(tanimoto(&a, &b), tanimoto(&b, &a));

        let c = Fingerprint::from_bits(&[false, false, true, false]);
        assert_eq!(a.tanimoto(&c), 0.0);
    }
}
