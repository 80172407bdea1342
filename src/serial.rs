//! Certificate serial numbers.
//!
//! Serials are arbitrary-length unsigned big-endian integers. They are
//! persisted in the OpenSSL `.srl` format: the last serial used, as hex.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::CryptoError;

/// RFC 5280 caps serials at 20 octets including a sign octet.
const MAX_SERIAL_BYTES: usize = 20;

/// Width of the random seed a new root generation starts from.
const SEED_BYTES: usize = 16;

/// A positive certificate serial number, stored without leading zero bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Serial(Vec<u8>);

impl Ord for Serial {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Serial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serial {
    /// Build a serial from big-endian bytes; leading zeros are dropped.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let digits = &bytes[start..];
        if digits.is_empty() {
            return Err(CryptoError::InvalidInput(
                "serial number must be positive".to_string(),
            ));
        }
        let encoded_len = digits.len() + usize::from(digits[0] & 0x80 != 0);
        if encoded_len > MAX_SERIAL_BYTES {
            return Err(CryptoError::InvalidInput(format!(
                "serial number exceeds {MAX_SERIAL_BYTES} octets"
            )));
        }
        Ok(Self(digits.to_vec()))
    }

    /// A fresh random starting point for a new root generation. The top bit
    /// is cleared and the top byte is nonzero, so the value always encodes
    /// in exactly `SEED_BYTES` octets and has headroom to count upwards.
    pub fn random_seed() -> Self {
        let mut bytes: [u8; SEED_BYTES] = rand::random();
        bytes[0] = (bytes[0] & 0x7f) | 0x01;
        Self(bytes.to_vec())
    }

    /// The serial following this one.
    pub fn next(&self) -> Result<Self, CryptoError> {
        let mut bytes = self.0.clone();
        let mut carry = true;
        for byte in bytes.iter_mut().rev() {
            let (sum, overflow) = byte.overflowing_add(1);
            *byte = sum;
            if !overflow {
                carry = false;
                break;
            }
        }
        if carry {
            bytes.insert(0, 1);
        }
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Uppercase hex, as OpenSSL writes it.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl FromStr for Serial {
    type Err = CryptoError;

    /// Parses hex with optional surrounding whitespace, any case, odd length allowed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CryptoError::DecodingError(format!(
                "invalid serial number {s:?}"
            )));
        }
        let padded = if s.len() % 2 == 1 {
            format!("0{s}")
        } else {
            s.to_string()
        };
        let bytes = padded
            .as_bytes()
            .chunks(2)
            .map(|pair| {
                let pair = std::str::from_utf8(pair).unwrap_or("00");
                u8::from_str_radix(pair, 16)
                    .map_err(|e| CryptoError::DecodingError(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_with_carry() {
        let serial = Serial::from_bytes(&[0x01, 0xFF]).unwrap();
        assert_eq!(serial.next().unwrap().as_bytes(), &[0x02, 0x00]);

        let serial = Serial::from_bytes(&[0xFF]).unwrap();
        let next = serial.next().unwrap();
        assert_eq!(next.as_bytes(), &[0x01, 0x00]);
        assert!(serial < next);
    }

    #[test]
    fn parses_openssl_srl_content() {
        let serial: Serial = "3A0F9C2B4E5D6A7B8C9D0E1F2A3B4C5D6E7F8091\n".parse().unwrap();
        assert_eq!(serial.as_bytes().len(), 20);
        assert_eq!(serial.to_hex(), "3A0F9C2B4E5D6A7B8C9D0E1F2A3B4C5D6E7F8091");

        let serial: Serial = "abc".parse().unwrap();
        assert_eq!(serial.as_bytes(), &[0x0A, 0xBC]);
        assert_eq!(serial.to_string(), "0ABC");
    }

    #[test]
    fn rejects_zero_garbage_and_overlong() {
        assert!("0000".parse::<Serial>().is_err());
        assert!("xyz".parse::<Serial>().is_err());
        assert!("".parse::<Serial>().is_err());
        assert!(Serial::from_bytes(&[0x80; 20]).is_err());
    }

    #[test]
    fn seeds_are_positive_and_distinct() {
        let a = Serial::random_seed();
        let b = Serial::random_seed();
        assert_ne!(a, b);
        assert_eq!(a.as_bytes().len(), SEED_BYTES);
        assert!(a.as_bytes()[0] & 0x80 == 0);
        assert!(a < a.next().unwrap());
    }
}
