//! Bluetooth device addresses.

use std::fmt;
use std::str::FromStr;

use crate::PrinterLinkError;

/// A six-octet Bluetooth device address (BD_ADDR).
///
/// Parses both `AA:BB:CC:DD:EE:FF` and `AA-BB-CC-DD-EE-FF`, any case.
/// Always displays upper-case and colon separated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BtAddress([u8; 6]);

impl BtAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for BtAddress {
    type Err = PrinterLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PrinterLinkError::InvalidAddress(s.to_string());
        let trimmed = s.trim();

        // Mixed separators are rejected: the whole address uses one of them.
        let sep = if trimmed.contains(':') { ':' } else { '-' };
        let parts: Vec<&str> = trimmed.split(sep).collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for BtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_and_hyphen_forms() {
        let colon: BtAddress = "1C:B8:57:50:01:D9".parse().unwrap();
        let hyphen: BtAddress = "1c-b8-57-50-01-d9".parse().unwrap();
        assert_eq!(colon, hyphen);
        assert_eq!(colon.octets(), [0x1c, 0xb8, 0x57, 0x50, 0x01, 0xd9]);
    }

    #[test]
    fn displays_upper_case_colon_form() {
        let addr: BtAddress = "aa-bb-cc-dd-ee-0f".parse().unwrap();
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:0F");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "00:11:22:33:44",
            "00:11:22:33:44:55:66",
            "GG:11:22:33:44:55",
            "00:11-22:33:44:55",
            "001:1:22:33:44:55",
            "not-a-mac",
        ] {
            assert!(
                matches!(bad.parse::<BtAddress>(), Err(PrinterLinkError::InvalidAddress(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
