//! IPv4-embedded IPv6 addresses per [RFC 6052 Section 2.2](https://datatracker.ietf.org/doc/html/rfc6052#section-2.2).

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::Ipv6Net;

/// Prefix lengths RFC 6052 allows for a NAT64 prefix.
pub const ALLOWED_PREFIX_LENS: [u8; 6] = [32, 40, 48, 56, 64, 96];

/// Possible errors from the embed/extract operations.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("{0} is not a valid RFC6052 prefix length")]
    InvalidPrefixLength(u8),
}

/// Whether a prefix can serve as a NAT64 prefix at all.
///
/// The translator treats a prefix that fails this check as "not configured".
pub fn is_nat64_prefix(prefix: &Ipv6Net) -> bool {
    ALLOWED_PREFIX_LENS.contains(&prefix.prefix_len())
}

/// Embeds an IPv4 address into an IPv6 prefix.
///
/// The IPv4 bytes land directly behind the prefix, except that the reserved
/// `u` octet (bits 64..71) is skipped over and stays zero.
pub fn embed_ipv4_addr(ipv4_addr: Ipv4Addr, ipv6_prefix: Ipv6Net) -> Result<Ipv6Addr, Error> {
    let mut out = ipv6_prefix.network().octets();
    let v4 = ipv4_addr.octets();

    match ipv6_prefix.prefix_len() {
        32 => out[4..8].copy_from_slice(&v4),
        40 => {
            out[5..8].copy_from_slice(&v4[..3]);
            out[9] = v4[3];
        }
        48 => {
            out[6..8].copy_from_slice(&v4[..2]);
            out[9..11].copy_from_slice(&v4[2..]);
        }
        56 => {
            out[7] = v4[0];
            out[9..12].copy_from_slice(&v4[1..]);
        }
        64 => out[9..13].copy_from_slice(&v4),
        96 => out[12..16].copy_from_slice(&v4),
        len => return Err(Error::InvalidPrefixLength(len)),
    }

    Ok(Ipv6Addr::from(out))
}

/// Extracts the IPv4 address embedded behind `prefix_length` bits of an
/// IPv6 address. Inverse of [`embed_ipv4_addr`].
pub fn extract_ipv4_addr(ipv6_addr: Ipv6Addr, prefix_length: u8) -> Result<Ipv4Addr, Error> {
    let v6 = ipv6_addr.octets();
    let mut v4 = [0u8; 4];

    match prefix_length {
        32 => v4.copy_from_slice(&v6[4..8]),
        40 => {
            v4[..3].copy_from_slice(&v6[5..8]);
            v4[3] = v6[9];
        }
        48 => {
            v4[..2].copy_from_slice(&v6[6..8]);
            v4[2..].copy_from_slice(&v6[9..11]);
        }
        56 => {
            v4[0] = v6[7];
            v4[1..].copy_from_slice(&v6[9..12]);
        }
        64 => v4.copy_from_slice(&v6[9..13]),
        96 => v4.copy_from_slice(&v6[12..16]),
        len => return Err(Error::InvalidPrefixLength(len)),
    }

    Ok(Ipv4Addr::from(v4))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_both_ways(prefix: &str, v4: &str, expected: &str) {
        let prefix: Ipv6Net = prefix.parse().unwrap();
        let v4: Ipv4Addr = v4.parse().unwrap();
        let expected: Ipv6Addr = expected.parse().unwrap();

        assert_eq!(embed_ipv4_addr(v4, prefix).unwrap(), expected);
        assert_eq!(
            extract_ipv4_addr(expected, prefix.prefix_len()).unwrap(),
            v4
        );
    }

    #[test]
    fn test_len_32() {
        check_both_ways("64:ff9b::/32", "192.0.2.1", "64:ff9b:c000:0201::");
    }

    #[test]
    fn test_len_40() {
        check_both_ways("64:ff9b::/40", "192.0.2.1", "64:ff9b:00c0:0002:0001::");
    }

    #[test]
    fn test_len_48() {
        check_both_ways("64:ff9b::/48", "192.0.2.1", "64:ff9b:0000:c000:0002:0100::");
    }

    #[test]
    fn test_len_56() {
        check_both_ways("64:ff9b::/56", "192.0.2.1", "64:ff9b:0000:00c0:0000:0201::");
    }

    #[test]
    fn test_len_64() {
        check_both_ways(
            "64:ff9b::/64",
            "192.0.2.1",
            "64:ff9b:0000:0000:00c0:0002:0100::",
        );
    }

    #[test]
    fn test_len_96() {
        check_both_ways(
            "64:ff9b::/96",
            "192.0.2.1",
            "64:ff9b:0000:0000:0000:0000:c000:0201",
        );
    }

    #[test]
    fn test_invalid_prefix_length() {
        assert_eq!(
            embed_ipv4_addr("192.0.2.1".parse().unwrap(), "64:ff9b::/63".parse().unwrap()),
            Err(Error::InvalidPrefixLength(63))
        );
        assert_eq!(
            extract_ipv4_addr("64:ff9b::".parse().unwrap(), 97),
            Err(Error::InvalidPrefixLength(97))
        );
    }

    #[test]
    fn test_prefix_validity() {
        assert!(is_nat64_prefix(&"64:ff9b::/96".parse().unwrap()));
        assert!(is_nat64_prefix(&"2001:db8::/32".parse().unwrap()));
        assert!(!is_nat64_prefix(&"2001:db8::/128".parse().unwrap()));
        assert!(!is_nat64_prefix(&"::/0".parse().unwrap()));
    }
}
