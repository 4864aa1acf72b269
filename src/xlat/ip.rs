//! Pure functions that synthesize one IP version's header from the other's.

use std::net::{Ipv4Addr, Ipv6Addr};

use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet_packet::ipv4::{self, MutableIpv4Packet};
use pnet_packet::ipv6::MutableIpv6Packet;

use super::error::{Error, Result};

/// Fixed IPv4 header length; options are out of model.
pub(crate) const IPV4_HEADER_LEN: usize = 20;

/// IPv6 fixed header length.
pub(crate) const IPV6_HEADER_LEN: usize = 40;

/// Maps an IPv6 next-header to the protocol the translated IPv4 packet will
/// carry. Anything but UDP, TCP and ICMPv6 is untranslatable.
pub(crate) fn protocol_v6_to_v4(next_header: IpNextHeaderProtocol) -> Result<IpNextHeaderProtocol> {
    match next_header {
        IpNextHeaderProtocols::Udp => Ok(IpNextHeaderProtocols::Udp),
        IpNextHeaderProtocols::Tcp => Ok(IpNextHeaderProtocols::Tcp),
        IpNextHeaderProtocols::Icmpv6 => Ok(IpNextHeaderProtocols::Icmp),
        other => Err(Error::UnsupportedProtocol(other.0)),
    }
}

/// Inverse of [`protocol_v6_to_v4`].
pub(crate) fn protocol_v4_to_v6(protocol: IpNextHeaderProtocol) -> Result<IpNextHeaderProtocol> {
    match protocol {
        IpNextHeaderProtocols::Udp => Ok(IpNextHeaderProtocols::Udp),
        IpNextHeaderProtocols::Tcp => Ok(IpNextHeaderProtocols::Tcp),
        IpNextHeaderProtocols::Icmp => Ok(IpNextHeaderProtocols::Icmpv6),
        other => Err(Error::UnsupportedProtocol(other.0)),
    }
}

/// Builds the 20-byte IPv4 header image for a translated packet, header
/// checksum included.
///
/// `ttl` is taken as given: the pipeline passes the already-decremented
/// value, the ICMP error rewrite passes the embedded packet's own. DSCP,
/// ECN, identification, flags and fragment offset stay zero.
pub(crate) fn synthesize_ipv4_header(
    source: Ipv4Addr,
    destination: Ipv4Addr,
    protocol: IpNextHeaderProtocol,
    ttl: u8,
    payload_len: usize,
) -> Result<[u8; IPV4_HEADER_LEN]> {
    let total_length =
        u16::try_from(IPV4_HEADER_LEN + payload_len).map_err(|_| Error::PayloadTooLong)?;

    let mut buffer = [0u8; IPV4_HEADER_LEN];
    // NOTE: Cannot fail, the buffer has exactly the minimum header size.
    let mut header = unsafe { MutableIpv4Packet::new(&mut buffer).unwrap_unchecked() };

    header.set_version(4);
    header.set_header_length(5);
    header.set_total_length(total_length);
    header.set_identification(0);
    header.set_ttl(ttl);
    header.set_next_level_protocol(protocol);
    header.set_source(source);
    header.set_destination(destination);
    header.set_checksum(ipv4::checksum(&header.to_immutable()));

    Ok(buffer)
}

/// Builds the 40-byte IPv6 header image for a translated packet. Traffic
/// class and flow label stay zero.
pub(crate) fn synthesize_ipv6_header(
    source: Ipv6Addr,
    destination: Ipv6Addr,
    next_header: IpNextHeaderProtocol,
    hop_limit: u8,
    payload_len: usize,
) -> Result<[u8; IPV6_HEADER_LEN]> {
    let payload_length = u16::try_from(payload_len).map_err(|_| Error::PayloadTooLong)?;

    let mut buffer = [0u8; IPV6_HEADER_LEN];
    // NOTE: Cannot fail, the buffer has exactly the minimum header size.
    let mut header = unsafe { MutableIpv6Packet::new(&mut buffer).unwrap_unchecked() };

    header.set_version(6);
    header.set_traffic_class(0);
    header.set_flow_label(0);
    header.set_payload_length(payload_length);
    header.set_next_header(next_header);
    header.set_hop_limit(hop_limit);
    header.set_source(source);
    header.set_destination(destination);

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet_packet::ipv4::Ipv4Packet;
    use pnet_packet::ipv6::Ipv6Packet;

    #[test]
    fn test_protocol_mapping() {
        assert_eq!(
            protocol_v6_to_v4(IpNextHeaderProtocols::Icmpv6),
            Ok(IpNextHeaderProtocols::Icmp)
        );
        assert_eq!(
            protocol_v4_to_v6(IpNextHeaderProtocols::Icmp),
            Ok(IpNextHeaderProtocols::Icmpv6)
        );
        assert_eq!(
            protocol_v6_to_v4(IpNextHeaderProtocols::Udp),
            Ok(IpNextHeaderProtocols::Udp)
        );
        assert_eq!(
            protocol_v4_to_v6(IpNextHeaderProtocols::Tcp),
            Ok(IpNextHeaderProtocols::Tcp)
        );
        // IPv6 hop-by-hop options header (0) and GRE (47) have no mapping
        assert_eq!(
            protocol_v6_to_v4(IpNextHeaderProtocols::Hopopt),
            Err(Error::UnsupportedProtocol(0))
        );
        assert_eq!(
            protocol_v4_to_v6(IpNextHeaderProtocols::Gre),
            Err(Error::UnsupportedProtocol(47))
        );
    }

    #[test]
    fn test_synthesized_ipv4_header() {
        let buffer = synthesize_ipv4_header(
            "192.0.2.1".parse().unwrap(),
            "198.51.100.7".parse().unwrap(),
            IpNextHeaderProtocols::Udp,
            63,
            12,
        )
        .unwrap();

        let header = Ipv4Packet::new(&buffer).unwrap();
        assert_eq!(header.get_version(), 4);
        assert_eq!(header.get_header_length(), 5);
        assert_eq!(header.get_total_length(), 32);
        assert_eq!(header.get_identification(), 0);
        assert_eq!(header.get_flags(), 0);
        assert_eq!(header.get_fragment_offset(), 0);
        assert_eq!(header.get_ttl(), 63);
        assert_eq!(header.get_next_level_protocol(), IpNextHeaderProtocols::Udp);
        assert_eq!(header.get_source(), "192.0.2.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(
            header.get_destination(),
            "198.51.100.7".parse::<Ipv4Addr>().unwrap()
        );
        assert_eq!(header.get_checksum(), ipv4::checksum(&header));
    }

    #[test]
    fn test_synthesized_ipv6_header() {
        let buffer = synthesize_ipv6_header(
            "64:ff9b::c000:201".parse().unwrap(),
            "fd00::1".parse().unwrap(),
            IpNextHeaderProtocols::Icmpv6,
            62,
            16,
        )
        .unwrap();

        let header = Ipv6Packet::new(&buffer).unwrap();
        assert_eq!(header.get_version(), 6);
        assert_eq!(header.get_traffic_class(), 0);
        assert_eq!(header.get_flow_label(), 0);
        assert_eq!(header.get_payload_length(), 16);
        assert_eq!(header.get_next_header(), IpNextHeaderProtocols::Icmpv6);
        assert_eq!(header.get_hop_limit(), 62);
        assert_eq!(
            header.get_source(),
            "64:ff9b::c000:201".parse::<Ipv6Addr>().unwrap()
        );
        assert_eq!(header.get_destination(), "fd00::1".parse::<Ipv6Addr>().unwrap());
    }

    #[test]
    fn test_oversize_payload_is_rejected() {
        let result = synthesize_ipv6_header(
            "64:ff9b::1".parse().unwrap(),
            "fd00::1".parse().unwrap(),
            IpNextHeaderProtocols::Udp,
            64,
            0x1_0000,
        );
        assert_eq!(result, Err(Error::PayloadTooLong));
    }
}
