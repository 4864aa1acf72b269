use std::net::{Ipv4Addr, Ipv6Addr};

use pnet_packet::udp::{self, MutableUdpPacket, UdpPacket};

use super::error::{Error, Result};

/// Rewrites a UDP packet's checksum in place under a new IPv4 pseudo-header.
pub(crate) fn recalculate_udp_checksum_ipv4(
    udp_packet: &mut [u8],
    new_source: Ipv4Addr,
    new_destination: Ipv4Addr,
) -> Result<()> {
    let actual = udp_packet.len();
    let mut packet = MutableUdpPacket::new(udp_packet).ok_or(Error::PacketTooShort {
        expected: UdpPacket::minimum_packet_size(),
        actual,
    })?;

    let checksum = udp::ipv4_checksum(&packet.to_immutable(), &new_source, &new_destination);
    packet.set_checksum(checksum);
    Ok(())
}

/// Rewrites a UDP packet's checksum in place under a new IPv6 pseudo-header.
pub(crate) fn recalculate_udp_checksum_ipv6(
    udp_packet: &mut [u8],
    new_source: Ipv6Addr,
    new_destination: Ipv6Addr,
) -> Result<()> {
    let actual = udp_packet.len();
    let mut packet = MutableUdpPacket::new(udp_packet).ok_or(Error::PacketTooShort {
        expected: UdpPacket::minimum_packet_size(),
        actual,
    })?;

    let checksum = udp::ipv6_checksum(&packet.to_immutable(), &new_source, &new_destination);
    packet.set_checksum(checksum);
    Ok(())
}
