use std::net::{Ipv4Addr, Ipv6Addr};

use pnet_packet::tcp::{self, MutableTcpPacket, TcpPacket};

use super::error::{Error, Result};

/// Rewrites a TCP segment's checksum in place under a new IPv4 pseudo-header.
pub(crate) fn recalculate_tcp_checksum_ipv4(
    tcp_packet: &mut [u8],
    new_source: Ipv4Addr,
    new_destination: Ipv4Addr,
) -> Result<()> {
    let actual = tcp_packet.len();
    let mut packet = MutableTcpPacket::new(tcp_packet).ok_or(Error::PacketTooShort {
        expected: TcpPacket::minimum_packet_size(),
        actual,
    })?;

    let checksum = tcp::ipv4_checksum(&packet.to_immutable(), &new_source, &new_destination);
    packet.set_checksum(checksum);
    Ok(())
}

/// Rewrites a TCP segment's checksum in place under a new IPv6 pseudo-header.
pub(crate) fn recalculate_tcp_checksum_ipv6(
    tcp_packet: &mut [u8],
    new_source: Ipv6Addr,
    new_destination: Ipv6Addr,
) -> Result<()> {
    let actual = tcp_packet.len();
    let mut packet = MutableTcpPacket::new(tcp_packet).ok_or(Error::PacketTooShort {
        expected: TcpPacket::minimum_packet_size(),
        actual,
    })?;

    let checksum = tcp::ipv6_checksum(&packet.to_immutable(), &new_source, &new_destination);
    packet.set_checksum(checksum);
    Ok(())
}
