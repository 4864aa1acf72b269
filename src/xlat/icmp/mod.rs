//! ICMPv4 ↔ ICMPv6 payload translation.
//!
//! Echo messages are rewritten in place with identifier and sequence kept
//! bit-for-bit. Error messages are rebuilt: the outer 8-byte ICMP header is
//! replaced, the embedded IP header is verified against the address mapping
//! and translated, and the embedded payload is cut down to the 8 octets
//! RFC 792 asks for. Outer checksums are left to the pipeline, which knows
//! the new pseudo-header; embedded transport checksums stay untouched per
//! RFC 5508.

mod type_code;

use std::net::Ipv6Addr;

use ipnet::Ipv6Net;
use pnet_packet::icmp::{IcmpCode, IcmpPacket, IcmpType, IcmpTypes, MutableIcmpPacket};
use pnet_packet::icmpv6::{
    Icmpv6Code, Icmpv6Packet, Icmpv6Type, Icmpv6Types, MutableIcmpv6Packet,
};
use pnet_packet::ipv4::{self, Ipv4Packet};
use pnet_packet::ipv6::Ipv6Packet;

use super::error::{Error, Result};
use super::ip;
use crate::rfc6052;
use crate::table::AddressMapping;

/// Outer ICMP/ICMPv6 header length (type, code, checksum, rest-of-header).
const ICMP_HEADER_LEN: usize = 8;

/// How much of the embedded packet's payload an error message keeps.
const EMBEDDED_PAYLOAD_LEN: usize = 8;

/// Translates the ICMPv6 payload of an outgoing packet into ICMPv4.
///
/// `payload` holds the packet with its IPv6 header already stripped.
pub(crate) fn translate_icmpv6_to_icmp(
    payload: &mut Vec<u8>,
    mapping: &AddressMapping,
    prefix: &Ipv6Net,
) -> Result<()> {
    if payload.len() < ICMP_HEADER_LEN {
        return Err(Error::PacketTooShort {
            expected: ICMP_HEADER_LEN,
            actual: payload.len(),
        });
    }

    let icmpv6_type = Icmpv6Type(payload[0]);
    let icmpv6_code = Icmpv6Code(payload[1]);

    match icmpv6_type {
        Icmpv6Types::EchoRequest => {
            payload[0] = IcmpTypes::EchoRequest.0;
            Ok(())
        }
        Icmpv6Types::EchoReply => {
            payload[0] = IcmpTypes::EchoReply.0;
            Ok(())
        }
        _ => {
            let (icmp_type, icmp_code, rest_of_header) =
                type_code::translate_error_6_to_4(icmpv6_type, icmpv6_code)?;
            rebuild_error_6_to_4(payload, icmp_type, icmp_code, rest_of_header, mapping, prefix)
        }
    }
}

/// Translates the ICMPv4 payload of an incoming packet into ICMPv6.
///
/// `payload` holds the packet with its IPv4 header already stripped.
pub(crate) fn translate_icmp_to_icmpv6(
    payload: &mut Vec<u8>,
    mapping: &AddressMapping,
    prefix: &Ipv6Net,
) -> Result<()> {
    if payload.len() < ICMP_HEADER_LEN {
        return Err(Error::PacketTooShort {
            expected: ICMP_HEADER_LEN,
            actual: payload.len(),
        });
    }

    let icmp_type = IcmpType(payload[0]);
    let icmp_code = IcmpCode(payload[1]);

    match icmp_type {
        IcmpTypes::EchoRequest => {
            payload[0] = Icmpv6Types::EchoRequest.0;
            Ok(())
        }
        IcmpTypes::EchoReply => {
            payload[0] = Icmpv6Types::EchoReply.0;
            Ok(())
        }
        _ => {
            let rest_of_header = [payload[4], payload[5], payload[6], payload[7]];
            let (icmpv6_type, icmpv6_code, rest_of_header) =
                type_code::translate_error_4_to_6(icmp_type, icmp_code, rest_of_header)?;
            rebuild_error_4_to_6(payload, icmpv6_type, icmpv6_code, rest_of_header, mapping, prefix)
        }
    }
}

/// Rewrites an ICMPv4 checksum in place. No pseudo-header involved.
pub(crate) fn recalculate_icmp_checksum(packet: &mut [u8]) -> Result<()> {
    let actual = packet.len();
    let mut view = MutableIcmpPacket::new(packet).ok_or(Error::PacketTooShort {
        expected: IcmpPacket::minimum_packet_size(),
        actual,
    })?;

    let checksum = pnet_packet::icmp::checksum(&view.to_immutable());
    view.set_checksum(checksum);
    Ok(())
}

/// Rewrites an ICMPv6 checksum in place under the given pseudo-header.
pub(crate) fn recalculate_icmpv6_checksum(
    packet: &mut [u8],
    source: Ipv6Addr,
    destination: Ipv6Addr,
) -> Result<()> {
    let actual = packet.len();
    let mut view = MutableIcmpv6Packet::new(packet).ok_or(Error::PacketTooShort {
        expected: Icmpv6Packet::minimum_packet_size(),
        actual,
    })?;

    let checksum = pnet_packet::icmpv6::checksum(&view.to_immutable(), &source, &destination);
    view.set_checksum(checksum);
    Ok(())
}

/// Rebuilds an ICMPv4 error message as ICMPv6, translating the embedded
/// IPv4 packet back to the IPv6 original it was produced from.
fn rebuild_error_4_to_6(
    payload: &mut Vec<u8>,
    icmpv6_type: Icmpv6Type,
    icmpv6_code: Icmpv6Code,
    rest_of_header: [u8; 4],
    mapping: &AddressMapping,
    prefix: &Ipv6Net,
) -> Result<()> {
    let embedded = &payload[ICMP_HEADER_LEN..];
    let actual = embedded.len();
    let embedded_packet = Ipv4Packet::new(embedded).ok_or(Error::PacketTooShort {
        expected: ip::IPV4_HEADER_LEN,
        actual,
    })?;

    if embedded_packet.get_version() != 4 || embedded_packet.get_header_length() != 5 {
        return Err(Error::MalformedEmbeddedPacket);
    }
    // The quoted packet must be one we translated: its source is the mapped
    // IPv4 address.
    if embedded_packet.get_source() != mapping.ip4() {
        return Err(Error::EmbeddedAddressMismatch);
    }
    if ipv4::checksum(&embedded_packet) != embedded_packet.get_checksum() {
        return Err(Error::EmbeddedChecksumMismatch);
    }

    let next_header = ip::protocol_v4_to_v6(embedded_packet.get_next_level_protocol())?;
    let embedded_destination =
        rfc6052::embed_ipv4_addr(embedded_packet.get_destination(), *prefix)
            .map_err(|_| Error::MalformedEmbeddedPacket)?;
    let embedded_ttl = embedded_packet.get_ttl();

    let inner_payload_start = ICMP_HEADER_LEN + ip::IPV4_HEADER_LEN;
    let inner_payload_end = payload.len().min(inner_payload_start + EMBEDDED_PAYLOAD_LEN);

    let embedded_header = ip::synthesize_ipv6_header(
        mapping.ip6(),
        embedded_destination,
        next_header,
        embedded_ttl,
        inner_payload_end - inner_payload_start,
    )?;

    let mut rebuilt =
        Vec::with_capacity(ICMP_HEADER_LEN + ip::IPV6_HEADER_LEN + EMBEDDED_PAYLOAD_LEN);
    rebuilt.push(icmpv6_type.0);
    rebuilt.push(icmpv6_code.0);
    rebuilt.extend_from_slice(&[0, 0]); // checksum; the pipeline fills it in
    rebuilt.extend_from_slice(&rest_of_header);
    rebuilt.extend_from_slice(&embedded_header);
    rebuilt.extend_from_slice(&payload[inner_payload_start..inner_payload_end]);
    *payload = rebuilt;
    Ok(())
}

/// Rebuilds an ICMPv6 error message as ICMPv4, translating the embedded
/// IPv6 packet into the IPv4 form its addressee will recognize.
fn rebuild_error_6_to_4(
    payload: &mut Vec<u8>,
    icmp_type: IcmpType,
    icmp_code: IcmpCode,
    rest_of_header: [u8; 4],
    mapping: &AddressMapping,
    prefix: &Ipv6Net,
) -> Result<()> {
    let embedded = &payload[ICMP_HEADER_LEN..];
    let actual = embedded.len();
    let embedded_packet = Ipv6Packet::new(embedded).ok_or(Error::PacketTooShort {
        expected: ip::IPV6_HEADER_LEN,
        actual,
    })?;

    if embedded_packet.get_version() != 6 {
        return Err(Error::MalformedEmbeddedPacket);
    }
    // The quoted packet must be one addressed to the mapped IPv6 host.
    if embedded_packet.get_destination() != mapping.ip6() {
        return Err(Error::EmbeddedAddressMismatch);
    }

    let protocol = ip::protocol_v6_to_v4(embedded_packet.get_next_header())?;
    let embedded_source =
        rfc6052::extract_ipv4_addr(embedded_packet.get_source(), prefix.prefix_len())
            .map_err(|_| Error::MalformedEmbeddedPacket)?;
    let embedded_hop_limit = embedded_packet.get_hop_limit();

    let inner_payload_start = ICMP_HEADER_LEN + ip::IPV6_HEADER_LEN;
    let inner_payload_end = payload.len().min(inner_payload_start + EMBEDDED_PAYLOAD_LEN);

    let embedded_header = ip::synthesize_ipv4_header(
        embedded_source,
        mapping.ip4(),
        protocol,
        embedded_hop_limit,
        inner_payload_end - inner_payload_start,
    )?;

    let mut rebuilt =
        Vec::with_capacity(ICMP_HEADER_LEN + ip::IPV4_HEADER_LEN + EMBEDDED_PAYLOAD_LEN);
    rebuilt.push(icmp_type.0);
    rebuilt.push(icmp_code.0);
    rebuilt.extend_from_slice(&[0, 0]); // checksum; the pipeline fills it in
    rebuilt.extend_from_slice(&rest_of_header);
    rebuilt.extend_from_slice(&embedded_header);
    rebuilt.extend_from_slice(&payload[inner_payload_start..inner_payload_end]);
    *payload = rebuilt;
    Ok(())
}
