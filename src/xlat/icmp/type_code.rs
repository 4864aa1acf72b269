//! Type, code and rest-of-header mapping between ICMP and ICMPv6 error
//! messages. Echo messages never reach these tables; the parent module
//! rewrites them in place.

use pnet_packet::icmp::{destination_unreachable::IcmpCodes, IcmpCode, IcmpType, IcmpTypes};
use pnet_packet::icmpv6::{Icmpv6Code, Icmpv6Type, Icmpv6Types};

use super::super::error::{Error, Result};

/// Offset of the Next Header field inside the IPv6 fixed header.
const IPV6_NEXT_HEADER_OFFSET: u32 = 6;

/// Size difference between the IPv6 and IPv4 fixed headers, applied to the
/// MTU carried by Fragmentation Needed when it becomes Packet Too Big.
const HEADER_SIZE_DELTA: u16 = 20;

/// Maps each IPv4 header byte offset to its IPv6 counterpart for Parameter
/// Problem pointers, byte for byte: Version/IHL and ToS land on the first
/// header byte, Total Length on the two Payload Length bytes, TTL on Hop
/// Limit, Protocol on Next Header, and each address byte on the matching
/// byte of the IPv6 address. `0xff` marks fields with no IPv6 equivalent
/// (identification, flags/fragment offset, header checksum).
const POINTER_MAP_4_TO_6: [u8; 20] = [
    0, 0, 4, 5, 0xff, 0xff, 0xff, 0xff, 7, 6, 0xff, 0xff, 8, 9, 10, 11, 24, 25, 26, 27,
];

/// Translates an ICMPv4 error's type, code and rest-of-header into the
/// ICMPv6 rendering. Anything that has no rendering is an error.
pub(crate) fn translate_error_4_to_6(
    icmp_type: IcmpType,
    icmp_code: IcmpCode,
    rest_of_header: [u8; 4],
) -> Result<(Icmpv6Type, Icmpv6Code, [u8; 4])> {
    match (icmp_type, icmp_code) {
        // Protocol Unreachable: the IPv6 side hears about it as a Parameter
        // Problem pointing at the Next Header field.
        (IcmpTypes::DestinationUnreachable, IcmpCodes::DestinationProtocolUnreachable) => Ok((
            Icmpv6Types::ParameterProblem,
            Icmpv6Code(1), // unrecognized Next Header
            IPV6_NEXT_HEADER_OFFSET.to_be_bytes(),
        )),

        // Fragmentation Needed becomes Packet Too Big; the reported MTU
        // shrinks by the fixed-header size difference.
        (IcmpTypes::DestinationUnreachable, IcmpCodes::FragmentationRequiredAndDFFlagSet) => {
            let mtu = u16::from_be_bytes([rest_of_header[2], rest_of_header[3]]);
            let mtu = u32::from(mtu.saturating_sub(HEADER_SIZE_DELTA));
            Ok((Icmpv6Types::PacketTooBig, Icmpv6Code(0), mtu.to_be_bytes()))
        }

        (IcmpTypes::DestinationUnreachable, IcmpCodes::HostPrecedenceViolation) => {
            Err(Error::UnsupportedIcmp(icmp_type.0, icmp_code.0))
        }

        (IcmpTypes::DestinationUnreachable, IcmpCodes::DestinationPortUnreachable) => Ok((
            Icmpv6Types::DestinationUnreachable,
            Icmpv6Code(4), // port unreachable
            [0; 4],
        )),

        (
            IcmpTypes::DestinationUnreachable,
            IcmpCodes::NetworkAdministrativelyProhibited
            | IcmpCodes::HostAdministrativelyProhibited
            | IcmpCodes::CommunicationAdministrativelyProhibited
            | IcmpCodes::PrecedenceCutoffInEffect,
        ) => Ok((
            Icmpv6Types::DestinationUnreachable,
            Icmpv6Code(1), // administratively prohibited
            [0; 4],
        )),

        (
            IcmpTypes::DestinationUnreachable,
            IcmpCodes::DestinationNetworkUnreachable
            | IcmpCodes::DestinationHostUnreachable
            | IcmpCodes::SourceRouteFailed
            | IcmpCodes::DestinationNetworkUnknown
            | IcmpCodes::DestinationHostUnknown
            | IcmpCodes::SourceHostIsolated
            | IcmpCodes::NetworkUnreachableForTOS
            | IcmpCodes::HostUnreachableForTOS,
        ) => Ok((
            Icmpv6Types::DestinationUnreachable,
            Icmpv6Code(0), // no route to destination
            [0; 4],
        )),

        // Parameter Problem: "pointer indicates the error" and "bad length"
        // carry over, with the pointer mapped through the offset table.
        (IcmpTypes::ParameterProblem, IcmpCode(0 | 2)) => {
            let pointer = rest_of_header[0];
            let mapped = POINTER_MAP_4_TO_6
                .get(pointer as usize)
                .copied()
                .unwrap_or(0xff);
            if mapped == 0xff {
                return Err(Error::UntranslatablePointer(pointer));
            }
            Ok((
                Icmpv6Types::ParameterProblem,
                Icmpv6Code(0), // erroneous header field
                u32::from(mapped).to_be_bytes(),
            ))
        }

        (IcmpTypes::TimeExceeded, code) => {
            Ok((Icmpv6Types::TimeExceeded, Icmpv6Code(code.0), [0; 4]))
        }

        (icmp_type, icmp_code) => Err(Error::UnsupportedIcmp(icmp_type.0, icmp_code.0)),
    }
}

/// Translates an ICMPv6 error's type and code into the ICMPv4 rendering.
///
/// The coverage toward IPv4 is deliberately narrower than the other
/// direction; only the two Destination Unreachable codes listed here carry
/// over, everything else is an error.
pub(crate) fn translate_error_6_to_4(
    icmpv6_type: Icmpv6Type,
    icmpv6_code: Icmpv6Code,
) -> Result<(IcmpType, IcmpCode, [u8; 4])> {
    match (icmpv6_type, icmpv6_code) {
        // No Route to Destination
        (Icmpv6Types::DestinationUnreachable, Icmpv6Code(0)) => Ok((
            IcmpTypes::DestinationUnreachable,
            IcmpCodes::DestinationHostUnreachable,
            [0; 4],
        )),

        // Port Unreachable
        (Icmpv6Types::DestinationUnreachable, Icmpv6Code(4)) => Ok((
            IcmpTypes::DestinationUnreachable,
            IcmpCodes::DestinationPortUnreachable,
            [0; 4],
        )),

        (icmpv6_type, icmpv6_code) => {
            Err(Error::UnsupportedIcmpv6(icmpv6_type.0, icmpv6_code.0))
        }
    }
}
