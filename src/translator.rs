//! The packet pipeline and its control surface.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use ipnet::{Ipv4Net, Ipv6Net};
use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;

use crate::clock::{Clock, MonotonicClock};
use crate::error::Error;
use crate::pool::AddressPool;
use crate::rfc6052;
use crate::table::{AddressMapping, MappingKey, MappingTable};
use crate::xlat::error::Result as XlatResult;
use crate::xlat::{icmp, ip, tcp, udp};

/// Maximum number of simultaneous address mappings.
pub const MAX_MAPPINGS: usize = 254;

/// Idle time after which a mapping becomes eligible for reclamation.
pub const MAPPING_IDLE_TIMEOUT: Duration = Duration::from_secs(7200);

/// What the routing manager should do with a packet after a `handle_*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Pass the (possibly rewritten) buffer along.
    Forward,
    /// Free the buffer without forwarding it.
    Drop,
    /// Reserved: answer with the ICMP message left in the buffer. The
    /// translator does not currently produce this verdict; cases that would
    /// warrant it (e.g. TTL exhaustion) drop instead.
    ReplyIcmp,
}

/// A stateful NAT64 translator.
///
/// Rewrites IPv6 datagrams whose destination falls inside the configured
/// NAT64 prefix into IPv4 datagrams sourced from a bounded pool of host
/// addresses, and maps replies back through the same table. All operations
/// run on the caller's thread and never block; time is observed only through
/// the injected [`Clock`].
pub struct Translator<C: Clock = MonotonicClock> {
    clock: C,
    enabled: bool,
    nat64_prefix: Option<Ipv6Net>,
    ip4_cidr: Option<Ipv4Net>,
    pool: AddressPool,
    table: MappingTable,
}

impl Translator<MonotonicClock> {
    /// A translator with the default clock and mapping capacity, disabled
    /// and unconfigured.
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for Translator<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Translator<C> {
    /// A translator observing time through `clock`, with the default
    /// mapping capacity.
    pub fn with_clock(clock: C) -> Self {
        Self::with_capacity(clock, MAX_MAPPINGS)
    }

    /// A translator holding at most `capacity` simultaneous mappings.
    pub fn with_capacity(clock: C, capacity: usize) -> Self {
        Self {
            clock,
            enabled: false,
            nat64_prefix: None,
            ip4_cidr: None,
            pool: AddressPool::default(),
            table: MappingTable::new(capacity, MAPPING_IDLE_TIMEOUT),
        }
    }

    /// Sets or replaces the NAT64 prefix. Existing mappings are preserved.
    ///
    /// A prefix whose length is not one of the RFC 6052 set is accepted but
    /// leaves the data path in its "no prefix configured" behavior.
    pub fn set_nat64_prefix(&mut self, prefix: Ipv6Net) {
        if self.nat64_prefix != Some(prefix) {
            log::info!("NAT64 prefix set to {}", prefix);
            self.nat64_prefix = Some(prefix);
        }
    }

    /// Binds or replaces the IPv4 source pool.
    ///
    /// Rebinding the CIDR already in use is a no-op. Binding a different one
    /// releases every active mapping and rebuilds the pool from the new
    /// host addresses, capped at the mapping capacity.
    pub fn set_ipv4_cidr(&mut self, cidr: Ipv4Net) -> Result<(), Error> {
        if cidr.prefix_len() == 0 {
            return Err(Error::InvalidArgs);
        }
        if self.ip4_cidr == Some(cidr) {
            return Ok(());
        }

        self.table.clear(|_| ());
        self.pool = AddressPool::from_cidr(&cidr, self.table.capacity());
        self.ip4_cidr = Some(cidr);

        if let Some((first, last)) = self.pool.range() {
            log::info!(
                "IPv4 CIDR for NAT64: {} (address pool: {} - {}, {} addresses)",
                cidr,
                first,
                last,
                self.pool.len()
            );
        }
        Ok(())
    }

    /// Enables or disables the data path. Enabling requires a bound CIDR.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), Error> {
        if enabled && self.ip4_cidr.is_none() {
            return Err(Error::InvalidState);
        }
        if self.enabled != enabled {
            log::info!(
                "NAT64 translator {}",
                if enabled { "enabled" } else { "disabled" }
            );
            self.enabled = enabled;
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn nat64_prefix(&self) -> Option<Ipv6Net> {
        self.nat64_prefix
    }

    pub fn ipv4_cidr(&self) -> Option<Ipv4Net> {
        self.ip4_cidr
    }

    /// Active mappings, in no particular order.
    pub fn mappings(&self) -> impl Iterator<Item = &AddressMapping> {
        self.table.iter()
    }

    /// Number of IPv4 addresses currently available for new mappings.
    pub fn available_addresses(&self) -> usize {
        self.pool.len()
    }

    /// Translates an outgoing IPv6 datagram into IPv4, in place.
    ///
    /// On [`Verdict::Forward`] the buffer holds either the translated IPv4
    /// datagram or, when the destination lies outside the NAT64 prefix (or
    /// no CIDR is bound and an external translator takes over), the
    /// untouched original.
    pub fn handle_outgoing(&mut self, packet: &mut Vec<u8>) -> Verdict {
        if !self.enabled {
            return Verdict::Forward;
        }

        let (source, destination, next_header, hop_limit) =
            match Ipv6Packet::new(packet.as_slice()) {
                Some(header) if header.get_version() == 6 => (
                    header.get_source(),
                    header.get_destination(),
                    header.get_next_header(),
                    header.get_hop_limit(),
                ),
                _ => {
                    log::warn!("outgoing packet is not a valid IPv6 packet, drop");
                    return Verdict::Drop;
                }
            };

        let prefix = match self.nat64_prefix {
            Some(prefix) if rfc6052::is_nat64_prefix(&prefix) => prefix,
            _ => return Verdict::Forward,
        };
        if !prefix.contains(&destination) {
            // Not a NAT64-mapped destination; the stack routes it natively.
            return Verdict::Forward;
        }
        if self.ip4_cidr.is_none() {
            log::debug!("no IPv4 CIDR for NAT64 configured, forwarding to an external translator");
            return Verdict::Forward;
        }

        if hop_limit <= 1 {
            log::debug!("outgoing packet hop limit reached, drop");
            return Verdict::Drop;
        }

        let now_ms = self.clock.now_ms();
        let mapping = match self.get_or_create_mapping(source, now_ms) {
            Some(mapping) => mapping,
            None => {
                log::warn!("failed to get a mapping for {}, drop", source);
                return Verdict::Drop;
            }
        };

        let destination_v4 = match rfc6052::extract_ipv4_addr(destination, prefix.prefix_len()) {
            Ok(addr) => addr,
            // Prefix length was validated above
            Err(_) => return Verdict::Drop,
        };
        let protocol = match ip::protocol_v6_to_v4(next_header) {
            Ok(protocol) => protocol,
            Err(error) => {
                log::debug!("outgoing packet not translatable: {}, drop", error);
                return Verdict::Drop;
            }
        };

        packet.drain(..ip::IPV6_HEADER_LEN);

        if next_header == IpNextHeaderProtocols::Icmpv6 {
            if let Err(error) = icmp::translate_icmpv6_to_icmp(packet, &mapping, &prefix) {
                log::debug!("outgoing ICMPv6 packet not translatable: {}, drop", error);
                return Verdict::Drop;
            }
        }

        if let Err(error) =
            update_transport_checksum_v4(packet, protocol, mapping.ip4(), destination_v4)
        {
            log::debug!("outgoing packet checksum rewrite failed: {}, drop", error);
            return Verdict::Drop;
        }

        let header = match ip::synthesize_ipv4_header(
            mapping.ip4(),
            destination_v4,
            protocol,
            hop_limit - 1,
            packet.len(),
        ) {
            Ok(header) => header,
            Err(error) => {
                log::warn!("failed to synthesize IPv4 header: {}, drop", error);
                return Verdict::Drop;
            }
        };
        packet.splice(..0, header);
        Verdict::Forward
    }

    /// Translates an incoming IPv4 datagram into IPv6, in place.
    ///
    /// A buffer that already parses as IPv6 is not NAT64 ingress and is
    /// forwarded untouched.
    pub fn handle_incoming(&mut self, packet: &mut Vec<u8>) -> Verdict {
        if !self.enabled {
            return Verdict::Forward;
        }

        // Native IPv6 traffic is none of our business.
        if let Some(header) = Ipv6Packet::new(packet.as_slice()) {
            if header.get_version() == 6 {
                return Verdict::Forward;
            }
        }

        let (source, destination, protocol, ttl) = match Ipv4Packet::new(packet.as_slice()) {
            Some(header) if header.get_version() == 4 && header.get_header_length() == 5 => (
                header.get_source(),
                header.get_destination(),
                header.get_next_level_protocol(),
                header.get_ttl(),
            ),
            _ => {
                log::warn!("incoming packet is neither IPv4 nor IPv6, drop");
                return Verdict::Drop;
            }
        };

        if self.ip4_cidr.is_none() {
            log::debug!("incoming IPv4 packet with no CIDR bound, forwarding to an external translator");
            return Verdict::Forward;
        }
        let prefix = match self.nat64_prefix {
            Some(prefix) if rfc6052::is_nat64_prefix(&prefix) => prefix,
            _ => {
                log::warn!("incoming IPv4 packet but no NAT64 prefix configured, drop");
                return Verdict::Drop;
            }
        };

        if ttl <= 1 {
            log::debug!("incoming packet TTL reached, drop");
            return Verdict::Drop;
        }

        let now_ms = self.clock.now_ms();
        let mapping = match self.lookup_mapping_v4(destination, now_ms) {
            Some(mapping) => mapping,
            None => {
                log::warn!("no mapping found for {}, drop", destination);
                return Verdict::Drop;
            }
        };

        let next_header = match ip::protocol_v4_to_v6(protocol) {
            Ok(next_header) => next_header,
            Err(error) => {
                log::debug!("incoming packet not translatable: {}, drop", error);
                return Verdict::Drop;
            }
        };
        let source_v6 = match rfc6052::embed_ipv4_addr(source, prefix) {
            Ok(addr) => addr,
            // Prefix length was validated above
            Err(_) => return Verdict::Drop,
        };

        packet.drain(..ip::IPV4_HEADER_LEN);

        if protocol == IpNextHeaderProtocols::Icmp {
            if let Err(error) = icmp::translate_icmp_to_icmpv6(packet, &mapping, &prefix) {
                log::debug!("incoming ICMP packet not translatable: {}, drop", error);
                return Verdict::Drop;
            }
        }

        if let Err(error) =
            update_transport_checksum_v6(packet, next_header, source_v6, mapping.ip6())
        {
            log::debug!("incoming packet checksum rewrite failed: {}, drop", error);
            return Verdict::Drop;
        }

        let header = match ip::synthesize_ipv6_header(
            source_v6,
            mapping.ip6(),
            next_header,
            ttl - 1,
            packet.len(),
        ) {
            Ok(header) => header,
            Err(error) => {
                log::warn!("failed to synthesize IPv6 header: {}, drop", error);
                return Verdict::Drop;
            }
        };
        packet.splice(..0, header);
        Verdict::Forward
    }

    /// Finds the mapping for an IPv6 source, creating one if needed.
    ///
    /// Creation reclaims idle mappings first when every slot is taken, then
    /// requires both a free slot and an unused pool address. A found mapping
    /// has its expiry refreshed.
    fn get_or_create_mapping(&mut self, source: Ipv6Addr, now_ms: u64) -> Option<AddressMapping> {
        if let Some(slot) = self.table.find(&MappingKey::Ip6(source)) {
            self.table.touch(slot, now_ms);
            return self.table.get(slot).cloned();
        }

        if self.table.is_full() {
            let pool = &mut self.pool;
            self.table.sweep(now_ms, |mapping| {
                log::info!("mapping removed: {} -> {}", mapping.ip6(), mapping.ip4());
                pool.put(mapping.ip4());
            });
        }
        if self.table.is_full() {
            log::warn!("address mapping table is full");
            return None;
        }
        let ip4 = match self.pool.take() {
            Some(addr) => addr,
            None => {
                log::warn!("IPv4 address pool exhausted");
                return None;
            }
        };

        let slot = self.table.insert(source, ip4, now_ms)?;
        let mapping = self.table.get(slot).cloned();
        if let Some(mapping) = &mapping {
            log::info!("mapping created: {} -> {}", mapping.ip6(), mapping.ip4());
        }
        mapping
    }

    /// Finds the mapping owning an IPv4 destination and refreshes its
    /// expiry. Never creates; unknown destinations have no business here.
    fn lookup_mapping_v4(&mut self, destination: Ipv4Addr, now_ms: u64) -> Option<AddressMapping> {
        let slot = self.table.find(&MappingKey::Ip4(destination))?;
        self.table.touch(slot, now_ms);
        self.table.get(slot).cloned()
    }
}

fn update_transport_checksum_v4(
    packet: &mut [u8],
    protocol: IpNextHeaderProtocol,
    source: Ipv4Addr,
    destination: Ipv4Addr,
) -> XlatResult<()> {
    match protocol {
        IpNextHeaderProtocols::Udp => {
            udp::recalculate_udp_checksum_ipv4(packet, source, destination)
        }
        IpNextHeaderProtocols::Tcp => {
            tcp::recalculate_tcp_checksum_ipv4(packet, source, destination)
        }
        IpNextHeaderProtocols::Icmp => icmp::recalculate_icmp_checksum(packet),
        _ => Ok(()),
    }
}

fn update_transport_checksum_v6(
    packet: &mut [u8],
    next_header: IpNextHeaderProtocol,
    source: Ipv6Addr,
    destination: Ipv6Addr,
) -> XlatResult<()> {
    match next_header {
        IpNextHeaderProtocols::Udp => {
            udp::recalculate_udp_checksum_ipv6(packet, source, destination)
        }
        IpNextHeaderProtocols::Tcp => {
            tcp::recalculate_tcp_checksum_ipv6(packet, source, destination)
        }
        IpNextHeaderProtocols::Icmpv6 => {
            icmp::recalculate_icmpv6_checksum(packet, source, destination)
        }
        _ => Ok(()),
    }
}
