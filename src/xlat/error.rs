/// Reasons the data path can refuse a packet.
///
/// None of these escape the translator; the pipeline logs them and answers
/// [`Verdict::Drop`](crate::Verdict::Drop).
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub(crate) enum Error {
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },
    #[error("IP protocol {0} has no translation")]
    UnsupportedProtocol(u8),
    #[error("ICMP type {0} code {1} has no translation")]
    UnsupportedIcmp(u8, u8),
    #[error("ICMPv6 type {0} code {1} has no translation")]
    UnsupportedIcmpv6(u8, u8),
    #[error("ICMP pointer {0} has no IPv6 equivalent")]
    UntranslatablePointer(u8),
    #[error("embedded packet does not match the address mapping")]
    EmbeddedAddressMismatch,
    #[error("embedded IPv4 header checksum mismatch")]
    EmbeddedChecksumMismatch,
    #[error("embedded packet is not a plain IP header")]
    MalformedEmbeddedPacket,
    #[error("payload does not fit the IP length field")]
    PayloadTooLong,
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
