/// Errors returned by the translator's control operations.
///
/// These cover configuration mistakes only; a failed `set_*` call leaves the
/// previous state untouched. Data-path problems never surface here, they
/// become [`Verdict::Drop`](crate::Verdict::Drop).
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The supplied argument cannot be used, e.g. an IPv4 CIDR that yields
    /// no usable host addresses.
    #[error("invalid argument")]
    InvalidArgs,
    /// The operation is not valid right now, e.g. enabling the translator
    /// before an IPv4 CIDR is bound.
    #[error("invalid state")]
    InvalidState,
}
