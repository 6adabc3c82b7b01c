//! Error types.

use trust_dns_proto::error::ProtoError;
use trust_dns_proto::op::ResponseCode;

/// Error enumerates the failure states surfaced by the nmcdns core.
///
/// The first five variants form the resolution taxonomy: each maps to a DNS
/// response code through [`Error::rcode`]. Everything else is an operational
/// failure and answers SERVFAIL.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a queried name does not contain the anchor label and
    /// therefore lies outside every zone this server is authoritative for.
    #[error("domain not in zone")]
    NotInZone,

    /// Returned when the upstream has no entry for a name, or a subtree walk
    /// hit a dead end.
    #[error("no such domain")]
    NoSuchDomain,

    /// Returned when a name exists but carries no records of any kind. The
    /// zone engine coerces this to an empty record set before it reaches the
    /// transport; the variant exists for callers that want to distinguish the
    /// two.
    #[error("no results")]
    NoResults,

    /// Returned when the upstream did not answer within the configured
    /// deadline. The outstanding request is orphaned, not cancelled.
    #[error("upstream deadline elapsed")]
    Timeout,

    /// Returned while the readiness gate is closed.
    #[error("server is not ready")]
    NotReady,

    /// Returned when a lookup's cancellation token fired before the upstream
    /// answered.
    #[error("lookup cancelled")]
    Cancelled,

    /// Returned for a name or label that fails validation.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// Returned when the top-level JSON stored for a name cannot be parsed
    /// at all. Malformed subfields inside an otherwise parseable value do
    /// not produce this; they are collected in the parse error sink.
    #[error("name value is not parseable JSON")]
    ValueParse(#[source] serde_json::Error),

    /// Returned for upstream failures other than "no such name".
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Returned when the configuration file is self-inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    Io(#[from] std::io::Error),

    /// Returned when JSON from disk (the config file) is invalid.
    #[error("invalid JSON")]
    InvalidJson(#[from] serde_json::Error),

    /// Returned when record assembly hits a DNS protocol error.
    #[error("DNS protocol error")]
    Proto(#[from] ProtoError),
}

impl Error {
    /// The response code this error should be represented as on the wire.
    pub fn rcode(&self) -> ResponseCode {
        match self {
            Error::NotInZone => ResponseCode::Refused,
            Error::NoSuchDomain => ResponseCode::NXDomain,
            Error::NoResults => ResponseCode::NoError,
            _ => ResponseCode::ServFail,
        }
    }
}
