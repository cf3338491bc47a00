//! Error types for courier.

use thiserror::Error;

/// Main error type for all courier operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Payload does not fit in the 24-bit frame length field.
    #[error("payload size {0} exceeds maximum 16777215")]
    PayloadTooLarge(usize),

    /// Malformed frame, short read or unexpected end of stream.
    #[error("frame error: {0}")]
    Frame(String),

    /// No Pong arrived before the keep-alive deadline.
    #[error("keep-alive timeout")]
    KeepAliveTimeout,

    /// `send()` was called without a prior `begin()`.
    #[error("no pending output message")]
    NoPendingOutput,

    /// `begin()` was called while a previous message is still pending.
    #[error("a pending output message already exists")]
    AlreadyPending,

    /// A send was attempted while no connection is established.
    #[error("not connected")]
    NotConnected,

    /// A handler was registered for a variant the envelope does not declare.
    #[error("unknown message variant: {0}")]
    UnknownVariant(String),

    /// Message definitions do not satisfy the envelope contract.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Malformed `tcp://<host>:<port>` URI.
    #[error("{0}")]
    BadUri(String),
}

/// Result type alias using CourierError.
pub type Result<T> = std::result::Result<T, CourierError>;

/// Classified connect failure, handed to the `on_connect_failure` callback.
///
/// Never propagates out of the engine; the callback decides whether to
/// retry (and after what delay) or give up.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The peer actively refused the connection.
    #[error("connection refused")]
    Refused,

    /// The connect attempt did not complete within the configured timeout.
    #[error("connect timeout")]
    Timeout,

    /// Any other connect-time I/O failure.
    #[error("connect failed: {0}")]
    Other(std::io::Error),
}

/// Schema validation error, fatal at generation time only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A required envelope message type is missing from the schema.
    #[error("the {0} message is missing")]
    MissingEnvelope(String),

    /// The envelope message does not contain exactly one oneof and
    /// nothing else.
    #[error("the {0} message does not contain exactly one oneof")]
    NotExactlyOneChoice(String),

    /// The envelope's oneof has the wrong name.
    #[error("the oneof in {0} must be called messages, not {1}")]
    BadChoiceName(String, String),
}
