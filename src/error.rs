//! Unified error type.

/// The error type returned by veil's fallible operations.
///
/// Handler-level failures (a 404, a 500 with a stack trace in the body) are
/// expressed as responses written to a sink, not as `Error`s. This type
/// surfaces what goes wrong *around* the handler: a write after the response
/// was released, a payload that would not encode, a malformed header or a bad
/// config file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The interceptor already handed its captured output to the real sink.
    #[error("response already released")]
    Released,

    #[error("encode error payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("server fault threshold {0} is outside 500..=599")]
    Threshold(u16),
}
