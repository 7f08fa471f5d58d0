//! Error types for the registry client.

/// Registry client errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Client-side configuration problem.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Transport failure.
    #[error("network error: {message}")]
    Network { message: String },

    /// The response body failed to gunzip.
    #[error("gunzip error: {message}")]
    Gunzip { message: String },

    /// The payload failed to decode as the expected protobuf message.
    #[error("protobuf decode error: {0}")]
    Proto(#[from] prost::DecodeError),

    /// Signature verification failed.
    #[error("signature verification failed: {reason}")]
    SignatureInvalid { reason: String },

    /// The configured repository public key could not be loaded.
    #[error("invalid repository public key: {message}")]
    InvalidKey { message: String },

    /// The response body was not in the expected shape.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for registry operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
