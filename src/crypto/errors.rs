use openssl::error::ErrorStack;
use thiserror::Error;

/// Convenient Result type alias
pub type CryptoResult<T> = Result<T, Error>;

/// Error type for cryptographic operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid key material or malformed input
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Only RSA-family signature algorithms are supported
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Internal OpenSSL error
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),

    /// Signing operation failed
    #[error("Signing failed: {0}")]
    Signing(String),
}
