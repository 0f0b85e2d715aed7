use thiserror::Error;
use x509_parser::prelude::X509Error;

use crate::der::DerError;

/// Convenient Result type alias
pub type CrlResult<T> = Result<T, CrlError>;

/// CRL editing errors
///
/// None of these are retried internally: the input stream cannot be
/// rewound after partial consumption, so recovering from any of them
/// means building a fresh session over a fresh copy of the input.
#[derive(Error, Debug)]
pub enum CrlError {
    /// Operation invoked out of lifecycle order (add after lock, write
    /// before pre-scan, second pre-scan, second write)
    #[error("Invalid session state: {0}")]
    State(&'static str),

    /// The input does not match the expected DER structure
    #[error("CRL decoding failed: {0}")]
    Decoding(#[from] DerError),

    /// Whole-CRL parse failure on the rebuild path
    #[error("CRL parsing failed: {0}")]
    Parse(#[from] x509_parser::nom::Err<X509Error>),

    /// Rebuilding requires the v2 extensions block
    #[error("A version 1 CRL without extensions cannot be rebuilt")]
    LegacyCrl,

    /// Key, algorithm or signing failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] crate::crypto::Error),

    /// A pending entry or rewritten structure cannot be serialized
    #[error("CRL encoding failed: {0}")]
    Encoding(String),

    /// Failure writing to the output sink
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
