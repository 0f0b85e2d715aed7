//! Streaming, incremental editing of X.509 Certificate Revocation
//! Lists.
//!
//! Given an existing DER-encoded CRL, a [`CrlStreamWriter`] session adds
//! newly revoked entries, drops entries selected by a deletion
//! predicate, refreshes `thisUpdate`/`nextUpdate` and the CRL-level
//! extensions (CRL Number + 1, replacement Authority Key Identifier),
//! and emits a freshly re-signed CRL in a single pass, copying every
//! unmodified byte range verbatim and never materializing the existing
//! entry list in memory.
//!
//! ```no_run
//! use crl_stream::{AuthorityKeyIdentifier, CrlStreamWriter, ReasonCode, RsaSigningKey};
//! use num_bigint::BigUint;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let der = std::fs::read("ca.crl")?;
//! let key = RsaSigningKey::from_pem(std::fs::read("ca.key")?)?;
//! let aki = AuthorityKeyIdentifier::from_public_key_der(key.public_key_der()?)?;
//!
//! let mut session = CrlStreamWriter::new(der.as_slice(), key, aki);
//! session.add(
//!     BigUint::from(90000u32),
//!     chrono::Utc::now(),
//!     ReasonCode::PrivilegeWithdrawn,
//! )?;
//!
//! // the pre-scan pass needs its own copy of the input bytes
//! session
//!     .pre_scan_filtered(der.as_slice(), |entry| {
//!         entry.serial == BigUint::from(1024u32)
//!     })?
//!     .lock()?;
//!
//! let mut out = Vec::new();
//! session.write(&mut out)?;
//! # Ok(())
//! # }
//! ```

pub mod crl;
pub mod crypto;
pub mod der;

pub use crl::{
    CrlEntryStream, CrlError, CrlResult, CrlStreamWriter, ExistingEntry, ReasonCode, RevokedEntry,
};
pub use crypto::{AuthorityKeyIdentifier, IncrementalSigner, RsaSigningKey, SigningAlgorithm};
