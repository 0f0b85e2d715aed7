//! Streaming editing of X.509 Certificate Revocation Lists.
//!
//! The CRL schema (RFC 5280 §5) for reference:
//!
//! ```text
//! CertificateList  ::=  SEQUENCE  {
//!      tbsCertList          TBSCertList,
//!      signatureAlgorithm   AlgorithmIdentifier,
//!      signatureValue       BIT STRING  }
//!
//! TBSCertList  ::=  SEQUENCE  {
//!      version                 Version OPTIONAL, -- if present, MUST be v2
//!      signature               AlgorithmIdentifier,
//!      issuer                  Name,
//!      thisUpdate              Time,
//!      nextUpdate              Time OPTIONAL,
//!      revokedCertificates     SEQUENCE OF SEQUENCE  {
//!           userCertificate         CertificateSerialNumber,
//!           revocationDate          Time,
//!           crlEntryExtensions      Extensions OPTIONAL } OPTIONAL,
//!      crlExtensions           [0]  EXPLICIT Extensions OPTIONAL }
//! ```
//!
//! The signature covers exactly the `tbsCertList` TLV. Editing the
//! entry list therefore means recomputing every enclosing length field
//! (whose own encoded width can change at the 127/128-style boundaries)
//! and feeding precisely the rewritten TBS bytes to the signer, while
//! copying untouched entries through verbatim.

mod entry;
mod errors;
mod extensions;
mod rebuild;
mod stream;
mod writer;

pub use entry::{ExistingEntry, ReasonCode, RevokedEntry};
pub use errors::{CrlError, CrlResult};
pub use stream::CrlEntryStream;
pub use writer::CrlStreamWriter;
