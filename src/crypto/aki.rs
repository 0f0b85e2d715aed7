use std::fmt;

use openssl::sha::sha1;
use x509_parser::prelude::*;

use super::errors::{CryptoResult, Error};
use crate::der::{self, DerReader, TAG_BIT_STRING};

/// Authority Key Identifier material for the rewritten CRL.
///
/// RFC 5280 §5.2.1 requires conforming CRL issuers to carry this
/// extension; the editor substitutes the identifier of the key that will
/// sign the output. The identifier is the SHA-1 digest of the signing
/// key's `subjectPublicKey` BIT STRING content.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    key_id: Vec<u8>,
}

impl AuthorityKeyIdentifier {
    /// Use raw key-identifier octets as-is.
    pub fn from_key_id(key_id: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id: key_id.into(),
        }
    }

    /// Derive from a SubjectPublicKeyInfo DER encoding.
    pub fn from_public_key_der(spki: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let mut reader = DerReader::new(spki.as_ref());
        let parse = |reader: &mut DerReader<&[u8]>| -> Result<Vec<u8>, der::DerError> {
            reader.expect_sequence("SubjectPublicKeyInfo")?;
            reader.read_length()?;

            // skip the AlgorithmIdentifier
            reader.expect_sequence("AlgorithmIdentifier")?;
            let alg_len = reader.read_length()?;
            reader.read_exact(alg_len)?;

            let tag = reader.read_tag()?;
            if !tag.is_universal(TAG_BIT_STRING) {
                return Err(der::DerError::UnexpectedTag {
                    expected: "subjectPublicKey BIT STRING",
                    found: tag,
                });
            }
            let len = reader.read_length()?;
            if len == 0 {
                return Err(der::DerError::InvalidValue("subjectPublicKey"));
            }
            let bits = reader.read_exact(len)?;
            // drop the unused-bits octet
            Ok(bits[1..].to_vec())
        };

        let key_bits = parse(&mut reader)
            .map_err(|e| Error::InvalidKey(format!("malformed SubjectPublicKeyInfo: {e}")))?;
        Ok(Self {
            key_id: sha1(&key_bits).to_vec(),
        })
    }

    /// Derive from a DER-encoded CA certificate.
    pub fn from_ca_cert_der(cert: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let (_, cert) = X509Certificate::from_der(cert.as_ref())
            .map_err(|e| Error::InvalidKey(format!("CA certificate parsing failed: {e}")))?;
        let key_bits = &cert.public_key().subject_public_key.data;
        Ok(Self {
            key_id: sha1(key_bits).to_vec(),
        })
    }

    /// Derive from a PEM-encoded CA certificate.
    pub fn from_ca_cert_pem(cert: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let (_, pem) = parse_x509_pem(cert.as_ref())
            .map_err(|e| Error::InvalidKey(format!("CA certificate parsing failed: {e}")))?;
        Self::from_ca_cert_der(&pem.contents)
    }

    pub fn key_id(&self) -> &[u8] {
        &self.key_id
    }

    /// The extension's inner value: `SEQUENCE { [0] IMPLICIT keyIdentifier }`.
    pub fn extension_value(&self) -> Vec<u8> {
        let mut inner = Vec::with_capacity(self.key_id.len() + 2);
        inner.push(0x80); // [0] IMPLICIT, primitive
        der::push_length(&mut inner, self.key_id.len());
        inner.extend_from_slice(&self.key_id);

        let mut out = Vec::with_capacity(inner.len() + 2);
        out.push(der::SEQUENCE_HEADER);
        der::push_length(&mut out, inner.len());
        out.extend_from_slice(&inner);
        out
    }
}

impl fmt::Debug for AuthorityKeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityKeyIdentifier")
            .field("key_id", &hex::encode(&self.key_id))
            .finish()
    }
}
