//! Rewriting of the CRL-level extensions block.
//!
//! The editor touches exactly two extensions: CRL Number is incremented
//! and the Authority Key Identifier is replaced with the one belonging
//! to the new signing key. Every other extension is copied through
//! unchanged, criticality octets included.

use num_bigint::BigUint;

use super::errors::{CrlError, CrlResult};
use crate::crypto::AuthorityKeyIdentifier;
use crate::der::{
    self, DerError, DerReader, TAG_BOOLEAN, TAG_INTEGER, TAG_OCTET_STRING, TAG_OID,
};

/// Content octets of id-ce-cRLNumber (2.5.29.20).
const CRL_NUMBER_OID: &[u8] = &[0x55, 0x1d, 0x14];
/// Content octets of id-ce-authorityKeyIdentifier (2.5.29.35).
const AKI_OID: &[u8] = &[0x55, 0x1d, 0x23];

/// Rewrite a complete `[0] EXPLICIT Extensions` TLV.
pub(crate) fn rewrite_crl_extensions(
    old_block: &[u8],
    aki: &AuthorityKeyIdentifier,
) -> CrlResult<Vec<u8>> {
    let mut reader = DerReader::new(old_block);

    let tag = reader.read_tag()?;
    if !tag.is_context(0) {
        return Err(DerError::UnexpectedTag {
            expected: "crlExtensions [0]",
            found: tag,
        }
        .into());
    }
    reader.read_length()?;

    reader.expect_sequence("Extensions")?;
    let seq_len = reader.read_length()?;
    let extensions = reader.read_exact(seq_len)?;

    let mut rebuilt = Vec::new();
    let mut ext_reader = DerReader::new(extensions.as_slice());
    while ext_reader.consumed() < extensions.len() {
        ext_reader.expect_sequence("Extension")?;
        let len = ext_reader.read_length()?;
        let content = ext_reader.read_exact(len)?;
        rebuilt.extend_from_slice(&rewrite_extension(&content, aki)?);
    }

    let mut seq = Vec::with_capacity(rebuilt.len() + 4);
    seq.push(der::SEQUENCE_HEADER);
    der::push_length(&mut seq, rebuilt.len());
    seq.extend_from_slice(&rebuilt);

    let mut out = Vec::with_capacity(seq.len() + 4);
    out.push(0xa0);
    der::push_length(&mut out, seq.len());
    out.extend_from_slice(&seq);
    Ok(out)
}

/// Rewrite a single Extension from its SEQUENCE content octets.
fn rewrite_extension(content: &[u8], aki: &AuthorityKeyIdentifier) -> CrlResult<Vec<u8>> {
    let mut reader = DerReader::new(content);

    let tag = reader.read_tag()?;
    if !tag.is_universal(TAG_OID) {
        return Err(DerError::UnexpectedTag {
            expected: "extnID OBJECT IDENTIFIER",
            found: tag,
        }
        .into());
    }
    let oid_len = reader.read_length()?;
    let oid = reader.read_exact(oid_len)?;

    // critical BOOLEAN DEFAULT FALSE
    let mut critical = Vec::new();
    let mut tag = reader.read_tag()?;
    if tag.is_universal(TAG_BOOLEAN) {
        let len = reader.read_length()?;
        critical.push(TAG_BOOLEAN as u8);
        der::push_length(&mut critical, len);
        critical.extend_from_slice(&reader.read_exact(len)?);
        tag = reader.read_tag()?;
    }

    if !tag.is_universal(TAG_OCTET_STRING) {
        return Err(DerError::UnexpectedTag {
            expected: "extnValue OCTET STRING",
            found: tag,
        }
        .into());
    }
    let value_len = reader.read_length()?;
    let value = reader.read_exact(value_len)?;

    let new_value = if oid == CRL_NUMBER_OID {
        increment_crl_number(&value)?
    } else if oid == AKI_OID {
        aki.extension_value()
    } else {
        value
    };

    let mut rebuilt = Vec::new();
    rebuilt.push(TAG_OID as u8);
    der::push_length(&mut rebuilt, oid.len());
    rebuilt.extend_from_slice(&oid);
    rebuilt.extend_from_slice(&critical);
    der::push_octet_string(&mut rebuilt, &new_value);

    let mut out = Vec::with_capacity(rebuilt.len() + 4);
    out.push(der::SEQUENCE_HEADER);
    der::push_length(&mut out, rebuilt.len());
    out.extend_from_slice(&rebuilt);
    Ok(out)
}

/// Decode the INTEGER inside the CRL Number extnValue, add one, and
/// re-encode it.
fn increment_crl_number(value: &[u8]) -> CrlResult<Vec<u8>> {
    let mut reader = DerReader::new(value);
    let tag = reader.read_tag()?;
    if !tag.is_universal(TAG_INTEGER) {
        return Err(DerError::UnexpectedTag {
            expected: "CRLNumber INTEGER",
            found: tag,
        }
        .into());
    }
    let len = reader.read_length()?;
    if len == 0 {
        return Err(CrlError::from(DerError::InvalidValue("CRLNumber")));
    }
    let number = BigUint::from_bytes_be(&reader.read_exact(len)?);

    let mut out = Vec::new();
    der::push_integer(&mut out, &(number + 1u32));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extension(oid: &[u8], critical: Option<bool>, inner: &[u8]) -> Vec<u8> {
        let mut content = Vec::new();
        content.push(TAG_OID as u8);
        der::push_length(&mut content, oid.len());
        content.extend_from_slice(oid);
        if let Some(flag) = critical {
            content.extend_from_slice(&[0x01, 0x01, if flag { 0xff } else { 0x00 }]);
        }
        der::push_octet_string(&mut content, inner);

        let mut out = vec![der::SEQUENCE_HEADER];
        der::push_length(&mut out, content.len());
        out.extend_from_slice(&content);
        out
    }

    fn block(extensions: &[Vec<u8>]) -> Vec<u8> {
        let flat: Vec<u8> = extensions.concat();
        let mut seq = vec![der::SEQUENCE_HEADER];
        der::push_length(&mut seq, flat.len());
        seq.extend_from_slice(&flat);

        let mut out = vec![0xa0];
        der::push_length(&mut out, seq.len());
        out.extend_from_slice(&seq);
        out
    }

    fn crl_number_value(n: u32) -> Vec<u8> {
        let mut out = Vec::new();
        der::push_integer(&mut out, &BigUint::from(n));
        out
    }

    #[test]
    fn test_crl_number_incremented() {
        let aki = AuthorityKeyIdentifier::from_key_id(vec![0x11; 20]);
        let old = block(&[extension(CRL_NUMBER_OID, None, &crl_number_value(41))]);

        let new = rewrite_crl_extensions(&old, &aki).unwrap();
        let expected = block(&[extension(CRL_NUMBER_OID, None, &crl_number_value(42))]);
        assert_eq!(new, expected);
    }

    #[test]
    fn test_crl_number_boundary_grows_block() {
        // 127 -> 128 adds a sign octet to the INTEGER
        let aki = AuthorityKeyIdentifier::from_key_id(vec![0x11; 20]);
        let old = block(&[extension(CRL_NUMBER_OID, None, &crl_number_value(127))]);

        let new = rewrite_crl_extensions(&old, &aki).unwrap();
        let expected = block(&[extension(CRL_NUMBER_OID, None, &crl_number_value(128))]);
        assert_eq!(new, expected);
        assert_eq!(new.len(), old.len() + 1);
    }

    #[test]
    fn test_aki_replaced() {
        let old_aki = AuthorityKeyIdentifier::from_key_id(vec![0x22; 20]);
        let new_aki = AuthorityKeyIdentifier::from_key_id(vec![0x33; 20]);

        let old = block(&[extension(AKI_OID, None, &old_aki.extension_value())]);
        let new = rewrite_crl_extensions(&old, &new_aki).unwrap();
        let expected = block(&[extension(AKI_OID, None, &new_aki.extension_value())]);
        assert_eq!(new, expected);
    }

    #[test]
    fn test_other_extensions_copied_verbatim() {
        // issuerAltName with an opaque payload, marked critical
        let ian_oid: &[u8] = &[0x55, 0x1d, 0x12];
        let aki = AuthorityKeyIdentifier::from_key_id(vec![0x44; 20]);

        let untouched = extension(ian_oid, Some(true), &[0xde, 0xad, 0xbe, 0xef]);
        let old = block(&[
            extension(CRL_NUMBER_OID, None, &crl_number_value(5)),
            untouched.clone(),
        ]);

        let new = rewrite_crl_extensions(&old, &aki).unwrap();
        let expected = block(&[
            extension(CRL_NUMBER_OID, None, &crl_number_value(6)),
            untouched,
        ]);
        assert_eq!(new, expected);
    }

    #[test]
    fn test_malformed_block_rejected() {
        let aki = AuthorityKeyIdentifier::from_key_id(vec![0x55; 20]);
        assert!(rewrite_crl_extensions(&[0x30, 0x00], &aki).is_err());
        assert!(rewrite_crl_extensions(&[0xa0, 0x02, 0x04, 0x00], &aki).is_err());
    }
}
