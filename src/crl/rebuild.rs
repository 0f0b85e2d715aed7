//! Whole-object reconstruction for CRLs with no existing entries.
//!
//! A CRL without a `revokedCertificates` list would force special cases
//! through the entire streaming rewrite, so that path is skipped
//! entirely: the old CRL is small enough to decode outright, and a new
//! CertificateList is built from its fields plus the pending entries.
//! Adequate as long as the pending set stays modest (up to around a
//! thousand entries).

use std::io::{Read, Write};

use chrono::{TimeDelta, Utc};
use num_bigint::BigUint;
use tracing::debug;
use x509_parser::oid_registry::{OID_X509_EXT_AUTHORITY_KEY_IDENTIFIER, OID_X509_EXT_CRL_NUMBER};
use x509_parser::prelude::*;

use super::errors::{CrlError, CrlResult};
use crate::crypto::{AuthorityKeyIdentifier, IncrementalSigner, RsaSigningKey, SigningAlgorithm};
use crate::der::{self, DerReader, TimeKind, time};

const CRL_NUMBER: &[u64] = &[2, 5, 29, 20];
const AUTHORITY_KEY_ID: &[u64] = &[2, 5, 29, 35];

/// Decode the (still unread) session input and emit a freshly built,
/// re-signed CertificateList containing only the pending entries.
pub(crate) fn write_rebuilt<R: Read, W: Write>(
    input: &mut DerReader<R>,
    pending: &[Vec<u8>],
    signing_alg: Option<SigningAlgorithm>,
    key: &RsaSigningKey,
    aki: &AuthorityKeyIdentifier,
    out: &mut W,
) -> CrlResult<()> {
    let raw = input.read_to_end()?;
    let (_, crl) = CertificateRevocationList::from_der(&raw)?;

    if crl.tbs_cert_list.extensions().is_empty() {
        return Err(CrlError::LegacyCrl);
    }

    let alg = match signing_alg {
        Some(alg) => alg,
        None => resolve_algorithm(&crl.signature_algorithm)?,
    };

    let now = Utc::now();
    let old_this_update = crl.tbs_cert_list.this_update.timestamp();
    let next_update = crl
        .tbs_cert_list
        .next_update
        .as_ref()
        .map(|next| now + TimeDelta::seconds(next.timestamp() - old_this_update));

    let mut tbs_content = Vec::new();

    let version = crl.tbs_cert_list.version.map(|v| v.0).unwrap_or(1);
    der::push_integer(&mut tbs_content, &BigUint::from(version));

    tbs_content.extend_from_slice(&alg.algorithm_identifier());
    tbs_content.extend_from_slice(crl.tbs_cert_list.issuer.as_raw());
    tbs_content.extend_from_slice(&time::encode(TimeKind::for_date(now), now));
    if let Some(next) = next_update {
        tbs_content.extend_from_slice(&time::encode(TimeKind::for_date(next), next));
    }

    if !pending.is_empty() {
        let total: usize = pending.iter().map(Vec::len).sum();
        tbs_content.push(der::SEQUENCE_HEADER);
        der::push_length(&mut tbs_content, total);
        for entry in pending {
            tbs_content.extend_from_slice(entry);
        }
    }

    let extensions = rebuild_extensions(&crl, aki);
    if !extensions.is_empty() {
        let mut seq = vec![der::SEQUENCE_HEADER];
        der::push_length(&mut seq, extensions.len());
        seq.extend_from_slice(&extensions);

        tbs_content.push(0xa0);
        der::push_length(&mut tbs_content, seq.len());
        tbs_content.extend_from_slice(&seq);
    }

    let mut tbs = vec![der::SEQUENCE_HEADER];
    der::push_length(&mut tbs, tbs_content.len());
    tbs.extend_from_slice(&tbs_content);

    let mut signer = IncrementalSigner::new(alg, key)?;
    signer.update(&tbs)?;
    let signature = signer.finish()?;

    let mut body = tbs;
    body.extend_from_slice(&alg.algorithm_identifier());
    der::push_bit_string(&mut body, &signature);

    let mut output = vec![der::SEQUENCE_HEADER];
    der::push_length(&mut output, body.len());
    output.extend_from_slice(&body);
    out.write_all(&output)?;

    debug!(
        bytes = output.len(),
        entries = pending.len(),
        "rebuilt zero-entry CRL"
    );
    Ok(())
}

fn resolve_algorithm(identifier: &AlgorithmIdentifier<'_>) -> CrlResult<SigningAlgorithm> {
    let arcs: Vec<u64> = identifier
        .algorithm
        .iter()
        .map(|arcs| arcs.collect())
        .unwrap_or_default();
    SigningAlgorithm::from_oid(&arcs).ok_or_else(|| {
        crate::crypto::Error::UnsupportedAlgorithm(identifier.algorithm.to_id_string()).into()
    })
}

/// Carry over the CRL Number (incremented) and the replacement AKI in
/// their original order. Other extensions are not preserved by the
/// rebuild path.
fn rebuild_extensions(crl: &CertificateRevocationList<'_>, aki: &AuthorityKeyIdentifier) -> Vec<u8> {
    let mut out = Vec::new();
    for ext in crl.tbs_cert_list.extensions() {
        if ext.oid == OID_X509_EXT_CRL_NUMBER {
            if let Some(number) = crl.crl_number() {
                let mut value = Vec::new();
                der::push_integer(&mut value, &(number + 1u32));
                out.extend_from_slice(&encode_extension(CRL_NUMBER, &value));
            }
        } else if ext.oid == OID_X509_EXT_AUTHORITY_KEY_IDENTIFIER {
            out.extend_from_slice(&encode_extension(AUTHORITY_KEY_ID, &aki.extension_value()));
        }
    }
    out
}

fn encode_extension(oid: &[u64], inner: &[u8]) -> Vec<u8> {
    let mut content = Vec::new();
    der::push_oid(&mut content, oid);
    der::push_octet_string(&mut content, inner);

    let mut out = vec![der::SEQUENCE_HEADER];
    der::push_length(&mut out, content.len());
    out.extend_from_slice(&content);
    out
}
