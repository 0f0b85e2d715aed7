//! Shared fixtures for the stream-writer integration tests: a small CRL
//! builder over the crate's DER primitives, plus parsing and
//! verification helpers for inspecting the output.

use chrono::{DateTime, TimeDelta, Utc};
use num_bigint::BigUint;
use openssl::pkey::PKey;
use openssl::x509::X509Crl;
use x509_parser::oid_registry::{OID_X509_EXT_AUTHORITY_KEY_IDENTIFIER, OID_X509_EXT_CRL_NUMBER};
use x509_parser::prelude::*;

use crl_stream::der::{self, TimeKind, time};
use crl_stream::{
    AuthorityKeyIdentifier, CrlEntryStream, IncrementalSigner, ReasonCode, RevokedEntry,
    RsaSigningKey, SigningAlgorithm,
};

/// Install a test subscriber so `RUST_LOG` surfaces the library's
/// tracing output; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds signed input CRLs for the tests.
pub struct CrlBuilder {
    issuer_cn: String,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    entries: Vec<(BigUint, DateTime<Utc>, ReasonCode)>,
    crl_number: Option<BigUint>,
    aki: Option<AuthorityKeyIdentifier>,
    algorithm: SigningAlgorithm,
}

impl CrlBuilder {
    pub fn new(issuer_cn: &str) -> Self {
        Self {
            issuer_cn: issuer_cn.to_string(),
            this_update: Utc::now(),
            next_update: Some(Utc::now() + TimeDelta::days(1)),
            entries: Vec::new(),
            // 127 sits right below an INTEGER width boundary, so the
            // increment to 128 exercises the length ripple
            crl_number: Some(BigUint::from(127u32)),
            aki: None,
            algorithm: SigningAlgorithm::Sha256WithRsa,
        }
    }

    pub fn times(mut self, this_update: DateTime<Utc>, next_update: Option<DateTime<Utc>>) -> Self {
        self.this_update = this_update;
        self.next_update = next_update;
        self
    }

    pub fn crl_number(mut self, number: u32) -> Self {
        self.crl_number = Some(BigUint::from(number));
        self
    }

    pub fn aki(mut self, aki: AuthorityKeyIdentifier) -> Self {
        self.aki = Some(aki);
        self
    }

    /// Drop every CRL-level extension, producing a v1-profile CRL.
    pub fn without_extensions(mut self) -> Self {
        self.crl_number = None;
        self.aki = None;
        self
    }

    pub fn algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn entry(mut self, serial: u64, date: DateTime<Utc>, reason: ReasonCode) -> Self {
        self.entries.push((BigUint::from(serial), date, reason));
        self
    }

    pub fn build(self, key: &RsaSigningKey) -> Vec<u8> {
        let has_extensions = self.crl_number.is_some() || self.aki.is_some();

        let mut tbs_content = Vec::new();
        if has_extensions {
            // v2
            der::push_integer(&mut tbs_content, &BigUint::from(1u32));
        }
        tbs_content.extend_from_slice(&self.algorithm.algorithm_identifier());
        tbs_content.extend_from_slice(&issuer_name(&self.issuer_cn));
        tbs_content.extend_from_slice(&time::encode(
            TimeKind::for_date(self.this_update),
            self.this_update,
        ));
        if let Some(next) = self.next_update {
            tbs_content.extend_from_slice(&time::encode(TimeKind::for_date(next), next));
        }

        if !self.entries.is_empty() {
            let mut list = Vec::new();
            for (serial, date, reason) in &self.entries {
                let entry = RevokedEntry::new(serial.clone(), *date, *reason);
                list.extend_from_slice(&entry.encode().unwrap());
            }
            tbs_content.extend_from_slice(&wrap(der::SEQUENCE_HEADER, &list));
        }

        if has_extensions {
            let mut extensions = Vec::new();
            if let Some(number) = &self.crl_number {
                let mut value = Vec::new();
                der::push_integer(&mut value, number);
                extensions.extend_from_slice(&extension(&[2, 5, 29, 20], &value));
            }
            if let Some(aki) = &self.aki {
                extensions.extend_from_slice(&extension(&[2, 5, 29, 35], &aki.extension_value()));
            }
            let seq = wrap(der::SEQUENCE_HEADER, &extensions);
            tbs_content.extend_from_slice(&wrap(0xa0, &seq));
        }

        let tbs = wrap(der::SEQUENCE_HEADER, &tbs_content);

        let mut signer = IncrementalSigner::new(self.algorithm, key).unwrap();
        signer.update(&tbs).unwrap();
        let signature = signer.finish().unwrap();

        let mut body = tbs;
        body.extend_from_slice(&self.algorithm.algorithm_identifier());
        der::push_bit_string(&mut body, &signature);
        wrap(der::SEQUENCE_HEADER, &body)
    }
}

fn wrap(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    der::push_length(&mut out, content.len());
    out.extend_from_slice(content);
    out
}

/// `SEQUENCE { SET { SEQUENCE { id-at-commonName, UTF8String } } }`
fn issuer_name(cn: &str) -> Vec<u8> {
    let mut atv = Vec::new();
    der::push_oid(&mut atv, &[2, 5, 4, 3]);
    der::push_tlv(&mut atv, der::TAG_UTF8_STRING as u8, cn.as_bytes());
    let rdn = wrap(0x31, &wrap(der::SEQUENCE_HEADER, &atv));
    wrap(der::SEQUENCE_HEADER, &rdn)
}

fn extension(oid: &[u64], inner: &[u8]) -> Vec<u8> {
    let mut content = Vec::new();
    der::push_oid(&mut content, oid);
    der::push_octet_string(&mut content, inner);
    wrap(der::SEQUENCE_HEADER, &content)
}

/// Structured view of an emitted CRL for assertions.
pub struct InspectedCrl {
    pub serials: Vec<BigUint>,
    pub reasons: Vec<Option<u8>>,
    pub crl_number: Option<BigUint>,
    pub this_update: i64,
    pub next_update: Option<i64>,
    pub aki_value: Option<Vec<u8>>,
    pub issuer: String,
}

pub fn inspect(der_bytes: &[u8]) -> InspectedCrl {
    let (_, crl) = CertificateRevocationList::from_der(der_bytes).expect("output must parse");

    let mut serials = Vec::new();
    let mut reasons = Vec::new();
    for revoked in crl.iter_revoked_certificates() {
        serials.push(revoked.user_certificate.clone());
        reasons.push(revoked.extensions().iter().find_map(|ext| {
            match ext.parsed_extension() {
                ParsedExtension::ReasonCode(code) => Some(code.0),
                _ => None,
            }
        }));
    }

    let aki_value = crl
        .tbs_cert_list
        .extensions()
        .iter()
        .find(|ext| ext.oid == OID_X509_EXT_AUTHORITY_KEY_IDENTIFIER)
        .map(|ext| ext.value.to_vec());

    // make sure the CRL Number extension parses when present
    let has_crl_number_ext = crl
        .tbs_cert_list
        .extensions()
        .iter()
        .any(|ext| ext.oid == OID_X509_EXT_CRL_NUMBER);
    let crl_number = crl.crl_number().cloned();
    assert_eq!(has_crl_number_ext, crl_number.is_some());

    InspectedCrl {
        serials,
        reasons,
        crl_number,
        this_update: crl.tbs_cert_list.this_update.timestamp(),
        next_update: crl.tbs_cert_list.next_update.as_ref().map(|t| t.timestamp()),
        aki_value,
        issuer: crl.tbs_cert_list.issuer.to_string(),
    }
}

/// Verify the CRL's signature against the public half of `key`.
pub fn assert_signature_verifies(der_bytes: &[u8], key: &RsaSigningKey) {
    let crl = X509Crl::from_der(der_bytes).expect("output must parse as a CRL");
    let public = PKey::public_key_from_der(&key.public_key_der().unwrap()).unwrap();
    assert!(
        crl.verify(&public).unwrap(),
        "CRL signature failed to verify"
    );
}

/// The outer SEQUENCE's declared length must equal the byte count that
/// follows its own header.
pub fn assert_outer_length_consistent(der_bytes: &[u8]) {
    let mut reader = der::DerReader::new(der_bytes);
    let tag = reader.read_tag().unwrap();
    assert!(tag.is_sequence());
    let declared = reader.read_length().unwrap();
    assert_eq!(declared, der_bytes.len() - reader.consumed());
}

/// Collect the verbatim encodings of every entry on a CRL, keyed by
/// serial.
pub fn raw_entries(der_bytes: &[u8]) -> Vec<(BigUint, Vec<u8>)> {
    let mut stream = CrlEntryStream::new(der_bytes).unwrap();
    let mut out = Vec::new();
    while let Some(entry) = stream.next_entry().unwrap() {
        out.push((entry.serial, entry.raw));
    }
    out
}

pub fn serial(value: u64) -> BigUint {
    BigUint::from(value)
}
