use std::collections::HashSet;
use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use tracing::{debug, warn};

use super::entry::{ExistingEntry, ReasonCode, RevokedEntry, parse_entry_serial};
use super::errors::{CrlError, CrlResult};
use super::extensions::rewrite_crl_extensions;
use super::rebuild;
use super::stream::CrlEntryStream;
use crate::crypto::{AuthorityKeyIdentifier, IncrementalSigner, RsaSigningKey, SigningAlgorithm};
use crate::der::{self, DerError, DerReader, TAG_BIT_STRING, TAG_OID, TimeKind, time};

/// Streaming, incremental editor for a DER-encoded X.509 CRL.
///
/// A session is bound to one input byte source, one signing key and one
/// authority key identifier. It moves through a fixed lifecycle:
/// constructed, pre-scanned ([`pre_scan`](Self::pre_scan)), locked
/// ([`lock`](Self::lock)), written ([`write`](Self::write)). Entries are
/// queued with [`add`](Self::add) before locking; existing entries are
/// dropped by the deletion predicate given to
/// [`pre_scan_filtered`](Self::pre_scan_filtered).
///
/// The input is consumed exactly once. Because the pre-scan also needs a
/// pass over the bytes, it takes its own copy of the input; the source
/// given at construction stays untouched until `write`.
///
/// Memory use is proportional to the queued additions plus the
/// deleted-serial set. Existing entries are streamed through one at a
/// time and are never collected.
pub struct CrlStreamWriter<R> {
    input: DerReader<R>,
    key: RsaSigningKey,
    aki: AuthorityKeyIdentifier,

    new_entries: Vec<RevokedEntry>,
    deleted_serials: HashSet<BigUint>,
    deleted_entries_length: usize,

    signing_alg: Option<SigningAlgorithm>,

    locked: bool,
    pre_scanned: bool,
    written: bool,
    empty_crl: bool,

    old_sig_length: usize,
    extensions_delta: i64,
    new_extensions: Option<Vec<u8>>,
}

impl<R: Read> CrlStreamWriter<R> {
    pub fn new(input: R, key: RsaSigningKey, aki: AuthorityKeyIdentifier) -> Self {
        Self {
            input: DerReader::new(input),
            key,
            aki,
            new_entries: Vec::new(),
            deleted_serials: HashSet::new(),
            deleted_entries_length: 0,
            signing_alg: None,
            locked: false,
            pre_scanned: false,
            written: false,
            empty_crl: false,
            old_sig_length: 0,
            extensions_delta: 0,
            new_extensions: None,
        }
    }

    /// Queue a new revoked-certificate entry. Illegal once the session
    /// is locked.
    pub fn add(
        &mut self,
        serial: BigUint,
        revocation_date: DateTime<Utc>,
        reason: ReasonCode,
    ) -> CrlResult<()> {
        if self.locked {
            return Err(CrlError::State("cannot add entries to a locked session"));
        }
        self.new_entries
            .push(RevokedEntry::new(serial, revocation_date, reason));
        Ok(())
    }

    /// Override the signature algorithm instead of reusing the input
    /// CRL's. Only RSA-family algorithms are accepted.
    pub fn set_signing_algorithm(&mut self, algorithm: &str) -> CrlResult<()> {
        if self.locked {
            return Err(CrlError::State(
                "cannot change the signing algorithm of a locked session",
            ));
        }
        self.signing_alg = Some(SigningAlgorithm::from_name(algorithm)?);
        Ok(())
    }

    /// True if any additions or deletions are queued.
    pub fn has_changes_queued(&self) -> bool {
        !self.new_entries.is_empty() || !self.deleted_serials.is_empty()
    }

    /// Pre-scan without deleting anything.
    pub fn pre_scan<S: Read>(&mut self, source: S) -> CrlResult<&mut Self> {
        self.pre_scan_filtered(source, |_| false)
    }

    /// One-shot analysis pass over a fresh copy of the input bytes.
    ///
    /// Streams the existing entries through `should_delete`, collecting
    /// the serials (and byte counts) to drop, then parses the trailing
    /// structures: the signature algorithm (adopted unless one was set
    /// explicitly), the old signature's encoded length, and the
    /// extensions block, which is rebuilt with CRL Number + 1 and the
    /// session's authority key identifier.
    pub fn pre_scan_filtered<S, F>(&mut self, source: S, mut should_delete: F) -> CrlResult<&mut Self>
    where
        S: Read,
        F: FnMut(&ExistingEntry) -> bool,
    {
        if self.locked {
            return Err(CrlError::State("cannot pre-scan a locked session"));
        }
        if self.pre_scanned {
            return Err(CrlError::State("pre-scan has already been run"));
        }

        let mut stream = CrlEntryStream::new(source)?;
        if stream.is_empty() {
            // Not worth streaming; write() rebuilds the whole object.
            self.empty_crl = true;
            self.pre_scanned = true;
            return Ok(self);
        }

        while let Some(entry) = stream.next_entry()? {
            if should_delete(&entry) {
                self.deleted_entries_length += entry.raw.len();
                self.deleted_serials.insert(entry.serial);
            }
        }

        let mut trailer = stream.into_trailer();

        // crlExtensions [0] precedes the signatureAlgorithm when present
        let mut old_extensions: Option<Vec<u8>> = None;
        let mut tag = trailer.read_tag()?;
        if tag.is_context(0) {
            let len = trailer.read_length()?;
            let value = trailer.read_exact(len)?;
            let mut block = tag.to_bytes();
            der::push_length(&mut block, len);
            block.extend_from_slice(&value);
            old_extensions = Some(block);
            tag = trailer.read_tag()?;
        }

        if !tag.is_sequence() {
            return Err(DerError::UnexpectedTag {
                expected: "signatureAlgorithm SEQUENCE",
                found: tag,
            }
            .into());
        }
        let len = trailer.read_length()?;
        let alg_value = trailer.read_exact(len)?;
        if self.signing_alg.is_none() {
            self.signing_alg = Some(parse_algorithm_identifier(&alg_value)?);
        }

        let tag = trailer.read_tag()?;
        if !tag.is_universal(TAG_BIT_STRING) {
            return Err(DerError::UnexpectedTag {
                expected: "signatureValue BIT STRING",
                found: tag,
            }
            .into());
        }
        let sig_len = trailer.read_length()?;
        trailer.read_exact(sig_len)?;
        self.old_sig_length = der::encoded_tlv_len(sig_len);

        match old_extensions {
            Some(block) => {
                let rebuilt = rewrite_crl_extensions(&block, &self.aki)?;
                self.extensions_delta = rebuilt.len() as i64 - block.len() as i64;
                self.new_extensions = Some(rebuilt);
            }
            None => {
                // v1 CRLs (RFC 1422) carry no extensions; everything
                // issued today should be v2 with CRL Number and AKI.
                warn!(
                    "the CRL being modified is a version 1 CRL without extensions; \
                     consider reissuing it as a version 2 CRL"
                );
                self.extensions_delta = 0;
                self.new_extensions = None;
            }
        }

        self.pre_scanned = true;
        Ok(self)
    }

    /// Lock the session, freezing the queued changes and the signing
    /// algorithm in preparation for writing.
    pub fn lock(&mut self) -> CrlResult<&mut Self> {
        if self.locked {
            return Err(CrlError::State("the session is already locked"));
        }
        self.locked = true;
        Ok(self)
    }

    /// Emit the rewritten, re-signed CRL. Terminal: a session writes at
    /// most once.
    pub fn write<W: Write>(&mut self, out: &mut W) -> CrlResult<()> {
        if !self.pre_scanned || !self.locked {
            return Err(CrlError::State(
                "the session must be pre-scanned and locked before writing",
            ));
        }
        if self.written {
            return Err(CrlError::State("the session has already been written"));
        }
        self.written = true;

        let pending = self
            .new_entries
            .iter()
            .map(RevokedEntry::encode)
            .collect::<CrlResult<Vec<_>>>()?;

        if self.empty_crl {
            return rebuild::write_rebuilt(
                &mut self.input,
                &pending,
                self.signing_alg,
                &self.key,
                &self.aki,
                out,
            );
        }

        let alg = self
            .signing_alg
            .ok_or(CrlError::State("no signing algorithm was resolved"))?;
        let key = self.key.clone();
        let mut signer = IncrementalSigner::new(alg, &key)?;
        let mut emitter = Emitter::new(out);

        let (old_revoked_len, expected_total) =
            self.rewrite_header(&mut emitter, &mut signer, alg, &pending)?;

        // Stream the entry list: existing entries pass through verbatim
        // unless their serial was flagged during the pre-scan.
        let body_start = self.input.consumed();
        while self.input.consumed() - body_start < old_revoked_len {
            let tag = self.input.read_tag()?;
            if !tag.is_sequence() {
                return Err(DerError::UnexpectedTag {
                    expected: "revoked certificate entry",
                    found: tag,
                }
                .into());
            }
            let len = self.input.read_length()?;
            let content = self.input.read_exact(len)?;

            let serial = parse_entry_serial(&content)?;
            if self.deleted_serials.contains(&serial) {
                continue;
            }

            let mut header = tag.to_bytes();
            der::push_length(&mut header, len);
            emitter.signed(&header, &mut signer)?;
            emitter.signed(&content, &mut signer)?;
        }

        for entry in &pending {
            emitter.signed(entry, &mut signer)?;
        }

        if let Some(extensions) = &self.new_extensions {
            emitter.signed(extensions, &mut signer)?;
        }

        // The outer signatureAlgorithm sits outside TBSCertList and is
        // not part of the signed region.
        emitter.plain(&alg.algorithm_identifier())?;

        let signature = signer.finish().map_err(CrlError::Crypto)?;
        let mut wrapped = Vec::with_capacity(signature.len() + 8);
        der::push_bit_string(&mut wrapped, &signature);
        emitter.plain(&wrapped)?;

        debug_assert_eq!(emitter.emitted, expected_total);
        debug!(bytes = emitter.emitted, "CRL rewrite complete");
        Ok(())
    }

    /// Phase A: parse and re-emit everything up to the entry list.
    ///
    /// Returns the original `revokedCertificates` content length (how
    /// many input bytes the streaming copy may consume) and the
    /// expected total output size.
    fn rewrite_header<W: Write>(
        &mut self,
        emitter: &mut Emitter<'_, W>,
        signer: &mut IncrementalSigner<'_>,
        alg: SigningAlgorithm,
        pending: &[Vec<u8>],
    ) -> CrlResult<(usize, usize)> {
        // An RSA signature is padded out to the modulus width, so the
        // replacement signature's size is known before signing: the
        // modulus bytes plus the BIT STRING unused-bits octet.
        let modulus_len = self.key.modulus_len()?;
        let new_sig_length = der::encoded_tlv_len(modulus_len + 1);

        let added_entries_length: usize = pending.iter().map(Vec::len).sum();

        let top_tag = self.input.read_tag()?;
        if !top_tag.is_sequence() {
            return Err(DerError::UnexpectedTag {
                expected: "CertificateList SEQUENCE",
                found: top_tag,
            }
            .into());
        }
        let old_total_length = self.input.read_length()?;

        let tbs_tag = self.input.read_tag()?;
        if !tbs_tag.is_sequence() {
            return Err(DerError::UnexpectedTag {
                expected: "TBSCertList SEQUENCE",
                found: tbs_tag,
            }
            .into());
        }
        let old_tbs_length = self.input.read_length()?;

        let now = Utc::now();

        /* The rewritten TBS fields are buffered here rather than
         * emitted, because the corrected TBS length is not known until
         * the entry-list length has been read further down. */
        let mut header: Vec<u8> = Vec::new();
        let mut signature_replaced = false;
        let old_this_update = loop {
            let tag = self.input.read_tag()?;
            if tag.is_sequence() && !signature_replaced {
                // the first nested SEQUENCE is the signature
                // AlgorithmIdentifier; issuer comes after
                self.replace_signature_algorithm(&mut header, alg)?;
                signature_replaced = true;
            } else if let Some(kind) = tag.time_kind() {
                break self.replace_time(&mut header, kind, now)?;
            } else {
                let len = self.input.read_length()?;
                let value = self.input.read_exact(len)?;
                header.extend_from_slice(&tag.to_bytes());
                der::push_length(&mut header, len);
                header.extend_from_slice(&value);
            }
        };

        // nextUpdate is optional; when present it is shifted so the
        // validity window keeps its original length.
        let tag = self.input.read_tag()?;
        if let Some(kind) = tag.time_kind() {
            self.offset_next_update(&mut header, kind, old_this_update, now)?;
            let list_tag = self.input.read_tag()?;
            if !list_tag.is_sequence() {
                return Err(DerError::UnexpectedTag {
                    expected: "revokedCertificates SEQUENCE",
                    found: list_tag,
                }
                .into());
            }
            header.extend_from_slice(&list_tag.to_bytes());
        } else if tag.is_sequence() {
            header.extend_from_slice(&tag.to_bytes());
        } else {
            return Err(DerError::UnexpectedTag {
                expected: "revokedCertificates SEQUENCE",
                found: tag,
            }
            .into());
        }

        let old_revoked_len = self.input.read_length()?;

        /* Growing an inner structure can ripple outward: lengthening the
         * entry list may widen its own length field, which lengthens the
         * TBS, which may widen the TBS length field, and so on to the
         * outermost SEQUENCE. The deltas are therefore computed bottom
         * up, each level folding in the width change of the one below. */
        let revoked_delta = added_entries_length as i64 - self.deleted_entries_length as i64;
        let new_revoked_len = apply_delta(old_revoked_len, revoked_delta)?;
        let revoked_header_delta = width_delta(old_revoked_len, new_revoked_len);

        let tbs_delta = revoked_delta + revoked_header_delta + self.extensions_delta;
        let new_tbs_len = apply_delta(old_tbs_length, tbs_delta)?;
        let tbs_header_delta = width_delta(old_tbs_length, new_tbs_len);

        let sig_delta = new_sig_length as i64 - self.old_sig_length as i64;

        let total_delta = tbs_delta + tbs_header_delta + sig_delta;
        let new_total_len = apply_delta(old_total_length, total_delta)?;

        debug!(
            revoked_delta,
            extensions_delta = self.extensions_delta,
            sig_delta,
            total_delta,
            "computed length deltas"
        );

        // the outer wrapper is not part of the signed region
        let mut outer = top_tag.to_bytes();
        der::push_length(&mut outer, new_total_len);
        let outer_header_len = outer.len();
        emitter.plain(&outer)?;

        let mut tbs_header = tbs_tag.to_bytes();
        der::push_length(&mut tbs_header, new_tbs_len);
        emitter.signed(&tbs_header, signer)?;
        emitter.signed(&header, signer)?;

        let mut list_length = Vec::new();
        der::push_length(&mut list_length, new_revoked_len);
        emitter.signed(&list_length, signer)?;

        Ok((old_revoked_len, outer_header_len + new_total_len))
    }

    /// Swap the TBS signature AlgorithmIdentifier for the session's.
    ///
    /// Within the RSA family every identifier encodes to the same
    /// width, so the surrounding lengths stay valid; anything else
    /// would corrupt the DER and is refused.
    fn replace_signature_algorithm(
        &mut self,
        header: &mut Vec<u8>,
        alg: SigningAlgorithm,
    ) -> CrlResult<()> {
        let old_len = self.input.read_length()?;
        self.input.read_exact(old_len)?;

        let replacement = alg.algorithm_identifier();
        let mut reader = DerReader::new(replacement.as_slice());
        reader.read_tag()?;
        let new_len = reader.read_length()?;

        if new_len != old_len {
            return Err(CrlError::Encoding(format!(
                "replacement AlgorithmIdentifier is {new_len} bytes where the original was \
                 {old_len}; rewriting would corrupt the structure"
            )));
        }

        header.extend_from_slice(&replacement);
        Ok(())
    }

    /// Replace a time value with `now`, returning the value it had.
    fn replace_time(
        &mut self,
        header: &mut Vec<u8>,
        kind: TimeKind,
        now: DateTime<Utc>,
    ) -> CrlResult<DateTime<Utc>> {
        let old_len = self.input.read_length()?;
        let old_value = self.input.read_exact(old_len)?;
        let old_time = time::decode(kind, &old_value)?;

        let replacement = time::encode(kind, now);
        check_time_width(&replacement, old_len)?;
        header.extend_from_slice(&replacement);
        Ok(old_time)
    }

    /// Write a nextUpdate shifted so that (nextUpdate - thisUpdate) is
    /// unchanged from the input.
    fn offset_next_update(
        &mut self,
        header: &mut Vec<u8>,
        kind: TimeKind,
        old_this_update: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CrlResult<()> {
        let old_len = self.input.read_length()?;
        let old_value = self.input.read_exact(old_len)?;
        let old_next_update = time::decode(kind, &old_value)?;

        let new_next_update = now + (old_next_update - old_this_update);
        let replacement = time::encode(kind, new_next_update);
        check_time_width(&replacement, old_len)?;
        header.extend_from_slice(&replacement);
        Ok(())
    }
}

/// Output sink wrapper that counts emitted bytes and optionally feeds
/// them to the signature accumulator.
struct Emitter<'a, W> {
    sink: &'a mut W,
    emitted: usize,
}

impl<'a, W: Write> Emitter<'a, W> {
    fn new(sink: &'a mut W) -> Self {
        Self { sink, emitted: 0 }
    }

    fn plain(&mut self, bytes: &[u8]) -> CrlResult<()> {
        self.sink.write_all(bytes)?;
        self.emitted += bytes.len();
        Ok(())
    }

    fn signed(&mut self, bytes: &[u8], signer: &mut IncrementalSigner<'_>) -> CrlResult<()> {
        self.plain(bytes)?;
        signer.update(bytes)?;
        Ok(())
    }
}

/// Parse the content octets of an AlgorithmIdentifier SEQUENCE and
/// resolve the algorithm, which must be RSA-family.
fn parse_algorithm_identifier(content: &[u8]) -> CrlResult<SigningAlgorithm> {
    let mut reader = DerReader::new(content);
    let tag = reader.read_tag()?;
    if !tag.is_universal(TAG_OID) {
        return Err(DerError::UnexpectedTag {
            expected: "algorithm OBJECT IDENTIFIER",
            found: tag,
        }
        .into());
    }
    let len = reader.read_length()?;
    let arcs = der::decode_oid(&reader.read_exact(len)?)?;

    SigningAlgorithm::from_oid(&arcs).ok_or_else(|| {
        crate::crypto::Error::UnsupportedAlgorithm(
            arcs.iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join("."),
        )
        .into()
    })
}

/// Replacement times must occupy exactly the bytes of the original or
/// the enclosing lengths would be wrong.
fn check_time_width(replacement_tlv: &[u8], old_value_len: usize) -> CrlResult<()> {
    let mut reader = DerReader::new(replacement_tlv);
    reader.read_tag()?;
    let new_value_len = reader.read_length()?;
    if new_value_len != old_value_len {
        return Err(CrlError::Encoding(format!(
            "generated time is {new_value_len} bytes where the original was {old_value_len}; \
             rewriting would corrupt the structure"
        )));
    }
    Ok(())
}

fn width_delta(old_len: usize, new_len: usize) -> i64 {
    der::length_width(new_len) as i64 - der::length_width(old_len) as i64
}

fn apply_delta(length: usize, delta: i64) -> CrlResult<usize> {
    usize::try_from(length as i64 + delta)
        .map_err(|_| CrlError::Encoding("length delta underflows the enclosing structure".into()))
}
