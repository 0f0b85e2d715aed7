use chrono::{DateTime, Utc};
use num_bigint::BigUint;

use super::errors::{CrlError, CrlResult};
use crate::der::{self, DerReader, TAG_ENUMERATED, TAG_INTEGER, TimeKind, time};

/// id-ce-cRLReasons
const OID_REASON_CODE: &[u64] = &[2, 5, 29, 21];

/// CRL entry revocation reasons (RFC 5280 §5.3.1).
///
/// Value 7 is unassigned in the RFC; `RemoveFromCrl` is 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl ReasonCode {
    pub fn code(self) -> u8 {
        match self {
            ReasonCode::Unspecified => 0,
            ReasonCode::KeyCompromise => 1,
            ReasonCode::CaCompromise => 2,
            ReasonCode::AffiliationChanged => 3,
            ReasonCode::Superseded => 4,
            ReasonCode::CessationOfOperation => 5,
            ReasonCode::CertificateHold => 6,
            ReasonCode::RemoveFromCrl => 8,
            ReasonCode::PrivilegeWithdrawn => 9,
            ReasonCode::AaCompromise => 10,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ReasonCode::Unspecified),
            1 => Some(ReasonCode::KeyCompromise),
            2 => Some(ReasonCode::CaCompromise),
            3 => Some(ReasonCode::AffiliationChanged),
            4 => Some(ReasonCode::Superseded),
            5 => Some(ReasonCode::CessationOfOperation),
            6 => Some(ReasonCode::CertificateHold),
            8 => Some(ReasonCode::RemoveFromCrl),
            9 => Some(ReasonCode::PrivilegeWithdrawn),
            10 => Some(ReasonCode::AaCompromise),
            _ => None,
        }
    }
}

/// A revoked-certificate entry queued for addition.
///
/// Pending entries are fully modeled; existing entries on the input CRL
/// stay opaque byte ranges (see [`ExistingEntry`]) so they can be copied
/// through byte-for-byte.
#[derive(Debug, Clone)]
pub struct RevokedEntry {
    serial: BigUint,
    revocation_date: DateTime<Utc>,
    reason: ReasonCode,
}

impl RevokedEntry {
    pub fn new(serial: BigUint, revocation_date: DateTime<Utc>, reason: ReasonCode) -> Self {
        Self {
            serial,
            revocation_date,
            reason,
        }
    }

    pub fn serial(&self) -> &BigUint {
        &self.serial
    }

    /// Encode as a complete `revokedCertificates` element:
    /// `SEQUENCE { userCertificate, revocationDate, crlEntryExtensions }`
    /// with a single reasonCode entry extension.
    pub fn encode(&self) -> CrlResult<Vec<u8>> {
        let mut content = Vec::new();
        der::push_integer(&mut content, &self.serial);
        content.extend_from_slice(&time::encode(
            TimeKind::for_date(self.revocation_date),
            self.revocation_date,
        ));
        content.extend_from_slice(&self.reason_extension());

        if content.len() > u32::MAX as usize {
            return Err(CrlError::Encoding("entry exceeds encodable size".into()));
        }

        let mut out = Vec::with_capacity(content.len() + 4);
        out.push(der::SEQUENCE_HEADER);
        der::push_length(&mut out, content.len());
        out.extend_from_slice(&content);
        Ok(out)
    }

    /// `Extensions { Extension { reasonCode, ENUMERATED } }`
    fn reason_extension(&self) -> Vec<u8> {
        let enumerated = [TAG_ENUMERATED as u8, 0x01, self.reason.code()];

        let mut ext = Vec::new();
        der::push_oid(&mut ext, OID_REASON_CODE);
        der::push_octet_string(&mut ext, &enumerated);

        let mut ext_seq = Vec::new();
        ext_seq.push(der::SEQUENCE_HEADER);
        der::push_length(&mut ext_seq, ext.len());
        ext_seq.extend_from_slice(&ext);

        let mut out = Vec::new();
        out.push(der::SEQUENCE_HEADER);
        der::push_length(&mut out, ext_seq.len());
        out.extend_from_slice(&ext_seq);
        out
    }
}

/// An entry already present on the input CRL.
///
/// `raw` holds the entry's complete TLV encoding; the serial and
/// revocation date are decoded only far enough to drive the deletion
/// predicate.
#[derive(Debug, Clone)]
pub struct ExistingEntry {
    pub serial: BigUint,
    pub revocation_date: DateTime<Utc>,
    pub raw: Vec<u8>,
}

impl ExistingEntry {
    /// Parse an entry from its SEQUENCE content octets, reattaching the
    /// given header bytes to reconstruct the verbatim encoding.
    pub(crate) fn parse(header: &[u8], content: &[u8]) -> CrlResult<Self> {
        let mut reader = DerReader::new(content);

        let tag = reader.read_tag()?;
        if !tag.is_universal(TAG_INTEGER) {
            return Err(crate::der::DerError::UnexpectedTag {
                expected: "userCertificate INTEGER",
                found: tag,
            }
            .into());
        }
        let len = reader.read_length()?;
        let serial = BigUint::from_bytes_be(&reader.read_exact(len)?);

        let tag = reader.read_tag()?;
        let kind = tag.time_kind().ok_or(crate::der::DerError::UnexpectedTag {
            expected: "revocationDate Time",
            found: tag,
        })?;
        let len = reader.read_length()?;
        let revocation_date = time::decode(kind, &reader.read_exact(len)?)?;

        // crlEntryExtensions are optional and stay unparsed

        let mut raw = Vec::with_capacity(header.len() + content.len());
        raw.extend_from_slice(header);
        raw.extend_from_slice(content);
        Ok(Self {
            serial,
            revocation_date,
            raw,
        })
    }
}

/// Decode just the serial number from an entry's content octets.
pub(crate) fn parse_entry_serial(content: &[u8]) -> CrlResult<BigUint> {
    let mut reader = DerReader::new(content);
    let tag = reader.read_tag()?;
    if !tag.is_universal(TAG_INTEGER) {
        return Err(crate::der::DerError::UnexpectedTag {
            expected: "userCertificate INTEGER",
            found: tag,
        }
        .into());
    }
    let len = reader.read_length()?;
    Ok(BigUint::from_bytes_be(&reader.read_exact(len)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encode_carries_serial_date_and_reason() {
        let date = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let entry = RevokedEntry::new(
            BigUint::from(0x0102_0304u32),
            date,
            ReasonCode::PrivilegeWithdrawn,
        );
        let encoded = entry.encode().unwrap();

        assert_eq!(encoded[0], 0x30);

        let mut reader = DerReader::new(&encoded[2..]);
        let tag = reader.read_tag().unwrap();
        assert!(tag.is_universal(TAG_INTEGER));
        let len = reader.read_length().unwrap();
        assert_eq!(
            BigUint::from_bytes_be(&reader.read_exact(len).unwrap()),
            BigUint::from(0x0102_0304u32)
        );

        let tag = reader.read_tag().unwrap();
        assert_eq!(tag.time_kind(), Some(TimeKind::Utc));
        let len = reader.read_length().unwrap();
        assert_eq!(
            time::decode(TimeKind::Utc, &reader.read_exact(len).unwrap()).unwrap(),
            date
        );

        // reasonCode extension: Extensions > Extension > OCTET STRING > ENUMERATED 9
        let tag = reader.read_tag().unwrap();
        assert!(tag.is_sequence());
        let encoded_reason = &encoded[encoded.len() - 3..];
        assert_eq!(encoded_reason, &[TAG_ENUMERATED as u8, 0x01, 9]);
    }

    #[test]
    fn test_existing_entry_roundtrip() {
        let date = Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();
        let pending = RevokedEntry::new(BigUint::from(900u32), date, ReasonCode::KeyCompromise);
        let encoded = pending.encode().unwrap();

        let parsed = ExistingEntry::parse(&encoded[..2], &encoded[2..]).unwrap();
        assert_eq!(parsed.serial, BigUint::from(900u32));
        assert_eq!(parsed.revocation_date, date);
        assert_eq!(parsed.raw, encoded);
    }

    #[test]
    fn test_entry_without_extensions_parses() {
        // legacy profile entry: just serial and date
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut content = Vec::new();
        der::push_integer(&mut content, &BigUint::from(7u32));
        content.extend_from_slice(&time::encode(TimeKind::Utc, date));

        let mut header = vec![der::SEQUENCE_HEADER];
        der::push_length(&mut header, content.len());

        let parsed = ExistingEntry::parse(&header, &content).unwrap();
        assert_eq!(parsed.serial, BigUint::from(7u32));
        assert_eq!(parsed.revocation_date, date);
    }

    #[test]
    fn test_reason_code_registry_gap() {
        assert_eq!(ReasonCode::RemoveFromCrl.code(), 8);
        assert!(ReasonCode::from_code(7).is_none());
        for code in [0, 1, 2, 3, 4, 5, 6, 8, 9, 10] {
            assert_eq!(ReasonCode::from_code(code).unwrap().code(), code);
        }
    }
}
