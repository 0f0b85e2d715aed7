//! Codec for the two ASN.1 time flavors used in CRLs.
//!
//! DER restricts both types to the seconds-precision Zulu forms:
//! `UTCTime` is the 13-octet `YYMMDDHHMMSSZ`, `GeneralizedTime` the
//! 15-octet `YYYYMMDDHHMMSSZ`.

use chrono::{DateTime, TimeZone, Timelike, Utc};

use super::{DerError, DerResult, TAG_GENERALIZED_TIME, TAG_UTC_TIME, push_length};

/// Which of the two ASN.1 time types a value is encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    Utc,
    Generalized,
}

impl TimeKind {
    pub fn tag(self) -> u8 {
        match self {
            TimeKind::Utc => TAG_UTC_TIME as u8,
            TimeKind::Generalized => TAG_GENERALIZED_TIME as u8,
        }
    }

    /// The flavor RFC 5280 mandates for a freshly encoded date: UTCTime
    /// through 2049, GeneralizedTime from 2050 on.
    pub fn for_date(at: DateTime<Utc>) -> Self {
        use chrono::Datelike;
        if at.year() < 2050 {
            TimeKind::Utc
        } else {
            TimeKind::Generalized
        }
    }
}

/// Encode a timestamp as a complete time TLV of the given kind.
pub fn encode(kind: TimeKind, at: DateTime<Utc>) -> Vec<u8> {
    use chrono::Datelike;

    let at = at.with_nanosecond(0).unwrap_or(at);
    let content = match kind {
        TimeKind::Utc => format!(
            "{:02}{:02}{:02}{:02}{:02}{:02}Z",
            at.year() % 100,
            at.month(),
            at.day(),
            at.hour(),
            at.minute(),
            at.second()
        ),
        TimeKind::Generalized => format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}Z",
            at.year(),
            at.month(),
            at.day(),
            at.hour(),
            at.minute(),
            at.second()
        ),
    };

    let mut out = Vec::with_capacity(content.len() + 2);
    out.push(kind.tag());
    push_length(&mut out, content.len());
    out.extend_from_slice(content.as_bytes());
    out
}

/// Decode the content octets of a time value of the given kind.
///
/// UTCTime years are windowed per RFC 5280: 00-49 map to 20xx and 50-99
/// to 19xx.
pub fn decode(kind: TimeKind, content: &[u8]) -> DerResult<DateTime<Utc>> {
    let expected_len = match kind {
        TimeKind::Utc => 13,
        TimeKind::Generalized => 15,
    };
    if content.len() != expected_len || content[expected_len - 1] != b'Z' {
        return Err(DerError::InvalidValue("time"));
    }

    let digits = &content[..expected_len - 1];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(DerError::InvalidValue("time"));
    }

    let field = |range: std::ops::Range<usize>| -> u32 {
        digits[range]
            .iter()
            .fold(0u32, |acc, &d| acc * 10 + (d - b'0') as u32)
    };

    let (year, rest) = match kind {
        TimeKind::Utc => {
            let yy = field(0..2);
            let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
            (year as i32, 2)
        }
        TimeKind::Generalized => (field(0..4) as i32, 4),
    };

    let month = field(rest..rest + 2);
    let day = field(rest + 2..rest + 4);
    let hour = field(rest + 4..rest + 6);
    let minute = field(rest + 6..rest + 8);
    let second = field(rest + 8..rest + 10);

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .ok_or(DerError::InvalidValue("time"))
}
