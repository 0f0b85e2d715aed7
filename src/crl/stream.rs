use std::io::Read;

use super::entry::ExistingEntry;
use super::errors::CrlResult;
use crate::der::{self, DerError, DerReader, TAG_INTEGER};

/// Lazy, forward-only iteration over the `revokedCertificates` SEQUENCE
/// of a DER CRL.
///
/// Construction walks the CertificateList and TBSCertList headers and
/// the fields preceding the entry list, bounded by the TBSCertList
/// length so an absent list is detected without reading past it. One
/// entry is materialized at a time; the list as a whole is never held in
/// memory.
pub struct CrlEntryStream<R> {
    reader: DerReader<R>,
    list_end: usize,
    empty: bool,
}

impl<R: Read> CrlEntryStream<R> {
    pub fn new(source: R) -> CrlResult<Self> {
        let mut reader = DerReader::new(source);

        reader.expect_sequence("CertificateList")?;
        reader.read_length()?;
        reader.expect_sequence("TBSCertList")?;
        let tbs_len = reader.read_length()?;
        let tbs_end = reader.consumed() + tbs_len;

        // Skip version (optional), signature and issuer; the first
        // time-valued field is thisUpdate.
        loop {
            let tag = reader.read_tag()?;
            if tag.time_kind().is_some() {
                let len = reader.read_length()?;
                reader.read_exact(len)?;
                break;
            }
            if !tag.is_universal(TAG_INTEGER) && !tag.is_sequence() {
                return Err(DerError::UnexpectedTag {
                    expected: "TBSCertList field before thisUpdate",
                    found: tag,
                }
                .into());
            }
            let len = reader.read_length()?;
            reader.read_exact(len)?;
        }

        let mut list_end = reader.consumed();
        if reader.consumed() < tbs_end {
            let mut tag = reader.read_tag()?;
            if tag.time_kind().is_some() {
                // nextUpdate
                let len = reader.read_length()?;
                reader.read_exact(len)?;
                if reader.consumed() >= tbs_end {
                    return Ok(Self {
                        reader,
                        list_end: 0,
                        empty: true,
                    });
                }
                tag = reader.read_tag()?;
            }

            if tag.is_sequence() {
                let len = reader.read_length()?;
                list_end = reader.consumed() + len;
            } else if tag.is_context(0) {
                // crlExtensions directly; no revokedCertificates
            } else {
                return Err(DerError::UnexpectedTag {
                    expected: "revokedCertificates or crlExtensions",
                    found: tag,
                }
                .into());
            }
        }

        let empty = reader.consumed() >= list_end;
        Ok(Self {
            reader,
            list_end,
            empty,
        })
    }

    /// True when the CRL carries no revoked certificates at all. This is
    /// the trigger for the whole-object rebuild path.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Produce the next entry, or `None` once the list is exhausted.
    pub fn next_entry(&mut self) -> CrlResult<Option<ExistingEntry>> {
        if self.reader.consumed() >= self.list_end {
            return Ok(None);
        }

        let tag = self.reader.read_tag()?;
        if !tag.is_sequence() {
            return Err(DerError::UnexpectedTag {
                expected: "revoked certificate entry",
                found: tag,
            }
            .into());
        }
        let len = self.reader.read_length()?;
        let content = self.reader.read_exact(len)?;

        let mut header = tag.to_bytes();
        der::push_length(&mut header, len);
        ExistingEntry::parse(&header, &content).map(Some)
    }

    /// Release the underlying reader, positioned immediately after the
    /// entry list, for parsing the trailing CRL structures.
    ///
    /// Only meaningful once the stream is drained; on an empty CRL the
    /// reader may sit inside a lookahead and must not be reused.
    pub fn into_trailer(self) -> DerReader<R> {
        self.reader
    }
}

impl<R: Read> Iterator for CrlEntryStream<R> {
    type Item = CrlResult<ExistingEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
