use std::io::Read;

use super::{DerError, DerResult, Tag, TagClass};

/// A cursor over a DER byte source.
///
/// Wraps any [`Read`] and tracks the number of bytes consumed so far.
/// The rewrite pass depends on this counter to know exactly where the
/// `revokedCertificates` list ends without peeking past the boundary.
pub struct DerReader<R> {
    inner: R,
    consumed: usize,
}

impl<R: Read> DerReader<R> {
    pub fn new(inner: R) -> Self {
        DerReader { inner, consumed: 0 }
    }

    /// Total bytes read from the underlying source.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Consume the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_byte(&mut self) -> DerResult<u8> {
        let mut buf = [0u8; 1];
        let n = self.inner.read(&mut buf)?;
        if n == 0 {
            return Err(DerError::Truncated);
        }
        self.consumed += 1;
        Ok(buf[0])
    }

    /// Read one tag, including the multi-byte high-tag-number form.
    pub fn read_tag(&mut self) -> DerResult<Tag> {
        let first = self.read_byte()?;
        let class = match first >> 6 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        };
        let constructed = first & 0b0010_0000 != 0;

        let mut number = (first & 0x1f) as u32;
        if number == 0x1f {
            number = 0;
            loop {
                let octet = self.read_byte()?;
                if number > (u32::MAX >> 7) {
                    return Err(DerError::TagOverflow);
                }
                number = (number << 7) | (octet & 0x7f) as u32;
                if octet & 0x80 == 0 {
                    break;
                }
            }
        }

        Ok(Tag {
            class,
            constructed,
            number,
        })
    }

    /// Read a length field: short form below 128, long form with a
    /// length-of-length prefix otherwise.
    pub fn read_length(&mut self) -> DerResult<usize> {
        let first = self.read_byte()?;
        if first & 0x80 == 0 {
            return Ok(first as usize);
        }

        let width = (first & 0x7f) as usize;
        if width == 0 {
            return Err(DerError::IndefiniteLength);
        }
        if width > size_of::<usize>() {
            return Err(DerError::LengthOverflow(width));
        }

        let mut length = 0usize;
        for _ in 0..width {
            length = (length << 8) | self.read_byte()? as usize;
        }
        Ok(length)
    }

    /// Read exactly `n` bytes, advancing the consumed counter.
    pub fn read_exact(&mut self, n: usize) -> DerResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            let read = self.inner.read(&mut buf[filled..])?;
            if read == 0 {
                return Err(DerError::Truncated);
            }
            filled += read;
            self.consumed += read;
        }
        Ok(buf)
    }

    /// Read a tag and require it to be a constructed SEQUENCE.
    pub fn expect_sequence(&mut self, expected: &'static str) -> DerResult<Tag> {
        let tag = self.read_tag()?;
        if !tag.is_sequence() {
            return Err(DerError::UnexpectedTag {
                expected,
                found: tag,
            });
        }
        Ok(tag)
    }

    /// Drain the remainder of the source into a buffer.
    pub fn read_to_end(&mut self) -> DerResult<Vec<u8>> {
        let mut buf = Vec::new();
        let read = self.inner.read_to_end(&mut buf)?;
        self.consumed += read;
        Ok(buf)
    }
}
