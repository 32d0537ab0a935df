//! Read side of the rate log format.
//!
//! [`RateLogReader`] memory maps a closed or flushed rate log, validates its
//! header and length, and exposes the records by index or as a lazy iterator.
//! Iteration does not copy the file; each call to
//! [`records`](RateLogReader::records) starts a fresh pass from the first
//! record.
//!
//! ```rust,no_run
//! use ratelog::reader::RateLogReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = RateLogReader::open("sender-rate.dat")?;
//! println!("{} v{} ({:?})", reader.header().format_name(),
//!     reader.header().file_version, reader.header().role);
//! for entry in &reader {
//!     println!("{}: {}", entry.timestamp, entry.count);
//! }
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::iter::FusedIterator;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{IoError, Result};
use crate::format::{FileHeader, HEADER_SIZE, RECORD_SIZE, RateEntry, record_count};

/// Backing bytes of an open rate log.
///
/// Zero-length files cannot be mapped on every platform, so they are kept as
/// an empty slice and rejected by header validation.
#[derive(Debug)]
enum Contents {
    Mapped(Mmap),
    Empty,
}

impl Contents {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => &mmap[..],
            Self::Empty => &[],
        }
    }
}

/// Read-only view over a rate log file.
#[derive(Debug)]
pub struct RateLogReader {
    contents: Contents,
    header: FileHeader,
    len: usize,
}

impl RateLogReader {
    /// Opens and validates a rate log.
    ///
    /// # Errors
    ///
    /// - [`IoError`] if the file cannot be opened, inspected, or mapped
    /// - [`FormatError::TruncatedHeader`](crate::error::FormatError::TruncatedHeader),
    ///   [`UnsupportedFormatVersion`](crate::error::FormatError::UnsupportedFormatVersion)
    ///   or [`UnknownRole`](crate::error::FormatError::UnknownRole) for a bad header
    /// - [`FormatError::TruncatedTail`](crate::error::FormatError::TruncatedTail)
    ///   if the file ends in a partial record
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();

        let file = File::open(path).map_err(|e| IoError::OpenFailed {
            path: path_str.clone(),
            source: e,
        })?;

        let file_len = file
            .metadata()
            .map_err(|e| IoError::ReadFailed {
                path: path_str.clone(),
                source: e,
            })?
            .len();

        let contents = if file_len == 0 {
            Contents::Empty
        } else {
            // SAFETY: The mapping is read-only and the file is not modified
            // while the reader exists; a rate log is only read after its
            // writer has flushed or closed it.
            let mmap = unsafe {
                Mmap::map(&file).map_err(|e| IoError::MapFailed {
                    path: path_str.clone(),
                    source: e,
                })?
            };
            Contents::Mapped(mmap)
        };

        let bytes = contents.as_slice();
        let header = FileHeader::decode(bytes)?;
        let len = record_count(bytes.len())?;

        tracing::debug!(path = %path_str, records = len, "opened rate log for reading");

        Ok(Self {
            contents,
            header,
            len,
        })
    }

    /// Returns the decoded header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Returns the number of records in the file.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the file holds no records.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the record at `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<RateEntry> {
        if index >= self.len {
            return None;
        }
        let start = HEADER_SIZE + index * RECORD_SIZE;
        let raw: &[u8; RECORD_SIZE] = self
            .contents
            .as_slice()
            .get(start..start + RECORD_SIZE)?
            .try_into()
            .ok()?;
        Some(RateEntry::decode(raw))
    }

    /// Returns the first record, if any.
    pub fn first(&self) -> Option<RateEntry> {
        self.get(0)
    }

    /// Returns the last record, if any.
    pub fn last(&self) -> Option<RateEntry> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Returns a lazy iterator over all records, in file order.
    pub fn records(&self) -> RecordIter<'_> {
        RecordIter {
            reader: self,
            front: 0,
            back: self.len,
        }
    }

    /// Decodes every record into a vector.
    pub fn to_vec(&self) -> Vec<RateEntry> {
        self.records().collect()
    }
}

impl<'a> IntoIterator for &'a RateLogReader {
    type Item = RateEntry;
    type IntoIter = RecordIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.records()
    }
}

/// Iterator over the records of a [`RateLogReader`].
#[derive(Debug, Clone)]
pub struct RecordIter<'a> {
    reader: &'a RateLogReader,
    front: usize,
    back: usize,
}

impl Iterator for RecordIter<'_> {
    type Item = RateEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let entry = self.reader.get(self.front);
        self.front += 1;
        entry
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.front = self.front.saturating_add(n).min(self.back);
        self.next()
    }
}

impl DoubleEndedIterator for RecordIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.reader.get(self.back)
    }
}

impl ExactSizeIterator for RecordIter<'_> {}

impl FusedIterator for RecordIter<'_> {}
