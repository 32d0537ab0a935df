//! Binary layout of a rate log file.
//!
//! A rate log is a fixed-size header followed by fixed-size records laid out
//! back to back. Every integer is big-endian.
//!
//! # File Format
//!
//! ```text
//! [0..20)              Header: magic[8] | file_version:i32 | format_version:i32 | role:i32
//! [20..20+k*20)        Records: metadata:i32 | count:i64 | timestamp:i64
//! ```
//!
//! Records carry no framing; the record count is the post-header length divided
//! by [`RECORD_SIZE`]. A remainder means the tail was cut short.

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, Result};

/// Width of the magic tag at the start of the header.
pub const FORMAT_NAME_SIZE: usize = 8;

/// Encoding version of this layout.
pub const FORMAT_VERSION: i32 = 1;

/// Size of the header block in bytes.
pub const HEADER_SIZE: usize = FORMAT_NAME_SIZE + 4 + 4 + 4;

/// Size of one serialized [`RateEntry`] in bytes.
pub const RECORD_SIZE: usize = 4 + 8 + 8;

/// Format name used when the caller has no family of its own.
pub const DEFAULT_FORMAT_NAME: &str = "RATE";

/// The instrumentation role that produced a rate log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Samples counted on the producing side.
    Sender,
    /// Samples counted on the consuming side.
    Receiver,
}

impl Role {
    /// Returns the on-disk code for this role.
    pub fn code(self) -> i32 {
        match self {
            Self::Sender => 0,
            Self::Receiver => 1,
        }
    }

    /// Looks up a role by its on-disk code.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::UnknownRole`] for unassigned codes.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Sender),
            1 => Ok(Self::Receiver),
            _ => Err(FormatError::UnknownRole { code }.into()),
        }
    }
}

/// The header block written once at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    format_name: [u8; FORMAT_NAME_SIZE],
    /// Application version chosen by the writer's caller.
    pub file_version: i32,
    format_version: i32,
    /// Role of the producer.
    pub role: Role,
}

impl FileHeader {
    /// Creates a header for the current encoding version.
    ///
    /// `format_name` is zero padded to [`FORMAT_NAME_SIZE`] bytes, or truncated
    /// if longer.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::InvalidFormatName`] if the name is not ASCII.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ratelog::format::{FileHeader, Role};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let header = FileHeader::new("RATE", 1, Role::Sender)?;
    /// assert_eq!(header.format_name(), ratelog::format::DEFAULT_FORMAT_NAME);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(format_name: &str, file_version: i32, role: Role) -> Result<Self> {
        if !format_name.is_ascii() {
            return Err(FormatError::InvalidFormatName {
                name: format_name.to_string(),
                reason: "must be ASCII".to_string(),
            }
            .into());
        }

        let mut name = [0u8; FORMAT_NAME_SIZE];
        let len = format_name.len().min(FORMAT_NAME_SIZE);
        name[..len].copy_from_slice(&format_name.as_bytes()[..len]);

        Ok(Self {
            format_name: name,
            file_version,
            format_version: FORMAT_VERSION,
            role,
        })
    }

    /// Returns the format name with its zero padding stripped.
    pub fn format_name(&self) -> &str {
        let end = self
            .format_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FORMAT_NAME_SIZE);
        // new() and decode() only admit ASCII.
        std::str::from_utf8(&self.format_name[..end]).unwrap_or_default()
    }

    /// Returns the raw, padded magic bytes.
    pub fn format_name_bytes(&self) -> &[u8; FORMAT_NAME_SIZE] {
        &self.format_name
    }

    /// Returns the encoding version recorded in the header.
    pub fn format_version(&self) -> i32 {
        self.format_version
    }

    /// Serializes the header into its fixed-size block.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.format_name);
        buf[8..12].copy_from_slice(&self.file_version.to_be_bytes());
        buf[12..16].copy_from_slice(&self.format_version.to_be_bytes());
        buf[16..20].copy_from_slice(&self.role.code().to_be_bytes());
        buf
    }

    /// Decodes a header from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] if `bytes` is shorter than [`HEADER_SIZE`], the
    /// encoding version is unsupported, the role is unknown, or the magic is
    /// not ASCII.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some(block) = bytes.get(..HEADER_SIZE) else {
            return Err(FormatError::TruncatedHeader {
                len: bytes.len(),
                expected: HEADER_SIZE,
            }
            .into());
        };

        let mut format_name = [0u8; FORMAT_NAME_SIZE];
        format_name.copy_from_slice(&block[0..8]);
        if !format_name.is_ascii() {
            return Err(FormatError::InvalidFormatName {
                name: String::from_utf8_lossy(&format_name).into_owned(),
                reason: "must be ASCII".to_string(),
            }
            .into());
        }

        let file_version = read_i32(&block[8..12]);
        let format_version = read_i32(&block[12..16]);
        if format_version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedFormatVersion {
                expected: FORMAT_VERSION,
                found: format_version,
            }
            .into());
        }
        let role = Role::from_code(read_i32(&block[16..20]))?;

        Ok(Self {
            format_name,
            file_version,
            format_version,
            role,
        })
    }
}

/// One per-second throughput sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateEntry {
    /// Application-defined tag or category.
    pub metadata: i32,
    /// Number of events observed in the slot.
    pub count: i64,
    /// Slot identifier, in epoch seconds.
    pub timestamp: i64,
}

impl RateEntry {
    /// Creates a new entry.
    pub fn new(metadata: i32, count: i64, timestamp: i64) -> Self {
        Self {
            metadata,
            count,
            timestamp,
        }
    }

    /// Appends the serialized record to `buf`.
    #[inline]
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.metadata.to_be_bytes());
        buf.extend_from_slice(&self.count.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
    }

    /// Decodes one record.
    #[inline]
    pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Self {
        Self {
            metadata: read_i32(&bytes[0..4]),
            count: read_i64(&bytes[4..12]),
            timestamp: read_i64(&bytes[12..20]),
        }
    }
}

/// Returns the byte offset of record `index` within a rate log file, or
/// `None` if the offset does not fit in a `u64`.
pub fn record_offset(index: usize) -> Option<u64> {
    u64::try_from(index)
        .ok()?
        .checked_mul(RECORD_SIZE as u64)?
        .checked_add(HEADER_SIZE as u64)
}

/// Returns the number of records in a file of `file_len` bytes.
///
/// # Errors
///
/// Returns [`FormatError::TruncatedHeader`] if the file cannot hold a header,
/// or [`FormatError::TruncatedTail`] if the record region has a partial record.
pub fn record_count(file_len: usize) -> Result<usize> {
    let Some(data_len) = file_len.checked_sub(HEADER_SIZE) else {
        return Err(FormatError::TruncatedHeader {
            len: file_len,
            expected: HEADER_SIZE,
        }
        .into());
    };

    let trailing_bytes = data_len % RECORD_SIZE;
    let complete_records = data_len / RECORD_SIZE;
    if trailing_bytes != 0 {
        return Err(FormatError::TruncatedTail {
            complete_records,
            trailing_bytes,
        }
        .into());
    }

    Ok(complete_records)
}

fn read_i32(bytes: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    i32::from_be_bytes(raw)
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    i64::from_be_bytes(raw)
}
