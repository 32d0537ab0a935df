//! Error types for the ratelog binary rate log.

use thiserror::Error;

/// The main error type for all ratelog operations.
///
/// Ordering violations, storage failures, and malformed files are kept in
/// separate variants so callers can tell "the producer misbehaved" apart from
/// "the disk failed" and from "the file was cut short by a crash".
#[derive(Error, Debug)]
pub enum RateLogError {
    /// A sample was rejected by the writer's ordering rules.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// The underlying storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// A rate log file could not be decoded.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// The writer configuration is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl RateLogError {
    /// Returns `true` if this error is an ordering violation that the caller
    /// may choose to drop and continue from.
    pub fn is_record_error(&self) -> bool {
        matches!(self, Self::Record(_))
    }
}

/// Errors raised when a sample violates the one-record-per-slot ordering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The sample's timestamp is earlier than the last accepted one.
    #[error("sequential record with a timestamp in the past: {timestamp} < last {last}")]
    TimestampRegression {
        /// The rejected timestamp, in epoch seconds.
        timestamp: i64,
        /// The last accepted timestamp, in epoch seconds.
        last: i64,
    },

    /// The sample targets a slot that already holds a record.
    #[error("multiple records within the same second slot: {timestamp} == last {last}")]
    SlotOverwrite {
        /// The rejected timestamp, in epoch seconds.
        timestamp: i64,
        /// The last accepted timestamp, in epoch seconds.
        last: i64,
    },

    /// A wall-clock instant cannot be represented as `i64` epoch seconds.
    #[error("timestamp is outside the representable epoch-second range")]
    TimestampOutOfRange,
}

/// Errors from the storage layer backing a rate log.
#[derive(Error, Debug)]
pub enum IoError {
    /// The file could not be created or opened.
    #[error("failed to open rate log '{path}': {source}")]
    OpenFailed {
        /// The file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing bytes to the file failed.
    #[error("failed to write rate log '{path}' at offset {offset}: {source}")]
    WriteFailed {
        /// The file path.
        path: String,
        /// The byte offset at which the write failed.
        offset: u64,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The durability barrier (fsync) failed.
    #[error("failed to sync rate log '{path}' to disk: {source}")]
    SyncFailed {
        /// The file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading file metadata or contents failed.
    #[error("failed to read rate log '{path}': {source}")]
    ReadFailed {
        /// The file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Memory mapping the file for reading failed.
    #[error("memory mapping failed for rate log '{path}': {source}")]
    MapFailed {
        /// The file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while decoding a rate log file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The file is shorter than the fixed header block.
    #[error("file too small for header: {len} bytes, expected at least {expected}")]
    TruncatedHeader {
        /// The number of bytes available.
        len: usize,
        /// The header size.
        expected: usize,
    },

    /// The data after the header is not a whole number of records.
    ///
    /// This is the signature of a writer that crashed mid-write.
    #[error("truncated tail: {complete_records} complete records followed by {trailing_bytes} trailing bytes")]
    TruncatedTail {
        /// Number of records that decode cleanly.
        complete_records: usize,
        /// Number of bytes past the last complete record.
        trailing_bytes: usize,
    },

    /// The header declares an encoding version this crate does not read.
    #[error("unsupported format version: expected {expected}, found {found}")]
    UnsupportedFormatVersion {
        /// The supported encoding version.
        expected: i32,
        /// The version stored in the file.
        found: i32,
    },

    /// The header's role code is not a known role.
    #[error("unknown role code: {code}")]
    UnknownRole {
        /// The stored role code.
        code: i32,
    },

    /// The format name is not ASCII.
    #[error("invalid format name {name:?}: {reason}")]
    InvalidFormatName {
        /// The rejected name.
        name: String,
        /// Why the name is invalid.
        reason: String,
    },
}

/// Errors raised when validating writer configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The buffer must hold at least one record.
    #[error("invalid buffer_records: {count} (must be > 0)")]
    InvalidBufferRecords {
        /// The rejected count.
        count: usize,
    },
}

/// Type alias for `Result<T, RateLogError>`.
pub type Result<T> = std::result::Result<T, RateLogError>;
