//! Buffered, ordering-checked writer for rate log files.
//!
//! A [`RateLogWriter`] owns one output file and one bounded buffer for the
//! lifetime of a logging session. Samples are validated against the last
//! accepted timestamp, serialized into the buffer, and handed to the file only
//! when the buffer is full, on [`flush`](RateLogWriter::flush), or on close.
//!
//! # Ordering
//!
//! Each one-second slot holds at most one record and slots only move forward:
//!
//! - a timestamp earlier than the last accepted one fails with
//!   [`RecordError::TimestampRegression`]
//! - a timestamp equal to the last accepted one fails with
//!   [`RecordError::SlotOverwrite`]
//! - a timestamp that skips slots is accepted and reported to the
//!   [`DiagnosticSink`] as a [`GapEvent`]
//!
//! # Example
//!
//! ```rust,no_run
//! use ratelog::format::{DEFAULT_FORMAT_NAME, FileHeader, Role};
//! use ratelog::writer::RateLogWriter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let header = FileHeader::new(DEFAULT_FORMAT_NAME, 1, Role::Sender)?;
//! let mut writer = RateLogWriter::create("sender-rate.dat", header)?;
//!
//! writer.write(0, 1_250, 1_700_000_000)?;
//! writer.write(0, 1_310, 1_700_000_001)?;
//! writer.flush()?;
//! writer.close();
//! # Ok(())
//! # }
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticSink, GapEvent, TracingSink};
use crate::error::{ConfigError, IoError, RateLogError, RecordError, Result};
use crate::format::{FileHeader, HEADER_SIZE, RECORD_SIZE, RateEntry};

/// Records buffered before a drain: one minute of one-second samples.
pub const DEFAULT_BUFFER_RECORDS: usize = 60;

fn default_buffer_records() -> usize {
    DEFAULT_BUFFER_RECORDS
}

/// Tuning for a [`RateLogWriter`].
///
/// # Example
///
/// ```rust
/// use ratelog::writer::WriterConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = WriterConfig::new(300)?; // five minutes per drain
/// assert_eq!(config.buffer_records, 300);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Number of records the in-memory buffer holds before it is drained to
    /// the file.
    #[serde(default = "default_buffer_records")]
    pub buffer_records: usize,
}

impl WriterConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBufferRecords`] if `buffer_records` is zero.
    pub fn new(buffer_records: usize) -> Result<Self> {
        let config = Self { buffer_records };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBufferRecords`] if `buffer_records` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_records == 0 {
            return Err(ConfigError::InvalidBufferRecords {
                count: self.buffer_records,
            }
            .into());
        }
        Ok(())
    }

    /// Buffer capacity in bytes.
    fn buffer_bytes(&self) -> usize {
        self.buffer_records * RECORD_SIZE
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            buffer_records: DEFAULT_BUFFER_RECORDS,
        }
    }
}

/// Converts a wall-clock instant into epoch seconds, rounding toward the past.
///
/// # Errors
///
/// Returns [`RecordError::TimestampOutOfRange`] if the instant does not fit
/// in an `i64`.
pub fn epoch_seconds(at: SystemTime) -> Result<i64> {
    let out_of_range = |_| RateLogError::from(RecordError::TimestampOutOfRange);

    match at.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).map_err(out_of_range),
        Err(before) => {
            let before = before.duration();
            let secs = before.as_secs() + u64::from(before.subsec_nanos() > 0);
            i64::try_from(secs).map(|s| -s).map_err(out_of_range)
        }
    }
}

/// Append-only writer for a single rate log file.
///
/// # Thread Safety
///
/// One writer per file, driven from one logical stream of samples. The
/// writer does no internal locking; callers that share it across threads must
/// synchronize externally.
///
/// # Resource release
///
/// [`close`](Self::close) flushes durably and releases the file. A writer that
/// is dropped without being closed performs the same best-effort close.
#[derive(Debug)]
pub struct RateLogWriter<S: DiagnosticSink = TracingSink> {
    /// The output file.
    file: File,
    /// Path of the output file (for errors and diagnostics).
    path: PathBuf,
    /// Serialized records not yet handed to the file.
    buffer: Vec<u8>,
    /// Buffer capacity in bytes, fixed at creation.
    capacity: usize,
    config: WriterConfig,
    /// Timestamp of the most recently accepted record.
    last: Option<i64>,
    /// Bytes handed to the file so far, header included.
    bytes_written: u64,
    /// Records accepted since creation.
    records_written: u64,
    /// Number of times the buffer was drained to the file.
    buffer_drains: u64,
    /// Set once the session has been closed.
    closed: bool,
    sink: S,
}

impl RateLogWriter<TracingSink> {
    /// Creates (or truncates) `path` and writes `header` to it.
    ///
    /// Uses [`WriterConfig::default`] and logs diagnostics through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`] if the file cannot be opened or the header cannot
    /// be written. No writer is returned in that case.
    pub fn create<P: AsRef<Path>>(path: P, header: FileHeader) -> Result<Self> {
        Self::create_with_config(path, header, WriterConfig::default())
    }

    /// Like [`create`](Self::create) with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an invalid configuration, or [`IoError`] if
    /// the file cannot be opened or the header cannot be written.
    pub fn create_with_config<P: AsRef<Path>>(
        path: P,
        header: FileHeader,
        config: WriterConfig,
    ) -> Result<Self> {
        RateLogWriter::create_with_sink(path, header, config, TracingSink)
    }
}

impl<S: DiagnosticSink> RateLogWriter<S> {
    /// Creates a writer that reports diagnostics to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an invalid configuration, or [`IoError`] if
    /// the file cannot be opened or the header cannot be written.
    pub fn create_with_sink<P: AsRef<Path>>(
        path: P,
        header: FileHeader,
        config: WriterConfig,
        sink: S,
    ) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref().to_path_buf();
        let path_str = path.to_string_lossy().to_string();

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
            .map_err(|e| IoError::OpenFailed {
                path: path_str.clone(),
                source: e,
            })?;

        file.write_all(&header.encode())
            .map_err(|e| IoError::WriteFailed {
                path: path_str,
                offset: 0,
                source: e,
            })?;

        tracing::debug!(
            path = %path.display(),
            format_name = header.format_name(),
            file_version = header.file_version,
            role = ?header.role,
            buffer_records = config.buffer_records,
            "opened rate log"
        );

        let capacity = config.buffer_bytes();
        Ok(Self {
            file,
            path,
            buffer: Vec::with_capacity(capacity),
            capacity,
            config,
            last: None,
            bytes_written: HEADER_SIZE as u64,
            records_written: 0,
            buffer_drains: 0,
            closed: false,
            sink,
        })
    }

    /// Appends a sample for the slot `timestamp` (epoch seconds).
    ///
    /// The record is buffered; it reaches the file when the buffer fills, on
    /// [`flush`](Self::flush), or on close. If the buffer has no room for one
    /// more record, it is drained to the file first.
    ///
    /// # Errors
    ///
    /// - [`RecordError::TimestampRegression`] if `timestamp` is before the last
    ///   accepted timestamp
    /// - [`RecordError::SlotOverwrite`] if `timestamp` equals it
    /// - [`IoError::WriteFailed`] if draining the full buffer fails
    ///
    /// On error nothing is buffered and the last accepted timestamp is unchanged.
    pub fn write(&mut self, metadata: i32, count: i64, timestamp: i64) -> Result<()> {
        let gap = self.check_time_slot(timestamp)?;
        self.ensure_capacity()?;

        RateEntry::new(metadata, count, timestamp).encode_into(&mut self.buffer);
        self.last = Some(timestamp);
        self.records_written += 1;

        if let Some(event) = gap {
            self.sink.on_gap(&self.path, &event);
        }

        Ok(())
    }

    /// Appends a sample stamped with a wall-clock instant.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write), plus
    /// [`RecordError::TimestampOutOfRange`] for unrepresentable instants.
    pub fn write_at(&mut self, metadata: i32, count: i64, at: SystemTime) -> Result<()> {
        self.write(metadata, count, epoch_seconds(at)?)
    }

    /// Appends a sample unless its slot is not after the last accepted one.
    ///
    /// Late or duplicate samples are dropped without error or state change.
    /// Returns `true` if the sample was buffered.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFailed`] if draining the full buffer fails.
    pub fn try_write(&mut self, metadata: i32, count: i64, timestamp: i64) -> Result<bool> {
        if self.last.is_some_and(|last| timestamp <= last) {
            tracing::trace!(timestamp, last = ?self.last, "dropping late rate sample");
            return Ok(false);
        }

        self.write(metadata, count, timestamp)?;
        Ok(true)
    }

    /// [`try_write`](Self::try_write) with a wall-clock instant.
    ///
    /// # Errors
    ///
    /// Same as [`try_write`](Self::try_write), plus
    /// [`RecordError::TimestampOutOfRange`] for unrepresentable instants.
    pub fn try_write_at(&mut self, metadata: i32, count: i64, at: SystemTime) -> Result<bool> {
        self.try_write(metadata, count, epoch_seconds(at)?)
    }

    /// Drains buffered records to the file and syncs it to storage.
    ///
    /// When this returns `Ok`, every accepted record survives a crash.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFailed`] or [`IoError::SyncFailed`].
    pub fn flush(&mut self) -> Result<()> {
        self.drain()?;

        self.file.sync_all().map_err(|e| IoError::SyncFailed {
            path: self.path.to_string_lossy().to_string(),
            source: e,
        })?;

        tracing::debug!(
            path = %self.path.display(),
            bytes = self.bytes_written,
            records = self.records_written,
            "flushed rate log"
        );
        Ok(())
    }

    /// Flushes and releases the file.
    ///
    /// Errors are reported to the diagnostic sink and never returned.
    pub fn close(mut self) {
        self.finish();
    }

    /// Returns the path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the timestamp of the most recently accepted record.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.last
    }

    /// Returns the number of records waiting in the buffer.
    ///
    /// A record only partly written by a failed drain still counts.
    pub fn buffered_records(&self) -> usize {
        self.buffer.len().div_ceil(RECORD_SIZE)
    }

    /// Returns the number of records accepted since creation.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Returns how many times the buffer has been drained to the file.
    pub fn buffer_drains(&self) -> u64 {
        self.buffer_drains
    }

    /// Returns the writer configuration.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Returns the diagnostic sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Validates `timestamp` against the last accepted slot.
    fn check_time_slot(&self, timestamp: i64) -> Result<Option<GapEvent>> {
        let Some(last) = self.last else {
            return Ok(None);
        };

        if timestamp < last {
            return Err(RecordError::TimestampRegression { timestamp, last }.into());
        }
        if timestamp == last {
            return Err(RecordError::SlotOverwrite { timestamp, last }.into());
        }

        let expected = last + 1;
        if timestamp != expected {
            return Ok(Some(GapEvent {
                expected,
                actual: timestamp,
            }));
        }
        Ok(None)
    }

    /// Drains the buffer if it cannot take one more record.
    fn ensure_capacity(&mut self) -> Result<()> {
        let remaining = self.capacity - self.buffer.len();
        if remaining < RECORD_SIZE {
            tracing::trace!(remaining, "not enough space on the buffer for a rate record");
            self.drain()?;
        }
        Ok(())
    }

    /// Writes the whole buffer to the file and empties it.
    ///
    /// Bytes the file accepted leave the buffer even when a later write
    /// fails, so a retry resumes at the current end of the file.
    fn drain(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut written = 0;
        let result = loop {
            if written == self.buffer.len() {
                break Ok(());
            }
            match self.file.write(&self.buffer[written..]) {
                Ok(0) => break Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };

        self.buffer.drain(..written);
        self.bytes_written += written as u64;

        if let Err(e) = result {
            tracing::trace!(
                written,
                pending = self.buffer.len(),
                "partial drain of the rate log buffer"
            );
            return Err(IoError::WriteFailed {
                path: self.path.to_string_lossy().to_string(),
                offset: self.bytes_written,
                source: e,
            }
            .into());
        }

        self.buffer_drains += 1;
        Ok(())
    }

    fn finish(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match self.flush() {
            Ok(()) => tracing::debug!(path = %self.path.display(), "closed rate log"),
            Err(e) => self.sink.on_close_error(&self.path, &e),
        }
    }
}

impl<S: DiagnosticSink> Drop for RateLogWriter<S> {
    fn drop(&mut self) {
        self.finish();
    }
}
