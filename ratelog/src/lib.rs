//! # ratelog
//!
//! Append-only binary log of per-second throughput samples.
//!
//! ratelog records how many events a load-testing harness observed in each
//! one-second slot. The file is a fixed-size header followed by fixed-size
//! records, so it can be read back by index without any framing, and the
//! writer guarantees that slots only ever move forward.
//!
//! ## Key Properties
//!
//! - Fixed 20-byte records, big-endian, no padding or delimiters
//! - Strictly increasing timestamps, one record per slot
//! - Bounded write buffer drained only when full
//! - `flush` and close end with an fsync
//! - Truncated files are reported distinctly from I/O failures
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ratelog::{DEFAULT_FORMAT_NAME, FileHeader, RateLogReader, RateLogWriter, Role};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let header = FileHeader::new(DEFAULT_FORMAT_NAME, 1, Role::Sender)?;
//! let mut writer = RateLogWriter::create("sender-rate.dat", header)?;
//!
//! writer.write(1, 100, 1_700_000_000)?;
//! writer.write(1, 150, 1_700_000_001)?;
//! writer.close();
//!
//! let reader = RateLogReader::open("sender-rate.dat")?;
//! for entry in &reader {
//!     println!("{}: {}", entry.timestamp, entry.count);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`format`]: Header and record layout
//! - [`writer`]: Ordering-checked buffered writer
//! - [`reader`]: Memory-mapped reader and record iterator
//! - [`diagnostics`]: Gap and close-failure events
//! - [`analysis`]: Rate-over-time series and summaries
//! - [`error`]: Error types

pub mod analysis;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

// Re-export primary API types at crate root for convenience.
pub use analysis::{RatePoint, RateSummary};
pub use diagnostics::{DiagnosticSink, GapEvent, TracingSink};
pub use error::{RateLogError, Result};
pub use format::{DEFAULT_FORMAT_NAME, FileHeader, RateEntry, Role};
pub use reader::RateLogReader;
pub use writer::{RateLogWriter, WriterConfig};
