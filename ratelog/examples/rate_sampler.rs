//! Example of a sampling loop feeding a rate log.
//!
//! This example shows how to:
//! - Write one record per second from a producer's event counter
//! - Tolerate late samples with `try_write`
//! - Read the file back and summarize it
//!
//! Run with `RUST_LOG=ratelog=debug` to see the writer's diagnostics,
//! including the warning for the skipped slots.

use std::time::{Duration, SystemTime};

use ratelog::analysis::RateSummary;
use ratelog::format::{DEFAULT_FORMAT_NAME, FileHeader, Role};
use ratelog::reader::RateLogReader;
use ratelog::writer::{RateLogWriter, WriterConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sender-rate.dat");

    let header = FileHeader::new(DEFAULT_FORMAT_NAME, 1, Role::Sender)?;
    let mut writer = RateLogWriter::create_with_config(&path, header, WriterConfig::new(30)?)?;

    // Two simulated minutes of samples, with the producer stalling for five
    // seconds and then re-reporting a slot it already sent.
    let start = SystemTime::now();
    for second in 0u32..120 {
        if (60..65).contains(&second) {
            continue;
        }
        let at = start + Duration::from_secs(u64::from(second));
        let count = i64::from(10_000 + (second % 13) * 250);
        writer.write_at(0, count, at)?;

        if second == 70 {
            let accepted = writer.try_write_at(0, count, at)?;
            println!("re-sent slot accepted: {accepted}");
        }
    }
    writer.close();

    let reader = RateLogReader::open(&path)?;
    println!(
        "{} v{} ({:?}): {} records",
        reader.header().format_name(),
        reader.header().file_version,
        reader.header().role,
        reader.len()
    );

    let summary = RateSummary::from_entries(&reader);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
