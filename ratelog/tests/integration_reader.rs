//! Integration tests for decoding rate logs written by the writer, including
//! damaged files.

use std::fs::OpenOptions;
use std::io::Write;

use ratelog::analysis::{RateSummary, rate_over_time};
use ratelog::error::{FormatError, RateLogError};
use ratelog::format::{DEFAULT_FORMAT_NAME, FileHeader, HEADER_SIZE, RECORD_SIZE, Role, record_offset};
use ratelog::reader::RateLogReader;
use ratelog::writer::RateLogWriter;
use tempfile::tempdir;

fn write_log(path: &std::path::Path, timestamps: &[i64]) {
    let header = FileHeader::new(DEFAULT_FORMAT_NAME, 1, Role::Receiver).unwrap();
    let mut writer = RateLogWriter::create(path, header).unwrap();
    for &ts in timestamps {
        writer.write(0, ts % 7 + 1, ts).unwrap();
    }
    writer.close();
}

#[test]
fn test_partial_record_tail_is_reported_as_truncated() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("crashed.dat");
    write_log(&path, &[100, 101, 102, 103]);

    // Simulate a crash partway through the next record.
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0u8; RECORD_SIZE / 2]).unwrap();
    drop(file);

    let err = RateLogReader::open(&path).unwrap_err();
    match err {
        RateLogError::Format(FormatError::TruncatedTail {
            complete_records,
            trailing_bytes,
        }) => {
            assert_eq!(complete_records, 4);
            assert_eq!(trailing_bytes, RECORD_SIZE / 2);
        }
        other => panic!("expected truncated tail, got {other:?}"),
    }
}

#[test]
fn test_cut_header_is_reported_as_truncated() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("cut.dat");
    write_log(&path, &[1, 2]);

    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len((HEADER_SIZE - 4) as u64).unwrap();
    drop(file);

    let err = RateLogReader::open(&path).unwrap_err();
    assert!(matches!(
        err,
        RateLogError::Format(FormatError::TruncatedHeader { .. })
    ));
}

#[test]
fn test_records_at_computed_offsets() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("offsets.dat");
    write_log(&path, &[10, 11, 12]);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), HEADER_SIZE + 3 * RECORD_SIZE);

    let offset = usize::try_from(record_offset(2).unwrap()).unwrap();
    let timestamp_bytes: [u8; 8] = bytes[offset + 12..offset + 20].try_into().unwrap();
    assert_eq!(i64::from_be_bytes(timestamp_bytes), 12);
}

#[test]
fn test_summary_from_file() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("summary.dat");
    write_log(&path, &[1000, 1001, 1002, 1010, 1011]);

    let reader = RateLogReader::open(&path).unwrap();
    let summary = RateSummary::from_entries(&reader);

    assert_eq!(summary.records, 5);
    assert_eq!(summary.gaps, 1);
    assert_eq!(summary.missing_slots, 7);
    assert_eq!(summary.first_timestamp, Some(1000));
    assert_eq!(summary.last_timestamp, Some(1011));

    let points = rate_over_time(&reader, None);
    assert_eq!(points.len(), 5);
    assert_eq!(points[3].timestamp, 1010);
    assert_eq!(points[3].count, 1010 % 7 + 1);
}
