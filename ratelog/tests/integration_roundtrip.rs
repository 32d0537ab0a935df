//! Integration tests for the write, flush, close, and read-back cycle.

use ratelog::error::{RateLogError, RecordError};
use ratelog::format::{DEFAULT_FORMAT_NAME, FileHeader, HEADER_SIZE, RECORD_SIZE, RateEntry, Role};
use ratelog::reader::RateLogReader;
use ratelog::writer::{RateLogWriter, WriterConfig};
use tempfile::tempdir;

fn rate_header() -> FileHeader {
    FileHeader::new(DEFAULT_FORMAT_NAME, 1, Role::Sender).unwrap()
}

#[test]
fn test_three_record_round_trip() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("sender-rate.dat");

    let mut writer = RateLogWriter::create(&path, rate_header()).unwrap();
    writer.write(1, 100, 1000).unwrap();
    writer.write(1, 150, 1001).unwrap();
    writer.write(1, 90, 1002).unwrap();
    writer.flush().unwrap();
    writer.close();

    let reader = RateLogReader::open(&path).unwrap();
    let header = reader.header();
    assert_eq!(header.format_name(), "RATE");
    assert_eq!(header.file_version, 1);
    assert_eq!(header.format_version(), 1);
    assert_eq!(header.role, Role::Sender);

    assert_eq!(
        reader.to_vec(),
        vec![
            RateEntry::new(1, 100, 1000),
            RateEntry::new(1, 150, 1001),
            RateEntry::new(1, 90, 1002),
        ]
    );
}

#[test]
fn test_buffer_boundary_flush() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("boundary.dat");
    let capacity = 16usize;

    let mut writer = RateLogWriter::create_with_config(
        &path,
        rate_header(),
        WriterConfig::new(capacity).unwrap(),
    )
    .unwrap();

    let base = 1_700_000_000i64;
    for i in 0..=capacity {
        let ts = base + i64::try_from(i).unwrap();
        writer.write(0, ts * 2, ts).unwrap();
    }

    // The first `capacity` records reached the file before the last was buffered.
    assert!(writer.buffer_drains() >= 1);
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        (HEADER_SIZE + capacity * RECORD_SIZE) as u64
    );
    writer.close();

    let reader = RateLogReader::open(&path).unwrap();
    assert_eq!(reader.len(), capacity + 1);
    for (i, entry) in reader.records().enumerate() {
        let ts = base + i64::try_from(i).unwrap();
        assert_eq!(entry.timestamp, ts);
        assert_eq!(entry.count, ts * 2);
    }
}

#[test]
fn test_flush_is_visible_before_close() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("durable.dat");

    let mut writer = RateLogWriter::create(&path, rate_header()).unwrap();
    for ts in 100..105 {
        writer.write(3, ts, ts).unwrap();
    }
    writer.flush().unwrap();

    {
        let reader = RateLogReader::open(&path).unwrap();
        assert_eq!(reader.len(), 5);
        assert_eq!(reader.last(), Some(RateEntry::new(3, 104, 104)));
    }

    writer.write(3, 105, 105).unwrap();
    writer.flush().unwrap();

    let reader = RateLogReader::open(&path).unwrap();
    assert_eq!(reader.len(), 6);
    writer.close();
}

#[test]
fn test_accepted_timestamps_are_strictly_increasing() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("ordering.dat");

    let mut writer = RateLogWriter::create_with_config(
        &path,
        rate_header(),
        WriterConfig::new(4).unwrap(),
    )
    .unwrap();

    // A noisy producer: duplicates, regressions, and gaps.
    let produced = [10, 11, 11, 9, 12, 15, 14, 15, 16, 30, 29, 31];
    let mut rejected = Vec::new();
    for ts in produced {
        if let Err(e) = writer.write(0, 1, ts) {
            assert!(e.is_record_error());
            rejected.push(ts);
        }
    }
    writer.close();

    assert_eq!(rejected, vec![11, 9, 14, 15, 29]);

    let reader = RateLogReader::open(&path).unwrap();
    let timestamps: Vec<i64> = reader.records().map(|e| e.timestamp).collect();
    assert_eq!(timestamps, vec![10, 11, 12, 15, 16, 30, 31]);
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_rejection_reports_both_timestamps() {
    let temp_dir = tempdir().unwrap();
    let mut writer =
        RateLogWriter::create(temp_dir.path().join("errors.dat"), rate_header()).unwrap();

    writer.write(0, 1, 500).unwrap();

    match writer.write(0, 1, 400) {
        Err(RateLogError::Record(RecordError::TimestampRegression { timestamp, last })) => {
            assert_eq!((timestamp, last), (400, 500));
        }
        other => panic!("expected regression, got {other:?}"),
    }

    match writer.write(0, 1, 500) {
        Err(RateLogError::Record(RecordError::SlotOverwrite { timestamp, last })) => {
            assert_eq!((timestamp, last), (500, 500));
        }
        other => panic!("expected overwrite, got {other:?}"),
    }
}

#[test]
fn test_try_write_matches_strict_writer_output() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("lenient.dat");

    let mut writer = RateLogWriter::create(&path, rate_header()).unwrap();
    for ts in [1, 2, 2, 1, 3, 3, 5] {
        let before = (writer.last_timestamp(), writer.buffered_records());
        let accepted = writer.try_write(0, ts * 10, ts).unwrap();
        if !accepted {
            assert_eq!(before, (writer.last_timestamp(), writer.buffered_records()));
        }
    }
    writer.close();

    let reader = RateLogReader::open(&path).unwrap();
    let timestamps: Vec<i64> = reader.records().map(|e| e.timestamp).collect();
    assert_eq!(timestamps, vec![1, 2, 3, 5]);
}

#[test]
fn test_create_truncates_existing_file() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("reused.dat");

    let mut writer = RateLogWriter::create(&path, rate_header()).unwrap();
    for ts in 0..10 {
        writer.write(0, 1, ts).unwrap();
    }
    writer.close();

    let header = FileHeader::new("RATE", 2, Role::Receiver).unwrap();
    let mut writer = RateLogWriter::create(&path, header).unwrap();
    writer.write(0, 1, 0).unwrap();
    writer.close();

    let reader = RateLogReader::open(&path).unwrap();
    assert_eq!(reader.header().file_version, 2);
    assert_eq!(reader.header().role, Role::Receiver);
    assert_eq!(reader.len(), 1);
}
