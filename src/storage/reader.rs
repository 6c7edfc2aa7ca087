//! Capture directory reader

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use memmap2::Mmap;
use tracing::debug;

use super::format::{decode_elapsed, decode_record, ticks_to_seconds, CaptureFile, Schema, Slot};
use super::index::TimeIndex;
use super::interner::StringTable;
use crate::{Result, TapeError};

/// Owns the read handles of one loaded capture
///
/// The record log and the time index are memory-mapped; the schema and the
/// string table are loaded whole.
pub struct CaptureReader {
    dir: PathBuf,
    schema: Schema,
    strings: StringTable,
    _log_file: File,
    log: Mmap,
    _index_file: File,
    index: TimeIndex<Mmap>,
    interval: Duration,
    record_width: usize,
    record_count: u64,
    total_ticks: i64,
}

impl CaptureReader {
    /// Open and validate a capture directory
    ///
    /// `interval` is the spacing of time index entries the capture was
    /// recorded with.
    ///
    /// # Errors
    ///
    /// Returns the diagnostic for the first check that fails: missing folder,
    /// missing file, empty log, bad schema, empty string table, or an index
    /// that does not cover the log.
    pub fn open(dir: &Path, interval: Duration) -> Result<Self> {
        if !dir.is_dir() {
            return Err(TapeError::CaptureNotFound(dir.to_path_buf()));
        }

        let path = |file: CaptureFile| dir.join(file.file_name());
        for file in [
            CaptureFile::RecordLog,
            CaptureFile::Schema,
            CaptureFile::Strings,
            CaptureFile::Index,
        ] {
            if !path(file).is_file() {
                return Err(TapeError::FileMissing(file));
            }
        }

        let log_file = File::open(path(CaptureFile::RecordLog))?;
        if log_file.metadata()?.len() == 0 {
            return Err(TapeError::EmptyLog);
        }

        let schema = Schema::parse(&fs::read_to_string(path(CaptureFile::Schema))?)?;

        let strings = StringTable::parse(&fs::read_to_string(path(CaptureFile::Strings))?);
        if schema.has_strings() && strings.is_empty() {
            return Err(TapeError::StringTableEmpty);
        }

        let log = unsafe { Mmap::map(&log_file)? };
        let record_width = schema.record_width();
        let record_count = (log.len() / record_width) as u64;
        if record_count == 0 {
            return Err(TapeError::EmptyLog);
        }

        let last = (record_count as usize - 1) * record_width;
        let total_ticks = decode_elapsed(&log[last..last + record_width]);

        let index_file = File::open(path(CaptureFile::Index))?;
        let index = TimeIndex::new(unsafe { Mmap::map(&index_file)? });

        let required = (ticks_to_seconds(total_ticks) / interval.as_secs_f64()).floor() as usize;
        if index.len() < required {
            return Err(TapeError::IncompleteIndex {
                entries: index.len(),
                required,
            });
        }

        debug!(
            "Opened capture {}: {} records of {} bytes, {} index entries",
            dir.display(),
            record_count,
            record_width,
            index.len()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            schema,
            strings,
            _log_file: log_file,
            log,
            _index_file: index_file,
            index,
            interval,
            record_width,
            record_count,
            total_ticks,
        })
    }

    /// Capture directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loaded schema
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Loaded string table
    #[must_use]
    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// Time index
    #[must_use]
    pub fn index(&self) -> &TimeIndex<Mmap> {
        &self.index
    }

    /// Spacing of time index entries the capture was opened with
    #[must_use]
    pub fn index_interval(&self) -> Duration {
        self.interval
    }

    /// Width of one record in bytes
    #[must_use]
    pub fn record_width(&self) -> usize {
        self.record_width
    }

    /// Number of complete records in the log
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Length in bytes of the complete records; a trailing partial record is
    /// never played
    #[must_use]
    pub fn log_len(&self) -> u64 {
        self.record_count * self.record_width as u64
    }

    /// Elapsed time of the last record, in ticks
    #[must_use]
    pub fn total_ticks(&self) -> i64 {
        self.total_ticks
    }

    /// Elapsed time of the last record, in seconds
    #[must_use]
    pub fn total_seconds(&self) -> f64 {
        ticks_to_seconds(self.total_ticks)
    }

    /// Raw record starting at byte `offset`, if a whole record fits there
    #[must_use]
    pub fn record_at(&self, offset: u64) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        if offset >= self.log_len() {
            return None;
        }
        self.log.get(start..start + self.record_width)
    }

    /// Decode the record starting at byte `offset`
    #[must_use]
    pub fn decode_at(&self, offset: u64) -> Option<(i64, Vec<Slot>)> {
        self.record_at(offset)
            .map(|record| decode_record(record, &self.schema))
    }

    /// CRC-32 of the whole record log file
    #[must_use]
    pub fn log_crc(&self) -> u32 {
        crc32fast::hash(&self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CaptureWriter, FieldKind, DEFAULT_INDEX_INTERVAL};
    use tempfile::TempDir;

    fn write_capture(dir: &Path, kinds: Vec<FieldKind>, records: &[(i64, Vec<Slot>)], index: &[u32]) {
        let mut writer = CaptureWriter::create(dir).unwrap();
        writer.write_schema(&Schema::new(kinds).unwrap()).unwrap();
        writer.append_string("only").unwrap();
        for (elapsed, slots) in records {
            writer.append_record(*elapsed, slots).unwrap();
        }
        for &count in index {
            writer.append_index(count).unwrap();
        }
        writer.finish("").unwrap();
    }

    #[test]
    fn test_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("capture");
        write_capture(
            &dir,
            vec![FieldKind::Float],
            &[(0, vec![Slot::Float(0.5)]), (100_000, vec![Slot::Float(1.5)])],
            &[],
        );

        let reader = CaptureReader::open(&dir, DEFAULT_INDEX_INTERVAL).unwrap();
        assert_eq!(reader.record_width(), 12);
        assert_eq!(reader.record_count(), 2);
        assert_eq!(reader.log_len(), 24);
        assert_eq!(reader.total_ticks(), 100_000);
        assert!((reader.total_seconds() - 0.01).abs() < 1e-12);

        let (elapsed, slots) = reader.decode_at(12).unwrap();
        assert_eq!(elapsed, 100_000);
        assert_eq!(slots, vec![Slot::Float(1.5)]);
        assert!(reader.decode_at(24).is_none());
    }

    #[test]
    fn test_missing_folder() {
        let temp_dir = TempDir::new().unwrap();
        let result = CaptureReader::open(&temp_dir.path().join("nope"), DEFAULT_INDEX_INTERVAL);
        assert!(matches!(result, Err(TapeError::CaptureNotFound(_))));
    }

    #[test]
    fn test_each_missing_file_reported() {
        for missing in [
            CaptureFile::RecordLog,
            CaptureFile::Schema,
            CaptureFile::Strings,
            CaptureFile::Index,
        ] {
            let temp_dir = TempDir::new().unwrap();
            let dir = temp_dir.path().join("capture");
            write_capture(&dir, vec![FieldKind::Int], &[(0, vec![Slot::Int(1)])], &[]);
            fs::remove_file(dir.join(missing.file_name())).unwrap();

            match CaptureReader::open(&dir, DEFAULT_INDEX_INTERVAL) {
                Err(TapeError::FileMissing(file)) => assert_eq!(file, missing),
                Err(e) => panic!("unexpected error: {e}"),
                Ok(_) => panic!("open should fail without {missing}"),
            }
        }
    }

    #[test]
    fn test_empty_log() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("capture");
        write_capture(&dir, vec![FieldKind::Int], &[], &[]);

        let result = CaptureReader::open(&dir, DEFAULT_INDEX_INTERVAL);
        assert!(matches!(result, Err(TapeError::EmptyLog)));
    }

    #[test]
    fn test_bad_schema() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("capture");
        write_capture(&dir, vec![FieldKind::Int], &[(0, vec![Slot::Int(1)])], &[]);

        fs::write(dir.join("schema.txt"), "Int\nBlob\n").unwrap();
        let result = CaptureReader::open(&dir, DEFAULT_INDEX_INTERVAL);
        assert!(matches!(result, Err(TapeError::UnsupportedFieldType(_))));

        fs::write(dir.join("schema.txt"), "").unwrap();
        let result = CaptureReader::open(&dir, DEFAULT_INDEX_INTERVAL);
        assert!(matches!(result, Err(TapeError::SchemaEmpty)));
    }

    #[test]
    fn test_empty_string_table_with_string_field() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("capture");
        write_capture(&dir, vec![FieldKind::String], &[(0, vec![Slot::Ordinal(0)])], &[]);
        fs::write(dir.join("strings.txt"), "").unwrap();

        let result = CaptureReader::open(&dir, DEFAULT_INDEX_INTERVAL);
        assert!(matches!(result, Err(TapeError::StringTableEmpty)));
    }

    #[test]
    fn test_incomplete_index() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("capture");
        // 3.5 s of records but only the sentinel and one boundary
        write_capture(
            &dir,
            vec![FieldKind::Int],
            &[(0, vec![Slot::Int(1)]), (35_000_000, vec![Slot::Int(2)])],
            &[1],
        );

        match CaptureReader::open(&dir, DEFAULT_INDEX_INTERVAL) {
            Err(TapeError::IncompleteIndex { entries, required }) => {
                assert_eq!(entries, 2);
                assert_eq!(required, 3);
            }
            _ => panic!("expected incomplete index"),
        }
    }
}
