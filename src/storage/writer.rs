//! Capture directory writer

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use crc32fast::Hasher;
use tracing::{debug, warn};

use super::format::{encode_record, CaptureFile, Schema, Slot};
use super::index::TimeIndexWriter;
use crate::{Result, TapeError};

/// Owns every output handle of one recording session
///
/// All handles are opened by [`CaptureWriter::create`] and released together
/// when the writer is dropped.
pub struct CaptureWriter {
    dir: PathBuf,
    records: BufWriter<File>,
    schema: BufWriter<File>,
    strings: BufWriter<File>,
    index: TimeIndexWriter<BufWriter<File>>,
    summary: File,
    record_buf: BytesMut,
    crc: Hasher,
    log_bytes: u64,
}

impl CaptureWriter {
    /// Create `dir` and every capture file inside it
    ///
    /// # Errors
    ///
    /// Returns [`TapeError::CaptureExists`] if `dir` already exists, or an I/O
    /// error if any file cannot be created. On error nothing is left behind.
    pub fn create(dir: &Path) -> Result<Self> {
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)?;
        }

        match fs::create_dir(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(TapeError::CaptureExists(dir.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }

        Self::open_files(dir).map_err(|e| {
            if let Err(cleanup) = fs::remove_dir_all(dir) {
                warn!("Failed to remove {}: {cleanup}", dir.display());
            }
            e
        })
    }

    fn open_files(dir: &Path) -> Result<Self> {
        let create = |file: CaptureFile| -> io::Result<File> {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(dir.join(file.file_name()))
        };

        let records = BufWriter::new(create(CaptureFile::RecordLog)?);
        let schema = BufWriter::new(create(CaptureFile::Schema)?);
        let strings = BufWriter::new(create(CaptureFile::Strings)?);
        let index = TimeIndexWriter::new(BufWriter::new(create(CaptureFile::Index)?))?;
        let summary = create(CaptureFile::Summary)?;

        debug!("Opened capture files in {}", dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            records,
            schema,
            strings,
            index,
            summary,
            record_buf: BytesMut::new(),
            crc: Hasher::new(),
            log_bytes: 0,
        })
    }

    /// Capture directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the schema file
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn write_schema(&mut self, schema: &Schema) -> Result<()> {
        self.schema.write_all(schema.render().as_bytes())?;
        Ok(())
    }

    /// Append a newly interned string
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn append_string(&mut self, value: &str) -> Result<()> {
        self.strings.write_all(value.as_bytes())?;
        self.strings.write_all(b"\n")?;
        Ok(())
    }

    /// Append one record to the log
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn append_record(&mut self, elapsed_ticks: i64, slots: &[Slot]) -> Result<()> {
        self.record_buf.clear();
        encode_record(&mut self.record_buf, elapsed_ticks, slots);

        self.records.write_all(&self.record_buf)?;
        self.crc.update(&self.record_buf);
        self.log_bytes += self.record_buf.len() as u64;
        Ok(())
    }

    /// Append a time index entry
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn append_index(&mut self, record_count: u32) -> Result<()> {
        self.index.append(record_count)
    }

    /// Bytes written to the record log
    #[must_use]
    pub fn log_bytes(&self) -> u64 {
        self.log_bytes
    }

    /// CRC-32 of everything written to the record log
    #[must_use]
    pub fn log_crc(&self) -> u32 {
        self.crc.clone().finalize()
    }

    /// Time index entries written so far
    #[must_use]
    pub fn index_entries(&self) -> usize {
        self.index.entries()
    }

    /// Flush every stream and write the summary file
    ///
    /// Safe to call again after a failure; the summary is rewritten from the
    /// start.
    ///
    /// # Errors
    ///
    /// Returns error if any flush or write fails
    pub fn finish(&mut self, summary: &str) -> Result<()> {
        self.records.flush()?;
        self.schema.flush()?;
        self.strings.flush()?;
        self.index.flush()?;

        self.summary.set_len(0)?;
        self.summary.rewind()?;
        self.summary.write_all(summary.as_bytes())?;
        self.summary.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FieldKind;
    use tempfile::TempDir;

    #[test]
    fn test_create_writer() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("capture");

        let writer = CaptureWriter::create(&dir).unwrap();
        assert_eq!(writer.dir(), dir.as_path());
        assert_eq!(writer.log_bytes(), 0);
        assert_eq!(writer.index_entries(), 1);

        for file in [
            CaptureFile::RecordLog,
            CaptureFile::Schema,
            CaptureFile::Strings,
            CaptureFile::Index,
            CaptureFile::Summary,
        ] {
            assert!(dir.join(file.file_name()).exists());
        }
    }

    #[test]
    fn test_collision_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("capture");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("keep.txt"), b"keep").unwrap();

        let result = CaptureWriter::create(&dir);
        assert!(matches!(result, Err(TapeError::CaptureExists(_))));
        assert!(dir.join("keep.txt").exists());
    }

    #[test]
    fn test_finish_writes_everything() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("capture");

        let mut writer = CaptureWriter::create(&dir).unwrap();
        let schema = Schema::new(vec![FieldKind::Float]).unwrap();
        writer.write_schema(&schema).unwrap();
        writer.append_string("hello").unwrap();
        writer.append_record(0, &[Slot::Float(1.5)]).unwrap();
        writer.append_record(100_000, &[Slot::Float(2.5)]).unwrap();
        writer.append_index(2).unwrap();
        writer.finish("reason = \"done\"\n").unwrap();
        writer.finish("reason = \"again\"\n").unwrap();

        let log = fs::read(dir.join("records.bin")).unwrap();
        assert_eq!(log.len(), 24);
        assert_eq!(writer.log_bytes(), 24);
        assert_eq!(writer.log_crc(), crc32fast::hash(&log));
        assert_eq!(fs::read_to_string(dir.join("schema.txt")).unwrap(), "Float\n");
        assert_eq!(fs::read_to_string(dir.join("strings.txt")).unwrap(), "hello\n");
        assert_eq!(fs::read(dir.join("index.bin")).unwrap(), vec![0, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(
            fs::read_to_string(dir.join("summary.toml")).unwrap(),
            "reason = \"again\"\n"
        );
    }
}
