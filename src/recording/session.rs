//! A single recording session

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::message::{Message, Value};
use crate::storage::{
    duration_to_ticks, CaptureWriter, FieldKind, Schema, Slot, StringInterner,
};
use crate::Result;

use super::summary::{format_clock, RecordingSummary};

/// Timestamp format used in summaries
const WALL_CLOCK_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";

/// Outcome of encoding one message
pub(crate) enum Encoded {
    /// Record appended
    Appended,
    /// Message did not fit the schema and was dropped
    Dropped,
    /// First message cannot define a schema; holds the stop reason
    Unsupported(String),
}

/// State owned by one recording, from start to stop
///
/// Schema, string table and counters start empty with every session, and
/// every file handle lives in the [`CaptureWriter`].
pub(crate) struct RecordingSession {
    writer: CaptureWriter,
    started: Instant,
    started_at: DateTime<Local>,
    index_interval: Duration,
    schema: Option<Schema>,
    interner: StringInterner,
    record_count: u32,
    last_ticks: i64,
    slots: Vec<Slot>,
}

impl RecordingSession {
    /// Open every output file in `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the capture directory cannot be created
    pub(crate) fn create(dir: &Path, now: Instant, index_interval: Duration) -> Result<Self> {
        Ok(Self {
            writer: CaptureWriter::create(dir)?,
            started: now,
            started_at: Local::now(),
            index_interval,
            schema: None,
            interner: StringInterner::new(),
            record_count: 0,
            last_ticks: 0,
            slots: Vec::new(),
        })
    }

    pub(crate) fn dir(&self) -> &Path {
        self.writer.dir()
    }

    pub(crate) fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub(crate) fn strings(&self) -> &[String] {
        self.interner.strings()
    }

    pub(crate) fn record_count(&self) -> u32 {
        self.record_count
    }

    pub(crate) fn log_bytes(&self) -> u64 {
        self.writer.log_bytes()
    }

    pub(crate) fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Fix the schema from the first message's value kinds
    ///
    /// Returns the stop reason if the message cannot define a schema.
    ///
    /// # Errors
    ///
    /// Returns error if the schema file cannot be written
    fn infer_schema(&mut self, message: &Message) -> Result<Option<String>> {
        let mut fields = Vec::with_capacity(message.values.len());
        for kind in message.kinds() {
            match kind.field_kind() {
                Some(field) => fields.push(field),
                None => return Ok(Some(format!("unsupported type: {kind}"))),
            }
        }

        let Ok(schema) = Schema::new(fields) else {
            return Ok(Some("unsupported type: message has no values".to_string()));
        };

        self.writer.write_schema(&schema)?;
        self.schema = Some(schema);
        Ok(None)
    }

    /// Validate, intern and append one message
    ///
    /// # Errors
    ///
    /// Returns error if any capture file write fails
    pub(crate) fn encode(&mut self, message: &Message, now: Instant) -> Result<Encoded> {
        if self.schema.is_none() {
            if let Some(reason) = self.infer_schema(message)? {
                return Ok(Encoded::Unsupported(reason));
            }
        }

        let fits = self
            .schema
            .as_ref()
            .is_some_and(|schema| schema.matches(message) && storable_strings(message));
        if !fits {
            trace!("Dropping message for {} that does not fit the schema", message.address);
            return Ok(Encoded::Dropped);
        }

        let ticks = duration_to_ticks(self.elapsed(now)).max(self.last_ticks);
        self.advance_index(ticks)?;

        let Some(schema) = self.schema.as_ref() else {
            return Ok(Encoded::Dropped);
        };

        self.slots.clear();
        for (value, kind) in message.values.iter().zip(schema.fields()) {
            let slot = match (value, kind) {
                (Value::Int(v), FieldKind::Int) => Slot::Int(*v),
                (Value::Float(v), FieldKind::Float) => Slot::Float(*v),
                (Value::String(v), FieldKind::String) => {
                    let writer = &mut self.writer;
                    let ordinal = self
                        .interner
                        .intern_with(v, |s| writer.append_string(s))?;
                    Slot::Ordinal(ordinal)
                }
                _ => unreachable!("schema match checked above"),
            };
            self.slots.push(slot);
        }

        self.writer.append_record(ticks, &self.slots)?;
        self.record_count = self.record_count.saturating_add(1);
        self.last_ticks = ticks;
        Ok(Encoded::Appended)
    }

    /// Append an index entry for every interval boundary at or before `ticks`
    ///
    /// Each entry counts the records stamped strictly before its boundary.
    ///
    /// # Errors
    ///
    /// Returns error if the index write fails
    pub(crate) fn advance_index(&mut self, ticks: i64) -> Result<()> {
        if self.index_interval.is_zero() {
            return Ok(());
        }
        loop {
            let next = u32::try_from(self.writer.index_entries()).unwrap_or(u32::MAX);
            let boundary = duration_to_ticks(self.index_interval.saturating_mul(next));
            if boundary > ticks {
                return Ok(());
            }
            self.writer.append_index(self.record_count)?;
        }
    }

    /// Bring the index up to `now`, flush everything and write the summary
    ///
    /// # Errors
    ///
    /// Returns error if any write or flush fails
    pub(crate) fn finish(&mut self, reason: &str, now: Instant) -> Result<RecordingSummary> {
        let elapsed = self.elapsed(now);
        self.advance_index(duration_to_ticks(elapsed).max(self.last_ticks))?;

        let summary = RecordingSummary {
            reason: reason.to_string(),
            capture_id: capture_id(self.dir(), self.started_at),
            capture_dir: self.dir().to_path_buf(),
            started_at: self.started_at.format(WALL_CLOCK_FORMAT).to_string(),
            stopped_at: Local::now().format(WALL_CLOCK_FORMAT).to_string(),
            duration: format_clock(elapsed.as_secs_f64()),
            duration_seconds: elapsed.as_secs_f64(),
            schema: self
                .schema
                .iter()
                .flat_map(Schema::fields)
                .map(ToString::to_string)
                .collect(),
            strings: self.interner.strings().to_vec(),
            record_count: u64::from(self.record_count),
            log_bytes: self.writer.log_bytes(),
            index_entries: self.writer.index_entries(),
            index_interval_seconds: self.index_interval.as_secs_f64(),
            log_crc32: format!("{:08x}", self.writer.log_crc()),
        };

        self.writer.finish(&summary.to_toml()?)?;
        Ok(summary)
    }
}

/// String values end up one per line in the string table
fn storable_strings(message: &Message) -> bool {
    message.values.iter().all(|value| match value {
        Value::String(s) => !s.contains(['\n', '\r']),
        _ => true,
    })
}

/// Generate a capture ID from the directory and start time
fn capture_id(dir: &Path, started_at: DateTime<Local>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dir.to_string_lossy().as_bytes());
    hasher.update(
        started_at
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes(),
    );
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storable_strings() {
        assert!(storable_strings(&Message::new("/a", vec![Value::String("ok".into())])));
        assert!(!storable_strings(&Message::new("/a", vec![Value::String("a\nb".into())])));
    }

    #[test]
    fn test_index_counts_records_before_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut session = RecordingSession::create(
            &temp_dir.path().join("capture"),
            start,
            Duration::from_secs(1),
        )
        .unwrap();

        let message = Message::new("/a", vec![Value::Int(1)]);
        session.encode(&message, start).unwrap();
        session.encode(&message, start + Duration::from_millis(900)).unwrap();
        // Crosses two boundaries before being stamped
        session.encode(&message, start + Duration::from_millis(2500)).unwrap();

        let summary = session.finish("done", start + Duration::from_millis(3200)).unwrap();
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.index_entries, 4);

        let index = std::fs::read(temp_dir.path().join("capture/index.bin")).unwrap();
        let entries: Vec<u32> = index
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(entries, vec![0, 2, 2, 3]);
    }

    #[test]
    fn test_capture_id_is_hex_sha256() {
        let id = capture_id(Path::new("/tmp/x"), Local::now());
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
