//! Capture directory layout and record encoding

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};

use crate::message::{Message, Value};
use crate::{Result, TapeError};

/// Size of the elapsed-time field at the start of every record
pub const TIMESTAMP_SIZE: usize = 8;

/// Size of one encoded field value
pub const VALUE_SIZE: usize = 4;

/// Size of one time index entry
pub const INDEX_ENTRY_SIZE: usize = 4;

/// Elapsed time resolution: 100 ns ticks
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Default spacing of time index entries
pub const DEFAULT_INDEX_INTERVAL: Duration = Duration::from_secs(1);

static_assertions::const_assert_eq!(TIMESTAMP_SIZE, std::mem::size_of::<i64>());
static_assertions::const_assert_eq!(VALUE_SIZE, std::mem::size_of::<i32>());
static_assertions::const_assert_eq!(VALUE_SIZE, std::mem::size_of::<f32>());
static_assertions::const_assert_eq!(INDEX_ENTRY_SIZE, std::mem::size_of::<u32>());

/// Files making up a capture directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFile {
    /// Fixed-width binary records
    RecordLog,
    /// Field kinds, one per line
    Schema,
    /// Interned strings, one per line
    Strings,
    /// Cumulative record counts per interval
    Index,
    /// Human-readable summary written on stop
    Summary,
}

impl CaptureFile {
    /// File name inside the capture directory
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::RecordLog => "records.bin",
            Self::Schema => "schema.txt",
            Self::Strings => "strings.txt",
            Self::Index => "index.bin",
            Self::Summary => "summary.toml",
        }
    }
}

impl fmt::Display for CaptureFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RecordLog => "record log",
            Self::Schema => "schema",
            Self::Strings => "string table",
            Self::Index => "time index",
            Self::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Storable field kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Raw little-endian `i32`
    Int,
    /// Little-endian IEEE-754 `f32`
    Float,
    /// Little-endian `i32` ordinal into the string table
    String,
}

impl FieldKind {
    /// Name written to the schema file
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = TapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Int" => Ok(Self::Int),
            "Float" => Ok(Self::Float),
            "String" => Ok(Self::String),
            other => Err(TapeError::UnsupportedFieldType(other.to_string())),
        }
    }
}

/// Ordered field kinds fixing a capture's record layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldKind>,
}

impl Schema {
    /// Create a schema
    ///
    /// # Errors
    ///
    /// Returns error if `fields` is empty
    pub fn new(fields: Vec<FieldKind>) -> Result<Self> {
        if fields.is_empty() {
            return Err(TapeError::SchemaEmpty);
        }
        Ok(Self { fields })
    }

    /// Parse the schema file contents
    ///
    /// # Errors
    ///
    /// Returns error on an unknown line or when there are no lines at all
    pub fn parse(text: &str) -> Result<Self> {
        let fields = text
            .lines()
            .map(|line| line.trim_end_matches('\r').parse())
            .collect::<Result<Vec<FieldKind>>>()?;
        Self::new(fields)
    }

    /// Schema file contents
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = String::new();
        for kind in &self.fields {
            text.push_str(kind.as_str());
            text.push('\n');
        }
        text
    }

    /// Field kinds in order
    #[must_use]
    pub fn fields(&self) -> &[FieldKind] {
        &self.fields
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false; a schema holds at least one field
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the schema holds a string field
    #[must_use]
    pub fn has_strings(&self) -> bool {
        self.fields.contains(&FieldKind::String)
    }

    /// Width in bytes of one record: `8 + 4 * N`
    #[must_use]
    pub fn record_width(&self) -> usize {
        TIMESTAMP_SIZE + VALUE_SIZE * self.fields.len()
    }

    /// Whether a message has exactly this arity and these positional kinds
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        message.values.len() == self.fields.len()
            && message
                .kinds()
                .zip(&self.fields)
                .all(|(kind, field)| kind.field_kind() == Some(*field))
    }
}

/// Encoded field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    /// Raw integer
    Int(i32),
    /// Raw float
    Float(f32),
    /// String table ordinal
    Ordinal(i32),
}

impl Slot {
    fn put(self, buf: &mut BytesMut) {
        match self {
            Self::Int(v) | Self::Ordinal(v) => buf.put_i32_le(v),
            Self::Float(v) => buf.put_f32_le(v),
        }
    }
}

/// Append one record to `buf`
pub fn encode_record(buf: &mut BytesMut, elapsed_ticks: i64, slots: &[Slot]) {
    buf.reserve(TIMESTAMP_SIZE + VALUE_SIZE * slots.len());
    buf.put_i64_le(elapsed_ticks);
    for slot in slots {
        slot.put(buf);
    }
}

/// Read the elapsed-time field of a record
///
/// # Panics
///
/// Panics if `record` is shorter than [`TIMESTAMP_SIZE`]
#[must_use]
pub fn decode_elapsed(mut record: &[u8]) -> i64 {
    record.get_i64_le()
}

/// Decode a whole record
///
/// # Panics
///
/// Panics if `record` is shorter than `schema.record_width()`
#[must_use]
pub fn decode_record(mut record: &[u8], schema: &Schema) -> (i64, Vec<Slot>) {
    let elapsed = record.get_i64_le();
    let slots = schema
        .fields()
        .iter()
        .map(|kind| match kind {
            FieldKind::Int => Slot::Int(record.get_i32_le()),
            FieldKind::Float => Slot::Float(record.get_f32_le()),
            FieldKind::String => Slot::Ordinal(record.get_i32_le()),
        })
        .collect();
    (elapsed, slots)
}

/// Convert a duration to elapsed ticks
#[must_use]
pub fn duration_to_ticks(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos() / 100).unwrap_or(i64::MAX)
}

/// Convert elapsed ticks to seconds
#[must_use]
pub fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// Convert a decoded slot into a value, resolving ordinals with `resolve`
pub fn slot_to_value<'a>(slot: Slot, resolve: impl FnOnce(i32) -> &'a str) -> Value {
    match slot {
        Slot::Int(v) => Value::Int(v),
        Slot::Float(v) => Value::Float(v),
        Slot::Ordinal(ordinal) => Value::String(resolve(ordinal).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_width() {
        let schema = Schema::new(vec![FieldKind::Float]).unwrap();
        assert_eq!(schema.record_width(), 12);

        let schema = Schema::new(vec![FieldKind::Int, FieldKind::String, FieldKind::Float]).unwrap();
        assert_eq!(schema.record_width(), 20);
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(matches!(Schema::new(vec![]), Err(TapeError::SchemaEmpty)));
        assert!(matches!(Schema::parse(""), Err(TapeError::SchemaEmpty)));
    }

    #[test]
    fn test_schema_parse_render() {
        let schema = Schema::parse("Int\r\nString\nFloat\n").unwrap();
        assert_eq!(
            schema.fields(),
            &[FieldKind::Int, FieldKind::String, FieldKind::Float]
        );
        assert_eq!(schema.render(), "Int\nString\nFloat\n");
        assert!(schema.has_strings());
    }

    #[test]
    fn test_schema_rejects_unknown_kind() {
        let err = Schema::parse("Int\nBool\n").unwrap_err();
        assert!(matches!(err, TapeError::UnsupportedFieldType(ref name) if name == "Bool"));
    }

    #[test]
    fn test_schema_matches() {
        let schema = Schema::new(vec![FieldKind::Int, FieldKind::String]).unwrap();
        let good = Message::new("/a", vec![Value::Int(1), Value::String("x".into())]);
        let wrong_kind = Message::new("/a", vec![Value::Int(1), Value::Float(2.0)]);
        let wrong_arity = Message::new("/a", vec![Value::Int(1)]);

        assert!(schema.matches(&good));
        assert!(!schema.matches(&wrong_kind));
        assert!(!schema.matches(&wrong_arity));
    }

    #[test]
    fn test_record_layout() {
        let mut buf = BytesMut::new();
        encode_record(
            &mut buf,
            100_000,
            &[Slot::Int(-2), Slot::Float(1.5), Slot::Ordinal(7)],
        );

        assert_eq!(buf.len(), 20);
        assert_eq!(&buf[..8], &100_000i64.to_le_bytes());
        assert_eq!(&buf[8..12], &(-2i32).to_le_bytes());
        assert_eq!(&buf[12..16], &1.5f32.to_le_bytes());
        assert_eq!(&buf[16..20], &7i32.to_le_bytes());

        let schema = Schema::new(vec![FieldKind::Int, FieldKind::Float, FieldKind::String]).unwrap();
        let (elapsed, slots) = decode_record(&buf, &schema);
        assert_eq!(elapsed, 100_000);
        assert_eq!(slots, vec![Slot::Int(-2), Slot::Float(1.5), Slot::Ordinal(7)]);
        assert_eq!(decode_elapsed(&buf), 100_000);
    }

    #[test]
    fn test_tick_conversion() {
        assert_eq!(duration_to_ticks(Duration::from_millis(10)), 100_000);
        assert!((ticks_to_seconds(100_000) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_capture_file_names() {
        assert_eq!(CaptureFile::RecordLog.file_name(), "records.bin");
        assert_eq!(CaptureFile::Index.to_string(), "time index");
    }
}
