//! Capture directory storage: record log, schema, string table and time index

mod format;
mod index;
mod interner;
mod reader;
mod writer;

pub use format::{
    decode_elapsed, decode_record, duration_to_ticks, encode_record, slot_to_value,
    ticks_to_seconds, CaptureFile, FieldKind, Schema, Slot, DEFAULT_INDEX_INTERVAL,
    INDEX_ENTRY_SIZE, TICKS_PER_SECOND, TIMESTAMP_SIZE, VALUE_SIZE,
};
pub use index::{TimeIndex, TimeIndexWriter};
pub use interner::{StringInterner, StringTable};
pub use reader::CaptureReader;
pub use writer::CaptureWriter;
