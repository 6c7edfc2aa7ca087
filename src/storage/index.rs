//! Coarse time index: cumulative record count per fixed interval

use std::io::Write;
use std::time::Duration;

use bytes::Buf;

use super::format::INDEX_ENTRY_SIZE;
use crate::Result;

/// Append side of the time index
#[derive(Debug)]
pub struct TimeIndexWriter<W: Write> {
    out: W,
    entries: usize,
}

impl<W: Write> TimeIndexWriter<W> {
    /// Wrap `out` and write the leading `0` entry
    ///
    /// # Errors
    ///
    /// Returns error if the sentinel cannot be written
    pub fn new(mut out: W) -> Result<Self> {
        out.write_all(&0u32.to_le_bytes())?;
        Ok(Self { out, entries: 1 })
    }

    /// Append the cumulative record count for the next interval boundary
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    pub fn append(&mut self, record_count: u32) -> Result<()> {
        self.out.write_all(&record_count.to_le_bytes())?;
        self.entries += 1;
        Ok(())
    }

    /// Number of entries written, including the leading `0`
    #[must_use]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Flush buffered entries
    ///
    /// # Errors
    ///
    /// Returns error if the flush fails
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Underlying writer
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

/// Read side of the time index, random access by interval number
#[derive(Debug)]
pub struct TimeIndex<B> {
    bytes: B,
}

impl<B: AsRef<[u8]>> TimeIndex<B> {
    /// Wrap raw index bytes; a trailing partial entry is ignored
    pub fn new(bytes: B) -> Self {
        Self { bytes }
    }

    /// Number of complete entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.as_ref().len() / INDEX_ENTRY_SIZE
    }

    /// Whether the index has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record count at interval boundary `interval`
    #[must_use]
    pub fn entry(&self, interval: usize) -> Option<u32> {
        let start = interval.checked_mul(INDEX_ENTRY_SIZE)?;
        let end = start.checked_add(INDEX_ENTRY_SIZE)?;
        let mut slot = self.bytes.as_ref().get(start..end)?;
        Some(slot.get_u32_le())
    }

    /// Record count at `interval`, clamped to the last entry
    ///
    /// An empty index yields `0`, i.e. the start of the log.
    #[must_use]
    pub fn entry_clamped(&self, interval: usize) -> u32 {
        match self.len().checked_sub(1) {
            Some(last) => self.entry(interval.min(last)).unwrap_or(0),
            None => 0,
        }
    }

    /// Boundary at or before `seconds` and the record count stored for it
    ///
    /// Returns the boundary time in seconds and the count, clamped to the
    /// last entry. A zero `interval` always locates the start of the log.
    #[must_use]
    pub fn locate(&self, seconds: f64, interval: Duration) -> (f64, u32) {
        let interval = interval.as_secs_f64();
        if interval <= 0.0 || !seconds.is_finite() {
            return (0.0, 0);
        }
        let boundary = (seconds.max(0.0) / interval).floor();
        (boundary * interval, self.entry_clamped(boundary as usize))
    }

    /// All entries in order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bytes
            .as_ref()
            .chunks_exact(INDEX_ENTRY_SIZE)
            .map(|mut chunk| chunk.get_u32_le())
    }

    /// Whether entries start at `0`, never decrease and never exceed
    /// `total_records`
    #[must_use]
    pub fn is_consistent(&self, total_records: u64) -> bool {
        let mut previous = 0u32;
        for (i, entry) in self.iter().enumerate() {
            if (i == 0 && entry != 0) || entry < previous || u64::from(entry) > total_records {
                return false;
            }
            previous = entry;
        }
        true
    }
}
