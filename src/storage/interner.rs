//! String interning for string-kind fields

use std::collections::HashMap;

use crate::Result;

/// Append-only bijection between strings and ordinals, used while recording
#[derive(Debug, Default)]
pub struct StringInterner {
    ordinals: HashMap<String, i32>,
    strings: Vec<String>,
}

impl StringInterner {
    /// Create an empty interner
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordinal for `value`, appending it on first sight
    ///
    /// Returns the ordinal and whether the value was newly appended.
    pub fn intern(&mut self, value: &str) -> (i32, bool) {
        if let Some(&ordinal) = self.ordinals.get(value) {
            return (ordinal, false);
        }

        let ordinal = self.strings.len() as i32;
        self.strings.push(value.to_string());
        self.ordinals.insert(value.to_string(), ordinal);
        (ordinal, true)
    }

    /// Ordinal for `value`, calling `persist` before a new value is appended
    ///
    /// The interner is left untouched if `persist` fails, so ordinals never
    /// run ahead of what was stored.
    ///
    /// # Errors
    ///
    /// Returns the error of `persist`
    pub fn intern_with(
        &mut self,
        value: &str,
        persist: impl FnOnce(&str) -> Result<()>,
    ) -> Result<i32> {
        if let Some(&ordinal) = self.ordinals.get(value) {
            return Ok(ordinal);
        }

        persist(value)?;
        Ok(self.intern(value).0)
    }

    /// Interned strings in first-seen order
    #[must_use]
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Number of distinct strings
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether nothing has been interned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Forget every string
    pub fn clear(&mut self) {
        self.ordinals.clear();
        self.strings.clear();
    }
}

/// Read-only string table loaded for playback
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<String>,
}

impl StringTable {
    /// Parse string table file contents, one string per line
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self {
            strings: text
                .lines()
                .map(|line| line.trim_end_matches('\r').to_string())
                .collect(),
        }
    }

    /// String for `ordinal`, clamped into the table
    ///
    /// Ordinals below zero resolve to the first entry and ordinals past the
    /// end resolve to the last one, so a truncated or hand-edited string file
    /// degrades playback instead of aborting it. An empty table resolves
    /// everything to `""`.
    #[must_use]
    pub fn resolve(&self, ordinal: i32) -> &str {
        let Some(last) = self.strings.len().checked_sub(1) else {
            return "";
        };
        let index = usize::try_from(ordinal).unwrap_or(0).min(last);
        &self.strings[index]
    }

    /// Strings in ordinal order
    #[must_use]
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Number of strings
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
