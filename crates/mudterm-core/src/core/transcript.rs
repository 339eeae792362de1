//! Bounded, ordered message log shown in the terminal pane.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Display category of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    System,
    Private,
    Room,
    Error,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::System => "system",
            Category::Private => "private",
            Category::Room => "room",
            Category::Error => "error",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single immutable line (or block) of transcript output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    timestamp: String,
    text: String,
    category: Category,
}

impl TranscriptEntry {
    fn now(text: String, category: Category) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            text,
            category,
        }
    }

    /// Wall-clock time the entry was appended (`HH:MM:SS`).
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> Category {
        self.category
    }
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.text)
    }
}

/// Append-only log capped at `capacity` entries; oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct Transcript {
    entries: VecDeque<TranscriptEntry>,
    capacity: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Transcript {
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Creates an empty transcript. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, text: impl Into<String>, category: Category) {
        self.entries
            .push_back(TranscriptEntry::now(text.into(), category));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Returns every retained entry, oldest first.
    pub fn read_all(&self) -> impl ExactSizeIterator<Item = &TranscriptEntry> + '_ {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Plain-text rendering (`[HH:MM:SS] text` per entry), used by non-interactive output.
    pub fn format_plain(&self) -> String {
        self.read_all()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
