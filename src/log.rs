//! Game log
//!
//! The ordered, append-only record of what happened, consumed by whatever
//! presents the game. Entries are never edited or reordered once written.
//! Only the most recent entries are retained; ids keep counting across the
//! ones that age out, so `since` cursors stay valid.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Narrative,
    DiceRoll,
    Combat,
    System,
    Dialogue,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Narrative => "narrative",
            LogKind::DiceRoll => "dice_roll",
            LogKind::Combat => "combat",
            LogKind::System => "system",
            LogKind::Dialogue => "dialogue",
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic within a session, starting at 1
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub content: String,
    /// RFC 3339
    pub timestamp: String,
}

/// Entries kept before the oldest start to age out
pub const DEFAULT_LOG_RETENTION: usize = 1000;

/// Append-only log with monotonic ids
#[derive(Debug, Clone)]
pub struct GameLog {
    entries: Vec<LogEntry>,
    next_id: u64,
    retention: usize,
}

impl Default for GameLog {
    fn default() -> Self {
        Self::with_retention(DEFAULT_LOG_RETENTION)
    }
}

impl GameLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log keeping at most `retention` entries
    pub fn with_retention(retention: usize) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            retention: retention.max(1),
        }
    }

    /// Append an entry and return its id
    pub fn push(&mut self, kind: LogKind, content: impl Into<String>) -> u64 {
        self.next_id += 1;
        let entry = LogEntry {
            id: self.next_id,
            kind,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        debug!(id = entry.id, kind = %entry.kind, "{}", entry.content);
        self.entries.push(entry);
        if self.entries.len() > self.retention {
            let excess = self.entries.len() - self.retention;
            self.entries.drain(..excess);
        }
        self.next_id
    }

    pub fn narrative(&mut self, content: impl Into<String>) -> u64 {
        self.push(LogKind::Narrative, content)
    }

    pub fn dice(&mut self, content: impl Into<String>) -> u64 {
        self.push(LogKind::DiceRoll, content)
    }

    pub fn combat(&mut self, content: impl Into<String>) -> u64 {
        self.push(LogKind::Combat, content)
    }

    pub fn system(&mut self, content: impl Into<String>) -> u64 {
        self.push(LogKind::System, content)
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Retained entries with an id greater than `id`
    pub fn since(&self, id: u64) -> &[LogEntry] {
        let start = self.entries.partition_point(|e| e.id <= id);
        &self.entries[start..]
    }

    pub fn last_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries of one kind
    pub fn count(&self, kind: LogKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}
