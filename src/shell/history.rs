//! Bounded query history for one shell session.

use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::router::IntentKind;

/// One query the user entered.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub query: String,
    pub kind: IntentKind,
    pub timestamp: DateTime<Local>,
}

/// Most recent queries, oldest first. The oldest entry is evicted once
/// `capacity` is reached.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, query: &str, kind: IntentKind) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            query: query.to_string(),
            kind,
            timestamp: Local::now(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
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

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Numbered listing for the `history` command.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "No queries yet.".to_string();
        }
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                format!(
                    "{:>3}. [{}] {} ({})",
                    i + 1,
                    entry.timestamp.format("%H:%M:%S"),
                    entry.query,
                    entry.kind.label()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
