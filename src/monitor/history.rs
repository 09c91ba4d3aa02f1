use super::watch::Breach;
use crate::error::WatchError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub price: Decimal,
    pub breach: Breach,
}

/// Newest-first alert log. Prepending past capacity evicts the oldest entry.
#[derive(Debug)]
pub struct AlertHistory {
    records: VecDeque<AlertRecord>,
    capacity: usize,
}

impl Default for AlertHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl AlertHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Stored snapshots are already newest-first; anything past capacity is
    /// the oldest and gets dropped.
    pub fn from_snapshot(snapshot: Vec<AlertRecord>) -> Self {
        let mut history = Self::default();
        history.records.extend(snapshot);
        history.records.truncate(history.capacity);
        history
    }

    pub fn prepend(&mut self, record: AlertRecord) {
        self.records.push_front(record);
        self.records.truncate(self.capacity);
    }

    pub fn delete_at(&mut self, index: usize) -> Result<AlertRecord, WatchError> {
        let len = self.records.len();
        self.records
            .remove(index)
            .ok_or(WatchError::IndexOutOfRange { index, len })
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn recent(&self, n: usize) -> Vec<AlertRecord> {
        self.records.iter().take(n).cloned().collect()
    }

    pub fn list(&self) -> Vec<AlertRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
