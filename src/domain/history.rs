//! Bounded, append-only audit log of pipeline actions.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{Asset, AssetId};

/// Number of entries retained; older entries are dropped first
pub const HISTORY_CAPACITY: usize = 100;

/// Default number of entries returned by a history read
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// One audited action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,

    pub asset_id: AssetId,

    /// Asset name at the time of the action
    pub asset_name: String,

    pub timestamp: DateTime<Utc>,

    /// Source stage (transitions only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Target stage (transitions only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl HistoryEntry {
    /// Record an action on `asset`
    pub fn new(action: HistoryAction, asset: &Asset) -> Self {
        Self {
            action,
            asset_id: asset.id.clone(),
            asset_name: asset.name.clone(),
            timestamp: Utc::now(),
            from: None,
            to: None,
        }
    }

    /// Attach the stages of a transition
    pub fn with_stages(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self.to = Some(to.into());
        self
    }
}

/// Audited action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Transition,
    Delete,
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryAction::Create => write!(f, "create"),
            HistoryAction::Transition => write!(f, "transition"),
            HistoryAction::Delete => write!(f, "delete"),
        }
    }
}

/// Ring buffer of [`HistoryEntry`] holding at most [`HISTORY_CAPACITY`] items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<HistoryEntry>", into = "Vec<HistoryEntry>")]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Append an entry, evicting the oldest when full
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Up to `limit` entries, most recent first
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// All retained entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
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
}

impl From<Vec<HistoryEntry>> for HistoryLog {
    fn from(entries: Vec<HistoryEntry>) -> Self {
        let mut log = Self::new();
        for entry in entries {
            log.push(entry);
        }
        log
    }
}

impl From<HistoryLog> for Vec<HistoryEntry> {
    fn from(log: HistoryLog) -> Self {
        log.entries.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            action: HistoryAction::Create,
            asset_id: AssetId::from(format!("asset_{}", n)),
            asset_name: format!("Asset {}", n),
            timestamp: Utc::now(),
            from: None,
            to: None,
        }
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut log = HistoryLog::new();
        for i in 0..5 {
            log.push(entry(i));
        }

        let recent = log.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].asset_id.as_str(), "asset_4");
        assert_eq!(recent[2].asset_id.as_str(), "asset_2");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = HistoryLog::new();
        for i in 0..HISTORY_CAPACITY + 20 {
            log.push(entry(i));
        }

        assert_eq!(log.len(), HISTORY_CAPACITY);
        assert_eq!(log.iter().next().unwrap().asset_id.as_str(), "asset_20");
        assert_eq!(
            log.recent(1)[0].asset_id.as_str(),
            format!("asset_{}", HISTORY_CAPACITY + 19)
        );
    }

    #[test]
    fn test_oversized_input_is_truncated() {
        let entries: Vec<_> = (0..HISTORY_CAPACITY + 5).map(entry).collect();
        let json = serde_json::to_string(&entries).unwrap();

        let log: HistoryLog = serde_json::from_str(&json).unwrap();
        assert_eq!(log.len(), HISTORY_CAPACITY);
        assert_eq!(log.iter().next().unwrap().asset_id.as_str(), "asset_5");
    }
}
