use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ClassPeriodTable, ScoreCache};

/// Everything a bound identity carries between operations.
///
/// The cookie blobs are opaque: only the transport that exported them can
/// read them back. The password is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub username: String,
    #[serde(default)]
    pub identity_cookies: String,
    #[serde(default)]
    pub tunnel_cookies: String,
    #[serde(default)]
    pub identity_valid: bool,
    #[serde(default)]
    pub tunnel_valid: bool,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub cached_term: Option<String>,
    #[serde(default)]
    pub scores: ScoreCache,
    #[serde(default)]
    pub class_period_table: Option<ClassPeriodTable>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Empty state for a freshly bound identity
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn to_blob(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).context("Failed to serialize session state")
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        serde_json::from_slice(blob).context("Failed to parse session state")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreRecord;

    #[test]
    fn test_blob_round_trip_keeps_cache() {
        let mut state = SessionState::new("1120210001");
        state.identity_valid = true;
        state.cached_term = Some("2021-2022-1".into());
        state.scores.insert(ScoreRecord {
            course_id: "CS101".into(),
            term: "2021-2022-1".into(),
            name: "Data Structures".into(),
            course_type: "Required".into(),
            credit: 3.5,
            score: 88.0,
            class_rank: 0.12,
            class_total: 32,
            majority_rank: 0.2,
            majority_total: 128,
            all_rank: 0.25,
            average: 78.6,
            max: 98.0,
        });

        let restored = SessionState::from_blob(&state.to_blob().unwrap()).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_older_blobs_fill_defaults() {
        let state = SessionState::from_blob(br#"{"username":"1120210001"}"#).unwrap();
        assert_eq!(state.username, "1120210001");
        assert!(!state.identity_valid);
        assert!(state.scores.is_empty());
    }
}
