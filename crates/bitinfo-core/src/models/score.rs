use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of a score: a course can be retaken, so the term is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScoreKey {
    pub course_id: String,
    pub term: String,
}

impl ScoreKey {
    pub fn new(course_id: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            term: term.into(),
        }
    }
}

impl std::fmt::Display for ScoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.course_id, self.term)
    }
}

/// One row of the score listing, before per-course analytics are fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub course_id: String,
    pub term: String,
    pub name: String,
    #[serde(rename = "type")]
    pub course_type: String,
    pub credit: f64,
    pub score: f64,
}

impl ScoreRow {
    pub fn key(&self) -> ScoreKey {
        ScoreKey::new(&self.course_id, &self.term)
    }
}

/// Ranking and distribution figures from the per-course detail page.
/// Ranks are fractions (0.12 means top 12%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetail {
    pub class_rank: f64,
    pub class_total: u32,
    pub majority_rank: f64,
    pub majority_total: u32,
    pub all_rank: f64,
    pub average: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub course_id: String,
    pub term: String,
    pub name: String,
    #[serde(rename = "type")]
    pub course_type: String,
    pub credit: f64,
    pub score: f64,
    pub class_rank: f64,
    pub class_total: u32,
    pub majority_rank: f64,
    pub majority_total: u32,
    pub all_rank: f64,
    pub average: f64,
    pub max: f64,
}

impl ScoreRecord {
    pub fn merge(row: ScoreRow, detail: ScoreDetail) -> Self {
        Self {
            course_id: row.course_id,
            term: row.term,
            name: row.name,
            course_type: row.course_type,
            credit: row.credit,
            score: row.score,
            class_rank: detail.class_rank,
            class_total: detail.class_total,
            majority_rank: detail.majority_rank,
            majority_total: detail.majority_total,
            all_rank: detail.all_rank,
            average: detail.average,
            max: detail.max,
        }
    }

    pub fn key(&self) -> ScoreKey {
        ScoreKey::new(&self.course_id, &self.term)
    }

    /// Percent display for a rank fraction
    pub fn percent(rank: f64) -> String {
        format!("{}%", (rank * 100.0).round() as i64)
    }
}

/// Records added or refreshed by one sync call
pub type ScoreDelta = BTreeMap<ScoreKey, ScoreRecord>;

/// Every score seen so far, keyed by (course, term).
/// Persisted as a plain record list since JSON map keys must be strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ScoreRecord>", into = "Vec<ScoreRecord>")]
pub struct ScoreCache {
    records: BTreeMap<ScoreKey, ScoreRecord>,
}

impl ScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &ScoreKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn get(&self, key: &ScoreKey) -> Option<&ScoreRecord> {
        self.records.get(key)
    }

    pub fn insert(&mut self, record: ScoreRecord) {
        self.records.insert(record.key(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreRecord> {
        self.records.values()
    }
}

impl From<Vec<ScoreRecord>> for ScoreCache {
    fn from(records: Vec<ScoreRecord>) -> Self {
        let mut cache = Self::new();
        for record in records {
            cache.insert(record);
        }
        cache
    }
}

impl From<ScoreCache> for Vec<ScoreRecord> {
    fn from(cache: ScoreCache) -> Self {
        cache.records.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(course_id: &str, term: &str, score: f64) -> ScoreRecord {
        ScoreRecord {
            course_id: course_id.into(),
            term: term.into(),
            name: "Data Structures".into(),
            course_type: "Required".into(),
            credit: 3.0,
            score,
            class_rank: 0.1,
            class_total: 30,
            majority_rank: 0.2,
            majority_total: 120,
            all_rank: 0.25,
            average: 78.5,
            max: 99.0,
        }
    }

    #[test]
    fn test_key_display() {
        assert_eq!(ScoreKey::new("CS101", "2021-2022-1").to_string(), "CS101-2021-2022-1");
    }

    #[test]
    fn test_same_course_different_terms_are_distinct() {
        let mut cache = ScoreCache::new();
        cache.insert(record("CS101", "2020-2021-2", 59.0));
        cache.insert(record("CS101", "2021-2022-1", 88.0));
        cache.insert(record("CS101", "2021-2022-1", 90.0));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&ScoreKey::new("CS101", "2021-2022-1")).unwrap().score, 90.0);
    }

    #[test]
    fn test_cache_serializes_as_list() {
        let mut cache = ScoreCache::new();
        cache.insert(record("CS101", "2021-2022-1", 88.0));
        let json = serde_json::to_value(&cache).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["type"], "Required");

        let back: ScoreCache = serde_json::from_value(json).unwrap();
        assert_eq!(back, cache);
    }

    #[test]
    fn test_percent() {
        assert_eq!(ScoreRecord::percent(0.12), "12%");
        assert_eq!(ScoreRecord::percent(1.0), "100%");
    }
}
