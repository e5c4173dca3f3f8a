use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Entity key the remote service uses for attached photos and videos.
pub const MEDIA_ENTITY_KEY: &str = "media";

/// A single post as delivered by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub entities: Map<String, Value>,
}

impl RawPost {
    /// Post ids are 64-bit integers carried as strings.
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.parse().ok()
    }

    pub fn has_media(&self) -> bool {
        self.entities.contains_key(MEDIA_ENTITY_KEY)
    }
}

/// Posts in delivery order, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostBatch {
    posts: Vec<RawPost>,
}

impl PostBatch {
    pub fn new(posts: Vec<RawPost>) -> Self {
        Self { posts }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RawPost> {
        self.posts.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.posts.iter().map(|post| post.id.as_str()).collect()
    }

    pub fn into_posts(self) -> Vec<RawPost> {
        self.posts
    }
}

impl From<Vec<RawPost>> for PostBatch {
    fn from(posts: Vec<RawPost>) -> Self {
        Self::new(posts)
    }
}

impl<'a> IntoIterator for &'a PostBatch {
    type Item = &'a RawPost;
    type IntoIter = std::slice::Iter<'a, RawPost>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.iter()
    }
}

/// Position of a set within one day's post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttemptLabel {
    First,
    Second,
    Third,
}

impl AttemptLabel {
    pub const ALL: [AttemptLabel; 3] = [
        AttemptLabel::First,
        AttemptLabel::Second,
        AttemptLabel::Third,
    ];

    pub fn from_position(position: usize) -> Option<Self> {
        Self::ALL.get(position).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptLabel::First => "First",
            AttemptLabel::Second => "Second",
            AttemptLabel::Third => "Third",
        }
    }
}

impl fmt::Display for AttemptLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (date, attempt, value) observation of the long-format table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub date: DateTime<Utc>,
    pub attempt_label: AttemptLabel,
    pub value: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn post(id: &str, entities: Value) -> RawPost {
        RawPost {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            text: "10,12,15".to_string(),
            entities: entities.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_media_detection() {
        assert!(!post("1", json!({})).has_media());
        assert!(!post("1", json!({"hashtags": [], "urls": []})).has_media());
        assert!(post("1", json!({"media": [{"type": "photo"}]})).has_media());
        assert!(post("1", json!({"media": {}})).has_media());
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(
            post("1358913712431673346", json!({})).numeric_id(),
            Some(1358913712431673346)
        );
        assert_eq!(post("abc", json!({})).numeric_id(), None);
    }

    #[test]
    fn test_attempt_label_positions() {
        assert_eq!(AttemptLabel::from_position(0), Some(AttemptLabel::First));
        assert_eq!(AttemptLabel::from_position(2), Some(AttemptLabel::Third));
        assert_eq!(AttemptLabel::from_position(3), None);
        assert_eq!(AttemptLabel::Second.to_string(), "Second");
    }

    #[test]
    fn test_long_record_serialization() {
        let record = LongRecord {
            date: Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap(),
            attempt_label: AttemptLabel::First,
            value: None,
        };

        let serialized = serde_json::to_value(&record).unwrap();
        assert_eq!(serialized["attempt_label"], "First");
        assert_eq!(serialized["value"], Value::Null);
        assert_eq!(serialized["date"], "2021-01-01T12:00:00Z");
    }
}
