//! Turns raw posts into the long-format attempt table.
//!
//! A qualifying post is one without attached media. Its text is read as
//! comma-separated repetition counts, one per attempt. Every qualifying post
//! yields exactly one record per [`AttemptLabel`]; fields that are missing or
//! not numeric become `None` and anything past the third field is ignored.

use crate::types::{AttemptLabel, LongRecord, PostBatch, RawPost};

pub const FIELD_DELIMITER: char = ',';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReshapeStats {
    pub total_posts: usize,
    pub media_posts: usize,
    pub qualifying_posts: usize,
    pub missing_values: usize,
}

pub fn reshape(batch: &PostBatch) -> Vec<LongRecord> {
    reshape_with_stats(batch).0
}

pub fn reshape_with_stats(batch: &PostBatch) -> (Vec<LongRecord>, ReshapeStats) {
    let mut stats = ReshapeStats {
        total_posts: batch.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(batch.len() * AttemptLabel::ALL.len());

    for post in batch.iter().filter(|post| is_plain_text(post)) {
        stats.qualifying_posts += 1;

        let values = split_attempts(&post.text);
        for (label, value) in AttemptLabel::ALL.into_iter().zip(values) {
            if value.is_none() {
                stats.missing_values += 1;
            }
            records.push(LongRecord {
                date: post.created_at,
                attempt_label: label,
                value,
            });
        }
    }
    stats.media_posts = stats.total_posts - stats.qualifying_posts;

    (records, stats)
}

pub fn is_plain_text(post: &RawPost) -> bool {
    !post.has_media()
}

pub fn split_attempts(text: &str) -> [Option<f64>; 3] {
    let mut values = [None; 3];
    for (slot, field) in values.iter_mut().zip(text.split(FIELD_DELIMITER)) {
        *slot = parse_count(field);
    }
    values
}

fn parse_count(field: &str) -> Option<f64> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}
