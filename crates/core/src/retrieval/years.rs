//! Per-pipeline memo of looked-up release years.

use std::collections::HashMap;

use crate::media::normalize_subject_key;

/// Release years keyed by normalized title. Misses are cached too, so a
/// title the media service cannot date is only looked up once.
#[derive(Debug, Default, Clone)]
pub struct YearCache {
    years: HashMap<String, Option<i32>>,
}

impl YearCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(year_or_miss)` when the title has been looked up before.
    pub fn get(&self, title: &str) -> Option<Option<i32>> {
        self.years.get(&normalize_subject_key(title)).copied()
    }

    pub fn insert(&mut self, title: &str, year: Option<i32>) {
        self.years.insert(normalize_subject_key(title), year);
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}
