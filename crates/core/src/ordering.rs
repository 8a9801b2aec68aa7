use std::cmp::Ordering;

use crate::error::CoreError;
use crate::variation::Record;

/// Total order over baseline records.
pub type BaselineOrder = fn(&Record, &Record) -> Ordering;

/// Sort key ascending, ties broken by identity.
pub fn by_sort_key_then_id(a: &Record, b: &Record) -> Ordering {
    a.sort_key.cmp(&b.sort_key).then_with(|| a.id.cmp(&b.id))
}

/// Hands out sort keys for new records, strictly decreasing from just below
/// the smallest key in the baseline.
#[derive(Debug, Clone)]
pub struct SortOrderAssigner {
    /// `None` once the key space below the baseline is used up.
    next: Option<i64>,
}

impl SortOrderAssigner {
    /// `sorted_baseline` must already be in ascending key order; its first
    /// element carries the minimum.
    pub fn new(sorted_baseline: &[Record], default_key: i64) -> Self {
        let next = match sorted_baseline.first() {
            Some(first) => first.sort_key.checked_sub(1),
            None => Some(default_key),
        };
        Self { next }
    }

    pub fn next_key(&mut self) -> Result<i64, CoreError> {
        let key = self.next.ok_or(CoreError::SortKeysExhausted)?;
        self.next = key.checked_sub(1);
        Ok(key)
    }
}
