//! Accumulation of non-fatal content errors.
//!
//! Unsupported geometry, missing images and similar omissions do not abort a
//! run. They are counted here by message and reported once the run is over.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::Serialize;

/// Message → occurrence count.
///
/// Recording never fails. Merging is associative and commutative, so sinks
/// filled by independent workers can be combined in any order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorSink {
    counts: BTreeMap<String, usize>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `message`.
    pub fn record(&mut self, message: impl Into<String>) {
        *self.counts.entry(message.into()).or_insert(0) += 1;
    }

    /// Add every count of `other` into this sink.
    pub fn merge(&mut self, other: ErrorSink) {
        for (message, count) in other.counts {
            *self.counts.entry(message).or_insert(0) += count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of distinct messages.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Total number of recorded occurrences.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Occurrences of one message (0 if never recorded).
    pub fn count(&self, message: &str) -> usize {
        self.counts.get(message).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, usize> {
        self.counts.iter()
    }
}

impl<'a> IntoIterator for &'a ErrorSink {
    type Item = (&'a String, &'a usize);
    type IntoIter = btree_map::Iter<'a, String, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No errors.");
        }
        writeln!(f, "Errors ({}):", self.total())?;
        for (message, count) in &self.counts {
            writeln!(f, "  - {message} (x{count})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_repeats() {
        let mut sink = ErrorSink::new();
        sink.record("Unknown annotation type: ellipse");
        sink.record("Unknown annotation type: ellipse");
        sink.record("Unknown annotation type: cuboid");

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.total(), 3);
        assert_eq!(sink.count("Unknown annotation type: ellipse"), 2);
        assert_eq!(sink.count("never seen"), 0);
    }

    #[test]
    fn merge_is_order_independent() {
        let mut a = ErrorSink::new();
        a.record("x");
        let mut b = ErrorSink::new();
        b.record("x");
        b.record("y");

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);
        assert_eq!(ab, ba);
        assert_eq!(ab.count("x"), 2);
    }

    #[test]
    fn serializes_as_plain_map() {
        let mut sink = ErrorSink::new();
        sink.record("Some images in task 3 were not downloaded.");
        let json = serde_json::to_value(&sink).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Some images in task 3 were not downloaded.": 1})
        );
    }

    #[test]
    fn display_lists_messages() {
        let mut sink = ErrorSink::new();
        assert_eq!(sink.to_string(), "No errors.\n");
        sink.record("boom");
        let shown = sink.to_string();
        assert!(shown.contains("Errors (1):"));
        assert!(shown.contains("boom (x1)"));
    }
}
