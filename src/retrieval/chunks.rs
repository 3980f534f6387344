//! Insertion-ordered chunk set
//!
//! Chunks are deduplicated by exact text. Iteration follows first-insertion
//! order so merges are deterministic.

use serde::{Serialize, Serializer};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkSet {
    chunks: Vec<String>,
    seen: HashSet<String>,
}

impl ChunkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the chunk was not already present
    pub fn insert(&mut self, chunk: impl Into<String>) -> bool {
        let chunk = chunk.into();
        if self.seen.contains(&chunk) {
            return false;
        }
        self.seen.insert(chunk.clone());
        self.chunks.push(chunk);
        true
    }

    /// Merge a batch, returning how many chunks were new
    pub fn extend_unique<I, S>(&mut self, batch: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for chunk in batch {
            if self.insert(chunk) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.chunks
    }

    pub fn into_vec(self) -> Vec<String> {
        self.chunks
    }
}

impl<S: Into<String>> FromIterator<S> for ChunkSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ChunkSet::new();
        set.extend_unique(iter);
        set
    }
}

impl Serialize for ChunkSet {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> std::result::Result<Ser::Ok, Ser::Error> {
        self.chunks.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_insertion_order() {
        let mut set = ChunkSet::new();
        assert_eq!(set.extend_unique(vec!["b", "a", "b"]), 2);
        assert_eq!(set.extend_unique(vec!["c", "a"]), 1);
        assert_eq!(set.as_slice(), &["b".to_string(), "a".to_string(), "c".to_string()]);
        assert!(!set.insert("a"));
    }

    #[test]
    fn test_collect_and_serialize() {
        let set: ChunkSet = vec!["x".to_string(), "x".to_string(), "y".to_string()]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["x","y"]"#);
    }
}
