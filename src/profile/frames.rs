//! Frame identity table.
//!
//! Exporters that refer to frames by index build one of these per export.
//! Ids are assigned in the order frame names are first encountered while
//! scanning the samples, so two exports of the same profile always agree.

use super::Sample;
use std::collections::HashMap;

/// Bijection between frame names and dense integer ids.
#[derive(Debug, Clone, Default)]
pub struct FrameTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl FrameTable {
    /// Build a table from samples in one linear scan.
    ///
    /// Id 0 is the first frame of the first sample.
    pub fn build(samples: &[Sample]) -> Self {
        let mut table = FrameTable::default();
        for sample in samples {
            for frame in &sample.frames {
                table.intern(frame);
            }
        }
        table
    }

    fn intern(&mut self, name: &str) {
        if !self.index.contains_key(name) {
            self.index.insert(name.to_string(), self.names.len());
            self.names.push(name.to_string());
        }
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Frame names in id order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frames: &[&str], count: u64) -> Sample {
        Sample::new(frames.iter().map(|f| f.to_string()).collect(), count)
    }

    #[test]
    fn test_ids_follow_first_seen_order() {
        let samples = vec![sample(&["main", "a", "b"], 1), sample(&["main", "a", "c"], 2)];
        let table = FrameTable::build(&samples);

        assert_eq!(table.names(), &["main", "a", "b", "c"]);
        assert_eq!(table.id_of("main"), Some(0));
        assert_eq!(table.id_of("c"), Some(3));
        assert_eq!(table.id_of("missing"), None);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let samples = vec![sample(&["x", "y"], 1), sample(&["x", "z"], 1)];
        let first = FrameTable::build(&samples);
        let second = FrameTable::build(&samples);
        assert_eq!(first.names(), second.names());
    }

    #[test]
    fn test_empty_samples() {
        let table = FrameTable::build(&[]);
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }
}
