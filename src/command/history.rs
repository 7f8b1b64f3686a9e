//! Bounded history of recent raw fragments
//!
//! The recognizer may split a single spoken command across fragment
//! boundaries ("go" ... "to patient information"). The history buffer keeps
//! the last few raw fragments and rejoins them in combinations so the
//! matcher gets a chance at the reassembled command. Never persisted.

use std::collections::VecDeque;

use crate::command::{CommandMatch, CommandMatcher};
use crate::text::normalize;

/// FIFO buffer of the most recent raw fragments.
pub struct HistoryBuffer {
    fragments: VecDeque<String>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create a buffer holding at most `capacity` fragments.
    pub fn new(capacity: usize) -> Self {
        Self {
            fragments: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a raw fragment, evicting the oldest once full.
    pub fn push(&mut self, fragment: &str) {
        self.fragments.push_back(fragment.to_string());
        if self.fragments.len() > self.capacity {
            self.fragments.pop_front();
        }
    }

    /// Drop all retained fragments.
    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    /// Number of fragments currently retained.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Candidate strings for command recovery, in matching order:
    /// each individual fragment, then each adjacent pair joined with a
    /// single space, then the full buffer joined with single spaces.
    pub fn candidate_strings(&self) -> Vec<String> {
        let mut candidates: Vec<String> = self.fragments.iter().cloned().collect();

        for (first, second) in self.fragments.iter().zip(self.fragments.iter().skip(1)) {
            candidates.push(format!("{first} {second}"));
        }

        if self.fragments.len() > 1 {
            let all: Vec<&str> = self.fragments.iter().map(String::as_str).collect();
            candidates.push(all.join(" "));
        }

        candidates
    }

    /// Run the matcher over every candidate string, first match wins.
    pub fn find_command(&self, matcher: &CommandMatcher) -> Option<CommandMatch> {
        self.candidate_strings()
            .iter()
            .find_map(|candidate| matcher.find_match(&normalize(candidate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_order() {
        let mut buffer = HistoryBuffer::new(3);
        for fragment in ["one", "two", "three", "four"] {
            buffer.push(fragment);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.candidate_strings()[0], "two");
    }

    #[test]
    fn test_candidate_ordering() {
        let mut buffer = HistoryBuffer::new(3);
        buffer.push("a");
        buffer.push("b");
        buffer.push("c");
        assert_eq!(
            buffer.candidate_strings(),
            vec!["a", "b", "c", "a b", "b c", "a b c"]
        );
    }

    #[test]
    fn test_single_fragment_has_no_joins() {
        let mut buffer = HistoryBuffer::new(3);
        buffer.push("only");
        assert_eq!(buffer.candidate_strings(), vec!["only"]);
    }

    #[test]
    fn test_recovers_split_command() {
        let matcher = CommandMatcher::new();
        let mut buffer = HistoryBuffer::new(3);
        buffer.push("go");
        assert!(buffer.find_command(&matcher).is_none());

        buffer.push("to patient information");
        let m = buffer.find_command(&matcher).unwrap();
        assert_eq!(m.target, "patient information");
    }

    #[test]
    fn test_pair_candidate_tried_before_full_join() {
        let matcher = CommandMatcher::new();
        let mut buffer = HistoryBuffer::new(3);
        buffer.push("go");
        buffer.push("to");
        buffer.push("impression");
        // The adjacent pair "go to" matches the generic "go" grammar with
        // target "to" before the full join "go to impression" is tried.
        let m = buffer.find_command(&matcher).unwrap();
        assert_eq!(m.grammar, "go");
        assert_eq!(m.target, "to");
    }

    #[test]
    fn test_candidates_normalized_before_matching() {
        let matcher = CommandMatcher::new();
        let mut buffer = HistoryBuffer::new(3);
        buffer.push("Go");
        buffer.push("To, Fetal Pole!");
        let m = buffer.find_command(&matcher).unwrap();
        assert_eq!(m.target, "fetal pole");
    }

    #[test]
    fn test_clear() {
        let mut buffer = HistoryBuffer::new(3);
        buffer.push("go");
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
