use std::collections::BTreeMap;

use serde::Serialize;

/// Unordered pair of chat participants. `(a, b)` and `(b, a)` are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantPair {
    first: String,
    second: String,
}

impl ParticipantPair {
    pub fn new(a: &str, b: &str) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn contains(&self, id: &str) -> bool {
        self.first == id || self.second == id
    }
}

/// Unread message count per participant; absent participants read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnreadCounts(BTreeMap<String, u32>);

impl UnreadCounts {
    pub fn get(&self, participant: &str) -> u32 {
        self.0.get(participant).copied().unwrap_or(0)
    }

    pub fn set(&mut self, participant: &str, count: u32) {
        self.0.insert(participant.to_string(), count);
    }
}
