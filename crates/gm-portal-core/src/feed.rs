use gm_api_types::{GreetingKey, GreetingRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How `append` treats a record that is already in the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPolicy {
    /// Every event is appended, even if the initial fetch already had it.
    #[default]
    AppendOnly,
    /// Events whose [`GreetingKey`] is already present are dropped.
    Deduplicate,
}

/// Greetings in arrival order: the initial fetch, then events.
#[derive(Debug, Clone, Default)]
pub struct GreetingFeed {
    policy: FeedPolicy,
    records: Vec<GreetingRecord>,
    seen: HashSet<GreetingKey>,
}

impl GreetingFeed {
    pub fn new(policy: FeedPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> FeedPolicy {
        self.policy
    }

    /// Replaces the whole feed with the result of a full fetch. The fetch is
    /// authoritative, so it is never de-duplicated against itself.
    pub fn seed(&mut self, records: Vec<GreetingRecord>) {
        self.seen = match self.policy {
            FeedPolicy::Deduplicate => records.iter().map(GreetingRecord::key).collect(),
            FeedPolicy::AppendOnly => HashSet::new(),
        };
        self.records = records;
    }

    /// Returns `false` when the policy dropped the record.
    pub fn append(&mut self, record: GreetingRecord) -> bool {
        if self.policy == FeedPolicy::Deduplicate && !self.seen.insert(record.key()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[GreetingRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &GreetingRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
