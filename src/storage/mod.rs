//! External storage collaborators. The on-disk bag file format itself is
//! out of scope — these traits pin down only the interface contract the
//! three engines are written against, so they can be driven
//! deterministically in tests without a real storage engine present.
//!
//! Two concrete implementations are provided: [`memory`] (an in-process
//! `Vec`-backed bag used by this crate's own tests) and [`jsonl`] (a
//! minimal disk-backed JSON Lines bag the `bin/*.rs` binaries use).

pub mod jsonl;
pub mod memory;

use crate::message::{BagMetadata, SerializedMessage, TopicMetadata};
use crate::Result;

/// A filter narrowing a `BagReader` to a subset of topics.
#[derive(Debug, Clone, Default)]
pub struct StorageFilter {
    pub topics: Vec<String>,
}

impl StorageFilter {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn allows(&self, topic_name: &str) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| t == topic_name)
    }
}

/// Ordered cursor over a bag. Calls are not required to be thread-safe;
/// callers serialize access (the Player does so under its `reader_mutex`).
pub trait BagReader: Send {
    fn has_next(&mut self) -> bool;
    fn read_next(&mut self) -> Result<SerializedMessage>;
    fn seek(&mut self, time_stamp: i64) -> Result<()>;
    fn get_metadata(&self) -> BagMetadata;
    fn get_all_topics_and_types(&self) -> Vec<TopicMetadata>;
    fn set_filter(&mut self, filter: StorageFilter);
}

/// Bag writer. Must be internally thread-safe for concurrent `write`
/// calls — the Recorder invokes it from many subscription-callback
/// threads at once.
pub trait BagWriter: Send + Sync {
    fn create_topic(&self, topic: TopicMetadata) -> Result<()>;
    fn remove_topic(&self, topic_name: &str) -> Result<()>;
    fn write(&self, message: SerializedMessage) -> Result<()>;
    /// Snapshot-mode write: flush the in-memory buffered window out to
    /// storage as of the call, without closing the bag.
    fn take_snapshot(&self) -> Result<bool>;
    fn close(&self) -> Result<()>;
}
