//! An in-memory `BagReader`/`BagWriter`, grounded in the teacher's layered
//! reader/writer split (`core/reader.rs`, `core/segment_writer.rs`) but
//! reduced to a plain `Vec` since the on-disk segment format itself is not
//! reproduced here. Used by this crate's own unit and integration tests
//! to exercise the three engines without a real bag file.

use std::sync::Mutex;

use crate::error::Error;
use crate::message::{BagMetadata, SerializedMessage, TopicMetadata};
use crate::storage::{BagReader, BagWriter, StorageFilter};
use crate::Result;

/// A bag held entirely in memory, pre-sorted by `time_stamp` the way a
/// real bag file already is on disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryBag {
    pub topics: Vec<TopicMetadata>,
    pub messages: Vec<SerializedMessage>,
}

impl MemoryBag {
    pub fn new(topics: Vec<TopicMetadata>, mut messages: Vec<SerializedMessage>) -> Self {
        messages.sort_by_key(|m| m.time_stamp);
        Self { topics, messages }
    }

    pub fn starting_time(&self) -> i64 {
        self.messages.first().map(|m| m.time_stamp).unwrap_or(0)
    }
}

pub struct MemoryReader {
    bag: MemoryBag,
    cursor: usize,
    filter: StorageFilter,
}

impl MemoryReader {
    pub fn new(bag: MemoryBag) -> Self {
        Self {
            bag,
            cursor: 0,
            filter: StorageFilter::default(),
        }
    }

    fn advance_past_filtered(&mut self) {
        while self.cursor < self.bag.messages.len()
            && !self.filter.allows(&self.bag.messages[self.cursor].topic_name)
        {
            self.cursor += 1;
        }
    }
}

impl BagReader for MemoryReader {
    fn has_next(&mut self) -> bool {
        self.advance_past_filtered();
        self.cursor < self.bag.messages.len()
    }

    fn read_next(&mut self) -> Result<SerializedMessage> {
        self.advance_past_filtered();
        let message = self
            .bag
            .messages
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| Error::Corrupt("read_next called past end of bag".to_string()))?;
        self.cursor += 1;
        Ok(message)
    }

    fn seek(&mut self, time_stamp: i64) -> Result<()> {
        self.cursor = self
            .bag
            .messages
            .iter()
            .position(|m| m.time_stamp >= time_stamp)
            .unwrap_or(self.bag.messages.len());
        Ok(())
    }

    fn get_metadata(&self) -> BagMetadata {
        BagMetadata {
            starting_time: self.bag.starting_time(),
            message_count: self.bag.messages.len() as u64,
            topics: self.bag.topics.clone(),
        }
    }

    fn get_all_topics_and_types(&self) -> Vec<TopicMetadata> {
        self.bag.topics.clone()
    }

    fn set_filter(&mut self, filter: StorageFilter) {
        self.filter = filter;
    }
}

#[derive(Default)]
struct WriterState {
    topics: Vec<TopicMetadata>,
    messages: Vec<SerializedMessage>,
    snapshots_taken: u32,
    closed: bool,
}

/// Thread-safe in-memory writer; the Recorder calls `write` concurrently
/// from many subscription-callback threads.
pub struct MemoryWriter {
    state: Mutex<WriterState>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WriterState::default()),
        }
    }

    pub fn into_bag(self) -> MemoryBag {
        let state = self.state.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        MemoryBag::new(state.topics, state.messages)
    }

    pub fn snapshot(&self) -> MemoryBag {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        MemoryBag::new(state.topics.clone(), state.messages.clone())
    }
}

impl Default for MemoryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BagWriter for MemoryWriter {
    fn create_topic(&self, topic: TopicMetadata) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Corrupt("memory writer lock poisoned".to_string()))?;
        if !state.topics.iter().any(|t| t.name == topic.name) {
            state.topics.push(topic);
        }
        Ok(())
    }

    fn remove_topic(&self, topic_name: &str) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Corrupt("memory writer lock poisoned".to_string()))?;
        state.topics.retain(|t| t.name != topic_name);
        Ok(())
    }

    fn write(&self, message: SerializedMessage) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Corrupt("memory writer lock poisoned".to_string()))?;
        if !state.topics.iter().any(|t| t.name == message.topic_name) {
            return Err(Error::Corrupt("write for topic with no create_topic".to_string()));
        }
        state.messages.push(message);
        Ok(())
    }

    fn take_snapshot(&self) -> Result<bool> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Corrupt("memory writer lock poisoned".to_string()))?;
        state.snapshots_taken += 1;
        Ok(true)
    }

    fn close(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Corrupt("memory writer lock poisoned".to_string()))?;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(topic: &str, t: i64) -> SerializedMessage {
        SerializedMessage::new(topic, Vec::<u8>::new(), t)
    }

    #[test]
    fn reader_yields_messages_in_time_order() {
        let bag = MemoryBag::new(
            vec![TopicMetadata::new("/a", "std_msgs/String", "cdr")],
            vec![msg("/a", 30), msg("/a", 10), msg("/a", 20)],
        );
        let mut reader = MemoryReader::new(bag);
        let mut seen = Vec::new();
        while reader.has_next() {
            seen.push(reader.read_next().unwrap().time_stamp);
        }
        assert_eq!(seen, vec![10, 20, 30]);
    }

    #[test]
    fn seek_clamps_to_first_match() {
        let bag = MemoryBag::new(vec![], vec![msg("/a", 10), msg("/a", 20), msg("/a", 30)]);
        let mut reader = MemoryReader::new(bag);
        reader.seek(15).unwrap();
        assert_eq!(reader.read_next().unwrap().time_stamp, 20);
    }

    #[test]
    fn filter_skips_other_topics() {
        let bag = MemoryBag::new(vec![], vec![msg("/a", 10), msg("/b", 20), msg("/a", 30)]);
        let mut reader = MemoryReader::new(bag);
        reader.set_filter(StorageFilter { topics: vec!["/a".to_string()] });
        let mut seen = Vec::new();
        while reader.has_next() {
            seen.push(reader.read_next().unwrap().topic_name);
        }
        assert_eq!(seen, vec!["/a", "/a"]);
    }

    #[test]
    fn write_without_create_topic_fails() {
        let writer = MemoryWriter::new();
        assert!(writer.write(msg("/a", 10)).is_err());
        writer.create_topic(TopicMetadata::new("/a", "std_msgs/String", "cdr")).unwrap();
        assert!(writer.write(msg("/a", 10)).is_ok());
    }
}
