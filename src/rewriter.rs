//! A k-way timestamp merge across bag readers fanning out to multiple
//! writers, generalized from a single winning source to a full message
//! fan-out across every writer.

use crate::error::Error;
use crate::message::SerializedMessage;
use crate::storage::{BagReader, BagWriter};
use crate::Result;

pub struct Rewriter {
    readers: Vec<Box<dyn BagReader>>,
    writers: Vec<Box<dyn BagWriter>>,
}

impl Rewriter {
    pub fn new(readers: Vec<Box<dyn BagReader>>, writers: Vec<Box<dyn BagWriter>>) -> Result<Self> {
        if readers.is_empty() {
            return Err(Error::Configuration("rewrite requires at least one input bag"));
        }
        if writers.is_empty() {
            return Err(Error::Configuration("rewrite requires at least one output bag"));
        }
        Ok(Self { readers, writers })
    }

    /// Runs the k-way merge to completion, emitting every message to every
    /// writer in strict non-decreasing timestamp order. Ties break by
    /// smallest reader index.
    pub fn run(&mut self) -> Result<u64> {
        for writer in &self.writers {
            let mut seen_topics = Vec::new();
            for reader in &self.readers {
                for topic in reader.get_all_topics_and_types() {
                    if !seen_topics.contains(&topic.name) {
                        writer.create_topic(topic.clone())?;
                        seen_topics.push(topic.name);
                    }
                }
            }
        }

        let mut head: Vec<Option<SerializedMessage>> = (0..self.readers.len()).map(|_| None).collect();
        let mut emitted = 0u64;

        loop {
            for (i, reader) in self.readers.iter_mut().enumerate() {
                if head[i].is_none() && reader.has_next() {
                    head[i] = Some(reader.read_next()?);
                }
            }

            let next_index = head
                .iter()
                .enumerate()
                .filter_map(|(i, m)| m.as_ref().map(|m| (i, m.time_stamp)))
                .min_by_key(|&(i, ts)| (ts, i))
                .map(|(i, _)| i);

            let Some(i) = next_index else {
                break;
            };

            let message = head[i].take().expect("slot selected as minimum must be occupied");
            for writer in &self.writers {
                writer.write(message.clone())?;
            }
            emitted += 1;
        }

        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryBag, MemoryReader, MemoryWriter};
    use crate::message::TopicMetadata;

    fn msg(topic: &str, t: i64) -> SerializedMessage {
        SerializedMessage::new(topic, Vec::<u8>::new(), t)
    }

    #[test]
    fn merges_two_readers_in_timestamp_order() {
        let a = MemoryBag::new(
            vec![TopicMetadata::new("/x", "t", "cdr")],
            vec![msg("/x", 10), msg("/x", 30)],
        );
        let b = MemoryBag::new(
            vec![TopicMetadata::new("/y", "t", "cdr")],
            vec![msg("/y", 20), msg("/y", 40)],
        );
        let readers: Vec<Box<dyn BagReader>> = vec![Box::new(MemoryReader::new(a)), Box::new(MemoryReader::new(b))];
        let writer = std::sync::Arc::new(MemoryWriter::new());
        let writers: Vec<Box<dyn BagWriter>> = vec![Box::new(SharedWriter(std::sync::Arc::clone(&writer)))];

        let mut rewriter = Rewriter::new(readers, writers).unwrap();
        let count = rewriter.run().unwrap();
        assert_eq!(count, 4);

        let bag = std::sync::Arc::try_unwrap(writer).unwrap().into_bag();
        let timestamps: Vec<i64> = bag.messages.iter().map(|m| m.time_stamp).collect();
        assert_eq!(timestamps, vec![10, 20, 30, 40]);
    }

    #[test]
    fn empty_readers_or_writers_is_rejected() {
        let writer: Box<dyn BagWriter> = Box::new(MemoryWriter::new());
        assert!(Rewriter::new(Vec::new(), vec![writer]).is_err());

        let bag = MemoryBag::new(vec![], vec![msg("/x", 1)]);
        let reader: Box<dyn BagReader> = Box::new(MemoryReader::new(bag));
        assert!(Rewriter::new(vec![reader], Vec::new()).is_err());
    }

    /// Thin `BagWriter` over a shared `Arc<MemoryWriter>`, letting a test
    /// inspect the writer after the `Rewriter` (which owns it as a
    /// `Box<dyn BagWriter>`) is done with it.
    struct SharedWriter(std::sync::Arc<MemoryWriter>);

    impl BagWriter for SharedWriter {
        fn create_topic(&self, topic: TopicMetadata) -> Result<()> {
            self.0.create_topic(topic)
        }
        fn remove_topic(&self, topic_name: &str) -> Result<()> {
            self.0.remove_topic(topic_name)
        }
        fn write(&self, message: SerializedMessage) -> Result<()> {
            self.0.write(message)
        }
        fn take_snapshot(&self) -> Result<bool> {
            self.0.take_snapshot()
        }
        fn close(&self) -> Result<()> {
            self.0.close()
        }
    }
}
