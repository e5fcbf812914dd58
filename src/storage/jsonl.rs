//! A minimal disk-backed bag: one JSON object per line, messages appended
//! in write order, topic metadata in a sibling `.topics.json` file. This is
//! not a faithful re-creation of the real bag format — it exists so
//! `bin/*.rs` have a concrete option besides the in-memory bag for
//! manual/demo use, the same shallow role the teacher's own
//! `chronicle-cli`/`chronicle-etl` binaries play relative to the real
//! storage engine.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::message::{BagMetadata, SerializedMessage, TopicMetadata};
use crate::storage::{BagReader, BagWriter, StorageFilter};
use crate::Result;

#[derive(Serialize, Deserialize)]
struct Record {
    topic_name: String,
    #[serde(with = "base64_bytes")]
    serialized_data: Vec<u8>,
    time_stamp: i64,
}

mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> std::result::Result<S::Ok, S::Error> {
        // No external base64 dependency is pulled in for this demo format;
        // a simple hex encoding keeps the JSON Lines payload printable.
        hex_encode(bytes).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        hex_decode(&s).map_err(serde::de::Error::custom)
    }

    fn hex_encode(bytes: &[u8]) -> String {
        use std::fmt::Write as _;
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(out, "{b:02x}");
        }
        out
    }

    fn hex_decode(s: &str) -> std::result::Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err("odd-length hex payload".to_string());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
            .collect()
    }
}

fn topics_path(bag_path: &Path) -> PathBuf {
    bag_path.with_extension("topics.json")
}

pub struct JsonlReader {
    messages: Vec<SerializedMessage>,
    topics: Vec<TopicMetadata>,
    cursor: usize,
    filter: StorageFilter,
}

impl JsonlReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut messages = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record =
                serde_json::from_str(&line).map_err(|e| Error::Corrupt(format!("bad jsonl record: {e}")))?;
            messages.push(SerializedMessage::new(record.topic_name, record.serialized_data, record.time_stamp));
        }
        messages.sort_by_key(|m| m.time_stamp);

        let topics = match File::open(topics_path(path)) {
            Ok(f) => serde_json::from_reader(BufReader::new(f)).unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        Ok(Self {
            messages,
            topics,
            cursor: 0,
            filter: StorageFilter::default(),
        })
    }

    fn advance_past_filtered(&mut self) {
        while self.cursor < self.messages.len() && !self.filter.allows(&self.messages[self.cursor].topic_name) {
            self.cursor += 1;
        }
    }
}

impl BagReader for JsonlReader {
    fn has_next(&mut self) -> bool {
        self.advance_past_filtered();
        self.cursor < self.messages.len()
    }

    fn read_next(&mut self) -> Result<SerializedMessage> {
        self.advance_past_filtered();
        let message = self
            .messages
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| Error::Corrupt("read_next called past end of bag".to_string()))?;
        self.cursor += 1;
        Ok(message)
    }

    fn seek(&mut self, time_stamp: i64) -> Result<()> {
        self.cursor = self.messages.iter().position(|m| m.time_stamp >= time_stamp).unwrap_or(self.messages.len());
        Ok(())
    }

    fn get_metadata(&self) -> BagMetadata {
        BagMetadata {
            starting_time: self.messages.first().map(|m| m.time_stamp).unwrap_or(0),
            message_count: self.messages.len() as u64,
            topics: self.topics.clone(),
        }
    }

    fn get_all_topics_and_types(&self) -> Vec<TopicMetadata> {
        self.topics.clone()
    }

    fn set_filter(&mut self, filter: StorageFilter) {
        self.filter = filter;
    }
}

struct WriterInner {
    file: BufWriter<File>,
    topics_path: PathBuf,
    topics: Vec<TopicMetadata>,
}

pub struct JsonlWriter {
    inner: Mutex<WriterInner>,
}

impl JsonlWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner: Mutex::new(WriterInner {
                file: BufWriter::new(file),
                topics_path: topics_path(path),
                topics: Vec::new(),
            }),
        })
    }

    fn flush_topics(inner: &mut WriterInner) -> Result<()> {
        let file = File::create(&inner.topics_path)?;
        serde_json::to_writer(file, &inner.topics).map_err(|e| Error::Corrupt(format!("topics write: {e}")))?;
        Ok(())
    }
}

impl BagWriter for JsonlWriter {
    fn create_topic(&self, topic: TopicMetadata) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| Error::Corrupt("jsonl writer lock poisoned".to_string()))?;
        if !inner.topics.iter().any(|t| t.name == topic.name) {
            inner.topics.push(topic);
        }
        Self::flush_topics(&mut inner)
    }

    fn remove_topic(&self, topic_name: &str) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| Error::Corrupt("jsonl writer lock poisoned".to_string()))?;
        inner.topics.retain(|t| t.name != topic_name);
        Self::flush_topics(&mut inner)
    }

    fn write(&self, message: SerializedMessage) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| Error::Corrupt("jsonl writer lock poisoned".to_string()))?;
        if !inner.topics.iter().any(|t| t.name == message.topic_name) {
            return Err(Error::Corrupt("write for topic with no create_topic".to_string()));
        }
        let record = Record {
            topic_name: message.topic_name,
            serialized_data: message.serialized_data.to_vec(),
            time_stamp: message.time_stamp,
        };
        let line = serde_json::to_string(&record).map_err(|e| Error::Corrupt(format!("record write: {e}")))?;
        writeln!(inner.file, "{line}")?;
        Ok(())
    }

    fn take_snapshot(&self) -> Result<bool> {
        let mut inner = self.inner.lock().map_err(|_| Error::Corrupt("jsonl writer lock poisoned".to_string()))?;
        inner.file.flush()?;
        Ok(true)
    }

    fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| Error::Corrupt("jsonl writer lock poisoned".to_string()))?;
        inner.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_messages_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bag.jsonl");
        {
            let writer = JsonlWriter::create(&path).unwrap();
            writer.create_topic(TopicMetadata::new("/a", "std_msgs/String", "cdr")).unwrap();
            writer.write(SerializedMessage::new("/a", vec![1, 2, 3], 10)).unwrap();
            writer.write(SerializedMessage::new("/a", vec![4], 20)).unwrap();
            writer.close().unwrap();
        }
        let mut reader = JsonlReader::open(&path).unwrap();
        assert!(reader.has_next());
        let first = reader.read_next().unwrap();
        assert_eq!(first.time_stamp, 10);
        assert_eq!(&*first.serialized_data, &[1, 2, 3][..]);
        assert_eq!(reader.get_all_topics_and_types().len(), 1);
    }
}
