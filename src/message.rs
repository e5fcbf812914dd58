use std::sync::Arc;

/// A serialized middleware message read from, or about to be written to, a
/// bag. Immutable after creation; shared by reference between the producer
/// and consumer halves of the playback pipeline.
#[derive(Debug, Clone)]
pub struct SerializedMessage {
    pub topic_name: String,
    pub serialized_data: Arc<[u8]>,
    /// Nanoseconds since epoch.
    pub time_stamp: i64,
}

impl SerializedMessage {
    pub fn new(topic_name: impl Into<String>, serialized_data: impl Into<Arc<[u8]>>, time_stamp: i64) -> Self {
        Self {
            topic_name: topic_name.into(),
            serialized_data: serialized_data.into(),
            time_stamp,
        }
    }
}

/// Metadata describing one topic recorded in, or about to be written to, a
/// bag. Keyed by `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub name: String,
    /// Fully-qualified message type identifier.
    pub type_name: String,
    pub serialization_format: String,
    /// YAML-encoded list of QoS profiles this topic was recorded under.
    pub offered_qos_profiles: String,
}

impl TopicMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, serialization_format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            serialization_format: serialization_format.into(),
            offered_qos_profiles: String::new(),
        }
    }
}

/// Bag-level metadata exposed by a `BagReader`.
#[derive(Debug, Clone)]
pub struct BagMetadata {
    pub starting_time: i64,
    pub message_count: u64,
    pub topics: Vec<TopicMetadata>,
}
