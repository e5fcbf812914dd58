//! Configuration bundles. Loading these from a config file or CLI surface
//! is out of scope; these are plain structs with builder-style setters,
//! mirroring the `ReplayPipeline` fluent builder the playback engine is
//! grounded on.

use std::collections::HashMap;
use std::time::Duration;

use crate::qos::QosProfile;

/// Opaque bundle forwarded to the `BagReader`/`BagWriter::open` contract.
/// The storage engine itself is out of scope; this subsystem only threads
/// the bundle through.
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    pub uri: String,
    pub storage_id: String,
}

/// Keyboard and topic-remapping config for the interactive CLI surface.
/// This crate's `Player` never reads a keyboard itself (see the module
/// header), so these fields are carried as inert passthrough config for
/// whatever front end wires the keys up, exactly as `topics_to_filter`
/// etc. are plain data threaded through without the engine interpreting
/// them.
#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub rate: f64,
    pub delay: Duration,
    /// `delay` was supplied as negative and is therefore disabled.
    pub delay_disabled: bool,
    pub loop_playback: bool,
    pub read_ahead_queue_size: usize,
    pub topics_to_filter: Vec<String>,
    pub topic_qos_profile_overrides: HashMap<String, QosProfile>,
    pub clock_publish_frequency_hz: f64,
    pub disable_keyboard_controls: bool,
    /// (from, to) topic name pairs applied before subscribing.
    pub topic_remapping_options: Vec<(String, String)>,
    pub pause_resume_toggle_key: char,
    pub play_next_key: char,
    pub increase_rate_key: char,
    pub decrease_rate_key: char,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            delay: Duration::ZERO,
            delay_disabled: false,
            loop_playback: false,
            read_ahead_queue_size: 1000,
            topics_to_filter: Vec::new(),
            topic_qos_profile_overrides: HashMap::new(),
            clock_publish_frequency_hz: 0.0,
            disable_keyboard_controls: false,
            topic_remapping_options: Vec::new(),
            pause_resume_toggle_key: ' ',
            play_next_key: 's',
            increase_rate_key: '=',
            decrease_rate_key: '-',
        }
    }
}

impl PlayOptions {
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_negative_delay(mut self) -> Self {
        self.delay = Duration::ZERO;
        self.delay_disabled = true;
        self
    }

    pub fn with_loop(mut self, enabled: bool) -> Self {
        self.loop_playback = enabled;
        self
    }

    pub fn with_read_ahead_queue_size(mut self, size: usize) -> Self {
        self.read_ahead_queue_size = size;
        self
    }

    pub fn with_topics_to_filter(mut self, topics: Vec<String>) -> Self {
        self.topics_to_filter = topics;
        self
    }

    pub fn with_clock_publish_frequency(mut self, hz: f64) -> Self {
        self.clock_publish_frequency_hz = hz;
        self
    }

    pub fn with_keyboard_controls_disabled(mut self, disabled: bool) -> Self {
        self.disable_keyboard_controls = disabled;
        self
    }

    pub fn with_topic_remapping_options(mut self, remappings: Vec<(String, String)>) -> Self {
        self.topic_remapping_options = remappings;
        self
    }

    pub fn with_pause_resume_toggle_key(mut self, key: char) -> Self {
        self.pause_resume_toggle_key = key;
        self
    }

    pub fn with_play_next_key(mut self, key: char) -> Self {
        self.play_next_key = key;
        self
    }

    pub fn with_increase_rate_key(mut self, key: char) -> Self {
        self.increase_rate_key = key;
        self
    }

    pub fn with_decrease_rate_key(mut self, key: char) -> Self {
        self.decrease_rate_key = key;
        self
    }
}

/// Topic selection strategy for recording.
#[derive(Debug, Clone, Default)]
pub struct TopicSelection {
    /// Explicit topic list. When non-empty this is the only source of
    /// topics considered (still subject to regex/exclude below).
    pub topics: Vec<String>,
    pub regex: String,
    pub exclude: String,
    /// Whether an empty `regex` means "record everything" (true) or
    /// "record nothing" (false).
    pub all: bool,
}

#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub rmw_serialization_format: String,
    pub selection: TopicSelection,
    pub include_hidden_topics: bool,
    pub topic_polling_interval: Duration,
    pub is_discovery_disabled: bool,
    pub topic_qos_profile_overrides: HashMap<String, QosProfile>,
    pub snapshot_mode: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            rmw_serialization_format: "cdr".to_string(),
            selection: TopicSelection::default(),
            include_hidden_topics: false,
            topic_polling_interval: Duration::from_millis(1000),
            is_discovery_disabled: false,
            topic_qos_profile_overrides: HashMap::new(),
            snapshot_mode: false,
        }
    }
}

impl RecordOptions {
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.rmw_serialization_format = format.into();
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.selection.topics = topics;
        self
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.topic_polling_interval = interval;
        self
    }

    pub fn with_discovery_disabled(mut self, disabled: bool) -> Self {
        self.is_discovery_disabled = disabled;
        self
    }

    pub fn with_snapshot_mode(mut self, enabled: bool) -> Self {
        self.snapshot_mode = enabled;
        self
    }
}
