//! The recording engine: a periodic topic-discovery control loop coupled
//! to an asynchronous subscription-to-writer fan-in. Grounded in the
//! teacher's own discovery loop (`trading/discovery.rs`,
//! `bus/discovery/router.rs`) — same poll/diff-against-known-set shape,
//! generalized here from filesystem `READY` markers to the middleware's
//! live topic graph.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use regex::Regex;

use crate::error::Error;
use crate::message::TopicMetadata;
use crate::options::RecordOptions;
use crate::qos::{is_incompatible, subscription_qos_for_topic, QosProfile};
use crate::storage::BagWriter;
use crate::transport::{MiddlewareHandle, Subscription};
use crate::Result;

struct Shared {
    writer: Arc<dyn BagWriter>,
    transport: Arc<dyn MiddlewareHandle>,
    options: RecordOptions,
    subscriptions: Mutex<HashMap<String, Box<dyn Subscription>>>,
    /// The QoS each live subscription actually requested, for the
    /// incompatibility check to compare against rather than recomputing a
    /// fresh (and possibly different) request.
    subscribed_qos: Mutex<HashMap<String, QosProfile>>,
    topic_unknown_types: Mutex<HashSet<String>>,
    topics_warned_about_incompatibility: Mutex<HashSet<String>>,
}

/// Owns the Writer by shared reference (it may be inspected externally
/// during recording, e.g. for a snapshot service) and tears down its
/// subscriptions on destruction.
pub struct Recorder {
    shared: Arc<Shared>,
    stop_discovery: Arc<AtomicBool>,
    discovery_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Recorder {
    pub fn new(writer: Arc<dyn BagWriter>, transport: Arc<dyn MiddlewareHandle>, options: RecordOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                writer,
                transport,
                options,
                subscriptions: Mutex::new(HashMap::new()),
                subscribed_qos: Mutex::new(HashMap::new()),
                topic_unknown_types: Mutex::new(HashSet::new()),
                topics_warned_about_incompatibility: Mutex::new(HashSet::new()),
            }),
            stop_discovery: Arc::new(AtomicBool::new(false)),
            discovery_handle: Mutex::new(None),
        }
    }

    pub fn record(&self) -> Result<()> {
        if self.shared.options.rmw_serialization_format.is_empty() {
            return Err(Error::Configuration("rmw_serialization_format must not be empty"));
        }

        let wanted = requested_or_available_topics(&self.shared);
        for topic in &wanted {
            subscribe_topic(&self.shared, topic);
        }

        if !self.shared.options.is_discovery_disabled {
            self.spawn_discovery();
        }
        Ok(())
    }

    fn spawn_discovery(&self) {
        let shared = Arc::clone(&self.shared);
        let stop = Arc::clone(&self.stop_discovery);
        let handle = thread::spawn(move || topics_discovery(shared, stop));
        if let Ok(mut guard) = self.discovery_handle.lock() {
            *guard = Some(handle);
        } else {
            log::error!("discovery handle mutex poisoned; discovery thread will not be joined on drop");
        }
    }

    pub fn subscribed_topic_count(&self) -> usize {
        self.shared.subscriptions.lock().map(|subs| subs.len()).unwrap_or(0)
    }

    /// Flushes the writer's buffered window to storage. Only meaningful
    /// when the recorder was configured with `RecordOptions::with_snapshot_mode`;
    /// otherwise there's no buffered window to flush and this is a no-op.
    pub fn take_snapshot(&self) -> Result<bool> {
        if !self.shared.options.snapshot_mode {
            return Ok(false);
        }
        self.shared.writer.take_snapshot()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop_discovery.store(true, Ordering::Release);
        if let Ok(mut guard) = self.discovery_handle.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
        if let Ok(mut subscriptions) = self.shared.subscriptions.lock() {
            subscriptions.clear();
        }
        if let Ok(mut subscribed_qos) = self.shared.subscribed_qos.lock() {
            subscribed_qos.clear();
        }
    }
}

/// The periodic topic-discovery control loop.
fn topics_discovery(shared: Arc<Shared>, stop: Arc<AtomicBool>) {
    loop {
        if stop.load(Ordering::Acquire) || shared.transport.is_shutting_down() {
            return;
        }

        let wanted = requested_or_available_topics(&shared);
        for topic in &wanted {
            warn_if_new_qos_for_subscribed_topic(&shared, topic);
        }

        let missing: Vec<TopicMetadata> = match shared.subscriptions.lock() {
            Ok(subscriptions) => wanted.into_iter().filter(|t| !subscriptions.contains_key(&t.name)).collect(),
            Err(_) => {
                log::error!("subscriptions mutex poisoned; skipping this discovery pass");
                Vec::new()
            }
        };
        for topic in &missing {
            subscribe_topic(&shared, topic);
        }

        if !shared.options.selection.topics.is_empty() {
            let subscribed = shared.subscriptions.lock().map(|subs| subs.len()).unwrap_or(0);
            if subscribed == shared.options.selection.topics.len() {
                log::info!("explicit topic list fully subscribed; stopping discovery");
                return;
            }
        }

        thread::sleep(shared.options.topic_polling_interval);
    }
}

/// Candidate topics to record: the live middleware graph, filtered by
/// visibility, resolvable type, and the configured topic selection.
fn requested_or_available_topics(shared: &Shared) -> Vec<TopicMetadata> {
    let graph = shared.transport.get_topic_names_and_types();

    let mut candidates: Vec<TopicMetadata> = Vec::new();
    for (topic, types) in graph {
        if topic.hidden && !shared.options.include_hidden_topics {
            continue;
        }
        if types.len() > 1 {
            log::warn!("topic '{}' offered under more than one type; skipping", topic.name);
            continue;
        }
        let Some(type_name) = types.into_iter().next() else {
            continue;
        };
        if type_name.is_empty() {
            if let Ok(mut unknown) = shared.topic_unknown_types.lock() {
                if unknown.insert(topic.name.clone()) {
                    log::warn!("topic '{}' has an unresolvable message type; skipping", topic.name);
                }
            }
            continue;
        }
        candidates.push(TopicMetadata::new(topic.name, type_name, shared.options.rmw_serialization_format.clone()));
    }

    let explicit = &shared.options.selection.topics;
    if !explicit.is_empty() {
        candidates.retain(|t| explicit.contains(&t.name));
    }

    let regex_selection = &shared.options.selection.regex;
    let exclude_selection = &shared.options.selection.exclude;
    if !regex_selection.is_empty() || !exclude_selection.is_empty() {
        let include_re = compile_selection_regex(regex_selection);
        let exclude_re = compile_selection_regex(exclude_selection);
        candidates.retain(|t| {
            let included = if let Some(re) = &include_re {
                re.is_match(&t.name)
            } else {
                shared.options.selection.all
            };
            let excluded = exclude_re.as_ref().is_some_and(|re| re.is_match(&t.name));
            included && !excluded
        });
    }

    candidates
}

fn compile_selection_regex(pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            log::warn!("invalid topic selection regex '{pattern}': {err}");
            None
        }
    }
}

/// Creates the topic in the writer, then subscribes with the negotiated
/// QoS. Rolls the topic back out of the writer if the subscribe fails.
fn subscribe_topic(shared: &Arc<Shared>, topic: &TopicMetadata) {
    // `create_topic` happens before the subscription exists: messages may
    // otherwise arrive before the writer is ready for them.
    if let Err(err) = shared.writer.create_topic(topic.clone()) {
        log::warn!("failed to create topic '{}' in writer: {err}", topic.name);
        return;
    }

    let qos = subscription_qos_for_topic(
        &topic.name,
        &shared.options.topic_qos_profile_overrides,
        &shared.transport.live_publisher_profiles(&topic.name),
    );

    let writer = Arc::clone(&shared.writer);
    let transport = Arc::clone(&shared.transport);
    let topic_name = topic.name.clone();
    let callback: crate::transport::SubscriptionCallback = Box::new(move |payload: &[u8]| {
        let message = crate::message::SerializedMessage::new(topic_name.clone(), payload.to_vec(), transport.wall_now_nanos());
        if let Err(err) = writer.write(message) {
            log::warn!("failed to write message on '{topic_name}': {err}");
        }
    });

    match shared.transport.create_subscription(&topic.name, &topic.type_name, qos, callback) {
        Ok(subscription) => {
            let registered = if let Ok(mut subscriptions) = shared.subscriptions.lock() {
                subscriptions.insert(topic.name.clone(), subscription);
                true
            } else {
                log::error!("subscriptions mutex poisoned; dropping new subscription to '{}'", topic.name);
                false
            };
            if registered {
                if let Ok(mut subscribed_qos) = shared.subscribed_qos.lock() {
                    subscribed_qos.insert(topic.name.clone(), qos);
                }
            }
        }
        Err(err) => {
            log::warn!("failed to subscribe to topic '{}': {err}", topic.name);
            if let Err(remove_err) = shared.writer.remove_topic(&topic.name) {
                log::warn!("failed to roll back topic '{}' after subscribe failure: {remove_err}", topic.name);
            }
        }
    }
}

/// First-match-records, at most one warning per topic.
fn warn_if_new_qos_for_subscribed_topic(shared: &Shared, topic: &TopicMetadata) {
    let already_subscribed = shared.subscriptions.lock().map(|subs| subs.contains_key(&topic.name)).unwrap_or(false);
    if !already_subscribed {
        return;
    }
    let already_warned = shared
        .topics_warned_about_incompatibility
        .lock()
        .map(|warned| warned.contains(&topic.name))
        .unwrap_or(true);
    if already_warned {
        return;
    }

    let Ok(subscribed_qos) = shared.subscribed_qos.lock() else {
        return;
    };
    let Some(subscription_qos) = subscribed_qos.get(&topic.name).copied() else {
        return;
    };
    drop(subscribed_qos);

    for publisher_profile in shared.transport.live_publisher_profiles(&topic.name) {
        if is_incompatible(publisher_profile, subscription_qos) {
            log::warn!("topic '{}': publisher QoS is incompatible with the subscription; messages will not be recorded", topic.name);
            if let Ok(mut warned) = shared.topics_warned_about_incompatibility.lock() {
                warned.insert(topic.name.clone());
            }
            return;
        }
    }
}
