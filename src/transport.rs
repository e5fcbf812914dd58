//! The middleware's RPC/publish-subscribe transport. Out of scope as a
//! deliverable — this module pins down the interface contract the
//! Playback and Recording engines are written against, plus an in-memory
//! transport used by this crate's own tests.

use std::sync::Arc;

use crate::error::Error;
use crate::qos::QosProfile;
use crate::Result;

/// A live publisher bound to one topic.
pub trait Publisher: Send + Sync {
    fn publish(&self, payload: &[u8]) -> Result<()>;
}

/// A live subscription; dropping it unsubscribes (RAII teardown).
pub trait Subscription: Send {}

/// Callback invoked by the transport for every message delivered to a
/// subscription. The Recorder's `subscribe_topic` wires this to
/// `writer.write`.
pub type SubscriptionCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

/// (topic name, fully-qualified type name).
#[derive(Debug, Clone)]
pub struct TopicNameAndType {
    pub name: String,
    pub type_name: String,
    pub hidden: bool,
}

/// A handle onto the live middleware graph: publisher/subscription
/// creation, topic discovery, and a wall clock for recorded messages'
/// receive timestamps.
pub trait MiddlewareHandle: Send + Sync {
    fn create_publisher(&self, topic_name: &str, type_name: &str, qos: QosProfile) -> Result<Arc<dyn Publisher>>;

    fn create_subscription(
        &self,
        topic_name: &str,
        type_name: &str,
        qos: QosProfile,
        callback: SubscriptionCallback,
    ) -> Result<Box<dyn Subscription>>;

    /// All topics currently visible on the graph, with every type each is
    /// offered under (`requested_or_available_topics` drops any topic
    /// offered under more than one type).
    fn get_topic_names_and_types(&self) -> Vec<(TopicNameAndType, Vec<String>)>;

    /// Currently-live publisher QoS profiles for `topic_name`, used by
    /// `subscription_qos_for_topic` and the incompatibility check.
    fn live_publisher_profiles(&self, topic_name: &str) -> Vec<QosProfile>;

    fn wall_now_nanos(&self) -> i64;

    /// Observable shutdown predicate every long-running loop checks.
    fn is_shutting_down(&self) -> bool;
}

pub mod memory {
    //! An in-process transport for tests: publishers and subscriptions on
    //! the same topic are wired directly together through a shared
    //! registry, so `publish` calls subscription callbacks synchronously.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct Registry {
        /// topic -> (type, qos, subscriber callbacks)
        topics: HashMap<String, TopicState>,
    }

    #[derive(Default)]
    struct TopicState {
        publisher_profiles: Vec<QosProfile>,
        /// Keyed by subscription id so a single subscription can deregister
        /// itself on drop without disturbing anyone else's.
        subscribers: HashMap<u64, Arc<SubscriptionCallback>>,
        known_types: Vec<String>,
        hidden: bool,
    }

    pub struct MemoryTransport {
        registry: Arc<Mutex<Registry>>,
        next_subscription_id: AtomicU64,
        shutting_down: AtomicBool,
        wall_nanos: std::sync::atomic::AtomicI64,
    }

    impl MemoryTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                registry: Arc::new(Mutex::new(Registry::default())),
                next_subscription_id: AtomicU64::new(0),
                shutting_down: AtomicBool::new(false),
                wall_nanos: std::sync::atomic::AtomicI64::new(0),
            })
        }

        /// Advertise a topic+type pair as visible to discovery without
        /// creating a publisher for it yet (simulates a peer process that
        /// has announced intent to publish).
        pub fn advertise(&self, topic_name: &str, type_name: &str, hidden: bool) {
            let Ok(mut registry) = self.registry.lock() else {
                log::error!("memory transport registry lock poisoned; dropping advertise for '{topic_name}'");
                return;
            };
            let state = registry.topics.entry(topic_name.to_string()).or_default();
            if !state.known_types.contains(&type_name.to_string()) {
                state.known_types.push(type_name.to_string());
            }
            state.hidden = hidden;
        }

        pub fn set_wall_now(&self, nanos: i64) {
            self.wall_nanos.store(nanos, Ordering::Relaxed);
        }

        pub fn shut_down(&self) {
            self.shutting_down.store(true, Ordering::Relaxed);
        }
    }

    struct MemoryPublisher {
        topic_name: String,
        registry: Arc<Mutex<Registry>>,
    }

    impl Publisher for MemoryPublisher {
        fn publish(&self, payload: &[u8]) -> Result<()> {
            let registry = self
                .registry
                .lock()
                .map_err(|_| Error::Corrupt("memory transport registry lock poisoned".to_string()))?;
            if let Some(state) = registry.topics.get(&self.topic_name) {
                for cb in state.subscribers.values() {
                    cb(payload);
                }
            }
            Ok(())
        }
    }

    /// Deregisters its callback from the registry on drop, the RAII
    /// unsubscribe contract `Subscription` documents.
    struct MemorySubscription {
        id: u64,
        topic_name: String,
        registry: Arc<Mutex<Registry>>,
    }

    impl Subscription for MemorySubscription {}

    impl Drop for MemorySubscription {
        fn drop(&mut self) {
            match self.registry.lock() {
                Ok(mut registry) => {
                    if let Some(state) = registry.topics.get_mut(&self.topic_name) {
                        state.subscribers.remove(&self.id);
                    }
                }
                Err(_) => {
                    log::error!(
                        "memory transport registry lock poisoned; could not unsubscribe from '{}'",
                        self.topic_name
                    );
                }
            }
        }
    }

    impl MiddlewareHandle for MemoryTransport {
        fn create_publisher(&self, topic_name: &str, type_name: &str, qos: QosProfile) -> Result<Arc<dyn Publisher>> {
            let mut registry = self
                .registry
                .lock()
                .map_err(|_| Error::Corrupt("memory transport registry lock poisoned".to_string()))?;
            let state = registry.topics.entry(topic_name.to_string()).or_default();
            if !state.known_types.contains(&type_name.to_string()) {
                state.known_types.push(type_name.to_string());
            }
            state.publisher_profiles.push(qos);
            drop(registry);
            Ok(Arc::new(MemoryPublisher {
                topic_name: topic_name.to_string(),
                registry: Arc::clone(&self.registry),
            }))
        }

        fn create_subscription(
            &self,
            topic_name: &str,
            type_name: &str,
            _qos: QosProfile,
            callback: SubscriptionCallback,
        ) -> Result<Box<dyn Subscription>> {
            let mut registry = self
                .registry
                .lock()
                .map_err(|_| Error::Corrupt("memory transport registry lock poisoned".to_string()))?;
            let state = registry.topics.entry(topic_name.to_string()).or_default();
            if !state.known_types.contains(&type_name.to_string()) {
                state.known_types.push(type_name.to_string());
            }
            let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
            state.subscribers.insert(id, Arc::new(callback));
            Ok(Box::new(MemorySubscription {
                id,
                topic_name: topic_name.to_string(),
                registry: Arc::clone(&self.registry),
            }))
        }

        fn get_topic_names_and_types(&self) -> Vec<(TopicNameAndType, Vec<String>)> {
            let Ok(registry) = self.registry.lock() else {
                log::error!("memory transport registry lock poisoned; reporting no topics");
                return Vec::new();
            };
            registry
                .topics
                .iter()
                .map(|(name, state)| {
                    (
                        TopicNameAndType {
                            name: name.clone(),
                            type_name: state.known_types.first().cloned().unwrap_or_default(),
                            hidden: state.hidden,
                        },
                        state.known_types.clone(),
                    )
                })
                .collect()
        }

        fn live_publisher_profiles(&self, topic_name: &str) -> Vec<QosProfile> {
            let Ok(registry) = self.registry.lock() else {
                log::error!("memory transport registry lock poisoned; reporting no publisher profiles for '{topic_name}'");
                return Vec::new();
            };
            registry.topics.get(topic_name).map(|s| s.publisher_profiles.clone()).unwrap_or_default()
        }

        fn wall_now_nanos(&self) -> i64 {
            self.wall_nanos.load(Ordering::Relaxed)
        }

        fn is_shutting_down(&self) -> bool {
            self.shutting_down.load(Ordering::Relaxed)
        }
    }
}
