//! End-to-end: ordered two-topic replay, and the same bag with a topic
//! filter applied.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bagkeeper::message::{SerializedMessage, TopicMetadata};
use bagkeeper::options::PlayOptions;
use bagkeeper::storage::memory::{MemoryBag, MemoryReader};
use bagkeeper::transport::memory::MemoryTransport;
use bagkeeper::Player;

fn bag() -> MemoryBag {
    MemoryBag::new(
        vec![
            TopicMetadata::new("/a", "std_msgs/String", "cdr"),
            TopicMetadata::new("/b", "std_msgs/String", "cdr"),
        ],
        vec![
            SerializedMessage::new("/a", vec![1], 0),
            SerializedMessage::new("/b", vec![2], 50_000_000),
            SerializedMessage::new("/a", vec![3], 100_000_000),
        ],
    )
}

fn capture_publishes(transport: &Arc<MemoryTransport>, topic: &str) -> Arc<Mutex<Vec<(String, Instant)>>> {
    let log: Arc<Mutex<Vec<(String, Instant)>>> = Arc::new(Mutex::new(Vec::new()));
    let log_clone = Arc::clone(&log);
    let topic_owned = topic.to_string();
    transport
        .create_subscription(topic, "std_msgs/String", Default::default(), Box::new(move |_payload| {
            log_clone.lock().unwrap().push((topic_owned.clone(), Instant::now()));
        }))
        .unwrap();
    log
}

#[test]
fn two_topic_ordered_replay_preserves_order_and_pacing() {
    let transport = MemoryTransport::new();
    let log_a = capture_publishes(&transport, "/a");
    let log_b = capture_publishes(&transport, "/b");

    let reader = Box::new(MemoryReader::new(bag()));
    let player = Player::new(reader, transport, PlayOptions::default().with_rate(1.0));
    player.play().unwrap();

    let a = log_a.lock().unwrap();
    let b = log_b.lock().unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 1);

    let gap_ab = b[0].1.duration_since(a[0].1);
    let gap_ba = a[1].1.duration_since(b[0].1);
    assert!(gap_ab >= Duration::from_millis(20), "gap_ab too short: {gap_ab:?}");
    assert!(gap_ab <= Duration::from_millis(150), "gap_ab too long: {gap_ab:?}");
    assert!(gap_ba >= Duration::from_millis(20), "gap_ba too short: {gap_ba:?}");
    assert!(gap_ba <= Duration::from_millis(150), "gap_ba too long: {gap_ba:?}");
}

#[test]
fn topic_filter_only_publishes_selected_topic() {
    let transport = MemoryTransport::new();
    let log_a = capture_publishes(&transport, "/a");
    let log_b = capture_publishes(&transport, "/b");

    let reader = Box::new(MemoryReader::new(bag()));
    let player = Player::new(
        reader,
        transport,
        PlayOptions::default().with_rate(1.0).with_topics_to_filter(vec!["/a".to_string()]),
    );
    player.play().unwrap();

    assert_eq!(log_a.lock().unwrap().len(), 2);
    assert_eq!(log_b.lock().unwrap().len(), 0);
}
