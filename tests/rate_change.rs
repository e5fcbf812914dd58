//! End-to-end: a rate change mid-stream shortens (or lengthens) the
//! wall-clock spacing between the remaining publishes by the expected
//! factor.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bagkeeper::message::{SerializedMessage, TopicMetadata};
use bagkeeper::options::PlayOptions;
use bagkeeper::storage::memory::{MemoryBag, MemoryReader};
use bagkeeper::transport::memory::MemoryTransport;
use bagkeeper::Player;

#[test]
fn set_rate_mid_stream_changes_subsequent_publish_spacing() {
    let transport = MemoryTransport::new();
    let log: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let log_clone = Arc::clone(&log);
    transport
        .create_subscription("/a", "std_msgs/String", Default::default(), Box::new(move |_payload| {
            log_clone.lock().unwrap().push(Instant::now());
        }))
        .unwrap();

    // Five messages, uniform 100ms spacing.
    let bag = MemoryBag::new(
        vec![TopicMetadata::new("/a", "std_msgs/String", "cdr")],
        (0..5).map(|i| SerializedMessage::new("/a", vec![i as u8], i * 100_000_000)).collect(),
    );

    let reader = Box::new(MemoryReader::new(bag));
    let player = Arc::new(Player::new(reader, transport, PlayOptions::default().with_rate(1.0)));

    let runner = Arc::clone(&player);
    let handle = thread::spawn(move || runner.play());

    // After the 3rd message (t=200ms) has published, double the rate so the
    // remaining ~200ms of bag time should take only ~100ms of wall time.
    thread::sleep(Duration::from_millis(250));
    assert!(player.set_rate(2.0));
    assert_eq!(player.get_rate(), 2.0);

    handle.join().unwrap().unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 5);

    let early_gap = log[1].duration_since(log[0]);
    let late_gap = log[4].duration_since(log[3]);

    assert!(early_gap >= Duration::from_millis(60), "early_gap too short: {early_gap:?}");
    assert!(early_gap <= Duration::from_millis(160), "early_gap too long: {early_gap:?}");
    assert!(late_gap <= Duration::from_millis(90), "late_gap should be roughly halved: {late_gap:?}");
}
