//! End-to-end: `seek` mid-stream jumps to the next message at or after
//! the requested time.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bagkeeper::message::{SerializedMessage, TopicMetadata};
use bagkeeper::options::PlayOptions;
use bagkeeper::storage::memory::{MemoryBag, MemoryReader};
use bagkeeper::transport::memory::MemoryTransport;
use bagkeeper::Player;

#[test]
fn seek_jumps_to_next_message_after_target() {
    let transport = MemoryTransport::new();
    let seen: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    transport
        .create_subscription("/a", "std_msgs/String", Default::default(), Box::new(move |payload: &[u8]| {
            let ts = i64::from_le_bytes(payload.try_into().unwrap());
            seen_clone.lock().unwrap().push(ts);
        }))
        .unwrap();

    let bag = MemoryBag::new(
        vec![TopicMetadata::new("/a", "std_msgs/String", "cdr")],
        [10i64, 20, 30, 40, 50]
            .into_iter()
            .map(|t| SerializedMessage::new("/a", t.to_le_bytes().to_vec(), t * 1_000_000))
            .collect(),
    );

    let reader = Box::new(MemoryReader::new(bag));
    let player = Arc::new(Player::new(reader, transport, PlayOptions::default().with_rate(1.0)));

    let seeker = Arc::clone(&player);
    let handle = thread::spawn(move || {
        // Give the first message (t=10ms) time to publish before seeking
        // to t=25ms, which lands between the 20ms and 30ms messages.
        thread::sleep(Duration::from_millis(60));
        seeker.seek(25_000_000).unwrap();
    });

    player.play().unwrap();
    handle.join().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&10));
    assert!(seen.iter().all(|t| *t == 10 || *t >= 25));
    assert!(seen.contains(&30));
    assert!(seen.contains(&40));
    assert!(seen.contains(&50));
}
