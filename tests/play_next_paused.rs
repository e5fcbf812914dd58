//! End-to-end: `play_next` while paused publishes exactly one message per
//! call, and returns `false` once the bag is exhausted.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bagkeeper::message::{SerializedMessage, TopicMetadata};
use bagkeeper::options::PlayOptions;
use bagkeeper::storage::memory::{MemoryBag, MemoryReader};
use bagkeeper::transport::memory::MemoryTransport;
use bagkeeper::Player;

#[test]
fn play_next_publishes_one_message_per_call_then_returns_false() {
    let transport = MemoryTransport::new();
    let seen: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    transport
        .create_subscription("/a", "std_msgs/String", Default::default(), Box::new(move |payload: &[u8]| {
            seen_clone.lock().unwrap().push(i64::from_le_bytes(payload.try_into().unwrap()));
        }))
        .unwrap();

    // Bag timestamps are in nanoseconds; spaced widely so the first
    // message (at `starting_time_`) has already been published and the
    // clock is idling well before the pause below takes effect.
    let bag = MemoryBag::new(
        vec![TopicMetadata::new("/a", "std_msgs/String", "cdr")],
        [0i64, 20_000_000, 30_000_000]
            .into_iter()
            .map(|t| SerializedMessage::new("/a", t.to_le_bytes().to_vec(), t))
            .collect(),
    );

    let reader = Box::new(MemoryReader::new(bag));
    let player = Arc::new(Player::new(reader, transport, PlayOptions::default().with_rate(1.0)));

    let runner = Arc::clone(&player);
    let handle = thread::spawn(move || runner.play());

    // Let the first message (t=0) publish, then pause before the second
    // message (t=20ms) is due.
    thread::sleep(Duration::from_millis(5));
    player.pause();
    assert!(player.is_paused());

    assert!(player.play_next(), "first play_next must publish the t=20ms message");
    assert!(player.play_next(), "second play_next must publish the t=30ms message");
    assert!(!player.play_next(), "third call must return false: bag is exhausted");
    assert!(player.is_paused(), "play_next does not itself resume playback");

    player.resume();
    handle.join().unwrap().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![0, 20_000_000, 30_000_000]);
}

#[test]
fn play_next_while_not_paused_is_rejected() {
    let transport = MemoryTransport::new();
    let bag = MemoryBag::new(
        vec![TopicMetadata::new("/a", "std_msgs/String", "cdr")],
        vec![SerializedMessage::new("/a", vec![1], 10)],
    );
    let reader = Box::new(MemoryReader::new(bag));
    let player = Player::new(reader, transport, PlayOptions::default());
    assert!(!player.is_paused());
    assert!(!player.play_next());
}
