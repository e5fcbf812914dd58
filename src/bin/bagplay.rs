//! Manual/demo CLI for the Playback Engine, playing a JSON Lines demo bag
//! (see `bagkeeper::storage::jsonl`) into the in-memory transport. The real
//! bag format and middleware transport are not reproduced here; this
//! binary exists only so the engine can be exercised by hand, the same
//! shallow role `chronicle-cli` plays relative to the real bus in the
//! teacher crate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use bagkeeper::options::PlayOptions;
use bagkeeper::storage::jsonl::JsonlReader;
use bagkeeper::transport::memory::MemoryTransport;
use bagkeeper::transport::MiddlewareHandle;
use bagkeeper::Player;

#[derive(Parser, Debug)]
#[command(author, version, about = "Play a bag into a demo in-memory transport")]
struct Args {
    /// Path to a `.jsonl` bag written by bagrecord or by hand.
    bag: PathBuf,

    /// Initial playback rate multiplier.
    #[arg(long, default_value_t = 1.0)]
    rate: f64,

    /// Restart from the beginning on end-of-bag.
    #[arg(long = "loop")]
    loop_playback: bool,

    /// Only publish these topics (repeatable). Empty means "all topics".
    #[arg(long = "topic")]
    topics: Vec<String>,

    /// Read-ahead queue size.
    #[arg(long, default_value_t = 1000)]
    queue_size: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let reader = JsonlReader::open(&args.bag).with_context(|| format!("opening bag at {}", args.bag.display()))?;

    let options = PlayOptions::default()
        .with_rate(args.rate)
        .with_loop(args.loop_playback)
        .with_topics_to_filter(args.topics)
        .with_read_ahead_queue_size(args.queue_size);

    let transport: Arc<dyn MiddlewareHandle> = MemoryTransport::new();
    let player = Player::new(Box::new(reader), transport, options);

    log::info!("playing {}", args.bag.display());
    player.play().map_err(|e| anyhow::anyhow!("failed to play: {e}"))?;
    log::info!("playback finished");
    Ok(())
}
