//! Manual/demo CLI for the Recording Engine. Records whatever topics the
//! in-memory demo transport has advertised at startup into a `.jsonl` bag.
//! Real topic discovery requires a live middleware graph, which this
//! crate doesn't implement; this binary advertises a couple of fixed demo
//! topics so `bagrecord` has something to subscribe to.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use bagkeeper::options::RecordOptions;
use bagkeeper::storage::jsonl::JsonlWriter;
use bagkeeper::storage::BagWriter;
use bagkeeper::transport::memory::MemoryTransport;
use bagkeeper::transport::MiddlewareHandle;
use bagkeeper::Recorder;

#[derive(Parser, Debug)]
#[command(author, version, about = "Record demo transport topics into a bag")]
struct Args {
    /// Output `.jsonl` bag path.
    output: PathBuf,

    /// Explicit topic list. Empty means "record everything advertised".
    #[arg(long = "topic")]
    topics: Vec<String>,

    /// Serialization format tag to record into topic metadata.
    #[arg(long, default_value = "cdr")]
    rmw_serialization_format: String,

    /// Topic discovery polling interval, in milliseconds.
    #[arg(long, default_value_t = 200)]
    polling_interval_ms: u64,

    /// How long to record before stopping, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    duration_ms: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let writer = JsonlWriter::create(&args.output).with_context(|| format!("opening bag at {}", args.output.display()))?;
    let writer: std::sync::Arc<dyn BagWriter> = std::sync::Arc::new(writer);

    let transport = MemoryTransport::new();
    // Demo-only: advertise the topics a real discovery loop would learn
    // from the live middleware graph.
    transport.advertise("/chatter", "std_msgs/String", false);
    transport.advertise("/odom", "nav_msgs/Odometry", false);
    let transport: std::sync::Arc<dyn MiddlewareHandle> = transport;

    let options = RecordOptions::default()
        .with_format(args.rmw_serialization_format)
        .with_topics(args.topics)
        .with_polling_interval(Duration::from_millis(args.polling_interval_ms));

    let recorder = Recorder::new(writer, transport, options);
    recorder.record().map_err(|e| anyhow::anyhow!("failed to start recording: {e}"))?;

    log::info!("recording to {} for {} ms", args.output.display(), args.duration_ms);
    thread::sleep(Duration::from_millis(args.duration_ms));

    drop(recorder);
    log::info!("recording stopped");
    Ok(())
}
