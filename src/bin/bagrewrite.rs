//! Manual/demo CLI for the Rewrite Merger: k-way merges one or more input
//! `.jsonl` bags into a single output bag in strict timestamp order.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use bagkeeper::storage::jsonl::{JsonlReader, JsonlWriter};
use bagkeeper::storage::{BagReader, BagWriter};
use bagkeeper::Rewriter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Merge input bags into one output bag, in timestamp order")]
struct Args {
    /// One or more input `.jsonl` bags.
    #[arg(long = "input", required = true)]
    inputs: Vec<PathBuf>,

    /// Output `.jsonl` bag path.
    #[arg(long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let readers: Vec<Box<dyn BagReader>> = args
        .inputs
        .iter()
        .map(|path| -> Result<Box<dyn BagReader>> {
            let reader = JsonlReader::open(path).with_context(|| format!("opening input bag {}", path.display()))?;
            Ok(Box::new(reader))
        })
        .collect::<Result<_>>()?;

    let writer = JsonlWriter::create(&args.output).with_context(|| format!("opening output bag {}", args.output.display()))?;
    let writers: Vec<Box<dyn BagWriter>> = vec![Box::new(writer)];

    let mut rewriter = Rewriter::new(readers, writers).map_err(|e| anyhow::anyhow!("failed to start rewrite: {e}"))?;
    let emitted = rewriter.run().map_err(|e| anyhow::anyhow!("rewrite failed: {e}"))?;

    log::info!("merged {} inputs into {} ({} messages)", args.inputs.len(), args.output.display(), emitted);
    Ok(())
}
