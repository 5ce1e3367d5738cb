//! CLI tool to decode simulator transcripts in batch.
//!
//! Each input file yields two outputs next to it (or under `--out-dir`):
//! `<stem>.out`, the re-rendered SI transcript, and `<stem>.json`, the
//! structured snapshot. A failing file is reported and the batch moves
//! on to the next one.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ventrec::decode_file;

#[derive(Parser)]
#[command(name = "decode-run", about = "Decode tunnel-ventilation run transcripts")]
struct Args {
    /// Transcript files to decode.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the .out and .json files (default: next to each input).
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Skip writing the re-rendered transcript.
    #[arg(long)]
    no_render: bool,
}

fn output_path(input: &Path, out_dir: Option<&Path>, ext: &str) -> PathBuf {
    let mut path = match out_dir {
        Some(dir) => dir.join(input.file_name().unwrap_or_default()),
        None => input.to_path_buf(),
    };
    path.set_extension(ext);
    path
}

fn process(input: &Path, args: &Args) -> anyhow::Result<bool> {
    let outcome = decode_file(input)
        .with_context(|| format!("reading {}", input.display()))?;

    let json = outcome
        .snapshot
        .to_json()
        .context("serializing snapshot")?;
    let json_path = output_path(input, args.out_dir.as_deref(), "json");
    fs::write(&json_path, json).with_context(|| format!("writing {}", json_path.display()))?;

    if !args.no_render {
        let out_path = output_path(input, args.out_dir.as_deref(), "out");
        fs::write(&out_path, &outcome.rendered)
            .with_context(|| format!("writing {}", out_path.display()))?;
    }

    for d in &outcome.diagnostics {
        let kind = if d.fatal { "fatal" } else { "warning" };
        eprintln!("{}: {kind} {}: {}", input.display(), d.code, d.message);
    }
    if let Some(err) = &outcome.error {
        eprintln!("{}: decode failed: {err}", input.display());
        eprintln!("{}: partial snapshot written to {}", input.display(), json_path.display());
        return Ok(false);
    }
    Ok(true)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut failed = 0usize;
    for input in &args.inputs {
        match process(input, &args) {
            Ok(true) => {}
            Ok(false) => failed += 1,
            Err(e) => {
                eprintln!("{}: {e:#}", input.display());
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} file(s) failed", args.inputs.len());
    }
    Ok(())
}
