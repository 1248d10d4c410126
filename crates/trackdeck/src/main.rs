//! Trackdeck — local audio playback plus a thin client for the playlist and
//! search backend.
//!
//! ## Modes
//! - `play`: decode, (optionally) resample, and play a local file via CPAL,
//!   polling the engine every 500 ms for progress until playback stops.
//! - `devices`: list output devices.
//! - `search` / `top` / `playlist`: query the backend service over its framed
//!   TCP protocol and print the resulting track records as JSON.

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use deck_backend::{BackendBridge, TcpTransport};
use deck_engine::{EngineConfig, PlaybackEngine, PlaybackState};
use deck_proto::TrackRecord;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,trackdeck=info")),
        )
        .init();

    match &args.cmd {
        cli::Command::Play { path, volume } => play(&args, path, *volume),
        cli::Command::Devices => deck_engine::device::list_devices(&cpal::default_host()),
        cli::Command::Search { query, max } => {
            let records = connect(&args)?.search_remote(query, *max)?;
            print_records(&records)
        }
        cli::Command::Top { max } => {
            let records = connect(&args)?.top_tracks(*max)?;
            print_records(&records)
        }
        cli::Command::Playlist { max } => {
            let records = connect(&args)?.all_songs(*max)?;
            print_records(&records)
        }
    }
}

fn connect(args: &cli::Args) -> Result<BackendBridge<TcpTransport>> {
    Ok(BackendBridge::new(TcpTransport::connect(&args.backend)?))
}

fn print_records(records: &[TrackRecord]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}

/// Play one file, polling for progress until the engine reports Stopped.
///
/// The loop only observes engine state; the one decision it makes is turning
/// ctrl-c into an explicit stop.
fn play(args: &cli::Args, path: &Path, volume: Option<f32>) -> Result<()> {
    let mut engine = PlaybackEngine::new(EngineConfig {
        device: args.device.clone(),
        chunk_frames: args.chunk_frames,
        refill_max_frames: args.refill_max_frames,
        buffer_seconds: args.buffer_seconds,
    });
    if let Some(volume) = volume {
        engine.set_volume(volume);
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("install ctrl-c handler")?;

    engine.play(path)?;
    let total = engine.total_time();
    tracing::info!(path = %path.display(), total = %fmt_mmss(total), "playing");

    loop {
        std::thread::sleep(POLL_INTERVAL);
        if interrupted.load(Ordering::Relaxed) {
            engine.stop();
        }
        if engine.state() == PlaybackState::Stopped {
            break;
        }
        println!("{} / {}", fmt_mmss(engine.current_time()), fmt_mmss(total));
    }

    tracing::info!("playback finished");
    Ok(())
}

fn fmt_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_mmss_formats_minutes_and_seconds() {
        assert_eq!(fmt_mmss(Duration::ZERO), "00:00");
        assert_eq!(fmt_mmss(Duration::from_secs(5)), "00:05");
        assert_eq!(fmt_mmss(Duration::from_secs(125)), "02:05");
        assert_eq!(fmt_mmss(Duration::from_secs(3600)), "60:00");
    }
}
