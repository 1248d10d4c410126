use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "trackdeck", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Resampler input chunk size in frames (higher => more latency, lower => more overhead)
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,

    /// Playback callback refill cap (frames). Larger reduces lock churn but can add latency.
    #[arg(long, default_value_t = 4096)]
    pub refill_max_frames: usize,

    /// Queue buffer target in seconds (per stage)
    #[arg(long, default_value_t = 2.0)]
    pub buffer_seconds: f32,

    /// Playlist/search backend address, e.g. 127.0.0.1:8090
    #[arg(long, default_value = "127.0.0.1:8090")]
    pub backend: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a local audio file until it ends (or ctrl-c)
    Play {
        /// Path to the audio file
        path: PathBuf,

        /// Initial volume in [0.0, 1.0]
        #[arg(long)]
        volume: Option<f32>,
    },

    /// List output devices and exit
    Devices,

    /// Search the backend catalog and print matches as JSON
    Search {
        query: String,

        /// Maximum number of results
        #[arg(long, default_value_t = 20)]
        max: u32,
    },

    /// Fetch the backend's top tracks as JSON
    Top {
        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        max: u32,
    },

    /// Print the backend playlist as JSON
    Playlist {
        /// Maximum number of entries
        #[arg(long, default_value_t = 500)]
        max: u32,
    },
}
