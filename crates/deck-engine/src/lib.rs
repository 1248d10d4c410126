//! Local playback engine.
//!
//! [`PlaybackEngine`] owns the audio output device and the decoder for the
//! currently loaded file, and exposes synchronous transport operations
//! (load/play/pause/resume/stop) plus audio-clock time and volume queries.
//!
//! ## Pipeline
//! 1. **Decode**: a background thread uses Symphonia to decode the input into
//!    interleaved `f32` samples.
//! 2. **Resample**: when the device cannot run at the source rate, a background
//!    thread uses Rubato to convert to the device sample rate.
//! 3. **Playback**: the CPAL callback pulls samples without blocking, applies
//!    volume, and writes to the device.
//!
//! Stages communicate via bounded queues ([`queue::AudioQueue`]) sized by
//! `buffer_seconds` to provide underrun resistance. The engine facade itself is
//! single-threaded: it is meant to be driven from one controlling thread and
//! polled on a fixed interval.

pub mod config;
pub mod decode;
pub mod device;
pub mod engine;
pub mod events;
pub mod formats;
pub mod playback;
pub mod queue;
pub mod resample;

pub use config::EngineConfig;
pub use engine::{PlaybackEngine, PlaybackState};
pub use events::EngineEvent;
pub use formats::SupportedFormats;
