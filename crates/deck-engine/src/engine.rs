//! The playback engine facade: one loaded file, one output device, explicit
//! transport state.
//!
//! The engine is synchronous and single-owner: all calls come from one
//! controlling thread, with an external fixed-interval poll reading state.
//! Background pipeline threads only ever communicate back through shared
//! atomics and queues; natural end of stream is observed lazily on the next
//! call into the engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use cpal::traits::StreamTrait;
use crossbeam_channel::Receiver;

use crate::config::EngineConfig;
use crate::decode::{self, ProbedSource};
use crate::device;
use crate::events::{EngineEvent, EventHub};
use crate::formats::SupportedFormats;
use crate::playback::{self, DEFAULT_VOLUME, OutputTaps, SharedVolume, clamp_unit};
use crate::queue::AudioQueue;
use crate::resample::{self, ResampleConfig};

/// Local transport state of the engine.
///
/// This describes the engine's own session only; a backend service mirrors a
/// separate transport state for remote items, and the two are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// The live binding to exactly one loaded audio file and its device resources.
///
/// Dropping the session closes the stage queues (unblocking the decode and
/// resample threads) and releases the CPAL stream, so teardown happens exactly
/// once on every exit path.
struct Session {
    _stream: cpal::Stream,
    srcq: Arc<AudioQueue>,
    dstq: Arc<AudioQueue>,
    paused: Arc<AtomicBool>,
    volume: SharedVolume,
    played_frames: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    output_rate: u32,
    duration: Duration,
    state: PlaybackState,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.srcq.close();
        self.dstq.close();
    }
}

/// Owns the audio output device and the decoder for the currently loaded file.
pub struct PlaybackEngine {
    config: EngineConfig,
    formats: SupportedFormats,
    host: cpal::Host,
    session: Option<Session>,
    /// Last requested volume; seeds the next session and survives stop.
    requested_volume: f32,
    /// Last successfully loaded file, kept across stop for association.
    last_path: Option<PathBuf>,
    /// Duration of the last loaded file, still queryable after stop.
    last_duration: Duration,
    events: EventHub,
}

impl PlaybackEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            formats: SupportedFormats::default(),
            host: cpal::default_host(),
            session: None,
            requested_volume: DEFAULT_VOLUME,
            last_path: None,
            last_duration: Duration::ZERO,
            events: EventHub::default(),
        }
    }

    /// The supported-format capability table.
    pub fn formats(&self) -> &SupportedFormats {
        &self.formats
    }

    /// Mutable access to the capability table.
    pub fn formats_mut(&mut self) -> &mut SupportedFormats {
        &mut self.formats
    }

    /// Subscribe to [`EngineEvent`] notifications.
    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Load `path` without starting audible output.
    ///
    /// Validation (existence, extension, probe) happens before the current
    /// session is touched, so a failed load leaves state exactly as it was.
    /// On success the previous session is fully released before the new
    /// device resources are acquired, and the engine sits Stopped-loaded.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.observe_completion();
        let path = path.as_ref();
        let probed = self.validate(path)?;
        self.install_session(path, probed, false)?;
        Ok(())
    }

    /// Load `path` and start playback; the only entry point for new files.
    ///
    /// Emits [`EngineEvent::Started`] on success; on failure no event fires
    /// and state is unchanged (or Stopped, if the device itself failed after
    /// the previous session had already been released).
    pub fn play(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.observe_completion();
        let path = path.as_ref();
        let probed = self.validate(path)?;
        self.install_session(path, probed, true)?;
        self.events.emit(EngineEvent::Started);
        Ok(())
    }

    /// Pause playback; no-op unless currently Playing.
    pub fn pause(&mut self) {
        self.observe_completion();
        if let Some(session) = self.session.as_mut() {
            if session.state == PlaybackState::Playing {
                session.paused.store(true, Ordering::Relaxed);
                session.state = PlaybackState::Paused;
                tracing::info!("paused");
            }
        }
    }

    /// Resume playback; no-op unless currently Paused.
    pub fn resume(&mut self) {
        self.observe_completion();
        if let Some(session) = self.session.as_mut() {
            if session.state == PlaybackState::Paused {
                session.paused.store(false, Ordering::Relaxed);
                session.state = PlaybackState::Playing;
                tracing::info!("resumed");
            }
        }
    }

    /// Stop playback and release the session's device resources.
    ///
    /// Safe to call at any time; a no-op when nothing is playing or paused.
    /// Emits the same [`EngineEvent::Stopped`] a natural end of stream does.
    pub fn stop(&mut self) {
        self.observe_completion();
        let stoppable = matches!(
            self.session.as_ref().map(|s| s.state),
            Some(PlaybackState::Playing) | Some(PlaybackState::Paused)
        );
        if stoppable {
            self.session = None;
            self.events.emit(EngineEvent::Stopped);
            tracing::info!("stopped");
        }
    }

    /// Current transport state; Stopped when no session exists.
    pub fn state(&mut self) -> PlaybackState {
        self.observe_completion();
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(PlaybackState::Stopped)
    }

    /// Convenience predicate for `state() == Playing`.
    pub fn is_playing(&mut self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Elapsed time of the current session, from the audio clock.
    ///
    /// Derived from frames actually delivered to the device, not wall time,
    /// so pauses and underruns never desynchronize the display. Zero when no
    /// session exists.
    pub fn current_time(&mut self) -> Duration {
        self.observe_completion();
        match self.session.as_ref() {
            Some(s) if s.output_rate > 0 => {
                let frames = s.played_frames.load(Ordering::Relaxed);
                Duration::from_millis(frames.saturating_mul(1000) / s.output_rate as u64)
            }
            _ => Duration::ZERO,
        }
    }

    /// Total duration of the loaded file.
    ///
    /// Stays queryable for the last loaded file after stop; zero before the
    /// first successful load.
    pub fn total_time(&mut self) -> Duration {
        self.observe_completion();
        self.session
            .as_ref()
            .map(|s| s.duration)
            .unwrap_or(self.last_duration)
    }

    /// Set the volume, clamped into `[0.0, 1.0]`.
    ///
    /// The clamped value persists and seeds the next session even when no
    /// session currently exists.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = clamp_unit(volume);
        self.requested_volume = volume;
        if let Some(session) = self.session.as_ref() {
            session.volume.set(volume);
        }
    }

    /// Current session volume, or [`DEFAULT_VOLUME`] when no session exists.
    pub fn volume(&self) -> f32 {
        self.session
            .as_ref()
            .map(|s| s.volume.get())
            .unwrap_or(DEFAULT_VOLUME)
    }

    /// The last successfully loaded file, retained across stop.
    pub fn current_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }

    /// Release any active session and its device handle. Idempotent; also run
    /// on drop, and a second call is a no-op.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            self.events.emit(EngineEvent::Stopped);
        }
    }

    /// Check preconditions and probe the file without touching the session.
    fn validate(&self, path: &Path) -> Result<ProbedSource> {
        if path.as_os_str().is_empty() {
            bail!("empty file path");
        }
        if !path.is_file() {
            bail!("audio file not found: {}", path.display());
        }
        if !self.formats.supports_path(path) {
            bail!("unsupported audio format: {}", path.display());
        }
        decode::probe_file(path)
    }

    /// Release the previous session, then build the new pipeline and stream.
    ///
    /// Release strictly precedes device acquisition so output handles are
    /// never held two-deep. A failure past this point leaves the engine
    /// cleanly Stopped with no partial session.
    fn install_session(&mut self, path: &Path, probed: ProbedSource, start: bool) -> Result<()> {
        self.session = None;

        let spec = probed.spec;
        let duration = probed.duration.unwrap_or(Duration::ZERO);
        let srcq = decode::start_decode(probed, self.config.buffer_seconds);

        match self.open_output(&srcq, spec, start) {
            Ok((stream, dstq, taps, output_rate)) => {
                tracing::info!(
                    path = %path.display(),
                    rate_hz = spec.rate,
                    channels = spec.channels.count(),
                    duration_ms = duration.as_millis() as u64,
                    playing = start,
                    "session loaded"
                );
                self.last_path = Some(path.to_path_buf());
                self.last_duration = duration;
                self.session = Some(Session {
                    _stream: stream,
                    srcq,
                    dstq,
                    paused: taps.paused,
                    volume: taps.volume,
                    played_frames: taps.played_frames,
                    finished: taps.finished,
                    output_rate,
                    duration,
                    state: if start {
                        PlaybackState::Playing
                    } else {
                        PlaybackState::Stopped
                    },
                });
                Ok(())
            }
            Err(e) => {
                // Unblock the already-running decode thread before bailing.
                srcq.close();
                Err(e)
            }
        }
    }

    /// Open the device, wire the (optional) resampler, and start the stream.
    fn open_output(
        &self,
        srcq: &Arc<AudioQueue>,
        spec: symphonia::core::audio::SignalSpec,
        start: bool,
    ) -> Result<(cpal::Stream, Arc<AudioQueue>, OutputTaps, u32)> {
        let device = device::pick_device(&self.host, self.config.device.as_deref())?;
        let config = device::pick_output_config(&device, Some(spec.rate))?;
        let mut stream_config: cpal::StreamConfig = config.clone().into();
        if let Some(buf) = device::pick_buffer_size(&config) {
            stream_config.buffer_size = buf;
        }

        let dstq = if spec.rate == stream_config.sample_rate {
            srcq.clone()
        } else {
            tracing::info!(
                from_hz = spec.rate,
                to_hz = stream_config.sample_rate,
                "resampling"
            );
            resample::start_resampler(
                srcq.clone(),
                spec,
                stream_config.sample_rate,
                ResampleConfig {
                    chunk_frames: self.config.chunk_frames,
                    buffer_seconds: self.config.buffer_seconds,
                },
            )?
        };

        let taps = OutputTaps {
            paused: Arc::new(AtomicBool::new(!start)),
            volume: SharedVolume::new(self.requested_volume),
            played_frames: Arc::new(AtomicU64::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
        };

        let stream = playback::build_output_stream(
            &device,
            &stream_config,
            config.sample_format(),
            &dstq,
            self.config.refill_max_frames,
            taps.clone(),
        )?;
        stream.play()?;

        Ok((stream, dstq, taps, stream_config.sample_rate))
    }

    /// Fold a naturally finished session into Stopped, emitting the same
    /// notification an explicit stop does.
    fn observe_completion(&mut self) {
        let finished = self
            .session
            .as_ref()
            .map(|s| s.finished.load(Ordering::Relaxed))
            .unwrap_or(false);
        if finished {
            self.session = None;
            self.events.emit(EngineEvent::Stopped);
            tracing::info!("playback finished");
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.close();
    }
}
