//! Playback stage (CPAL output stream).
//!
//! Builds the CPAL output stream and provides the real-time audio callback.
//! The callback:
//! - refills a small local buffer from the session queue without blocking
//! - applies the session volume and basic channel mapping
//! - converts `f32` samples to the device sample format
//! - raises the `finished` flag once the queue is closed and fully drained

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::queue::{AudioQueue, Pop};

/// Default volume reported when no session exists.
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Clamp a requested volume into `[0.0, 1.0]`; NaN maps to silence.
pub fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Volume shared between the engine facade and the realtime callback.
///
/// Stored as `f32` bits in an atomic so the callback never takes a lock.
/// Writes clamp; the stored value is always in `[0.0, 1.0]`.
#[derive(Clone, Debug)]
pub struct SharedVolume {
    bits: Arc<AtomicU32>,
}

impl SharedVolume {
    pub fn new(volume: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(clamp_unit(volume).to_bits())),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, volume: f32) {
        self.bits
            .store(clamp_unit(volume).to_bits(), Ordering::Relaxed);
    }
}

/// Shared flags and counters wired into the output callback.
#[derive(Clone)]
pub struct OutputTaps {
    /// When `true` the callback outputs silence and does not drain the queue
    /// ("pause means pause": no skipping ahead).
    pub paused: Arc<AtomicBool>,
    /// Session volume applied to every sample.
    pub volume: SharedVolume,
    /// Incremented by the number of output frames produced; the audio clock.
    pub played_frames: Arc<AtomicU64>,
    /// Set once the queue is closed and fully drained (end of stream).
    pub finished: Arc<AtomicBool>,
}

/// Build a CPAL output stream that plays audio from `queue`.
///
/// `queue` must contain interleaved `f32` samples already at the device sample
/// rate. The callback never blocks on the queue; a starved callback emits
/// silence.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<AudioQueue>,
    refill_max_frames: usize,
    taps: OutputTaps,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, refill_max_frames, taps),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, refill_max_frames, taps),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, refill_max_frames, taps),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, refill_max_frames, taps),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

/// Local refill buffer for the callback, so it can run between queue locks.
struct Refill {
    pos: usize,
    src_channels: usize,
    src: Vec<f32>,
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<AudioQueue>,
    refill_max_frames: usize,
    taps: OutputTaps,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let refill_max_frames = refill_max_frames.max(1);

    let refill = Arc::new(Mutex::new(Refill {
        pos: 0,
        src_channels: queue.channels(),
        src: Vec::new(),
    }));

    let queue_cb = queue.clone();
    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if taps.paused.load(Ordering::Relaxed) {
                data.fill(silence::<T>());
                return;
            }

            let gain = taps.volume.get();
            let mut refill = refill.lock().unwrap();

            let frames = data.len() / channels_out;
            let mut filled = 0usize;

            for frame in 0..frames {
                if refill.pos >= refill.src.len() {
                    refill.pos = 0;
                    refill.src.clear();
                    match queue_cb.pop(Pop::Immediate { max_frames: refill_max_frames }) {
                        Some(chunk) => refill.src = chunk,
                        None => {
                            if queue_cb.is_drained() {
                                taps.finished.store(true, Ordering::Relaxed);
                            }
                            for slot in &mut data[frame * channels_out..] {
                                *slot = silence::<T>();
                            }
                            break;
                        }
                    }
                }
                for ch in 0..channels_out {
                    let sample = gain * next_mapped_sample(&mut refill, channels_out, ch);
                    data[frame * channels_out + ch] =
                        <T as cpal::Sample>::from_sample::<f32>(sample);
                }
                filled += 1;
            }

            if filled > 0 {
                taps.played_frames.fetch_add(filled as u64, Ordering::Relaxed);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

fn silence<T: cpal::Sample + cpal::FromSample<f32>>() -> T {
    <T as cpal::Sample>::from_sample::<f32>(0.0)
}

/// Read one output sample for `dst_ch`, applying a simple channel mapping:
/// mono↔stereo duplicated/averaged, other layouts clamped to available
/// channels. `pos` advances once per destination frame.
fn next_mapped_sample(refill: &mut Refill, dst_channels: usize, dst_ch: usize) -> f32 {
    if refill.pos >= refill.src.len() {
        return 0.0;
    }

    let start = refill.pos;
    let src = |ch: usize| -> f32 {
        if ch < refill.src_channels && start + ch < refill.src.len() {
            refill.src[start + ch]
        } else {
            0.0
        }
    };

    let out = match (refill.src_channels, dst_channels) {
        (1, _) => src(0),
        (2, 1) => 0.5 * (src(0) + src(1)),
        (2, 2) => src(dst_ch.min(1)),
        _ => src(dst_ch.min(refill.src_channels.saturating_sub(1))),
    };

    if dst_ch + 1 == dst_channels {
        refill.pos += refill.src_channels;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_unit_bounds_and_nan() {
        assert_eq!(clamp_unit(-1.0), 0.0);
        assert_eq!(clamp_unit(0.0), 0.0);
        assert_eq!(clamp_unit(0.7), 0.7);
        assert_eq!(clamp_unit(2.0), 1.0);
        assert_eq!(clamp_unit(f32::NAN), 0.0);
    }

    #[test]
    fn shared_volume_clamps_on_set() {
        let volume = SharedVolume::new(0.5);
        volume.set(2.0);
        assert_eq!(volume.get(), 1.0);
        volume.set(-3.0);
        assert_eq!(volume.get(), 0.0);
    }

    #[test]
    fn clamped_extremes_are_idempotent() {
        let low = SharedVolume::new(-1.0);
        let zero = SharedVolume::new(0.0);
        assert_eq!(low.get(), zero.get());

        let high = SharedVolume::new(2.0);
        let one = SharedVolume::new(1.0);
        assert_eq!(high.get(), one.get());
    }

    #[test]
    fn mono_source_duplicates_to_stereo() {
        let mut refill = Refill {
            pos: 0,
            src_channels: 1,
            src: vec![0.25, 0.5],
        };
        assert_eq!(next_mapped_sample(&mut refill, 2, 0), 0.25);
        assert_eq!(next_mapped_sample(&mut refill, 2, 1), 0.25);
        assert_eq!(next_mapped_sample(&mut refill, 2, 0), 0.5);
        assert_eq!(next_mapped_sample(&mut refill, 2, 1), 0.5);
    }

    #[test]
    fn stereo_source_averages_to_mono() {
        let mut refill = Refill {
            pos: 0,
            src_channels: 2,
            src: vec![0.2, 0.4],
        };
        let out = next_mapped_sample(&mut refill, 1, 0);
        assert!((out - 0.3).abs() < 1e-6);
    }

    #[test]
    fn exhausted_refill_yields_silence() {
        let mut refill = Refill {
            pos: 2,
            src_channels: 2,
            src: vec![0.2, 0.4],
        };
        assert_eq!(next_mapped_sample(&mut refill, 2, 0), 0.0);
    }
}
