//! Streaming resample stage.
//!
//! Converts decoded interleaved `f32` audio from the source rate to the output
//! device rate with Rubato's streaming sinc resampler. Runs in a background
//! thread and writes into a bounded [`AudioQueue`] consumed by the playback
//! stage. Inserted only when the rates differ.

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};
use symphonia::core::audio::SignalSpec;

use crate::queue::{AudioQueue, Pop, capacity_for};

/// Configuration for the streaming resampler stage.
#[derive(Clone, Copy, Debug)]
pub struct ResampleConfig {
    /// Input chunk size in frames for the steady-state loop.
    pub chunk_frames: usize,
    /// Target buffering (seconds) for the output queue.
    pub buffer_seconds: f32,
}

/// Start a background resampler thread.
///
/// Reads interleaved `f32` at `src_spec.rate` from `srcq` and produces
/// interleaved `f32` at `dst_rate` into the returned queue. The output queue
/// closes when the input closes and the tail has been flushed.
pub fn start_resampler(
    srcq: Arc<AudioQueue>,
    src_spec: SignalSpec,
    dst_rate: u32,
    cfg: ResampleConfig,
) -> Result<Arc<AudioQueue>> {
    let channels = src_spec.channels.count();
    let dstq = Arc::new(AudioQueue::new(
        channels,
        capacity_for(dst_rate, channels, cfg.buffer_seconds),
    ));

    let f_ratio = dst_rate as f64 / src_spec.rate as f64;
    let chunk_frames = cfg.chunk_frames.max(1);

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let dstq_thread = dstq.clone();
    thread::spawn(move || {
        let mut resampler: Box<dyn Resampler<f32>> =
            match Async::<f32>::new_sinc(f_ratio, 1.1, &params, chunk_frames, channels, FixedAsync::Input) {
                Ok(r) => Box::new(r),
                Err(e) => {
                    tracing::error!("resampler init error: {e:#}");
                    dstq_thread.close();
                    return;
                }
            };

        // Output scratch with headroom over the nominal ratio.
        let mut scratch = vec![0.0f32; channels * chunk_frames * 3];

        // Steady state: full chunks.
        while let Some(chunk) = srcq.pop(Pop::Exact { frames: chunk_frames }) {
            if !run_chunk(&mut *resampler, &chunk, chunk_frames, None, channels, &mut scratch, &dstq_thread) {
                dstq_thread.close();
                return;
            }
        }

        // Tail: whatever partial frames remain after the source closed.
        while let Some(tail) = srcq.pop(Pop::UpTo { max_frames: chunk_frames }) {
            let tail_frames = tail.len() / channels;
            if tail_frames == 0 {
                continue;
            }
            if !run_chunk(
                &mut *resampler,
                &tail,
                tail_frames,
                Some(tail_frames),
                channels,
                &mut scratch,
                &dstq_thread,
            ) {
                break;
            }
        }

        dstq_thread.close();
    });

    Ok(dstq)
}

/// Resample one input chunk into `dstq`; returns `false` on a stage error.
fn run_chunk(
    resampler: &mut dyn Resampler<f32>,
    input: &[f32],
    input_frames: usize,
    partial_len: Option<usize>,
    channels: usize,
    scratch: &mut [f32],
    dstq: &Arc<AudioQueue>,
) -> bool {
    let input_adapter = match InterleavedSlice::new(input, channels, input_frames) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("interleaved slice (input) error: {e:#}");
            return false;
        }
    };

    let scratch_frames = scratch.len() / channels;
    let mut output_adapter = match InterleavedSlice::new_mut(scratch, channels, scratch_frames) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("interleaved slice (output) error: {e:#}");
            return false;
        }
    };

    let indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len,
    };

    let (_consumed, produced) =
        match resampler.process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing)) {
            Ok(x) => x,
            Err(e) => {
                tracing::error!("resampler process error: {e:#}");
                return false;
            }
        };

    if produced > 0 {
        dstq.push_blocking(&scratch[..produced * channels]);
    }
    true
}
