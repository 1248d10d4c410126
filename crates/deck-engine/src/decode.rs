//! Streaming audio decode stage.
//!
//! Probing and decoding are split so the engine can fully validate a file
//! (container, codec, channel layout, duration) before it touches the session
//! it may be replacing. [`probe_file`] does the validation; [`start_decode`]
//! spawns the background thread that feeds interleaved `f32` samples into a
//! bounded [`AudioQueue`], closing it on EOF or error.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::queue::{AudioQueue, capacity_for};

/// A probed, not-yet-decoding audio source.
///
/// Holding one of these proves the file opened and its default track has a
/// known rate and channel layout; no device or thread resources exist yet.
pub struct ProbedSource {
    format: Box<dyn FormatReader>,
    codec_params: CodecParameters,
    /// Sample rate and channel layout of the default track.
    pub spec: SignalSpec,
    /// Total duration, when the container reports it.
    pub duration: Option<Duration>,
}

/// Open and probe `path`, validating that it contains a decodable track.
pub fn probe_file(path: &Path) -> Result<ProbedSource> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probe {}", path.display()))?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default audio track in {}", path.display()))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| anyhow!("unknown channel layout"))?;
    let rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("unknown sample rate"))?;

    let codec_params = track.codec_params.clone();
    let duration = duration_from_params(&codec_params);

    Ok(ProbedSource {
        format,
        codec_params,
        spec: SignalSpec::new(rate, channels),
        duration,
    })
}

/// Start the background decoder thread for a probed source.
///
/// The returned queue carries interleaved `f32` at the source rate and is
/// closed when decoding finishes or fails.
pub fn start_decode(source: ProbedSource, buffer_seconds: f32) -> Arc<AudioQueue> {
    let channels = source.spec.channels.count();
    let capacity = capacity_for(source.spec.rate, channels, buffer_seconds);
    let queue = Arc::new(AudioQueue::new(channels, capacity));

    let queue_for_thread = queue.clone();
    thread::spawn(move || {
        if let Err(e) = decode_loop(source.format, source.codec_params, &queue_for_thread) {
            tracing::error!("decoder thread error: {e:#}");
        }
        queue_for_thread.close();
    });

    queue
}

/// Decode packets and push interleaved `f32` into `queue` until EOF.
fn decode_loop(
    mut format: Box<dyn FormatReader>,
    codec_params: CodecParameters,
    queue: &Arc<AudioQueue>,
) -> Result<()> {
    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break, // EOF
        };

        // Skip undecodable packets rather than aborting the whole track.
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };

        let mut samples = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        samples.copy_interleaved_ref(decoded);
        queue.push_blocking(samples.samples());

        if queue.is_closed() {
            break; // session was torn down under us
        }
    }

    Ok(())
}

/// Best-effort total duration from codec metadata.
fn duration_from_params(params: &CodecParameters) -> Option<Duration> {
    let frames = params.n_frames?;
    let rate = params.sample_rate?;
    if rate == 0 {
        return None;
    }
    Some(Duration::from_millis(
        frames.saturating_mul(1000) / rate as u64,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Pop;
    use std::io::Write;

    /// Write a minimal PCM WAV file: 16-bit mono, `rate` Hz, `frames` samples.
    fn write_wav(path: &Path, rate: u32, frames: u32) {
        let data_len = frames * 2;
        let mut f = File::create(path).unwrap();
        f.write_all(b"RIFF").unwrap();
        f.write_all(&(36 + data_len).to_le_bytes()).unwrap();
        f.write_all(b"WAVEfmt ").unwrap();
        f.write_all(&16u32.to_le_bytes()).unwrap(); // fmt chunk size
        f.write_all(&1u16.to_le_bytes()).unwrap(); // PCM
        f.write_all(&1u16.to_le_bytes()).unwrap(); // mono
        f.write_all(&rate.to_le_bytes()).unwrap();
        f.write_all(&(rate * 2).to_le_bytes()).unwrap(); // byte rate
        f.write_all(&2u16.to_le_bytes()).unwrap(); // block align
        f.write_all(&16u16.to_le_bytes()).unwrap(); // bits per sample
        f.write_all(b"data").unwrap();
        f.write_all(&data_len.to_le_bytes()).unwrap();
        for i in 0..frames {
            let sample = ((i % 100) as i16) << 6;
            f.write_all(&sample.to_le_bytes()).unwrap();
        }
    }

    fn temp_wav(name: &str, rate: u32, frames: u32) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("deck-engine-test-{name}.wav"));
        write_wav(&path, rate, frames);
        path
    }

    #[test]
    fn probe_reports_spec_and_duration() {
        let path = temp_wav("probe", 8_000, 8_000);
        let probed = probe_file(&path).unwrap();
        assert_eq!(probed.spec.rate, 8_000);
        assert_eq!(probed.spec.channels.count(), 1);
        let duration = probed.duration.unwrap();
        assert_eq!(duration.as_millis(), 1_000);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn probe_missing_file_fails() {
        assert!(probe_file(Path::new("/no/such/file.wav")).is_err());
    }

    #[test]
    fn probe_rejects_non_audio_content() {
        let path = std::env::temp_dir().join("deck-engine-test-garbage.wav");
        std::fs::write(&path, b"this is not a wav file at all").unwrap();
        assert!(probe_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn decode_produces_all_frames_then_closes() {
        let path = temp_wav("decode", 8_000, 800);
        let probed = probe_file(&path).unwrap();
        let queue = start_decode(probed, 2.0);

        let mut total = 0usize;
        while let Some(chunk) = queue.pop(Pop::UpTo { max_frames: 512 }) {
            total += chunk.len();
        }
        assert_eq!(total, 800); // mono: one sample per frame
        assert!(queue.is_drained());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn duration_from_params_handles_missing_rate() {
        let mut params = CodecParameters::new();
        params.n_frames = Some(100);
        assert!(duration_from_params(&params).is_none());
        params.sample_rate = Some(0);
        assert!(duration_from_params(&params).is_none());
        params.sample_rate = Some(48_000);
        params.n_frames = Some(96_000);
        assert_eq!(duration_from_params(&params).unwrap().as_millis(), 2_000);
    }
}
