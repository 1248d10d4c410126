//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL for listing output devices, selecting either the
//! default device or one by substring match, and choosing a stream config
//! close to the source sample rate.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Pick the first output device matching `needle` (case-insensitive), or the
/// default device when `needle` is `None`.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let mut devices: Vec<cpal::Device> = host
        .output_devices()
        .context("No output devices")?
        .collect();

    if let Some(needle) = needle {
        if let Some(d) = devices.drain(..).find(|d| {
            d.description()
                .ok()
                .map(|n| matches_device_name(&n.name(), needle))
                .unwrap_or(false)
        }) {
            return Ok(d);
        }
        return Err(anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Choose the best output config for a target sample rate.
///
/// Prefers an exact rate match, then the highest rate at or below the target,
/// then the lowest rate above it; ties break toward friendlier sample formats.
pub fn pick_output_config(
    device: &cpal::Device,
    target_rate: Option<u32>,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> =
        device.supported_output_configs()?.collect();
    if ranges.is_empty() {
        return Err(anyhow!("No supported output configs"));
    }

    let mut best: Option<(bool, u32, u8, cpal::SupportedStreamConfig)> = None;

    for range in ranges {
        let rate = rate_for_range(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let below = target_rate.map(|t| rate <= t).unwrap_or(true);
        let rank = sample_format_rank(range.sample_format());
        let replace = match &best {
            None => true,
            Some((b_below, b_rate, b_rank, _)) => {
                prefer_candidate(below, rate, rank, *b_below, *b_rate, *b_rank)
            }
        };
        if replace {
            best = Some((below, rate, rank, range.with_sample_rate(rate)));
        }
    }

    Ok(best.unwrap().3)
}

/// Prefer a fixed buffer size when the device advertises a range.
///
/// Larger buffers reduce underruns; `None` leaves CPAL on the device default.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            const MAX_FRAMES: u32 = 16_384;
            let chosen = if *max > MAX_FRAMES {
                if *min > MAX_FRAMES { *min } else { MAX_FRAMES }
            } else {
                *max
            };
            Some(cpal::BufferSize::Fixed(chosen))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Print available output devices to stdout (`devices` subcommand UX).
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

fn rate_for_range(min: u32, max: u32, target_rate: Option<u32>) -> u32 {
    match target_rate {
        Some(target) if target < min => min,
        Some(target) if target > max => max,
        Some(target) => target,
        None => max,
    }
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn prefer_candidate(
    below: bool,
    rate: u32,
    rank: u8,
    best_below: bool,
    best_rate: u32,
    best_rank: u8,
) -> bool {
    if below != best_below {
        below && !best_below
    } else if rate != best_rate {
        rate > best_rate
    } else {
        rank < best_rank
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_for_range_prefers_target_when_in_range() {
        assert_eq!(rate_for_range(44_100, 96_000, Some(48_000)), 48_000);
    }

    #[test]
    fn rate_for_range_clamps_to_bounds() {
        assert_eq!(rate_for_range(44_100, 96_000, Some(22_050)), 44_100);
        assert_eq!(rate_for_range(44_100, 96_000, Some(192_000)), 96_000);
    }

    #[test]
    fn rate_for_range_defaults_to_max() {
        assert_eq!(rate_for_range(44_100, 96_000, None), 96_000);
    }

    #[test]
    fn prefer_candidate_ranks_below_then_rate_then_format() {
        assert!(prefer_candidate(true, 48_000, 1, false, 48_000, 1));
        assert!(prefer_candidate(true, 96_000, 2, true, 48_000, 2));
        assert!(prefer_candidate(true, 48_000, 0, true, 48_000, 2));
        assert!(!prefer_candidate(false, 48_000, 0, true, 48_000, 0));
    }

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", "USB"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", ""));
    }
}
