/// Engine tuning parameters shared by decode/resample/playback stages.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Use a specific output device by substring match; `None` for the default.
    pub device: Option<String>,
    /// Decoder/resampler chunk size in frames.
    pub chunk_frames: usize,
    /// Max frames pulled per output callback refill.
    pub refill_max_frames: usize,
    /// Target buffer duration for queue sizing.
    pub buffer_seconds: f32,
}

impl Default for EngineConfig {
    /// Defaults tuned for low-risk playback across common devices.
    fn default() -> Self {
        Self {
            device: None,
            chunk_frames: 1024,
            refill_max_frames: 4096,
            buffer_seconds: 2.0,
        }
    }
}
