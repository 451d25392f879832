//! Narration configuration.

use std::time::Duration;

use piggybook_core::retry::BackoffPolicy;

/// Tunables for a [`crate::NarrationController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarrationConfig {
    /// How often the highlighter samples elapsed playback time.
    pub poll_interval: Duration,
    /// Sample rate of the synthesizer's PCM output.
    pub sample_rate: u32,
    /// Channel count of the synthesizer's PCM output.
    pub channels: u16,
    /// Retry policy for speech synthesis.
    pub policy: BackoffPolicy,
}

impl NarrationConfig {
    /// Default highlight polling interval.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
    /// Gemini TTS emits 24 kHz audio.
    pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            sample_rate: Self::DEFAULT_SAMPLE_RATE,
            channels: 1,
            policy: BackoffPolicy::default(),
        }
    }
}
