//! PCM decoding.

use std::time::Duration;

use thiserror::Error;

/// Raw audio bytes that are not a valid 16-bit PCM stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No bytes at all.
    #[error("audio is empty")]
    Empty,
    /// The byte count does not divide into whole frames.
    #[error("{len} bytes is not a whole number of {channels}-channel 16-bit frames")]
    PartialFrame {
        /// Byte count received.
        len: usize,
        /// Channel count expected.
        channels: u16,
    },
    /// The decoding task died before finishing.
    #[error("decoding was interrupted: {0}")]
    Interrupted(String),
    /// Sample rate or channel count is zero.
    #[error("unsupported format: {sample_rate} Hz, {channels} channels")]
    UnsupportedFormat {
        /// Requested sample rate.
        sample_rate: u32,
        /// Requested channel count.
        channels: u16,
    },
}

/// A decoded, playable buffer of interleaved samples in `[-1.0, 1.0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl DecodedAudio {
    /// Interleaved samples.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Samples per second per channel.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels.
    #[must_use]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (one sample per channel).
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Playback length.
    #[must_use]
    pub fn duration(&self) -> Duration {
        let frames = u64::try_from(self.frames()).unwrap_or(u64::MAX);
        let nanos = u128::from(frames) * 1_000_000_000 / u128::from(self.sample_rate);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Decodes signed 16-bit little-endian interleaved PCM.
///
/// # Errors
///
/// Returns `DecodeError` for empty input, a trailing partial frame, or a
/// zero sample rate or channel count.
pub fn decode_pcm16le(
    bytes: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<DecodedAudio, DecodeError> {
    if sample_rate == 0 || channels == 0 {
        return Err(DecodeError::UnsupportedFormat {
            sample_rate,
            channels,
        });
    }
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() % (2 * usize::from(channels)) != 0 {
        return Err(DecodeError::PartialFrame {
            len: bytes.len(),
            channels,
        });
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32_768.0)
        .collect();
    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}
