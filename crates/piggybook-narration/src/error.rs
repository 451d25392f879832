//! Errors for the Narration context.
//!
//! None of these reach the caller of `speak`; they are logged and mapped to
//! `NarrationOutcome::Failed`.

use piggybook_core::error::ProviderError;
use thiserror::Error;

use crate::audio::DecodeError;

/// Why a narration could not be played.
#[derive(Debug, Error)]
pub enum NarrationError {
    /// The speech provider failed (after retries, if rate limited).
    #[error("speech synthesis failed: {0}")]
    Synthesis(#[source] ProviderError),

    /// The speech provider answered without audio.
    #[error("speech provider returned no audio")]
    NoAudio,

    /// The audio bytes are not valid PCM.
    #[error("audio could not be decoded: {0}")]
    Decode(#[from] DecodeError),

    /// The audio output could not be opened or refused to play.
    #[error("audio output unavailable: {0}")]
    Output(String),
}
