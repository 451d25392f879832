//! Narration context.
//!
//! Plays one page's narration at a time. Audio arriving for a request that
//! has since been replaced is dropped before it can reach the output, and
//! word highlighting is driven from the decoded audio duration.
//!
//! Playback goes through an [`AudioBackend`]. [`TimedBackend`] is the
//! headless default: it has no device and reports each buffer as ended
//! after its duration, so a controller can run where no audio output
//! exists.

pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod highlight;
pub mod output;

#[cfg(test)]
mod testing;

pub use audio::{DecodedAudio, decode_pcm16le};
pub use config::NarrationConfig;
pub use controller::{Highlight, NarrationController, NarrationOutcome, NarrationState, PageId};
pub use error::NarrationError;
pub use highlight::{HighlightSchedule, HighlightTimer};
pub use output::{AudioBackend, AudioOutput, PlaybackSource, TimedBackend};
