//! Shared test fakes and fixtures for the Piggybook storybook engine.

mod clock;
mod fixtures;
mod providers;
mod store;

pub use clock::FixedClock;
pub use fixtures::{pcm_silence, sample_story};
pub use providers::{
    GatedSynthesizer, ScriptedImageGenerator, ScriptedStoryGenerator, ScriptedSynthesizer,
};
pub use store::{FailingStore, RecordingStore};
