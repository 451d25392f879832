//! Audio output ports.
//!
//! One [`AudioOutput`] is opened per controller and reused. Each narration
//! plays through its own [`PlaybackSource`], which must go silent as soon as
//! [`PlaybackSource::stop`] returns.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::audio::DecodedAudio;
use crate::error::NarrationError;

/// Opens the shared audio output.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Opens an output running at `sample_rate`.
    ///
    /// # Errors
    ///
    /// Returns `NarrationError::Output` when no output is available.
    async fn open(&self, sample_rate: u32) -> Result<Arc<dyn AudioOutput>, NarrationError>;
}

/// A device (or stand-in) that plays decoded buffers.
pub trait AudioOutput: Send + Sync {
    /// Connects `audio` to the output and starts it. `ended` fires once,
    /// when playback reaches the end on its own; it is dropped unsent if the
    /// source is stopped first.
    ///
    /// # Errors
    ///
    /// Returns `NarrationError::Output` if playback cannot start.
    fn play(
        &self,
        audio: Arc<DecodedAudio>,
        ended: oneshot::Sender<()>,
    ) -> Result<Box<dyn PlaybackSource>, NarrationError>;
}

/// One buffer connected to the output.
pub trait PlaybackSource: Send {
    /// Disconnects the buffer immediately.
    fn stop(&mut self);
}

/// An output with no device behind it: each buffer "plays" for its
/// duration on the tokio timer and then reports that it ended.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimedBackend;

#[async_trait]
impl AudioBackend for TimedBackend {
    async fn open(&self, sample_rate: u32) -> Result<Arc<dyn AudioOutput>, NarrationError> {
        if sample_rate == 0 {
            return Err(NarrationError::Output("sample rate must be positive".to_owned()));
        }
        Ok(Arc::new(TimedOutput))
    }
}

#[derive(Debug)]
struct TimedOutput;

impl AudioOutput for TimedOutput {
    fn play(
        &self,
        audio: Arc<DecodedAudio>,
        ended: oneshot::Sender<()>,
    ) -> Result<Box<dyn PlaybackSource>, NarrationError> {
        let task = tokio::spawn(async move {
            tokio::time::sleep(audio.duration()).await;
            let _ = ended.send(());
        });
        Ok(Box::new(TimedSource { task }))
    }
}

#[derive(Debug)]
struct TimedSource {
    task: JoinHandle<()>,
}

impl PlaybackSource for TimedSource {
    fn stop(&mut self) {
        self.task.abort();
    }
}

impl Drop for TimedSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}
