//! Recording audio backend for controller tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::audio::DecodedAudio;
use crate::error::NarrationError;
use crate::output::{AudioBackend, AudioOutput, PlaybackSource};

#[derive(Default)]
struct OutputLog {
    played: Vec<Duration>,
    ended: Vec<Option<oneshot::Sender<()>>>,
    live: HashSet<usize>,
    max_live: usize,
}

/// Records what was played and lets the test end playback by hand.
#[derive(Default)]
pub(crate) struct RecordingOutput {
    log: Arc<Mutex<OutputLog>>,
}

impl RecordingOutput {
    /// Durations of every buffer started, in order.
    pub(crate) fn played(&self) -> Vec<Duration> {
        self.log.lock().unwrap().played.clone()
    }

    /// Buffers currently connected.
    pub(crate) fn live_count(&self) -> usize {
        self.log.lock().unwrap().live.len()
    }

    /// Highest number of buffers ever connected at once.
    pub(crate) fn max_live(&self) -> usize {
        self.log.lock().unwrap().max_live
    }

    /// Fires the end-of-playback signal of the `index`-th buffer, even if it
    /// was stopped.
    pub(crate) fn end(&self, index: usize) {
        let sender = self.log.lock().unwrap().ended[index].take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }
}

impl AudioOutput for RecordingOutput {
    fn play(
        &self,
        audio: Arc<DecodedAudio>,
        ended: oneshot::Sender<()>,
    ) -> Result<Box<dyn PlaybackSource>, NarrationError> {
        let mut log = self.log.lock().unwrap();
        let index = log.played.len();
        log.played.push(audio.duration());
        log.ended.push(Some(ended));
        log.live.insert(index);
        log.max_live = log.max_live.max(log.live.len());
        Ok(Box::new(RecordingSource {
            index,
            log: Arc::clone(&self.log),
        }))
    }
}

struct RecordingSource {
    index: usize,
    log: Arc<Mutex<OutputLog>>,
}

impl PlaybackSource for RecordingSource {
    fn stop(&mut self) {
        self.log.lock().unwrap().live.remove(&self.index);
    }
}

/// Hands out one shared [`RecordingOutput`] and counts how often it was
/// opened.
#[derive(Default)]
pub(crate) struct RecordingBackend {
    pub(crate) output: Arc<RecordingOutput>,
    opens: AtomicUsize,
    unavailable: bool,
}

impl RecordingBackend {
    pub(crate) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioBackend for RecordingBackend {
    async fn open(&self, _sample_rate: u32) -> Result<Arc<dyn AudioOutput>, NarrationError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(NarrationError::Output("no audio device".to_owned()));
        }
        let output: Arc<dyn AudioOutput> = self.output.clone();
        Ok(output)
    }
}
