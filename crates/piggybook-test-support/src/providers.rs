//! Test providers: scripted `StoryGenerator`, `ImageGenerator` and
//! `SpeechSynthesizer` implementations for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use piggybook_core::error::ProviderError;
use piggybook_core::provider::{ImageGenerator, SpeechSynthesizer, StoryGenerator};
use piggybook_core::story::{AudioBytes, ImageRef, StoryDocument};
use tokio::sync::{Notify, oneshot};

/// Pops the next scripted result, repeating the last one once the script
/// runs out.
fn next_scripted<T: Clone>(script: &Mutex<VecDeque<T>>) -> T {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        script
            .front()
            .cloned()
            .expect("scripted provider needs at least one result")
    }
}

/// A story generator that replays a script of results and records every
/// request.
#[derive(Debug)]
pub struct ScriptedStoryGenerator {
    script: Mutex<VecDeque<Result<StoryDocument, ProviderError>>>,
    requests: Mutex<Vec<(u32, String)>>,
    latency: Duration,
}

impl ScriptedStoryGenerator {
    /// Returns the results in order, repeating the last one.
    ///
    /// # Panics
    ///
    /// Panics if `script` is empty.
    #[must_use]
    pub fn new(script: Vec<Result<StoryDocument, ProviderError>>) -> Self {
        assert!(!script.is_empty(), "script must not be empty");
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Always returns `document`.
    #[must_use]
    pub fn always(document: StoryDocument) -> Self {
        Self::new(vec![Ok(document)])
    }

    /// Always fails with `error`.
    #[must_use]
    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Sleeps for `latency` (on the tokio timer) before answering.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of calls made so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every `(age, concept)` pair requested, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<(u32, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoryGenerator for ScriptedStoryGenerator {
    async fn generate_story(
        &self,
        age: u32,
        concept: &str,
    ) -> Result<StoryDocument, ProviderError> {
        self.requests.lock().unwrap().push((age, concept.to_owned()));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        next_scripted(&self.script)
    }
}

/// An image generator that derives an image reference from the prompt, or
/// replays a script of results.
#[derive(Debug)]
pub struct ScriptedImageGenerator {
    script: Option<Mutex<VecDeque<Result<Option<ImageRef>, ProviderError>>>>,
    prompts: Mutex<Vec<String>>,
    latency: Duration,
}

impl ScriptedImageGenerator {
    /// Answers every prompt with `image://<prompt>`.
    #[must_use]
    pub fn echo() -> Self {
        Self {
            script: None,
            prompts: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Returns the results in order, repeating the last one.
    ///
    /// # Panics
    ///
    /// Panics if `script` is empty.
    #[must_use]
    pub fn new(script: Vec<Result<Option<ImageRef>, ProviderError>>) -> Self {
        assert!(!script.is_empty(), "script must not be empty");
        Self {
            script: Some(Mutex::new(script.into())),
            prompts: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Sleeps for `latency` (on the tokio timer) before answering.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of calls made so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Every prompt received, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<Option<ImageRef>, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_owned());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match &self.script {
            Some(script) => next_scripted(script),
            None => Ok(Some(ImageRef(format!("image://{prompt}")))),
        }
    }
}

/// A speech synthesizer that answers immediately from a script.
#[derive(Debug)]
pub struct ScriptedSynthesizer {
    script: Mutex<VecDeque<Result<Option<AudioBytes>, ProviderError>>>,
    texts: Mutex<Vec<String>>,
}

impl ScriptedSynthesizer {
    /// Returns the results in order, repeating the last one.
    ///
    /// # Panics
    ///
    /// Panics if `script` is empty.
    #[must_use]
    pub fn new(script: Vec<Result<Option<AudioBytes>, ProviderError>>) -> Self {
        assert!(!script.is_empty(), "script must not be empty");
        Self {
            script: Mutex::new(script.into()),
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Always returns `audio`.
    #[must_use]
    pub fn always(audio: AudioBytes) -> Self {
        Self::new(vec![Ok(Some(audio))])
    }

    /// Number of calls made so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }

    /// Every text received, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Option<AudioBytes>, ProviderError> {
        self.texts.lock().unwrap().push(text.to_owned());
        next_scripted(&self.script)
    }
}

type SynthesisReply = Result<Option<AudioBytes>, ProviderError>;

#[derive(Debug)]
struct PendingSynthesis {
    text: String,
    reply: Option<oneshot::Sender<SynthesisReply>>,
}

/// A speech synthesizer whose calls stay pending until the test releases
/// them, in any order. Used to interleave narration requests precisely.
#[derive(Debug, Default)]
pub struct GatedSynthesizer {
    pending: Mutex<Vec<PendingSynthesis>>,
    arrived: Notify,
}

impl GatedSynthesizer {
    /// Creates a gate with no pending calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls received so far (released or not).
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Text of the `index`-th call.
    ///
    /// # Panics
    ///
    /// Panics if no such call was made.
    pub fn text(&self, index: usize) -> String {
        self.pending.lock().unwrap()[index].text.clone()
    }

    /// Waits until at least `count` calls have arrived.
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let arrived = self.arrived.notified();
            if self.calls() >= count {
                return;
            }
            arrived.await;
        }
    }

    /// Completes the `index`-th call with `reply`. Does nothing if the caller
    /// has gone away.
    ///
    /// # Panics
    ///
    /// Panics if no such call was made or it was already released.
    pub fn release(&self, index: usize, reply: SynthesisReply) {
        let sender = self.pending.lock().unwrap()[index]
            .reply
            .take()
            .expect("synthesis call already released");
        let _ = sender.send(reply);
    }
}

#[async_trait]
impl SpeechSynthesizer for GatedSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Option<AudioBytes>, ProviderError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push(PendingSynthesis {
            text: text.to_owned(),
            reply: Some(tx),
        });
        self.arrived.notify_waiters();
        rx.await
            .unwrap_or_else(|_| Err(ProviderError::Failed("gate dropped".into())))
    }
}
