//! The narration session controller.
//!
//! `Idle → Requesting → Playing → Idle`. Every await in [`NarrationController::speak`]
//! is followed by a check that the request is still the newest one for the
//! page on screen; a request that lost the race is dropped without touching
//! the output, the highlight or the state.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use piggybook_core::fingerprint::RequestFingerprint;
use piggybook_core::provider::SpeechSynthesizer;
use piggybook_core::retry;
use piggybook_core::story::AudioBytes;
use tokio::sync::{OnceCell, oneshot, watch};
use tracing::{debug, info, instrument, warn};

use crate::audio::{DecodeError, DecodedAudio, decode_pcm16le};
use crate::config::NarrationConfig;
use crate::error::NarrationError;
use crate::highlight::{HighlightSchedule, HighlightTimer};
use crate::output::{AudioBackend, AudioOutput, PlaybackSource};

/// Identity of a page on screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageId {
    /// The story the page belongs to.
    pub story: RequestFingerprint,
    /// 1-based page number.
    pub page_number: u32,
}

impl PageId {
    /// Creates a page identity.
    #[must_use]
    pub fn new(story: RequestFingerprint, page_number: u32) -> Self {
        Self { story, page_number }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.story, self.page_number)
    }
}

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NarrationState {
    /// Nothing requested or playing.
    #[default]
    Idle,
    /// Waiting for audio.
    Requesting,
    /// Audio is connected to the output.
    Playing,
}

/// The word currently highlighted, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Highlight {
    /// The page being narrated or shown.
    pub page: Option<PageId>,
    /// Index into the page text's whitespace-separated words.
    pub index: Option<usize>,
}

/// What became of one [`NarrationController::speak`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    /// Audio is playing under this handle.
    Started {
        /// Identifies the playback for end-of-playback matching.
        handle_id: u64,
    },
    /// A newer request, page change or teardown replaced this one.
    Superseded,
    /// No audio could be produced; the page stays silent.
    Failed,
}

#[derive(Debug, Clone)]
struct NarrationRequest {
    sequence: u64,
    page: PageId,
}

struct LiveNarration {
    handle_id: u64,
    source: Box<dyn PlaybackSource>,
    timer: Option<HighlightTimer>,
}

#[derive(Default)]
struct Session {
    current: u64,
    active_page: Option<PageId>,
    live: Option<LiveNarration>,
    next_handle: u64,
}

impl Session {
    fn is_current(&self, request: &NarrationRequest) -> bool {
        self.current == request.sequence && self.active_page.as_ref() == Some(&request.page)
    }

    fn live_handle(&self) -> Option<u64> {
        self.live.as_ref().map(|live| live.handle_id)
    }

    fn halt(&mut self) -> Option<u64> {
        let mut live = self.live.take()?;
        live.source.stop();
        if let Some(timer) = &live.timer {
            timer.stop();
        }
        Some(live.handle_id)
    }
}

struct Shared {
    session: Mutex<Session>,
    state: watch::Sender<NarrationState>,
    highlight: watch::Sender<Highlight>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stops the live narration and invalidates every outstanding request.
    fn interrupt(&self, session: &mut Session, reason: &'static str) {
        session.current += 1;
        if let Some(handle_id) = session.halt() {
            debug!(handle_id, reason, "narration stopped");
        }
        self.state.send_replace(NarrationState::Idle);
        self.highlight.send_replace(Highlight {
            page: session.active_page.clone(),
            index: None,
        });
    }

    fn finish(&self, handle_id: u64) {
        let mut session = self.session();
        if session.live_handle() != Some(handle_id) {
            debug!(handle_id, "ignoring end of a narration that is no longer live");
            return;
        }
        session.halt();
        info!(handle_id, "narration ended");
        self.state.send_replace(NarrationState::Idle);
        self.highlight.send_replace(Highlight {
            page: session.active_page.clone(),
            index: None,
        });
    }

    fn emit(&self, handle_id: u64, page: &PageId, index: usize) {
        let session = self.session();
        if session.live_handle() == Some(handle_id) {
            self.highlight.send_replace(Highlight {
                page: Some(page.clone()),
                index: Some(index),
            });
        }
    }
}

/// Plays at most one page narration at a time with word highlighting.
///
/// Narration is best effort: failures are logged and leave the page silent.
pub struct NarrationController {
    shared: Arc<Shared>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    backend: Arc<dyn AudioBackend>,
    output: OnceCell<Arc<dyn AudioOutput>>,
    config: NarrationConfig,
}

impl NarrationController {
    /// Creates an idle controller. The audio output is opened on first
    /// playback.
    #[must_use]
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        backend: Arc<dyn AudioBackend>,
        config: NarrationConfig,
    ) -> Self {
        let (state, _) = watch::channel(NarrationState::Idle);
        let (highlight, _) = watch::channel(Highlight::default());
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(Session::default()),
                state,
                highlight,
            }),
            synthesizer,
            backend,
            output: OnceCell::new(),
            config,
        }
    }

    /// Narrates `text` for `page`, replacing whatever was playing.
    #[instrument(skip(self, text), fields(page = %page))]
    pub async fn speak(&self, text: &str, page: PageId) -> NarrationOutcome {
        let request = {
            let mut session = self.shared.session();
            if let Some(handle_id) = session.halt() {
                debug!(handle_id, "stopping previous narration");
            }
            session.current += 1;
            session.active_page = Some(page.clone());
            self.shared.state.send_replace(NarrationState::Requesting);
            self.shared.highlight.send_replace(Highlight {
                page: Some(page.clone()),
                index: None,
            });
            NarrationRequest {
                sequence: session.current,
                page,
            }
        };
        debug!(sequence = request.sequence, "requesting narration audio");

        let synthesized =
            retry::execute(&self.config.policy, || self.synthesizer.synthesize(text)).await;
        if !self.is_current(&request) {
            return Self::superseded(&request, "audio arrived");
        }
        let bytes = match synthesized {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return self.fail(&request, &NarrationError::NoAudio),
            Err(err) => return self.fail(&request, &NarrationError::Synthesis(err)),
        };

        let decoded = self.decode(bytes).await;
        if !self.is_current(&request) {
            return Self::superseded(&request, "audio decoded");
        }
        let audio = match decoded {
            Ok(audio) => Arc::new(audio),
            Err(err) => return self.fail(&request, &err),
        };

        let output = self.output().await;
        if !self.is_current(&request) {
            return Self::superseded(&request, "output opened");
        }
        let output = match output {
            Ok(output) => output,
            Err(err) => return self.fail(&request, &err),
        };

        self.start_playback(&request, &output, audio, text)
    }

    /// Switches to `page`: stops playback and drops in-flight requests.
    pub fn show_page(&self, page: PageId) {
        let mut session = self.shared.session();
        session.active_page = Some(page);
        self.shared.interrupt(&mut session, "page changed");
    }

    /// Stops playback, as a manual interrupt.
    pub fn stop(&self) {
        let mut session = self.shared.session();
        self.shared.interrupt(&mut session, "stopped");
    }

    /// Stops playback and forgets the active page.
    pub fn teardown(&self) {
        let mut session = self.shared.session();
        session.active_page = None;
        self.shared.interrupt(&mut session, "torn down");
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> NarrationState {
        *self.shared.state.borrow()
    }

    /// Watches state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<NarrationState> {
        self.shared.state.subscribe()
    }

    /// Watches highlight changes.
    #[must_use]
    pub fn subscribe_highlight(&self) -> watch::Receiver<Highlight> {
        self.shared.highlight.subscribe()
    }

    /// Handle of the narration currently connected to the output.
    #[must_use]
    pub fn live_handle(&self) -> Option<u64> {
        self.shared.session().live_handle()
    }

    fn is_current(&self, request: &NarrationRequest) -> bool {
        self.shared.session().is_current(request)
    }

    fn superseded(request: &NarrationRequest, at: &'static str) -> NarrationOutcome {
        debug!(sequence = request.sequence, page = %request.page, at, "narration superseded");
        NarrationOutcome::Superseded
    }

    fn fail(&self, request: &NarrationRequest, err: &NarrationError) -> NarrationOutcome {
        warn!(
            sequence = request.sequence,
            page = %request.page,
            error = %err,
            "narration failed; page stays silent"
        );
        let session = self.shared.session();
        if session.is_current(request) {
            self.shared.state.send_replace(NarrationState::Idle);
        }
        NarrationOutcome::Failed
    }

    async fn decode(&self, bytes: AudioBytes) -> Result<DecodedAudio, NarrationError> {
        let NarrationConfig {
            sample_rate,
            channels,
            ..
        } = self.config;
        tokio::task::spawn_blocking(move || decode_pcm16le(&bytes.0, sample_rate, channels))
            .await
            .map_err(|err| DecodeError::Interrupted(err.to_string()))?
            .map_err(NarrationError::from)
    }

    async fn output(&self) -> Result<Arc<dyn AudioOutput>, NarrationError> {
        self.output
            .get_or_try_init(|| self.backend.open(self.config.sample_rate))
            .await
            .map(Arc::clone)
    }

    fn start_playback(
        &self,
        request: &NarrationRequest,
        output: &Arc<dyn AudioOutput>,
        audio: Arc<DecodedAudio>,
        text: &str,
    ) -> NarrationOutcome {
        let mut session = self.shared.session();
        if !session.is_current(request) {
            return Self::superseded(request, "playback start");
        }

        session.next_handle += 1;
        let handle_id = session.next_handle;
        let duration = audio.duration();
        let (ended_tx, ended_rx) = oneshot::channel();
        let source = match output.play(audio, ended_tx) {
            Ok(source) => source,
            Err(err) => {
                drop(session);
                return self.fail(request, &err);
            }
        };

        let words = text.split_whitespace().count();
        let timer = HighlightSchedule::new(duration, words).map(|schedule| {
            let shared = Arc::downgrade(&self.shared);
            let page = request.page.clone();
            HighlightTimer::start(schedule, self.config.poll_interval, move |index| {
                if let Some(shared) = shared.upgrade() {
                    shared.emit(handle_id, &page, index);
                }
            })
        });
        session.live = Some(LiveNarration {
            handle_id,
            source,
            timer,
        });
        self.shared.state.send_replace(NarrationState::Playing);
        drop(session);

        watch_for_end(Arc::downgrade(&self.shared), handle_id, ended_rx);
        info!(
            handle_id,
            sequence = request.sequence,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            words,
            "narration playing"
        );
        NarrationOutcome::Started { handle_id }
    }
}

impl Drop for NarrationController {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn watch_for_end(shared: Weak<Shared>, handle_id: u64, ended: oneshot::Receiver<()>) {
    tokio::spawn(async move {
        if ended.await.is_err() {
            return;
        }
        if let Some(shared) = shared.upgrade() {
            shared.finish(handle_id);
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use piggybook_core::error::ProviderError;
    use piggybook_core::fingerprint::RequestFingerprint;
    use piggybook_core::story::AudioBytes;
    use piggybook_test_support::{GatedSynthesizer, ScriptedSynthesizer, pcm_silence};

    use super::*;
    use crate::output::TimedBackend;
    use crate::testing::RecordingBackend;

    const RATE: u32 = 24_000;

    fn page(n: u32) -> PageId {
        PageId::new(RequestFingerprint::new(7, "The Power of Saving"), n)
    }

    fn audio(millis: u64) -> AudioBytes {
        pcm_silence(millis, RATE)
    }

    fn controller(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        backend: &Arc<RecordingBackend>,
    ) -> NarrationController {
        let backend: Arc<dyn AudioBackend> = backend.clone();
        NarrationController::new(synthesizer, backend, NarrationConfig::default())
    }

    #[tokio::test]
    async fn test_speak_plays_audio_and_reports_playing() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let synth = Arc::new(ScriptedSynthesizer::always(audio(400)));
        let narration = controller(synth.clone(), &backend);

        // Act
        let outcome = narration.speak("Piggy saves a coin", page(1)).await;

        // Assert
        assert_eq!(outcome, NarrationOutcome::Started { handle_id: 1 });
        assert_eq!(narration.state(), NarrationState::Playing);
        assert_eq!(backend.output.played(), vec![Duration::from_millis(400)]);
        assert_eq!(synth.texts(), vec!["Piggy saves a coin".to_owned()]);
    }

    #[tokio::test]
    async fn test_second_speak_on_same_page_supersedes_the_first() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let gate = Arc::new(GatedSynthesizer::new());
        let narration = controller(gate.clone(), &backend);
        let highlight = narration.subscribe_highlight();

        // Act
        let (a, b, ()) = tokio::join!(
            narration.speak("A", page(1)),
            narration.speak("B", page(1)),
            async {
                gate.wait_for_calls(2).await;
                gate.release(1, Ok(Some(audio(200))));
                tokio::task::yield_now().await;
                gate.release(0, Ok(Some(audio(100))));
            }
        );

        // Assert
        assert_eq!(gate.text(0), "A");
        assert_eq!(a, NarrationOutcome::Superseded);
        assert!(matches!(b, NarrationOutcome::Started { .. }));
        assert_eq!(backend.output.played(), vec![Duration::from_millis(200)]);
        assert_eq!(backend.output.max_live(), 1);
        assert_eq!(highlight.borrow().page, Some(page(1)));
    }

    #[tokio::test]
    async fn test_stale_result_arriving_first_is_still_discarded() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let gate = Arc::new(GatedSynthesizer::new());
        let narration = controller(gate.clone(), &backend);

        // Act
        let (a, b, ()) = tokio::join!(
            narration.speak("A", page(1)),
            narration.speak("B", page(1)),
            async {
                gate.wait_for_calls(2).await;
                gate.release(0, Ok(Some(audio(100))));
                tokio::task::yield_now().await;
                gate.release(1, Ok(Some(audio(200))));
            }
        );

        // Assert
        assert_eq!(a, NarrationOutcome::Superseded);
        assert!(matches!(b, NarrationOutcome::Started { .. }));
        assert_eq!(backend.output.played(), vec![Duration::from_millis(200)]);
    }

    #[tokio::test]
    async fn test_page_change_during_request_produces_silence() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let gate = Arc::new(GatedSynthesizer::new());
        let narration = controller(gate.clone(), &backend);

        // Act
        let (outcome, ()) = tokio::join!(narration.speak("Page one", page(1)), async {
            gate.wait_for_calls(1).await;
            narration.show_page(page(2));
            gate.release(0, Ok(Some(audio(300))));
        });

        // Assert
        assert_eq!(outcome, NarrationOutcome::Superseded);
        assert!(backend.output.played().is_empty());
        assert_eq!(narration.state(), NarrationState::Idle);
        assert_eq!(backend.opens(), 0);
    }

    #[tokio::test]
    async fn test_teardown_during_request_produces_silence() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let gate = Arc::new(GatedSynthesizer::new());
        let narration = controller(gate.clone(), &backend);
        let highlight = narration.subscribe_highlight();

        // Act
        let (outcome, ()) = tokio::join!(narration.speak("Page one", page(1)), async {
            gate.wait_for_calls(1).await;
            narration.teardown();
            gate.release(0, Ok(Some(audio(300))));
        });

        // Assert
        assert_eq!(outcome, NarrationOutcome::Superseded);
        assert!(backend.output.played().is_empty());
        assert_eq!(*highlight.borrow(), Highlight::default());
    }

    #[tokio::test]
    async fn test_show_page_stops_live_audio() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let narration = controller(Arc::new(ScriptedSynthesizer::always(audio(500))), &backend);
        narration.speak("Page one", page(1)).await;

        // Act
        narration.show_page(page(2));

        // Assert
        assert_eq!(backend.output.live_count(), 0);
        assert_eq!(narration.live_handle(), None);
        assert_eq!(narration.state(), NarrationState::Idle);
    }

    #[tokio::test]
    async fn test_replay_stops_previous_before_starting_next() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let narration = controller(Arc::new(ScriptedSynthesizer::always(audio(500))), &backend);

        // Act
        let first = narration.speak("Page one", page(1)).await;
        let second = narration.speak("Page one", page(1)).await;
        let third = narration.speak("Page two", page(2)).await;

        // Assert
        assert_eq!(first, NarrationOutcome::Started { handle_id: 1 });
        assert_eq!(second, NarrationOutcome::Started { handle_id: 2 });
        assert_eq!(third, NarrationOutcome::Started { handle_id: 3 });
        assert_eq!(backend.output.played().len(), 3);
        assert_eq!(backend.output.max_live(), 1);
        assert_eq!(backend.output.live_count(), 1);
        assert_eq!(backend.opens(), 1);
    }

    #[tokio::test]
    async fn test_end_of_playback_returns_to_idle() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let narration = controller(Arc::new(ScriptedSynthesizer::always(audio(500))), &backend);
        let mut state = narration.subscribe_state();
        narration.speak("Page one", page(1)).await;

        // Act
        backend.output.end(0);
        let settled = state.wait_for(|s| *s == NarrationState::Idle).await.map(|s| *s);

        // Assert
        assert_eq!(settled.unwrap(), NarrationState::Idle);
        assert_eq!(narration.live_handle(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_headless_backend_plays_highlights_and_ends() {
        // Arrange
        let narration = NarrationController::new(
            Arc::new(ScriptedSynthesizer::always(audio(1000))),
            Arc::new(TimedBackend),
            NarrationConfig::default(),
        );
        let mut highlight = narration.subscribe_highlight();
        let mut state = narration.subscribe_state();

        // Act
        let outcome = narration.speak("Piggy saves one coin", page(1)).await;
        let last_word = highlight
            .wait_for(|h| h.index == Some(3))
            .await
            .map(|h| h.clone());
        let settled = state.wait_for(|s| *s == NarrationState::Idle).await.map(|s| *s);

        // Assert
        assert_eq!(outcome, NarrationOutcome::Started { handle_id: 1 });
        assert_eq!(last_word.unwrap().page, Some(page(1)));
        assert_eq!(settled.unwrap(), NarrationState::Idle);
        assert_eq!(narration.live_handle(), None);
        assert_eq!(highlight.borrow().index, None);
    }

    #[tokio::test]
    async fn test_stale_end_of_playback_is_ignored() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let narration = controller(Arc::new(ScriptedSynthesizer::always(audio(500))), &backend);
        narration.speak("First", page(1)).await;
        narration.speak("Second", page(1)).await;

        // Act
        backend.output.end(0);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // Assert
        assert_eq!(narration.state(), NarrationState::Playing);
        assert_eq!(narration.live_handle(), Some(2));
        assert_eq!(backend.output.live_count(), 1);
    }

    #[tokio::test]
    async fn test_synthesis_failure_leaves_page_silent() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let synth = Arc::new(ScriptedSynthesizer::new(vec![Err(ProviderError::Failed(
            "voice unavailable".into(),
        ))]));
        let narration = controller(synth.clone(), &backend);

        // Act
        let outcome = narration.speak("Page one", page(1)).await;

        // Assert
        assert_eq!(outcome, NarrationOutcome::Failed);
        assert_eq!(synth.calls(), 1);
        assert_eq!(narration.state(), NarrationState::Idle);
        assert!(backend.output.played().is_empty());
    }

    #[tokio::test]
    async fn test_missing_or_undecodable_audio_fails_quietly() {
        let backend = Arc::new(RecordingBackend::default());
        let synth = Arc::new(ScriptedSynthesizer::new(vec![
            Ok(None),
            Ok(Some(AudioBytes(vec![0, 0, 0]))),
        ]));
        let narration = controller(synth, &backend);

        assert_eq!(narration.speak("one", page(1)).await, NarrationOutcome::Failed);
        assert_eq!(narration.speak("two", page(1)).await, NarrationOutcome::Failed);
        assert!(backend.output.played().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_output_fails_quietly() {
        let backend = Arc::new(RecordingBackend::unavailable());
        let narration = controller(Arc::new(ScriptedSynthesizer::always(audio(100))), &backend);

        let outcome = narration.speak("Page one", page(1)).await;

        assert_eq!(outcome, NarrationOutcome::Failed);
        assert_eq!(narration.state(), NarrationState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_synthesis_is_retried() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let synth = Arc::new(ScriptedSynthesizer::new(vec![
            Err(ProviderError::RateLimited { retry_after: None }),
            Ok(Some(audio(100))),
        ]));
        let narration = controller(synth.clone(), &backend);

        // Act
        let outcome = narration.speak("Page one", page(1)).await;

        // Assert
        assert!(matches!(outcome, NarrationOutcome::Started { .. }));
        assert_eq!(synth.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_highlight_walks_words_then_stop_clears_it() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let narration = controller(Arc::new(ScriptedSynthesizer::always(audio(1000))), &backend);
        let highlight = narration.subscribe_highlight();

        // Act
        narration.speak("one two three four", page(1)).await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        let midway = highlight.borrow().clone();
        tokio::time::sleep(Duration::from_millis(800)).await;
        let at_end = highlight.borrow().clone();
        narration.stop();
        let stopped = highlight.borrow().clone();

        // Assert
        assert_eq!(midway.index, Some(2));
        assert_eq!(midway.page, Some(page(1)));
        assert_eq!(at_end.index, Some(3));
        assert_eq!(stopped.index, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_narration_never_highlights() {
        // Arrange
        let backend = Arc::new(RecordingBackend::default());
        let narration = controller(Arc::new(ScriptedSynthesizer::always(audio(1000))), &backend);
        let highlight = narration.subscribe_highlight();
        narration.speak("one two three four", page(1)).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Act
        narration.show_page(page(2));
        tokio::time::sleep(Duration::from_secs(2)).await;

        // Assert
        assert_eq!(
            *highlight.borrow(),
            Highlight {
                page: Some(page(2)),
                index: None,
            }
        );
    }
}
