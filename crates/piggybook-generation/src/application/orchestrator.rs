//! Cache-first story orchestration and lazy page illustration.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use piggybook_cache::ContentCache;
use piggybook_core::command::Command;
use piggybook_core::fingerprint::{RequestFingerprint, normalize_concept};
use piggybook_core::provider::{ImageGenerator, StoryGenerator};
use piggybook_core::retry::{self, BackoffPolicy};
use piggybook_core::story::{ImageAttach, ImageRef, StoryDocument};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::keyed_lock::KeyedLocks;
use super::story_handle::StoryHandle;
use crate::domain::commands::{FillPageImage, GenerateStory};
use crate::domain::phase::{GenerationPhase, StorySource};
use crate::error::GenerationError;

/// A story ready to be read.
#[derive(Debug, Clone)]
pub struct StoryOutcome {
    /// The shared story.
    pub story: Arc<StoryHandle>,
    /// Whether the provider was called for it.
    pub source: StorySource,
}

/// Result of filling one page's illustration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFill {
    /// A new image was attached and the cache rewritten.
    Attached(ImageRef),
    /// The page already had an image; the provider was not called.
    AlreadyPresent(ImageRef),
    /// Another fill for this page is running.
    InProgress,
    /// The provider answered without an image; the page stays bare.
    NoImage,
}

/// Reports phase changes of one request, ignoring illegal edges.
struct PhaseTracker<'a> {
    phase: GenerationPhase,
    observer: Option<&'a watch::Sender<GenerationPhase>>,
}

impl<'a> PhaseTracker<'a> {
    fn new(observer: Option<&'a watch::Sender<GenerationPhase>>) -> Self {
        Self {
            phase: GenerationPhase::Idle,
            observer,
        }
    }

    fn enter(&mut self, next: GenerationPhase) {
        match self.phase.advance(next) {
            Ok(phase) => {
                debug!(?phase, "generation phase");
                self.phase = phase;
                if let Some(observer) = self.observer {
                    observer.send_replace(phase);
                }
            }
            Err(err) => error!(error = %err, "generation phase not advanced"),
        }
    }
}

/// Produces stories for `(age, concept)` requests and fills their
/// illustrations.
///
/// At most one provider call runs per fingerprint at a time: concurrent
/// requests for the same story wait and then share the first result.
/// A story stays open only while a caller holds its handle; after that it
/// is reloaded from the cache.
pub struct StoryOrchestrator {
    cache: ContentCache,
    stories: Arc<dyn StoryGenerator>,
    images: Arc<dyn ImageGenerator>,
    policy: BackoffPolicy,
    locks: KeyedLocks,
    open: RwLock<HashMap<RequestFingerprint, Weak<StoryHandle>>>,
}

impl StoryOrchestrator {
    /// Creates an orchestrator over `cache` and the two providers.
    #[must_use]
    pub fn new(
        cache: ContentCache,
        stories: Arc<dyn StoryGenerator>,
        images: Arc<dyn ImageGenerator>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            cache,
            stories,
            images,
            policy,
            locks: KeyedLocks::default(),
            open: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the story for `command`, generating and caching it on a miss.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::InvalidRequest` for a blank concept,
    /// `Failed` when the provider gives up, and `InvalidDocument` when its
    /// answer breaks the document invariants. Nothing is cached on error.
    pub async fn start(&self, command: &GenerateStory) -> Result<StoryOutcome, GenerationError> {
        self.start_observed(command, None).await
    }

    /// Like [`StoryOrchestrator::start`], also publishing each phase change
    /// to `observer`.
    ///
    /// # Errors
    ///
    /// See [`StoryOrchestrator::start`].
    #[instrument(
        skip(self, command, observer),
        fields(
            command_type = command.command_type(),
            correlation_id = %command.correlation_id,
            age = command.age,
        )
    )]
    pub async fn start_observed(
        &self,
        command: &GenerateStory,
        observer: Option<&watch::Sender<GenerationPhase>>,
    ) -> Result<StoryOutcome, GenerationError> {
        let concept = normalize_concept(&command.concept);
        if concept.is_empty() {
            return Err(GenerationError::InvalidRequest(
                "concept must not be blank".to_owned(),
            ));
        }
        let fingerprint = command.fingerprint();
        let mut tracker = PhaseTracker::new(observer);
        tracker.enter(GenerationPhase::CheckingCache);

        let _flight = self.locks.lock(&fingerprint).await;

        if let Some(story) = self.open_story(&fingerprint) {
            debug!(%fingerprint, "story already open");
            tracker.enter(GenerationPhase::Done(StorySource::Cache));
            return Ok(StoryOutcome {
                story,
                source: StorySource::Cache,
            });
        }

        if let Some(document) = self.cache.get(&fingerprint).await {
            info!(%fingerprint, %concept, "serving story from cache");
            let story = self.register(fingerprint, document);
            tracker.enter(GenerationPhase::Done(StorySource::Cache));
            return Ok(StoryOutcome {
                story,
                source: StorySource::Cache,
            });
        }

        tracker.enter(GenerationPhase::Generating);
        info!(%fingerprint, %concept, "generating story");
        let document = match self.generate(command.age, &concept).await {
            Ok(document) => document,
            Err(err) => {
                warn!(%fingerprint, error = %err, "story generation failed");
                tracker.enter(GenerationPhase::Failed);
                return Err(err);
            }
        };

        self.cache.set(&fingerprint, &document).await;
        let story = self.register(fingerprint, document);
        tracker.enter(GenerationPhase::Done(StorySource::Generated));
        Ok(StoryOutcome {
            story,
            source: StorySource::Generated,
        })
    }

    /// Returns the open or cached story stored under `fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::NotFound` when neither holds it.
    pub async fn story(
        &self,
        fingerprint: &RequestFingerprint,
    ) -> Result<Arc<StoryHandle>, GenerationError> {
        let _flight = self.locks.lock(fingerprint).await;
        if let Some(story) = self.open_story(fingerprint) {
            return Ok(story);
        }
        match self.cache.get(fingerprint).await {
            Some(document) => Ok(self.register(fingerprint.clone(), document)),
            None => Err(GenerationError::NotFound(fingerprint.clone())),
        }
    }

    /// Fills the illustration of the page named by `command`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown story and otherwise the errors of
    /// [`StoryOrchestrator::fill_story_page`].
    #[instrument(
        skip(self, command),
        fields(
            command_type = command.command_type(),
            correlation_id = %command.correlation_id,
            page_number = command.page_number,
        )
    )]
    pub async fn fill_page_image(
        &self,
        command: &FillPageImage,
    ) -> Result<ImageFill, GenerationError> {
        let story = self.story(&command.fingerprint).await?;
        self.fill_story_page(&story, command.page_number).await
    }

    /// Generates and attaches an image for one page of `story`, then
    /// rewrites the whole document to the cache.
    ///
    /// The provider call runs without holding the document lock; the
    /// attachment and cache write happen under it.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` for a page outside the story and
    /// `ImageFailed` when the image provider gives up. The document is left
    /// unchanged on error.
    pub async fn fill_story_page(
        &self,
        story: &StoryHandle,
        page_number: u32,
    ) -> Result<ImageFill, GenerationError> {
        let page_not_found = || GenerationError::PageNotFound {
            fingerprint: story.fingerprint().clone(),
            page_number,
        };
        let page = story.page(page_number).await.ok_or_else(page_not_found)?;
        if let Some(image) = page.image_url {
            return Ok(ImageFill::AlreadyPresent(image));
        }
        let Some(_filling) = story.begin_fill(page_number) else {
            debug!(fingerprint = %story.fingerprint(), page_number, "image fill already running");
            return Ok(ImageFill::InProgress);
        };

        let prompt = page.image_prompt;
        let image = retry::execute(&self.policy, || self.images.generate_image(&prompt))
            .await
            .map_err(GenerationError::ImageFailed)?;
        let Some(image) = image else {
            info!(fingerprint = %story.fingerprint(), page_number, "provider returned no image");
            return Ok(ImageFill::NoImage);
        };

        let mut document = story.lock_document().await;
        match document.attach_image(page_number, image.clone()) {
            Ok(ImageAttach::Attached) => {
                self.cache.set(story.fingerprint(), &document).await;
                info!(fingerprint = %story.fingerprint(), page_number, "page image attached");
                Ok(ImageFill::Attached(image))
            }
            Ok(ImageAttach::AlreadyPresent) => {
                let existing = document
                    .page(page_number)
                    .and_then(|p| p.image_url.clone())
                    .unwrap_or(image);
                Ok(ImageFill::AlreadyPresent(existing))
            }
            Err(_) => Err(page_not_found()),
        }
    }

    /// Runs [`StoryOrchestrator::fill_story_page`] in the background.
    ///
    /// Failures are logged; the page simply stays without an image.
    pub fn spawn_page_image_fill(
        self: &Arc<Self>,
        story: Arc<StoryHandle>,
        page_number: u32,
    ) -> JoinHandle<Result<ImageFill, GenerationError>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let result = orchestrator.fill_story_page(&story, page_number).await;
            if let Err(err) = &result {
                warn!(
                    fingerprint = %story.fingerprint(),
                    page_number,
                    error = %err,
                    "background image fill failed"
                );
            }
            result
        })
    }

    async fn generate(&self, age: u32, concept: &str) -> Result<StoryDocument, GenerationError> {
        let document = retry::execute(&self.policy, || self.stories.generate_story(age, concept))
            .await
            .map_err(GenerationError::Failed)?;
        document
            .validate()
            .map_err(GenerationError::InvalidDocument)?;
        Ok(document)
    }

    fn open_story(&self, fingerprint: &RequestFingerprint) -> Option<Arc<StoryHandle>> {
        self.open
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(fingerprint)
            .and_then(Weak::upgrade)
    }

    fn register(
        &self,
        fingerprint: RequestFingerprint,
        document: StoryDocument,
    ) -> Arc<StoryHandle> {
        let story = Arc::new(StoryHandle::new(fingerprint.clone(), document));
        let mut open = self.open.write().unwrap_or_else(PoisonError::into_inner);
        open.retain(|_, handle| handle.strong_count() > 0);
        open.insert(fingerprint, Arc::downgrade(&story));
        story
    }

    #[cfg(test)]
    fn open_count(&self) -> usize {
        self.open
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|handle| handle.strong_count() > 0)
            .count()
    }
}
