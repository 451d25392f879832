//! Word highlighting by linear interpolation over the audio duration.
//!
//! There is no per-word timing from the speech provider, so word `i` is
//! assumed to start at `i * duration / word_count`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// Maps elapsed playback time to the index of the word being spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSchedule {
    time_per_word: Duration,
    word_count: usize,
}

impl HighlightSchedule {
    /// Returns `None` when there is nothing to highlight (no words or no
    /// audio).
    #[must_use]
    pub fn new(duration: Duration, word_count: usize) -> Option<Self> {
        if word_count == 0 || duration.is_zero() {
            return None;
        }
        let per_word = duration.as_nanos() / word_count as u128;
        let time_per_word = Duration::from_nanos(u64::try_from(per_word.max(1)).unwrap_or(u64::MAX));
        Some(Self {
            time_per_word,
            word_count,
        })
    }

    /// Number of words in the narrated text.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Time allotted to each word.
    #[must_use]
    pub fn time_per_word(&self) -> Duration {
        self.time_per_word
    }

    /// `floor(elapsed / time_per_word)`, or `None` once past the last word.
    #[must_use]
    pub fn index_at(&self, elapsed: Duration) -> Option<usize> {
        let index = elapsed.as_nanos() / self.time_per_word.as_nanos();
        usize::try_from(index)
            .ok()
            .filter(|index| *index < self.word_count)
    }
}

/// A running highlighter. Aborted by [`HighlightTimer::stop`] or on drop.
#[derive(Debug)]
pub struct HighlightTimer {
    task: JoinHandle<()>,
}

impl HighlightTimer {
    /// Spawns a task that samples elapsed time every `poll_interval` and
    /// calls `sink` whenever the word index changes. It ends by itself after
    /// the last word.
    pub fn start<F>(schedule: HighlightSchedule, poll_interval: Duration, mut sink: F) -> Self
    where
        F: FnMut(usize) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = None;
            loop {
                ticker.tick().await;
                let Some(index) = schedule.index_at(started.elapsed()) else {
                    trace!("highlight finished");
                    break;
                };
                if last != Some(index) {
                    last = Some(index);
                    sink(index);
                }
            }
        });
        Self { task }
    }

    /// Stops emitting immediately.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Whether the timer has run past the last word or been stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for HighlightTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
