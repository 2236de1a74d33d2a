//! Observable state published by the sessions
//!
//! Each state value is an immutable snapshot. The owning session is the only
//! writer; observers hold a [`watch::Receiver`] and always see the latest
//! snapshot.

use crate::types::{BackgroundSpec, FilterResult, RawImage};
use std::sync::Arc;
use tokio::sync::watch;

/// Progress of the last pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed(String),
}

impl JobStatus {
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Snapshot of an enhancement session
#[derive(Debug, Clone, Default)]
pub struct EnhancementState {
    pub original: Option<Arc<RawImage>>,
    pub result: Option<Arc<FilterResult>>,
    pub status: JobStatus,
}

impl EnhancementState {
    /// New state with `image` selected and any previous result dropped
    #[must_use]
    pub fn with_original(&self, image: RawImage) -> Self {
        Self {
            original: Some(Arc::new(image)),
            result: None,
            status: JobStatus::Idle,
        }
    }

    #[must_use]
    pub fn with_status(&self, status: JobStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_result(&self, result: impl Into<Arc<FilterResult>>) -> Self {
        Self {
            original: self.original.clone(),
            result: Some(result.into()),
            status: JobStatus::Completed,
        }
    }
}

/// Snapshot of a background removal session
#[derive(Debug, Clone, Default)]
pub struct RemovalState {
    pub original: Option<Arc<RawImage>>,
    pub result: Option<Arc<FilterResult>>,
    pub background: BackgroundSpec,
    pub status: JobStatus,
}

impl RemovalState {
    /// New state with `image` selected; the chosen background is kept
    #[must_use]
    pub fn with_original(&self, image: RawImage) -> Self {
        Self {
            original: Some(Arc::new(image)),
            result: None,
            background: self.background.clone(),
            status: JobStatus::Idle,
        }
    }

    #[must_use]
    pub fn with_background(&self, background: BackgroundSpec) -> Self {
        Self {
            background,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_status(&self, status: JobStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_result(&self, result: impl Into<Arc<FilterResult>>) -> Self {
        Self {
            result: Some(result.into()),
            status: JobStatus::Completed,
            ..self.clone()
        }
    }
}

/// Single-writer observable state over a [`watch`] channel
#[derive(Debug)]
pub struct StateStore<S> {
    sender: watch::Sender<S>,
}

impl<S: Clone> StateStore<S> {
    #[must_use]
    pub fn new(initial: S) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> S {
        self.sender.borrow().clone()
    }

    /// Receiver notified on every update
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.sender.subscribe()
    }

    /// Replace the state with `f(current)` and return the new state
    pub fn update<F>(&self, f: F) -> S
    where
        F: FnOnce(&S) -> S,
    {
        let next = {
            let current = self.sender.borrow();
            f(&current)
        };
        self.sender.send_replace(next.clone());
        next
    }

    /// Replace the state only when `f` returns a new one
    ///
    /// The check and the write happen under the channel lock, so a
    /// concurrent update cannot slip in between.
    pub fn update_if<F>(&self, f: F) -> Option<S>
    where
        F: FnOnce(&S) -> Option<S>,
    {
        let mut published = None;
        self.sender.send_if_modified(|state| match f(state) {
            Some(next) => {
                *state = next.clone();
                published = Some(next);
                true
            },
            None => false,
        });
        published
    }
}

impl<S: Clone + Default> Default for StateStore<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FilterOperation, ProcessingMetadata};
    use image::Rgba;

    fn dummy_result() -> FilterResult {
        FilterResult::new(
            RawImage::filled(2, 2, Rgba([0, 0, 0, 255])),
            (1, 1),
            ProcessingMetadata::new(FilterOperation::Enhancement, "test".to_string()),
        )
    }

    #[test]
    fn test_update_returns_new_state() {
        let store = StateStore::new(EnhancementState::default());
        let next = store.update(|s| s.with_status(JobStatus::Running));

        assert_eq!(next.status, JobStatus::Running);
        assert_eq!(store.snapshot().status, JobStatus::Running);
    }

    #[test]
    fn test_new_original_clears_result() {
        let state = EnhancementState::default()
            .with_original(RawImage::filled(1, 1, Rgba([1, 2, 3, 255])))
            .with_result(dummy_result());
        assert!(state.result.is_some());

        let next = state.with_original(RawImage::filled(3, 3, Rgba([1, 2, 3, 255])));
        assert!(next.result.is_none());
        assert_eq!(next.status, JobStatus::Idle);
        assert_eq!(next.original.map(|o| o.dimensions()), Some((3, 3)));
    }

    #[test]
    fn test_removal_keeps_background_across_originals() {
        let state = RemovalState::default().with_background(BackgroundSpec::white());
        let next = state.with_original(RawImage::filled(1, 1, Rgba([0, 0, 0, 255])));
        assert_eq!(next.background, BackgroundSpec::white());
    }

    #[test]
    fn test_update_if_skips_rejected_updates() {
        let store = StateStore::new(EnhancementState::default());

        let skipped = store.update_if(|_| None);
        assert!(skipped.is_none());
        assert_eq!(store.snapshot().status, JobStatus::Idle);

        let applied = store.update_if(|s| Some(s.with_status(JobStatus::Running)));
        assert_eq!(applied.map(|s| s.status), Some(JobStatus::Running));
        assert_eq!(store.snapshot().status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_subscribers_observe_updates() {
        let store = StateStore::new(RemovalState::default());
        let mut receiver = store.subscribe();

        store.update(|s| s.with_status(JobStatus::Failed("boom".to_string())));
        receiver.changed().await.unwrap();
        assert_eq!(
            receiver.borrow().status,
            JobStatus::Failed("boom".to_string())
        );
    }
}
