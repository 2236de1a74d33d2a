//! Interactive sessions driving the processors
//!
//! A session owns the [`StateStore`] for one workflow. Each run creates a
//! fresh backend through the factory and executes on a blocking worker.
//! A run only publishes its outcome while it is still the latest run and
//! its original is still selected; otherwise the outcome goes back to the
//! caller alone.

use crate::{
    config::{EnhancementConfig, RemovalConfig},
    error::{FilterError, Result},
    processor::{BackendFactory, BackendType, BackgroundRemovalProcessor, EnhancementProcessor},
    state::{EnhancementState, JobStatus, RemovalState, StateStore},
    types::{BackgroundSpec, FilterResult, RawImage},
};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

async fn run_blocking<F>(job: F) -> Result<FilterResult>
where
    F: FnOnce() -> Result<FilterResult> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| FilterError::internal(format!("Processing task failed: {}", e)))?
}

fn is_current_run(
    latest: &AtomicU64,
    run: u64,
    original: &Arc<RawImage>,
    selected: Option<&Arc<RawImage>>,
) -> bool {
    latest.load(Ordering::SeqCst) == run && selected.is_some_and(|s| Arc::ptr_eq(s, original))
}

/// Single-image enhancement workflow
pub struct EnhancementSession {
    factory: Arc<dyn BackendFactory>,
    backend_type: BackendType,
    config: EnhancementConfig,
    store: StateStore<EnhancementState>,
    runs: AtomicU64,
}

impl EnhancementSession {
    #[must_use]
    pub fn new(
        factory: Arc<dyn BackendFactory>,
        backend_type: BackendType,
        config: EnhancementConfig,
    ) -> Self {
        Self {
            factory,
            backend_type,
            config,
            store: StateStore::default(),
            runs: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn state(&self) -> EnhancementState {
        self.store.snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EnhancementState> {
        self.store.subscribe()
    }

    /// Select the image to enhance, discarding the previous result
    pub fn select_original(&self, image: RawImage) -> EnhancementState {
        self.store.update(|state| state.with_original(image))
    }

    /// Enhance the selected original and publish the outcome
    ///
    /// # Errors
    /// - `InvalidInput` when no original is selected
    /// - Any pipeline error, also published as `JobStatus::Failed` unless the run was superseded
    pub async fn enhance(&self) -> Result<EnhancementState> {
        let original = self
            .store
            .snapshot()
            .original
            .ok_or_else(|| FilterError::invalid_input("No image selected for enhancement"))?;

        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        self.store.update(|state| state.with_status(JobStatus::Running));

        let factory = Arc::clone(&self.factory);
        let backend_type = self.backend_type;
        let config = self.config.clone();
        let input = Arc::clone(&original);
        let outcome = run_blocking(move || {
            let mut processor =
                EnhancementProcessor::with_factory(config, factory.as_ref(), backend_type)?;
            processor.enhance(&input)
        })
        .await;

        match outcome {
            Ok(result) => {
                info!("Enhancement finished: {}", result.timing_summary());
                let result = Arc::new(result);
                let published = self.store.update_if(|state| {
                    is_current_run(&self.runs, run, &original, state.original.as_ref())
                        .then(|| state.with_result(Arc::clone(&result)))
                });
                Ok(published.unwrap_or_else(|| {
                    debug!("Enhancement run {} was superseded, result not published", run);
                    EnhancementState {
                        original: Some(original),
                        result: Some(result),
                        status: JobStatus::Completed,
                    }
                }))
            },
            Err(e) => {
                warn!("Enhancement failed: {}", e);
                let message = e.to_string();
                let published = self.store.update_if(|state| {
                    is_current_run(&self.runs, run, &original, state.original.as_ref())
                        .then(|| state.with_status(JobStatus::Failed(message)))
                });
                if published.is_none() {
                    debug!("Enhancement run {} was superseded, failure not published", run);
                }
                Err(e)
            },
        }
    }
}

/// Background removal workflow with a selectable background
pub struct RemovalSession {
    factory: Arc<dyn BackendFactory>,
    backend_type: BackendType,
    config: RemovalConfig,
    store: StateStore<RemovalState>,
    runs: AtomicU64,
}

impl RemovalSession {
    #[must_use]
    pub fn new(
        factory: Arc<dyn BackendFactory>,
        backend_type: BackendType,
        config: RemovalConfig,
    ) -> Self {
        Self {
            factory,
            backend_type,
            config,
            store: StateStore::default(),
            runs: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn state(&self) -> RemovalState {
        self.store.snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RemovalState> {
        self.store.subscribe()
    }

    pub fn select_original(&self, image: RawImage) -> RemovalState {
        self.store.update(|state| state.with_original(image))
    }

    /// Choose the background used by the next run
    pub fn change_background(&self, background: BackgroundSpec) -> RemovalState {
        self.store.update(|state| state.with_background(background))
    }

    /// Replace the background of the selected original
    ///
    /// # Errors
    /// - `InvalidInput` when no original is selected
    /// - Any pipeline error, also published as `JobStatus::Failed` unless the run was superseded
    pub async fn remove_background(&self) -> Result<RemovalState> {
        let snapshot = self.store.snapshot();
        let original = snapshot.original.ok_or_else(|| {
            FilterError::invalid_input("No image selected for background removal")
        })?;
        let background = snapshot.background;

        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        self.store.update(|state| state.with_status(JobStatus::Running));

        let factory = Arc::clone(&self.factory);
        let backend_type = self.backend_type;
        let config = self.config.clone();
        let input = Arc::clone(&original);
        let spec = background.clone();
        let outcome = run_blocking(move || {
            let mut processor =
                BackgroundRemovalProcessor::with_factory(config, factory.as_ref(), backend_type)?;
            processor.remove_background(&input, &spec)
        })
        .await;

        match outcome {
            Ok(result) => {
                info!("Background removal finished: {}", result.timing_summary());
                let result = Arc::new(result);
                let published = self.store.update_if(|state| {
                    is_current_run(&self.runs, run, &original, state.original.as_ref())
                        .then(|| state.with_result(Arc::clone(&result)))
                });
                Ok(published.unwrap_or_else(|| {
                    debug!("Removal run {} was superseded, result not published", run);
                    RemovalState {
                        original: Some(original),
                        result: Some(result),
                        background,
                        status: JobStatus::Completed,
                    }
                }))
            },
            Err(e) => {
                warn!("Background removal failed: {}", e);
                let message = e.to_string();
                let published = self.store.update_if(|state| {
                    is_current_run(&self.runs, run, &original, state.original.as_ref())
                        .then(|| state.with_status(JobStatus::Failed(message)))
                });
                if published.is_none() {
                    debug!("Removal run {} was superseded, failure not published", run);
                }
                Err(e)
            },
        }
    }
}
