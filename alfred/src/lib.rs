//! The engine that ties ingestion and offline playback together.
//!
//! Each step drains whatever the listeners have collected since the last one,
//! feeds the game-state records into the emulator lifecycle, and then ticks the
//! lifecycle so timeouts and launches happen even when nothing arrives.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use alfred_config::{AlfredConfig, ConfigError};
use alfred_playback::EmulatorLifecycle;
use alfred_playback::catalog::ReplayCatalog;
use alfred_playback::config::Criteria;
use alfred_playback::errors::PlaybackError;
use alfred_playback::types::LifecycleState;
use alfred_receiver::{IngestError, IngestionService, Record};
use dolphin_integrations::Log;

/// How long the run loop sleeps between steps.
const STEP_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl EngineError {
    /// Whether this is a bad configuration (as opposed to something going wrong at
    /// runtime).
    pub fn is_config_invalid(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Playback(PlaybackError::ConfigInvalid(_)) | Self::Ingest(IngestError::ConfigInvalid(_))
        )
    }
}

/// Counts of what one `step` handled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepSummary {
    pub game_events: usize,
    pub controller_samples: usize,
    pub video_frames: usize,
    pub lifecycle: Option<LifecycleState>,
}

#[derive(Debug)]
pub struct Engine {
    ingestion: IngestionService,
    lifecycle: Option<EmulatorLifecycle>,
}

impl Engine {
    /// Validates everything in `config` up front, then builds the pieces. Nothing
    /// is bound or launched until `start`/`step`.
    pub fn new(config: &AlfredConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let criteria = Criteria::from_config(&config.replay)?;

        let lifecycle = if config.emulator.enabled {
            Some(EmulatorLifecycle::from_config(&config.emulator, &criteria)?)
        } else {
            None
        };

        let ingestion = IngestionService::new(config)?;

        Ok(Self::with_parts(ingestion, lifecycle))
    }

    pub fn with_parts(ingestion: IngestionService, lifecycle: Option<EmulatorLifecycle>) -> Self {
        Self { ingestion, lifecycle }
    }

    pub fn ingestion(&self) -> &IngestionService {
        &self.ingestion
    }

    pub fn lifecycle(&self) -> Option<&EmulatorLifecycle> {
        self.lifecycle.as_ref()
    }

    /// Starts the listeners.
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.ingestion.start()?;

        tracing::info!(
            target: Log::Engine,
            playback = self.lifecycle.is_some(),
            "Engine started"
        );

        Ok(())
    }

    /// Handles everything collected since the last step, then ticks the lifecycle.
    pub fn step(&mut self, now: Instant) -> StepSummary {
        let mut summary = StepSummary::default();

        for (channel, record) in self.ingestion.collect() {
            match record {
                Record::Game(timed) => {
                    summary.game_events += 1;

                    if let Some(lifecycle) = self.lifecycle.as_mut() {
                        lifecycle.observe(&timed.event, now);
                    }
                },

                Record::Controller(_) => summary.controller_samples += 1,
                Record::Video(_) => summary.video_frames += 1,
            }

            tracing::trace!(target: Log::Engine, %channel, "Record consumed");
        }

        summary.lifecycle = self.lifecycle.as_mut().map(|lifecycle| lifecycle.tick(now));
        summary
    }

    /// Steps until `should_run` is cleared, then stops everything.
    pub fn run(&mut self, should_run: Arc<AtomicBool>) {
        while should_run.load(Ordering::Relaxed) {
            self.step(Instant::now());
            thread::sleep(STEP_INTERVAL);
        }

        self.stop();
    }

    /// Stops the listeners and terminates any running emulator.
    pub fn stop(&mut self) {
        self.ingestion.stop();

        if let Some(lifecycle) = self.lifecycle.as_mut() {
            lifecycle.shutdown();
        }

        tracing::info!(target: Log::Engine, "Engine stopped");
    }
}

/// Returns a run flag that is cleared on Ctrl+C (or SIGTERM), for handing to
/// `Engine::run`. If the handler can't be installed the flag simply never clears.
pub fn shutdown_flag() -> Arc<AtomicBool> {
    let should_run = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&should_run);

    let installed = ctrlc::set_handler(move || {
        tracing::info!(target: Log::Engine, "Shutdown signal received");
        flag.store(false, Ordering::Relaxed);
    });

    if let Err(error) = installed {
        tracing::error!(target: Log::Engine, ?error, "Failed to install shutdown signal handler");
    }

    should_run
}

/// Scans the configured replay directory and writes the accepted replays to
/// `index`, so later runs can skip the scan.
pub fn build_index(config: &AlfredConfig, index: &Path) -> Result<usize, EngineError> {
    let criteria = Criteria::from_config(&config.replay)?;
    let catalog = ReplayCatalog::scan(&config.emulator.slippi_data, &criteria)?;

    catalog.save_index(index, &config.emulator.slippi_data)?;

    tracing::info!(target: Log::Engine, ?index, accepted = catalog.len(), "Wrote replay index");

    Ok(catalog.len())
}
