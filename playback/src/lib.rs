pub mod catalog;
pub mod config;
pub mod emulator;
pub mod errors;
pub mod parser;
pub mod selector;
pub mod types;

use std::time::{Duration, Instant};

use alfred_config::EmulatorConfig;
use alfred_wire::GameEvent;
use dolphin_integrations::Log;

use crate::{
    catalog::ReplayCatalog,
    config::Criteria,
    emulator::{DolphinEmulator, Emulator},
    errors::PlaybackError,
    types::{LifecycleState, ReplayCandidate},
};

/// Default for how long a replay may go without telemetry.
const DEFAULT_BURNOUT: Duration = Duration::from_secs(10);

/// Drives the playback emulator through the replay catalog, one replay at a time.
///
/// It only moves on decoded game events (`observe`) or a periodic `tick`:
///
/// - `Idle` -> `Launching` when a candidate is available and nothing is running
/// - `Launching` -> `Playing` on the first start or frame event
/// - `Playing` -> `Draining` on an end event, or after `burnout` with no frames
/// - `Launching` -> `Draining` after `burnout` with no telemetry at all
/// - `Launching`/`Playing` -> `Draining` if the process exits on its own
/// - `Draining` -> `Idle` once the process has been terminated
///
/// Nothing in here fails the host. A candidate that can't be launched is skipped
/// and the next one is tried.
#[derive(Debug)]
pub struct EmulatorLifecycle {
    emulator: Box<dyn Emulator>,
    catalog: ReplayCatalog,
    burnout: Duration,
    state: LifecycleState,
    current: Option<ReplayCandidate>,
}

impl EmulatorLifecycle {
    /// Dolphin from the emulator config, with candidates from the index file if one
    /// is configured (and loads), otherwise from scanning the replay directory.
    pub fn from_config(config: &EmulatorConfig, criteria: &Criteria) -> Result<Self, PlaybackError> {
        let emulator = DolphinEmulator::from_config(config)?;

        let indexed = config.index_file.as_deref().and_then(|index| {
            ReplayCatalog::load_index(index, &config.slippi_data)
                .inspect_err(|error| {
                    tracing::warn!(target: Log::Playback, ?error, "Unable to load replay index, falling back to a scan");
                })
                .ok()
        });

        let catalog = match indexed {
            Some(catalog) => catalog,
            None => ReplayCatalog::scan(&config.slippi_data, criteria)?,
        };

        Ok(Self::builder(emulator)
            .with_catalog(catalog)
            .with_burnout(config.burnout())
            .build())
    }

    /// Builder for injection / customization.
    pub fn builder(emulator: impl Emulator + 'static) -> EmulatorLifecycleBuilder {
        EmulatorLifecycleBuilder {
            emulator: Box::new(emulator),
            catalog: None,
            burnout: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The replay currently launched, if any.
    pub fn current(&self) -> Option<&ReplayCandidate> {
        self.current.as_ref()
    }

    /// Candidates not yet played.
    pub fn remaining(&self) -> usize {
        self.catalog.len()
    }

    /// Feeds a decoded game event in.
    pub fn observe(&mut self, event: &GameEvent, now: Instant) {
        match (self.state, event) {
            (LifecycleState::Launching { .. }, GameEvent::Start(_) | GameEvent::Frame(_)) => {
                self.transition(LifecycleState::Playing { last_activity: now });
            },

            (LifecycleState::Playing { .. }, GameEvent::Start(_) | GameEvent::Frame(_)) => {
                self.state = LifecycleState::Playing { last_activity: now };
            },

            (LifecycleState::Playing { .. }, GameEvent::End(_)) => {
                self.transition(LifecycleState::Draining);
            },

            _ => {},
        }
    }

    /// Checks timeouts and process liveness, finishes a drain, and launches the next
    /// candidate when idle. Returns the state it ends up in.
    pub fn tick(&mut self, now: Instant) -> LifecycleState {
        match self.state {
            LifecycleState::Launching { since: last } | LifecycleState::Playing { last_activity: last } => {
                if !self.emulator.is_alive() {
                    tracing::warn!(target: Log::Playback, replay = ?self.current, "Emulator exited unexpectedly");
                    self.transition(LifecycleState::Draining);
                } else if now.saturating_duration_since(last) > self.burnout {
                    tracing::warn!(target: Log::Playback, replay = ?self.current, burnout = ?self.burnout, "No telemetry within burnout time");
                    self.transition(LifecycleState::Draining);
                }
            },

            LifecycleState::Idle | LifecycleState::Draining => {},
        }

        if self.state == LifecycleState::Draining {
            self.drain();
        }

        if self.state == LifecycleState::Idle {
            self.launch_next(now);
        }

        self.state
    }

    /// Terminates whatever is running and goes idle, leaving the remaining
    /// candidates in place.
    pub fn shutdown(&mut self) {
        if let Err(error) = self.emulator.terminate() {
            tracing::error!(target: Log::Playback, ?error, "Failed to terminate emulator on shutdown");
        }

        self.current = None;
        self.state = LifecycleState::Idle;
    }

    fn drain(&mut self) {
        if let Err(error) = self.emulator.terminate() {
            tracing::error!(target: Log::Playback, ?error, "Failed to terminate emulator, will retry");
            return;
        }

        if self.emulator.is_alive() {
            return;
        }

        self.current = None;
        self.transition(LifecycleState::Idle);
    }

    fn launch_next(&mut self, now: Instant) {
        if self.emulator.is_alive() {
            return;
        }

        while let Some(candidate) = self.catalog.next_candidate() {
            match self.emulator.launch(&candidate.replay) {
                Ok(()) => {
                    tracing::info!(
                        target: Log::Playback,
                        replay = ?candidate.replay,
                        observed_port = candidate.observed_port,
                        "Replaying"
                    );

                    self.current = Some(candidate);
                    self.transition(LifecycleState::Launching { since: now });
                    return;
                },

                Err(error) => {
                    tracing::warn!(target: Log::Playback, replay = ?candidate.replay, ?error, "Skipping replay that failed to launch");
                },
            }
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        tracing::info!(target: Log::Playback, from = self.state.name(), to = next.name(), "Emulator lifecycle transition");
        self.state = next;
    }
}

impl Drop for EmulatorLifecycle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct EmulatorLifecycleBuilder {
    emulator: Box<dyn Emulator>,
    catalog: Option<ReplayCatalog>,
    burnout: Option<Duration>,
}

impl EmulatorLifecycleBuilder {
    pub fn with_catalog(mut self, catalog: ReplayCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_burnout(mut self, burnout: Duration) -> Self {
        self.burnout = Some(burnout);
        self
    }

    pub fn build(self) -> EmulatorLifecycle {
        EmulatorLifecycle {
            emulator: self.emulator,
            catalog: self.catalog.unwrap_or_default(),
            burnout: self.burnout.unwrap_or(DEFAULT_BURNOUT),
            state: LifecycleState::Idle,
            current: None,
        }
    }
}
