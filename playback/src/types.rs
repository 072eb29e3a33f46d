use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use alfred_wire::Version;
use alfred_wire::event::PORT_COUNT;

/// Who is sitting in a port, as far as replay selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSlot {
    pub character_id: u8,
    pub costume_id: u8,
}

/// What we know about a stored replay after reading it once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMetadata {
    pub version: Version,

    /// Number of distinct frames the replay covers.
    pub frame_count: u32,
    pub stage_id: u16,
    pub is_teams: bool,

    /// Indexed by port; `None` for an empty slot.
    pub players: [Option<PlayerSlot>; PORT_COUNT],

    /// Whether somebody quit out with L+R+A+Start.
    pub lras_initiator: bool,
}

/// A replay that passed selection, along with which ports to watch. Ports are
/// zero-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayCandidate {
    pub observed_port: usize,
    pub opponent_port: usize,
    pub replay: PathBuf,
}

/// Where the emulator lifecycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No emulator running.
    Idle,

    /// Dolphin has been started but no telemetry has arrived yet.
    Launching { since: std::time::Instant },

    /// Telemetry is flowing.
    Playing { last_activity: std::time::Instant },

    /// The current replay is done (or stalled, or the process died); waiting on
    /// the process to be gone.
    Draining,
}

impl LifecycleState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Launching { .. } => "launching",
            Self::Playing { .. } => "playing",
            Self::Draining => "draining",
        }
    }
}
