//! Shims for everything that touches the emulator side of things: the log targets
//! every other crate in the workspace logs against, the subscriber setup, and the
//! process handle used to drive the Slippi playback build of Dolphin.

mod comm;
pub use comm::PlaybackCommand;

pub mod logger;

mod process;
pub use process::{DolphinLauncher, DolphinProcess, ProcessError};

/// Log targets used across the workspace.
///
/// These are plain string constants so they can be handed straight to the
/// `target:` argument of the `tracing` macros:
///
/// ```no_run
/// use dolphin_integrations::Log;
///
/// tracing::info!(target: Log::Receiver, "Listener online");
/// ```
#[derive(Debug)]
pub struct Log;

#[allow(non_upper_case_globals)]
impl Log {
    /// Configuration loading and validation.
    pub const Config: &'static str = "alfred::config";

    /// The orchestrating engine loop.
    pub const Engine: &'static str = "alfred::engine";

    /// Anything involving the Dolphin process itself (spawn, stdout, exit).
    pub const Emulator: &'static str = "alfred::emulator";

    /// Ring buffers and the channel registry.
    pub const Memory: &'static str = "alfred::memory";

    /// Replay scanning, selection and lifecycle transitions.
    pub const Playback: &'static str = "alfred::playback";

    /// Socket listeners and the ingestion service.
    pub const Receiver: &'static str = "alfred::receiver";

    /// Protocol decoding.
    pub const Wire: &'static str = "alfred::wire";
}
