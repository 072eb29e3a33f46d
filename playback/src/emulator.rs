use std::path::Path;

use alfred_config::EmulatorConfig;
use dolphin_integrations::{DolphinLauncher, DolphinProcess};

use crate::errors::PlaybackError;

/// The process the lifecycle drives. At most one instance runs at a time.
pub trait Emulator: std::fmt::Debug + Send {
    /// Starts playing `replay`.
    fn launch(&mut self, replay: &Path) -> Result<(), PlaybackError>;

    /// Whether the last launched instance is still running.
    fn is_alive(&mut self) -> bool;

    /// Stops the running instance, if any, and waits for it to exit.
    fn terminate(&mut self) -> Result<(), PlaybackError>;
}

/// The Slippi playback build of Dolphin.
#[derive(Debug)]
pub struct DolphinEmulator {
    launcher: DolphinLauncher,
    process: Option<DolphinProcess>,
}

impl DolphinEmulator {
    pub fn new(launcher: DolphinLauncher) -> Self {
        Self { launcher, process: None }
    }

    /// Fails with `ConfigInvalid` if the emulator or ISO can't be found.
    pub fn from_config(config: &EmulatorConfig) -> Result<Self, PlaybackError> {
        let launcher = DolphinLauncher::new(&config.executable, &config.iso, &config.comm_file);

        launcher
            .check_paths()
            .map_err(|e| PlaybackError::ConfigInvalid(e.to_string()))?;

        Ok(Self::new(launcher))
    }
}

impl Emulator for DolphinEmulator {
    fn launch(&mut self, replay: &Path) -> Result<(), PlaybackError> {
        self.terminate()?;
        self.process = Some(self.launcher.launch(replay)?);
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        self.process.as_mut().is_some_and(DolphinProcess::is_alive)
    }

    fn terminate(&mut self) -> Result<(), PlaybackError> {
        if let Some(mut process) = self.process.take() {
            process.terminate()?;
        }

        Ok(())
    }
}
