use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;

use thiserror::Error;

use crate::{Log, PlaybackCommand};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("required path does not exist: {0:?}")]
    MissingPath(PathBuf),

    #[error("unable to write playback comm file: {0}")]
    CommFile(String),

    #[error("failed to spawn Dolphin: {0}")]
    Spawn(io::Error),

    #[error("failed to signal Dolphin: {0}")]
    Signal(io::Error),
}

/// Everything needed to start the playback build of Dolphin against a replay.
#[derive(Clone, Debug)]
pub struct DolphinLauncher {
    executable: PathBuf,
    iso: PathBuf,
    comm_file: PathBuf,
}

impl DolphinLauncher {
    pub fn new(executable: impl Into<PathBuf>, iso: impl Into<PathBuf>, comm_file: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            iso: iso.into(),
            comm_file: comm_file.into(),
        }
    }

    /// Both the emulator and the ISO need to exist before we bother trying.
    pub fn check_paths(&self) -> Result<(), ProcessError> {
        for path in [&self.executable, &self.iso] {
            if !path.exists() {
                return Err(ProcessError::MissingPath(path.clone()));
            }
        }

        Ok(())
    }

    /// Writes the comm file for `replay` and spawns Dolphin pointed at it.
    ///
    /// The replay itself is checked for existence here as well, as Dolphin will
    /// happily sit on a black screen forever if handed a bad path.
    pub fn launch(&self, replay: &Path) -> Result<DolphinProcess, ProcessError> {
        self.check_paths()?;

        if !replay.exists() {
            return Err(ProcessError::MissingPath(replay.to_path_buf()));
        }

        PlaybackCommand::normal(replay).write_to(&self.comm_file)?;

        let mut child = Command::new(&self.executable)
            .arg("-i")
            .arg(&self.comm_file)
            .arg("-e")
            .arg(&self.iso)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ProcessError::Spawn)?;

        tracing::info!(target: Log::Emulator, pid = child.id(), ?replay, "Launched Dolphin");

        let mut output_threads = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            output_threads.push(spawn_output_reader("DolphinStdoutReaderThread", stdout, false));
        }

        if let Some(stderr) = child.stderr.take() {
            output_threads.push(spawn_output_reader("DolphinStderrReaderThread", stderr, true));
        }

        Ok(DolphinProcess { child, output_threads })
    }
}

/// A running (or recently running) Dolphin instance.
///
/// Dropping this terminates the process and joins the output reader threads.
#[derive(Debug)]
pub struct DolphinProcess {
    child: Child,
    output_threads: Vec<thread::JoinHandle<()>>,
}

impl DolphinProcess {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Whether the process is still running. A failed status check is treated as
    /// "not running" since there's nothing further we could do with the handle.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::debug!(target: Log::Emulator, ?status, "Dolphin has exited");
                false
            },
            Err(error) => {
                tracing::error!(target: Log::Emulator, ?error, "Unable to query Dolphin status");
                false
            },
        }
    }

    /// Kills the process (if it's still around), reaps it, and joins the reader
    /// threads. Safe to call more than once.
    pub fn terminate(&mut self) -> Result<(), ProcessError> {
        if self.is_alive() {
            tracing::info!(target: Log::Emulator, pid = self.child.id(), "Terminating Dolphin");
            self.child.kill().map_err(ProcessError::Signal)?;
        }

        self.child.wait().map_err(ProcessError::Signal)?;

        for handle in self.output_threads.drain(..) {
            if let Err(error) = handle.join() {
                tracing::error!(target: Log::Emulator, ?error, "Dolphin output reader thread failure");
            }
        }

        Ok(())
    }
}

impl Drop for DolphinProcess {
    fn drop(&mut self) {
        if let Err(error) = self.terminate() {
            tracing::error!(target: Log::Emulator, ?error, "Failed to terminate Dolphin on drop");
        }
    }
}

/// Forwards each line the emulator prints into our logs. The thread ends on EOF,
/// which happens once the process is gone.
fn spawn_output_reader<R>(name: &str, stream: R, is_stderr: bool) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            for line in BufReader::new(stream).lines() {
                match line {
                    Ok(line) if is_stderr => tracing::warn!(target: Log::Emulator, "{line}"),
                    Ok(line) => tracing::debug!(target: Log::Emulator, "{line}"),
                    Err(_) => break,
                }
            }
        })
        .expect("Failed to spawn Dolphin output reader thread.")
}
