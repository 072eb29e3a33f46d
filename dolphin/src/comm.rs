use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ProcessError;

/// The communication file that the playback build of Dolphin reads on launch
/// (`-i <file>`) to figure out which replay it should be playing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackCommand {
    pub mode: String,
    pub replay: PathBuf,

    #[serde(rename = "isRealTimeMode")]
    pub is_real_time_mode: bool,

    /// Dolphin only reloads the file when this changes, so every launch gets a
    /// fresh one.
    #[serde(rename = "commandId")]
    pub command_id: String,
}

impl PlaybackCommand {
    /// Builds a normal-mode, non-realtime playback command for `replay`.
    pub fn normal(replay: impl Into<PathBuf>) -> Self {
        Self {
            mode: "normal".into(),
            replay: replay.into(),
            is_real_time_mode: false,
            command_id: generate_command_id(),
        }
    }

    /// Serializes the command and writes it to `path`, replacing anything there.
    pub fn write_to(&self, path: &Path) -> Result<(), ProcessError> {
        let json = serde_json::to_string(self).map_err(|e| ProcessError::CommFile(format!("{}: {e}", path.display())))?;

        fs::write(path, json).map_err(|e| ProcessError::CommFile(format!("{}: {e}", path.display())))
    }
}

/// 24 lowercase hex characters, same shape as the ids the launcher uses.
fn generate_command_id() -> String {
    (0..12).map(|_| format!("{:02x}", fastrand::u8(..))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serializes_with_dolphin_field_names() {
        let command = PlaybackCommand::normal("/replays/Game_1.slp");
        let json = serde_json::to_value(&command).unwrap();

        assert_eq!(json["mode"], "normal");
        assert_eq!(json["replay"], "/replays/Game_1.slp");
        assert_eq!(json["isRealTimeMode"], false);
        assert_eq!(json["commandId"].as_str().unwrap().len(), 24);
    }

    #[test]
    fn test_command_ids_change_between_launches() {
        let first = PlaybackCommand::normal("a.slp");
        let second = PlaybackCommand::normal("a.slp");

        assert_ne!(first.command_id, second.command_id);
    }

    #[test]
    fn test_write_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slippi_com.json");

        let command = PlaybackCommand::normal("b.slp");
        command.write_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: PlaybackCommand = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, command);
    }
}
