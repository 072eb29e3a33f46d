//! Configuration for the Alfred engine.
//!
//! Values are read from a TOML file (every section and key is optional and falls
//! back to the defaults below), then a handful of path values can be overridden
//! from the environment, and finally the result is validated. An invalid config is
//! the one failure that is allowed to stop the program, so it is checked before any
//! listener or emulator gets started.

use std::env;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dolphin_integrations::Log;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(String),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Byte order of the controller datagrams. The emulator writes its sample struct
/// as-is, so this normally matches the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Native,
    Big,
    Little,
}

/// Socket and buffering parameters for the ingestion side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: IpAddr,
    pub controller_port: u16,
    pub slippi_port: u16,
    pub video_port: u16,

    /// How long a listener blocks in `recv` before re-checking whether it should
    /// keep running.
    pub receive_timeout_ms: u64,

    /// Capacity of each per-channel ring buffer.
    pub buffer_capacity: usize,

    /// Maximum number of partially received video frames held at once.
    pub max_video_frames: usize,

    pub controller_byte_order: ByteOrder,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            controller_port: 55079,
            slippi_port: 55080,
            video_port: 55081,
            receive_timeout_ms: 1000,
            buffer_capacity: 100,
            max_video_frames: 10,
            controller_byte_order: ByteOrder::Native,
        }
    }
}

impl NetworkConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn controller_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.controller_port)
    }

    pub fn slippi_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.slippi_port)
    }

    pub fn video_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.video_port)
    }
}

/// Payload sizes used for game-state events until the stream negotiates its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadSizesConfig {
    pub start: u16,
    pub pre_frame: u16,
    pub post_frame: u16,
    pub end: u16,
}

impl Default for PayloadSizesConfig {
    fn default() -> Self {
        Self {
            start: 418,
            pre_frame: 64,
            post_frame: 52,
            end: 2,
        }
    }
}

/// Which recorded games are worth replaying.
///
/// Character and stage ids are the ones Slippi writes into the game start block
/// (external character ids, internal stage ids).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub min_slippi_version: String,
    pub min_frame_length: u32,
    pub no_lras: bool,
    pub player_character_id: u8,
    pub player_costume_id: u8,
    pub opponent_character_id: u8,
    pub stage_id: u16,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            min_slippi_version: "2.0.0".into(),
            min_frame_length: 1500,
            no_lras: true,
            player_character_id: 0,
            player_costume_id: 4,
            opponent_character_id: 20,
            stage_id: 31,
        }
    }
}

/// Offline playback: where Dolphin, the ISO and the replays live.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Offline playback only runs when this is set.
    pub enabled: bool,
    pub executable: PathBuf,
    pub iso: PathBuf,

    /// Directory scanned for `.slp` files.
    pub slippi_data: PathBuf,

    /// Optional pre-built index of accepted replays. When present (and readable)
    /// it is used instead of scanning `slippi_data`.
    pub index_file: Option<PathBuf>,

    /// Where the playback command file is written before each launch.
    pub comm_file: PathBuf,

    /// How long a replay may go without telemetry before it's considered stalled.
    pub burnout_ms: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        let executable = if cfg!(windows) {
            "./Ishiiruka/bin/Dolphin.exe"
        } else {
            "./Ishiiruka/bin/dolphin"
        };

        Self {
            enabled: false,
            executable: executable.into(),
            iso: "./melee.iso".into(),
            slippi_data: "./data/".into(),
            index_file: None,
            comm_file: "slippi_com.json".into(),
            burnout_ms: 10_000,
        }
    }
}

impl EmulatorConfig {
    pub fn burnout(&self) -> Duration {
        Duration::from_millis(self.burnout_ms)
    }
}

/// Values that may be supplied through the environment. Anything set here wins
/// over the file.
#[derive(Clone, Debug, Default)]
pub struct EnvOverrides {
    pub slippi_data: Option<PathBuf>,
    pub executable: Option<PathBuf>,
    pub iso: Option<PathBuf>,
}

impl EnvOverrides {
    /// Reads `ALFRED_SLIPPI_DATA`, `ALFRED_EMULATOR` and `ALFRED_MELEE_ISO`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            slippi_data: lookup("ALFRED_SLIPPI_DATA").map(PathBuf::from),
            executable: lookup("ALFRED_EMULATOR").map(PathBuf::from),
            iso: lookup("ALFRED_MELEE_ISO").map(PathBuf::from),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlfredConfig {
    pub network: NetworkConfig,
    pub payload_sizes: PayloadSizesConfig,
    pub replay: ReplayConfig,
    pub emulator: EmulatorConfig,
}

impl AlfredConfig {
    /// Loads the config at `path` (or the defaults, if no path is given), applies
    /// environment overrides, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let config = config.merge(EnvOverrides::from_env());
        config.validate()?;

        tracing::info!(target: Log::Config, ?path, "Configuration loaded");

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;

        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse(message) => ConfigError::Parse(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Merges environment overrides in. Values in `overrides` take precedence.
    pub fn merge(mut self, overrides: EnvOverrides) -> Self {
        if let Some(slippi_data) = overrides.slippi_data {
            self.emulator.slippi_data = slippi_data;
        }

        if let Some(executable) = overrides.executable {
            self.emulator.executable = executable;
        }

        if let Some(iso) = overrides.iso {
            self.emulator.iso = iso;
        }

        self
    }

    /// Checks the things that would otherwise blow up (or silently misbehave)
    /// once the listeners are running.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let network = &self.network;

        if network.buffer_capacity == 0 {
            return Err(ConfigError::Invalid("network.buffer_capacity must be at least 1".into()));
        }

        if network.max_video_frames == 0 {
            return Err(ConfigError::Invalid("network.max_video_frames must be at least 1".into()));
        }

        if network.receive_timeout_ms == 0 {
            return Err(ConfigError::Invalid("network.receive_timeout_ms must be non-zero".into()));
        }

        let ports = [network.controller_port, network.slippi_port, network.video_port];

        if ports.contains(&0) {
            return Err(ConfigError::Invalid(format!("listener ports must be non-zero: {ports:?}")));
        }

        if ports[0] == ports[1] || ports[0] == ports[2] || ports[1] == ports[2] {
            return Err(ConfigError::Invalid(format!("listener ports must be distinct: {ports:?}")));
        }

        if self.emulator.burnout_ms == 0 {
            return Err(ConfigError::Invalid("emulator.burnout_ms must be non-zero".into()));
        }

        if self.replay.min_slippi_version.trim().is_empty() {
            return Err(ConfigError::Invalid("replay.min_slippi_version is required".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = AlfredConfig::from_toml("").unwrap();

        assert_eq!(config, AlfredConfig::default());
        assert_eq!(config.network.slippi_port, 55080);
        assert_eq!(config.payload_sizes.start, 418);
        assert_eq!(config.replay.stage_id, 31);
        assert_eq!(config.emulator.burnout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = AlfredConfig::from_toml(
            r#"
            [network]
            slippi_port = 6000
            controller_byte_order = "big"

            [replay]
            min_slippi_version = "3.0.0"
            no_lras = false
            "#,
        )
        .unwrap();

        assert_eq!(config.network.slippi_port, 6000);
        assert_eq!(config.network.controller_port, 55079);
        assert_eq!(config.network.controller_byte_order, ByteOrder::Big);
        assert_eq!(config.replay.min_slippi_version, "3.0.0");
        assert!(!config.replay.no_lras);
        assert_eq!(config.replay.min_frame_length, 1500);
    }

    #[test]
    fn test_bad_toml_is_a_parse_error() {
        assert!(matches!(
            AlfredConfig::from_toml("[network\nslippi_port = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let overrides = EnvOverrides::from_lookup(|key| match key {
            "ALFRED_SLIPPI_DATA" => Some("/replays".into()),
            "ALFRED_MELEE_ISO" => Some("/games/melee.iso".into()),
            _ => None,
        });

        let config = AlfredConfig::default().merge(overrides);

        assert_eq!(config.emulator.slippi_data, PathBuf::from("/replays"));
        assert_eq!(config.emulator.iso, PathBuf::from("/games/melee.iso"));
        assert_eq!(config.emulator.executable, EmulatorConfig::default().executable);
    }

    #[test]
    fn test_validation_rejects_duplicate_ports() {
        let mut config = AlfredConfig::default();
        config.network.video_port = config.network.slippi_port;

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_rejects_zero_capacity() {
        let mut config = AlfredConfig::default();
        config.network.buffer_capacity = 0;

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            AlfredConfig::from_file(&dir.path().join("nope.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alfred.toml");
        std::fs::write(&path, "[emulator]\nenabled = true\nburnout_ms = 2500\n").unwrap();

        let config = AlfredConfig::from_file(&path).unwrap();

        assert!(config.emulator.enabled);
        assert_eq!(config.emulator.burnout(), Duration::from_millis(2500));
    }
}
