use alfred_config::ReplayConfig;
use alfred_wire::Version;

use crate::errors::PlaybackError;
use crate::types::PlayerSlot;

/// The replay selection rules, with everything already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criteria {
    pub min_version: Version,
    pub min_frame_length: u32,
    pub no_lras: bool,
    pub player: PlayerSlot,
    pub opponent_character_id: u8,
    pub stage_id: u16,
}

impl Criteria {
    /// Fails if the configured minimum version isn't a `major.minor.build` string.
    pub fn from_config(config: &ReplayConfig) -> Result<Self, PlaybackError> {
        let min_version = config.min_slippi_version.parse::<Version>().map_err(|e| {
            PlaybackError::ConfigInvalid(format!(
                "replay.min_slippi_version {:?}: {e}",
                config.min_slippi_version
            ))
        })?;

        Ok(Self {
            min_version,
            min_frame_length: config.min_frame_length,
            no_lras: config.no_lras,
            player: PlayerSlot {
                character_id: config.player_character_id,
                costume_id: config.player_costume_id,
            },
            opponent_character_id: config.opponent_character_id,
            stage_id: config.stage_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let criteria = Criteria::from_config(&ReplayConfig::default()).unwrap();

        assert_eq!(criteria.min_version, Version::new(2, 0, 0));
        assert_eq!(criteria.min_frame_length, 1500);
        assert!(criteria.no_lras);
        assert_eq!(
            criteria.player,
            PlayerSlot {
                character_id: 0,
                costume_id: 4
            }
        );
        assert_eq!(criteria.opponent_character_id, 20);
        assert_eq!(criteria.stage_id, 31);
    }

    #[test]
    fn test_bad_version_is_config_invalid() {
        let config = ReplayConfig {
            min_slippi_version: "2.x".into(),
            ..ReplayConfig::default()
        };

        assert!(matches!(Criteria::from_config(&config), Err(PlaybackError::ConfigInvalid(_))));
    }
}
