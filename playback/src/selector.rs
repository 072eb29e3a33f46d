use crate::config::Criteria;
use crate::types::ReplayMetadata;

/// Decides whether a replay is worth playing back.
///
/// Returns the zero-based `(observed, opponent)` ports when it is. The rules run in
/// order and the first failure rejects:
///
/// 1. protocol version at least the configured minimum
/// 2. at least the configured number of frames
/// 3. when `no_lras` is set, nobody quit out with L+R+A+Start
/// 4. a singles game on the configured stage
/// 5. exactly one port has the configured character in the configured costume, and
///    a different port has the opponent character
pub fn matches(metadata: &ReplayMetadata, criteria: &Criteria) -> Option<(usize, usize)> {
    if metadata.version < criteria.min_version {
        return None;
    }

    if metadata.frame_count < criteria.min_frame_length {
        return None;
    }

    if criteria.no_lras && metadata.lras_initiator {
        return None;
    }

    if metadata.is_teams || metadata.stage_id != criteria.stage_id {
        return None;
    }

    let mut tracked = metadata
        .players
        .iter()
        .enumerate()
        .filter(|(_, slot)| **slot == Some(criteria.player))
        .map(|(port, _)| port);

    let observed = tracked.next()?;

    if tracked.next().is_some() {
        return None;
    }

    let opponent = metadata.players.iter().enumerate().position(|(port, slot)| {
        port != observed && slot.is_some_and(|player| player.character_id == criteria.opponent_character_id)
    })?;

    Some((observed, opponent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlayerSlot;
    use alfred_wire::Version;

    fn criteria() -> Criteria {
        Criteria {
            min_version: Version::new(2, 0, 0),
            min_frame_length: 1500,
            no_lras: true,
            player: PlayerSlot {
                character_id: 0,
                costume_id: 4,
            },
            opponent_character_id: 20,
            stage_id: 31,
        }
    }

    fn metadata() -> ReplayMetadata {
        ReplayMetadata {
            version: Version::new(3, 14, 0),
            frame_count: 1800,
            stage_id: 31,
            is_teams: false,
            players: [
                Some(PlayerSlot {
                    character_id: 0,
                    costume_id: 4,
                }),
                Some(PlayerSlot {
                    character_id: 20,
                    costume_id: 0,
                }),
                None,
                None,
            ],
            lras_initiator: false,
        }
    }

    #[test]
    fn test_matching_replay() {
        assert_eq!(matches(&metadata(), &criteria()), Some((0, 1)));
    }

    #[test]
    fn test_ports_follow_the_players() {
        let mut metadata = metadata();
        metadata.players = [None, metadata.players[1], None, metadata.players[0]];

        assert_eq!(matches(&metadata, &criteria()), Some((3, 1)));
    }

    #[test]
    fn test_old_version_rejected() {
        let mut metadata = metadata();
        metadata.version = Version::new(1, 14, 0);

        assert_eq!(matches(&metadata, &criteria()), None);
    }

    #[test]
    fn test_short_game_rejected() {
        let mut metadata = metadata();
        metadata.frame_count = 1499;

        assert_eq!(matches(&metadata, &criteria()), None);
    }

    #[test]
    fn test_lras_only_rejected_when_configured() {
        let mut metadata = metadata();
        metadata.lras_initiator = true;

        assert_eq!(matches(&metadata, &criteria()), None);

        let lenient = Criteria {
            no_lras: false,
            ..criteria()
        };
        assert_eq!(matches(&metadata, &lenient), Some((0, 1)));
    }

    #[test]
    fn test_teams_or_wrong_stage_rejected() {
        let mut teams = metadata();
        teams.is_teams = true;
        assert_eq!(matches(&teams, &criteria()), None);

        let mut elsewhere = metadata();
        elsewhere.stage_id = 32;
        assert_eq!(matches(&elsewhere, &criteria()), None);
    }

    #[test]
    fn test_wrong_costume_or_missing_opponent_rejected() {
        let mut costume = metadata();
        costume.players[0] = Some(PlayerSlot {
            character_id: 0,
            costume_id: 1,
        });
        assert_eq!(matches(&costume, &criteria()), None);

        let mut alone = metadata();
        alone.players[1] = None;
        assert_eq!(matches(&alone, &criteria()), None);
    }

    #[test]
    fn test_mirror_match_needs_two_ports() {
        let mirror = Criteria {
            opponent_character_id: 0,
            ..criteria()
        };

        let mut metadata = metadata();
        assert_eq!(matches(&metadata, &mirror), None);

        metadata.players[2] = Some(PlayerSlot {
            character_id: 0,
            costume_id: 2,
        });
        assert_eq!(matches(&metadata, &mirror), Some((0, 2)));
    }

    #[test]
    fn test_two_tracked_players_rejected() {
        let mut metadata = metadata();
        metadata.players[2] = metadata.players[0];

        assert_eq!(matches(&metadata, &criteria()), None);
    }
}
