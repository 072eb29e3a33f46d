use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dolphin_integrations::Log;

use crate::config::Criteria;
use crate::errors::PlaybackError;
use crate::parser::{ReplayParser, SlpReplayParser};
use crate::selector::matches;
use crate::types::ReplayCandidate;

/// On-disk shape of a saved index. Replay paths are stored relative to the
/// replay directory when they live inside it.
#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    replays: Vec<ReplayCandidate>,
}

/// The queue of replays that passed selection, in the order they'll be played.
#[derive(Debug, Default)]
pub struct ReplayCatalog {
    candidates: VecDeque<ReplayCandidate>,
}

impl ReplayCatalog {
    pub fn from_candidates(candidates: impl IntoIterator<Item = ReplayCandidate>) -> Self {
        Self {
            candidates: candidates.into_iter().collect(),
        }
    }

    /// Evaluates every `.slp` file in `dir` (sorted by name).
    pub fn scan(dir: &Path, criteria: &Criteria) -> Result<Self, PlaybackError> {
        Self::scan_with(dir, criteria, &SlpReplayParser)
    }

    /// Like `scan`, with a custom parser. Files that fail to parse or don't match
    /// are logged and skipped; only failing to list `dir` is an error.
    pub fn scan_with(dir: &Path, criteria: &Criteria, parser: &dyn ReplayParser) -> Result<Self, PlaybackError> {
        let entries = fs::read_dir(dir).map_err(|e| PlaybackError::ReplayIo(format!("{}: {e}", dir.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "slp"))
            .collect();

        files.sort();

        tracing::info!(target: Log::Playback, ?dir, files = files.len(), "Scanning replay directory, please wait");

        let total = files.len();
        let mut candidates = VecDeque::new();

        for replay in files {
            let metadata = match parser.parse(&replay) {
                Ok(metadata) => metadata,
                Err(error) => {
                    tracing::warn!(target: Log::Playback, ?replay, ?error, "Skipping unreadable replay");
                    continue;
                },
            };

            match matches(&metadata, criteria) {
                Some((observed_port, opponent_port)) => candidates.push_back(ReplayCandidate {
                    observed_port,
                    opponent_port,
                    replay,
                }),

                None => tracing::debug!(target: Log::Playback, ?replay, "Replay does not match criteria"),
            }
        }

        tracing::info!(target: Log::Playback, accepted = candidates.len(), total, "Replay scan complete");

        Ok(Self { candidates })
    }

    /// Writes the remaining candidates to `path` as JSON. Paths inside `base_dir`
    /// are stored relative to it.
    pub fn save_index(&self, path: &Path, base_dir: &Path) -> Result<(), PlaybackError> {
        let index = IndexFile {
            replays: self
                .candidates
                .iter()
                .map(|candidate| ReplayCandidate {
                    replay: candidate
                        .replay
                        .strip_prefix(base_dir)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| candidate.replay.clone()),
                    ..candidate.clone()
                })
                .collect(),
        };

        let json = serde_json::to_string_pretty(&index).map_err(|e| PlaybackError::Index(format!("{}: {e}", path.display())))?;

        fs::write(path, json).map_err(|e| PlaybackError::Index(format!("{}: {e}", path.display())))
    }

    /// Loads an index written by `save_index`. Relative paths are resolved against
    /// `base_dir`, and entries whose replay no longer exists are dropped.
    pub fn load_index(path: &Path, base_dir: &Path) -> Result<Self, PlaybackError> {
        let contents = fs::read_to_string(path).map_err(|e| PlaybackError::Index(format!("{}: {e}", path.display())))?;

        let index: IndexFile =
            serde_json::from_str(&contents).map_err(|e| PlaybackError::Index(format!("{}: {e}", path.display())))?;

        let total = index.replays.len();

        let candidates: VecDeque<_> = index
            .replays
            .into_iter()
            .map(|candidate| ReplayCandidate {
                replay: base_dir.join(&candidate.replay),
                ..candidate
            })
            .filter(|candidate| candidate.replay.exists())
            .collect();

        tracing::info!(target: Log::Playback, ?path, loaded = candidates.len(), total, "Loaded replay index");

        Ok(Self { candidates })
    }

    pub fn next_candidate(&mut self) -> Option<ReplayCandidate> {
        self.candidates.pop_front()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlayerSlot, ReplayMetadata};
    use alfred_config::ReplayConfig;
    use alfred_wire::Version;
    use serde_json::json;

    /// Accepts `good*.slp`, rejects `bad*.slp` on criteria, and fails on anything else.
    #[derive(Debug)]
    struct NameParser;

    impl ReplayParser for NameParser {
        fn parse(&self, path: &Path) -> Result<ReplayMetadata, PlaybackError> {
            let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();

            let stage_id = match name {
                name if name.starts_with("good") => 31,
                name if name.starts_with("bad") => 2,
                _ => return Err(PlaybackError::ReplayParse("corrupt".into())),
            };

            Ok(ReplayMetadata {
                version: Version::new(3, 0, 0),
                frame_count: 5000,
                stage_id,
                is_teams: false,
                players: [
                    None,
                    Some(PlayerSlot {
                        character_id: 20,
                        costume_id: 1,
                    }),
                    Some(PlayerSlot {
                        character_id: 0,
                        costume_id: 4,
                    }),
                    None,
                ],
                lras_initiator: false,
            })
        }
    }

    fn criteria() -> Criteria {
        Criteria::from_config(&ReplayConfig::default()).unwrap()
    }

    fn replay_dir(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        dir
    }

    #[test]
    fn test_scan_keeps_matching_replays_in_name_order() {
        let dir = replay_dir(&["good_b.slp", "bad.slp", "corrupt.slp", "good_a.slp", "good_c.txt"]);

        let mut catalog = ReplayCatalog::scan_with(dir.path(), &criteria(), &NameParser).unwrap();

        assert_eq!(catalog.len(), 2);

        let first = catalog.next_candidate().unwrap();
        assert_eq!(first.replay, dir.path().join("good_a.slp"));
        assert_eq!((first.observed_port, first.opponent_port), (2, 1));

        assert_eq!(catalog.next_candidate().unwrap().replay, dir.path().join("good_b.slp"));
        assert!(catalog.next_candidate().is_none());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_scan_of_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            ReplayCatalog::scan(&dir.path().join("nope"), &criteria()),
            Err(PlaybackError::ReplayIo(_))
        ));
    }

    #[test]
    fn test_index_round_trip_drops_missing_replays() {
        let dir = replay_dir(&["good_a.slp", "good_b.slp"]);
        let catalog = ReplayCatalog::scan_with(dir.path(), &criteria(), &NameParser).unwrap();

        let index = dir.path().join("index.json");
        catalog.save_index(&index, dir.path()).unwrap();

        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&index).unwrap()).unwrap();
        assert_eq!(
            saved["replays"][0],
            json!({ "observed_port": 2, "opponent_port": 1, "replay": "good_a.slp" })
        );

        fs::remove_file(dir.path().join("good_a.slp")).unwrap();

        let mut loaded = ReplayCatalog::load_index(&index, dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.next_candidate().unwrap().replay, dir.path().join("good_b.slp"));
    }

    #[test]
    fn test_bad_index_is_an_error() {
        let dir = replay_dir(&[]);
        let index = dir.path().join("index.json");
        fs::write(&index, "{ not json").unwrap();

        assert!(matches!(ReplayCatalog::load_index(&index, dir.path()), Err(PlaybackError::Index(_))));
    }
}
