use std::fs;
use std::path::Path;

use alfred_wire::{BinaryCursor, Decoded, GameEnd, GameEvent, GameStart, PayloadSizeTable, RAW_MARKER, decode_next};

use crate::errors::PlaybackError;
use crate::types::{PlayerSlot, ReplayMetadata};

/// Reads whatever we need to know about a replay off disk.
pub trait ReplayParser: std::fmt::Debug {
    fn parse(&self, path: &Path) -> Result<ReplayMetadata, PlaybackError>;
}

/// Parses `.slp` files with the same decoder the live stream goes through.
#[derive(Default, Debug)]
pub struct SlpReplayParser;

impl ReplayParser for SlpReplayParser {
    fn parse(&self, path: &Path) -> Result<ReplayMetadata, PlaybackError> {
        ReplayMetadata::from_path(path)
    }
}

impl ReplayMetadata {
    pub fn from_path(path: &Path) -> Result<Self, PlaybackError> {
        let bytes = fs::read(path).map_err(|e| PlaybackError::ReplayIo(format!("{}: {e}", path.display())))?;

        Self::from_bytes(&bytes).map_err(|e| match e {
            PlaybackError::ReplayParse(message) => PlaybackError::ReplayParse(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    /// Reads the `raw` element of a `.slp` file: the UBJSON marker, a big-endian
    /// length, and then the same event stream the emulator sends live (starting
    /// with its payload sizes). A zero length (a replay that was never finalized)
    /// means "everything up to the end of the file".
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PlaybackError> {
        let mut cursor = BinaryCursor::new(bytes);

        if !cursor.expect_bytes(RAW_MARKER) {
            return Err(PlaybackError::ReplayParse("missing raw element marker".into()));
        }

        let raw_length = cursor.read_u32_be().map_err(parse_error)? as usize;

        let mut raw = match raw_length {
            0 => BinaryCursor::new(cursor.rest()),
            length => cursor.sub_cursor(length).map_err(parse_error)?,
        };

        let mut table = PayloadSizeTable::builtin();
        let mut start: Option<GameStart> = None;
        let mut end: Option<GameEnd> = None;
        let mut last_frame: Option<i32> = None;
        let mut frame_count = 0u32;

        while !raw.is_empty() {
            match decode_next(&mut raw, &mut table).map_err(parse_error)? {
                Decoded::Event(GameEvent::Start(game_start)) => start = Some(game_start),

                Decoded::Event(GameEvent::Frame(update)) => {
                    if last_frame.is_none_or(|last| update.frame_index > last) {
                        last_frame = Some(update.frame_index);
                        frame_count += 1;
                    }
                },

                Decoded::Event(GameEvent::End(game_end)) => end = Some(game_end),

                Decoded::TableUpdated | Decoded::Skipped(_) => {},
            }
        }

        let start = start.ok_or_else(|| PlaybackError::ReplayParse("no game start event".into()))?;

        Ok(Self {
            version: start.version,
            frame_count,
            stage_id: start.stage_id,
            is_teams: start.is_teams,
            players: start.players.map(|player| {
                player.map(|player| PlayerSlot {
                    character_id: player.character_id,
                    costume_id: player.costume_id,
                })
            }),
            lras_initiator: end.is_some_and(|end| end.lras_initiator()),
        })
    }
}

fn parse_error(error: alfred_wire::DecodeError) -> PlaybackError {
    PlaybackError::ReplayParse(error.to_string())
}
