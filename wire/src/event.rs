//! Typed game-state events, and the byte layouts they are decoded from.
//!
//! Offsets below are relative to the start of an event's payload (i.e. after the
//! one-byte event code).

use crate::{BinaryCursor, DecodeError, Version};

/// Event codes used by the Slippi stream.
pub mod codes {
    pub const EVENT_PAYLOADS: u8 = 0x35;
    pub const GAME_START: u8 = 0x36;
    pub const PRE_FRAME: u8 = 0x37;
    pub const POST_FRAME: u8 = 0x38;
    pub const GAME_END: u8 = 0x39;
}

/// Number of controller ports on the console.
pub const PORT_COUNT: usize = 4;

const START_IS_TEAMS: usize = 12;
const START_STAGE: usize = 18;
const START_PLAYERS: usize = 100;
const START_PLAYER_BLOCK: usize = 36;
const START_RANDOM_SEED: usize = 316;

const PLAYER_TYPE_EMPTY: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerType {
    Human,
    Cpu,
    Demo,
}

impl TryFrom<u8> for PlayerType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Human),
            1 => Ok(Self::Cpu),
            2 => Ok(Self::Demo),
            other => Err(DecodeError::Malformed(format!("unknown player type {other}"))),
        }
    }
}

/// One occupied port in the game start block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Player {
    pub character_id: u8,
    pub player_type: PlayerType,
    pub stocks: u8,
    pub costume_id: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GameStart {
    pub version: Version,
    pub is_teams: bool,
    pub stage_id: u16,

    /// Indexed by port; `None` for an empty slot.
    pub players: [Option<Player>; PORT_COUNT],

    /// Only present when the payload is long enough to carry it.
    pub random_seed: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// The parts of a pre-frame update we actually look at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreFrame {
    pub random_seed: u32,
    pub state_id: u16,
    pub position: Position,
}

/// The parts of a post-frame update we actually look at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PostFrame {
    pub character_id: u8,
    pub state_id: u16,
    pub position: Position,
    pub percent: f32,

    /// Absent on very short (early protocol) payloads.
    pub stocks: Option<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FramePhase {
    Pre(PreFrame),
    Post(PostFrame),
}

/// A per-port, per-frame update. Everything beyond the typed fields in `phase`
/// is kept as the raw `payload` for downstream consumers.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameUpdate {
    pub frame_index: i32,
    pub port: u8,
    pub is_follower: bool,
    pub phase: FramePhase,
    pub payload: Vec<u8>,
}

impl FrameUpdate {
    pub fn is_pre(&self) -> bool {
        matches!(self.phase, FramePhase::Pre(_))
    }

    pub fn state_id(&self) -> u16 {
        match self.phase {
            FramePhase::Pre(pre) => pre.state_id,
            FramePhase::Post(post) => post.state_id,
        }
    }

    pub fn position(&self) -> Position {
        match self.phase {
            FramePhase::Pre(pre) => pre.position,
            FramePhase::Post(post) => post.position,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameEnd {
    pub method: u8,

    /// The port that quit out with L+R+A+Start, if anybody did.
    pub lras_initiator: Option<u8>,
}

impl GameEnd {
    /// Whether the game was ended manually (LRAS) rather than played out.
    pub fn lras_initiator(&self) -> bool {
        self.lras_initiator.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    Start(GameStart),
    Frame(FrameUpdate),
    End(GameEnd),
}

/// A game event alongside the timestamp of the datagram that carried it.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedEvent {
    pub timestamp: f64,
    pub event: GameEvent,
}

fn read_port(cursor: &mut BinaryCursor<'_>) -> Result<u8, DecodeError> {
    let port = cursor.read_u8()?;

    if port as usize >= PORT_COUNT {
        return Err(DecodeError::Malformed(format!("port index {port} out of range")));
    }

    Ok(port)
}

fn read_position(cursor: &mut BinaryCursor<'_>) -> Result<Position, DecodeError> {
    Ok(Position {
        x: cursor.read_f32_be()?,
        y: cursor.read_f32_be()?,
    })
}

impl GameStart {
    pub(crate) fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = BinaryCursor::new(payload);

        let [major, minor, build, _] = {
            let bytes = cursor.read_bytes(4)?;
            [bytes[0], bytes[1], bytes[2], bytes[3]]
        };

        cursor.seek(START_IS_TEAMS)?;
        let is_teams = cursor.read_bool()?;

        cursor.seek(START_STAGE)?;
        let stage_id = cursor.read_u16_be()?;

        let mut players = [None; PORT_COUNT];

        for (port, slot) in players.iter_mut().enumerate() {
            cursor.seek(START_PLAYERS + port * START_PLAYER_BLOCK)?;

            let character_id = cursor.read_u8()?;
            let player_type = cursor.read_u8()?;
            let stocks = cursor.read_u8()?;
            let costume_id = cursor.read_u8()?;

            if player_type == PLAYER_TYPE_EMPTY {
                continue;
            }

            *slot = Some(Player {
                character_id,
                player_type: PlayerType::try_from(player_type)?,
                stocks,
                costume_id,
            });
        }

        let random_seed = if payload.len() >= START_RANDOM_SEED + 4 {
            cursor.seek(START_RANDOM_SEED)?;
            Some(cursor.read_u32_be()?)
        } else {
            None
        };

        Ok(Self {
            version: Version::new(major, minor, build),
            is_teams,
            stage_id,
            players,
            random_seed,
        })
    }
}

impl FrameUpdate {
    /// Pre: frame(0) port(4) follower(5) seed(6) state(10) x(12) y(16)
    pub(crate) fn parse_pre(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = BinaryCursor::new(payload);

        let frame_index = cursor.read_i32_be()?;
        let port = read_port(&mut cursor)?;
        let is_follower = cursor.read_bool()?;
        let random_seed = cursor.read_u32_be()?;
        let state_id = cursor.read_u16_be()?;
        let position = read_position(&mut cursor)?;

        Ok(Self {
            frame_index,
            port,
            is_follower,
            phase: FramePhase::Pre(PreFrame {
                random_seed,
                state_id,
                position,
            }),
            payload: payload.to_vec(),
        })
    }

    /// Post: frame(0) port(4) follower(5) character(6) state(7) x(9) y(13)
    /// direction(17) percent(21) shield(25) ... stocks(32)
    pub(crate) fn parse_post(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = BinaryCursor::new(payload);

        let frame_index = cursor.read_i32_be()?;
        let port = read_port(&mut cursor)?;
        let is_follower = cursor.read_bool()?;
        let character_id = cursor.read_u8()?;
        let state_id = cursor.read_u16_be()?;
        let position = read_position(&mut cursor)?;
        let _direction = cursor.read_f32_be()?;
        let percent = cursor.read_f32_be()?;

        let stocks = if payload.len() > 32 {
            cursor.seek(32)?;
            Some(cursor.read_u8()?)
        } else {
            None
        };

        Ok(Self {
            frame_index,
            port,
            is_follower,
            phase: FramePhase::Post(PostFrame {
                character_id,
                state_id,
                position,
                percent,
                stocks,
            }),
            payload: payload.to_vec(),
        })
    }
}

impl GameEnd {
    /// method(0) lras_initiator(1, signed, negative means nobody)
    pub(crate) fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = BinaryCursor::new(payload);
        let method = cursor.read_u8()?;

        let lras_initiator = match cursor.read_i8() {
            Ok(port) if port < 0 => None,
            Ok(port) if port as usize >= PORT_COUNT => {
                return Err(DecodeError::Malformed(format!("LRAS initiator {port} out of range")));
            },
            Ok(port) => Some(port as u8),
            Err(_) => None,
        };

        Ok(Self { method, lras_initiator })
    }
}
