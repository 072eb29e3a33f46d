//! Wire formats for everything Dolphin streams at us.
//!
//! - Game state: the Slippi event stream (`Start`, pre/post `Frame`, `End`), with a
//!   payload size table that the stream itself can renegotiate.
//! - Controller: one fixed-layout sample per datagram.
//! - Video: frames split into fragments that can arrive in any order.
//!
//! Nothing in here does I/O; everything works on byte slices handed over by the
//! listeners.

mod cursor;
pub use cursor::{BinaryCursor, Endian};

mod error;
pub use error::DecodeError;

mod version;
pub use version::Version;

pub mod event;
pub use event::{FramePhase, FrameUpdate, GameEnd, GameEvent, GameStart, Player, PlayerType, Position, TimedEvent};

mod payload;
pub use payload::PayloadSizeTable;

mod decoder;
pub use decoder::{decode_next, Decoded, DecodedStream, GameEventDecoder, RAW_MARKER};

mod controller;
pub use controller::{ControllerSample, CONTROLLER_PACKET_SIZE};

mod video;
pub use video::{VideoFragmentHeader, VideoFragmentReassembler, VideoFrame, VIDEO_HEADER_SIZE};

/// Datagrams on the game-state socket lead with a big-endian `(seconds, micros)`
/// pair before the event stream itself.
pub const TIMESTAMP_PREFIX_SIZE: usize = 8;

/// Combines a `(seconds, micros)` pair into one floating timestamp, used for
/// ordering records across transports.
pub fn combine_timestamp(seconds: u32, micros: u32) -> f64 {
    seconds as f64 + (micros as f64 / 1_000_000.0)
}

/// Splits a game-state datagram into its timestamp and the event stream bytes.
pub fn split_timestamp(datagram: &[u8]) -> Result<(f64, &[u8]), DecodeError> {
    let mut cursor = BinaryCursor::new(datagram);
    let seconds = cursor.read_u32(Endian::Big)?;
    let micros = cursor.read_u32(Endian::Big)?;

    Ok((combine_timestamp(seconds, micros), cursor.rest()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_timestamp() {
        assert_eq!(combine_timestamp(12, 500_000), 12.5);
        assert_eq!(combine_timestamp(0, 5), 0.000005);
    }

    #[test]
    fn test_split_timestamp() {
        let mut datagram = vec![0, 0, 0, 3, 0x00, 0x07, 0xA1, 0x20];
        datagram.extend_from_slice(&[0x39, 0x02]);

        let (timestamp, rest) = split_timestamp(&datagram).unwrap();

        assert_eq!(timestamp, 3.5);
        assert_eq!(rest, &[0x39, 0x02]);
    }

    #[test]
    fn test_split_timestamp_rejects_short_datagrams() {
        assert!(matches!(split_timestamp(&[0, 0, 1]), Err(DecodeError::Truncated { .. })));
    }
}
