//! Per-transport datagram decoding. Each listener owns exactly one handler, so any
//! state a handler keeps (the payload size table, partially received video frames)
//! is never shared between threads.

use dolphin_integrations::Log;

use alfred_wire::{split_timestamp, ControllerSample, Endian, GameEventDecoder, TimedEvent, VideoFragmentReassembler};

use crate::{IngestError, Record};

/// Turns one raw datagram into zero or more records.
pub trait DatagramHandler: Send + 'static {
    /// Pushes every record decoded from `datagram` onto `records`. On error, the
    /// records pushed before the failure are still delivered.
    fn handle(&mut self, datagram: &[u8], records: &mut Vec<Record>) -> Result<(), IngestError>;
}

/// Game-state datagrams: an 8-byte timestamp and then a Slippi event stream.
#[derive(Debug, Default)]
pub struct GameStateHandler {
    decoder: GameEventDecoder,
    warned_unrecognized: bool,
}

impl GameStateHandler {
    pub fn new(decoder: GameEventDecoder) -> Self {
        Self {
            decoder,
            warned_unrecognized: false,
        }
    }
}

impl DatagramHandler for GameStateHandler {
    fn handle(&mut self, datagram: &[u8], records: &mut Vec<Record>) -> Result<(), IngestError> {
        let (timestamp, stream) = split_timestamp(datagram)?;
        let decoded = self.decoder.decode_stream(stream);

        // Nothing we know how to read: count the stream as drained, but say so once.
        if decoded.is_unrecognized() {
            if !self.warned_unrecognized {
                self.warned_unrecognized = true;
                tracing::warn!(
                    target: Log::Receiver,
                    error = ?decoded.stopped_by,
                    "Unrecognized game-state stream, ignoring datagrams like it"
                );
            }

            return Ok(());
        }

        records.extend(
            decoded
                .events
                .into_iter()
                .map(|event| Record::Game(TimedEvent { timestamp, event })),
        );

        match decoded.stopped_by {
            Some(error) => Err(IngestError::Malformed(error)),
            None => Ok(()),
        }
    }
}

/// Controller datagrams: one fixed-layout sample each.
#[derive(Debug)]
pub struct ControllerHandler {
    endian: Endian,
}

impl ControllerHandler {
    pub fn new(endian: Endian) -> Self {
        Self { endian }
    }
}

impl DatagramHandler for ControllerHandler {
    fn handle(&mut self, datagram: &[u8], records: &mut Vec<Record>) -> Result<(), IngestError> {
        let sample = ControllerSample::parse(datagram, self.endian)?;
        records.push(Record::Controller(sample));
        Ok(())
    }
}

/// Video datagrams: fragments that get stitched back into frames.
#[derive(Debug)]
pub struct VideoHandler {
    reassembler: VideoFragmentReassembler,
}

impl VideoHandler {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            reassembler: VideoFragmentReassembler::new(max_in_flight),
        }
    }
}

impl DatagramHandler for VideoHandler {
    fn handle(&mut self, datagram: &[u8], records: &mut Vec<Record>) -> Result<(), IngestError> {
        // Rejected fragments are logged by the reassembler; false also covers a
        // fragment that didn't finish anything.
        if self.reassembler.update(datagram) {
            records.extend(self.reassembler.drain_ready().map(Record::Video));
        }

        Ok(())
    }
}
