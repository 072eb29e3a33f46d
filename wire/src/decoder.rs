use dolphin_integrations::Log;

use crate::event::codes;
use crate::{BinaryCursor, DecodeError, FrameUpdate, GameEnd, GameEvent, GameStart, PayloadSizeTable};

/// The UBJSON prefix that opens a raw Slippi stream (`{U\x03raw[$U#l`). It is
/// followed by a 4-byte big-endian length and then the event payloads command.
pub const RAW_MARKER: &[u8] = b"{U\x03raw[$U#l";

/// The result of a single `decode_next` call.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    Event(GameEvent),

    /// The stream opened with its own payload size table, which has replaced the
    /// current one. Nothing else was consumed; call again to get the next event.
    TableUpdated,

    /// An event we have a size for but don't care about. Its payload has been
    /// stepped over.
    Skipped(u8),
}

/// Decodes the next item from `cursor`.
///
/// When the cursor is at the very start of a stream (position 0), this first
/// checks for a payload size negotiation (either the raw marker or a bare event
/// payloads command). If there is one, `table` is replaced and `TableUpdated` is
/// returned. If not, the cursor is left where it was and a normal event is read.
///
/// A normal event is a one-byte code, followed by exactly as many payload bytes as
/// `table` says that code has. The payload is never read past that length. On any
/// error the cursor is put back where the event started.
pub fn decode_next(cursor: &mut BinaryCursor<'_>, table: &mut PayloadSizeTable) -> Result<Decoded, DecodeError> {
    if cursor.position() == 0 && negotiate(cursor, table)? {
        return Ok(Decoded::TableUpdated);
    }

    let start = cursor.position();
    let code = cursor.read_u8()?;

    let Some(size) = table.get(code) else {
        cursor.seek(start)?;
        return Err(DecodeError::UnknownEventType(code));
    };

    let payload = match cursor.read_bytes(size as usize) {
        Ok(payload) => payload,
        Err(e) => {
            cursor.seek(start)?;
            return Err(e);
        },
    };

    let event = match code {
        codes::GAME_START => GameStart::parse(payload).map(GameEvent::Start),
        codes::PRE_FRAME => FrameUpdate::parse_pre(payload).map(GameEvent::Frame),
        codes::POST_FRAME => FrameUpdate::parse_post(payload).map(GameEvent::Frame),
        codes::GAME_END => GameEnd::parse(payload).map(GameEvent::End),
        other => return Ok(Decoded::Skipped(other)),
    };

    match event {
        Ok(event) => Ok(Decoded::Event(event)),

        Err(e) => {
            cursor.seek(start)?;
            Err(e)
        },
    }
}

/// Attempts to read a payload size table from the start of a stream. Returns
/// `Ok(false)` (with the cursor rewound) if the stream doesn't open with one.
fn negotiate(cursor: &mut BinaryCursor<'_>, table: &mut PayloadSizeTable) -> Result<bool, DecodeError> {
    let start = cursor.position();

    let parsed = if cursor.expect_bytes(RAW_MARKER) {
        cursor.read_u32_be().and_then(|_raw_length| PayloadSizeTable::parse(cursor))
    } else if cursor.peek_u8() == Some(codes::EVENT_PAYLOADS) {
        PayloadSizeTable::parse(cursor)
    } else {
        return Ok(false);
    };

    match parsed {
        Ok(negotiated) => {
            tracing::info!(
                target: Log::Wire,
                entries = negotiated.len(),
                "Slippi payload sizes received, replacing existing table"
            );
            *table = negotiated;
            Ok(true)
        },

        Err(e) => {
            cursor.seek(start)?;
            Err(e)
        },
    }
}

/// Everything decoded out of one stream (typically one datagram).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedStream {
    pub events: Vec<GameEvent>,
    pub table_updated: bool,

    /// Set if decoding stopped before the end of the stream. Events decoded up to
    /// that point are still in `events`.
    pub stopped_by: Option<DecodeError>,
}

impl DecodedStream {
    /// The stream didn't open with anything we recognize at all.
    pub fn is_unrecognized(&self) -> bool {
        self.events.is_empty() && !self.table_updated && matches!(self.stopped_by, Some(DecodeError::UnknownEventType(_)))
    }
}

/// A game-state decoder that owns its payload size table across streams. One of
/// these lives on each game-state listener; it is never shared.
#[derive(Clone, Debug, Default)]
pub struct GameEventDecoder {
    table: PayloadSizeTable,
}

impl GameEventDecoder {
    pub fn new(table: PayloadSizeTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PayloadSizeTable {
        &self.table
    }

    pub fn decode_next(&mut self, cursor: &mut BinaryCursor<'_>) -> Result<Decoded, DecodeError> {
        decode_next(cursor, &mut self.table)
    }

    /// Decodes `bytes` as one stream until it runs out or something goes wrong.
    pub fn decode_stream(&mut self, bytes: &[u8]) -> DecodedStream {
        let mut cursor = BinaryCursor::new(bytes);
        let mut decoded = DecodedStream::default();

        while !cursor.is_empty() {
            match self.decode_next(&mut cursor) {
                Ok(Decoded::Event(event)) => decoded.events.push(event),
                Ok(Decoded::TableUpdated) => decoded.table_updated = true,
                Ok(Decoded::Skipped(_)) => {},
                Err(e) => {
                    decoded.stopped_by = Some(e);
                    break;
                },
            }
        }

        decoded
    }
}
