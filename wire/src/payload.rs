use std::collections::HashMap;

use crate::event::codes;
use crate::{BinaryCursor, DecodeError};

/// Maps an event code to the size of the payload that follows it.
///
/// The stream can send its own table at the start (the event payloads command),
/// in which case it replaces whatever we had wholesale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadSizeTable {
    sizes: HashMap<u8, u16>,
}

impl Default for PayloadSizeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PayloadSizeTable {
    /// Sizes used until a stream tells us otherwise.
    pub fn builtin() -> Self {
        Self::from_sizes(418, 64, 52, 2)
    }

    /// A table covering just the four events we decode.
    pub fn from_sizes(start: u16, pre_frame: u16, post_frame: u16, end: u16) -> Self {
        let sizes = HashMap::from([
            (codes::GAME_START, start),
            (codes::PRE_FRAME, pre_frame),
            (codes::POST_FRAME, post_frame),
            (codes::GAME_END, end),
        ]);

        Self { sizes }
    }

    pub fn get(&self, code: u8) -> Option<u16> {
        self.sizes.get(&code).copied()
    }

    pub fn insert(&mut self, code: u8, size: u16) {
        self.sizes.insert(code, size);
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Parses an event payloads command: `0x35`, one byte giving the size of the
    /// rest of the command (plus itself), then `(code: u8, size: u16be)` triples.
    pub fn parse(cursor: &mut BinaryCursor<'_>) -> Result<Self, DecodeError> {
        let code = cursor.read_u8()?;

        if code != codes::EVENT_PAYLOADS {
            return Err(DecodeError::Malformed(format!(
                "expected event payloads command, found 0x{code:02x}"
            )));
        }

        let command_size = cursor.read_u8()?;

        if command_size == 0 || (command_size - 1) % 3 != 0 {
            return Err(DecodeError::Malformed(format!(
                "event payloads command size {command_size} is not 1 + 3n"
            )));
        }

        let mut entries = cursor.sub_cursor((command_size - 1) as usize)?;
        let mut sizes = HashMap::from([(codes::EVENT_PAYLOADS, command_size as u16)]);

        while !entries.is_empty() {
            let code = entries.read_u8()?;
            let size = entries.read_u16_be()?;
            sizes.insert(code, size);
        }

        Ok(Self { sizes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sizes() {
        let table = PayloadSizeTable::builtin();

        assert_eq!(table.get(codes::GAME_START), Some(418));
        assert_eq!(table.get(codes::PRE_FRAME), Some(64));
        assert_eq!(table.get(codes::POST_FRAME), Some(52));
        assert_eq!(table.get(codes::GAME_END), Some(2));
        assert_eq!(table.get(0x3A), None);
    }

    #[test]
    fn test_parse_event_payloads_command() {
        let bytes = [0x35, 0x07, 0x36, 0x01, 0xA2, 0x39, 0x00, 0x02, 0xFF];
        let mut cursor = BinaryCursor::new(&bytes);

        let table = PayloadSizeTable::parse(&mut cursor).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(codes::EVENT_PAYLOADS), Some(7));
        assert_eq!(table.get(codes::GAME_START), Some(0x1A2));
        assert_eq!(table.get(codes::GAME_END), Some(2));
        assert_eq!(cursor.rest(), &[0xFF]);
    }

    #[test]
    fn test_parse_rejects_bad_command_size() {
        let bytes = [0x35, 0x05, 0x36, 0x01, 0xA2, 0x39];
        let mut cursor = BinaryCursor::new(&bytes);

        assert!(matches!(PayloadSizeTable::parse(&mut cursor), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_truncated_entries() {
        let bytes = [0x35, 0x07, 0x36, 0x01];
        let mut cursor = BinaryCursor::new(&bytes);

        assert!(matches!(PayloadSizeTable::parse(&mut cursor), Err(DecodeError::Truncated { .. })));
    }
}
