use crate::DecodeError;

/// Byte order for multi-byte reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    #[cfg(target_endian = "little")]
    pub const NATIVE: Endian = Endian::Little;

    #[cfg(target_endian = "big")]
    pub const NATIVE: Endian = Endian::Big;
}

/// A read-only cursor over a byte slice.
///
/// Every read is bounds-checked; a read that would run past the end returns
/// `DecodeError::Truncated` and leaves the position where it was.
#[derive(Clone, Debug)]
pub struct BinaryCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Everything from the current position to the end, without consuming it.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// Moves to an absolute position. Seeking to `len()` (the end) is allowed.
    pub fn seek(&mut self, position: usize) -> Result<(), DecodeError> {
        if position > self.data.len() {
            return Err(DecodeError::Truncated {
                offset: position,
                needed: 0,
                available: self.data.len(),
            });
        }

        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<(), DecodeError> {
        self.read_bytes(count).map(|_| ())
    }

    /// Borrows the next `count` bytes and advances past them.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        if count > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.position,
                needed: count,
                available: self.remaining(),
            });
        }

        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Splits off the next `count` bytes as their own cursor (starting at 0) and
    /// advances this one past them. Reads on the child can never see beyond it.
    pub fn sub_cursor(&mut self, count: usize) -> Result<BinaryCursor<'a>, DecodeError> {
        self.read_bytes(count).map(BinaryCursor::new)
    }

    /// Consumes `expected` if the upcoming bytes match it exactly. On a mismatch
    /// (or not enough data) nothing is consumed.
    pub fn expect_bytes(&mut self, expected: &[u8]) -> bool {
        if self.rest().starts_with(expected) {
            self.position += expected.len();
            return true;
        }

        false
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N)?;
        let mut array = [0; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.read_array::<1>().map(|[byte]| byte)
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        self.read_array::<1>().map(i8::from_be_bytes)
    }

    /// Any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.read_u8().map(|byte| byte != 0)
    }

    pub fn read_u16(&mut self, endian: Endian) -> Result<u16, DecodeError> {
        let bytes = self.read_array()?;

        Ok(match endian {
            Endian::Big => u16::from_be_bytes(bytes),
            Endian::Little => u16::from_le_bytes(bytes),
        })
    }

    pub fn read_u32(&mut self, endian: Endian) -> Result<u32, DecodeError> {
        let bytes = self.read_array()?;

        Ok(match endian {
            Endian::Big => u32::from_be_bytes(bytes),
            Endian::Little => u32::from_le_bytes(bytes),
        })
    }

    pub fn read_i32(&mut self, endian: Endian) -> Result<i32, DecodeError> {
        let bytes = self.read_array()?;

        Ok(match endian {
            Endian::Big => i32::from_be_bytes(bytes),
            Endian::Little => i32::from_le_bytes(bytes),
        })
    }

    pub fn read_f32(&mut self, endian: Endian) -> Result<f32, DecodeError> {
        self.read_u32(endian).map(f32::from_bits)
    }

    // The Slippi stream is big-endian throughout; these keep the decoder terse.

    pub fn read_u16_be(&mut self) -> Result<u16, DecodeError> {
        self.read_u16(Endian::Big)
    }

    pub fn read_u32_be(&mut self) -> Result<u32, DecodeError> {
        self.read_u32(Endian::Big)
    }

    pub fn read_i32_be(&mut self) -> Result<i32, DecodeError> {
        self.read_i32(Endian::Big)
    }

    pub fn read_f32_be(&mut self) -> Result<f32, DecodeError> {
        self.read_f32(Endian::Big)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_endian_reads() {
        let data = [0x12, 0x34, 0x12, 0x34, 0xFF, 0xFF, 0xFF, 0xFE, 0x3F, 0x80, 0x00, 0x00];
        let mut cursor = BinaryCursor::new(&data);

        assert_eq!(cursor.read_u16(Endian::Big).unwrap(), 0x1234);
        assert_eq!(cursor.read_u16(Endian::Little).unwrap(), 0x3412);
        assert_eq!(cursor.read_i32_be().unwrap(), -2);
        assert_eq!(cursor.read_f32_be().unwrap(), 1.0);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_short_read_does_not_move_the_cursor() {
        let data = [1, 2, 3];
        let mut cursor = BinaryCursor::new(&data);
        cursor.read_u8().unwrap();

        let err = cursor.read_u32_be().unwrap_err();

        assert_eq!(
            err,
            DecodeError::Truncated {
                offset: 1,
                needed: 4,
                available: 2
            }
        );
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_u16_be().unwrap(), 0x0203);
    }

    #[test]
    fn test_sub_cursor_is_bounded() {
        let data = [1, 2, 3, 4, 5];
        let mut cursor = BinaryCursor::new(&data);

        let mut child = cursor.sub_cursor(2).unwrap();
        assert_eq!(cursor.position(), 2);
        assert_eq!(child.read_u16_be().unwrap(), 0x0102);
        assert!(child.read_u8().is_err());
        assert_eq!(cursor.read_u8().unwrap(), 3);
    }

    #[test]
    fn test_expect_bytes_only_consumes_on_match() {
        let data = b"{Uraw";
        let mut cursor = BinaryCursor::new(data);

        assert!(!cursor.expect_bytes(b"{X"));
        assert_eq!(cursor.position(), 0);
        assert!(!cursor.expect_bytes(b"{Uraw[$"));
        assert!(cursor.expect_bytes(b"{U"));
        assert_eq!(cursor.rest(), b"raw");
    }

    #[test]
    fn test_seek() {
        let data = [9, 8, 7];
        let mut cursor = BinaryCursor::new(&data);

        cursor.seek(2).unwrap();
        assert_eq!(cursor.read_u8().unwrap(), 7);
        assert!(cursor.seek(3).is_ok());
        assert!(cursor.seek(4).is_err());
    }
}
