use crate::{combine_timestamp, BinaryCursor, DecodeError, Endian};

/// Number of bytes a controller sample occupies on the wire. Datagrams may carry
/// trailing padding after this, which is ignored.
pub const CONTROLLER_PACKET_SIZE: usize = 23;

/// One polled controller state, as sent by the emulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerSample {
    pub device_number: u32,
    pub timestamp_sec: u32,
    pub timestamp_micro: u32,
    pub buttons: u16,
    pub stick_x: u8,
    pub stick_y: u8,
    pub substick_x: u8,
    pub substick_y: u8,
    pub trigger_left: u8,
    pub trigger_right: u8,
    pub analog_a: u8,
    pub analog_b: u8,
    pub err: u8,
}

impl ControllerSample {
    /// Decodes a sample from a single datagram.
    pub fn parse(datagram: &[u8], endian: Endian) -> Result<Self, DecodeError> {
        if datagram.len() < CONTROLLER_PACKET_SIZE {
            return Err(DecodeError::Malformed(format!(
                "controller datagram is {} bytes, expected at least {CONTROLLER_PACKET_SIZE}",
                datagram.len()
            )));
        }

        let mut cursor = BinaryCursor::new(&datagram[..CONTROLLER_PACKET_SIZE]);

        Ok(Self {
            device_number: cursor.read_u32(endian)?,
            timestamp_sec: cursor.read_u32(endian)?,
            timestamp_micro: cursor.read_u32(endian)?,
            buttons: cursor.read_u16(endian)?,
            stick_x: cursor.read_u8()?,
            stick_y: cursor.read_u8()?,
            substick_x: cursor.read_u8()?,
            substick_y: cursor.read_u8()?,
            trigger_left: cursor.read_u8()?,
            trigger_right: cursor.read_u8()?,
            analog_a: cursor.read_u8()?,
            analog_b: cursor.read_u8()?,
            err: cursor.read_u8()?,
        })
    }

    pub fn timestamp(&self) -> f64 {
        combine_timestamp(self.timestamp_sec, self.timestamp_micro)
    }
}
