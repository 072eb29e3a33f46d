//! The hand-off point between the listener threads and whoever consumes their
//! records.
//!
//! Each named channel is a fixed-capacity `RingBuffer`: writers never block and
//! never fail (the oldest element is overwritten once the buffer is full), and the
//! reader always sees the oldest element still held, parking on the newest one
//! once it has caught up.

mod ring;
pub use ring::{Empty, Entry, RingBuffer};

mod registry;
pub use registry::{ChannelReader, ChannelRegistry};
