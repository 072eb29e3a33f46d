use std::fmt;

use alfred_wire::{ControllerSample, TimedEvent, VideoFrame};

/// The named transports records arrive on. Each gets its own listener thread and
/// its own ring buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Slippi,
    Controller,
    Video,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Slippi, Channel::Controller, Channel::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slippi => "slippi",
            Self::Controller => "controller",
            Self::Video => "video",
        }
    }

    pub(crate) fn thread_name(&self) -> &'static str {
        match self {
            Self::Slippi => "AlfredSlippiListenerThread",
            Self::Controller => "AlfredControllerListenerThread",
            Self::Video => "AlfredVideoListenerThread",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully decoded record, as handed to the consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Game(TimedEvent),
    Controller(ControllerSample),
    Video(VideoFrame),
}

impl Record {
    /// The timestamp the producer attached to this record.
    pub fn timestamp(&self) -> f64 {
        match self {
            Self::Game(event) => event.timestamp,
            Self::Controller(sample) => sample.timestamp(),
            Self::Video(frame) => frame.timestamp,
        }
    }
}
