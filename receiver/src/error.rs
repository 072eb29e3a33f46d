use std::io;

use thiserror::Error;

use alfred_wire::DecodeError;

use crate::Channel;

/// Everything that can go wrong between a socket and a ring buffer.
///
/// Only `ConfigInvalid` and `Bind` ever reach the caller, and only from setup.
/// The rest are handled inside the listener loop.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Nothing arrived before the receive timeout. The loop just goes around again.
    #[error("receive timed out")]
    Transient,

    /// The datagram couldn't be decoded. It's dropped and the loop carries on.
    #[error(transparent)]
    Malformed(#[from] DecodeError),

    /// The socket is unusable; that listener stops (the others don't).
    #[error("socket closed: {0}")]
    ResourceClosed(io::Error),

    #[error("invalid ingestion config: {0}")]
    ConfigInvalid(String),

    #[error("unable to bind {channel} listener: {source}")]
    Bind {
        channel: Channel,

        #[source]
        source: io::Error,
    },
}

impl IngestError {
    /// Sorts a socket receive error into transient or fatal for that listener.
    pub(crate) fn from_recv(error: io::Error) -> Self {
        match error.kind() {
            // `ConnectionReset` shows up on Windows when an earlier send bounced;
            // the socket itself is fine.
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::ConnectionReset => {
                Self::Transient
            },

            _ => Self::ResourceClosed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recv_error_classification() {
        assert!(matches!(
            IngestError::from_recv(io::Error::from(io::ErrorKind::WouldBlock)),
            IngestError::Transient
        ));
        assert!(matches!(
            IngestError::from_recv(io::Error::from(io::ErrorKind::TimedOut)),
            IngestError::Transient
        ));
        assert!(matches!(
            IngestError::from_recv(io::Error::from(io::ErrorKind::NotConnected)),
            IngestError::ResourceClosed(_)
        ));
    }
}
