use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use dolphin_integrations::Log;

use alfred_memory::RingBuffer;

use crate::{Channel, DatagramHandler, IngestError, Record};

/// Largest possible UDP payload.
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Spawns the receive loop for one transport.
///
/// The loop runs until `should_run` is cleared (checked once per iteration, so at
/// most one receive timeout later) or the socket fails outright.
pub(crate) fn spawn<H: DatagramHandler>(
    channel: Channel,
    socket: UdpSocket,
    handler: H,
    buffer: Arc<RingBuffer<Record>>,
    should_run: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(channel.thread_name().into())
        .spawn(move || run(channel, socket, handler, buffer, should_run))
        .expect("Failed to spawn listener thread.")
}

fn run<H: DatagramHandler>(
    channel: Channel,
    socket: UdpSocket,
    mut handler: H,
    buffer: Arc<RingBuffer<Record>>,
    should_run: Arc<AtomicBool>,
) {
    let mut datagram = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut records = Vec::new();

    tracing::info!(target: Log::Receiver, %channel, addr = ?socket.local_addr().ok(), "Listener online");

    while should_run.load(Ordering::Relaxed) {
        let result = socket
            .recv_from(&mut datagram)
            .map_err(IngestError::from_recv)
            .and_then(|(length, _)| handler.handle(&datagram[..length], &mut records));

        // Whatever decoded cleanly is delivered, even if the datagram failed later on.
        for record in records.drain(..) {
            buffer.write(record);
        }

        match result {
            Ok(()) => {},

            Err(IngestError::Transient) => {
                tracing::trace!(target: Log::Receiver, %channel, "No data before receive timeout");
            },

            Err(IngestError::ResourceClosed(error)) => {
                tracing::error!(target: Log::Receiver, %channel, ?error, "Socket closed, stopping listener");
                return;
            },

            Err(error) => {
                tracing::warn!(target: Log::Receiver, %channel, ?error, "Dropping datagram");
            },
        }
    }

    tracing::info!(target: Log::Receiver, %channel, "Listener stopped");
}
