//! Ingestion of the telemetry Dolphin streams over local UDP.
//!
//! One listener thread runs per transport (game state, controller, video). Each
//! decodes its datagrams and writes the records into that transport's ring buffer;
//! the consumer drains all of them through `IngestionService::collect`. A bad
//! datagram only ever costs that datagram, and a dead socket only ever costs that
//! listener.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use dolphin_integrations::Log;

use alfred_config::{AlfredConfig, ByteOrder, NetworkConfig, PayloadSizesConfig};
use alfred_memory::{ChannelReader, ChannelRegistry};
use alfred_wire::{Endian, GameEventDecoder, PayloadSizeTable};

mod channel;
pub use channel::{Channel, Record};

mod error;
pub use error::IngestError;

mod handler;
pub use handler::{ControllerHandler, DatagramHandler, GameStateHandler, VideoHandler};

mod listener;

/// Owns the listener threads and the channels they write into.
#[derive(Debug)]
pub struct IngestionService {
    network: NetworkConfig,
    payload_sizes: PayloadSizeTable,
    registry: Arc<ChannelRegistry<Channel, Record>>,
    readers: Vec<ChannelReader<Channel, Record>>,
    should_run: Arc<AtomicBool>,
    listeners: Vec<(Channel, JoinHandle<()>)>,
    local_addrs: Vec<(Channel, SocketAddr)>,
}

impl IngestionService {
    /// Validates the config and allocates the channels. Nothing is bound or
    /// spawned until `start`.
    pub fn new(config: &AlfredConfig) -> Result<Self, IngestError> {
        config.validate().map_err(|e| IngestError::ConfigInvalid(e.to_string()))?;

        let registry = Arc::new(ChannelRegistry::new(config.network.buffer_capacity));
        let readers = Channel::ALL.iter().map(|channel| registry.reader(*channel)).collect();

        Ok(Self {
            network: config.network.clone(),
            payload_sizes: payload_size_table(&config.payload_sizes),
            registry,
            readers,
            should_run: Arc::new(AtomicBool::new(false)),
            listeners: Vec::new(),
            local_addrs: Vec::new(),
        })
    }

    /// The registry backing this service, for anyone who wants to read a channel
    /// directly.
    pub fn registry(&self) -> Arc<ChannelRegistry<Channel, Record>> {
        Arc::clone(&self.registry)
    }

    pub fn is_running(&self) -> bool {
        self.should_run.load(Ordering::Relaxed)
    }

    /// The address a running listener is bound to.
    pub fn local_addr(&self, channel: Channel) -> Option<SocketAddr> {
        self.local_addrs
            .iter()
            .find(|(bound, _)| *bound == channel)
            .map(|(_, addr)| *addr)
    }

    /// Binds every socket and spawns the listeners. Does nothing if already
    /// running. If any socket can't be bound, nothing is spawned.
    pub fn start(&mut self) -> Result<(), IngestError> {
        if self.is_running() {
            return Ok(());
        }

        let slippi = self.bind(Channel::Slippi, self.network.slippi_addr())?;
        let controller = self.bind(Channel::Controller, self.network.controller_addr())?;
        let video = self.bind(Channel::Video, self.network.video_addr())?;

        self.local_addrs = [
            (Channel::Slippi, &slippi),
            (Channel::Controller, &controller),
            (Channel::Video, &video),
        ]
        .into_iter()
        .filter_map(|(channel, socket)| socket.local_addr().ok().map(|addr| (channel, addr)))
        .collect();

        self.should_run.store(true, Ordering::Relaxed);

        self.listeners = vec![
            (
                Channel::Slippi,
                listener::spawn(
                    Channel::Slippi,
                    slippi,
                    GameStateHandler::new(GameEventDecoder::new(self.payload_sizes.clone())),
                    self.registry.channel(Channel::Slippi),
                    Arc::clone(&self.should_run),
                ),
            ),
            (
                Channel::Controller,
                listener::spawn(
                    Channel::Controller,
                    controller,
                    ControllerHandler::new(endian(self.network.controller_byte_order)),
                    self.registry.channel(Channel::Controller),
                    Arc::clone(&self.should_run),
                ),
            ),
            (
                Channel::Video,
                listener::spawn(
                    Channel::Video,
                    video,
                    VideoHandler::new(self.network.max_video_frames),
                    self.registry.channel(Channel::Video),
                    Arc::clone(&self.should_run),
                ),
            ),
        ];

        tracing::info!(target: Log::Receiver, "Ingestion service started");

        Ok(())
    }

    fn bind(&self, channel: Channel, addr: SocketAddr) -> Result<UdpSocket, IngestError> {
        let socket = UdpSocket::bind(addr).map_err(|source| IngestError::Bind { channel, source })?;

        socket
            .set_read_timeout(Some(self.network.receive_timeout()))
            .map_err(|source| IngestError::Bind { channel, source })?;

        Ok(socket)
    }

    /// Yields every record that arrived since the last call, taking turns between
    /// channels. Never blocks, and each call is finite: a channel gives up at most
    /// one buffer's worth of records per call. Records that were overwritten before
    /// being collected are gone.
    pub fn collect(&mut self) -> impl Iterator<Item = (Channel, Record)> + '_ {
        for reader in &mut self.readers {
            reader.rewind();
        }

        let mut budgets = vec![self.registry.capacity(); self.readers.len()];
        let mut turn = 0;
        let readers = &mut self.readers;

        std::iter::from_fn(move || {
            let count = readers.len();

            for offset in 0..count {
                let index = (turn + offset) % count;

                if budgets[index] == 0 {
                    continue;
                }

                if let Some(record) = readers[index].next_fresh() {
                    budgets[index] -= 1;
                    turn = (index + 1) % count;
                    return Some((readers[index].key(), record));
                }

                budgets[index] = 0;
            }

            None
        })
    }

    /// Signals every listener to stop and waits for them to finish. Safe to call
    /// more than once.
    pub fn stop(&mut self) {
        self.should_run.store(false, Ordering::Relaxed);

        if self.listeners.is_empty() {
            return;
        }

        tracing::info!(target: Log::Receiver, "Stopping ingestion service, awaiting listener threads");

        for (channel, handle) in self.listeners.drain(..) {
            if let Err(e) = handle.join() {
                tracing::error!(target: Log::Receiver, %channel, error = ?e, "Listener thread failure");
            }
        }

        self.local_addrs.clear();

        tracing::info!(target: Log::Receiver, "All listeners joined");
    }
}

impl Drop for IngestionService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn payload_size_table(sizes: &PayloadSizesConfig) -> PayloadSizeTable {
    PayloadSizeTable::from_sizes(sizes.start, sizes.pre_frame, sizes.post_frame, sizes.end)
}

fn endian(order: ByteOrder) -> Endian {
    match order {
        ByteOrder::Native => Endian::NATIVE,
        ByteOrder::Big => Endian::Big,
        ByteOrder::Little => Endian::Little,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alfred_wire::ControllerSample;

    fn controller_record(device_number: u32) -> Record {
        Record::Controller(ControllerSample {
            device_number,
            ..ControllerSample::default()
        })
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let mut config = AlfredConfig::default();
        config.network.buffer_capacity = 0;

        assert!(matches!(IngestionService::new(&config), Err(IngestError::ConfigInvalid(_))));
    }

    #[test]
    fn test_collect_round_robins_and_only_yields_fresh_records() {
        let mut service = IngestionService::new(&AlfredConfig::default()).unwrap();
        let registry = service.registry();

        let controller = registry.channel(Channel::Controller);
        controller.write(controller_record(1));
        controller.write(controller_record(2));

        let video = registry.channel(Channel::Video);
        video.write(Record::Video(alfred_wire::VideoFrame {
            frame_id: 3,
            timestamp: 0.0,
            width: 1,
            height: 1,
            bytes: vec![0],
        }));

        let channels: Vec<_> = service.collect().map(|(channel, _)| channel).collect();
        assert_eq!(channels, vec![Channel::Controller, Channel::Video, Channel::Controller]);

        assert_eq!(service.collect().count(), 0);

        controller.write(controller_record(4));
        let again: Vec<_> = service.collect().collect();
        assert_eq!(again, vec![(Channel::Controller, controller_record(4))]);
    }

    #[test]
    fn test_collect_is_bounded_per_call() {
        let mut config = AlfredConfig::default();
        config.network.buffer_capacity = 2;

        let mut service = IngestionService::new(&config).unwrap();
        let controller = service.registry().channel(Channel::Controller);

        for device in 0..5 {
            controller.write(controller_record(device));
        }

        let mut collected = service.collect();
        assert_eq!(collected.next(), Some((Channel::Controller, controller_record(3))));

        // Writes landing mid-call don't keep the iterator alive forever.
        controller.write(controller_record(5));
        controller.write(controller_record(6));

        assert!(collected.count() <= 1);
    }

    #[test]
    fn test_byte_order_mapping() {
        assert_eq!(endian(ByteOrder::Big), Endian::Big);
        assert_eq!(endian(ByteOrder::Little), Endian::Little);
        assert_eq!(endian(ByteOrder::Native), Endian::NATIVE);
    }
}
