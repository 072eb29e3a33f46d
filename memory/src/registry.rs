use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use dolphin_integrations::Log;

use crate::RingBuffer;

/// Owns one ring buffer per channel key, created the first time the key is asked
/// for. Shared by `Arc` between the listeners (writers) and the consumer (reader).
#[derive(Debug)]
pub struct ChannelRegistry<K, T> {
    capacity: usize,
    channels: Mutex<HashMap<K, Arc<RingBuffer<T>>>>,
}

impl<K, T> ChannelRegistry<K, T>
where
    K: Copy + Debug + Eq + Hash,
    T: Clone,
{
    /// Every buffer this registry creates holds `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ChannelRegistry capacity must be at least 1");

        Self {
            capacity,
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the buffer for `key`, creating it if this is the first request.
    pub fn channel(&self, key: K) -> Arc<RingBuffer<T>> {
        let mut channels = self.channels.lock().expect("Unable to lock channel registry");

        let buffer = channels.entry(key).or_insert_with(|| {
            tracing::debug!(target: Log::Memory, channel = ?key, capacity = self.capacity, "Allocating channel");
            Arc::new(RingBuffer::new(self.capacity))
        });

        Arc::clone(buffer)
    }

    pub fn contains(&self, key: K) -> bool {
        self.channels.lock().expect("Unable to lock channel registry").contains_key(&key)
    }

    /// A reader for `key` that only yields elements it hasn't seen yet.
    pub fn reader(&self, key: K) -> ChannelReader<K, T> {
        ChannelReader::new(key, self.channel(key))
    }
}

/// The consuming side of one channel.
///
/// Filters out the repeats a caught-up `RingBuffer` hands back, so every element is
/// yielded at most once. Elements that were overwritten before this reader got to
/// them are simply never seen.
#[derive(Debug)]
pub struct ChannelReader<K, T> {
    key: K,
    buffer: Arc<RingBuffer<T>>,
    last_sequence: u64,
    parked: bool,
}

impl<K: Copy, T: Clone> ChannelReader<K, T> {
    pub fn new(key: K, buffer: Arc<RingBuffer<T>>) -> Self {
        Self {
            key,
            buffer,
            last_sequence: 0,
            parked: false,
        }
    }

    pub fn key(&self) -> K {
        self.key
    }

    /// Sequence number of the last element yielded (0 if none yet).
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Marks the start of a new pass. A reader that parked during the previous pass
    /// will look at the buffer again.
    pub fn rewind(&mut self) {
        self.parked = false;
    }

    /// Returns the next element this reader hasn't seen, or `None` once the buffer
    /// has nothing new. After `None` the reader stays parked until `rewind`.
    pub fn next_fresh(&mut self) -> Option<T> {
        if self.parked {
            return None;
        }

        // A caught-up buffer can hand back one stale element before the newer one
        // behind it, so allow a read past the capacity before giving up.
        let mut previous = None;

        for _ in 0..=self.buffer.capacity() {
            let Ok(entry) = self.buffer.read_entry() else {
                break;
            };

            if entry.sequence > self.last_sequence {
                self.last_sequence = entry.sequence;
                return Some(entry.item);
            }

            if previous == Some(entry.sequence) {
                break;
            }

            previous = Some(entry.sequence);
        }

        self.parked = true;
        None
    }
}
