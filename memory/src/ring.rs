use std::sync::Mutex;

use thiserror::Error;

/// Returned by a read on a buffer that has never been written to.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("ring buffer has not been written to yet")]
pub struct Empty;

/// What a read hands back: where the item lived, the order it was written in, and
/// a copy of the item itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry<T> {
    pub slot: usize,

    /// Starts at 1 and increases by one on every write.
    pub sequence: u64,
    pub item: T,
}

#[derive(Debug)]
struct Slot<T> {
    sequence: u64,
    item: T,
}

#[derive(Debug)]
struct Cursors<T> {
    slots: Vec<Option<Slot<T>>>,
    read_cursor: usize,
    write_cursor: usize,

    /// Cleared when the writer wraps around onto the reader. While it's clear, the
    /// next write overwrites the oldest element and pushes the reader along.
    is_ahead: bool,
    has_written: bool,
    next_sequence: u64,
}

/// A fixed-capacity circular buffer for one writer and one reader.
///
/// Writes never block: once the buffer is full the oldest element is overwritten.
/// Reads return the oldest element still held and step forward, but never onto the
/// slot the writer will fill next; a reader that has caught up keeps getting the
/// most recent element back. Use the sequence number from `read_entry` to tell a
/// repeat from something new.
///
/// Cursors and slots sit behind one lock, held for a single read or write.
#[derive(Debug)]
pub struct RingBuffer<T> {
    capacity: usize,
    cursors: Mutex<Cursors<T>>,
}

impl<T: Clone> RingBuffer<T> {
    /// Creates a buffer holding up to `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be at least 1");

        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            capacity,
            cursors: Mutex::new(Cursors {
                slots,
                read_cursor: 0,
                write_cursor: 0,
                is_ahead: true,
                has_written: false,
                next_sequence: 1,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        !self.cursors.lock().expect("Unable to lock ring buffer for is_empty").has_written
    }

    /// Stores `item`, overwriting the oldest element if the buffer is full, and
    /// returns the slot it went into.
    pub fn write(&self, item: T) -> usize {
        let mut cursors = self.cursors.lock().expect("Unable to lock ring buffer for write");

        let slot = cursors.write_cursor;
        let next = (slot + 1) % self.capacity;
        cursors.has_written = true;

        if cursors.write_cursor == cursors.read_cursor && !cursors.is_ahead {
            cursors.read_cursor = next;
            cursors.write_cursor = next;
        } else {
            if next == cursors.read_cursor {
                cursors.is_ahead = false;
            }

            cursors.write_cursor = next;
        }

        let sequence = cursors.next_sequence;
        cursors.next_sequence += 1;
        cursors.slots[slot] = Some(Slot { sequence, item });

        slot
    }

    /// Reads the element at the read cursor and returns its slot alongside it.
    pub fn read(&self) -> Result<(usize, T), Empty> {
        self.read_entry().map(|entry| (entry.slot, entry.item))
    }

    /// Like `read`, but also returns the element's write sequence number.
    pub fn read_entry(&self) -> Result<Entry<T>, Empty> {
        let mut cursors = self.cursors.lock().expect("Unable to lock ring buffer for read");

        if !cursors.has_written {
            return Err(Empty);
        }

        let slot = cursors.read_cursor;
        let next = (slot + 1) % self.capacity;
        cursors.is_ahead = true;

        if next != cursors.write_cursor {
            cursors.read_cursor = next;
        }

        let Some(held) = &cursors.slots[slot] else {
            return Err(Empty);
        };

        Ok(Entry {
            slot,
            sequence: held.sequence,
            item: held.item.clone(),
        })
    }
}
