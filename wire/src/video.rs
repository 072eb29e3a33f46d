use std::collections::BTreeMap;

use dolphin_integrations::Log;

use crate::{combine_timestamp, BinaryCursor, DecodeError};

/// Size of the header that leads every video fragment.
pub const VIDEO_HEADER_SIZE: usize = 30;

/// `frame_id:u32 segment_index:u8 total_segments:u8 width:i32 height:i32
/// block_size:u32 reserved:u32 timestamp_sec:u32 timestamp_micro:u32`, big-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoFragmentHeader {
    pub frame_id: u32,
    pub segment_index: u8,
    pub total_segments: u8,
    pub width: i32,
    pub height: i32,
    pub block_size: u32,
    pub timestamp_sec: u32,
    pub timestamp_micro: u32,
}

impl VideoFragmentHeader {
    pub fn parse(cursor: &mut BinaryCursor<'_>) -> Result<Self, DecodeError> {
        let mut header = cursor.sub_cursor(VIDEO_HEADER_SIZE)?;

        let frame_id = header.read_u32_be()?;
        let segment_index = header.read_u8()?;
        let total_segments = header.read_u8()?;
        let width = header.read_i32_be()?;
        let height = header.read_i32_be()?;
        let block_size = header.read_u32_be()?;
        let _reserved = header.read_u32_be()?;
        let timestamp_sec = header.read_u32_be()?;
        let timestamp_micro = header.read_u32_be()?;

        Ok(Self {
            frame_id,
            segment_index,
            total_segments,
            width,
            height,
            block_size,
            timestamp_sec,
            timestamp_micro,
        })
    }

    pub fn timestamp(&self) -> f64 {
        combine_timestamp(self.timestamp_sec, self.timestamp_micro)
    }
}

/// A fully reassembled video frame.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    pub frame_id: u32,
    pub timestamp: f64,
    pub width: i32,
    pub height: i32,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
struct FrameBucket {
    total_segments: u8,
    width: i32,
    height: i32,
    timestamp: f64,
    segments: BTreeMap<u8, Vec<u8>>,
}

impl FrameBucket {
    fn is_complete(&self) -> bool {
        // Indices are checked against `total_segments` on the way in, so a full
        // count means 0..total is covered.
        self.segments.len() == self.total_segments as usize
    }

    fn into_frame(self, frame_id: u32) -> VideoFrame {
        VideoFrame {
            frame_id,
            timestamp: self.timestamp,
            width: self.width,
            height: self.height,
            bytes: self.segments.into_values().flatten().collect(),
        }
    }
}

/// Collects video fragments (which may arrive in any order) until every segment
/// of a frame is present.
///
/// Only a bounded number of incomplete frames are held in flight. When that's
/// exceeded the oldest (smallest id) incomplete frame is dropped. Completed frames
/// wait for `drain_ready` and don't count against the limit.
#[derive(Debug)]
pub struct VideoFragmentReassembler {
    max_in_flight: usize,
    frames: BTreeMap<u32, FrameBucket>,
}

impl VideoFragmentReassembler {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
            frames: BTreeMap::new(),
        }
    }

    /// Number of frames still waiting on segments.
    pub fn in_flight(&self) -> usize {
        self.frames.values().filter(|bucket| !bucket.is_complete()).count()
    }

    /// Feeds one fragment datagram in. Returns `true` if at least one frame is
    /// ready to drain afterwards. A fragment that can't be used returns `false` and
    /// changes nothing.
    pub fn update(&mut self, datagram: &[u8]) -> bool {
        match self.try_update(datagram) {
            Ok(()) => self.frames.values().any(FrameBucket::is_complete),

            Err(error) => {
                tracing::warn!(target: Log::Wire, ?error, "Dropping video fragment");
                false
            },
        }
    }

    fn try_update(&mut self, datagram: &[u8]) -> Result<(), DecodeError> {
        let mut cursor = BinaryCursor::new(datagram);
        let header = VideoFragmentHeader::parse(&mut cursor)?;
        let payload = cursor.read_bytes(header.block_size as usize)?;

        if header.total_segments == 0 {
            return Err(DecodeError::Malformed(format!(
                "frame {} declares zero segments",
                header.frame_id
            )));
        }

        if header.segment_index >= header.total_segments {
            return Err(DecodeError::Malformed(format!(
                "frame {} segment {} out of range (total {})",
                header.frame_id, header.segment_index, header.total_segments
            )));
        }

        if let Some(existing) = self.frames.get(&header.frame_id) {
            if existing.total_segments != header.total_segments {
                return Err(DecodeError::Malformed(format!(
                    "frame {} segment count changed from {} to {}",
                    header.frame_id, existing.total_segments, header.total_segments
                )));
            }
        }

        let bucket = self.frames.entry(header.frame_id).or_insert_with(|| FrameBucket {
            total_segments: header.total_segments,
            width: header.width,
            height: header.height,
            timestamp: header.timestamp(),
            segments: BTreeMap::new(),
        });

        if header.segment_index + 1 == header.total_segments {
            bucket.timestamp = header.timestamp();
        }

        bucket.segments.insert(header.segment_index, payload.to_vec());

        while self.in_flight() > self.max_in_flight {
            let Some(frame_id) = self
                .frames
                .iter()
                .find(|(_, bucket)| !bucket.is_complete())
                .map(|(frame_id, _)| *frame_id)
            else {
                break;
            };

            self.frames.remove(&frame_id);
            tracing::debug!(target: Log::Wire, frame_id, "Evicting oldest in-flight video frame");
        }

        Ok(())
    }

    /// Yields every completed frame (lowest id first), removing each as it goes.
    /// Frames that aren't finished yet are left alone.
    pub fn drain_ready(&mut self) -> impl Iterator<Item = VideoFrame> + '_ {
        std::iter::from_fn(move || {
            let frame_id = self
                .frames
                .iter()
                .find(|(_, bucket)| bucket.is_complete())
                .map(|(frame_id, _)| *frame_id)?;

            self.frames.remove(&frame_id).map(|bucket| bucket.into_frame(frame_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(frame_id: u32, index: u8, total: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(VIDEO_HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&frame_id.to_be_bytes());
        bytes.push(index);
        bytes.push(total);
        bytes.extend_from_slice(&640i32.to_be_bytes());
        bytes.extend_from_slice(&480i32.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&10u32.to_be_bytes());
        bytes.extend_from_slice(&(index as u32 * 250_000).to_be_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_out_of_order_fragments() {
        let mut reassembler = VideoFragmentReassembler::new(10);

        assert!(!reassembler.update(&fragment(7, 2, 3, &[5, 6])));
        assert_eq!(reassembler.drain_ready().count(), 0);
        assert!(!reassembler.update(&fragment(7, 0, 3, &[1, 2])));
        assert!(reassembler.update(&fragment(7, 1, 3, &[3, 4])));

        let frames: Vec<_> = reassembler.drain_ready().collect();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_id, 7);
        assert_eq!(frames[0].bytes, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(frames[0].width, 640);
        assert_eq!(frames[0].timestamp, 10.5);
        assert_eq!(reassembler.in_flight(), 0);
        assert_eq!(reassembler.drain_ready().count(), 0);
    }

    #[test]
    fn test_duplicate_segment_replaces_earlier_copy() {
        let mut reassembler = VideoFragmentReassembler::new(10);

        assert!(!reassembler.update(&fragment(1, 0, 2, &[9, 9])));
        assert!(!reassembler.update(&fragment(1, 0, 2, &[1])));
        assert_eq!(reassembler.drain_ready().count(), 0);
        assert!(reassembler.update(&fragment(1, 1, 2, &[2])));

        let frames: Vec<_> = reassembler.drain_ready().collect();
        assert_eq!(frames[0].bytes, vec![1, 2]);
    }

    #[test]
    fn test_rejected_fragments_change_nothing() {
        let mut reassembler = VideoFragmentReassembler::new(10);

        let mut short_payload = fragment(1, 0, 1, &[1, 2, 3, 4]);
        short_payload.truncate(VIDEO_HEADER_SIZE + 2);

        assert!(!reassembler.update(&[0; 12]));
        assert!(!reassembler.update(&short_payload));
        assert!(!reassembler.update(&fragment(1, 0, 0, &[1])));
        assert!(!reassembler.update(&fragment(1, 3, 3, &[1])));
        assert_eq!(reassembler.in_flight(), 0);

        assert!(!reassembler.update(&fragment(2, 0, 2, &[1])));
        assert!(!reassembler.update(&fragment(2, 1, 3, &[1])));
        assert_eq!(reassembler.in_flight(), 1);
        assert_eq!(reassembler.drain_ready().count(), 0);
    }

    #[test]
    fn test_eviction_drops_smallest_frame_id() {
        let mut reassembler = VideoFragmentReassembler::new(2);

        assert!(!reassembler.update(&fragment(5, 0, 2, &[1])));
        assert!(!reassembler.update(&fragment(3, 0, 2, &[1])));
        assert!(!reassembler.update(&fragment(9, 0, 2, &[1])));
        assert_eq!(reassembler.in_flight(), 2);

        // Frame 3 was evicted; its second half is the smallest id again and goes too.
        assert!(!reassembler.update(&fragment(3, 1, 2, &[2])));
        assert!(reassembler.update(&fragment(9, 1, 2, &[2])));

        let ids: Vec<_> = reassembler.drain_ready().map(|frame| frame.frame_id).collect();
        assert_eq!(ids, vec![9]);
    }

    #[test]
    fn test_drain_is_lazy() {
        let mut reassembler = VideoFragmentReassembler::new(10);
        assert!(reassembler.update(&fragment(1, 0, 1, &[1])));
        assert!(reassembler.update(&fragment(2, 0, 1, &[2])));

        let first = reassembler.drain_ready().next().unwrap();

        assert_eq!(first.frame_id, 1);
        assert_eq!(reassembler.drain_ready().count(), 1);
    }

    #[test]
    fn test_update_reports_ready_only_once_a_frame_completes() {
        let mut reassembler = VideoFragmentReassembler::new(10);

        let results: Vec<_> = [2, 0, 1]
            .into_iter()
            .map(|index| reassembler.update(&fragment(4, index, 3, &[index])))
            .collect();

        assert_eq!(results, vec![false, false, true]);
        assert_eq!(reassembler.drain_ready().map(|frame| frame.bytes).collect::<Vec<_>>(), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_completed_frames_do_not_count_towards_the_limit() {
        let mut reassembler = VideoFragmentReassembler::new(1);

        assert!(reassembler.update(&fragment(1, 0, 1, &[1])));
        assert!(reassembler.update(&fragment(2, 0, 2, &[2])));
        assert_eq!(reassembler.in_flight(), 1);

        // Frame 3 pushes the incomplete count over; frame 2 goes, frame 1 stays.
        assert!(reassembler.update(&fragment(3, 0, 2, &[3])));
        assert_eq!(reassembler.in_flight(), 1);

        let ids: Vec<_> = reassembler.drain_ready().map(|frame| frame.frame_id).collect();
        assert_eq!(ids, vec![1]);

        assert!(reassembler.update(&fragment(3, 1, 2, &[4])));
        assert_eq!(reassembler.drain_ready().next().unwrap().bytes, vec![3, 4]);
    }
}
