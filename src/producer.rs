//! Buffer Producer Client
//!
//! Thin protocol client for the compositor's buffer queue. Wraps the raw
//! [`ProducerChannel`] from the display service, remembers which API the
//! queue was connected with, and owns the [`QueueSubmission`] wire
//! encoding sent with every present.
//!
//! No retries and no buffering here: every call is one blocking round
//! trip and any remote failure comes straight back to the swapchain.

use crate::error::Result;
use crate::service::{ConnectApi, ProducerChannel};

/// Encoded size of a queue submission: 23 little-endian u32 words.
pub const QUEUE_SUBMISSION_LEN: usize = 0x5c;

/// Per-present record handed to the compositor when a slot is queued.
///
/// Fixed little-endian layout, byte offsets:
///
/// | offset | field                              |
/// |--------|------------------------------------|
/// | 0      | `u32` size header (always `0x54`)  |
/// | 4      | `u32` flags (always 0)             |
/// | 8      | `u64` timestamp                    |
/// | 16     | `u32` auto-timestamp               |
/// | 20     | `u32 × 4` crop rectangle           |
/// | 36     | `u32` scaling mode                 |
/// | 40     | `u32` transform                    |
/// | 44     | `u32` sticky transform             |
/// | 48     | `u32` async flag                   |
/// | 52     | `u32` swap interval                |
/// | 56     | `u32` fence count                  |
/// | 60     | `(i32, u32) × 4` fence slots       |
///
/// The timestamp is the only field that varies per call; everything else
/// must match the compositor's expected template bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSubmission {
    pub timestamp: u64,
    pub auto_timestamp: u32,
    pub crop: [u32; 4],
    pub scaling_mode: u32,
    pub transform: u32,
    pub sticky_transform: u32,
    pub is_async: u32,
    pub swap_interval: u32,
    pub fence_count: u32,
    pub fences: [(i32, u32); 4],
}

impl Default for QueueSubmission {
    fn default() -> Self {
        Self {
            timestamp: 0,
            auto_timestamp: 1,
            crop: [0; 4],
            scaling_mode: 0,
            transform: 2,
            sticky_transform: 0,
            is_async: 0,
            swap_interval: 1,
            fence_count: 1,
            fences: [(0x42, 0x13f4), (-1, 0), (-1, 0), (-1, 0)],
        }
    }
}

impl QueueSubmission {
    /// Template with the timestamp set to the given tick.
    pub fn with_timestamp(timestamp: u64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Encode into the fixed 92-byte wire record.
    pub fn encode(&self) -> [u8; QUEUE_SUBMISSION_LEN] {
        let mut buf = [0u8; QUEUE_SUBMISSION_LEN];
        let mut off = 0;
        let mut put_u32 = |buf: &mut [u8], v: u32| {
            buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
            off += 4;
        };

        put_u32(&mut buf, 0x54);
        put_u32(&mut buf, 0);
        put_u32(&mut buf, self.timestamp as u32);
        put_u32(&mut buf, (self.timestamp >> 32) as u32);
        put_u32(&mut buf, self.auto_timestamp);
        for word in self.crop {
            put_u32(&mut buf, word);
        }
        put_u32(&mut buf, self.scaling_mode);
        put_u32(&mut buf, self.transform);
        put_u32(&mut buf, self.sticky_transform);
        put_u32(&mut buf, self.is_async);
        put_u32(&mut buf, self.swap_interval);
        put_u32(&mut buf, self.fence_count);
        for (id, value) in self.fences {
            put_u32(&mut buf, id as u32);
            put_u32(&mut buf, value);
        }
        buf
    }
}

/// Client for the compositor's buffer queue, bound to one native window
pub struct BufferProducer {
    channel: Box<dyn ProducerChannel>,
    window_id: i32,
    connected: Option<ConnectApi>,
}

impl BufferProducer {
    pub fn new(channel: Box<dyn ProducerChannel>, window_id: i32) -> Self {
        Self {
            channel,
            window_id,
            connected: None,
        }
    }

    pub fn window_id(&self) -> i32 {
        self.window_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    /// Connect the producer side of the queue.
    pub fn connect(&mut self, api: ConnectApi) -> Result<()> {
        self.channel.connect(api)?;
        self.connected = Some(api);
        Ok(())
    }

    /// Disconnect with the API used to connect. No-op if not connected.
    pub fn disconnect(&mut self) -> Result<()> {
        match self.connected.take() {
            Some(api) => self.channel.disconnect(api),
            None => Ok(()),
        }
    }

    /// Acquire a free slot. May block until the compositor releases one.
    pub fn dequeue(&mut self, width: u32, height: u32, format: u32, usage: u32) -> Result<i32> {
        self.channel.dequeue(width, height, format, usage)
    }

    /// Ask the compositor to allocate/confirm the buffer behind a slot.
    pub fn request_buffer(&mut self, slot: i32) -> Result<()> {
        self.channel.request(slot)
    }

    /// Hand a filled slot to the compositor.
    pub fn queue_buffer(&mut self, slot: i32, submission: &QueueSubmission) -> Result<()> {
        self.channel.queue(slot, &submission.encode())
    }

    /// Remove a slot from the queue's ownership.
    pub fn detach_buffer(&mut self, slot: i32) -> Result<()> {
        self.channel.detach(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PresentError;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// The record the compositor expects for timestamp 0, word by word.
    const TEMPLATE_WORDS: [u32; 23] = [
        0x54, 0x0, 0x0, 0x0, 0x1, 0x0, 0x0, 0x0, 0x0, 0x0, 0x2, 0x0, 0x0, 0x1, 0x1, 0x42, 0x13f4,
        0xffff_ffff, 0x0, 0xffff_ffff, 0x0, 0xffff_ffff, 0x0,
    ];

    fn words(buf: &[u8]) -> Vec<u32> {
        buf.chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn test_encode_matches_template() {
        let encoded = QueueSubmission::default().encode();
        assert_eq!(encoded.len(), QUEUE_SUBMISSION_LEN);
        assert_eq!(words(&encoded), TEMPLATE_WORDS);
    }

    #[test]
    fn test_only_timestamp_varies() {
        let encoded = QueueSubmission::with_timestamp(0x1122_3344_5566_7788).encode();
        assert_eq!(&encoded[8..16], &0x1122_3344_5566_7788u64.to_le_bytes());

        let template = QueueSubmission::default().encode();
        assert_eq!(&encoded[..8], &template[..8]);
        assert_eq!(&encoded[16..], &template[16..]);
    }

    struct RecordingChannel {
        queued: Rc<RefCell<Vec<(i32, Vec<u8>)>>>,
    }

    impl ProducerChannel for RecordingChannel {
        fn connect(&mut self, _api: ConnectApi) -> crate::error::Result<()> {
            Ok(())
        }
        fn disconnect(&mut self, _api: ConnectApi) -> crate::error::Result<()> {
            Err(PresentError::transport("disconnect should not be reached"))
        }
        fn dequeue(&mut self, _: u32, _: u32, _: u32, _: u32) -> crate::error::Result<i32> {
            Ok(0)
        }
        fn request(&mut self, _slot: i32) -> crate::error::Result<()> {
            Ok(())
        }
        fn queue(&mut self, slot: i32, payload: &[u8]) -> crate::error::Result<()> {
            self.queued.borrow_mut().push((slot, payload.to_vec()));
            Ok(())
        }
        fn detach(&mut self, _slot: i32) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_queue_buffer_sends_encoded_record() {
        let queued = Rc::new(RefCell::new(Vec::new()));
        let channel = RecordingChannel {
            queued: queued.clone(),
        };
        let mut producer = BufferProducer::new(Box::new(channel), 7);

        producer
            .queue_buffer(1, &QueueSubmission::with_timestamp(99))
            .unwrap();

        let sent = queued.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
        assert_eq!(sent[0].1, QueueSubmission::with_timestamp(99).encode());
    }

    #[test]
    fn test_disconnect_without_connect_is_noop() {
        let channel = RecordingChannel {
            queued: Rc::new(RefCell::new(Vec::new())),
        };
        let mut producer = BufferProducer::new(Box::new(channel), 0);
        assert!(!producer.is_connected());
        // RecordingChannel errors on disconnect, so this passing proves
        // the channel was never called.
        producer.disconnect().unwrap();
    }
}
