//! Output buffer (spec.md §4.9 / §5): a ring of fixed-size message
//! chunks shared between the single reader/assembler thread (producer)
//! and one writer thread (consumer) at a time. `Mutex` + two `Condvar`s
//! mirror the discipline spec.md §5 calls for: "space available / data
//! available", with only the length-prefix write atomic with respect to
//! the consumer's read.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::config::OutputFormat;
use crate::error::{CResult, Error};
use crate::event::OutputEvent;

/// Upper bound on a single ring chunk, matching spec.md §4.9's "1 MiB"
/// message-buffer chunk size; enforced as a soft cap on queued bytes
/// rather than a literal fixed-size byte arena (the ring here models
/// the spec's *messages*, not raw byte spans, since there's no shared
/// consumer address space to pack into).
pub const CHUNK_CAPACITY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct OutputMessage {
    pub bytes: Vec<u8>,
}

impl OutputMessage {
    /// Serializes `event` per `format` (spec.md §6's `format.scn`/
    /// `format.timestamp` knobs) -- the wire shape, not the in-memory one.
    pub fn from_event(event: &OutputEvent, format: &OutputFormat) -> CResult<OutputMessage> {
        let bytes = event.to_wire_bytes(format)?;
        Ok(OutputMessage { bytes })
    }
}

enum Slot {
    Message(OutputMessage),
    /// Written once at shutdown; consumers drain up to it and exit.
    Shutdown,
}

struct Inner {
    queue: VecDeque<Slot>,
    queued_bytes: usize,
    closed: bool,
}

pub struct OutputBuffer {
    capacity_bytes: usize,
    state: Mutex<Inner>,
    space_available: Condvar,
    data_available: Condvar,
}

impl OutputBuffer {
    pub fn new(capacity_chunks: usize) -> Arc<OutputBuffer> {
        Arc::new(OutputBuffer {
            capacity_bytes: capacity_chunks.max(1) * CHUNK_CAPACITY_BYTES,
            state: Mutex::new(Inner { queue: VecDeque::new(), queued_bytes: 0, closed: false }),
            space_available: Condvar::new(),
            data_available: Condvar::new(),
        })
    }

    /// Producer side: blocks until there's room, then enqueues one
    /// message. Each committed transaction's events are pushed one
    /// message at a time; the transaction's span is atomic to consumers
    /// only in the sense that a consumer never observes a partially
    /// written message (`push` holds the lock for the whole enqueue).
    pub fn push(&self, message: OutputMessage) -> CResult<()> {
        let len = message.bytes.len();
        let mut guard = self.state.lock().unwrap();
        while guard.queued_bytes + len > self.capacity_bytes && !guard.closed {
            guard = self.space_available.wait(guard).unwrap();
        }
        if guard.closed {
            return Err(Error::Internal("output buffer closed".to_string()));
        }
        guard.queued_bytes += len;
        guard.queue.push_back(Slot::Message(message));
        self.data_available.notify_one();
        Ok(())
    }

    pub fn push_event(&self, event: &OutputEvent, format: &OutputFormat) -> CResult<()> {
        self.push(OutputMessage::from_event(event, format)?)
    }

    /// Consumer side: blocks until a message or the shutdown sentinel is
    /// available. Returns `None` once the sentinel has been drained.
    pub fn next(&self) -> Option<OutputMessage> {
        let mut guard = self.state.lock().unwrap();
        loop {
            match guard.queue.pop_front() {
                Some(Slot::Message(m)) => {
                    guard.queued_bytes = guard.queued_bytes.saturating_sub(m.bytes.len());
                    self.space_available.notify_one();
                    return Some(m);
                }
                Some(Slot::Shutdown) => return None,
                None => {
                    if guard.closed {
                        return None;
                    }
                    guard = self.data_available.wait(guard).unwrap();
                }
            }
        }
    }

    /// Non-blocking consumer poll with a bounded wait, used by writers
    /// that also need to check a cancellation flag periodically.
    pub fn next_timeout(&self, timeout: Duration) -> Option<OutputMessage> {
        let mut guard = self.state.lock().unwrap();
        loop {
            match guard.queue.pop_front() {
                Some(Slot::Message(m)) => {
                    guard.queued_bytes = guard.queued_bytes.saturating_sub(m.bytes.len());
                    self.space_available.notify_one();
                    return Some(m);
                }
                Some(Slot::Shutdown) => return None,
                None => {
                    if guard.closed {
                        return None;
                    }
                    let (g, timed_out) = self.data_available.wait_timeout(guard, timeout).unwrap();
                    guard = g;
                    if timed_out.timed_out() {
                        return None;
                    }
                }
            }
        }
    }

    /// Producer finishes the current transaction, writes the shutdown
    /// sentinel, and both sides drain (spec.md §4.9).
    pub fn shutdown(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.queue.push_back(Slot::Shutdown);
        guard.closed = true;
        self.data_available.notify_all();
        self.space_available.notify_all();
    }
}

/// Serializes any `Serialize` payload the same way `OutputMessage` does,
/// for writers that want to reuse the framing without going through
/// `OutputEvent` (e.g. checkpoint-adjacent diagnostics).
pub fn encode_message<T: Serialize>(value: &T) -> CResult<OutputMessage> {
    Ok(OutputMessage { bytes: serde_json::to_vec(value)? })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Xid;
    use crate::primitives::Scn;
    use std::thread;

    #[test]
    fn push_then_next_roundtrips() {
        let buf = OutputBuffer::new(1);
        let event = OutputEvent::commit_marker(Xid::new(1, 2, 3), Scn(0x10), "2024-01-01T00:00:00Z".into());
        buf.push_event(&event, &crate::config::OutputFormat::default()).unwrap();
        let msg = buf.next().unwrap();
        assert!(!msg.bytes.is_empty());
    }

    #[test]
    fn shutdown_sentinel_ends_consumer() {
        let buf = OutputBuffer::new(1);
        buf.shutdown();
        assert!(buf.next().is_none());
    }

    #[test]
    fn concurrent_producer_consumer_drains_in_order() {
        let buf = OutputBuffer::new(1);
        let producer = buf.clone();
        let handle = thread::spawn(move || {
            let format = crate::config::OutputFormat::default();
            for i in 0..50u32 {
                let event = OutputEvent::commit_marker(Xid::new(0, 0, i), Scn(i as u64), "t".into());
                producer.push_event(&event, &format).unwrap();
            }
            producer.shutdown();
        });
        let mut count = 0;
        while buf.next().is_some() {
            count += 1;
        }
        handle.join().unwrap();
        assert_eq!(count, 50);
    }
}
