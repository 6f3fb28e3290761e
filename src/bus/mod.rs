//! Inbound message queue
//!
//! The queue is the only state shared between the HTTP handlers and the
//! agent loop. Producers call [`InboundQueue::enqueue`] from any task;
//! the loop calls [`InboundQueue::drain_all`] once per iteration and takes
//! ownership of the whole batch.

pub mod message;

pub use message::{render_batch, MessageSource, QueuedMessage};

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::log_component;

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<QueuedMessage>,
    next_seq: u64,
}

/// Mutex-guarded FIFO of messages awaiting the agent loop.
///
/// Both operations hold the lock only for a push or a swap, never across
/// an await point.
#[derive(Debug, Default)]
pub struct InboundQueue {
    state: Mutex<QueueState>,
}

impl InboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a message and return its arrival sequence number.
    pub fn enqueue(&self, mut message: QueuedMessage) -> u64 {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        message.seq = seq;
        state.messages.push_back(message);
        log_component!(
            debug,
            "queue",
            "Message enqueued",
            seq = seq,
            depth = state.messages.len(),
        );
        seq
    }

    /// Take every message enqueued since the previous drain, oldest first.
    pub fn drain_all(&self) -> Vec<QueuedMessage> {
        let taken = std::mem::take(&mut self.lock().messages);
        if !taken.is_empty() {
            log_component!(debug, "queue", "Queue drained", count = taken.len());
        }
        Vec::from(taken)
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    /// Total number of messages ever enqueued.
    pub fn total_enqueued(&self) -> u64 {
        self.lock().next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_drain_returns_fifo_order() {
        let queue = InboundQueue::new();
        queue.enqueue(QueuedMessage::direct("a", "1"));
        queue.enqueue(QueuedMessage::direct("b", "2"));
        queue.enqueue(QueuedMessage::group("c", "3"));

        let drained = queue.drain_all();
        let contents: Vec<_> = drained.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["1", "2", "3"]);
        assert_eq!(drained.iter().map(|m| m.seq).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_second_drain_is_empty() {
        let queue = InboundQueue::new();
        queue.enqueue(QueuedMessage::local("x"));
        assert_eq!(queue.drain_all().len(), 1);
        assert!(queue.drain_all().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_messages_after_drain_go_to_next_batch() {
        let queue = InboundQueue::new();
        queue.enqueue(QueuedMessage::local("before"));
        let first = queue.drain_all();
        queue.enqueue(QueuedMessage::local("after"));
        let second = queue.drain_all();
        assert_eq!(first[0].content, "before");
        assert_eq!(second[0].content, "after");
        assert_eq!(queue.total_enqueued(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_producers_no_loss_no_duplicates() {
        let queue = Arc::new(InboundQueue::new());
        let mut handles = vec![];

        for producer in 0..50 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                queue.enqueue(QueuedMessage::direct(
                    &format!("agent{}", producer),
                    &format!("msg-{}", producer),
                ))
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 50);
        let unique: HashSet<_> = drained.iter().map(|m| m.content.clone()).collect();
        assert_eq!(unique.len(), 50);
        // Sequence numbers are the arrival order.
        assert!(drained.windows(2).all(|w| w[0].seq < w[1].seq));
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_drain_concurrent_with_producers_never_duplicates() {
        let queue = Arc::new(InboundQueue::new());
        let producers: Vec<_> = (0..8)
            .map(|p| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        queue.enqueue(QueuedMessage::local(&format!("{}-{}", p, i)));
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while producers.iter().any(|h| !h.is_finished()) {
            seen.extend(queue.drain_all());
        }
        for handle in producers {
            handle.join().unwrap();
        }
        seen.extend(queue.drain_all());

        assert_eq!(seen.len(), 2000);
        let unique: HashSet<_> = seen.iter().map(|m| m.seq).collect();
        assert_eq!(unique.len(), 2000);
        assert!(seen.windows(2).all(|w| w[0].seq < w[1].seq));
    }
}
