//! Delivery queue between a reader task and its owner.
//!
//! An unbounded single-producer/single-consumer channel of byte chunks. The
//! reader task holds the [`ChunkSender`]; the owning component holds the
//! [`ChunkReceiver`]. An empty chunk is the end-of-stream marker and is never
//! handed to callers as data.

use std::sync::mpsc;
use std::time::Duration;

/// Create a connected sender/receiver pair.
pub fn delivery_queue() -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        ChunkSender { tx },
        ChunkReceiver {
            rx,
            finished: false,
        },
    )
}

/// Producer end, owned by the reader task.
#[derive(Debug)]
pub struct ChunkSender {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChunkSender {
    /// Forward one chunk. Empty chunks are dropped here so that only
    /// [`finish`](Self::finish) can produce the end marker.
    ///
    /// Returns `false` once the receiver has been dropped.
    pub fn send(&self, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() {
            return true;
        }
        self.tx.send(chunk).is_ok()
    }

    /// Forward the end-of-stream marker.
    pub fn finish(&self) {
        let _ = self.tx.send(Vec::new());
    }
}

/// Consumer end, owned by the component that started the reader.
#[derive(Debug)]
pub struct ChunkReceiver {
    rx: mpsc::Receiver<Vec<u8>>,
    finished: bool,
}

impl ChunkReceiver {
    /// Pop every chunk queued right now and concatenate them in arrival order.
    ///
    /// Never blocks. Returns an empty vector when nothing is queued.
    pub fn drain_all(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(chunk) if chunk.is_empty() => self.finished = true,
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.finished = true;
                    break;
                }
            }
        }
        out
    }

    /// Wait up to `timeout` for the next non-empty chunk.
    ///
    /// Returns `None` on timeout or once the producer has finished.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        if self.finished {
            return self.rx.try_recv().ok().filter(|chunk| !chunk.is_empty());
        }
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) if chunk.is_empty() => {
                self.finished = true;
                None
            }
            Ok(chunk) => Some(chunk),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    /// Whether the producer has signalled end-of-stream or gone away.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_drain_all_concatenates_in_order() {
        let (tx, mut rx) = delivery_queue();
        tx.send(b"ab".to_vec());
        tx.send(b"cd".to_vec());
        tx.send(b"e".to_vec());

        assert_eq!(rx.drain_all(), b"abcde".to_vec());
    }

    #[test]
    fn test_second_drain_is_empty() {
        let (tx, mut rx) = delivery_queue();
        tx.send(b"once".to_vec());

        assert_eq!(rx.drain_all(), b"once".to_vec());
        assert!(rx.drain_all().is_empty());
        assert!(!rx.is_finished());
    }

    #[test]
    fn test_empty_chunks_never_surface() {
        let (tx, mut rx) = delivery_queue();
        tx.send(Vec::new());
        tx.send(b"x".to_vec());
        tx.finish();

        assert_eq!(rx.drain_all(), b"x".to_vec());
        assert!(rx.is_finished());
    }

    #[test]
    fn test_drain_after_producer_exit_terminates() {
        let (tx, mut rx) = delivery_queue();
        tx.send(b"tail".to_vec());
        tx.finish();
        drop(tx);

        assert_eq!(rx.drain_all(), b"tail".to_vec());
        assert!(rx.drain_all().is_empty());
        assert!(rx.is_finished());
    }

    #[test]
    fn test_recv_timeout() {
        let (tx, mut rx) = delivery_queue();
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), None);

        tx.send(b"late".to_vec());
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Some(b"late".to_vec()));

        drop(tx);
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), None);
        assert!(rx.is_finished());
    }

    #[test]
    fn test_send_reports_dropped_receiver() {
        let (tx, rx) = delivery_queue();
        drop(rx);
        assert!(!tx.send(b"x".to_vec()));
    }
}
