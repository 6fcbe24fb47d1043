//! Word-batching buffer between the model stream and connected clients.

use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::types::StreamEvent;

const FLUSH_CHUNK_COUNT: usize = 10;
const FLUSH_INTERVAL: Duration = Duration::from_millis(500);

/// Accumulates model chunks and emits them in batches, so clients are not
/// hammered with one event per token. Send failures (no subscribers) are
/// ignored; the generation task keeps producing for late re-attachers.
pub struct StreamingBuffer {
    sender: broadcast::Sender<StreamEvent>,
    buffer: String,
    chunk_count: usize,
    last_flush: Instant,
    message_id: String,
}

impl StreamingBuffer {
    pub fn new(sender: broadcast::Sender<StreamEvent>, message_id: String) -> Self {
        Self {
            sender,
            buffer: String::new(),
            chunk_count: 0,
            last_flush: Instant::now(),
            message_id,
        }
    }

    pub fn push(&mut self, content: &str) {
        self.buffer.push_str(content);
        self.chunk_count += 1;

        if self.chunk_count >= FLUSH_CHUNK_COUNT || self.last_flush.elapsed() > FLUSH_INTERVAL {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        tracing::debug!(
            chars = self.buffer.len(),
            message_id = %self.message_id,
            "flushing stream buffer"
        );
        let _ = self.sender.send(StreamEvent::MessageContent {
            message_id: self.message_id.clone(),
            content: std::mem::take(&mut self.buffer),
        });
        self.chunk_count = 0;
        self.last_flush = Instant::now();
    }

    pub fn complete(&mut self) {
        self.flush();
        tracing::debug!(message_id = %self.message_id, "stream complete");
        let _ = self.sender.send(StreamEvent::MessageComplete {
            message_id: self.message_id.clone(),
        });
    }

    pub fn error(&mut self, error: String) {
        self.flush();
        let _ = self.sender.send(StreamEvent::MessageError {
            message_id: self.message_id.clone(),
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn batches_chunks_before_sending() {
        let (sender, mut receiver) = broadcast::channel(32);
        let mut buffer = StreamingBuffer::new(sender, "m1".to_string());

        for word in ["a ", "b ", "c "] {
            buffer.push(word);
        }
        // Below the chunk threshold and inside the interval: nothing sent yet.
        assert!(receiver.try_recv().is_err());

        buffer.complete();

        match receiver.try_recv().unwrap() {
            StreamEvent::MessageContent {
                message_id,
                content,
            } => {
                assert_eq!(message_id, "m1");
                assert_eq!(content, "a b c ");
            }
            other => panic!("expected content event, got {other:?}"),
        }
        assert!(matches!(
            receiver.try_recv().unwrap(),
            StreamEvent::MessageComplete { .. }
        ));
    }

    #[tokio::test]
    async fn flushes_at_chunk_threshold() {
        let (sender, mut receiver) = broadcast::channel(32);
        let mut buffer = StreamingBuffer::new(sender, "m1".to_string());

        for i in 0..FLUSH_CHUNK_COUNT {
            buffer.push(&format!("{i} "));
        }

        assert!(matches!(
            receiver.try_recv().unwrap(),
            StreamEvent::MessageContent { .. }
        ));
    }

    #[tokio::test]
    async fn error_flushes_pending_content_first() {
        let (sender, mut receiver) = broadcast::channel(32);
        let mut buffer = StreamingBuffer::new(sender, "m1".to_string());

        buffer.push("partial ");
        buffer.error("model fell over".to_string());

        assert!(matches!(
            receiver.try_recv().unwrap(),
            StreamEvent::MessageContent { .. }
        ));
        match receiver.try_recv().unwrap() {
            StreamEvent::MessageError { error, .. } => {
                assert_eq!(error, "model fell over");
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }
}
