//! Registry of in-flight streams, keyed by stream id.
//!
//! A stream is registered before generation starts and removed when the
//! generation task ends. Clients re-attach by subscribing to the broadcast
//! channel; a client stop cancels the per-stream token.

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::types::StreamEvent;

const CHANNEL_CAPACITY: usize = 256;

struct LiveStream {
    chat_id: String,
    sender: broadcast::Sender<StreamEvent>,
    cancel: CancellationToken,
}

#[derive(Default)]
pub struct StreamRegistry {
    streams: RwLock<HashMap<String, LiveStream>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        stream_id: &str,
        chat_id: &str,
    ) -> (broadcast::Sender<StreamEvent>, CancellationToken) {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        self.streams.write().await.insert(
            stream_id.to_string(),
            LiveStream {
                chat_id: chat_id.to_string(),
                sender: sender.clone(),
                cancel: cancel.clone(),
            },
        );

        (sender, cancel)
    }

    /// Re-attach to an in-flight stream. `None` once the stream finished.
    pub async fn subscribe(&self, stream_id: &str) -> Option<broadcast::Receiver<StreamEvent>> {
        self.streams
            .read()
            .await
            .get(stream_id)
            .map(|live| live.sender.subscribe())
    }

    /// Cancels every live stream for the chat. Returns whether any was live.
    pub async fn cancel_chat(&self, chat_id: &str) -> bool {
        let streams = self.streams.read().await;
        let mut cancelled = false;
        for live in streams.values() {
            if live.chat_id == chat_id {
                live.cancel.cancel();
                cancelled = true;
            }
        }
        cancelled
    }

    pub async fn finish(&self, stream_id: &str) {
        self.streams.write().await.remove(stream_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_until_finish() {
        let registry = StreamRegistry::new();
        let (sender, _cancel) = registry.register("s1", "c1").await;

        let mut receiver = registry.subscribe("s1").await.unwrap();
        sender
            .send(StreamEvent::MessageComplete {
                message_id: "m1".to_string(),
            })
            .unwrap();
        assert!(matches!(
            receiver.recv().await.unwrap(),
            StreamEvent::MessageComplete { .. }
        ));

        registry.finish("s1").await;
        assert!(registry.subscribe("s1").await.is_none());
    }

    #[tokio::test]
    async fn cancel_chat_trips_the_stream_token() {
        let registry = StreamRegistry::new();
        let (_sender, cancel) = registry.register("s1", "c1").await;

        assert!(!cancel.is_cancelled());
        assert!(registry.cancel_chat("c1").await);
        assert!(cancel.is_cancelled());

        // Unknown chat: nothing to cancel.
        assert!(!registry.cancel_chat("c2").await);
    }
}
