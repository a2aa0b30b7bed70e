//! Streaming bridge: runs a step loop on a worker while forwarding deltas
//!
//! The worker task pushes incremental text chunks plus one terminal item
//! into an unbounded channel; the consumer-facing stream yields
//! `message_delta` events for each chunk, then the accumulated terminal
//! events, then ends. Communication is strictly worker-to-consumer, so the
//! consumer never blocks the worker and the worker's authoritative mutation
//! always completes even if the consumer stops reading early.

use crate::director::GameEvent;
use crate::error::Result;
use futures::stream::Stream;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Read timeout guarding the consumer against a wedged worker
pub const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Item pushed from the worker to the consumer
#[derive(Debug)]
enum StreamItem {
    /// Incremental text chunk from the actor responder
    Delta(String),
    /// Step loop finished; carries the accumulated events
    Done(Vec<GameEvent>),
    /// Step loop failed before producing events
    Error(String),
}

/// Sink handed to actor responders for incremental output
///
/// Sends never block and never fail: a consumer that stopped reading simply
/// drops the chunks.
#[derive(Clone)]
pub struct DeltaSink {
    tx: mpsc::UnboundedSender<StreamItem>,
}

impl DeltaSink {
    fn new(tx: mpsc::UnboundedSender<StreamItem>) -> Self {
        Self { tx }
    }

    /// Forwards one text chunk to the consumer
    pub fn send(&self, chunk: impl Into<String>) {
        let _ = self.tx.send(StreamItem::Delta(chunk.into()));
    }

    /// Creates a sink whose chunks go nowhere, for tests and warmup paths
    pub fn discarding() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self::new(tx)
    }
}

struct BridgeState {
    rx: mpsc::UnboundedReceiver<StreamItem>,
    pending: VecDeque<GameEvent>,
    finished: bool,
}

/// Spawns `work` on a worker task and returns the consumer-facing stream
///
/// `work` receives a [`DeltaSink`] and must run the step loop to completion,
/// returning the accumulated events. The worker is never cancelled: on a
/// read timeout the stream ends but the task keeps running, so its state
/// mutation and checkpoint still land.
pub(crate) fn bridge<F, Fut>(work: F) -> impl Stream<Item = GameEvent> + Send
where
    F: FnOnce(DeltaSink) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<GameEvent>>> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = DeltaSink::new(tx.clone());
    tokio::spawn(async move {
        match work(sink).await {
            Ok(events) => {
                let _ = tx.send(StreamItem::Done(events));
            }
            Err(e) => {
                let _ = tx.send(StreamItem::Error(format!("{e:#}")));
            }
        }
    });

    let state = BridgeState {
        rx,
        pending: VecDeque::new(),
        finished: false,
    };
    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }
            match tokio::time::timeout(STREAM_READ_TIMEOUT, state.rx.recv()).await {
                Err(_) => {
                    warn!("turn stream read timed out; abandoning consumption");
                    return None;
                }
                Ok(None) => return None,
                Ok(Some(StreamItem::Delta(delta))) => {
                    return Some((GameEvent::MessageDelta { delta }, state));
                }
                Ok(Some(StreamItem::Done(events))) => {
                    state.finished = true;
                    state.pending.extend(events);
                }
                Ok(Some(StreamItem::Error(message))) => {
                    state.finished = true;
                    return Some((GameEvent::Error { message }, state));
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgoraError;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_bridge_yields_deltas_then_events() {
        let stream = bridge(|sink| async move {
            sink.send("Hel");
            sink.send("lo");
            Ok(vec![GameEvent::Message {
                author: "Livia".to_string(),
                content: "Hello".to_string(),
                timestamp: chrono::Utc::now(),
                turn: 0,
            }])
        });
        let events: Vec<GameEvent> = stream.collect().await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], GameEvent::MessageDelta { delta } if delta == "Hel"));
        assert!(matches!(&events[1], GameEvent::MessageDelta { delta } if delta == "lo"));
        assert!(matches!(&events[2], GameEvent::Message { author, .. } if author == "Livia"));
    }

    #[tokio::test]
    async fn test_bridge_forwards_worker_error() {
        let stream = bridge(|_sink| async move {
            Err(AgoraError::Agent("actor exploded".to_string()).into())
        });
        let events: Vec<GameEvent> = stream.collect().await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], GameEvent::Error { message } if message.contains("exploded")));
    }

    #[tokio::test]
    async fn test_bridge_empty_events() {
        let stream = bridge(|_sink| async move { Ok(vec![]) });
        let events: Vec<GameEvent> = stream.collect().await;
        assert!(events.is_empty());
    }

    #[test]
    fn test_discarding_sink_never_fails() {
        let sink = DeltaSink::discarding();
        sink.send("chunk");
        sink.send("another");
    }
}
