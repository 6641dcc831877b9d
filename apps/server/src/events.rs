//! Broadcast bridge from quote events to SSE subscribers.

use covermesh_quote_engine::{QuoteEvent, QuoteEventSink};
use tokio::sync::broadcast;

/// Fans quote events out to every connected stream.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<QuoteEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QuoteEvent> {
        self.sender.subscribe()
    }
}

impl QuoteEventSink for EventBus {
    fn emit(&self, event: QuoteEvent) {
        // No subscribers is the common case.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(QuoteEvent::AggregationCompleted {
            request_id: "req_1".to_string(),
            total: 1,
            successful: 1,
            failed: 0,
            quote_count: 2,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.request_id(), "req_1");
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        bus.emit(QuoteEvent::AggregationCompleted {
            request_id: "req_1".to_string(),
            total: 0,
            successful: 0,
            failed: 0,
            quote_count: 0,
        });
    }
}
