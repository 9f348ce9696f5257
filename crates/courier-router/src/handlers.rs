// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound event fan-out.
//!
//! Adapters surface one event stream; the router dispatches each event to
//! every registered handler. A handler's error is logged and never blocks
//! delivery to the others or the pull loop itself.

use std::sync::RwLock;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use courier_core::types::{
    ChannelEvent, ConnectionEvent, InboundMessage, PairingEvent, StatusUpdate,
};
use courier_core::CourierError;

/// A consumer of inbound channel events. Default methods are no-ops so a
/// handler implements only the event kinds it cares about.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn on_message(&self, _message: &InboundMessage) -> Result<(), CourierError> {
        Ok(())
    }

    async fn on_status(&self, _update: &StatusUpdate) -> Result<(), CourierError> {
        Ok(())
    }

    async fn on_connection(&self, _event: &ConnectionEvent) -> Result<(), CourierError> {
        Ok(())
    }

    /// Only emitted by channels whose capabilities advertise pairing.
    async fn on_pairing(&self, _event: &PairingEvent) -> Result<(), CourierError> {
        Ok(())
    }
}

/// The router's registered handlers, shared with every adapter pull loop.
#[derive(Default)]
pub struct HandlerSet {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl HandlerSet {
    pub fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .expect("handler lock poisoned")
            .push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.read().expect("handler lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers one event to every handler. Handler failures are logged and
    /// do not stop delivery to the remaining handlers.
    pub async fn dispatch(&self, event: &ChannelEvent) {
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .read()
            .expect("handler lock poisoned")
            .clone();
        for handler in handlers {
            let outcome = match event {
                ChannelEvent::Message(message) => handler.on_message(message).await,
                ChannelEvent::Status(update) => handler.on_status(update).await,
                ChannelEvent::Connection(connection) => handler.on_connection(connection).await,
                ChannelEvent::Pairing(pairing) => handler.on_pairing(pairing).await,
            };
            if let Err(e) = outcome {
                warn!(error = %e, "event handler failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use courier_core::types::{ChannelType, MessageId};

    struct Counting {
        messages: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for Counting {
        async fn on_message(&self, _message: &InboundMessage) -> Result<(), CourierError> {
            self.messages.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        async fn on_message(&self, _message: &InboundMessage) -> Result<(), CourierError> {
            Err(CourierError::Internal("handler exploded".into()))
        }
    }

    fn message_event() -> ChannelEvent {
        ChannelEvent::Message(InboundMessage {
            id: MessageId("m1".into()),
            account_id: "a1".into(),
            channel_type: ChannelType::Telegram,
            sender: "u1".into(),
            text: Some("hi".into()),
            timestamp: Utc::now(),
            metadata: None,
        })
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_others() {
        let set = HandlerSet::default();
        let counting = Arc::new(Counting {
            messages: AtomicUsize::new(0),
        });
        set.register(Arc::new(Failing));
        set.register(counting.clone());

        set.dispatch(&message_event()).await;
        assert_eq!(counting.messages.load(Ordering::SeqCst), 1);
    }
}
