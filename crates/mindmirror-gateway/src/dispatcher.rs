use std::sync::Arc;

use tokio::sync::broadcast;

use mindmirror_types::events::GatewayEvent;

/// Fans application events out to every connected client. Each connection
/// filters the stream down to what its user is subscribed to and allowed to
/// see; the dispatcher itself is routing-agnostic.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events. All connections receive all
    /// events and filter locally.
    broadcast_tx: broadcast::Sender<GatewayEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn subscribers_receive_broadcasts() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        let patient_id = Uuid::new_v4();
        dispatcher.broadcast(GatewayEvent::LinkCleared {
            patient_id,
            doctor_code: "DR7QX2KP".into(),
        });

        match rx.recv().await.unwrap() {
            GatewayEvent::LinkCleared { patient_id: got, .. } => assert_eq!(got, patient_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
