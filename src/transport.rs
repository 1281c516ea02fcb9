//! Transport seam and connection-gated sending.
//!
//! The transport (WebSocket, in practice) owns its connection lifecycle,
//! reconnection, and framing; this crate only observes connect/disconnect
//! transitions and hands it fully-encoded frames. [`GatedSender`] funnels
//! every frame through one outbound task that defers transmission until
//! the transport reports itself connected, preserving call order on the
//! wire. Delivery is best-effort, not replayed; callers that need
//! repeated delivery re-send on their own schedule.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

/// Observable connection state of the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// The byte channel to the relay.
///
/// Implementations surface status transitions on a watch channel; this
/// core never drives reconnection, it only waits for the next
/// `Connected` value.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe to connection status. The receiver yields the current
    /// value immediately and every transition after it.
    fn status(&self) -> watch::Receiver<ConnectionStatus>;

    /// Transmit one already-encoded frame.
    async fn send_raw(&self, frame: Vec<u8>) -> anyhow::Result<()>;

    fn is_connected(&self) -> bool {
        *self.status().borrow() == ConnectionStatus::Connected
    }
}

/// Fire-and-forget sender that waits out disconnections.
///
/// All clones feed one outbound task, so call order is transmission
/// order. The bootstrap sequence depends on that: the SEED broadcast
/// must reach the relay before the RELEASE issued right after it.
#[derive(Clone)]
pub struct GatedSender {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl GatedSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (outbound, pending) = mpsc::unbounded_channel();
        tokio::spawn(Self::outbound_loop(transport, pending));
        Self { outbound }
    }

    /// Queue `frame` for transmission as soon as the transport allows.
    ///
    /// Never transmits synchronously, which sidesteps re-entrancy
    /// ordering problems when a send is issued from inside an inbound
    /// handler. Frames queued while disconnected go out, in order, on
    /// the next `Connected` transition.
    pub fn send(&self, frame: Vec<u8>) {
        if self.outbound.send(frame).is_err() {
            tracing::debug!("outbound task gone, dropping frame");
        }
    }

    async fn outbound_loop(
        transport: Arc<dyn Transport>,
        mut pending: mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        while let Some(frame) = pending.recv().await {
            if !transport.is_connected() {
                let mut status = transport.status();
                if status
                    .wait_for(|s| *s == ConnectionStatus::Connected)
                    .await
                    .is_err()
                {
                    tracing::debug!("transport gone, dropping queued frames");
                    return;
                }
            }
            if let Err(e) = transport.send_raw(frame).await {
                tracing::warn!(error = %e, "frame transmission failed");
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn connected_send_goes_out_next_tick() {
        let transport = MockTransport::connected();
        let sender = GatedSender::new(transport.clone() as Arc<dyn Transport>);

        sender.send(vec![127]);
        assert!(transport.sent_frames().is_empty(), "not synchronous");

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(transport.sent_frames(), vec![vec![127]]);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_send_waits_for_next_connected() {
        let transport = MockTransport::disconnected();
        let sender = GatedSender::new(transport.clone() as Arc<dyn Transport>);

        sender.send(vec![125]);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(
            transport.sent_frames().is_empty(),
            "zero bytes while disconnected"
        );

        transport.set_status(ConnectionStatus::Connected);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(transport.sent_frames(), vec![vec![125]]);
    }

    #[tokio::test(start_paused = true)]
    async fn each_deferred_frame_sent_exactly_once() {
        let transport = MockTransport::disconnected();
        let sender = GatedSender::new(transport.clone() as Arc<dyn Transport>);

        sender.send(vec![1]);
        sender.send(vec![2]);
        transport.set_status(ConnectionStatus::Connected);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(transport.sent_frames(), vec![vec![1], vec![2]]);

        // A later reconnect does not replay anything.
        transport.set_status(ConnectionStatus::Disconnected);
        transport.set_status(ConnectionStatus::Connected);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(transport.sent_frames().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_sends_keep_call_order() {
        let transport = MockTransport::connected();
        let sender = GatedSender::new(transport.clone() as Arc<dyn Transport>);

        // Issued without yielding in between, the way the orchestrator
        // emits SEED then RELEASE.
        for tag in [124u8, 125, 126, 127] {
            sender.send(vec![tag]);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(
            transport.sent_frames(),
            vec![vec![124], vec![125], vec![126], vec![127]]
        );
    }
}
