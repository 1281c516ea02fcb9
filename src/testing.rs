//! In-memory collaborator doubles shared by unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::document::SharedDocument;
use crate::identity::IdentityProvider;
use crate::protocol::codec::{ClientMessage, MessageKind};
use crate::transport::{ConnectionStatus, Transport};

/// Route protocol tracing to the test harness, filtered by `RUST_LOG`.
/// First caller wins; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Transport that records outbound frames and exposes a settable
/// connection status.
pub struct MockTransport {
    status: watch::Sender<ConnectionStatus>,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub fn connected() -> Arc<Self> {
        Self::with_status(ConnectionStatus::Connected)
    }

    pub fn disconnected() -> Arc<Self> {
        Self::with_status(ConnectionStatus::Disconnected)
    }

    fn with_status(initial: ConnectionStatus) -> Arc<Self> {
        init_tracing();
        let (status, _) = watch::channel(initial);
        Arc::new(Self {
            status,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        // send_replace never fails, even with no subscribers alive.
        self.status.send_replace(status);
    }

    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    /// Kinds of all recorded control frames, in send order.
    pub fn kinds(&self) -> Vec<MessageKind> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| ClientMessage::decode(frame).ok())
            .map(|msg| msg.kind())
            .collect()
    }

    pub fn frames_of_kind(&self, kind: MessageKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    async fn send_raw(&self, frame: Vec<u8>) -> anyhow::Result<()> {
        self.sent.lock().push(frame);
        Ok(())
    }
}

/// Document replica that records applied updates and awareness writes.
pub struct MockDocument {
    state: Mutex<Vec<u8>>,
    applied: Mutex<Vec<Vec<u8>>>,
    awareness: Mutex<Vec<(String, String)>>,
}

impl MockDocument {
    pub fn empty() -> Arc<Self> {
        Self::with_state(Vec::new())
    }

    pub fn with_state(state: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            applied: Mutex::new(Vec::new()),
            awareness: Mutex::new(Vec::new()),
        })
    }

    pub fn applied_updates(&self) -> Vec<Vec<u8>> {
        self.applied.lock().clone()
    }

    pub fn awareness(&self) -> Vec<(String, String)> {
        self.awareness.lock().clone()
    }
}

impl SharedDocument for MockDocument {
    fn encode_full_state(&self) -> Vec<u8> {
        self.state.lock().clone()
    }

    fn apply_update(&self, update: &[u8]) -> anyhow::Result<()> {
        self.applied.lock().push(update.to_vec());
        Ok(())
    }

    fn set_awareness_field(&self, key: &str, value: &str) {
        self.awareness
            .lock()
            .push((key.to_string(), value.to_string()));
    }
}

/// Identity provider with a fixed answer, or a fixed failure.
pub struct MockIdentity {
    name: Option<String>,
}

impl MockIdentity {
    pub fn named(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: Some(name.to_string()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { name: None })
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn display_name(&self) -> anyhow::Result<String> {
        match &self.name {
            Some(name) => Ok(name.clone()),
            None => Err(anyhow::anyhow!("identity service unavailable")),
        }
    }
}
