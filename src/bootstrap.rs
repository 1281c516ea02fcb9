//! Reconnection bootstrap orchestration.
//!
//! Decides which reconnecting client seeds the document's initial state.
//! CRDT merge guarantees convergence once update bytes flow, but it says
//! nothing about *when* a client may assume the document is empty; that
//! temporal decision is serialized through a relay-arbitrated lock:
//!
//! 1. acquire the lock (retried, unbounded)
//! 2. ask the relay whether content exists (bounded, 1 s fallback)
//! 3. seed the current local snapshot only if it does not
//! 4. release the lock
//!
//! The sequence runs automatically on every reconnect *after* the first
//! successful bootstrap. The very first bootstrap is the caller's job;
//! running it automatically on the initial connection would race the
//! caller's own sequence and could double-seed an empty relay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::BootstrapConfig;
use crate::document::SharedDocument;
use crate::identity::{self, IdentityProvider};
use crate::protocol::codec::{ClientMessage, CodecError, LockToken, RelayMessage};
use crate::protocol::pending::{Reply, RequestError, SingleFlight};
use crate::transport::{ConnectionStatus, GatedSender, Transport};

/// Where the orchestrator currently is, for diagnostics and UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// Between status transitions, nothing running.
    Idle,
    /// Waiting for the relay to grant the lock. Unbounded by design.
    AcquiringLock,
    /// Waiting for the relay's content reply or the local fallback.
    QueryingContent,
    /// Broadcasting the local snapshot as the authoritative state.
    Seeding,
    /// Handing the lock back.
    ReleasingLock,
}

/// Client half of the lock-arbitrated bootstrap protocol.
///
/// One instance per document channel, one lock per instance. All public
/// operations are also usable directly by the first-time bootstrap
/// caller; the built-in status watcher reuses them on reconnect.
pub struct BootstrapClient {
    transport: Arc<dyn Transport>,
    document: Arc<dyn SharedDocument>,
    sender: GatedSender,
    config: BootstrapConfig,
    lock_requests: Arc<SingleFlight<LockToken>>,
    content_requests: Arc<SingleFlight<bool>>,
    /// True once any full bootstrap has completed on this instance.
    /// Never reset for the lifetime of the client.
    initialized: AtomicBool,
    phase: Mutex<BootstrapPhase>,
}

impl BootstrapClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        document: Arc<dyn SharedDocument>,
        identity: Option<Arc<dyn IdentityProvider>>,
        config: BootstrapConfig,
    ) -> Arc<Self> {
        let client = Arc::new(Self {
            sender: GatedSender::new(Arc::clone(&transport)),
            transport,
            document,
            config,
            lock_requests: Arc::new(SingleFlight::new()),
            content_requests: Arc::new(SingleFlight::new()),
            initialized: AtomicBool::new(false),
            phase: Mutex::new(BootstrapPhase::Idle),
        });
        if let Some(provider) = identity {
            identity::attach_display_name(provider, Arc::clone(&client.document));
        }
        client.spawn_status_watcher();
        client
    }

    /// Whether this instance has ever completed a full bootstrap.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Current orchestrator phase snapshot.
    pub fn phase(&self) -> BootstrapPhase {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: BootstrapPhase) {
        *self.phase.lock() = phase;
    }

    // ── Lock acquisition engine ─────────────────────────────────

    /// Request the document lock from the relay.
    ///
    /// Single-flight: a call while a request is pending joins the
    /// existing future. While unresolved, a one-byte ACQUIRE is
    /// retransmitted on a fixed interval, but only while the transport
    /// reports connected, so an outage queues nothing.
    ///
    /// There is deliberately no application-level timeout: the future
    /// stays pending until the relay grants, delegating liveness to the
    /// transport's own reconnection. A stuck relay therefore stalls the
    /// orchestrator at this step, recoverable the moment it answers.
    pub fn acquire_lock(&self) -> Reply<LockToken> {
        let (reply, opened) = self.lock_requests.request();
        if !opened {
            return reply;
        }
        tracing::debug!("requesting document lock");
        self.sender.send(ClientMessage::Acquire.encode());
        self.spawn_lock_retry(reply.clone());
        reply
    }

    /// Hand a granted lock back to the relay. Fire-and-forget: exactly
    /// one RELEASE frame, no acknowledgement expected.
    pub fn release_lock(&self, token: LockToken) {
        tracing::debug!(token = %token, "releasing document lock");
        self.sender.send(ClientMessage::Release(token).encode());
    }

    fn spawn_lock_retry(&self, mut reply: Reply<LockToken>) {
        let transport = Arc::clone(&self.transport);
        let sender = self.sender.clone();
        let interval = self.config.lock_retry_interval();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut reply => break,
                    _ = tokio::time::sleep(interval) => {
                        if transport.is_connected() {
                            tracing::trace!("retransmitting lock request");
                            sender.send(ClientMessage::Acquire.encode());
                        }
                    }
                }
            }
        });
    }

    // ── Initial-content negotiation ─────────────────────────────

    /// Ask the relay whether the document has been seeded.
    ///
    /// Resolves `true` when content existed (and was applied to the local
    /// replica), `false` when the relay reported none, or when no reply
    /// arrived before the fallback timeout. Failing to decide must not
    /// hang the caller; a connection problem is the transport's to fix,
    /// not a reason to block this decision.
    pub fn request_initial_content(&self) -> Reply<bool> {
        let (reply, opened) = self.content_requests.request();
        if !opened {
            return reply;
        }
        tracing::debug!("querying relay for existing content");
        self.sender.send(ClientMessage::ContentQuery.encode());

        let requests = Arc::clone(&self.content_requests);
        let timeout = self.config.content_reply_timeout();
        let mut watched = reply.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = &mut watched => {}
                _ = tokio::time::sleep(timeout) => {
                    if requests.settle(false) {
                        tracing::debug!(
                            timeout_ms = timeout.as_millis() as u64,
                            "no content reply before fallback, assuming unseeded"
                        );
                    }
                }
            }
        });
        reply
    }

    // ── Seeding ─────────────────────────────────────────────────

    /// Broadcast the local full state as the document's authoritative
    /// initial content and transition to INITIALIZED.
    ///
    /// Called by the first-time bootstrap caller once its sequence
    /// succeeds, and by the reconnect orchestrator when the relay turns
    /// out to have lost its copy.
    pub fn mark_bootstrap_complete(&self) {
        let snapshot = self.document.encode_full_state();
        tracing::info!(snapshot_bytes = snapshot.len(), "seeding document state");
        self.sender.send(ClientMessage::Seed(snapshot).encode());
        self.initialized.store(true, Ordering::SeqCst);
    }

    // ── Inbound routing ─────────────────────────────────────────

    /// Route one inbound application-level frame.
    ///
    /// The transport must feed this only frames it does not own; tags of
    /// its base protocol that still land here are ignored. Replies with
    /// no matching pending request are stale and dropped.
    pub fn handle_frame(&self, frame: &[u8]) {
        match RelayMessage::decode(frame) {
            Ok(RelayMessage::LockGrant(token)) => {
                if self.lock_requests.settle(token) {
                    tracing::info!(token = %token, "lock granted");
                } else {
                    tracing::debug!(token = %token, "stale lock grant ignored");
                }
            }
            Ok(RelayMessage::Content(payload)) => {
                let has_content = !payload.is_empty();
                if has_content {
                    // Merge is commutative and idempotent, so a reply that
                    // arrives after the fallback already decided is still
                    // applied; only the decision itself stands.
                    if let Err(e) = self.document.apply_update(&payload) {
                        tracing::warn!(error = %e, "failed to apply relay content");
                    }
                }
                if !self.content_requests.settle(has_content) {
                    tracing::debug!(
                        bytes = payload.len(),
                        "content reply with no pending query"
                    );
                }
            }
            Err(CodecError::ReservedTag(tag)) => {
                tracing::trace!(tag, "frame belongs to transport base protocol, ignoring");
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable control frame");
            }
        }
    }

    // ── Reconnection orchestrator ───────────────────────────────

    fn spawn_status_watcher(self: &Arc<Self>) {
        // Subscribe before spawning so transitions between construction
        // and the task's first poll are not missed.
        let mut status = self.transport.status();
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if status.changed().await.is_err() {
                    // Transport gone; nothing left to watch.
                    break;
                }
                let connected =
                    *status.borrow_and_update() == ConnectionStatus::Connected;
                if connected && client.is_initialized() {
                    client.run_reconnect_bootstrap().await;
                }
            }
        });
    }

    /// Re-run the guarded bootstrap after a reconnect. Covers the relay
    /// having lost its copy (e.g. a restart) while this client was away:
    /// exactly one reconnecting client, serialized by the lock, re-seeds.
    async fn run_reconnect_bootstrap(&self) {
        tracing::info!("reconnected after bootstrap, verifying relay state");

        self.set_phase(BootstrapPhase::AcquiringLock);
        let token = match self.acquire_lock().await {
            Ok(token) => token,
            Err(RequestError::Abandoned) => {
                self.set_phase(BootstrapPhase::Idle);
                return;
            }
        };

        self.set_phase(BootstrapPhase::QueryingContent);
        let has_content = self.request_initial_content().await.unwrap_or(false);

        if !has_content {
            self.set_phase(BootstrapPhase::Seeding);
            self.mark_bootstrap_complete();
        }

        self.set_phase(BootstrapPhase::ReleasingLock);
        self.release_lock(token);
        self.set_phase(BootstrapPhase::Idle);

        tracing::info!(reseeded = !has_content, "reconnect bootstrap complete");
    }
}

// ── Tests ───────────────────────────────────────────────────────
