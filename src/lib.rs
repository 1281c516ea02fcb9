//! Client side of a lock-arbitrated bootstrap protocol for replicated
//! documents sharing a relay channel.
//!
//! CRDT replication handles ongoing convergence on its own; what it
//! cannot decide is which client may treat the document as empty and
//! seed its initial content after a (re)connect. This crate serializes
//! that decision through a relay-held lock: acquire, query for existing
//! content, seed only if none exists, release.
//!
//! The crate owns the control-frame codec, the single-flight request
//! registry, the lock and content engines, and the reconnect
//! orchestrator. The transport, the document replica, and the identity
//! service are supplied by the embedding application through the
//! [`transport::Transport`], [`document::SharedDocument`], and
//! [`identity::IdentityProvider`] traits.

pub mod bootstrap;
pub mod config;
pub mod document;
pub mod identity;
pub mod protocol;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use bootstrap::{BootstrapClient, BootstrapPhase};
pub use config::BootstrapConfig;
pub use document::SharedDocument;
pub use identity::IdentityProvider;
pub use protocol::codec::{ClientMessage, CodecError, LockToken, MessageKind, RelayMessage};
pub use protocol::pending::{Reply, RequestError, SingleFlight};
pub use transport::{ConnectionStatus, GatedSender, Transport};
