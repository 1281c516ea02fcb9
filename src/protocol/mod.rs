//! Bootstrap control protocol.
//!
//! The pieces below the orchestrator:
//! - Wire codec for the four varint-tagged control messages
//! - Single-flight slots so each request kind has at most one in-flight
//!   instance, with late replies ignored
//!
//! The orchestration itself lives in [`crate::bootstrap`].

pub mod codec;
pub mod pending;

pub use codec::{ClientMessage, CodecError, LockToken, MessageKind, RelayMessage};
pub use pending::{Reply, RequestError, SingleFlight};
