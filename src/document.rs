//! Replicated-document seam.
//!
//! The CRDT document is an external collaborator: this crate never
//! inspects snapshot or update bytes, it only moves them between the
//! document and the relay.

/// The local replica of the shared document.
///
/// Merge is commutative and idempotent, which is what makes it safe to
/// apply a relay snapshot even when it arrives after the bootstrap
/// decision was already taken.
pub trait SharedDocument: Send + Sync {
    /// Encode the full local state as an opaque snapshot blob.
    fn encode_full_state(&self) -> Vec<u8>;

    /// Merge a remote update into the local replica.
    fn apply_update(&self, update: &[u8]) -> anyhow::Result<()>;

    /// Presence metadata side-channel. Used here only to attach the
    /// user's display name; everything else about awareness is out of
    /// scope.
    fn set_awareness_field(&self, key: &str, value: &str);
}
