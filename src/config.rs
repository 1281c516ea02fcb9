//! Protocol timing knobs.

use std::time::Duration;

use serde::Deserialize;

fn default_lock_retry_ms() -> u64 {
    500
}

fn default_content_timeout_ms() -> u64 {
    1000
}

/// Tunable intervals for the bootstrap protocol. The defaults are the
/// wire-tested values; override them only against a relay configured to
/// match.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BootstrapConfig {
    /// ACQUIRE retransmit interval while a lock request is unresolved
    /// and the transport is connected.
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_interval_ms: u64,

    /// How long to wait for a CONTENT_QUERY reply before assuming the
    /// document is unseeded. Bounded so a missing reply cannot hang the
    /// caller's UI.
    #[serde(default = "default_content_timeout_ms")]
    pub content_reply_timeout_ms: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            lock_retry_interval_ms: default_lock_retry_ms(),
            content_reply_timeout_ms: default_content_timeout_ms(),
        }
    }
}

impl BootstrapConfig {
    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_interval_ms)
    }

    pub fn content_reply_timeout(&self) -> Duration {
        Duration::from_millis(self.content_reply_timeout_ms)
    }

    /// Parse from a TOML fragment; absent keys take their defaults.
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

// ── Tests ───────────────────────────────────────────────────────
