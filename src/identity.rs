//! Best-effort user identity attachment.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::SharedDocument;

/// Source of the local user's display name.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn display_name(&self) -> anyhow::Result<String>;
}

/// Fetch the display name and attach it to the document's awareness
/// state. Fire-and-forget: a failed fetch is logged and swallowed;
/// presence metadata must never block protocol operation.
pub(crate) fn attach_display_name(
    provider: Arc<dyn IdentityProvider>,
    document: Arc<dyn SharedDocument>,
) {
    tokio::spawn(async move {
        match provider.display_name().await {
            Ok(name) => {
                tracing::debug!(name = %name, "attaching display name to awareness");
                document.set_awareness_field("user", &name);
            }
            Err(e) => {
                tracing::warn!(error = %e, "display name fetch failed, continuing anonymous");
            }
        }
    });
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDocument, MockIdentity};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn name_lands_in_awareness() {
        let document = MockDocument::empty();
        attach_display_name(
            MockIdentity::named("ada"),
            document.clone() as Arc<dyn SharedDocument>,
        );
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(
            document.awareness(),
            vec![("user".to_string(), "ada".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_is_swallowed() {
        let document = MockDocument::empty();
        attach_display_name(
            MockIdentity::failing(),
            document.clone() as Arc<dyn SharedDocument>,
        );
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(document.awareness().is_empty());
    }
}
