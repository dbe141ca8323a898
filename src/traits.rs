//! Trait seams between the coaching core and its collaborators.

use async_trait::async_trait;
use serde_json::Value;

/// Generation backend, sends a message window plus a system instruction to
/// the model and gets text back. Model identity is an opaque string; only
/// the returned content is interpreted.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn chat(
        &self,
        messages: &[Value],
        system: &str,
        model: &str,
    ) -> anyhow::Result<ProviderResponse>;
}

/// The backend's reply. Structured-output callers parse `content`
/// themselves and must tolerate malformed bodies.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub content: String,
}
