mod anthropic;
mod error;

use std::time::Duration;

use reqwest::Client;

pub use anthropic::AnthropicProvider;
pub use error::{ProviderError, ProviderErrorKind};

/// Build the shared HTTP client. Proxy discovery is skipped in tests and
/// constrained runtimes where it is known to misbehave.
pub(crate) fn build_http_client(timeout: Duration) -> anyhow::Result<Client> {
    let disable_proxy = cfg!(test)
        || matches!(
            std::env::var("COACHD_DISABLE_PROXY").as_deref(),
            Ok("1") | Ok("true") | Ok("TRUE")
        );

    let mut builder = Client::builder().timeout(timeout);
    if disable_proxy {
        builder = builder.no_proxy();
    }
    builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))
}
