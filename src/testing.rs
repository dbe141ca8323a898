//! Test infrastructure: a scripted mock generation backend.
//!
//! `MockProvider` returns queued responses in FIFO order and records every
//! call, so tests can assert both on pipeline output and on exactly how
//! many backend calls were made.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::traits::{ModelProvider, ProviderResponse};

/// One scripted backend turn.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    TransportError,
}

/// A recorded call to `MockProvider::chat()`.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub messages: Vec<Value>,
    pub system: String,
    pub model: String,
}

pub struct MockProvider {
    script: Mutex<Vec<Scripted>>,
    calls: Mutex<Vec<MockCall>>,
    fail_always: bool,
}

impl MockProvider {
    /// A provider that always answers "Mock response".
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail_always: false,
        }
    }

    /// A provider with a FIFO queue of reply bodies. Once the queue is
    /// drained it answers "Mock response".
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self::with_script(responses.into_iter().map(Scripted::Reply).collect())
    }

    /// A provider with a FIFO queue mixing replies and transport errors.
    pub fn with_script(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
            fail_always: false,
        }
    }

    /// A provider whose every call fails at the transport layer.
    pub fn failing() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail_always: true,
        }
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn chat(
        &self,
        messages: &[Value],
        system: &str,
        model: &str,
    ) -> anyhow::Result<ProviderResponse> {
        self.calls.lock().await.push(MockCall {
            messages: messages.to_vec(),
            system: system.to_string(),
            model: model.to_string(),
        });

        if self.fail_always {
            anyhow::bail!("mock transport failure");
        }

        let mut script = self.script.lock().await;
        if script.is_empty() {
            return Ok(ProviderResponse {
                content: "Mock response".to_string(),
            });
        }
        match script.remove(0) {
            Scripted::Reply(content) => Ok(ProviderResponse { content }),
            Scripted::TransportError => anyhow::bail!("mock transport failure"),
        }
    }
}
