//! Mock provider adapter for demo wiring and tests (spec §4.1 "adapters are
//! the only place aware of the provider's wire format" — a real HTTP
//! adapter for a given provider slots in behind the same
//! `ProviderAdapter` trait without the router changing).
//!
//! Grounded on the teacher's `adapters::substrates::mock::MockSubstrate`
//! (configurable canned response, per-call override map).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ports::provider_adapter::{
    NormalizedRequest, NormalizedResponse, ProviderAdapter, ProviderAdapterError, ProviderAdapterFactory,
};

/// A canned outcome for `MockProviderAdapter::invoke`.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Respond { content: String, input_tokens: u64, output_tokens: u64 },
    Fail(MockFailure),
}

#[derive(Debug, Clone)]
pub enum MockFailure {
    Auth,
    Rate(Duration),
    Quota,
    Server(String),
    Timeout,
    Network(String),
}

impl From<MockFailure> for ProviderAdapterError {
    fn from(f: MockFailure) -> Self {
        match f {
            MockFailure::Auth => ProviderAdapterError::Auth,
            MockFailure::Rate(retry_after) => ProviderAdapterError::Rate { retry_after },
            MockFailure::Quota => ProviderAdapterError::Quota,
            MockFailure::Server(msg) => ProviderAdapterError::Server(msg),
            MockFailure::Timeout => ProviderAdapterError::Timeout,
            MockFailure::Network(msg) => ProviderAdapterError::Network(msg),
        }
    }
}

impl Default for MockOutcome {
    fn default() -> Self {
        MockOutcome::Respond {
            content: "mock response content, non-empty and not a refusal".to_string(),
            input_tokens: 100,
            output_tokens: 50,
        }
    }
}

/// A single provider's mock adapter. Holds a default outcome plus a queue
/// of one-shot overrides consumed in order, so tests can script a
/// fail-then-succeed fallback sequence.
pub struct MockProviderAdapter {
    provider_id: String,
    default_outcome: RwLock<MockOutcome>,
    queued_outcomes: RwLock<Vec<MockOutcome>>,
}

impl MockProviderAdapter {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            default_outcome: RwLock::new(MockOutcome::default()),
            queued_outcomes: RwLock::new(Vec::new()),
        }
    }

    pub fn with_default_outcome(provider_id: impl Into<String>, outcome: MockOutcome) -> Self {
        Self { provider_id: provider_id.into(), default_outcome: RwLock::new(outcome), queued_outcomes: RwLock::new(Vec::new()) }
    }

    /// Queue outcomes to be returned in order before falling back to the
    /// default outcome, oldest first.
    pub async fn queue(&self, outcome: MockOutcome) {
        self.queued_outcomes.write().await.push(outcome);
    }

    async fn next_outcome(&self) -> MockOutcome {
        let mut queued = self.queued_outcomes.write().await;
        if !queued.is_empty() {
            return queued.remove(0);
        }
        self.default_outcome.read().await.clone()
    }
}

#[async_trait]
impl ProviderAdapter for MockProviderAdapter {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn invoke(
        &self,
        _request: &NormalizedRequest,
        _deadline: Duration,
    ) -> Result<NormalizedResponse, ProviderAdapterError> {
        match self.next_outcome().await {
            MockOutcome::Respond { content, input_tokens, output_tokens } => {
                Ok(NormalizedResponse { content, input_tokens, output_tokens })
            }
            MockOutcome::Fail(failure) => Err(failure.into()),
        }
    }
}

/// Factory over a fixed set of named `MockProviderAdapter`s, the demo-mode
/// counterpart to the teacher's `SubstrateRegistry`.
pub struct MockProviderAdapterFactory {
    adapters: HashMap<String, Arc<MockProviderAdapter>>,
}

impl MockProviderAdapterFactory {
    pub fn new(adapters: Vec<Arc<MockProviderAdapter>>) -> Self {
        Self { adapters: adapters.into_iter().map(|a| (a.provider_id.clone(), a)).collect() }
    }

    pub fn adapter(&self, provider_id: &str) -> Option<Arc<MockProviderAdapter>> {
        self.adapters.get(provider_id).cloned()
    }
}

impl ProviderAdapterFactory for MockProviderAdapterFactory {
    fn create(&self, provider_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider_id).map(|a| a.clone() as Arc<dyn ProviderAdapter>)
    }

    fn available_provider_ids(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_outcome_returns_nonempty_response() {
        let adapter = MockProviderAdapter::new("p1");
        let request = NormalizedRequest {
            prompt: "hi".to_string(),
            system_prompt: None,
            max_tokens: 100,
            temperature: 0.0,
            capability_hint: None,
            per_call_timeout: Duration::from_secs(1),
        };
        let response = adapter.invoke(&request, Duration::from_secs(1)).await.unwrap();
        assert!(!response.content.is_empty());
    }

    #[tokio::test]
    async fn queued_outcome_consumed_before_default() {
        let adapter = MockProviderAdapter::new("p1");
        adapter.queue(MockOutcome::Fail(MockFailure::Server("boom".to_string()))).await;

        let request = NormalizedRequest {
            prompt: "hi".to_string(),
            system_prompt: None,
            max_tokens: 100,
            temperature: 0.0,
            capability_hint: None,
            per_call_timeout: Duration::from_secs(1),
        };
        assert!(adapter.invoke(&request, Duration::from_secs(1)).await.is_err());
        assert!(adapter.invoke(&request, Duration::from_secs(1)).await.is_ok());
    }

    #[test]
    fn factory_resolves_by_provider_id() {
        let factory = MockProviderAdapterFactory::new(vec![Arc::new(MockProviderAdapter::new("p1"))]);
        assert!(factory.create("p1").is_some());
        assert!(factory.create("ghost").is_none());
    }
}
