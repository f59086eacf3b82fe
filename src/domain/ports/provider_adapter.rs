//! Provider adapter port (spec §4.1, §6 "Provider adapter interface").
//!
//! Grounded on the teacher's `domain::ports::substrate::{Substrate,
//! SubstrateFactory}`, narrowed from a session-oriented CLI substrate to a
//! stateless single-call adapter: "each provider has a pure async callable
//! taking the normalized request and returning normalized response or a
//! typed error; adapters are the only place aware of the provider's wire
//! format" (spec §4.1).

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::AttemptOutcome;

/// A normalized model-inference request, independent of any provider's
/// wire format.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub capability_hint: Option<String>,
    pub per_call_timeout: Duration,
}

/// A normalized, validated model response.
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Typed adapter-level errors (spec §6 "Typed errors").
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderAdapterError {
    #[error("authentication rejected")]
    Auth,
    #[error("rate limited, retry after {retry_after:?}")]
    Rate { retry_after: Duration },
    #[error("quota exhausted")]
    Quota,
    #[error("server error: {0}")]
    Server(String),
    #[error("timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderAdapterError {
    pub fn as_attempt_outcome(&self) -> AttemptOutcome {
        match self {
            Self::Auth => AttemptOutcome::Auth,
            Self::Rate { retry_after } => AttemptOutcome::Rate { retry_after_secs: retry_after.as_secs() },
            Self::Quota => AttemptOutcome::Quota,
            Self::Server(_) => AttemptOutcome::Server,
            Self::Timeout => AttemptOutcome::Timeout,
            Self::Network(_) => AttemptOutcome::Network,
            Self::MalformedResponse(_) => AttemptOutcome::MalformedResponse,
        }
    }
}

/// The per-provider adapter contract. Implementations are the only code
/// aware of a given provider's wire format; the router never inspects it.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn invoke(
        &self,
        request: &NormalizedRequest,
        deadline: Duration,
    ) -> Result<NormalizedResponse, ProviderAdapterError>;
}

/// Factory for constructing provider adapters by provider id, mirroring the
/// teacher's `SubstrateFactory`.
pub trait ProviderAdapterFactory: Send + Sync {
    fn create(&self, provider_id: &str) -> Option<std::sync::Arc<dyn ProviderAdapter>>;
    fn available_provider_ids(&self) -> Vec<String>;
}
