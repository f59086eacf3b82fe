//! Kernel-wide error taxonomy.
//!
//! Every component boundary in the kernel surfaces one of these variants.
//! Transient provider failures are absorbed inside the router/breaker and
//! never reach this type; see `services::provider_router`.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// A single attempt against one provider, recorded for the attempt log
/// surfaced on `NoProviderAvailable` and on successful fallback.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProviderAttempt {
    pub provider_id: String,
    pub outcome: AttemptOutcome,
    pub duration_ms: u64,
}

/// Outcome of a single provider attempt.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Ok,
    Auth,
    Rate { retry_after_secs: u64 },
    Quota,
    Server,
    Timeout,
    Network,
    MalformedResponse,
    BreakerOpen,
    Skipped { reason: String },
}

/// Kernel-level error taxonomy (spec §7).
#[derive(Debug, Clone, Error)]
pub enum KernelError {
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("approval pending: {approval_id}")]
    PendingApproval { approval_id: Uuid },

    #[error("approval {approval_id} expired before a decision was made")]
    ApprovalExpired { approval_id: Uuid },

    #[error("no provider available after {} attempts", attempts.len())]
    NoProviderAvailable { attempts: Vec<ProviderAttempt> },

    #[error("transient provider error: {0}")]
    ProviderTransient(String),

    #[error("daily budget exceeded: spent {spent_usd:.4} of {budget_usd:.4}")]
    BudgetExceeded { spent_usd: f64, budget_usd: f64 },

    #[error("admission refused: {0}")]
    Overloaded(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Whether this error is safe to surface verbatim to a caller, i.e.
    /// carries no secrets. All current variants are redacted at
    /// construction time (attempt logs never carry auth material), so this
    /// is always true, but kept as an explicit seam for future variants.
    pub fn is_caller_safe(&self) -> bool {
        true
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContractViolation(_) => "ContractViolation",
            Self::UnknownTool(_) => "UnknownTool",
            Self::RateLimited { .. } => "RateLimited",
            Self::PendingApproval { .. } => "PendingApproval",
            Self::ApprovalExpired { .. } => "ApprovalExpired",
            Self::NoProviderAvailable { .. } => "NoProviderAvailable",
            Self::ProviderTransient(_) => "ProviderTransient",
            Self::BudgetExceeded { .. } => "BudgetExceeded",
            Self::Overloaded(_) => "Overloaded",
            Self::Cancelled => "Cancelled",
            Self::InternalInvariant(_) => "InternalInvariant",
            Self::TaskNotFound(_) => "TaskNotFound",
            Self::AgentNotFound(_) => "AgentNotFound",
            Self::InvalidStateTransition { .. } => "InvalidStateTransition",
            Self::DatabaseError(_) => "DatabaseError",
            Self::SerializationError(_) => "SerializationError",
        }
    }
}

impl From<sqlx::Error> for KernelError {
    fn from(err: sqlx::Error) -> Self {
        KernelError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(err: serde_json::Error) -> Self {
        KernelError::SerializationError(err.to_string())
    }
}
