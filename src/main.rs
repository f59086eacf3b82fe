//! Demo binary: wires an `Orchestrator` against mock providers and
//! in-memory/SQLite collaborators, submits one task, and prints the
//! outcome. Exercises the C1-C13 pipeline end to end without requiring
//! real provider credentials.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use amas_kernel::domain::models::agent_contract::{
    AgentContract, AgentContractRegistry, ExecutionConstraints, QualityGates,
};
use amas_kernel::domain::models::config::ProviderConfigEntry;
use amas_kernel::domain::models::provider::ProviderRecord;
use amas_kernel::domain::models::task::{Task, TaskType};
use amas_kernel::domain::models::tool::{RatePolicy as ToolRatePolicy, RiskLevel, ToolCostModel, ToolDefinition, ToolRegistry};
use amas_kernel::infrastructure::config::ConfigLoader;
use amas_kernel::infrastructure::logging::{LogConfig, LogFormat, LoggerImpl, RotationPolicy};
use amas_kernel::{Orchestrator, OrchestratorConfig};

use amas_kernel::adapters::embedding_deterministic::DeterministicEmbeddingProvider;
use amas_kernel::adapters::provider_mock::{MockOutcome, MockProviderAdapter, MockProviderAdapterFactory};
use amas_kernel::adapters::sqlite::{initialize_default_database, SqliteApprovalRepository, SqliteExecutionRecordRepository, SqliteTaskRepository};
use amas_kernel::adapters::MockToolExecutor;
use amas_kernel::services::cache::{CacheConfig, ResponseCache};
use amas_kernel::services::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerService};
use amas_kernel::services::contract_validator::ContractValidator;
use amas_kernel::services::cost_tracker::{BudgetConfig, CostTracker};
use amas_kernel::services::dedup::Deduplicator;
use amas_kernel::services::event_bus::EventBus;
use amas_kernel::services::learning_loop::LearningLoop;
use amas_kernel::services::observability::MetricsRegistry;
use amas_kernel::services::provider_router::{ProviderRouter, ProviderRouterConfig};
use amas_kernel::services::rate_limiter::{InMemoryRateLimiter, RateLimiter};
use amas_kernel::services::selection_engine::{ScoringWeights, SelectionEngine};
use amas_kernel::services::tool_guard::ToolGuard;
use amas_kernel::services::workflow_executor::WorkflowExecutorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = LogConfig {
        level: "info".to_string(),
        format: LogFormat::Pretty,
        log_dir: None,
        enable_stdout: true,
        rotation: RotationPolicy::Never,
        retention_days: 30,
    };
    let _logger = LoggerImpl::init(&log_config)?;

    let mut config = ConfigLoader::load().unwrap_or_default();
    if config.providers.is_empty() {
        for (priority, id) in default_provider_roster().into_iter().enumerate() {
            config.providers.insert(
                id.to_string(),
                ProviderConfigEntry {
                    priority: (priority + 1) as u32,
                    timeout_secs: 30,
                    max_retries: 2,
                    rate_limit_per_minute: 60,
                    enabled: true,
                    capabilities: vec!["general".to_string()],
                    cost_in: 0.000_003,
                    cost_out: 0.000_015,
                    validation: Default::default(),
                },
            );
        }
    }
    ConfigLoader::validate(&config)?;

    let pool = initialize_default_database().await?;
    let task_repository = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let execution_records = Arc::new(SqliteExecutionRecordRepository::new(pool.clone()));
    let approvals = Arc::new(SqliteApprovalRepository::new(pool.clone()));

    let contract = AgentContract {
        agent_id: "demo-agent".to_string(),
        role_tag: "general".to_string(),
        input_schema: serde_json::json!({"type": "object"}),
        output_schema: serde_json::json!({"type": "object"}),
        allowed_capabilities: HashSet::from(["general".to_string(), "file_write".to_string()]),
        constraints: ExecutionConstraints::default(),
        quality_gates: QualityGates::default(),
        rate_policy: HashMap::new(),
    };
    let contracts = Arc::new(AgentContractRegistry::new(vec![contract]));
    let validator = Arc::new(ContractValidator::new(&contracts)?);
    let learning_loop = Arc::new(LearningLoop::new(execution_records.clone()));
    let selection_engine = Arc::new(SelectionEngine::new(contracts.clone(), learning_loop.clone(), ScoringWeights::default()));

    let providers: Vec<ProviderRecord> = config
        .providers
        .iter()
        .filter(|(_, entry)| entry.enabled)
        .map(|(id, entry)| ProviderRecord {
            provider_id: id.clone(),
            tier: 1,
            priority: entry.priority,
            model_id: format!("{id}-model"),
            endpoint_template: String::new(),
            auth_ref: format!("{id}-auth"),
            capability_tags: entry.capabilities.iter().cloned().collect(),
            cost_per_input_token_usd: entry.cost_in,
            cost_per_output_token_usd: entry.cost_out,
            absolute_timeout: std::time::Duration::from_secs(entry.timeout_secs),
            max_retries: entry.max_retries,
            enabled: entry.enabled,
        })
        .collect();

    let mock_adapters: Vec<_> = providers
        .iter()
        .map(|p| {
            Arc::new(MockProviderAdapter::with_default_outcome(
                p.provider_id.clone(),
                MockOutcome::Respond { content: "demo response".to_string(), input_tokens: 42, output_tokens: 17 },
            ))
        })
        .collect();
    let factory = Arc::new(MockProviderAdapterFactory::new(mock_adapters));
    let breaker = Arc::new(CircuitBreakerService::new(CircuitBreakerConfig::default()));
    let metrics = Arc::new(MetricsRegistry::new());
    let provider_router = Arc::new(ProviderRouter::new(providers, factory, breaker, ProviderRouterConfig::default(), metrics.clone()));

    let cache = Arc::new(ResponseCache::new(CacheConfig::default(), None));
    let dedup = Arc::new(Deduplicator::new());
    let cost_tracker = Arc::new(CostTracker::new(BudgetConfig { daily_cap_usd: config.budget.daily_budget_usd, priority_override_threshold: config.budget.priority_override_threshold }));
    let event_bus = Arc::new(EventBus::default());
    let embedder = Arc::new(DeterministicEmbeddingProvider::new());

    let tools = Arc::new(ToolRegistry::new(vec![ToolDefinition {
        name: "file_write".to_string(),
        capability: "file_write".to_string(),
        risk_level: RiskLevel::High,
        requires_approval: true,
        parameter_schema: serde_json::json!({"type": "object"}),
        forbidden_parameters: HashSet::from(["system_path".to_string()]),
        allowed_path_prefixes: vec!["/workspace".to_string()],
        rate_policy: ToolRatePolicy { limit: 10, window_secs: 60 },
        cost_model: ToolCostModel::default(),
    }]));
    let rate_limiter = Arc::new(RateLimiter::InMemory(InMemoryRateLimiter::new()));
    let tool_guard = Arc::new(ToolGuard::new(tools, contracts.clone(), rate_limiter, approvals, chrono::Duration::minutes(10)));
    let tool_executor = Arc::new(MockToolExecutor::new());

    let orchestrator = Orchestrator::new(
        OrchestratorConfig::default(),
        task_repository,
        execution_records,
        contracts,
        validator,
        selection_engine,
        provider_router,
        cache,
        dedup,
        cost_tracker,
        learning_loop,
        event_bus,
        tool_guard,
        tool_executor,
        metrics,
        embedder,
        WorkflowExecutorConfig::default(),
    );

    let task = Task::new("demo task", "submitted by the demo binary", TaskType::new("general"), "demo-target", 5, "demo-principal");

    let outcome = orchestrator.submit(task).await?;
    println!("task {} finished in state {:?}", outcome.task.id, outcome.task.state);
    if let Some(result) = &outcome.task.result {
        println!("result: {result}");
    }

    Ok(())
}

/// Fallback provider ids used when no project/local YAML config supplies a
/// provider map. Matches the fallback-chain width described for the
/// provider registry: 16 pre-integrated external inference services, here
/// all backed by the same `MockProviderAdapter`.
fn default_provider_roster() -> [&'static str; 16] {
    [
        "deepseek", "cerebras", "openai", "anthropic", "mistral", "groq", "together", "fireworks",
        "perplexity", "cohere", "google", "azure-openai", "bedrock", "replicate", "openrouter",
        "local-vllm",
    ]
}
