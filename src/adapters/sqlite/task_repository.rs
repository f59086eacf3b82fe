//! SQLite implementation of `TaskRepository` (spec §6 persistence boundary).
//!
//! Grounded on the teacher's `SqliteTaskRepository` (row struct +
//! `sqlx::query_as` pattern, RFC3339 timestamp columns, JSON-serialized
//! nested fields), narrowed to the kernel's flatter `Task` model.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::KernelResult;
use crate::domain::models::task::{Task, TaskState, TaskType};
use crate::domain::ports::{TaskFilter, TaskRepository};

use super::{parse_datetime, parse_optional_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    execution_id: String,
    title: String,
    description: String,
    task_type: String,
    target: String,
    priority: i64,
    principal: String,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    state: String,
    assigned_agents: String,
    workflow_graph_id: Option<String>,
    result: Option<String>,
    quality_score: Option<f64>,
    duration_ms: Option<i64>,
    cost_usd: Option<f64>,
    deadline: Option<String>,
    parameters: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = crate::domain::errors::KernelError;

    fn try_from(row: TaskRow) -> KernelResult<Self> {
        Ok(Task {
            id: parse_uuid(&row.id)?,
            execution_id: parse_uuid(&row.execution_id)?,
            title: row.title,
            description: row.description,
            task_type: TaskType::new(row.task_type),
            target: row.target,
            priority: row.priority as u8,
            principal: row.principal,
            created_at: parse_datetime(&row.created_at)?,
            started_at: parse_optional_datetime(row.started_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
            state: state_from_str(&row.state),
            assigned_agents: serde_json::from_str(&row.assigned_agents)?,
            workflow_graph_id: row.workflow_graph_id.map(|s| parse_uuid(&s)).transpose()?,
            result: row.result.map(|s| serde_json::from_str(&s)).transpose()?,
            quality_score: row.quality_score,
            duration_ms: row.duration_ms.map(|d| d as u64),
            cost_usd: row.cost_usd,
            deadline: parse_optional_datetime(row.deadline)?,
            parameters: serde_json::from_str(&row.parameters)?,
        })
    }
}

fn state_from_str(s: &str) -> TaskState {
    match s {
        "planning" => TaskState::Planning,
        "running" => TaskState::Running,
        "completed" => TaskState::Completed,
        "failed" => TaskState::Failed,
        "cancelled" => TaskState::Cancelled,
        _ => TaskState::Pending,
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> KernelResult<()> {
        let assigned_agents_json = serde_json::to_string(&task.assigned_agents)?;
        let result_json = task.result.as_ref().map(serde_json::to_string).transpose()?;
        let parameters_json = serde_json::to_string(&task.parameters)?;

        sqlx::query(
            r#"INSERT INTO tasks (id, execution_id, title, description, task_type, target,
               priority, principal, created_at, started_at, completed_at, state,
               assigned_agents, workflow_graph_id, result, quality_score, duration_ms,
               cost_usd, deadline, parameters)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.execution_id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.task_type.0)
        .bind(&task.target)
        .bind(task.priority as i64)
        .bind(&task.principal)
        .bind(task.created_at.to_rfc3339())
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(task.state.as_str())
        .bind(&assigned_agents_json)
        .bind(task.workflow_graph_id.map(|id| id.to_string()))
        .bind(&result_json)
        .bind(task.quality_score)
        .bind(task.duration_ms.map(|d| d as i64))
        .bind(task.cost_usd)
        .bind(task.deadline.map(|t| t.to_rfc3339()))
        .bind(&parameters_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> KernelResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Task::try_from).transpose()
    }

    async fn update(&self, task: &Task) -> KernelResult<()> {
        let assigned_agents_json = serde_json::to_string(&task.assigned_agents)?;
        let result_json = task.result.as_ref().map(serde_json::to_string).transpose()?;
        let parameters_json = serde_json::to_string(&task.parameters)?;

        sqlx::query(
            r#"UPDATE tasks SET title = ?, description = ?, task_type = ?, target = ?,
               priority = ?, principal = ?, started_at = ?, completed_at = ?, state = ?,
               assigned_agents = ?, workflow_graph_id = ?, result = ?, quality_score = ?,
               duration_ms = ?, cost_usd = ?, deadline = ?, parameters = ?
               WHERE id = ?"#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.task_type.0)
        .bind(&task.target)
        .bind(task.priority as i64)
        .bind(&task.principal)
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(task.state.as_str())
        .bind(&assigned_agents_json)
        .bind(task.workflow_graph_id.map(|id| id.to_string()))
        .bind(&result_json)
        .bind(task.quality_score)
        .bind(task.duration_ms.map(|d| d as i64))
        .bind(task.cost_usd)
        .bind(task.deadline.map(|t| t.to_rfc3339()))
        .bind(&parameters_json)
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> KernelResult<Vec<Task>> {
        let rows: Vec<TaskRow> = match (&filter.state, &filter.principal) {
            (Some(state), Some(principal)) => {
                sqlx::query_as("SELECT * FROM tasks WHERE state = ? AND principal = ? ORDER BY created_at DESC")
                    .bind(state.as_str())
                    .bind(principal)
                    .fetch_all(&self.pool)
                    .await?
            }
            (Some(state), None) => {
                sqlx::query_as("SELECT * FROM tasks WHERE state = ? ORDER BY created_at DESC")
                    .bind(state.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, Some(principal)) => {
                sqlx::query_as("SELECT * FROM tasks WHERE principal = ? ORDER BY created_at DESC")
                    .bind(principal)
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, None) => {
                sqlx::query_as("SELECT * FROM tasks ORDER BY created_at DESC").fetch_all(&self.pool).await?
            }
        };

        rows.into_iter().map(Task::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn repo() -> SqliteTaskRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteTaskRepository::new(pool)
    }

    #[tokio::test]
    async fn round_trips_a_task() {
        let repo = repo().await;
        let task = Task::new("title", "desc", TaskType::new("code_analysis"), "repo/foo", 5, "alice");
        repo.create(&task).await.unwrap();

        let fetched = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "title");
        assert_eq!(fetched.state, TaskState::Pending);
        assert_eq!(fetched.priority, 5);
    }

    #[tokio::test]
    async fn update_persists_state_transition() {
        let repo = repo().await;
        let mut task = Task::new("title", "desc", TaskType::new("code_analysis"), "repo/foo", 5, "alice");
        repo.create(&task).await.unwrap();

        task.transition(TaskState::Planning).unwrap();
        repo.update(&task).await.unwrap();

        let fetched = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.state, TaskState::Planning);
    }

    #[tokio::test]
    async fn list_filters_by_state() {
        let repo = repo().await;
        let mut running = Task::new("a", "d", TaskType::new("x"), "y", 5, "alice");
        running.transition(TaskState::Planning).unwrap();
        repo.create(&running).await.unwrap();
        repo.create(&Task::new("b", "d", TaskType::new("x"), "y", 5, "alice")).await.unwrap();

        let planning = repo.list(TaskFilter { state: Some(TaskState::Planning), principal: None }).await.unwrap();
        assert_eq!(planning.len(), 1);
        assert_eq!(planning[0].id, running.id);
    }
}
