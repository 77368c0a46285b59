use axum::extract::{Path, State};
use axum::Json;
use deadpool_sqlite::Pool;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, AppResult, LoggedJson};
use crate::report::cache::ReportCache;
use crate::report::status::{TaskPriority, TaskStatus};
use crate::storage::queries::{self, NewTask};

/// Pool plus the report cache that every write must clear.
pub struct TrackerState {
    pub pool: Pool,
    pub cache: Arc<ReportCache>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub owner_phid: Option<String>,
    /// Defaults to Needs Triage.
    pub priority: Option<i64>,
    #[serde(default)]
    pub project_phids: Vec<String>,
    /// Backfill time for imported tasks; defaults to now.
    pub date_created: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatus {
    pub status: TaskStatus,
    /// Backfill time for imported history; defaults to now.
    pub at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TaskCreated {
    pub id: i64,
    pub phid: String,
    pub status: TaskStatus,
    pub priority: i64,
    pub priority_label: &'static str,
    pub date_created: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusChanged {
    pub id: i64,
    pub old_status: TaskStatus,
    pub status: TaskStatus,
}

fn check_timestamp(ts: i64) -> AppResult<i64> {
    if ts < 0 || chrono::DateTime::from_timestamp(ts, 0).is_none() {
        return Err(AppError::Validation(format!("timestamp {ts} is out of range")));
    }
    Ok(ts)
}

/// POST /v1/tasks - Create a task in the open status.
pub async fn create_task(
    State(state): State<Arc<TrackerState>>,
    LoggedJson(input): LoggedJson<CreateTask>,
) -> AppResult<Json<TaskCreated>> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    let priority = input.priority.unwrap_or(TaskPriority::Triage.value());
    let Some(priority_level) = TaskPriority::from_value(priority) else {
        return Err(AppError::Validation(format!(
            "priority {priority} is not one of {:?}",
            TaskPriority::ALL.map(TaskPriority::value)
        )));
    };
    let created_at = match input.date_created {
        Some(ts) => check_timestamp(ts)?,
        None => chrono::Utc::now().timestamp(),
    };

    let phid = format!("PHID-TASK-{}", uuid::Uuid::new_v4().simple());
    let conn = state
        .pool
        .get()
        .await
        .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;

    let task_phid = phid.clone();
    let owner = input.owner_phid.filter(|o| !o.is_empty());
    let projects = input.project_phids;
    let id = conn
        .interact(move |conn| -> rusqlite::Result<Result<i64, Vec<String>>> {
            let unknown = queries::unknown_handles(conn, owner.as_deref(), &projects)?;
            if !unknown.is_empty() {
                return Ok(Err(unknown));
            }
            queries::insert_task(
                conn,
                &NewTask {
                    phid: &task_phid,
                    title: &title,
                    owner_phid: owner.as_deref(),
                    priority,
                    project_phids: &projects,
                    created_at,
                },
            )
            .map(Ok)
        })
        .await??
        .map_err(|unknown| {
            AppError::Validation(format!("unknown owner or project: {}", unknown.join(", ")))
        })?;

    state.cache.invalidate();
    tracing::info!(task_id = id, phid = %phid, priority, "task created");

    Ok(Json(TaskCreated {
        id,
        phid,
        status: TaskStatus::Open,
        priority,
        priority_label: priority_level.label(),
        date_created: created_at,
    }))
}

/// POST /v1/tasks/{id}/status - Move a task to a new status.
pub async fn change_status(
    State(state): State<Arc<TrackerState>>,
    Path(id): Path<i64>,
    LoggedJson(input): LoggedJson<ChangeStatus>,
) -> AppResult<Json<StatusChanged>> {
    let at = match input.at {
        Some(ts) => check_timestamp(ts)?,
        None => chrono::Utc::now().timestamp(),
    };
    let status = input.status;

    let conn = state
        .pool
        .get()
        .await
        .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;

    let previous = conn
        .interact(move |conn| queries::change_task_status(conn, id, status, at))
        .await??
        .ok_or_else(|| AppError::NotFound(format!("task {id}")))?;

    let old_status = TaskStatus::from_code(previous)
        .ok_or_else(|| AppError::Internal(format!("task {id} has unknown status {previous}")))?;

    if old_status != status {
        state.cache.invalidate();
        tracing::info!(
            task_id = id,
            from = old_status.name(),
            to = status.name(),
            "task status changed"
        );
    }

    Ok(Json(StatusChanged {
        id,
        old_status,
        status,
    }))
}
