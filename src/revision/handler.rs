use axum::extract::{Path, State};
use axum::Json;
use deadpool_sqlite::Pool;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::status_field::{status_field, RevisionStatus, SourceControl, StatusField};
use crate::error::{AppError, AppResult, LoggedJson};

#[derive(Debug, Deserialize)]
pub struct CreateRevision {
    pub title: String,
    #[serde(default = "default_status")]
    pub status: RevisionStatus,
    pub vcs: Option<SourceControl>,
}

fn default_status() -> RevisionStatus {
    RevisionStatus::NeedsReview
}

#[derive(Debug, Serialize)]
pub struct Revision {
    pub id: i64,
    pub title: String,
    pub status: RevisionStatus,
    pub vcs: Option<SourceControl>,
}

/// POST /v1/revisions
pub async fn create_revision(
    State(pool): State<Arc<Pool>>,
    LoggedJson(input): LoggedJson<CreateRevision>,
) -> AppResult<Json<Revision>> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    let (status, vcs) = (input.status, input.vcs);
    let now = chrono::Utc::now().timestamp();

    let conn = pool
        .get()
        .await
        .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;

    let t = title.clone();
    let id = conn
        .interact(move |conn| {
            conn.execute(
                "INSERT INTO revisions (title, status, vcs, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![t, status.code(), vcs.map(SourceControl::as_str), now],
            )?;
            Ok::<_, rusqlite::Error>(conn.last_insert_rowid())
        })
        .await??;

    tracing::info!(revision_id = id, status = status.name(), "revision created");
    Ok(Json(Revision {
        id,
        title,
        status,
        vcs,
    }))
}

/// GET /v1/revisions/{id}/fields/status
pub async fn get_status_field(
    State(pool): State<Arc<Pool>>,
    Path(id): Path<i64>,
) -> AppResult<Json<StatusField>> {
    let conn = pool
        .get()
        .await
        .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;

    let row: Option<(i64, Option<String>)> = conn
        .interact(move |conn| {
            conn.query_row(
                "SELECT status, vcs FROM revisions WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
        .await??;

    let (code, vcs) = row.ok_or_else(|| AppError::NotFound(format!("revision D{id}")))?;
    let status = RevisionStatus::from_code(code)
        .ok_or_else(|| AppError::Internal(format!("revision D{id} has unknown status {code}")))?;
    let vcs = match vcs.as_deref() {
        None => None,
        Some(raw) => {
            let parsed = SourceControl::parse(raw);
            if parsed.is_none() {
                tracing::warn!(revision_id = id, vcs = raw, "unknown source control system");
            }
            parsed
        }
    };

    Ok(Json(status_field(status, vcs)))
}
