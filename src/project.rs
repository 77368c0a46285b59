use axum::extract::State;
use axum::Json;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, AppResult, LoggedJson};
use crate::report::calendar::ViewerTimezone;
use crate::task::TrackerState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub phid: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProject {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub phid: String,
    pub username: String,
    pub timezone: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    /// Fixed UTC offset used for this user's report calendar.
    pub timezone: Option<String>,
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// GET /v1/projects - List all projects by name.
pub async fn list_projects(State(state): State<Arc<TrackerState>>) -> AppResult<Json<Vec<Project>>> {
    let conn = state
        .pool
        .get()
        .await
        .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;

    let projects = conn
        .interact(|conn| {
            let mut stmt =
                conn.prepare("SELECT phid, name, created_at FROM projects ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Project {
                        phid: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, rusqlite::Error>(rows)
        })
        .await??;

    Ok(Json(projects))
}

/// POST /v1/projects - Create a new project.
pub async fn create_project(
    State(state): State<Arc<TrackerState>>,
    LoggedJson(input): LoggedJson<CreateProject>,
) -> AppResult<Json<Project>> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }

    let project = Project {
        phid: format!("PHID-PROJ-{}", uuid::Uuid::new_v4().simple()),
        name,
        created_at: chrono::Utc::now().timestamp(),
    };

    let conn = state
        .pool
        .get()
        .await
        .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;

    let p = project.clone();
    conn.interact(move |conn| {
        conn.execute(
            "INSERT INTO projects (phid, name, created_at) VALUES (?1, ?2, ?3)",
            params![p.phid, p.name, p.created_at],
        )
    })
    .await?
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Validation(format!("project {:?} already exists", project.name))
        } else {
            AppError::Database(e)
        }
    })?;

    state.cache.invalidate();
    tracing::info!(phid = %project.phid, name = %project.name, "project created");
    Ok(Json(project))
}

/// POST /v1/users - Create a user, optionally with a report timezone.
pub async fn create_user(
    State(state): State<Arc<TrackerState>>,
    LoggedJson(input): LoggedJson<CreateUser>,
) -> AppResult<Json<User>> {
    let username = input.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }
    let timezone = input.timezone.filter(|tz| !tz.trim().is_empty());
    if let Some(ref tz) = timezone {
        tz.parse::<ViewerTimezone>()
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }

    let user = User {
        phid: format!("PHID-USER-{}", uuid::Uuid::new_v4().simple()),
        username,
        timezone,
        created_at: chrono::Utc::now().timestamp(),
    };

    let conn = state
        .pool
        .get()
        .await
        .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;

    let u = user.clone();
    conn.interact(move |conn| {
        conn.execute(
            "INSERT INTO users (phid, username, timezone, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![u.phid, u.username, u.timezone, u.created_at],
        )
    })
    .await?
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Validation(format!("user {:?} already exists", user.username))
        } else {
            AppError::Database(e)
        }
    })?;

    state.cache.invalidate();
    tracing::info!(phid = %user.phid, username = %user.username, "user created");
    Ok(Json(user))
}
