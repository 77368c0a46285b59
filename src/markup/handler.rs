use axum::extract::State;
use axum::Json;
use deadpool_sqlite::Pool;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::embed::{apply_embed_rule, referenced_file_ids, EmbedFile};
use crate::error::{AppError, AppResult, LoggedJson};

#[derive(Debug, Deserialize)]
pub struct RegisterFile {
    pub name: String,
    pub uri: String,
    /// Defaults to `uri` when no thumbnail exists.
    pub thumb_uri: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub name: String,
    pub uri: String,
    pub thumb_uri: String,
    pub embed: String,
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub html: String,
}

/// POST /v1/files - Register metadata for an uploaded file.
pub async fn register_file(
    State(pool): State<Arc<Pool>>,
    LoggedJson(input): LoggedJson<RegisterFile>,
) -> AppResult<Json<FileRecord>> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if input.uri.trim().is_empty() {
        return Err(AppError::Validation("uri is required".to_string()));
    }
    let thumb_uri = input
        .thumb_uri
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| input.uri.clone());
    let now = chrono::Utc::now().timestamp();

    let conn = pool
        .get()
        .await
        .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;

    let (name, uri, thumb) = (input.name.clone(), input.uri.clone(), thumb_uri.clone());
    let id = conn
        .interact(move |conn| {
            conn.execute(
                "INSERT INTO files (name, uri, thumb_uri, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, uri, thumb, now],
            )?;
            Ok::<_, rusqlite::Error>(conn.last_insert_rowid())
        })
        .await??;

    tracing::info!(file_id = id, name = %input.name, "file registered");
    Ok(Json(FileRecord {
        id,
        name: input.name,
        uri: input.uri,
        thumb_uri,
        embed: format!("{{F{id}}}"),
    }))
}

fn load_files(conn: &rusqlite::Connection, ids: &[u64]) -> rusqlite::Result<HashMap<u64, EmbedFile>> {
    let mut stmt = conn.prepare("SELECT uri, COALESCE(thumb_uri, uri) FROM files WHERE id = ?1")?;
    let mut files = HashMap::new();
    for &id in ids {
        // Ids beyond SQLite's integer range cannot exist.
        let Ok(key) = i64::try_from(id) else { continue };
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            files.insert(
                id,
                EmbedFile {
                    best_uri: row.get(0)?,
                    thumb_uri: row.get(1)?,
                },
            );
        }
    }
    Ok(files)
}

/// POST /v1/markup/render - Replace `{F<id>}` embeds with file markup.
pub async fn render_markup(
    State(pool): State<Arc<Pool>>,
    LoggedJson(input): LoggedJson<RenderRequest>,
) -> AppResult<Json<RenderResponse>> {
    let ids = referenced_file_ids(&input.text);
    let files = if ids.is_empty() {
        HashMap::new()
    } else {
        let conn = pool
            .get()
            .await
            .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;
        conn.interact(move |conn| load_files(conn, &ids))
            .await??
    };

    tracing::debug!(files = files.len(), "rendering markup");
    Ok(Json(RenderResponse {
        html: apply_embed_rule(&input.text, &files),
    }))
}
