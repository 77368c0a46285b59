use axum::extract::{Query, State};
use axum::Json;
use deadpool_sqlite::Pool;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::burn::{build_burn_report, BurnRow, RowClass};
use super::cache::ReportCache;
use super::calendar::{resolve_timezone, ViewerTimezone};
use super::open_tasks::{build_open_tasks_report, OpenTasksInput, OpenTasksOrder, OpenTasksView};
use crate::error::{AppError, AppResult};
use crate::storage::queries;

const PROJECT_CAPTION: &str = "NOTE: This table reflects tasks currently in the project. \
    If a task was opened in the past but added to the project recently, it is counted on \
    the day it was opened, not the day it was categorized. If a task was part of this \
    project in the past but no longer is, it is not counted at all.";

pub struct ReportState {
    pub pool: Pool,
    pub cache: Arc<ReportCache>,
    pub default_timezone: ViewerTimezone,
    pub recent_window_days: u64,
}

/// Serve a cached JSON body when present, otherwise compute, store and return it.
macro_rules! cached_or_compute {
    ($state:expr, $key:expr, $compute:expr) => {{
        let key = $key;
        if let Some(cached) = $state.cache.get(&key) {
            tracing::debug!(key = %key, "report cache hit");
            let val: serde_json::Value = serde_json::from_str(&cached)
                .map_err(|e| AppError::Internal(format!("cache deserialize: {e}")))?;
            return Ok(Json(val));
        }
        let generation = $state.cache.generation();
        let result = $compute;
        let val = serde_json::to_value(&result)
            .map_err(|e| AppError::Internal(format!("serialize: {e}")))?;
        $state.cache.insert(key, val.to_string(), generation);
        Ok(Json(val))
    }};
}

#[derive(Debug, Deserialize)]
pub struct BurnQuery {
    pub project: Option<String>,
    pub viewer: Option<String>,
    pub tz: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenTasksQuery {
    #[serde(default)]
    pub view: OpenTasksView,
    #[serde(default)]
    pub order: OpenTasksOrder,
    pub viewer: Option<String>,
    pub tz: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BurnChart {
    pub hardpoint: String,
    pub x: Vec<Vec<i64>>,
    pub y: Vec<Vec<i64>>,
}

#[derive(Debug, Serialize)]
pub struct BurnResponse {
    pub header: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub headers: [&'static str; 4],
    pub rows: Vec<BurnRow>,
    pub row_classes: Vec<Option<RowClass>>,
    pub chart: BurnChart,
}

async fn viewer_timezone(
    state: &ReportState,
    tz: Option<String>,
    viewer: Option<String>,
) -> AppResult<ViewerTimezone> {
    let explicit = tz.as_deref().and_then(|v| v.parse::<ViewerTimezone>().ok());
    let stored = match (explicit, viewer) {
        (None, Some(viewer)) => {
            let conn = state
                .pool
                .get()
                .await
                .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;
            conn.interact(move |conn| queries::user_timezone(conn, &viewer))
                .await??
        }
        _ => None,
    };

    Ok(resolve_timezone(
        [("tz", tz.as_deref()), ("viewer", stored.as_deref())],
        state.default_timezone,
    ))
}

/// GET /v1/reports/burn
pub async fn burn_report(
    State(state): State<Arc<ReportState>>,
    Query(params): Query<BurnQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let tz = viewer_timezone(&state, params.tz, params.viewer).await?;
    let project = params.project.filter(|p| !p.is_empty());
    let key = ReportCache::cache_key("burn", project.as_deref(), "-", tz);

    cached_or_compute!(state, key, {
        let conn = state
            .pool
            .get()
            .await
            .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;

        let filter = project.clone();
        let (name, rows) = conn
            .interact(move |conn| {
                let name = match filter.as_deref() {
                    Some(phid) => queries::project_name(conn, phid)?,
                    None => None,
                };
                let rows = queries::load_status_transactions(conn, filter.as_deref())?;
                Ok::<_, rusqlite::Error>((name, rows))
            })
            .await??;

        let header = match (&project, name) {
            (Some(phid), None) => {
                return Err(AppError::NotFound(format!("project {phid}")));
            }
            (Some(_), Some(name)) => format!("Task Burn Rate for Project {name}"),
            (None, _) => "Task Burn Rate for All Tasks".to_string(),
        };

        let report = build_burn_report(&rows, tz)?;
        tracing::info!(
            project = project.as_deref().unwrap_or("all"),
            transactions = rows.len(),
            rows = report.rows.len(),
            tz = %tz,
            "burn report built"
        );

        BurnResponse {
            header,
            caption: project.as_ref().map(|_| PROJECT_CAPTION),
            project,
            headers: ["Period", "Opened", "Closed", "Change"],
            rows: report.rows,
            row_classes: report.row_classes,
            chart: BurnChart {
                hardpoint: format!("burn-chart-{}", uuid::Uuid::new_v4().simple()),
                x: vec![report.series.x],
                y: vec![report.series.y],
            },
        }
    })
}

/// GET /v1/reports/open
pub async fn open_tasks_report(
    State(state): State<Arc<ReportState>>,
    Query(params): Query<OpenTasksQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let tz = viewer_timezone(&state, params.tz, params.viewer).await?;
    let (view, order) = (params.view, params.order);
    let variant = format!("{}-{}", view.as_str(), order.as_str());
    let key = ReportCache::cache_key("open", None, &variant, tz);

    cached_or_compute!(state, key, {
        let now = chrono::Utc::now().timestamp();
        let window = i64::try_from(state.recent_window_days)
            .unwrap_or(i64::MAX / 86_400)
            .saturating_mul(86_400);
        let since = now.saturating_sub(window);

        let conn = state
            .pool
            .get()
            .await
            .map_err(|e| AppError::Internal(format!("pool error: {e}")))?;

        let (open, closed, names) = conn
            .interact(move |conn| {
                let open = queries::load_open_tasks(conn)?;
                let closed = queries::load_recently_closed(conn, since)?;
                let names = queries::handle_names(conn, view)?;
                Ok::<_, rusqlite::Error>((open, closed, names))
            })
            .await??;

        tracing::info!(
            view = view.as_str(),
            order = order.as_str(),
            open = open.len(),
            recently_closed = closed.len(),
            "open tasks report built"
        );

        build_open_tasks_report(OpenTasksInput {
            view,
            order,
            open: &open,
            recently_closed: &closed,
            names: &names,
            now,
            tz,
        })
    })
}
