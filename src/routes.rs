use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use deadpool_sqlite::Pool;
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::markup::handler as markup_handler;
use crate::report::cache::ReportCache;
use crate::report::handler::{self as report_handler, ReportState};
use crate::revision::handler as revision_handler;
use crate::task::{self, TrackerState};
use crate::project;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub db_ok: bool,
}

/// GET /health
pub async fn health(State(pool): State<Arc<Pool>>) -> Json<HealthResponse> {
    let db_ok = match pool.get().await {
        Ok(conn) => conn
            .interact(|conn| conn.execute_batch("SELECT 1"))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false),
        Err(_) => false,
    };

    Json(HealthResponse {
        status: if db_ok {
            "ok".into()
        } else {
            "degraded".into()
        },
        db_ok,
    })
}

/// All API routes with their state attached. CORS and rate limiting are
/// layered on by the caller.
pub fn router(config: &AppConfig, pool: Pool) -> Router {
    let cache = Arc::new(ReportCache::new(config.report.cache_ttl_secs));
    let shared_pool = Arc::new(pool.clone());

    let report_state = Arc::new(ReportState {
        pool: pool.clone(),
        cache: cache.clone(),
        default_timezone: config.default_timezone(),
        recent_window_days: config.report.recent_window_days,
    });
    let tracker_state = Arc::new(TrackerState { pool, cache });

    // ── Reports ──
    let report_routes = Router::new()
        .route("/v1/reports/burn", get(report_handler::burn_report))
        .route("/v1/reports/open", get(report_handler::open_tasks_report))
        .with_state(report_state);

    // ── Tasks, projects, users (writes clear the report cache) ──
    let tracker_routes = Router::new()
        .route("/v1/projects", get(project::list_projects))
        .route("/v1/projects", post(project::create_project))
        .route("/v1/users", post(project::create_user))
        .route("/v1/tasks", post(task::create_task))
        .route("/v1/tasks/{id}/status", post(task::change_status))
        .with_state(tracker_state);

    // ── Files, markup, revisions ──
    let content_routes = Router::new()
        .route("/health", get(health))
        .route("/v1/files", post(markup_handler::register_file))
        .route("/v1/markup/render", post(markup_handler::render_markup))
        .route("/v1/revisions", post(revision_handler::create_revision))
        .route(
            "/v1/revisions/{id}/fields/status",
            get(revision_handler::get_status_field),
        )
        .with_state(shared_pool);

    Router::new()
        .merge(report_routes)
        .merge(tracker_routes)
        .merge(content_routes)
}
