use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use vigia_core::config::AppConfig;
use vigia_core::models::{AnnotationPatch, AttachmentId};
use vigia_core::query::PageRequest;
use vigia_core::sync::{self, SyncError};
use vigia_core::wazuh::{AlertSource, LevelFilter, WazuhClient};
use vigia_core::DatabaseService;

use crate::envelope;
use crate::error::{detail_preview, AppError};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    db: DatabaseService,
    wazuh: WazuhClient,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DatabaseService, wazuh: WazuhClient) -> Self {
        Self { config, db, wazuh }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/sync", post(sync_alerts))
        .route("/api/alerts/stats", get(alert_stats))
        .route("/api/alerts/status", post(bulk_status))
        .route(
            "/api/alerts/{id}/annotation",
            get(get_annotation).put(put_annotation),
        )
        .route("/api/alerts/{id}/attachments", post(add_attachment))
        .route("/api/attachments/{id}", delete(delete_attachment))
        .route("/api/sync/last", get(last_sync))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let last_sync = state.db.last_sync_log().await?;
    Ok(Json(json!({
        "status": "ok",
        "timestamp": Utc::now().timestamp(),
        "last_sync": last_sync.as_ref().map(envelope::sync_log_json),
    })))
}

#[derive(Debug, Default, Deserialize)]
struct AlertsParams {
    limit: Option<String>,
    offset: Option<String>,
    level: Option<String>,
    agent: Option<String>,
    search: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    /// `local` (default) serves the cache, `remote` is a passthrough
    source: Option<String>,
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertsParams>,
) -> Result<Json<Value>, AppError> {
    let query = PageRequest {
        limit: params.limit,
        offset: params.offset,
        level: params.level,
        agent: params.agent,
        search: params.search,
        start_date: params.start_date,
        end_date: params.end_date,
    }
    .sanitize();

    if params.source.as_deref() == Some("remote") {
        let level = LevelFilter::from_requested(query.filter.level);
        let batch = state
            .wazuh
            .fetch_batch(query.limit, query.offset, level)
            .await
            .map_err(|err| AppError::external(err.to_string()))?;
        return Ok(Json(envelope::remote_envelope(&batch)));
    }

    let page = state
        .db
        .query_alerts(&query.filter, query.limit, query.offset)
        .await?;
    Ok(Json(envelope::local_envelope(&page)))
}

#[derive(Debug, Default, Deserialize)]
struct SyncRequest {
    limit: Option<usize>,
}

async fn sync_alerts(State(state): State<AppState>, body: Bytes) -> Response {
    // Lenient body handling: absent or malformed JSON falls back to defaults
    let request: SyncRequest = serde_json::from_slice(&body).unwrap_or_default();
    let limit = request.limit.unwrap_or(state.config.sync_batch_limit);

    match sync::run_sync(&state.wazuh, &state.db, limit).await {
        Ok(report) => {
            tracing::info!(
                endpoint = "sync_alerts",
                count = report.count,
                total = report.total,
                "Sync run finished"
            );
            let message = if report.count == 0 {
                "No alerts to sync"
            } else {
                "Alerts synced successfully"
            };
            (
                StatusCode::OK,
                Json(json!({
                    "message": message,
                    "count": report.count,
                    "total": report.total,
                })),
            )
                .into_response()
        }
        Err(SyncError::Store {
            source,
            fetched,
            total,
        }) => {
            tracing::warn!(endpoint = "sync_alerts", fetched, "Local write failed: {source}");
            (
                StatusCode::PARTIAL_CONTENT,
                Json(json!({
                    "message": "Alerts fetched from the remote index but the local write failed",
                    "warning": detail_preview(&source.to_string()),
                    "count": fetched,
                    "total": total,
                })),
            )
                .into_response()
        }
        Err(err @ SyncError::Fetch(_)) => {
            tracing::error!(endpoint = "sync_alerts", "Remote fetch failed: {err}");
            AppError::external(err.to_string()).into_response()
        }
    }
}

async fn alert_stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.db.alert_stats().await?;
    Ok(Json(serde_json::to_value(stats).map_err(|err| {
        AppError::Internal(err.to_string())
    })?))
}

async fn get_annotation(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if state.db.get_alert(&alert_id).await?.is_none() {
        return Err(AppError::not_found(format!("alert {alert_id}")));
    }

    // Viewing an alert assigns its display number, like the dashboard did
    let seq = state.db.sequence_number(&alert_id).await?;
    let annotation = state.db.get_annotation(&alert_id).await?;

    Ok(Json(json!({
        "alertId": alert_id,
        "seq": seq,
        "annotation": annotation.as_ref().map(envelope::annotation_json),
    })))
}

async fn put_annotation(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    Json(patch): Json<AnnotationPatch>,
) -> Result<Json<Value>, AppError> {
    let annotation = state.db.annotate(&alert_id, &patch).await?;
    let seq = state.db.sequence_number(&alert_id).await?;

    Ok(Json(json!({
        "alertId": alert_id,
        "seq": seq,
        "annotation": envelope::annotation_json(&annotation),
    })))
}

#[derive(Debug, Deserialize)]
struct BulkStatusRequest {
    ids: Vec<String>,
    status: String,
}

async fn bulk_status(
    State(state): State<AppState>,
    Json(request): Json<BulkStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let updated = state
        .db
        .bulk_set_status(&request.ids, &request.status)
        .await?;
    tracing::info!(
        endpoint = "bulk_status",
        requested = request.ids.len(),
        updated,
        status = %request.status,
        "Applied bulk status change"
    );
    Ok(Json(json!({"updated": updated})))
}

#[derive(Debug, Deserialize)]
struct AttachmentRequest {
    #[serde(alias = "fileName")]
    file_name: String,
    #[serde(alias = "fileType")]
    file_type: String,
    #[serde(alias = "fileSize")]
    file_size: i64,
    #[serde(alias = "fileData")]
    file_data: String,
}

async fn add_attachment(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    Json(request): Json<AttachmentRequest>,
) -> Result<Json<Value>, AppError> {
    let attachment = state
        .db
        .add_attachment(
            &alert_id,
            &request.file_name,
            &request.file_type,
            request.file_size,
            &request.file_data,
        )
        .await?;
    Ok(Json(envelope::attachment_json(&attachment)))
}

async fn delete_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id: AttachmentId = id
        .parse()
        .map_err(|_| AppError::bad_request("invalid attachment id"))?;
    state.db.delete_attachment(&id).await?;
    Ok(Json(json!({"id": id.as_str()})))
}

async fn last_sync(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let log = state.db.last_sync_log().await?;
    Ok(Json(
        log.as_ref().map_or(Value::Null, envelope::sync_log_json),
    ))
}
