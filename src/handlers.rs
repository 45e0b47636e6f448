use crate::config::Config;
use crate::errors::AppError;
use crate::export::export_filename;
use crate::import::parse_import_lead_type;
use crate::models::*;
use crate::query::{FilterParams, LeadFilter, LeadQuery, LeadQueryParams};
use crate::services::LeadService;
use crate::validation::{ActivityInput, LeadInput, LeadUpdateInput};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lead and activity operations over the configured store.
    pub service: LeadService,
    /// Application configuration.
    pub config: Config,
}

/// Query string of `GET /api/activities`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQueryParams {
    pub lead_id: Option<String>,
}

/// Body of `POST /api/leads/export`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub filters: FilterParams,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Ids that are not UUIDs cannot name a stored lead.
fn lead_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::NotFound(format!("Lead with id {} not found", raw)))
}

fn csv_attachment(csv: String) -> impl IntoResponse {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(Utc::now().date_naive())
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "wholesale-crm",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/leads
///
/// Filtered, sorted and paginated lead listing.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `params` - `type`, `status`, `search`, `page`, `limit`, `sortBy`, `sortOrder`.
///
/// # Returns
///
/// * `Result<Json<LeadPage>, AppError>` - One page of leads plus pagination totals.
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    params: Result<Query<LeadQueryParams>, QueryRejection>,
) -> Result<Json<LeadPage>, AppError> {
    let params = query_params(params)?;
    tracing::info!("GET /leads - params: {:?}", params);

    let query = LeadQuery::from_params(params)?;
    let page = state.service.list(&query).await?;

    Ok(Json(page))
}

/// POST /api/leads
///
/// Creates a lead and records a "Lead created" note on its timeline.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<Lead>), AppError>` - 201 with the stored lead.
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LeadInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Lead>), AppError> {
    let input = json_body(payload)?;
    tracing::info!("POST /leads");

    let lead = state.service.create(input).await?;

    Ok((StatusCode::CREATED, Json(lead)))
}

/// GET /api/leads/:id
///
/// # Returns
///
/// * `Result<Json<LeadWithActivities>, AppError>` - The lead with its activities, newest first.
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LeadWithActivities>, AppError> {
    tracing::info!("GET /leads/{}", id);

    let detail = state.service.get(lead_id(&id)?).await?;

    Ok(Json(detail))
}

/// PATCH /api/leads/:id
///
/// Partial update. Keys left out of the body are untouched; optional keys sent
/// as `null` or `""` are cleared.
///
/// # Returns
///
/// * `Result<Json<Lead>, AppError>` - The updated lead.
pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<LeadUpdateInput>, JsonRejection>,
) -> Result<Json<Lead>, AppError> {
    let input = json_body(payload)?;
    tracing::info!("PATCH /leads/{}", id);

    let lead = state.service.update(lead_id(&id)?, input).await?;

    Ok(Json(lead))
}

/// DELETE /api/leads/:id
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("DELETE /leads/{}", id);

    state.service.delete(lead_id(&id)?).await?;

    Ok(Json(json!({ "success": true })))
}

/// POST /api/leads/import
///
/// Multipart upload with a `file` part (CSV text) and a `leadType` part.
///
/// # Returns
///
/// * `Result<Json<ImportSummary>, AppError>` - Per-row outcome counts and row errors.
pub async fn import_leads(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ImportSummary>, AppError> {
    let mut file: Option<String> = None;
    let mut lead_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Unreadable file: {}", e)))?;
                file = Some(text);
            }
            Some("leadType") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Unreadable leadType: {}", e)))?;
                lead_type = Some(text);
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let lead_type = parse_import_lead_type(lead_type.as_deref())?;
    tracing::info!("POST /leads/import - {} bytes as {}", file.len(), lead_type);

    let summary = state.service.import(lead_type, &file).await?;

    Ok(Json(summary))
}

/// GET /api/leads/export
///
/// Filters come from the query string (`type`, `status`, `search`).
pub async fn export_leads(
    State(state): State<Arc<AppState>>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let params = query_params(params)?;
    tracing::info!("GET /leads/export - filters: {:?}", params);

    let filter = LeadFilter::from_params(&params)?;
    let csv = state.service.export(&filter).await?;

    Ok(csv_attachment(csv))
}

/// POST /api/leads/export
///
/// Same as the GET form with filters in a `{"filters": {...}}` body.
pub async fn export_leads_post(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    tracing::info!("POST /leads/export - filters: {:?}", request.filters);

    let filter = LeadFilter::from_params(&request.filters)?;
    let csv = state.service.export(&filter).await?;

    Ok(csv_attachment(csv))
}

/// GET /api/stats
///
/// # Returns
///
/// * `Result<Json<DashboardStats>, AppError>` - Dashboard counters, recomputed on every call.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardStats>, AppError> {
    tracing::info!("GET /stats");

    let stats = state.service.stats().await?;

    Ok(Json(stats))
}

/// GET /api/activities?leadId=
pub async fn list_activities(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ActivityQueryParams>, QueryRejection>,
) -> Result<Json<Vec<Activity>>, AppError> {
    let params = query_params(params)?;
    tracing::info!("GET /activities - leadId: {:?}", params.lead_id);

    let raw = params
        .lead_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::invalid("leadId", "Lead id is required"))?;
    let lead_id =
        Uuid::parse_str(raw.trim()).map_err(|_| AppError::invalid("leadId", "Invalid lead id"))?;

    let activities = state.service.list_activities(lead_id).await?;

    Ok(Json(activities))
}

/// POST /api/activities
///
/// # Returns
///
/// * `Result<(StatusCode, Json<Activity>), AppError>` - 201 with the stored activity.
pub async fn create_activity(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ActivityInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Activity>), AppError> {
    let input = json_body(payload)?;
    tracing::info!("POST /activities - leadId: {:?}", input.lead_id);

    let activity = state.service.create_activity(input).await?;

    Ok((StatusCode::CREATED, Json(activity)))
}
