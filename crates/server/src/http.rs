//! JSON API for the rebooking flow.
//!
//! - `GET  /api/users/{user_id}/suggestions`    — suggestion feed plus last visits
//! - `POST /api/suggestions/{id}/accept`        — one-tap accept
//! - `POST /api/suggestions/{id}/customize`     — accept with overrides
//! - `POST /api/suggestions/{id}/dismiss`       — record a dismissal
//! - `POST /api/bookings/{id}/completed`        — booking-completed event from the POS
//! - `POST /api/admin/sweeps/daily`             — trigger the generation sweep
//! - `POST /api/admin/sweeps/expiry`            — trigger the expiry sweep

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use rebook_core::domain::ids::{BookingId, ServiceId, StaffId, SuggestionId, UserId};
use rebook_core::errors::RebookError;
use rebook_engine::types::{ConfirmedRebooking, CustomizeRequest, SuggestionFeed};
use rebook_engine::{
    BookingCommitter, ExpiryReaper, PreferenceLearner, SuggestionGenerator, SuggestionPresenter,
};

use crate::bootstrap::Application;

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Clone)]
pub struct ApiState {
    pub presenter: Arc<SuggestionPresenter>,
    pub committer: Arc<BookingCommitter>,
    pub learner: Arc<PreferenceLearner>,
    pub generator: Arc<SuggestionGenerator>,
    pub reaper: Arc<ExpiryReaper>,
    pub admin_token: Option<String>,
}

impl ApiState {
    pub fn from_app(app: &Application) -> Self {
        use secrecy::ExposeSecret;

        Self {
            presenter: app.presenter.clone(),
            committer: app.committer.clone(),
            learner: app.learner.clone(),
            generator: app.generator.clone(),
            reaper: app.reaper.clone(),
            admin_token: app
                .config
                .admin
                .token
                .as_ref()
                .map(|token| token.expose_secret().to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CustomizeBody {
    pub user_id: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub staff_id: Option<String>,
    #[serde(default)]
    pub add_service_ids: Vec<String>,
    #[serde(default)]
    pub remove_service_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DismissRequest {
    pub user_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub processed: u64,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: &'static str,
    pub message: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/users/{user_id}/suggestions", get(get_suggestions))
        .route("/api/suggestions/{id}/accept", post(accept_suggestion))
        .route("/api/suggestions/{id}/customize", post(customize_suggestion))
        .route("/api/suggestions/{id}/dismiss", post(dismiss_suggestion))
        .route("/api/bookings/{id}/completed", post(booking_completed))
        .route("/api/admin/sweeps/daily", post(run_daily_sweep))
        .route("/api/admin/sweeps/expiry", post(run_expiry_sweep))
        .with_state(state)
}

async fn get_suggestions(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<SuggestionFeed> {
    let feed = state
        .presenter
        .get_suggestions(&UserId(user_id))
        .await
        .map_err(error_response)?;
    Ok(Json(feed))
}

async fn accept_suggestion(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<AcceptRequest>,
) -> ApiResult<ConfirmedRebooking> {
    let confirmed = state
        .committer
        .accept_suggestion(&UserId(body.user_id), &SuggestionId(id))
        .await
        .map_err(error_response)?;
    Ok(Json(confirmed))
}

async fn customize_suggestion(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<CustomizeBody>,
) -> ApiResult<ConfirmedRebooking> {
    let request = CustomizeRequest {
        date: body.date,
        time: body.time,
        staff_id: body.staff_id.map(StaffId),
        add_service_ids: body.add_service_ids.into_iter().map(ServiceId).collect(),
        remove_service_ids: body.remove_service_ids.into_iter().map(ServiceId).collect(),
    };

    let confirmed = state
        .committer
        .customize_suggestion(&UserId(body.user_id), &SuggestionId(id), request)
        .await
        .map_err(error_response)?;
    Ok(Json(confirmed))
}

async fn dismiss_suggestion(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<DismissRequest>,
) -> ApiResult<AckResponse> {
    state
        .committer
        .dismiss_suggestion(&UserId(body.user_id), &SuggestionId(id), body.reason)
        .await
        .map_err(error_response)?;
    Ok(Json(AckResponse { status: "dismissed" }))
}

async fn booking_completed(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<AckResponse> {
    state
        .learner
        .on_booking_completed(&BookingId(id))
        .await
        .map_err(error_response)?;
    Ok(Json(AckResponse { status: "processed" }))
}

async fn run_daily_sweep(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<SweepResponse> {
    check_admin(&state, &headers)?;
    let created = state.generator.run_daily_sweep().await.map_err(error_response)?;
    Ok(Json(SweepResponse { processed: created }))
}

async fn run_expiry_sweep(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<SweepResponse> {
    check_admin(&state, &headers)?;
    let expired = state.reaper.run_sweep().await.map_err(error_response)?;
    Ok(Json(SweepResponse { processed: expired }))
}

/// Admin routes are open unless a token is configured, which suits local
/// development; production configs set `admin.token`.
fn check_admin(state: &ApiState, headers: &HeaderMap) -> Result<(), (StatusCode, Json<ApiError>)> {
    let Some(expected) = &state.admin_token else { return Ok(()) };

    let presented = headers.get(ADMIN_TOKEN_HEADER).and_then(|value| value.to_str().ok());
    if presented == Some(expected.as_str()) {
        return Ok(());
    }

    warn!(event_name = "rebook.http.admin_rejected", "admin sweep request rejected");
    Err((
        StatusCode::UNAUTHORIZED,
        Json(ApiError {
            error: "unauthorized",
            message: "missing or invalid admin token".to_string(),
        }),
    ))
}

fn error_response(error: RebookError) -> (StatusCode, Json<ApiError>) {
    let (status, code) = match &error {
        RebookError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        RebookError::AlreadyUsed => (StatusCode::CONFLICT, "already_used"),
        RebookError::Expired => (StatusCode::CONFLICT, "expired"),
        RebookError::SlotUnavailable => (StatusCode::CONFLICT, "slot_unavailable"),
        RebookError::DependencyNotFound(_) => (StatusCode::CONFLICT, "dependency_not_found"),
        RebookError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        RebookError::Domain(_) => (StatusCode::INTERNAL_SERVER_ERROR, "domain"),
        RebookError::Persistence(_) => (StatusCode::SERVICE_UNAVAILABLE, "persistence"),
    };

    if status.is_server_error() {
        warn!(
            event_name = "rebook.http.request_failed",
            error = %error,
            "request failed with a server-side error"
        );
    }

    (status, Json(ApiError { error: code, message: error.user_message().to_string() }))
}
