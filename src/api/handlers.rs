use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Form,
};
use log::{error, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::admin::{AdminError, AdminRequest, AdminResponse, AdminSite, ChangeFormView};
use crate::model::{QueryDict, UserContext};

pub type AppState = Arc<AdminSite>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_status(err: &AdminError) -> StatusCode {
    match err {
        AdminError::DisallowedToField(_) => StatusCode::BAD_REQUEST,
        AdminError::NotFound { .. } => StatusCode::NOT_FOUND,
        AdminError::PermissionDenied => StatusCode::FORBIDDEN,
        AdminError::NotAReference { .. }
        | AdminError::UnknownField { .. }
        | AdminError::UnknownEntity(_)
        | AdminError::TransactionAborted(_)
        | AdminError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn admin_error(err: AdminError) -> ApiError {
    let status = error_status(&err);
    if status.is_server_error() {
        error!("Admin request failed: {:#}", err);
    } else {
        warn!("Admin request rejected ({}): {}", status, err);
    }
    (status, Json(ErrorResponse::new(&err.to_string())))
}

fn admin_response(response: AdminResponse) -> Response {
    let location = match &response {
        AdminResponse::Redirect { location, .. } => Some(location.clone()),
        AdminResponse::Rendered { .. } | AdminResponse::Popup { .. } => None,
    };
    match location {
        Some(location) => (StatusCode::FOUND, [(header::LOCATION, location)], Json(response)).into_response(),
        None => Json(response).into_response(),
    }
}

fn view_for(site: &AdminSite, entity: &str) -> Result<Arc<dyn ChangeFormView>, ApiError> {
    site.get(entity).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(&format!("No admin page registered for '{}'", entity))),
        )
    })
}

async fn dispatch(
    site: &AdminSite,
    entity: &str,
    request: AdminRequest,
    object_id: Option<&str>,
) -> Result<Response, ApiError> {
    let view = view_for(site, entity)?;
    view.changeform_view(&request, object_id)
        .await
        .map(admin_response)
        .map_err(admin_error)
}

/// Render the blank add screen
pub async fn add_view_get(
    State(site): State<AppState>,
    Path(entity): Path<String>,
    user: UserContext,
    Query(query): Query<QueryDict>,
) -> Result<Response, ApiError> {
    dispatch(&site, &entity, AdminRequest::get(user, query), None).await
}

/// Submit the add screen
pub async fn add_view_post(
    State(site): State<AppState>,
    Path(entity): Path<String>,
    user: UserContext,
    Query(query): Query<QueryDict>,
    Form(data): Form<QueryDict>,
) -> Result<Response, ApiError> {
    let request = AdminRequest::post(user, data).with_query(query);
    dispatch(&site, &entity, request, None).await
}

/// Render the change screen of an existing record
pub async fn change_view_get(
    State(site): State<AppState>,
    Path((entity, object_id)): Path<(String, String)>,
    user: UserContext,
    Query(query): Query<QueryDict>,
) -> Result<Response, ApiError> {
    dispatch(&site, &entity, AdminRequest::get(user, query), Some(&object_id)).await
}

/// Submit the change screen of an existing record
pub async fn change_view_post(
    State(site): State<AppState>,
    Path((entity, object_id)): Path<(String, String)>,
    user: UserContext,
    Query(query): Query<QueryDict>,
    Form(data): Form<QueryDict>,
) -> Result<Response, ApiError> {
    let request = AdminRequest::post(user, data).with_query(query);
    dispatch(&site, &entity, request, Some(&object_id)).await
}
