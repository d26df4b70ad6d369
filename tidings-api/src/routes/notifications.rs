//! Notification endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tidings_core::{NotificationPage, Tick};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::middleware::CallerExtractor;
use crate::state::AppState;

/// Query string carrying the resume tick.
#[derive(Debug, Clone, Deserialize)]
pub struct SinceQuery {
    pub since: Option<Tick>,
}

/// Body of a publish request.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    pub payload: String,
}

/// GET /subscriptions/:subscription_id/notifications?since=<tick>
pub async fn list_notifications(
    State(state): State<AppState>,
    CallerExtractor(caller): CallerExtractor,
    Path(subscription_id): Path<Uuid>,
    Query(query): Query<SinceQuery>,
) -> ApiResult<Json<NotificationPage>> {
    let since = query.since.ok_or_else(|| ApiError::missing_field("since"))?;
    let page = state
        .service
        .list_for_subscription(&caller, subscription_id, since)
        .await?;
    Ok(Json(page))
}

/// POST /topics/:topic_id/notifications
pub async fn publish_notification(
    State(state): State<AppState>,
    CallerExtractor(caller): CallerExtractor,
    Path(topic_id): Path<String>,
    Json(request): Json<PublishRequest>,
) -> ApiResult<impl IntoResponse> {
    let notification = state
        .service
        .publish(&caller, &topic_id, request.payload)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}
