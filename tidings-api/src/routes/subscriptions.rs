//! Subscription endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tidings_core::{Subscription, Tick};

use crate::error::{ApiError, ApiResult};
use crate::middleware::CallerExtractor;
use crate::routes::notifications::SinceQuery;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub topic_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSubscriptionsResponse {
    pub subscriptions: Vec<Subscription>,
}

/// GET /subscriptions?since=<tick>
///
/// Without `since`, lists every subscription in the caller's scope.
pub async fn list_subscriptions(
    State(state): State<AppState>,
    CallerExtractor(caller): CallerExtractor,
    Query(query): Query<SinceQuery>,
) -> ApiResult<Json<ListSubscriptionsResponse>> {
    let since = query.since.unwrap_or(Tick::MIN);
    let subscriptions = state
        .service
        .list_subscriptions_since(&caller, since)
        .await?;
    Ok(Json(ListSubscriptionsResponse { subscriptions }))
}

/// POST /subscriptions
pub async fn create_subscription(
    State(state): State<AppState>,
    CallerExtractor(caller): CallerExtractor,
    Json(request): Json<CreateSubscriptionRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.topic_ids.is_empty() {
        return Err(ApiError::missing_field("topicIds"));
    }
    let subscription = state
        .service
        .create_subscription(&caller, request.topic_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}
