//! HTTP routes.
//!
//! - `GET  /health/ping` - liveness, no caller context
//! - `GET  /subscriptions?since=<tick>` - subscriptions created since a tick
//! - `POST /subscriptions` - create a subscription for the caller
//! - `GET  /subscriptions/:subscription_id/notifications?since=<tick>`
//! - `POST /topics/:topic_id/notifications` - publish

pub mod health;
pub mod notifications;
pub mod subscriptions;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::caller_context_middleware;
use crate::state::AppState;

/// Build the feed router.
pub fn create_router(state: AppState) -> Router {
    let feed = Router::new()
        .route(
            "/subscriptions",
            get(subscriptions::list_subscriptions).post(subscriptions::create_subscription),
        )
        .route(
            "/subscriptions/:subscription_id/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/topics/:topic_id/notifications",
            post(notifications::publish_notification),
        )
        .route_layer(middleware::from_fn(caller_context_middleware));

    Router::new()
        .route("/health/ping", get(health::ping))
        .merge(feed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
