//! Shared router state.

use std::sync::Arc;

use crate::service::NotificationService;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<NotificationService>,
}

impl AppState {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}
