//! Caller context middleware.
//!
//! The feed trusts the identity established by the gateway in front of it.
//! The gateway forwards that identity as request headers:
//!
//! - `X-User-Id` (required)
//! - `X-Scope` (required) - tenant scope name
//! - `X-User-Name` (optional, defaults to the user id)
//! - `X-Permissions` (optional, comma separated)
//! - `X-Session-Id` (optional)
//!
//! [`caller_context_middleware`] turns them into a [`CallerContext`] in the
//! request extensions; handlers read it back with [`CallerExtractor`].

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tidings_core::CallerContext;

use crate::error::{ApiError, ApiResult};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const SCOPE_HEADER: &str = "x-scope";
pub const PERMISSIONS_HEADER: &str = "x-permissions";
pub const SESSION_ID_HEADER: &str = "x-session-id";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Build a caller context from forwarded identity headers.
pub fn caller_from_headers(headers: &HeaderMap) -> ApiResult<CallerContext> {
    let user_id = header(headers, USER_ID_HEADER).ok_or_else(|| ApiError::missing_field("X-User-Id"))?;
    let scope = header(headers, SCOPE_HEADER).ok_or_else(|| ApiError::missing_field("X-Scope"))?;

    let mut caller = CallerContext::new(user_id, scope);
    if let Some(name) = header(headers, USER_NAME_HEADER) {
        caller = caller.with_user_name(name);
    }
    if let Some(permissions) = header(headers, PERMISSIONS_HEADER) {
        caller = caller.with_permissions(
            permissions
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty()),
        );
    }
    if let Some(session) = header(headers, SESSION_ID_HEADER) {
        caller = caller.with_session(session);
    }
    Ok(caller)
}

/// Axum middleware injecting the [`CallerContext`] into request extensions.
pub async fn caller_context_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = caller_from_headers(request.headers())?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Typed extractor for the caller context.
#[derive(Debug, Clone)]
pub struct CallerExtractor(pub CallerContext);

#[async_trait]
impl<S> FromRequestParts<S> for CallerExtractor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerContext>()
            .cloned()
            .map(CallerExtractor)
            .ok_or_else(|| {
                ApiError::internal_error(
                    "CallerContext not found in request extensions. \
                     Ensure caller_context_middleware is applied to this route.",
                )
            })
    }
}

impl std::ops::Deref for CallerExtractor {
    type Target = CallerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
