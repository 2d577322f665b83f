//! API key authentication for route handlers

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use tracing::debug;

use crate::api::types::ApiError;
use crate::domain::key::{KeyStore, WorkspaceId};
use crate::domain::permission::PermissionQuery;
use crate::domain::verification::{AuthorizationError, Principal};
use crate::infrastructure::auth::AuthContext;

/// Extractor that requires a key passing verification
///
/// Extracts the key from either:
/// - Authorization header: `Bearer <key>`
/// - X-API-Key header: `<key>`
///
/// Permission checks are left to the handler, usually through
/// [`Principal::evaluate`] or [`root_key_auth`].
#[derive(Debug, Clone)]
pub struct VerifiedKey(pub Principal);

impl<S> FromRequestParts<Arc<AuthContext<S>>> for VerifiedKey
where
    S: KeyStore + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        context: &Arc<AuthContext<S>>,
    ) -> Result<Self, Self::Rejection> {
        let secret = extract_api_key_from_headers(&parts.headers)?;

        let principal = context
            .verify(&secret, None)
            .await
            .map_err(AuthorizationError::Internal)?
            .into_result()
            .map_err(AuthorizationError::from)?;

        Ok(VerifiedKey(principal))
    }
}

/// Verify the request's key and require `query` to hold
pub async fn root_key_auth<S>(
    context: &AuthContext<S>,
    headers: &HeaderMap,
    query: &PermissionQuery,
    workspace_id: Option<&WorkspaceId>,
) -> Result<Principal, ApiError>
where
    S: KeyStore + 'static,
{
    let secret = extract_api_key_from_headers(headers)?;

    debug!(
        key_start = %secret.chars().take(6).collect::<String>(),
        query = %query,
        "Authorizing request"
    );

    Ok(context.root_key_auth(&secret, query, workspace_id).await?)
}

pub fn extract_api_key_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| {
                ApiError::new(StatusCode::BAD_REQUEST, "Invalid Authorization header encoding")
            })?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(token.trim().to_string());
        }
    }

    if let Some(api_key_header) = headers.get("x-api-key") {
        let key = api_key_header
            .to_str()
            .map_err(|_| {
                ApiError::new(StatusCode::BAD_REQUEST, "Invalid X-API-Key header encoding")
            })?;

        return Ok(key.trim().to_string());
    }

    Err(ApiError::new(
        StatusCode::UNAUTHORIZED,
        "API key required. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header",
    ))
}
