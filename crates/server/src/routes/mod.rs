//! HTTP route handlers.

pub mod admin;
pub mod entities;
pub mod events;
pub mod health;
pub mod metrics;
pub mod recommendations;

use std::sync::Arc;

use axum::http::HeaderMap;
use ingest::ChannelSource;
use model::CustomerId;
use query::{CallerScope, QueryService};
use store::Store;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub store: Arc<S>,
    pub query: QueryService<S>,
    pub source: Arc<ChannelSource>,
}

/// Resolves the caller's scope from request headers.
///
/// `x-staff: true` grants staff scope; `x-customer-id: <uuid>` grants
/// customer scope. Requests carrying neither are rejected.
pub(crate) fn caller_scope(headers: &HeaderMap) -> Result<CallerScope, ApiError> {
    if let Some(value) = headers.get("x-staff")
        && value.to_str().is_ok_and(|v| v == "true")
    {
        return Ok(CallerScope::Staff);
    }
    if let Some(value) = headers.get("x-customer-id") {
        let raw = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("invalid x-customer-id header".to_string()))?;
        let uuid = uuid::Uuid::parse_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("invalid x-customer-id: {e}")))?;
        return Ok(CallerScope::Customer(CustomerId::from_uuid(uuid)));
    }
    Err(ApiError::Forbidden(
        "caller identity required (x-staff or x-customer-id)".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn staff_header_grants_staff_scope() {
        let mut headers = HeaderMap::new();
        headers.insert("x-staff", HeaderValue::from_static("true"));
        assert_eq!(caller_scope(&headers).unwrap(), CallerScope::Staff);
    }

    #[test]
    fn customer_header_grants_customer_scope() {
        let id = uuid::Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-customer-id",
            HeaderValue::from_str(&id.to_string()).unwrap(),
        );
        assert_eq!(
            caller_scope(&headers).unwrap(),
            CallerScope::Customer(CustomerId::from_uuid(id))
        );
    }

    #[test]
    fn missing_identity_is_forbidden() {
        let headers = HeaderMap::new();
        assert!(matches!(
            caller_scope(&headers),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn malformed_customer_id_is_bad_request() {
        let mut headers = HeaderMap::new();
        headers.insert("x-customer-id", HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            caller_scope(&headers),
            Err(ApiError::BadRequest(_))
        ));
    }
}
