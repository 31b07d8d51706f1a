//! Token authentication as an axum extractor.
//!
//! Handlers opt in by taking an [`AuthenticatedUser`] argument. The token is
//! read from `Authorization: Bearer <token>`, falling back to a `?token=`
//! query parameter for browser WebSocket clients that cannot set headers.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Query},
    http::{HeaderMap, header, request::Parts},
};
use dreamjob_core::{Authenticator, UserIdentity};
use serde::Deserialize;

use crate::error::ApiError;

/// Authenticator shared between handlers.
pub type SharedAuthenticator = Arc<dyn Authenticator>;

/// Identity of the caller, resolved from its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserIdentity);

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Extract a bearer token from the `Authorization` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn request_token(parts: &Parts) -> Option<String> {
    if let Some(token) = bearer_token(&parts.headers) {
        return Some(token.to_owned());
    }
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.token)
        .filter(|token| !token.is_empty())
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    SharedAuthenticator: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = request_token(parts).ok_or(ApiError::Unauthenticated)?;
        let authenticator = SharedAuthenticator::from_ref(state);
        match authenticator.authenticate(&token).await {
            Ok(identity) => Ok(Self(identity)),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected token");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, Request};

    use super::*;

    fn parts(uri: &str, authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_header_wins_over_query() {
        let parts = parts("/ws?token=from-query", Some("Bearer from-header"));
        assert_eq!(request_token(&parts).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_query_fallback() {
        assert_eq!(
            request_token(&parts("/ws?token=from-query", None)).as_deref(),
            Some("from-query")
        );
        assert_eq!(request_token(&parts("/ws?token=", None)), None);
        assert_eq!(request_token(&parts("/ws", None)), None);
    }
}
