//! HTTP routes for the job-search API.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
};
use dreamjob_core::{
    AuthError, Authenticator, JobPosting, JobQuery, JobSearchEngine, UpdateRequest, UserIdentity,
};
use dreamjob_session::SessionRegistry;
use dreamjob_transport::{ApiError, AuthenticatedUser, SharedAuthenticator};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::engine::DemoFactory;

pub type Registry = SessionRegistry<DemoFactory>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub authenticator: SharedAuthenticator,
}

impl FromRef<AppState> for SharedAuthenticator {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.authenticator)
    }
}

/// Accepts any email-shaped bearer token as that user's identity.
///
/// Stands in for real token verification during local development.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevAuthenticator;

#[async_trait]
impl Authenticator for DevAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<UserIdentity, AuthError> {
        match token.trim().split_once('@') {
            Some((user, domain)) if !user.is_empty() && !domain.is_empty() => {
                Ok(UserIdentity::new(token))
            }
            _ => Err(AuthError::Unauthenticated),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/session", post(create_session).delete(delete_session))
        .route("/update-database", post(update_database))
        .route("/job-postings", post(job_postings))
        .route("/sessions", get(list_sessions))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct SessionOpened {
    identity: String,
    created: bool,
}

async fn create_session(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<(StatusCode, Json<SessionOpened>), ApiError> {
    let (_, created) = state.registry.get_or_create(&identity).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(SessionOpened {
            identity: identity.to_string(),
            created,
        }),
    ))
}

async fn delete_session(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    state.registry.logout(&identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_database(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let engine = state.registry.lease(&identity).await?;
    let sink = engine.sink();
    engine.update_database(&request, &sink).await?;
    Ok(Json(json!({ "message": "Database updated" })))
}

#[derive(Debug, Serialize)]
struct JobPostings {
    job_postings: Vec<JobPosting>,
}

async fn job_postings(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Json(query): Json<JobQuery>,
) -> Result<Json<JobPostings>, ApiError> {
    let engine = state.registry.lease(&identity).await?;
    let sink = engine.sink();
    let job_postings = engine.find_jobs(&query, &sink).await?;
    Ok(Json(JobPostings { job_postings }))
}

#[derive(Debug, Serialize)]
struct SessionView {
    identity: String,
    age_secs: u64,
    idle_secs: u64,
    subscribers: usize,
    active_leases: usize,
}

async fn list_sessions(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
) -> Json<Vec<SessionView>> {
    let now = Instant::now();
    let sessions = state
        .registry
        .snapshot()
        .into_iter()
        .map(|info| SessionView {
            identity: info.identity.to_string(),
            age_secs: info.age(now).as_secs(),
            idle_secs: info.idle_for(now).as_secs(),
            subscribers: info.subscriber_count,
            active_leases: info.active_leases,
        })
        .collect();
    Json(sessions)
}
