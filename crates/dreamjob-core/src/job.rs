//! Job-search business-logic contract.
//!
//! The engine itself lives outside this workspace; the session registry only
//! hands it a context and a [`LogSink`] wired to the user's subscribers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::LogSink;

/// Request to refresh the postings database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub locations: Vec<String>,
    pub queries: Vec<String>,
}

/// Keyword query against stored postings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobQuery {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// A scored job posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub score: u32,
    /// Comma-separated keywords that matched the description.
    pub matched_keywords: String,
    pub link: String,
    pub job_title: String,
    pub job_company: String,
    pub job_location: String,
}

/// Engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("upstream source failed: {0}")]
    Upstream(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Job-search operations executed against a user's context.
#[async_trait]
pub trait JobSearchEngine: Send + Sync {
    /// Search for new postings and store them, reporting progress to `sink`.
    async fn update_database(
        &self,
        request: &UpdateRequest,
        sink: &dyn LogSink,
    ) -> Result<(), EngineError>;

    /// Score stored postings against `query`.
    ///
    /// Only postings with a positive score are returned, best first.
    async fn find_jobs(
        &self,
        query: &JobQuery,
        sink: &dyn LogSink,
    ) -> Result<Vec<JobPosting>, EngineError>;
}
