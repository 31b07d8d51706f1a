//! In-memory job-search engine used as the per-user context.

use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use dreamjob_core::{
    ContextFactory, EngineError, FactoryError, JobPosting, JobQuery, JobSearchEngine, LogLine,
    LogSink, UpdateRequest, UserIdentity,
};
use parking_lot::RwLock;

const SKILLS: &[&str] = &[
    "Python", "Rust", "React", "Azure", "prompt engineering", "web scraping", "Playwright",
    "Kubernetes", "PostgreSQL",
];

/// A posting as stored, before scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPosting {
    pub link: String,
    pub job_title: String,
    pub job_company: String,
    pub job_location: String,
    pub job_description: String,
}

/// One user's postings database.
#[derive(Debug)]
pub struct DemoEngine {
    owner: UserIdentity,
    scrape_delay: Duration,
    postings: RwLock<Vec<StoredPosting>>,
}

impl DemoEngine {
    #[must_use]
    pub fn new(owner: UserIdentity, scrape_delay: Duration) -> Self {
        Self {
            owner,
            scrape_delay,
            postings: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn owner(&self) -> &UserIdentity {
        &self.owner
    }

    #[must_use]
    pub fn posting_count(&self) -> usize {
        self.postings.read().len()
    }

    /// Store postings, skipping links already present.
    pub fn insert(&self, postings: impl IntoIterator<Item = StoredPosting>) -> usize {
        let mut stored = self.postings.write();
        let mut seen: HashSet<String> = stored.iter().map(|p| p.link.clone()).collect();
        let before = stored.len();
        stored.extend(postings.into_iter().filter(|p| seen.insert(p.link.clone())));
        stored.len() - before
    }

    async fn scrape_and_store(
        &self,
        request: &UpdateRequest,
        sink: &dyn LogSink,
    ) -> Result<usize, EngineError> {
        if request.locations.is_empty() || request.queries.is_empty() {
            return Err(EngineError::InvalidRequest(
                "at least one location and one query are required".into(),
            ));
        }

        emit(sink, format!("📍 Locations: {}", request.locations.join(", ")));
        emit(sink, format!("🔍 Queries: {}", request.queries.join(", ")));
        emit(sink, "🔎 Searching for jobs...".to_string());

        let mut found = Vec::new();
        for (i, query) in request.queries.iter().enumerate() {
            for location in &request.locations {
                tokio::time::sleep(self.scrape_delay).await;
                found.push(synthesize(query, location, i));
            }
        }

        emit(sink, "📄 Scraping job postings...".to_string());
        let added = self.insert(found);
        emit(sink, format!("💾 Stored {added} new postings"));
        Ok(added)
    }
}

fn slug(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Deterministic stand-in for a scraped posting.
fn synthesize(query: &str, location: &str, index: usize) -> StoredPosting {
    let skills: Vec<&str> = SKILLS.iter().copied().cycle().skip(index).take(3).collect();
    StoredPosting {
        link: format!("https://jobs.example.com/view/{}-{}", slug(query), slug(location)),
        job_title: query.to_string(),
        job_company: format!("Company {}", index + 1),
        job_location: location.to_string(),
        job_description: format!("{query} in {location}. Stack: {}.", skills.join(", ")),
    }
}

fn emit(sink: &dyn LogSink, line: String) {
    sink.emit(LogLine::new(line));
}

#[async_trait]
impl JobSearchEngine for DemoEngine {
    async fn update_database(
        &self,
        request: &UpdateRequest,
        sink: &dyn LogSink,
    ) -> Result<(), EngineError> {
        emit(
            sink,
            format!(
                "🚀 Starting database update with {} locations and {} queries",
                request.locations.len(),
                request.queries.len()
            ),
        );

        let result = self.scrape_and_store(request, sink).await;
        emit(sink, "🧹 Cleaning up scrapers...".to_string());

        match result {
            Ok(added) => {
                emit(sink, "✅ Database update completed successfully!".to_string());
                tracing::debug!(owner = %self.owner, added, total = self.posting_count(), "Database updated");
                Ok(())
            }
            Err(e) => {
                emit(sink, format!("❌ Error during database update: {e}"));
                tracing::warn!(owner = %self.owner, error = %e, "Database update failed");
                Err(e)
            }
        }
    }

    async fn find_jobs(
        &self,
        query: &JobQuery,
        sink: &dyn LogSink,
    ) -> Result<Vec<JobPosting>, EngineError> {
        let keywords: Vec<(&str, String)> = query
            .keywords
            .iter()
            .map(|k| (k.as_str(), k.to_lowercase()))
            .collect();

        let mut results: Vec<JobPosting> = self
            .postings
            .read()
            .iter()
            .filter(|p| query.location.as_ref().is_none_or(|loc| &p.job_location == loc))
            .filter_map(|p| {
                let description = p.job_description.to_lowercase();
                let matched: Vec<&str> = keywords
                    .iter()
                    .filter(|(_, lower)| description.contains(lower.as_str()))
                    .map(|(original, _)| *original)
                    .collect();
                (!matched.is_empty()).then(|| JobPosting {
                    score: u32::try_from(matched.len()).unwrap_or(u32::MAX),
                    matched_keywords: matched.join(", "),
                    link: p.link.clone(),
                    job_title: p.job_title.clone(),
                    job_company: p.job_company.clone(),
                    job_location: p.job_location.clone(),
                })
            })
            .collect();
        results.sort_by(|a, b| b.score.cmp(&a.score));

        emit(sink, format!("🎯 Found {} matching postings", results.len()));
        Ok(results)
    }
}

/// Builds a fresh [`DemoEngine`] per user.
#[derive(Debug, Clone, Default)]
pub struct DemoFactory {
    scrape_delay: Duration,
}

impl DemoFactory {
    /// Simulate `delay` of scraping work per query/location pair.
    #[must_use]
    pub const fn with_scrape_delay(delay: Duration) -> Self {
        Self {
            scrape_delay: delay,
        }
    }
}

#[async_trait]
impl ContextFactory for DemoFactory {
    type Context = Arc<DemoEngine>;

    async fn create(&self, identity: &UserIdentity) -> Result<Self::Context, FactoryError> {
        tracing::info!(%identity, "Initializing job search engine");
        Ok(Arc::new(DemoEngine::new(identity.clone(), self.scrape_delay)))
    }

    async fn destroy(&self, context: Self::Context) {
        tracing::debug!(identity = %context.owner(), postings = context.posting_count(), "Job search engine released");
    }
}
