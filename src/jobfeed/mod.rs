//! JSearch (RapidAPI) job feed.
//!
//! Fetches postings from the external API and imports them as `api` jobs.

use std::time::Duration;

use serde::Deserialize;

use crate::config::JobFeedConfig;
use crate::db::Repository;
use crate::errors::AppError;
use crate::matching::MatchingEngine;
use crate::models::{Job, NewJob, SOURCE_API, SYSTEM_POSTER};
use crate::search::SearchIndex;

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Keywords scanned for when a posting lists no skills.
pub const COMMON_SKILLS: &[&str] = &[
    "python",
    "java",
    "javascript",
    "typescript",
    "react",
    "angular",
    "vue",
    "node",
    "django",
    "flask",
    "fastapi",
    "sql",
    "mysql",
    "postgresql",
    "mongodb",
    "aws",
    "azure",
    "docker",
    "kubernetes",
    "git",
    "linux",
    "html",
    "css",
    "pandas",
    "numpy",
    "machine learning",
    "ai",
    "devops",
];

/// One posting as returned by JSearch. Every field may be missing or null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Posting {
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub employer_name: Option<String>,
    #[serde(default)]
    pub job_city: Option<String>,
    #[serde(default)]
    pub job_country: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub job_required_skills: Option<String>,
    #[serde(default)]
    pub job_employment_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Posting>,
}

/// Keyword skill extraction, case-insensitive substring match, no duplicates.
pub fn extract_skills(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    COMMON_SKILLS
        .iter()
        .filter(|skill| lower.contains(*skill))
        .map(|skill| skill.to_string())
        .collect()
}

impl Posting {
    /// Skills listed by the posting, falling back to keyword extraction.
    pub fn skills(&self) -> Vec<String> {
        let listed: Vec<String> = self
            .job_required_skills
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if listed.is_empty() {
            extract_skills(self.job_description.as_deref().unwrap_or_default())
        } else {
            listed
        }
    }

    pub fn into_new_job(self) -> NewJob {
        let required_skills = self.skills();
        let location = self
            .job_city
            .filter(|c| !c.is_empty())
            .or(self.job_country.filter(|c| !c.is_empty()));

        NewJob {
            title: self.job_title.unwrap_or_default(),
            company: self.employer_name,
            description: self.job_description.unwrap_or_default(),
            required_skills,
            job_type: self
                .job_employment_type
                .unwrap_or_else(|| "Full-time".to_string()),
            location,
            source: SOURCE_API.to_string(),
            posted_by: SYSTEM_POSTER.to_string(),
        }
    }
}

/// Parameters for a job import.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub query: String,
    pub location: String,
    pub limit: usize,
    pub auto_store: bool,
}

/// HTTP client for the JSearch API.
pub struct JobFeed {
    client: reqwest::Client,
    config: JobFeedConfig,
    retry_delay: Duration,
}

impl JobFeed {
    pub fn new(client: reqwest::Client, config: JobFeedConfig) -> Self {
        Self {
            client,
            config,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Base delay between rate-limited attempts; attempt `n` waits `n` times this.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Fetch the first page of postings for a query.
    pub async fn search(&self, query: &str, location: &str) -> Result<Vec<Posting>, AppError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            AppError::Upstream("Job feed is not configured (RAPIDAPI_KEY missing)".to_string())
        })?;
        let url = format!("{}/search", self.config.api_url);

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .client
                .get(&url)
                .header("X-RapidAPI-Key", api_key)
                .header("X-RapidAPI-Host", &self.config.api_host)
                .query(&[
                    ("query", query),
                    ("location", location),
                    ("num_pages", "1"),
                    ("page", "1"),
                ])
                .send()
                .await?;

            match response.status().as_u16() {
                200 => {
                    let body: SearchResponse = response.json().await?;
                    return Ok(body.data);
                }
                401 => {
                    return Err(AppError::Upstream(
                        "Invalid API key. Please check your RapidAPI key!".to_string(),
                    ));
                }
                429 => {
                    tracing::warn!(attempt, "Job API rate limited, backing off");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                status => {
                    let text = response.text().await.unwrap_or_default();
                    return Err(AppError::Upstream(format!(
                        "Job API error {}: {}",
                        status, text
                    )));
                }
            }
        }

        Err(AppError::Upstream(
            "Job API fetch failed after retries".to_string(),
        ))
    }

    /// Fetch postings and store the first `limit` of them as jobs.
    ///
    /// Stored jobs are added to the search index. With `auto_store` their embeddings
    /// are computed up front; failures there are logged and skipped.
    pub async fn import(
        &self,
        repo: &Repository,
        engine: &MatchingEngine,
        search: &SearchIndex,
        request: &FetchRequest,
    ) -> Result<Vec<Job>, AppError> {
        let postings = self.search(&request.query, &request.location).await?;

        let mut jobs = Vec::new();
        for posting in postings.into_iter().take(request.limit) {
            let job = repo.create_job(&posting.into_new_job()).await?;
            if request.auto_store && engine.job_embedding(repo, &job).await.is_none() {
                tracing::warn!(job_id = %job.id, "Imported job has no text to embed");
            }
            jobs.push(job);
        }

        if let Err(e) = search.index_jobs(&jobs).await {
            tracing::warn!(count = jobs.len(), "Failed to index imported jobs: {}", e);
        }

        tracing::info!(query = %request.query, count = jobs.len(), "Imported jobs from feed");
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn feed(server: &MockServer, key: Option<&str>) -> JobFeed {
        JobFeed::new(
            reqwest::Client::new(),
            JobFeedConfig {
                api_key: key.map(str::to_string),
                api_host: "jsearch.test".to_string(),
                api_url: server.base_url(),
            },
        )
        .with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_extract_skills() {
        let skills = extract_skills("We use Python, Django and Docker. PYTHON too.");
        assert_eq!(skills, vec!["python", "django", "docker"]);
        assert!(extract_skills("").is_empty());
    }

    #[test]
    fn test_posting_prefers_listed_skills() {
        let posting = Posting {
            job_required_skills: Some(" Rust , ,Tokio".to_string()),
            job_description: Some("python".to_string()),
            ..Default::default()
        };
        assert_eq!(posting.skills(), vec!["Rust", "Tokio"]);
    }

    #[test]
    fn test_posting_mapping() {
        let posting = Posting {
            job_title: Some("Data Engineer".to_string()),
            employer_name: Some("Acme".to_string()),
            job_city: None,
            job_country: Some("DE".to_string()),
            job_description: Some("Pipelines in SQL and pandas".to_string()),
            job_required_skills: None,
            job_employment_type: Some("FULLTIME".to_string()),
        };
        let job = posting.into_new_job();

        assert_eq!(job.title, "Data Engineer");
        assert_eq!(job.location.as_deref(), Some("DE"));
        assert_eq!(job.required_skills, vec!["sql", "pandas"]);
        assert_eq!(job.job_type, "FULLTIME");
        assert_eq!(job.source, SOURCE_API);
        assert_eq!(job.posted_by, SYSTEM_POSTER);
    }

    #[tokio::test]
    async fn test_search_sends_rapidapi_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/search")
                .header("x-rapidapi-key", "key")
                .header("x-rapidapi-host", "jsearch.test")
                .query_param("query", "rust developer")
                .query_param("num_pages", "1")
                .query_param("page", "1");
            then.status(200)
                .json_body(json!({"data": [{"job_title": "Rust Developer"}]}));
        });

        let postings = feed(&server, Some("key"))
            .search("rust developer", "")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].job_title.as_deref(), Some("Rust Developer"));
    }

    #[tokio::test]
    async fn test_search_invalid_key() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(401);
        });

        let err = feed(&server, Some("bad")).search("x", "").await.unwrap_err();
        assert_eq!(
            err.message(),
            "Invalid API key. Please check your RapidAPI key!"
        );
    }

    #[tokio::test]
    async fn test_search_retries_when_rate_limited() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(429);
        });

        let err = feed(&server, Some("key")).search("x", "").await.unwrap_err();
        assert_eq!(err.message(), "Job API fetch failed after retries");
        mock.assert_hits(3);
    }

    #[tokio::test]
    async fn test_search_other_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(500).body("boom");
        });

        let err = feed(&server, Some("key")).search("x", "").await.unwrap_err();
        assert_eq!(err.message(), "Job API error 500: boom");
    }

    #[tokio::test]
    async fn test_search_without_key() {
        let server = MockServer::start();
        let err = feed(&server, None).search("x", "").await.unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn test_import_stores_and_indexes() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(json!({"data": [
                {"job_title": "Python Developer", "employer_name": "Acme",
                 "job_city": "Berlin", "job_description": "Django APIs"},
                {"job_title": "Go Developer", "job_description": "Services"},
                {"job_title": "Ignored", "job_description": "Over the limit"}
            ]}));
        });

        let dir = tempfile::TempDir::new().unwrap();
        let pool = crate::db::init_database(&dir.path().join("test.db"))
            .await
            .unwrap();
        let repo = Repository::new(pool);
        let search = SearchIndex::open(&dir.path().join("index")).unwrap();
        let engine = MatchingEngine::default();

        let request = FetchRequest {
            query: "developer".to_string(),
            location: String::new(),
            limit: 2,
            auto_store: true,
        };
        let jobs = feed(&server, Some("key"))
            .import(&repo, &engine, &search, &request)
            .await
            .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].required_skills, vec!["django"]);
        assert_eq!(repo.list_jobs(Some(SOURCE_API)).await.unwrap().len(), 2);
        assert!(repo.list_jobs_missing_embedding(None).await.unwrap().is_empty());
        assert_eq!(search.search("python", 10, 0).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_import_survives_index_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search");
            then.status(200).json_body(json!({"data": [
                {"job_title": "Data Engineer", "job_description": "sql pipelines"}
            ]}));
        });

        let dir = tempfile::TempDir::new().unwrap();
        let pool = crate::db::init_database(&dir.path().join("test.db"))
            .await
            .unwrap();
        let repo = Repository::new(pool);
        let index_dir = dir.path().join("index");
        let search = SearchIndex::open(&index_dir).unwrap();
        // Commits into a vanished directory fail
        std::fs::remove_dir_all(&index_dir).unwrap();

        let request = FetchRequest {
            query: "data".to_string(),
            location: String::new(),
            limit: 5,
            auto_store: true,
        };
        let jobs = feed(&server, Some("key"))
            .import(&repo, &MatchingEngine::default(), &search, &request)
            .await
            .unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(repo.list_jobs(Some(SOURCE_API)).await.unwrap().len(), 1);
    }
}
