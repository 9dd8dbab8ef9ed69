//! Job feed import and full-text job search endpoints.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::auth::{CurrentUser, HrAuth};
use crate::errors::AppError;
use crate::jobfeed::FetchRequest;
use crate::models::Job;
use crate::AppState;

const DEFAULT_FETCH_LIMIT: usize = 5;
const MAX_FETCH_LIMIT: usize = 20;

const DEFAULT_SEARCH_LIMIT: usize = 20;
const MAX_SEARCH_LIMIT: usize = 100;

fn default_auto_store() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct FetchJobsParams {
    pub query: String,
    #[serde(default)]
    pub location: String,
    pub limit: Option<usize>,
    #[serde(default = "default_auto_store")]
    pub auto_store: bool,
}

#[derive(Debug, Serialize)]
pub struct FetchedJobs {
    pub count: usize,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
pub struct SearchJobsParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct JobHit {
    pub job: Job,
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub struct JobSearchResponse {
    pub results: Vec<JobHit>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// GET /jobs/fetch - Import postings from the external job feed.
pub async fn fetch_jobs(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
    Query(params): Query<FetchJobsParams>,
) -> ApiResult<FetchedJobs> {
    if params.query.trim().is_empty() {
        return Err(AppError::Validation("query is required".to_string()));
    }
    let limit = params.limit.unwrap_or(DEFAULT_FETCH_LIMIT);
    if !(1..=MAX_FETCH_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_FETCH_LIMIT
        )));
    }

    tracing::info!(query = %params.query, requested_by = %user.email, "Fetching jobs from feed");

    let request = FetchRequest {
        query: params.query,
        location: params.location,
        limit,
        auto_store: params.auto_store,
    };
    let jobs = state
        .job_feed
        .import(&state.repo, &state.engine, &state.search, &request)
        .await?;

    success(FetchedJobs {
        count: jobs.len(),
        jobs,
    })
}

/// GET /jobs/search - Full-text search over all jobs.
pub async fn search_jobs(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<SearchJobsParams>,
) -> ApiResult<JobSearchResponse> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let hits = state.search.search(&params.q, limit, params.offset)?;

    // Index entries can briefly outlive their rows
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        if let Some(job) = state.repo.get_job(&hit.job_id).await? {
            results.push(JobHit {
                job,
                score: hit.score,
            });
        }
    }

    success(JobSearchResponse {
        total: results.len(),
        results,
        limit,
        offset: params.offset,
    })
}
