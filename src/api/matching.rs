//! Matching API endpoints.

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use super::{bounded_top_n, normalize_email, require_valid_id, success, ApiResult};
use crate::auth::{CandidateAuth, HrAuth};
use crate::errors::AppError;
use crate::matching::{round_to, SkillGapReport};
use crate::models::{ScoredCandidate, ScoredJob};
use crate::AppState;

const DEFAULT_RECOMMENDED_JOBS: usize = 10;
const MAX_RECOMMENDED_JOBS: usize = 50;
const DEFAULT_RECOMMENDED_CANDIDATES: usize = 20;
const MAX_RECOMMENDED_CANDIDATES: usize = 100;

#[derive(Debug, Deserialize)]
pub struct RecommendedJobsParams {
    pub top_n: Option<usize>,
    /// `hr` or `api`; all sources when absent
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendedCandidatesParams {
    pub top_n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CalculateScoreParams {
    pub candidate_email: String,
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct MatchScoreResponse {
    pub candidate_email: String,
    pub job_id: String,
    pub job_title: String,
    pub match_score: f64,
    pub match_percentage: f64,
}

/// GET /matching/jobs/recommended - Best jobs for the calling candidate.
pub async fn recommended_jobs(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Query(params): Query<RecommendedJobsParams>,
) -> ApiResult<Vec<ScoredJob>> {
    let top_n = bounded_top_n(params.top_n, DEFAULT_RECOMMENDED_JOBS, MAX_RECOMMENDED_JOBS)?;
    let source = params.source.as_deref().filter(|s| !s.is_empty());

    let jobs = state
        .engine
        .recommend_jobs(&state.repo, &user.email, top_n, source)
        .await?;
    success(jobs)
}

/// GET /matching/candidates/recommended/{job_id} - Best candidates for a job.
pub async fn recommended_candidates(
    State(state): State<AppState>,
    HrAuth(_user): HrAuth,
    Path(job_id): Path<String>,
    Query(params): Query<RecommendedCandidatesParams>,
) -> ApiResult<Vec<ScoredCandidate>> {
    let top_n = bounded_top_n(
        params.top_n,
        DEFAULT_RECOMMENDED_CANDIDATES,
        MAX_RECOMMENDED_CANDIDATES,
    )?;

    let candidates = state
        .engine
        .recommend_candidates(&state.repo, &job_id, top_n)
        .await?;
    if candidates.is_empty() {
        return Err(AppError::NotFound(
            "Job not found or no candidates available".to_string(),
        ));
    }
    success(candidates)
}

/// GET /matching/skill-gap/{job_id} - Compare the caller's skills with a job.
pub async fn skill_gap(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Path(job_id): Path<String>,
) -> ApiResult<SkillGapReport> {
    let report = state
        .engine
        .skill_gap(&state.repo, &user.email, &job_id)
        .await?;
    success(report)
}

/// POST /matching/calculate-score - Score any candidate against any job.
pub async fn calculate_score(
    State(state): State<AppState>,
    HrAuth(_user): HrAuth,
    Query(params): Query<CalculateScoreParams>,
) -> ApiResult<MatchScoreResponse> {
    require_valid_id(&params.job_id, "Invalid job ID")?;

    let candidate_email = normalize_email(&params.candidate_email);
    let candidate = state.repo.get_candidate_by_email(&candidate_email).await?;
    let job = state.repo.get_job(&params.job_id).await?;
    let (Some(candidate), Some(job)) = (candidate, job) else {
        return Err(AppError::NotFound("Candidate or job not found".to_string()));
    };

    let match_score = state.engine.match_score(&state.repo, &candidate, &job).await;

    success(MatchScoreResponse {
        candidate_email,
        job_id: job.id,
        job_title: job.title,
        match_score,
        match_percentage: round_to(match_score * 100.0, 1),
    })
}
