//! HR API endpoints: profile, job postings and candidate search.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::uploads::{save_profile_picture, UploadedPicture};
use super::{created, require_valid_id, success, ApiResult};
use crate::auth::HrAuth;
use crate::errors::AppError;
use crate::models::{
    Candidate, CreateJobRequest, HrUser, Job, MessageResponse, NewJob, ProfileUpdated,
    UpdateHrRequest, UpdateJobRequest, SOURCE_HR,
};
use crate::AppState;

const INVALID_JOB_ID: &str = "Invalid job ID";

#[derive(Debug, Serialize)]
pub struct JobCreated {
    pub message: String,
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CandidateSearchParams {
    /// Comma-separated skill names
    pub skills: Option<String>,
}

/// GET /hr/me - The caller's HR profile.
pub async fn get_hr_profile(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
) -> ApiResult<HrUser> {
    let hr = state
        .repo
        .get_hr_by_email(&user.email)
        .await?
        .ok_or_else(|| AppError::NotFound("HR user not found".to_string()))?;
    success(hr)
}

/// PUT /hr/me - Update name, bio or company.
pub async fn update_hr_profile(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
    Json(request): Json<UpdateHrRequest>,
) -> ApiResult<ProfileUpdated> {
    let (changes, updated_fields) = request.normalized();
    if updated_fields.is_empty() {
        return Err(AppError::Validation("No valid fields to update.".to_string()));
    }

    if !state.repo.update_hr(&user.email, &changes).await? {
        return Err(AppError::NotFound("HR user not found.".to_string()));
    }

    success(ProfileUpdated {
        message: "Profile updated successfully.".to_string(),
        updated_fields,
    })
}

/// POST /hr/me/profile-picture - Upload a profile picture (multipart field `file`).
pub async fn upload_hr_picture(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
    multipart: Multipart,
) -> ApiResult<UploadedPicture> {
    let url = save_profile_picture(&state, &user.email, multipart).await?;
    if !state.repo.set_hr_picture(&user.email, &url).await? {
        return Err(AppError::NotFound("HR user not found".to_string()));
    }

    success(UploadedPicture {
        message: "Profile picture uploaded successfully".to_string(),
        url,
    })
}

/// POST /hr/jobs - Post a job under the caller's company.
pub async fn create_job(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<JobCreated> {
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if request.description.trim().is_empty() {
        return Err(AppError::Validation("Description is required".to_string()));
    }

    let company = state
        .repo
        .get_hr_by_email(&user.email)
        .await?
        .and_then(|hr| hr.company);

    let required_skills = request
        .required_skills
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let job = state
        .repo
        .create_job(&NewJob {
            title: request.title.trim().to_string(),
            company,
            description: request.description,
            required_skills,
            job_type: request.job_type,
            location: request.location,
            source: SOURCE_HR.to_string(),
            posted_by: user.email.clone(),
        })
        .await?;

    if let Err(e) = state.search.index_job(&job).await {
        tracing::warn!("Failed to index job: {}", e);
    }

    tracing::info!(job_id = %job.id, posted_by = %user.email, "Job created");

    created(JobCreated {
        message: "Job created successfully".to_string(),
        job_id: job.id,
    })
}

/// GET /hr/jobs - Jobs posted by the caller, newest first.
pub async fn list_my_jobs(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
) -> ApiResult<Vec<Job>> {
    success(state.repo.list_jobs_by_poster(&user.email).await?)
}

/// GET /hr/jobs/{id} - One of the caller's jobs.
pub async fn get_my_job(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
    Path(id): Path<String>,
) -> ApiResult<Job> {
    require_valid_id(&id, INVALID_JOB_ID)?;

    match state.repo.get_job(&id).await? {
        Some(job) if job.posted_by == user.email => success(job),
        _ => Err(AppError::NotFound("Job not found".to_string())),
    }
}

/// PUT /hr/jobs/{id} - Edit one of the caller's jobs.
pub async fn update_my_job(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
    Path(id): Path<String>,
    Json(request): Json<UpdateJobRequest>,
) -> ApiResult<MessageResponse> {
    require_valid_id(&id, INVALID_JOB_ID)?;

    let changes = request.normalized();
    if changes.is_empty() {
        return Err(AppError::Validation("No fields to update".to_string()));
    }

    let job = state
        .repo
        .update_job(&id, &user.email, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found or no changes made".to_string()))?;

    if let Err(e) = state.search.index_job(&job).await {
        tracing::warn!("Failed to re-index job: {}", e);
    }

    success(MessageResponse::new("Job updated successfully"))
}

/// DELETE /hr/jobs/{id} - Remove one of the caller's jobs.
pub async fn delete_my_job(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    require_valid_id(&id, INVALID_JOB_ID)?;

    if !state.repo.delete_job(&id, &user.email).await? {
        return Err(AppError::NotFound("Job not found".to_string()));
    }

    if let Err(e) = state.search.remove_job(&id).await {
        tracing::warn!("Failed to remove job from index: {}", e);
    }

    success(MessageResponse::new("Job deleted successfully"))
}

/// GET /hr/candidates/search?skills=a,b - Candidates with any of the listed skills.
pub async fn search_candidates(
    State(state): State<AppState>,
    HrAuth(_user): HrAuth,
    Query(params): Query<CandidateSearchParams>,
) -> ApiResult<Vec<Candidate>> {
    let skills = params
        .skills
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    success(state.repo.search_candidates_by_skills(&skills).await?)
}
