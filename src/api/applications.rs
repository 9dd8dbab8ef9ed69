//! Job application API endpoints.

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::{created, require_valid_id, success, ApiResult};
use crate::auth::{CandidateAuth, HrAuth};
use crate::errors::AppError;
use crate::models::{
    ApplicationStatus, ApplicationStatusUpdated, ApplicationSubmitted, CandidateApplicationView,
    Job, JobApplicationView,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub new_status: String,
}

/// Imported jobs are reviewed by any HR user; HR jobs only by their poster.
fn ensure_manages(job: &Job, hr_email: &str, action: &str) -> Result<(), AppError> {
    if job.is_managed_by(hr_email) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "You are not authorized to {} applications for this job",
            action
        )))
    }
}

/// POST /applications/apply/{job_id} - Apply to a job.
pub async fn apply_to_job(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Path(job_id): Path<String>,
) -> ApiResult<ApplicationSubmitted> {
    require_valid_id(&job_id, "Invalid job ID")?;

    let job = state
        .repo
        .get_job(&job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

    if state.repo.has_applied(&user.email, &job.id).await? {
        return Err(AppError::BadRequest(
            "You have already applied to this job".to_string(),
        ));
    }

    let candidate = state
        .repo
        .get_candidate_by_email(&user.email)
        .await?
        .ok_or_else(|| AppError::NotFound("Candidate not found".to_string()))?;

    let match_score = state.engine.match_score(&state.repo, &candidate, &job).await;
    let application = state
        .repo
        .create_application(&user.email, &job, match_score)
        .await?;

    tracing::info!(
        application_id = %application.id,
        job_id = %job.id,
        match_score,
        "Application submitted"
    );

    created(ApplicationSubmitted {
        message: "Application submitted successfully".to_string(),
        application_id: application.id,
        match_score,
    })
}

/// GET /applications/my-applications - The caller's applications with job summaries.
pub async fn my_applications(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
) -> ApiResult<Vec<CandidateApplicationView>> {
    let applications = state
        .repo
        .list_applications_for_candidate(&user.email)
        .await?;

    let mut views = Vec::with_capacity(applications.len());
    for mut application in applications {
        let job = state.repo.get_job(&application.job_id).await?;
        if let Some(job) = &job {
            application.job_source = job.source.clone();
        }
        views.push(CandidateApplicationView {
            application,
            job_title: job.as_ref().map(|j| j.title.clone()),
            company: job.as_ref().and_then(|j| j.company.clone()),
            job_type: job.as_ref().map(|j| j.job_type.clone()),
        });
    }

    success(views)
}

/// GET /applications/job/{job_id}/applications - Applicants for a job, best match first.
pub async fn job_applications(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
    Path(job_id): Path<String>,
) -> ApiResult<Vec<JobApplicationView>> {
    require_valid_id(&job_id, "Invalid job ID format")?;

    let job = state
        .repo
        .get_job(&job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;
    ensure_manages(&job, &user.email, "view")?;

    let applications = state.repo.list_applications_for_job(&job.id).await?;

    let mut views = Vec::with_capacity(applications.len());
    for application in applications {
        let candidate = state
            .repo
            .get_candidate_by_email(&application.candidate_email)
            .await?;
        views.push(JobApplicationView {
            application,
            candidate,
        });
    }

    success(views)
}

/// PUT /applications/applications/{id}/status?new_status= - Move an application along.
pub async fn update_application_status(
    State(state): State<AppState>,
    HrAuth(user): HrAuth,
    Path(application_id): Path<String>,
    Query(params): Query<StatusParams>,
) -> ApiResult<ApplicationStatusUpdated> {
    let new_status = ApplicationStatus::parse(&params.new_status)
        .ok_or_else(|| AppError::BadRequest("Invalid status value".to_string()))?;
    require_valid_id(&application_id, "Invalid application ID")?;

    let application = state
        .repo
        .get_application(&application_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

    let job = state
        .repo
        .get_job(&application.job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Associated job not found".to_string()))?;
    ensure_manages(&job, &user.email, "update")?;

    state
        .repo
        .update_application_status(&application.id, new_status)
        .await?;

    tracing::info!(application_id = %application.id, status = new_status.as_str(), "Application status updated");

    success(ApplicationStatusUpdated {
        message: "Application status updated successfully".to_string(),
        new_status,
    })
}
