//! Candidate profile API endpoints.
//!
//! Every route here acts on the signed-in candidate's own profile. List sections
//! (skills, portfolio, education, experience) are addressed by a natural key taken
//! from the path: skill name, portfolio title, education degree, experience role.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};

use super::uploads::{save_profile_picture, UploadedPicture};
use super::{success, ApiResult};
use crate::auth::CandidateAuth;
use crate::errors::AppError;
use crate::models::{
    Candidate, EducationItem, ExperienceItem, MessageResponse, PortfolioItem, ProfileUpdated,
    SkillItem, UpdateCandidateRequest,
};
use crate::AppState;

fn require(value: &str, what: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::Validation(format!("{} is required", what)))
    } else {
        Ok(())
    }
}

fn validate_skills(skills: &[SkillItem]) -> Result<(), AppError> {
    skills
        .iter()
        .try_for_each(|s| s.validate().map_err(AppError::Validation))
}

/// Replace the first item whose key equals `key`.
fn replace_item<T>(
    items: &mut [T],
    key_of: impl Fn(&T) -> &str,
    key: &str,
    item: T,
    not_found: &str,
) -> Result<(), AppError> {
    let slot = items
        .iter_mut()
        .find(|existing| key_of(existing) == key)
        .ok_or_else(|| AppError::NotFound(not_found.to_string()))?;
    *slot = item;
    Ok(())
}

/// Remove every item whose key equals `key`.
fn remove_items<T>(
    items: &mut Vec<T>,
    key_of: impl Fn(&T) -> &str,
    key: &str,
    not_found: &str,
) -> Result<(), AppError> {
    let before = items.len();
    items.retain(|existing| key_of(existing) != key);
    if items.len() == before {
        return Err(AppError::NotFound(not_found.to_string()));
    }
    Ok(())
}

async fn edit_profile<F>(state: &AppState, email: &str, edit: F) -> Result<(), AppError>
where
    F: FnOnce(&mut Candidate) -> Result<(), AppError>,
{
    state.repo.modify_candidate(email, edit).await.map(|_| ())
}

fn done(message: &str) -> ApiResult<MessageResponse> {
    success(MessageResponse::new(message))
}

/// GET /candidates/me - The caller's profile.
pub async fn get_my_profile(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
) -> ApiResult<Candidate> {
    let candidate = state
        .repo
        .get_candidate_by_email(&user.email)
        .await?
        .ok_or_else(|| AppError::NotFound("Candidate not found".to_string()))?;
    success(candidate)
}

/// PUT /candidates/me - Replace top-level profile fields.
pub async fn update_my_profile(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Json(request): Json<UpdateCandidateRequest>,
) -> ApiResult<ProfileUpdated> {
    let (changes, updated_fields) = request.normalized();
    if updated_fields.is_empty() {
        return Err(AppError::Validation("No valid fields to update.".to_string()));
    }
    if let Some(skills) = &changes.skills {
        validate_skills(skills)?;
    }

    edit_profile(&state, &user.email, |candidate| {
        changes.apply_to(candidate);
        Ok(())
    })
    .await?;

    tracing::debug!(email = %user.email, fields = ?updated_fields, "Candidate profile updated");

    success(ProfileUpdated {
        message: "Profile updated successfully.".to_string(),
        updated_fields,
    })
}

/// POST /candidates/me/profile-picture - Upload a profile picture (multipart field `file`).
pub async fn upload_candidate_picture(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    multipart: Multipart,
) -> ApiResult<UploadedPicture> {
    let url = save_profile_picture(&state, &user.email, multipart).await?;
    if !state.repo.set_candidate_picture(&user.email, &url).await? {
        return Err(AppError::NotFound("Candidate not found".to_string()));
    }

    success(UploadedPicture {
        message: "Profile picture uploaded successfully".to_string(),
        url,
    })
}

// ==================== SKILLS ====================

/// POST /candidates/me/skills
pub async fn add_skill(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Json(skill): Json<SkillItem>,
) -> ApiResult<MessageResponse> {
    skill.validate().map_err(AppError::Validation)?;
    edit_profile(&state, &user.email, |c| {
        c.skills.push(skill);
        Ok(())
    })
    .await?;
    done("Skill added successfully")
}

/// PUT /candidates/me/skills/{name}
pub async fn update_skill(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Path(name): Path<String>,
    Json(skill): Json<SkillItem>,
) -> ApiResult<MessageResponse> {
    skill.validate().map_err(AppError::Validation)?;
    edit_profile(&state, &user.email, |c| {
        replace_item(&mut c.skills, |s| s.name.as_str(), &name, skill, "Skill not found")
    })
    .await?;
    done("Skill updated successfully")
}

/// DELETE /candidates/me/skills/{name}
pub async fn delete_skill(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Path(name): Path<String>,
) -> ApiResult<MessageResponse> {
    edit_profile(&state, &user.email, |c| {
        remove_items(&mut c.skills, |s| s.name.as_str(), &name, "Skill not found")
    })
    .await?;
    done("Skill deleted successfully")
}

// ==================== PORTFOLIO ====================

/// POST /candidates/me/portfolio
pub async fn add_portfolio_item(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Json(item): Json<PortfolioItem>,
) -> ApiResult<MessageResponse> {
    require(&item.title, "Portfolio title")?;
    edit_profile(&state, &user.email, |c| {
        c.portfolio.push(item);
        Ok(())
    })
    .await?;
    done("Portfolio item added successfully")
}

/// PUT /candidates/me/portfolio/{title}
pub async fn update_portfolio_item(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Path(title): Path<String>,
    Json(item): Json<PortfolioItem>,
) -> ApiResult<MessageResponse> {
    require(&item.title, "Portfolio title")?;
    edit_profile(&state, &user.email, |c| {
        replace_item(
            &mut c.portfolio,
            |p| p.title.as_str(),
            &title,
            item,
            "Portfolio item not found",
        )
    })
    .await?;
    done("Portfolio item updated successfully")
}

/// DELETE /candidates/me/portfolio/{title}
pub async fn delete_portfolio_item(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Path(title): Path<String>,
) -> ApiResult<MessageResponse> {
    edit_profile(&state, &user.email, |c| {
        remove_items(&mut c.portfolio, |p| p.title.as_str(), &title, "Portfolio item not found")
    })
    .await?;
    done("Portfolio item deleted successfully")
}

// ==================== EDUCATION ====================

/// POST /candidates/me/education
pub async fn add_education(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Json(item): Json<EducationItem>,
) -> ApiResult<MessageResponse> {
    require(&item.degree, "Degree")?;
    edit_profile(&state, &user.email, |c| {
        c.education.push(item);
        Ok(())
    })
    .await?;
    done("Education added successfully")
}

/// PUT /candidates/me/education/{degree}
pub async fn update_education(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Path(degree): Path<String>,
    Json(item): Json<EducationItem>,
) -> ApiResult<MessageResponse> {
    require(&item.degree, "Degree")?;
    edit_profile(&state, &user.email, |c| {
        replace_item(
            &mut c.education,
            |e| e.degree.as_str(),
            &degree,
            item,
            "Education not found",
        )
    })
    .await?;
    done("Education updated successfully")
}

/// DELETE /candidates/me/education/{degree}
pub async fn delete_education(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Path(degree): Path<String>,
) -> ApiResult<MessageResponse> {
    edit_profile(&state, &user.email, |c| {
        remove_items(&mut c.education, |e| e.degree.as_str(), &degree, "Education not found")
    })
    .await?;
    done("Education deleted successfully")
}

// ==================== EXPERIENCE ====================

/// POST /candidates/me/experience
pub async fn add_experience(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Json(item): Json<ExperienceItem>,
) -> ApiResult<MessageResponse> {
    require(&item.role, "Role")?;
    edit_profile(&state, &user.email, |c| {
        c.experience.push(item);
        Ok(())
    })
    .await?;
    done("Experience added successfully")
}

/// PUT /candidates/me/experience/{role}
pub async fn update_experience(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Path(role): Path<String>,
    Json(item): Json<ExperienceItem>,
) -> ApiResult<MessageResponse> {
    require(&item.role, "Role")?;
    edit_profile(&state, &user.email, |c| {
        replace_item(
            &mut c.experience,
            |e| e.role.as_str(),
            &role,
            item,
            "Experience not found",
        )
    })
    .await?;
    done("Experience updated successfully")
}

/// DELETE /candidates/me/experience/{role}
pub async fn delete_experience(
    State(state): State<AppState>,
    CandidateAuth(user): CandidateAuth,
    Path(role): Path<String>,
) -> ApiResult<MessageResponse> {
    edit_profile(&state, &user.email, |c| {
        remove_items(&mut c.experience, |e| e.role.as_str(), &role, "Experience not found")
    })
    .await?;
    done("Experience deleted successfully")
}
