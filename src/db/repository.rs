//! Database repository for CRUD operations.
//!
//! Nested profile sections and embeddings are stored as JSON text columns.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    now_rfc3339, Application, ApplicationStatus, Candidate, Credentials, HrUser, Job, NewJob,
    RegisterCandidateRequest, RegisterHrRequest, Role, UpdateHrRequest, UpdateJobRequest,
};

const CANDIDATE_COLUMNS: &str = "id, name, email, bio, profile_picture, skills, portfolio, education, experience, recommendations, embedding, created_at, version";
const HR_COLUMNS: &str = "id, name, email, company, bio, profile_picture, created_at";
const JOB_COLUMNS: &str = "id, title, company, description, required_skills, job_type, location, source, posted_by, created_at, embedding, version";
const APPLICATION_COLUMNS: &str =
    "id, candidate_email, job_id, applied_at, status, matching_score, job_source";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

fn user_table(role: Role) -> &'static str {
    match role {
        Role::Candidate => "candidates",
        Role::Hr => "hr_users",
    }
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== CREDENTIALS ====================

    /// Check whether an account with this email exists for the role.
    pub async fn email_exists(&self, role: Role, email: &str) -> Result<bool, AppError> {
        let sql = format!("SELECT 1 FROM {} WHERE email = ?", user_table(role));
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Get login and reset columns for a user.
    pub async fn get_credentials(
        &self,
        role: Role,
        email: &str,
    ) -> Result<Option<Credentials>, AppError> {
        let sql = format!(
            "SELECT id, email, name, password_hash, reset_code, reset_code_expiry FROM {} WHERE email = ?",
            user_table(role)
        );
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Credentials {
            id: row.get("id"),
            email: row.get("email"),
            name: row.get("name"),
            password_hash: row.get("password_hash"),
            reset_code: row.get("reset_code"),
            reset_code_expiry: row.get("reset_code_expiry"),
        }))
    }

    /// Store a pending password-reset code.
    pub async fn set_reset_code(
        &self,
        role: Role,
        email: &str,
        code: &str,
        expires_at: &str,
    ) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET reset_code = ?, reset_code_expiry = ? WHERE email = ?",
            user_table(role)
        );
        sqlx::query(&sql)
            .bind(code)
            .bind(expires_at)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace the password hash and clear any pending reset code.
    pub async fn reset_password(
        &self,
        role: Role,
        email: &str,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET password_hash = ?, reset_code = NULL, reset_code_expiry = NULL WHERE email = ?",
            user_table(role)
        );
        let result = sqlx::query(&sql)
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    // ==================== TOKEN BLACKLIST ====================

    /// Record a revoked token fingerprint. Returns false if it was already revoked.
    pub async fn blacklist_token(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO blacklisted_tokens (token_hash, blacklisted_at) VALUES (?, ?)",
        )
        .bind(token_hash)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_token_blacklisted(&self, token_hash: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM blacklisted_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    // ==================== CANDIDATE OPERATIONS ====================

    /// Create a new candidate account.
    pub async fn create_candidate(
        &self,
        request: &RegisterCandidateRequest,
        email: &str,
        password_hash: &str,
    ) -> Result<Candidate, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();

        sqlx::query(
            "INSERT INTO candidates (id, name, email, password_hash, bio, skills, portfolio, education, experience, recommendations, created_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, 1)"
        )
        .bind(&id)
        .bind(&request.name)
        .bind(email)
        .bind(password_hash)
        .bind(&request.bio)
        .bind(to_json(&request.skills))
        .bind(to_json(&request.portfolio))
        .bind(to_json(&request.education))
        .bind(to_json(&request.experience))
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(duplicate_email)?;

        Ok(Candidate {
            id,
            name: request.name.clone(),
            email: email.to_string(),
            role: Role::Candidate,
            bio: request.bio.clone(),
            profile_picture: None,
            skills: request.skills.clone(),
            portfolio: request.portfolio.clone(),
            education: request.education.clone(),
            experience: request.experience.clone(),
            recommendations: Vec::new(),
            created_at: now,
            embedding: None,
            version: 1,
        })
    }

    /// Get a candidate by email.
    pub async fn get_candidate_by_email(&self, email: &str) -> Result<Option<Candidate>, AppError> {
        let sql = format!("SELECT {} FROM candidates WHERE email = ?", CANDIDATE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(candidate_from_row))
    }

    /// List all candidates.
    pub async fn list_candidates(&self) -> Result<Vec<Candidate>, AppError> {
        let sql = format!("SELECT {} FROM candidates ORDER BY name", CANDIDATE_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(candidate_from_row).collect())
    }

    /// List candidates that have at least one skill with one of the given names.
    pub async fn search_candidates_by_skills(
        &self,
        skills: &[String],
    ) -> Result<Vec<Candidate>, AppError> {
        let candidates = self.list_candidates().await?;
        if skills.is_empty() {
            return Ok(candidates);
        }

        Ok(candidates
            .into_iter()
            .filter(|c| c.skills.iter().any(|s| skills.contains(&s.name)))
            .collect())
    }

    /// Read-modify-write a candidate profile.
    ///
    /// The closure may reject the change with an error, in which case nothing is written.
    /// Writes are conditional on the row version and clear the cached embedding.
    pub async fn modify_candidate<F>(&self, email: &str, modify: F) -> Result<Candidate, AppError>
    where
        F: FnOnce(&mut Candidate) -> Result<(), AppError>,
    {
        let mut candidate = self
            .get_candidate_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("Candidate not found".to_string()))?;

        let expected_version = candidate.version;
        modify(&mut candidate)?;

        let result = sqlx::query(
            "UPDATE candidates SET name = ?, bio = ?, skills = ?, portfolio = ?, education = ?, experience = ?, recommendations = ?, embedding = NULL, version = ? WHERE id = ? AND version = ?"
        )
        .bind(&candidate.name)
        .bind(&candidate.bio)
        .bind(to_json(&candidate.skills))
        .bind(to_json(&candidate.portfolio))
        .bind(to_json(&candidate.education))
        .bind(to_json(&candidate.experience))
        .bind(to_json(&candidate.recommendations))
        .bind(expected_version + 1)
        .bind(&candidate.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "Concurrent modification detected".to_string(),
            ));
        }

        candidate.version = expected_version + 1;
        candidate.embedding = None;
        Ok(candidate)
    }

    /// Set the profile picture URL. Returns false when no candidate matched.
    pub async fn set_candidate_picture(&self, email: &str, url: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE candidates SET profile_picture = ? WHERE email = ?")
            .bind(url)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cache a candidate embedding computed from the profile at `version`.
    ///
    /// Returns false when the profile has changed since, leaving the cache empty.
    pub async fn store_candidate_embedding(
        &self,
        id: &str,
        version: i64,
        embedding: &[f32],
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE candidates SET embedding = ? WHERE id = ? AND version = ?")
                .bind(to_json(&embedding))
                .bind(id)
                .bind(version)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== HR OPERATIONS ====================

    /// Create a new HR account.
    pub async fn create_hr(
        &self,
        request: &RegisterHrRequest,
        email: &str,
        password_hash: &str,
    ) -> Result<HrUser, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();

        sqlx::query(
            "INSERT INTO hr_users (id, name, email, password_hash, company, bio, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&request.name)
        .bind(email)
        .bind(password_hash)
        .bind(&request.company)
        .bind(&request.bio)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(duplicate_email)?;

        Ok(HrUser {
            id,
            name: request.name.clone(),
            email: email.to_string(),
            role: Role::Hr,
            company: request.company.clone(),
            bio: request.bio.clone(),
            profile_picture: None,
            created_at: now,
        })
    }

    pub async fn get_hr_by_email(&self, email: &str) -> Result<Option<HrUser>, AppError> {
        let sql = format!("SELECT {} FROM hr_users WHERE email = ?", HR_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(hr_from_row))
    }

    /// Apply a normalized profile update. Returns false when no HR user matched.
    pub async fn update_hr(&self, email: &str, request: &UpdateHrRequest) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE hr_users SET name = COALESCE(?, name), bio = COALESCE(?, bio), company = COALESCE(?, company) WHERE email = ?"
        )
        .bind(&request.name)
        .bind(&request.bio)
        .bind(&request.company)
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_hr_picture(&self, email: &str, url: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE hr_users SET profile_picture = ? WHERE email = ?")
            .bind(url)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== JOB OPERATIONS ====================

    /// Insert a job posting.
    pub async fn create_job(&self, new_job: &NewJob) -> Result<Job, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();

        sqlx::query(
            "INSERT INTO jobs (id, title, company, description, required_skills, job_type, location, source, posted_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&new_job.title)
        .bind(&new_job.company)
        .bind(&new_job.description)
        .bind(to_json(&new_job.required_skills))
        .bind(&new_job.job_type)
        .bind(&new_job.location)
        .bind(&new_job.source)
        .bind(&new_job.posted_by)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Job {
            id,
            title: new_job.title.clone(),
            company: new_job.company.clone(),
            description: new_job.description.clone(),
            required_skills: new_job.required_skills.clone(),
            job_type: new_job.job_type.clone(),
            location: new_job.location.clone(),
            source: new_job.source.clone(),
            posted_by: new_job.posted_by.clone(),
            created_at: now,
            embedding: None,
            version: 1,
        })
    }

    /// Get a job by ID.
    pub async fn get_job(&self, id: &str) -> Result<Option<Job>, AppError> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(job_from_row))
    }

    /// List jobs, optionally restricted to one source.
    pub async fn list_jobs(&self, source: Option<&str>) -> Result<Vec<Job>, AppError> {
        let sql = format!(
            "SELECT {} FROM jobs WHERE (? IS NULL OR source = ?) ORDER BY created_at DESC",
            JOB_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(source)
            .bind(source)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(job_from_row).collect())
    }

    /// List jobs posted by one HR user, newest first.
    pub async fn list_jobs_by_poster(&self, email: &str) -> Result<Vec<Job>, AppError> {
        let sql = format!(
            "SELECT {} FROM jobs WHERE posted_by = ? ORDER BY created_at DESC",
            JOB_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(email)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(job_from_row).collect())
    }

    /// List jobs whose embedding has not been computed yet.
    pub async fn list_jobs_missing_embedding(
        &self,
        source: Option<&str>,
    ) -> Result<Vec<Job>, AppError> {
        let sql = format!(
            "SELECT {} FROM jobs WHERE embedding IS NULL AND (? IS NULL OR source = ?)",
            JOB_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(source)
            .bind(source)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(job_from_row).collect())
    }

    /// Update a job owned by `posted_by`. Returns None when no owned job matched.
    pub async fn update_job(
        &self,
        id: &str,
        posted_by: &str,
        request: &UpdateJobRequest,
    ) -> Result<Option<Job>, AppError> {
        let skills_json = request.required_skills.as_ref().map(to_json);

        let result = sqlx::query(
            r#"UPDATE jobs SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                location = COALESCE(?, location),
                required_skills = COALESCE(?, required_skills),
                job_type = COALESCE(?, job_type),
                embedding = NULL,
                version = version + 1
            WHERE id = ? AND posted_by = ?"#,
        )
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.location)
        .bind(&skills_json)
        .bind(&request.job_type)
        .bind(id)
        .bind(posted_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_job(id).await
    }

    /// Delete a job owned by `posted_by`. Returns false when no owned job matched.
    pub async fn delete_job(&self, id: &str, posted_by: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ? AND posted_by = ?")
            .bind(id)
            .bind(posted_by)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cache a job embedding computed from the job at `version`.
    ///
    /// Returns false when the job has been edited or deleted since.
    pub async fn store_job_embedding(
        &self,
        id: &str,
        version: i64,
        embedding: &[f32],
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE jobs SET embedding = ? WHERE id = ? AND version = ?")
            .bind(to_json(&embedding))
            .bind(id)
            .bind(version)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== APPLICATION OPERATIONS ====================

    pub async fn has_applied(&self, candidate_email: &str, job_id: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM applications WHERE candidate_email = ? AND job_id = ?")
            .bind(candidate_email)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Create a pending application.
    pub async fn create_application(
        &self,
        candidate_email: &str,
        job: &Job,
        matching_score: f64,
    ) -> Result<Application, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let status = ApplicationStatus::Pending;

        sqlx::query(
            "INSERT INTO applications (id, candidate_email, job_id, applied_at, status, matching_score, job_source) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(candidate_email)
        .bind(&job.id)
        .bind(&now)
        .bind(status.as_str())
        .bind(matching_score)
        .bind(&job.source)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::BadRequest("You have already applied to this job".to_string())
            }
            other => AppError::from(other),
        })?;

        Ok(Application {
            id,
            candidate_email: candidate_email.to_string(),
            job_id: job.id.clone(),
            applied_at: now,
            status,
            matching_score,
            job_source: job.source.clone(),
        })
    }

    pub async fn get_application(&self, id: &str) -> Result<Option<Application>, AppError> {
        let sql = format!("SELECT {} FROM applications WHERE id = ?", APPLICATION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(application_from_row))
    }

    pub async fn list_applications_for_candidate(
        &self,
        candidate_email: &str,
    ) -> Result<Vec<Application>, AppError> {
        let sql = format!(
            "SELECT {} FROM applications WHERE candidate_email = ? ORDER BY applied_at DESC",
            APPLICATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(candidate_email)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(application_from_row).collect())
    }

    /// List applications for a job, best match first.
    pub async fn list_applications_for_job(
        &self,
        job_id: &str,
    ) -> Result<Vec<Application>, AppError> {
        let sql = format!(
            "SELECT {} FROM applications WHERE job_id = ? ORDER BY matching_score DESC, applied_at",
            APPLICATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(application_from_row).collect())
    }

    pub async fn update_application_status(
        &self,
        id: &str,
        status: ApplicationStatus,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE applications SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Application not found".to_string()));
        }
        Ok(())
    }
}

// Helper functions for row conversion

fn candidate_from_row(row: &sqlx::sqlite::SqliteRow) -> Candidate {
    let skills: String = row.get("skills");
    let portfolio: String = row.get("portfolio");
    let education: String = row.get("education");
    let experience: String = row.get("experience");
    let recommendations: String = row.get("recommendations");
    let embedding: Option<String> = row.get("embedding");

    Candidate {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role: Role::Candidate,
        bio: row.get("bio"),
        profile_picture: row.get("profile_picture"),
        skills: parse_json_array(&skills),
        portfolio: parse_json_array(&portfolio),
        education: parse_json_array(&education),
        experience: parse_json_array(&experience),
        recommendations: parse_json_array(&recommendations),
        created_at: row.get("created_at"),
        embedding: embedding.map(|s| parse_json_array(&s)),
        version: row.get("version"),
    }
}

fn hr_from_row(row: &sqlx::sqlite::SqliteRow) -> HrUser {
    HrUser {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role: Role::Hr,
        company: row.get("company"),
        bio: row.get("bio"),
        profile_picture: row.get("profile_picture"),
        created_at: row.get("created_at"),
    }
}

fn job_from_row(row: &sqlx::sqlite::SqliteRow) -> Job {
    let required_skills: String = row.get("required_skills");
    let embedding: Option<String> = row.get("embedding");

    Job {
        id: row.get("id"),
        title: row.get("title"),
        company: row.get("company"),
        description: row.get("description"),
        required_skills: parse_json_array(&required_skills),
        job_type: row.get("job_type"),
        location: row.get("location"),
        source: row.get("source"),
        posted_by: row.get("posted_by"),
        created_at: row.get("created_at"),
        embedding: embedding.map(|s| parse_json_array(&s)),
        version: row.get("version"),
    }
}

fn application_from_row(row: &sqlx::sqlite::SqliteRow) -> Application {
    let status: String = row.get("status");
    Application {
        id: row.get("id"),
        candidate_email: row.get("candidate_email"),
        job_id: row.get("job_id"),
        applied_at: row.get("applied_at"),
        status: ApplicationStatus::parse(&status).unwrap_or_else(|| {
            tracing::warn!(status = %status, "Unknown stored application status, reading as pending");
            ApplicationStatus::Pending
        }),
        matching_score: row.get("matching_score"),
        job_source: row.get("job_source"),
    }
}

fn parse_json_array<T: DeserializeOwned>(s: &str) -> Vec<T> {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::warn!("Corrupt JSON list column, reading as empty: {}", e);
        Vec::new()
    })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

fn duplicate_email(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::BadRequest("Email already registered".to_string())
        }
        other => AppError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::{SkillItem, SOURCE_API, SOURCE_HR, SYSTEM_POSTER};
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn register(name: &str, skills: Vec<SkillItem>) -> RegisterCandidateRequest {
        RegisterCandidateRequest {
            name: name.to_string(),
            email: String::new(),
            password: "irrelevant".to_string(),
            bio: None,
            skills,
            portfolio: vec![],
            education: vec![],
            experience: vec![],
        }
    }

    fn skill(name: &str, level: i32) -> SkillItem {
        SkillItem {
            name: name.to_string(),
            level,
        }
    }

    fn new_job(source: &str, posted_by: &str) -> NewJob {
        NewJob {
            title: "Data Engineer".to_string(),
            company: Some("Acme".to_string()),
            description: "Pipelines in Python".to_string(),
            required_skills: vec!["python".to_string()],
            job_type: "Full-time".to_string(),
            location: None,
            source: source.to_string(),
            posted_by: posted_by.to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_candidate_email_rejected() {
        let (repo, _dir) = repo().await;
        repo.create_candidate(&register("Ada", vec![]), "ada@example.com", "hash")
            .await
            .unwrap();

        let err = repo
            .create_candidate(&register("Ada 2", vec![]), "ada@example.com", "hash")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Email already registered");
    }

    #[tokio::test]
    async fn test_modify_candidate_bumps_version_and_clears_embedding() {
        let (repo, _dir) = repo().await;
        let created = repo
            .create_candidate(&register("Ada", vec![]), "ada@example.com", "hash")
            .await
            .unwrap();
        repo.store_candidate_embedding(&created.id, created.version, &[0.5, 0.5])
            .await
            .unwrap();

        let updated = repo
            .modify_candidate("ada@example.com", |c| {
                c.skills.push(skill("Rust", 80));
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(updated.version, 2);

        let stored = repo
            .get_candidate_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.skills, vec![skill("Rust", 80)]);
        assert!(stored.embedding.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_modify_candidate_detects_concurrent_edit() {
        let (repo, _dir) = repo().await;
        repo.create_candidate(&register("Ada", vec![]), "ada@example.com", "hash")
            .await
            .unwrap();

        let err = repo
            .modify_candidate("ada@example.com", |c| {
                // Another request commits between our read and our write
                tokio::task::block_in_place(|| {
                    tokio::runtime::Handle::current().block_on(repo.modify_candidate(
                        "ada@example.com",
                        |other| {
                            other.bio = Some("Edited elsewhere".to_string());
                            Ok(())
                        },
                    ))
                })
                .unwrap();
                c.skills.push(skill("Rust", 80));
                Ok(())
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
        assert_eq!(err.message(), "Concurrent modification detected");

        let stored = repo
            .get_candidate_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.bio.as_deref(), Some("Edited elsewhere"));
        assert!(stored.skills.is_empty());
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_embedding_for_old_version_is_not_cached() {
        let (repo, _dir) = repo().await;
        let stale_candidate = repo
            .create_candidate(&register("Ada", vec![]), "ada@example.com", "hash")
            .await
            .unwrap();
        repo.modify_candidate("ada@example.com", |c| {
            c.skills.push(skill("Rust", 80));
            Ok(())
        })
        .await
        .unwrap();
        assert!(!repo
            .store_candidate_embedding(&stale_candidate.id, stale_candidate.version, &[1.0])
            .await
            .unwrap());

        let stale_job = repo
            .create_job(&new_job(SOURCE_HR, "hr@corp.io"))
            .await
            .unwrap();
        let request = UpdateJobRequest {
            title: Some("Analytics Engineer".to_string()),
            ..Default::default()
        };
        let updated = repo
            .update_job(&stale_job.id, "hr@corp.io", &request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.version, stale_job.version + 1);
        assert!(!repo
            .store_job_embedding(&stale_job.id, stale_job.version, &[1.0])
            .await
            .unwrap());

        let candidate = repo
            .get_candidate_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(candidate.embedding.is_none());
        assert!(repo.get_job(&stale_job.id).await.unwrap().unwrap().embedding.is_none());
    }

    #[tokio::test]
    async fn test_search_candidates_by_skills() {
        let (repo, _dir) = repo().await;
        repo.create_candidate(
            &register("Ada", vec![skill("Rust", 90)]),
            "ada@example.com",
            "hash",
        )
        .await
        .unwrap();
        repo.create_candidate(
            &register("Bob", vec![skill("Java", 60)]),
            "bob@example.com",
            "hash",
        )
        .await
        .unwrap();

        let found = repo
            .search_candidates_by_skills(&["Rust".to_string(), "Go".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "ada@example.com");

        let all = repo.search_candidates_by_skills(&[]).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_job_update_requires_ownership() {
        let (repo, _dir) = repo().await;
        let job = repo
            .create_job(&new_job(SOURCE_HR, "hr@corp.io"))
            .await
            .unwrap();

        let request = UpdateJobRequest {
            title: Some("Senior Data Engineer".to_string()),
            ..Default::default()
        };
        assert!(repo
            .update_job(&job.id, "other@corp.io", &request)
            .await
            .unwrap()
            .is_none());

        let updated = repo
            .update_job(&job.id, "hr@corp.io", &request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Senior Data Engineer");
        assert_eq!(updated.description, "Pipelines in Python");
    }

    #[tokio::test]
    async fn test_jobs_missing_embedding_by_source() {
        let (repo, _dir) = repo().await;
        let hr_job = repo
            .create_job(&new_job(SOURCE_HR, "hr@corp.io"))
            .await
            .unwrap();
        repo.create_job(&new_job(SOURCE_API, SYSTEM_POSTER))
            .await
            .unwrap();
        assert!(repo
            .store_job_embedding(&hr_job.id, hr_job.version, &[1.0])
            .await
            .unwrap());

        assert_eq!(repo.list_jobs_missing_embedding(None).await.unwrap().len(), 1);
        assert!(repo
            .list_jobs_missing_embedding(Some(SOURCE_HR))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(repo.list_jobs(Some(SOURCE_API)).await.unwrap().len(), 1);
        assert_eq!(repo.list_jobs(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_application_rejected() {
        let (repo, _dir) = repo().await;
        let job = repo
            .create_job(&new_job(SOURCE_HR, "hr@corp.io"))
            .await
            .unwrap();

        repo.create_application("ada@example.com", &job, 0.5)
            .await
            .unwrap();
        assert!(repo.has_applied("ada@example.com", &job.id).await.unwrap());

        let err = repo
            .create_application("ada@example.com", &job, 0.5)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "You have already applied to this job");
    }

    #[tokio::test]
    async fn test_corrupt_rows_read_with_fallbacks() {
        let (repo, _dir) = repo().await;
        let created = repo
            .create_candidate(&register("Ada", vec![skill("Rust", 80)]), "ada@example.com", "hash")
            .await
            .unwrap();
        let job = repo
            .create_job(&new_job(SOURCE_HR, "hr@corp.io"))
            .await
            .unwrap();
        let application = repo
            .create_application("ada@example.com", &job, 0.5)
            .await
            .unwrap();

        sqlx::query("UPDATE candidates SET skills = 'not json' WHERE id = ?")
            .bind(&created.id)
            .execute(&repo.pool)
            .await
            .unwrap();
        sqlx::query("UPDATE applications SET status = 'archived' WHERE id = ?")
            .bind(&application.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        let candidate = repo
            .get_candidate_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(candidate.skills.is_empty());
        let stored = repo.get_application(&application.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Pending);
    }

    #[tokio::test]
    async fn test_blacklist_is_idempotent() {
        let (repo, _dir) = repo().await;
        assert!(repo.blacklist_token("abc").await.unwrap());
        assert!(!repo.blacklist_token("abc").await.unwrap());
        assert!(repo.is_token_blacklisted("abc").await.unwrap());
        assert!(!repo.is_token_blacklisted("def").await.unwrap());
    }
}
