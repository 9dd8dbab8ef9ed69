//! Candidate/job matching.
//!
//! A match score blends semantic similarity of the profile and job texts with
//! explicit skill overlap and a small bonus for work history.

mod embedder;

pub use embedder::*;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{is_valid_id, Candidate, Job, ScoredCandidate, ScoredJob};

const SEMANTIC_WEIGHT: f64 = 0.6;
const SKILL_WEIGHT: f64 = 0.3;
const EXPERIENCE_WEIGHT: f64 = 0.1;

const BOOST_PER_EXPERIENCE: f64 = 0.05;
const MAX_EXPERIENCE_BOOST: f64 = 0.2;

/// Missing skills that get a learning recommendation.
const MAX_RECOMMENDATIONS: usize = 5;

/// Result of comparing a candidate's skills to a job's requirements.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkillGapReport {
    pub job_title: String,
    pub match_percentage: f64,
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub total_required: usize,
    pub recommendations: Vec<String>,
}

/// Text a candidate is embedded from.
pub fn candidate_text(candidate: &Candidate) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(bio) = &candidate.bio {
        parts.push(bio.clone());
    }
    if !candidate.skills.is_empty() {
        let skills: Vec<String> = candidate
            .skills
            .iter()
            .map(|s| format!("{} ({} stars)", s.name, s.level / 10))
            .collect();
        parts.push(skills.join(" "));
    }
    for exp in &candidate.experience {
        parts.push(exp.role.clone());
        if let Some(description) = &exp.description {
            parts.push(description.clone());
        }
    }
    for edu in &candidate.education {
        parts.push(edu.degree.clone());
        parts.push(edu.institution.clone());
    }
    for item in &candidate.portfolio {
        parts.push(item.title.clone());
        if let Some(description) = &item.description {
            parts.push(description.clone());
        }
    }

    join_parts(parts)
}

/// Text a job is embedded from.
pub fn job_text(job: &Job) -> String {
    let mut parts = vec![job.title.clone()];
    if let Some(company) = &job.company {
        parts.push(company.clone());
    }
    parts.push(job.description.clone());
    parts.push(job.required_skills.join(" "));
    parts.push(job.job_type.clone());
    if let Some(location) = &job.location {
        parts.push(location.clone());
    }

    join_parts(parts)
}

fn join_parts(parts: Vec<String>) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Proficiency-weighted share of the required skills the candidate has.
///
/// When a skill name is listed twice the later entry's level counts.
pub fn skill_match(candidate: &Candidate, job: &Job) -> f64 {
    if candidate.skills.is_empty() || job.required_skills.is_empty() {
        return 0.0;
    }

    let total: f64 = job
        .required_skills
        .iter()
        .filter_map(|required| {
            candidate
                .skills
                .iter()
                .rev()
                .find(|s| s.name.to_lowercase() == required.to_lowercase())
        })
        .map(|s| f64::from(s.level) / 100.0)
        .sum();

    total / job.required_skills.len() as f64
}

pub fn experience_boost(candidate: &Candidate) -> f64 {
    (BOOST_PER_EXPERIENCE * candidate.experience.len() as f64).min(MAX_EXPERIENCE_BOOST)
}

/// Cosine similarity of two vectors, 0 when either is missing or zero.
pub fn cosine_similarity(a: Option<&[f32]>, b: Option<&[f32]>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Weighted blend of the three signals, clamped to [0, 1] and rounded to 3 decimals.
pub fn composite_score(semantic: f64, skill: f64, boost: f64) -> f64 {
    let score = SEMANTIC_WEIGHT * semantic + SKILL_WEIGHT * skill + EXPERIENCE_WEIGHT * boost;
    round_to(score.clamp(0.0, 1.0), 3)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Capitalise the first letter of every word and lowercase the rest.
///
/// A word starts after any non-alphabetic character, so `"node.js"` becomes `"Node.Js"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Compare skill sets, case-insensitively.
pub fn skill_gap_report(candidate: &Candidate, job: &Job) -> SkillGapReport {
    let have: BTreeSet<String> = candidate
        .skills
        .iter()
        .map(|s| s.name.to_lowercase())
        .collect();
    let required: BTreeSet<String> = job
        .required_skills
        .iter()
        .map(|s| s.to_lowercase())
        .collect();

    let matching: Vec<String> = required.intersection(&have).cloned().collect();
    let missing: Vec<String> = required.difference(&have).cloned().collect();

    let match_percentage = if required.is_empty() {
        0.0
    } else {
        round_to(100.0 * matching.len() as f64 / required.len() as f64, 1)
    };

    let recommendations = missing
        .iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|skill| {
            format!(
                "Consider learning {} through online courses or certifications",
                title_case(skill)
            )
        })
        .collect();

    SkillGapReport {
        job_title: job.title.clone(),
        match_percentage,
        matching_skills: matching,
        missing_skills: missing,
        total_required: required.len(),
        recommendations,
    }
}

/// Scores candidates against jobs, caching embeddings in the repository.
pub struct MatchingEngine {
    embedder: Box<dyn Embedder>,
}

impl MatchingEngine {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self { embedder }
    }

    fn usable<'a>(&self, cached: Option<&'a Vec<f32>>) -> Option<&'a Vec<f32>> {
        cached.filter(|v| v.len() == self.embedder.dimensions())
    }

    /// Cached candidate embedding, computed and stored on a miss.
    pub async fn candidate_embedding(
        &self,
        repo: &Repository,
        candidate: &Candidate,
    ) -> Option<Vec<f32>> {
        if let Some(cached) = self.usable(candidate.embedding.as_ref()) {
            return Some(cached.clone());
        }

        let embedding = self.embedder.embed(&candidate_text(candidate))?;
        match repo
            .store_candidate_embedding(&candidate.id, candidate.version, &embedding)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(candidate_id = %candidate.id, "Profile changed while embedding, not cached")
            }
            Err(e) => {
                tracing::warn!(candidate_id = %candidate.id, "Failed to cache candidate embedding: {}", e)
            }
        }
        Some(embedding)
    }

    /// Cached job embedding, computed and stored on a miss.
    pub async fn job_embedding(&self, repo: &Repository, job: &Job) -> Option<Vec<f32>> {
        if let Some(cached) = self.usable(job.embedding.as_ref()) {
            return Some(cached.clone());
        }

        let embedding = self.embedder.embed(&job_text(job))?;
        match repo.store_job_embedding(&job.id, job.version, &embedding).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(job_id = %job.id, "Job changed while embedding, not cached"),
            Err(e) => tracing::warn!(job_id = %job.id, "Failed to cache job embedding: {}", e),
        }
        Some(embedding)
    }

    /// Match score in [0, 1] for a candidate/job pair.
    pub async fn match_score(&self, repo: &Repository, candidate: &Candidate, job: &Job) -> f64 {
        if candidate_text(candidate).is_empty() || job_text(job).is_empty() {
            return 0.0;
        }

        let candidate_vec = self.candidate_embedding(repo, candidate).await;
        let job_vec = self.job_embedding(repo, job).await;
        self.score_with(candidate, job, candidate_vec.as_deref(), job_vec.as_deref())
    }

    fn score_with(
        &self,
        candidate: &Candidate,
        job: &Job,
        candidate_vec: Option<&[f32]>,
        job_vec: Option<&[f32]>,
    ) -> f64 {
        if candidate_vec.is_none() || job_vec.is_none() {
            return 0.0;
        }
        composite_score(
            cosine_similarity(candidate_vec, job_vec),
            skill_match(candidate, job),
            experience_boost(candidate),
        )
    }

    /// Best-scoring jobs for a candidate. Unknown candidates get an empty list.
    pub async fn recommend_jobs(
        &self,
        repo: &Repository,
        candidate_email: &str,
        top_n: usize,
        source: Option<&str>,
    ) -> Result<Vec<ScoredJob>, AppError> {
        let Some(candidate) = repo.get_candidate_by_email(candidate_email).await? else {
            return Ok(Vec::new());
        };

        let candidate_vec = self.candidate_embedding(repo, &candidate).await;
        let jobs = repo.list_jobs(source).await?;

        let mut scored = Vec::with_capacity(jobs.len());
        for job in jobs {
            let job_vec = self.job_embedding(repo, &job).await;
            let match_score =
                self.score_with(&candidate, &job, candidate_vec.as_deref(), job_vec.as_deref());
            scored.push(ScoredJob { job, match_score });
        }

        scored.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        scored.truncate(top_n);
        Ok(scored)
    }

    /// Best-scoring candidates for a job. Invalid or unknown jobs get an empty list.
    pub async fn recommend_candidates(
        &self,
        repo: &Repository,
        job_id: &str,
        top_n: usize,
    ) -> Result<Vec<ScoredCandidate>, AppError> {
        if !is_valid_id(job_id) {
            return Ok(Vec::new());
        }
        let Some(job) = repo.get_job(job_id).await? else {
            return Ok(Vec::new());
        };

        let job_vec = self.job_embedding(repo, &job).await;
        let candidates = repo.list_candidates().await?;

        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let candidate_vec = self.candidate_embedding(repo, &candidate).await;
            let match_score =
                self.score_with(&candidate, &job, candidate_vec.as_deref(), job_vec.as_deref());
            scored.push(ScoredCandidate {
                candidate,
                match_score,
            });
        }

        scored.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        scored.truncate(top_n);
        Ok(scored)
    }

    /// Skill gap between a candidate and a job.
    pub async fn skill_gap(
        &self,
        repo: &Repository,
        candidate_email: &str,
        job_id: &str,
    ) -> Result<SkillGapReport, AppError> {
        if !is_valid_id(job_id) {
            return Err(AppError::NotFound("Invalid job ID".to_string()));
        }

        let candidate = repo.get_candidate_by_email(candidate_email).await?;
        let job = repo.get_job(job_id).await?;
        match (candidate, job) {
            (Some(candidate), Some(job)) => Ok(skill_gap_report(&candidate, &job)),
            _ => Err(AppError::NotFound("Candidate or job not found".to_string())),
        }
    }

    /// Compute and store embeddings for jobs that have none. Returns how many were stored.
    pub async fn embed_missing_jobs(
        &self,
        repo: &Repository,
        source: Option<&str>,
    ) -> Result<usize, AppError> {
        let jobs = repo.list_jobs_missing_embedding(source).await?;
        let mut stored = 0;
        for job in &jobs {
            if let Some(embedding) = self.embedder.embed(&job_text(job)) {
                if repo
                    .store_job_embedding(&job.id, job.version, &embedding)
                    .await?
                {
                    stored += 1;
                }
            }
        }

        if stored > 0 {
            tracing::info!("Generated embeddings for {} jobs", stored);
        }
        Ok(stored)
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(Box::new(HashingEmbedder::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExperienceItem, NewJob, Role, SkillItem, SOURCE_HR};
    use chrono::NaiveDate;

    fn candidate(skills: &[(&str, i32)], experience: usize) -> Candidate {
        Candidate {
            id: "c1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::Candidate,
            bio: Some("Backend developer who loves Python".to_string()),
            profile_picture: None,
            skills: skills
                .iter()
                .map(|(name, level)| SkillItem {
                    name: name.to_string(),
                    level: *level,
                })
                .collect(),
            portfolio: vec![],
            education: vec![],
            experience: (0..experience)
                .map(|i| ExperienceItem {
                    role: format!("Engineer {}", i),
                    company: "Acme".to_string(),
                    start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    end_date: None,
                    description: None,
                })
                .collect(),
            recommendations: vec![],
            created_at: "2024-01-01T00:00:00Z".to_string(),
            embedding: None,
            version: 1,
        }
    }

    fn job(required: &[&str]) -> Job {
        Job {
            id: "j1".to_string(),
            title: "Python Developer".to_string(),
            company: Some("Acme".to_string()),
            description: "Build backend services".to_string(),
            required_skills: required.iter().map(|s| s.to_string()).collect(),
            job_type: "Full-time".to_string(),
            location: Some("Remote".to_string()),
            source: SOURCE_HR.to_string(),
            posted_by: "hr@acme.com".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            embedding: None,
            version: 1,
        }
    }

    #[test]
    fn test_candidate_text() {
        let c = candidate(&[("Python", 85)], 1);
        assert_eq!(
            candidate_text(&c),
            "Backend developer who loves Python Python (8 stars) Engineer 0"
        );
    }

    #[test]
    fn test_job_text() {
        let j = job(&["Python", "SQL"]);
        assert_eq!(
            job_text(&j),
            "Python Developer Acme Build backend services Python SQL Full-time Remote"
        );
    }

    #[test]
    fn test_skill_match_weights_by_level() {
        let c = candidate(&[("python", 80), ("Docker", 60)], 0);
        let j = job(&["Python", "SQL"]);
        assert!((skill_match(&c, &j) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_skill_match_empty_sides() {
        assert_eq!(skill_match(&candidate(&[], 0), &job(&["Python"])), 0.0);
        assert_eq!(skill_match(&candidate(&[("Python", 90)], 0), &job(&[])), 0.0);
    }

    #[test]
    fn test_experience_boost_is_capped() {
        assert!((experience_boost(&candidate(&[], 2)) - 0.1).abs() < 1e-9);
        assert!((experience_boost(&candidate(&[], 10)) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        let v: &[f32] = &[1.0, 0.0];
        let zero: &[f32] = &[0.0, 0.0];
        assert_eq!(cosine_similarity(None, Some(v)), 0.0);
        assert_eq!(cosine_similarity(Some(zero), Some(v)), 0.0);
        assert!((cosine_similarity(Some(v), Some(v)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_composite_score_clamped_and_rounded() {
        assert_eq!(composite_score(1.0, 1.0, 1.0), 1.0);
        assert_eq!(composite_score(-1.0, 0.0, 0.0), 0.0);
        assert_eq!(composite_score(0.5, 0.5, 0.1), 0.46);
        assert_eq!(composite_score(0.12345, 0.0, 0.0), 0.074);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("machine learning"), "Machine Learning");
        assert_eq!(title_case("node.js"), "Node.Js");
        assert_eq!(title_case("AWS"), "Aws");
    }

    #[test]
    fn test_skill_gap_report() {
        let c = candidate(&[("python", 80), ("Docker", 60)], 0);
        let j = job(&["Python", "SQL", "kubernetes"]);
        let report = skill_gap_report(&c, &j);

        assert_eq!(report.job_title, "Python Developer");
        assert_eq!(report.matching_skills, vec!["python"]);
        assert_eq!(report.missing_skills, vec!["kubernetes", "sql"]);
        assert_eq!(report.total_required, 3);
        assert_eq!(report.match_percentage, 33.3);
        assert_eq!(
            report.recommendations[0],
            "Consider learning Kubernetes through online courses or certifications"
        );
    }

    #[test]
    fn test_skill_gap_limits_recommendations() {
        let c = candidate(&[], 0);
        let j = job(&["a", "b", "c", "d", "e", "f", "g"]);
        let report = skill_gap_report(&c, &j);
        assert_eq!(report.missing_skills.len(), 7);
        assert_eq!(report.recommendations.len(), 5);
        assert_eq!(report.match_percentage, 0.0);
    }

    #[test]
    fn test_skill_gap_nothing_required() {
        let report = skill_gap_report(&candidate(&[("Python", 50)], 0), &job(&[]));
        assert_eq!(report.total_required, 0);
        assert_eq!(report.match_percentage, 0.0);
    }

    async fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::TempDir::new().unwrap();
        let pool = crate::db::init_database(&dir.path().join("test.db"))
            .await
            .unwrap();
        (dir, Repository::new(pool))
    }

    #[test]
    fn test_skill_match_uses_last_duplicate() {
        let c = candidate(&[("Rust", 20), ("rust", 80)], 0);
        assert_eq!(skill_match(&c, &job(&["Rust"])), 0.8);
    }

    fn register(skills: &[(&str, i32)]) -> crate::models::RegisterCandidateRequest {
        crate::models::RegisterCandidateRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "irrelevant".to_string(),
            bio: Some("Backend developer".to_string()),
            skills: candidate(skills, 0).skills,
            portfolio: vec![],
            education: vec![],
            experience: vec![],
        }
    }

    #[tokio::test]
    async fn test_wrong_dimension_cache_is_recomputed() {
        let (_dir, repo) = test_repo().await;
        let engine = MatchingEngine::default();

        let created = repo
            .create_candidate(&register(&[("Python", 60)]), "ada@example.com", "hash")
            .await
            .unwrap();
        repo.store_candidate_embedding(&created.id, created.version, &[1.0, 0.0])
            .await
            .unwrap();

        let stored = repo
            .get_candidate_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.embedding.as_ref().map(Vec::len), Some(2));

        let embedding = engine.candidate_embedding(&repo, &stored).await.unwrap();
        assert_eq!(embedding.len(), HashingEmbedder::DEFAULT_DIMENSIONS);

        let refreshed = repo
            .get_candidate_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.embedding, Some(embedding));
    }

    #[tokio::test]
    async fn test_profile_edit_during_scoring_leaves_cache_empty() {
        let (_dir, repo) = test_repo().await;
        let engine = MatchingEngine::default();

        repo.create_candidate(&register(&[("Python", 60)]), "ada@example.com", "hash")
            .await
            .unwrap();
        let before_edit = repo
            .get_candidate_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();

        repo.modify_candidate("ada@example.com", |c| {
            c.skills = candidate(&[("Rust", 90)], 0).skills;
            Ok(())
        })
        .await
        .unwrap();

        assert!(engine.candidate_embedding(&repo, &before_edit).await.is_some());

        let current = repo
            .get_candidate_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.skills[0].name, "Rust");
        assert!(current.embedding.is_none());

        let fresh = engine.candidate_embedding(&repo, &current).await.unwrap();
        let cached = repo
            .get_candidate_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap()
            .embedding;
        assert_eq!(cached, Some(fresh));
    }

    #[tokio::test]
    async fn test_embed_missing_jobs_caches_vectors() {
        let (_dir, repo) = test_repo().await;
        let engine = MatchingEngine::default();

        repo.create_job(&NewJob {
            title: "Rust Engineer".to_string(),
            company: Some("Acme".to_string()),
            description: "Systems work".to_string(),
            required_skills: vec!["Rust".to_string()],
            job_type: "Full-time".to_string(),
            location: None,
            source: SOURCE_HR.to_string(),
            posted_by: "hr@acme.com".to_string(),
        })
        .await
        .unwrap();

        assert_eq!(engine.embed_missing_jobs(&repo, None).await.unwrap(), 1);
        assert_eq!(engine.embed_missing_jobs(&repo, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recommend_for_unknown_records_is_empty() {
        let (_dir, repo) = test_repo().await;
        let engine = MatchingEngine::default();

        let jobs = engine
            .recommend_jobs(&repo, "nobody@example.com", 10, None)
            .await
            .unwrap();
        assert!(jobs.is_empty());

        let candidates = engine
            .recommend_candidates(&repo, "not-an-id", 10)
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_skill_gap_invalid_job_id() {
        let (_dir, repo) = test_repo().await;
        let engine = MatchingEngine::default();

        let err = engine
            .skill_gap(&repo, "ada@example.com", "bogus")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Invalid job ID");
    }
}
