//! Job posting model.

use serde::{Deserialize, Serialize};

use super::{non_blank, non_empty};

/// Source tag for jobs posted by HR users.
pub const SOURCE_HR: &str = "hr";
/// Source tag for jobs imported from the external job feed.
pub const SOURCE_API: &str = "api";
/// `posted_by` value for imported jobs.
pub const SYSTEM_POSTER: &str = "system@autofetch.ai";

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub description: String,
    pub required_skills: Vec<String>,
    pub job_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub source: String,
    pub posted_by: String,
    pub created_at: String,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip)]
    pub version: i64,
}

impl Job {
    /// HR ownership rule: imported jobs are shared, HR jobs belong to their poster.
    pub fn is_managed_by(&self, hr_email: &str) -> bool {
        self.source == SOURCE_API || self.posted_by == hr_email
    }
}

fn default_job_type() -> String {
    "Full-time".to_string()
}

/// Request body for `POST /hr/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    #[serde(default = "default_job_type")]
    pub job_type: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Everything needed to insert a job row, regardless of where it came from.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub company: Option<String>,
    pub description: String,
    pub required_skills: Vec<String>,
    pub job_type: String,
    pub location: Option<String>,
    pub source: String,
    pub posted_by: String,
}

/// Request body for `PUT /hr/jobs/{id}`. Blank values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateJobRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub required_skills: Option<Vec<String>>,
    #[serde(default)]
    pub job_type: Option<String>,
}

impl UpdateJobRequest {
    pub fn normalized(&self) -> UpdateJobRequest {
        UpdateJobRequest {
            title: non_blank(&self.title),
            description: non_blank(&self.description),
            location: non_blank(&self.location),
            required_skills: non_empty(&self.required_skills),
            job_type: non_blank(&self.job_type),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.required_skills.is_none()
            && self.job_type.is_none()
    }
}

/// A job annotated with its match score for a candidate.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredJob {
    #[serde(flatten)]
    pub job: Job,
    pub match_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(source: &str, posted_by: &str) -> Job {
        Job {
            id: "j1".to_string(),
            title: "Backend Engineer".to_string(),
            company: None,
            description: "Build APIs".to_string(),
            required_skills: vec![],
            job_type: default_job_type(),
            location: None,
            source: source.to_string(),
            posted_by: posted_by.to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            embedding: None,
            version: 1,
        }
    }

    #[test]
    fn test_ownership_rule() {
        assert!(job(SOURCE_HR, "a@corp.io").is_managed_by("a@corp.io"));
        assert!(!job(SOURCE_HR, "a@corp.io").is_managed_by("b@corp.io"));
        assert!(job(SOURCE_API, SYSTEM_POSTER).is_managed_by("b@corp.io"));
    }

    #[test]
    fn test_scored_job_flattens() {
        let scored = ScoredJob {
            job: job(SOURCE_HR, "a@corp.io"),
            match_score: 0.42,
        };
        let value = serde_json::to_value(&scored).unwrap();
        assert_eq!(value["title"], "Backend Engineer");
        assert_eq!(value["match_score"], 0.42);
        assert!(value.get("embedding").is_none());
    }

    #[test]
    fn test_update_request_empty_after_normalizing() {
        let request = UpdateJobRequest {
            title: Some(" ".to_string()),
            required_skills: Some(vec![]),
            ..Default::default()
        };
        assert!(request.normalized().is_empty());
    }
}
