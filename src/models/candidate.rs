//! Candidate profile model and its nested profile sections.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{non_blank, non_empty, now_rfc3339, Role};

/// A skill with a self-assessed proficiency percentage (0-100).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillItem {
    pub name: String,
    #[serde(default)]
    pub level: i32,
}

impl SkillItem {
    pub const MAX_LEVEL: i32 = 100;

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Skill name is required".to_string());
        }
        if !(0..=Self::MAX_LEVEL).contains(&self.level) {
            return Err("Skill level must be between 0 and 100".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioItem {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EducationItem {
    pub degree: String,
    pub institution: String,
    pub start_year: i32,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperienceItem {
    pub role: String,
    pub company: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Advice attached to a profile by HR or the matching system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationItem {
    pub skill_name: String,
    pub recommendation_text: String,
    #[serde(default)]
    pub suggested_by: Option<String>,
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

/// A candidate profile as exposed over the API.
///
/// Credentials and the cached embedding live in the same row but are never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub skills: Vec<SkillItem>,
    pub portfolio: Vec<PortfolioItem>,
    pub education: Vec<EducationItem>,
    pub experience: Vec<ExperienceItem>,
    pub recommendations: Vec<RecommendationItem>,
    pub created_at: String,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip)]
    pub version: i64,
}

/// Request body for candidate registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterCandidateRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Vec<SkillItem>,
    #[serde(default)]
    pub portfolio: Vec<PortfolioItem>,
    #[serde(default)]
    pub education: Vec<EducationItem>,
    #[serde(default)]
    pub experience: Vec<ExperienceItem>,
}

/// Request body for `PUT /candidates/me`.
///
/// Null, empty-string and empty-list values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCandidateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Option<Vec<SkillItem>>,
    #[serde(default)]
    pub portfolio: Option<Vec<PortfolioItem>>,
    #[serde(default)]
    pub education: Option<Vec<EducationItem>>,
    #[serde(default)]
    pub experience: Option<Vec<ExperienceItem>>,
}

impl UpdateCandidateRequest {
    /// Drop ignored values and return the names of the fields that remain.
    pub fn normalized(&self) -> (UpdateCandidateRequest, Vec<&'static str>) {
        let cleaned = UpdateCandidateRequest {
            name: non_blank(&self.name),
            bio: non_blank(&self.bio),
            skills: non_empty(&self.skills),
            portfolio: non_empty(&self.portfolio),
            education: non_empty(&self.education),
            experience: non_empty(&self.experience),
        };

        let mut fields = Vec::new();
        if cleaned.name.is_some() {
            fields.push("name");
        }
        if cleaned.bio.is_some() {
            fields.push("bio");
        }
        if cleaned.skills.is_some() {
            fields.push("skills");
        }
        if cleaned.portfolio.is_some() {
            fields.push("portfolio");
        }
        if cleaned.education.is_some() {
            fields.push("education");
        }
        if cleaned.experience.is_some() {
            fields.push("experience");
        }
        (cleaned, fields)
    }

    /// Apply the remaining values onto a profile.
    pub fn apply_to(self, candidate: &mut Candidate) {
        if let Some(name) = self.name {
            candidate.name = name;
        }
        if let Some(bio) = self.bio {
            candidate.bio = Some(bio);
        }
        if let Some(skills) = self.skills {
            candidate.skills = skills;
        }
        if let Some(portfolio) = self.portfolio {
            candidate.portfolio = portfolio;
        }
        if let Some(education) = self.education {
            candidate.education = education;
        }
        if let Some(experience) = self.experience {
            candidate.experience = experience;
        }
    }
}

/// A candidate annotated with their match score for a job.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub match_score: f64,
}

/// Response body for profile updates.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdated {
    pub message: String,
    pub updated_fields: Vec<&'static str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_skill_level_defaults_to_zero() {
        let skill: SkillItem = serde_json::from_value(json!({"name": "Rust"})).unwrap();
        assert_eq!(skill.level, 0);
        assert!(skill.validate().is_ok());
    }

    #[test]
    fn test_skill_level_out_of_range() {
        let skill = SkillItem {
            name: "Rust".to_string(),
            level: 101,
        };
        assert!(skill.validate().is_err());
    }

    #[test]
    fn test_update_request_ignores_empty_values() {
        let request: UpdateCandidateRequest = serde_json::from_value(json!({
            "name": "",
            "bio": "Backend engineer",
            "skills": [],
            "education": null
        }))
        .unwrap();

        let (cleaned, fields) = request.normalized();
        assert_eq!(fields, vec!["bio"]);
        assert!(cleaned.name.is_none());
        assert!(cleaned.skills.is_none());
    }

    #[test]
    fn test_experience_dates_parse() {
        let exp: ExperienceItem = serde_json::from_value(json!({
            "role": "Engineer",
            "company": "Acme",
            "start_date": "2021-03-01"
        }))
        .unwrap();
        assert_eq!(exp.start_date, NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
        assert!(exp.end_date.is_none());
    }
}
