//! HR (recruiter) profile model.

use serde::{Deserialize, Serialize};

use super::{non_blank, Role};

#[derive(Debug, Clone, Serialize)]
pub struct HrUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub created_at: String,
}

/// Request body for HR registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterHrRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Request body for `PUT /hr/me`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateHrRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl UpdateHrRequest {
    /// Drop blank values and return the names of the fields that remain.
    pub fn normalized(&self) -> (UpdateHrRequest, Vec<&'static str>) {
        let cleaned = UpdateHrRequest {
            name: non_blank(&self.name),
            bio: non_blank(&self.bio),
            company: non_blank(&self.company),
        };

        let fields = [
            ("name", cleaned.name.is_some()),
            ("bio", cleaned.bio.is_some()),
            ("company", cleaned.company.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect();

        (cleaned, fields)
    }
}
