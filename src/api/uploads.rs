//! Profile picture uploads.

use std::path::Path;

use axum::extract::Multipart;
use serde::Serialize;

use crate::errors::AppError;
use crate::AppState;

/// Sub-directory of the upload root holding profile pictures.
pub const PROFILE_PICTURE_DIR: &str = "profile_pictures";

#[derive(Debug, Serialize)]
pub struct UploadedPicture {
    pub message: String,
    pub url: String,
}

/// Keep `[A-Za-z0-9._-]`, map everything else to `_` and collapse `..` runs.
fn safe_component(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    while out.contains("..") {
        out = out.replace("..", ".");
    }
    out
}

/// Stored file name: the owner's email, then the upload's base name, both sanitized.
pub(crate) fn picture_file_name(email: &str, uploaded_name: &str) -> Option<String> {
    let base = Path::new(uploaded_name).file_name()?.to_str()?;
    let base = safe_component(base.trim());
    if base.trim_matches(['.', '_']).is_empty() {
        return None;
    }
    Some(format!("{}_{}", safe_component(email), base))
}

/// Save the multipart `file` field and return its public URL.
pub(crate) async fn save_profile_picture(
    state: &AppState,
    email: &str,
    mut multipart: Multipart,
) -> Result<String, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .and_then(|name| picture_file_name(email, name))
            .ok_or_else(|| AppError::BadRequest("Uploaded file has no valid name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let dir = state.config.upload_dir.join(PROFILE_PICTURE_DIR);
        let path = dir.join(&file_name);
        if path.parent() != Some(dir.as_path()) {
            return Err(AppError::BadRequest("Uploaded file has no valid name".to_string()));
        }
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!(email = %email, file = %file_name, size = bytes.len(), "Stored profile picture");

        return Ok(format!(
            "{}/uploads/{}/{}",
            state.config.base_url, PROFILE_PICTURE_DIR, file_name
        ));
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}
