//! Publish request validation
//!
//! Runs before any database write or account resolution, so an invalid
//! request leaves no trace.

use crate::config::LimitsConfig;
use crate::error::{CrosscastError, Result};
use crate::types::{Platform, PostContent};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "mkv"];

pub struct PublishValidator {
    max_content_length: usize,
}

impl PublishValidator {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            max_content_length: limits.max_content_length,
        }
    }

    /// Validate a publish request's content and platform selection.
    pub fn validate(&self, content: &PostContent, platforms: &[Platform]) -> Result<()> {
        let trimmed = content.text.trim();
        if trimmed.is_empty() {
            return Err(CrosscastError::Validation(
                "Post content cannot be empty".to_string(),
            ));
        }

        let length = content.text.chars().count();
        if length > self.max_content_length {
            return Err(CrosscastError::Validation(format!(
                "Post content exceeds the {} character limit (current: {})",
                self.max_content_length, length
            )));
        }

        if platforms.is_empty() {
            return Err(CrosscastError::Validation(
                "At least one platform must be selected".to_string(),
            ));
        }

        let mut seen = Vec::with_capacity(platforms.len());
        for platform in platforms {
            if seen.contains(platform) {
                return Err(CrosscastError::Validation(format!(
                    "Platform '{}' listed more than once",
                    platform
                )));
            }
            seen.push(*platform);
        }

        if let Some(url) = &content.image_url {
            validate_media_url(url, "image", IMAGE_EXTENSIONS)?;
        }
        if let Some(url) = &content.video_url {
            validate_media_url(url, "video", VIDEO_EXTENSIONS)?;
        }

        Ok(())
    }
}

/// Media URLs must be absolute http(s) and look like the claimed media kind.
/// Extension matching is a heuristic; adapters still get the final say when
/// the platform inspects the bytes.
fn validate_media_url(url: &str, kind: &str, extensions: &[&str]) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(CrosscastError::Validation(format!(
            "{} URL must be an absolute http(s) URL",
            kind
        )));
    }

    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .next()
        .unwrap_or("");
    let extension = path.rsplit('.').next().unwrap_or("").to_lowercase();

    if !extensions.contains(&extension.as_str()) {
        return Err(CrosscastError::Validation(format!(
            "{} URL does not look like a supported {} format ({})",
            kind,
            kind,
            extensions.join(", ")
        )));
    }

    Ok(())
}
