//! Platform adapter abstraction
//!
//! One adapter per destination platform, registered in an [`AdapterRegistry`]
//! keyed by the [`Platform`] enum. Adapters own the platform-specific rules:
//! which media a post must carry, how a message is delivered (Telegram picks
//! photo/video/plain-message endpoints from the populated media field, and
//! falls back to downloading and re-uploading when the platform rejects a
//! direct URL), and bounding their own call timeouts. The core never switches
//! on platform names.
//!
//! # Examples
//!
//! ```
//! use crosscast::platforms::{AdapterRegistry, mock::MockAdapter};
//! use crosscast::types::Platform;
//!
//! let mut registry = AdapterRegistry::new();
//! registry.register(MockAdapter::succeeding(Platform::Facebook));
//! assert!(registry.get(Platform::Facebook).is_some());
//! assert!(registry.get(Platform::TikTok).is_none());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::PlatformError;
use crate::types::{Account, MediaRequirement, Platform, PostContent};

// Mock adapter is available for all builds (not just tests) to support
// integration tests
pub mod mock;

/// Outcome of a successful publish on one platform.
#[derive(Debug, Clone)]
pub struct PublishedPost {
    pub platform_post_id: String,
    pub platform_post_url: Option<String>,
}

/// Point-in-time engagement counters fetched from a platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementSnapshot {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
}

/// One comment as returned by a platform's comment listing.
#[derive(Debug, Clone)]
pub struct PlatformComment {
    pub platform_comment_id: String,
    pub commenter_id: String,
    pub commenter_name: String,
    pub commenter_username: Option<String>,
    pub text: String,
    pub commented_at: i64,
    pub likes_count: i64,
}

/// Adapter errors are account-scoped, so operations return `PlatformError`
/// directly and the caller decides whether to record or propagate.
pub type AdapterResult<T> = std::result::Result<T, PlatformError>;

/// Unified interface to one destination platform.
///
/// Implementations must bound their own network timeouts; a hung adapter
/// call stalls the whole fan-out join.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Which platform this adapter serves.
    fn platform(&self) -> Platform;

    /// Deliver content to one account.
    ///
    /// The token is the decrypted credential for the target account; it must
    /// never be logged or embedded in error messages.
    async fn publish(
        &self,
        token: &SecretString,
        account: &Account,
        content: &PostContent,
    ) -> AdapterResult<PublishedPost>;

    /// Fetch the current engagement counters for a published post.
    async fn fetch_metrics(
        &self,
        token: &SecretString,
        account: &Account,
        platform_post_id: &str,
    ) -> AdapterResult<EngagementSnapshot>;

    /// Fetch the current comments on a published post.
    async fn fetch_comments(
        &self,
        token: &SecretString,
        account: &Account,
        platform_post_id: &str,
    ) -> AdapterResult<Vec<PlatformComment>>;
}

/// Check content against a platform's media requirement.
///
/// Shared by adapters so every implementation rejects the same content with
/// the same user-facing message.
pub fn check_media_requirement(
    platform: Platform,
    content: &PostContent,
) -> AdapterResult<()> {
    match platform.media_requirement() {
        MediaRequirement::Any => Ok(()),
        MediaRequirement::Image => {
            if content.image_url.is_some() {
                Ok(())
            } else {
                Err(PlatformError::ContentRejected {
                    platform,
                    message: format!("{} requires an image", platform.display_name()),
                    code: Some("IMAGE_REQUIRED".to_string()),
                })
            }
        }
        MediaRequirement::Video => {
            if content.video_url.is_some() {
                Ok(())
            } else {
                Err(PlatformError::ContentRejected {
                    platform,
                    message: format!("{} requires a video to post", platform.display_name()),
                    code: Some("VIDEO_REQUIRED".to_string()),
                })
            }
        }
    }
}

/// Registry of adapters keyed by platform.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the platform it reports. A later
    /// registration for the same platform replaces the earlier one.
    pub fn register(&mut self, adapter: impl PlatformAdapter + 'static) {
        self.adapters.insert(adapter.platform(), Arc::new(adapter));
    }

    pub fn register_arc(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.adapters.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockAdapter;

    #[test]
    fn media_requirement_messages() {
        let text = PostContent::text("hi");

        let err = check_media_requirement(Platform::Instagram, &text).unwrap_err();
        assert_eq!(format!("{}", err), "Instagram requires an image");
        assert_eq!(err.code(), Some("IMAGE_REQUIRED"));

        let err = check_media_requirement(Platform::TikTok, &text).unwrap_err();
        assert_eq!(format!("{}", err), "TikTok requires a video to post");
        assert_eq!(err.code(), Some("VIDEO_REQUIRED"));

        assert!(check_media_requirement(Platform::Facebook, &text).is_ok());
    }

    #[test]
    fn media_requirement_satisfied_by_matching_url() {
        let with_image = PostContent::text("hi").with_image("https://cdn.example/a.jpg");
        assert!(check_media_requirement(Platform::Instagram, &with_image).is_ok());
        // An image does not satisfy a video requirement
        assert!(check_media_requirement(Platform::TikTok, &with_image).is_err());

        let with_video = PostContent::text("hi").with_video("https://cdn.example/a.mp4");
        assert!(check_media_requirement(Platform::TikTok, &with_video).is_ok());
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = AdapterRegistry::new();
        registry.register(MockAdapter::succeeding(Platform::LinkedIn));
        registry.register(MockAdapter::failing(Platform::LinkedIn, "down"));

        assert_eq!(registry.platforms(), vec![Platform::LinkedIn]);
    }
}
