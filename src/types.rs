//! Core types for crosscast

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported publishing destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    LinkedIn,
    TikTok,
    Telegram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::LinkedIn => "linkedin",
            Platform::TikTok => "tiktok",
            Platform::Telegram => "telegram",
        }
    }

    /// Human-facing name, used in error messages shown to callers.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::LinkedIn => "LinkedIn",
            Platform::TikTok => "TikTok",
            Platform::Telegram => "Telegram",
        }
    }

    /// Media the platform insists on before it will accept a post.
    ///
    /// Enforcement belongs to the adapter; this is the shared rule table so
    /// every adapter (mock included) rejects the same content the same way.
    pub fn media_requirement(&self) -> MediaRequirement {
        match self {
            Platform::Instagram => MediaRequirement::Image,
            Platform::TikTok => MediaRequirement::Video,
            _ => MediaRequirement::Any,
        }
    }

    pub fn all() -> [Platform; 5] {
        [
            Platform::Facebook,
            Platform::Instagram,
            Platform::LinkedIn,
            Platform::TikTok,
            Platform::Telegram,
        ]
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "linkedin" => Ok(Platform::LinkedIn),
            "tiktok" => Ok(Platform::TikTok),
            "telegram" => Ok(Platform::Telegram),
            _ => Err(format!("Unknown platform: '{}'", s)),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Media a platform requires in order to accept a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRequirement {
    /// Text alone is fine; media optional.
    Any,
    /// An image URL must be present (e.g. Instagram).
    Image,
    /// A video URL must be present (e.g. TikTok).
    Video,
}

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    None,
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::None => "none",
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

/// Content of one publish request: text plus optional remote media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostContent {
    pub text: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

impl PostContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: None,
            video_url: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_video(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }

    /// Image wins over video when both are set, matching how posts are
    /// rendered; adapters that need video look at `video_url` directly.
    pub fn media_type(&self) -> MediaType {
        if self.image_url.is_some() {
            MediaType::Image
        } else if self.video_url.is_some() {
            MediaType::Video
        } else {
            MediaType::None
        }
    }
}

/// Aggregate status of a post, derived from its per-account results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Publishing,
    Published,
    Partial,
    Failed,
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Partial => "partial",
            PostStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle of a single (post, account) delivery.
///
/// `pending → publishing → {success, failed}`; a failed result may go back
/// through `publishing` on retry while under the retry cap. There is no
/// transition out of `success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    Publishing,
    Success,
    Failed,
}

impl ResultStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResultStatus::Success | ResultStatus::Failed)
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Publishing => "publishing",
            ResultStatus::Success => "success",
            ResultStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Derive a post's aggregate status from its results.
///
/// Pure function of the current result set: any in-flight result keeps the
/// post `publishing`; otherwise all-success, all-failed, or mixed. An empty
/// result set means nothing was ever dispatched, which is a failure.
pub fn aggregate_status(statuses: &[ResultStatus]) -> PostStatus {
    if statuses.is_empty() {
        return PostStatus::Failed;
    }
    if statuses.iter().any(|s| !s.is_terminal()) {
        return PostStatus::Publishing;
    }
    if statuses.iter().all(|s| *s == ResultStatus::Success) {
        PostStatus::Published
    } else if statuses.iter().all(|s| *s == ResultStatus::Failed) {
        PostStatus::Failed
    } else {
        PostStatus::Partial
    }
}

/// A connected destination account owned by a user.
///
/// `access_token` holds the encrypted-at-rest credential as stored; the
/// plaintext only ever exists as a `SecretString` obtained through a
/// `CredentialStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub platform_account_id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub is_active: bool,
    pub created_at: i64,
}

impl Account {
    pub fn new(
        user_id: impl Into<String>,
        platform: Platform,
        platform_account_id: impl Into<String>,
        name: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            platform,
            platform_account_id: platform_account_id.into(),
            name: name.into(),
            access_token: access_token.into(),
            is_active: true,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// One authored content unit. Content is immutable after creation, which is
/// what makes retries deterministic replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub media_type: MediaType,
    pub platforms: Vec<Platform>,
    pub status: PostStatus,
    pub created_at: i64,
    pub published_at: Option<i64>,
}

impl Post {
    pub fn new(user_id: impl Into<String>, content: &PostContent, platforms: Vec<Platform>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            content: content.text.clone(),
            image_url: content.image_url.clone(),
            video_url: content.video_url.clone(),
            media_type: content.media_type(),
            platforms,
            status: PostStatus::Publishing,
            created_at: chrono::Utc::now().timestamp(),
            published_at: None,
        }
    }

    /// Rebuild the original content for a retry replay.
    pub fn publish_content(&self) -> PostContent {
        PostContent {
            text: self.content.clone(),
            image_url: self.image_url.clone(),
            video_url: self.video_url.clone(),
        }
    }
}

/// Per-account outcome record for one post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResult {
    pub id: String,
    pub post_id: String,
    pub account_id: String,
    pub platform: Platform,
    pub status: ResultStatus,
    pub platform_post_id: Option<String>,
    pub platform_post_url: Option<String>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
    pub retry_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub shares_count: i64,
    pub published_at: Option<i64>,
    pub created_at: i64,
}

impl PostResult {
    pub fn new(post_id: impl Into<String>, account_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.into(),
            account_id: account_id.into(),
            platform,
            status: ResultStatus::Pending,
            platform_post_id: None,
            platform_post_url: None,
            error_message: None,
            error_code: None,
            retry_count: 0,
            likes_count: 0,
            comments_count: 0,
            shares_count: 0,
            published_at: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// One stored platform comment, keyed by (post_result_id, platform_comment_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Option<i64>,
    pub post_result_id: String,
    pub platform: Platform,
    pub platform_comment_id: String,
    pub commenter_id: String,
    pub commenter_name: String,
    pub commenter_username: Option<String>,
    pub text: String,
    pub commented_at: i64,
    pub likes_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_through_str() {
        for platform in Platform::all() {
            let parsed: Platform = platform.as_str().parse().unwrap();
            assert_eq!(parsed, platform);
        }
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn platform_media_requirements() {
        assert_eq!(Platform::Instagram.media_requirement(), MediaRequirement::Image);
        assert_eq!(Platform::TikTok.media_requirement(), MediaRequirement::Video);
        assert_eq!(Platform::Facebook.media_requirement(), MediaRequirement::Any);
        assert_eq!(Platform::Telegram.media_requirement(), MediaRequirement::Any);
    }

    #[test]
    fn media_type_prefers_image_over_video() {
        let text_only = PostContent::text("hello");
        assert_eq!(text_only.media_type(), MediaType::None);

        let with_image = PostContent::text("hello").with_image("https://cdn.example/a.jpg");
        assert_eq!(with_image.media_type(), MediaType::Image);

        let both = PostContent::text("hello")
            .with_image("https://cdn.example/a.jpg")
            .with_video("https://cdn.example/a.mp4");
        assert_eq!(both.media_type(), MediaType::Image);
    }

    #[test]
    fn aggregate_status_truth_table() {
        use ResultStatus::*;

        assert_eq!(aggregate_status(&[]), PostStatus::Failed);
        assert_eq!(aggregate_status(&[Success]), PostStatus::Published);
        assert_eq!(aggregate_status(&[Failed]), PostStatus::Failed);
        assert_eq!(aggregate_status(&[Success, Success]), PostStatus::Published);
        assert_eq!(aggregate_status(&[Failed, Failed]), PostStatus::Failed);
        assert_eq!(aggregate_status(&[Success, Failed]), PostStatus::Partial);
        assert_eq!(aggregate_status(&[Failed, Success, Failed]), PostStatus::Partial);
    }

    #[test]
    fn aggregate_status_in_flight_results_keep_post_publishing() {
        use ResultStatus::*;

        assert_eq!(aggregate_status(&[Pending]), PostStatus::Publishing);
        assert_eq!(aggregate_status(&[Success, Publishing]), PostStatus::Publishing);
        assert_eq!(aggregate_status(&[Failed, Pending, Success]), PostStatus::Publishing);
    }

    #[test]
    fn new_post_captures_content_immutably() {
        let content = PostContent::text("launch day").with_image("https://cdn.example/launch.png");
        let post = Post::new("user-1", &content, vec![Platform::Facebook, Platform::Instagram]);

        assert_eq!(post.status, PostStatus::Publishing);
        assert_eq!(post.media_type, MediaType::Image);
        assert_eq!(post.published_at, None);

        let replay = post.publish_content();
        assert_eq!(replay.text, "launch day");
        assert_eq!(replay.image_url.as_deref(), Some("https://cdn.example/launch.png"));
        assert_eq!(replay.video_url, None);
    }

    #[test]
    fn new_post_result_starts_pending_with_zero_counters() {
        let result = PostResult::new("post-1", "account-1", Platform::LinkedIn);

        assert_eq!(result.status, ResultStatus::Pending);
        assert_eq!(result.retry_count, 0);
        assert_eq!(result.likes_count, 0);
        assert_eq!(result.platform_post_id, None);
        assert!(uuid::Uuid::parse_str(&result.id).is_ok());
    }

    #[test]
    fn result_status_terminality() {
        assert!(ResultStatus::Success.is_terminal());
        assert!(ResultStatus::Failed.is_terminal());
        assert!(!ResultStatus::Pending.is_terminal());
        assert!(!ResultStatus::Publishing.is_terminal());
    }
}
