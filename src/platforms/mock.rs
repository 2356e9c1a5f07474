//! Mock platform adapter for testing
//!
//! A configurable adapter that simulates publishes, engagement fetches,
//! failures, and latency without credentials or network access. Call counters
//! and recorded publishes let tests assert exactly what the pipeline asked
//! the platform to do.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::{
    check_media_requirement, AdapterResult, EngagementSnapshot, PlatformAdapter, PlatformComment,
    PublishedPost,
};
use crate::types::{Account, Platform, PostContent};

/// One recorded publish call, for test verification.
#[derive(Debug, Clone)]
pub struct RecordedPublish {
    pub account_id: String,
    pub token: String,
    pub text: String,
}

/// Shared observable state of a mock adapter.
///
/// Handles are `Arc`s so tests can keep a clone after moving the adapter
/// into a registry.
#[derive(Default)]
pub struct MockState {
    pub publish_calls: AtomicUsize,
    pub metrics_calls: AtomicUsize,
    pub comments_calls: AtomicUsize,
    pub published: Mutex<Vec<RecordedPublish>>,
}

pub struct MockAdapter {
    platform: Platform,
    /// Publishes fail while the call counter is below this threshold.
    fail_first_publishes: usize,
    publish_error: Option<(String, Option<String>)>,
    engagement_error: Option<String>,
    metrics: EngagementSnapshot,
    comments: Vec<PlatformComment>,
    delay: Duration,
    state: Arc<MockState>,
}

impl MockAdapter {
    /// Adapter that accepts everything its platform's media rules allow.
    pub fn succeeding(platform: Platform) -> Self {
        Self {
            platform,
            fail_first_publishes: 0,
            publish_error: None,
            engagement_error: None,
            metrics: EngagementSnapshot::default(),
            comments: Vec::new(),
            delay: Duration::from_millis(0),
            state: Arc::new(MockState::default()),
        }
    }

    /// Adapter whose publishes always fail with the given message.
    pub fn failing(platform: Platform, error: &str) -> Self {
        let mut adapter = Self::succeeding(platform);
        adapter.fail_first_publishes = usize::MAX;
        adapter.publish_error = Some((error.to_string(), None));
        adapter
    }

    /// Adapter whose publishes fail with a message and machine-readable code.
    pub fn failing_with_code(platform: Platform, error: &str, code: &str) -> Self {
        let mut adapter = Self::failing(platform, error);
        adapter.publish_error = Some((error.to_string(), Some(code.to_string())));
        adapter
    }

    /// Adapter that fails the first `n` publishes, then succeeds. For
    /// exercising retry flows.
    pub fn failing_times(platform: Platform, n: usize, error: &str) -> Self {
        let mut adapter = Self::failing(platform, error);
        adapter.fail_first_publishes = n;
        adapter
    }

    /// Adapter whose engagement fetches fail.
    pub fn engagement_failing(platform: Platform, error: &str) -> Self {
        let mut adapter = Self::succeeding(platform);
        adapter.engagement_error = Some(error.to_string());
        adapter
    }

    pub fn with_metrics(mut self, likes: i64, comments: i64, shares: i64) -> Self {
        self.metrics = EngagementSnapshot {
            likes,
            comments,
            shares,
        };
        self
    }

    pub fn with_comments(mut self, comments: Vec<PlatformComment>) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Handle to the adapter's observable state.
    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }

    fn publish_failure(&self) -> PlatformError {
        let (message, code) = self
            .publish_error
            .clone()
            .unwrap_or_else(|| ("mock publish failure".to_string(), None));
        PlatformError::Publish {
            platform: self.platform,
            message,
            code,
        }
    }
}

/// Build a platform comment with the given id and text, defaults elsewhere.
pub fn sample_comment(id: &str, text: &str) -> PlatformComment {
    PlatformComment {
        platform_comment_id: id.to_string(),
        commenter_id: format!("commenter-{}", id),
        commenter_name: "Test Commenter".to_string(),
        commenter_username: Some("testcommenter".to_string()),
        text: text.to_string(),
        commented_at: 1_700_000_000,
        likes_count: 0,
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(
        &self,
        token: &SecretString,
        account: &Account,
        content: &PostContent,
    ) -> AdapterResult<PublishedPost> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let call = self.state.publish_calls.fetch_add(1, Ordering::SeqCst);

        check_media_requirement(self.platform, content)?;

        if call < self.fail_first_publishes {
            return Err(self.publish_failure());
        }

        if let Ok(mut published) = self.state.published.lock() {
            published.push(RecordedPublish {
                account_id: account.id.clone(),
                token: token.expose_secret().to_string(),
                text: content.text.clone(),
            });
        }

        let external_id = format!("{}-post-{}", self.platform.as_str(), call + 1);
        Ok(PublishedPost {
            platform_post_url: Some(format!(
                "https://{}.example/{}",
                self.platform.as_str(),
                external_id
            )),
            platform_post_id: external_id,
        })
    }

    async fn fetch_metrics(
        &self,
        _token: &SecretString,
        _account: &Account,
        _platform_post_id: &str,
    ) -> AdapterResult<EngagementSnapshot> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.state.metrics_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = &self.engagement_error {
            return Err(PlatformError::Engagement {
                platform: self.platform,
                message: error.clone(),
            });
        }
        Ok(self.metrics)
    }

    async fn fetch_comments(
        &self,
        _token: &SecretString,
        _account: &Account,
        _platform_post_id: &str,
    ) -> AdapterResult<Vec<PlatformComment>> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.state.comments_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = &self.engagement_error {
            return Err(PlatformError::Engagement {
                platform: self.platform,
                message: error.clone(),
            });
        }
        Ok(self.comments.clone())
    }
}
