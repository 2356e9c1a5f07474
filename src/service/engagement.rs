//! Engagement metrics and comment collection
//!
//! Refreshes operate over the successful results of a post that carry a
//! platform post id, concurrently and independently: one platform timing out
//! never blocks the numbers from the others. Metrics are last-write-wins
//! snapshots; comments are upserted by their platform-assigned id, and a
//! result's `comments_count` always comes from what is actually stored, not
//! from the size of the latest fetch.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::credentials::CredentialStore;
use crate::db::Database;
use crate::error::{CrosscastError, Result};
use crate::platforms::{AdapterRegistry, PlatformAdapter};
use crate::service::events::{Event, EventBus};
use crate::types::{Account, Comment, Platform, PostResult};

/// One failed per-result fetch inside an otherwise successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshFailure {
    pub post_result_id: String,
    pub platform: Platform,
    pub message: String,
}

/// Outcome of refreshing one post's engagement data.
#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failures: Vec<RefreshFailure>,
}

pub struct EngagementRefresher {
    db: Arc<Database>,
    registry: AdapterRegistry,
    credentials: Arc<dyn CredentialStore>,
    event_bus: EventBus,
}

impl EngagementRefresher {
    pub fn new(
        db: Arc<Database>,
        registry: AdapterRegistry,
        credentials: Arc<dyn CredentialStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            registry,
            credentials,
            event_bus,
        }
    }

    /// Overwrite engagement counters for every refreshable result of a post
    /// with the platform's current numbers.
    pub async fn refresh_metrics(&self, post_id: &str) -> Result<RefreshSummary> {
        let results = self.refreshable_results(post_id).await?;

        let fetches = results.iter().map(|result| self.refresh_result_metrics(result));
        let summary = collect_summary(join_all(fetches).await)?;

        self.event_bus.emit(Event::EngagementRefreshed {
            post_id: post_id.to_string(),
            refreshed: summary.refreshed,
            failed: summary.failures.len(),
        });
        Ok(summary)
    }

    /// Collect current comments for every refreshable result of a post.
    ///
    /// Safe to run repeatedly: comments already stored are updated in place,
    /// never duplicated.
    pub async fn refresh_comments(&self, post_id: &str) -> Result<RefreshSummary> {
        let results = self.refreshable_results(post_id).await?;

        let fetches = results.iter().map(|result| self.refresh_result_comments(result));
        let summary = collect_summary(join_all(fetches).await)?;

        self.event_bus.emit(Event::EngagementRefreshed {
            post_id: post_id.to_string(),
            refreshed: summary.refreshed,
            failed: summary.failures.len(),
        });
        Ok(summary)
    }

    /// Collect comments for every published or partially published post a
    /// user created at or after `cutoff`.
    pub async fn refresh_recent_comments(
        &self,
        user_id: &str,
        cutoff: i64,
    ) -> Result<RefreshSummary> {
        let posts = self.db.recent_published_posts(user_id, cutoff).await?;
        debug!(user_id, posts = posts.len(), "bulk comment refresh");

        let mut combined = RefreshSummary::default();
        for post in posts {
            let summary = self.refresh_comments(&post.id).await?;
            combined.refreshed += summary.refreshed;
            combined.failures.extend(summary.failures);
        }
        Ok(combined)
    }

    async fn refreshable_results(&self, post_id: &str) -> Result<Vec<PostResult>> {
        if self.db.get_post(post_id).await?.is_none() {
            return Err(CrosscastError::NotFound("Post", post_id.to_string()));
        }
        self.db.refreshable_results_for_post(post_id).await
    }

    /// Resolve the adapter, account, and credential a fetch needs.
    async fn fetch_context(
        &self,
        result: &PostResult,
    ) -> std::result::Result<(Arc<dyn PlatformAdapter>, Account, secrecy::SecretString), String>
    {
        let adapter = self
            .registry
            .get(result.platform)
            .ok_or_else(|| format!("No adapter registered for {}", result.platform.display_name()))?;

        let account = match self.db.get_account(&result.account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => return Err(format!("Account {} no longer exists", result.account_id)),
            Err(e) => return Err(e.to_string()),
        };

        let token = self
            .credentials
            .decrypt(&account)
            .map_err(|e| e.to_string())?;

        Ok((adapter, account, token))
    }

    async fn refresh_result_metrics(
        &self,
        result: &PostResult,
    ) -> std::result::Result<(), RefreshFailure> {
        let failure = |message: String| RefreshFailure {
            post_result_id: result.id.clone(),
            platform: result.platform,
            message,
        };

        // Only refreshable results reach here, so the id is present
        let platform_post_id = result
            .platform_post_id
            .as_deref()
            .ok_or_else(|| failure("result has no platform post id".to_string()))?;

        let (adapter, account, token) =
            self.fetch_context(result).await.map_err(failure)?;

        let snapshot = adapter
            .fetch_metrics(&token, &account, platform_post_id)
            .await
            .map_err(|e| failure(e.to_string()))?;

        self.db
            .update_result_metrics(&result.id, snapshot.likes, snapshot.comments, snapshot.shares)
            .await
            .map_err(|e| failure(e.to_string()))?;

        Ok(())
    }

    async fn refresh_result_comments(
        &self,
        result: &PostResult,
    ) -> std::result::Result<(), RefreshFailure> {
        let failure = |message: String| RefreshFailure {
            post_result_id: result.id.clone(),
            platform: result.platform,
            message,
        };

        let platform_post_id = result
            .platform_post_id
            .as_deref()
            .ok_or_else(|| failure("result has no platform post id".to_string()))?;

        let (adapter, account, token) =
            self.fetch_context(result).await.map_err(failure)?;

        let fetched = adapter
            .fetch_comments(&token, &account, platform_post_id)
            .await
            .map_err(|e| failure(e.to_string()))?;

        for platform_comment in fetched {
            let comment = Comment {
                id: None,
                post_result_id: result.id.clone(),
                platform: result.platform,
                platform_comment_id: platform_comment.platform_comment_id,
                commenter_id: platform_comment.commenter_id,
                commenter_name: platform_comment.commenter_name,
                commenter_username: platform_comment.commenter_username,
                text: platform_comment.text,
                commented_at: platform_comment.commented_at,
                likes_count: platform_comment.likes_count,
            };
            self.db
                .upsert_comment(&comment)
                .await
                .map_err(|e| failure(e.to_string()))?;
        }

        self.db
            .sync_result_comments_count(&result.id)
            .await
            .map_err(|e| failure(e.to_string()))?;

        Ok(())
    }
}

fn collect_summary(
    outcomes: Vec<std::result::Result<(), RefreshFailure>>,
) -> Result<RefreshSummary> {
    let mut summary = RefreshSummary::default();
    for outcome in outcomes {
        match outcome {
            Ok(()) => summary.refreshed += 1,
            Err(f) => {
                warn!(
                    post_result_id = %f.post_result_id,
                    platform = %f.platform,
                    error = %f.message,
                    "engagement refresh failed for result"
                );
                summary.failures.push(f);
            }
        }
    }
    Ok(summary)
}
