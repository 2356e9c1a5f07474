//! Multi-account publish fan-out
//!
//! One publish request becomes one Post row plus one PostResult row per
//! resolved account, delivered concurrently with a settle-all join. A
//! failing account never aborts its siblings; every outcome lands in its own
//! result row and the post's aggregate status is recomputed once the join
//! settles.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::credentials::CredentialStore;
use crate::db::Database;
use crate::error::{CrosscastError, Result};
use crate::platforms::AdapterRegistry;
use crate::service::events::{Event, EventBus};
use crate::service::validation::PublishValidator;
use crate::types::{
    aggregate_status, Account, Platform, Post, PostContent, PostResult, PostStatus,
};

/// A publish request for one piece of content.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub user_id: String,
    pub content: PostContent,
    pub platforms: Vec<Platform>,
    /// When set, fan-out is narrowed to these account ids (still filtered to
    /// active accounts owned by the user on the selected platforms).
    pub account_ids: Option<Vec<String>>,
}

/// What a publish produced: the post and its per-account results, in
/// account resolution order.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub post_id: String,
    pub status: PostStatus,
    pub results: Vec<PostResult>,
}

pub struct PublishOrchestrator {
    db: Arc<Database>,
    registry: AdapterRegistry,
    credentials: Arc<dyn CredentialStore>,
    validator: PublishValidator,
    event_bus: EventBus,
}

impl PublishOrchestrator {
    pub fn new(
        db: Arc<Database>,
        registry: AdapterRegistry,
        credentials: Arc<dyn CredentialStore>,
        validator: PublishValidator,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            registry,
            credentials,
            validator,
            event_bus,
        }
    }

    /// Publish content to every matching active account.
    ///
    /// Validation runs before anything is written. `NoActiveAccounts`
    /// propagates as an error with the post row left marked failed; once
    /// fan-out starts, per-account failures are captured into result rows
    /// and the call itself succeeds.
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishReport> {
        self.validator
            .validate(&request.content, &request.platforms)?;

        let post = Post::new(&request.user_id, &request.content, request.platforms.clone());
        self.db.create_post(&post).await?;

        let accounts = self
            .db
            .resolve_accounts(
                &request.user_id,
                &request.platforms,
                request.account_ids.as_deref(),
            )
            .await?;

        if accounts.is_empty() {
            warn!(post_id = %post.id, "no active accounts matched the request");
            self.db
                .update_post_status(&post.id, PostStatus::Failed, None)
                .await?;
            return Err(CrosscastError::NoActiveAccounts);
        }

        info!(
            post_id = %post.id,
            accounts = accounts.len(),
            "starting publish fan-out"
        );
        self.event_bus.emit(Event::PublishStarted {
            post_id: post.id.clone(),
            platforms: request.platforms.clone(),
        });

        // Result rows are created in resolution order before any delivery
        // starts, so report order is stable whatever the join settles like.
        let mut result_ids = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let result = PostResult::new(&post.id, &account.id, account.platform);
            self.db.create_post_result(&result).await?;
            result_ids.push(result.id);
        }

        let deliveries = accounts.iter().zip(&result_ids).map(|(account, result_id)| {
            deliver_to_account(
                &self.db,
                &self.registry,
                self.credentials.as_ref(),
                &self.event_bus,
                &post,
                account,
                result_id,
            )
        });
        for outcome in join_all(deliveries).await {
            // Platform failures are already recorded per result; only
            // infrastructure errors surface here.
            outcome?;
        }

        let status = self.recompute_status(&post.id).await?;
        self.event_bus.emit(Event::PublishCompleted {
            post_id: post.id.clone(),
            status,
        });

        let with_results = self
            .db
            .get_post_with_results(&post.id)
            .await?
            .ok_or_else(|| CrosscastError::NotFound("Post", post.id.clone()))?;

        Ok(PublishReport {
            post_id: post.id,
            status,
            results: with_results.results,
        })
    }

    /// Recompute a post's aggregate status from its current result rows.
    ///
    /// `published_at` is stamped on the first transition to fully published
    /// and cleared whenever the aggregate is anything else.
    pub async fn recompute_status(&self, post_id: &str) -> Result<PostStatus> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| CrosscastError::NotFound("Post", post_id.to_string()))?;

        let statuses = self.db.result_statuses_for_post(post_id).await?;
        let status = aggregate_status(&statuses);
        let published_at = match status {
            PostStatus::Published => post
                .published_at
                .or_else(|| Some(chrono::Utc::now().timestamp())),
            _ => None,
        };

        self.db
            .update_post_status(post_id, status, published_at)
            .await?;
        Ok(status)
    }
}

/// Deliver one post to one account, recording the outcome on the result row.
///
/// Shared by fan-out and retry so both paths move the result through the
/// same `pending/failed → publishing → {success, failed}` transitions.
/// Returns whether the delivery succeeded; `Err` is reserved for database
/// failures.
pub(crate) async fn deliver_to_account(
    db: &Database,
    registry: &AdapterRegistry,
    credentials: &dyn CredentialStore,
    event_bus: &EventBus,
    post: &Post,
    account: &Account,
    result_id: &str,
) -> Result<bool> {
    db.mark_result_publishing(result_id).await?;
    event_bus.emit(Event::AccountPublishing {
        post_id: post.id.clone(),
        account_id: account.id.clone(),
        platform: account.platform,
    });

    let failure = |message: String, code: Option<String>| (message, code);

    let outcome = match registry.get(account.platform) {
        None => Err(failure(
            format!("No adapter registered for {}", account.platform.display_name()),
            None,
        )),
        Some(adapter) => match credentials.decrypt(account) {
            Err(e) => Err(failure(e.to_string(), None)),
            Ok(token) => match adapter.publish(&token, account, &post.publish_content()).await {
                Err(e) => Err(failure(e.to_string(), e.code().map(str::to_string))),
                Ok(published) => Ok(published),
            },
        },
    };

    match outcome {
        Ok(published) => {
            db.record_result_success(
                result_id,
                &published.platform_post_id,
                published.platform_post_url.as_deref(),
                chrono::Utc::now().timestamp(),
            )
            .await?;
            info!(
                post_id = %post.id,
                account_id = %account.id,
                platform = %account.platform,
                "account publish succeeded"
            );
            event_bus.emit(Event::AccountCompleted {
                post_id: post.id.clone(),
                account_id: account.id.clone(),
                platform: account.platform,
                success: true,
                error: None,
            });
            Ok(true)
        }
        Err((message, code)) => {
            db.record_result_failure(result_id, &message, code.as_deref())
                .await?;
            warn!(
                post_id = %post.id,
                account_id = %account.id,
                platform = %account.platform,
                error = %message,
                "account publish failed"
            );
            event_bus.emit(Event::AccountCompleted {
                post_id: post.id.clone(),
                account_id: account.id.clone(),
                platform: account.platform,
                success: false,
                error: Some(message),
            });
            Ok(false)
        }
    }
}
