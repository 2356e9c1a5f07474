//! Bounded retry of failed account deliveries
//!
//! A retry replays the parent post's immutable content to one account
//! through the same delivery routine fan-out uses. Two guards run before
//! any platform work: a result that already succeeded is never re-sent, and
//! a result at the retry cap is refused. The retry counter counts attempts,
//! so it moves regardless of the outcome.
//!
//! A retry deliberately does not touch the parent post's aggregate status;
//! callers that want the aggregate to reflect a recovered account call
//! [`PublishOrchestrator::recompute_status`](crate::service::publish::PublishOrchestrator::recompute_status)
//! after the retries they batch.

use std::sync::Arc;

use tracing::info;

use crate::credentials::CredentialStore;
use crate::db::Database;
use crate::error::{CrosscastError, Result};
use crate::platforms::AdapterRegistry;
use crate::service::events::{Event, EventBus};
use crate::service::publish::deliver_to_account;
use crate::types::{PostResult, ResultStatus};

pub struct RetryCoordinator {
    db: Arc<Database>,
    registry: AdapterRegistry,
    credentials: Arc<dyn CredentialStore>,
    event_bus: EventBus,
    max_retries: u32,
}

impl RetryCoordinator {
    pub fn new(
        db: Arc<Database>,
        registry: AdapterRegistry,
        credentials: Arc<dyn CredentialStore>,
        event_bus: EventBus,
        max_retries: u32,
    ) -> Self {
        Self {
            db,
            registry,
            credentials,
            event_bus,
            max_retries,
        }
    }

    /// Retry one failed account delivery.
    ///
    /// Returns the result row as it stands after the attempt. Guard
    /// rejections (`AlreadyPublished`, `RetryLimitExceeded`) happen before
    /// any adapter call and leave the row untouched.
    pub async fn retry(&self, post_result_id: &str) -> Result<PostResult> {
        let result = self
            .db
            .get_post_result(post_result_id)
            .await?
            .ok_or_else(|| CrosscastError::NotFound("Post result", post_result_id.to_string()))?;

        if result.status == ResultStatus::Success {
            return Err(CrosscastError::AlreadyPublished);
        }
        if result.retry_count >= self.max_retries as i64 {
            return Err(CrosscastError::RetryLimitExceeded {
                limit: self.max_retries,
                attempts: result.retry_count as u32,
            });
        }

        let post = self
            .db
            .get_post(&result.post_id)
            .await?
            .ok_or_else(|| CrosscastError::NotFound("Post", result.post_id.clone()))?;
        let account = self
            .db
            .get_account(&result.account_id)
            .await?
            .ok_or_else(|| CrosscastError::NotFound("Account", result.account_id.clone()))?;

        info!(
            post_result_id = %post_result_id,
            retry_count = result.retry_count,
            platform = %result.platform,
            "retrying account delivery"
        );

        let success = deliver_to_account(
            &self.db,
            &self.registry,
            self.credentials.as_ref(),
            &self.event_bus,
            &post,
            &account,
            post_result_id,
        )
        .await?;

        // Attempted, so it counts, success or not
        self.db.increment_retry_count(post_result_id).await?;

        let updated = self
            .db
            .get_post_result(post_result_id)
            .await?
            .ok_or_else(|| CrosscastError::NotFound("Post result", post_result_id.to_string()))?;

        self.event_bus.emit(Event::RetryCompleted {
            post_result_id: post_result_id.to_string(),
            success,
            retry_count: updated.retry_count,
        });

        Ok(updated)
    }
}
