//! Service layer for crosscast
//!
//! A facade pattern with `CrosscastService` as the entry point, coordinating
//! specialized components over shared state:
//!
//! - `PublishOrchestrator`: concurrent multi-account fan-out
//! - `RetryCoordinator`: bounded replay of failed deliveries
//! - `EngagementRefresher`: metrics and comment collection
//! - `EventBus`: progress event distribution
//!
//! Rate limiting is applied here, at the entry boundary, so the components
//! below stay policy-free. The facade also owns the deferred refresh queue:
//! each successful publish schedules a metrics and a comments refresh, and
//! the host application drains them via [`CrosscastService::run_due_refreshes`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use crosscast::config::Config;
//! use crosscast::credentials::StaticStore;
//! use crosscast::platforms::{AdapterRegistry, mock::MockAdapter};
//! use crosscast::service::{CrosscastService, publish::PublishRequest};
//! use crosscast::types::{Platform, PostContent};
//!
//! # async fn example() -> crosscast::Result<()> {
//! let mut registry = AdapterRegistry::new();
//! registry.register(MockAdapter::succeeding(Platform::Facebook));
//!
//! let service = CrosscastService::from_config(
//!     Config::load()?,
//!     registry,
//!     Arc::new(StaticStore::new()),
//! )
//! .await?;
//!
//! let report = service
//!     .publish(PublishRequest {
//!         user_id: "user-1".to_string(),
//!         content: PostContent::text("Hello from everywhere at once"),
//!         platforms: vec![Platform::Facebook],
//!         account_ids: None,
//!     })
//!     .await?;
//! println!("published to {} accounts", report.results.len());
//! # Ok(())
//! # }
//! ```

pub mod engagement;
pub mod events;
pub mod publish;
pub mod retry;
pub mod validation;

use std::sync::Arc;

use self::engagement::{EngagementRefresher, RefreshSummary};
use self::events::{EventBus, EventReceiver};
use self::publish::{PublishOrchestrator, PublishReport, PublishRequest};
use self::retry::RetryCoordinator;
use self::validation::PublishValidator;
use crate::config::Config;
use crate::credentials::{CredentialStore, KeyringStore};
use crate::db::{Database, PostWithResults};
use crate::error::{CrosscastError, Result};
use crate::platforms::AdapterRegistry;
use crate::rate_limiter::{user_identifier, RateLimiter};
use crate::refresh_queue::{RefreshKind, RefreshQueue, RefreshTask};
use crate::types::{Account, Platform, PostResult};

/// Main service facade coordinating the publishing pipeline.
pub struct CrosscastService {
    db: Arc<Database>,
    config: Config,
    event_bus: EventBus,
    rate_limiter: RateLimiter,
    refresh_queue: RefreshQueue,
    orchestrator: PublishOrchestrator,
    retries: RetryCoordinator,
    engagement: EngagementRefresher,
}

impl CrosscastService {
    /// Create a service with default configuration and the OS keyring as
    /// credential backend.
    pub async fn new(registry: AdapterRegistry) -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config, registry, Arc::new(KeyringStore::default())).await
    }

    /// Create a service from explicit configuration, adapters, and
    /// credential store. The entry point for tests and embedders.
    pub async fn from_config(
        config: Config,
        registry: AdapterRegistry,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let db = Arc::new(Database::new(&config.database.path).await?);
        let event_bus = EventBus::new(100);

        let orchestrator = PublishOrchestrator::new(
            Arc::clone(&db),
            registry.clone(),
            Arc::clone(&credentials),
            PublishValidator::new(&config.limits),
            event_bus.clone(),
        );
        let retries = RetryCoordinator::new(
            Arc::clone(&db),
            registry.clone(),
            Arc::clone(&credentials),
            event_bus.clone(),
            config.limits.max_retries,
        );
        let engagement = EngagementRefresher::new(
            Arc::clone(&db),
            registry,
            credentials,
            event_bus.clone(),
        );

        Ok(Self {
            rate_limiter: RateLimiter::new(&config.rate_limit),
            refresh_queue: RefreshQueue::new(),
            db,
            config,
            event_bus,
            orchestrator,
            retries,
            engagement,
        })
    }

    /// Subscribe to pipeline progress events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    /// Publish content to all matching accounts of the requesting user.
    ///
    /// Rate limited per user at this boundary. On success, a metrics and a
    /// comments refresh are queued for after the configured delay.
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishReport> {
        let now = chrono::Utc::now().timestamp();
        self.rate_limiter
            .check_and_record(&user_identifier(&request.user_id), now)?;

        let report = self.orchestrator.publish(request).await?;

        let due_at = now + self.config.engagement.refresh_delay_secs as i64;
        self.refresh_queue
            .schedule(&report.post_id, RefreshKind::Metrics, due_at);
        self.refresh_queue
            .schedule(&report.post_id, RefreshKind::Comments, due_at);

        Ok(report)
    }

    /// Retry a failed account delivery. See [`RetryCoordinator::retry`].
    pub async fn retry(&self, post_result_id: &str) -> Result<PostResult> {
        self.retries.retry(post_result_id).await
    }

    /// Recompute a post's aggregate status from its current results.
    pub async fn recompute_status(&self, post_id: &str) -> Result<crate::types::PostStatus> {
        self.orchestrator.recompute_status(post_id).await
    }

    /// Refresh engagement counters for a post now.
    pub async fn refresh_metrics(&self, post_id: &str) -> Result<RefreshSummary> {
        self.engagement.refresh_metrics(post_id).await
    }

    /// Collect current comments for a post now.
    pub async fn refresh_comments(&self, post_id: &str) -> Result<RefreshSummary> {
        self.engagement.refresh_comments(post_id).await
    }

    /// Collect comments across a user's recently published posts.
    pub async fn refresh_recent_comments(
        &self,
        user_id: &str,
        cutoff: i64,
    ) -> Result<RefreshSummary> {
        self.engagement.refresh_recent_comments(user_id, cutoff).await
    }

    /// Run every queued refresh task that is due, returning the tasks that
    /// ran. Call this from whatever scheduler drives the application.
    pub async fn run_due_refreshes(&self, now: i64) -> Result<Vec<RefreshTask>> {
        let due = self.refresh_queue.take_due(now);
        for task in &due {
            match task.kind {
                RefreshKind::Metrics => {
                    self.engagement.refresh_metrics(&task.post_id).await?;
                }
                RefreshKind::Comments => {
                    self.engagement.refresh_comments(&task.post_id).await?;
                }
            }
        }
        self.rate_limiter.evict_expired(now);
        Ok(due)
    }

    /// Number of refresh tasks waiting in the queue.
    pub fn pending_refreshes(&self) -> usize {
        self.refresh_queue.len()
    }

    /// Connect a destination account, or refresh it if the same platform
    /// account was connected before.
    pub async fn connect_account(
        &self,
        user_id: &str,
        platform: Platform,
        platform_account_id: &str,
        name: &str,
        access_token: &str,
    ) -> Result<Account> {
        let account = Account::new(user_id, platform, platform_account_id, name, access_token);
        self.db.upsert_account(&account).await
    }

    /// Disconnect an account. Soft delete: history stays queryable.
    pub async fn disconnect_account(&self, account_id: &str) -> Result<()> {
        if !self.db.deactivate_account(account_id).await? {
            return Err(CrosscastError::NotFound("Account", account_id.to_string()));
        }
        Ok(())
    }

    /// Fetch a post with all its per-account results.
    pub async fn get_post(&self, post_id: &str) -> Result<PostWithResults> {
        self.db
            .get_post_with_results(post_id)
            .await?
            .ok_or_else(|| CrosscastError::NotFound("Post", post_id.to_string()))
    }

    /// Direct access to the shared database handle.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}
