//! Crosscast - multi-platform social publishing core
//!
//! Publish one piece of content to many social accounts concurrently, track
//! the per-account outcome of every delivery, retry failures within a
//! bounded budget, and keep engagement numbers and comments fresh with
//! idempotent refreshes.

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod rate_limiter;
pub mod refresh_queue;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{CredentialStore, KeyringStore, StaticStore};
pub use db::{Database, PostWithResults};
pub use error::{CrosscastError, PlatformError, Result};
pub use platforms::{AdapterRegistry, PlatformAdapter};
pub use service::publish::{PublishReport, PublishRequest};
pub use service::CrosscastService;
pub use types::{Account, Comment, Platform, Post, PostContent, PostResult, PostStatus, ResultStatus};
