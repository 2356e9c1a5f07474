//! Integration tests for engagement metrics and comment collection

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use crosscast::config::Config;
use crosscast::credentials::StaticStore;
use crosscast::platforms::mock::{sample_comment, MockAdapter};
use crosscast::platforms::{AdapterRegistry, PlatformComment};
use crosscast::service::publish::PublishRequest;
use crosscast::service::CrosscastService;
use crosscast::types::{Platform, PostContent, ResultStatus};

fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default_config();
    config.database.path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .replace('\\', "/");
    config
}

async fn service_with(registry: AdapterRegistry, temp_dir: &TempDir) -> Result<CrosscastService> {
    Ok(CrosscastService::from_config(
        test_config(temp_dir),
        registry,
        Arc::new(StaticStore::new()),
    )
    .await?)
}

fn request(content: PostContent, platforms: Vec<Platform>) -> PublishRequest {
    PublishRequest {
        user_id: "user-1".to_string(),
        content,
        platforms,
        account_ids: None,
    }
}

/// Publish one text post to one Facebook account and return its post id.
async fn publish_one(service: &CrosscastService) -> Result<String> {
    service
        .connect_account("user-1", Platform::Facebook, "fb-a", "Page", "tok")
        .await?;
    let report = service
        .publish(request(PostContent::text("hello"), vec![Platform::Facebook]))
        .await?;
    Ok(report.post_id)
}

#[tokio::test]
async fn metrics_are_last_write_wins_snapshots() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let mut registry = AdapterRegistry::new();
    registry.register(MockAdapter::succeeding(Platform::Facebook).with_metrics(100, 5, 9));
    let service = service_with(registry, &temp_dir).await?;
    let post_id = publish_one(&service).await?;

    let summary = service.refresh_metrics(&post_id).await?;
    assert_eq!(summary.refreshed, 1);
    let stored = service.get_post(&post_id).await?;
    assert_eq!(stored.results[0].likes_count, 100);
    assert_eq!(stored.results[0].comments_count, 5);
    assert_eq!(stored.results[0].shares_count, 9);

    // A later snapshot with lower numbers still overwrites; there is no
    // merging or max-keeping
    let mut registry = AdapterRegistry::new();
    registry.register(MockAdapter::succeeding(Platform::Facebook).with_metrics(40, 1, 0));
    let later =
        CrosscastService::from_config(test_config(&temp_dir), registry, Arc::new(StaticStore::new()))
            .await?;
    later.refresh_metrics(&post_id).await?;

    let stored = later.get_post(&post_id).await?;
    assert_eq!(stored.results[0].likes_count, 40);
    assert_eq!(stored.results[0].comments_count, 1);
    assert_eq!(stored.results[0].shares_count, 0);

    Ok(())
}

#[tokio::test]
async fn comment_collection_upserts_by_platform_id() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let mut registry = AdapterRegistry::new();
    registry.register(MockAdapter::succeeding(Platform::Facebook).with_comments(vec![
        sample_comment("c-1", "first!"),
        sample_comment("c-2", "nice"),
    ]));
    let service = service_with(registry, &temp_dir).await?;
    let post_id = publish_one(&service).await?;

    // Collecting twice stores each comment once
    service.refresh_comments(&post_id).await?;
    service.refresh_comments(&post_id).await?;

    let stored = service.get_post(&post_id).await?;
    assert_eq!(stored.results[0].comments_count, 2);

    // A second collection sees c-2 edited and c-1 gone from the platform;
    // the edit lands, the stored row for c-1 survives, and the count keeps
    // reflecting stored rows
    let edited = PlatformComment {
        text: "nice (edited)".to_string(),
        likes_count: 4,
        ..sample_comment("c-2", "nice")
    };
    let mut registry = AdapterRegistry::new();
    registry.register(MockAdapter::succeeding(Platform::Facebook).with_comments(vec![edited]));
    let later =
        CrosscastService::from_config(test_config(&temp_dir), registry, Arc::new(StaticStore::new()))
            .await?;
    later.refresh_comments(&post_id).await?;

    let stored = later.get_post(&post_id).await?;
    assert_eq!(stored.results[0].comments_count, 2);
    let result_id = &stored.results[0].id;
    let comments = later.database().comments_for_result(result_id).await?;
    let c2 = comments
        .iter()
        .find(|c| c.platform_comment_id == "c-2")
        .unwrap();
    assert_eq!(c2.text, "nice (edited)");
    assert_eq!(c2.likes_count, 4);

    Ok(())
}

#[tokio::test]
async fn one_failing_platform_does_not_block_the_others() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut registry = AdapterRegistry::new();
    registry.register(MockAdapter::succeeding(Platform::Facebook).with_metrics(11, 0, 0));
    registry.register(MockAdapter::engagement_failing(Platform::Telegram, "api down"));
    let service = service_with(registry, &temp_dir).await?;

    service
        .connect_account("user-1", Platform::Facebook, "fb-a", "Page", "tok")
        .await?;
    service
        .connect_account("user-1", Platform::Telegram, "tg-a", "Channel", "tok")
        .await?;
    let report = service
        .publish(request(
            PostContent::text("hello"),
            vec![Platform::Facebook, Platform::Telegram],
        ))
        .await?;

    let summary = service.refresh_metrics(&report.post_id).await?;
    assert_eq!(summary.refreshed, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].platform, Platform::Telegram);

    let stored = service.get_post(&report.post_id).await?;
    let facebook = stored
        .results
        .iter()
        .find(|r| r.platform == Platform::Facebook)
        .unwrap();
    assert_eq!(facebook.likes_count, 11);

    // A fetch failure never rewrites delivery state
    let telegram = stored
        .results
        .iter()
        .find(|r| r.platform == Platform::Telegram)
        .unwrap();
    assert_eq!(telegram.status, ResultStatus::Success);
    assert_eq!(telegram.error_message, None);

    Ok(())
}

#[tokio::test]
async fn failed_deliveries_are_never_asked_for_engagement() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut registry = AdapterRegistry::new();
    let adapter = MockAdapter::failing(Platform::LinkedIn, "down");
    let state = adapter.state();
    registry.register(adapter);
    let service = service_with(registry, &temp_dir).await?;

    service
        .connect_account("user-1", Platform::LinkedIn, "li-a", "Corp", "tok")
        .await?;
    let report = service
        .publish(request(PostContent::text("x"), vec![Platform::LinkedIn]))
        .await?;

    let summary = service.refresh_metrics(&report.post_id).await?;
    assert_eq!(summary.refreshed, 0);
    assert!(summary.failures.is_empty());
    assert_eq!(state.metrics_calls.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn due_refresh_tasks_run_when_drained() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut registry = AdapterRegistry::new();
    registry.register(MockAdapter::succeeding(Platform::Facebook).with_metrics(3, 0, 0));

    let mut config = test_config(&temp_dir);
    config.engagement.refresh_delay_secs = 60;
    let service =
        CrosscastService::from_config(config, registry, Arc::new(StaticStore::new())).await?;
    let post_id = publish_one(&service).await?;
    assert_eq!(service.pending_refreshes(), 2);

    // Not due yet
    let now = chrono::Utc::now().timestamp();
    let ran = service.run_due_refreshes(now).await?;
    assert!(ran.is_empty());
    assert_eq!(service.pending_refreshes(), 2);

    // Past the delay both tasks run
    let ran = service.run_due_refreshes(now + 61).await?;
    assert_eq!(ran.len(), 2);
    assert_eq!(service.pending_refreshes(), 0);

    let stored = service.get_post(&post_id).await?;
    assert_eq!(stored.results[0].likes_count, 3);

    Ok(())
}

#[tokio::test]
async fn bulk_refresh_covers_recent_published_posts() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut registry = AdapterRegistry::new();
    registry.register(
        MockAdapter::succeeding(Platform::Facebook)
            .with_comments(vec![sample_comment("c-1", "hey")]),
    );
    let service = service_with(registry, &temp_dir).await?;

    service
        .connect_account("user-1", Platform::Facebook, "fb-a", "Page", "tok")
        .await?;
    let first = service
        .publish(request(PostContent::text("one"), vec![Platform::Facebook]))
        .await?;
    let second = service
        .publish(request(PostContent::text("two"), vec![Platform::Facebook]))
        .await?;

    let summary = service.refresh_recent_comments("user-1", 0).await?;
    assert_eq!(summary.refreshed, 2);
    assert!(summary.failures.is_empty());

    for post_id in [&first.post_id, &second.post_id] {
        let stored = service.get_post(post_id).await?;
        assert_eq!(stored.results[0].comments_count, 1);
    }

    Ok(())
}
