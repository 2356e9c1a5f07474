//! Database operations for crosscast

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{
    Account, Comment, Platform, Post, PostResult, PostStatus, ResultStatus,
};

/// A post with all its per-account results
#[derive(Debug, Clone)]
pub struct PostWithResults {
    pub post: Post,
    pub results: Vec<PostResult>,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes in the URL work on both Windows and Unix;
        // mode=rwc creates the file if it does not exist.
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ---- accounts ----

    /// Connect (or re-connect) an account. Upserts on the natural key
    /// `(user_id, platform, platform_account_id)` so reconnecting refreshes
    /// the stored token and reactivates a previously disconnected account
    /// without duplicating it.
    pub async fn upsert_account(&self, account: &Account) -> Result<Account> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, platform, platform_account_id, name, access_token, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?)
            ON CONFLICT (user_id, platform, platform_account_id) DO UPDATE SET
                name = excluded.name,
                access_token = excluded.access_token,
                is_active = 1
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(account.platform)
        .bind(&account.platform_account_id)
        .bind(&account.name)
        .bind(&account.access_token)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        // Re-read so the caller sees the surviving row id on conflict
        let row = sqlx::query(
            r#"
            SELECT id, user_id, platform, platform_account_id, name, access_token, is_active, created_at
            FROM accounts
            WHERE user_id = ? AND platform = ? AND platform_account_id = ?
            "#,
        )
        .bind(&account.user_id)
        .bind(account.platform)
        .bind(&account.platform_account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(account_from_row(&row))
    }

    /// Deactivate an account (soft delete). Historical post results keep
    /// their account reference.
    pub async fn deactivate_account(&self, account_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET is_active = 0 WHERE id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, platform, platform_account_id, name, access_token, is_active, created_at
            FROM accounts WHERE id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| account_from_row(&r)))
    }

    /// Resolve the active accounts a publish fans out to: owned by the user,
    /// on one of the requested platforms, optionally narrowed to specific
    /// account ids. Ordered by `(created_at, rowid)` so fan-out order (and
    /// with it result order) is deterministic.
    pub async fn resolve_accounts(
        &self,
        user_id: &str,
        platforms: &[Platform],
        account_ids: Option<&[String]>,
    ) -> Result<Vec<Account>> {
        if platforms.is_empty() {
            return Ok(Vec::new());
        }

        let platform_marks = vec!["?"; platforms.len()].join(", ");
        let mut query_str = format!(
            "SELECT id, user_id, platform, platform_account_id, name, access_token, is_active, created_at
             FROM accounts
             WHERE user_id = ? AND is_active = 1 AND platform IN ({})",
            platform_marks
        );

        if let Some(ids) = account_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let id_marks = vec!["?"; ids.len()].join(", ");
            query_str.push_str(&format!(" AND id IN ({})", id_marks));
        }

        query_str.push_str(" ORDER BY created_at, rowid");

        let mut query = sqlx::query(&query_str).bind(user_id);
        for platform in platforms {
            query = query.bind(*platform);
        }
        if let Some(ids) = account_ids {
            for id in ids {
                query = query.bind(id);
            }
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(account_from_row).collect())
    }

    // ---- posts ----

    /// Create a new post
    pub async fn create_post(&self, post: &Post) -> Result<()> {
        let platforms_json =
            serde_json::to_string(&post.platforms).map_err(|e| {
                DbError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, user_id, content, image_url, video_url, media_type, platforms, status, created_at, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(&post.video_url)
        .bind(post.media_type)
        .bind(platforms_json)
        .bind(post.status)
        .bind(post.created_at)
        .bind(post.published_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, content, image_url, video_url, media_type, platforms, status, created_at, published_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| post_from_row(&r)))
    }

    /// Update post aggregate status; stamps `published_at` only on full success.
    pub async fn update_post_status(
        &self,
        post_id: &str,
        status: PostStatus,
        published_at: Option<i64>,
    ) -> Result<()> {
        sqlx::query("UPDATE posts SET status = ?, published_at = ? WHERE id = ?")
            .bind(status)
            .bind(published_at)
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get a post together with all its results, results in creation order.
    pub async fn get_post_with_results(&self, post_id: &str) -> Result<Option<PostWithResults>> {
        let post = match self.get_post(post_id).await? {
            Some(post) => post,
            None => return Ok(None),
        };

        let rows = sqlx::query(
            r#"
            SELECT id, post_id, account_id, platform, status, platform_post_id, platform_post_url,
                   error_message, error_code, retry_count, likes_count, comments_count, shares_count,
                   published_at, created_at
            FROM post_results WHERE post_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(Some(PostWithResults {
            post,
            results: rows.iter().map(result_from_row).collect(),
        }))
    }

    /// Published or partially published posts for a user created at or after
    /// the cutoff, newest first. Used by bulk engagement refresh.
    pub async fn recent_published_posts(&self, user_id: &str, cutoff: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, content, image_url, video_url, media_type, platforms, status, created_at, published_at
            FROM posts
            WHERE user_id = ? AND created_at >= ? AND status IN ('published', 'partial')
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    // ---- post results ----

    /// Create a per-account result row
    pub async fn create_post_result(&self, result: &PostResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO post_results (id, post_id, account_id, platform, status, platform_post_id, platform_post_url,
                                      error_message, error_code, retry_count, likes_count, comments_count, shares_count,
                                      published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&result.id)
        .bind(&result.post_id)
        .bind(&result.account_id)
        .bind(result.platform)
        .bind(result.status)
        .bind(&result.platform_post_id)
        .bind(&result.platform_post_url)
        .bind(&result.error_message)
        .bind(&result.error_code)
        .bind(result.retry_count)
        .bind(result.likes_count)
        .bind(result.comments_count)
        .bind(result.shares_count)
        .bind(result.published_at)
        .bind(result.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get a post result by ID
    pub async fn get_post_result(&self, result_id: &str) -> Result<Option<PostResult>> {
        let row = sqlx::query(
            r#"
            SELECT id, post_id, account_id, platform, status, platform_post_id, platform_post_url,
                   error_message, error_code, retry_count, likes_count, comments_count, shares_count,
                   published_at, created_at
            FROM post_results WHERE id = ?
            "#,
        )
        .bind(result_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| result_from_row(&r)))
    }

    /// Mark a result as in flight
    pub async fn mark_result_publishing(&self, result_id: &str) -> Result<()> {
        sqlx::query("UPDATE post_results SET status = 'publishing' WHERE id = ?")
            .bind(result_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Record a successful delivery; clears any error from a prior attempt.
    pub async fn record_result_success(
        &self,
        result_id: &str,
        platform_post_id: &str,
        platform_post_url: Option<&str>,
        published_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE post_results
            SET status = 'success', platform_post_id = ?, platform_post_url = ?,
                error_message = NULL, error_code = NULL, published_at = ?
            WHERE id = ?
            "#,
        )
        .bind(platform_post_id)
        .bind(platform_post_url)
        .bind(published_at)
        .bind(result_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Record a failed delivery with the platform's message and optional code.
    pub async fn record_result_failure(
        &self,
        result_id: &str,
        error_message: &str,
        error_code: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE post_results SET status = 'failed', error_message = ?, error_code = ? WHERE id = ?",
        )
        .bind(error_message)
        .bind(error_code)
        .bind(result_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Bump the retry counter. Counts attempts, not successes.
    pub async fn increment_retry_count(&self, result_id: &str) -> Result<()> {
        sqlx::query("UPDATE post_results SET retry_count = retry_count + 1 WHERE id = ?")
            .bind(result_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// All result statuses for a post, for aggregate recomputation.
    pub async fn result_statuses_for_post(&self, post_id: &str) -> Result<Vec<ResultStatus>> {
        let rows = sqlx::query("SELECT status FROM post_results WHERE post_id = ?")
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| r.get::<ResultStatus, _>("status"))
            .collect())
    }

    /// Successful results that carry a platform post id, i.e. the ones
    /// engagement refresh can ask the platform about.
    pub async fn refreshable_results_for_post(&self, post_id: &str) -> Result<Vec<PostResult>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, account_id, platform, status, platform_post_id, platform_post_url,
                   error_message, error_code, retry_count, likes_count, comments_count, shares_count,
                   published_at, created_at
            FROM post_results
            WHERE post_id = ? AND status = 'success' AND platform_post_id IS NOT NULL
            ORDER BY rowid
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(result_from_row).collect())
    }

    /// Overwrite engagement counters with the latest platform snapshot.
    pub async fn update_result_metrics(
        &self,
        result_id: &str,
        likes: i64,
        comments: i64,
        shares: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE post_results SET likes_count = ?, comments_count = ?, shares_count = ? WHERE id = ?",
        )
        .bind(likes)
        .bind(comments)
        .bind(shares)
        .bind(result_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Set comments_count from what is actually stored, not from the fetch size.
    pub async fn sync_result_comments_count(&self, result_id: &str) -> Result<i64> {
        let count = self.count_comments_for_result(result_id).await?;

        sqlx::query("UPDATE post_results SET comments_count = ? WHERE id = ?")
            .bind(count)
            .bind(result_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(count)
    }

    // ---- comments ----

    /// Upsert a platform comment by its natural key
    /// `(post_result_id, platform_comment_id)`. Re-collection refreshes
    /// mutable fields instead of duplicating rows.
    pub async fn upsert_comment(&self, comment: &Comment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (post_result_id, platform, platform_comment_id, commenter_id,
                                  commenter_name, commenter_username, text, commented_at, likes_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (post_result_id, platform_comment_id) DO UPDATE SET
                commenter_name = excluded.commenter_name,
                commenter_username = excluded.commenter_username,
                text = excluded.text,
                likes_count = excluded.likes_count
            "#,
        )
        .bind(&comment.post_result_id)
        .bind(comment.platform)
        .bind(&comment.platform_comment_id)
        .bind(&comment.commenter_id)
        .bind(&comment.commenter_name)
        .bind(&comment.commenter_username)
        .bind(&comment.text)
        .bind(comment.commented_at)
        .bind(comment.likes_count)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Count stored comments for a result
    pub async fn count_comments_for_result(&self, result_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM comments WHERE post_result_id = ?")
            .bind(result_id)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(row.get("n"))
    }

    /// Stored comments for a result, newest first
    pub async fn comments_for_result(&self, result_id: &str) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_result_id, platform, platform_comment_id, commenter_id,
                   commenter_name, commenter_username, text, commented_at, likes_count
            FROM comments WHERE post_result_id = ?
            ORDER BY commented_at DESC, id DESC
            "#,
        )
        .bind(result_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| Comment {
                id: Some(r.get("id")),
                post_result_id: r.get("post_result_id"),
                platform: r.get("platform"),
                platform_comment_id: r.get("platform_comment_id"),
                commenter_id: r.get("commenter_id"),
                commenter_name: r.get("commenter_name"),
                commenter_username: r.get("commenter_username"),
                text: r.get("text"),
                commented_at: r.get("commented_at"),
                likes_count: r.get("likes_count"),
            })
            .collect())
    }
}

fn account_from_row(r: &sqlx::sqlite::SqliteRow) -> Account {
    Account {
        id: r.get("id"),
        user_id: r.get("user_id"),
        platform: r.get("platform"),
        platform_account_id: r.get("platform_account_id"),
        name: r.get("name"),
        access_token: r.get("access_token"),
        is_active: r.get::<i64, _>("is_active") != 0,
        created_at: r.get("created_at"),
    }
}

fn post_from_row(r: &sqlx::sqlite::SqliteRow) -> Post {
    let platforms: Vec<Platform> =
        serde_json::from_str(&r.get::<String, _>("platforms")).unwrap_or_default();

    Post {
        id: r.get("id"),
        user_id: r.get("user_id"),
        content: r.get("content"),
        image_url: r.get("image_url"),
        video_url: r.get("video_url"),
        media_type: r.get("media_type"),
        platforms,
        status: r.get("status"),
        created_at: r.get("created_at"),
        published_at: r.get("published_at"),
    }
}

fn result_from_row(r: &sqlx::sqlite::SqliteRow) -> PostResult {
    PostResult {
        id: r.get("id"),
        post_id: r.get("post_id"),
        account_id: r.get("account_id"),
        platform: r.get("platform"),
        status: r.get("status"),
        platform_post_id: r.get("platform_post_id"),
        platform_post_url: r.get("platform_post_url"),
        error_message: r.get("error_message"),
        error_code: r.get("error_code"),
        retry_count: r.get("retry_count"),
        likes_count: r.get("likes_count"),
        comments_count: r.get("comments_count"),
        shares_count: r.get("shares_count"),
        published_at: r.get("published_at"),
        created_at: r.get("created_at"),
    }
}
