use async_trait::async_trait;

use crate::core::{
    DateTime, Feed, FeedFollow, FeedId, FeedWithOwner, NewPost, Post, User, UserId,
};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{entity} `{key}` already exists")]
    Conflict { entity: &'static str, key: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StorageError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

#[async_trait]
pub trait UserStore {
    async fn get_user_by_name(&self, name: &str) -> Result<User, StorageError>;
    async fn create_user(&self, name: &str) -> Result<User, StorageError>;
    async fn list_users(&self) -> Result<Vec<User>, StorageError>;
    /// Removes every user together with their feeds, follows and posts.
    async fn reset_users(&self) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait FeedStore {
    async fn get_feed_by_url(&self, url: &str) -> Result<Feed, StorageError>;
    async fn create_feed(&self, name: &str, url: &str, owner: UserId)
        -> Result<Feed, StorageError>;
    async fn list_feeds(&self) -> Result<Vec<FeedWithOwner>, StorageError>;
    /// Feed fetched longest ago, never-fetched feeds first.
    async fn get_next_feed_to_fetch(&self) -> Result<Option<Feed>, StorageError>;
    /// Stamps `last_fetched_at`, never moving it backwards.
    async fn mark_feed_fetched(&self, feed: FeedId, at: DateTime) -> Result<Feed, StorageError>;
}

#[async_trait]
pub trait FollowStore {
    async fn create_feed_follow(
        &self,
        user: UserId,
        feed: FeedId,
    ) -> Result<FeedFollow, StorageError>;
    /// Returns whether a follow was removed.
    async fn remove_feed_follow(&self, user: UserId, feed: FeedId) -> Result<bool, StorageError>;
    async fn list_feed_follows_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<FeedFollow>, StorageError>;
}

#[async_trait]
pub trait PostStore {
    /// Fails with [`StorageError::Conflict`] when a post with the same URL exists.
    async fn create_post(&self, post: NewPost) -> Result<Post, StorageError>;
    /// Posts of the feeds `user` follows, newest first.
    async fn list_posts_for_user(&self, user: UserId, limit: u32)
        -> Result<Vec<Post>, StorageError>;
}

/// Everything the commands and the ingestion pipeline need from storage.
pub trait Storage: UserStore + FeedStore + FollowStore + PostStore + Send + Sync {}

impl<T> Storage for T where T: UserStore + FeedStore + FollowStore + PostStore + Send + Sync {}

pub mod sqlite {
    use async_trait::async_trait;
    use futures::TryStreamExt;
    use sqlx::sqlite::SqlitePoolOptions;
    pub use sqlx::sqlite::SqlitePool;

    use super::*;

    const FOLLOW_COLUMNS: &str = r#"
        "ff"."id", "ff"."created_at", "ff"."user_id", "ff"."feed_id",
        "u"."name" AS "user_name", "f"."name" AS "feed_name"
    "#;

    pub async fn connect(url: &str) -> Result<SqlitePool, StorageError> {
        let pool = SqlitePool::connect(url).await?;
        sqlx::migrate!().run(&pool).await?;
        Ok(pool)
    }

    /// Private in-memory database. A single connection that is never retired
    /// keeps every query on the same database.
    pub async fn in_memory() -> Result<SqlitePool, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!().run(&pool).await?;
        Ok(pool)
    }

    fn now() -> DateTime {
        chrono::Utc::now()
    }

    fn on_unique_violation(entity: &'static str, key: &str) -> impl FnOnce(sqlx::Error) -> StorageError {
        let key = key.to_owned();
        move |err| {
            if let sqlx::Error::Database(db_err) = &err {
                if db_err.is_unique_violation() {
                    return StorageError::Conflict { entity, key };
                }
            }
            err.into()
        }
    }

    fn on_missing_row(entity: &'static str, key: impl ToString) -> impl FnOnce(sqlx::Error) -> StorageError {
        let key = key.to_string();
        move |err| match err {
            sqlx::Error::RowNotFound => StorageError::NotFound { entity, key },
            err => err.into(),
        }
    }

    #[async_trait]
    impl UserStore for SqlitePool {
        async fn get_user_by_name(&self, name: &str) -> Result<User, StorageError> {
            sqlx::query_as::<_, User>(r#"SELECT * FROM "users" WHERE "name" = ?1"#)
                .bind(name)
                .fetch_one(self)
                .await
                .map_err(on_missing_row("user", name))
        }

        async fn create_user(&self, name: &str) -> Result<User, StorageError> {
            let now = now();
            sqlx::query_as::<_, User>(
                r#"
                    INSERT INTO "users" ("created_at", "updated_at", "name")
                    VALUES (?1, ?1, ?2)
                    RETURNING *
                "#,
            )
            .bind(now)
            .bind(name)
            .fetch_one(self)
            .await
            .map_err(on_unique_violation("user", name))
        }

        async fn list_users(&self) -> Result<Vec<User>, StorageError> {
            Ok(
                sqlx::query_as::<_, User>(r#"SELECT * FROM "users" ORDER BY "name""#)
                    .fetch(self)
                    .try_collect()
                    .await?,
            )
        }

        async fn reset_users(&self) -> Result<u64, StorageError> {
            Ok(sqlx::query(r#"DELETE FROM "users""#)
                .execute(self)
                .await?
                .rows_affected())
        }
    }

    #[async_trait]
    impl FeedStore for SqlitePool {
        async fn get_feed_by_url(&self, url: &str) -> Result<Feed, StorageError> {
            sqlx::query_as::<_, Feed>(r#"SELECT * FROM "feeds" WHERE "url" = ?1"#)
                .bind(url)
                .fetch_one(self)
                .await
                .map_err(on_missing_row("feed", url))
        }

        async fn create_feed(
            &self,
            name: &str,
            url: &str,
            owner: UserId,
        ) -> Result<Feed, StorageError> {
            let now = now();
            sqlx::query_as::<_, Feed>(
                r#"
                    INSERT INTO "feeds" ("created_at", "updated_at", "name", "url", "user_id")
                    VALUES (?1, ?1, ?2, ?3, ?4)
                    RETURNING *
                "#,
            )
            .bind(now)
            .bind(name)
            .bind(url)
            .bind(owner)
            .fetch_one(self)
            .await
            .map_err(on_unique_violation("feed", url))
        }

        async fn list_feeds(&self) -> Result<Vec<FeedWithOwner>, StorageError> {
            Ok(sqlx::query_as::<_, FeedWithOwner>(
                r#"
                    SELECT "f"."id", "f"."name", "f"."url", "u"."name" AS "owner", "f"."last_fetched_at"
                    FROM "feeds" AS "f"
                    INNER JOIN "users" AS "u" ON "u"."id" = "f"."user_id"
                    ORDER BY "f"."name", "f"."id"
                "#,
            )
            .fetch(self)
            .try_collect()
            .await?)
        }

        async fn get_next_feed_to_fetch(&self) -> Result<Option<Feed>, StorageError> {
            Ok(sqlx::query_as::<_, Feed>(
                r#"
                    SELECT * FROM "feeds"
                    ORDER BY "last_fetched_at" ASC NULLS FIRST, "id" ASC
                    LIMIT 1
                "#,
            )
            .fetch_optional(self)
            .await?)
        }

        async fn mark_feed_fetched(&self, feed: FeedId, at: DateTime) -> Result<Feed, StorageError> {
            sqlx::query_as::<_, Feed>(
                r#"
                    UPDATE "feeds"
                    SET "last_fetched_at" = CASE
                            WHEN "last_fetched_at" IS NULL OR "last_fetched_at" < ?1 THEN ?1
                            ELSE "last_fetched_at"
                        END,
                        "updated_at" = ?1
                    WHERE "id" = ?2
                    RETURNING *
                "#,
            )
            .bind(at)
            .bind(feed)
            .fetch_one(self)
            .await
            .map_err(on_missing_row("feed", feed))
        }
    }

    #[async_trait]
    impl FollowStore for SqlitePool {
        async fn create_feed_follow(
            &self,
            user: UserId,
            feed: FeedId,
        ) -> Result<FeedFollow, StorageError> {
            let now = now();
            let id: i64 = sqlx::query_scalar(
                r#"
                    INSERT INTO "feed_follows" ("created_at", "updated_at", "user_id", "feed_id")
                    VALUES (?1, ?1, ?2, ?3)
                    RETURNING "id"
                "#,
            )
            .bind(now)
            .bind(user)
            .bind(feed)
            .fetch_one(self)
            .await
            .map_err(on_unique_violation("feed follow", &format!("{user}:{feed}")))?;

            sqlx::query_as::<_, FeedFollow>(&format!(
                r#"
                    SELECT {FOLLOW_COLUMNS}
                    FROM "feed_follows" AS "ff"
                    INNER JOIN "users" AS "u" ON "u"."id" = "ff"."user_id"
                    INNER JOIN "feeds" AS "f" ON "f"."id" = "ff"."feed_id"
                    WHERE "ff"."id" = ?1
                "#
            ))
            .bind(id)
            .fetch_one(self)
            .await
            .map_err(on_missing_row("feed follow", id))
        }

        async fn remove_feed_follow(&self, user: UserId, feed: FeedId) -> Result<bool, StorageError> {
            let removed = sqlx::query(
                r#"DELETE FROM "feed_follows" WHERE "user_id" = ?1 AND "feed_id" = ?2"#,
            )
            .bind(user)
            .bind(feed)
            .execute(self)
            .await?
            .rows_affected();

            Ok(removed > 0)
        }

        async fn list_feed_follows_for_user(
            &self,
            user: UserId,
        ) -> Result<Vec<FeedFollow>, StorageError> {
            Ok(sqlx::query_as::<_, FeedFollow>(&format!(
                r#"
                    SELECT {FOLLOW_COLUMNS}
                    FROM "feed_follows" AS "ff"
                    INNER JOIN "users" AS "u" ON "u"."id" = "ff"."user_id"
                    INNER JOIN "feeds" AS "f" ON "f"."id" = "ff"."feed_id"
                    WHERE "ff"."user_id" = ?1
                    ORDER BY "f"."name", "ff"."id"
                "#
            ))
            .bind(user)
            .fetch(self)
            .try_collect()
            .await?)
        }
    }

    #[async_trait]
    impl PostStore for SqlitePool {
        async fn create_post(&self, post: NewPost) -> Result<Post, StorageError> {
            let now = now();
            sqlx::query_as::<_, Post>(
                r#"
                    INSERT INTO "posts"
                        ("created_at", "updated_at", "title", "url", "description", "published_at", "feed_id")
                    VALUES
                        (?1, ?1, ?2, ?3, ?4, ?5, ?6)
                    RETURNING *
                "#,
            )
            .bind(now)
            .bind(&post.title)
            .bind(&post.url)
            .bind(&post.description)
            .bind(post.published_at)
            .bind(post.feed_id)
            .fetch_one(self)
            .await
            .map_err(on_unique_violation("post", &post.url))
        }

        async fn list_posts_for_user(
            &self,
            user: UserId,
            limit: u32,
        ) -> Result<Vec<Post>, StorageError> {
            Ok(sqlx::query_as::<_, Post>(
                r#"
                    SELECT "p".*
                    FROM "posts" AS "p"
                    INNER JOIN "feed_follows" AS "ff" ON "ff"."feed_id" = "p"."feed_id"
                    WHERE "ff"."user_id" = ?1
                    ORDER BY "p"."published_at" DESC, "p"."id" DESC
                    LIMIT ?2
                "#,
            )
            .bind(user)
            .bind(limit)
            .fetch(self)
            .try_collect()
            .await?)
        }
    }

}
