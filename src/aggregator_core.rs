use serde::Serialize;

pub type DateTime = chrono::DateTime<chrono::Utc>;
pub type UserId = i64;
pub type FeedId = i64;
pub type PostId = i64;

#[derive(Debug, sqlx::FromRow, Serialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub name: String,
}

#[derive(Debug, sqlx::FromRow, Serialize, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: FeedId,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub name: String,
    pub url: String,
    pub user_id: UserId,
    /// `None` until the scheduler claims the feed for the first time.
    pub last_fetched_at: Option<DateTime>,
}

/// Feed listing row, joined with the owner's name.
#[derive(Debug, sqlx::FromRow, Serialize, Clone, PartialEq, Eq)]
pub struct FeedWithOwner {
    pub id: FeedId,
    pub name: String,
    pub url: String,
    pub owner: String,
    pub last_fetched_at: Option<DateTime>,
}

#[derive(Debug, sqlx::FromRow, Serialize, Clone, PartialEq, Eq)]
pub struct FeedFollow {
    pub id: i64,
    pub created_at: DateTime,
    pub user_id: UserId,
    pub feed_id: FeedId,
    pub user_name: String,
    pub feed_name: String,
}

#[derive(Debug, sqlx::FromRow, Serialize, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime,
    pub feed_id: FeedId,
}

/// Post as materialized by the ingestion pipeline, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub feed_id: FeedId,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime,
}

/// One dispatch request: the command name and its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Positional argument `index`, or a validation error naming what was expected.
    pub fn arg(&self, index: usize, expected: &str) -> Result<&str, crate::Error> {
        self.args.get(index).map(String::as_str).ok_or_else(|| {
            crate::Error::Validation(format!(
                "`{}` expects {expected} as argument {}",
                self.name,
                index + 1
            ))
        })
    }
}
