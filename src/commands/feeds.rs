use async_trait::async_trait;

use super::Handler;
use crate::{
    core::{Command, Feed, FeedId, User},
    error::{Error, Result},
    middleware::UserHandler,
    state::State,
    storage::StorageError,
};

/// Lists every feed along with its owner, as JSON.
pub struct ListFeeds;

#[async_trait]
impl Handler for ListFeeds {
    async fn call(&self, state: &mut State, _command: &Command) -> Result<()> {
        let feeds = state.store.list_feeds().await?;
        if feeds.is_empty() {
            println!("No feeds found.");
            return Ok(());
        }

        match serde_json::to_string_pretty(&feeds) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                tracing::warn!("cannot render feeds as JSON: {err}");
                for feed in feeds {
                    println!("{} ({}) by {}", feed.name, feed.url, feed.owner);
                }
            }
        }
        Ok(())
    }
}

pub struct AddFeed;

#[async_trait]
impl UserHandler for AddFeed {
    async fn call(&self, state: &mut State, command: &Command, user: User) -> Result<()> {
        let name = command.arg(0, "a feed name")?;
        let url = command.arg(1, "a feed url")?;
        validate_url(url)?;

        let feed = match state.store.get_feed_by_url(url).await {
            Ok(feed) => feed,
            Err(StorageError::NotFound { .. }) => {
                let feed = state.store.create_feed(name, url, user.id).await?;
                tracing::info!(id = feed.id, "created feed {} for {}", feed.name, feed.url);
                println!("Created feed {} ({})", feed.name, feed.url);
                feed
            }
            Err(err) => return Err(err.into()),
        };

        follow(state, &user, feed.id).await
    }
}

pub struct Follow;

#[async_trait]
impl UserHandler for Follow {
    async fn call(&self, state: &mut State, command: &Command, user: User) -> Result<()> {
        let url = command.arg(0, "a feed url")?;
        let feed = feed_by_url(state, url).await?;
        follow(state, &user, feed.id).await
    }
}

pub struct Following;

#[async_trait]
impl UserHandler for Following {
    async fn call(&self, state: &mut State, _command: &Command, user: User) -> Result<()> {
        let follows = state.store.list_feed_follows_for_user(user.id).await?;
        if follows.is_empty() {
            println!("{} isn't following any feeds yet.", user.name);
            return Ok(());
        }

        println!("{} is following:", user.name);
        for follow in follows {
            println!(" - {}", follow.feed_name);
        }
        Ok(())
    }
}

pub struct Unfollow;

#[async_trait]
impl UserHandler for Unfollow {
    async fn call(&self, state: &mut State, command: &Command, user: User) -> Result<()> {
        let url = command.arg(0, "a feed url")?;
        let feed = feed_by_url(state, url).await?;

        if !state.store.remove_feed_follow(user.id, feed.id).await? {
            return Err(Error::NotFound(format!(
                "{} is not following {url}",
                user.name
            )));
        }

        println!("{} unfollowed {}", user.name, feed.name);
        Ok(())
    }
}

async fn feed_by_url(state: &State, url: &str) -> Result<Feed> {
    state
        .store
        .get_feed_by_url(url)
        .await
        .map_err(|err| match err {
            StorageError::NotFound { .. } => {
                Error::NotFound(format!("no feed registered for url {url}"))
            }
            err => err.into(),
        })
}

async fn follow(state: &State, user: &User, feed: FeedId) -> Result<()> {
    let follow = state
        .store
        .create_feed_follow(user.id, feed)
        .await
        .map_err(|err| match err {
            StorageError::Conflict { .. } => {
                Error::Conflict(format!("{} already follows this feed", user.name))
            }
            err => err.into(),
        })?;

    println!("{} is now following {}", follow.user_name, follow.feed_name);
    Ok(())
}

/// A feed url needs at least a scheme and a host.
fn validate_url(raw: &str) -> Result<()> {
    match url::Url::parse(raw) {
        Ok(url) if url.has_host() => Ok(()),
        Ok(_) => Err(Error::Validation(format!("{raw} has no host"))),
        Err(err) => Err(Error::Validation(format!("{raw} is not a valid url: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{state, Fixture};

    async fn logged_in(name: &str) -> (Fixture, User) {
        let mut fixture = state().await;
        let user = fixture.state.store.create_user(name).await.unwrap();
        fixture.state.config.current_user_name = Some(name.to_owned());
        (fixture, user)
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://localhost:8080/rss").is_ok());
        assert!(matches!(validate_url("example.com/feed"), Err(Error::Validation(_))));
        assert!(matches!(validate_url("mailto:someone@example.com"), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_addfeed_creates_and_follows() {
        let (mut fixture, alice) = logged_in("alice").await;
        let state = &mut fixture.state;

        AddFeed
            .call(
                state,
                &Command::new("addfeed", ["Blog", "https://blog.example/rss"]),
                alice.clone(),
            )
            .await
            .unwrap();

        let feed = state.store.get_feed_by_url("https://blog.example/rss").await.unwrap();
        assert_eq!(feed.user_id, alice.id);
        assert_eq!(feed.last_fetched_at, None);

        let follows = state.store.list_feed_follows_for_user(alice.id).await.unwrap();
        assert_eq!(follows.len(), 1);
        assert_eq!(follows[0].feed_id, feed.id);
    }

    #[tokio::test]
    async fn test_addfeed_reuses_existing_feed() {
        let (mut fixture, alice) = logged_in("alice").await;
        let bob = fixture.state.store.create_user("bob").await.unwrap();
        let state = &mut fixture.state;
        let command = Command::new("addfeed", ["Blog", "https://blog.example/rss"]);

        AddFeed.call(state, &command, alice.clone()).await.unwrap();
        AddFeed.call(state, &command, bob.clone()).await.unwrap();

        assert_eq!(state.store.list_feeds().await.unwrap().len(), 1);
        let follows = state.store.list_feed_follows_for_user(bob.id).await.unwrap();
        assert_eq!(follows.len(), 1);

        let err = AddFeed.call(state, &command, bob).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_addfeed_rejects_bad_url() {
        let (mut fixture, alice) = logged_in("alice").await;

        let err = AddFeed
            .call(
                &mut fixture.state,
                &Command::new("addfeed", ["Blog", "not a url"]),
                alice,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)), "{err:?}");
        assert!(fixture.state.store.list_feeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let (mut fixture, alice) = logged_in("alice").await;
        let state = &mut fixture.state;
        let url = "https://blog.example/rss";
        state.store.create_feed("Blog", url, alice.id).await.unwrap();

        Follow
            .call(state, &Command::new("follow", [url]), alice.clone())
            .await
            .unwrap();
        Unfollow
            .call(state, &Command::new("unfollow", [url]), alice.clone())
            .await
            .unwrap();
        assert!(state
            .store
            .list_feed_follows_for_user(alice.id)
            .await
            .unwrap()
            .is_empty());

        let err = Unfollow
            .call(state, &Command::new("unfollow", [url]), alice.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "{err:?}");

        let err = Follow
            .call(state, &Command::new("follow", ["https://unknown.example/"]), alice)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "{err:?}");
    }
}
