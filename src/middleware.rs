use async_trait::async_trait;

use crate::{
    commands::Handler,
    core::{Command, User},
    error::{Error, Result},
    state::State,
};

/// Handler that acts on behalf of the current user.
#[async_trait]
pub trait UserHandler: Send + Sync {
    async fn call(&self, state: &mut State, command: &Command, user: User) -> Result<()>;
}

/// Wraps a [`UserHandler`] into a plain [`Handler`] that resolves the
/// current user first.
pub struct RequireUser<H> {
    inner: H,
}

pub fn require_user<H: UserHandler>(handler: H) -> RequireUser<H> {
    RequireUser { inner: handler }
}

#[async_trait]
impl<H: UserHandler> Handler for RequireUser<H> {
    async fn call(&self, state: &mut State, command: &Command) -> Result<()> {
        let user = resolve_user(state).await?;
        self.inner.call(state, command, user).await
    }
}

/// Current user from the cache when it still matches the configured name,
/// otherwise from storage. A resolved user stays cached for the run.
pub async fn resolve_user(state: &mut State) -> Result<User> {
    let name = state.current_user_name().ok_or(Error::NotLoggedIn)?.to_owned();

    if let Some(user) = state.cached_user().filter(|user| user.name == name) {
        tracing::debug!("using cached user {name}");
        return Ok(user.clone());
    }

    let user = state
        .store
        .get_user_by_name(&name)
        .await
        .map_err(|source| {
            tracing::error!("failed to resolve user {name}: {source}");
            Error::UserResolution {
                name: name.clone(),
                source,
            }
        })?;

    tracing::debug!("cached user {}", user.name);
    state.cache_user(user.clone());
    Ok(user)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use crate::{
        commands::test_support::state_with,
        core::{DateTime, Feed, FeedFollow, FeedId, FeedWithOwner, NewPost, Post, UserId},
        storage::{sqlite, FeedStore, FollowStore, PostStore, StorageError, UserStore},
    };

    use super::*;

    /// Delegates to SQLite and counts user lookups.
    struct CountingStore {
        inner: sqlite::SqlitePool,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl UserStore for CountingStore {
        async fn get_user_by_name(&self, name: &str) -> Result<User, StorageError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.get_user_by_name(name).await
        }
        async fn create_user(&self, name: &str) -> Result<User, StorageError> {
            self.inner.create_user(name).await
        }
        async fn list_users(&self) -> Result<Vec<User>, StorageError> {
            self.inner.list_users().await
        }
        async fn reset_users(&self) -> Result<u64, StorageError> {
            self.inner.reset_users().await
        }
    }

    #[async_trait]
    impl FeedStore for CountingStore {
        async fn get_feed_by_url(&self, url: &str) -> Result<Feed, StorageError> {
            self.inner.get_feed_by_url(url).await
        }
        async fn create_feed(
            &self,
            name: &str,
            url: &str,
            owner: UserId,
        ) -> Result<Feed, StorageError> {
            self.inner.create_feed(name, url, owner).await
        }
        async fn list_feeds(&self) -> Result<Vec<FeedWithOwner>, StorageError> {
            self.inner.list_feeds().await
        }
        async fn get_next_feed_to_fetch(&self) -> Result<Option<Feed>, StorageError> {
            self.inner.get_next_feed_to_fetch().await
        }
        async fn mark_feed_fetched(&self, feed: FeedId, at: DateTime) -> Result<Feed, StorageError> {
            self.inner.mark_feed_fetched(feed, at).await
        }
    }

    #[async_trait]
    impl FollowStore for CountingStore {
        async fn create_feed_follow(
            &self,
            user: UserId,
            feed: FeedId,
        ) -> Result<FeedFollow, StorageError> {
            self.inner.create_feed_follow(user, feed).await
        }
        async fn remove_feed_follow(&self, user: UserId, feed: FeedId) -> Result<bool, StorageError> {
            self.inner.remove_feed_follow(user, feed).await
        }
        async fn list_feed_follows_for_user(
            &self,
            user: UserId,
        ) -> Result<Vec<FeedFollow>, StorageError> {
            self.inner.list_feed_follows_for_user(user).await
        }
    }

    #[async_trait]
    impl PostStore for CountingStore {
        async fn create_post(&self, post: NewPost) -> Result<Post, StorageError> {
            self.inner.create_post(post).await
        }
        async fn list_posts_for_user(
            &self,
            user: UserId,
            limit: u32,
        ) -> Result<Vec<Post>, StorageError> {
            self.inner.list_posts_for_user(user, limit).await
        }
    }

    /// Records the user each call received.
    struct Recording {
        seen: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl UserHandler for Recording {
        async fn call(&self, _state: &mut State, _command: &Command, user: User) -> Result<()> {
            self.seen.lock().unwrap().push(user.name);
            Ok(())
        }
    }

    async fn counting_store() -> Arc<CountingStore> {
        Arc::new(CountingStore {
            inner: sqlite::in_memory().await.unwrap(),
            lookups: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_second_call_uses_cached_user() {
        let store = counting_store().await;
        store.create_user("alice").await.unwrap();

        let mut fixture = state_with(store.clone()).await;
        fixture.state.config.current_user_name = Some("alice".to_owned());

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let handler = require_user(Recording { seen: seen.clone() });
        let command = Command::new("browse", Vec::<String>::new());

        Handler::call(&handler, &mut fixture.state, &command).await.unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);

        Handler::call(&handler, &mut fixture.state, &command).await.unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);

        assert_eq!(*seen.lock().unwrap(), vec!["alice", "alice"]);
    }

    #[tokio::test]
    async fn test_switching_user_resolves_again() {
        let store = counting_store().await;
        store.create_user("alice").await.unwrap();
        store.create_user("bob").await.unwrap();

        let mut fixture = state_with(store.clone()).await;
        fixture.state.config.current_user_name = Some("alice".to_owned());
        assert_eq!(resolve_user(&mut fixture.state).await.unwrap().name, "alice");

        fixture.state.config.current_user_name = Some("bob".to_owned());
        assert_eq!(resolve_user(&mut fixture.state).await.unwrap().name, "bob");
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
        assert_eq!(fixture.state.cached_user().unwrap().name, "bob");
    }

    #[tokio::test]
    async fn test_unknown_user_is_a_resolution_error() {
        let store = counting_store().await;
        let mut fixture = state_with(store.clone()).await;
        fixture.state.config.current_user_name = Some("ghost".to_owned());

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let handler = require_user(Recording { seen: seen.clone() });
        let err = Handler::call(
            &handler,
            &mut fixture.state,
            &Command::new("following", Vec::<String>::new()),
        )
        .await
        .unwrap_err();

        assert!(
            matches!(err, Error::UserResolution { ref name, ref source } if name == "ghost" && source.is_not_found()),
            "{err:?}"
        );
        assert!(seen.lock().unwrap().is_empty());
        assert!(fixture.state.cached_user().is_none());
    }

    #[tokio::test]
    async fn test_no_configured_user() {
        let store = counting_store().await;
        let mut fixture = state_with(store.clone()).await;

        let err = resolve_user(&mut fixture.state).await.unwrap_err();
        assert!(matches!(err, Error::NotLoggedIn));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }
}
