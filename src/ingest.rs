//! One pass of feed ingestion: pick the feed fetched longest ago, claim it,
//! fetch it and store its items as posts.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    core::{Feed, NewPost},
    error::{Error, Result},
    fetch::{FeedClient, ParsedItem},
    scheduler::Shutdown,
    storage::{Storage, StorageError},
    timestamp,
};

/// Outcome of one tick for the feed it advanced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub feed: Feed,
    /// Posts stored by this pass.
    pub created: usize,
    /// Items already stored by an earlier pass.
    pub duplicates: usize,
    /// Items without a link or with an unparseable date.
    pub skipped: usize,
    /// Items the store refused for any other reason.
    pub failed: usize,
}

enum ItemOutcome {
    Created,
    Duplicate,
    Skipped,
    Failed,
}

/// Advances exactly one feed.
///
/// The feed is claimed (its `last_fetched_at` stamped) before the fetch, so
/// a broken feed waits a full rotation before it is tried again.
///
/// Only the download is abandoned when `shutdown` fires, with
/// [`Error::Interrupted`]. The claim and the post writes are never cut short.
pub async fn scrape_next_feed(
    store: &dyn Storage,
    client: &FeedClient,
    shutdown: &Shutdown,
) -> Result<TickReport> {
    let feed = store
        .get_next_feed_to_fetch()
        .await?
        .ok_or(Error::NoFeedsRegistered)?;

    let feed = store.mark_feed_fetched(feed.id, Utc::now()).await?;
    debug!(feed = %feed.name, "claimed feed {}", feed.url);

    let parsed = tokio::select! {
        biased;
        _ = shutdown.wait() => {
            debug!(feed = %feed.name, "download of {} abandoned", feed.url);
            return Err(Error::Interrupted);
        }
        parsed = client.fetch_feed(&feed.url) => parsed?,
    };
    info!(
        feed = %feed.name,
        items = parsed.items.len(),
        "fetched {}",
        if parsed.title.is_empty() { &feed.url } else { &parsed.title }
    );

    let mut report = TickReport {
        feed,
        created: 0,
        duplicates: 0,
        skipped: 0,
        failed: 0,
    };

    for item in &parsed.items {
        match store_item(store, &report.feed, item).await {
            ItemOutcome::Created => report.created += 1,
            ItemOutcome::Duplicate => report.duplicates += 1,
            ItemOutcome::Skipped => report.skipped += 1,
            ItemOutcome::Failed => report.failed += 1,
        }
    }

    Ok(report)
}

async fn store_item(store: &dyn Storage, feed: &Feed, item: &ParsedItem) -> ItemOutcome {
    if item.link.is_empty() {
        warn!(feed = %feed.name, "skipping item `{}` without a link", item.title);
        return ItemOutcome::Skipped;
    }

    let published_at = match timestamp::parse(&item.published) {
        Ok(moment) => moment.with_timezone(&Utc),
        Err(err) => {
            warn!(feed = %feed.name, link = %item.link, "skipping item: {err}: {}", err.source);
            return ItemOutcome::Skipped;
        }
    };

    let post = NewPost {
        feed_id: feed.id,
        title: item.title.clone(),
        url: item.link.clone(),
        description: Some(item.description.clone()).filter(|text| !text.is_empty()),
        published_at,
    };

    match store.create_post(post).await {
        Ok(post) => {
            info!(feed = %feed.name, "created post `{}` (published {})", post.title, post.published_at);
            ItemOutcome::Created
        }
        Err(StorageError::Conflict { .. }) => {
            debug!(link = %item.link, "post already stored");
            ItemOutcome::Duplicate
        }
        Err(err) => {
            warn!(feed = %feed.name, link = %item.link, "could not store post: {err}");
            ItemOutcome::Failed
        }
    }
}
