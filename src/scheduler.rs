//! Fixed-interval driver for the ingestion pipeline.

use std::{error::Error as StdError, iter, sync::Arc, time::Duration};

use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    fetch::FeedClient,
    ingest::{self, TickReport},
    storage::Storage,
};

/// Cooperative stop signal. Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }
}

impl Shutdown {
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`Shutdown::trigger`] has been called on any clone.
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

const UNITS: [(&str, u64); 9] = [
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 60 * 60 * 1_000_000_000),
    ("d", 24 * 60 * 60 * 1_000_000_000),
];

/// Parses a duration such as `30s`, `1.5m` or `1h30m`.
///
/// Every number needs a unit. Zero and negative durations are rejected.
pub fn parse_interval(raw: &str) -> Result<Duration> {
    let invalid = || Error::InvalidInterval(raw.to_owned());

    let mut rest = raw.trim();
    rest = rest.strip_prefix('+').unwrap_or(rest);
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(split);

        let split = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(split);

        let value: f64 = number.parse().map_err(|_| invalid())?;
        let (_, nanos_per_unit) = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .ok_or_else(invalid)?;

        let nanos = value * *nanos_per_unit as f64;
        if !nanos.is_finite() || nanos > u64::MAX as f64 {
            return Err(invalid());
        }
        total = total
            .checked_add(Duration::from_nanos(nanos.round() as u64))
            .ok_or_else(invalid)?;
        rest = tail;
    }

    if total.is_zero() {
        return Err(invalid());
    }
    Ok(total)
}

/// Runs one ingestion tick immediately and then once per `interval`, until
/// `shutdown` fires. Returns the number of ticks started.
///
/// Shutdown is observed between ticks and while a feed is being downloaded.
/// Storage writes of a tick always run to completion. A failed tick is
/// logged and the loop carries on with the next one.
pub async fn run(
    store: &dyn Storage,
    client: &FeedClient,
    interval: Duration,
    shutdown: &Shutdown,
) -> Result<u64> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = 0;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {}
        }

        ticks += 1;
        match ingest::scrape_next_feed(store, client, shutdown).await {
            Ok(report) => log_report(&report),
            Err(Error::Interrupted) => {
                info!("shutdown requested, abandoning tick {ticks}");
                break;
            }
            Err(Error::NoFeedsRegistered) => warn!("tick {ticks}: no feeds registered yet"),
            Err(err) => warn!("tick {ticks} failed: {}", describe(&err)),
        }
    }

    info!("collected feeds for {ticks} tick(s)");
    Ok(ticks)
}

fn log_report(report: &TickReport) {
    info!(
        feed = %report.feed.name,
        created = report.created,
        duplicates = report.duplicates,
        skipped = report.skipped,
        failed = report.failed,
        "collected {}",
        report.feed.url
    );
}

/// `err` followed by its chain of causes.
fn describe(err: &(dyn StdError + 'static)) -> String {
    iter::successors(Some(err), |err| (*err).source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}
