use async_trait::async_trait;

use super::Handler;
use crate::{core::Command, error::Result, scheduler, state::State};

/// Collects feeds on a fixed interval until the process is asked to stop.
pub struct Aggregate;

#[async_trait]
impl Handler for Aggregate {
    async fn call(&self, state: &mut State, command: &Command) -> Result<()> {
        let raw = command.arg(0, "an interval such as `1m`")?;
        let interval = scheduler::parse_interval(raw)?;

        println!("Collecting feeds every {}", raw.trim());
        let ticks = scheduler::run(
            state.store.as_ref(),
            &state.client,
            interval,
            &state.shutdown,
        )
        .await?;

        tracing::debug!(ticks, "aggregation stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commands::test_support::state, error::Error};

    #[tokio::test]
    async fn test_rejects_bad_interval_before_running() {
        let mut fixture = state().await;

        for args in [vec![], vec!["soon"], vec!["0s"]] {
            let err = Aggregate
                .call(&mut fixture.state, &Command::new("agg", args))
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::Validation(_) | Error::InvalidInterval(_)),
                "{err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let mut fixture = state().await;
        fixture.state.shutdown.trigger();

        Aggregate
            .call(&mut fixture.state, &Command::new("agg", ["1s"]))
            .await
            .unwrap();
    }
}
