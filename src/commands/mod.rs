//! Command registry and dispatch.
//!
//! Every command is a [`Handler`] registered under a unique name. Handlers
//! that act on behalf of the current user are written as
//! [`UserHandler`](crate::middleware::UserHandler)s and wrapped with
//! [`require_user`] before registration, so the registry only ever sees the
//! plain handler shape.

/// `agg`: the collection loop
mod aggregate;
/// Feed and follow commands
mod feeds;
/// `browse`
mod posts;
/// User management commands
mod users;

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;

use crate::{
    core::Command,
    error::{Error, Result},
    middleware::require_user,
    state::State,
};

pub use aggregate::Aggregate;
pub use feeds::{AddFeed, Follow, Following, ListFeeds, Unfollow};
pub use posts::{Browse, DEFAULT_BROWSE_LIMIT};
pub use users::{Login, Register, Reset, Users};

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, state: &mut State, command: &Command) -> Result<()>;
}

/// Name to description index, shared with the `help` handler.
type Catalog = Arc<RwLock<BTreeMap<String, String>>>;

#[derive(Default)]
pub struct Commands {
    handlers: HashMap<String, Box<dyn Handler>>,
    catalog: Catalog,
}

impl Commands {
    /// Installs `handler` under `name`, replacing any earlier registration.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl Handler + 'static,
    ) {
        let name = name.into();
        self.catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), description.into());
        if self.handlers.insert(name.clone(), Box::new(handler)).is_some() {
            tracing::debug!("handler for `{name}` replaced");
        }
    }

    pub async fn run(&self, state: &mut State, command: &Command) -> Result<()> {
        let handler = self
            .handlers
            .get(&command.name)
            .ok_or_else(|| Error::NotRegistered(command.name.clone()))?;

        tracing::debug!(args = ?command.args, "running `{}`", command.name);
        handler
            .call(state, command)
            .await
            .map_err(|source| Error::Command {
                name: command.name.clone(),
                source: Box::new(source),
            })
    }

    /// Registered names with their descriptions, sorted by name.
    pub fn describe(&self) -> Vec<(String, String)> {
        describe(&self.catalog)
    }

    /// Handler printing every registered command, including ones registered
    /// after it.
    pub fn list_handler(&self) -> ListCommands {
        ListCommands {
            catalog: self.catalog.clone(),
        }
    }
}

fn describe(catalog: &Catalog) -> Vec<(String, String)> {
    catalog
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|(name, description)| (name.clone(), description.clone()))
        .collect()
}

pub struct ListCommands {
    catalog: Catalog,
}

#[async_trait]
impl Handler for ListCommands {
    async fn call(&self, _state: &mut State, _command: &Command) -> Result<()> {
        println!("Available commands:");
        println!("------------------");
        for (name, description) in describe(&self.catalog) {
            println!("{name:<15} - {description}");
        }
        Ok(())
    }
}

/// Registry with every command of the aggregator.
pub fn builtin() -> Commands {
    let mut commands = Commands::default();

    commands.register("login", "Log the specified user in.", Login);
    commands.register("register", "Register a user and log them in.", Register);
    commands.register("reset", "Delete every user and their data.", Reset);
    commands.register("users", "List registered users.", Users);

    commands.register("feeds", "List every registered feed.", ListFeeds);
    commands.register(
        "addfeed",
        "Add a feed by name and url, and follow it.",
        require_user(AddFeed),
    );
    commands.register("follow", "Follow a registered feed by url.", require_user(Follow));
    commands.register(
        "following",
        "List the feeds the current user follows.",
        require_user(Following),
    );
    commands.register("unfollow", "Unfollow a feed by url.", require_user(Unfollow));

    commands.register(
        "agg",
        "Fetch one feed per interval, e.g. `agg 1m`, until interrupted.",
        Aggregate,
    );
    commands.register(
        "browse",
        "Show the latest posts of followed feeds, optionally how many.",
        require_user(Browse),
    );

    let help = commands.list_handler();
    commands.register("help", "Display the available commands.", help);

    commands
}
