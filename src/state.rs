use std::{path::PathBuf, sync::Arc};

use crate::{
    config::Configuration, core::User, error::Result, fetch::FeedClient, scheduler::Shutdown,
    storage::Storage,
};

/// Process-wide state, alive for one invocation of the program.
pub struct State {
    pub config: Configuration,
    pub config_path: PathBuf,
    pub store: Arc<dyn Storage>,
    pub client: FeedClient,
    pub shutdown: Shutdown,
    current_user: Option<User>,
}

impl State {
    pub fn new(
        config: Configuration,
        config_path: PathBuf,
        store: Arc<dyn Storage>,
        client: FeedClient,
    ) -> Self {
        Self {
            config,
            config_path,
            store,
            client,
            shutdown: Shutdown::default(),
            current_user: None,
        }
    }

    pub fn current_user_name(&self) -> Option<&str> {
        self.config.current_user_name.as_deref()
    }

    /// Makes `name` the current user and records it in the config file.
    pub fn set_current_user_name(&mut self, name: &str) -> Result<()> {
        Configuration::save_current_user(&self.config_path, name)?;
        self.config.current_user_name = Some(name.to_owned());
        tracing::debug!("current user set to {name}");
        Ok(())
    }

    /// Resolved user cached earlier in this run, if any.
    pub fn cached_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn cache_user(&mut self, user: User) {
        self.current_user = Some(user);
    }
}
