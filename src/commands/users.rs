use async_trait::async_trait;

use super::Handler;
use crate::{
    core::Command,
    error::{Error, Result},
    state::State,
    storage::StorageError,
};

pub struct Login;

#[async_trait]
impl Handler for Login {
    async fn call(&self, state: &mut State, command: &Command) -> Result<()> {
        let name = command.arg(0, "a user name")?;

        let user = state
            .store
            .get_user_by_name(name)
            .await
            .map_err(|err| match err {
                StorageError::NotFound { .. } => {
                    Error::NotFound(format!("user `{name}` does not exist"))
                }
                err => err.into(),
            })?;

        state.set_current_user_name(&user.name)?;
        println!("Logged in as {}", user.name);
        Ok(())
    }
}

pub struct Register;

#[async_trait]
impl Handler for Register {
    async fn call(&self, state: &mut State, command: &Command) -> Result<()> {
        let name = command.arg(0, "a user name")?;

        let user = state
            .store
            .create_user(name)
            .await
            .map_err(|err| match err {
                StorageError::Conflict { .. } => {
                    Error::Conflict(format!("user `{name}` already exists"))
                }
                err => err.into(),
            })?;

        tracing::info!(id = user.id, "registered user {}", user.name);
        state.set_current_user_name(&user.name)?;
        println!("Created user {} (id {})", user.name, user.id);
        Ok(())
    }
}

pub struct Reset;

#[async_trait]
impl Handler for Reset {
    async fn call(&self, state: &mut State, _command: &Command) -> Result<()> {
        let removed = state.store.reset_users().await?;
        tracing::info!(removed, "users table reset");
        println!("Removed {removed} user(s)");
        Ok(())
    }
}

pub struct Users;

#[async_trait]
impl Handler for Users {
    async fn call(&self, state: &mut State, _command: &Command) -> Result<()> {
        let users = state.store.list_users().await?;
        if users.is_empty() {
            println!("No users registered.");
        }

        for user in users {
            if Some(user.name.as_str()) == state.current_user_name() {
                println!("* {} (current)", user.name);
            } else {
                println!("* {}", user.name);
            }
        }
        Ok(())
    }
}
