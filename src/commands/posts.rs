use async_trait::async_trait;

use crate::{
    core::{Command, User},
    error::{Error, Result},
    middleware::UserHandler,
    state::State,
};

pub const DEFAULT_BROWSE_LIMIT: u32 = 2;

const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

pub struct Browse;

#[async_trait]
impl UserHandler for Browse {
    async fn call(&self, state: &mut State, command: &Command, user: User) -> Result<()> {
        let limit = browse_limit(command)?;
        tracing::debug!(limit, "{} browsing posts", user.name);

        let posts = state.store.list_posts_for_user(user.id, limit).await?;
        if posts.is_empty() {
            println!("No posts yet. Follow some feeds and run `agg` first.");
            return Ok(());
        }

        for post in posts {
            println!(
                "{GREEN}Title:{RESET} {} | {GREEN}Link:{RESET} {} ({GREEN}Published:{RESET} {})",
                post.title,
                post.url,
                post.published_at.format("%Y-%m-%d %H:%M UTC"),
            );
            if let Some(description) = post.description.as_deref().filter(|text| !text.is_empty()) {
                println!("    {description}");
            }
        }
        Ok(())
    }
}

fn browse_limit(command: &Command) -> Result<u32> {
    let Some(raw) = command.args.first() else {
        return Ok(DEFAULT_BROWSE_LIMIT);
    };

    match raw.parse::<u32>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(Error::Validation(format!(
            "`{raw}` is not a positive number of posts"
        ))),
    }
}
