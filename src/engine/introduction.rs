//! Self-introduction posts.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::llm::{prompts, structured, ReasoningOracle};
use crate::social::SocialFeed;

/// Twitter's post length limit, in characters.
const MAX_POST_CHARS: usize = 280;

#[derive(Debug, Deserialize)]
struct IntroPayload {
    tweet: String,
}

/// Ask the oracle for an introduction. Falls back to the raw reply when
/// it is not the requested JSON object.
pub async fn compose(oracle: &dyn ReasoningOracle) -> Result<String> {
    let raw = oracle
        .complete(&prompts::introduction_prompt())
        .await
        .context("Introduction oracle call failed")?;

    let text = match structured::parse_as::<IntroPayload>(&raw) {
        Ok(payload) => payload.tweet,
        Err(e) => {
            debug!(error = %e, "Introduction was not JSON, using raw text");
            structured::strip_fences(&raw)
        }
    };
    let text: String = text.trim().chars().take(MAX_POST_CHARS).collect();
    if text.is_empty() {
        anyhow::bail!("Oracle returned an empty introduction");
    }
    Ok(text)
}

/// Compose an introduction and post it as a status.
pub async fn introduce(oracle: &dyn ReasoningOracle, feed: &dyn SocialFeed) -> Result<String> {
    let text = compose(oracle).await?;
    feed.post_status(&text).await.context("Failed to post introduction")?;
    info!(len = text.len(), "Introduction posted");
    Ok(text)
}
