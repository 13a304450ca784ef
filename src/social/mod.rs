//! Social platform integration.
//!
//! Defines the `SocialFeed` trait consumed by the reply poller and the
//! HTTP surface, plus text helpers for cleaning reply bodies.

pub mod twitter;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};

use crate::types::{Reply, ReplyPage};

/// Abstraction over a social platform account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialFeed: Send + Sync {
    /// Recent top-level posts of an account; each is a tracked thread.
    async fn recent_threads(&self, account_id: &str) -> Result<Vec<String>>;

    /// One page of replies under a thread, newest provider page first.
    async fn fetch_replies(
        &self,
        thread_id: &str,
        since: DateTime<Utc>,
        cursor: Option<String>,
    ) -> Result<ReplyPage>;

    async fn post_reply(&self, reply_id: &str, text: &str) -> Result<()>;

    async fn post_status(&self, text: &str) -> Result<()>;
}

/// Walk every page of replies under a thread as a stream of pages.
///
/// The stream ends after the page that carries no continuation cursor,
/// or after the first error.
pub fn reply_pages<'a>(
    feed: &'a dyn SocialFeed,
    thread_id: &'a str,
    since: DateTime<Utc>,
) -> impl Stream<Item = Result<ReplyPage>> + 'a {
    // State: Some(cursor) while more pages may follow, None once exhausted.
    stream::try_unfold(Some(None::<String>), move |state| async move {
        let Some(cursor) = state else {
            return Ok::<_, anyhow::Error>(None);
        };
        let page = feed.fetch_replies(thread_id, since, cursor).await?;
        let next = page.next_cursor.clone().map(Some);
        Ok::<_, anyhow::Error>(Some((page, next)))
    })
}

/// Remove `@mention` tokens and collapse whitespace.
pub fn strip_mentions(text: &str) -> String {
    text.split_whitespace()
        .filter(|word| !word.starts_with('@'))
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
