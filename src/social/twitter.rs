//! Twitter (X) v2 REST client.
//!
//! API: `https://api.twitter.com/2`
//! Auth: OAuth 2.0 bearer token with tweet read/write scopes.
//!
//! Replies under a thread are found through recent search on
//! `conversation_id:<thread>`, which only reaches back seven days, so the
//! requested start time is clamped to that window.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::SocialFeed;
use crate::types::{Reply, ReplyPage};

const TWITTER_API_URL: &str = "https://api.twitter.com/2";
const MAX_RESULTS_PER_PAGE: u32 = 100;
const RECENT_THREADS: u32 = 10;

/// Recent search rejects start times older than this.
const SEARCH_WINDOW_DAYS: i64 = 7;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TweetList {
    #[serde(default)]
    data: Vec<ApiTweet>,
    #[serde(default)]
    meta: Option<ListMeta>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ListMeta {
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateTweet<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplyTarget<'a>>,
}

#[derive(Debug, Serialize)]
struct ReplyTarget<'a> {
    in_reply_to_tweet_id: &'a str,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct TwitterClient {
    http: Client,
    bearer_token: SecretString,
    base_url: String,
}

impl TwitterClient {
    pub fn new(bearer_token: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("CryptoSage/0.1.0")
            .build()
            .context("Failed to build Twitter HTTP client")?;
        Ok(Self {
            http,
            bearer_token,
            base_url: TWITTER_API_URL.to_string(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.bearer_token.expose_secret())
    }

    fn search_start(since: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        let floor = now - Duration::days(SEARCH_WINDOW_DAYS) + Duration::minutes(1);
        since.max(floor)
    }

    fn search_url(&self, thread_id: &str, since: DateTime<Utc>, cursor: Option<&str>) -> String {
        let query = format!("conversation_id:{thread_id}");
        let start = Self::search_start(since, Utc::now()).to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut url = format!(
            "{}/tweets/search/recent?query={}&tweet.fields=created_at,author_id&max_results={}&start_time={}",
            self.base_url,
            urlencoding::encode(&query),
            MAX_RESULTS_PER_PAGE,
            urlencoding::encode(&start),
        );
        if let Some(token) = cursor {
            url.push_str("&next_token=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    fn into_page(body: TweetList) -> ReplyPage {
        let replies = body.data.into_iter()
            .filter_map(|t| {
                let Some(created_at) = t.created_at else {
                    warn!(tweet_id = %t.id, "Tweet without created_at, skipping");
                    return None;
                };
                Some(Reply {
                    id: t.id,
                    text: t.text,
                    author_id: t.author_id.unwrap_or_default(),
                    created_at,
                })
            })
            .collect();
        ReplyPage {
            replies,
            next_cursor: body.meta.and_then(|m| m.next_token),
        }
    }

    async fn get_list(&self, url: &str) -> Result<TweetList> {
        let resp = self.http
            .get(url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .context("Twitter request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            warn!(status = %status, "Twitter returned error");
            anyhow::bail!("Twitter API error {status}: {error_text}");
        }

        resp.json().await.context("Failed to parse Twitter response")
    }

    async fn create_tweet(&self, body: &CreateTweet<'_>) -> Result<()> {
        let resp = self.http
            .post(format!("{}/tweets", self.base_url))
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
            .context("Twitter post failed")?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Twitter post error {status}: {error_text}");
        }
        Ok(())
    }
}

#[async_trait]
impl SocialFeed for TwitterClient {
    async fn recent_threads(&self, account_id: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/users/{}/tweets?max_results={}&exclude=replies",
            self.base_url,
            urlencoding::encode(account_id),
            RECENT_THREADS,
        );
        let body = self.get_list(&url).await?;
        let ids: Vec<String> = body.data.into_iter().map(|t| t.id).collect();
        debug!(account_id, threads = ids.len(), "Fetched recent threads");
        Ok(ids)
    }

    async fn fetch_replies(
        &self,
        thread_id: &str,
        since: DateTime<Utc>,
        cursor: Option<String>,
    ) -> Result<ReplyPage> {
        let url = self.search_url(thread_id, since, cursor.as_deref());
        let page = Self::into_page(self.get_list(&url).await?);
        debug!(
            thread_id,
            replies = page.replies.len(),
            more = page.next_cursor.is_some(),
            "Fetched reply page"
        );
        Ok(page)
    }

    async fn post_reply(&self, reply_id: &str, text: &str) -> Result<()> {
        self.create_tweet(&CreateTweet {
            text,
            reply: Some(ReplyTarget { in_reply_to_tweet_id: reply_id }),
        })
        .await?;
        info!(reply_id, "Posted reply");
        Ok(())
    }

    async fn post_status(&self, text: &str) -> Result<()> {
        self.create_tweet(&CreateTweet { text, reply: None }).await?;
        info!(len = text.len(), "Posted status");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
