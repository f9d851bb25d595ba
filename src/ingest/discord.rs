// src/ingest/discord.rs
//! Discord channel read API: paginated "messages after id" fetch.
//!
//! Pagination and rate-limit suspension live here; everything below "fetch a
//! page" is the transport's business. The page call is split behind
//! [`PageFetch`] so paging is testable with scripted pages.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use super::types::{MessageId, MessageSource, RawMessage};
use crate::error::{advised_retry_after, excerpt, FetchError};

const API_BASE: &str = "https://discord.com/api/v10";
const USER_AGENT: &str = "discord-signal-relay/0.1";

/// Protocol maximum for one page.
pub const PAGE_MAX: usize = 100;

/// Fallback suspension when a 429 carries no advisory interval.
const RATE_LIMIT_FALLBACK_SECS: f64 = 5.0;

/// One page of messages after `after` (newest messages when `after` is None).
#[async_trait]
pub trait PageFetch: Send + Sync {
    async fn page(
        &self,
        after: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, FetchError>;
}

/// Page forward until a short page signals exhaustion, then return the union
/// sorted ascending by id. `after` never advances past ids we have not seen,
/// so a failed page leaves no gap.
pub async fn fetch_all<P>(
    pages: &P,
    after: Option<MessageId>,
    limit: usize,
) -> Result<Vec<RawMessage>, FetchError>
where
    P: PageFetch + ?Sized,
{
    let limit = limit.clamp(1, PAGE_MAX);
    let mut collected: Vec<RawMessage> = Vec::new();
    let mut cursor = after;

    loop {
        let page = pages.page(cursor, limit).await?;
        let full = page.len() >= limit;
        let max_id = page.iter().map(|m| m.id).max();
        collected.extend(page);
        if !full {
            break;
        }
        cursor = max_id;
    }

    collected.sort_by_key(|m| m.id);
    Ok(collected)
}

pub struct DiscordChannel {
    client: Client,
    token: String,
    channel_id: String,
    timeout: Duration,
}

impl DiscordChannel {
    pub fn new(token: String, channel_id: String) -> Self {
        Self {
            client: Client::new(),
            token,
            channel_id,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait]
impl PageFetch for DiscordChannel {
    async fn page(
        &self,
        after: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, FetchError> {
        let url = format!("{API_BASE}/channels/{}/messages", self.channel_id);

        loop {
            let mut req = self
                .client
                .get(&url)
                .header("Authorization", &self.token)
                .header("User-Agent", USER_AGENT)
                .timeout(self.timeout)
                .query(&[("limit", limit.to_string())]);
            if let Some(a) = after {
                req = req.query(&[("after", a.to_string())]);
            }

            let rsp = req.send().await?;
            let status = rsp.status();

            if status.as_u16() == 429 {
                let body = rsp.text().await.unwrap_or_default();
                let wait = advised_retry_after(&body, RATE_LIMIT_FALLBACK_SECS);
                warn!(wait_secs = wait, "channel fetch rate limited, suspending");
                tokio::time::sleep(Duration::from_secs_f64(wait + 0.5)).await;
                continue;
            }

            if !status.is_success() {
                let body = rsp.text().await.unwrap_or_default();
                return Err(FetchError::UnexpectedStatus {
                    status: status.as_u16(),
                    body: excerpt(&body),
                });
            }

            return Ok(rsp.json::<Vec<RawMessage>>().await?);
        }
    }
}

#[async_trait]
impl MessageSource for DiscordChannel {
    async fn fetch_after(
        &self,
        after: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<RawMessage>, FetchError> {
        fetch_all(self, after, limit).await
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
