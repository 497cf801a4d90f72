//! Retell AI client
//!
//! Lists the voice calls and text chats handled by a customer's agents. Retell prices
//! each session itself; `combined_cost` is reported in cents.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use relaybill_core::{
    config::RetellConfig,
    models::{ConversationKind, ConversationRecord, UsagePeriod},
    traits::ConversationUsageSource,
    AppResult,
};
use reqwest::Client;
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{build_http_client, send_json, UpstreamError};

const SERVICE: &str = "retell";

/// Page size requested from list endpoints
const PAGE_LIMIT: usize = 1000;

/// Default upper bound on pages followed for one agent
const MAX_PAGES: usize = 100;

#[derive(Debug, Serialize)]
struct TimestampRange {
    lower_threshold: i64,
    upper_threshold: i64,
}

#[derive(Debug, Serialize)]
struct CallFilter<'a> {
    agent_id: [&'a str; 1],
    start_timestamp: TimestampRange,
}

#[derive(Debug, Serialize)]
struct ListCallsRequest<'a> {
    filter_criteria: CallFilter<'a>,
    sort_order: &'static str,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionCost {
    combined_cost: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct RetellCall {
    call_id: String,
    agent_id: String,
    start_timestamp: Option<i64>,
    duration_ms: Option<i64>,
    call_cost: Option<SessionCost>,
}

#[derive(Debug, Deserialize)]
struct RetellChat {
    chat_id: String,
    agent_id: String,
    start_timestamp: Option<i64>,
    end_timestamp: Option<i64>,
    chat_cost: Option<SessionCost>,
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

fn cents_to_usd(cost: Option<&SessionCost>) -> Option<Decimal> {
    cost.and_then(|c| c.combined_cost)
        .map(|cents| cents / Decimal::ONE_HUNDRED)
}

impl From<RetellCall> for ConversationRecord {
    fn from(call: RetellCall) -> Self {
        Self {
            cost_usd: cents_to_usd(call.call_cost.as_ref()),
            id: call.call_id,
            agent_id: call.agent_id,
            kind: ConversationKind::Call,
            started_at: call.start_timestamp.and_then(millis_to_datetime),
            duration_seconds: call.duration_ms.map(|ms| ms / 1000),
        }
    }
}

impl From<RetellChat> for ConversationRecord {
    fn from(chat: RetellChat) -> Self {
        let duration_seconds = match (chat.start_timestamp, chat.end_timestamp) {
            (Some(start), Some(end)) if end >= start => Some((end - start) / 1000),
            _ => None,
        };

        Self {
            cost_usd: cents_to_usd(chat.chat_cost.as_ref()),
            id: chat.chat_id,
            agent_id: chat.agent_id,
            kind: ConversationKind::Chat,
            started_at: chat.start_timestamp.and_then(millis_to_datetime),
            duration_seconds,
        }
    }
}

/// Client for the Retell AI REST API
pub struct RetellClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    max_pages: usize,
}

impl RetellClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, UpstreamError> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout_secs,
            max_pages: MAX_PAGES,
        })
    }

    /// Pages of calls followed per agent before the listing is reported incomplete
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Build from configuration; fails when no API key is set
    pub fn from_config(config: &RetellConfig) -> Result<Self, UpstreamError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| UpstreamError::Config("retell.api_key not set".to_string()))?;

        Self::new(&config.base_url, api_key, config.timeout_secs)
    }

    /// Voice calls handled by `agent_id` that started inside `period`
    #[instrument(skip(self, period))]
    pub async fn list_calls(
        &self,
        agent_id: &str,
        period: &UsagePeriod,
    ) -> Result<Vec<ConversationRecord>, UpstreamError> {
        let url = format!("{}/v2/list-calls", self.base_url);
        let mut records = Vec::new();
        let mut pagination_key = None;

        for _ in 0..self.max_pages {
            let request = ListCallsRequest {
                filter_criteria: CallFilter {
                    agent_id: [agent_id],
                    start_timestamp: TimestampRange {
                        lower_threshold: period.start_millis(),
                        upper_threshold: period.end_millis(),
                    },
                },
                sort_order: "ascending",
                limit: PAGE_LIMIT,
                pagination_key: pagination_key.take(),
            };

            let page: Vec<RetellCall> = send_json(
                self.http_client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request),
                self.timeout_secs,
            )
            .await?;

            let page_len = page.len();
            let last_id = page.last().map(|call| call.call_id.clone());
            records.extend(page.into_iter().map(ConversationRecord::from));

            if page_len < PAGE_LIMIT {
                debug!(count = records.len(), "Fetched Retell calls");
                return Ok(records);
            }
            pagination_key = last_id;
        }

        warn!(
            count = records.len(),
            max_pages = self.max_pages,
            "Retell call listing exceeds page limit"
        );
        Err(UpstreamError::Truncated(self.max_pages))
    }

    /// Text chats handled by any of `agent_ids` that started inside `period`
    ///
    /// The chat listing has no server-side filter, so it is fetched once and
    /// agent and period are applied here.
    #[instrument(skip(self, period))]
    pub async fn list_chats(
        &self,
        agent_ids: &[String],
        period: &UsagePeriod,
    ) -> Result<Vec<ConversationRecord>, UpstreamError> {
        let url = format!("{}/list-chat", self.base_url);

        let chats: Vec<RetellChat> = send_json(
            self.http_client.get(&url).bearer_auth(&self.api_key),
            self.timeout_secs,
        )
        .await?;

        let records: Vec<ConversationRecord> = chats
            .into_iter()
            .filter(|chat| agent_ids.contains(&chat.agent_id))
            .map(ConversationRecord::from)
            .filter(|record| record.started_at.is_some_and(|at| period.contains(at)))
            .collect();

        debug!(count = records.len(), "Fetched Retell chats");
        Ok(records)
    }
}

#[async_trait]
impl ConversationUsageSource for RetellClient {
    async fn conversations(
        &self,
        agent_ids: &[String],
        period: &UsagePeriod,
    ) -> AppResult<Vec<ConversationRecord>> {
        let (calls, chats) = tokio::try_join!(
            try_join_all(
                agent_ids
                    .iter()
                    .map(|agent_id| self.list_calls(agent_id, period))
            ),
            self.list_chats(agent_ids, period)
        )
        .map_err(|e| {
            warn!(?agent_ids, error = %e, "Retell usage fetch failed");
            e.into_app_error(SERVICE)
        })?;

        let mut records: Vec<ConversationRecord> = calls.into_iter().flatten().collect();
        records.extend(chats);
        Ok(records)
    }
}
