//! Twilio client
//!
//! Lists messages and calls for the account, optionally scoped to one phone
//! number (matched as sender or recipient). Prices come back as signed
//! decimal strings, counts as strings, dates in RFC 2822.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relaybill_core::{
    config::TwilioConfig,
    models::{CallRecord, SmsRecord, UsagePeriod},
    traits::TelephonyUsageSource,
    AppResult,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

use super::{build_http_client, send_json, UpstreamError};

const SERVICE: &str = "twilio";
const API_VERSION: &str = "2010-04-01";
const PAGE_SIZE: &str = "1000";
/// Default upper bound on pages followed for one listing
const MAX_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    messages: Vec<TwilioMessage>,
    next_page_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallPage {
    #[serde(default)]
    calls: Vec<TwilioCall>,
    next_page_uri: Option<String>,
}

trait Page: DeserializeOwned {
    type Item;
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

impl Page for MessagePage {
    type Item = TwilioMessage;
    fn into_parts(self) -> (Vec<TwilioMessage>, Option<String>) {
        (self.messages, self.next_page_uri)
    }
}

impl Page for CallPage {
    type Item = TwilioCall;
    fn into_parts(self) -> (Vec<TwilioCall>, Option<String>) {
        (self.calls, self.next_page_uri)
    }
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    date_sent: Option<String>,
    num_segments: Option<String>,
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioCall {
    sid: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    start_time: Option<String>,
    duration: Option<String>,
    price: Option<String>,
}

fn parse_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_price(raw: Option<&str>) -> Option<Decimal> {
    raw.and_then(|s| Decimal::from_str(s.trim()).ok())
}

impl From<TwilioMessage> for SmsRecord {
    fn from(msg: TwilioMessage) -> Self {
        Self {
            sent_at: parse_date(msg.date_sent.as_deref()),
            reported_segments: msg
                .num_segments
                .as_deref()
                .and_then(|n| n.trim().parse().ok()),
            price_usd: parse_price(msg.price.as_deref()),
            sid: msg.sid,
            body: msg.body.unwrap_or_default(),
            from: msg.from.unwrap_or_default(),
            to: msg.to.unwrap_or_default(),
        }
    }
}

impl From<TwilioCall> for CallRecord {
    fn from(call: TwilioCall) -> Self {
        Self {
            started_at: parse_date(call.start_time.as_deref()),
            duration_seconds: call
                .duration
                .as_deref()
                .and_then(|d| d.trim().parse().ok())
                .unwrap_or(0),
            price_usd: parse_price(call.price.as_deref()),
            sid: call.sid,
            from: call.from.unwrap_or_default(),
            to: call.to.unwrap_or_default(),
        }
    }
}

/// Client for the Twilio REST API
pub struct TwilioClient {
    http_client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    timeout_secs: u64,
    max_pages: usize,
}

impl TwilioClient {
    pub fn new(
        base_url: &str,
        account_sid: &str,
        auth_token: &str,
        timeout_secs: u64,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            timeout_secs,
            max_pages: MAX_PAGES,
        })
    }

    /// Pages followed per listing before it is reported incomplete
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Build from configuration; fails when credentials are missing
    pub fn from_config(config: &TwilioConfig) -> Result<Self, UpstreamError> {
        let (Some(sid), Some(token)) = (
            config.account_sid.as_deref().filter(|s| !s.is_empty()),
            config.auth_token.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return Err(UpstreamError::Config(
                "twilio.account_sid and twilio.auth_token must be set".to_string(),
            ));
        };

        Self::new(&config.base_url, sid, token, config.timeout_secs)
    }

    fn resource_url(&self, resource: &str) -> String {
        format!(
            "{}/{}/Accounts/{}/{}.json",
            self.base_url, API_VERSION, self.account_sid, resource
        )
    }

    /// Fetch every page of a list resource starting at `url` with `query`
    async fn fetch_all<P: Page>(
        &self,
        url: String,
        query: Vec<(&'static str, String)>,
    ) -> Result<Vec<P::Item>, UpstreamError> {
        let mut items = Vec::new();
        let mut request = self.http_client.get(&url).query(&query);

        for _ in 0..self.max_pages {
            let page: P = send_json(
                request.basic_auth(&self.account_sid, Some(&self.auth_token)),
                self.timeout_secs,
            )
            .await?;

            let (page_items, next) = page.into_parts();
            items.extend(page_items);

            match next {
                Some(uri) if !uri.is_empty() => {
                    // next_page_uri already carries the filters
                    request = self.http_client.get(format!("{}{}", self.base_url, uri));
                }
                _ => return Ok(items),
            }
        }

        warn!(
            url = %url,
            count = items.len(),
            max_pages = self.max_pages,
            "Twilio listing exceeds page limit"
        );
        Err(UpstreamError::Truncated(self.max_pages))
    }

    /// Date filters plus the optional `From`/`To` number filter
    fn list_query(
        date_field: &'static str,
        date_field_upper: &'static str,
        period: &UsagePeriod,
        number: Option<(&'static str, &str)>,
    ) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("PageSize", PAGE_SIZE.to_string()),
            (date_field, period.start.format("%Y-%m-%d").to_string()),
            (date_field_upper, period.end.format("%Y-%m-%d").to_string()),
        ];
        if let Some((field, value)) = number {
            query.push((field, value.to_string()));
        }
        query
    }

    /// Messages in `period`, sent from or to `phone_number` when given
    #[instrument(skip(self, period))]
    pub async fn list_messages(
        &self,
        period: &UsagePeriod,
        phone_number: Option<&str>,
    ) -> Result<Vec<SmsRecord>, UpstreamError> {
        let url = self.resource_url("Messages");
        // Twilio's range filters are `DateSent>=` and `DateSent<=`
        let filters: Vec<Option<(&'static str, &str)>> = match phone_number {
            Some(number) => vec![Some(("From", number)), Some(("To", number))],
            None => vec![None],
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for filter in filters {
            let query = Self::list_query("DateSent>", "DateSent<", period, filter);
            let messages = self.fetch_all::<MessagePage>(url.clone(), query).await?;
            records.extend(
                messages
                    .into_iter()
                    .filter(|m| seen.insert(m.sid.clone()))
                    .map(SmsRecord::from)
                    .filter(|r| r.sent_at.map_or(true, |at| period.contains(at))),
            );
        }

        debug!(count = records.len(), "Fetched Twilio messages");
        Ok(records)
    }

    /// Calls in `period`, placed from or to `phone_number` when given
    #[instrument(skip(self, period))]
    pub async fn list_calls(
        &self,
        period: &UsagePeriod,
        phone_number: Option<&str>,
    ) -> Result<Vec<CallRecord>, UpstreamError> {
        let url = self.resource_url("Calls");
        let filters: Vec<Option<(&'static str, &str)>> = match phone_number {
            Some(number) => vec![Some(("From", number)), Some(("To", number))],
            None => vec![None],
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for filter in filters {
            let query = Self::list_query("StartTime>", "StartTime<", period, filter);
            let calls = self.fetch_all::<CallPage>(url.clone(), query).await?;
            records.extend(
                calls
                    .into_iter()
                    .filter(|c| seen.insert(c.sid.clone()))
                    .map(CallRecord::from)
                    .filter(|r| r.started_at.map_or(true, |at| period.contains(at))),
            );
        }

        debug!(count = records.len(), "Fetched Twilio calls");
        Ok(records)
    }
}

#[async_trait]
impl TelephonyUsageSource for TwilioClient {
    async fn messages(
        &self,
        period: &UsagePeriod,
        phone_number: Option<&str>,
    ) -> AppResult<Vec<SmsRecord>> {
        self.list_messages(period, phone_number).await.map_err(|e| {
            warn!(error = %e, "Twilio message fetch failed");
            e.into_app_error(SERVICE)
        })
    }

    async fn calls(
        &self,
        period: &UsagePeriod,
        phone_number: Option<&str>,
    ) -> AppResult<Vec<CallRecord>> {
        self.list_calls(period, phone_number).await.map_err(|e| {
            warn!(error = %e, "Twilio call fetch failed");
            e.into_app_error(SERVICE)
        })
    }
}
