//! Cost aggregator
//!
//! Builds a customer's cost breakdown for a period from three sources:
//! carrier SMS, carrier voice and conversational-AI sessions. Sources are
//! queried concurrently. A failing or unconfigured source zeroes its
//! category and adds a warning; the breakdown itself still succeeds.

use futures::future::try_join_all;
use relaybill_core::{
    config::BillingConfig,
    models::{
        CallRecord, ConversationKind, CostBreakdown, CostCategory, CostWarning, Customer,
        SmsRecord, UsagePeriod,
    },
    traits::{ConversationUsageSource, CustomerRepository, TelephonyUsageSource},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::constants::BILLING_CURRENCY;
use crate::currency::CurrencyConverter;
use crate::sms::{count_segments, SmsSegmentCalculator};
use crate::voice::{billed_minutes, VoiceCostCalculator};

/// Convert with the rate captured at the start of the aggregation
#[inline]
fn to_cad(amount_usd: Decimal, rate: Decimal) -> Decimal {
    amount_usd * rate
}

#[derive(Debug, Default, PartialEq)]
struct SmsTotals {
    count: u64,
    segments: u64,
    cost_usd: Decimal,
}

#[derive(Debug, Default, PartialEq)]
struct VoiceTotals {
    count: u64,
    minutes: u64,
    cost_usd: Decimal,
}

#[derive(Debug, Default, PartialEq)]
struct ConversationTotals {
    count: u64,
    chats: u64,
    cost_usd: Decimal,
}

/// Aggregates usage costs per customer
pub struct CostAggregator {
    customers: Arc<dyn CustomerRepository>,
    telephony: Option<Arc<dyn TelephonyUsageSource>>,
    conversations: Option<Arc<dyn ConversationUsageSource>>,
    converter: CurrencyConverter,
    sms: SmsSegmentCalculator,
    voice: VoiceCostCalculator,
    initial_prompt_segments: u32,
}

impl CostAggregator {
    /// Create an aggregator
    ///
    /// A `None` source is reported as unavailable in every breakdown.
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        telephony: Option<Arc<dyn TelephonyUsageSource>>,
        conversations: Option<Arc<dyn ConversationUsageSource>>,
        converter: CurrencyConverter,
        billing: &BillingConfig,
    ) -> Self {
        Self {
            customers,
            telephony,
            conversations,
            converter,
            sms: SmsSegmentCalculator::new(billing.sms_rate_per_segment_usd),
            voice: VoiceCostCalculator::new(billing.voice_rate_per_minute_usd),
            initial_prompt_segments: billing.initial_prompt_segments,
        }
    }

    pub fn converter(&self) -> &CurrencyConverter {
        &self.converter
    }

    /// Breakdown for the customer with `customer_id`
    ///
    /// # Errors
    ///
    /// - `AppError::CustomerNotFound` if no such customer exists
    /// - `AppError::Database` if the customer store fails
    #[instrument(skip(self, period))]
    pub async fn aggregate(&self, customer_id: i32, period: &UsagePeriod) -> AppResult<CostBreakdown> {
        let customer = self
            .customers
            .find_by_id(customer_id)
            .await?
            .ok_or_else(|| AppError::CustomerNotFound(customer_id.to_string()))?;

        Ok(self.aggregate_for_customer(&customer, period).await)
    }

    /// Breakdown for an already loaded customer; never fails
    #[instrument(skip(self, customer, period), fields(customer_id = customer.id))]
    pub async fn aggregate_for_customer(
        &self,
        customer: &Customer,
        period: &UsagePeriod,
    ) -> CostBreakdown {
        // One rate for every category of this breakdown
        self.converter.refresh_if_stale();
        let snapshot = self.converter.snapshot();
        let rate = snapshot.rate;

        let mut breakdown = CostBreakdown::empty(customer.id, *period, BILLING_CURRENCY, rate);

        if snapshot.is_fallback() && self.converter.has_source() {
            breakdown.warnings.push(CostWarning::new(
                CostCategory::ExchangeRate,
                format!("Live exchange rate unavailable, using fallback {}", rate),
            ));
        }

        let (sms, voice, conversations) = tokio::join!(
            self.sms_totals(customer, period),
            self.voice_totals(customer, period),
            self.conversation_totals(customer, period),
        );

        // Chats seen by the conversation source; zero when it failed
        let mut chats = 0;
        match conversations {
            Ok(totals) => {
                chats = totals.chats;
                breakdown.conversation_count = totals.count;
                breakdown.conversation_cost = to_cad(totals.cost_usd, rate);
            }
            Err(message) => breakdown
                .warnings
                .push(CostWarning::new(CostCategory::Conversation, message)),
        }

        match sms {
            Ok(totals) => {
                // Opening prompt of each chat is billed as SMS segments
                let prompt_segments = chats * u64::from(self.initial_prompt_segments);
                let prompt_cost_usd =
                    Decimal::from(prompt_segments) * self.sms.rate_per_segment_usd();

                breakdown.sms_count = totals.count;
                breakdown.sms_segments = totals.segments + prompt_segments;
                breakdown.sms_cost = to_cad(totals.cost_usd + prompt_cost_usd, rate);
            }
            Err(message) => breakdown
                .warnings
                .push(CostWarning::new(CostCategory::Sms, message)),
        }

        match voice {
            Ok(totals) => {
                breakdown.call_count = totals.count;
                breakdown.call_minutes = totals.minutes;
                breakdown.voice_cost = to_cad(totals.cost_usd, rate);
            }
            Err(message) => breakdown
                .warnings
                .push(CostWarning::new(CostCategory::Voice, message)),
        }

        breakdown.finalize(customer.markup_percentage);

        info!(
            subtotal = %breakdown.subtotal,
            total = %breakdown.total,
            warnings = breakdown.warnings.len(),
            "Aggregated customer costs"
        );

        breakdown
    }

    async fn sms_totals(&self, customer: &Customer, period: &UsagePeriod) -> Result<SmsTotals, String> {
        if customer.phone_numbers.is_empty() {
            return Ok(SmsTotals::default());
        }
        let source = self
            .telephony
            .as_ref()
            .ok_or_else(|| "Telephony usage source not configured".to_string())?;

        let pages = try_join_all(
            customer
                .phone_numbers
                .iter()
                .map(|number| source.messages(period, Some(number.as_str()))),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "SMS usage unavailable");
            e.to_string()
        })?;

        let mut seen = HashSet::new();
        let totals = pages
            .into_iter()
            .flatten()
            .filter(|m| seen.insert(m.sid.clone()))
            .fold(SmsTotals::default(), |mut acc, message| {
                let (segments, cost) = self.price_message(&message);
                acc.count += 1;
                acc.segments += u64::from(segments);
                acc.cost_usd += cost;
                acc
            });

        debug!(?totals, "SMS usage totals");
        Ok(totals)
    }

    /// Billed segments and USD cost of one message
    ///
    /// Carrier-reported values win; prices are reported as negative amounts.
    fn price_message(&self, message: &SmsRecord) -> (u32, Decimal) {
        let segments = message
            .reported_segments
            .unwrap_or_else(|| count_segments(&message.body));
        let cost = match message.price_usd {
            Some(price) => price.abs(),
            None => self.sms.cost_usd(segments),
        };
        (segments, cost)
    }

    async fn voice_totals(&self, customer: &Customer, period: &UsagePeriod) -> Result<VoiceTotals, String> {
        if customer.phone_numbers.is_empty() {
            return Ok(VoiceTotals::default());
        }
        let source = self
            .telephony
            .as_ref()
            .ok_or_else(|| "Telephony usage source not configured".to_string())?;

        let pages = try_join_all(
            customer
                .phone_numbers
                .iter()
                .map(|number| source.calls(period, Some(number.as_str()))),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "Voice usage unavailable");
            e.to_string()
        })?;

        let mut seen = HashSet::new();
        let totals = pages
            .into_iter()
            .flatten()
            .filter(|c| seen.insert(c.sid.clone()))
            .fold(VoiceTotals::default(), |mut acc, call| {
                acc.count += 1;
                acc.minutes += billed_minutes(call.duration_seconds) as u64;
                acc.cost_usd += self.price_call(&call);
                acc
            });

        debug!(?totals, "Voice usage totals");
        Ok(totals)
    }

    fn price_call(&self, call: &CallRecord) -> Decimal {
        match call.price_usd {
            Some(price) => price.abs(),
            None => self.voice.cost_usd(call.duration_seconds),
        }
    }

    async fn conversation_totals(
        &self,
        customer: &Customer,
        period: &UsagePeriod,
    ) -> Result<ConversationTotals, String> {
        if customer.agent_ids.is_empty() {
            return Ok(ConversationTotals::default());
        }
        let source = self
            .conversations
            .as_ref()
            .ok_or_else(|| "Conversational AI usage source not configured".to_string())?;

        let records = source
            .conversations(&customer.agent_ids, period)
            .await
            .map_err(|e| {
                warn!(error = %e, "Conversational AI usage unavailable");
                e.to_string()
            })?;

        let totals = records.into_iter().fold(ConversationTotals::default(), |mut acc, record| {
            acc.count += 1;
            if record.kind == ConversationKind::Chat {
                acc.chats += 1;
            }
            acc.cost_usd += record.cost_or_zero();
            acc
        });

        debug!(?totals, "Conversational AI usage totals");
        Ok(totals)
    }
}
