//! Common traits for repositories and external sources
//!
//! Defines abstractions for the customer store and for the usage and
//! exchange-rate platforms the cost calculation depends on.

use crate::error::AppError;
use crate::models::{CallRecord, ConversationRecord, Customer, SmsRecord, UsagePeriod};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

/// Generic repository trait for CRUD operations
#[async_trait]
pub trait Repository<T, ID>: Send + Sync {
    /// Find entity by ID
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, AppError>;

    /// Find all entities with pagination
    async fn find_all(&self, limit: i64, offset: i64) -> Result<Vec<T>, AppError>;

    /// Count total entities
    async fn count(&self) -> Result<i64, AppError>;

    /// Create a new entity
    async fn create(&self, entity: &T) -> Result<T, AppError>;

    /// Update an existing entity
    async fn update(&self, entity: &T) -> Result<T, AppError>;

    /// Delete entity by ID
    async fn delete(&self, id: ID) -> Result<bool, AppError>;
}

/// Customer repository trait with specialized methods
#[async_trait]
pub trait CustomerRepository: Repository<Customer, i32> {
    /// Find customer by billing email
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, AppError>;

    /// Search customers by name or email fragment
    async fn search(
        &self,
        query: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Customer>, i64), AppError>;
}

/// Conversational-AI platform reporting per-session usage
#[async_trait]
pub trait ConversationUsageSource: Send + Sync {
    /// Calls and chats handled by any of `agent_ids` that started inside `period`
    async fn conversations(
        &self,
        agent_ids: &[String],
        period: &UsagePeriod,
    ) -> Result<Vec<ConversationRecord>, AppError>;
}

/// Telephony platform reporting billed messages and calls
#[async_trait]
pub trait TelephonyUsageSource: Send + Sync {
    /// Messages sent or received by `phone_number` (all numbers when None) inside `period`
    async fn messages(
        &self,
        period: &UsagePeriod,
        phone_number: Option<&str>,
    ) -> Result<Vec<SmsRecord>, AppError>;

    /// Calls placed or received by `phone_number` (all numbers when None) inside `period`
    async fn calls(
        &self,
        period: &UsagePeriod,
        phone_number: Option<&str>,
    ) -> Result<Vec<CallRecord>, AppError>;
}

/// Source of the current USD to CAD exchange rate
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    async fn fetch_usd_to_cad(&self) -> Result<Decimal, AppError>;
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}
