//! Customer repository implementation
//!
//! PostgreSQL-backed storage for customers, including the agent and phone
//! number arrays that scope usage queries.

use relaybill_core::{
    models::Customer,
    traits::{CustomerRepository, Repository},
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

const CUSTOMER_COLUMNS: &str = r#"
    id, name, email, markup_percentage,
    agent_ids, phone_numbers, stripe_customer_id,
    created_at, updated_at
"#;

/// PostgreSQL implementation of CustomerRepository
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    /// Create a new customer repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn normalized_phones(entity: &Customer) -> Vec<String> {
        entity
            .phone_numbers
            .iter()
            .map(|p| Customer::normalize_phone(p))
            .filter(|p| !p.is_empty())
            .collect()
    }

    fn map_write_error(e: sqlx::Error, email: &str, action: &str) -> AppError {
        error!("Database error on customer {}: {}", action, e);
        if e.to_string().contains("unique constraint") {
            AppError::AlreadyExists(format!("Customer with email {} already exists", email))
        } else {
            AppError::Database(format!("Failed to {} customer: {}", action, e))
        }
    }
}

#[async_trait]
impl Repository<Customer, i32> for PgCustomerRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Customer>> {
        debug!("Finding customer by id: {}", id);

        let query = format!("SELECT {} FROM customers WHERE id = $1", CUSTOMER_COLUMNS);
        let result = sqlx::query_as::<sqlx::Postgres, CustomerRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding customer {}: {}", id, e);
                AppError::Database(format!("Failed to find customer: {}", e))
            })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Customer>> {
        let query = format!(
            "SELECT {} FROM customers ORDER BY id LIMIT $1 OFFSET $2",
            CUSTOMER_COLUMNS
        );
        let rows = sqlx::query_as::<sqlx::Postgres, CustomerRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing customers: {}", e);
                AppError::Database(format!("Failed to fetch customers: {}", e))
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting customers: {}", e);
                AppError::Database(format!("Failed to count customers: {}", e))
            })?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity), fields(email = %entity.email))]
    async fn create(&self, entity: &Customer) -> AppResult<Customer> {
        debug!("Creating customer: {}", entity.name);

        let query = format!(
            r#"
            INSERT INTO customers (
                name, email, markup_percentage,
                agent_ids, phone_numbers, stripe_customer_id
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, CustomerRow>(&query)
            .bind(&entity.name)
            .bind(entity.email.to_lowercase())
            .bind(entity.markup_percentage)
            .bind(&entity.agent_ids)
            .bind(Self::normalized_phones(entity))
            .bind(&entity.stripe_customer_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(e, &entity.email, "create"))?;

        Ok(row.into())
    }

    #[instrument(skip(self, entity), fields(id = entity.id))]
    async fn update(&self, entity: &Customer) -> AppResult<Customer> {
        debug!("Updating customer: {}", entity.id);

        let query = format!(
            r#"
            UPDATE customers
            SET name = $2,
                email = $3,
                markup_percentage = $4,
                agent_ids = $5,
                phone_numbers = $6,
                stripe_customer_id = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, CustomerRow>(&query)
            .bind(entity.id)
            .bind(&entity.name)
            .bind(entity.email.to_lowercase())
            .bind(entity.markup_percentage)
            .bind(&entity.agent_ids)
            .bind(Self::normalized_phones(entity))
            .bind(&entity.stripe_customer_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(e, &entity.email, "update"))?;

        row.map(Into::into)
            .ok_or_else(|| AppError::CustomerNotFound(entity.id.to_string()))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> AppResult<bool> {
        debug!("Deleting customer: {}", id);

        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error deleting customer {}: {}", id, e);
                AppError::Database(format!("Failed to delete customer: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Customer>> {
        let query = format!(
            "SELECT {} FROM customers WHERE email = $1",
            CUSTOMER_COLUMNS
        );
        let result = sqlx::query_as::<sqlx::Postgres, CustomerRow>(&query)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding customer by email: {}", e);
                AppError::Database(format!("Failed to find customer: {}", e))
            })?;

        Ok(result.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        query: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Customer>, i64)> {
        debug!(
            "Searching customers: query={:?}, limit={}, offset={}",
            query, limit, offset
        );

        // NULL pattern matches every row
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q.replace('%', "\\%").replace('_', "\\_")));

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM customers
            WHERE $1::TEXT IS NULL OR name ILIKE $1 OR email ILIKE $1
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error counting customer search: {}", e);
            AppError::Database(format!("Failed to count customers: {}", e))
        })?;

        let list_query = format!(
            r#"
            SELECT {} FROM customers
            WHERE $1::TEXT IS NULL OR name ILIKE $1 OR email ILIKE $1
            ORDER BY name, id
            LIMIT $2 OFFSET $3
            "#,
            CUSTOMER_COLUMNS
        );

        let rows = sqlx::query_as::<sqlx::Postgres, CustomerRow>(&list_query)
            .bind(&pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error searching customers: {}", e);
                AppError::Database(format!("Failed to search customers: {}", e))
            })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    name: String,
    email: String,
    markup_percentage: Decimal,
    agent_ids: Vec<String>,
    phone_numbers: Vec<String>,
    stripe_customer_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            markup_percentage: row.markup_percentage,
            agent_ids: row.agent_ids,
            phone_numbers: row.phone_numbers,
            stripe_customer_id: row.stripe_customer_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalized_phones_drops_empty() {
        let customer = Customer {
            phone_numbers: vec![
                "1 (555) 010-2000".to_string(),
                "n/a".to_string(),
                "+15550102001".to_string(),
            ],
            ..Default::default()
        };

        assert_eq!(
            PgCustomerRepository::normalized_phones(&customer),
            vec!["+15550102000".to_string(), "+15550102001".to_string()]
        );
    }

    #[test]
    fn test_row_conversion() {
        let now = Utc::now();
        let row = CustomerRow {
            id: 7,
            name: "Acme Dental".to_string(),
            email: "billing@acme.test".to_string(),
            markup_percentage: dec!(20),
            agent_ids: vec!["agent_abc".to_string()],
            phone_numbers: vec!["+15550102000".to_string()],
            stripe_customer_id: None,
            created_at: now,
            updated_at: now,
        };

        let customer: Customer = row.into();
        assert_eq!(customer.id, 7);
        assert_eq!(customer.markup_percentage, dec!(20));
        assert_eq!(customer.agent_ids, vec!["agent_abc".to_string()]);
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_create_and_find_by_email() {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/relaybill".to_string());
        let pool = create_pool(&database_url, Some(2)).await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        let repo = PgCustomerRepository::new(pool);

        let email = format!("test-{}@relaybill.test", Utc::now().timestamp_millis());
        let created = repo
            .create(&Customer {
                name: "Integration Customer".to_string(),
                email: email.clone(),
                markup_percentage: dec!(15),
                ..Default::default()
            })
            .await
            .unwrap();

        let found = repo.find_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);

        assert!(repo.delete(created.id).await.unwrap());
    }
}
