//! Customer DTOs
//!
//! Request and response types for customer management endpoints.

use chrono::{DateTime, Utc};
use relaybill_core::models::Customer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Markup must lie within 0..=1000 percent
fn validate_markup(markup: &Decimal) -> Result<(), ValidationError> {
    if !Customer::is_valid_markup(*markup) {
        let mut err = ValidationError::new("markup_range");
        err.message = Some("Markup must be between 0 and 1000 percent".into());
        return Err(err);
    }
    Ok(())
}

/// Customer creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CustomerCreateRequest {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "A valid billing email is required"))]
    pub email: String,

    /// Surcharge in percent applied to the usage subtotal
    #[serde(default)]
    #[validate(custom(function = "validate_markup"))]
    pub markup_percentage: Decimal,

    /// Conversational agent identifiers
    #[serde(default)]
    pub agent_ids: Vec<String>,

    /// Telephone numbers, normalized to E.164 on save
    #[serde(default)]
    pub phone_numbers: Vec<String>,

    pub stripe_customer_id: Option<String>,
}

impl CustomerCreateRequest {
    /// Convert to Customer entity
    pub fn to_customer(&self) -> Customer {
        Customer {
            id: 0,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            markup_percentage: self.markup_percentage,
            agent_ids: clean_ids(&self.agent_ids),
            phone_numbers: self.phone_numbers.clone(),
            stripe_customer_id: self.stripe_customer_id.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Customer update request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CustomerUpdateRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(custom(function = "validate_markup"))]
    pub markup_percentage: Option<Decimal>,

    pub agent_ids: Option<Vec<String>>,

    pub phone_numbers: Option<Vec<String>>,

    pub stripe_customer_id: Option<String>,
}

impl CustomerUpdateRequest {
    /// Apply the present fields to `customer`
    pub fn apply(&self, customer: &mut Customer) {
        if let Some(name) = &self.name {
            customer.name = name.trim().to_string();
        }
        if let Some(email) = &self.email {
            customer.email = email.trim().to_lowercase();
        }
        if let Some(markup) = self.markup_percentage {
            customer.markup_percentage = markup;
        }
        if let Some(agent_ids) = &self.agent_ids {
            customer.agent_ids = clean_ids(agent_ids);
        }
        if let Some(phone_numbers) = &self.phone_numbers {
            customer.phone_numbers = phone_numbers.clone();
        }
        if let Some(stripe_id) = &self.stripe_customer_id {
            customer.stripe_customer_id = Some(stripe_id.clone()).filter(|s| !s.is_empty());
        }
        customer.updated_at = Utc::now();
    }
}

fn clean_ids(ids: &[String]) -> Vec<String> {
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Customer search parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerSearchParams {
    /// Fragment matched against name or email
    pub q: Option<String>,
}

impl CustomerSearchParams {
    pub fn query(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// Customer response
#[derive(Debug, Clone, Serialize)]
pub struct CustomerResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub markup_percentage: Decimal,
    pub agent_ids: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name,
            email: customer.email,
            markup_percentage: customer.markup_percentage,
            agent_ids: customer.agent_ids,
            phone_numbers: customer.phone_numbers,
            stripe_customer_id: customer.stripe_customer_id,
            created_at: customer.created_at,
            updated_at: customer.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn create_request() -> CustomerCreateRequest {
        CustomerCreateRequest {
            name: "  Acme Dental ".to_string(),
            email: "Billing@Acme.test".to_string(),
            markup_percentage: dec!(20),
            agent_ids: vec!["agent_1".to_string(), "  ".to_string()],
            phone_numbers: vec!["+1 555 010 0001".to_string()],
            stripe_customer_id: None,
        }
    }

    #[test]
    fn test_create_request_validation() {
        assert!(create_request().validate().is_ok());

        let mut req = create_request();
        req.email = "not-an-email".to_string();
        assert!(req.validate().is_err());

        let mut req = create_request();
        req.name = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_markup_bounds() {
        let mut req = create_request();
        req.markup_percentage = dec!(1000);
        assert!(req.validate().is_ok());

        req.markup_percentage = dec!(-0.5);
        assert!(req.validate().is_err());

        req.markup_percentage = dec!(1000.01);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_to_customer_normalizes() {
        let customer = create_request().to_customer();
        assert_eq!(customer.name, "Acme Dental");
        assert_eq!(customer.email, "billing@acme.test");
        assert_eq!(customer.agent_ids, vec!["agent_1".to_string()]);
        assert_eq!(customer.markup_percentage, dec!(20));
    }

    #[test]
    fn test_update_applies_present_fields_only() {
        let mut customer = create_request().to_customer();
        let update = CustomerUpdateRequest {
            markup_percentage: Some(dec!(35)),
            stripe_customer_id: Some("cus_123".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        update.apply(&mut customer);
        assert_eq!(customer.markup_percentage, dec!(35));
        assert_eq!(customer.stripe_customer_id.as_deref(), Some("cus_123"));
        assert_eq!(customer.name, "Acme Dental");

        let invalid = CustomerUpdateRequest {
            markup_percentage: Some(dec!(2000)),
            ..Default::default()
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_search_query_trimmed() {
        let params = CustomerSearchParams {
            q: Some("  ".to_string()),
        };
        assert_eq!(params.query(), None);

        let params = CustomerSearchParams {
            q: Some(" acme ".to_string()),
        };
        assert_eq!(params.query(), Some("acme"));
    }
}
