//! Customer model
//!
//! A billed customer together with the usage identifiers that scope its
//! cost queries (conversational agents and telephone numbers).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Upper bound accepted for a markup percentage
pub const MAX_MARKUP_PERCENTAGE: Decimal = Decimal::ONE_THOUSAND;

/// Customer entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    /// Unique identifier
    pub id: i32,

    /// Display name
    pub name: String,

    /// Billing contact email
    pub email: String,

    /// Surcharge applied on top of the usage subtotal, in percent
    pub markup_percentage: Decimal,

    /// Conversational AI agents owned by this customer
    pub agent_ids: Vec<String>,

    /// Telephone numbers (E.164) used by this customer's agents
    pub phone_numbers: Vec<String>,

    /// Identifier in the payment provider, once invoiced
    pub stripe_customer_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Whether `markup` lies within 0..=MAX_MARKUP_PERCENTAGE
    pub fn is_valid_markup(markup: Decimal) -> bool {
        (Decimal::ZERO..=MAX_MARKUP_PERCENTAGE).contains(&markup)
    }

    /// Normalize a phone number to E.164 form (`+` followed by digits)
    pub fn normalize_phone(phone: &str) -> String {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return digits;
        }
        format!("+{}", digits)
    }
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            email: String::new(),
            markup_percentage: Decimal::ZERO,
            agent_ids: Vec::new(),
            phone_numbers: Vec::new(),
            stripe_customer_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
