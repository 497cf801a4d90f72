//! API layer for RelayBill
//!
//! HTTP handlers for the cost calculators, the exchange rate, customer
//! management and per-customer cost breakdowns.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

pub use dto::{ApiResponse, PaginationParams};

pub use handlers::{configure_costs, configure_customers, configure_exchange, configure_health};
