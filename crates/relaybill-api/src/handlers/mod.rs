//! HTTP request handlers

pub mod costs;
pub mod customer;
pub mod exchange;
pub mod health;

pub use costs::configure as configure_costs;
pub use customer::configure as configure_customers;
pub use exchange::configure as configure_exchange;
pub use health::configure as configure_health;
