//! RelayBill Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the RelayBill system. It includes:
//!
//! - Domain models (Customer, usage records, CostBreakdown, etc.)
//! - Traits for the customer store and the external usage sources
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
