//! RelayBill Database Layer
//!
//! This crate provides PostgreSQL database access and repository implementations
//! for the RelayBill system:
//!
//! - Connection pool management with sqlx
//! - Schema migrations
//! - The customer repository backing customer management and cost scoping

pub mod pool;
pub mod repositories;

pub use pool::{create_pool, run_migrations};
pub use repositories::*;

pub use relaybill_core::{AppError, AppResult};
pub use sqlx::PgPool;
