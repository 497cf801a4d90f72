//! Repository implementations
//!
//! Concrete implementations of the repository traits defined in
//! relaybill-core, using sqlx for PostgreSQL access.

pub mod customer_repo;

pub use customer_repo::PgCustomerRepository;
