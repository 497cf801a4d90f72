//! Data Transfer Objects (DTOs) for API requests and responses

pub mod common;
pub mod costs;
pub mod customer;

pub use common::*;
pub use costs::*;
pub use customer::*;
