//! Persistence layer for the Rescue Dispatch backend.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - PostgreSQL repositories implementing the domain store traits
//! - In-memory stores for development and tests
//! - Technician location caches (in-memory TTL map and Redis)

pub mod cache;
pub mod db;
pub mod entities;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod repositories;

pub use cache::{InMemoryLocationCache, RedisLocationCache};
pub use memory::{InMemoryEmergencyStore, InMemorySlaStore, InMemoryTechnicianStore};
pub use repositories::{PgEmergencyStore, PgSlaStore, PgTechnicianStore};
