//! PostgreSQL implementations of the domain store traits.

pub mod emergency;
pub mod sla_metrics;
pub mod technician;

pub use emergency::PgEmergencyStore;
pub use sla_metrics::PgSlaStore;
pub use technician::PgTechnicianStore;
