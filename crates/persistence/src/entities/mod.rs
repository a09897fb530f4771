//! Database entity definitions.

pub mod emergency;
pub mod sla_metrics;
pub mod technician;

pub use emergency::EmergencyEntity;
pub use sla_metrics::SlaMetricsEntity;
pub use technician::{TechnicianEntity, TechnicianMatchRow};
