//! Background job scheduler and job implementations.

mod location_cache_sweep;
mod pool_metrics;
mod scheduler;
mod sla_monitor;

pub use location_cache_sweep::LocationCacheSweepJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobError, JobFrequency, JobScheduler};
pub use sla_monitor::SlaMonitorJob;
