//! Evicts expired cached locations and idle tracking channels.

use domain::services::LocationCache;
use std::sync::Arc;
use tracing::debug;

use super::scheduler::{Job, JobError, JobFrequency};
use crate::services::TrackingHub;

pub struct LocationCacheSweepJob {
    locations: Arc<dyn LocationCache>,
    hub: TrackingHub,
}

impl LocationCacheSweepJob {
    pub fn new(locations: Arc<dyn LocationCache>, hub: TrackingHub) -> Self {
        Self { locations, hub }
    }
}

#[async_trait::async_trait]
impl Job for LocationCacheSweepJob {
    fn name(&self) -> &'static str {
        "location_cache_sweep"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<(), JobError> {
        let evicted = self.locations.purge_expired().await?;
        let channels = self.hub.cleanup().await;
        if evicted > 0 || channels > 0 {
            debug!(evicted, channels, "Swept tracking state");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::TechnicianLocation;
    use persistence::InMemoryLocationCache;
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_sweep_drops_idle_channels_and_expired_entries() {
        let cache = Arc::new(InMemoryLocationCache::new());
        let hub = TrackingHub::default();
        let location = TechnicianLocation {
            technician_id: Uuid::new_v4(),
            latitude: 6.45,
            longitude: 3.42,
            speed: None,
            heading: None,
            timestamp: Utc::now(),
        };
        cache.put(&location, Duration::ZERO).await.unwrap();
        drop(hub.subscribe(Uuid::new_v4()).await);

        let job = LocationCacheSweepJob::new(cache.clone(), hub.clone());
        job.execute().await.unwrap();

        assert_eq!(cache.len().await, 0);
        assert_eq!(hub.channel_count().await, 0);
    }
}
