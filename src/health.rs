//! Liveness reporting for the ceremony coordinator

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::EphemeralStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Point-in-time health snapshot.
///
/// The coordinator is degraded, not dead, when the store is unreachable:
/// every ceremony operation will fail until it comes back, but no state is
/// lost beyond what TTLs reclaim anyway.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub store_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Probe the ephemeral store and build a report
pub async fn check(store: &dyn EphemeralStore) -> HealthReport {
    match store.ping().await {
        Ok(()) => HealthReport {
            status: HealthStatus::Healthy,
            store_connected: true,
            detail: None,
            timestamp: Utc::now(),
        },
        Err(e) => HealthReport {
            status: HealthStatus::Degraded,
            store_connected: false,
            detail: Some(e.to_string()),
            timestamp: Utc::now(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_memory_store_reports_healthy() {
        let store = MemoryStore::new();
        let report = check(&store).await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.store_connected);
        assert!(report.detail.is_none());
    }
}
