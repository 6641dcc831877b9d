//! Rolling provider health and the background prober.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::QuoteOrchestrator;
use crate::models::ProviderHealth;

/// Default probe interval.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(120);

/// Shared map of provider health, last write wins.
#[derive(Default)]
pub struct HealthTracker {
    entries: RwLock<HashMap<String, ProviderHealth>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderHealth>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProviderHealth>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current health, or a fresh record for never-probed providers.
    pub fn get(&self, provider_id: &str) -> ProviderHealth {
        self.read()
            .get(provider_id)
            .cloned()
            .unwrap_or_else(|| ProviderHealth::new(provider_id))
    }

    pub fn record_success(&self, provider_id: &str, response_time: Duration) {
        let mut entries = self.write();
        let health = entries
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderHealth::new(provider_id));
        health.record_success(response_time.as_millis() as u64, Utc::now());
    }

    pub fn record_failure(&self, provider_id: &str, error: &str) {
        let mut entries = self.write();
        let health = entries
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderHealth::new(provider_id));
        health.record_failure(error, Utc::now());
    }
}

/// Starts the background health prober.
///
/// Probes every active provider once per `every` until `shutdown` flips to
/// `true` or its sender is dropped. The first round runs immediately.
pub fn start_health_monitor(
    orchestrator: Arc<QuoteOrchestrator>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Provider health monitor started ({:?} interval)", every);

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("Running provider health checks");
                    orchestrator.run_health_checks().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Provider health monitor shutting down");
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_reports_full_health() {
        let tracker = HealthTracker::new();
        let health = tracker.get("LIFESHIELD");
        assert_eq!(health.health_score, 100);
        assert!(health.last_health_check.is_none());
    }

    #[test]
    fn test_tracker_accumulates_counts() {
        let tracker = HealthTracker::new();
        tracker.record_success("LIFESHIELD", Duration::from_millis(200));
        tracker.record_success("LIFESHIELD", Duration::from_millis(200));
        tracker.record_failure("LIFESHIELD", "timeout");

        let health = tracker.get("LIFESHIELD");
        assert_eq!(health.success_count, 2);
        assert_eq!(health.error_count, 1);
        // round(2/3 * 70) = 47
        assert_eq!(health.health_score, 47);
        assert!(health.last_health_check.is_some());
    }

    #[tokio::test]
    async fn test_monitor_stops_on_shutdown() {
        use crate::registry::ProviderRegistry;

        let orchestrator = Arc::new(QuoteOrchestrator::new(Arc::new(ProviderRegistry::new())));
        let (tx, rx) = watch::channel(false);
        let handle = start_health_monitor(orchestrator, Duration::from_millis(10), rx);

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
