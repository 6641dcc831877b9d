use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling health of one provider, maintained by the background prober.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub provider_id: String,
    /// 0-100.
    pub health_score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check: Option<DateTime<Utc>>,
    pub success_count: u64,
    pub error_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_response_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ProviderHealth {
    /// Providers start at full health until the first probe says otherwise.
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            health_score: 100,
            last_health_check: None,
            success_count: 0,
            error_count: 0,
            last_response_time_ms: None,
            last_error: None,
        }
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            return 1.0;
        }
        self.success_count as f64 / total as f64
    }

    /// Records a successful probe and recomputes the score:
    /// `round(successRate*70 + max(0, 100 - ms/100)*0.3)`.
    pub fn record_success(&mut self, response_time_ms: u64, at: DateTime<Utc>) {
        self.success_count += 1;
        self.last_health_check = Some(at);
        self.last_response_time_ms = Some(response_time_ms);
        self.last_error = None;

        let latency_component = (100.0 - response_time_ms as f64 / 100.0).max(0.0) * 0.3;
        self.health_score = score(self.success_rate() * 70.0 + latency_component);
    }

    /// Records a failed probe: `round(successRate*70)`.
    pub fn record_failure(&mut self, error: impl Into<String>, at: DateTime<Utc>) {
        self.error_count += 1;
        self.last_health_check = Some(at);
        self.last_error = Some(error.into());
        self.health_score = score(self.success_rate() * 70.0);
    }
}

fn score(raw: f64) -> u8 {
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_success_scores_full_marks() {
        let mut health = ProviderHealth::new("AUTOGUARD");
        health.record_success(0, Utc::now());
        assert_eq!(health.health_score, 100);
    }

    #[test]
    fn test_slow_success_loses_latency_points() {
        let mut health = ProviderHealth::new("AUTOGUARD");
        // 5000ms => max(0, 100 - 50) * 0.3 = 15
        health.record_success(5_000, Utc::now());
        assert_eq!(health.health_score, 85);

        // 20s => latency component floors at zero
        let mut health = ProviderHealth::new("AUTOGUARD");
        health.record_success(20_000, Utc::now());
        assert_eq!(health.health_score, 70);
    }

    #[test]
    fn test_failure_uses_updated_success_rate() {
        let mut health = ProviderHealth::new("HOMESAFE");
        health.record_success(100, Utc::now());
        health.record_failure("timeout", Utc::now());
        // 1 of 2 => 0.5 * 70 = 35
        assert_eq!(health.health_score, 35);
        assert_eq!(health.error_count, 1);
        assert_eq!(health.last_error.as_deref(), Some("timeout"));

        let mut health = ProviderHealth::new("HOMESAFE");
        health.record_failure("down", Utc::now());
        assert_eq!(health.health_score, 0);
    }
}
