//! Health payload served by the analysis backend.

/// Point-in-time status of the analysis backend.
///
/// Returned by `GET {api}/health`. Counters the backend omits default to zero.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HealthData {
    /// Backend status string (e.g. "ok").
    pub status: String,
    /// Pipeline phase the backend is running.
    pub phase: u32,
    pub active_situations: u64,
    pub dormant_situations: u64,
    pub bursting_situations: u64,
    pub quiet_situations: u64,
    pub max_event_rate: f64,
    pub escalating_situations: u64,
    pub stable_situations: u64,
    pub deescalating_situations: u64,
    /// Mean confidence across situations, in `[0, 1]`.
    pub average_confidence: f64,
    /// Highest confidence across situations, in `[0, 1]`.
    pub max_confidence: f64,
}

impl HealthData {
    /// Total number of situations the backend is tracking.
    pub fn total_situations(&self) -> u64 {
        self.active_situations + self.dormant_situations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_counts_active_and_dormant() {
        let health = HealthData {
            active_situations: 4,
            dormant_situations: 3,
            ..Default::default()
        };
        assert_eq!(health.total_situations(), 7);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_payload_defaults_missing_counters() {
        let health: HealthData =
            serde_json::from_str(r#"{"status": "ok", "active_situations": 2, "max_confidence": 0.9}"#)
                .unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.active_situations, 2);
        assert_eq!(health.dormant_situations, 0);
        assert_eq!(health.max_confidence, 0.9);
    }
}
