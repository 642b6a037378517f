//! Metrics sink boundary
//!
//! The coordinator pings a sink on every outcome; the Prometheus registry
//! itself lives in the excluded observability layer. The metric names and
//! label sets match the legacy dashboards.

use std::sync::Mutex;

/// Metric names emitted by the ceremonies
pub mod names {
    pub const AUTH_ATTEMPTS: &str = "biometric_auth_attempts_total";
    pub const AUTH_DURATION: &str = "biometric_auth_duration_seconds";
    pub const WEBAUTHN_REGISTRATIONS: &str = "webauthn_registration_total";
    pub const WEBAUTHN_AUTHENTICATIONS: &str = "webauthn_authentication_total";
    pub const FINGERPRINT_RECOGNITIONS: &str = "fingerprint_recognition_total";
    pub const FACE_RECOGNITIONS: &str = "face_recognition_total";
    pub const QR_GENERATIONS: &str = "qr_code_generation_total";
    pub const QR_VALIDATIONS: &str = "qr_code_validation_total";
}

/// Outcome label for ceremony counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

/// Sink for ceremony counters and histograms
pub trait MetricsSink: Send + Sync {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]);
    fn observe_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn increment_counter(&self, _name: &str, _labels: &[(&str, &str)]) {}
    fn observe_histogram(&self, _name: &str, _labels: &[(&str, &str)], _value: f64) {}
}

/// A recorded metric event, write-only and identity-free beyond its labels
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    pub name: String,
    pub labels: Vec<(String, String)>,
    /// 1.0 for counter increments, observed value for histograms
    pub value: f64,
}

/// Sink that records every event, for assertions in tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().expect("metrics lock poisoned").clone()
    }

    /// Sum of counter increments matching `name` and all given labels
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.events()
            .iter()
            .filter(|event| {
                event.name == name
                    && labels.iter().all(|(k, v)| {
                        event
                            .labels
                            .iter()
                            .any(|(ek, ev)| ek == k && ev == v)
                    })
            })
            .count() as u64
    }

    fn record(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.events
            .lock()
            .expect("metrics lock poisoned")
            .push(MetricEvent {
                name: name.to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                value,
            });
    }
}

impl MetricsSink for RecordingSink {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.record(name, labels, 1.0);
    }

    fn observe_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.record(name, labels, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_counts_by_labels() {
        let sink = RecordingSink::new();
        sink.increment_counter(names::AUTH_ATTEMPTS, &[("method", "qr"), ("result", "success")]);
        sink.increment_counter(names::AUTH_ATTEMPTS, &[("method", "qr"), ("result", "failed")]);
        sink.increment_counter(names::AUTH_ATTEMPTS, &[("method", "qr"), ("result", "success")]);

        assert_eq!(
            sink.counter_value(names::AUTH_ATTEMPTS, &[("method", "qr"), ("result", "success")]),
            2
        );
        assert_eq!(
            sink.counter_value(names::AUTH_ATTEMPTS, &[("result", "failed")]),
            1
        );
    }

    #[test]
    fn test_histogram_records_value() {
        let sink = RecordingSink::new();
        sink.observe_histogram(names::AUTH_DURATION, &[("method", "face")], 0.25);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].value, 0.25);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::Failed.as_str(), "failed");
        assert_eq!(Outcome::Error.as_str(), "error");
    }
}
