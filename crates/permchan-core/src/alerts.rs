//! Operator-visible alerts.
//!
//! Flush failures are raised as [`OperatorAlert`]s through an
//! [`AlertSink`] in addition to being logged, so an operator watching the
//! server notices that the snapshot on disk has gone stale.

use chrono::{DateTime, Utc};

/// Maximum alerts kept by an [`AlertLog`].
const MAX_ALERTS: usize = 500;

/// Severity level of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertSeverity {
    /// A notable event that needs no action.
    Info,
    /// Something is off but persistence still works.
    Warning,
    /// The snapshot could not be written.
    Critical,
}

/// A single alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorAlert {
    /// Severity of the alert.
    pub severity: AlertSeverity,
    /// Human-readable message.
    pub message: String,
    /// When the alert was raised.
    pub raised_at: DateTime<Utc>,
}

impl OperatorAlert {
    /// Create an alert stamped with the current time.
    pub fn now(severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }
}

/// Destination for operator alerts.
pub trait AlertSink {
    /// Deliver an alert.
    fn raise(&mut self, alert: OperatorAlert);
}

/// Bounded in-memory alert store, newest first.
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    /// Stored alerts, newest first.
    alerts: Vec<OperatorAlert>,
}

impl AlertLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self { alerts: Vec::new() }
    }

    /// Return all stored alerts, newest first.
    pub fn all(&self) -> &[OperatorAlert] {
        &self.alerts
    }

    /// Return the number of stored alerts.
    pub const fn len(&self) -> usize {
        self.alerts.len()
    }

    /// Return whether no alerts are stored.
    pub const fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Return alerts at or above the given severity.
    pub fn at_least(&self, severity: AlertSeverity) -> Vec<&OperatorAlert> {
        self.alerts.iter().filter(|a| a.severity >= severity).collect()
    }
}

impl AlertSink for AlertLog {
    fn raise(&mut self, alert: OperatorAlert) {
        self.alerts.insert(0, alert);
        self.alerts.truncate(MAX_ALERTS);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn newest_alert_comes_first() {
        let mut log = AlertLog::new();
        log.raise(OperatorAlert::now(AlertSeverity::Info, "first"));
        log.raise(OperatorAlert::now(AlertSeverity::Critical, "second"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.all().first().unwrap().message, "second");
    }

    #[test]
    fn log_is_bounded() {
        let mut log = AlertLog::new();
        for i in 0..(MAX_ALERTS + 10) {
            log.raise(OperatorAlert::now(AlertSeverity::Warning, format!("alert {i}")));
        }
        assert_eq!(log.len(), MAX_ALERTS);
        assert_eq!(
            log.all().first().unwrap().message,
            format!("alert {}", MAX_ALERTS + 9)
        );
    }

    #[test]
    fn filter_by_severity() {
        let mut log = AlertLog::new();
        log.raise(OperatorAlert::now(AlertSeverity::Info, "a"));
        log.raise(OperatorAlert::now(AlertSeverity::Warning, "b"));
        log.raise(OperatorAlert::now(AlertSeverity::Critical, "c"));
        let serious: Vec<&str> = log
            .at_least(AlertSeverity::Warning)
            .iter()
            .map(|a| a.message.as_str())
            .collect();
        assert_eq!(serious, vec!["c", "b"]);
    }
}
