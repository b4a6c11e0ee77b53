pub mod client;

pub use client::{NotifyError, Severity, SlackClient};

use crate::http_probe::prelude::*;

/// A message ready to be posted with [`SlackClient::post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub prefix: String,
    pub message: String,
    pub severity: Severity,
}

/// Reports the time to first byte of a successful probe.
pub fn success_notification(date: &str, result: &ProbeResult) -> Notification {
    Notification {
        prefix: String::new(),
        message: format!(
            "Date: {date}\nLatency: {:?}",
            result.phases.time_to_first_byte
        ),
        severity: Severity::Good,
    }
}

/// Alerts about a failed probe, including the causes of the error on one line.
pub fn failure_notification(date: &str, alert_prefix: &str, error: &ProbeError) -> Notification {
    let cause = report_with(error, ": ");

    Notification {
        prefix: alert_prefix.to_string(),
        message: format!("Date: {date}\nError: {cause}"),
        severity: Severity::Danger,
    }
}
