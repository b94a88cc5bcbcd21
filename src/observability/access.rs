//! Access log events.
//!
//! One event per request on the `access` target, emitted when the request
//! reaches a terminal state. Status 200 logs at INFO, anything else at WARN.

use std::time::Instant;

use crate::observability::metrics;

/// Everything an access event reports.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub status: u16,
    /// Client identifier (`ip:port`, trusted `X-Real-Ip`, or listener label).
    pub source: String,
    /// Rule text, or what served the request (`static`, `unregistered`).
    pub rule: String,
    pub method: String,
    pub started: Instant,
}

impl AccessRecord {
    pub fn new(status: u16, source: &str, rule: &str, method: &str, started: Instant) -> Self {
        Self {
            status,
            source: source.to_string(),
            rule: rule.to_string(),
            method: method.to_string(),
            started,
        }
    }

    /// Log the event and update request metrics.
    pub fn emit(&self, detail: Option<&str>) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let detail = detail.unwrap_or("");

        if self.status == 200 {
            tracing::info!(
                target: "access",
                status = self.status,
                source = %self.source,
                rule = %self.rule,
                method = %self.method,
                elapsed_ms,
                detail,
                "request completed"
            );
        } else {
            tracing::warn!(
                target: "access",
                status = self.status,
                source = %self.source,
                rule = %self.rule,
                method = %self.method,
                elapsed_ms,
                detail,
                "request completed"
            );
        }

        metrics::record_request(&self.method, self.status, &self.rule, self.started);
    }
}
