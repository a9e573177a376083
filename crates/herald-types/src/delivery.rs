use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Why a single delivery attempt failed. Never fatal to a broadcast job.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DeliveryFailure {
    #[error("recipient blocked the bot")]
    Blocked,

    #[error("recipient account is deactivated")]
    Deactivated,

    #[error("rate limited by platform (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("transport error: {message}")]
    Transport { message: String },
}

impl DeliveryFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// Failed deliveries of one job, broken down by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureTally {
    pub blocked: u64,
    pub deactivated: u64,
    pub rate_limited: u64,
    pub transport: u64,
}

impl FailureTally {
    pub fn record(&mut self, failure: &DeliveryFailure) {
        match failure {
            DeliveryFailure::Blocked => self.blocked += 1,
            DeliveryFailure::Deactivated => self.deactivated += 1,
            DeliveryFailure::RateLimited { .. } => self.rate_limited += 1,
            DeliveryFailure::Transport { .. } => self.transport += 1,
        }
    }
}

/// Lifecycle of a broadcast job.
///
/// `Pending -> Running -> Completed` on the normal path,
/// `Pending -> Aborted` when the recipient snapshot cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Aborted,
}

/// Aggregate outcome of a completed job, delivered to the confirming operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReport {
    pub job_id: Uuid,
    pub sent: u64,
    pub failed: u64,
    pub total: u64,
    pub failures: FailureTally,
}

impl BroadcastReport {
    pub fn render(&self) -> String {
        let mut text = format!(
            "Broadcast completed!\n\nSent: {}\nFailed/Blocked: {}\nTotal: {}",
            self.sent, self.failed, self.total
        );
        if self.failed > 0 {
            text.push_str(&format!(
                "\n\nBlocked: {}\nDeactivated: {}\nRate limited: {}\nTransport errors: {}",
                self.failures.blocked,
                self.failures.deactivated,
                self.failures.rate_limited,
                self.failures.transport
            ));
        }
        text
    }
}
