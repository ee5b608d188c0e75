//! Alert delivery.
//!
//! [`Notifier`] performs at most one delivery attempt per call. Retrying is
//! layered on by wrapping a notifier in [`RetryingNotifier`], which exposes
//! the same trait.

pub mod discord;
pub mod retry;

pub use discord::DiscordNotifier;
pub use retry::RetryingNotifier;

use crate::models::AlertMessage;
use thiserror::Error;

/// What happened to an alert that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No notification target is configured
    Skipped,
}

/// A failed delivery attempt.
///
/// Both variants mean the alert was not delivered. Transport faults keep the
/// underlying client error in `DeliveryFailed`; a non-2xx answer is reported
/// as `Rejected` with its status and body so [`NotifyError::is_transient`] can
/// tell throttling and server errors apart from permanent rejections.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    DeliveryFailed(#[from] reqwest::Error),
    #[error("delivery failed, sink rejected alert with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl NotifyError {
    /// Transport faults, throttling and server errors may succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            NotifyError::DeliveryFailed(_) => true,
            NotifyError::Rejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &AlertMessage) -> Result<Delivery, NotifyError>;
}
