//! Exponential backoff around any [`Notifier`]

use backon::{ExponentialBuilder, Retryable};
use std::time::Duration;
use tracing::warn;

use super::{Delivery, Notifier, NotifyError};
use crate::config::RetryConfig;
use crate::models::AlertMessage;

pub struct RetryingNotifier<N> {
    inner: N,
    backoff: ExponentialBuilder,
}

impl<N: Notifier> RetryingNotifier<N> {
    pub fn new(inner: N, backoff: ExponentialBuilder) -> Self {
        Self { inner, backoff }
    }

    /// `max_attempts` extra attempts after the first, starting at `min_delay_ms`
    pub fn from_config(inner: N, config: &RetryConfig) -> Self {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.min_delay_ms))
            .with_max_delay(Duration::from_secs(30))
            .with_max_times(config.max_attempts)
            .with_jitter();
        Self::new(inner, backoff)
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<N: Notifier> Notifier for RetryingNotifier<N> {
    async fn notify(&self, alert: &AlertMessage) -> Result<Delivery, NotifyError> {
        (|| self.inner.notify(alert))
            .retry(self.backoff.clone())
            .when(NotifyError::is_transient)
            .notify(|err: &NotifyError, delay: Duration| {
                warn!(
                    symbol = %alert.instrument,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Notification failed, retrying"
                );
            })
            .await
    }
}
