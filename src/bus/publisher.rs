//! Publish-with-retry around the message bus.
//!
//! The publisher wraps a [`MessageBus`] in a classified retry loop: transient
//! broker errors are retried with exponential backoff up to a small fixed
//! attempt bound, permanent errors are returned immediately. Every retry is
//! logged with the message topic and attempt count so broker outages are
//! diagnosable from the logs — this is an operational requirement, not a
//! silent loop.
//!
//! The publisher holds no locks of its own: concurrent publishes for
//! different requests proceed independently, sharing only whatever
//! concurrency the bus client natively provides.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::types::{CanonicalMessage, MessageId};

use super::error::{BusErrorKind, PublishError};
use super::retry::{RetryConfig, Sleep, TokioSleep};
use super::MessageBus;

/// Delivers canonical messages to the bus with bounded retry.
#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn MessageBus>,
    config: RetryConfig,
    sleep: Arc<dyn Sleep>,
}

impl Publisher {
    /// Creates a publisher with the tokio timer for backoff sleeps.
    pub fn new(bus: Arc<dyn MessageBus>, config: RetryConfig) -> Self {
        Self::with_sleep(bus, config, Arc::new(TokioSleep))
    }

    /// Creates a publisher with an injected sleep implementation.
    pub fn with_sleep(bus: Arc<dyn MessageBus>, config: RetryConfig, sleep: Arc<dyn Sleep>) -> Self {
        Publisher { bus, config, sleep }
    }

    /// Publishes a message, retrying transient failures.
    ///
    /// Returns the broker-assigned message identifier on success. On
    /// failure, returns [`PublishError::Rejected`] for a permanent error
    /// (no retry) or [`PublishError::Exhausted`] once the attempt bound is
    /// reached.
    pub async fn publish(&self, message: &CanonicalMessage) -> Result<MessageId, PublishError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.bus.publish(message).await {
                Ok(message_id) => {
                    if attempt > 1 {
                        debug!(
                            topic = %message.topic,
                            attempt,
                            "publish succeeded after retry"
                        );
                    }
                    return Ok(message_id);
                }
                Err(e) if e.kind == BusErrorKind::Permanent => {
                    error!(
                        topic = %message.topic,
                        error = %e,
                        "publish rejected; not retrying"
                    );
                    return Err(PublishError::Rejected(e));
                }
                Err(e) => {
                    if attempt >= self.config.max_attempts {
                        error!(
                            topic = %message.topic,
                            attempts = attempt,
                            error = %e,
                            "publishing message failed; giving up"
                        );
                        return Err(PublishError::Exhausted {
                            last_error: e,
                            attempts: attempt,
                        });
                    }

                    warn!(
                        topic = %message.topic,
                        attempt,
                        error = %e,
                        "publishing message failed; retrying"
                    );
                    let delay = self.config.delay_after_attempt(attempt);
                    self.sleep.sleep(delay).await;
                }
            }
        }
    }
}
