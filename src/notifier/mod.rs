//! Notification delivery with bounded retries.
mod message;
mod webhook;

use crate::matcher::MatchEvent;
use crate::stats::Counters;
use crate::ListenerError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub use message::format_event;
pub use webhook::{webhook_url_from_env, WebhookSink, WEBHOOK_ENV};

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound channel that alerts are delivered to.
///
/// One call is one delivery attempt; any error counts as a failed attempt.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str, timeout: Duration) -> Result<(), ListenerError>;
}

/// Retry settings for a single notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed wait between two attempts.
    pub delay: Duration,
    /// Upper bound of a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts } | DeliveryOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }
}

/// Formats match events and delivers them through a [NotificationSink].
///
/// Delivery is sequential: the caller waits for the whole retry sequence, so
/// a slow endpoint slows down stream consumption instead of queueing alerts.
pub struct Dispatcher<S> {
    sink: S,
    policy: RetryPolicy,
    counters: Arc<Counters>,
}

impl<S: NotificationSink> Dispatcher<S> {
    pub fn new(sink: S, policy: RetryPolicy, counters: Arc<Counters>) -> Self {
        Self {
            sink,
            policy,
            counters,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver one event. Never fails: after the last attempt the
    /// notification is logged and dropped.
    pub async fn deliver(&self, event: &MatchEvent) -> DeliveryOutcome {
        let text = format_event(event);
        self.deliver_text(text.as_str()).await
    }

    pub async fn deliver_text(&self, text: &str) -> DeliveryOutcome {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            let res = match tokio::time::timeout(
                self.policy.timeout,
                self.sink.send(text, self.policy.timeout),
            )
            .await
            {
                Ok(res) => res,
                Err(_) => Err(ListenerError::DeliveryError(format!(
                    "attempt timed out after {}",
                    humantime::format_duration(self.policy.timeout)
                ))),
            };

            match res {
                Ok(()) => {
                    let total = self.counters.record_notification_sent();
                    info!(
                        "notification sent successfully (attempt {}/{}, total sent: {})",
                        attempt, max_attempts, total
                    );
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(e) => {
                    warn!(
                        "failed to send notification (attempt {}/{}): {}",
                        attempt, max_attempts, e
                    );
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        error!(
            "failed to send notification after {} attempts, dropping it",
            max_attempts
        );
        DeliveryOutcome::Exhausted {
            attempts: max_attempts,
        }
    }
}
