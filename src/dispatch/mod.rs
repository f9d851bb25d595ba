pub mod gateway;
pub mod webhook;

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{Config, DestinationConfig};
use crate::error::{advised_retry_after, excerpt, DeliveryError, PayloadError};
use crate::extract::Signal;
use gateway::OrderGateway;
use webhook::TriggerWebhook;

/// A downstream sink: owns its endpoint, auth and wire shape. Payload
/// construction is pure; delivery mechanics live in [`Dispatcher`].
pub trait Destination: Send + Sync {
    fn name(&self) -> &str;

    fn endpoint(&self) -> &str;

    /// Map a signal into this destination's request body. Err means the
    /// destination cannot act on the signal; that is terminal for this
    /// destination only.
    fn build_payload(&self, signal: &Signal, now: DateTime<Utc>) -> Result<Value, PayloadError>;

    /// Extra request headers (auth etc.).
    fn headers(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Whether a response counts as accepted. Default: any 2xx. A destination
    /// may widen this to a recognized "accepted, pending trigger" status.
    fn is_accepted(&self, status: StatusCode, _body: &str) -> bool {
        status.is_success()
    }
}

/// Per (signal, destination) delivery result. Observable via logs only.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// Accepted by the destination; `attempts` > 1 means retried first.
    Delivered { attempts: u8 },
    /// Payload built but delivery suppressed by the dry-run flag.
    DryRun,
    /// The destination's builder refused the signal.
    Skipped { reason: String },
    /// Retry budget exhausted.
    Failed { attempts: u8, reason: String },
}

/// Delivers payloads with bounded retry and linear backoff. Rate limits honor
/// the server-advised delay and do not consume the attempt budget.
pub struct Dispatcher {
    client: Client,
    max_attempts: u8,
    backoff: Duration,
    timeout: Duration,
    dry_run: bool,
}

const RATE_LIMIT_FALLBACK_SECS: f64 = 2.0;

impl Dispatcher {
    pub fn new(dry_run: bool) -> Self {
        Self {
            client: Client::new(),
            max_attempts: 3,
            backoff: Duration::from_millis(1500),
            timeout: Duration::from_secs(20),
            dry_run,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_attempts(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, step: Duration) -> Self {
        self.backoff = step;
        self
    }

    /// Deliver one signal to one destination.
    pub async fn dispatch(
        &self,
        dest: &dyn Destination,
        signal: &Signal,
        now: DateTime<Utc>,
    ) -> DeliveryOutcome {
        let payload = match dest.build_payload(signal, now) {
            Ok(p) => p,
            Err(e) => {
                warn!(destination = dest.name(), reason = %e, "signal not deliverable here, skipping");
                return DeliveryOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        if self.dry_run {
            info!(
                destination = dest.name(),
                payload = %payload,
                "dry-run: payload built, delivery suppressed"
            );
            return DeliveryOutcome::DryRun;
        }

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.post_once(dest, &payload).await {
                Ok(()) => return DeliveryOutcome::Delivered { attempts: attempt },
                Err(DeliveryError::RateLimited { retry_after }) => {
                    warn!(
                        destination = dest.name(),
                        wait_secs = retry_after,
                        "destination rate limited, honoring advised delay"
                    );
                    attempt -= 1;
                    tokio::time::sleep(Duration::from_secs_f64(retry_after + 0.25)).await;
                }
                Err(e) if attempt < self.max_attempts && e.is_retryable() => {
                    let wait = self.backoff * u32::from(attempt);
                    warn!(
                        destination = dest.name(),
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    return DeliveryOutcome::Failed {
                        attempts: attempt,
                        reason: e.to_string(),
                    }
                }
            }
        }
    }

    async fn post_once(&self, dest: &dyn Destination, payload: &Value) -> Result<(), DeliveryError> {
        let mut req = self
            .client
            .post(dest.endpoint())
            .timeout(self.timeout)
            .json(payload);
        for (key, value) in dest.headers() {
            req = req.header(key, value);
        }

        let rsp = req.send().await?;
        let status = rsp.status();

        if status.as_u16() == 429 {
            let body = rsp.text().await.unwrap_or_default();
            return Err(DeliveryError::RateLimited {
                retry_after: advised_retry_after(&body, RATE_LIMIT_FALLBACK_SECS),
            });
        }

        let body = rsp.text().await.unwrap_or_default();
        if dest.is_accepted(status, &body) {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: excerpt(&body),
            })
        }
    }

    /// Deliver to every destination sequentially and independently; one
    /// destination's failure never blocks the next.
    pub async fn dispatch_all(
        &self,
        destinations: &[Box<dyn Destination>],
        signal: &Signal,
        now: DateTime<Utc>,
    ) -> Vec<(String, DeliveryOutcome)> {
        let mut outcomes = Vec::with_capacity(destinations.len());
        for dest in destinations {
            let outcome = self.dispatch(dest.as_ref(), signal, now).await;
            match &outcome {
                DeliveryOutcome::Delivered { attempts } => {
                    info!(destination = dest.name(), attempts, "delivered")
                }
                DeliveryOutcome::Failed { attempts, reason } => {
                    error!(destination = dest.name(), attempts, reason = %reason, "delivery failed")
                }
                DeliveryOutcome::DryRun | DeliveryOutcome::Skipped { .. } => {}
            }
            outcomes.push((dest.name().to_string(), outcome));
        }
        outcomes
    }
}

/// Instantiate the configured destinations.
pub fn build_destinations(cfg: &Config) -> Vec<Box<dyn Destination>> {
    cfg.destinations
        .iter()
        .map(|d| -> Box<dyn Destination> {
            match d.clone() {
                DestinationConfig::TriggerWebhook {
                    name,
                    url,
                    secret,
                    bot_uuid,
                    max_lag,
                    exchange,
                    instrument_suffix,
                } => Box::new(TriggerWebhook::new(
                    name,
                    url,
                    secret,
                    bot_uuid,
                    max_lag,
                    exchange,
                    instrument_suffix,
                    &cfg.trade,
                )),
                DestinationConfig::OrderGateway {
                    name,
                    url,
                    api_key,
                    category,
                    leverage,
                    risk_per_trade,
                } => Box::new(OrderGateway::new(
                    name,
                    url,
                    api_key,
                    category,
                    leverage,
                    risk_per_trade,
                    &cfg.trade,
                )),
            }
        })
        .collect()
}
