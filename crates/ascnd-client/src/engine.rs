//! Request execution engine.
//!
//! The engine owns the channel and runs every call through the same loop:
//! serialize once, then for each attempt set a fresh deadline, attach the
//! current credential, send, and either decode the response or classify the
//! failure and back off. One exclusive lock is held for the whole call, so a
//! client has at most one request in flight and the retries of a call are
//! never interleaved with another call's attempts.

use std::time::Duration;

use bytes::Bytes;
use prost::Message;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tonic::Code;
use tracing::{debug, error, info, warn};

use crate::channel::{Channel, Operation, TransportStatus};
use crate::config::{Credential, Settings};
use crate::error::{ApiError, ApiResult};
use crate::metrics::ClientMetrics;
use crate::retry::RetryDecision;

/// Executes typed requests against a [`Channel`] with bounded retry.
pub struct Engine {
    channel: Mutex<Box<dyn Channel>>,
    settings: Settings,
    credential: Credential,
    metrics: ClientMetrics,
}

impl Engine {
    /// Creates an engine over an already opened channel.
    pub fn new(settings: Settings, credential: Credential, channel: Box<dyn Channel>) -> Self {
        Self {
            channel: Mutex::new(channel),
            settings,
            credential,
            metrics: ClientMetrics::new(),
        }
    }

    /// The validated settings this engine runs with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The credential attached to outgoing calls.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Request counters.
    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// Runs `request` against `operation` and decodes the response.
    ///
    /// Transient failures are retried up to `max_retries` times with
    /// exponential backoff; terminal failures and decode errors return at once.
    pub async fn execute<Req, Resp>(&self, operation: Operation, request: &Req) -> ApiResult<Resp>
    where
        Req: Message,
        Resp: Message + Default,
    {
        self.metrics.inc_requests();
        let payload = Bytes::from(request.encode_to_vec());
        let request_timeout = self.settings.request_timeout;

        let mut channel = self.channel.lock().await;
        let mut attempt = 0u32;

        loop {
            let deadline = Instant::now() + request_timeout;
            let token = self.credential.token();
            self.metrics.inc_attempts();
            self.log_attempt(operation, attempt);

            let sent = tokio::time::timeout_at(
                deadline,
                channel.send(operation, payload.clone(), deadline, token.as_deref()),
            )
            .await;

            let status = match sent {
                Ok(Ok(body)) => return self.decode(operation, attempt, body),
                Ok(Err(status)) => status,
                Err(_) => {
                    self.metrics.inc_timeouts();
                    TransportStatus::new(
                        Code::DeadlineExceeded,
                        format!("deadline exceeded after {}ms", request_timeout.as_millis()),
                    )
                }
            };

            match self.settings.retry.decide(status.code, attempt) {
                RetryDecision::Backoff(delay) => {
                    warn!(
                        operation = %operation,
                        attempt,
                        code = ?status.code,
                        error = %status.message,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, backing off"
                    );
                    self.metrics.inc_retries();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Stop => {
                    error!(
                        operation = %operation,
                        attempts = attempt + 1,
                        code = ?status.code,
                        error = %status.message,
                        "request failed"
                    );
                    self.metrics.inc_failures();
                    return Err(ApiError::transport(status.code, status.message));
                }
            }
        }
    }

    fn decode<Resp>(&self, operation: Operation, attempt: u32, body: Bytes) -> ApiResult<Resp>
    where
        Resp: Message + Default,
    {
        match Resp::decode(body) {
            Ok(response) => {
                info!(operation = %operation, attempts = attempt + 1, "request succeeded");
                self.metrics.inc_successes();
                Ok(response)
            }
            Err(e) => {
                error!(operation = %operation, error = %e, "response decode failed");
                self.metrics.inc_decode_errors();
                Err(ApiError::Decode {
                    operation: operation.name(),
                    message: e.to_string(),
                })
            }
        }
    }

    fn log_attempt(&self, operation: Operation, attempt: u32) {
        if self.settings.verbose {
            info!(operation = %operation, attempt, "sending request");
        } else {
            debug!(operation = %operation, attempt, "sending request");
        }
    }

    /// Checks whether the service is reachable within the connection timeout.
    pub async fn ping(&self) -> bool {
        let timeout: Duration = self.settings.connection_timeout;
        let mut channel = self.channel.lock().await;
        let ready = channel.is_ready(Instant::now() + timeout).await;
        debug!(ready, "ping");
        ready
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("server_address", &self.settings.server_address)
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}
