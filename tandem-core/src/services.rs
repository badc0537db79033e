//! Request/response clients with availability polling

use crate::bus::Bus;
use crate::error::{Result, TandemError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Log level used while polling for a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitNotice {
    Info,
    Warn,
}

/// How long and how often to poll for a service
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    /// `None` polls until cancelled
    pub limit: Option<Duration>,
    pub notice: WaitNotice,
}

impl WaitPolicy {
    pub fn unbounded(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            limit: None,
            notice: WaitNotice::Info,
        }
    }

    pub fn bounded(poll_interval: Duration, limit: Duration) -> Self {
        Self {
            poll_interval,
            limit: Some(limit),
            notice: WaitNotice::Warn,
        }
    }

    pub fn with_limit(mut self, limit: Option<Duration>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_notice(mut self, notice: WaitNotice) -> Self {
        self.notice = notice;
        self
    }
}

/// Poll until `service` is offered on `bus`.
///
/// Logs once per unsuccessful poll. Fails with
/// [`TandemError::ServiceUnavailable`] once the policy's limit is exceeded and
/// with [`TandemError::Cancelled`] if `cancel` fires first.
pub async fn wait_for_service<B>(
    bus: &B,
    service: &str,
    policy: WaitPolicy,
    cancel: &CancellationToken,
) -> Result<()>
where
    B: Bus + ?Sized,
{
    let started = Instant::now();
    loop {
        if cancel.is_cancelled() {
            return Err(TandemError::Cancelled);
        }
        if bus.service_ready(service).await {
            return Ok(());
        }

        let waited = started.elapsed();
        if let Some(limit) = policy.limit {
            if waited >= limit {
                return Err(TandemError::ServiceUnavailable {
                    service: service.to_string(),
                    waited,
                });
            }
        }

        match policy.notice {
            WaitNotice::Info => tracing::info!("Waiting for {} service...", service),
            WaitNotice::Warn => tracing::warn!("Waiting for service {}...", service),
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(TandemError::Cancelled),
            _ = tokio::time::sleep(policy.poll_interval) => {}
        }
    }
}

/// Typed client for one service
#[derive(Debug)]
pub struct ServiceClient<B> {
    bus: Arc<B>,
    service: String,
    policy: WaitPolicy,
}

impl<B> Clone for ServiceClient<B> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            service: self.service.clone(),
            policy: self.policy,
        }
    }
}

impl<B: Bus> ServiceClient<B> {
    pub fn new(bus: Arc<B>, service: impl Into<String>, policy: WaitPolicy) -> Self {
        Self {
            bus,
            service: service.into(),
            policy,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Wait for the service under this client's policy
    pub async fn wait_for_service(&self, cancel: &CancellationToken) -> Result<()> {
        wait_for_service(self.bus.as_ref(), &self.service, self.policy, cancel).await
    }

    /// Send a request to an already-available service
    pub async fn call<Req, Resp>(&self, request: Req) -> Result<Resp>
    where
        Req: Serialize + Send + Sync + 'static,
        Resp: DeserializeOwned + Send + 'static,
    {
        self.bus.call(&self.service, request).await
    }

    /// Wait for the service, then send one request
    pub async fn wait_and_call<Req, Resp>(
        &self,
        request: Req,
        cancel: &CancellationToken,
    ) -> Result<Resp>
    where
        Req: Serialize + Send + Sync + 'static,
        Resp: DeserializeOwned + Send + 'static,
    {
        self.wait_for_service(cancel).await?;
        self.call(request).await
    }
}
