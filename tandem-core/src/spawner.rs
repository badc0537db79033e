//! One-shot creation of the companion agent

use crate::bus::Bus;
use crate::config::TandemConfig;
use crate::error::Result;
use crate::messages::{SpawnRequest, SpawnResponse};
use crate::services::{ServiceClient, WaitPolicy};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// In-flight spawn request
pub type SpawnFuture = BoxFuture<'static, Result<SpawnResponse>>;

/// Creates the second agent at startup
#[derive(Debug)]
pub struct Spawner<B> {
    client: ServiceClient<B>,
    request: SpawnRequest,
}

impl<B: Bus + 'static> Spawner<B> {
    pub fn new(client: ServiceClient<B>, request: SpawnRequest) -> Self {
        Self { client, request }
    }

    pub fn from_config(bus: Arc<B>, config: &TandemConfig) -> Self {
        let policy = WaitPolicy::unbounded(config.services.poll_interval)
            .with_limit(config.services.spawn_wait_limit);
        let spawn = &config.spawn;
        Self::new(
            ServiceClient::new(bus, spawn.service.clone(), policy),
            SpawnRequest {
                x: spawn.x,
                y: spawn.y,
                theta: spawn.theta,
                name: spawn.name.clone(),
            },
        )
    }

    /// Wait for the spawn service, then issue the request without awaiting
    /// its response.
    ///
    /// The returned future resolves to the simulator's answer; hand it to
    /// the controller so the completion is handled on its event loop.
    pub async fn issue(&self, cancel: &CancellationToken) -> Result<SpawnFuture> {
        self.client.wait_for_service(cancel).await?;

        tracing::debug!(
            service = self.client.service(),
            x = self.request.x,
            y = self.request.y,
            theta = self.request.theta,
            "issuing spawn request"
        );

        let client = self.client.clone();
        let request = self.request.clone();
        Ok(Box::pin(async move { client.call(request).await }))
    }
}

/// Log the outcome of a spawn request; failures are not fatal
pub fn report_spawn(outcome: &Result<SpawnResponse>) {
    match outcome {
        Ok(response) => tracing::info!("Spawned new turtle: {}", response.name),
        Err(e) => tracing::error!("Failed to spawn turtle: {}", e),
    }
}
