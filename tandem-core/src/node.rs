//! Wiring of the spawner and controller into one node

use crate::bus::Bus;
use crate::config::TandemConfig;
use crate::controller::{Controller, ControllerStats};
use crate::error::Result;
use crate::spawner::{Spawner, report_spawn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run the collision-avoidance node until `shutdown` fires.
///
/// Subscribes to both pose topics, waits for the spawn service and issues
/// the spawn request, then hands control to the controller's event loop.
/// A failed or cancelled spawn is logged and the loop runs anyway. An
/// invalid configuration is rejected before anything is subscribed.
pub async fn run_node<B>(
    bus: Arc<B>,
    config: &TandemConfig,
    shutdown: CancellationToken,
) -> Result<ControllerStats>
where
    B: Bus + 'static,
{
    config.validate()?;

    let mut controller = Controller::new(bus.clone(), config);
    controller.attach().await?;

    let spawner = Spawner::from_config(bus, config);
    match spawner.issue(&shutdown).await {
        Ok(pending) => controller.track_spawn(pending),
        Err(e) if e.is_cancelled() => {
            tracing::info!("shutdown requested before spawn service appeared");
        }
        Err(e) => report_spawn(&Err(e)),
    }

    controller.run(shutdown).await
}
