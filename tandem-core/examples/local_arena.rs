//! Example: the controller driving two turtles in the local arena
//!
//! Starts the in-process arena, runs the node for ten ticks with a fixed
//! seed, then prints where both turtles ended up and the pen they carry.

use std::sync::Arc;
use tandem_core::prelude::*;
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tandem_core=info")),
        )
        .init();

    let mut config = TandemConfig {
        seed: Some(42),
        ..TandemConfig::default()
    };
    config.control.max_ticks = Some(10);

    let bus = LocalBus::new("example");
    let shutdown = CancellationToken::new();
    let arena = LocalArena::start(
        Arc::new(bus.named("turtlesim")),
        config.arena.clone(),
        &config.agents.primary,
        shutdown.clone(),
    )
    .await?;

    let stats = run_node(Arc::new(bus.named(&config.node_name)), &config, shutdown.clone()).await?;

    println!("ticks: {} ({} skipped)", stats.ticks, stats.skipped_ticks);
    println!("spawned: {}", stats.spawned.as_deref().unwrap_or("-"));
    for name in arena.agents().await {
        if let (Some(pose), Some(pen)) = (arena.pose_of(&name).await, arena.pen_of(&name).await) {
            println!(
                "{name}: x={:.2} y={:.2} theta={:.2} pen=({}, {}, {})",
                pose.x, pose.y, pose.theta, pen.r, pen.g, pen.b
            );
        }
    }

    shutdown.cancel();
    Ok(())
}
