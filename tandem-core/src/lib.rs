//! # Tandem - two turtles, one arena, no collisions
//!
//! Tandem drives two agents in a turtle-graphics simulator:
//! - random cruising, reversing apart when they get too close
//! - bouncing off the arena walls
//! - recoloring both trails by which side of the midline each agent is on
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tandem_core::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let config = TandemConfig::load()?;
//!     let bus = LocalBus::new("sim");
//!     let shutdown = CancellationToken::new();
//!
//!     // A stand-in simulator on the same bus
//!     let _arena = LocalArena::start(
//!         Arc::new(bus.named("turtlesim")),
//!         config.arena.clone(),
//!         &config.agents.primary,
//!         shutdown.clone(),
//!     )
//!     .await?;
//!
//!     let stats = run_node(Arc::new(bus.named(&config.node_name)), &config, shutdown).await?;
//!     println!("{} ticks", stats.ticks);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Bus**: pub/sub topics and request/response services ([`bus`])
//! - **Steering**: the pure per-tick decision ([`steering`])
//! - **Spawner**: creates the second agent once at startup ([`spawner`])
//! - **Controller**: single-owner event loop around the steering ([`controller`])
//! - **Arena**: kinematic stand-in for the simulator ([`arena`])

pub mod arena;
pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod messages;
pub mod node;
pub mod services;
pub mod spawner;
pub mod steering;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::arena::{LocalArena, PoseReport};
    pub use crate::bus::{
        Bus, BusError, BusMessage, HandlerFuture, LocalBus, ServiceHandle,
        SubscriptionHandle,
    };
    pub use crate::config::{
        AgentsConfig, ArenaConfig, BusConfig, ControlConfig, PenConfig, ServiceConfig,
        SpawnConfig, TandemConfig,
    };
    pub use crate::controller::{Controller, ControllerStats};
    pub use crate::error::{Result, TandemError};
    pub use crate::messages::{
        PenStyle, Pose, Rgb, SetPenResponse, SpawnRequest, SpawnResponse, VelocityCommand,
    };
    pub use crate::node::run_node;
    pub use crate::services::{ServiceClient, WaitNotice, WaitPolicy, wait_for_service};
    pub use crate::spawner::{SpawnFuture, Spawner, report_spawn};
    pub use crate::steering::{Agent, Steering, TickPlan};
}
