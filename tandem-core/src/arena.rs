//! Kinematic stand-in for the turtle simulator
//!
//! Offers the same topics and services the controller expects (pose,
//! cmd_vel, spawn, set_pen) so the node can run without the real simulator.
//! It integrates unicycle kinematics and clamps positions to the arena;
//! there is no drawing, and pen state is only recorded.

use crate::bus::{Bus, HandlerFuture, SubscriptionHandle};
use crate::config::ArenaConfig;
use crate::error::{Result, TandemError};
use crate::messages::{
    PenStyle, Pose, Rgb, SetPenResponse, SpawnRequest, SpawnResponse, VelocityCommand,
    cmd_vel_topic, pose_topic, set_pen_service,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Pose report as published by the simulator, velocities included
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseReport {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub linear_velocity: f64,
    pub angular_velocity: f64,
}

#[derive(Debug)]
struct Body {
    pose: Pose,
    command: VelocityCommand,
    commanded_at: Option<Instant>,
    pen: PenStyle,
    subscription: SubscriptionHandle,
}

struct ArenaInner<B> {
    bus: Arc<B>,
    config: ArenaConfig,
    bodies: Mutex<BTreeMap<String, Body>>,
}

/// Running arena; stops when its cancellation token fires
pub struct LocalArena<B: Bus> {
    inner: Arc<ArenaInner<B>>,
    cancel: CancellationToken,
}

impl<B: Bus + 'static> LocalArena<B> {
    /// Start the arena with one agent named `first` at the center
    pub async fn start(
        bus: Arc<B>,
        config: ArenaConfig,
        first: &str,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let inner = Arc::new(ArenaInner {
            bus,
            config,
            bodies: Mutex::new(BTreeMap::new()),
        });

        let center = inner.config.size / 2.0;
        ArenaInner::add_body(&inner, first, Pose::new(center, center, 0.0)).await?;
        ArenaInner::advertise_spawn(&inner, "/spawn").await?;

        let stepper = inner.clone();
        let stop = cancel.clone();
        tokio::spawn(async move { stepper.step_loop(stop).await });

        tracing::info!(first, size = inner.config.size, "arena started");
        Ok(Self { inner, cancel })
    }

    /// Names of all agents, sorted
    pub async fn agents(&self) -> Vec<String> {
        self.inner.bodies.lock().await.keys().cloned().collect()
    }

    pub async fn pose_of(&self, name: &str) -> Option<Pose> {
        self.inner.bodies.lock().await.get(name).map(|body| body.pose)
    }

    pub async fn pen_of(&self, name: &str) -> Option<PenStyle> {
        self.inner.bodies.lock().await.get(name).map(|body| body.pen)
    }

    /// Move an agent without integrating (teleport)
    pub async fn place(&self, name: &str, pose: Pose) -> Result<()> {
        let mut bodies = self.inner.bodies.lock().await;
        let body = bodies
            .get_mut(name)
            .ok_or_else(|| TandemError::from(format!("no agent named {}", name)))?;
        body.pose = pose;
        Ok(())
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl<B: Bus + 'static> ArenaInner<B> {
    async fn add_body(this: &Arc<Self>, name: &str, pose: Pose) -> Result<()> {
        let weak = Arc::downgrade(this);
        let body_name = name.to_string();
        let subscription = this
            .bus
            .subscribe(&cmd_vel_topic(name), move |command: VelocityCommand| {
                let arena = weak.clone();
                let name = body_name.clone();
                Box::pin(async move {
                    let arena = upgrade(&arena)?;
                    if let Some(body) = arena.bodies.lock().await.get_mut(&name) {
                        body.command = command;
                        body.commanded_at = Some(Instant::now());
                    }
                    Ok::<(), TandemError>(())
                }) as HandlerFuture<()>
            })
            .await?;

        let weak = Arc::downgrade(this);
        let body_name = name.to_string();
        let pen_service = this
            .bus
            .advertise(&set_pen_service(name), move |pen: PenStyle| {
                let arena = weak.clone();
                let name = body_name.clone();
                Box::pin(async move {
                    let arena = upgrade(&arena)?;
                    let mut bodies = arena.bodies.lock().await;
                    let body = bodies
                        .get_mut(&name)
                        .ok_or_else(|| TandemError::from(format!("no agent named {}", name)))?;
                    body.pen = pen;
                    Ok::<_, TandemError>(SetPenResponse {})
                }) as HandlerFuture<SetPenResponse>
            })
            .await?;

        this.bodies.lock().await.insert(
            name.to_string(),
            Body {
                pose,
                command: VelocityCommand::default(),
                commanded_at: None,
                pen: PenStyle::enabled(Rgb::new(179, 184, 255), 3),
                subscription,
            },
        );
        tracing::debug!(name, x = pose.x, y = pose.y, pen = pen_service.service(), "agent added");
        Ok(())
    }

    async fn advertise_spawn(this: &Arc<Self>, service: &str) -> Result<()> {
        let weak = Arc::downgrade(this);
        this.bus
            .advertise(service, move |request: SpawnRequest| {
                let arena = weak.clone();
                Box::pin(async move {
                    let arena = upgrade(&arena)?;
                    let name = {
                        let bodies = arena.bodies.lock().await;
                        if request.name.is_empty() {
                            (1..)
                                .map(|n| format!("turtle{}", n))
                                .find(|candidate| !bodies.contains_key(candidate))
                                .unwrap_or_default()
                        } else if bodies.contains_key(&request.name) {
                            return Err(TandemError::from(format!(
                                "A turtle named [{}] already exists",
                                request.name
                            )));
                        } else {
                            request.name.clone()
                        }
                    };

                    let pose = Pose::new(request.x, request.y, request.theta);
                    ArenaInner::add_body(&arena, &name, pose).await?;
                    Ok::<_, TandemError>(SpawnResponse { name })
                }) as HandlerFuture<SpawnResponse>
            })
            .await?;
        Ok(())
    }

    async fn step_loop(&self, cancel: CancellationToken) {
        let period = self.config.update_period;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let reports = self.step(period.as_secs_f64()).await;
            for (name, report) in reports {
                if let Err(e) = self.bus.publish(&pose_topic(&name), report).await {
                    tracing::warn!(agent = %name, "failed to publish pose: {}", e);
                }
            }
        }

        for (_, body) in std::mem::take(&mut *self.bodies.lock().await) {
            body.subscription.unsubscribe();
        }
        tracing::debug!("arena stopped");
    }

    /// Advance every body by `dt` seconds and report the new poses
    async fn step(&self, dt: f64) -> Vec<(String, PoseReport)> {
        let now = Instant::now();
        let size = self.config.size;
        let mut bodies = self.bodies.lock().await;

        bodies
            .iter_mut()
            .map(|(name, body)| {
                let live = body
                    .commanded_at
                    .is_some_and(|at| now.duration_since(at) <= self.config.command_timeout);
                let command = if live { body.command } else { VelocityCommand::default() };

                let pose = &mut body.pose;
                pose.theta = normalize_angle(pose.theta + command.angular_z * dt);
                pose.x = (pose.x + pose.theta.cos() * command.linear_x * dt).clamp(0.0, size);
                pose.y = (pose.y + pose.theta.sin() * command.linear_x * dt).clamp(0.0, size);

                let report = PoseReport {
                    x: pose.x,
                    y: pose.y,
                    theta: pose.theta,
                    linear_velocity: command.linear_x,
                    angular_velocity: command.angular_z,
                };
                (name.clone(), report)
            })
            .collect()
    }
}

fn upgrade<B>(arena: &Weak<ArenaInner<B>>) -> Result<Arc<ArenaInner<B>>> {
    arena
        .upgrade()
        .ok_or_else(|| TandemError::from("arena stopped"))
}

/// Wrap an angle into (-PI, PI]
fn normalize_angle(theta: f64) -> f64 {
    let wrapped = (theta + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI { PI } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use std::time::Duration;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-12);
        assert!((normalize_angle(2.0 * PI + 0.5) - 0.5).abs() < 1e-12);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
    }

    async fn arena() -> (LocalBus, LocalArena<LocalBus>) {
        let bus = LocalBus::new("test");
        let arena = LocalArena::start(
            Arc::new(bus.named("arena")),
            ArenaConfig::default(),
            "turtle1",
            CancellationToken::new(),
        )
        .await
        .unwrap();
        (bus, arena)
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_assigns_next_free_name() {
        let (bus, arena) = arena().await;

        let request = SpawnRequest { x: 2.0, y: 2.0, theta: 0.0, name: String::new() };
        let response: SpawnResponse = bus.call("/spawn", request.clone()).await.unwrap();
        assert_eq!(response.name, "turtle2");
        assert_eq!(arena.pose_of("turtle2").await, Some(Pose::new(2.0, 2.0, 0.0)));
        assert!(bus.service_ready("/turtle2/set_pen").await);

        let duplicate = SpawnRequest { name: "turtle2".into(), ..request };
        let result: Result<SpawnResponse> = bus.call("/spawn", duplicate).await;
        assert!(result.is_err());
        assert_eq!(arena.agents().await, vec!["turtle1", "turtle2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_pen_is_recorded() {
        let (bus, arena) = arena().await;
        let pen = PenStyle::enabled(Rgb::GREEN, 3);
        let _: SetPenResponse = bus.call("/turtle1/set_pen", pen).await.unwrap();
        assert_eq!(arena.pen_of("turtle1").await, Some(pen));
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_moves_then_times_out() {
        let (bus, arena) = arena().await;
        arena.place("turtle1", Pose::new(2.0, 2.0, 0.0)).await.unwrap();

        bus.publish("/turtle1/cmd_vel", VelocityCommand::new(1.0, 0.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let moving = arena.pose_of("turtle1").await.unwrap();
        assert!(moving.x > 2.3 && moving.x < 2.7, "x = {}", moving.x);

        tokio::time::sleep(Duration::from_secs(3)).await;
        let stopped = arena.pose_of("turtle1").await.unwrap();
        assert!(stopped.x < 3.2, "x = {}", stopped.x);
        assert!((stopped.y - 2.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_positions_clamped_to_arena() {
        let (bus, arena) = arena().await;
        arena.place("turtle1", Pose::new(0.1, 5.0, PI)).await.unwrap();

        bus.publish("/turtle1/cmd_vel", VelocityCommand::new(2.0, 0.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(arena.pose_of("turtle1").await.unwrap().x, 0.0);
    }
}
