//! Periodic collision-avoidance controller
//!
//! A single event loop owns all controller state. Pose subscriptions only
//! overwrite a per-agent watch slot, so at most the latest pose is held no
//! matter how long the loop takes to start. The loop fires the periodic tick
//! and handles request completions one at a time.
//!
//! Requests never block the tick: waiting for a set-pen service happens
//! inside the pending request, bounded by `services.recolor_wait_limit`.

use crate::bus::{Bus, SubscriptionHandle};
use crate::config::TandemConfig;
use crate::error::Result;
use crate::messages::{
    PenStyle, Pose, SetPenResponse, SpawnResponse, cmd_vel_topic, pose_topic, set_pen_service,
};
use crate::services::{ServiceClient, WaitNotice, WaitPolicy};
use crate::spawner::{SpawnFuture, report_spawn};
use crate::steering::{Agent, Steering, TickPlan};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A finished request, handled on the event loop
enum Completion {
    Spawn(Result<SpawnResponse>),
    Recolor {
        agent: Agent,
        outcome: Result<SetPenResponse>,
    },
}

/// Counters kept over a controller run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStats {
    /// Timer firings, including skipped ones
    pub ticks: u64,
    /// Ticks skipped because a pose was still unknown
    pub skipped_ticks: u64,
    pub commands_published: u64,
    pub recolor_requests: u64,
    pub recolor_failures: u64,
    /// Name assigned by the spawn service, once it answered
    pub spawned: Option<String>,
}

/// Drives both agents from their latest poses
pub struct Controller<B: Bus> {
    bus: Arc<B>,
    steering: Steering,
    rng: ChaCha8Rng,
    tick_period: Duration,
    max_ticks: Option<u64>,
    agents: [String; 2],
    pen_clients: [ServiceClient<B>; 2],
    poses: [Arc<watch::Sender<Option<Pose>>>; 2],
    subscriptions: Vec<SubscriptionHandle>,
    pending: FuturesUnordered<BoxFuture<'static, Completion>>,
    requests_cancel: CancellationToken,
    stats: ControllerStats,
}

impl<B: Bus + 'static> Controller<B> {
    pub fn new(bus: Arc<B>, config: &TandemConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };

        let agents = [config.agents.primary.clone(), config.agents.companion.clone()];
        let recolor_policy = WaitPolicy::unbounded(config.services.poll_interval)
            .with_limit(config.services.recolor_wait_limit)
            .with_notice(WaitNotice::Warn);
        let pen_clients = agents
            .clone()
            .map(|name| ServiceClient::new(bus.clone(), set_pen_service(&name), recolor_policy));

        Self {
            bus,
            steering: Steering::from_config(config),
            rng,
            tick_period: config.control.tick_period,
            max_ticks: config.control.max_ticks,
            agents,
            pen_clients,
            poses: [None, None].map(|pose| Arc::new(watch::Sender::new(pose))),
            subscriptions: Vec::new(),
            pending: FuturesUnordered::new(),
            requests_cancel: CancellationToken::new(),
            stats: ControllerStats::default(),
        }
    }

    /// Replace the random source (e.g. with a seeded one in tests)
    pub fn with_rng(mut self, rng: ChaCha8Rng) -> Self {
        self.rng = rng;
        self
    }

    /// Subscribe to both pose topics
    pub async fn attach(&mut self) -> Result<()> {
        for agent in Agent::BOTH {
            let topic = pose_topic(self.name(agent));
            let latest = self.poses[agent.index()].clone();
            let handle = self
                .bus
                .subscribe(&topic, move |pose: Pose| {
                    latest.send_replace(Some(pose));
                    Box::pin(async { Ok(()) })
                })
                .await?;
            tracing::debug!(%agent, topic = %topic, id = %handle.id(), "subscribed to pose updates");
            self.subscriptions.push(handle);
        }
        Ok(())
    }

    /// Name of the simulator agent behind `agent`
    pub fn name(&self, agent: Agent) -> &str {
        &self.agents[agent.index()]
    }

    /// Latest known pose of `agent`
    pub fn pose(&self, agent: Agent) -> Option<Pose> {
        *self.poses[agent.index()].borrow()
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    /// Number of requests still in flight
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Record the latest pose of `agent`, replacing the previous one
    pub fn observe(&self, agent: Agent, pose: Pose) {
        self.poses[agent.index()].send_replace(Some(pose));
    }

    /// Hand over an in-flight spawn request so its completion is reported
    /// from the event loop
    pub fn track_spawn(&mut self, spawn: SpawnFuture) {
        self.pending
            .push(Box::pin(async move { Completion::Spawn(spawn.await) }));
    }

    /// Run one decision: publish both velocity commands, then queue the
    /// recolor requests.
    ///
    /// Returns `None` (and does nothing) while either pose is unknown.
    pub async fn tick(&mut self) -> Result<Option<TickPlan>> {
        self.stats.ticks += 1;

        let (primary, companion) = (self.pose(Agent::Primary), self.pose(Agent::Companion));
        let Some(plan) = self
            .steering
            .plan(primary.as_ref(), companion.as_ref(), &mut self.rng)
        else {
            self.stats.skipped_ticks += 1;
            tracing::trace!(tick = self.stats.ticks, "pose unknown, skipping tick");
            return Ok(None);
        };

        tracing::debug!(
            tick = self.stats.ticks,
            distance = plan.distance,
            collision = plan.collision,
            bounces = ?plan.bounces,
            "tick planned"
        );

        for agent in Agent::BOTH {
            let topic = cmd_vel_topic(self.name(agent));
            self.bus.publish(&topic, plan.command(agent)).await?;
            self.stats.commands_published += 1;
        }

        self.queue_recolor(plan.pen);
        Ok(Some(plan))
    }

    fn queue_recolor(&mut self, pen: PenStyle) {
        for agent in Agent::BOTH {
            let client = self.pen_clients[agent.index()].clone();
            let cancel = self.requests_cancel.clone();
            self.stats.recolor_requests += 1;
            self.pending.push(Box::pin(async move {
                let outcome = client.wait_and_call(pen, &cancel).await;
                Completion::Recolor { agent, outcome }
            }));
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Spawn(outcome) => {
                report_spawn(&outcome);
                if let Ok(response) = outcome {
                    self.stats.spawned = Some(response.name);
                }
            }
            Completion::Recolor { agent, outcome } => match outcome {
                Ok(SetPenResponse {}) => tracing::trace!(%agent, "pen set"),
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    self.stats.recolor_failures += 1;
                    tracing::error!(%agent, "Service call failed: {}", e);
                }
            },
        }
    }

    /// Run the event loop until `shutdown` fires (or `max_ticks` is reached).
    ///
    /// The first tick fires one period after the loop starts. On reaching
    /// `max_ticks`, requests still in flight are awaited (each is bounded by
    /// its wait limit); on shutdown they are cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<ControllerStats> {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.tick_period, self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            primary = self.name(Agent::Primary),
            companion = self.name(Agent::Companion),
            period = ?self.tick_period,
            "controller running"
        );

        let limit_reached = loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break false,

                Some(completion) = self.pending.next(), if !self.pending.is_empty() => {
                    self.handle_completion(completion);
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::warn!(tick = self.stats.ticks, "tick failed: {}", e);
                    }
                    if self.max_ticks.is_some_and(|max| self.stats.ticks >= max) {
                        tracing::debug!(ticks = self.stats.ticks, "tick limit reached");
                        break true;
                    }
                }
            }
        };

        if limit_reached {
            self.drain_pending(&shutdown).await;
        }

        self.requests_cancel.cancel();
        for handle in self.subscriptions.drain(..) {
            tracing::trace!(topic = handle.topic(), "unsubscribing");
            handle.unsubscribe();
        }

        tracing::info!(
            ticks = self.stats.ticks,
            skipped = self.stats.skipped_ticks,
            commands = self.stats.commands_published,
            recolor_failures = self.stats.recolor_failures,
            abandoned = self.pending_requests(),
            "controller stopped"
        );
        Ok(self.stats)
    }

    /// Handle every in-flight request, unless shutdown comes first
    async fn drain_pending(&mut self, shutdown: &CancellationToken) {
        tracing::debug!(pending = self.pending_requests(), "waiting for in-flight requests");
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                completion = self.pending.next() => match completion {
                    Some(completion) => self.handle_completion(completion),
                    None => break,
                },
            }
        }
    }
}
