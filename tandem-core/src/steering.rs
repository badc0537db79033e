//! Per-tick steering decisions
//!
//! Everything here is pure: given the two latest poses and a random source,
//! produce the velocity commands and the trail pen for one tick. The
//! controller owns the I/O around it.
//!
//! Random draws happen in a fixed order so that a seeded run replays
//! exactly:
//!
//! 1. free movement: primary linear, primary angular, companion linear,
//!    companion angular; collision: primary angular, companion angular
//! 2. wall bounces: primary x, primary y, companion x, companion y

use crate::config::TandemConfig;
use crate::messages::{PenStyle, Pose, Rgb, VelocityCommand};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two controlled agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    /// The agent present before startup; evades by turning left
    Primary,
    /// The spawned agent; evades by turning right
    Companion,
}

impl Agent {
    pub const BOTH: [Agent; 2] = [Agent::Primary, Agent::Companion];

    /// Index into per-agent arrays
    pub fn index(self) -> usize {
        match self {
            Agent::Primary => 0,
            Agent::Companion => 1,
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Agent::Primary => write!(f, "primary"),
            Agent::Companion => write!(f, "companion"),
        }
    }
}

/// Everything decided in one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickPlan {
    /// Distance between the agents when the tick fired
    pub distance: f64,
    /// Whether the agents were closer than the collision distance
    pub collision: bool,
    /// Velocity commands, indexed by [`Agent::index`]
    pub commands: [VelocityCommand; 2],
    /// Number of wall-bounce flips applied per agent (0, 1 or 2)
    pub bounces: [u8; 2],
    /// Pen applied to both trails
    pub pen: PenStyle,
}

impl TickPlan {
    pub fn command(&self, agent: Agent) -> VelocityCommand {
        self.commands[agent.index()]
    }
}

/// Steering constants, copied out of [`TandemConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct Steering {
    collision_distance: f64,
    reverse_speed: f64,
    wall_min: f64,
    wall_max: f64,
    cruise_speed: [f64; 2],
    cruise_turn: [f64; 2],
    evasive_turn: [f64; 2],
    midline: f64,
    pen_width: u8,
    primary_ahead: Rgb,
    companion_ahead: Rgb,
    level: Rgb,
}

impl Default for Steering {
    fn default() -> Self {
        Self::from_config(&TandemConfig::default())
    }
}

impl Steering {
    pub fn from_config(config: &TandemConfig) -> Self {
        let control = &config.control;
        let pen = &config.pen;
        Self {
            collision_distance: control.collision_distance,
            reverse_speed: control.reverse_speed,
            wall_min: control.wall_min,
            wall_max: control.wall_max,
            cruise_speed: control.cruise_speed,
            cruise_turn: control.cruise_turn,
            evasive_turn: control.evasive_turn,
            midline: pen.midline,
            pen_width: pen.width,
            primary_ahead: pen.primary_ahead,
            companion_ahead: pen.companion_ahead,
            level: pen.level,
        }
    }

    /// Decide one tick. Returns `None` when either pose is still unknown.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        primary: Option<&Pose>,
        companion: Option<&Pose>,
        rng: &mut R,
    ) -> Option<TickPlan> {
        let (primary, companion) = (primary?, companion?);

        let distance = primary.distance_to(companion);
        let collision = distance < self.collision_distance;
        let mut commands = self.base_commands(collision, rng);

        let mut bounces = [0u8; 2];
        for (agent, pose) in [(Agent::Primary, primary), (Agent::Companion, companion)] {
            let i = agent.index();
            bounces[i] = self.apply_wall_bounce(agent, pose, &mut commands[i], rng);
        }

        Some(TickPlan {
            distance,
            collision,
            commands,
            bounces,
            pen: self.pen_for(primary, companion),
        })
    }

    /// Velocities before any wall bounce
    pub fn base_commands<R: Rng + ?Sized>(
        &self,
        collision: bool,
        rng: &mut R,
    ) -> [VelocityCommand; 2] {
        if collision {
            let primary_turn = draw(rng, self.evasive_range(Agent::Primary));
            let companion_turn = draw(rng, self.evasive_range(Agent::Companion));
            [
                VelocityCommand::new(-self.reverse_speed, primary_turn),
                VelocityCommand::new(-self.reverse_speed, companion_turn),
            ]
        } else {
            let mut cruise = || {
                let linear = draw(rng, self.cruise_speed);
                let angular = draw(rng, self.cruise_turn);
                VelocityCommand::new(linear, angular)
            };
            let primary = cruise();
            let companion = cruise();
            [primary, companion]
        }
    }

    /// Flip the linear velocity and redraw an evasive turn once for every
    /// axis on which `pose` touches a wall.
    ///
    /// A corner hits both axes, so the second flip restores the original
    /// sign. Returns the number of flips applied.
    pub fn apply_wall_bounce<R: Rng + ?Sized>(
        &self,
        agent: Agent,
        pose: &Pose,
        command: &mut VelocityCommand,
        rng: &mut R,
    ) -> u8 {
        let mut flips = 0;
        for coordinate in [pose.x, pose.y] {
            if self.at_wall(coordinate) {
                command.linear_x = -command.linear_x;
                command.angular_z = draw(rng, self.evasive_range(agent));
                flips += 1;
            }
        }
        flips
    }

    /// Pen chosen from which agents are strictly past the midline
    pub fn pen_for(&self, primary: &Pose, companion: &Pose) -> PenStyle {
        let color = match (primary.x > self.midline, companion.x > self.midline) {
            (true, false) => self.primary_ahead,
            (false, true) => self.companion_ahead,
            _ => self.level,
        };
        PenStyle::enabled(color, self.pen_width)
    }

    pub fn at_wall(&self, coordinate: f64) -> bool {
        coordinate <= self.wall_min || coordinate >= self.wall_max
    }

    /// Evasive turn range: positive for the primary, mirrored for the companion
    pub fn evasive_range(&self, agent: Agent) -> [f64; 2] {
        let [lo, hi] = self.evasive_turn;
        match agent {
            Agent::Primary => [lo, hi],
            Agent::Companion => [-hi, -lo],
        }
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, [lo, hi]: [f64; 2]) -> f64 {
    rng.random_range(lo..=hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(0x7a11)
    }

    const FAR: Pose = Pose { x: 8.0, y: 8.0, theta: 0.0 };

    #[test]
    fn test_unknown_pose_skips_tick() {
        let steering = Steering::default();
        let pose = Pose::new(5.0, 5.0, 0.0);
        assert!(steering.plan(None, Some(&pose), &mut rng()).is_none());
        assert!(steering.plan(Some(&pose), None, &mut rng()).is_none());
        assert!(steering.plan(None, None, &mut rng()).is_none());
    }

    #[test]
    fn test_collision_reverses_with_opposite_turns() {
        let steering = Steering::default();
        let a = Pose::new(5.0, 5.0, 0.0);
        let b = Pose::new(5.3, 5.4, 1.0);

        let plan = steering.plan(Some(&a), Some(&b), &mut rng()).unwrap();
        assert!(plan.collision);
        assert_eq!(plan.bounces, [0, 0]);

        let primary = plan.command(Agent::Primary);
        let companion = plan.command(Agent::Companion);
        assert_eq!(primary.linear_x, -1.0);
        assert_eq!(companion.linear_x, -1.0);
        assert!((1.0..=2.0).contains(&primary.angular_z));
        assert!((-2.0..=-1.0).contains(&companion.angular_z));
    }

    #[test]
    fn test_exactly_collision_distance_is_free() {
        let steering = Steering::default();
        let a = Pose::new(5.0, 5.0, 0.0);
        let b = Pose::new(6.0, 5.0, 0.0);

        let plan = steering.plan(Some(&a), Some(&b), &mut rng()).unwrap();
        assert!(!plan.collision);
        assert!(plan.commands.iter().all(|c| (1.0..=2.0).contains(&c.linear_x)));
    }

    #[test]
    fn test_single_wall_flips_once() {
        let steering = Steering::default();
        let edge = Pose::new(0.4, 5.0, 0.0);

        let base = steering.base_commands(false, &mut rng());
        let plan = steering.plan(Some(&edge), Some(&FAR), &mut rng()).unwrap();

        assert_eq!(plan.bounces, [1, 0]);
        assert_eq!(plan.command(Agent::Primary).linear_x, -base[0].linear_x);
        assert!(plan.command(Agent::Primary).linear_x < 0.0);
        assert!((1.0..=2.0).contains(&plan.command(Agent::Primary).angular_z));
        assert_eq!(plan.command(Agent::Companion), base[1]);
    }

    #[test]
    fn test_corner_flips_twice() {
        let steering = Steering::default();
        let corner = Pose::new(0.4, 0.4, 0.0);

        let base = steering.base_commands(false, &mut rng());
        let plan = steering.plan(Some(&corner), Some(&FAR), &mut rng()).unwrap();

        assert_eq!(plan.bounces, [2, 0]);
        assert_eq!(plan.command(Agent::Primary).linear_x, base[0].linear_x);
        assert!(plan.command(Agent::Primary).linear_x > 0.0);
    }

    #[test]
    fn test_companion_bounce_turns_right() {
        let steering = Steering::default();
        let edge = Pose::new(5.0, 10.5, 0.0);

        let plan = steering.plan(Some(&FAR), Some(&edge), &mut rng()).unwrap();
        let companion = plan.command(Agent::Companion);
        assert_eq!(plan.bounces, [0, 1]);
        assert!(companion.linear_x < 0.0);
        assert!((-2.0..=-1.0).contains(&companion.angular_z));
    }

    #[test]
    fn test_bounce_after_collision_moves_forward() {
        let steering = Steering::default();
        let a = Pose::new(0.3, 5.0, 0.0);
        let b = Pose::new(0.6, 5.2, 0.0);

        let plan = steering.plan(Some(&a), Some(&b), &mut rng()).unwrap();
        assert!(plan.collision);
        assert_eq!(plan.command(Agent::Primary).linear_x, 1.0);
        assert_eq!(plan.command(Agent::Companion).linear_x, -1.0);
    }

    #[test]
    fn test_wall_bounds_are_inclusive() {
        let steering = Steering::default();
        assert!(steering.at_wall(0.5));
        assert!(steering.at_wall(10.5));
        assert!(!steering.at_wall(0.500_001));
        assert!(!steering.at_wall(10.499_999));
    }

    #[test]
    fn test_pen_colors() {
        let steering = Steering::default();
        let at = |x: f64| Pose::new(x, 5.0, 0.0);

        assert_eq!(steering.pen_for(&at(6.0), &at(5.0)).color(), Rgb::GREEN);
        assert_eq!(steering.pen_for(&at(5.0), &at(6.0)).color(), Rgb::RED);
        assert_eq!(steering.pen_for(&at(6.0), &at(6.0)).color(), Rgb::BLUE);
        assert_eq!(steering.pen_for(&at(5.0), &at(5.0)).color(), Rgb::BLUE);
        // on the midline is not past it
        assert_eq!(steering.pen_for(&at(5.5), &at(6.0)).color(), Rgb::RED);

        let pen = steering.pen_for(&at(6.0), &at(5.0));
        assert_eq!(pen.width, 3);
        assert!(!pen.off);
    }

    #[test]
    fn test_seeded_plans_replay() {
        let steering = Steering::default();
        let a = Pose::new(3.0, 4.0, 0.0);
        let b = Pose::new(7.0, 6.0, 0.0);

        let first = steering.plan(Some(&a), Some(&b), &mut rng());
        let second = steering.plan(Some(&a), Some(&b), &mut rng());
        assert_eq!(first, second);
    }
}
