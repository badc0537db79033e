//! Wire messages exchanged with the simulator
//!
//! Field names follow the simulator's own message definitions so that the
//! JSON payloads carried over the bus line up with what it publishes.

use serde::{Deserialize, Serialize};

/// Latest known position and heading of one agent.
///
/// The simulator also reports current velocities; those fields are ignored
/// on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading in radians
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Euclidean distance between two positions (heading is ignored)
    pub fn distance_to(&self, other: &Pose) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Planar velocity command
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub linear_x: f64,
    pub angular_z: f64,
}

impl VelocityCommand {
    pub fn new(linear_x: f64, angular_z: f64) -> Self {
        Self { linear_x, angular_z }
    }
}

/// RGB color of a trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Pen state requested from the simulator (the set-pen request body)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenStyle {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub width: u8,
    /// `true` lifts the pen so no trail is drawn
    pub off: bool,
}

impl PenStyle {
    /// An enabled pen of the given color and width
    pub fn enabled(color: Rgb, width: u8) -> Self {
        Self {
            r: color.r,
            g: color.g,
            b: color.b,
            width,
            off: false,
        }
    }

    pub fn color(&self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }
}

/// Body of a spawn request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    /// Requested name; empty lets the simulator pick one
    #[serde(default)]
    pub name: String,
}

/// Name assigned to a freshly spawned agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnResponse {
    pub name: String,
}

/// Empty acknowledgment returned by set-pen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SetPenResponse {}

/// Topic carrying pose updates for `agent`
pub fn pose_topic(agent: &str) -> String {
    format!("/{agent}/pose")
}

/// Topic accepting velocity commands for `agent`
pub fn cmd_vel_topic(agent: &str) -> String {
    format!("/{agent}/cmd_vel")
}

/// Service recoloring the trail of `agent`
pub fn set_pen_service(agent: &str) -> String {
    format!("/{agent}/set_pen")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_ignores_velocity_fields() {
        let pose: Pose = serde_json::from_value(serde_json::json!({
            "x": 1.5,
            "y": 2.5,
            "theta": 0.25,
            "linear_velocity": 1.0,
            "angular_velocity": -0.5
        }))
        .unwrap();

        assert_eq!(pose, Pose::new(1.5, 2.5, 0.25));
    }

    #[test]
    fn test_distance() {
        let a = Pose::new(1.0, 1.0, 0.0);
        let b = Pose::new(4.0, 5.0, 3.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
        assert_eq!(a.distance_to(&a), 0.0);
    }

    #[test]
    fn test_spawn_request_name_defaults_to_empty() {
        let req: SpawnRequest =
            serde_json::from_value(serde_json::json!({"x": 2.0, "y": 2.0, "theta": 0.0})).unwrap();
        assert!(req.name.is_empty());
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(pose_topic("turtle1"), "/turtle1/pose");
        assert_eq!(cmd_vel_topic("turtle2"), "/turtle2/cmd_vel");
        assert_eq!(set_pen_service("turtle2"), "/turtle2/set_pen");
    }
}
