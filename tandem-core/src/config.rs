//! Configuration types for the Tandem controller

use crate::error::{Result, TandemError};
use crate::messages::Rgb;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tandem.toml";

/// Environment variable naming an extra config file
pub const CONFIG_PATH_VAR: &str = "TANDEM_CONFIG_PATH";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    /// Name the controller publishes under
    pub node_name: String,

    /// Fixed RNG seed; `None` seeds from the OS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Names of the two agents
    pub agents: AgentsConfig,

    /// Where the companion agent is spawned
    pub spawn: SpawnConfig,

    /// Steering constants
    pub control: ControlConfig,

    /// Trail colors
    pub pen: PenConfig,

    /// Service availability polling
    pub services: ServiceConfig,

    /// Local bus settings
    pub bus: BusConfig,

    /// Local arena stand-in settings
    pub arena: ArenaConfig,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            node_name: "collision_avoidance_node".to_string(),
            seed: None,
            agents: AgentsConfig::default(),
            spawn: SpawnConfig::default(),
            control: ControlConfig::default(),
            pen: PenConfig::default(),
            services: ServiceConfig::default(),
            bus: BusConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

/// Agent names; topics and services are derived from them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// The agent that already exists when the controller starts
    pub primary: String,

    /// The agent the spawner creates
    pub companion: String,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            primary: "turtle1".to_string(),
            companion: "turtle2".to_string(),
        }
    }
}

/// Spawn request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub x: f64,
    pub y: f64,
    pub theta: f64,

    /// Name to request; empty lets the simulator assign one
    pub name: String,

    /// Service creating new agents
    pub service: String,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            x: 2.0,
            y: 2.0,
            theta: 0.0,
            name: String::new(),
            service: "/spawn".to_string(),
        }
    }
}

/// Steering constants for the periodic decision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Period between ticks
    #[serde(with = "humantime_serde")]
    pub tick_period: Duration,

    /// Agents closer than this reverse away from each other
    pub collision_distance: f64,

    /// Reverse speed used when a collision is imminent (applied as a negative)
    pub reverse_speed: f64,

    /// Coordinates at or below this bounce
    pub wall_min: f64,

    /// Coordinates at or above this bounce
    pub wall_max: f64,

    /// Forward speed range when no collision is imminent
    pub cruise_speed: [f64; 2],

    /// Turn rate range when no collision is imminent
    pub cruise_turn: [f64; 2],

    /// Magnitude range of the fixed-sense evasive turn
    pub evasive_turn: [f64; 2],

    /// Stop after this many ticks, skipped ones included
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<u64>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            collision_distance: 1.0,
            reverse_speed: 1.0,
            wall_min: 0.5,
            wall_max: 10.5,
            cruise_speed: [1.0, 2.0],
            cruise_turn: [-1.0, 1.0],
            evasive_turn: [1.0, 2.0],
            max_ticks: None,
        }
    }
}

/// Trail color rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PenConfig {
    /// x coordinate separating the two halves of the arena
    pub midline: f64,
    pub width: u8,

    /// Only the primary agent is past the midline
    pub primary_ahead: Rgb,

    /// Only the companion agent is past the midline
    pub companion_ahead: Rgb,

    /// Both or neither are past the midline
    pub level: Rgb,
}

impl Default for PenConfig {
    fn default() -> Self {
        Self {
            midline: 5.5,
            width: 3,
            primary_ahead: Rgb::GREEN,
            companion_ahead: Rgb::RED,
            level: Rgb::BLUE,
        }
    }
}

/// Service availability polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Interval between availability checks
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Give up waiting for the spawn service after this long (unbounded if unset)
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub spawn_wait_limit: Option<Duration>,

    /// Give up waiting for a set-pen service after this long (unbounded if unset)
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub recolor_wait_limit: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            spawn_wait_limit: None,
            recolor_wait_limit: Some(Duration::from_secs(5)),
        }
    }
}

/// Local bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Per-subscriber queue depth
    pub queue_depth: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_depth: crate::bus::DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// Kinematic arena stand-in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Side length of the square arena
    pub size: f64,

    /// Integration and pose publishing period
    #[serde(with = "humantime_serde")]
    pub update_period: Duration,

    /// A velocity command stops applying after this long
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            size: 11.088_889,
            update_period: Duration::from_millis(16),
            command_timeout: Duration::from_secs(1),
        }
    }
}

impl TandemConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (tandem.toml, then the path in TANDEM_CONFIG_PATH)
    /// 3. Environment variable overrides (`TANDEM_` prefix, `__` between nested keys)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid or the result
    /// fails validation.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(TandemConfig::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));

        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            figment = figment.merge(Toml::file(path));
        }

        Self::extract(figment, "Failed to load configuration")
    }

    /// Load configuration from a specific file path, then apply the same
    /// environment overrides as [`TandemConfig::load`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be parsed, or the
    /// result fails validation.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TandemError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let figment = Figment::from(Serialized::defaults(TandemConfig::default()))
            .merge(Toml::file(path));
        Self::extract(figment, "Failed to load configuration file")
    }

    fn extract(figment: Figment, context: &str) -> Result<Self> {
        let config: TandemConfig = figment
            .merge(Env::prefixed("TANDEM_").ignore(&["CONFIG_PATH"]).split("__"))
            .extract()
            .map_err(|e| TandemError::Configuration(format!("{}: {}", context, e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(TandemError::Configuration(msg));

        if self.agents.primary.is_empty() || self.agents.companion.is_empty() {
            return invalid("agent names cannot be empty".into());
        }
        if self.agents.primary == self.agents.companion {
            return invalid(format!("agents must differ, both are {}", self.agents.primary));
        }

        let control = &self.control;
        if control.tick_period.is_zero() {
            return invalid("control.tick_period must be positive".into());
        }
        if control.wall_min >= control.wall_max {
            return invalid(format!(
                "control.wall_min ({}) must be below control.wall_max ({})",
                control.wall_min, control.wall_max
            ));
        }
        for (name, [lo, hi]) in [
            ("cruise_speed", control.cruise_speed),
            ("cruise_turn", control.cruise_turn),
            ("evasive_turn", control.evasive_turn),
        ] {
            if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                return invalid(format!("control.{} range [{}, {}] is invalid", name, lo, hi));
            }
        }
        if control.evasive_turn[0] < 0.0 {
            return invalid("control.evasive_turn is a magnitude and must be non-negative".into());
        }
        if self.pen.width == 0 {
            return invalid("pen.width must be at least 1".into());
        }
        if self.services.poll_interval.is_zero() {
            return invalid("services.poll_interval must be positive".into());
        }
        if self.arena.update_period.is_zero() || self.arena.size <= 0.0 {
            return invalid("arena.update_period and arena.size must be positive".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TandemConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control.tick_period, Duration::from_secs(1));
        assert_eq!(config.pen.midline, 5.5);
        assert_eq!(config.spawn.service, "/spawn");
    }

    #[test]
    fn test_rejects_inverted_walls() {
        let mut config = TandemConfig::default();
        config.control.wall_min = 11.0;
        assert!(matches!(config.validate(), Err(TandemError::Configuration(_))));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let mut config = TandemConfig::default();
        config.control.cruise_speed = [2.0, 1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_same_agent_twice() {
        let mut config = TandemConfig::default();
        config.agents.companion = "turtle1".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_pen_width() {
        let mut config = TandemConfig::default();
        config.pen.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let result = TandemConfig::from_file("/nonexistent/tandem.toml");
        assert!(matches!(result, Err(TandemError::Configuration(_))));
    }

    #[test]
    fn test_from_file_partial_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
seed = 42

[control]
tick_period = "250ms"
collision_distance = 1.5

[services]
recolor_wait_limit = "2s"
"#,
            )?;

            let config = TandemConfig::from_file("custom.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.seed, Some(42));
            assert_eq!(config.control.tick_period, Duration::from_millis(250));
            assert_eq!(config.control.collision_distance, 1.5);
            assert_eq!(config.control.wall_max, 10.5);
            assert_eq!(config.services.recolor_wait_limit, Some(Duration::from_secs(2)));
            assert_eq!(config.agents.primary, "turtle1");
            Ok(())
        });
    }

    #[test]
    fn test_from_file_applies_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "seed = 42\nnode_name = \"custom\"\n")?;
            jail.set_env("TANDEM_SEED", "5");

            let config = TandemConfig::from_file("custom.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.node_name, "custom");
            assert_eq!(config.seed, Some(5));
            Ok(())
        });
    }

    #[test]
    fn test_load_reads_config_path_then_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "node_name = \"default_file\"\n")?;
            jail.create_file("extra.toml", "node_name = \"extra_file\"\nseed = 1\n")?;
            jail.set_env(CONFIG_PATH_VAR, "extra.toml");
            jail.set_env("TANDEM_SEED", "5");

            let config = TandemConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.node_name, "extra_file");
            assert_eq!(config.seed, Some(5));
            Ok(())
        });
    }

    #[test]
    fn test_load_merges_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
node_name = "from_file"

[pen]
midline = 6.0
"#,
            )?;
            jail.set_env("TANDEM_SEED", "7");
            jail.set_env("TANDEM_CONTROL__TICK_PERIOD", "500ms");

            let config = TandemConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.node_name, "from_file");
            assert_eq!(config.pen.midline, 6.0);
            assert_eq!(config.seed, Some(7));
            assert_eq!(config.control.tick_period, Duration::from_millis(500));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TANDEM_PEN__WIDTH", "0");
            assert!(TandemConfig::load().is_err());
            Ok(())
        });
    }
}
