//! Engine configuration loaded from `config.toml` next to the scene file.

use log::info;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::simulation::SignalSimulation;
use crate::simulation::friis::FriisSimulation;
use crate::simulation::raycasting::{RaycastingParameters, RaycastingSimulation};
use crate::simulation::signal_calculations::{AntennaGain, Power, PowerCoefficient};
use crate::simulation::space::DiscretizedSpace;
use crate::simulation::types::{ConfigError, LinkBudget, Receiver, Transmitter};
use crate::simulation::wavefront::{WavefrontParameters, WavefrontSimulation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Raycasting,
    Wavefront,
    Friis,
}

/// Strongest expected hardware and the weakest power worth mapping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LinkBudgetConfig {
    pub best_transmitter_power_dbm: f64,
    pub best_transmitter_gain_dbi: f64,
    pub best_receiver_gain_dbi: f64,
    pub minimum_power_dbm: f64,
}

impl Default for LinkBudgetConfig {
    fn default() -> Self {
        Self {
            best_transmitter_power_dbm: 20.0,
            best_transmitter_gain_dbi: 0.0,
            best_receiver_gain_dbi: 0.0,
            minimum_power_dbm: -100.0,
        }
    }
}

impl LinkBudgetConfig {
    pub fn link_budget(&self) -> Result<LinkBudget, ConfigError> {
        LinkBudget::new(
            Transmitter::new(
                Power::from_dbm(self.best_transmitter_power_dbm),
                AntennaGain::from_dbi(self.best_transmitter_gain_dbi),
            ),
            Receiver::new(AntennaGain::from_dbi(self.best_receiver_gain_dbi)),
            Power::from_dbm(self.minimum_power_dbm),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RaycastingConfig {
    pub rays_count: usize,
    pub reflection_count: u32,
}

impl Default for RaycastingConfig {
    fn default() -> Self {
        Self {
            rays_count: 3600,
            reflection_count: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WavefrontConfig {
    /// Loss in dB for a full reversal of direction.
    pub turn_penalty_db: f64,
}

impl Default for WavefrontConfig {
    fn default() -> Self {
        Self { turn_penalty_db: -3.0 }
    }
}

/// Heatmap color range and optional grayscale export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    pub min_dbm: f64,
    pub max_dbm: f64,
    pub pgm: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            min_dbm: -100.0,
            max_dbm: -20.0,
            pgm: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimulationConfig {
    pub engine: EngineKind,
    pub link_budget: LinkBudgetConfig,
    pub raycasting: RaycastingConfig,
    pub wavefront: WavefrontConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `config_path` - Path to the config.toml file
    ///
    /// # Returns
    /// * `Ok(SimulationConfig)` if the file was successfully loaded and parsed
    /// * `Err(String)` with a descriptive error message otherwise
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path).map_err(|e| format!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let config: SimulationConfig = toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))?;

        if !(config.output.min_dbm < config.output.max_dbm) {
            return Err(format!(
                "Output range min-dbm {} must be below max-dbm {}",
                config.output.min_dbm, config.output.max_dbm
            ));
        }

        Ok(config)
    }

    /// Like [`SimulationConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(config_path: &Path) -> Result<Self, String> {
        if !config_path.exists() {
            info!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load(config_path)
    }

    /// Derive the config path from a scene file path.
    ///
    /// Replaces the scene filename with "config.toml" in the same directory.
    pub fn config_path_from_scene(scene_path: &str) -> PathBuf {
        let scene = Path::new(scene_path);
        scene.parent().unwrap_or(Path::new(".")).join("config.toml")
    }

    /// Instantiate the configured engine over `space`.
    pub fn build_simulation(&self, space: Arc<DiscretizedSpace>) -> Result<Box<dyn SignalSimulation>, ConfigError> {
        let link_budget = self.link_budget.link_budget()?;

        let simulation: Box<dyn SignalSimulation> = match self.engine {
            EngineKind::Raycasting => Box::new(RaycastingSimulation::new(
                space,
                RaycastingParameters {
                    rays_count: self.raycasting.rays_count,
                    reflection_count: self.raycasting.reflection_count,
                    link_budget,
                },
            )?),
            EngineKind::Wavefront => Box::new(WavefrontSimulation::new(
                space,
                WavefrontParameters {
                    turn_coefficient: PowerCoefficient::from_db(self.wavefront.turn_penalty_db),
                    link_budget,
                },
            )?),
            EngineKind::Friis => Box::new(FriisSimulation::new(space, link_budget)),
        };

        Ok(simulation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::geometry::{Point, Rectangle};
    use crate::simulation::signal_calculations::Frequency;

    fn empty_space() -> Arc<DiscretizedSpace> {
        let surface = Rectangle::from_corners(Point::new(0.0, 0.0), Point::new(4.0, 4.0));
        Arc::new(DiscretizedSpace::new(Vec::new(), surface, 0.5, Frequency::from_ghz(2.4)).unwrap())
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = SimulationConfig::parse("").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.engine, EngineKind::Raycasting);
        assert_eq!(config.raycasting.rays_count, 3600);
    }

    #[test]
    fn parses_kebab_case_sections() {
        let config = SimulationConfig::parse(
            r#"
            engine = "wavefront"

            [link-budget]
            best-transmitter-power-dbm = 23.0
            minimum-power-dbm = -95.0

            [wavefront]
            turn-penalty-db = -6.0

            [output]
            pgm = true
            "#,
        )
        .unwrap();
        assert_eq!(config.engine, EngineKind::Wavefront);
        assert_eq!(config.link_budget.best_transmitter_power_dbm, 23.0);
        assert_eq!(config.link_budget.best_receiver_gain_dbi, 0.0);
        assert_eq!(config.wavefront.turn_penalty_db, -6.0);
        assert!(config.output.pgm);
        assert_eq!(config.output.max_dbm, -20.0);

        let budget = config.link_budget.link_budget().unwrap();
        assert!((budget.minimum_coefficient().db() - -118.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(SimulationConfig::parse("engine = \"magic\"").is_err());
        assert!(SimulationConfig::parse("[output]\nmin-dbm = -10.0\nmax-dbm = -20.0").is_err());
    }

    #[test]
    fn builds_every_engine() {
        for engine in ["raycasting", "wavefront", "friis"] {
            let config = SimulationConfig::parse(&format!("engine = \"{}\"\n[raycasting]\nrays-count = 90", engine)).unwrap();
            let simulation = config.build_simulation(empty_space()).unwrap();
            let map = simulation.simulate(Point::new(2.0, 2.0));
            assert!(map.covered_cells() > 0);
        }

        let no_rays = SimulationConfig::parse("[raycasting]\nrays-count = 0").unwrap();
        assert!(matches!(no_rays.build_simulation(empty_space()), Err(ConfigError::NoRays)));
        let gain = SimulationConfig::parse("engine = \"wavefront\"\n[wavefront]\nturn-penalty-db = 2.0").unwrap();
        assert!(matches!(gain.build_simulation(empty_space()), Err(ConfigError::InvalidTurnPenalty(_))));
    }

    #[test]
    fn config_path_sits_next_to_scene() {
        assert_eq!(
            SimulationConfig::config_path_from_scene("scenes/office/scene.json"),
            PathBuf::from("scenes/office/config.toml")
        );
        let missing = SimulationConfig::load_or_default(Path::new("/nonexistent/signal-mapper/config.toml")).unwrap();
        assert_eq!(missing, SimulationConfig::default());
    }
}
