use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};

use twr_estimation::{ControlInput, RobotConfig};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Harness settings: how long to drive, with which command, and the robot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Seed for the single generator that drives all noise.
    pub seed: u64,
    pub steps: usize,
    /// Wheel command held for every tick.
    pub command: ControlInput,
    pub robot: RobotConfig,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        SimulationSettings {
            seed: 0,
            steps: 27,
            command: ControlInput::new(1.0, 2.0),
            robot: RobotConfig::default(),
        }
    }
}

/// Load settings from a TOML file, overlaid with `TWR_`-prefixed
/// environment variables (`TWR_SEED`, `TWR_ROBOT__NOISE__ENABLED`, ...).
///
/// A missing file is only an error when `required` is set; absent keys fall
/// back to [`SimulationSettings::default`].
pub fn load_settings(path: &str, required: bool) -> Result<SimulationSettings, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let builder = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(required))
        .add_source(
            Environment::with_prefix("TWR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    match deserialize(builder) {
        Ok(settings) => {
            info!("Successfully loaded configuration: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

fn deserialize(builder: ConfigBuilder<DefaultState>) -> Result<SimulationSettings, ConfigError> {
    builder.build()?.try_deserialize()
}
