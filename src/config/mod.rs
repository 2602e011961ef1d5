//! YAML Configuration for a Simulation Run
//!
//! This module handles loading run parameters, optional catalog locations and
//! a scripted order book from YAML files.

use crate::calendar::{Hour, HOURS_PER_DAY};
use crate::simulation::Command;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Run-level difficulty.
///
/// Skews the mix of activated events and scales event impact and noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Target share of positive events among active ones
    pub fn positive_ratio(self) -> f64 {
        match self {
            Difficulty::Easy => 0.6,
            Difficulty::Medium => 0.4,
            Difficulty::Hard => 0.2,
        }
    }

    /// Target share of negative events among active ones
    pub fn negative_ratio(self) -> f64 {
        1.0 - self.positive_ratio()
    }

    /// Scales every event's price impact
    pub fn impact_multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 0.7,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 1.2,
        }
    }

    /// Width of the hourly random-walk noise
    pub fn noise_volatility(self) -> f64 {
        match self {
            Difficulty::Easy => 0.001,
            Difficulty::Medium => 0.002,
            Difficulty::Hard => 0.003,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(name)
    }
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ConfigError::Validation(format!("Unknown difficulty: {}", other))),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Simulation settings
    pub simulation: SimulationConfig,
    /// Catalog files (optional; built-in catalog otherwise)
    #[serde(default)]
    pub catalog: Option<CatalogConfig>,
    /// Orders the runner submits as the clock reaches each hour
    #[serde(default)]
    pub orders: Vec<ScheduledOrder>,
}

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Run length in hours, expected to be a multiple of 8
    #[serde(default = "default_total_hours")]
    pub total_hours: Hour,
    /// Opening cash balance
    #[serde(default = "default_starting_cash")]
    pub starting_cash: f64,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Random seed for reproducibility
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Locations of the reference data files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub instruments: PathBuf,
    pub events: PathBuf,
}

/// A command submitted once the clock reads `hour`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledOrder {
    pub hour: Hour,
    #[serde(flatten)]
    pub command: Command,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Ten trading days, $10,000, medium difficulty, no scripted orders
    pub fn default_run() -> Self {
        Self {
            simulation: SimulationConfig {
                total_hours: default_total_hours(),
                starting_cash: default_starting_cash(),
                difficulty: Difficulty::Medium,
                seed: default_seed(),
            },
            catalog: None,
            orders: Vec::new(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.total_hours == 0 {
            return Err(ConfigError::Validation(
                "Total hours must be positive".to_string(),
            ));
        }
        if sim.total_hours % HOURS_PER_DAY != 0 {
            warn!(
                total_hours = sim.total_hours,
                "run length is not a whole number of trading days"
            );
        }

        if !(sim.starting_cash.is_finite() && sim.starting_cash > 0.0) {
            return Err(ConfigError::Validation(
                "Starting cash must be positive".to_string(),
            ));
        }

        if let Some(order) = self.orders.iter().find(|o| o.hour >= sim.total_hours) {
            return Err(ConfigError::Validation(format!(
                "Order at hour {} is outside a {}-hour run",
                order.hour, sim.total_hours
            )));
        }

        Ok(())
    }

    /// Orders scheduled for the given hour, in file order
    pub fn orders_at(&self, hour: Hour) -> impl Iterator<Item = &Command> {
        self.orders
            .iter()
            .filter(move |o| o.hour == hour)
            .map(|o| &o.command)
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

// Default value functions
fn default_total_hours() -> Hour {
    80
}

fn default_starting_cash() -> f64 {
    10_000.0
}

fn default_seed() -> u64 {
    42
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::OptionType;

    #[test]
    fn test_default_config() {
        let config = Config::default_run();
        assert_eq!(config.simulation.total_hours, 80);
        assert_eq!(config.simulation.starting_cash, 10_000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default_run();
        config.simulation.starting_cash = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default_run();
        config.simulation.total_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parses_scripted_orders() {
        let yaml = r#"
simulation:
  total_hours: 16
  starting_cash: 5000.0
  difficulty: hard
  seed: 7
orders:
  - { hour: 0, action: buy, ticker: GLCR, shares: 10 }
  - { hour: 4, action: open_option, ticker: SOLR, option_type: put, contracts: 2, strike: 30.0, expires_in: 8 }
  - { hour: 6, action: close_option, ticker: SOLR, index: 0 }
  - { hour: 6, action: watch, ticker: BIO }
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.simulation.difficulty, Difficulty::Hard);
        assert_eq!(config.orders.len(), 4);
        assert_eq!(
            config.orders[1].command,
            Command::OpenOption {
                ticker: "SOLR".to_string(),
                option_type: OptionType::Put,
                contracts: 2,
                strike: 30.0,
                expires_in: 8,
            }
        );
        assert_eq!(config.orders_at(6).count(), 2);
    }

    #[test]
    fn test_rejects_order_after_run_end() {
        let yaml = r#"
simulation:
  total_hours: 8
orders:
  - { hour: 8, action: sell, ticker: GLCR, shares: 1 }
"#;
        assert!(matches!(
            Config::from_yaml_str(yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::default_run();
        config.orders.push(ScheduledOrder {
            hour: 3,
            command: Command::Buy {
                ticker: "EDU".to_string(),
                shares: 4,
            },
        });
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_reload() {
        let mut config = Config::default_run();
        config.simulation.seed = 77;
        config.simulation.difficulty = Difficulty::Hard;
        config.orders.push(ScheduledOrder {
            hour: 5,
            command: Command::Watch {
                ticker: "BIO".to_string(),
            },
        });

        let path = std::env::temp_dir().join(format!("trading-sim-config-{}.yaml", std::process::id()));
        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.unwrap(), config);
    }

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("brutal".parse::<Difficulty>().is_err());
        assert!((Difficulty::Medium.negative_ratio() - 0.6).abs() < 1e-12);
    }
}
