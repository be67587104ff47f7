//! Run configuration loading and typed config structures.
//!
//! A run is configured by one YAML file (conventionally `ciam-config.yaml`)
//! that names the scenario documents to load, the diagnostic toggles, the
//! output file names, solver limits, the optional climate program, and
//! logging. Every field has a default, so an empty file is a valid
//! configuration.
//!
//! The resolved [`RunConfig`] is an ordinary value handed to the engine and
//! the run driver; nothing reads configuration from global state.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable that overrides `scenario.file`.
pub const SCENARIO_FILE_ENV: &str = "CIAM_SCENARIO_FILE";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level run configuration.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Scenario documents to load.
    #[serde(default)]
    pub scenario: ScenarioFilesConfig,

    /// Run calibration market setup before the first period.
    #[serde(default)]
    pub calibration_active: bool,

    /// Write the sector dependency report after period 0.
    #[serde(default)]
    pub print_sector_dependencies: bool,

    /// Write a dependency graph for every solved period.
    #[serde(default)]
    pub print_dependency_graphs: bool,

    /// Output file names.
    #[serde(default)]
    pub files: FilesConfig,

    /// Equilibrium solver limits.
    #[serde(default)]
    pub solver: SolverConfig,

    /// External climate model.
    #[serde(default)]
    pub climate: ClimateConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RunConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `CIAM_SCENARIO_FILE` overrides `scenario.file` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment overrides (`CIAM_SCENARIO_FILE`) in place.
    pub fn apply_env_overrides(&mut self) {
        self.scenario.apply_env_overrides();
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }
}

/// Which scenario documents make up the run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioFilesConfig {
    /// Base scenario document.
    #[serde(default = "default_scenario_file")]
    pub file: PathBuf,

    /// Add-on documents applied in order after the base.
    #[serde(default)]
    pub add_ons: Vec<PathBuf>,
}

impl Default for ScenarioFilesConfig {
    fn default() -> Self {
        Self {
            file: default_scenario_file(),
            add_ons: Vec::new(),
        }
    }
}

impl ScenarioFilesConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(file) = std::env::var(SCENARIO_FILE_ENV) {
            self.file = PathBuf::from(file);
        }
    }
}

/// Output file names, relative to `output_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilesConfig {
    /// Directory every output file is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Debug trace (one block per period).
    #[serde(default = "default_xml_debug_file_name")]
    pub xml_debug_file_name: String,

    /// Serialized scenario written after the run.
    #[serde(default = "default_xml_output_file_name")]
    pub xml_output_file_name: String,

    /// Supply/demand CSV trace.
    #[serde(default = "default_sd_curve_file_name")]
    pub sd_curve_file_name: String,

    /// Sector dependency report.
    #[serde(default = "default_sector_dependencies_file_name")]
    pub sector_dependencies_file_name: String,

    /// Base name of the per-period graph files (`<base>_<period>.dot`).
    #[serde(default = "default_dependency_graph_name")]
    pub dependency_graph_name: String,

    /// Climate model input file.
    #[serde(default = "default_climate_data_file_name")]
    pub climate_data_file_name: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            xml_debug_file_name: default_xml_debug_file_name(),
            xml_output_file_name: default_xml_output_file_name(),
            sd_curve_file_name: default_sd_curve_file_name(),
            sector_dependencies_file_name: default_sector_dependencies_file_name(),
            dependency_graph_name: default_dependency_graph_name(),
            climate_data_file_name: default_climate_data_file_name(),
        }
    }
}

/// Equilibrium solver limits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SolverConfig {
    /// Largest relative excess demand accepted as cleared.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Worst relative excess at which bisection hands over to
    /// Newton-Raphson.
    #[serde(default = "default_newton_threshold")]
    pub newton_threshold: f64,

    /// Solver steps per period. Bisection may use up to half; Newton-Raphson
    /// gets the rest.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Bracket widening steps per period.
    #[serde(default = "default_max_bracket_steps")]
    pub max_bracket_steps: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            newton_threshold: default_newton_threshold(),
            max_iterations: default_max_iterations(),
            max_bracket_steps: default_max_bracket_steps(),
        }
    }
}

/// External climate model invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClimateConfig {
    /// Program and arguments; the data file path is appended. Empty means
    /// the climate model is not run.
    #[serde(default)]
    pub command: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_scenario_file() -> PathBuf {
    PathBuf::from("scenario.yaml")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_xml_debug_file_name() -> String {
    "debug.xml".to_owned()
}

fn default_xml_output_file_name() -> String {
    "output.xml".to_owned()
}

fn default_sd_curve_file_name() -> String {
    "sdcurve.csv".to_owned()
}

fn default_sector_dependencies_file_name() -> String {
    "sector_dependencies.csv".to_owned()
}

fn default_dependency_graph_name() -> String {
    "graph".to_owned()
}

fn default_climate_data_file_name() -> String {
    "gas.emk".to_owned()
}

const fn default_tolerance() -> f64 {
    0.001
}

const fn default_newton_threshold() -> f64 {
    0.05
}

const fn default_max_iterations() -> u32 {
    100
}

const fn default_max_bracket_steps() -> u32 {
    30
}

fn default_log_level() -> String {
    "info".to_owned()
}
