use config::{Config, ConfigError, Environment, File, FileFormat};
use selftest_engine::ProbeSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("../default_config.yaml");
const SYSTEM_CONFIG: &str = "/etc/pi-selftest/config.yaml";
const LOCAL_CONFIG: &str = "selftest.yaml";
const ENV_PREFIX: &str = "SELFTEST";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub probes: ProbeSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct OutputConfig {
    /// Report format used when `--format` is not given.
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub verbose: bool,
    /// Emit log lines as JSON objects.
    #[serde(default)]
    pub json: bool,
    pub format: LoggingFormatConfig,
    pub levels: LoggingLevelsConfig,
    #[serde(default)]
    pub redaction: RedactionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingFormatConfig {
    pub show_time: bool,
    pub location: LoggingLocationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingLocationConfig {
    pub show_file: bool,
    pub show_line: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingLevelsConfig {
    pub debug: bool,
    pub info: bool,
    pub warning: bool,
    pub error: bool,
    pub critical: bool,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct RedactionConfig {
    #[serde(default = "true_default")]
    pub enabled: bool,
    #[serde(default = "true_default")]
    pub mask_mac_addresses: bool,
    #[serde(default)]
    pub patterns: Vec<RedactionPattern>,
}

fn true_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedactionPattern {
    pub name: String,
    pub regex: String,
    pub placeholder: String,
}

/// Layered load: built-in defaults, system file, local file, the file given
/// on the command line (which must exist), then `SELFTEST__*` variables,
/// e.g. `SELFTEST__PROBES__PING_HOST=1.1.1.1`.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Yaml))
        .add_source(File::new(SYSTEM_CONFIG, FileFormat::Yaml).required(false))
        .add_source(File::new(LOCAL_CONFIG, FileFormat::Yaml).required(false));

    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
    }

    builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}
