use crate::codegen::{GeneratorConfig, ModelItem};
use crate::connection_string::{CredentialMode, Credentials};
use crate::core::{DataManagerError, Result};
use crate::writer::{CommitMode, WriteOptions, DEFAULT_CHUNK_SIZE};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub connection: Option<ConnectionConfig>,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub codegen: CodegenConfig,
    #[serde(default)]
    pub models: Vec<ModelItem>,
}

/// Credentials for the default connection.
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default)]
    pub mode: CredentialMode,
}

/// Bulk-write defaults.
#[derive(Debug, Deserialize)]
pub struct WriterConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub commit: CommitMode,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            commit: CommitMode::default(),
        }
    }
}

impl WriterConfig {
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions::new()
            .chunk_size(self.chunk_size)
            .commit_mode(self.commit)
    }
}

/// Model generator settings.
#[derive(Debug, Deserialize)]
pub struct CodegenConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub generator: GeneratorConfig,
    pub export_path: Option<PathBuf>,
    pub orm_path: Option<PathBuf>,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        CodegenConfig {
            enabled: default_enabled(),
            generator: GeneratorConfig::default(),
            export_path: None,
            orm_path: None,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_enabled() -> bool {
    true
}

impl Config {
    /// Parses and validates configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/data-manager/config.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("data-manager").join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.writer.chunk_size == 0 {
            return Err(DataManagerError::Config(
                "writer.chunk_size must be a positive integer".to_string(),
            ));
        }
        for item in &self.models {
            if item.database.trim().is_empty() {
                return Err(DataManagerError::Config(
                    "every [[models]] entry needs a database".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// use data_manager::config::load_config;
///
/// let config = load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}
