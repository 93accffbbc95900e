//! Feeder configuration
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/lattice/feeder.yaml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederConfig {
    /// Where payload sources come from
    pub source: SourceConfig,
    /// Bulk-link pump settings
    pub link: LinkConfig,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            link: LinkConfig::default(),
        }
    }
}

/// Source selection section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory scanned for source recordings
    /// Default: ~/Music/lattice-sources
    pub dir: PathBuf,
    /// File extensions the scan picks up
    pub extensions: Vec<String>,
    /// Built-in signal used when the scan comes up empty
    /// ("sweep", "tone", "constant", "ramp", "pattern")
    pub generator: String,
    /// Length of generated payloads, in seconds of source time
    pub generate_seconds: u32,
    /// Seed for the channel-to-source draw; same seed, same payload
    pub assign_seed: u64,
    /// Build the 8x-oversampled one-bit layout instead of PCM
    pub onebit: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Music")
            .join("lattice-sources");

        Self {
            dir,
            extensions: vec!["wav".into(), "pcm16".into(), "dsd64".into()],
            generator: "sweep".into(),
            generate_seconds: 60,
            assign_seed: 1,
            onebit: false,
        }
    }
}

/// Bulk-link pump section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Bytes per bulk transfer; must divide the assembled payload
    pub chunk_size: usize,
    /// Transfer slots in the carousel; one stays free for refilling
    pub transfers: usize,
    /// Completed chunks between throughput log lines (0 disables)
    pub log_every: u64,
    /// USB vendor id of the hub bridge
    pub vendor_id: u16,
    /// USB product id of the hub bridge
    pub product_id: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024,
            transfers: 3,
            log_every: 256,
            vendor_id: 0x0403,
            product_id: 0x6014,
        }
    }
}

/// Get the default config file path
///
/// Returns: ~/.config/lattice/feeder.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("lattice")
        .join("feeder.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config(path: &Path) -> FeederConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return FeederConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<FeederConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_config: Loaded config - source dir: {:?}, generator: {}, {} transfers",
                    config.source.dir,
                    config.source.generator,
                    config.link.transfers
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                FeederConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "load_config: Failed to read config file: {}, using defaults",
                e
            );
            FeederConfig::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &FeederConfig, path: &Path) -> Result<()> {
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Config saved successfully");
    Ok(())
}
