//! Configuration structs with sensible defaults and RON persistence.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Planet shape and density settings.
    pub planet: PlanetConfig,
    /// Worker pool settings for background generation.
    pub generation: GenerationConfig,
    /// Scene prop placement settings.
    pub props: PropConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Planet configuration: one "world type".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanetConfig {
    /// Display name of the world.
    pub world_name: String,
    /// World-space edge length of the whole terrain cube.
    pub terrain_size: f32,
    /// Number of chunks along each axis.
    pub num_chunks_per_axis: u32,
    /// Density samples along each chunk edge (chunks share boundary samples).
    pub points_per_axis: u32,
    /// Surface threshold of the density field.
    pub iso_level: f32,
    /// Overall scale of the surface noise.
    pub noise_scale: f32,
    /// Scale of the surface noise height.
    pub noise_height_multiplier: f32,
    /// Keep every triangle's vertices distinct (faceted look).
    pub flat_shading: bool,
    /// Seed for the density noise.
    pub seed: u64,
    /// Number of noise octaves composited into the surface.
    pub octaves: u32,
}

/// Background generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Worker thread count (0 = derive from CPU count).
    pub worker_threads: usize,
    /// Maximum number of queued planet tasks.
    pub queue_capacity: usize,
}

/// Scene prop placement configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PropConfig {
    /// Number of props to place on a finished planet.
    pub count: u32,
    /// Steepest surface (degrees from local up) a prop may stand on.
    pub max_slope_degrees: f32,
    /// Number of distinct placeable kinds.
    pub kinds: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            world_name: "Echo".to_string(),
            terrain_size: 200.0,
            num_chunks_per_axis: 4,
            points_per_axis: 17,
            iso_level: 0.5,
            noise_scale: 1.0,
            noise_height_multiplier: 1.0,
            flat_shading: false,
            seed: 0,
            octaves: 4,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            queue_capacity: 4,
        }
    }
}

impl Default for PropConfig {
    fn default() -> Self {
        Self {
            count: 32,
            max_slope_degrees: 35.0,
            kinds: 3,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Load / Save / Reload ---

/// Where [`Config::load_or_create_with_origin`] got its config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Read from an existing file.
    Loaded(PathBuf),
    /// No file existed; defaults were written here.
    Created(PathBuf),
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded(path) => write!(f, "Loaded config from {}", path.display()),
            Self::Created(path) => write!(f, "Created default config at {}", path.display()),
        }
    }
}

impl Config {
    /// Platform config directory for Nebula, e.g. `~/.config/nebula` on Linux.
    ///
    /// Falls back to the working directory when the platform has none.
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("nebula"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let (config, origin) = Self::load_or_create_with_origin(config_dir)?;
        log::info!("{origin}");
        Ok(config)
    }

    /// Like [`Config::load_or_create`], but reports where the config came
    /// from instead of logging it. For callers that set up logging from the
    /// loaded config.
    pub fn load_or_create_with_origin(
        config_dir: &Path,
    ) -> Result<(Self, ConfigOrigin), ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(|source| {
                ConfigError::ReadError {
                    path: config_path.clone(),
                    source,
                }
            })?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            Ok((config, ConfigOrigin::Loaded(config_path)))
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            Ok((config, ConfigOrigin::Created(config_path)))
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::WriteError {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::WriteError {
            path: config_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents =
            std::fs::read_to_string(&config_path).map_err(|source| ConfigError::ReadError {
                path: config_path.clone(),
                source,
            })?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
