// Configuration loading and parsing (config/pipeline.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::stats::rank::RankScale;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// pipeline.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire pipeline.toml file.
#[derive(Debug, Clone, Deserialize)]
struct PipelineFile {
    database: DatabaseSection,
    data_paths: DataPathsSection,
    ranking: RankingSection,
    upload: UploadSection,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DataPathsSection {
    csv_dir: String,
    xba_grid: String,
    #[serde(default)]
    xslg_model: Option<String>,
    #[serde(default)]
    xwoba_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RankingSection {
    /// Top of the percentile band: 100 or 99.
    scale: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct UploadSection {
    batch_size: usize,
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub csv_dir: String,
    pub xba_grid: String,
    pub xslg_model: Option<String>,
    pub xwoba_model: Option<String>,
    pub rank_scale: RankScale,
    pub batch_size: usize,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/pipeline.toml` relative to
/// the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy
/// defaults. Prefer `load_config()` which handles default initialization.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("pipeline.toml");
    let text = read_file(&path)?;
    let file: PipelineFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let rank_scale = match file.ranking.scale {
        100 => RankScale::OneTo100,
        99 => RankScale::OneTo99,
        other => {
            return Err(ConfigError::ValidationError {
                field: "ranking.scale".into(),
                message: format!("must be 100 or 99, got {other}"),
            })
        }
    };

    let config = Config {
        db_path: file.database.path,
        csv_dir: file.data_paths.csv_dir,
        xba_grid: file.data_paths.xba_grid,
        xslg_model: file.data_paths.xslg_model.filter(|s| !s.is_empty()),
        xwoba_model: file.data_paths.xwoba_model.filter(|s| !s.is_empty()),
        rank_scale,
        batch_size: file.upload.batch_size,
    };

    validate(&config)?;
    Ok(config)
}

/// Ensure the config file exists by copying it from `defaults/` when missing.
/// Returns the list of files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();
    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // File already exists in config/, keep the user's copy.
            }
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working
/// directory, copying defaults first when needed.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.batch_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "upload.batch_size".into(),
            message: "must be greater than 0".into(),
        });
    }
    if config.db_path.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }
    if config.csv_dir.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "data_paths.csv_dir".into(),
            message: "must not be empty".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
