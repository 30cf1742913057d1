use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::eval::Strategy;

/// Defaults match the preview plane the editor renders (64×64 vertices).
pub const DEFAULT_SIZE: u32 = 64;
pub const DEFAULT_SEED: i32 = 1337;
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Settings for the preview service, resolved from `RawConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewConfig {
    pub width: u32,
    pub height: u32,
    pub seed: i32,
    pub cache_capacity: usize,
    pub strategy: Strategy,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            seed: DEFAULT_SEED,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            strategy: Strategy::Scheduled,
        }
    }
}

impl PreviewConfig {
    /// Load from a TOML file. Never fails: a missing file, an unreadable
    /// file and a malformed file all fall back to defaults.
    pub fn load(path: &Path) -> Self {
        Self::from_raw(&Self::read_raw_config(path))
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("terrain-preview.toml")
    }

    fn read_raw_config(path: &Path) -> RawConfig {
        match fs::read_to_string(path) {
            Ok(data) => {
                info!("found config at {}", path.display());
                match toml::from_str(&data) {
                    Ok(raw) => raw,
                    Err(err) => {
                        error!("failed to parse config: {}", err);
                        RawConfig::default()
                    }
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                info!("{} not found, using defaults", path.display());
                RawConfig::default()
            }
            Err(err) => {
                error!("failed to read config: {}: {}", path.display(), err);
                RawConfig::default()
            }
        }
    }

    pub fn from_raw(raw: &RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            width: positive(raw.width, defaults.width, "width"),
            height: positive(raw.height, defaults.height, "height"),
            seed: raw.seed.unwrap_or(defaults.seed),
            cache_capacity: positive(raw.cache_capacity, defaults.cache_capacity, "cache_capacity"),
            strategy: match raw.parallel_nodes {
                Some(false) => Strategy::Recursive,
                Some(true) | None => defaults.strategy,
            },
        }
    }
}

fn positive<T>(value: Option<T>, default: T, name: &str) -> T
where
    T: Copy + PartialEq + Default + std::fmt::Display,
{
    match value {
        Some(v) if v == T::default() => {
            warn!("{} must be positive, using default {}", name, default);
            default
        }
        Some(v) => v,
        None => default,
    }
}

/// Data as parsed directly out of the config file.
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub seed: Option<i32>,
    pub cache_capacity: Option<usize>,
    /// Evaluate independent subtrees concurrently (scheduled path).
    pub parallel_nodes: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PreviewConfig::load(&dir.path().join("absent.toml"));
        assert_eq!(config, PreviewConfig::default());
    }

    #[test]
    fn reads_all_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "width = 128\nheight = 32\nseed = -5\ncache_capacity = 4\nparallel_nodes = false"
        )
        .unwrap();
        let config = PreviewConfig::load(file.path());
        assert_eq!(config.width, 128);
        assert_eq!(config.height, 32);
        assert_eq!(config.seed, -5);
        assert_eq!(config.cache_capacity, 4);
        assert_eq!(config.strategy, Strategy::Recursive);
    }

    #[test]
    fn malformed_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "width = \"wide\"").unwrap();
        assert_eq!(PreviewConfig::load(file.path()), PreviewConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: std::result::Result<RawConfig, _> = toml::from_str("colour = 3");
        assert!(parsed.is_err());
    }

    #[test]
    fn zero_values_replaced_by_defaults() {
        let raw = RawConfig {
            width: Some(0),
            cache_capacity: Some(0),
            ..RawConfig::default()
        };
        let config = PreviewConfig::from_raw(&raw);
        assert_eq!(config.width, DEFAULT_SIZE);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }
}
