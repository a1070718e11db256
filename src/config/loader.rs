//! # Configuration Loading
//!
//! Reads the base configuration file and merges drop-in fragments over it.
//! Drop-ins are applied in lexicographic filename order; tables merge
//! key-wise while scalars and arrays replace wholesale.

use std::path::{Path, PathBuf};

use crate::config::StaticConfig;
use crate::errors::{KubegateError, Result};

/// Default drop-in directory name, probed as a sibling of the base file when
/// no explicit directory is given.
pub const DEFAULT_DROP_IN_DIR: &str = "conf.d";

/// Load the configuration from a base file and an optional drop-in
/// directory.
///
/// Either argument may be absent: with only a drop-in directory the
/// accumulator starts from an empty document; with only a base file the
/// default sibling `conf.d` directory is probed. Unknown keys in any file
/// are rejected.
pub fn load(path: Option<&Path>, drop_in_dir: Option<&Path>) -> Result<StaticConfig> {
    let mut accumulator = match path {
        Some(path) => parse_file(path)?,
        None => toml::Value::Table(toml::map::Map::new()),
    };

    let drop_in_dir: Option<PathBuf> = match (drop_in_dir, path) {
        (Some(dir), _) => Some(dir.to_path_buf()),
        (None, Some(path)) => {
            let sibling = path.parent().unwrap_or_else(|| Path::new(".")).join(DEFAULT_DROP_IN_DIR);
            sibling.is_dir().then_some(sibling)
        }
        (None, None) => None,
    };

    if let Some(dir) = drop_in_dir {
        for file in sorted_drop_ins(&dir)? {
            let overlay = parse_file(&file)?;
            deep_merge(&mut accumulator, overlay);
        }
    }

    let config = StaticConfig::deserialize_strict(accumulator)?;
    Ok(config)
}

impl StaticConfig {
    /// Deserialize from an already-merged TOML document, rejecting unknown
    /// keys.
    fn deserialize_strict(value: toml::Value) -> Result<Self> {
        use serde::Deserialize;
        StaticConfig::deserialize(value).map_err(|e| {
            KubegateError::config_with_source("Configuration parsing failed", Box::new(e))
        })
    }
}

fn parse_file(path: &Path) -> Result<toml::Value> {
    let contents = std::fs::read_to_string(path).map_err(|e| KubegateError::Io {
        source: e,
        context: format!("failed to read configuration file {}", path.display()),
    })?;
    let value: toml::Value = toml::from_str(&contents).map_err(|e| {
        KubegateError::config_with_source(
            format!("failed to parse configuration file {}", path.display()),
            Box::new(e),
        )
    })?;
    Ok(value)
}

/// Regular files in the drop-in directory, sorted by filename.
fn sorted_drop_ins(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| KubegateError::Io {
        source: e,
        context: format!("failed to read drop-in directory {}", dir.display()),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Merge `overlay` into `base`. Tables merge key-wise; any other value
/// (scalars, arrays) replaces the base value wholesale.
fn deep_merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_table.insert(key, overlay_value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
