//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treemerge/treemerge.toml`
//! 3. Local config: `<dir>/.treemerge.toml` (working directory by default)
//! 4. Explicit config file passed with `--config`
//! 5. Environment variables: `TREEMERGE_*` prefix

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::{ApplicationError, MatchOptions};
use crate::domain::{CompareOptions, EntityKind, IndexStrategy, DEFAULT_TOLERANCE};

/// Matching engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    /// Per-axis tolerance for node equality
    pub tolerance: f64,
    /// Worker threads (0 = one per available core)
    pub threads: usize,
    /// Node lookup strategy
    pub index: IndexStrategy,
    /// Entity kinds that take part in matching
    pub accepted_kinds: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            threads: 0,
            index: IndexStrategy::default(),
            accepted_kinds: EntityKind::DEFAULT_ACCEPTED
                .iter()
                .map(|k| k.as_str().to_string())
                .collect(),
        }
    }
}

/// Terminal output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Print per-node tag differences below each matched row
    pub show_tags: bool,
    /// Colour matched rows
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            show_tags: false,
            color: true,
        }
    }
}

/// Raw matching config for intermediate parsing (Option to detect "not specified").
///
/// Used during layered config merging to distinguish between:
/// - `None` → field not specified, inherit from base
/// - `Some([])` → explicit empty array
/// - `Some([...])` → explicit values to merge
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawMatchingConfig {
    pub tolerance: Option<f64>,
    pub threads: Option<usize>,
    pub index: Option<IndexStrategy>,
    pub accepted_kinds: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawOutputConfig {
    pub show_tags: Option<bool>,
    pub color: Option<bool>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub matching: RawMatchingConfig,
    pub output: RawOutputConfig,
}

impl MatchingConfig {
    /// Merge arrays with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated
    ///
    /// # Examples
    /// ```ignore
    /// merge_array(&["a", "b"], &["c"])       // → ["a", "b", "c"]
    /// merge_array(&["a", "b"], &["!a", "c"]) // → ["b", "c"]
    /// ```
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: HashSet<String> = base.iter().cloned().collect();

        for item in overlay {
            if let Some(negated) = item.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(item.clone());
            }
        }

        let mut vec: Vec<String> = result.into_iter().collect();
        vec.sort();
        vec
    }

    /// Overlay wins for scalars; arrays union with negation.
    pub fn merge(&self, overlay: &RawMatchingConfig) -> Self {
        Self {
            tolerance: overlay.tolerance.unwrap_or(self.tolerance),
            threads: overlay.threads.unwrap_or(self.threads),
            index: overlay.index.unwrap_or(self.index),
            accepted_kinds: overlay
                .accepted_kinds
                .as_ref()
                .map(|o| Self::merge_array(&self.accepted_kinds, o))
                .unwrap_or_else(|| self.accepted_kinds.clone()),
        }
    }

    /// Overlay wins for scalars; arrays REPLACE the base.
    pub fn apply_global(&self, global: &RawMatchingConfig) -> Self {
        Self {
            tolerance: global.tolerance.unwrap_or(self.tolerance),
            threads: global.threads.unwrap_or(self.threads),
            index: global.index.unwrap_or(self.index),
            accepted_kinds: global
                .accepted_kinds
                .clone()
                .unwrap_or_else(|| self.accepted_kinds.clone()),
        }
    }

    /// Parse `accepted_kinds` into kinds.
    pub fn accepted(&self) -> Result<BTreeSet<EntityKind>, ApplicationError> {
        self.accepted_kinds
            .iter()
            .map(|k| {
                k.parse::<EntityKind>().map_err(|e| ApplicationError::Config {
                    message: format!("matching.accepted_kinds: {e}"),
                })
            })
            .collect()
    }
}

impl OutputConfig {
    fn merge(&self, overlay: &RawOutputConfig) -> Self {
        Self {
            show_tags: overlay.show_tags.unwrap_or(self.show_tags),
            color: overlay.color.unwrap_or(self.color),
        }
    }
}

/// Unified configuration for treemerge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub matching: MatchingConfig,
    pub output: OutputConfig,
}

/// Get the XDG config directory for treemerge.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treemerge").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treemerge.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".treemerge.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            matching: self.matching.merge(&overlay.matching),
            output: self.output.merge(&overlay.output),
        }
    }

    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            matching: self.matching.apply_global(&global.matching),
            output: self.output.merge(&global.output),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Directory searched for `.treemerge.toml`
    ///
    /// # Array Merge Semantics
    /// - Defaults → Global: REPLACE (global defines the real baseline)
    /// - Global → Local: UNION with negation support
    /// - Any → Env vars: REPLACE (explicit user override)
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_with(local_dir, None)
    }

    /// Like [`Settings::load`], with an explicit config file merged after the local one.
    ///
    /// The explicit file must exist.
    pub fn load_with(local_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(path) = explicit {
            let raw = load_raw_settings(path)?;
            current = current.merge_with(&raw);
        }

        Self::apply_env_overrides(current)
    }

    /// Apply TREEMERGE_* environment variables as explicit overrides.
    ///
    /// e.g. `TREEMERGE_MATCHING__THREADS=4`, `TREEMERGE_MATCHING__ACCEPTED_KINDS=treeline,ball`
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("TREEMERGE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("matching.accepted_kinds")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_float("matching.tolerance") {
            settings.matching.tolerance = val;
        }
        if let Ok(val) = config.get::<usize>("matching.threads") {
            settings.matching.threads = val;
        }
        if let Ok(val) = config.get_string("matching.index") {
            settings.matching.index = val.parse().map_err(|e| ApplicationError::Config {
                message: format!("matching.index: {e}"),
            })?;
        }
        if let Ok(val) = config.get::<Vec<String>>("matching.accepted_kinds") {
            settings.matching.accepted_kinds = val;
        }
        if let Ok(val) = config.get_bool("output.show_tags") {
            settings.output.show_tags = val;
        }
        if let Ok(val) = config.get_bool("output.color") {
            settings.output.color = val;
        }

        Ok(settings)
    }

    /// Engine options; rejects a non-positive or non-finite tolerance and unknown kinds.
    pub fn match_options(&self) -> Result<MatchOptions, ApplicationError> {
        let tolerance = self.matching.tolerance;
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(ApplicationError::Config {
                message: format!("matching.tolerance must be a positive number, got {tolerance}"),
            });
        }
        Ok(MatchOptions {
            compare: CompareOptions {
                tolerance,
                index: self.matching.index,
            },
            threads: self.matching.threads,
            accepted: self.matching.accepted()?,
        })
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# treemerge configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/treemerge/treemerge.toml  (defines your baseline)
#   Local:  ./.treemerge.toml                   (per working directory)
#   File:   --config <file>
#   Env:    TREEMERGE_* environment variables, e.g. TREEMERGE_MATCHING__THREADS=4
#
# Array Merge Semantics:
#   Global config REPLACES compiled defaults.
#   Local config UNIONS with global.
#   Use "!item" in local config to REMOVE an inherited item:
#     accepted_kinds = ["polyline", "!connector"]

[matching]
# Per-axis tolerance: two nodes are the same when every world coordinate
# differs by strictly less than this
# tolerance = 0.01

# Worker threads, 0 = one per available core
# threads = 0

# Node lookup: "grid" (spatial hash) or "linear" (scan)
# index = "grid"

# treeline, areatree, connector, polyline, ball
# accepted_kinds = ["treeline", "areatree", "connector"]

[output]
# Print per-node tag differences below each matched row
# show_tags = false

# color = true
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
