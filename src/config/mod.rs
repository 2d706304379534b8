//! Configuration management for `beads_sync`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides
//! 2. Environment variables (`BD_*`)
//! 3. Project config (.beads/config.yaml)
//! 4. User config (~/.config/bd/config.yaml)
//! 5. DB config table
//! 6. Defaults

use crate::error::{BeadsError, Result};
use crate::git::cli::DEFAULT_TIMEOUT;
use crate::git::CancelToken;
use crate::storage::SqliteStorage;
use crate::sync::engine::{
    DEFAULT_BACKOFF_BASE, DEFAULT_PUSH_RETRIES, DEFAULT_REMOTE, DEFAULT_SYNC_BRANCH, SyncOptions,
};
use crate::sync::ConflictStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default database filename used when metadata is missing.
pub const DEFAULT_DB_FILENAME: &str = "beads.db";
/// Default JSONL filename used when metadata is missing.
pub const DEFAULT_JSONL_FILENAME: &str = "issues.jsonl";
pub const METADATA_FILENAME: &str = "metadata.json";
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Startup metadata describing DB + JSONL paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub database: String,
    pub jsonl_export: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            database: DEFAULT_DB_FILENAME.to_string(),
            jsonl_export: DEFAULT_JSONL_FILENAME.to_string(),
            backend: None,
        }
    }
}

impl Metadata {
    /// Load metadata.json from the beads directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(beads_dir: &Path) -> Result<Self> {
        let path = beads_dir.join(METADATA_FILENAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        let mut metadata: Self = serde_json::from_str(&contents)?;

        if metadata.database.trim().is_empty() {
            metadata.database = DEFAULT_DB_FILENAME.to_string();
        }
        if metadata.jsonl_export.trim().is_empty() {
            metadata.jsonl_export = DEFAULT_JSONL_FILENAME.to_string();
        }

        Ok(metadata)
    }

    /// Write metadata.json into the beads directory.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, beads_dir: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        crate::util::write_atomic(&beads_dir.join(METADATA_FILENAME), json.as_bytes())
    }
}

/// Resolved paths for this workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub beads_dir: PathBuf,
    pub db_path: PathBuf,
    pub jsonl_path: PathBuf,
    pub metadata: Metadata,
}

impl ConfigPaths {
    /// Resolve database + JSONL paths using metadata and environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if metadata cannot be read.
    pub fn resolve(beads_dir: &Path, db_override: Option<&PathBuf>) -> Result<Self> {
        let metadata = Metadata::load(beads_dir)?;
        let db_path = resolve_db_path(beads_dir, &metadata, db_override);
        let jsonl_path = resolve_jsonl_path(beads_dir, &metadata);

        Ok(Self {
            beads_dir: beads_dir.to_path_buf(),
            db_path,
            jsonl_path,
            metadata,
        })
    }

    /// JSONL file name relative to the beads directory.
    ///
    /// This is where the record set lives on the sync branch too.
    #[must_use]
    pub fn jsonl_name(&self) -> String {
        self.jsonl_path
            .strip_prefix(&self.beads_dir)
            .map_or_else(
                |_| self.metadata.jsonl_export.clone(),
                |rel| rel.to_string_lossy().into_owned(),
            )
    }
}

/// Discover the active `.beads` directory.
///
/// Honors `BEADS_DIR` when set, otherwise walks up from `start` (or CWD).
///
/// # Errors
///
/// Returns an error if no beads directory is found or the CWD cannot be read.
pub fn discover_beads_dir(start: Option<&Path>) -> Result<PathBuf> {
    discover_beads_dir_with_env(start, None)
}

fn discover_beads_dir_with_env(
    start: Option<&Path>,
    env_override: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = env_override {
        if path.is_dir() {
            return Ok(path.to_path_buf());
        }
    } else if let Ok(value) = env::var("BEADS_DIR") {
        if !value.trim().is_empty() {
            let path = PathBuf::from(value);
            if path.is_dir() {
                return Ok(path);
            }
        }
    }

    let mut current = match start {
        Some(path) => path.to_path_buf(),
        None => env::current_dir()?,
    };

    loop {
        let candidate = current.join(".beads");
        if candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            break;
        }
    }

    Err(BeadsError::NotInitialized)
}

/// Open storage using resolved config paths, returning the storage and paths used.
///
/// # Errors
///
/// Returns an error if metadata cannot be read or the database cannot be opened.
pub fn open_storage(
    beads_dir: &Path,
    db_override: Option<&PathBuf>,
    lock_timeout: Option<u64>,
) -> Result<(SqliteStorage, ConfigPaths)> {
    let startup_layer = load_startup_config(beads_dir)?;
    let resolved_db_override = db_override
        .cloned()
        .or_else(|| db_override_from_layer(&startup_layer, beads_dir));
    let resolved_lock_timeout = lock_timeout
        .or_else(|| lock_timeout_from_layer(&startup_layer))
        .or(Some(30000));
    let paths = ConfigPaths::resolve(beads_dir, resolved_db_override.as_ref())?;
    let storage = SqliteStorage::open_with_timeout(&paths.db_path, resolved_lock_timeout)?;
    Ok((storage, paths))
}

fn resolve_db_path(
    beads_dir: &Path,
    metadata: &Metadata,
    db_override: Option<&PathBuf>,
) -> PathBuf {
    if let Some(override_path) = db_override {
        return override_path.clone();
    }

    let candidate = PathBuf::from(&metadata.database);
    if candidate.is_absolute() {
        candidate
    } else {
        beads_dir.join(candidate)
    }
}

fn resolve_jsonl_path(beads_dir: &Path, metadata: &Metadata) -> PathBuf {
    if let Ok(env_path) = env::var("BEADS_JSONL") {
        if !env_path.trim().is_empty() {
            return PathBuf::from(env_path);
        }
    }

    let candidate = PathBuf::from(&metadata.jsonl_export);
    if candidate.is_absolute() {
        candidate
    } else {
        beads_dir.join(candidate)
    }
}

/// A configuration layer split into startup-only and runtime (DB) keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub startup: HashMap<String, String>,
    pub runtime: HashMap<String, String>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.startup {
            self.startup.insert(key.clone(), value.clone());
        }
        for (key, value) in &other.runtime {
            self.runtime.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        Ok(layer_from_yaml_value(&value))
    }

    /// Build a layer from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut layer = Self::default();

        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix("BD_") {
                let normalized = stripped.to_lowercase();
                for variant in env_key_variants(&normalized) {
                    insert_key_value(&mut layer, &variant, value.clone());
                }
            }
        }

        layer
    }

    /// Build a layer from DB config table values.
    ///
    /// # Errors
    ///
    /// Returns an error if config table lookup fails.
    pub fn from_db(storage: &SqliteStorage) -> Result<Self> {
        let mut layer = Self::default();
        let map = storage.get_all_config()?;
        for (key, value) in map {
            if is_startup_key(&key) {
                continue;
            }
            layer.runtime.insert(key, value);
        }
        Ok(layer)
    }
}

/// CLI overrides for config loading (optional).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub db: Option<PathBuf>,
    pub json: Option<bool>,
    pub lock_timeout: Option<u64>,
    pub branch: Option<String>,
    pub remote: Option<String>,
    pub strategy: Option<String>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();

        if let Some(path) = &self.db {
            insert_key_value(&mut layer, "db", path.to_string_lossy().to_string());
        }
        if let Some(json) = self.json {
            insert_key_value(&mut layer, "json", json.to_string());
        }
        if let Some(lock_timeout) = self.lock_timeout {
            insert_key_value(&mut layer, "lock-timeout", lock_timeout.to_string());
        }
        if let Some(branch) = &self.branch {
            insert_key_value(&mut layer, "sync.branch", branch.clone());
        }
        if let Some(remote) = &self.remote {
            insert_key_value(&mut layer, "sync.remote", remote.clone());
        }
        if let Some(strategy) = &self.strategy {
            insert_key_value(&mut layer, "sync.conflict-strategy", strategy.clone());
        }

        layer
    }
}

/// Load project config (.beads/config.yaml).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(beads_dir: &Path) -> Result<ConfigLayer> {
    ConfigLayer::from_yaml(&beads_dir.join(CONFIG_FILENAME))
}

/// Load user config (~/.config/bd/config.yaml).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ConfigLayer> {
    let Ok(home) = env::var("HOME") else {
        return Ok(ConfigLayer::default());
    };
    let path = Path::new(&home)
        .join(".config")
        .join("bd")
        .join(CONFIG_FILENAME);
    ConfigLayer::from_yaml(&path)
}

/// Load startup-only configuration layers (YAML + env, no DB).
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed.
pub fn load_startup_config(beads_dir: &Path) -> Result<ConfigLayer> {
    let user = load_user_config()?;
    let project = load_project_config(beads_dir)?;
    let env_layer = ConfigLayer::from_env();

    Ok(ConfigLayer::merge_layers(&[user, project, env_layer]))
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    layer
        .runtime
        .insert("sync.branch".to_string(), DEFAULT_SYNC_BRANCH.to_string());
    layer
        .runtime
        .insert("sync.remote".to_string(), DEFAULT_REMOTE.to_string());
    layer
        .runtime
        .insert("sync.mode".to_string(), SyncMode::GitPortable.to_string());
    layer
}

/// Load configuration with classic precedence order.
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed, or DB access fails.
pub fn load_config(
    beads_dir: &Path,
    storage: Option<&SqliteStorage>,
    cli: &CliOverrides,
) -> Result<ConfigLayer> {
    let defaults = default_config_layer();
    let db_layer = match storage {
        Some(storage) => ConfigLayer::from_db(storage)?,
        None => ConfigLayer::default(),
    };
    let user = load_user_config()?;
    let project = load_project_config(beads_dir)?;
    let env_layer = ConfigLayer::from_env();
    let cli_layer = cli.as_layer();

    Ok(ConfigLayer::merge_layers(&[
        defaults, db_layer, user, project, env_layer, cli_layer,
    ]))
}

/// How records travel between clones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Export and commit to the sync branch on explicit sync or push.
    #[default]
    GitPortable,
    /// Like `GitPortable`, but the JSONL file is rewritten after every change.
    Realtime,
    /// Records travel through a remote database; JSONL git sync is off.
    NativeRemote,
}

impl SyncMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GitPortable => "git-portable",
            Self::Realtime => "realtime",
            Self::NativeRemote => "native-remote",
        }
    }

    #[must_use]
    pub const fn uses_git(self) -> bool {
        !matches!(self, Self::NativeRemote)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = BeadsError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_key(s).as_str() {
            "git-portable" | "portable" | "git" => Ok(Self::GitPortable),
            "realtime" | "real-time" => Ok(Self::Realtime),
            "native-remote" | "remote" => Ok(Self::NativeRemote),
            other => Err(BeadsError::Config(format!(
                "unknown sync.mode '{other}' (expected git-portable, realtime, native-remote)"
            ))),
        }
    }
}

/// Sync settings resolved from a merged layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncConfig {
    pub mode: SyncMode,
    pub branch: String,
    pub remote: String,
    pub conflict_strategy: ConflictStrategy,
    pub require_mass_delete_confirmation: bool,
    pub push_retries: u32,
    pub git_timeout: Duration,
    pub worktree_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            branch: DEFAULT_SYNC_BRANCH.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            conflict_strategy: ConflictStrategy::default(),
            require_mass_delete_confirmation: false,
            push_retries: DEFAULT_PUSH_RETRIES,
            git_timeout: DEFAULT_TIMEOUT,
            worktree_path: None,
        }
    }
}

impl SyncConfig {
    /// Build sync settings from a merged layer, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::Config`] for unparseable values.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let defaults = Self::default();

        let mode = get_value(layer, &["sync.mode"])
            .map(String::as_str)
            .map(SyncMode::from_str)
            .transpose()?
            .unwrap_or(defaults.mode);
        let branch = non_empty(get_value(layer, &["sync.branch", "sync-branch"]))
            .unwrap_or(defaults.branch);
        let remote = non_empty(get_value(layer, &["sync.remote"])).unwrap_or(defaults.remote);
        let conflict_strategy = get_value(layer, &["sync.conflict-strategy", "conflict.strategy"])
            .map(String::as_str)
            .map(|value| {
                ConflictStrategy::from_str(value)
                    .map_err(|err| BeadsError::Config(err.to_string()))
            })
            .transpose()?
            .unwrap_or(defaults.conflict_strategy);
        let require_mass_delete_confirmation =
            match get_value(layer, &["sync.require-mass-delete-confirmation"]) {
                Some(value) => parse_bool(value).ok_or_else(|| {
                    BeadsError::Config(format!(
                        "sync.require-mass-delete-confirmation: expected a boolean, got '{value}'"
                    ))
                })?,
                None => defaults.require_mass_delete_confirmation,
            };
        let push_retries = parse_number::<u32>(layer, "sync.push-retries")?
            .unwrap_or(defaults.push_retries);
        let git_timeout = parse_number::<u64>(layer, "sync.git-timeout")?
            .map_or(defaults.git_timeout, Duration::from_secs);
        let worktree_path = non_empty(get_value(layer, &["sync.worktree-path"])).map(PathBuf::from);

        Ok(Self {
            mode,
            branch,
            remote,
            conflict_strategy,
            require_mass_delete_confirmation,
            push_retries,
            git_timeout,
            worktree_path,
        })
    }

    /// Refuse git transport when the mode routes records elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::SyncModeDisabled`] in native-remote mode.
    pub fn ensure_git_sync(&self) -> Result<()> {
        if self.mode.uses_git() {
            Ok(())
        } else {
            Err(BeadsError::SyncModeDisabled {
                mode: self.mode.to_string(),
            })
        }
    }

    #[must_use]
    pub fn to_options(&self, cancel: CancelToken) -> SyncOptions {
        SyncOptions {
            branch: self.branch.clone(),
            remote: self.remote.clone(),
            strategy: self.conflict_strategy,
            require_mass_delete_confirmation: self.require_mass_delete_confirmation,
            max_push_retries: self.push_retries,
            backoff_base: DEFAULT_BACKOFF_BASE,
            worktree_path: self.worktree_path.clone(),
            cancel,
        }
    }
}

/// Determine if a key is startup-only.
///
/// Startup-only keys can only be set in YAML config files or the environment,
/// not in the database.
#[must_use]
pub fn is_startup_key(key: &str) -> bool {
    let normalized = normalize_key(key);

    if normalized.starts_with("git.") || normalized.starts_with("directory.") {
        return true;
    }

    matches!(
        normalized.as_str(),
        "json" | "db" | "database" | "lock-timeout" | "no-push"
    )
}

fn insert_key_value(layer: &mut ConfigLayer, key: &str, value: String) {
    if is_startup_key(key) {
        layer.startup.insert(key.to_string(), value);
    } else {
        layer.runtime.insert(key.to_string(), value);
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

/// Separator-insensitive form: `sync_push_retries` and `sync.push-retries` agree.
fn canonical_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '_' | '-') { '.' } else { c })
        .collect()
}

fn env_key_variants(raw: &str) -> Vec<String> {
    let raw_lower = raw.to_lowercase();
    vec![
        raw_lower.clone(),
        raw_lower.replace('_', "."),
        raw_lower.replace('_', "-"),
    ]
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn get_startup_value<'a>(layer: &'a ConfigLayer, keys: &[&str]) -> Option<&'a String> {
    let normalized_keys: Vec<String> = keys.iter().map(|key| normalize_key(key)).collect();
    for (key, value) in &layer.startup {
        let normalized = normalize_key(key);
        if normalized_keys
            .iter()
            .any(|candidate| candidate == &normalized)
        {
            return Some(value);
        }
    }
    None
}

/// Exact keys win in the order given; otherwise the first key (sorted) whose
/// canonical form matches.
fn get_value<'a>(layer: &'a ConfigLayer, keys: &[&str]) -> Option<&'a String> {
    for key in keys {
        if let Some(value) = layer.runtime.get(*key).or_else(|| layer.startup.get(*key)) {
            return Some(value);
        }
    }

    let wanted: Vec<String> = keys.iter().map(|key| canonical_key(key)).collect();
    for map in [&layer.runtime, &layer.startup] {
        let mut matches: Vec<(&String, &String)> = map
            .iter()
            .filter(|(key, _)| wanted.contains(&canonical_key(key)))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(b.0));
        if let Some((_, value)) = matches.first() {
            return Some(value);
        }
    }
    None
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_number<T: FromStr>(layer: &ConfigLayer, key: &str) -> Result<Option<T>> {
    get_value(layer, &[key])
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| {
                BeadsError::Config(format!("{key}: expected a non-negative number, got '{value}'"))
            })
        })
        .transpose()
}

fn db_override_from_layer(layer: &ConfigLayer, beads_dir: &Path) -> Option<PathBuf> {
    get_startup_value(layer, &["db", "database"]).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        let path = PathBuf::from(trimmed);
        Some(if path.is_absolute() {
            path
        } else {
            beads_dir.join(path)
        })
    })
}

fn lock_timeout_from_layer(layer: &ConfigLayer) -> Option<u64> {
    get_startup_value(layer, &["lock-timeout", "lock_timeout"])
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn layer_from_yaml_value(value: &serde_yaml::Value) -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    let mut flat = HashMap::new();
    flatten_yaml(value, "", &mut flat);

    for (key, value) in flat {
        insert_key_value(&mut layer, &key, value);
    }

    layer
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let joined = values
                .iter()
                .filter_map(yaml_scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}

/// Commented starter config written by `bsync init`.
pub const CONFIG_TEMPLATE: &str = "\
# bsync configuration
#
# Values here override ~/.config/bd/config.yaml and are overridden by
# BD_* environment variables (e.g. BD_SYNC_BRANCH) and CLI flags.

sync:
  # branch: beads-sync
  # remote: origin
  # mode: git-portable            # git-portable | realtime | native-remote
  # conflict-strategy: manual     # manual | newest | ours | theirs
  # require-mass-delete-confirmation: false
  # push-retries: 5
  # git-timeout: 120              # seconds
  # worktree-path: /path/to/worktree
";
