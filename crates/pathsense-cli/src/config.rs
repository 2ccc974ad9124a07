//! Configuration Vault – reads/writes `~/.pathsense/config.toml`.

use pathsense_engine::feedback::FeedbackMode;
use pathsense_runtime::classifier::{ClassifierSettings, DEFAULT_API_URL, DEFAULT_MODEL};
use pathsense_runtime::driver::DEFAULT_FRAME_PERIOD;
use pathsense_runtime::screen::{ScanTiming, ScreenOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

/// Persisted user configuration stored in `~/.pathsense/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Inference API key.  Empty means the offline mock classifier is used.
    #[serde(default = "empty_secret", skip_serializing_if = "is_blank")]
    pub api_key: Zeroizing<String>,

    /// Base URL of the inference endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Multimodal model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// `minimal` or `rich`.
    #[serde(default)]
    pub feedback: FeedbackMode,

    /// Display refresh period in milliseconds.
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,

    #[serde(default = "default_search_delay_ms")]
    pub search_delay_ms: u64,

    #[serde(default = "default_classify_timeout_ms")]
    pub classify_timeout_ms: u64,

    #[serde(default = "default_scan_deadline_ms")]
    pub scan_deadline_ms: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("feedback", &self.feedback)
            .field("frame_ms", &self.frame_ms)
            .field("search_delay_ms", &self.search_delay_ms)
            .field("classify_timeout_ms", &self.classify_timeout_ms)
            .field("scan_deadline_ms", &self.scan_deadline_ms)
            .finish()
    }
}

fn empty_secret() -> Zeroizing<String> {
    Zeroizing::new(String::new())
}
fn is_blank(secret: &Zeroizing<String>) -> bool {
    secret.trim().is_empty()
}
fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_frame_ms() -> u64 {
    DEFAULT_FRAME_PERIOD.as_millis() as u64
}
fn default_search_delay_ms() -> u64 {
    ScanTiming::default().search_delay.as_millis() as u64
}
fn default_classify_timeout_ms() -> u64 {
    ScanTiming::default().classify_timeout.as_millis() as u64
}
fn default_scan_deadline_ms() -> u64 {
    ScanTiming::default().scan_deadline.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: empty_secret(),
            api_url: default_api_url(),
            model: default_model(),
            feedback: FeedbackMode::default(),
            frame_ms: default_frame_ms(),
            search_delay_ms: default_search_delay_ms(),
            classify_timeout_ms: default_classify_timeout_ms(),
            scan_deadline_ms: default_scan_deadline_ms(),
        }
    }
}

impl Config {
    pub fn has_api_key(&self) -> bool {
        !is_blank(&self.api_key)
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            api_key: self.has_api_key().then(|| self.api_key.to_string()),
            api_url: Some(self.api_url.clone()),
            model: Some(self.model.clone()),
        }
    }

    pub fn screen_options(&self) -> ScreenOptions {
        ScreenOptions {
            feedback_mode: self.feedback,
            timing: ScanTiming {
                search_delay: Duration::from_millis(self.search_delay_ms),
                classify_timeout: Duration::from_millis(self.classify_timeout_ms),
                scan_deadline: Duration::from_millis(self.scan_deadline_ms),
            },
        }
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_ms.max(1))
    }
}

/// Return the path to `~/.pathsense/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".pathsense").join("config.toml")
}

/// Load the config from disk with environment overrides applied.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the file exactly as stored, without `PATHSENSE_*` overrides.  Use
/// this for anything that saves the config back.
pub fn load_stored() -> Result<Option<Config>, String> {
    read_from(&config_path())
}

/// Load the config from a specific path and apply environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    load_from_with(path, |key| std::env::var(key).ok())
}

pub(crate) fn load_from_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<Config>, String> {
    let mut cfg = read_from(path)?;
    if let Some(cfg) = cfg.as_mut() {
        apply_overrides_from(cfg, lookup);
    }
    Ok(cfg)
}

/// Parse the file at `path`; `None` if it does not exist.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `PATHSENSE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PATHSENSE_API_KEY` | `api_key` |
/// | `PATHSENSE_API_URL` | `api_url` |
/// | `PATHSENSE_MODEL` | `model` |
/// | `PATHSENSE_FEEDBACK` | `feedback` |
/// | `PATHSENSE_FRAME_MS` | `frame_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

/// Same as [`apply_env_overrides`] with an injectable variable lookup.
pub(crate) fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("PATHSENSE_API_KEY") {
        cfg.api_key = Zeroizing::new(v);
    }
    if let Some(v) = lookup("PATHSENSE_API_URL") {
        cfg.api_url = v;
    }
    if let Some(v) = lookup("PATHSENSE_MODEL") {
        cfg.model = v;
    }
    if let Some(v) = lookup("PATHSENSE_FEEDBACK")
        && let Ok(mode) = v.parse::<FeedbackMode>()
    {
        cfg.feedback = mode;
    }
    if let Some(v) = lookup("PATHSENSE_FRAME_MS")
        && let Ok(ms) = v.parse::<u64>()
        && ms > 0
    {
        cfg.frame_ms = ms;
    }
}

/// Save the config to disk, creating `~/.pathsense/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = Zeroizing::new(
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?,
    );
    // Owner-only file (rw-------) on Unix; the file may hold the API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw.as_bytes())
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
