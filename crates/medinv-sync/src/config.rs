//! # MedInv Configuration
//!
//! Configuration shared by the store, the sync engine and the scanner.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MEDINV_REMOTE_URL=https://mirror.example.org                       │
//! │     MEDINV_DATA_FILE=/var/lib/medinv/inventory.txt                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/medinv/medinv.toml (Linux)                               │
//! │     ~/Library/Application Support/com.medinv.medinv/medinv.toml        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     inventory.txt, 60s sync interval, sync disabled without a URL      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Ward 3 cabinet"
//!
//! [store]
//! data_file = "inventory.txt"
//! log_file = "database_logs.txt"
//! corrupt_lines = "skip"   # skip | fail
//!
//! [sync]
//! remote_url = "https://mirror.example.org"
//! collection = "Inventory"
//! interval_secs = 60
//! probe_addr = "8.8.8.8:53"
//!
//! [scan]
//! timeout_secs = 5
//! reader_path = "/dev/ttyUSB0"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use medinv_core::tag::TagFormat;
use medinv_core::DedupConfig;
use medinv_store::CorruptLinePolicy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4), sent with every remote request.
    /// Auto-generated if not provided.
    #[serde(default = "default_device_id")]
    pub id: String,

    /// Human-readable device name.
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_device_name() -> String {
    "MedInv Station".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: default_device_id(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// Local file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Inventory file (JSON lines).
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    /// Audit log file.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// What to do with unparseable inventory lines.
    #[serde(default)]
    pub corrupt_lines: CorruptLinePolicy,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("inventory.txt")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("database_logs.txt")
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            data_file: default_data_file(),
            log_file: default_log_file(),
            corrupt_lines: CorruptLinePolicy::default(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Remote mirror settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Master switch. Sync also stays off while `remote_url` is unset.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the remote mirror (http or https).
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Remote collection the records are mirrored into.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Seconds between sync cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// `host:port` the connectivity probe connects to.
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,

    /// Probe connect timeout (seconds).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Remote request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_collection() -> String {
    "Inventory".to_string()
}

fn default_interval() -> u64 {
    60
}

fn default_probe_addr() -> String {
    "8.8.8.8:53".to_string()
}

fn default_probe_timeout() -> u64 {
    3
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            enabled: default_true(),
            remote_url: None,
            collection: default_collection(),
            interval_secs: default_interval(),
            probe_addr: default_probe_addr(),
            probe_timeout_secs: default_probe_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Scan Settings
// =============================================================================

/// Tag reader and dispense pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// How long one scan waits for a tag (seconds).
    #[serde(default = "default_scan_timeout")]
    pub timeout_secs: u64,

    /// Worker poll granularity (milliseconds).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Delay after opening a reader before the first poll (milliseconds).
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    /// Repeat reads of one tag inside this window are dropped (milliseconds).
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,

    /// Dedup entries older than `window × factor` may be pruned.
    #[serde(default = "default_dedup_retention_factor")]
    pub dedup_retention_factor: u32,

    /// Maximum tracked tags.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Pause after each dispense cycle (seconds).
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Line-oriented tag reader device or pipe.
    #[serde(default)]
    pub reader_path: Option<PathBuf>,

    #[serde(default = "default_marker")]
    pub marker: String,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default = "default_field_index")]
    pub field_index: usize,
}

fn default_scan_timeout() -> u64 {
    5
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_warmup_ms() -> u64 {
    1000
}

fn default_dedup_window_ms() -> u64 {
    2000
}

fn default_dedup_retention_factor() -> u32 {
    5
}

fn default_dedup_capacity() -> usize {
    1024
}

fn default_cooldown() -> u64 {
    2
}

fn default_marker() -> String {
    TagFormat::default().marker
}

fn default_delimiter() -> char {
    TagFormat::default().delimiter
}

fn default_field_index() -> usize {
    TagFormat::default().field_index
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            timeout_secs: default_scan_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            warmup_ms: default_warmup_ms(),
            dedup_window_ms: default_dedup_window_ms(),
            dedup_retention_factor: default_dedup_retention_factor(),
            dedup_capacity: default_dedup_capacity(),
            cooldown_secs: default_cooldown(),
            reader_path: None,
            marker: default_marker(),
            delimiter: default_delimiter(),
            field_index: default_field_index(),
        }
    }
}

impl ScanSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn dedup_config(&self) -> DedupConfig {
        let window = Duration::from_millis(self.dedup_window_ms);
        DedupConfig {
            window,
            retention: window * self.dedup_retention_factor,
            capacity: self.dedup_capacity,
        }
    }

    pub fn tag_format(&self) -> TagFormat {
        TagFormat {
            marker: self.marker.clone(),
            delimiter: self.delimiter,
            field_index: self.field_index,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete MedInv configuration.
///
/// Passed around as `Arc<MedinvConfig>`; nothing reads configuration from
/// globals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedinvConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub scan: ScanSettings,
}

impl MedinvConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (medinv.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("device.id must not be empty".into()));
        }

        if let Some(ref raw) = self.sync.remote_url {
            let url = url::Url::parse(raw)?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(SyncError::InvalidUrl(format!(
                    "Remote URL must start with http:// or https://, got: {}",
                    raw
                )));
            }
        }

        if self.sync.collection.trim().is_empty() {
            return Err(SyncError::InvalidConfig("sync.collection must not be empty".into()));
        }

        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.probe_timeout_secs == 0 || self.sync.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.probe_timeout_secs and sync.request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.probe_addr.trim().is_empty() {
            return Err(SyncError::InvalidConfig("sync.probe_addr must not be empty".into()));
        }

        if self.scan.timeout_secs == 0 || self.scan.poll_interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "scan.timeout_secs and scan.poll_interval_ms must be greater than 0".into(),
            ));
        }

        if self.scan.dedup_capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "scan.dedup_capacity must be greater than 0".into(),
            ));
        }

        if self.scan.marker.is_empty() {
            return Err(SyncError::InvalidConfig("scan.marker must not be empty".into()));
        }

        Ok(())
    }

    /// Applies `MEDINV_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("MEDINV_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(path) = lookup("MEDINV_DATA_FILE") {
            debug!(path = %path, "Overriding data file from environment");
            self.store.data_file = PathBuf::from(path);
        }

        if let Some(path) = lookup("MEDINV_LOG_FILE") {
            self.store.log_file = PathBuf::from(path);
        }

        if let Some(url) = lookup("MEDINV_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.sync.remote_url = Some(url);
        }

        if let Some(interval) = lookup("MEDINV_SYNC_INTERVAL") {
            match interval.parse::<u64>() {
                Ok(secs) => self.sync.interval_secs = secs,
                Err(_) => warn!(value = %interval, "Ignoring non-numeric MEDINV_SYNC_INTERVAL"),
            }
        }

        if let Some(addr) = lookup("MEDINV_PROBE_ADDR") {
            self.sync.probe_addr = addr;
        }

        if let Some(path) = lookup("MEDINV_READER_PATH") {
            debug!(path = %path, "Overriding tag reader path from environment");
            self.scan.reader_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "medinv", "medinv")
            .map(|dirs| dirs.config_dir().join("medinv.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Returns true if a remote mirror is configured and enabled.
    pub fn is_sync_enabled(&self) -> bool {
        self.sync.enabled && self.sync.remote_url.is_some()
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.sync.remote_url.as_deref()
    }
}
