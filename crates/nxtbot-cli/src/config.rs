//! Configuration vault – reads/writes `~/.nxtbot/config.toml`.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use nxtbot_runtime::{AvoidanceConfig, PatrolConfig, TeleopConfig};
use nxtbot_types::{Motor, NxtError};
use serde::{Deserialize, Serialize};

/// Persisted user configuration stored in `~/.nxtbot/config.toml`.
///
/// Motor letters are kept as strings and parsed through [`Motor::from_str`]
/// so a bad letter fails with the message that enumerates the valid ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket URL of the rosbridge server.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    /// Port letter of the left wheel motor.
    #[serde(default = "default_left_motor")]
    pub left_motor: String,

    /// Port letter of the right wheel motor.
    #[serde(default = "default_right_motor")]
    pub right_motor: String,

    /// Drive effort for every program.
    #[serde(default = "default_effort")]
    pub effort: f64,

    /// Obstacle stop range in meters (the `drive` program).
    #[serde(default = "default_stop_range_m")]
    pub stop_range_m: f64,

    /// Pause between range samples, in milliseconds.  Must be greater than
    /// zero; the control loops pace themselves on this interval.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// How long to wait for the rosbridge link before giving up, in
    /// milliseconds.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_left_motor() -> String {
    "c".to_string()
}
fn default_right_motor() -> String {
    "b".to_string()
}
fn default_effort() -> f64 {
    1.0
}
fn default_stop_range_m() -> f64 {
    0.3
}
fn default_sample_interval_ms() -> u64 {
    100
}
fn default_ready_timeout_ms() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rosbridge_url: default_rosbridge_url(),
            left_motor: default_left_motor(),
            right_motor: default_right_motor(),
            effort: default_effort(),
            stop_range_m: default_stop_range_m(),
            sample_interval_ms: default_sample_interval_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
        }
    }
}

impl Config {
    /// Left wheel motor, parsed from the configured letter.
    pub fn left(&self) -> Result<Motor, NxtError> {
        Motor::from_str(&self.left_motor)
    }

    /// Right wheel motor, parsed from the configured letter.
    pub fn right(&self) -> Result<Motor, NxtError> {
        Motor::from_str(&self.right_motor)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Check the motor letters and the sample interval before any program
    /// starts.
    pub fn validate(&self) -> Result<(), String> {
        self.left().map_err(|e| e.to_string())?;
        self.right().map_err(|e| e.to_string())?;
        if self.sample_interval_ms == 0 {
            return Err("sample_interval_ms must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Settings for the `drive` program.
    pub fn avoidance(&self) -> Result<AvoidanceConfig, NxtError> {
        Ok(AvoidanceConfig {
            left: self.left()?,
            right: self.right()?,
            effort: self.effort,
            stop_range: self.stop_range_m,
            sample_interval: self.sample_interval(),
            ..AvoidanceConfig::default()
        })
    }

    /// Settings for the `patrol` program.
    pub fn patrol(&self) -> Result<PatrolConfig, NxtError> {
        Ok(PatrolConfig {
            left: self.left()?,
            right: self.right()?,
            effort: self.effort,
            sample_interval: self.sample_interval(),
            ..PatrolConfig::default()
        })
    }

    /// Settings for the `teleop` program.
    pub fn teleop(&self) -> Result<TeleopConfig, NxtError> {
        Ok(TeleopConfig {
            left: self.left()?,
            right: self.right()?,
            effort: self.effort,
            ..TeleopConfig::default()
        })
    }
}

/// Return the path to `~/.nxtbot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".nxtbot").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `NXTBOT_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `NXTBOT_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `NXTBOT_LEFT_MOTOR` | `left_motor` |
/// | `NXTBOT_RIGHT_MOTOR` | `right_motor` |
/// | `NXTBOT_EFFORT` | `effort` |
/// | `NXTBOT_STOP_RANGE_M` | `stop_range_m` |
/// | `NXTBOT_SAMPLE_INTERVAL_MS` | `sample_interval_ms` |
/// | `NXTBOT_READY_TIMEOUT_MS` | `ready_timeout_ms` |
///
/// Numeric variables that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("NXTBOT_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Ok(v) = std::env::var("NXTBOT_LEFT_MOTOR") {
        cfg.left_motor = v;
    }
    if let Ok(v) = std::env::var("NXTBOT_RIGHT_MOTOR") {
        cfg.right_motor = v;
    }
    if let Ok(v) = std::env::var("NXTBOT_EFFORT")
        && let Ok(effort) = v.parse::<f64>() {
            cfg.effort = effort;
        }
    if let Ok(v) = std::env::var("NXTBOT_STOP_RANGE_M")
        && let Ok(range) = v.parse::<f64>() {
            cfg.stop_range_m = range;
        }
    if let Ok(v) = std::env::var("NXTBOT_SAMPLE_INTERVAL_MS")
        && let Ok(interval) = v.parse::<u64>() {
            cfg.sample_interval_ms = interval;
        }
    if let Ok(v) = std::env::var("NXTBOT_READY_TIMEOUT_MS")
        && let Ok(timeout) = v.parse::<u64>() {
            cfg.ready_timeout_ms = timeout;
        }
}

/// Save the config to disk, creating `~/.nxtbot/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Restrict the config directory to the owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Write the file with owner-only read/write (rw-------) on Unix.
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
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
