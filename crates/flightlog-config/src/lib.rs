//! Shared configuration for the flightlog CLI and embedders.
//!
//! TOML profiles (one per vehicle link), environment overrides, and
//! translation to `flightlog_link::UdpLinkConfig` and
//! `flightlog_core::TransferConfig`. The CLI layers its flag overrides on
//! top.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use flightlog_core::TransferConfig;
use flightlog_link::{LOG_DATA_CAPACITY, Target, UdpLinkConfig};

/// Environment variable prefix; nested keys are separated by `__`
/// (e.g. `FLIGHTLOG_DEFAULTS__TIMEOUT=60`).
pub const ENV_PREFIX: &str = "FLIGHTLOG_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named vehicle link profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    /// Output format: table, json, json-compact, yaml, plain.
    pub output: String,
    pub color: String,
    /// Seconds to wait for a goal before giving up.
    pub timeout: u64,
    /// Largest LOG_DATA chunk accepted from the vehicle.
    pub max_chunk_capacity: usize,
    /// Send LOG_REQUEST_END on start-up to close stale sessions.
    pub flush_on_start: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: "table".into(),
            color: "auto".into(),
            timeout: 30,
            max_chunk_capacity: LOG_DATA_CAPACITY,
            flush_on_start: true,
        }
    }
}

/// A named vehicle link profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Profile {
    /// Local UDP address to bind (e.g. "0.0.0.0:14550").
    pub bind: String,

    /// Vehicle (or router) address. Learned from the first datagram when
    /// unset.
    pub remote: Option<String>,

    /// Our own MAVLink system id. 255 is the ground-station convention.
    pub system_id: u8,
    pub component_id: u8,

    /// Vehicle addressed by outbound commands.
    pub target_system: u8,
    pub target_component: u8,

    /// Ignore frames from any other system id.
    pub accept_from: Option<u8>,

    /// Outbound frame queue depth.
    pub send_queue: usize,

    /// Override the default timeout.
    pub timeout: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        let link = UdpLinkConfig::default();
        Self {
            bind: link.bind.to_string(),
            remote: None,
            system_id: link.local.system_id,
            component_id: link.local.component_id,
            target_system: 1,
            target_component: 1,
            accept_from: None,
            send_queue: link.send_queue,
            timeout: None,
        }
    }
}

impl Profile {
    pub fn target(&self) -> Target {
        Target::new(self.target_system, self.target_component)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "flightlog", "flightlog").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("flightlog");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment. A missing file is not an
/// error; defaults and environment still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile resolution ──────────────────────────────────────────────

/// Pick the named profile, else the configured default profile.
///
/// An unconfigured "default" profile resolves to [`Profile::default`];
/// any other missing name is an error.
pub fn resolve_profile(cfg: &Config, name: Option<&str>) -> Result<(String, Profile), ConfigError> {
    let name = name
        .or(cfg.default_profile.as_deref())
        .unwrap_or("default")
        .to_owned();

    match cfg.profiles.get(&name) {
        Some(profile) => Ok((name, profile.clone())),
        None if name == "default" => Ok((name, Profile::default())),
        None => Err(ConfigError::UnknownProfile { name }),
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("expected host:port, got '{value}'"),
    })
}

/// Build a `UdpLinkConfig` from a profile.
pub fn profile_to_link_config(profile: &Profile) -> Result<UdpLinkConfig, ConfigError> {
    if profile.send_queue == 0 {
        return Err(ConfigError::Validation {
            field: "send_queue".into(),
            reason: "must be at least 1".into(),
        });
    }

    Ok(UdpLinkConfig {
        bind: parse_addr("bind", &profile.bind)?,
        remote: profile
            .remote
            .as_deref()
            .map(|r| parse_addr("remote", r))
            .transpose()?,
        local: Target::new(profile.system_id, profile.component_id),
        accept_from: profile.accept_from,
        send_queue: profile.send_queue,
    })
}

/// Build a `TransferConfig` from a profile and the global defaults.
pub fn transfer_config(profile: &Profile, defaults: &Defaults) -> Result<TransferConfig, ConfigError> {
    if defaults.max_chunk_capacity == 0 {
        return Err(ConfigError::Validation {
            field: "max_chunk_capacity".into(),
            reason: "must be at least 1".into(),
        });
    }
    if defaults.max_chunk_capacity > LOG_DATA_CAPACITY {
        return Err(ConfigError::Validation {
            field: "max_chunk_capacity".into(),
            reason: format!("must not exceed {LOG_DATA_CAPACITY}, the LOG_DATA payload size"),
        });
    }

    Ok(TransferConfig {
        target: profile.target(),
        max_chunk_capacity: defaults.max_chunk_capacity,
        flush_on_start: defaults.flush_on_start,
        ..TransferConfig::default()
    })
}

/// Effective goal timeout for a profile.
pub fn timeout(profile: &Profile, defaults: &Defaults) -> Duration {
    Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_without_file() {
        Jail::expect_with(|_jail| {
            let cfg = load_config_from(Path::new("missing.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn toml_file_and_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                default_profile = "bench"

                [defaults]
                timeout = 10

                [profiles.bench]
                bind = "127.0.0.1:14551"
                remote = "127.0.0.1:14550"
                target_system = 42
                "#,
            )?;
            jail.set_env("FLIGHTLOG_DEFAULTS__TIMEOUT", "60");
            jail.set_env("FLIGHTLOG_PROFILES__BENCH__ACCEPT_FROM", "42");

            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.defaults.timeout, 60);
            assert_eq!(cfg.defaults.output, "table");

            let (name, profile) = resolve_profile(&cfg, None).map_err(|e| e.to_string())?;
            assert_eq!(name, "bench");
            assert_eq!(profile.target(), Target::new(42, 1));
            assert_eq!(profile.accept_from, Some(42));
            assert_eq!(profile.system_id, 255);
            Ok(())
        });
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = Config::default();
        assert!(resolve_profile(&cfg, Some("default")).is_ok());
        assert!(matches!(
            resolve_profile(&cfg, Some("rover")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn profile_translates_to_link_and_transfer_configs() {
        let profile = Profile {
            remote: Some("10.0.0.2:14550".into()),
            target_system: 3,
            ..Profile::default()
        };
        let link = profile_to_link_config(&profile).unwrap();
        assert_eq!(link.remote, Some("10.0.0.2:14550".parse().unwrap()));
        assert_eq!(link.local, Target::new(255, 190));

        let transfer = transfer_config(&profile, &Defaults::default()).unwrap();
        assert_eq!(transfer.target, Target::new(3, 1));
        assert_eq!(transfer.max_chunk_capacity, LOG_DATA_CAPACITY);
        assert_eq!(timeout(&profile, &Defaults::default()), Duration::from_secs(30));
    }

    #[test]
    fn chunk_capacity_above_log_data_size_is_refused() {
        let defaults = Defaults {
            max_chunk_capacity: 2000,
            ..Defaults::default()
        };
        let err = transfer_config(&Profile::default(), &defaults).unwrap_err();
        assert!(
            matches!(&err, ConfigError::Validation { field, .. } if field == "max_chunk_capacity"),
            "{err}"
        );
    }

    #[test]
    fn bad_address_names_the_field() {
        let profile = Profile {
            bind: "not-an-address".into(),
            ..Profile::default()
        };
        let err = profile_to_link_config(&profile).unwrap_err();
        assert!(err.to_string().contains("bind"), "{err}");
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert("bench".into(), Profile::default());

        save_config_to(&cfg, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[profiles.bench]"), "{text}");
    }
}
