//! CLI configuration: bridges `flightlog-config` with command-line overrides.
//!
//! Precedence, highest first: flags, `FLIGHTLOG_*` variables, the selected
//! profile, `[defaults]`.

use std::time::Duration;

use clap::ValueEnum;

use flightlog_core::TransferConfig;
use flightlog_link::UdpLinkConfig;

pub use flightlog_config::{Config, Defaults, Profile, config_path, load_config_or_default};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Everything a log command needs, resolved from file, env and flags.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub profile_name: String,
    pub link: UdpLinkConfig,
    pub transfer: TransferConfig,
    pub timeout: Duration,
    pub output: OutputFormat,
    pub color: ColorMode,
}

/// Apply CLI overrides to the selected profile and build runtime configs.
pub fn resolve(global: &GlobalOpts, cfg: &Config) -> Result<Resolved, CliError> {
    let (profile_name, mut profile) = flightlog_config::resolve_profile(
        cfg,
        global.profile.as_deref(),
    )
    .map_err(|err| match err {
        flightlog_config::ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
            name,
            available: available_profiles(cfg),
        },
        other => other.into(),
    })?;

    if let Some(ref bind) = global.bind {
        profile.bind.clone_from(bind);
    }
    if global.remote.is_some() {
        profile.remote.clone_from(&global.remote);
    }
    if let Some(system) = global.target_system {
        profile.target_system = system;
    }
    if let Some(component) = global.target_component {
        profile.target_component = component;
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }

    let timeout = flightlog_config::timeout(&profile, &cfg.defaults);
    if timeout.is_zero() {
        return Err(CliError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    Ok(Resolved {
        link: flightlog_config::profile_to_link_config(&profile)?,
        transfer: flightlog_config::transfer_config(&profile, &cfg.defaults)?,
        timeout,
        output: output_format(global, &cfg.defaults)?,
        color: color_mode(global, &cfg.defaults)?,
        profile_name,
    })
}

pub fn output_format(global: &GlobalOpts, defaults: &Defaults) -> Result<OutputFormat, CliError> {
    match global.output {
        Some(format) => Ok(format),
        None => parse_choice("defaults.output", &defaults.output),
    }
}

pub fn color_mode(global: &GlobalOpts, defaults: &Defaults) -> Result<ColorMode, CliError> {
    match global.color {
        Some(mode) => Ok(mode),
        None => parse_choice("defaults.color", &defaults.color),
    }
}

fn parse_choice<T: ValueEnum>(field: &str, value: &str) -> Result<T, CliError> {
    T::from_str(value, true).map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("unrecognized value '{value}'"),
    })
}

pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["flightlog"];
        argv.extend_from_slice(args);
        argv.push("end");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with_profile() -> Config {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "bench".into(),
            Profile {
                remote: Some("192.168.4.1:14550".into()),
                target_system: 7,
                timeout: Some(12),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn flags_override_profile() {
        let cfg = config_with_profile();
        let resolved = resolve(
            &global(&["-p", "bench", "--target-system", "3", "--timeout", "4"]),
            &cfg,
        )
        .unwrap();
        assert_eq!(resolved.profile_name, "bench");
        assert_eq!(resolved.transfer.target.system_id, 3);
        assert_eq!(resolved.timeout, Duration::from_secs(4));
        assert_eq!(
            resolved.link.remote.map(|a| a.to_string()).as_deref(),
            Some("192.168.4.1:14550")
        );
    }

    #[test]
    fn profile_values_apply_without_flags() {
        let cfg = config_with_profile();
        let resolved = resolve(&global(&["-p", "bench"]), &cfg).unwrap();
        assert_eq!(resolved.transfer.target.system_id, 7);
        assert_eq!(resolved.timeout, Duration::from_secs(12));
        assert_eq!(resolved.output, OutputFormat::Table);
    }

    #[test]
    fn unknown_profile_lists_available() {
        let cfg = config_with_profile();
        let err = resolve(&global(&["-p", "field"]), &cfg).unwrap_err();
        assert!(matches!(
            err,
            CliError::ProfileNotFound { ref available, .. } if available == "bench"
        ));
    }

    #[test]
    fn bad_default_output_is_rejected() {
        let mut cfg = Config::default();
        cfg.defaults.output = "xml".into();
        let err = resolve(&global(&[]), &cfg).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "defaults.output"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = resolve(&global(&["--timeout", "0"]), &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "timeout"));
    }
}
