//! Config subcommand handlers.

use dialoguer::Input;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::util::{confirm, prompt_err};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Init helpers ─────────────────────────────────────────────────────

/// Ask for the profile fields, starting from the built-in defaults.
fn prompt_profile() -> Result<(String, Profile), CliError> {
    let defaults = Profile::default();

    let name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let bind: String = Input::new()
        .with_prompt("Local UDP address")
        .default(defaults.bind.clone())
        .interact_text()
        .map_err(prompt_err)?;

    let remote: String = Input::new()
        .with_prompt("Vehicle address (empty = learn from first packet)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let target_system: u8 = Input::new()
        .with_prompt("Vehicle system id")
        .default(defaults.target_system)
        .interact_text()
        .map_err(prompt_err)?;

    let profile = Profile {
        bind,
        remote: (!remote.trim().is_empty()).then(|| remote.trim().to_owned()),
        target_system,
        ..defaults
    };
    // Catch bad addresses before they reach the file.
    flightlog_config::profile_to_link_config(&profile)?;
    Ok((name, profile))
}

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path();
    if path.exists()
        && !confirm(
            &format!("{} exists. Overwrite?", path.display()),
            global.yes,
        )?
    {
        return Ok(());
    }

    let (name, profile) = if global.yes {
        ("default".to_owned(), Profile::default())
    } else {
        eprintln!("flightlog configuration");
        eprintln!("   Config path: {}\n", path.display());
        prompt_profile()?
    };

    let mut cfg = Config {
        default_profile: Some(name.clone()),
        ..Config::default()
    };
    cfg.profiles.insert(name.clone(), profile);

    let written = flightlog_config::save_config(&cfg)?;
    if !global.quiet {
        eprintln!("✓ Configuration written to {}", written.display());
        eprintln!("  Active profile: {name}");
        eprintln!("\n  Test it: flightlog list");
    }
    Ok(())
}

// ── Handler ──────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = flightlog_config::load_config()?;
            let format = config::output_format(global, &cfg.defaults)?;
            let out = output::render_single(
                format,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_default(),
                |_| config::config_path().display().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: flightlog config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = flightlog_config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }

            cfg.default_profile = Some(name.clone());
            flightlog_config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}
