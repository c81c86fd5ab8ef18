//! Config subcommand handlers.

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::util;
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking tokens.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "transport = \"{}\"", cfg.defaults.transport);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "base_url = \"{}\"", p.base_url);
        if let Some(transport) = p.transport {
            let _ = writeln!(out, "transport = \"{transport}\"");
        }
        if let Some(chunk_size) = p.chunk_size {
            let _ = writeln!(out, "chunk_size = {chunk_size}");
        }
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        let _ = writeln!(out, "auth_header = \"{}\"", p.auth_header);
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    for (name, c) in &cfg.commands {
        let _ = writeln!(out);
        let _ = writeln!(out, "[commands.{name}]");
        let _ = writeln!(out, "endpoint = \"{}\"", c.endpoint);
        if let Some(ref method) = c.method {
            let _ = writeln!(out, "method = \"{method}\"");
        }
    }

    out
}

/// Copy of the config with plaintext tokens masked, for structured output.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some("****".into());
        }
    }
    cfg
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_token() -> Result<String, CliError> {
    let token = rpassword::prompt_password("Token: ").map_err(prompt_err)?;
    if token.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(token)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            let mut cfg = config::load_config_or_default();
            if config_path.exists()
                && !util::confirm("A config file already exists. Add a profile to it?", global.yes)?
            {
                return Ok(());
            }

            eprintln!("reqflow configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            // 1. Profile name
            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            // 2. Base URL
            let base_url: String = Input::new()
                .with_prompt("Base URL")
                .default("http://localhost:8080".into())
                .validate_with(|input: &String| -> Result<(), String> {
                    input
                        .parse::<url::Url>()
                        .map(|_| ())
                        .map_err(|e| format!("invalid URL: {e}"))
                })
                .interact_text()
                .map_err(prompt_err)?;

            let mut profile = Profile::new(base_url);

            // 3. Credentials
            let auth_choices = &[
                "No authentication",
                "Token in system keyring (recommended)",
                "Token in config file (plaintext)",
                "Token from environment variable",
            ];
            let selection = Select::new()
                .with_prompt("Authentication")
                .items(auth_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            match selection {
                0 => {}
                1 => {
                    let token = prompt_token()?;
                    reqflow_config::store_token(&profile_name, &token)?;
                    eprintln!("   Token stored in system keyring");
                }
                2 => profile.token = Some(prompt_token()?),
                _ => {
                    let env: String = Input::new()
                        .with_prompt("Variable name")
                        .default("REQFLOW_API_TOKEN".into())
                        .interact_text()
                        .map_err(prompt_err)?;
                    profile.token_env = Some(env);
                }
            }

            // 4. Write config
            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());
            config::save_config(&cfg)?;

            eprintln!("\nConfiguration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: reqflow fetch /");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                config::config_path().display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: reqflow config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ──────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("Default profile set to '{name}'");
            Ok(())
        }

        // ── SetToken ────────────────────────────────────────────────
        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name: profile_name,
                });
            }

            let token = prompt_token()?;
            reqflow_config::store_token(&profile_name, &token)?;
            eprintln!("Token stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}
