//! `commands list|show`: inspect `[commands.<name>]` definitions.

use serde::Serialize;
use tabled::Tabled;

use reqflow_core::{Client, ClientConfig, CommandConfig, DispatchKeys};

use crate::cli::{CommandsArgs, CommandsCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Shown when a definition leaves the method to the adapter.
const DEFAULT_METHOD: &str = "GET";

#[derive(Serialize)]
struct NamedCommand<'a> {
    name: &'a str,
    #[serde(flatten)]
    config: &'a CommandConfig,
}

#[derive(Serialize)]
struct NamedDetail<'a> {
    name: &'a str,
    keys: DispatchKeys,
    #[serde(flatten)]
    config: &'a CommandConfig,
}

#[derive(Tabled)]
struct NamedRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "METHOD")]
    method: String,
    #[tabled(rename = "ENDPOINT")]
    endpoint: String,
    #[tabled(rename = "FLAGS")]
    flags: String,
}

fn method_of(config: &CommandConfig) -> String {
    config
        .method
        .as_ref()
        .map_or_else(|| DEFAULT_METHOD.to_owned(), ToString::to_string)
}

fn flags_of(config: &CommandConfig) -> String {
    let mut flags = Vec::new();
    if config.cache {
        flags.push(format!("cache {}s", config.cache_time.as_secs()));
    }
    if config.retry > 0 {
        flags.push(format!("retry {}", config.retry));
    }
    for (set, name) in [
        (config.queued, "queued"),
        (config.offline, "offline"),
        (config.cancelable, "cancelable"),
        (config.deduplicate, "dedupe"),
    ] {
        if set {
            flags.push(name.to_owned());
        }
    }
    if !config.auth {
        flags.push("no-auth".to_owned());
    }
    flags.join(", ")
}

fn detail(item: &NamedDetail<'_>) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    let _ = writeln!(out, "Name:      {}", item.name);
    let _ = writeln!(out, "Method:    {}", method_of(item.config));
    let _ = writeln!(out, "Endpoint:  {}", item.config.endpoint);
    let _ = writeln!(out, "Flags:     {}", flags_of(item.config));
    let _ = writeln!(out, "Abort key: {}", item.keys.abort);
    let _ = writeln!(out, "Cache key: {}", item.keys.cache);
    let _ = writeln!(out, "Queue key: {}", item.keys.queue);
    let _ = write!(out, "Effect:    {}", item.keys.effect);
    out
}

pub fn handle(args: CommandsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();

    match args.command {
        CommandsCommand::List => {
            let items: Vec<NamedCommand<'_>> = cfg
                .commands
                .iter()
                .map(|(name, config)| NamedCommand { name, config })
                .collect();
            if items.is_empty() && !global.quiet {
                eprintln!("No named commands. Add a [commands.<name>] table to your config.");
                return Ok(());
            }
            let out = output::render_list(
                &global.output,
                &items,
                |item| NamedRow {
                    name: item.name.to_owned(),
                    method: method_of(item.config),
                    endpoint: item.config.endpoint.clone(),
                    flags: flags_of(item.config),
                },
                |item| item.name.to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CommandsCommand::Show { name } => {
            let definition = cfg.command(&name)?;
            // Keys come from a throwaway client so explicit overrides apply.
            let client = Client::new(ClientConfig::default())?;
            let keys = client.create_command(definition.clone()).keys().clone();
            let item = NamedDetail {
                name: &name,
                keys,
                config: definition,
            };
            let out = output::render_single(&global.output, &item, detail, |i| {
                i.keys.abort.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
