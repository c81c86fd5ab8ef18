//! `run`: execute a named command from the config file.

use tracing::info;

use crate::cli::{GlobalOpts, RunArgs};
use crate::commands::{fetch, util};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let definition = cfg.command(&args.name)?.clone();
    let resolved = config::resolve(global, &cfg)?;
    util::ensure_target(&resolved, &definition.endpoint)?;

    let client = config::build_client(&resolved)?;
    let command = client.create_command(definition);
    info!(
        name = %args.name,
        method = %command.method(),
        endpoint = command.endpoint(),
        "running named command"
    );

    let call = util::fetch_args(&args.request)?;
    fetch::execute(&client, &command, call, &resolved, args.request.progress, global).await
}
