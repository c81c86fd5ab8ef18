//! Command dispatch: bridges CLI args -> core commands -> output formatting.

pub mod config_cmd;
pub mod fetch;
pub mod named;
pub mod run;
pub mod util;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a parsed command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Fetch(args) => fetch::handle(args, global).await,
        Command::Run(args) => run::handle(args, global).await,
        Command::Commands(args) => named::handle(args, global),
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "reqflow", &mut std::io::stdout());
            Ok(())
        }
    }
}
