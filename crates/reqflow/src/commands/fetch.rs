//! `fetch`: ad-hoc requests, and the shared execute path used by `run`.

use std::time::Duration;

use tracing::debug;

use reqflow_core::{Client, Command, CommandConfig, FetchArgs as CallArgs, TransportKind};

use crate::cli::{FetchArgs, GlobalOpts};
use crate::commands::util::{self, ProgressTracker};
use crate::config::{self, Resolved};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: FetchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let mut resolved = config::resolve(global, &cfg)?;

    if args.streaming {
        resolved.client.transport = TransportKind::Streaming;
    }
    if let Some(chunk_size) = args.chunk_size {
        if chunk_size == 0 {
            return Err(CliError::Validation {
                field: "chunk-size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        resolved.client.chunk_size = chunk_size;
    }
    util::ensure_target(&resolved, &args.endpoint)?;

    let client = config::build_client(&resolved)?;

    let mut definition =
        CommandConfig::new(args.endpoint.as_str()).method(args.method.to_uppercase());
    definition.retry = args.retry;
    if let Some(ms) = args.retry_time {
        definition.retry_time = Duration::from_millis(ms);
    }
    definition.auth = !args.no_auth;

    let command = client.create_command(definition);
    let call = util::fetch_args(&args.request)?;
    execute(&client, &command, call, &resolved, args.request.progress, global).await
}

/// Dispatch one request and print the body, or turn the envelope's error
/// into a `CliError`.
pub async fn execute(
    client: &Client,
    command: &Command,
    call: CallArgs,
    resolved: &Resolved,
    progress: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let tracker = progress.then(|| ProgressTracker::spawn(client.events()));
    let result = command.fetch(call).await;
    if let Some(tracker) = tracker {
        tracker.finish();
    }

    let envelope = result?;
    debug!(
        status = envelope.status(),
        abort_key = %command.keys().abort,
        "response received"
    );

    if let Some(err) = envelope.error() {
        return Err(CliError::from_request_error(
            err.clone(),
            &resolved.target(command.endpoint()),
            &resolved.profile_name,
        ));
    }

    let color = output::should_color(&global.color);
    let out = output::render_envelope(&global.output, &envelope, color)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
