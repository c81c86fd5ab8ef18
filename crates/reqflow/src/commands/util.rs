//! Shared helpers for command handlers.

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use reqflow_core::{FetchArgs, Payload, ProgressReport, RequestEvent, RequestEventKind};

use crate::cli::RequestArgs;
use crate::config::{self, Resolved};
use crate::error::CliError;

// ── Argument parsing ────────────────────────────────────────────────

/// Split `name=value`, rejecting an empty name.
pub fn parse_pair(raw: &str, field: &str) -> Result<(String, String), CliError> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_owned(), value.to_owned()))
        }
        _ => Err(CliError::Validation {
            field: field.into(),
            reason: format!("expected NAME=VALUE, got '{raw}'"),
        }),
    }
}

/// Accept curl-style `Name: value` as well as `name=value`.
pub fn parse_header(raw: &str) -> Result<(String, String), CliError> {
    if let Some((name, value)) = raw.split_once(':') {
        if !name.trim().is_empty() && !name.contains('=') {
            return Ok((name.trim().to_owned(), value.trim().to_owned()));
        }
    }
    parse_pair(raw, "header")
}

/// Query values are JSON when they parse (`true`, `3`, `[1,2]`), strings otherwise.
pub fn query_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

/// Body from inline text or `@path`. JSON is sent as JSON, anything else as text.
pub fn read_payload(raw: &str) -> Result<Payload, CliError> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => raw.to_owned(),
    };
    Ok(match serde_json::from_str::<Value>(&text) {
        Ok(json) => Payload::Json(json),
        Err(_) => Payload::Text(text),
    })
}

/// Translate `--param`, `--query`, `--header`, and `--data` into call-time values.
pub fn fetch_args(request: &RequestArgs) -> Result<FetchArgs, CliError> {
    let mut args = FetchArgs::new();
    for raw in &request.params {
        let (name, value) = parse_pair(raw, "param")?;
        args = args.param(name, value);
    }
    for raw in &request.query {
        let (name, value) = parse_pair(raw, "query")?;
        args = args.query(name, query_value(&value));
    }
    for raw in &request.headers {
        let (name, value) = parse_header(raw)?;
        args = args.header(name, value);
    }
    if let Some(ref data) = request.data {
        args.data = Some(read_payload(data)?);
    }
    Ok(args)
}

/// Relative endpoints need a base URL from somewhere.
pub fn ensure_target(resolved: &Resolved, endpoint: &str) -> Result<(), CliError> {
    if resolved.client.base_url.is_none() && !endpoint.contains("://") {
        return Err(CliError::NoConfig {
            path: config::config_path().display().to_string(),
        });
    }
    Ok(())
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

// ── Progress ────────────────────────────────────────────────────────

const PROGRESS_TEMPLATE: &str =
    "{msg:>9} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} eta {eta}";

/// Stderr progress bar fed from the client's event bus.
pub struct ProgressTracker {
    bar: ProgressBar,
    task: JoinHandle<()>,
}

impl ProgressTracker {
    pub fn spawn(mut events: broadcast::Receiver<RequestEvent>) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }

        let task_bar = bar.clone();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match event.kind {
                        RequestEventKind::RequestProgress(ref report) => {
                            update(&task_bar, "upload", report);
                        }
                        RequestEventKind::ResponseProgress(ref report) => {
                            update(&task_bar, "download", report);
                        }
                        RequestEventKind::Retry { attempt, .. } => {
                            task_bar.set_position(0);
                            task_bar.set_message(format!("retry {attempt}"));
                        }
                        _ => {}
                    },
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { bar, task }
    }

    pub fn finish(self) {
        self.task.abort();
        self.bar.finish_and_clear();
    }
}

fn update(bar: &ProgressBar, phase: &'static str, report: &ProgressReport) {
    bar.set_message(phase);
    if let Some(total) = report.total {
        bar.set_length(total);
    }
    bar.set_position(report.loaded);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn headers_accept_both_spellings() {
        assert_eq!(
            parse_header("X-Trace: abc").unwrap(),
            ("X-Trace".to_owned(), "abc".to_owned())
        );
        assert_eq!(
            parse_header("x-trace=a:b").unwrap(),
            ("x-trace".to_owned(), "a:b".to_owned())
        );
        assert!(parse_header("novalue").is_err());
    }

    #[test]
    fn query_values_parse_json_when_possible() {
        assert_eq!(query_value("3"), Value::from(3));
        assert_eq!(query_value("true"), Value::Bool(true));
        assert_eq!(query_value("name"), Value::String("name".into()));
    }

    #[test]
    fn payload_is_json_or_text() {
        assert!(matches!(read_payload(r#"{"a":1}"#).unwrap(), Payload::Json(_)));
        assert!(matches!(read_payload("hello").unwrap(), Payload::Text(_)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.json");
        std::fs::write(&path, "[1,2]").unwrap();
        let payload = read_payload(&format!("@{}", path.display())).unwrap();
        assert!(matches!(payload, Payload::Json(Value::Array(_))));
    }

    #[test]
    fn pairs_need_a_name() {
        assert!(parse_pair("=x", "param").is_err());
        assert_eq!(
            parse_pair("id=7", "param").unwrap(),
            ("id".to_owned(), "7".to_owned())
        );
    }
}
