//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one value per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde_json::Value;
use tabled::{Table, Tabled, settings::Style};

use reqflow_core::Envelope;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ───────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn status_label(status: u16, color: bool) -> String {
    let label = format!("HTTP {status}");
    if !color {
        return label;
    }
    match status {
        200..=299 => label.green().to_string(),
        300..=399 => label.cyan().to_string(),
        _ => label.red().to_string(),
    }
}

// ── Render dispatchers ──────────────────────────────────────────────

/// Render a list of serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single serializable item. Table mode uses `detail_fn`.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(id_fn(data)),
    }
}

/// Render a successful response body.
///
/// Structured formats emit the body alone; table mode prefixes the status.
/// Plain prints strings raw and arrays one element per line.
pub fn render_envelope(
    format: &OutputFormat,
    envelope: &Envelope,
    color: bool,
) -> Result<String, CliError> {
    let body = envelope.data().unwrap_or(&Value::Null);
    match format {
        OutputFormat::Table => Ok(format!(
            "{}\n{}",
            status_label(envelope.status(), color),
            render_json(body, false)?
        )),
        OutputFormat::Plain => Ok(plain_value(body)),
        other => render_single(other, body, |_| String::new(), |_| String::new()),
    }
}

fn plain_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(plain_value).collect::<Vec<_>>().join("\n"),
        other => other.to_string(),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ───────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let out = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(out)
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Validation {
        field: "output".into(),
        reason: format!("YAML serialization failed: {e}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_output_unwraps_strings_and_arrays() {
        let envelope = Envelope::success(json!(["a", "b", 3]), 200);
        let out = render_envelope(&OutputFormat::Plain, &envelope, false).unwrap();
        assert_eq!(out, "a\nb\n3");
    }

    #[test]
    fn table_output_prefixes_status() {
        let envelope = Envelope::success(json!({"ok": true}), 201);
        let out = render_envelope(&OutputFormat::Table, &envelope, false).unwrap();
        assert!(out.starts_with("HTTP 201\n"));
        assert!(out.contains("\"ok\": true"));
    }

    #[test]
    fn compact_json_is_one_line() {
        let envelope = Envelope::success(json!({"a": [1, 2]}), 200);
        let out = render_envelope(&OutputFormat::JsonCompact, &envelope, false).unwrap();
        assert_eq!(out, r#"{"a":[1,2]}"#);
    }
}
