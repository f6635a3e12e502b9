//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Value formatting ─────────────────────────────────────────────────

pub fn format_size(bytes: u64) -> String {
    bytesize::ByteSize::b(bytes).to_string()
}

/// Vehicles without a clock report the epoch.
pub fn format_time(time: &DateTime<Utc>) -> String {
    if time.timestamp() == 0 {
        "-".into()
    } else {
        time.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` that returns a pre-formatted string.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
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

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub(crate) fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\":\"serialization failed: {e}\"}}"))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Item {
        id: u16,
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "ID")]
        id: u16,
    }

    fn items() -> Vec<Item> {
        vec![Item { id: 1 }, Item { id: 2 }]
    }

    #[test]
    fn plain_lists_one_id_per_line() {
        let out = render_list(
            OutputFormat::Plain,
            &items(),
            |i| Row { id: i.id },
            |i| i.id.to_string(),
        );
        assert_eq!(out, "1\n2");
    }

    #[test]
    fn compact_json_is_one_line() {
        let out = render_list(
            OutputFormat::JsonCompact,
            &items(),
            |i| Row { id: i.id },
            |i| i.id.to_string(),
        );
        assert_eq!(out, r#"[{"id":1},{"id":2}]"#);
    }

    #[test]
    fn table_has_header() {
        let out = render_list(
            OutputFormat::Table,
            &items(),
            |i| Row { id: i.id },
            |i| i.id.to_string(),
        );
        assert!(out.contains("ID"));
    }

    #[test]
    fn epoch_time_renders_as_dash() {
        assert_eq!(format_time(&Utc.timestamp_opt(0, 0).unwrap()), "-");
        assert_eq!(
            format_time(&Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            "2023-11-14 22:13:20"
        );
    }
}
