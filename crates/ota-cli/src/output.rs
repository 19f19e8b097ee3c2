//! Output formatting for ota-cli (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use ota_client::DeviceRecord;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Output settings shared by all commands
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Warnings go to stderr even in quiet mode
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print rows in the configured format
    pub fn print<T: Tabled + Serialize>(&self, rows: &[T]) {
        if rows.is_empty() && self.format == OutputFormat::Table {
            if !self.quiet {
                println!("Nothing to show");
            }
            return;
        }
        print!("{}", render_rows(self.format, rows));
    }

    /// Print a single row in the configured format
    pub fn print_one<T: Tabled + Serialize>(&self, row: &T) {
        print!("{}", render_rows(self.format, std::slice::from_ref(row)));
    }

    /// Print labelled values, e.g. a version lookup or an upload receipt
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        print!("{}", render_kv(self.format, pairs));
    }
}

fn render_rows<T: Tabled + Serialize>(format: OutputFormat, rows: &[T]) -> String {
    match format {
        OutputFormat::Table => format!("{}\n", Table::new(rows)),
        OutputFormat::Json => to_json(&rows),
        OutputFormat::Csv => render_csv(rows),
    }
}

fn render_kv(format: OutputFormat, pairs: &[(&str, String)]) -> String {
    match format {
        OutputFormat::Table => pairs
            .iter()
            .map(|(key, value)| format!("{}: {}\n", key.bold(), value))
            .collect(),
        OutputFormat::Json => {
            let object: serde_json::Map<String, serde_json::Value> = pairs
                .iter()
                .map(|(key, value)| (key.to_string(), serde_json::Value::from(value.as_str())))
                .collect();
            to_json(&object)
        }
        OutputFormat::Csv => {
            let header: Vec<&str> = pairs.iter().map(|(key, _)| *key).collect();
            let values: Vec<String> = pairs.iter().map(|(_, value)| escape_csv(value)).collect();
            format!("{}\n{}\n", header.join(","), values.join(","))
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(json) => format!("{}\n", json),
        Err(e) => format!("{{\"error\": \"{}\"}}\n", e),
    }
}

/// Render rows as CSV; the header comes from the first row's fields
fn render_csv<T: Serialize>(rows: &[T]) -> String {
    let objects: Vec<serde_json::Map<String, serde_json::Value>> = rows
        .iter()
        .filter_map(|row| match serde_json::to_value(row) {
            Ok(serde_json::Value::Object(object)) => Some(object),
            _ => None,
        })
        .collect();
    let Some(first) = objects.first() else {
        return String::new();
    };

    let header: Vec<&String> = first.keys().collect();
    let mut out = header
        .iter()
        .map(|h| h.as_str())
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');

    for object in &objects {
        let line: Vec<String> = header
            .iter()
            .map(|key| match object.get(*key) {
                Some(serde_json::Value::String(s)) => escape_csv(s),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => escape_csv(&other.to_string()),
            })
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// Rows

/// Device display for list and registry commands
#[derive(Debug, Tabled, Serialize)]
pub struct DeviceRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Version")]
    pub version: String,
    #[tabled(rename = "File")]
    pub file: String,
    #[tabled(rename = "Size")]
    pub size: String,
    #[tabled(rename = "SHA-256")]
    pub sha256: String,
    #[tabled(rename = "Updated")]
    pub updated_at: String,
}

impl From<DeviceRecord> for DeviceRow {
    fn from(device: DeviceRecord) -> Self {
        Self {
            id: device.id,
            version: device.version,
            file: device.file,
            size: device.size.map(|s| s.to_string()).unwrap_or_default(),
            sha256: device
                .sha256
                .map(|h| h.chars().take(12).collect())
                .unwrap_or_default(),
            updated_at: device
                .updated_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}

/// Calibration pair display
#[derive(Debug, Tabled, Serialize)]
pub struct CalibRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Pair")]
    pub pair: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("esp1"), "esp1");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_render_csv() {
        let rows = vec![
            CalibRow {
                index: 0,
                pair: "{\"raw\":1}".to_string(),
            },
            CalibRow {
                index: 1,
                pair: "plain".to_string(),
            },
        ];
        assert_eq!(
            render_csv(&rows),
            "index,pair\n0,\"{\"\"raw\"\":1}\"\n1,plain\n"
        );
        assert_eq!(render_csv::<CalibRow>(&[]), "");
    }

    #[test]
    fn test_render_kv_formats() {
        colored::control::set_override(false);
        let pairs = [("device", "esp1".to_string()), ("version", "1.0.4".to_string())];
        assert_eq!(
            render_kv(OutputFormat::Csv, &pairs),
            "device,version\nesp1,1.0.4\n"
        );
        let json: serde_json::Value =
            serde_json::from_str(&render_kv(OutputFormat::Json, &pairs)).unwrap();
        assert_eq!(json, serde_json::json!({"device": "esp1", "version": "1.0.4"}));
    }

    #[test]
    fn test_render_rows_json() {
        let rows = [CalibRow {
            index: 0,
            pair: "[1,2]".to_string(),
        }];
        let json: serde_json::Value =
            serde_json::from_str(&render_rows(OutputFormat::Json, &rows)).unwrap();
        assert_eq!(json, serde_json::json!([{"index": 0, "pair": "[1,2]"}]));
    }

    #[test]
    fn test_device_row_without_upload() {
        let row = DeviceRow::from(DeviceRecord {
            id: "esp1".to_string(),
            version: "1.0.3".to_string(),
            file: "firmware_esp1.bin".to_string(),
            size: None,
            sha256: None,
            updated_at: None,
        });
        assert_eq!(row.size, "");
        assert_eq!(row.sha256, "");
    }
}
