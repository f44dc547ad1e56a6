//! Simulator output formatting.
//!
//! Text output is styled with `console`; JSON output prints the serialized
//! report only.

use console::style;
use serde::Serialize;

use crate::cli::scenario::{ScenarioReport, StepReport};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMATTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Output formatter for the simulator
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create new formatter
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Get format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.format == OutputFormat::Text {
            println!("{} {}", style("✓").green(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                eprintln!("{}", json);
            }
            OutputFormat::Text => eprintln!("{} {}", style("✗").red(), message),
        }
    }

    /// Print section header
    pub fn section(&self, title: &str) {
        if self.format == OutputFormat::Text {
            println!();
            println!("{}", style(format!("=== {} ===", title)).cyan().bold());
            println!();
        }
    }

    /// Print key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.format == OutputFormat::Text {
            println!("{}: {}", style(key).bold(), value);
        }
    }

    /// Print one step result
    pub fn step(&self, report: &StepReport) {
        if self.format != OutputFormat::Text {
            return;
        }
        let index = style(format!("[{:>3}]", report.step)).dim();
        match report.expected_error {
            None => println!("{} {} {}", index, style("ok").green(), report.detail),
            Some(name) => println!(
                "{} {} {} ({})",
                index,
                style("reverted").yellow(),
                style(name).yellow().bold(),
                report.detail
            ),
        }
    }

    /// Print a whole run
    pub fn report(&self, report: &ScenarioReport) {
        if self.format == OutputFormat::Json {
            self.print_json(report);
            return;
        }

        self.section(&format!("Scenario: {}", report.name));
        for step in &report.steps {
            self.step(step);
        }

        self.section("Accounts");
        let rows: Vec<Vec<String>> = report
            .accounts
            .iter()
            .map(|a| {
                vec![
                    a.label.clone(),
                    a.address.short(),
                    a.collateral_value_usd.clone(),
                    a.debt.clone(),
                    a.health_factor.clone(),
                ]
            })
            .collect();
        self.table(&["account", "address", "collateral usd", "debt", "health"], &rows);

        println!();
        self.kv("Total debt", &report.total_debt);
        self.kv("State hash", &report.state_hash);
    }

    /// Print a table
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if self.format == OutputFormat::Text {
            println!("{}", render_table(headers, rows));
        }
    }

    fn print_json<T: Serialize>(&self, data: &T) {
        match serde_json::to_string_pretty(data) {
            Ok(json) => println!("{}", json),
            Err(e) => self.error(&e.to_string()),
        }
    }
}

/// Render rows under headers with `|` separated, padded columns
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = vec![padded_line(headers.iter().copied(), &widths)];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in rows {
        out.push(padded_line(row.iter().map(String::as_str), &widths));
    }
    out.join("\n")
}

fn padded_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render_table() {
        let rows = vec![
            vec!["alice".to_string(), "0.9".to_string()],
            vec!["bob".to_string(), "18".to_string()],
        ];
        let table = render_table(&["account", "health"], &rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "account | health");
        assert_eq!(lines[1], "--------+-------");
        assert_eq!(lines[2], "alice   | 0.9   ");
        assert!(render_table(&[], &rows).is_empty());
    }
}
