use crate::detection::WindowBounds;
use crate::models::{ActivitySummary, BlacklistEntry};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Summary of one completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub window: WindowBounds,
    pub events_total: usize,
    pub events_kept: usize,
    pub suspects: Vec<ActivitySummary>,
    pub below_threshold: Vec<ActivitySummary>,
    pub pending: Vec<BlacklistEntry>,
    pub banned: Vec<Ipv4Addr>,
    pub blacklist_size: usize,
    pub dry_run: bool,
}

impl RunReport {
    pub fn events_discarded(&self) -> usize {
        self.events_total - self.events_kept
    }
}

/// Output handler for run reports
pub struct OutputHandler {
    format: OutputFormat,
    writer: Option<Box<dyn Write + Send>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Console,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::Jsonl,
            "console" => OutputFormat::Console,
            _ => OutputFormat::Console, // Default
        }
    }
}

impl OutputHandler {
    /// Create a new output handler
    pub fn new(format: OutputFormat, file_path: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let writer: Option<Box<dyn Write + Send>> = match file_path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            None => None,
        };

        Ok(OutputHandler { format, writer })
    }

    /// Build a handler around an arbitrary writer
    pub fn with_writer(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        OutputHandler {
            format,
            writer: Some(writer),
        }
    }

    /// Write a run report
    pub fn write_report(&mut self, report: &RunReport) -> Result<(), Box<dyn std::error::Error>> {
        match &self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(report)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Jsonl => {
                let json = serde_json::to_string(report)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Console => {
                let output = Self::render_console(report);
                self.write_output(&output)?;
            }
        }
        Ok(())
    }

    fn render_console(report: &RunReport) -> String {
        let mut out = format!(
            "Window {} .. {}: {} failed login(s), {} in window, {} discarded\n",
            report.window.lower,
            report.window.upper,
            report.events_total,
            report.events_kept,
            report.events_discarded()
        );
        out.push_str(&format!(
            "Suspects: {}, below threshold: {}, blacklist size: {}\n",
            report.suspects.len(),
            report.below_threshold.len(),
            report.blacklist_size
        ));
        let verb = if report.dry_run { "Would ban" } else { "Banned" };
        for entry in &report.pending {
            out.push_str(&format!(
                "  {} {} ({} attempts; users: {})\n",
                verb,
                entry.address,
                entry.attempt_count,
                entry.users_display()
            ));
        }
        if report.pending.is_empty() {
            out.push_str("  Nothing new to ban\n");
        }
        out
    }

    fn write_output(&mut self, data: &str) -> Result<(), Box<dyn std::error::Error>> {
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", data);
                std::io::stdout().flush()?;
            }
        }
        Ok(())
    }

    /// Flush any buffered output
    pub fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn report() -> RunReport {
        let at = |h| {
            NaiveDate::from_ymd_opt(2024, 3, 14)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        let entry = BlacklistEntry {
            address: Ipv4Addr::new(10, 0, 0, 5),
            last_seen: at(10),
            attempt_count: 6,
            users: BTreeSet::from(["root".to_string(), "admin".to_string()]),
        };
        RunReport {
            window: WindowBounds { lower: at(9), upper: at(10) },
            events_total: 8,
            events_kept: 6,
            suspects: Vec::new(),
            below_threshold: Vec::new(),
            pending: vec![entry],
            banned: vec![Ipv4Addr::new(10, 0, 0, 5)],
            blacklist_size: 1,
            dry_run: false,
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("jsonl"), OutputFormat::Jsonl);
        assert_eq!(OutputFormat::from_str("anything"), OutputFormat::Console);
    }

    #[test]
    fn test_console_rendering() {
        let text = OutputHandler::render_console(&report());
        assert!(text.contains("8 failed login(s), 6 in window, 2 discarded"));
        assert!(text.contains("Banned 10.0.0.5 (6 attempts; users: admin,root)"));
    }

    #[test]
    fn test_jsonl_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");

        let mut handler = OutputHandler::new(OutputFormat::Jsonl, Some(path.clone())).unwrap();
        handler.write_report(&report()).unwrap();
        handler.write_report(&report()).unwrap();
        handler.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["banned"][0], "10.0.0.5");
        assert_eq!(value["pending"][0]["ip"], "10.0.0.5");
    }
}
