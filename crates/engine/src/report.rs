//! Report – the ordered outcome of one diagnostic run, plus renderers.
//!
//! A plain report serializes as an object mapping probe name to display
//! value, in run order. The detailed form adds status, error codes and
//! timings per probe.

use crate::types::*;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt::Write as _;

#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub name: String,
    pub outcome: ProbeOutcome,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub run_id: String,
    pub total_ms: u64,
    entries: Vec<ReportEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Report {
    pub fn new(run_id: String, entries: Vec<ReportEntry>, total_ms: u64) -> Self {
        Self {
            run_id,
            total_ms,
            entries,
        }
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&ProbeOutcome> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.outcome)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: Status) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.status == status)
            .count()
    }

    pub fn render_json(&self) -> Result<String, RenderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_yaml(&self) -> Result<String, RenderError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn render_detailed_json(&self) -> Result<String, RenderError> {
        Ok(serde_json::to_string_pretty(&self.detailed())?)
    }

    /// Human-readable text: each probe name underlined with dashes, nested
    /// mappings flattened one level as indented `key: value` lines, and a
    /// separator after every entry.
    pub fn render_human(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let _ = writeln!(out, "{}:", entry.name);
            let _ = writeln!(out, "{}", "-".repeat(entry.name.chars().count()));
            match entry.outcome.display_value() {
                value @ (ProbeValue::Text(_) | ProbeValue::Tuple(_)) => {
                    let _ = writeln!(out, "{}", value);
                }
                ProbeValue::Map(fields) => {
                    for (k, v) in fields {
                        let _ = writeln!(out, "  {}: {}", k, v);
                    }
                }
            }
            let _ = writeln!(out, "{}", "=".repeat(40));
        }
        out
    }

    pub fn detailed(&self) -> DetailedReport<'_> {
        DetailedReport {
            run_id: &self.run_id,
            env_summary: EnvSummary::default(),
            total_ms: self.total_ms,
            summary: Summary {
                pass: self.count(Status::Pass),
                fail: self.count(Status::Fail),
                skip: self.count(Status::Skip),
                error: self.count(Status::Error),
            },
            results: self
                .entries
                .iter()
                .map(|e| DetailedEntry {
                    name: &e.name,
                    status: e.outcome.status,
                    value: e.outcome.display_value(),
                    error: e.outcome.error.as_ref(),
                    timing_ms: e.outcome.timing_ms,
                })
                .collect(),
        }
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.outcome.display_value())?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Detailed envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DetailedReport<'a> {
    pub run_id: &'a str,
    pub env_summary: EnvSummary,
    pub total_ms: u64,
    pub summary: Summary,
    pub results: Vec<DetailedEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub pass: usize,
    pub fail: usize,
    pub skip: usize,
    pub error: usize,
}

#[derive(Debug, Serialize)]
pub struct DetailedEntry<'a> {
    pub name: &'a str,
    pub status: Status,
    pub value: ProbeValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a ErrorInfo>,
    pub timing_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, outcome: ProbeOutcome) -> ReportEntry {
        ReportEntry {
            name: name.to_string(),
            outcome,
        }
    }

    fn sample() -> Report {
        Report::new(
            "run-1".into(),
            vec![
                entry("CPU Info", ProbeOutcome::pass(ProbeValue::text("ARMv7 Processor rev 4 (v7l)"), 1)),
                entry(
                    "Raspberry Pi Version",
                    ProbeOutcome::pass(
                        ProbeValue::map([("sub1", "x"), ("sub2", "y")]),
                        2,
                    ),
                ),
                entry(
                    "SD Card Performance",
                    ProbeOutcome::pass(ProbeValue::tuple(["Write: 20 MB/s", "Read: 40 MB/s"]), 3),
                ),
                entry(
                    "Bluetooth Availability",
                    ProbeOutcome::failure(Status::Skip, ErrorCode::Unsupported, "Not available", 0),
                ),
                entry(
                    "Uptime",
                    ProbeOutcome::failure(Status::Error, ErrorCode::IoError, "io error: gone", 0),
                ),
            ],
            6,
        )
    }

    #[test]
    fn test_empty_report_renders_empty() {
        let r = Report::new("r".into(), vec![], 0);
        assert_eq!(r.render_human(), "");
        assert_eq!(r.render_json().unwrap(), "{}");
    }

    #[test]
    fn test_json_preserves_order_and_shapes() {
        let json = sample().render_json().unwrap();
        let cpu = json.find("CPU Info").unwrap();
        let ver = json.find("Raspberry Pi Version").unwrap();
        let up = json.find("Uptime").unwrap();
        assert!(cpu < ver && ver < up);

        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["Raspberry Pi Version"]["sub2"], "y");
        assert_eq!(v["SD Card Performance"][1], "Read: 40 MB/s");
        assert_eq!(v["Bluetooth Availability"], "Not available");
        assert_eq!(v["Uptime"], "probe failed: io error: gone");
    }

    #[test]
    fn test_human_flattens_nested_mapping() {
        let text = sample().render_human();
        let lines: Vec<&str> = text.lines().collect();
        let idx = lines
            .iter()
            .position(|l| *l == "Raspberry Pi Version:")
            .unwrap();
        assert_eq!(lines[idx + 1], "-".repeat("Raspberry Pi Version".len()));
        assert_eq!(lines[idx + 2], "  sub1: x");
        assert_eq!(lines[idx + 3], "  sub2: y");
        assert_eq!(lines[idx + 4], "=".repeat(40));
    }

    #[test]
    fn test_human_prints_tuples_and_text() {
        let text = sample().render_human();
        assert!(text.contains("CPU Info:\n--------\nARMv7 Processor rev 4 (v7l)\n"));
        assert!(text.contains("\n(Write: 20 MB/s, Read: 40 MB/s)\n"));
        assert!(text.contains("Bluetooth Availability:\n----------------------\nNot available\n"));
    }

    #[test]
    fn test_yaml_render() {
        let yaml = sample().render_yaml().unwrap();
        assert!(yaml.contains("CPU Info: ARMv7 Processor rev 4 (v7l)"));
        assert!(yaml.contains("  sub1: x"));
    }

    #[test]
    fn test_detailed_envelope() {
        let report = sample();
        let v: serde_json::Value =
            serde_json::from_str(&report.render_detailed_json().unwrap()).unwrap();
        assert_eq!(v["run_id"], "run-1");
        assert_eq!(v["summary"]["pass"], 3);
        assert_eq!(v["summary"]["skip"], 1);
        assert_eq!(v["summary"]["error"], 1);
        assert_eq!(v["results"][3]["status"], "skip");
        assert_eq!(v["results"][3]["error"]["code"], "UNSUPPORTED");
        assert!(v["results"][0].get("error").is_none());
    }
}
