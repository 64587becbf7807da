use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::runner::{select_runner, Runner};
use crate::types::{ResultSet, TestResult};

/// One row of the report for one tested socket.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub protocol: Runner,
    pub pass: bool,
    pub response_code: Option<u16>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl From<&TestResult> for ReportEntry {
    fn from(r: &TestResult) -> Self {
        Self {
            id: r.socket.id.clone(),
            name: r.socket.display_name().to_string(),
            host: r.socket.host.clone(),
            port: r.socket.port,
            protocol: select_runner(&r.socket),
            pass: r.pass,
            response_code: r.response_code,
            error: r.error.as_ref().map(ToString::to_string),
            timestamp: now_iso_like(),
        }
    }
}

/// Aggregate outcome of one run, handed to whatever reports or notifies.
#[derive(Serialize, Debug, Clone, Default)]
pub struct Report {
    pub total: usize,
    pub failed: usize,
    pub results: ResultSet,
    pub failures: Vec<String>,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one result in. Only the single collector calls this.
    pub fn record(&mut self, result: TestResult) {
        self.total += 1;
        if !result.pass {
            self.failed += 1;
            self.failures.push(result.to_string());
        }
        self.entries.push(ReportEntry::from(&result));
        self.results.insert(result.socket.id, result.pass);
    }

    /// Finish the run: order rows by id so output does not depend on completion order.
    pub fn freeze(mut self) -> Self {
        self.entries.sort_by(|a, b| a.id.cmp(&b.id));
        self.failures.sort();
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.failed == 0
    }
}

const NAME_COLUMN_MAX: usize = 40;

/// First `max` characters of `s`, never splitting a UTF-8 sequence.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn print_report_table(report: &Report) {
    let mut id_w = "id".len();
    let mut name_w = "name".len();
    for e in &report.entries {
        id_w = id_w.max(e.id.chars().count());
        name_w = name_w.max(e.name.chars().count().min(NAME_COLUMN_MAX));
    }
    let proto_w = "proto".len();
    let pass_w = "pass".len();
    let code_w = "code".len();

    println!(
        "\nSockets: {} (failed: {})",
        report.total, report.failed
    );
    println!(
        "{:<id_w$}  {:<name_w$}  {:<proto_w$}  {:<pass_w$}  {:>code_w$}  error",
        "id", "name", "proto", "pass", "code",
    );
    println!(
        "{:-<id_w$}  {:-<name_w$}  {:-<proto_w$}  {:-<pass_w$}  {:-<code_w$}  -----",
        "", "", "", "", "",
    );
    for e in &report.entries {
        let name = truncate_chars(&e.name, NAME_COLUMN_MAX);
        let code = e.response_code.map(|c| c.to_string()).unwrap_or_default();
        println!(
            "{:<id_w$}  {:<name_w$}  {:<proto_w$}  {:<pass_w$}  {:>code_w$}  {}",
            e.id,
            name,
            e.protocol.as_str(),
            if e.pass { "ok" } else { "FAIL" },
            code,
            e.error.as_deref().unwrap_or(""),
        );
    }
}

pub fn write_report_json(path: &Path, report: &Report) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create report file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

fn now_iso_like() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
