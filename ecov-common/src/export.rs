//! Export serializers
//!
//! - Portfolio → CSV (one row per company, every field quoted)
//! - Report → plain-text document (title, subject, GreenScore, verdict, sources)
//!
//! Both are pure functions of their input; the `save_*` helpers write the
//! result under a directory and do nothing when there is nothing selected.

use crate::models::{Portfolio, Report, ReportKind};
use crate::{score, time, Result};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// CSV header row
pub const CSV_HEADER: [&str; 5] = ["Company", "Score", "Label", "AddedDate", "LastUpdated"];

/// Title line of the report document
pub const REPORT_TITLE: &str = "EcoVerifier Sustainability Report";

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn csv_row<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| quote(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Serialize a portfolio to CSV, companies in display order
pub fn portfolio_to_csv(portfolio: &Portfolio) -> String {
    let mut lines = Vec::with_capacity(portfolio.companies.len() + 1);
    lines.push(csv_row(CSV_HEADER));
    for company in &portfolio.companies {
        let s = company.clamped_score();
        lines.push(csv_row([
            company.company_name.clone(),
            s.to_string(),
            score::label(s).to_string(),
            time::to_date(&company.added_at),
            time::to_date(&company.last_updated),
        ]));
    }
    lines.join("\n")
}

/// File name for a portfolio export: non-alphanumerics become `_`
pub fn csv_file_name(portfolio: &Portfolio) -> String {
    let stem: String = portfolio
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_portfolio.csv", stem)
}

/// Write the CSV export into `dir`. Returns `None` when no portfolio is given.
pub fn save_portfolio_csv(portfolio: Option<&Portfolio>, dir: &Path) -> Result<Option<PathBuf>> {
    let Some(portfolio) = portfolio else {
        return Ok(None);
    };
    let path = dir.join(csv_file_name(portfolio));
    std::fs::write(&path, portfolio_to_csv(portfolio))?;
    tracing::info!(portfolio_id = %portfolio.id, path = %path.display(), "Exported portfolio CSV");
    Ok(Some(path))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Render a report as a human-readable document
pub fn report_to_text(report: &Report) -> String {
    ReportDocument(report).to_string()
}

/// Plain-text rendering of one report
pub struct ReportDocument<'a>(pub &'a Report);

impl fmt::Display for ReportDocument<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let payload = &report.payload;

        writeln!(out, "{}", REPORT_TITLE)?;
        writeln!(out, "{}", "=".repeat(REPORT_TITLE.len()))?;
        writeln!(out)?;
        let subject_heading = match report.kind {
            ReportKind::Audit => "Company",
            ReportKind::Claim => "Claim",
        };
        writeln!(out, "{}: {}", subject_heading, report.subject_name)?;
        writeln!(out, "Created: {}", time::to_iso(&report.created_at))?;

        if let Some(raw) = report.score() {
            let s = score::clamp(raw);
            writeln!(out)?;
            writeln!(out, "GreenScore: {} ({})", s, score::label(s))?;
            if let Some(greenscore) = payload.get("greenscore") {
                if let Some(base) = greenscore.get("base_score").and_then(Value::as_f64) {
                    writeln!(out, "Base score: {}", score::clamp(base))?;
                }
                if let Some(rationale) = str_field(greenscore, "rationale") {
                    writeln!(out, "Rationale: {}", rationale)?;
                }
                if let Some(factors) = greenscore.get("factors").and_then(Value::as_array) {
                    for factor in factors {
                        let text = factor
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| factor.to_string());
                        writeln!(out, "  - {}", text)?;
                    }
                }
            }
        }

        if let Some(restated) = str_field(payload, "restated_claim") {
            writeln!(out)?;
            writeln!(out, "Restated Claim:")?;
            writeln!(out, "{}", restated)?;
        }

        let verdict = str_field(payload, "verdict");
        let explanation = str_field(payload, "explanation");
        if verdict.is_some() || explanation.is_some() {
            writeln!(out)?;
            writeln!(out, "Evaluation:")?;
            if let Some(v) = verdict {
                writeln!(out, "Verdict: {}", v)?;
            }
            if let Some(e) = explanation {
                writeln!(out, "{}", e)?;
            }
        }

        let sources = payload
            .get("sources")
            .and_then(Value::as_array)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                payload
                    .get("eco_audit")
                    .and_then(|a| a.get("findings"))
                    .and_then(Value::as_array)
            });
        if let Some(sources) = sources.filter(|s| !s.is_empty()) {
            writeln!(out)?;
            writeln!(out, "Sources:")?;
            for (index, source) in sources.iter().enumerate() {
                let title = str_field(source, "title").unwrap_or("Untitled source");
                writeln!(out, "{}. {}", index + 1, title)?;
                for (label, key) in [
                    ("URL", "url"),
                    ("Domain", "source_domain"),
                    ("Summary", "summary"),
                    ("Strengths", "strengths"),
                    ("Limitations", "limitations"),
                ] {
                    if let Some(text) = str_field(source, key) {
                        writeln!(out, "   {}: {}", label, text)?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Write the report document into `dir`. Returns `None` when no report is given.
pub fn save_report_text(report: Option<&Report>, dir: &Path) -> Result<Option<PathBuf>> {
    let Some(report) = report else {
        return Ok(None);
    };
    let path = dir.join(format!("ecoverifier_report_{}.txt", report.id));
    std::fs::write(&path, report_to_text(report))?;
    tracing::info!(report_id = %report.id, path = %path.display(), "Exported report document");
    Ok(Some(path))
}
