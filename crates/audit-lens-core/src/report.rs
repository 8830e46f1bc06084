use std::fmt::Write;

use colored::Colorize;
use serde::Serialize;

use crate::annotator::{RiskBand, RiskScore, Severity, SeverityCounts};
use crate::export::REPORT_HEADER;
use crate::session::AuditOutcome;

const BAR_CELLS: usize = 20;

/// Format styles supported by the terminal reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Produce a report string from an `AuditOutcome` using the desired format.
pub fn render_outcome(
    outcome: &AuditOutcome,
    format: OutputFormat,
    color: bool,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(outcome, color),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonReport::from(outcome))?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(&JsonReport::from(outcome))?),
    }
}

fn render_human(outcome: &AuditOutcome, color: bool) -> anyhow::Result<String> {
    let mut out = String::new();
    let score_line = format!("Risk Score: {} ({:?})", outcome.score, outcome.band);
    if color {
        writeln!(out, "{}", paint_band(&score_line, outcome.band))?;
    } else {
        writeln!(out, "{score_line}")?;
    }
    writeln!(out, "{}", score_bar(outcome.score))?;
    writeln!(
        out,
        "Markers: {} total ({} error(s), {} warning(s), {} info(s))",
        outcome.counts.total(),
        outcome.counts.errors,
        outcome.counts.warnings,
        outcome.counts.infos
    )?;
    writeln!(
        out,
        "Suggestions: {}",
        outcome.annotated.suggestions().count()
    )?;
    writeln!(out)?;
    writeln!(out, "Summary:")?;
    writeln!(out, "{}", outcome.summary)?;
    writeln!(out)?;
    writeln!(out, "{REPORT_HEADER}")?;

    for (idx, line) in outcome.annotated.lines.iter().enumerate() {
        if idx > 0 {
            writeln!(out)?;
        }
        if color {
            writeln!(out, "{}", paint_markers(&line.text))?;
        } else {
            writeln!(out, "{}", line.text)?;
        }
        if let Some(suggestion) = line.suggestion {
            if color {
                writeln!(out, "{}", suggestion.text().italic())?;
            } else {
                writeln!(out, "{}", suggestion.text())?;
            }
        }
    }

    Ok(out)
}

/// Text bar of `BAR_CELLS` cells, filled proportionally to the score.
fn score_bar(score: RiskScore) -> String {
    let filled = usize::from(score.value()) * BAR_CELLS / 100;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(BAR_CELLS - filled)
    )
}

fn paint_band(text: &str, band: RiskBand) -> String {
    match band {
        RiskBand::Low => text.green().bold().to_string(),
        RiskBand::Medium => text.yellow().bold().to_string(),
        RiskBand::High => text.red().bold().to_string(),
    }
}

fn paint_markers(line: &str) -> String {
    Severity::ALL.iter().fold(line.to_string(), |acc, severity| {
        let marker = severity.marker();
        let painted = match severity {
            Severity::Error => marker.red().bold(),
            Severity::Warning => marker.yellow().bold(),
            Severity::Info => marker.blue().bold(),
        };
        acc.replace(marker, &painted.to_string())
    })
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    risk_score: u8,
    risk_band: RiskBand,
    counts: SeverityCounts,
    summary: &'a str,
    lines: Vec<JsonLine<'a>>,
    export: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonLine<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'static str>,
}

impl<'a> From<&'a AuditOutcome> for JsonReport<'a> {
    fn from(outcome: &'a AuditOutcome) -> Self {
        Self {
            risk_score: outcome.score.value(),
            risk_band: outcome.band,
            counts: outcome.counts,
            summary: &outcome.summary,
            lines: outcome
                .annotated
                .lines
                .iter()
                .map(|line| JsonLine {
                    text: &line.text,
                    suggestion: line.suggestion.map(|s| s.text()),
                })
                .collect(),
            export: outcome.export.as_str(),
        }
    }
}
