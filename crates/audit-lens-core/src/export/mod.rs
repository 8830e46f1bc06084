use std::path::Path;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::annotator::{AnnotatedReport, RiskScore};

pub mod pdf;

pub use pdf::render_pdf;

/// Heading placed between the summary and the annotated report.
pub const REPORT_HEADER: &str = "Slither Report:";
/// Content used when an export is requested before any analysis has run.
pub const EMPTY_EXPORT: &str = "No report available.";

/// Flattened, human-readable document handed to the exporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    text: String,
}

impl ExportDocument {
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for ExportDocument {
    fn default() -> Self {
        Self {
            text: EMPTY_EXPORT.to_string(),
        }
    }
}

/// Join the summary and the plain-text annotated report under a fixed header.
pub fn build_export_document(summary: &str, annotated_plain_text: &str) -> ExportDocument {
    ExportDocument {
        text: format!("{summary}\n\n{REPORT_HEADER}\n{annotated_plain_text}"),
    }
}

/// Output encodings supported for exported reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Text,
    Html,
    Pdf,
}

impl ExportFormat {
    /// Infer the format from a file extension (`.txt`, `.html`/`.htm`, `.pdf`).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("txt") | Some("text") | Some("md") => Ok(Self::Text),
            Some("html") | Some("htm") => Ok(Self::Html),
            Some("pdf") => Ok(Self::Pdf),
            _ => bail!(
                "cannot infer export format from `{}`; use .txt, .html or .pdf",
                path.display()
            ),
        }
    }
}

/// Everything an exporter may need; the HTML page uses the markup, the rest the flat text.
#[derive(Debug, Clone, Copy)]
pub struct ExportInput<'a> {
    pub summary: &'a str,
    pub score: RiskScore,
    pub annotated: &'a AnnotatedReport,
    pub document: &'a ExportDocument,
}

/// Render an export into bytes ready to be written to disk.
pub fn render_export(input: &ExportInput<'_>, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Text => Ok(input.document.as_str().as_bytes().to_vec()),
        ExportFormat::Html => Ok(render_html_page(input).into_bytes()),
        ExportFormat::Pdf => render_pdf(input.document),
    }
}

fn render_html_page(input: &ExportInput<'_>) -> String {
    let band = input.score.band();
    let summary = input
        .summary
        .split("\n\n")
        .filter(|para| !para.trim().is_empty())
        .map(|para| format!("<p>{}</p>", html_escape(para).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Smart Contract Audit Report</title>
</head>
<body>
    <div class="risk-score-bar">
        <div style="width:{value}%;background:{color}">&nbsp;</div>
        <span>{score}</span>
    </div>
    {summary}<br><br>
    <strong>{header}</strong><br>{report}
</body>
</html>
"#,
        value = input.score.value(),
        color = band.color(),
        score = input.score,
        summary = summary,
        header = REPORT_HEADER,
        report = input.annotated.html,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
