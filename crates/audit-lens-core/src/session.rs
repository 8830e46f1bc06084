use anyhow::Result;
use serde::Serialize;
use tracing::{info, instrument};

use crate::annotator::{AnnotatedReport, Annotator, RiskBand, RiskScore, SeverityCounts};
use crate::client::AnalysisClient;
use crate::error::AuditError;
use crate::export::{build_export_document, ExportDocument, ExportInput};

/// Everything produced by one annotated analysis. Owned by the caller; nothing is cached.
#[derive(Debug, Clone, Serialize)]
pub struct AuditOutcome {
    pub summary: String,
    pub report: String,
    pub counts: SeverityCounts,
    pub score: RiskScore,
    pub band: RiskBand,
    pub annotated: AnnotatedReport,
    pub export: ExportDocument,
}

impl AuditOutcome {
    /// Score, annotate and flatten an already-fetched summary/report pair.
    pub fn from_parts(annotator: &Annotator, summary: &str, report: &str) -> Self {
        let counts = annotator.count_markers(report);
        let score = RiskScore::from_counts(&counts);
        let annotated = annotator.annotate(report);
        let export = build_export_document(summary, &annotated.plain_text);
        Self {
            summary: summary.to_string(),
            report: report.to_string(),
            counts,
            score,
            band: score.band(),
            annotated,
            export,
        }
    }

    pub fn export_input(&self) -> ExportInput<'_> {
        ExportInput {
            summary: &self.summary,
            score: self.score,
            annotated: &self.annotated,
            document: &self.export,
        }
    }
}

/// Unannotated response body from the plain-text flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawOutcome {
    pub body: String,
}

/// Reject blank contract source before anything touches the network.
pub fn ensure_source(code: &str) -> Result<(), AuditError> {
    if code.trim().is_empty() {
        return Err(AuditError::EmptyInput);
    }
    Ok(())
}

/// Submit source, then score and annotate the returned report.
#[instrument(name = "run_analysis", skip_all, fields(code_len = code.len()))]
pub async fn run_analysis<C>(
    client: &C,
    annotator: &Annotator,
    code: &str,
) -> Result<AuditOutcome>
where
    C: AnalysisClient + ?Sized,
{
    ensure_source(code)?;
    let response = client.analyze(code).await?;
    let summary = response.summary_or_placeholder();
    let report = response.report_or_placeholder();
    let outcome = AuditOutcome::from_parts(annotator, &summary, &report);
    info!(
        score = outcome.score.value(),
        band = ?outcome.band,
        lines = outcome.annotated.lines.len(),
        "analysis complete"
    );
    Ok(outcome)
}

/// Submit source and hand back the response body as-is.
#[instrument(name = "run_raw", skip_all, fields(code_len = code.len()))]
pub async fn run_raw<C>(client: &C, code: &str) -> Result<RawOutcome>
where
    C: AnalysisClient + ?Sized,
{
    ensure_source(code)?;
    let body = client.analyze_raw(code).await?;
    info!(body_len = body.len(), "raw analysis complete");
    Ok(RawOutcome { body })
}
