pub mod annotator;
pub mod client;
pub mod error;
pub mod export;
pub mod report;
pub mod session;
pub mod settings;

pub use annotator::{
    AnnotatedLine, AnnotatedReport, Annotator, FixSuggestion, RiskBand, RiskScore, Severity,
    SeverityCounts,
};
pub use client::{AnalysisClient, AnalysisResponse, HttpAnalysisClient};
pub use error::{AuditError, SettingsError};
pub use export::{build_export_document, render_export, ExportDocument, ExportFormat, ExportInput};
pub use report::{render_outcome, OutputFormat};
pub use session::{ensure_source, run_analysis, run_raw, AuditOutcome, RawOutcome};
pub use settings::ServiceSettings;
