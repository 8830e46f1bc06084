use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use audit_lens_core::{
    ensure_source, render_export, render_outcome, run_analysis, run_raw, Annotator, AuditError,
    ExportFormat, HttpAnalysisClient, OutputFormat, ServiceSettings,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EMPTY_INPUT_MESSAGE: &str = "Please provide some Solidity code!";
const ANALYSIS_FAILED_MESSAGE: &str = "Error analyzing contract.";

#[derive(Parser, Debug)]
#[command(
    name = "audit-lens",
    author,
    version,
    about = "Smart contract audit report CLI"
)]
struct Cli {
    /// Config file (TOML, YAML or JSON) with a `service` table
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Analysis service endpoint; overrides environment and config file
    #[arg(long, value_name = "URL", global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit contract source to the analysis service and show the annotated report
    Analyze {
        /// Solidity source file; reads stdin when omitted
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = FormatArg::Human)]
        format: FormatArg,

        /// Write the report to this path as well
        #[arg(long, value_name = "PATH", conflicts_with = "raw")]
        export: Option<PathBuf>,

        /// Export encoding; inferred from the export path extension when omitted
        #[arg(long, value_enum, requires = "export")]
        export_format: Option<ExportFormatArg>,

        /// Print the service response verbatim without scoring or annotation
        #[arg(long)]
        raw: bool,

        /// Disable ANSI colours in human output
        #[arg(long)]
        no_color: bool,
    },
    /// Compute the risk score of an existing analyzer report
    Score {
        /// Report file; reads stdin when omitted
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Emit JSON instead of a human-readable line
        #[arg(long)]
        json: bool,
    },
    /// Annotate an existing analyzer report with highlights and fix suggestions
    Annotate {
        /// Report file; reads stdin when omitted
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Emit the flattened plain-text variant instead of HTML
        #[arg(long)]
        plain: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Human,
    Json,
    Yaml,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Human => OutputFormat::Human,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Yaml => OutputFormat::Yaml,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormatArg {
    Text,
    Html,
    Pdf,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(value: ExportFormatArg) -> Self {
        match value {
            ExportFormatArg::Text => ExportFormat::Text,
            ExportFormatArg::Html => ExportFormat::Html,
            ExportFormatArg::Pdf => ExportFormat::Pdf,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    service: ServiceSection,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceSection {
    endpoint: Option<String>,
    timeout: Option<String>,
    max_retries: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    match &cli.command {
        Commands::Analyze {
            input,
            format,
            export,
            export_format,
            raw,
            no_color,
        } => {
            let options = AnalyzeOptions {
                format: (*format).into(),
                export: export.as_deref(),
                export_format: (*export_format).map(Into::into),
                raw: *raw,
                color: !*no_color && std::io::stdout().is_terminal(),
            };
            analyze(&cli, input.as_deref(), options).await
        }
        Commands::Score { input, json } => {
            score(input.as_deref(), *json).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Annotate { input, plain } => {
            annotate(input.as_deref(), *plain).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

struct AnalyzeOptions<'a> {
    format: OutputFormat,
    export: Option<&'a Path>,
    export_format: Option<ExportFormat>,
    raw: bool,
    color: bool,
}

async fn analyze(cli: &Cli, input: Option<&Path>, options: AnalyzeOptions<'_>) -> Result<ExitCode> {
    // A bad export target is a usage error; surface it before any request is made.
    let export = match options.export {
        Some(path) => {
            let format = match options.export_format {
                Some(format) => format,
                None => ExportFormat::from_path(path)?,
            };
            Some((path, format))
        }
        None => None,
    };

    let code = read_input(input).await?;
    if let Err(err) = ensure_source(&code) {
        return Ok(report_failure(&anyhow::Error::from(err)));
    }
    let settings = load_settings(cli)?;
    let client = HttpAnalysisClient::new(&settings)?;
    info!(endpoint = client.endpoint(), raw = options.raw, "submitting contract");

    if options.raw {
        return match run_raw(&client, &code).await {
            Ok(outcome) => {
                println!("{}", outcome.body);
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => Ok(report_failure(&err)),
        };
    }

    let annotator = Annotator::new()?;
    let outcome = match run_analysis(&client, &annotator, &code).await {
        Ok(outcome) => outcome,
        Err(err) => return Ok(report_failure(&err)),
    };
    let rendered_export = match export {
        Some((path, format)) => match render_export(&outcome.export_input(), format) {
            Ok(bytes) => Some((path, format, bytes)),
            Err(err) => return Ok(report_failure(&err)),
        },
        None => None,
    };

    print!(
        "{}",
        render_outcome(&outcome, options.format, options.color)?
    );
    if !matches!(options.format, OutputFormat::Human) {
        println!();
    }

    if let Some((path, format, bytes)) = rendered_export {
        let written = tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("failed to write export to {}", path.display()));
        if let Err(err) = written {
            return Ok(report_failure(&err));
        }
        info!(path = %path.display(), ?format, bytes = bytes.len(), "wrote export");
    }
    Ok(ExitCode::SUCCESS)
}

fn report_failure(err: &anyhow::Error) -> ExitCode {
    if matches!(err.downcast_ref::<AuditError>(), Some(AuditError::EmptyInput)) {
        warn!("no contract source provided");
        eprintln!("{EMPTY_INPUT_MESSAGE}");
    } else {
        error!(error = ?err, "analysis failed");
        eprintln!("{ANALYSIS_FAILED_MESSAGE}");
    }
    ExitCode::FAILURE
}

async fn score(input: Option<&Path>, json: bool) -> Result<()> {
    let report = read_input(input).await?;
    let annotator = Annotator::new()?;
    let counts = annotator.count_markers(&report);
    let score = annotator.compute_risk_score(&report);
    if json {
        let value = serde_json::json!({
            "risk_score": score.value(),
            "risk_band": score.band(),
            "counts": counts,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Risk Score: {} ({:?})", score, score.band());
    }
    Ok(())
}

async fn annotate(input: Option<&Path>, plain: bool) -> Result<()> {
    let report = read_input(input).await?;
    let annotated = Annotator::new()?.annotate(&report);
    if plain {
        println!("{}", annotated.plain_text);
    } else {
        println!("{}", annotated.html);
    }
    Ok(())
}

async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}

/// Defaults, then environment, then the config file, then `--endpoint`.
fn load_settings(cli: &Cli) -> Result<ServiceSettings> {
    let mut settings = ServiceSettings::from_env()?;
    if let Some(path) = &cli.config {
        let file: FileConfig = config::Config::builder()
            .add_source(config::File::from(path.as_path()))
            .build()
            .with_context(|| format!("failed to load config from {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("invalid config structure in {}", path.display()))?;
        if let Some(endpoint) = file.service.endpoint.as_deref() {
            settings.set_endpoint("service.endpoint", endpoint)?;
        }
        if let Some(timeout) = file.service.timeout.as_deref() {
            settings.set_timeout("service.timeout", timeout)?;
        }
        if let Some(retries) = file.service.max_retries.as_deref() {
            settings.set_max_retries("service.max_retries", retries)?;
        }
    }
    if let Some(endpoint) = cli.endpoint.as_deref() {
        settings.set_endpoint("--endpoint", endpoint)?;
    }
    Ok(settings)
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
