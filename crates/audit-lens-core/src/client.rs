use std::borrow::Cow;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::error::AuditError;
use crate::settings::ServiceSettings;

pub const REPORT_PLACEHOLDER: &str = "No report available.";
pub const SUMMARY_PLACEHOLDER: &str = "No summary available.";

const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// JSON payload returned by the analysis service. Either field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub slither_report: Option<String>,
    #[serde(default)]
    pub llm_summary: Option<String>,
}

impl AnalysisResponse {
    /// Static-analysis report, or a placeholder when missing or empty.
    pub fn report_or_placeholder(&self) -> Cow<'_, str> {
        non_empty_or(self.slither_report.as_deref(), REPORT_PLACEHOLDER)
    }

    /// Narrative summary, or a placeholder when missing or empty.
    pub fn summary_or_placeholder(&self) -> Cow<'_, str> {
        non_empty_or(self.llm_summary.as_deref(), SUMMARY_PLACEHOLDER)
    }
}

fn non_empty_or<'a>(value: Option<&'a str>, placeholder: &'static str) -> Cow<'a, str> {
    match value {
        Some(text) if !text.is_empty() => Cow::Borrowed(text),
        _ => {
            warn!(placeholder, "analysis response field missing; substituting");
            Cow::Borrowed(placeholder)
        }
    }
}

/// Remote contract analysis backend.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Submit source and decode the structured JSON response.
    async fn analyze(&self, code: &str) -> Result<AnalysisResponse>;

    /// Submit source and return the response body untouched.
    async fn analyze_raw(&self, code: &str) -> Result<String>;
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    code: &'a str,
}

/// `reqwest`-backed client posting `{ "code": ... }` to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: Client,
    endpoint: String,
    max_retries: u32,
}

impl HttpAnalysisClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("audit-lens/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .context("failed to build analysis service HTTP client")?;
        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            max_retries: settings.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, code: &str) -> Result<Response> {
        let payload = AnalyzeRequest { code };
        let mut attempt = 0u32;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let response = self.http.post(&self.endpoint).json(&payload).send().await;

            let response = match response {
                Ok(resp) => resp,
                Err(source) => {
                    if attempt >= self.max_retries {
                        return Err(AuditError::Transport {
                            endpoint: self.endpoint.clone(),
                            source,
                        }
                        .into());
                    }
                    warn!(attempt, error = %source, "analysis request failed; retrying");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    attempt += 1;
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                debug!(status = status.as_u16(), attempt, "analysis service responded");
                return Ok(response);
            }
            if status.is_server_error() && attempt < self.max_retries {
                warn!(attempt, status = status.as_u16(), "analysis service error; retrying");
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                attempt += 1;
                continue;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::Service {
                status: status.as_u16(),
                body,
            }
            .into());
        }
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    #[instrument(name = "analysis_request", skip(self, code), fields(endpoint = %self.endpoint, code_len = code.len()))]
    async fn analyze(&self, code: &str) -> Result<AnalysisResponse> {
        let response = self.post(code).await?;
        let body = response
            .text()
            .await
            .map_err(|err| AuditError::InvalidResponse(err.to_string()))?;
        let parsed: AnalysisResponse = serde_json::from_str(&body)
            .map_err(|err| AuditError::InvalidResponse(err.to_string()))?;
        Ok(parsed)
    }

    #[instrument(name = "analysis_request_raw", skip(self, code), fields(endpoint = %self.endpoint, code_len = code.len()))]
    async fn analyze_raw(&self, code: &str) -> Result<String> {
        let response = self.post(code).await?;
        let body = response
            .text()
            .await
            .map_err(|err| AuditError::InvalidResponse(err.to_string()))?;
        Ok(body)
    }
}
