//! Orchestration of the language-model health risk analysis.
//!
//! One invocation moves from idle through a single request to exactly one
//! of three outcomes: the endpoint's narrative was usable, a conservative
//! fallback was substituted, or no analysis could be produced at all. The
//! last two are kept distinct so callers can tell "here is a safe
//! default" apart from "we don't know".

use crate::models::{RiskTier, SensorReading, WaterAnalysis};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Completion endpoint base URL.
    pub endpoint_url: String,
    /// Bearer token for the endpoint, if it requires one.
    pub api_key: Option<String>,
    pub model_name: String,
    /// Kept low so repeated runs converge on the same risk tier.
    pub temperature: f32,
    /// Hard output cap bounding cost and latency per call.
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            model_name: "qwen/qwen-2.5-72b-instruct".to_string(),
            temperature: 0.3,
            max_tokens: 1500,
            timeout_seconds: 60,
        }
    }
}

/// Message in a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

/// Chat completion API request.
#[derive(Debug, Serialize)]
pub struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

impl CompletionRequest {
    /// The user-message prompt, exposed for assertions in tests.
    #[cfg(test)]
    pub fn user_prompt(&self) -> &str {
        &self.messages[1].content
    }
}

/// Chat completion API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub message: AssistantMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Transport-level failure reaching the completion endpoint.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("cannot connect to completion endpoint at {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
    /// Endpoint reachable but returned a non-success status.
    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode completion response: {0}")]
    Decode(String),
}

/// Failure to even start an orchestration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// No readings exist; no request is made.
    #[error("no sensor readings available for analysis")]
    NoData,
}

/// Outcome of one orchestration.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The endpoint returned a narrative matching the five-field contract.
    Succeeded(WaterAnalysis),
    /// The endpoint responded, but the content could not be trusted; the
    /// fixed conservative narrative was substituted.
    FallbackApplied {
        analysis: WaterAnalysis,
        reason: String,
    },
    /// The endpoint could not be reached; no narrative exists.
    Failed { error: String },
}

impl Verdict {
    /// The narrative to display, when one exists.
    #[allow(dead_code)] // Utility accessor (callers match on the variants directly)
    pub fn analysis(&self) -> Option<&WaterAnalysis> {
        match self {
            Verdict::Succeeded(analysis) => Some(analysis),
            Verdict::FallbackApplied { analysis, .. } => Some(analysis),
            Verdict::Failed { .. } => None,
        }
    }
}

/// Seam over the completion endpoint, so tests can substitute doubles and
/// assert on call counts.
pub trait CompletionBackend: Send + Sync {
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, BackendError>> + Send;
}

/// reqwest-backed completion endpoint client.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint_url: String,
    api_key: Option<String>,
    timeout_seconds: u64,
}

impl HttpBackend {
    pub fn new(config: &OrchestratorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            api_key: config.api_key.clone(),
            timeout_seconds: config.timeout_seconds,
        }
    }
}

impl CompletionBackend for HttpBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, BackendError> {
        let url = format!(
            "{}/chat/completions",
            self.endpoint_url.trim_end_matches('/')
        );

        let mut builder = self.client.post(&url).json(request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout_seconds)
            } else if e.is_connect() {
                BackendError::Connect(self.endpoint_url.clone())
            } else {
                BackendError::Transport(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

/// Drives one request/response cycle against the completion endpoint.
pub struct AnalysisOrchestrator<B> {
    config: OrchestratorConfig,
    backend: B,
}

impl AnalysisOrchestrator<HttpBackend> {
    pub fn new(config: OrchestratorConfig) -> Self {
        let backend = HttpBackend::new(&config);
        Self { config, backend }
    }
}

impl<B: CompletionBackend> AnalysisOrchestrator<B> {
    pub fn with_backend(config: OrchestratorConfig, backend: B) -> Self {
        Self { config, backend }
    }

    /// Analyzes the most recent reading in `readings`.
    ///
    /// Fails fast with [`AnalysisError::NoData`] on an empty set; no
    /// request is made in that case.
    pub async fn analyze_latest(
        &self,
        readings: &[SensorReading],
    ) -> Result<Verdict, AnalysisError> {
        let latest = readings
            .iter()
            .max_by_key(|r| r.recorded_at)
            .ok_or(AnalysisError::NoData)?;
        Ok(self.analyze(latest).await)
    }

    /// Runs one orchestration for `reading`.
    ///
    /// Invoking this twice for the same reading is safe; the narrative
    /// text may differ between calls, but the tier should converge under
    /// the low temperature setting. No retries happen here — the endpoint
    /// is metered and not idempotent, so retry policy belongs to the
    /// caller.
    pub async fn analyze(&self, reading: &SensorReading) -> Verdict {
        let request = self.build_request(reading);
        info!(
            "Requesting analysis for reading {} with model {}",
            reading.id, self.config.model_name
        );

        let response = match self.backend.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Completion request failed: {}", e);
                return Verdict::Failed {
                    error: e.to_string(),
                };
            }
        };

        let Some(content) = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        else {
            warn!("Completion response carried no message content, applying fallback");
            return Verdict::FallbackApplied {
                analysis: fallback_analysis(),
                reason: "response carried no message content".to_string(),
            };
        };

        debug!("Received {} bytes of analysis content", content.len());

        match parse_analysis(&content) {
            Ok(analysis) => Verdict::Succeeded(analysis),
            Err(reason) => {
                warn!("Completion content unusable ({}), applying fallback", reason);
                Verdict::FallbackApplied {
                    analysis: fallback_analysis(),
                    reason,
                }
            }
        }
    }

    fn build_request(&self, reading: &SensorReading) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(reading),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        }
    }
}

/// System instruction fixing the language pairing and strict-JSON output.
const SYSTEM_PROMPT: &str = "You are a water quality expert helping rural communities \
understand water safety. Provide accurate, actionable advice in both English and Telugu. \
Always respond with valid JSON only.";

fn prompt_value(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// Builds the user prompt: all seven parameters (literal "N/A" when
/// absent) plus the fixed reference thresholds that pin the model's
/// semantics.
fn build_prompt(reading: &SensorReading) -> String {
    format!(
        "Analyze the following water quality reading and provide causes and precautions \
in both English and Telugu:\n\n\
Water Quality Data:\n\
- pH Level: {}\n\
- Turbidity: {} NTU\n\
- Temperature: {}°C\n\
- Bacterial Count: {} CFU/ml\n\
- Dissolved Oxygen: {} mg/L\n\
- Chlorine Level: {} ppm\n\
- TDS Level: {} ppm\n\n\
Provide a JSON response with the following structure:\n\
{{\n\
  \"causes_en\": \"Detailed explanation of potential causes in English\",\n\
  \"precautions_en\": \"Specific precautions and recommendations in English\",\n\
  \"causes_te\": \"Detailed explanation of potential causes in Telugu\",\n\
  \"precautions_te\": \"Specific precautions and recommendations in Telugu\",\n\
  \"risk_level\": \"low|medium|high\"\n\
}}\n\n\
Consider WHO water quality standards:\n\
- pH: 6.5-8.5 (safe range)\n\
- TDS: <500 ppm (good), 500-1000 ppm (acceptable), >1000 ppm (poor)\n\
- Turbidity: <1 NTU (excellent), 1-4 NTU (good)\n\
- Chlorine: 0.2-0.5 ppm (safe for treated water)\n\n\
Be specific about health risks and actionable precautions. Use clear, simple language \
that rural communities can understand.",
        prompt_value(reading.ph_level),
        prompt_value(reading.turbidity),
        prompt_value(reading.temperature),
        prompt_value(reading.bacterial_count),
        prompt_value(reading.dissolved_oxygen),
        prompt_value(reading.chlorine_level),
        prompt_value(reading.tds_level),
    )
}

/// Parses the model content against the five-field contract.
fn parse_analysis(content: &str) -> Result<WaterAnalysis, String> {
    serde_json::from_str(content)
        .map_err(|e| format!("content does not match the analysis contract: {}", e))
}

/// Fixed conservative narrative substituted when the endpoint's content
/// cannot be trusted. Someone asking about water safety must never be
/// left without guidance, so the substitute errs toward boiling.
pub fn fallback_analysis() -> WaterAnalysis {
    WaterAnalysis {
        causes_en: "Unable to analyze water quality data at this time.".to_string(),
        precautions_en: "Please ensure water is properly treated before consumption. \
Boil water for at least 1 minute if unsure about quality."
            .to_string(),
        causes_te: "ఈ సమయంలో నీటి నాణ్యతను విశ్లేషించలేకపోతున్నాము.".to_string(),
        precautions_te: "నీటి నాణ్యత గురించి అనుమానం ఉంటే తాగే ముందు కనీసం 1 నిమిషం ఉడకబెట్టండి."
            .to_string(),
        risk_level: RiskTier::Medium,
    }
}
