//! AI analysis orchestration.
//!
//! This module drives the request/response cycle against the external
//! language-model completion endpoint and turns its output into a
//! structured bilingual verdict.

mod orchestrator;

pub use orchestrator::{
    fallback_analysis, AnalysisError, AnalysisOrchestrator, AssistantMessage, BackendError,
    Choice, CompletionBackend, CompletionRequest, CompletionResponse, HttpBackend,
    OrchestratorConfig, Verdict,
};
