//! Analysis Result - Output structure of the pipeline.
//!
//! `AnalysisResult` is a pure function of the request, the policy snapshot
//! and the configuration. Request ids and timestamps live only in the
//! `AnalysisResponse` envelope.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::signals::{ResolutionPrediction, SignalCapability, SignalOrigin};
use crate::analysis::compliance::ComplianceReport;
use crate::analysis::domain::DomainSelection;
use crate::analysis::exposure::ExposureReport;
use crate::analysis::intent::IntentAnalysis;
use crate::analysis::language::LanguageAnalysis;
use crate::analysis::performance::AgentPerformance;
use crate::analysis::risk::RiskAssessment;
use crate::analysis::sentiment::SentimentReport;
use crate::analysis::tone::ToneReport;
use crate::error::AppError;

/// Orchestrator states. `Done` and `Degraded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    DomainSelected,
    StagesRunning,
    Merged,
    Done,
    /// At least one stage failed or missed the deadline.
    Degraded,
}

/// The four deterministic passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compliance,
    Exposure,
    Sentiment,
    Tone,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Compliance => "compliance",
            Stage::Exposure => "exposure",
            Stage::Sentiment => "sentiment",
            Stage::Tone => "tone",
        }
    }
}

/// One section of the result: the stage output, or an explicit degraded marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Completed(T),
    Degraded { code: String, message: String },
}

impl<T> StageOutcome<T> {
    pub fn degraded(err: &AppError) -> Self {
        StageOutcome::Degraded {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            StageOutcome::Degraded { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn degraded_code(&self) -> Option<&str> {
        match self {
            StageOutcome::Completed(_) => None,
            StageOutcome::Degraded { code, .. } => Some(code),
        }
    }
}

/// Complete analysis of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Engine configuration version
    pub config_version: String,
    pub lexicon_version: String,
    /// Policy snapshot the request was served from
    pub corpus_generation: u64,
    pub corpus_version: Option<String>,

    pub domain: DomainSelection,
    pub state: PipelineState,
    /// The request deadline expired before every stage finished.
    pub partial: bool,
    pub degraded_stages: Vec<Stage>,
    pub turn_count: usize,

    pub sentiment_analysis: StageOutcome<SentimentReport>,
    pub tone_analysis: StageOutcome<ToneReport>,
    pub compliance: StageOutcome<ComplianceReport>,
    pub exposure_findings: StageOutcome<ExposureReport>,
    pub risk_assessment: RiskAssessment,
    /// Absent when tone or compliance degraded.
    pub agent_performance: Option<AgentPerformance>,

    pub signal_capability: SignalCapability,
    pub signal_origin: SignalOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_fallback_reason: Option<String>,
    pub language_analysis: Option<LanguageAnalysis>,
    pub intent_analysis: Option<IntentAnalysis>,
    pub conversation_summary: Option<String>,
    pub resolution_prediction: Option<ResolutionPrediction>,
}

impl AnalysisResult {
    pub fn is_degraded(&self) -> bool {
        self.state == PipelineState::Degraded
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|e| AppError::Internal(format!("result serialization: {}", e)))
    }
}

/// Response envelope: the deterministic result plus request metadata.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub request_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub result: AnalysisResult,
}

impl AnalysisResponse {
    pub fn new(result: AnalysisResult, elapsed_ms: u64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            analyzed_at: Utc::now(),
            elapsed_ms,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_marker_serialization() {
        let outcome: StageOutcome<u32> = StageOutcome::degraded(&AppError::Stage {
            stage: "tone".into(),
            reason: "boom".into(),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["data"]["code"], "stage_failure");
        assert!(outcome.completed().is_none());
        assert_eq!(outcome.degraded_code(), Some("stage_failure"));
    }

    #[test]
    fn test_completed_serialization() {
        let outcome = StageOutcome::Completed(7u32);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["data"], 7);
        assert!(!outcome.is_degraded());
    }
}
