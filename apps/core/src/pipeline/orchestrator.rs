//! Pipeline Orchestrator - runs one conversation through every engine.
//!
//! `DomainSelected -> StagesRunning -> Merged -> Done | Degraded`
//!
//! The four deterministic passes fan out on the blocking pool and are joined
//! together with the external signal lookup. A failing or late stage turns into
//! a degraded section; it never aborts the request. Risk is synthesized from
//! whatever stages completed, and the agent scorecard from tone and compliance.

use serde::Deserialize;
use std::sync::Arc;
use tokio::task;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

use super::result::{AnalysisResponse, AnalysisResult, PipelineState, Stage, StageOutcome};
use super::signals::{ExternalSignals, SignalProvider, SignalResolver};
use crate::analysis::compliance::ComplianceMatcher;
use crate::analysis::domain::{select_domain, AUTO_DOMAIN};
use crate::analysis::exposure::ExposureDetector;
use crate::analysis::lexicon::Lexicon;
use crate::analysis::performance::AgentPerformance;
use crate::analysis::risk::{RiskInputs, RiskSynthesizer};
use crate::analysis::sentiment::SentimentScorer;
use crate::analysis::tone::{Tone, ToneClassifier};
use crate::config::EngineConfig;
use crate::corpus::PolicyStore;
use crate::error::AppError;
use crate::models::{conversation_from_inputs, Conversation, TurnInput};

fn default_domain() -> String {
    AUTO_DOMAIN.to_string()
}

fn default_true() -> bool {
    true
}

/// A request as received from callers.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnalysisRequest {
    /// Domain name or "auto".
    #[serde(default = "default_domain")]
    pub domain: String,
    #[validate(length(min = 1, message = "conversation has no turns"))]
    pub turns: Vec<TurnInput>,
    /// Precomputed external signals.
    #[serde(default)]
    pub signals: Option<ExternalSignals>,
    /// Whether the configured signal provider may be called.
    #[serde(default = "default_true")]
    pub remote_signals: bool,
}

impl AnalysisRequest {
    pub fn new(domain: impl Into<String>, turns: Vec<TurnInput>) -> Self {
        Self {
            domain: domain.into(),
            turns,
            signals: None,
            remote_signals: true,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let request: Self = serde_json::from_str(raw)?;
        request.validate()?;
        Ok(request)
    }
}

/// Failure injection for stage isolation tests.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InjectedFault {
    Error(Stage),
    Panic(Stage),
}

#[cfg(test)]
fn check_fault(fault: Option<InjectedFault>, stage: Stage) -> Result<(), AppError> {
    match fault {
        Some(InjectedFault::Error(s)) if s == stage => Err(AppError::Stage {
            stage: stage.label().to_string(),
            reason: "injected failure".to_string(),
        }),
        Some(InjectedFault::Panic(s)) if s == stage => panic!("injected panic in {} stage", stage.label()),
        _ => Ok(()),
    }
}

/// Fault hooks compile away outside tests.
#[cfg(not(test))]
type FaultHook = ();

#[cfg(test)]
type FaultHook = Option<InjectedFault>;

#[cfg(not(test))]
fn check_fault(_: FaultHook, _: Stage) -> Result<(), AppError> {
    Ok(())
}

struct Engines {
    compliance: ComplianceMatcher,
    exposure: ExposureDetector,
    sentiment: SentimentScorer,
    tone: ToneClassifier,
}

/// Main orchestrator. Cheap to share behind an `Arc`; holds no per-request state.
pub struct PipelineOrchestrator {
    store: Arc<PolicyStore>,
    config: Arc<EngineConfig>,
    lexicon: Arc<Lexicon>,
    engines: Arc<Engines>,
    risk: RiskSynthesizer,
    signals: SignalResolver,
    #[cfg(test)]
    fault: Option<InjectedFault>,
}

impl PipelineOrchestrator {
    /// Builds every engine from `config` and `lexicon`. The configuration is
    /// validated here; an invalid one is a configuration error.
    pub fn new(
        store: Arc<PolicyStore>,
        config: Arc<EngineConfig>,
        lexicon: Arc<Lexicon>,
    ) -> Result<Self, AppError> {
        config.check()?;

        let engines = Engines {
            compliance: ComplianceMatcher::new(config.compliance.clone(), Arc::clone(&lexicon)),
            exposure: ExposureDetector::new(config.exposure.clone(), Arc::clone(&lexicon)),
            sentiment: SentimentScorer::new(config.sentiment.clone(), Arc::clone(&lexicon)),
            tone: ToneClassifier::new(config.tone.clone(), Arc::clone(&lexicon)),
        };
        let signals = SignalResolver::new(None, config.pipeline.signal_timeout(), Arc::clone(&lexicon));

        info!(
            config_version = %config.version,
            lexicon_version = lexicon.version(),
            "Pipeline orchestrator ready"
        );

        Ok(Self {
            store,
            risk: RiskSynthesizer::new(config.risk.clone()),
            config,
            lexicon,
            engines: Arc::new(engines),
            signals,
            #[cfg(test)]
            fault: None,
        })
    }

    /// Attaches a remote signal provider.
    pub fn with_signal_provider(mut self, provider: Arc<dyn SignalProvider>) -> Self {
        self.signals = SignalResolver::new(
            Some(provider),
            self.config.pipeline.signal_timeout(),
            Arc::clone(&self.lexicon),
        );
        self
    }

    #[cfg(test)]
    pub(crate) fn with_injected_fault(mut self, fault: InjectedFault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[cfg(test)]
    fn fault(&self) -> FaultHook {
        self.fault
    }

    #[cfg(not(test))]
    fn fault(&self) -> FaultHook {}

    /// Validates a caller request and wraps its result in a response envelope.
    #[instrument(skip(self, request), fields(domain = %request.domain, turns = request.turns.len()))]
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, AppError> {
        let started = std::time::Instant::now();
        request.validate()?;
        let conversation = conversation_from_inputs(&request.turns)?;

        let result = self
            .run(&request.domain, conversation, request.signals, request.remote_signals)
            .await?;

        Ok(AnalysisResponse::new(result, started.elapsed().as_millis() as u64))
    }

    /// Analyzes an already-built conversation.
    #[instrument(skip(self, conversation, signals), fields(turns = conversation.len()))]
    pub async fn analyze_conversation(
        &self,
        domain: &str,
        conversation: Conversation,
        signals: Option<ExternalSignals>,
    ) -> Result<AnalysisResult, AppError> {
        self.run(domain, conversation, signals, true).await
    }

    async fn run(
        &self,
        requested: &str,
        conversation: Conversation,
        precomputed: Option<ExternalSignals>,
        remote_allowed: bool,
    ) -> Result<AnalysisResult, AppError> {
        if conversation.is_empty() || conversation.is_blank() {
            return Err(AppError::Validation("conversation is empty".to_string()));
        }

        let deadline = Instant::now() + self.config.pipeline.request_deadline();
        let snapshot = self.store.snapshot();
        let (selection, index) = select_domain(&snapshot, requested, &conversation, &self.config.pipeline)?;

        let mut state = PipelineState::DomainSelected;
        debug!(?state, domain = %selection.domain, method = ?selection.method, "Domain selected");

        let capability = self.signals.capability(precomputed.as_ref(), remote_allowed);
        let conversation = Arc::new(conversation);

        state = PipelineState::StagesRunning;
        debug!(?state, ?capability, "Fanning out stages");

        let compliance = {
            let (engines, conv, index, fault) =
                (Arc::clone(&self.engines), Arc::clone(&conversation), Arc::clone(&index), self.fault());
            run_stage(Stage::Compliance, deadline, move || {
                check_fault(fault, Stage::Compliance)?;
                Ok(engines.compliance.report(&index, &conv))
            })
        };
        let exposure = {
            let (engines, conv, fault) = (Arc::clone(&self.engines), Arc::clone(&conversation), self.fault());
            run_stage(Stage::Exposure, deadline, move || {
                check_fault(fault, Stage::Exposure)?;
                Ok(engines.exposure.report(&conv))
            })
        };
        let sentiment = {
            let (engines, conv, fault) = (Arc::clone(&self.engines), Arc::clone(&conversation), self.fault());
            run_stage(Stage::Sentiment, deadline, move || {
                check_fault(fault, Stage::Sentiment)?;
                Ok(engines.sentiment.report(&conv))
            })
        };
        let tone = {
            let (engines, conv, fault) = (Arc::clone(&self.engines), Arc::clone(&conversation), self.fault());
            run_stage(Stage::Tone, deadline, move || {
                check_fault(fault, Stage::Tone)?;
                Ok(engines.tone.report(&conv))
            })
        };
        let signals = self.signals.resolve(capability, precomputed, &conversation, deadline);

        let (compliance, exposure, sentiment, tone, signals) =
            futures::join!(compliance, exposure, sentiment, tone, signals);

        state = PipelineState::Merged;
        debug!(?state, "Stages joined");

        let predicted_status = signals
            .resolution_prediction
            .as_ref()
            .map(|p| p.predicted_status.to_lowercase());
        let risk_assessment = self.risk.synthesize_partial(RiskInputs {
            violations: compliance.completed().map(|r| r.violations.as_slice()),
            aggregate_sentiment: sentiment.completed().map(|r| r.aggregate),
            exposures: exposure.completed().map(|r| r.findings.as_slice()),
            frustration_level: sentiment.completed().map(|r| r.frustration_level),
            dismissive_agent: tone
                .completed()
                .is_some_and(|r| r.distribution.get(&Tone::Dismissive).is_some_and(|&n| n > 0)),
            issue_unresolved: predicted_status.as_deref() == Some("unresolved"),
        });
        let agent_performance = match (tone.completed(), compliance.completed()) {
            (Some(tone), Some(compliance)) => Some(AgentPerformance::assess(
                tone,
                compliance,
                predicted_status.as_deref() == Some("resolved"),
            )),
            _ => None,
        };

        let outcomes = [
            (Stage::Compliance, compliance.degraded_code()),
            (Stage::Exposure, exposure.degraded_code()),
            (Stage::Sentiment, sentiment.degraded_code()),
            (Stage::Tone, tone.degraded_code()),
        ];
        let degraded_stages: Vec<Stage> = outcomes
            .iter()
            .filter(|(_, code)| code.is_some())
            .map(|(stage, _)| *stage)
            .collect();
        let partial = signals.deadline_exceeded
            || outcomes.iter().any(|(_, code)| *code == Some("timeout"));

        state = if degraded_stages.is_empty() {
            PipelineState::Done
        } else {
            PipelineState::Degraded
        };

        if state == PipelineState::Degraded || partial {
            warn!(?degraded_stages, partial, "Analysis finished degraded");
        } else {
            info!(
                domain = %selection.domain,
                risk_level = risk_assessment.risk_level.label(),
                escalation = risk_assessment.escalation_required,
                "Analysis complete"
            );
        }

        Ok(AnalysisResult {
            config_version: self.config.version.clone(),
            lexicon_version: self.lexicon.version().to_string(),
            corpus_generation: snapshot.generation(),
            corpus_version: index.version().map(str::to_string),
            domain: selection,
            state,
            partial,
            degraded_stages,
            turn_count: conversation.len(),
            sentiment_analysis: sentiment,
            tone_analysis: tone,
            compliance,
            exposure_findings: exposure,
            risk_assessment,
            agent_performance,
            signal_capability: signals.capability,
            signal_origin: signals.origin,
            signal_fallback_reason: signals.fallback_reason,
            language_analysis: Some(signals.language),
            intent_analysis: Some(signals.intent),
            conversation_summary: signals.summary,
            resolution_prediction: signals.resolution_prediction,
        })
    }
}

/// Runs one stage on the blocking pool, bounded by the request deadline.
async fn run_stage<T, F>(stage: Stage, deadline: Instant, work: F) -> StageOutcome<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    let started = std::time::Instant::now();
    let outcome = match timeout_at(deadline, task::spawn_blocking(work)).await {
        Ok(Ok(Ok(value))) => StageOutcome::Completed(value),
        Ok(Ok(Err(e))) => {
            error!(stage = stage.label(), error = %e, "Stage failed");
            StageOutcome::degraded(&e)
        }
        Ok(Err(join_err)) => {
            let reason = if join_err.is_panic() {
                "stage panicked"
            } else {
                "stage task was cancelled"
            };
            error!(stage = stage.label(), reason, "Stage aborted");
            StageOutcome::degraded(&AppError::Stage {
                stage: stage.label().to_string(),
                reason: reason.to_string(),
            })
        }
        Err(_) => {
            warn!(stage = stage.label(), "Stage missed the request deadline");
            StageOutcome::degraded(&AppError::Timeout(format!(
                "{} stage exceeded the request deadline",
                stage.label()
            )))
        }
    };
    debug!(
        stage = stage.label(),
        elapsed_us = started.elapsed().as_micros() as u64,
        degraded = outcome.is_degraded(),
        "Stage finished"
    );
    outcome
}
