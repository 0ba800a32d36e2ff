//! External signals: language, intent, summary and resolution prediction.
//!
//! These are produced outside the deterministic core. A request either brings
//! them precomputed, has them fetched from a [`SignalProvider`], or gets the
//! local keyword fallback. The choice is a [`SignalCapability`] made once per
//! request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::analysis::intent::{IntentAnalysis, IntentClassifier};
use crate::analysis::language::{estimate_language, LanguageAnalysis};
use crate::analysis::lexicon::Lexicon;
use crate::error::AppError;
use crate::models::Conversation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPrediction {
    pub predicted_status: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Signals computed by an external collaborator. Every field is optional;
/// a missing language or intent is filled locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalSignals {
    #[serde(default)]
    pub language: Option<LanguageAnalysis>,
    #[serde(default)]
    pub intent: Option<IntentAnalysis>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub resolution_prediction: Option<ResolutionPrediction>,
}

impl ExternalSignals {
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Defines the interface of a remote signal source (e.g. a language-model service).
///
/// Implementations may block on I/O; the resolver bounds each call with the
/// signal timeout and the request deadline.
#[async_trait]
pub trait SignalProvider: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Computes signals for a conversation.
    async fn fetch(&self, conversation: &Conversation) -> Result<ExternalSignals, AppError>;
}

/// Where a request's signals come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCapability {
    /// Precomputed by the caller or fetched from the provider.
    RemoteSignal,
    /// Keyword-based local estimates only.
    LocalFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalOrigin {
    Caller,
    Provider,
    Local,
}

/// Signals attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSignals {
    pub capability: SignalCapability,
    pub origin: SignalOrigin,
    /// Why a remote capability ended with local signals.
    pub fallback_reason: Option<String>,
    /// The request deadline expired while waiting on the provider.
    #[serde(skip)]
    pub deadline_exceeded: bool,
    pub language: LanguageAnalysis,
    pub intent: IntentAnalysis,
    pub summary: Option<String>,
    pub resolution_prediction: Option<ResolutionPrediction>,
}

pub struct SignalResolver {
    provider: Option<Arc<dyn SignalProvider>>,
    signal_timeout: Duration,
    lexicon: Arc<Lexicon>,
    intents: IntentClassifier,
}

impl SignalResolver {
    pub fn new(
        provider: Option<Arc<dyn SignalProvider>>,
        signal_timeout: Duration,
        lexicon: Arc<Lexicon>,
    ) -> Self {
        Self {
            provider,
            signal_timeout,
            lexicon,
            intents: IntentClassifier::new(),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Availability policy, evaluated once per request.
    pub fn capability(&self, precomputed: Option<&ExternalSignals>, remote_allowed: bool) -> SignalCapability {
        if precomputed.is_some() || (remote_allowed && self.provider.is_some()) {
            SignalCapability::RemoteSignal
        } else {
            SignalCapability::LocalFallback
        }
    }

    pub async fn resolve(
        &self,
        capability: SignalCapability,
        precomputed: Option<ExternalSignals>,
        conversation: &Conversation,
        deadline: Instant,
    ) -> ResolvedSignals {
        let mut fallback_reason = None;
        let mut deadline_exceeded = false;

        let (origin, signals) = match (capability, precomputed, &self.provider) {
            (SignalCapability::LocalFallback, _, _) => (SignalOrigin::Local, ExternalSignals::default()),
            (SignalCapability::RemoteSignal, Some(signals), _) => (SignalOrigin::Caller, signals),
            (SignalCapability::RemoteSignal, None, Some(provider)) => {
                let signal_deadline = Instant::now() + self.signal_timeout;
                let bound = signal_deadline.min(deadline);
                match timeout_at(bound, provider.fetch(conversation)).await {
                    Ok(Ok(signals)) => {
                        debug!(provider = provider.name(), "External signals received");
                        (SignalOrigin::Provider, signals)
                    }
                    Ok(Err(e)) => {
                        warn!(provider = provider.name(), error = %e, "Signal provider failed, using local fallback");
                        fallback_reason = Some(e.code().to_string());
                        (SignalOrigin::Local, ExternalSignals::default())
                    }
                    Err(_) => {
                        deadline_exceeded = deadline <= signal_deadline;
                        warn!(
                            provider = provider.name(),
                            deadline_exceeded,
                            "Signal provider timed out, using local fallback"
                        );
                        fallback_reason = Some("timeout".to_string());
                        (SignalOrigin::Local, ExternalSignals::default())
                    }
                }
            }
            (SignalCapability::RemoteSignal, None, None) => {
                fallback_reason = Some("no_provider".to_string());
                (SignalOrigin::Local, ExternalSignals::default())
            }
        };

        let language = signals
            .language
            .unwrap_or_else(|| estimate_language(&self.lexicon, &conversation.full_text()));
        let intent = signals.intent.unwrap_or_else(|| self.intents.analyze(conversation));

        ResolvedSignals {
            capability,
            origin,
            fallback_reason,
            deadline_exceeded,
            language,
            intent,
            summary: signals.summary,
            resolution_prediction: signals.resolution_prediction,
        }
    }
}
