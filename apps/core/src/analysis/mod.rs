//! # Analysis Engines
//!
//! Deterministic passes over a conversation. Every engine is built once from
//! its configuration section and the shared lexicon, and never mutated.
//!
//! ## Components
//! - `compliance`: exact pattern and similarity policy matching
//! - `exposure`: sensitive data detection
//! - `sentiment`: per-turn polarity and turning points
//! - `tone`: per-turn tone flags
//! - `risk`: fixed-weight synthesis
//! - `performance`: agent scorecard from tone and compliance
//! - `domain`: keyword-count domain selection
//! - `intent`, `language`: local fallbacks for external signals

pub mod compliance;
pub mod domain;
pub mod exposure;
pub mod intent;
pub mod language;
pub mod lexicon;
pub mod performance;
pub mod risk;
pub mod sentiment;
pub mod tone;

pub use compliance::{ComplianceMatcher, ComplianceReport, ComplianceStatus, MatchKind, Violation};
pub use domain::{select_domain, DomainSelection, SelectionMethod, AUTO_DOMAIN};
pub use exposure::{ExposureCategory, ExposureDetector, ExposureFinding, ExposureLevel, ExposureReport};
pub use intent::{Intent, IntentAnalysis, IntentClassifier, Urgency};
pub use language::{estimate_language, LanguageAnalysis};
pub use lexicon::{Lexicon, LEXICON_VERSION};
pub use performance::{AgentPerformance, Grade};
pub use risk::{RiskAssessment, RiskFlag, RiskInputs, RiskLevel, RiskSynthesizer};
pub use sentiment::{SentimentReport, SentimentScorer, TurningPoint};
pub use tone::{Tone, ToneClassifier, ToneReport};
