//! Deterministic conversation intelligence core.
//!
//! Scores customer-service conversations against per-domain policy corpora:
//! compliance violations, sensitive data exposure, sentiment, tone and a
//! synthesized risk assessment.

pub mod analysis;
pub mod config;
pub mod corpus;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod text;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use corpus::{PolicySnapshot, PolicyStore};
pub use error::AppError;
pub use models::{Conversation, ConversationTurn, Speaker, TurnInput};
pub use pipeline::{AnalysisRequest, AnalysisResponse, AnalysisResult, PipelineOrchestrator};
