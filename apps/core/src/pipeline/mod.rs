//! # Pipeline
//!
//! Request orchestration: domain selection, stage fan-out, signal
//! resolution and result assembly.

pub mod orchestrator;
pub mod result;
pub mod signals;

pub use orchestrator::{AnalysisRequest, PipelineOrchestrator};
pub use result::{AnalysisResponse, AnalysisResult, PipelineState, Stage, StageOutcome};
pub use signals::{ExternalSignals, ResolutionPrediction, SignalCapability, SignalOrigin, SignalProvider};
