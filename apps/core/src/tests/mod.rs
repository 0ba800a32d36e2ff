//! Test Module
//!
//! Cross-module suites for the analysis core.
//!
//! ## Test Categories
//! - `engine_tests`: engines against the shipped banking corpus
//! - `pipeline_tests`: orchestrator states, degraded stages, signals, deadlines
//! - `integration_tests`: end-to-end scenarios and result properties
//! - `chaos_test`: concurrent analyses during corpus reloads, unreliable providers

pub mod integration_tests;

use std::path::PathBuf;
use std::sync::Arc;

use crate::analysis::lexicon::Lexicon;
use crate::config::EngineConfig;
use crate::corpus::PolicyStore;
use crate::models::{Conversation, Speaker};
use crate::pipeline::PipelineOrchestrator;

/// The corpus directory shipped with the crate.
pub(crate) fn shipped_store_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/policy_store")
}

pub(crate) fn shipped_store() -> Arc<PolicyStore> {
    let store = PolicyStore::new();
    store
        .load_dir(shipped_store_dir())
        .expect("Failed to load shipped policy store");
    Arc::new(store)
}

pub(crate) fn orchestrator_with(config: EngineConfig) -> PipelineOrchestrator {
    PipelineOrchestrator::new(shipped_store(), Arc::new(config), Arc::new(Lexicon::english()))
        .expect("Failed to build orchestrator")
}

pub(crate) fn orchestrator() -> PipelineOrchestrator {
    orchestrator_with(EngineConfig::default())
}

/// The OTP request scenario: a critical violation plus an OTP exposure.
pub(crate) fn otp_conversation() -> Conversation {
    Conversation::from_pairs(&[
        (Speaker::Agent, "Can you give me your OTP?"),
        (Speaker::Customer, "OK, its 123456."),
    ])
}

/// Friendly small talk sharing no term with the banking corpus.
pub(crate) fn pleasant_conversation() -> Conversation {
    Conversation::from_pairs(&[
        (Speaker::Agent, "Good morning! It is a pleasure to speak with you today."),
        (Speaker::Customer, "Thank you, that is wonderful. You are very kind."),
        (Speaker::Agent, "Glad to hear that. Have a lovely day!"),
        (Speaker::Customer, "Thank you, great day to you too."),
    ])
}
