//! Integration Tests
//!
//! End-to-end analyses through the orchestrator with the shipped corpus.

use super::{orchestrator, otp_conversation, pleasant_conversation};
use crate::analysis::compliance::MatchKind;
use crate::analysis::exposure::ExposureCategory;
use crate::analysis::risk::{RiskLevel, RiskSynthesizer};
use crate::analysis::sentiment::ShiftDirection;
use crate::analysis::domain::SelectionMethod;
use crate::corpus::Severity;
use crate::models::{Conversation, Speaker};
use crate::pipeline::{AnalysisResult, PipelineState};

async fn analyze(domain: &str, conversation: Conversation) -> AnalysisResult {
    orchestrator()
        .analyze_conversation(domain, conversation, None)
        .await
        .expect("analysis succeeds")
}

fn assert_weighted_formula(result: &AnalysisResult) {
    let c = &result.risk_assessment.components;
    let expected = (0.4 * c.compliance_score + 0.3 * c.sentiment_score + 0.3 * c.exposure_score)
        .clamp(0.0, 1.0);
    assert!((result.risk_assessment.overall_score - expected).abs() < 1e-6);
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_otp_request_scenario() {
    let result = analyze("banking", otp_conversation()).await;

    assert_eq!(result.state, PipelineState::Done);
    assert_eq!(result.domain.method, SelectionMethod::Explicit);

    let compliance = result.compliance.completed().expect("compliance completed");
    assert_eq!(compliance.violations.len(), 1);
    assert_eq!(compliance.violations[0].policy_id, "BANK_SEC_3.2.1");
    assert_eq!(compliance.violations[0].severity, Severity::Critical);

    let exposure = result.exposure_findings.completed().expect("exposure completed");
    assert_eq!(exposure.findings.len(), 1);
    assert_eq!(exposure.findings[0].category, ExposureCategory::Otp);
    assert_eq!(exposure.findings[0].matched_text, "123456");

    assert_eq!(result.risk_assessment.risk_level, RiskLevel::High);
    assert!(result.risk_assessment.escalation_required);
    assert_weighted_formula(&result);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["risk_assessment"]["risk_level"], "high");
    assert_eq!(json["exposure_findings"]["data"]["findings"][0]["category"], "OTP");
}

#[tokio::test]
async fn test_pleasant_conversation_scenario() {
    let result = analyze("banking", pleasant_conversation()).await;

    let compliance = result.compliance.completed().expect("compliance completed");
    assert!(compliance.violations.is_empty());
    assert_eq!(result.risk_assessment.components.compliance_score, 0.0);

    let exposure = result.exposure_findings.completed().expect("exposure completed");
    assert!(exposure.findings.is_empty());

    assert_eq!(result.risk_assessment.risk_level, RiskLevel::Low);
    assert!(!result.risk_assessment.escalation_required);
    assert_weighted_formula(&result);
}

#[tokio::test]
async fn test_safety_warning_is_low_risk() {
    let conv = Conversation::from_pairs(&[
        (
            Speaker::Agent,
            "For your safety, please never share your OTP or password with anyone.",
        ),
        (Speaker::Customer, "Thank you, that is good to know."),
    ]);
    let result = analyze("banking", conv).await;

    assert!(result.compliance.completed().unwrap().violations.is_empty());
    assert!(result.exposure_findings.completed().unwrap().findings.is_empty());
    assert_eq!(result.risk_assessment.risk_level, RiskLevel::Low);
    assert!(!result.risk_assessment.escalation_required);
    assert!(result.risk_assessment.flags.is_empty());
}

#[tokio::test]
async fn test_auto_domain_detection() {
    let conv = Conversation::from_pairs(&[
        (Speaker::Customer, "My roaming stopped and the network is down."),
        (Speaker::Agent, "I can check your data plan and recharge."),
    ]);
    let result = analyze("auto", conv).await;
    assert_eq!(result.domain.domain, "telecom");
    assert_eq!(result.domain.method, SelectionMethod::Detected);
    assert!(result.domain.confidence > 0.5);
}

#[tokio::test]
async fn test_undetermined_domain_falls_back_to_default() {
    let result = analyze("auto", pleasant_conversation()).await;
    assert_eq!(result.domain.domain, "banking");
    assert_eq!(result.domain.method, SelectionMethod::Fallback);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_repeated_analysis_is_byte_identical() {
    let engine = orchestrator();
    let conversations = [otp_conversation(), pleasant_conversation()];
    for conversation in conversations {
        let first = engine
            .analyze_conversation("banking", conversation.clone(), None)
            .await
            .unwrap();
        let second = engine
            .analyze_conversation("banking", conversation, None)
            .await
            .unwrap();
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }
}

#[tokio::test]
async fn test_contained_pattern_always_violates() {
    let variants = [
        "Could you GIVE ME YOUR OTP right away",
        "give me your otp.",
        "Alright... give me, your OTP!",
    ];
    for text in variants {
        let conv = Conversation::from_pairs(&[(Speaker::Agent, text)]);
        let result = analyze("banking", conv).await;
        let compliance = result.compliance.completed().unwrap();
        let violation = compliance
            .violations
            .iter()
            .find(|v| v.policy_id == "BANK_SEC_3.2.1")
            .unwrap_or_else(|| panic!("no violation for {:?}", text));
        assert_eq!(violation.severity, Severity::Critical);
        assert_eq!(violation.similarity_score, 1.0);
        assert_eq!(violation.match_kind, MatchKind::ExactPattern);
    }
}

#[tokio::test]
async fn test_otp_requires_trigger_within_window() {
    let bare = Conversation::from_pairs(&[
        (Speaker::Customer, "My order number is 55120 and it is late."),
    ]);
    let result = analyze("banking", bare).await;
    let exposure = result.exposure_findings.completed().unwrap();
    assert!(exposure.findings.iter().all(|f| f.category != ExposureCategory::Otp));

    let far = Conversation::from_pairs(&[(
        Speaker::Customer,
        "The OTP screen was blank so I waited and then typed 55120",
    )]);
    let result = analyze("banking", far).await;
    let exposure = result.exposure_findings.completed().unwrap();
    assert!(exposure.findings.iter().all(|f| f.category != ExposureCategory::Otp));

    let near = Conversation::from_pairs(&[(Speaker::Customer, "OTP is 55120")]);
    let result = analyze("banking", near).await;
    let exposure = result.exposure_findings.completed().unwrap();
    assert!(exposure.findings.iter().any(|f| f.category == ExposureCategory::Otp));
}

#[tokio::test]
async fn test_turning_point_through_pipeline() {
    let conv = Conversation::from_pairs(&[
        (Speaker::Customer, "This is wonderful, I love it, thank you"),
        (Speaker::Agent, "Glad to hear it."),
        (Speaker::Customer, "Wonderful, I love it, thank you"),
        (Speaker::Agent, "Anything else?"),
        (Speaker::Customer, "Now it is terrible and awful, I am furious"),
        (Speaker::Customer, "Terrible, awful, I am furious"),
        (Speaker::Customer, "Awful and terrible, furious"),
    ]);
    let result = analyze("banking", conv).await;
    let sentiment = result.sentiment_analysis.completed().unwrap();

    assert_eq!(sentiment.turning_points.len(), 1);
    assert_eq!(sentiment.turning_points[0].direction, ShiftDirection::Deteriorated);
    assert!(sentiment.aggregate < 0.0);
    assert_weighted_formula(&result);
}

#[test]
fn test_weighted_formula_holds_for_all_inputs() {
    let synth = RiskSynthesizer::default();
    for aggregate in [-1.0, -0.6, -0.2, 0.0, 0.4, 1.0] {
        for exposed in [false, true] {
            let exposures = if exposed {
                vec![crate::analysis::exposure::ExposureFinding {
                    category: ExposureCategory::Cvv,
                    matched_text: "123".into(),
                    confidence: 1.0,
                    turn_order: 0,
                    speaker: Speaker::Customer,
                }]
            } else {
                vec![]
            };
            let risk = synth.synthesize(&[], aggregate, &exposures);
            let c = risk.components;
            let expected = (0.4 * c.compliance_score + 0.3 * c.sentiment_score
                + 0.3 * c.exposure_score)
                .clamp(0.0, 1.0);
            assert!((risk.overall_score - expected).abs() < 1e-6);
        }
    }
}
