//! Fixed-weight risk synthesis.
//!
//! `overall = clamp(w_c * compliance + w_s * sentiment + w_e * exposure, 0, 1)`
//! where
//! - `compliance` is 1.0 / 0.6 / 0.3 / 0 for the worst violation (critical / high / other / none);
//! - `sentiment` is `max(0, -aggregate_customer_sentiment)`;
//! - `exposure` is 1.0 if anything was exposed.
//!
//! Flags and `churn_risk` come from the frustration level, the agent's tone and
//! the predicted resolution; they never feed the score.
//!
//! Pure: no state, no clock, no randomness.

use serde::Serialize;

use super::compliance::Violation;
use super::exposure::ExposureFinding;
use crate::config::RiskConfig;
use crate::corpus::Severity;

const CUSTOMER_ANGRY_ABOVE: f32 = 0.6;
const POTENTIAL_CHURN_ABOVE: f32 = 0.7;
const IMMEDIATE_AT: f32 = 0.85;
/// Policies whose violation is a promise the agent cannot make.
const COMMITMENT_POLICIES: &[&str] = &["BANK_LOAN_7.1.1", "TELECOM_SLA_2.1.1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationPriority {
    Routine,
    Urgent,
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFlag {
    SecurityBreach,
    CriticalViolation,
    UnauthorizedCommitment,
    CustomerAngry,
    DismissiveAgent,
    PotentialChurn,
    IssueUnresolved,
}

/// Sub-scores kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskComponents {
    pub compliance_score: f32,
    pub sentiment_score: f32,
    pub exposure_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub overall_score: f32,
    pub risk_level: RiskLevel,
    pub escalation_required: bool,
    pub escalation_priority: EscalationPriority,
    pub recommended_action: String,
    pub components: RiskComponents,
    /// Customer frustration level; 0 when sentiment is unavailable.
    pub churn_risk: f32,
    pub flags: Vec<RiskFlag>,
    /// Inputs that were unavailable and counted as zero.
    pub missing_inputs: Vec<String>,
}

/// Inputs to synthesis; `None` marks a stage that produced nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskInputs<'a> {
    pub violations: Option<&'a [Violation]>,
    pub aggregate_sentiment: Option<f32>,
    pub exposures: Option<&'a [ExposureFinding]>,
    pub frustration_level: Option<f32>,
    /// At least one agent turn was classified dismissive.
    pub dismissive_agent: bool,
    /// The resolution prediction says the issue stayed open.
    pub issue_unresolved: bool,
}

/// Compliance sub-score of the worst violation.
pub fn compliance_score(violations: &[Violation]) -> f32 {
    match violations.iter().map(|v| v.severity).max() {
        Some(Severity::Critical) => 1.0,
        Some(Severity::High) => 0.6,
        Some(Severity::Medium) | Some(Severity::Low) => 0.3,
        None => 0.0,
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiskSynthesizer {
    config: RiskConfig,
}

impl RiskSynthesizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn synthesize(
        &self,
        violations: &[Violation],
        aggregate_sentiment: f32,
        exposures: &[ExposureFinding],
    ) -> RiskAssessment {
        self.synthesize_partial(RiskInputs {
            violations: Some(violations),
            aggregate_sentiment: Some(aggregate_sentiment),
            exposures: Some(exposures),
            ..RiskInputs::default()
        })
    }

    /// Synthesis with missing inputs counted as zero and listed.
    pub fn synthesize_partial(&self, inputs: RiskInputs<'_>) -> RiskAssessment {
        let mut missing_inputs = Vec::new();
        if inputs.violations.is_none() {
            missing_inputs.push("compliance".to_string());
        }
        if inputs.aggregate_sentiment.is_none() {
            missing_inputs.push("sentiment".to_string());
        }
        if inputs.exposures.is_none() {
            missing_inputs.push("exposure".to_string());
        }

        let violations = inputs.violations.unwrap_or(&[]);
        let exposures = inputs.exposures.unwrap_or(&[]);
        let aggregate = inputs.aggregate_sentiment.unwrap_or(0.0);
        let frustration = inputs.frustration_level.unwrap_or(0.0);

        let components = RiskComponents {
            compliance_score: compliance_score(violations),
            sentiment_score: (-aggregate).clamp(0.0, 1.0),
            exposure_score: if exposures.is_empty() { 0.0 } else { 1.0 },
        };
        let overall_score = self.overall(&components);
        let risk_level = self.level(overall_score);

        let has_critical = violations.iter().any(|v| v.severity == Severity::Critical);
        let escalation_required = risk_level == RiskLevel::High || has_critical;
        let escalation_priority = if overall_score >= IMMEDIATE_AT || has_critical {
            EscalationPriority::Immediate
        } else if overall_score >= self.config.high_threshold {
            EscalationPriority::Urgent
        } else {
            EscalationPriority::Routine
        };

        let mut flags = Vec::new();
        if !exposures.is_empty() {
            flags.push(RiskFlag::SecurityBreach);
        }
        if has_critical {
            flags.push(RiskFlag::CriticalViolation);
        }
        if violations
            .iter()
            .any(|v| COMMITMENT_POLICIES.contains(&v.policy_id.as_str()))
        {
            flags.push(RiskFlag::UnauthorizedCommitment);
        }
        if frustration > CUSTOMER_ANGRY_ABOVE {
            flags.push(RiskFlag::CustomerAngry);
        }
        if inputs.dismissive_agent {
            flags.push(RiskFlag::DismissiveAgent);
        }
        if frustration > POTENTIAL_CHURN_ABOVE {
            flags.push(RiskFlag::PotentialChurn);
        }
        if inputs.issue_unresolved {
            flags.push(RiskFlag::IssueUnresolved);
        }

        RiskAssessment {
            overall_score,
            risk_level,
            escalation_required,
            escalation_priority,
            recommended_action: recommended_action(risk_level, &flags).to_string(),
            components,
            churn_risk: frustration.clamp(0.0, 1.0),
            flags,
            missing_inputs,
        }
    }

    pub fn overall(&self, c: &RiskComponents) -> f32 {
        (self.config.compliance_weight * c.compliance_score
            + self.config.sentiment_weight * c.sentiment_score
            + self.config.exposure_weight * c.exposure_score)
            .clamp(0.0, 1.0)
    }

    pub fn level(&self, overall: f32) -> RiskLevel {
        if overall >= self.config.high_threshold {
            RiskLevel::High
        } else if overall >= self.config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

fn recommended_action(level: RiskLevel, flags: &[RiskFlag]) -> &'static str {
    if flags.contains(&RiskFlag::SecurityBreach) {
        "Contain the exposure: invalidate exposed credentials and notify the security team."
    } else if flags.contains(&RiskFlag::CriticalViolation) {
        "Escalate to compliance review and coach the agent on the violated policy."
    } else {
        match level {
            RiskLevel::High => "Escalate to a supervisor for immediate review.",
            RiskLevel::Medium => "Schedule a quality review of this conversation.",
            RiskLevel::Low => "No action required.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::compliance::MatchKind;
    use crate::analysis::exposure::ExposureCategory;
    use crate::models::Speaker;

    fn violation(severity: Severity) -> Violation {
        Violation {
            policy_id: "P".into(),
            clause: "clause".into(),
            category: "security".into(),
            regulatory_basis: "N/A".into(),
            detected_phrase: String::new(),
            similarity_score: 0.5,
            severity,
            remediation: "Review.".into(),
            turn_order: None,
            match_kind: MatchKind::Similarity,
        }
    }

    fn exposure() -> ExposureFinding {
        ExposureFinding {
            category: ExposureCategory::Otp,
            matched_text: "123456".into(),
            confidence: 0.75,
            turn_order: 1,
            speaker: Speaker::Customer,
        }
    }

    #[test]
    fn test_compliance_score_table() {
        assert_eq!(compliance_score(&[]), 0.0);
        assert_eq!(compliance_score(&[violation(Severity::Low)]), 0.3);
        assert_eq!(compliance_score(&[violation(Severity::Medium)]), 0.3);
        assert_eq!(
            compliance_score(&[violation(Severity::Medium), violation(Severity::High)]),
            0.6
        );
        assert_eq!(compliance_score(&[violation(Severity::Critical)]), 1.0);
    }

    #[test]
    fn test_critical_violation_and_exposure_is_high() {
        let risk = RiskSynthesizer::default().synthesize(
            &[violation(Severity::Critical)],
            0.0,
            &[exposure()],
        );
        assert!(risk.overall_score >= 0.7);
        assert_eq!(risk.risk_level, RiskLevel::High);
        assert!(risk.escalation_required);
        assert_eq!(risk.escalation_priority, EscalationPriority::Immediate);
        assert_eq!(risk.flags, vec![RiskFlag::SecurityBreach, RiskFlag::CriticalViolation]);
    }

    #[test]
    fn test_critical_forces_escalation_even_when_low() {
        let risk = RiskSynthesizer::default().synthesize(&[violation(Severity::Critical)], 0.5, &[]);
        // 0.4 * 1.0 = 0.4: medium, but a critical violation always escalates.
        assert_eq!(risk.risk_level, RiskLevel::Medium);
        assert!(risk.escalation_required);
    }

    #[test]
    fn test_positive_sentiment_contributes_nothing() {
        let risk = RiskSynthesizer::default().synthesize(&[], 0.9, &[]);
        assert_eq!(risk.overall_score, 0.0);
        assert_eq!(risk.risk_level, RiskLevel::Low);
        assert!(!risk.escalation_required);
        assert_eq!(risk.escalation_priority, EscalationPriority::Routine);
    }

    #[test]
    fn test_weighted_formula() {
        let synth = RiskSynthesizer::default();
        let risk = synth.synthesize(&[violation(Severity::High)], -0.8, &[]);
        let expected = 0.4 * 0.6 + 0.3 * 0.8;
        assert!((risk.overall_score - expected).abs() < 1e-6);
        // Negative sentiment alone raises no flag.
        assert!(risk.flags.is_empty());
    }

    #[test]
    fn test_conversation_flags() {
        let mut loan = violation(Severity::High);
        loan.policy_id = "BANK_LOAN_7.1.1".into();
        let violations = [loan];
        let synth = RiskSynthesizer::default();

        let risk = synth.synthesize_partial(RiskInputs {
            violations: Some(&violations),
            aggregate_sentiment: Some(-0.4),
            exposures: Some(&[]),
            frustration_level: Some(0.65),
            dismissive_agent: true,
            issue_unresolved: true,
        });
        assert_eq!(
            risk.flags,
            vec![
                RiskFlag::UnauthorizedCommitment,
                RiskFlag::CustomerAngry,
                RiskFlag::DismissiveAgent,
                RiskFlag::IssueUnresolved
            ]
        );
        assert!((risk.churn_risk - 0.65).abs() < 1e-6);

        let risk = synth.synthesize_partial(RiskInputs {
            frustration_level: Some(0.8),
            ..RiskInputs::default()
        });
        assert_eq!(risk.flags, vec![RiskFlag::CustomerAngry, RiskFlag::PotentialChurn]);
        // Flags never move the score.
        assert_eq!(risk.overall_score, 0.0);
        assert_eq!(risk.recommended_action, "No action required.");
    }

    #[test]
    fn test_missing_inputs_count_as_zero() {
        let risk = RiskSynthesizer::default().synthesize_partial(RiskInputs {
            violations: None,
            aggregate_sentiment: Some(-1.0),
            exposures: Some(&[]),
            ..RiskInputs::default()
        });
        assert_eq!(risk.missing_inputs, vec!["compliance".to_string()]);
        assert!((risk.overall_score - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_deterministic() {
        let synth = RiskSynthesizer::default();
        let a = synth.synthesize(&[violation(Severity::High)], -0.3, &[exposure()]);
        let b = synth.synthesize(&[violation(Severity::High)], -0.3, &[exposure()]);
        assert_eq!(a, b);
    }
}
