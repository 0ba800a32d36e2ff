//! Agent performance scorecard.
//!
//! Derived from the tone and compliance reports plus the predicted
//! resolution. Nothing here reads the conversation again.

use serde::Serialize;

use super::compliance::ComplianceReport;
use super::tone::{Tone, ToneReport};

const MAX_COACHING_AREAS: usize = 3;
const MAX_STRENGTHS: usize = 2;
const CONSISTENT_TONE_ABOVE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// A from 0.9, then one letter per 0.1 down to F below 0.6.
    pub fn from_score(score: f32) -> Self {
        match score {
            s if s >= 0.9 => Grade::A,
            s if s >= 0.8 => Grade::B,
            s if s >= 0.7 => Grade::C,
            s if s >= 0.6 => Grade::D,
            _ => Grade::F,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentPerformance {
    /// Tone consistency across the conversation.
    pub professionalism: f32,
    pub empathy: f32,
    /// `1 - severity_score`.
    pub policy_adherence: f32,
    pub issue_resolution: f32,
    pub overall_score: f32,
    pub grade: Grade,
    pub coaching_areas: Vec<String>,
    pub strengths: Vec<String>,
}

impl AgentPerformance {
    pub fn assess(tone: &ToneReport, compliance: &ComplianceReport, resolved: bool) -> Self {
        let professionalism = tone.consistency;
        let agent_turns: usize = tone.distribution.values().sum();
        let empathetic = tone.distribution.get(&Tone::Empathetic).copied().unwrap_or(0);
        let dismissive = tone.distribution.get(&Tone::Dismissive).copied().unwrap_or(0);
        let empathy = 0.4 + 0.3 * empathetic as f32 / agent_turns.max(1) as f32;
        let policy_adherence = (1.0 - compliance.severity_score).clamp(0.0, 1.0);
        let issue_resolution = if resolved { 1.0 } else { 0.0 };

        let overall_score =
            (professionalism + 0.2 * empathy + policy_adherence + issue_resolution) / 4.0;
        let grade = Grade::from_score((professionalism + policy_adherence) / 2.0);

        let consistent = professionalism > CONSISTENT_TONE_ABOVE;
        let mut coaching_areas = Vec::new();
        if dismissive > 0 {
            coaching_areas.push("Improve customer empathy".to_string());
        }
        if compliance.counts.critical > 0 {
            coaching_areas.push("Review compliance policies".to_string());
        }
        if !consistent {
            coaching_areas.push("Maintain consistent professional tone".to_string());
        }
        coaching_areas.truncate(MAX_COACHING_AREAS);

        let mut strengths = Vec::new();
        if compliance.violations.is_empty() {
            strengths.push("Excellent compliance adherence".to_string());
        }
        if consistent {
            strengths.push("Consistent professional tone".to_string());
        }
        strengths.truncate(MAX_STRENGTHS);

        Self {
            professionalism,
            empathy,
            policy_adherence,
            issue_resolution,
            overall_score: overall_score.clamp(0.0, 1.0),
            grade,
            coaching_areas,
            strengths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::compliance::{MatchKind, Violation};
    use crate::corpus::Severity;
    use std::collections::BTreeMap;

    fn tone(consistency: f32, agent_tones: &[(Tone, usize)]) -> ToneReport {
        ToneReport {
            flags: Vec::new(),
            distribution: agent_tones.iter().copied().collect::<BTreeMap<_, _>>(),
            dominant_tone: Tone::Neutral,
            consistency,
            summary: String::new(),
            recommendations: Vec::new(),
        }
    }

    fn critical() -> Violation {
        Violation {
            policy_id: "BANK_SEC_3.2.1".into(),
            clause: "Never request an OTP.".into(),
            category: "security".into(),
            regulatory_basis: "N/A".into(),
            detected_phrase: "give me your otp".into(),
            similarity_score: 1.0,
            severity: Severity::Critical,
            remediation: "Review.".into(),
            turn_order: Some(1),
            match_kind: MatchKind::ExactPattern,
        }
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(Grade::from_score(1.0), Grade::A);
        assert_eq!(Grade::from_score(0.9), Grade::A);
        assert_eq!(Grade::from_score(0.85), Grade::B);
        assert_eq!(Grade::from_score(0.7), Grade::C);
        assert_eq!(Grade::from_score(0.65), Grade::D);
        assert_eq!(Grade::from_score(0.59), Grade::F);
        assert_eq!(Grade::from_score(0.0), Grade::F);
    }

    #[test]
    fn test_clean_resolved_conversation() {
        let tone = tone(1.0, &[(Tone::Empathetic, 1), (Tone::Neutral, 1)]);
        let compliance = ComplianceReport::new("banking", 0.3, Vec::new());
        let perf = AgentPerformance::assess(&tone, &compliance, true);

        assert!((perf.empathy - 0.55).abs() < 1e-6);
        assert_eq!(perf.policy_adherence, 1.0);
        assert_eq!(perf.issue_resolution, 1.0);
        assert!((perf.overall_score - (1.0 + 0.2 * 0.55 + 1.0 + 1.0) / 4.0).abs() < 1e-6);
        assert_eq!(perf.grade, Grade::A);
        assert!(perf.coaching_areas.is_empty());
        assert_eq!(
            perf.strengths,
            vec!["Excellent compliance adherence", "Consistent professional tone"]
        );
    }

    #[test]
    fn test_critical_violation_and_dismissive_agent() {
        let tone = tone(0.5, &[(Tone::Dismissive, 2)]);
        let compliance = ComplianceReport::new("banking", 0.3, vec![critical()]);
        let perf = AgentPerformance::assess(&tone, &compliance, false);

        assert!((perf.policy_adherence - 0.1).abs() < 1e-6);
        assert_eq!(perf.empathy, 0.4);
        assert_eq!(perf.issue_resolution, 0.0);
        assert_eq!(perf.grade, Grade::F);
        assert_eq!(
            perf.coaching_areas,
            vec![
                "Improve customer empathy",
                "Review compliance policies",
                "Maintain consistent professional tone"
            ]
        );
        assert!(perf.strengths.is_empty());
    }

    #[test]
    fn test_no_agent_turns() {
        let perf = AgentPerformance::assess(
            &tone(1.0, &[]),
            &ComplianceReport::new("telecom", 0.3, Vec::new()),
            false,
        );
        assert_eq!(perf.empathy, 0.4);
        assert_eq!(perf.grade, Grade::A);
    }
}
