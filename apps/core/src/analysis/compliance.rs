//! Compliance matching: violation patterns plus TF-IDF similarity.
//!
//! Every policy in the domain gets two independent checks:
//! 1. exact match: a normalized `violation_pattern` contained in the normalized
//!    conversation yields a violation with similarity 1.0 and the source span;
//! 2. similarity: cosine similarity at or above the domain threshold yields a
//!    similarity-only violation with an empty `detected_phrase`.
//!
//! A policy produces at most one violation; the exact match wins.
//!
//! Similarity queries leave out negated clauses: a negation word drops itself
//! and up to `NEGATION_SCOPE` following words of its clause, so "never share
//! your OTP" does not resemble a policy against requesting one. Exact patterns
//! are matched on the full text regardless.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::lexicon::Lexicon;
use crate::config::{ComplianceConfig, SimilarityScope};
use crate::corpus::{DomainIndex, Policy, Severity};
use crate::models::{Conversation, ConversationTurn};
use crate::text::{lower_words, normalize, normalize_with_offsets};

const NEGATION_SCOPE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    ExactPattern,
    Similarity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub policy_id: String,
    pub clause: String,
    pub category: String,
    pub regulatory_basis: String,
    /// Verbatim source span, empty for similarity-only hits.
    pub detected_phrase: String,
    pub similarity_score: f32,
    pub severity: Severity,
    pub remediation: String,
    /// Turn where the exact match starts.
    pub turn_order: Option<usize>,
    pub match_kind: MatchKind,
}

impl Violation {
    fn from_policy(policy: &Policy, kind: MatchKind, score: f32) -> Self {
        Self {
            policy_id: policy.id.clone(),
            clause: policy.text.clone(),
            category: policy.category.clone(),
            regulatory_basis: policy.regulatory_basis.clone(),
            detected_phrase: String::new(),
            similarity_score: score.clamp(0.0, 1.0),
            severity: policy.severity,
            remediation: policy.remediation.clone(),
            turn_order: None,
            match_kind: kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn tally(violations: &[Violation]) -> Self {
        let mut counts = Self::default();
        for v in violations {
            match v.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub domain: String,
    pub status: ComplianceStatus,
    pub threshold: f32,
    pub violations: Vec<Violation>,
    pub severity_score: f32,
    pub counts: SeverityCounts,
    pub policy_references: Vec<String>,
}

impl ComplianceReport {
    pub fn new(domain: &str, threshold: f32, violations: Vec<Violation>) -> Self {
        let counts = SeverityCounts::tally(&violations);
        let n = violations.len().max(1) as f32;
        let severity_score =
            ((0.9 * counts.critical as f32 + 0.5 * counts.high as f32) / n).min(1.0);
        let mut policy_references: Vec<String> =
            violations.iter().map(|v| v.policy_id.clone()).collect();
        policy_references.sort();
        policy_references.dedup();

        Self {
            domain: domain.to_string(),
            status: if violations.is_empty() {
                ComplianceStatus::Compliant
            } else {
                ComplianceStatus::NonCompliant
            },
            threshold,
            violations,
            severity_score,
            counts,
            policy_references,
        }
    }
}

/// Matches conversations against one domain's policies.
#[derive(Debug, Clone, Default)]
pub struct ComplianceMatcher {
    config: ComplianceConfig,
    lexicon: Arc<Lexicon>,
}

/// The conversation text with each turn's starting byte offset.
struct CombinedText {
    source: String,
    turn_starts: Vec<(usize, usize)>,
}

impl CombinedText {
    fn new(conversation: &Conversation) -> Self {
        let mut source = String::new();
        let mut turn_starts = Vec::with_capacity(conversation.len());
        for (i, turn) in conversation.turns().iter().enumerate() {
            if i > 0 {
                source.push('\n');
            }
            turn_starts.push((source.len(), turn.order));
            source.push_str(&turn.text);
        }
        Self {
            source,
            turn_starts,
        }
    }

    fn turn_at(&self, byte: usize) -> Option<usize> {
        self.turn_starts
            .iter()
            .take_while(|(start, _)| *start <= byte)
            .last()
            .map(|(_, order)| *order)
    }
}

impl ComplianceMatcher {
    pub fn new(config: ComplianceConfig, lexicon: Arc<Lexicon>) -> Self {
        Self { config, lexicon }
    }

    pub fn threshold_for(&self, index: &DomainIndex) -> f32 {
        self.config
            .threshold_for(index.domain(), index.threshold_override())
    }

    /// All violations for `conversation`, sorted by severity desc, then
    /// similarity desc, then policy id.
    pub fn match_conversation(
        &self,
        index: &DomainIndex,
        conversation: &Conversation,
    ) -> Vec<Violation> {
        let combined = CombinedText::new(conversation);
        let (normalized, offsets) = normalize_with_offsets(&combined.source);
        let threshold = self.threshold_for(index);
        let similarities = self.similarities(index, conversation);

        let mut found: BTreeMap<String, Violation> = BTreeMap::new();

        for policy in index.policies() {
            if let Some(violation) = exact_match(policy, &combined, &normalized, &offsets) {
                found.insert(policy.id.clone(), violation);
            }
        }

        for (policy, &score) in index.policies().iter().zip(&similarities) {
            if score >= threshold && !found.contains_key(&policy.id) {
                found.insert(
                    policy.id.clone(),
                    Violation::from_policy(policy, MatchKind::Similarity, score),
                );
            }
        }

        let mut violations: Vec<Violation> = found.into_values().collect();
        violations.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.similarity_score.total_cmp(&a.similarity_score))
                .then_with(|| a.policy_id.cmp(&b.policy_id))
        });

        debug!(
            domain = index.domain(),
            threshold,
            violations = violations.len(),
            "Compliance matching complete"
        );
        violations
    }

    /// Full report for `conversation`.
    pub fn report(&self, index: &DomainIndex, conversation: &Conversation) -> ComplianceReport {
        let violations = self.match_conversation(index, conversation);
        ComplianceReport::new(index.domain(), self.threshold_for(index), violations)
    }

    /// Per-policy similarity (policy order) under the configured scope.
    pub fn similarities(&self, index: &DomainIndex, conversation: &Conversation) -> Vec<f32> {
        let all = conversation.turns();
        match self.config.similarity_scope {
            SimilarityScope::SlidingWindow { turns } if all.len() > turns.max(1) => {
                let mut best = vec![0.0f32; index.policies().len()];
                for window in all.windows(turns.max(1)) {
                    let scores = index.similarities(&index.vectorize(&self.query_text(window)));
                    for (slot, score) in best.iter_mut().zip(scores) {
                        *slot = slot.max(score);
                    }
                }
                best
            }
            _ => index.similarities(&index.vectorize(&self.query_text(all))),
        }
    }

    /// Words of `turns` that take part in similarity, negated clauses removed.
    pub fn query_text(&self, turns: &[ConversationTurn]) -> String {
        let mut kept = Vec::new();
        for turn in turns {
            let clauses = turn
                .text
                .split(|c: char| matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | '\n'));
            for clause in clauses {
                let mut skip = 0;
                for word in lower_words(clause) {
                    if self.lexicon.is_negation(&word) {
                        skip = NEGATION_SCOPE;
                    } else if skip > 0 {
                        skip -= 1;
                    } else {
                        kept.push(word);
                    }
                }
            }
        }
        kept.join(" ")
    }
}

/// First occurrence of any of the policy's patterns, recovered verbatim.
fn exact_match(
    policy: &Policy,
    combined: &CombinedText,
    normalized: &str,
    offsets: &[usize],
) -> Option<Violation> {
    let mut best: Option<(usize, usize)> = None;
    for pattern in &policy.violation_patterns {
        let needle = normalize(pattern);
        if needle.is_empty() {
            continue;
        }
        if let Some(pos) = normalized.find(&needle) {
            let end = pos + needle.len();
            if best.map_or(true, |(p, _)| pos < p) {
                best = Some((pos, end));
            }
        }
    }

    let (pos, end) = best?;
    let start = offsets[pos];
    let last = offsets[end - 1];
    let source_end = last
        + combined.source[last..]
            .chars()
            .next()
            .map_or(0, char::len_utf8);

    let mut violation = Violation::from_policy(policy, MatchKind::ExactPattern, 1.0);
    violation.detected_phrase = combined.source[start..source_end].to_string();
    violation.turn_order = combined.turn_at(start);
    Some(violation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Speaker;
    use std::collections::BTreeSet;

    fn policy(id: &str, severity: Severity, text: &str, patterns: &[&str]) -> Policy {
        Policy {
            id: id.to_string(),
            text: text.to_string(),
            category: "security".to_string(),
            severity,
            regulatory_basis: "N/A".to_string(),
            keywords: BTreeSet::new(),
            violation_patterns: patterns.iter().map(|s| s.to_string()).collect(),
            remediation: "Review.".to_string(),
        }
    }

    fn index() -> DomainIndex {
        DomainIndex::build(
            "banking",
            vec![
                policy(
                    "OTP",
                    Severity::Critical,
                    "Agents must never request one time passwords",
                    &["give me your otp", "share your otp"],
                ),
                policy(
                    "LOAN",
                    Severity::Medium,
                    "Loan approval must never be guaranteed to applicants",
                    &["guaranteed approval"],
                ),
            ],
        )
    }

    #[test]
    fn test_exact_match_records_verbatim_phrase() {
        let conv = Conversation::from_pairs(&[
            (Speaker::Agent, "Hello there."),
            (Speaker::Agent, "Can you GIVE me your OTP?"),
        ]);
        let violations = ComplianceMatcher::default().match_conversation(&index(), &conv);
        let otp = violations.iter().find(|v| v.policy_id == "OTP").unwrap();
        assert_eq!(otp.detected_phrase, "GIVE me your OTP");
        assert_eq!(otp.similarity_score, 1.0);
        assert_eq!(otp.severity, Severity::Critical);
        assert_eq!(otp.turn_order, Some(1));
        assert_eq!(otp.match_kind, MatchKind::ExactPattern);
    }

    #[test]
    fn test_punctuation_insensitive_containment() {
        let conv = Conversation::from_pairs(&[(Speaker::Agent, "It's GUARANTEED, approval!")]);
        let violations = ComplianceMatcher::default().match_conversation(&index(), &conv);
        assert!(violations
            .iter()
            .any(|v| v.policy_id == "LOAN" && v.match_kind == MatchKind::ExactPattern));
    }

    #[test]
    fn test_similarity_only_violation() {
        let conv = Conversation::from_pairs(&[(
            Speaker::Agent,
            "Your loan approval is basically guaranteed for all applicants",
        )]);
        let violations = ComplianceMatcher::default().match_conversation(&index(), &conv);
        let loan = violations.iter().find(|v| v.policy_id == "LOAN").unwrap();
        assert_eq!(loan.match_kind, MatchKind::Similarity);
        assert!(loan.detected_phrase.is_empty());
        assert!(loan.similarity_score >= 0.15 && loan.similarity_score < 1.0);
    }

    #[test]
    fn test_empty_and_unrelated_conversations() {
        let matcher = ComplianceMatcher::default();
        assert!(matcher
            .match_conversation(&index(), &Conversation::default())
            .is_empty());

        let conv = Conversation::from_pairs(&[(Speaker::Customer, "Lovely weather today")]);
        let report = matcher.report(&index(), &conv);
        assert!(report.violations.is_empty());
        assert_eq!(report.status, ComplianceStatus::Compliant);
        assert_eq!(report.severity_score, 0.0);
    }

    #[test]
    fn test_sorted_by_severity_then_similarity() {
        let conv = Conversation::from_pairs(&[(
            Speaker::Agent,
            "Guaranteed approval! Now share your OTP please.",
        )]);
        let report = ComplianceMatcher::default().report(&index(), &conv);
        assert_eq!(report.policy_references, vec!["LOAN", "OTP"]);
        assert_eq!(report.violations[0].policy_id, "OTP");
        assert_eq!(report.counts.critical, 1);
        assert_eq!(report.counts.medium, 1);
        assert!((report.severity_score - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_one_disables_similarity_hits() {
        let mut config = ComplianceConfig::default();
        config.default_similarity_threshold = 1.0;
        let conv = Conversation::from_pairs(&[(
            Speaker::Agent,
            "Your loan approval is basically guaranteed for all applicants",
        )]);
        let violations = ComplianceMatcher::new(config, Arc::new(Lexicon::english()))
            .match_conversation(&index(), &conv);
        assert!(violations.is_empty());
    }

    fn window_matcher(turns: usize) -> ComplianceMatcher {
        let mut config = ComplianceConfig::default();
        config.similarity_scope = SimilarityScope::SlidingWindow { turns };
        ComplianceMatcher::new(config, Arc::new(Lexicon::english()))
    }

    fn single_turn(text: &str) -> Conversation {
        Conversation::from_pairs(&[(Speaker::Agent, text)])
    }

    #[test]
    fn test_negated_clause_is_left_out_of_similarity() {
        let matcher = ComplianceMatcher::default();
        let conv = single_turn("Remember, we never request one time passwords. Have a nice day!");
        assert_eq!(matcher.query_text(conv.turns()), "remember we have a nice day");
        assert!(matcher.match_conversation(&index(), &conv).is_empty());

        // The same words outside a negation still count.
        let conv = single_turn("Agents request one time passwords");
        let violations = matcher.match_conversation(&index(), &conv);
        assert!(violations
            .iter()
            .any(|v| v.policy_id == "OTP" && v.match_kind == MatchKind::Similarity));
    }

    #[test]
    fn test_negation_does_not_hide_exact_patterns() {
        let conv = single_turn("I would never say this, but give me your OTP");
        let violations = ComplianceMatcher::default().match_conversation(&index(), &conv);
        assert!(violations
            .iter()
            .any(|v| v.policy_id == "OTP" && v.match_kind == MatchKind::ExactPattern));
    }

    #[test]
    fn test_window_wider_than_conversation_uses_full_text() {
        let conv = Conversation::from_pairs(&[
            (Speaker::Agent, "Loan approval is guaranteed"),
            (Speaker::Customer, "Great, one time offer then"),
        ]);
        let full = ComplianceMatcher::default().similarities(&index(), &conv);
        assert_eq!(window_matcher(2).similarities(&index(), &conv), full);
        assert_eq!(window_matcher(5).similarities(&index(), &conv), full);
    }

    #[test]
    fn test_window_takes_best_score_per_policy() {
        let texts = [
            "Loan approval guaranteed for applicants",
            "one time request",
            "one time request again",
            "request one time",
        ];
        let pairs: Vec<(Speaker, &str)> = texts.iter().map(|t| (Speaker::Agent, *t)).collect();
        let conv = Conversation::from_pairs(&pairs);
        let full = ComplianceMatcher::default().similarities(&index(), &conv);
        let windowed = window_matcher(1).similarities(&index(), &conv);

        let per_turn: Vec<Vec<f32>> = texts
            .iter()
            .map(|t| ComplianceMatcher::default().similarities(&index(), &single_turn(t)))
            .collect();
        for policy in 0..2 {
            let best = per_turn.iter().map(|s| s[policy]).fold(0.0f32, f32::max);
            assert!((windowed[policy] - best).abs() < 1e-6);
        }
        // The loan turn alone is closer to its policy than the diluted full text.
        assert!(windowed[1] > full[1]);
    }

    #[test]
    fn test_window_match_reports_similarity_violation() {
        let conv = Conversation::from_pairs(&[
            (Speaker::Agent, "Loan approval guaranteed for applicants"),
            (Speaker::Agent, "one time request request request"),
            (Speaker::Agent, "one time one time request"),
            (Speaker::Agent, "request request one time time"),
        ]);
        let mut config = ComplianceConfig::default();
        config.default_similarity_threshold = 0.6;
        let full = ComplianceMatcher::new(config.clone(), Arc::new(Lexicon::english()));
        config.similarity_scope = SimilarityScope::SlidingWindow { turns: 1 };
        let windowed = ComplianceMatcher::new(config, Arc::new(Lexicon::english()));

        assert!(full
            .match_conversation(&index(), &conv)
            .iter()
            .all(|v| v.policy_id != "LOAN"));
        assert!(windowed
            .match_conversation(&index(), &conv)
            .iter()
            .any(|v| v.policy_id == "LOAN" && v.match_kind == MatchKind::Similarity));
    }
}
