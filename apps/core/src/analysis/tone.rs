//! Rule-precedence tone classification.
//!
//! Rules are evaluated top to bottom and the first match wins:
//! escalatory, aggressive, frustrated, dismissive, apologetic, empathetic,
//! neutral.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use super::lexicon::{count_any, Lexicon};
use crate::config::ToneConfig;
use crate::models::{Conversation, ConversationTurn, Speaker};
use crate::text::{normalize, sentence_count, word_tokens};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Escalatory,
    Aggressive,
    Frustrated,
    Dismissive,
    Apologetic,
    Empathetic,
    Neutral,
}

impl Tone {
    pub fn label(&self) -> &'static str {
        match self {
            Tone::Escalatory => "escalatory",
            Tone::Aggressive => "aggressive",
            Tone::Frustrated => "frustrated",
            Tone::Dismissive => "dismissive",
            Tone::Apologetic => "apologetic",
            Tone::Empathetic => "empathetic",
            Tone::Neutral => "neutral",
        }
    }

    /// Static severity of each tone.
    pub fn severity(&self) -> ToneSeverity {
        match self {
            Tone::Escalatory | Tone::Aggressive => ToneSeverity::High,
            Tone::Frustrated | Tone::Dismissive => ToneSeverity::Medium,
            Tone::Apologetic | Tone::Empathetic => ToneSeverity::Informational,
            Tone::Neutral => ToneSeverity::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneSeverity {
    None,
    Informational,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToneFlag {
    pub turn_order: usize,
    pub speaker: Speaker,
    pub tone: Tone,
    pub severity: ToneSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToneReport {
    pub flags: Vec<ToneFlag>,
    /// Agent tone counts.
    pub distribution: BTreeMap<Tone, usize>,
    pub dominant_tone: Tone,
    pub consistency: f32,
    pub summary: String,
    pub recommendations: Vec<String>,
}

/// Keyword counts for one turn; computed once, read by every rule.
struct TurnFeatures {
    normalized: String,
    tokens: usize,
    exclamations: usize,
    sentences: usize,
}

impl TurnFeatures {
    fn of(text: &str) -> Self {
        Self {
            normalized: normalize(text),
            tokens: word_tokens(text).len(),
            exclamations: text.chars().filter(|&c| c == '!').count(),
            sentences: sentence_count(text),
        }
    }

    fn density(&self, hits: usize) -> f32 {
        if self.tokens == 0 {
            0.0
        } else {
            hits as f32 / self.tokens as f32
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToneClassifier {
    config: ToneConfig,
    lexicon: Arc<Lexicon>,
}

impl Default for ToneClassifier {
    fn default() -> Self {
        Self::new(ToneConfig::default(), Arc::new(Lexicon::english()))
    }
}

impl ToneClassifier {
    pub fn new(config: ToneConfig, lexicon: Arc<Lexicon>) -> Self {
        Self { config, lexicon }
    }

    /// Classifies a single turn in isolation.
    pub fn classify(&self, turn: &ConversationTurn) -> ToneFlag {
        self.classify_in_context(turn, None)
    }

    /// Classifies `turn`, using the previous turn to spot short replies to a
    /// long customer message.
    pub fn classify_in_context(
        &self,
        turn: &ConversationTurn,
        previous: Option<&ConversationTurn>,
    ) -> ToneFlag {
        let tone = self.tone_of(turn, previous);
        ToneFlag {
            turn_order: turn.order,
            speaker: turn.speaker,
            tone,
            severity: tone.severity(),
        }
    }

    /// `(2 * profanity + imperatives) / tokens + 0.5 * min(exclamations / sentences, 1)`.
    pub fn aggression_score(&self, text: &str) -> f32 {
        let features = TurnFeatures::of(text);
        self.aggression(&features)
    }

    fn aggression(&self, f: &TurnFeatures) -> f32 {
        let profanity = count_any(&f.normalized, &self.lexicon.profanity);
        let imperatives = count_any(&f.normalized, &self.lexicon.imperatives);
        let exclamation_rate = (f.exclamations as f32 / f.sentences.max(1) as f32).min(1.0);
        f.density(2 * profanity + imperatives) + 0.5 * exclamation_rate
    }

    fn tone_of(&self, turn: &ConversationTurn, previous: Option<&ConversationTurn>) -> Tone {
        let f = TurnFeatures::of(&turn.text);
        if f.tokens == 0 {
            return Tone::Neutral;
        }
        let lex = &self.lexicon;

        if count_any(&f.normalized, &lex.escalation) > 0 {
            return Tone::Escalatory;
        }
        if self.aggression(&f) >= self.config.aggression_threshold {
            return Tone::Aggressive;
        }
        let profanity = count_any(&f.normalized, &lex.profanity);
        if profanity == 0 && count_any(&f.normalized, &lex.frustration) > 0 {
            return Tone::Frustrated;
        }
        let short_reply_to_long_customer_turn = turn.speaker != Speaker::Customer
            && f.tokens <= self.config.short_reply_tokens
            && previous.is_some_and(|p| {
                p.speaker == Speaker::Customer
                    && word_tokens(&p.text).len() >= self.config.long_turn_tokens
            });
        if short_reply_to_long_customer_turn || count_any(&f.normalized, &lex.dismissive) > 0 {
            return Tone::Dismissive;
        }
        let apologies = count_any(&f.normalized, &lex.apology);
        if apologies > 0 && f.density(apologies) >= self.config.keyword_density {
            return Tone::Apologetic;
        }
        let empathy = count_any(&f.normalized, &lex.empathy);
        if apologies == 0 && empathy > 0 && f.density(empathy) >= self.config.keyword_density {
            return Tone::Empathetic;
        }
        Tone::Neutral
    }

    /// Flags for every turn in order.
    pub fn classify_conversation(&self, conversation: &Conversation) -> Vec<ToneFlag> {
        let turns = conversation.turns();
        turns
            .iter()
            .enumerate()
            .map(|(i, turn)| self.classify_in_context(turn, i.checked_sub(1).map(|p| &turns[p])))
            .collect()
    }

    /// Full tone report for `conversation`.
    pub fn report(&self, conversation: &Conversation) -> ToneReport {
        let flags = self.classify_conversation(conversation);

        let mut distribution: BTreeMap<Tone, usize> = BTreeMap::new();
        for flag in flags.iter().filter(|f| f.speaker == Speaker::Agent) {
            *distribution.entry(flag.tone).or_insert(0) += 1;
        }
        // Highest count wins; ties go to the earlier tone in precedence order.
        let dominant_tone = distribution
            .iter()
            .fold(None::<(Tone, usize)>, |best, (&tone, &count)| match best {
                Some((_, c)) if c >= count => best,
                _ => Some((tone, count)),
            })
            .map_or(Tone::Neutral, |(tone, _)| tone);

        let notable: Vec<&ToneFlag> = flags.iter().filter(|f| f.tone != Tone::Neutral).collect();
        let consistency = if notable.len() < 2 {
            1.0
        } else {
            let unique: BTreeSet<Tone> = notable.iter().map(|f| f.tone).collect();
            1.0 - (unique.len() as f32 / notable.len() as f32) * 0.5
        };

        let summary = summarize(&flags);
        let recommendations = recommend(&distribution, consistency);

        debug!(
            flags = flags.len(),
            dominant = dominant_tone.label(),
            "Tone classification complete"
        );

        ToneReport {
            flags,
            distribution,
            dominant_tone,
            consistency,
            summary,
            recommendations,
        }
    }
}

fn summarize(flags: &[ToneFlag]) -> String {
    let high = flags
        .iter()
        .filter(|f| f.severity == ToneSeverity::High)
        .count();
    let medium = flags
        .iter()
        .filter(|f| f.severity == ToneSeverity::Medium)
        .count();

    let mut parts = Vec::new();
    if high > 0 {
        parts.push(format!("HIGH: {} aggressive/escalatory moments detected", high));
    }
    if medium > 0 {
        parts.push(format!("MEDIUM: {} frustrated/dismissive statements", medium));
    }
    if parts.is_empty() {
        if flags.iter().all(|f| f.tone == Tone::Neutral) {
            "No significant tone issues detected.".to_string()
        } else {
            "Minor tone variations, overall professional.".to_string()
        }
    } else {
        format!("{}.", parts.join(". "))
    }
}

fn recommend(distribution: &BTreeMap<Tone, usize>, consistency: f32) -> Vec<String> {
    let mut out = Vec::new();
    if distribution.contains_key(&Tone::Aggressive) {
        out.push("Train agent on de-escalation techniques".to_string());
    }
    if distribution.contains_key(&Tone::Dismissive) {
        out.push("Improve customer empathy and active listening".to_string());
    }
    if consistency < 0.5 {
        out.push("Agent tone is inconsistent; provide coaching".to_string());
    }
    if distribution.contains_key(&Tone::Escalatory) {
        out.push("Monitor for potential escalations".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(speaker: Speaker, text: &str) -> Tone {
        ToneClassifier::default()
            .classify(&ConversationTurn::new(speaker, text, 0))
            .tone
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            classify(Speaker::Agent, "Let me transfer you to a supervisor."),
            Tone::Escalatory
        );
        // Escalation outranks aggression.
        assert_eq!(
            classify(Speaker::Customer, "Shut up! I want to speak to a manager!"),
            Tone::Escalatory
        );
        assert_eq!(
            classify(Speaker::Customer, "This is stupid! Fix it now!"),
            Tone::Aggressive
        );
        assert_eq!(
            classify(Speaker::Customer, "I am so frustrated with this service."),
            Tone::Frustrated
        );
        assert_eq!(classify(Speaker::Agent, "Whatever, calm down."), Tone::Dismissive);
        assert_eq!(
            classify(Speaker::Agent, "I am so sorry for the trouble."),
            Tone::Apologetic
        );
        assert_eq!(
            classify(Speaker::Agent, "I understand, let me help with that."),
            Tone::Empathetic
        );
        assert_eq!(
            classify(Speaker::Agent, "Your balance is four hundred dollars."),
            Tone::Neutral
        );
    }

    #[test]
    fn test_severity_table() {
        assert_eq!(Tone::Escalatory.severity(), ToneSeverity::High);
        assert_eq!(Tone::Dismissive.severity(), ToneSeverity::Medium);
        assert_eq!(Tone::Empathetic.severity(), ToneSeverity::Informational);
        assert_eq!(Tone::Neutral.severity(), ToneSeverity::None);
    }

    #[test]
    fn test_short_reply_to_long_customer_turn() {
        let classifier = ToneClassifier::default();
        let long = ConversationTurn::new(
            Speaker::Customer,
            "I have called three times this week about the same charge on my statement and \
             every single time someone promises a callback that never happens at all",
            0,
        );
        let reply = ConversationTurn::new(Speaker::Agent, "Noted.", 1);
        assert_eq!(
            classifier.classify_in_context(&reply, Some(&long)).tone,
            Tone::Dismissive
        );
        assert_eq!(classifier.classify(&reply).tone, Tone::Neutral);
    }

    #[test]
    fn test_aggression_score() {
        let classifier = ToneClassifier::default();
        assert_eq!(classifier.aggression_score("Hello there."), 0.0);
        // one "!" in one sentence: 0.5 from exclamations alone
        assert!((classifier.aggression_score("Hello there!") - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_report_distribution() {
        let conv = Conversation::from_pairs(&[
            (Speaker::Agent, "I am so sorry for the trouble."),
            (Speaker::Customer, "I am so frustrated with this service."),
            (Speaker::Agent, "I apologize again, truly sorry."),
        ]);
        let report = ToneClassifier::default().report(&conv);
        assert_eq!(report.distribution.get(&Tone::Apologetic), Some(&2));
        assert_eq!(report.dominant_tone, Tone::Apologetic);
        assert!(report.summary.starts_with("MEDIUM: 1"));
        // two unique tones over three notable flags
        assert!((report.consistency - (1.0 - 2.0 / 3.0 * 0.5)).abs() < 1e-6);
    }
}
