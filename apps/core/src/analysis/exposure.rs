//! Sensitive-data exposure scanning.
//!
//! Structural identifiers (SSN, Aadhaar, PAN, labelled CVV) are flagged on
//! shape alone with confidence 1.0. Bare numbers are flagged only when a
//! trigger word sits within `trigger_window` tokens; confidence falls linearly
//! from 1.0 (adjacent) to `edge_confidence` (edge of the window).
//!
//! The token window spans turn boundaries: an agent asking for the OTP and the
//! customer answering with the digits is the typical exposure.
//!
//! Runs of space-separated four-digit groups are read as a whole: exactly three
//! groups is an Aadhaar number, longer runs are card numbers and are neither
//! Aadhaar nor OTP candidates.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use super::lexicon::Lexicon;
use crate::config::ExposureConfig;
use crate::models::{Conversation, Speaker};
use crate::text::word_tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExposureCategory {
    #[serde(rename = "OTP")]
    Otp,
    #[serde(rename = "CVV")]
    Cvv,
    #[serde(rename = "SSN")]
    Ssn,
    #[serde(rename = "Aadhaar")]
    Aadhaar,
    #[serde(rename = "PAN")]
    Pan,
    #[serde(rename = "account_number")]
    AccountNumber,
    #[serde(rename = "password_request")]
    PasswordRequest,
}

impl ExposureCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ExposureCategory::Otp => "OTP",
            ExposureCategory::Cvv => "CVV",
            ExposureCategory::Ssn => "SSN",
            ExposureCategory::Aadhaar => "Aadhaar",
            ExposureCategory::Pan => "PAN",
            ExposureCategory::AccountNumber => "account_number",
            ExposureCategory::PasswordRequest => "password_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureFinding {
    pub category: ExposureCategory,
    pub matched_text: String,
    pub confidence: f32,
    pub turn_order: usize,
    pub speaker: Speaker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureLevel {
    Safe,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureReport {
    pub findings: Vec<ExposureFinding>,
    pub exposed_categories: Vec<ExposureCategory>,
    pub level: ExposureLevel,
}

impl ExposureReport {
    pub fn new(findings: Vec<ExposureFinding>) -> Self {
        let exposed_categories: BTreeSet<ExposureCategory> =
            findings.iter().map(|f| f.category).collect();
        let level = match findings.len() {
            0 => ExposureLevel::Safe,
            1 => ExposureLevel::High,
            _ => ExposureLevel::Critical,
        };
        Self {
            findings,
            exposed_categories: exposed_categories.into_iter().collect(),
            level,
        }
    }
}

// Compile patterns once at startup
static SSN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("Invalid regex: SSN"));
static DIGIT_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}(?: \d{4})+\b").expect("Invalid regex: digit groups"));
static PAN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{5}\d{4}[A-Z]\b").expect("Invalid regex: PAN"));
static CVV_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:cvv2?|cvc|card verification value|security code)\b(?:\s+(?:is|number|code))?\s*[:#=-]?\s*(\d{3,4})\b")
        .expect("Invalid regex: labelled CVV")
});
static SHORT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4,6}\b").expect("Invalid regex: short number"));
static ACCOUNT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{9,18}\b").expect("Invalid regex: account number"));

const OTP_TRIGGERS: &[&str] = &["otp", "code", "pin", "password", "passcode"];
const ACCOUNT_TRIGGERS: &[&str] = &["account", "acct", "iban"];
const SECRET_WORDS: &[&str] = &["password", "passcode", "passwords", "pin"];
const REQUEST_VERBS: &[&str] = &[
    "tell", "give", "share", "send", "provide", "confirm", "read", "say", "spell", "type",
    "enter",
];
const AADHAAR_GROUPS: usize = 3;
/// Tokens before a request verb searched for a negation ("never share").
const NEGATION_REACH: usize = 4;

/// A token in conversation-wide order.
struct ScanToken {
    turn: usize,
    start: usize,
    end: usize,
    lower: String,
}

/// Byte span already claimed by a structural match.
#[derive(Clone, Copy)]
struct Claimed {
    turn: usize,
    start: usize,
    end: usize,
}

impl Claimed {
    fn overlaps(&self, turn: usize, start: usize, end: usize) -> bool {
        self.turn == turn && start < self.end && self.start < end
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExposureDetector {
    config: ExposureConfig,
    lexicon: Arc<Lexicon>,
}

impl ExposureDetector {
    pub fn new(config: ExposureConfig, lexicon: Arc<Lexicon>) -> Self {
        Self { config, lexicon }
    }

    /// Full report for `conversation`.
    pub fn report(&self, conversation: &Conversation) -> ExposureReport {
        ExposureReport::new(self.scan(conversation))
    }

    /// All findings, ordered by turn, then position, then category.
    pub fn scan(&self, conversation: &Conversation) -> Vec<ExposureFinding> {
        let turns = conversation.turns();
        let tokens: Vec<ScanToken> = turns
            .iter()
            .enumerate()
            .flat_map(|(turn, t)| {
                word_tokens(&t.text).into_iter().map(move |tok| ScanToken {
                    turn,
                    start: tok.start,
                    end: tok.end,
                    lower: tok.lower().replace(['\'', '’'], ""),
                })
            })
            .collect();

        let mut hits: Vec<(usize, usize, ExposureFinding)> = Vec::new();
        let mut claimed: Vec<Claimed> = Vec::new();

        // Structural identifiers.
        for (turn, t) in turns.iter().enumerate() {
            let text = t.text.as_str();
            for m in DIGIT_GROUPS.find_iter(text) {
                claimed.push(Claimed {
                    turn,
                    start: m.start(),
                    end: m.end(),
                });
                if m.as_str().split(' ').count() == AADHAAR_GROUPS {
                    hits.push((
                        turn,
                        m.start(),
                        self.finding(ExposureCategory::Aadhaar, m.as_str(), 1.0, t.order, t.speaker),
                    ));
                }
            }
            let structural: [(&Regex, ExposureCategory); 2] = [
                (&SSN_PATTERN, ExposureCategory::Ssn),
                (&PAN_PATTERN, ExposureCategory::Pan),
            ];
            for (pattern, category) in structural {
                for m in pattern.find_iter(text) {
                    claimed.push(Claimed {
                        turn,
                        start: m.start(),
                        end: m.end(),
                    });
                    hits.push((
                        turn,
                        m.start(),
                        self.finding(category, m.as_str(), 1.0, t.order, t.speaker),
                    ));
                }
            }
            for caps in CVV_PATTERN.captures_iter(text) {
                if let Some(value) = caps.get(1) {
                    claimed.push(Claimed {
                        turn,
                        start: value.start(),
                        end: value.end(),
                    });
                    hits.push((
                        turn,
                        value.start(),
                        self.finding(ExposureCategory::Cvv, value.as_str(), 1.0, t.order, t.speaker),
                    ));
                }
            }
        }

        // Context-dependent numbers.
        let contextual: [(&Regex, ExposureCategory, &[&str]); 2] = [
            (&SHORT_NUMBER, ExposureCategory::Otp, OTP_TRIGGERS),
            (&ACCOUNT_NUMBER, ExposureCategory::AccountNumber, ACCOUNT_TRIGGERS),
        ];
        for (turn, t) in turns.iter().enumerate() {
            for (pattern, category, triggers) in contextual {
                for m in pattern.find_iter(&t.text) {
                    if claimed.iter().any(|c| c.overlaps(turn, m.start(), m.end())) {
                        continue;
                    }
                    let Some(position) = tokens
                        .iter()
                        .position(|tok| tok.turn == turn && tok.start == m.start())
                    else {
                        continue;
                    };
                    if let Some(distance) = nearest(&tokens, position, triggers, self.window(), false)
                    {
                        hits.push((
                            turn,
                            m.start(),
                            self.finding(
                                category,
                                m.as_str(),
                                self.proximity_confidence(distance),
                                t.order,
                                t.speaker,
                            ),
                        ));
                    }
                }
            }
        }

        // Requests for a secret: a request verb near "password"/"pin" in the same
        // turn, unless the verb is negated ("never share your password").
        for (position, tok) in tokens.iter().enumerate() {
            if !SECRET_WORDS.contains(&tok.lower.as_str()) {
                continue;
            }
            let t = &turns[tok.turn];
            let Some(verb) = nearest_index(&tokens, position, REQUEST_VERBS, self.window(), true)
            else {
                continue;
            };
            if self.negated(&tokens, verb) {
                debug!(turn = t.order, "Negated secret request ignored");
                continue;
            }
            hits.push((
                tok.turn,
                tok.start,
                self.finding(
                    ExposureCategory::PasswordRequest,
                    &t.text[tok.start..tok.end],
                    self.proximity_confidence(verb.abs_diff(position)),
                    t.order,
                    t.speaker,
                ),
            ));
        }

        hits.sort_by(|a, b| {
            (a.0, a.1, a.2.category)
                .cmp(&(b.0, b.1, b.2.category))
                .then_with(|| a.2.matched_text.cmp(&b.2.matched_text))
        });
        hits.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1 && a.2.category == b.2.category);

        let findings: Vec<ExposureFinding> = hits.into_iter().map(|(_, _, f)| f).collect();
        debug!(findings = findings.len(), "Exposure scan complete");
        findings
    }

    fn window(&self) -> usize {
        self.config.trigger_window.max(1)
    }

    /// A negation within `NEGATION_REACH` tokens before `position`, same turn.
    fn negated(&self, tokens: &[ScanToken], position: usize) -> bool {
        let turn = tokens[position].turn;
        tokens[position.saturating_sub(NEGATION_REACH)..position]
            .iter()
            .any(|tok| tok.turn == turn && self.lexicon.is_negation(&tok.lower))
    }

    /// 1.0 for an adjacent trigger, `edge_confidence` at the edge of the window.
    pub fn proximity_confidence(&self, distance: usize) -> f32 {
        let window = self.window();
        if window <= 1 || distance <= 1 {
            return 1.0;
        }
        let edge = self.config.edge_confidence;
        let fraction = (distance.min(window) - 1) as f32 / (window - 1) as f32;
        (1.0 - (1.0 - edge) * fraction).clamp(0.0, 1.0)
    }

    fn finding(
        &self,
        category: ExposureCategory,
        matched: &str,
        confidence: f32,
        turn_order: usize,
        speaker: Speaker,
    ) -> ExposureFinding {
        ExposureFinding {
            category,
            matched_text: matched.to_string(),
            confidence,
            turn_order,
            speaker,
        }
    }
}

/// Token distance to the closest trigger within `window`, if any.
fn nearest(
    tokens: &[ScanToken],
    position: usize,
    triggers: &[&str],
    window: usize,
    same_turn: bool,
) -> Option<usize> {
    nearest_index(tokens, position, triggers, window, same_turn).map(|i| i.abs_diff(position))
}

/// Index of the closest trigger within `window`; the earlier one on a tie.
fn nearest_index(
    tokens: &[ScanToken],
    position: usize,
    triggers: &[&str],
    window: usize,
    same_turn: bool,
) -> Option<usize> {
    let turn = tokens[position].turn;
    let lo = position.saturating_sub(window);
    let hi = (position + window).min(tokens.len().saturating_sub(1));
    (lo..=hi)
        .filter(|&i| i != position)
        .filter(|&i| !same_turn || tokens[i].turn == turn)
        .filter(|&i| triggers.contains(&tokens[i].lower.as_str()))
        .min_by_key(|&i| (i.abs_diff(position), i))
}
