//! Intent classification using regex patterns.
//!
//! Local fallback for the remote intent signal: weighted pattern groups,
//! churn-threat detection and a coarse urgency level. English only.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::models::{Conversation, Speaker};

/// Customer intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Money back for a charge or order
    RefundRequest,
    /// Something does not work
    TechnicalSupport,
    /// Wants to close or cancel
    Cancellation,
    /// Charges, fees, invoices
    BillingIssue,
    /// Balance, statement, account details
    AccountInquiry,
    /// Dissatisfaction with service
    Complaint,
    /// Default
    GeneralInquiry,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::RefundRequest => "refund_request",
            Intent::TechnicalSupport => "technical_support",
            Intent::Cancellation => "cancellation",
            Intent::BillingIssue => "billing_issue",
            Intent::AccountInquiry => "account_inquiry",
            Intent::Complaint => "complaint",
            Intent::GeneralInquiry => "general_inquiry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

/// Intent signal, produced remotely or by [`IntentClassifier::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub primary_intent: Intent,
    #[serde(default)]
    pub secondary_intents: Vec<Intent>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub matched_patterns: Vec<String>,
    #[serde(default)]
    pub churn_intent_detected: bool,
    #[serde(default)]
    pub churn_statement: Option<String>,
    pub urgency_level: Urgency,
    #[serde(default = "default_resolution")]
    pub resolution_status: String,
}

fn default_resolution() -> String {
    "unresolved".to_string()
}

/// Pattern group for one intent.
struct IntentPattern {
    intent: Intent,
    patterns: &'static [Regex],
    weight: f32,
}

// NOTE: expect() is acceptable here: the patterns are compile-time constants.
static REFUND_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(refund|refunded|reimburse|reimbursement)\b").expect("Invalid regex: refund words"),
        Regex::new(r"(?i)\b(money back|give me back|return my money|charge ?back)\b").expect("Invalid regex: money back phrases"),
        Regex::new(r"(?i)\b(return (the|this|my) (order|item|product))\b").expect("Invalid regex: return phrases"),
    ]
});

static TECHNICAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(not working|doesn'?t work|stopped working|won'?t (load|open|connect))\b").expect("Invalid regex: not working phrases"),
        Regex::new(r"(?i)\b(error|crash|crashes|bug|glitch|outage|down)\b").expect("Invalid regex: failure words"),
        Regex::new(r"(?i)\b(app|website|login|log in|network|signal|internet|connection)\b").expect("Invalid regex: technical nouns"),
        Regex::new(r"(?i)\b(reset|reinstall|troubleshoot|update)\b").expect("Invalid regex: fix verbs"),
    ]
});

static CANCELLATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(cancel|cancellation|terminate|discontinue)\b").expect("Invalid regex: cancel words"),
        Regex::new(r"(?i)\b(close (my|the) account|end (my|the) (contract|subscription|plan))\b").expect("Invalid regex: close account phrases"),
        Regex::new(r"(?i)\b(unsubscribe|opt out)\b").expect("Invalid regex: unsubscribe words"),
    ]
});

static BILLING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(bill|billing|invoice|statement)\b").expect("Invalid regex: bill words"),
        Regex::new(r"(?i)\b(charge|charged|overcharged|fee|fees|payment|debited)\b").expect("Invalid regex: charge words"),
        Regex::new(r"(?i)\b(double charged|charged twice|wrong amount|extra charge)\b").expect("Invalid regex: billing error phrases"),
    ]
});

static ACCOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(balance|account details|account number|account status)\b").expect("Invalid regex: account nouns"),
        Regex::new(r"(?i)\b(update (my|the) (address|email|phone|details))\b").expect("Invalid regex: update details"),
        Regex::new(r"(?i)\b(check|verify|confirm) (my|the) account\b").expect("Invalid regex: check account"),
    ]
});

static COMPLAINT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(complaint|complain|unacceptable|ridiculous|terrible service)\b").expect("Invalid regex: complaint words"),
        Regex::new(r"(?i)\b(worst|awful|horrible|disappointed|frustrated|fed up)\b").expect("Invalid regex: dissatisfaction words"),
        Regex::new(r"(?i)\b(speak to (a|your) (manager|supervisor))\b").expect("Invalid regex: manager phrases"),
    ]
});

static CHURN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(cancel|close) (my|the) (account|card|plan|subscription|policy)\b").expect("Invalid regex: churn cancel"),
        Regex::new(r"(?i)\b(switch(ing)? to|moving to|go(ing)? to) (another|a different|your competitor|a competitor)\b").expect("Invalid regex: churn switching"),
        Regex::new(r"(?i)\b(leaving|i'?ll leave|take my business elsewhere)\b").expect("Invalid regex: churn leaving"),
        Regex::new(r"(?i)\bcompetitor\b").expect("Invalid regex: churn competitor"),
    ]
});

static URGENCY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(urgent|urgently|immediately|asap|emergency|critical|right now)\b")
        .expect("Invalid regex: urgency words")
});

/// Intent classifier using regex patterns
pub struct IntentClassifier {
    patterns: Vec<IntentPattern>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    /// Create a new intent classifier with all patterns
    pub fn new() -> Self {
        let patterns = vec![
            IntentPattern {
                intent: Intent::Cancellation,
                patterns: CANCELLATION_PATTERNS.as_slice(),
                weight: 1.0,
            },
            IntentPattern {
                intent: Intent::RefundRequest,
                patterns: REFUND_PATTERNS.as_slice(),
                weight: 0.95,
            },
            IntentPattern {
                intent: Intent::Complaint,
                patterns: COMPLAINT_PATTERNS.as_slice(),
                weight: 0.85,
            },
            IntentPattern {
                intent: Intent::BillingIssue,
                patterns: BILLING_PATTERNS.as_slice(),
                weight: 0.85,
            },
            IntentPattern {
                intent: Intent::TechnicalSupport,
                patterns: TECHNICAL_PATTERNS.as_slice(),
                weight: 0.8,
            },
            IntentPattern {
                intent: Intent::AccountInquiry,
                patterns: ACCOUNT_PATTERNS.as_slice(),
                weight: 0.7,
            },
        ];

        Self { patterns }
    }

    /// Scores every group against `text`; best first, ties in declaration order.
    fn scores(&self, text: &str) -> Vec<(Intent, f32, Vec<String>)> {
        let mut scored: Vec<(Intent, f32, Vec<String>)> = self
            .patterns
            .iter()
            .filter_map(|group| {
                let matched: Vec<String> = group
                    .patterns
                    .iter()
                    .filter_map(|p| p.find(text).map(|m| m.as_str().to_lowercase()))
                    .collect();
                if matched.is_empty() {
                    return None;
                }
                let ratio = matched.len() as f32 / group.patterns.len() as f32;
                Some((group.intent, ratio * group.weight, matched))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    /// Classifies the intent of a single text.
    pub fn classify(&self, text: &str) -> (Intent, f32, Vec<String>) {
        let text = text.trim();
        if text.is_empty() {
            return (Intent::GeneralInquiry, 0.0, vec![]);
        }
        match self.scores(text).into_iter().next() {
            Some((intent, score, matched)) => (intent, (score * 1.2).min(1.0), matched),
            None => (Intent::GeneralInquiry, 0.3, vec![]),
        }
    }

    /// Conversation-level intent signal from the customer's turns (all turns
    /// if the customer never spoke).
    pub fn analyze(&self, conversation: &Conversation) -> IntentAnalysis {
        let customer: Vec<&str> = conversation
            .turns_by(Speaker::Customer)
            .map(|t| t.text.as_str())
            .collect();
        let text = if customer.is_empty() {
            conversation.full_text()
        } else {
            customer.join("\n")
        };

        let (primary_intent, confidence, matched_patterns) = self.classify(&text);
        let secondary_intents = self
            .scores(&text)
            .into_iter()
            .map(|(intent, _, _)| intent)
            .filter(|&intent| intent != primary_intent)
            .collect();

        let churn_statement = conversation
            .turns_by(Speaker::Customer)
            .chain(conversation.turns_by(Speaker::Unknown))
            .find(|t| CHURN_PATTERNS.iter().any(|p| p.is_match(&t.text)))
            .map(|t| t.text.trim().to_string());

        let urgency_level = if URGENCY_PATTERN.is_match(&text) {
            Urgency::High
        } else {
            Urgency::Medium
        };

        IntentAnalysis {
            primary_intent,
            secondary_intents,
            confidence,
            matched_patterns,
            churn_intent_detected: churn_statement.is_some(),
            churn_statement,
            urgency_level,
            resolution_status: default_resolution(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refund_detection() {
        let classifier = IntentClassifier::new();
        let (intent, confidence, matched) = classifier.classify("I want a refund, give me my money back");
        assert_eq!(intent, Intent::RefundRequest);
        assert!(confidence > 0.5);
        assert!(matched.contains(&"refund".to_string()));
    }

    #[test]
    fn test_cancellation_detection() {
        let classifier = IntentClassifier::new();
        let (intent, _, _) = classifier.classify("Please cancel and close my account");
        assert_eq!(intent, Intent::Cancellation);
    }

    #[test]
    fn test_technical_detection() {
        let classifier = IntentClassifier::new();
        let (intent, _, _) = classifier.classify("The app is not working, I keep getting an error on login");
        assert_eq!(intent, Intent::TechnicalSupport);
    }

    #[test]
    fn test_general_inquiry_default() {
        let classifier = IntentClassifier::new();
        assert_eq!(classifier.classify("").0, Intent::GeneralInquiry);
        assert_eq!(classifier.classify("Good morning").0, Intent::GeneralInquiry);
    }

    #[test]
    fn test_conversation_churn_and_urgency() {
        let conv = Conversation::from_pairs(&[
            (Speaker::Agent, "How can I help?"),
            (Speaker::Customer, "I was charged twice. Fix this immediately."),
            (Speaker::Customer, "Otherwise I will close my account and switch to another bank."),
        ]);
        let analysis = IntentClassifier::new().analyze(&conv);
        assert!(analysis.churn_intent_detected);
        assert!(analysis
            .churn_statement
            .as_deref()
            .is_some_and(|s| s.contains("close my account")));
        assert_eq!(analysis.urgency_level, Urgency::High);
        assert_eq!(analysis.resolution_status, "unresolved");
    }
}
