use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    Customer,
    Unknown,
}

impl Speaker {
    /// Maps a free-form speaker tag ("Agent", "Representative", "Caller", ...) to a speaker.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "agent" | "representative" | "rep" | "advisor" | "support" => Speaker::Agent,
            "customer" | "caller" | "client" | "user" => Speaker::Customer,
            _ => Speaker::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Agent => "agent",
            Speaker::Customer => "customer",
            Speaker::Unknown => "unknown",
        }
    }
}

/// A single utterance in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    /// Monotonic position in the conversation, starting at 0.
    pub order: usize,
}

impl ConversationTurn {
    pub fn new(speaker: Speaker, text: impl Into<String>, order: usize) -> Self {
        Self {
            speaker,
            text: text.into(),
            order,
        }
    }
}

/// An ordered sequence of turns. Order is significant for timeline and
/// turning-point computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    /// Builds a conversation from turns, rejecting non-monotonic `order` values.
    pub fn from_turns(turns: Vec<ConversationTurn>) -> Result<Self, AppError> {
        if let Some(pair) = turns.windows(2).find(|w| w[1].order <= w[0].order) {
            return Err(AppError::Validation(format!(
                "turn order must be strictly increasing (found {} after {})",
                pair[1].order, pair[0].order
            )));
        }
        Ok(Self { turns })
    }

    /// Builds a conversation from `(speaker, text)` pairs, numbering turns in sequence.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(Speaker, S)]) -> Self {
        let turns = pairs
            .iter()
            .enumerate()
            .map(|(i, (speaker, text))| ConversationTurn::new(*speaker, text.as_ref(), i))
            .collect();
        Self { turns }
    }

    /// Parses a `Speaker: text` transcript, one turn per line.
    ///
    /// Lines without a speaker tag alternate between agent and customer,
    /// starting with the agent. Blank lines are skipped.
    pub fn parse_transcript(raw: &str) -> Self {
        let mut turns: Vec<ConversationTurn> = Vec::new();

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let order = turns.len();
            let turn = match line.split_once(':') {
                Some((tag, text)) if is_speaker_tag(tag) => {
                    ConversationTurn::new(Speaker::from_tag(tag), text.trim(), order)
                }
                _ => {
                    let speaker = if order % 2 == 0 {
                        Speaker::Agent
                    } else {
                        Speaker::Customer
                    };
                    ConversationTurn::new(speaker, line, order)
                }
            };
            turns.push(turn);
        }

        Self { turns }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// True when there is nothing but whitespace to analyze.
    pub fn is_blank(&self) -> bool {
        self.turns.iter().all(|t| t.text.trim().is_empty())
    }

    pub fn turns_by(&self, speaker: Speaker) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().filter(move |t| t.speaker == speaker)
    }

    /// All turn texts joined with newlines (speaker tags excluded).
    pub fn full_text(&self) -> String {
        self.turns
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of distinct known speakers, at least 1.
    pub fn speaker_count(&self) -> usize {
        let mut speakers: Vec<Speaker> = self.turns.iter().map(|t| t.speaker).collect();
        speakers.sort();
        speakers.dedup();
        speakers.len().max(1)
    }
}

/// A speaker tag is a short label with no sentence punctuation, e.g. "Agent".
fn is_speaker_tag(tag: &str) -> bool {
    let tag = tag.trim();
    !tag.is_empty()
        && tag.len() <= 24
        && tag.split_whitespace().count() <= 2
        && tag.chars().all(|c| c.is_alphanumeric() || c == ' ' || c == '_' || c == '-')
}

/// A turn as supplied by callers in JSON input.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TurnInput {
    #[validate(length(min = 1))]
    pub speaker: String,
    pub text: String,
}

/// Converts caller-supplied turns to a conversation.
pub fn conversation_from_inputs(inputs: &[TurnInput]) -> Result<Conversation, AppError> {
    let mut turns = Vec::with_capacity(inputs.len());
    for (order, input) in inputs.iter().enumerate() {
        input.validate()?;
        turns.push(ConversationTurn::new(
            Speaker::from_tag(&input.speaker),
            input.text.clone(),
            order,
        ));
    }
    Conversation::from_turns(turns)
}
