//! Versioned word lists and valence tables.
//!
//! One `Lexicon` is built at startup and handed to every engine behind an
//! `Arc`. Nothing mutates it afterwards, so a result can be traced to the exact
//! lexicon version that produced it.
//!
//! Phrase lists are stored normalized (see [`crate::text::normalize`]) so they
//! can be matched directly against normalized turn text.

use std::collections::{BTreeMap, BTreeSet};

use crate::text::{count_phrase, normalize};

pub const LEXICON_VERSION: &str = "en-2024.1";

/// Valence on a -4..4 scale.
const VALENCE_EN: &[(&str, f32)] = &[
    // positive
    ("amazing", 2.8),
    ("appreciate", 1.7),
    ("appreciated", 2.3),
    ("awesome", 3.1),
    ("best", 3.2),
    ("better", 1.9),
    ("brilliant", 2.8),
    ("calm", 1.3),
    ("delighted", 2.9),
    ("easy", 1.9),
    ("enjoy", 2.2),
    ("excellent", 3.2),
    ("fantastic", 2.6),
    ("friendly", 2.2),
    ("glad", 2.0),
    ("good", 1.9),
    ("grateful", 2.0),
    ("great", 3.1),
    ("happy", 2.7),
    ("helpful", 1.9),
    ("kind", 2.4),
    ("love", 3.2),
    ("loved", 2.9),
    ("lovely", 2.8),
    ("nice", 1.8),
    ("perfect", 2.7),
    ("pleased", 1.9),
    ("pleasure", 2.7),
    ("polite", 1.7),
    ("relieved", 1.5),
    ("resolved", 1.2),
    ("satisfied", 1.8),
    ("super", 2.9),
    ("thank", 1.5),
    ("thanks", 1.9),
    ("welcome", 2.0),
    ("wonderful", 2.7),
    // negative
    ("angry", -2.3),
    ("annoyed", -1.6),
    ("annoying", -1.8),
    ("awful", -2.0),
    ("bad", -2.5),
    ("broken", -1.7),
    ("confused", -1.3),
    ("crap", -2.0),
    ("damn", -1.7),
    ("delayed", -1.2),
    ("disappointed", -1.9),
    ("disappointing", -2.2),
    ("disgusted", -2.4),
    ("dissatisfied", -1.6),
    ("exasperated", -1.8),
    ("fail", -2.5),
    ("failed", -2.3),
    ("failure", -2.3),
    ("fraud", -2.8),
    ("frustrated", -2.0),
    ("frustrating", -1.9),
    ("furious", -2.9),
    ("hate", -2.7),
    ("hell", -2.2),
    ("horrible", -2.5),
    ("idiot", -2.3),
    ("irritated", -1.8),
    ("lost", -1.3),
    ("poor", -2.1),
    ("problem", -1.4),
    ("ridiculous", -1.5),
    ("rude", -2.0),
    ("sad", -2.1),
    ("scam", -2.6),
    ("sick", -2.0),
    ("slow", -1.2),
    ("sorry", -0.3),
    ("stolen", -2.4),
    ("stupid", -2.4),
    ("terrible", -2.5),
    ("tired", -1.9),
    ("unacceptable", -2.0),
    ("unfortunately", -1.0),
    ("unhappy", -1.8),
    ("upset", -1.6),
    ("useless", -1.8),
    ("waste", -1.8),
    ("wasted", -2.2),
    ("worried", -1.7),
    ("worst", -3.1),
    ("wrong", -2.1),
];

const AMPLIFIERS_EN: &[(&str, f32)] = &[
    ("absolutely", 1.8),
    ("extremely", 2.0),
    ("fairly", 1.2),
    ("quite", 1.4),
    ("really", 1.6),
    ("totally", 1.6),
    ("very", 1.8),
];

/// Words that flip the polarity of the word after them. Apostrophes are
/// already stripped ("don't" -> "dont").
const NEGATIONS_EN: &[&str] = &[
    "not", "no", "never", "nothing", "neither", "without", "dont", "doesnt", "didnt", "cant",
    "cannot", "wont", "isnt", "wasnt", "arent", "werent", "havent", "hasnt", "shouldnt",
    "wouldnt", "couldnt",
];

const FRUSTRATION_EN: &[&str] = &[
    "frustrated",
    "frustrating",
    "angry",
    "upset",
    "annoyed",
    "irritated",
    "exasperated",
    "fed up",
    "unhappy",
    "dissatisfied",
    "disappointed",
    "disgusted",
    "sick of",
    "tired of",
    "ridiculous",
    "unacceptable",
    "furious",
];

const EMPATHY_EN: &[&str] = &[
    "understand",
    "appreciate",
    "thank you for your patience",
    "i hear you",
    "concern",
    "care",
    "help",
    "assist",
    "support",
    "grateful",
    "empathize",
];

const APOLOGY_EN: &[&str] = &[
    "sorry",
    "apologize",
    "apologise",
    "apologies",
    "regret",
    "my mistake",
    "our mistake",
    "forgive",
    "pardon",
];

const PROFANITY_EN: &[&str] = &[
    "damn", "hell", "crap", "stupid", "idiot", "idiots", "moron", "bloody", "wtf", "shut up",
    "useless",
];

const IMPERATIVES_EN: &[&str] = &[
    "demand",
    "insist",
    "you better",
    "listen to me",
    "do it now",
    "right now",
    "fix it",
    "give me",
];

const ESCALATION_EN: &[&str] = &[
    "transfer you to a supervisor",
    "transfer you to my supervisor",
    "transfer you to a manager",
    "let me escalate",
    "escalate this",
    "escalating this",
    "speak to a supervisor",
    "speak to your supervisor",
    "speak to a manager",
    "speak to your manager",
    "talk to a manager",
    "talk to your manager",
    "file a complaint",
    "legal action",
    "my lawyer",
    "lawsuit",
    "report you",
];

const DISMISSIVE_EN: &[&str] = &[
    "whatever",
    "dont care",
    "not my problem",
    "nothing i can do",
    "nevermind",
    "calm down",
    "as i said",
    "like i said",
    "deal with it",
];

const FUNCTION_WORDS_EN: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do",
    "does", "did", "i", "you", "he", "she", "it", "we", "they", "and", "or", "but", "for",
    "with", "from", "to", "in", "on", "of", "my", "your", "this", "that", "what", "why", "how",
    "when", "where", "who", "can", "will", "please", "thank", "thanks", "hello", "hi", "yes",
    "not",
];

/// Immutable lexicon tables for one language.
#[derive(Debug, Clone)]
pub struct Lexicon {
    version: String,
    valence: BTreeMap<String, f32>,
    amplifiers: BTreeMap<String, f32>,
    negations: BTreeSet<String>,
    function_words: BTreeSet<String>,
    pub frustration: Vec<String>,
    pub empathy: Vec<String>,
    pub apology: Vec<String>,
    pub profanity: Vec<String>,
    pub imperatives: Vec<String>,
    pub escalation: Vec<String>,
    pub dismissive: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::english()
    }
}

fn phrases(items: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = items
        .iter()
        .map(|p| normalize(p))
        .filter(|p| !p.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

fn words(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|w| w.to_string()).collect()
}

impl Lexicon {
    /// The built-in English tables.
    pub fn english() -> Self {
        Self {
            version: LEXICON_VERSION.to_string(),
            valence: VALENCE_EN.iter().map(|(w, v)| (w.to_string(), *v)).collect(),
            amplifiers: AMPLIFIERS_EN
                .iter()
                .map(|(w, f)| (w.to_string(), *f))
                .collect(),
            negations: words(NEGATIONS_EN),
            function_words: words(FUNCTION_WORDS_EN),
            frustration: phrases(FRUSTRATION_EN),
            empathy: phrases(EMPATHY_EN),
            apology: phrases(APOLOGY_EN),
            profanity: phrases(PROFANITY_EN),
            imperatives: phrases(IMPERATIVES_EN),
            escalation: phrases(ESCALATION_EN),
            dismissive: phrases(DISMISSIVE_EN),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn valence(&self, word: &str) -> Option<f32> {
        self.valence.get(word).copied()
    }

    pub fn amplifier(&self, word: &str) -> Option<f32> {
        self.amplifiers.get(word).copied()
    }

    pub fn is_negation(&self, word: &str) -> bool {
        self.negations.contains(word)
    }

    pub fn is_function_word(&self, word: &str) -> bool {
        self.function_words.contains(word)
    }
}

/// Total occurrences of any phrase in `list` within normalized text.
pub fn count_any(normalized: &str, list: &[String]) -> usize {
    list.iter().map(|p| count_phrase(normalized, p)).sum()
}

pub fn contains_any(normalized: &str, list: &[String]) -> bool {
    list.iter().any(|p| count_phrase(normalized, p) > 0)
}
