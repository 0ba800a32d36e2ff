//! Local language estimate used when no language signal is supplied.

use serde::{Deserialize, Serialize};

use super::lexicon::Lexicon;
use crate::text::lower_words;

const ENGLISH_RATIO_FOR_FULL_CONFIDENCE: f32 = 0.35;
const CODE_SWITCH_SHARE: f32 = 0.15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageAnalysis {
    pub primary_language: String,
    #[serde(default)]
    pub language_name: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub code_switching_detected: bool,
    #[serde(default)]
    pub secondary_languages: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// Function-word ratio estimate. The lexicons are English, so the primary
/// language is always "en"; only the confidence varies.
pub fn estimate_language(lexicon: &Lexicon, text: &str) -> LanguageAnalysis {
    let words = lower_words(text);
    if words.is_empty() {
        return LanguageAnalysis {
            primary_language: "en".to_string(),
            language_name: "English".to_string(),
            confidence: 0.0,
            code_switching_detected: false,
            secondary_languages: vec![],
            notes: "No words to analyze; assumed English.".to_string(),
        };
    }

    let total = words.len() as f32;
    let function_words = words.iter().filter(|w| lexicon.is_function_word(w)).count() as f32;
    let ratio = function_words / total;

    // Accented or non-latin words hint at another language in the mix.
    let foreign = words
        .iter()
        .filter(|w| w.chars().any(|c| c.is_alphabetic() && !c.is_ascii()))
        .count() as f32;
    let code_switching_detected = foreign / total >= CODE_SWITCH_SHARE;

    let confidence = (ratio / ENGLISH_RATIO_FOR_FULL_CONFIDENCE).min(1.0) * 0.9
        * if code_switching_detected { 0.7 } else { 1.0 };

    LanguageAnalysis {
        primary_language: "en".to_string(),
        language_name: "English".to_string(),
        confidence,
        code_switching_detected,
        secondary_languages: if code_switching_detected {
            vec!["unknown".to_string()]
        } else {
            vec![]
        },
        notes: format!(
            "Local estimate: {:.0}% English function words over {} words.",
            ratio * 100.0,
            words.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_conversation() {
        let lexicon = Lexicon::english();
        let analysis = estimate_language(
            &lexicon,
            "Hello, can you tell me why my card is not working? I have tried it twice.",
        );
        assert_eq!(analysis.primary_language, "en");
        assert!(analysis.confidence > 0.6);
        assert!(!analysis.code_switching_detected);
    }

    #[test]
    fn test_mixed_language_lowers_confidence() {
        let lexicon = Lexicon::english();
        let analysis = estimate_language(&lexicon, "Bonjour, très bien, but the café était fermé");
        assert!(analysis.code_switching_detected);
        assert_eq!(analysis.secondary_languages, vec!["unknown".to_string()]);
    }

    #[test]
    fn test_empty_text_is_zero_confidence() {
        let analysis = estimate_language(&Lexicon::english(), "  ");
        assert_eq!(analysis.confidence, 0.0);
    }
}
