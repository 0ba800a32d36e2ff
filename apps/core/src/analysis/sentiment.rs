//! Lexicon-based sentiment scoring.
//!
//! A turn's base polarity averages two estimates over its sentiment-bearing
//! words:
//! - a compound value `s / sqrt(s^2 + 15)` of the summed valences `s`;
//! - a polarity value, the mean valence rescaled to [-1, 1].
//!
//! An amplifier right before a word multiplies that word's valence; a negation
//! within the three preceding words flips it. Customer frustration and agent
//! empathy then shift the score by fixed amounts before clamping to [-1, 1].

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::lexicon::{contains_any, Lexicon};
use crate::config::SentimentConfig;
use crate::models::{Conversation, ConversationTurn, Speaker};
use crate::text::{lower_words, normalize};

const COMPOUND_ALPHA: f32 = 15.0;
const NEGATION_SCOPE: usize = 3;
const TRIGGER_EXCERPT_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentTone {
    Positive,
    Warm,
    Neutral,
    Frustrated,
    Hostile,
}

impl SentimentTone {
    pub fn from_score(score: f32) -> Self {
        if score > 0.5 {
            SentimentTone::Positive
        } else if score > 0.1 {
            SentimentTone::Warm
        } else if score > -0.1 {
            SentimentTone::Neutral
        } else if score > -0.5 {
            SentimentTone::Frustrated
        } else {
            SentimentTone::Hostile
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentSample {
    pub turn_order: usize,
    pub speaker: Speaker,
    /// Adjusted polarity in [-1, 1].
    pub score: f32,
    pub tone: SentimentTone,
    /// Emotional intensity multiplier in [1, max_amplifier].
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentArc {
    NegativeToPositive,
    PositiveToNegative,
    SustainedPositive,
    SustainedNegative,
    Fluctuating,
    Neutral,
}

impl SentimentArc {
    pub fn of(scores: &[f32]) -> Self {
        let (Some(&start), Some(&end)) = (scores.first(), scores.last()) else {
            return SentimentArc::Neutral;
        };
        if scores.len() < 2 {
            SentimentArc::Neutral
        } else if start < 0.0 && end > 0.0 {
            SentimentArc::NegativeToPositive
        } else if start > 0.0 && end < 0.0 {
            SentimentArc::PositiveToNegative
        } else if start > 0.2 && end > 0.2 {
            SentimentArc::SustainedPositive
        } else if start < -0.2 && end < -0.2 {
            SentimentArc::SustainedNegative
        } else {
            SentimentArc::Fluctuating
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftDirection {
    Improved,
    Deteriorated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurningPoint {
    pub turn_order: usize,
    pub speaker: Speaker,
    /// Rolling average at the previous and the current turn.
    pub before: f32,
    pub after: f32,
    pub magnitude: f32,
    pub direction: ShiftDirection,
    pub trigger: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSentiment {
    pub turns: usize,
    /// Mean customer score; 0 when the customer never spoke.
    pub aggregate: f32,
    pub min: f32,
    pub max: f32,
    pub volatility: f32,
    pub arc: SentimentArc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSentiment {
    pub turns: usize,
    pub mean: f32,
    pub arc: SentimentArc,
    pub professionalism: f32,
    pub empathy: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentReport {
    pub samples: Vec<SentimentSample>,
    pub aggregate: f32,
    pub customer: CustomerSentiment,
    pub agent: AgentSentiment,
    pub frustration_level: f32,
    /// Customer aggregate mapped onto `[0, 1]`.
    pub satisfaction_prediction: f32,
    pub turning_points: Vec<TurningPoint>,
}

/// Rolling-average sign flips larger than `delta`.
///
/// The rolling average at `i` is the mean of the last `window` values up to and
/// including `i`. A turning point is reported at `i` when the averages at `i-1`
/// and `i` have strictly opposite signs and differ by more than `delta`.
/// Returns `(i, average_before, average_after)`.
pub fn detect_turning_points(scores: &[f32], window: usize, delta: f32) -> Vec<(usize, f32, f32)> {
    let window = window.max(1);
    let rolling: Vec<f32> = (0..scores.len())
        .map(|i| {
            let from = (i + 1).saturating_sub(window);
            let slice = &scores[from..=i];
            slice.iter().sum::<f32>() / slice.len() as f32
        })
        .collect();

    rolling
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0] * pair[1] < 0.0 && (pair[1] - pair[0]).abs() > delta)
        .map(|(i, pair)| (i + 1, pair[0], pair[1]))
        .collect()
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

fn volatility(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let diffs: Vec<f32> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    mean(&diffs)
}

fn recommendation(shift: f32, current: f32) -> &'static str {
    if shift < -0.5 && current < -0.5 {
        "Immediate escalation recommended"
    } else if shift < -0.3 {
        "De-escalation techniques needed"
    } else if shift > 0.5 {
        "Continue current approach"
    } else {
        "Monitor closely"
    }
}

#[derive(Debug, Clone)]
pub struct SentimentScorer {
    config: SentimentConfig,
    lexicon: Arc<Lexicon>,
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new(SentimentConfig::default(), Arc::new(Lexicon::english()))
    }
}

impl SentimentScorer {
    pub fn new(config: SentimentConfig, lexicon: Arc<Lexicon>) -> Self {
        Self { config, lexicon }
    }

    /// Unadjusted polarity of `text` in [-1, 1]; 0 without sentiment words.
    pub fn base_polarity(&self, text: &str) -> f32 {
        let words = lower_words(text);
        let mut sum = 0.0f32;
        let mut hits = 0usize;

        for (i, word) in words.iter().enumerate() {
            let Some(valence) = self.lexicon.valence(word) else {
                continue;
            };
            let mut contribution = valence;
            if let Some(factor) = i
                .checked_sub(1)
                .and_then(|prev| self.lexicon.amplifier(&words[prev]))
            {
                contribution *= factor.min(self.config.max_amplifier);
            }
            let scope = &words[i.saturating_sub(NEGATION_SCOPE)..i];
            if scope.iter().any(|w| self.lexicon.is_negation(w)) {
                contribution = -contribution;
            }
            sum += contribution;
            hits += 1;
        }

        if hits == 0 {
            return 0.0;
        }
        let compound = sum / (sum * sum + COMPOUND_ALPHA).sqrt();
        let polarity = (sum / hits as f32 / 4.0).clamp(-1.0, 1.0);
        ((compound + polarity) / 2.0).clamp(-1.0, 1.0)
    }

    /// Strongest amplifier, boosted by word repetition and runs of `!!!`/`???`.
    pub fn intensity(&self, text: &str) -> f32 {
        let words = lower_words(text);
        let mut intensity = words
            .iter()
            .filter_map(|w| self.lexicon.amplifier(w))
            .fold(1.0f32, f32::max);
        if words.windows(3).any(|w| w[0] == w[1] && w[1] == w[2]) {
            intensity *= 1.5;
        }
        if text.contains("!!!") || text.contains("???") {
            intensity *= 1.3;
        }
        intensity.min(self.config.max_amplifier)
    }

    pub fn score_turn(&self, turn: &ConversationTurn) -> SentimentSample {
        let normalized = normalize(&turn.text);
        let mut score = self.base_polarity(&turn.text);

        match turn.speaker {
            Speaker::Customer if contains_any(&normalized, &self.lexicon.frustration) => {
                score -= self.config.frustration_penalty;
            }
            Speaker::Agent if self.shows_empathy(&normalized) => {
                score += self.config.empathy_bonus;
            }
            _ => {}
        }
        let score = score.clamp(-1.0, 1.0);

        SentimentSample {
            turn_order: turn.order,
            speaker: turn.speaker,
            score,
            tone: SentimentTone::from_score(score),
            intensity: self.intensity(&turn.text),
        }
    }

    fn shows_empathy(&self, normalized: &str) -> bool {
        contains_any(normalized, &self.lexicon.empathy)
            || contains_any(normalized, &self.lexicon.apology)
    }

    /// Per-turn samples plus turning points.
    pub fn score(&self, conversation: &Conversation) -> (Vec<SentimentSample>, Vec<TurningPoint>) {
        let samples: Vec<SentimentSample> = conversation
            .turns()
            .iter()
            .map(|t| self.score_turn(t))
            .collect();
        let turning_points = self.turning_points(conversation, &samples);
        (samples, turning_points)
    }

    /// Turning points over customer turns, or over every turn when the
    /// customer never spoke.
    fn turning_points(
        &self,
        conversation: &Conversation,
        samples: &[SentimentSample],
    ) -> Vec<TurningPoint> {
        let customer: Vec<usize> = samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.speaker == Speaker::Customer)
            .map(|(i, _)| i)
            .collect();
        let series: Vec<usize> = if customer.is_empty() {
            (0..samples.len()).collect()
        } else {
            customer
        };
        let scores: Vec<f32> = series.iter().map(|&i| samples[i].score).collect();

        detect_turning_points(
            &scores,
            self.config.rolling_window,
            self.config.turning_point_delta,
        )
        .into_iter()
        .take(self.config.max_turning_points)
        .map(|(at, before, after)| {
            let sample = &samples[series[at]];
            let turn = &conversation.turns()[series[at]];
            let shift = after - before;
            TurningPoint {
                turn_order: sample.turn_order,
                speaker: sample.speaker,
                before,
                after,
                magnitude: shift.abs(),
                direction: if shift > 0.0 {
                    ShiftDirection::Improved
                } else {
                    ShiftDirection::Deteriorated
                },
                trigger: turn.text.chars().take(TRIGGER_EXCERPT_CHARS).collect(),
                recommendation: recommendation(shift, after).to_string(),
            }
        })
        .collect()
    }

    /// Full sentiment report for `conversation`.
    pub fn report(&self, conversation: &Conversation) -> SentimentReport {
        let (samples, turning_points) = self.score(conversation);

        let customer_scores: Vec<f32> = samples
            .iter()
            .filter(|s| s.speaker == Speaker::Customer)
            .map(|s| s.score)
            .collect();
        let agent_scores: Vec<f32> = samples
            .iter()
            .filter(|s| s.speaker == Speaker::Agent)
            .map(|s| s.score)
            .collect();

        let aggregate = mean(&customer_scores);
        let customer = CustomerSentiment {
            turns: customer_scores.len(),
            aggregate,
            min: customer_scores.iter().copied().reduce(f32::min).unwrap_or(0.0),
            max: customer_scores.iter().copied().reduce(f32::max).unwrap_or(0.0),
            volatility: volatility(&customer_scores),
            arc: SentimentArc::of(&customer_scores),
        };

        let agent_turns: Vec<&ConversationTurn> = conversation.turns_by(Speaker::Agent).collect();
        let professionalism = if agent_scores.is_empty() {
            0.5
        } else {
            let extreme = agent_scores.iter().filter(|s| s.abs() > 0.7).count();
            1.0 - (extreme as f32 / agent_scores.len() as f32) * 0.5
        };
        let empathy = if agent_turns.is_empty() {
            0.0
        } else {
            let empathetic = agent_turns
                .iter()
                .filter(|t| self.shows_empathy(&normalize(&t.text)))
                .count();
            empathetic as f32 / agent_turns.len() as f32
        };
        let agent = AgentSentiment {
            turns: agent_scores.len(),
            mean: mean(&agent_scores),
            arc: SentimentArc::of(&agent_scores),
            professionalism,
            empathy,
        };

        let frustration_level = if customer_scores.is_empty() {
            0.0
        } else {
            let frustrated: f32 = samples
                .iter()
                .zip(conversation.turns())
                .filter(|(s, t)| {
                    s.speaker == Speaker::Customer
                        && contains_any(&normalize(&t.text), &self.lexicon.frustration)
                })
                .map(|(s, _)| s.score.abs())
                .sum();
            (frustrated / customer_scores.len() as f32).min(1.0)
        };

        debug!(
            turns = samples.len(),
            aggregate,
            turning_points = turning_points.len(),
            "Sentiment scoring complete"
        );

        SentimentReport {
            samples,
            aggregate,
            customer,
            agent,
            frustration_level,
            satisfaction_prediction: ((1.0 + aggregate) / 2.0).clamp(0.0, 1.0),
            turning_points,
        }
    }
}
