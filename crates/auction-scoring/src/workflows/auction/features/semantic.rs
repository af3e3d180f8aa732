use std::sync::Arc;

use super::reference::{PartOfSpeech, ReferenceData};
use super::tokenizer::{tokenize, TokenKind};
use super::{FeatureScore, FeatureScorer, ScorerError, MAX_FEATURE_SCORE, MIN_FEATURE_SCORE};

const NOUN_BONUS: f64 = 15.0;
const MODIFIER_NOUN_BONUS: f64 = 10.0;
const VERB_BONUS: f64 = 5.0;
const EXTRA_WORD_PENALTY: f64 = 10.0;
const NUMBER_PENALTY: f64 = 5.0;
const FREE_WORDS: usize = 2;

/// Token-classification heuristic: the strongest industry keyword sets the base,
/// word classes add small bonuses, and long or noisy labels are penalised.
pub struct SemanticValueScorer {
    reference: Arc<ReferenceData>,
}

impl SemanticValueScorer {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self { reference }
    }
}

impl FeatureScorer for SemanticValueScorer {
    fn name(&self) -> &'static str {
        "semantic_value"
    }

    fn score(&self, domain: &str) -> Result<FeatureScore, ScorerError> {
        let tokens = tokenize(domain, &self.reference);
        let mut warnings = Vec::new();

        let mut keyword_strength: f64 = 0.0;
        let mut has_noun = false;
        let mut has_modifier = false;
        let mut has_verb = false;
        let mut words = 0usize;
        let mut numbers = 0usize;

        for token in &tokens {
            match token.kind {
                TokenKind::Word => {
                    words += 1;
                    if let Some(keyword) = self.reference.keyword(&token.text) {
                        keyword_strength = keyword_strength.max(keyword.strength);
                    }
                    match self.reference.part_of_speech(&token.text) {
                        Some(PartOfSpeech::Noun) => has_noun = true,
                        Some(PartOfSpeech::Adjective) => has_modifier = true,
                        Some(PartOfSpeech::Verb) => has_verb = true,
                        Some(PartOfSpeech::Other) | None => {}
                    }
                }
                TokenKind::Number => numbers += 1,
                TokenKind::Unknown => {
                    warnings.push(format!("unclassified fragment '{}'", token.text));
                }
            }
        }

        if words == 0 {
            let mut degraded = FeatureScore::degraded(format!("no known words in '{domain}'"));
            degraded.warnings.extend(warnings);
            return Ok(degraded);
        }

        let mut value = keyword_strength;
        if has_noun {
            value += NOUN_BONUS;
            if has_modifier || has_verb {
                value += MODIFIER_NOUN_BONUS;
            }
        } else if has_verb {
            value += VERB_BONUS;
        }
        value -= words.saturating_sub(FREE_WORDS) as f64 * EXTRA_WORD_PENALTY;
        value -= numbers as f64 * NUMBER_PENALTY;

        Ok(FeatureScore {
            value: value.clamp(MIN_FEATURE_SCORE, MAX_FEATURE_SCORE),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> SemanticValueScorer {
        SemanticValueScorer::new(Arc::new(ReferenceData::builtin()))
    }

    #[test]
    fn industry_keyword_with_modifier_scores_high() {
        let score = scorer().score("smartbank.com").expect("scores");
        // bank (85) + noun bonus + modifier-noun bonus, capped at 100
        assert_eq!(score.value, 100.0);
        assert!(score.warnings.is_empty());
    }

    #[test]
    fn long_labels_are_penalised() {
        let scorer = scorer();
        let short = scorer.score("cloudshop.com").expect("scores");
        let long = scorer.score("mybestcloudshopworld.com").expect("scores");
        assert!(long.value < short.value);
    }

    #[test]
    fn unknown_domain_degrades_to_zero() {
        let score = scorer().score("xqzvk.com").expect("never fails");
        assert_eq!(score.value, 0.0);
        assert_eq!(score.warnings.len(), 2);
    }
}
