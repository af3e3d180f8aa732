use std::sync::Arc;

use super::reference::ReferenceData;
use super::tokenizer::{tokenize, TokenKind};
use super::{FeatureScore, FeatureScorer, ScorerError, MAX_FEATURE_SCORE};

/// Scores a domain by how common its constituent words are.
///
/// Each word contributes `ln(1 + count) / ln(1 + max_count)` scaled to 100,
/// weighted by its length. Unknown fragments weigh in at zero and produce a
/// warning; digit runs are ignored.
pub struct LexicalFrequencyScorer {
    reference: Arc<ReferenceData>,
}

impl LexicalFrequencyScorer {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self { reference }
    }

    fn word_score(&self, count: u64) -> f64 {
        let max = self.reference.max_frequency();
        if max == 0 {
            return 0.0;
        }
        ((count as f64).ln_1p() / (max as f64).ln_1p() * MAX_FEATURE_SCORE)
            .clamp(0.0, MAX_FEATURE_SCORE)
    }
}

impl FeatureScorer for LexicalFrequencyScorer {
    fn name(&self) -> &'static str {
        "lexical_frequency"
    }

    fn score(&self, domain: &str) -> Result<FeatureScore, ScorerError> {
        let tokens = tokenize(domain, &self.reference);
        let mut warnings = Vec::new();
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for token in &tokens {
            let weight = token.len() as f64;
            match token.kind {
                TokenKind::Number => continue,
                TokenKind::Word => match self.reference.frequency(&token.text) {
                    Some(count) => weighted += self.word_score(count) * weight,
                    None => warnings.push(format!("no frequency data for '{}'", token.text)),
                },
                TokenKind::Unknown => {
                    warnings.push(format!("unrecognised fragment '{}'", token.text));
                }
            }
            total_weight += weight;
        }

        if total_weight == 0.0 {
            return Ok(FeatureScore::degraded(format!(
                "no scorable tokens in '{domain}'"
            )));
        }

        Ok(FeatureScore {
            value: weighted / total_weight,
            warnings,
        })
    }
}
