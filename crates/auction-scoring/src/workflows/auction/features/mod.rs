//! Pluggable per-domain feature scorers.
//!
//! A scorer maps a domain name plus its reference data to a number in `[0, 100]`.
//! Gaps in the reference data are not errors: the scorer degrades to zero for the
//! affected tokens and reports a warning. `ScorerError` is reserved for failures
//! of the scorer itself (an unreachable backing service, a broken plug-in).

mod lexical;
mod reference;
mod semantic;
mod tokenizer;

use std::sync::Arc;

pub use lexical::LexicalFrequencyScorer;
pub use reference::{IndustryKeyword, PartOfSpeech, ReferenceData, ReferenceDataError};
pub use semantic::SemanticValueScorer;
pub use tokenizer::{tokenize, Token, TokenKind};

pub const MIN_FEATURE_SCORE: f64 = 0.0;
pub const MAX_FEATURE_SCORE: f64 = 100.0;

/// Value produced by a scorer along with any non-fatal data-gap warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScore {
    pub value: f64,
    pub warnings: Vec<String>,
}

impl FeatureScore {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn degraded(warning: impl Into<String>) -> Self {
        Self {
            value: MIN_FEATURE_SCORE,
            warnings: vec![warning.into()],
        }
    }
}

pub trait FeatureScorer: Send + Sync {
    /// Stable name used in warnings and logs.
    fn name(&self) -> &'static str;

    fn score(&self, domain: &str) -> Result<FeatureScore, ScorerError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScorerError {
    #[error("{scorer} unavailable: {detail}")]
    Unavailable { scorer: &'static str, detail: String },
    #[error("{scorer} produced {value}, outside [0, 100]")]
    OutOfRange { scorer: &'static str, value: f64 },
}

/// Results of running both scorers on one domain. Each side is independent:
/// one failing never prevents the other from running.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureOutcome {
    pub lfs: Result<f64, ScorerError>,
    pub sv: Result<f64, ScorerError>,
    pub warnings: Vec<String>,
}

impl FeatureOutcome {
    /// Both sub-scores, or a description of every scorer that failed.
    pub fn into_scores(self) -> Result<(f64, f64), String> {
        match (self.lfs, self.sv) {
            (Ok(lfs), Ok(sv)) => Ok((lfs, sv)),
            (lfs, sv) => {
                let failures: Vec<String> = [lfs.err(), sv.err()]
                    .into_iter()
                    .flatten()
                    .map(|error| error.to_string())
                    .collect();
                Err(failures.join("; "))
            }
        }
    }
}

/// The two scorers a batch requires, shared across workers.
#[derive(Clone)]
pub struct FeatureScorers {
    lexical: Arc<dyn FeatureScorer>,
    semantic: Arc<dyn FeatureScorer>,
}

impl FeatureScorers {
    pub fn new(lexical: Arc<dyn FeatureScorer>, semantic: Arc<dyn FeatureScorer>) -> Self {
        Self { lexical, semantic }
    }

    pub fn from_reference(reference: Arc<ReferenceData>) -> Self {
        Self::new(
            Arc::new(LexicalFrequencyScorer::new(reference.clone())),
            Arc::new(SemanticValueScorer::new(reference)),
        )
    }

    pub fn evaluate(&self, domain: &str) -> FeatureOutcome {
        let mut warnings = Vec::new();
        let lfs = run_scorer(self.lexical.as_ref(), domain, &mut warnings);
        let sv = run_scorer(self.semantic.as_ref(), domain, &mut warnings);
        FeatureOutcome { lfs, sv, warnings }
    }
}

fn run_scorer(
    scorer: &dyn FeatureScorer,
    domain: &str,
    warnings: &mut Vec<String>,
) -> Result<f64, ScorerError> {
    let FeatureScore {
        value,
        warnings: scorer_warnings,
    } = scorer.score(domain)?;

    warnings.extend(
        scorer_warnings
            .into_iter()
            .map(|warning| format!("{}: {warning}", scorer.name())),
    );

    if !value.is_finite() || !(MIN_FEATURE_SCORE..=MAX_FEATURE_SCORE).contains(&value) {
        return Err(ScorerError::OutOfRange {
            scorer: scorer.name(),
            value,
        });
    }
    Ok(value)
}
