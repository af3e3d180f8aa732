use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Coarse word class used by the semantic-value heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Other,
}

/// Industry keyword with the strength (0-100) it lends a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryKeyword {
    pub category: String,
    pub strength: f64,
}

#[derive(Debug, Default, Deserialize)]
struct RawReferenceData {
    #[serde(default)]
    word_frequencies: HashMap<String, u64>,
    #[serde(default)]
    industry_keywords: HashMap<String, IndustryKeyword>,
    #[serde(default)]
    parts_of_speech: HashMap<String, PartOfSpeech>,
}

impl From<RawReferenceData> for ReferenceData {
    fn from(raw: RawReferenceData) -> Self {
        ReferenceData::new(
            raw.word_frequencies,
            raw.industry_keywords,
            raw.parts_of_speech,
        )
    }
}

/// Read-only lookup tables shared by every feature scorer and worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawReferenceData")]
pub struct ReferenceData {
    word_frequencies: HashMap<String, u64>,
    industry_keywords: HashMap<String, IndustryKeyword>,
    parts_of_speech: HashMap<String, PartOfSpeech>,
    max_frequency: u64,
    longest_word: usize,
}

impl ReferenceData {
    pub fn new(
        word_frequencies: HashMap<String, u64>,
        industry_keywords: HashMap<String, IndustryKeyword>,
        parts_of_speech: HashMap<String, PartOfSpeech>,
    ) -> Self {
        let normalize = |key: String| key.trim().to_ascii_lowercase();
        let word_frequencies: HashMap<String, u64> = word_frequencies
            .into_iter()
            .map(|(word, count)| (normalize(word), count))
            .collect();
        let industry_keywords: HashMap<String, IndustryKeyword> = industry_keywords
            .into_iter()
            .map(|(word, keyword)| {
                let strength = if keyword.strength.is_finite() {
                    keyword.strength.clamp(0.0, 100.0)
                } else {
                    0.0
                };
                (normalize(word), IndustryKeyword { strength, ..keyword })
            })
            .collect();
        let parts_of_speech: HashMap<String, PartOfSpeech> = parts_of_speech
            .into_iter()
            .map(|(word, pos)| (normalize(word), pos))
            .collect();

        let max_frequency = word_frequencies.values().copied().max().unwrap_or(0);
        let longest_word = word_frequencies
            .keys()
            .chain(industry_keywords.keys())
            .chain(parts_of_speech.keys())
            .map(|word| word.chars().count())
            .max()
            .unwrap_or(0);

        Self {
            word_frequencies,
            industry_keywords,
            parts_of_speech,
            max_frequency,
            longest_word,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReferenceDataError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ReferenceDataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, ReferenceDataError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Small built-in vocabulary so the engine scores sensibly without external files.
    pub fn builtin() -> Self {
        let word_frequencies = BUILTIN_FREQUENCIES
            .iter()
            .map(|(word, count)| (word.to_string(), *count))
            .collect();
        let industry_keywords = BUILTIN_KEYWORDS
            .iter()
            .map(|(word, category, strength)| {
                (
                    word.to_string(),
                    IndustryKeyword {
                        category: category.to_string(),
                        strength: *strength,
                    },
                )
            })
            .collect();
        let parts_of_speech = BUILTIN_PARTS_OF_SPEECH
            .iter()
            .map(|(word, pos)| (word.to_string(), *pos))
            .collect();
        Self::new(word_frequencies, industry_keywords, parts_of_speech)
    }

    pub fn is_word(&self, token: &str) -> bool {
        self.word_frequencies.contains_key(token)
            || self.industry_keywords.contains_key(token)
            || self.parts_of_speech.contains_key(token)
    }

    pub fn frequency(&self, token: &str) -> Option<u64> {
        self.word_frequencies.get(token).copied()
    }

    pub fn max_frequency(&self) -> u64 {
        self.max_frequency
    }

    pub fn keyword(&self, token: &str) -> Option<&IndustryKeyword> {
        self.industry_keywords.get(token)
    }

    pub fn part_of_speech(&self, token: &str) -> Option<PartOfSpeech> {
        self.parts_of_speech.get(token).copied()
    }

    pub fn longest_word(&self) -> usize {
        self.longest_word
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceDataError {
    #[error("unable to read reference data {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed reference data: {0}")]
    Parse(#[from] serde_json::Error),
}

const BUILTIN_FREQUENCIES: &[(&str, u64)] = &[
    ("the", 23_135_851),
    ("best", 1_154_316),
    ("home", 1_107_423),
    ("shop", 402_112),
    ("online", 935_230),
    ("web", 612_004),
    ("cloud", 210_773),
    ("tech", 189_225),
    ("data", 856_331),
    ("health", 702_442),
    ("care", 611_978),
    ("money", 488_190),
    ("bank", 310_556),
    ("pay", 290_010),
    ("travel", 385_871),
    ("trip", 120_331),
    ("food", 540_112),
    ("fresh", 150_302),
    ("green", 320_665),
    ("smart", 240_118),
    ("fast", 260_443),
    ("easy", 330_204),
    ("city", 612_777),
    ("hub", 61_220),
    ("lab", 88_902),
    ("labs", 40_117),
    ("app", 210_004),
    ("apps", 98_310),
    ("game", 420_558),
    ("games", 300_016),
    ("news", 980_114),
    ("market", 410_229),
    ("store", 380_775),
    ("buy", 350_690),
    ("deal", 180_556),
    ("deals", 170_020),
    ("car", 520_331),
    ("cars", 230_115),
    ("house", 610_884),
    ("land", 300_227),
    ("energy", 260_781),
    ("solar", 60_442),
    ("coffee", 90_334),
    ("pet", 70_221),
    ("pets", 65_117),
    ("dog", 150_443),
    ("fit", 110_908),
    ("fitness", 95_556),
    ("yoga", 40_003),
    ("learn", 180_660),
    ("school", 420_009),
    ("code", 240_321),
    ("dev", 50_776),
    ("ai", 120_554),
    ("bot", 40_112),
    ("crypto", 35_887),
    ("coin", 60_221),
    ("my", 2_100_443),
    ("go", 1_500_332),
    ("get", 1_900_110),
    ("blue", 330_441),
    ("red", 410_778),
    ("sun", 200_334),
    ("star", 260_119),
    ("box", 230_665),
    ("link", 280_093),
    ("zone", 110_221),
    ("point", 450_338),
    ("world", 900_447),
    ("life", 1_000_112),
    ("space", 340_556),
    ("design", 380_223),
    ("studio", 120_443),
    ("media", 330_118),
    ("pro", 140_221),
];

const BUILTIN_KEYWORDS: &[(&str, &str, f64)] = &[
    ("cloud", "technology", 85.0),
    ("tech", "technology", 80.0),
    ("data", "technology", 75.0),
    ("ai", "technology", 90.0),
    ("code", "technology", 70.0),
    ("dev", "technology", 60.0),
    ("app", "technology", 65.0),
    ("apps", "technology", 60.0),
    ("bot", "technology", 55.0),
    ("web", "technology", 60.0),
    ("health", "health", 85.0),
    ("care", "health", 70.0),
    ("fitness", "health", 65.0),
    ("fit", "health", 55.0),
    ("yoga", "health", 55.0),
    ("money", "finance", 80.0),
    ("bank", "finance", 85.0),
    ("pay", "finance", 80.0),
    ("crypto", "finance", 70.0),
    ("coin", "finance", 60.0),
    ("travel", "travel", 80.0),
    ("trip", "travel", 65.0),
    ("shop", "commerce", 75.0),
    ("store", "commerce", 70.0),
    ("market", "commerce", 70.0),
    ("buy", "commerce", 65.0),
    ("deals", "commerce", 60.0),
    ("deal", "commerce", 55.0),
    ("house", "real_estate", 75.0),
    ("home", "real_estate", 75.0),
    ("land", "real_estate", 60.0),
    ("energy", "energy", 70.0),
    ("solar", "energy", 75.0),
    ("food", "food", 70.0),
    ("coffee", "food", 65.0),
    ("car", "automotive", 75.0),
    ("cars", "automotive", 70.0),
    ("pet", "pets", 60.0),
    ("pets", "pets", 60.0),
    ("dog", "pets", 55.0),
    ("learn", "education", 65.0),
    ("school", "education", 70.0),
    ("news", "media", 65.0),
    ("media", "media", 60.0),
    ("game", "gaming", 65.0),
    ("games", "gaming", 65.0),
];

const BUILTIN_PARTS_OF_SPEECH: &[(&str, PartOfSpeech)] = &[
    ("shop", PartOfSpeech::Noun),
    ("cloud", PartOfSpeech::Noun),
    ("home", PartOfSpeech::Noun),
    ("data", PartOfSpeech::Noun),
    ("health", PartOfSpeech::Noun),
    ("money", PartOfSpeech::Noun),
    ("bank", PartOfSpeech::Noun),
    ("food", PartOfSpeech::Noun),
    ("city", PartOfSpeech::Noun),
    ("hub", PartOfSpeech::Noun),
    ("lab", PartOfSpeech::Noun),
    ("store", PartOfSpeech::Noun),
    ("market", PartOfSpeech::Noun),
    ("car", PartOfSpeech::Noun),
    ("house", PartOfSpeech::Noun),
    ("coffee", PartOfSpeech::Noun),
    ("world", PartOfSpeech::Noun),
    ("life", PartOfSpeech::Noun),
    ("space", PartOfSpeech::Noun),
    ("studio", PartOfSpeech::Noun),
    ("code", PartOfSpeech::Noun),
    ("game", PartOfSpeech::Noun),
    ("news", PartOfSpeech::Noun),
    ("box", PartOfSpeech::Noun),
    ("star", PartOfSpeech::Noun),
    ("buy", PartOfSpeech::Verb),
    ("pay", PartOfSpeech::Verb),
    ("learn", PartOfSpeech::Verb),
    ("get", PartOfSpeech::Verb),
    ("go", PartOfSpeech::Verb),
    ("travel", PartOfSpeech::Verb),
    ("best", PartOfSpeech::Adjective),
    ("smart", PartOfSpeech::Adjective),
    ("fast", PartOfSpeech::Adjective),
    ("easy", PartOfSpeech::Adjective),
    ("fresh", PartOfSpeech::Adjective),
    ("green", PartOfSpeech::Adjective),
    ("blue", PartOfSpeech::Adjective),
    ("red", PartOfSpeech::Adjective),
    ("online", PartOfSpeech::Adjective),
    ("pro", PartOfSpeech::Adjective),
    ("the", PartOfSpeech::Other),
    ("my", PartOfSpeech::Other),
];
