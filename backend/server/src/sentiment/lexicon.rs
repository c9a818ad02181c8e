//! # Lexicon Model
//!
//! Opt-in fallback for hosts without the DistilBERT weights, selected with
//! `SENTIMENT_BACKEND=lexicon`.
//!
//! - Weighted word list, positive weights lean `POSITIVE`, negative lean `NEGATIVE`
//! - Tokens are lowercase words, apostrophes kept so `don't` stays one token
//! - A negator (`not`, `no`, `never`, `*n't`) flips the next scored word
//! - Zero total means the model has no opinion, which the classifier reports as `Neutral`
//!
//! ## Lexicon File
//!
//! One `word<TAB>weight` pair per line. Blank lines and `#` comments are skipped.
//! ```text
//! # word	weight
//! great	2.0
//! awful	-2.5
//! ```
use std::{collections::HashMap, fs::read_to_string, path::Path, sync::LazyLock};

use regex::Regex;

use super::fallback::{ModelError, NEGATIVE, POSITIVE, Prediction, SentimentModel};

const NEGATORS: [&str; 5] = ["not", "no", "never", "nothing", "nobody"];

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+(?:'[a-z]+)?").unwrap());

const BUILTIN_LEXICON: &[(&str, f32)] = &[
    ("amazing", 2.5),
    ("awesome", 2.5),
    ("best", 2.0),
    ("brilliant", 2.5),
    ("delicious", 2.0),
    ("easy", 1.0),
    ("enjoy", 1.5),
    ("enjoyed", 1.5),
    ("excellent", 2.5),
    ("fantastic", 2.5),
    ("fast", 1.0),
    ("friendly", 1.5),
    ("glad", 1.5),
    ("good", 1.5),
    ("great", 2.0),
    ("happy", 2.0),
    ("helpful", 1.5),
    ("like", 1.0),
    ("love", 2.5),
    ("loved", 2.5),
    ("nice", 1.5),
    ("perfect", 2.5),
    ("pleasant", 1.5),
    ("recommend", 1.5),
    ("smooth", 1.0),
    ("thanks", 1.0),
    ("useful", 1.5),
    ("wonderful", 2.5),
    ("angry", -2.0),
    ("annoying", -1.5),
    ("awful", -2.5),
    ("bad", -1.5),
    ("broken", -2.0),
    ("bug", -1.0),
    ("confusing", -1.5),
    ("crash", -2.0),
    ("difficult", -1.0),
    ("disappointed", -2.0),
    ("disappointing", -2.0),
    ("hate", -2.5),
    ("horrible", -2.5),
    ("poor", -1.5),
    ("sad", -1.5),
    ("slow", -1.0),
    ("terrible", -2.5),
    ("unhappy", -2.0),
    ("useless", -2.0),
    ("worse", -2.0),
    ("worst", -2.5),
    ("wrong", -1.5),
];

pub struct LexiconModel {
    weights: HashMap<String, f32>,
    labels: Vec<String>,
}

impl LexiconModel {
    fn with_weights(weights: HashMap<String, f32>) -> Self {
        Self {
            weights,
            labels: vec![NEGATIVE.to_string(), POSITIVE.to_string()],
        }
    }

    pub fn builtin() -> Self {
        Self::with_weights(
            BUILTIN_LEXICON
                .iter()
                .map(|(word, weight)| (word.to_string(), *weight))
                .collect(),
        )
    }

    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let contents = read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ModelError> {
        let mut weights = HashMap::new();

        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let malformed = || ModelError::Parse {
                line: index + 1,
                content: raw.to_string(),
            };

            let (word, weight) = line.split_once('\t').ok_or_else(malformed)?;
            let weight: f32 = weight.trim().parse().map_err(|_| malformed())?;

            weights.insert(word.trim().to_lowercase(), weight);
        }

        Ok(Self::with_weights(weights))
    }

    fn score(&self, text: &str) -> f32 {
        let lowered = text.to_lowercase();

        let mut total = 0.0;
        let mut negate = false;

        for token in TOKEN.find_iter(&lowered).map(|m| m.as_str()) {
            if NEGATORS.contains(&token) || token.ends_with("n't") {
                negate = true;
                continue;
            }

            if let Some(weight) = self.weights.get(token) {
                total += if negate { -weight } else { *weight };
                negate = false;
            }
        }

        total
    }
}

impl SentimentModel for LexiconModel {
    fn predict(&self, text: &str) -> Result<Vec<Prediction>, ModelError> {
        let total = self.score(text);

        let label = if total > 0.0 {
            Some(POSITIVE.to_string())
        } else if total < 0.0 {
            Some(NEGATIVE.to_string())
        } else {
            None
        };

        Ok(vec![Prediction {
            label,
            score: total.abs() / (1.0 + total.abs()),
        }])
    }

    fn vocabulary(&self) -> &[String] {
        &self.labels
    }
}
