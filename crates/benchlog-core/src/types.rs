use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// One prompt from the catalog. Immutable once seeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptEntry {
    /// `<category>_<sequence>`, e.g. `code_100`
    pub id: String,
    #[serde(alias = "prompt")]
    pub prompt_text: String,
}

impl PromptEntry {
    pub fn new(id: impl Into<String>, prompt_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt_text: prompt_text.into(),
        }
    }

    /// Category part of the id, or the whole id when it has no sequence suffix
    pub fn category(&self) -> &str {
        self.id
            .rsplit_once('_')
            .map(|(category, _)| category)
            .unwrap_or(&self.id)
    }
}

/// Identity of a (model, prompt) history in the benchmark log
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogKey {
    pub model_id: String,
    pub prompt_id: String,
}

impl LogKey {
    pub fn new(model_id: impl Into<String>, prompt_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            prompt_id: prompt_id.into(),
        }
    }

    /// Store key used by the equality-filtered history scan: `model_prompt`
    pub fn composite(&self) -> String {
        format!("{}_{}", self.model_id, self.prompt_id)
    }

    /// Secondary `prompt_model` attribute kept on every record
    pub fn reverse(&self) -> String {
        format!("{}_{}", self.prompt_id, self.model_id)
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.composite())
    }
}

/// Human review rating attached after the fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rating {
    Incorrect = 0,
    Correct = 1,
    Excellent = 2,
}

impl TryFrom<u8> for Rating {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rating::Incorrect),
            1 => Ok(Rating::Correct),
            2 => Ok(Rating::Excellent),
            other => Err(CoreError::InvalidRating(other as i64)),
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating as u8
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Rating::Incorrect => "incorrect",
            Rating::Correct => "correct",
            Rating::Excellent => "excellent",
        };
        write!(f, "{} ({})", u8::from(*self), label)
    }
}

/// One persisted observation of a model's answer to a prompt.
///
/// Records are only created when the output changed since the latest
/// record for the same key; only `rating` is ever written afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// `model_prompt` composite key
    pub model_prompt_id: String,
    /// `prompt_model` secondary key
    pub prompt_model_id: String,
    pub model_id: String,
    pub prompt_id: String,
    pub date: DateTime<Utc>,
    pub output: String,
    pub output_hash: String,
    pub output_token_count: u64,
    pub input_token_count: u64,
    pub latency_ms: f64,
    /// Serialized request template used for the invocation
    pub model_config: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
}

impl BenchmarkRecord {
    pub fn key(&self) -> LogKey {
        LogKey::new(self.model_id.clone(), self.prompt_id.clone())
    }

    /// True when this record was logged under `key`. The composite string
    /// alone is ambiguous when ids contain `_`.
    pub fn belongs_to(&self, key: &LogKey) -> bool {
        self.model_id == key.model_id && self.prompt_id == key.prompt_id
    }
}
