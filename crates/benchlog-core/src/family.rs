//! Model family resolution
//!
//! A family is the vendor-specific request/response convention a model
//! follows. It is resolved once per model id from its prefix and then
//! drives both request shaping and response parsing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Cross-region inference profile prefixes, e.g. `us.anthropic.claude-3-haiku...`
const INFERENCE_PROFILE_PREFIXES: &[&str] = &["us.", "eu.", "apac.", "us-gov."];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Claude 3+ chat models (messages API)
    AnthropicMessages,
    /// Claude v2 / instant text completion models
    AnthropicCompletion,
    AmazonTitan,
    #[serde(rename = "ai21")]
    AI21,
    Cohere,
    CohereCommandR,
    Meta,
    Mistral,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 8] = [
        ModelFamily::AnthropicMessages,
        ModelFamily::AnthropicCompletion,
        ModelFamily::AmazonTitan,
        ModelFamily::AI21,
        ModelFamily::Cohere,
        ModelFamily::CohereCommandR,
        ModelFamily::Meta,
        ModelFamily::Mistral,
    ];

    /// Resolve the family of a model id by prefix.
    ///
    /// Fails with [`CoreError::UnknownFamily`] instead of guessing, so a
    /// misconfigured model is never parsed with the wrong schema.
    pub fn resolve(model_id: &str) -> Result<Self> {
        let id = strip_inference_profile(model_id.trim());

        let family = if let Some(rest) = id.strip_prefix("anthropic.") {
            if rest.starts_with("claude-v2") || rest.starts_with("claude-instant") {
                ModelFamily::AnthropicCompletion
            } else {
                ModelFamily::AnthropicMessages
            }
        } else if id.starts_with("amazon.titan") {
            ModelFamily::AmazonTitan
        } else if id.starts_with("ai21.") {
            ModelFamily::AI21
        } else if id.starts_with("cohere.command-r") {
            ModelFamily::CohereCommandR
        } else if id.starts_with("cohere.") {
            ModelFamily::Cohere
        } else if id.starts_with("meta.") {
            ModelFamily::Meta
        } else if id.starts_with("mistral.") {
            ModelFamily::Mistral
        } else {
            return Err(CoreError::UnknownFamily(model_id.to_string()));
        };

        Ok(family)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::AnthropicMessages => "anthropic_messages",
            ModelFamily::AnthropicCompletion => "anthropic_completion",
            ModelFamily::AmazonTitan => "amazon_titan",
            ModelFamily::AI21 => "ai21",
            ModelFamily::Cohere => "cohere",
            ModelFamily::CohereCommandR => "cohere_command_r",
            ModelFamily::Meta => "meta",
            ModelFamily::Mistral => "mistral",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelFamily {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        ModelFamily::ALL
            .iter()
            .copied()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| CoreError::InvalidConfig(format!("unknown family name '{}'", s)))
    }
}

fn strip_inference_profile(model_id: &str) -> &str {
    INFERENCE_PROFILE_PREFIXES
        .iter()
        .find_map(|prefix| model_id.strip_prefix(prefix))
        .unwrap_or(model_id)
}

/// A configured model together with its resolved family
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub model_id: String,
    pub family: ModelFamily,
}

impl ModelDescriptor {
    pub fn resolve(model_id: impl Into<String>) -> Result<Self> {
        let model_id = model_id.into();
        let family = ModelFamily::resolve(&model_id)?;
        Ok(Self { model_id, family })
    }
}
