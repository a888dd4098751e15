//! Per-family request shaping and response parsing
//!
//! Every family implements the same two operations: copy the request
//! template and write the prompt into the family's prompt field, and pull
//! `(text, tokens, latency)` out of the family's response body.

mod ai21;
mod amazon;
mod anthropic;
mod cohere;
mod meta;
mod mistral;

pub use ai21::Ai21Adapter;
pub use amazon::TitanAdapter;
pub use anthropic::{AnthropicCompletionAdapter, AnthropicMessagesAdapter};
pub use cohere::{CohereAdapter, CohereCommandRAdapter};
pub use meta::MetaAdapter;
pub use mistral::MistralAdapter;

use benchlog_core::{ModelFamily, RequestTemplate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::invoker::ResponseMetadata;
use crate::{AdapterError, AdapterResult};

/// Canonical view of a model response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub text: String,
    pub output_tokens: u64,
    pub input_tokens: u64,
    pub latency_ms: f64,
}

impl ParsedResponse {
    /// Combine body-reported token counts with the metadata fallbacks
    pub fn assemble(
        text: impl Into<String>,
        body_output_tokens: Option<u64>,
        body_input_tokens: Option<u64>,
        metadata: &ResponseMetadata,
    ) -> Self {
        Self {
            text: text.into(),
            output_tokens: body_output_tokens.or(metadata.output_tokens).unwrap_or(0),
            input_tokens: body_input_tokens.or(metadata.input_tokens).unwrap_or(0),
            latency_ms: metadata.latency_ms(),
        }
    }
}

pub trait FamilyAdapter: Send + Sync {
    fn family(&self) -> ModelFamily;

    /// Copy the template and overwrite the family's prompt field
    fn build_request(&self, template: &RequestTemplate, prompt_text: &str) -> RequestTemplate;

    fn parse_response(
        &self,
        raw: &Value,
        metadata: &ResponseMetadata,
    ) -> AdapterResult<ParsedResponse>;
}

static ANTHROPIC_MESSAGES: AnthropicMessagesAdapter = AnthropicMessagesAdapter;
static ANTHROPIC_COMPLETION: AnthropicCompletionAdapter = AnthropicCompletionAdapter;
static TITAN: TitanAdapter = TitanAdapter;
static AI21: Ai21Adapter = Ai21Adapter;
static COHERE: CohereAdapter = CohereAdapter;
static COHERE_COMMAND_R: CohereCommandRAdapter = CohereCommandRAdapter;
static META: MetaAdapter = MetaAdapter;
static MISTRAL: MistralAdapter = MistralAdapter;

/// The adapter for a resolved family
pub fn adapter_for(family: ModelFamily) -> &'static dyn FamilyAdapter {
    match family {
        ModelFamily::AnthropicMessages => &ANTHROPIC_MESSAGES,
        ModelFamily::AnthropicCompletion => &ANTHROPIC_COMPLETION,
        ModelFamily::AmazonTitan => &TITAN,
        ModelFamily::AI21 => &AI21,
        ModelFamily::Cohere => &COHERE,
        ModelFamily::CohereCommandR => &COHERE_COMMAND_R,
        ModelFamily::Meta => &META,
        ModelFamily::Mistral => &MISTRAL,
    }
}

/// Template copy with a single field overwritten
pub(crate) fn with_field(template: &RequestTemplate, field: &str, value: Value) -> RequestTemplate {
    let mut body = template.clone();
    body.insert(field.to_string(), value);
    body
}

/// Walk a path like `completions[0].data.text`
pub(crate) fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(raw, |current, segment| {
        let (name, indexes) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };

        let mut value = if name.is_empty() {
            current
        } else {
            current.get(name)?
        };

        for index in indexes.split('[').filter(|s| !s.is_empty()) {
            let index: usize = index.strip_suffix(']')?.parse().ok()?;
            value = value.get(index)?;
        }

        Some(value)
    })
}

/// Required string at `path`, or a parse error naming the family and path
pub(crate) fn text_at<'a>(
    raw: &'a Value,
    family: ModelFamily,
    path: &str,
) -> AdapterResult<&'a str> {
    lookup(raw, path)
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::Parse {
            family,
            path: path.to_string(),
        })
}

pub(crate) fn count_at(raw: &Value, path: &str) -> Option<u64> {
    lookup(raw, path).and_then(Value::as_u64)
}

pub(crate) fn len_at(raw: &Value, path: &str) -> Option<u64> {
    lookup(raw, path)
        .and_then(Value::as_array)
        .map(|items| items.len() as u64)
}
