use benchlog_core::{ModelFamily, RequestTemplate};
use serde_json::Value;

use super::{count_at, text_at, with_field, FamilyAdapter, ParsedResponse};
use crate::invoker::ResponseMetadata;
use crate::AdapterResult;

/// Meta Llama models
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaAdapter;

impl FamilyAdapter for MetaAdapter {
    fn family(&self) -> ModelFamily {
        ModelFamily::Meta
    }

    fn build_request(&self, template: &RequestTemplate, prompt_text: &str) -> RequestTemplate {
        with_field(template, "prompt", Value::String(prompt_text.to_string()))
    }

    /// Leading whitespace is stripped here, before anything fingerprints the text
    fn parse_response(
        &self,
        raw: &Value,
        metadata: &ResponseMetadata,
    ) -> AdapterResult<ParsedResponse> {
        let text = text_at(raw, self.family(), "generation")?;
        Ok(ParsedResponse::assemble(
            text.trim_start(),
            count_at(raw, "generation_token_count"),
            count_at(raw, "prompt_token_count"),
            metadata,
        ))
    }
}
