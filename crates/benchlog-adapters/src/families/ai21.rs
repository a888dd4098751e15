use benchlog_core::{ModelFamily, RequestTemplate};
use serde_json::Value;

use super::{len_at, text_at, with_field, FamilyAdapter, ParsedResponse};
use crate::invoker::ResponseMetadata;
use crate::AdapterResult;

/// AI21 Jurassic models; token counts are the lengths of the token lists
#[derive(Debug, Clone, Copy, Default)]
pub struct Ai21Adapter;

impl FamilyAdapter for Ai21Adapter {
    fn family(&self) -> ModelFamily {
        ModelFamily::AI21
    }

    fn build_request(&self, template: &RequestTemplate, prompt_text: &str) -> RequestTemplate {
        with_field(template, "prompt", Value::String(prompt_text.to_string()))
    }

    fn parse_response(
        &self,
        raw: &Value,
        metadata: &ResponseMetadata,
    ) -> AdapterResult<ParsedResponse> {
        let text = text_at(raw, self.family(), "completions[0].data.text")?;
        Ok(ParsedResponse::assemble(
            text,
            len_at(raw, "completions[0].data.tokens"),
            len_at(raw, "prompt.tokens"),
            metadata,
        ))
    }
}
