use benchlog_core::{ModelFamily, RequestTemplate};
use serde_json::Value;

use super::{text_at, with_field, FamilyAdapter, ParsedResponse};
use crate::invoker::ResponseMetadata;
use crate::AdapterResult;

/// Cohere Command text generation
#[derive(Debug, Clone, Copy, Default)]
pub struct CohereAdapter;

impl FamilyAdapter for CohereAdapter {
    fn family(&self) -> ModelFamily {
        ModelFamily::Cohere
    }

    fn build_request(&self, template: &RequestTemplate, prompt_text: &str) -> RequestTemplate {
        with_field(template, "prompt", Value::String(prompt_text.to_string()))
    }

    fn parse_response(
        &self,
        raw: &Value,
        metadata: &ResponseMetadata,
    ) -> AdapterResult<ParsedResponse> {
        let text = text_at(raw, self.family(), "generations[0].text")?;
        Ok(ParsedResponse::assemble(text, None, None, metadata))
    }
}

/// Cohere Command R chat
#[derive(Debug, Clone, Copy, Default)]
pub struct CohereCommandRAdapter;

impl FamilyAdapter for CohereCommandRAdapter {
    fn family(&self) -> ModelFamily {
        ModelFamily::CohereCommandR
    }

    fn build_request(&self, template: &RequestTemplate, prompt_text: &str) -> RequestTemplate {
        with_field(template, "message", Value::String(prompt_text.to_string()))
    }

    fn parse_response(
        &self,
        raw: &Value,
        metadata: &ResponseMetadata,
    ) -> AdapterResult<ParsedResponse> {
        let text = text_at(raw, self.family(), "text")?;
        Ok(ParsedResponse::assemble(text, None, None, metadata))
    }
}
