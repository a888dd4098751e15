use benchlog_core::{ModelFamily, RequestTemplate};
use serde_json::Value;

use super::{text_at, with_field, FamilyAdapter, ParsedResponse};
use crate::invoker::ResponseMetadata;
use crate::AdapterResult;

/// Mistral instruct models
#[derive(Debug, Clone, Copy, Default)]
pub struct MistralAdapter;

impl FamilyAdapter for MistralAdapter {
    fn family(&self) -> ModelFamily {
        ModelFamily::Mistral
    }

    fn build_request(&self, template: &RequestTemplate, prompt_text: &str) -> RequestTemplate {
        with_field(
            template,
            "prompt",
            Value::String(format!("<s>[INST] {} [/INST]", prompt_text)),
        )
    }

    fn parse_response(
        &self,
        raw: &Value,
        metadata: &ResponseMetadata,
    ) -> AdapterResult<ParsedResponse> {
        let text = text_at(raw, self.family(), "outputs[0].text")?;
        Ok(ParsedResponse::assemble(text, None, None, metadata))
    }
}
