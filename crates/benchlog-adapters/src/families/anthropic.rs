use benchlog_core::{ModelFamily, RequestTemplate};
use serde_json::{json, Value};

use super::{count_at, text_at, with_field, FamilyAdapter, ParsedResponse};
use crate::invoker::ResponseMetadata;
use crate::AdapterResult;

pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Claude 3+ messages API
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicMessagesAdapter;

impl FamilyAdapter for AnthropicMessagesAdapter {
    fn family(&self) -> ModelFamily {
        ModelFamily::AnthropicMessages
    }

    fn build_request(&self, template: &RequestTemplate, prompt_text: &str) -> RequestTemplate {
        let mut body = with_field(
            template,
            "messages",
            json!([{
                "role": "user",
                "content": [{"type": "text", "text": prompt_text}]
            }]),
        );
        body.entry("anthropic_version")
            .or_insert_with(|| Value::String(BEDROCK_ANTHROPIC_VERSION.to_string()));
        body
    }

    fn parse_response(
        &self,
        raw: &Value,
        metadata: &ResponseMetadata,
    ) -> AdapterResult<ParsedResponse> {
        let text = text_at(raw, self.family(), "content[0].text")?;
        Ok(ParsedResponse::assemble(
            text,
            count_at(raw, "usage.output_tokens"),
            count_at(raw, "usage.input_tokens"),
            metadata,
        ))
    }
}

/// Claude v2 / instant text completions
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicCompletionAdapter;

impl FamilyAdapter for AnthropicCompletionAdapter {
    fn family(&self) -> ModelFamily {
        ModelFamily::AnthropicCompletion
    }

    fn build_request(&self, template: &RequestTemplate, prompt_text: &str) -> RequestTemplate {
        with_field(
            template,
            "prompt",
            Value::String(format!("\n\nHuman:{}\n\nAssistant:", prompt_text)),
        )
    }

    fn parse_response(
        &self,
        raw: &Value,
        metadata: &ResponseMetadata,
    ) -> AdapterResult<ParsedResponse> {
        let text = text_at(raw, self.family(), "completion")?;
        Ok(ParsedResponse::assemble(text, None, None, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_request_shape() {
        let mut template = RequestTemplate::new();
        template.insert("max_tokens".into(), json!(300));

        let body = AnthropicMessagesAdapter.build_request(&template, "What is 2+2?");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["text"], "What is 2+2?");
        assert_eq!(body["anthropic_version"], BEDROCK_ANTHROPIC_VERSION);
        assert_eq!(body["max_tokens"], 300);
    }

    #[test]
    fn test_messages_keeps_configured_version() {
        let mut template = RequestTemplate::new();
        template.insert("anthropic_version".into(), json!("custom"));

        let body = AnthropicMessagesAdapter.build_request(&template, "hi");
        assert_eq!(body["anthropic_version"], "custom");
    }

    #[test]
    fn test_messages_parse() {
        let raw = json!({
            "content": [{"type": "text", "text": "4"}],
            "usage": {"input_tokens": 12, "output_tokens": 1}
        });
        let parsed = AnthropicMessagesAdapter
            .parse_response(&raw, &ResponseMetadata::measured(35.0))
            .unwrap();

        assert_eq!(parsed.text, "4");
        assert_eq!(parsed.output_tokens, 1);
        assert_eq!(parsed.input_tokens, 12);
        assert_eq!(parsed.latency_ms, 35.0);
    }

    #[test]
    fn test_messages_parse_missing_content() {
        let raw = json!({"content": []});
        let err = AnthropicMessagesAdapter
            .parse_response(&raw, &ResponseMetadata::default())
            .unwrap_err();
        assert!(err.to_string().contains("content[0].text"));
    }

    #[test]
    fn test_completion_wraps_prompt() {
        let body = AnthropicCompletionAdapter.build_request(&RequestTemplate::new(), "Hello");
        assert_eq!(body["prompt"], "\n\nHuman:Hello\n\nAssistant:");
    }

    #[test]
    fn test_completion_uses_header_counts() {
        let raw = json!({"completion": " Four.", "stop_reason": "stop_sequence"});
        let metadata = ResponseMetadata::measured(10.0).with_token_counts(Some(15), Some(3));

        let parsed = AnthropicCompletionAdapter.parse_response(&raw, &metadata).unwrap();
        assert_eq!(parsed.text, " Four.");
        assert_eq!(parsed.output_tokens, 3);
        assert_eq!(parsed.input_tokens, 15);
    }
}
