use benchlog_core::{ModelFamily, RequestTemplate};
use serde_json::Value;

use super::{count_at, text_at, with_field, FamilyAdapter, ParsedResponse};
use crate::invoker::ResponseMetadata;
use crate::AdapterResult;

/// Amazon Titan text models
#[derive(Debug, Clone, Copy, Default)]
pub struct TitanAdapter;

impl FamilyAdapter for TitanAdapter {
    fn family(&self) -> ModelFamily {
        ModelFamily::AmazonTitan
    }

    fn build_request(&self, template: &RequestTemplate, prompt_text: &str) -> RequestTemplate {
        with_field(template, "inputText", Value::String(prompt_text.to_string()))
    }

    fn parse_response(
        &self,
        raw: &Value,
        metadata: &ResponseMetadata,
    ) -> AdapterResult<ParsedResponse> {
        let text = text_at(raw, self.family(), "results[0].outputText")?;
        Ok(ParsedResponse::assemble(
            text,
            count_at(raw, "results[0].tokenCount"),
            count_at(raw, "inputTextTokenCount"),
            metadata,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_titan_round_trip() {
        let mut template = RequestTemplate::new();
        template.insert(
            "textGenerationConfig".into(),
            json!({"maxTokenCount": 200, "temperature": 0}),
        );

        let body = TitanAdapter.build_request(&template, "Name a color");
        assert_eq!(body["inputText"], "Name a color");
        assert_eq!(body["textGenerationConfig"]["maxTokenCount"], 200);

        let raw = json!({
            "inputTextTokenCount": 4,
            "results": [{"tokenCount": 2, "outputText": "\nBlue", "completionReason": "FINISH"}]
        });
        let parsed = TitanAdapter
            .parse_response(&raw, &ResponseMetadata::measured(80.0))
            .unwrap();
        assert_eq!(parsed.text, "\nBlue");
        assert_eq!(parsed.output_tokens, 2);
        assert_eq!(parsed.input_tokens, 4);
    }

    #[test]
    fn test_titan_missing_results() {
        let err = TitanAdapter
            .parse_response(&json!({"results": []}), &ResponseMetadata::default())
            .unwrap_err();
        assert!(err.is_parse());
    }
}
