#![allow(dead_code)]

use async_trait::async_trait;
use benchlog_adapters::{AdapterError, AdapterResult, Invocation, ModelInvoker, ResponseMetadata};
use benchlog_core::{ModelFamily, PromptEntry};
use benchlog_store::MemoryPromptCatalog;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the fake backend does for one call
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Raw(Value),
    Fail(String),
    Hang(Duration),
}

pub fn text(s: &str) -> Reply {
    Reply::Text(s.to_string())
}

/// Replays scripted replies per model, wrapping text in the family's response shape
#[derive(Default)]
pub struct ScriptedInvoker {
    script: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, model_id: &str, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(model_id.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls_for(&self, model_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == model_id)
            .count()
    }
}

pub fn shaped(model_id: &str, text: &str) -> Value {
    match ModelFamily::resolve(model_id).unwrap() {
        ModelFamily::AnthropicMessages => json!({"content": [{"type": "text", "text": text}]}),
        ModelFamily::AnthropicCompletion => json!({"completion": text}),
        ModelFamily::AmazonTitan => json!({"results": [{"outputText": text, "tokenCount": 1}]}),
        ModelFamily::AI21 => json!({"completions": [{"data": {"text": text, "tokens": []}}]}),
        ModelFamily::Cohere => json!({"generations": [{"text": text}]}),
        ModelFamily::CohereCommandR => json!({"text": text}),
        ModelFamily::Meta => json!({"generation": text}),
        ModelFamily::Mistral => json!({"outputs": [{"text": text}]}),
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(&self, model_id: &str, _body: Vec<u8>) -> AdapterResult<Invocation> {
        self.calls.lock().unwrap().push(model_id.to_string());
        let reply = self
            .script
            .lock()
            .unwrap()
            .get_mut(model_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reply::Fail(format!("no scripted reply for {}", model_id)));

        let body = match reply {
            Reply::Text(text) => shaped(model_id, &text),
            Reply::Raw(value) => value,
            Reply::Fail(message) => return Err(AdapterError::ServiceUnavailable(message)),
            Reply::Hang(duration) => {
                tokio::time::sleep(duration).await;
                shaped(model_id, "late")
            }
        };

        Ok(Invocation {
            body,
            metadata: ResponseMetadata::measured(12.5).with_token_counts(Some(4), None),
        })
    }
}

pub fn catalog(ids: &[(&str, &str)]) -> Arc<MemoryPromptCatalog> {
    Arc::new(MemoryPromptCatalog::new(
        ids.iter().map(|(id, text)| PromptEntry::new(*id, *text)).collect(),
    ))
}
