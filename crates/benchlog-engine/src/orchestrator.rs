//! One benchmark pass over prompts x models
//!
//! Per pair: shape the request, invoke the model, parse the response and
//! hand it to the dedup engine. A failing pair is recorded and the pass
//! continues. In parallel mode pairs run concurrently, but every pair has
//! a distinct (model, prompt) key so no two tasks touch the same history.

use benchlog_adapters::{adapter_for, ModelInvoker, TimeoutOrError, TimeoutPolicy};
use benchlog_core::{
    BenchConfig, CoreError, FamilyTemplates, LogKey, ModelDescriptor, ModelFamily, PromptEntry,
};
use benchlog_store::{LogStore, PromptCatalog};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::dedup::{DedupDecision, DedupEngine};
use crate::error::{BenchError, BenchResult};
use crate::report::{FailureKind, PairOutcome, PairResult, RunReport};

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub models: Vec<String>,
    pub templates: FamilyTemplates,
    pub parallel: bool,
    pub max_parallel: usize,
    pub page_size: usize,
    pub timeouts: TimeoutPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            templates: FamilyTemplates::default(),
            parallel: false,
            max_parallel: 4,
            page_size: 100,
            timeouts: TimeoutPolicy::default(),
        }
    }
}

impl RunSettings {
    pub fn from_config(config: &BenchConfig) -> Result<Self, CoreError> {
        Ok(Self {
            models: config.model_ids(),
            templates: config.templates()?,
            parallel: config.run.parallel,
            max_parallel: config.run.max_parallel,
            page_size: config.storage.page_size,
            timeouts: TimeoutPolicy::from_config(&config.endpoint),
        })
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parallel(mut self, max_parallel: usize) -> Self {
        self.parallel = true;
        self.max_parallel = max_parallel.max(1);
        self
    }
}

/// A configured model id and its resolution, done once per run
type ResolvedModel = (String, Result<ModelDescriptor, CoreError>);

struct Pair<'a> {
    index: usize,
    prompt: &'a PromptEntry,
    model_id: &'a str,
    model: &'a Result<ModelDescriptor, CoreError>,
}

pub struct RunOrchestrator {
    catalog: Arc<dyn PromptCatalog>,
    invoker: Arc<dyn ModelInvoker>,
    dedup: DedupEngine,
    settings: RunSettings,
}

impl RunOrchestrator {
    pub fn new(
        catalog: Arc<dyn PromptCatalog>,
        store: Arc<dyn LogStore>,
        invoker: Arc<dyn ModelInvoker>,
        settings: RunSettings,
    ) -> Self {
        let dedup = DedupEngine::new(store, settings.page_size, settings.timeouts.clone());
        Self {
            catalog,
            invoker,
            dedup,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run one full pass. Only a catalog that cannot be loaded fails the
    /// call itself; pair failures end up in the report.
    #[instrument(skip(self), fields(parallel = self.settings.parallel))]
    pub async fn run(&self) -> BenchResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let prompts = self.load_prompts().await?;
        let models = self.plan_models();
        info!(
            run_id = %run_id,
            prompts = prompts.len(),
            models = models.len(),
            "Starting benchmark run"
        );

        let pairs: Vec<Pair<'_>> = prompts
            .iter()
            .flat_map(|prompt| models.iter().map(move |model| (prompt, model)))
            .enumerate()
            .map(|(index, (prompt, (model_id, model)))| Pair {
                index,
                prompt,
                model_id: model_id.as_str(),
                model,
            })
            .collect();

        let mut outcomes: Vec<(usize, PairOutcome)> = if self.settings.parallel {
            stream::iter(pairs)
                .map(|pair| async move { (pair.index, self.process_pair(&pair).await) })
                .buffer_unordered(self.settings.max_parallel.max(1))
                .collect()
                .await
        } else {
            let mut outcomes = Vec::with_capacity(pairs.len());
            for pair in &pairs {
                outcomes.push((pair.index, self.process_pair(pair).await));
            }
            outcomes
        };
        outcomes.sort_by_key(|(index, _)| *index);

        let report = RunReport::from_outcomes(
            run_id,
            started_at,
            Utc::now(),
            outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
        );

        info!(
            run_id = %run_id,
            status = %report.status,
            persisted = report.totals.persisted,
            unchanged = report.totals.unchanged,
            failed = report.totals.failed,
            duration_ms = report.duration_ms(),
            "Benchmark run finished"
        );
        Ok(report)
    }

    async fn load_prompts(&self) -> BenchResult<Vec<PromptEntry>> {
        let prompts = self
            .settings
            .timeouts
            .store("catalog_load", || self.catalog.load_all())
            .await
            .map_err(|e| match e {
                TimeoutOrError::Timeout(timeout) => BenchError::StoreTimeout(timeout),
                TimeoutOrError::Error(e) => BenchError::Store(e),
            })?;

        let mut seen = HashSet::new();
        Ok(prompts
            .into_iter()
            .filter(|prompt| {
                let first = seen.insert(prompt.id.clone());
                if !first {
                    warn!(prompt_id = %prompt.id, "Duplicate prompt id in catalog, skipping");
                }
                first
            })
            .collect())
    }

    fn plan_models(&self) -> Vec<ResolvedModel> {
        let models = resolve_models(&self.settings.models);
        for (model_id, resolved) in &models {
            if let Err(e) = resolved {
                error!(model_id = %model_id, error_kind = "configuration", error = %e, "Unresolvable model family");
            }
        }
        models
    }

    async fn process_pair(&self, pair: &Pair<'_>) -> PairOutcome {
        let model_id = pair.model_id;
        let prompt_id = pair.prompt.id.as_str();

        let family = match pair.model {
            Ok(descriptor) => descriptor.family,
            Err(e) => {
                return PairOutcome {
                    model_id: model_id.to_string(),
                    prompt_id: prompt_id.to_string(),
                    family: None,
                    result: PairResult::Failed {
                        kind: FailureKind::Configuration,
                        message: e.to_string(),
                    },
                }
            }
        };

        let result = match self.observe_pair(pair, family).await {
            Ok(decision) => {
                info!(
                    model_id,
                    prompt_id,
                    persisted = decision.persisted().is_some(),
                    output_hash = decision.output_hash(),
                    "Pair complete"
                );
                match decision {
                    DedupDecision::First { record } => PairResult::Persisted {
                        output_hash: record.output_hash,
                        date: record.date,
                        first: true,
                    },
                    DedupDecision::Changed { record, .. } => PairResult::Persisted {
                        output_hash: record.output_hash,
                        date: record.date,
                        first: false,
                    },
                    DedupDecision::Unchanged { output_hash, .. } => {
                        PairResult::Unchanged { output_hash }
                    }
                }
            }
            Err(e) => {
                let kind = e.kind();
                error!(
                    model_id,
                    prompt_id,
                    family = %family,
                    error_kind = %kind,
                    error = %e,
                    "Pair failed"
                );
                PairResult::Failed {
                    kind,
                    message: e.to_string(),
                }
            }
        };

        PairOutcome {
            model_id: model_id.to_string(),
            prompt_id: prompt_id.to_string(),
            family: Some(family),
            result,
        }
    }

    async fn observe_pair(&self, pair: &Pair<'_>, family: ModelFamily) -> BenchResult<DedupDecision> {
        let model_id = pair.model_id;
        let adapter = adapter_for(family);
        let template = self.settings.templates.get(family);

        let body = adapter.build_request(template, &pair.prompt.prompt_text);
        let bytes = serde_json::to_vec(&Value::Object(body))?;
        let model_config = serde_json::to_string(template)?;

        let invocation = self
            .settings
            .timeouts
            .invoke("invoke_model", || self.invoker.invoke(model_id, bytes))
            .await
            .map_err(|e| match e {
                TimeoutOrError::Timeout(timeout) => BenchError::InvokeTimeout(timeout),
                TimeoutOrError::Error(e) => BenchError::Adapter(e),
            })?;

        let parsed = adapter.parse_response(&invocation.body, &invocation.metadata)?;
        let key = LogKey::new(model_id, pair.prompt.id.clone());

        self.dedup.observe(&key, &parsed, &model_config, Utc::now()).await
    }
}

/// Distinct, trimmed model ids in configured order, each with its
/// descriptor or the reason it could not be resolved
pub fn resolve_models(models: &[String]) -> Vec<(String, Result<ModelDescriptor, CoreError>)> {
    let mut seen = HashSet::new();
    models
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty() && seen.insert(m.to_string()))
        .map(|m| (m.to_string(), ModelDescriptor::resolve(m)))
        .collect()
}
