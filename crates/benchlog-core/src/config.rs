use config::{Config, Environment, File};
use secrecy::Secret;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::family::ModelFamily;

/// Environment prefix, e.g. `BENCHLOG_SUPPORTED_MODELS`, `BENCHLOG_ENDPOINT__REGION`
pub const ENV_PREFIX: &str = "BENCHLOG";

/// Request body template
pub type RequestTemplate = Map<String, Value>;

/// Main benchmark configuration, read once at process start
#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
    /// Prompt catalog store identifier
    pub prompt_catalog: String,
    /// Benchmark log store identifier
    pub benchmark_table: String,
    /// Default request template shared by all families
    #[serde(default)]
    pub model_shape: TemplateSource,
    /// Per-family template overrides keyed by family name (`meta`, `amazon_titan`, ...)
    #[serde(default)]
    pub family_templates: HashMap<String, TemplateSource>,
    pub supported_models: Vec<String>,
    pub storage: StorageConfig,
    pub endpoint: EndpointConfig,
    pub run: RunConfig,
}

/// A template given either inline as a table or as a JSON string.
///
/// JSON strings keep key case intact, which camelCase templates such as
/// Titan's `textGenerationConfig` need.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TemplateSource {
    Json(String),
    Table(Map<String, Value>),
}

impl Default for TemplateSource {
    fn default() -> Self {
        TemplateSource::Table(Map::new())
    }
}

impl TemplateSource {
    pub fn to_template(&self) -> Result<RequestTemplate> {
        match self {
            TemplateSource::Table(map) => Ok(map.clone()),
            TemplateSource::Json(raw) => match serde_json::from_str::<Value>(raw)? {
                Value::Object(map) => Ok(map),
                other => Err(CoreError::InvalidConfig(format!(
                    "request template must be a JSON object, got {}",
                    other
                ))),
            },
        }
    }
}

impl BenchConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_env(ENV_PREFIX)
    }

    /// Load configuration from environment with custom prefix
    pub fn load_from_env(prefix: &str) -> Result<Self> {
        Self::build(None, Self::environment(prefix))
    }

    /// Load configuration from a file with environment overrides
    pub fn load_from_file(path: &str) -> Result<Self> {
        Self::build(Some(path), Self::environment(ENV_PREFIX))
    }

    fn environment(prefix: &str) -> Environment {
        Environment::with_prefix(prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("supported_models")
    }

    fn build(path: Option<&str>, environment: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("prompt_catalog", "bedrockbenchmarkprompts")?
            .set_default("benchmark_table", "bedrockbenchmark")?
            .set_default("storage.backend", "file")?
            .set_default("storage.data_dir", "data")?
            .set_default("storage.page_size", 100)?
            .set_default("endpoint.region", "us-east-1")?
            .set_default("endpoint.max_attempts", 3)?
            .set_default("endpoint.initial_backoff_ms", 200)?
            .set_default("endpoint.max_backoff_ms", 20_000)?
            .set_default("endpoint.invoke_timeout_secs", 120)?
            .set_default("endpoint.store_timeout_secs", 30)?
            .set_default("run.parallel", false)?
            .set_default("run.max_parallel", 4)?
            .set_default("run.report_dir", "benchmarks/output")?
            .set_default("run.write_report", true)?;

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        let config: BenchConfig = builder.add_source(environment).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.supported_models.iter().all(|m| m.trim().is_empty()) {
            return Err(CoreError::InvalidConfig(
                "supported_models must name at least one model".to_string(),
            ));
        }
        if self.run.max_parallel == 0 {
            return Err(CoreError::InvalidConfig("run.max_parallel must be >= 1".to_string()));
        }
        if self.storage.page_size == 0 {
            return Err(CoreError::InvalidConfig("storage.page_size must be >= 1".to_string()));
        }
        if self.endpoint.max_attempts == 0 {
            return Err(CoreError::InvalidConfig("endpoint.max_attempts must be >= 1".to_string()));
        }

        self.model_shape.to_template()?;
        for (name, source) in &self.family_templates {
            name.parse::<ModelFamily>()?;
            source.to_template()?;
        }

        Ok(())
    }

    /// The default request template
    pub fn request_template(&self) -> Result<RequestTemplate> {
        self.model_shape.to_template()
    }

    /// The request template for a family, falling back to the default one
    pub fn template_for(&self, family: ModelFamily) -> Result<RequestTemplate> {
        match self.family_templates.get(family.as_str()) {
            Some(source) => source.to_template(),
            None => self.request_template(),
        }
    }

    /// Every configured family template, resolved once for a run
    pub fn templates(&self) -> Result<FamilyTemplates> {
        let default = self.request_template()?;
        let mut overrides = HashMap::new();
        for family in ModelFamily::ALL {
            if self.family_templates.contains_key(family.as_str()) {
                overrides.insert(family, self.template_for(family)?);
            }
        }
        Ok(FamilyTemplates { default, overrides })
    }

    /// Supported model ids, trimmed, in configured order
    pub fn model_ids(&self) -> Vec<String> {
        self.supported_models
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect()
    }
}

/// Resolved request templates for a run
#[derive(Debug, Clone, Default)]
pub struct FamilyTemplates {
    pub default: RequestTemplate,
    pub overrides: HashMap<ModelFamily, RequestTemplate>,
}

impl FamilyTemplates {
    pub fn new(default: RequestTemplate) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, family: ModelFamily, template: RequestTemplate) -> Self {
        self.overrides.insert(family, template);
        self
    }

    pub fn get(&self, family: ModelFamily) -> &RequestTemplate {
        self.overrides.get(&family).unwrap_or(&self.default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
    Postgres,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_page_size() -> usize {
    100
}

/// Model-serving endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Explicit endpoint; takes precedence over `region`
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub api_key: Option<Secret<String>>,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Limit for a single model call attempt; retries get their own budget
    pub invoke_timeout_secs: u64,
    pub store_timeout_secs: u64,
}

impl EndpointConfig {
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.region))
    }

    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_secs(self.invoke_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Run orchestration settings
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub parallel: bool,
    pub max_parallel: usize,
    pub report_dir: PathBuf,
    pub write_report: bool,
}
