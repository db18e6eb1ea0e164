//! Configuration loading.
//!
//! Settings come from two places: a TOML file (paths, limits, model names)
//! and the environment (credentials and endpoints). The environment is read
//! once, through [`Config::apply_env`], so every component receives an
//! explicit [`Config`] instead of reaching for process globals. Tests inject
//! their own lookup closure.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub azure_openai: AzureOpenAiConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_memory_dir")]
    pub memory_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            memory_dir: default_memory_dir(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_memory_dir() -> PathBuf {
    PathBuf::from(".memory")
}

impl WorkspaceConfig {
    /// Directory holding the index snapshot, resume text, and sync state.
    pub fn memory_path(&self) -> PathBuf {
        self.root.join(&self.memory_dir)
    }

    pub fn index_path(&self) -> PathBuf {
        self.memory_path().join("index.json")
    }

    pub fn resume_path(&self) -> PathBuf {
        self.memory_path().join("resume_context.txt")
    }

    pub fn blob_state_path(&self) -> PathBuf {
        self.memory_path().join("blob_sync_state.json")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_max_bullets")]
    pub max_bullets: usize,
    /// When false, only the local heuristic runs.
    #[serde(default = "default_true")]
    pub use_llm: bool,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_bullets: default_max_bullets(),
            use_llm: true,
        }
    }
}

fn default_max_bullets() -> usize {
    8
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnthropicConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_anthropic_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_anthropic_base_url(),
            summary_model: default_summary_model(),
            temperature: default_temperature(),
            max_input_chars: default_max_input_chars(),
            max_output_tokens: default_anthropic_output_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl AnthropicConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_summary_model() -> String {
    "claude-haiku-4-5-20251001".to_string()
}
fn default_temperature() -> f64 {
    0.1
}
fn default_max_input_chars() -> usize {
    6000
}
fn default_anthropic_output_tokens() -> u32 {
    600
}
fn default_llm_timeout_secs() -> u64 {
    45
}

#[derive(Debug, Deserialize, Clone)]
pub struct AzureOpenAiConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default = "default_aoai_api_version")]
    pub api_version: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_aoai_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AzureOpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: default_aoai_api_version(),
            temperature: default_temperature(),
            max_input_chars: default_max_input_chars(),
            max_output_tokens: default_aoai_output_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl AzureOpenAiConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some() && self.deployment.is_some()
    }
}

fn default_aoai_api_version() -> String {
    "2024-10-21".to_string()
}
fn default_aoai_output_tokens() -> u32 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default = "default_search_api_version")]
    pub api_version: String,
    /// Preferred key field; used only if the remote schema has it.
    #[serde(default)]
    pub key_field: Option<String>,
    /// Preferred content field; used only if the remote schema has it.
    #[serde(default)]
    pub content_field: Option<String>,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            index_name: None,
            api_version: default_search_api_version(),
            key_field: None,
            content_field: None,
            timeout_secs: default_search_timeout_secs(),
            top_k: default_top_k(),
        }
    }
}

impl SearchConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some() && self.index_name.is_some()
    }
}

fn default_search_api_version() -> String {
    "2023-11-01".to_string()
}
fn default_search_timeout_secs() -> u64 {
    30
}
fn default_top_k() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlobConfig {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(skip)]
    pub account_key: Option<String>,
    /// Container for session summaries.
    #[serde(default = "default_container")]
    pub container: String,
    /// Container for `vault reindex` artifact uploads.
    #[serde(default = "default_artifact_container")]
    pub artifact_container: String,
    #[serde(default = "default_az_binary")]
    pub az_binary: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            account: None,
            account_key: None,
            container: default_container(),
            artifact_container: default_artifact_container(),
            az_binary: default_az_binary(),
        }
    }
}

impl BlobConfig {
    pub fn is_configured(&self) -> bool {
        self.account.is_some() && self.account_key.is_some()
    }
}

fn default_container() -> String {
    "session-summaries".to_string()
}
fn default_artifact_container() -> String {
    "artifacts".to_string()
}
fn default_az_binary() -> String {
    "az".to_string()
}

/// Model settings for `vault ask` and `vault extract`.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_answer_max_tokens")]
    pub answer_max_tokens: u32,
    #[serde(default = "default_extract_max_tokens")]
    pub extract_max_tokens: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            answer_max_tokens: default_answer_max_tokens(),
            extract_max_tokens: default_extract_max_tokens(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_answer_max_tokens() -> u32 {
    2000
}
fn default_extract_max_tokens() -> u32 {
    4000
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HttpConfig {
    /// Skip TLS certificate verification. Only for broken corporate proxies.
    #[serde(default)]
    pub insecure_tls: bool,
    /// Extra PEM root certificate to trust.
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,
}

impl Config {
    /// Defaults only; used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Overlay credentials and endpoint settings from an environment lookup.
    ///
    /// Empty values count as unset. Where two variable names are accepted
    /// (e.g. `AZURE_SEARCH_ADMIN_KEY` / `AZURE_SEARCH_KEY`) the first wins.
    /// Unparsable numeric tuning values are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |names: &[&str]| -> Option<String> {
            names.iter().find_map(|n| {
                lookup(n)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
        };

        if let Some(v) = get(&["ANTHROPIC_API_KEY"]) {
            self.anthropic.api_key = Some(v);
        }
        if let Some(v) = get(&["ANTHROPIC_BASE_URL"]) {
            self.anthropic.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get(&["ANTHROPIC_SUMMARY_MODEL"]) {
            self.anthropic.summary_model = v;
        }
        if let Some(n) =
            get(&["ANTHROPIC_TEMPERATURE"]).and_then(|v| parse_env("ANTHROPIC_TEMPERATURE", &v))
        {
            self.anthropic.temperature = n;
        }
        if let Some(n) =
            get(&["ANTHROPIC_MAX_INPUT_CHARS"]).and_then(|v| parse_env("ANTHROPIC_MAX_INPUT_CHARS", &v))
        {
            self.anthropic.max_input_chars = n;
        }
        if let Some(n) =
            get(&["ANTHROPIC_MAX_OUTPUT_TOKENS"]).and_then(|v| parse_env("ANTHROPIC_MAX_OUTPUT_TOKENS", &v))
        {
            self.anthropic.max_output_tokens = n;
        }

        if let Some(v) = get(&["AZURE_OPENAI_ENDPOINT"]) {
            self.azure_openai.endpoint = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = get(&["AZURE_OPENAI_API_KEY", "AZURE_OPENAI_KEY"]) {
            self.azure_openai.api_key = Some(v);
        }
        if let Some(v) = get(&["AZURE_OPENAI_DEPLOYMENT", "AZURE_OPENAI_CHAT_DEPLOYMENT"]) {
            self.azure_openai.deployment = Some(v);
        }
        if let Some(v) = get(&["AZURE_OPENAI_API_VERSION"]) {
            self.azure_openai.api_version = v;
        }
        if let Some(n) =
            get(&["AZURE_OPENAI_TEMPERATURE"]).and_then(|v| parse_env("AZURE_OPENAI_TEMPERATURE", &v))
        {
            self.azure_openai.temperature = n;
        }
        if let Some(n) =
            get(&["AZURE_OPENAI_MAX_INPUT_CHARS"]).and_then(|v| parse_env("AZURE_OPENAI_MAX_INPUT_CHARS", &v))
        {
            self.azure_openai.max_input_chars = n;
        }
        if let Some(n) =
            get(&["AZURE_OPENAI_MAX_OUTPUT_TOKENS"]).and_then(|v| parse_env("AZURE_OPENAI_MAX_OUTPUT_TOKENS", &v))
        {
            self.azure_openai.max_output_tokens = n;
        }

        if let Some(v) = get(&["AZURE_SEARCH_ENDPOINT"]) {
            self.search.endpoint = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = get(&["AZURE_SEARCH_ADMIN_KEY", "AZURE_SEARCH_KEY"]) {
            self.search.api_key = Some(v);
        }
        if let Some(v) = get(&["AZURE_SEARCH_INDEX_NAME", "AZURE_SEARCH_INDEX"]) {
            self.search.index_name = Some(v);
        }
        if let Some(v) = get(&["AZURE_SEARCH_API_VERSION"]) {
            self.search.api_version = v;
        }
        if let Some(v) = get(&["AZURE_SEARCH_KEY_FIELD"]) {
            self.search.key_field = Some(v);
        }
        if let Some(v) = get(&["AZURE_SEARCH_CONTENT_FIELD"]) {
            self.search.content_field = Some(v);
        }

        if let Some(v) = get(&["AZURE_STORAGE_ACCOUNT"]) {
            self.blob.account = Some(v);
        }
        if let Some(v) = get(&["AZURE_STORAGE_KEY"]) {
            self.blob.account_key = Some(v);
        }
        if let Some(v) = get(&["AZURE_BLOB_CONTAINER"]) {
            self.blob.container = v;
        }

        if let Some(v) = get(&["AZURE_INSECURE_TLS"]) {
            self.http.insecure_tls = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = get(&["SSL_CERT_FILE", "REQUESTS_CA_BUNDLE"]) {
            let path = PathBuf::from(v);
            if path.exists() {
                self.http.ca_bundle = Some(path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.summarizer.max_bullets == 0 {
            bail!("summarizer.max_bullets must be > 0");
        }
        if self.blob.container.trim().is_empty() {
            bail!("blob.container must not be empty");
        }
        if self.blob.artifact_container.trim().is_empty() {
            bail!("blob.artifact_container must not be empty");
        }
        Ok(())
    }

    /// Reset out-of-range summarizer temperatures to the default.
    pub fn sanitize(&mut self) {
        for (name, t) in [
            ("anthropic.temperature", &mut self.anthropic.temperature),
            ("azure_openai.temperature", &mut self.azure_openai.temperature),
        ] {
            if !(0.0..=2.0).contains(&*t) {
                tracing::warn!(
                    "{} = {} is outside [0.0, 2.0], using {}",
                    name,
                    t,
                    default_temperature()
                );
                *t = default_temperature();
            }
        }
    }
}

fn parse_env<T>(name: &str, value: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Ignoring invalid value for {}: '{}' ({})", name, value, e);
            None
        }
    }
}

/// Parse the TOML config file. A missing file yields [`Config::minimal`].
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::minimal());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    config.sanitize();
    Ok(config)
}

/// Read `KEY=VALUE` pairs from a `.env` file. Missing file → empty map.
pub fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    for item in iter {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(e) => tracing::warn!("Skipping malformed line in {}: {}", path.display(), e),
        }
    }
    Ok(vars)
}

/// Full startup path: file config, optional root override, then process
/// environment with `<root>/.env` as fallback for unset or empty variables.
pub fn load_with_env(path: &Path, root_override: Option<&Path>) -> Result<Config> {
    let mut config = load_config(path)?;
    if let Some(root) = root_override {
        config.workspace.root = root.to_path_buf();
    }

    let dotenv = read_dotenv(&config.workspace.root.join(".env"))?;
    config.apply_env(|key| {
        std::env::var(key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| dotenv.get(key).cloned())
    });
    config.sanitize();
    config.validate()?;
    Ok(config)
}
