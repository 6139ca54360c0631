use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per interactive query. The corpus pairs
    /// each question with a full answer, so a single chunk is usually
    /// sufficient; raise this to trade latency for recall.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            base_url: default_base_url(),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_temperature() -> f64 {
    0.1
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct JudgeConfig {
    /// Judge model; falls back to the generation model when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// Judge base URL; falls back to the generation base URL when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Temperature 0 keeps the rubric JSON stable.
    #[serde(default)]
    pub temperature: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvalConfig {
    #[serde(default = "default_test_set")]
    pub test_set: PathBuf,
    #[serde(default = "default_eval_output")]
    pub output: PathBuf,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Fixed pause after each generate and each judge call — backpressure
    /// against remote rate limits, not a performance knob.
    #[serde(default = "default_request_pause_secs")]
    pub request_pause_secs: u64,
    /// Extended pause after a per-item failure before moving on.
    #[serde(default = "default_error_cooldown_secs")]
    pub error_cooldown_secs: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            test_set: default_test_set(),
            output: default_eval_output(),
            top_k: default_top_k(),
            request_pause_secs: default_request_pause_secs(),
            error_cooldown_secs: default_error_cooldown_secs(),
        }
    }
}

fn default_test_set() -> PathBuf {
    PathBuf::from("./test_dataset.json")
}
fn default_eval_output() -> PathBuf {
    PathBuf::from("./advanced_evaluation.csv")
}
fn default_request_pause_secs() -> u64 {
    20
}
fn default_error_cooldown_secs() -> u64 {
    60
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be strictly less than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.eval.top_k < 1 {
        anyhow::bail!("eval.top_k must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    const BASE: &str = r#"
[corpus]
path = "./data/clean_medical_knowledge.csv"

[generation]
model = "Qwen/Qwen2.5-7B-Instruct"
"#;

    #[test]
    fn test_defaults() {
        let f = write_config(BASE);
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 500);
        assert_eq!(cfg.chunking.chunk_overlap, 100);
        assert_eq!(cfg.retrieval.top_k, 1);
        assert_eq!(cfg.eval.request_pause_secs, 20);
        assert!(!cfg.embedding.is_enabled());
    }

    #[test]
    fn test_overlap_must_be_less_than_size() {
        let body = format!(
            "{}\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
            BASE
        );
        let f = write_config(&body);
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("strictly less"));
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let body = format!("{}\n[embedding]\nprovider = \"openai\"\n", BASE);
        let f = write_config(&body);
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let body = format!(
            "{}\n[embedding]\nprovider = \"magic\"\nmodel = \"m\"\ndims = 4\n",
            BASE
        );
        let f = write_config(&body);
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }
}
