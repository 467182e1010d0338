//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + the legacy
//! OpenAI variables + `BOUNDLY_*` env vars (`__` separates nested keys, e.g.
//! `BOUNDLY_RETRIEVAL__K_DENSE=8`). A `.env` file in the working directory is
//! read first. Every section has defaults, so an empty environment yields a
//! usable [`Settings`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // A missing .env is the normal case outside local development.
        let _ = dotenvy::dotenv();
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Load with config files resolved against `dir` for the given environment.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment
            .merge(Env::raw().filter_map(|k| legacy_key(k.as_str()).map(Into::into)))
            .merge(Env::raw().filter_map(|k| legacy_chat_key(k.as_str()).map(Into::into)))
            .merge(Env::prefixed("BOUNDLY_").split("__"));
        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full typed settings tree.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

// OPENAI_* variables configure both the embedding and chat clients; figment
// maps one variable to one key, hence two providers.
fn legacy_key(var: &str) -> Option<&'static str> {
    match var.to_ascii_uppercase().as_str() {
        "OPENAI_API_BASE" => Some("embedding.api_base"),
        "OPENAI_API_KEY" => Some("embedding.api_key"),
        "OPENAI_API_VERSION" => Some("embedding.api_version"),
        "EMBEDDING_MODEL" => Some("embedding.model"),
        _ => None,
    }
}

fn legacy_chat_key(var: &str) -> Option<&'static str> {
    match var.to_ascii_uppercase().as_str() {
        "OPENAI_API_BASE" => Some("chat.api_base"),
        "OPENAI_API_KEY" => Some("chat.api_key"),
        "OPENAI_API_VERSION" => Some("chat.api_version"),
        "CHAT_MODEL" => Some("chat.model"),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub chunking: ChunkingSettings,
    pub ingest: IngestSettings,
    pub server: ServerSettings,
    pub eval: EvalSettings,
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.embedding.dimension == 0 {
            anyhow::bail!("embedding.dimension must be > 0");
        }
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.ingest.batch_size == 0 || self.ingest.write_batch_size == 0 {
            anyhow::bail!("ingest batch sizes must be > 0");
        }
        if self.retrieval.oversample == 0 {
            anyhow::bail!("retrieval.oversample must be >= 1");
        }
        for (name, r) in [
            ("index.retry", &self.index.retry),
            ("retrieval.embed_retry", &self.retrieval.embed_retry),
            ("ingest.embed_retry", &self.ingest.embed_retry),
            ("ingest.write_retry", &self.ingest.write_retry),
        ] {
            if r.max_attempts == 0 {
                anyhow::bail!("{name}.max_attempts must be >= 1");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// OpenAI or Azure OpenAI embeddings endpoint.
    Openai,
    /// Deterministic hashed vectors, no network.
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub api_base: String,
    pub api_key: String,
    /// Set for Azure OpenAI; empty selects the plain OpenAI API shape.
    pub api_version: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Openai,
            model: "text-embedding-ada-002".to_string(),
            api_base: "https://api.openai.com".to_string(),
            api_key: String::new(),
            api_version: String::new(),
            dimension: 1536,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub model: String,
    pub api_base: String,
    pub api_key: String,
    pub api_version: String,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            api_base: "https://api.openai.com".to_string(),
            api_key: String::new(),
            api_version: String::new(),
            temperature: 0.2,
            top_p: 0.95,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Per-attempt timeout; 0 disables it.
    pub timeout_secs: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 4, min_backoff_ms: 1_000, max_backoff_ms: 60_000, timeout_secs: 60, jitter: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Holds `tantivy/` and `lancedb/` subdirectories.
    pub root: String,
    pub table: String,
    pub retry: RetrySettings,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { root: "data/index".to_string(), table: "boundly_h1b".to_string(), retry: RetrySettings::default() }
    }
}

impl IndexSettings {
    pub fn text_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.root).join("tantivy")
    }

    pub fn vector_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.root).join("lancedb")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k_dense: usize,
    pub k_sparse: usize,
    /// Dense candidate pool = `k_dense * oversample`.
    pub oversample: usize,
    pub embed_retry: RetrySettings,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { k_dense: 5, k_sparse: 5, oversample: 4, embed_retry: RetrySettings { max_attempts: 3, ..RetrySettings::default() } }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Measured in characters.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 512, chunk_overlap: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub roots: Vec<String>,
    pub extensions: Vec<String>,
    pub batch_size: usize,
    /// Fixed pause between embedding batches.
    pub pacing_ms: u64,
    pub embed_retry: RetrySettings,
    pub write_batch_size: usize,
    pub write_retry: RetrySettings,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            roots: vec!["data/cases".to_string(), "data/regs".to_string(), "data/articles".to_string()],
            extensions: vec!["pdf".to_string()],
            batch_size: 20,
            pacing_ms: 1_000,
            embed_retry: RetrySettings { max_attempts: 6, min_backoff_ms: 1_000, max_backoff_ms: 60_000, timeout_secs: 60, jitter: true },
            write_batch_size: 500,
            write_retry: RetrySettings { max_attempts: 3, min_backoff_ms: 2_000, max_backoff_ms: 60_000, timeout_secs: 60, jitter: false },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalSettings {
    /// Directory of `*.json` question files.
    pub questions_dir: String,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self { questions_dir: "data/test_questions".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let s = Settings::default();
        assert_eq!(s.retrieval.k_dense, 5);
        assert_eq!(s.retrieval.k_sparse, 5);
        assert_eq!(s.retrieval.oversample, 4);
        assert_eq!(s.chunking.chunk_size, 512);
        assert_eq!(s.chunking.chunk_overlap, 64);
        assert_eq!(s.ingest.batch_size, 20);
        assert_eq!(s.ingest.pacing_ms, 1_000);
        assert_eq!(s.ingest.embed_retry.max_attempts, 6);
        assert_eq!(s.ingest.write_retry.max_attempts, 3);
        assert_eq!(s.index.retry.max_attempts, 4);
        assert_eq!(s.index.retry.timeout_secs, 60);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn toml_overrides_defaults_per_section() {
        let tmp = tempfile::tempdir().expect("tmp");
        std::fs::write(
            tmp.path().join("config.toml"),
            "[retrieval]\nk_dense = 8\n\n[chunking]\nchunk_size = 256\nchunk_overlap = 32\n",
        )
        .expect("write");
        let settings = Config::load_from(tmp.path(), "none").expect("load").settings().expect("settings");
        assert_eq!(settings.retrieval.k_dense, 8);
        assert_eq!(settings.retrieval.k_sparse, 5, "untouched keys keep defaults");
        assert_eq!(settings.chunking.chunk_size, 256);
        assert_eq!(settings.chunking.chunk_overlap, 32);
    }

    #[test]
    fn env_specific_file_wins_over_base() {
        let tmp = tempfile::tempdir().expect("tmp");
        std::fs::write(tmp.path().join("config.toml"), "[server]\nport = 9000\n").expect("write");
        std::fs::write(tmp.path().join("config.prod.toml"), "[server]\nport = 80\n").expect("write");
        let port: u16 = Config::load_from(tmp.path(), "prod").expect("load").get("server.port").expect("port");
        assert_eq!(port, 80);
    }

    #[test]
    fn overlap_not_below_size_is_rejected() {
        let mut s = Settings::default();
        s.chunking.chunk_overlap = s.chunking.chunk_size;
        assert!(s.validate().is_err());
    }

    #[test]
    fn legacy_variables_map_to_both_clients() {
        assert_eq!(legacy_key("OPENAI_API_KEY"), Some("embedding.api_key"));
        assert_eq!(legacy_chat_key("openai_api_key"), Some("chat.api_key"));
        assert_eq!(legacy_key("CHAT_MODEL"), None);
        assert_eq!(legacy_chat_key("EMBEDDING_MODEL"), None);
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = Path::new("/srv/boundly");
        assert_eq!(resolve_with_base(base, "/abs/idx"), PathBuf::from("/abs/idx"));
        assert_eq!(resolve_with_base(base, "data/index"), PathBuf::from("/srv/boundly/data/index"));
    }
}
