use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    Fastembed,
    Hashed,
}

fn default_embedding_backend() -> EmbeddingBackendKind {
    EmbeddingBackendKind::Fastembed
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_notes_dir")]
    pub notes_dir: String,
    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: EmbeddingBackendKind,
    /// Optional fastembed model code; the backend default is used when unset.
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,
    /// Exclude a note's outgoing-link targets from its similarity results.
    #[serde(default = "default_exclude_linked")]
    pub exclude_linked: bool,
}

fn default_notes_dir() -> String {
    "./notes".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_query_limit() -> usize {
    5
}

fn default_exclude_linked() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            notes_dir: default_notes_dir(),
            embedding_backend: default_embedding_backend(),
            embedding_model: None,
            embedding_dimension: default_embedding_dimension(),
            query_limit: default_query_limit(),
            exclude_linked: default_exclude_linked(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
