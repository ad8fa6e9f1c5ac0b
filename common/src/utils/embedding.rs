use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use fastembed::{EmbeddingModel, ModelTrait, TextEmbedding, TextInitOptions};
use tokio::sync::Mutex;

use super::{
    config::{AppConfig, EmbeddingBackendKind},
    vector::l2_normalize,
};

/// Produces fixed-dimension, L2-normalized embedding vectors.
///
/// The `Hashed` variant is a deterministic bag-of-tokens projection used by
/// tests and offline runs; `FastEmbed` wraps a local ONNX model.
#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
}

#[derive(Clone)]
enum EmbeddingInner {
    Hashed {
        dimension: usize,
    },
    FastEmbed {
        model: Arc<Mutex<TextEmbedding>>,
        model_name: EmbeddingModel,
        dimension: usize,
    },
}

impl EmbeddingProvider {
    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::Hashed { .. } => "hashed",
            EmbeddingInner::FastEmbed { .. } => "fastembed",
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => *dimension,
            EmbeddingInner::FastEmbed { dimension, .. } => *dimension,
        }
    }

    pub fn model_code(&self) -> Option<String> {
        match &self.inner {
            EmbeddingInner::FastEmbed { model_name, .. } => Some(model_name.to_string()),
            EmbeddingInner::Hashed { .. } => None,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(vec![text.to_owned()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("embedding backend returned no vector for input"))
    }

    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = match &self.inner {
            EmbeddingInner::Hashed { dimension } => texts
                .into_iter()
                .map(|text| hashed_embedding(&text, *dimension))
                .collect(),
            EmbeddingInner::FastEmbed { model, .. } => {
                let mut guard = model.lock().await;
                guard
                    .embed(texts, None)
                    .context("generating fastembed batch embeddings")?
            }
        };

        for vector in &mut vectors {
            l2_normalize(vector);
        }

        Ok(vectors)
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        match config.embedding_backend {
            EmbeddingBackendKind::Hashed => Self::new_hashed(config.embedding_dimension),
            EmbeddingBackendKind::Fastembed => {
                Self::new_fastembed(config.embedding_model.clone()).await
            }
        }
    }

    pub async fn new_fastembed(model_override: Option<String>) -> Result<Self> {
        let model_name = if let Some(code) = model_override {
            EmbeddingModel::from_str(&code).map_err(|err| anyhow!(err))?
        } else {
            EmbeddingModel::default()
        };

        let options = TextInitOptions::new(model_name.clone()).with_show_download_progress(true);
        let model_name_for_task = model_name.clone();
        let model_name_code = model_name.to_string();

        let (model, dimension) = tokio::task::spawn_blocking(move || -> Result<_> {
            let model =
                TextEmbedding::try_new(options).context("initialising FastEmbed text model")?;
            let info = EmbeddingModel::get_model_info(&model_name_for_task)
                .ok_or_else(|| anyhow!("FastEmbed model metadata missing for {model_name_code}"))?;
            Ok((model, info.dim))
        })
        .await
        .context("joining FastEmbed initialisation task")??;

        Ok(EmbeddingProvider {
            inner: EmbeddingInner::FastEmbed {
                model: Arc::new(Mutex::new(model)),
                model_name,
                dimension,
            },
        })
    }

    pub fn new_hashed(dimension: usize) -> Result<Self> {
        Ok(EmbeddingProvider {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
        })
    }
}

// Helper functions for hashed embeddings
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    for token in tokens(text) {
        let idx = bucket(&token, dim);
        vector[idx] += 1.0;
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashed_embedding_is_deterministic() {
        let provider = EmbeddingProvider::new_hashed(64).expect("provider");
        let first = provider.embed("tokio runs async tasks").await.expect("embed");
        let second = provider.embed("tokio runs async tasks").await.expect("embed");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[tokio::test]
    async fn hashed_embedding_is_normalized() {
        let provider = EmbeddingProvider::new_hashed(32).expect("provider");
        let vector = provider.embed("normalize me please").await.expect("embed");
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let provider = EmbeddingProvider::new_hashed(16).expect("provider");
        let vector = provider.embed("").await.expect("embed");
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let provider = EmbeddingProvider::new_hashed(32).expect("provider");
        let batch = provider
            .embed_batch(vec!["alpha".into(), "beta".into()])
            .await
            .expect("batch");
        let alpha = provider.embed("alpha").await.expect("embed");
        let beta = provider.embed("beta").await.expect("embed");
        assert_eq!(batch, vec![alpha, beta]);
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let provider = EmbeddingProvider::new_hashed(32).expect("provider");
        let batch = provider.embed_batch(Vec::new()).await.expect("batch");
        assert!(batch.is_empty());
    }
}
