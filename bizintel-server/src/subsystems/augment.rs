//! Prompt augmentation strategies for risk assessment.
//!
//! Augmentation is chosen once at startup: `IndexAugmentation` when a policy
//! index is configured and loads, `NoAugmentation` otherwise. The risk service
//! only sees the `Augmenter` trait.

use std::sync::Arc;

use async_trait::async_trait;
use bizintel_core::models::ReferencePassage;
use bizintel_core::{BizintelConfig, EmbeddingBackend, OpenAiEmbeddingClient, PolicyIndex, RetrievalError};

#[async_trait]
pub trait Augmenter: Send + Sync {
    /// Reference passages for `query`, best first.
    async fn passages(&self, query: &str) -> Result<Vec<ReferencePassage>, RetrievalError>;

    /// Strategy name for logging and health output.
    fn name(&self) -> &str;
}

/// Never adds reference text.
pub struct NoAugmentation;

#[async_trait]
impl Augmenter for NoAugmentation {
    async fn passages(&self, _query: &str) -> Result<Vec<ReferencePassage>, RetrievalError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Looks up passages in a loaded similarity index.
pub struct IndexAugmentation {
    index: PolicyIndex,
    embedder: Arc<dyn EmbeddingBackend>,
    top_k: usize,
}

impl IndexAugmentation {
    pub fn new(index: PolicyIndex, embedder: Arc<dyn EmbeddingBackend>, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k,
        }
    }
}

#[async_trait]
impl Augmenter for IndexAugmentation {
    async fn passages(&self, query: &str) -> Result<Vec<ReferencePassage>, RetrievalError> {
        self.index
            .search(query, self.top_k, self.embedder.as_ref())
            .await
    }

    fn name(&self) -> &str {
        "policy-index"
    }
}

/// Pick the augmentation strategy from configuration. An unusable index is
/// logged and degrades to `NoAugmentation`.
pub fn augmenter_from_config(config: &BizintelConfig, api_key: &str) -> Arc<dyn Augmenter> {
    let Some(path) = config.retrieval.index_path.as_deref() else {
        tracing::info!("No policy index configured; risk assessment runs without augmentation");
        return Arc::new(NoAugmentation);
    };

    let index = match PolicyIndex::load(path) {
        Ok(index) => index,
        Err(e) => {
            tracing::warn!(error = %e, "Policy index unavailable; risk assessment runs without augmentation");
            return Arc::new(NoAugmentation);
        }
    };

    // queries must be embedded with the model that built the index
    let mut embedding = config.embedding.clone();
    embedding.model = index.model.clone();
    embedding.dimensions = index.dimensions;

    match OpenAiEmbeddingClient::new(api_key, embedding) {
        Ok(client) => Arc::new(IndexAugmentation::new(
            index,
            Arc::new(client),
            config.retrieval.top_k,
        )),
        Err(e) => {
            tracing::warn!(error = %e, "Embedding client unavailable; risk assessment runs without augmentation");
            Arc::new(NoAugmentation)
        }
    }
}
