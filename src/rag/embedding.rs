//! Batched, paced embedding with graceful degradation.
//!
//! Wraps any [`Embedder`] so that large inputs are sent in fixed-size
//! chunks with a pause between chunks. A chunk that fails is retried one
//! text at a time, and a text that still fails is replaced by a zero
//! vector. The wrapper itself never fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::capability::Embedder;
use crate::agent::config::AgentConfig;
use crate::error::AgentError;

/// Pacing and chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Texts per call to the inner embedder.
    pub batch_size: usize,
    /// Pause before every chunk after the first.
    pub batch_delay: Duration,
    /// Pause between single-text retries.
    pub item_delay: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 16,
            batch_delay: Duration::from_secs(1),
            item_delay: Duration::from_millis(100),
        }
    }
}

impl From<&AgentConfig> for BatchSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            batch_size: config.embed_batch_size,
            batch_delay: config.embed_batch_delay,
            item_delay: config.embed_item_delay,
        }
    }
}

/// An [`Embedder`] that batches, paces and degrades.
pub struct BatchedEmbedder {
    inner: Arc<dyn Embedder>,
    settings: BatchSettings,
}

impl BatchedEmbedder {
    /// Wraps `inner` with the given settings.
    ///
    /// A `batch_size` of zero is treated as one.
    #[must_use]
    pub fn new(inner: Arc<dyn Embedder>, settings: BatchSettings) -> Self {
        let settings = BatchSettings {
            batch_size: settings.batch_size.max(1),
            ..settings
        };
        Self { inner, settings }
    }

    /// Placeholder vector for a text that could not be embedded.
    fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.inner.dimension()]
    }

    /// Keeps vectors of the right length; anything else becomes zeros.
    fn conform(&self, vector: Vec<f32>) -> Vec<f32> {
        if vector.len() == self.inner.dimension() {
            vector
        } else {
            warn!(
                expected = self.inner.dimension(),
                got = vector.len(),
                "embedding has wrong dimension, using zero vector"
            );
            self.zero_vector()
        }
    }

    /// Embeds one failed chunk text by text.
    async fn embed_individually(&self, chunk: &[String]) -> Vec<Vec<f32>> {
        let mut out = Vec::with_capacity(chunk.len());
        for (i, text) in chunk.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.item_delay).await;
            }
            match self.inner.embed_query(text).await {
                Ok(vector) => out.push(self.conform(vector)),
                Err(e) => {
                    warn!(error = %e, "individual embedding failed, using zero vector");
                    out.push(self.zero_vector());
                }
            }
        }
        out
    }

    /// Embeds every text, one vector per input in input order.
    pub async fn embed_all(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut all = Vec::with_capacity(texts.len());

        for (index, chunk) in texts.chunks(self.settings.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.settings.batch_delay).await;
            }

            match self.inner.embed_documents(chunk).await {
                Ok(vectors) if vectors.len() == chunk.len() => {
                    debug!(batch = index, size = chunk.len(), "embedded batch");
                    all.extend(vectors.into_iter().map(|v| self.conform(v)));
                }
                Ok(vectors) => {
                    warn!(
                        batch = index,
                        expected = chunk.len(),
                        got = vectors.len(),
                        "batch embedding returned wrong count, falling back to single items"
                    );
                    all.extend(self.embed_individually(chunk).await);
                }
                Err(e) => {
                    warn!(batch = index, error = %e, "batch embedding failed, falling back to single items");
                    all.extend(self.embed_individually(chunk).await);
                }
            }
        }

        all
    }
}

impl std::fmt::Debug for BatchedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedEmbedder")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Embedder for BatchedEmbedder {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        Ok(self.embed_all(texts).await)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AgentError> {
        let mut vectors = self.embed_all(&[text.to_string()]).await;
        Ok(vectors.pop().unwrap_or_else(|| self.zero_vector()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records every call; fails batches larger than `fail_batches_over`
    /// and single texts listed in `bad_texts`.
    struct Recording {
        dimension: usize,
        fail_batches_over: usize,
        bad_texts: HashSet<String>,
        batch_calls: Mutex<Vec<(usize, Instant)>>,
        single_calls: Mutex<Vec<(String, Instant)>>,
    }

    impl Recording {
        fn new(dimension: usize, fail_batches_over: usize, bad: &[&str]) -> Self {
            Self {
                dimension,
                fail_batches_over,
                bad_texts: bad.iter().map(|s| (*s).to_string()).collect(),
                batch_calls: Mutex::new(Vec::new()),
                single_calls: Mutex::new(Vec::new()),
            }
        }

        fn vector_for(&self, text: &str) -> Vec<f32> {
            #[allow(clippy::cast_precision_loss)]
            let v = text.len() as f32 + 1.0;
            vec![v; self.dimension]
        }
    }

    #[async_trait]
    impl Embedder for Recording {
        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
            if let Ok(mut calls) = self.batch_calls.lock() {
                calls.push((texts.len(), Instant::now()));
            }
            if texts.len() > self.fail_batches_over {
                return Err(AgentError::Embedding {
                    message: "rate limited".to_string(),
                });
            }
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AgentError> {
            if let Ok(mut calls) = self.single_calls.lock() {
                calls.push((text.to_string(), Instant::now()));
            }
            if self.bad_texts.contains(text) {
                return Err(AgentError::Embedding {
                    message: "bad input".to_string(),
                });
            }
            Ok(self.vector_for(text))
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_seventeen_texts_make_two_batches_with_one_pause() {
        let inner = Arc::new(Recording::new(4, usize::MAX, &[]));
        let embedder = BatchedEmbedder::new(inner.clone(), BatchSettings::default());

        let start = Instant::now();
        let vectors = embedder.embed_all(&texts(17)).await;

        assert_eq!(vectors.len(), 17);
        let calls = inner.batch_calls.lock().map(|g| g.clone()).unwrap_or_default();
        let sizes: Vec<_> = calls.iter().map(|(n, _)| *n).collect();
        assert_eq!(sizes, vec![16, 1]);
        assert_eq!(calls[0].1 - start, Duration::ZERO);
        assert_eq!(calls[1].1 - start, Duration::from_secs(1));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_batch_has_no_pause() {
        let inner = Arc::new(Recording::new(4, usize::MAX, &[]));
        let embedder = BatchedEmbedder::new(inner.clone(), BatchSettings::default());

        let start = Instant::now();
        let vectors = embedder.embed_all(&texts(16)).await;
        assert_eq!(vectors.len(), 16);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_falls_back_to_items_and_zero_vectors() {
        let inner = Arc::new(Recording::new(3, 1, &["text 1"]));
        let embedder = BatchedEmbedder::new(inner.clone(), BatchSettings::default());

        let start = Instant::now();
        let vectors = embedder.embed_all(&texts(3)).await;

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vec![7.0; 3]);
        assert_eq!(vectors[1], vec![0.0; 3]);
        assert_eq!(vectors[2], vec![7.0; 3]);

        let singles = inner.single_calls.lock().map(|g| g.clone()).unwrap_or_default();
        let order: Vec<_> = singles.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(order, vec!["text 0", "text 1", "text 2"]);
        assert_eq!(singles[1].1 - singles[0].1, Duration::from_millis(100));
        assert_eq!(singles[2].1 - singles[1].1, Duration::from_millis(100));
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_embed_query_never_fails() {
        let inner = Arc::new(Recording::new(2, 0, &["lost"]));
        let embedder = BatchedEmbedder::new(inner, BatchSettings::default());

        let vector = embedder
            .embed_query("lost")
            .await
            .unwrap_or_else(|e| panic!("embed_query failed: {e}"));
        assert_eq!(vector, vec![0.0; 2]);
        assert_eq!(embedder.dimension(), 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let inner = Arc::new(Recording::new(2, usize::MAX, &[]));
        let embedder = BatchedEmbedder::new(inner.clone(), BatchSettings::default());
        assert!(embedder.embed_all(&[]).await.is_empty());
        assert!(inner.batch_calls.lock().map(|g| g.is_empty()).unwrap_or(false));
    }
}
