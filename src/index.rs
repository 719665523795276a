//! Exact nearest-neighbour index over chunk embeddings.
//!
//! Vectors are L2-normalized on insertion, so cosine similarity reduces to
//! an inner product. Search is a brute-force scan, which is fast enough for
//! the few thousand chunks a single document produces.
//!
//! An index is built exactly once. Searching before [`VectorIndex::build`]
//! is an [`RagError::IndexNotBuilt`] error; a second build is rejected with
//! [`RagError::IndexAlreadyBuilt`].

use crate::embedding::{dot, l2_normalize, Embedder};
use crate::error::{RagError, Result};
use crate::models::{Chunk, RankedResult};

#[derive(Debug, Default)]
pub struct VectorIndex {
    built: Option<Built>,
}

#[derive(Debug)]
struct Built {
    dims: usize,
    /// Chunk metadata; position `i` matches `vectors[i]`.
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed every chunk's text and store the normalized vectors.
    pub async fn build(&mut self, chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<()> {
        if self.built.is_some() {
            return Err(RagError::IndexAlreadyBuilt);
        }

        tracing::info!(chunks = chunks.len(), model = embedder.model_name(), "building vector index");

        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            embedder.embed(&texts).await?
        };

        self.insert_all(chunks, vectors, embedder.dims())
    }

    /// Store precomputed vectors. They are normalized here.
    pub fn insert_all(
        &mut self,
        chunks: Vec<Chunk>,
        mut vectors: Vec<Vec<f32>>,
        dims: usize,
    ) -> Result<()> {
        if self.built.is_some() {
            return Err(RagError::IndexAlreadyBuilt);
        }
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "{} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(RagError::Embedding(format!(
                "expected dimension {}, got {}",
                dims,
                bad.len()
            )));
        }

        vectors.iter_mut().for_each(|v| l2_normalize(v));

        tracing::info!(vectors = vectors.len(), dims, "vector index built");
        self.built = Some(Built {
            dims,
            chunks,
            vectors,
        });
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// Number of stored vectors (0 when not built).
    pub fn len(&self) -> usize {
        self.built.as_ref().map_or(0, |b| b.vectors.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chunks in insertion order.
    pub fn chunks(&self) -> Result<&[Chunk]> {
        self.built
            .as_ref()
            .map(|b| b.chunks.as_slice())
            .ok_or(RagError::IndexNotBuilt)
    }

    /// Return the `min(k, len)` chunks most similar to `query`.
    ///
    /// `query` must already be L2-normalized. Results are sorted by
    /// descending score; equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedResult>> {
        let built = self.built.as_ref().ok_or(RagError::IndexNotBuilt)?;
        if built.vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != built.dims {
            return Err(RagError::Embedding(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                built.dims
            )));
        }

        let mut scored: Vec<(usize, f32)> = built
            .vectors
            .iter()
            .enumerate()
            .map(|(pos, v)| (pos, dot(query, v)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, (pos, score))| RankedResult {
                chunk: built.chunks[pos].clone(),
                similarity_score: score,
                rank: i + 1,
            })
            .collect())
    }
}
