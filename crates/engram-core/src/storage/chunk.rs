//! Typed memory chunk storage wrapper.

use std::sync::Arc;

use anyhow::Result;
use engram_storage::Storage;

use super::{distance_to_similarity, EF_SEARCH};
use crate::models::{ChunkType, MemoryChunk};

/// Typed wrapper around the byte-level chunk store plus its vector index.
#[derive(Clone)]
pub struct ChunkStorage {
    inner: Arc<Storage>,
}

impl ChunkStorage {
    pub fn new(inner: Arc<Storage>) -> Self {
        Self { inner }
    }

    /// Store a chunk. An attached embedding is indexed for semantic search;
    /// chunks without one are still persisted and reachable by listing.
    pub fn put(&self, chunk: &MemoryChunk) -> Result<()> {
        let bytes = serde_json::to_vec(chunk)?;
        self.inner.chunks.put_raw(
            &chunk.id,
            &chunk.company_id,
            &chunk.session_id,
            chunk.chunk_type.as_str(),
            &bytes,
        )?;
        if let Some(embedding) = &chunk.embedding {
            self.inner.chunk_vectors.add(&chunk.id, embedding)?;
        }
        Ok(())
    }

    /// Load a chunk by ID.
    pub fn get(&self, chunk_id: &str) -> Result<Option<MemoryChunk>> {
        match self.inner.chunks.get_raw(chunk_id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List all chunks for a session in chronological order.
    pub fn list_by_session(&self, session_id: &str) -> Result<Vec<MemoryChunk>> {
        let rows = self.inner.chunks.list_by_session_raw(session_id)?;
        let mut chunks = Vec::with_capacity(rows.len());
        for (_, bytes) in rows {
            chunks.push(serde_json::from_slice::<MemoryChunk>(&bytes)?);
        }
        chunks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(chunks)
    }

    pub fn count_by_company(&self, company_id: &str) -> Result<u32> {
        self.inner.chunks.count_by_company(company_id)
    }

    /// Record a retrieval hit against a chunk. Only the access bookkeeping
    /// fields change; the vector index is left alone.
    pub fn bump_access(&self, chunk_id: &str) -> Result<()> {
        if let Some(mut chunk) = self.get(chunk_id)? {
            chunk.mark_accessed();
            let bytes = serde_json::to_vec(&chunk)?;
            self.inner.chunks.put_raw(
                &chunk.id,
                &chunk.company_id,
                &chunk.session_id,
                chunk.chunk_type.as_str(),
                &bytes,
            )?;
        }
        Ok(())
    }

    /// Similarity search scoped to one company, optionally restricted to
    /// chunk types. Results at or above `threshold` come back as
    /// `(chunk, similarity)` pairs, best first.
    pub fn search(
        &self,
        company_id: &str,
        query: &[f32],
        types: Option<&[ChunkType]>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(MemoryChunk, f32)>> {
        let allowed = match types {
            Some(types) => {
                let mut ids = Vec::new();
                for chunk_type in types {
                    ids.extend(
                        self.inner
                            .chunks
                            .list_ids_by_type(company_id, chunk_type.as_str())?,
                    );
                }
                ids
            }
            None => self.inner.chunks.list_ids_by_company(company_id)?,
        };

        let matches = self
            .inner
            .chunk_vectors
            .search_filtered(query, limit, EF_SEARCH, &allowed)?;

        let mut results = Vec::new();
        for (chunk_id, distance) in matches {
            let similarity = distance_to_similarity(distance);
            if similarity < threshold {
                continue;
            }
            if let Some(chunk) = self.get(&chunk_id)? {
                results.push((chunk, similarity));
            }
        }
        Ok(results)
    }
}
