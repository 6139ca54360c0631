//! Retrieval: index build and top-k query.
//!
//! The build path runs the offline pipeline — corpus → chunker → batched
//! embedding → vector index. An embedding failure is fatal for the build.
//! The serve path embeds the query once and surfaces the k most similar
//! chunks with their vectors dropped.

use anyhow::{Context, Result};

use crate::chunk::Chunker;
use crate::config::Config;
use crate::embedding::{embed_query, Embedder};
use crate::index::VectorIndex;
use crate::models::{Chunk, Document, EmbeddedChunk};

pub struct Retriever {
    embedder: Box<dyn Embedder>,
    index: VectorIndex,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Box<dyn Embedder>, index: VectorIndex, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k,
        }
    }

    /// Retrieve the chunks most relevant to a query, relevance-ranked
    /// descending, at most `top_k` of them.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        let vector = embed_query(self.embedder.as_ref(), query)
            .await
            .context("Failed to embed query")?;
        let scored = self.index.query(&vector, self.top_k)?;
        Ok(scored.into_iter().map(|s| s.chunk).collect())
    }

}

/// Build the vector index from documents: chunk every document, embed the
/// chunk texts in batches, and bulk-load the index. Embedding failure aborts
/// the build.
pub async fn build_index(
    documents: &[Document],
    chunker: &Chunker,
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<VectorIndex> {
    let mut chunks: Vec<Chunk> = Vec::new();
    for doc in documents {
        chunks.extend(chunker.split(doc));
    }

    let mut index = VectorIndex::new();
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder
            .embed(&texts)
            .await
            .context("Index build failed while embedding chunks")?;
        anyhow::ensure!(
            vectors.len() == batch.len(),
            "embedding backend returned {} vectors for {} texts",
            vectors.len(),
            batch.len()
        );
        index.insert(
            batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddedChunk {
                    chunk: chunk.clone(),
                    vector,
                })
                .collect(),
        );
    }

    Ok(index)
}

/// Convenience used by the chat and eval commands: load the corpus and build
/// a ready-to-serve retriever with the given k.
pub async fn build_retriever(config: &Config, top_k: usize) -> Result<Retriever> {
    let documents = crate::corpus::load_corpus(&config.corpus.path)?;
    println!("corpus: {} documents", documents.len());

    let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
    let embedder = crate::embedding::create_embedder(&config.embedding)?;

    let index = build_index(
        &documents,
        &chunker,
        embedder.as_ref(),
        config.embedding.batch_size,
    )
    .await?;
    println!(
        "index: {} chunks embedded with {}",
        index.len(),
        embedder.model_name()
    );

    Ok(Retriever::new(embedder, index, top_k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use async_trait::async_trait;

    /// Deterministic fake: maps each text to a unit vector on a circle,
    /// positioned by a simple hash, so identical texts always collide.
    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let h = t.chars().map(|c| c as u32 as u64).sum::<u64>();
                    let angle = (h % 360) as f32 * std::f32::consts::PI / 180.0;
                    vec![angle.cos(), angle.sin()]
                })
                .collect())
        }

        fn model_name(&self) -> &str {
            "fake"
        }

        fn dims(&self) -> usize {
            2
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(RagError::backend_unavailable("embedding", "down").into())
        }

        fn model_name(&self) -> &str {
            "failing"
        }

        fn dims(&self) -> usize {
            0
        }
    }

    fn docs() -> Vec<Document> {
        vec![
            Document {
                text: "【患者提问】：头痛怎么办\n【医生回答】：建议多休息，多喝水".to_string(),
                source: "X1".to_string(),
            },
            Document {
                text: "【患者提问】：胃疼吃什么药\n【医生回答】：清淡饮食，按时作息".to_string(),
                source: "X2".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_build_index_counts_chunks() {
        let chunker = Chunker::new(500, 100).unwrap();
        let index = build_index(&docs(), &chunker, &FakeEmbedder, 64)
            .await
            .unwrap();
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_exact_text_hits_its_own_chunk() {
        let chunker = Chunker::new(500, 100).unwrap();
        let index = build_index(&docs(), &chunker, &FakeEmbedder, 64)
            .await
            .unwrap();
        let retriever = Retriever::new(Box::new(FakeEmbedder), index, 1);

        // Querying with a chunk's full text embeds to the same vector, so
        // that chunk must rank first.
        let query = "【患者提问】：头痛怎么办\n【医生回答】：建议多休息，多喝水";
        let results = retriever.retrieve(query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "X1");
    }

    #[tokio::test]
    async fn test_retrieval_deterministic() {
        let chunker = Chunker::new(500, 100).unwrap();
        let index = build_index(&docs(), &chunker, &FakeEmbedder, 64)
            .await
            .unwrap();
        let retriever = Retriever::new(Box::new(FakeEmbedder), index, 2);

        let a = retriever.retrieve("头痛怎么办").await.unwrap();
        let b = retriever.retrieve("头痛怎么办").await.unwrap();
        assert_eq!(
            a.iter().map(|c| &c.source).collect::<Vec<_>>(),
            b.iter().map(|c| &c.source).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_build_fails_when_embedder_unavailable() {
        let chunker = Chunker::new(500, 100).unwrap();
        let err = build_index(&docs(), &chunker, &FailingEmbedder, 64)
            .await
            .unwrap_err();
        assert!(matches!(
            err.root_cause().downcast_ref::<RagError>(),
            Some(RagError::BackendUnavailable { .. })
        ));
    }
}
