//! Core data models used throughout medrag.
//!
//! These types represent the documents, chunks, and messages that flow
//! through the indexing and retrieval pipeline, plus the records consumed
//! and produced by the offline evaluator.

use serde::{Deserialize, Serialize};

/// A corpus record: chunk-ready text plus an opaque provenance identifier.
/// Immutable after loading.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub source: String,
}

/// An overlapping window of a document's text. Inherits the parent
/// document's source verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source: String,
}

/// A chunk paired with its L2-normalized embedding vector. Created once at
/// index-build time and owned by the vector index.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A retrieval hit: the chunk and its similarity to the query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Speaker role within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn in a conversation session. Assistant turns carry the deduped
/// sources that grounded the answer.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub sources: Vec<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
        }
    }
}

/// One evaluation input: a question and the reference answer to judge
/// against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestItem {
    pub question: String,
    pub ground_truth: String,
}

/// One row of the evaluation result table, persisted after every scored
/// item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRecord {
    pub question: String,
    pub ground_truth: String,
    pub answer: String,
    pub contexts: String,
    pub accuracy: f64,
    pub citation_f1: f64,
    pub faithfulness: f64,
    pub hallucination_rate: f64,
    pub reason: String,
}
