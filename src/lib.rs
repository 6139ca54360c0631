//! # medrag
//!
//! A retrieval-augmented chat assistant over a medical question-answer corpus.
//!
//! medrag ingests a chunk-ready corpus CSV, splits it into overlapping text
//! windows, embeds the windows with a remote embedding model, and holds them
//! in an in-memory vector index. At query time it retrieves the most similar
//! chunks, folds them together with the conversation history into a grounded
//! prompt, and streams the model's answer while tracking which corpus sources
//! were cited.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────┐
//! │ Corpus   │──▶│ Chunk+Embed │──▶│  Vector   │   (build, offline)
//! │ CSV      │   │             │   │  Index    │
//! └──────────┘   └─────────────┘   └─────┬─────┘
//!                                        │
//!            ┌────────────┐   ┌──────────▼─────────┐
//!            │ Session    │──▶│ Retrieve → Prompt  │   (serve, per query)
//!            │ history    │   │ → Generate (SSE)   │
//!            └────────────┘   └──────────┬─────────┘
//!                                        ▼
//!                              answer + citations
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! medrag prepare ./data/question.csv ./data/answer.csv   # build corpus CSV
//! medrag testset ./data/question.csv ./data/answer.csv   # build test set
//! medrag chat                                            # interactive session
//! medrag ask "头痛怎么办"                                 # one-shot question
//! medrag eval                                            # judge-scored eval
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`corpus`] | Corpus CSV loader |
//! | [`chunk`] | Overlapping text chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory vector index |
//! | [`retriever`] | Top-k retrieval over the index |
//! | [`prompt`] | Grounded prompt assembly |
//! | [`llm`] | Chat completion client (batch + streaming) |
//! | [`session`] | Conversation history |
//! | [`citations`] | Source provenance dedup |
//! | [`chat`] | Interactive chat / one-shot ask commands |
//! | [`eval`] | Offline judge-scored evaluator |
//! | [`prepare`] | Corpus and test-set preparation |

pub mod chat;
pub mod chunk;
pub mod citations;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod index;
pub mod llm;
pub mod models;
pub mod prepare;
pub mod prompt;
pub mod retriever;
pub mod session;
