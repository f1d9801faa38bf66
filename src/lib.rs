//! # repo-qa
//!
//! Ask natural-language questions about a source-code repository and get
//! answers grounded in the repository's actual content, with cited file
//! paths and a measured confidence in the answer's grounding.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ File source │──▶│   Ingest     │──▶│ Vector store │
//! │ clone/walk  │   │ Chunk+Embed  │   │ SQLite / mem │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!          question ──▶ embed ──▶ Retrieve ◀──┘
//!                                    │  base | filtered
//!                                    ▼
//!                              Synthesize (LLM)
//!                                    │
//!                                    ▼
//!                         Metrics ──▶ RagResult
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rqa init                                           # create database
//! rqa ingest https://github.com/owner/repo           # clone, chunk, embed, store
//! rqa ask <repo_id> "How does authentication work?" --variant filtered
//! rqa serve                                          # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`tokenizer`] | Deterministic subword tokenizer handle |
//! | [`chunk`] | Overlapping token-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store abstraction (SQLite, in-memory) |
//! | [`source`] | Repository cloning and file discovery |
//! | [`ingest`] | Ingestion orchestration |
//! | [`retrieve`] | Candidate over-fetch and narrowing policies |
//! | [`llm`] | Generative model abstraction |
//! | [`synth`] | Grounding prompt assembly and answer generation |
//! | [`metrics`] | Context relevance and groundedness |
//! | [`service`] | End-to-end ingestion and query service |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod metrics;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod server;
pub mod service;
pub mod source;
pub mod store;
pub mod synth;
pub mod tokenizer;
