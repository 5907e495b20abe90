//! # Newsdesk
//!
//! A retrieval-augmented news chat backend with cited answers.
//!
//! Newsdesk accepts a conversation transcript, extracts search intent
//! (topics plus optional date bounds) with a language model, retrieves
//! matching articles from a vector index, and asks a language model to
//! compose a grounded, citation-disciplined answer. The API is exposed
//! over HTTP behind a static key.
//!
//! ## Pipeline
//!
//! ```text
//! transcript ──▶ intent ──▶ filter  ──▶ vector ──▶ grounded ──▶ answer
//!               extractor   compiler    search     generator
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! newsdesk init                         # create the article database
//! newsdesk ingest articles.jsonl       # embed and store articles
//! newsdesk search "AI news since 2024-01-01"
//! NEWSDESK_API_KEY=secret newsdesk serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`intent`] | Intent extraction from chat history |
//! | [`filter`] | Date-filter compilation |
//! | [`index`] | Vector index gateway (SQLite) |
//! | [`retrieve`] | Retrieval orchestration |
//! | [`generate`] | Grounded answer generation |
//! | [`llm`] | Chat-completion providers |
//! | [`embedding`] | Embedding providers |
//! | [`server`] | HTTP API |
//! | [`chatlog`] | Daily question/answer log |
//! | [`ingest`] | Article ingestion |

pub mod chatlog;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod generate;
pub mod index;
pub mod ingest;
pub mod intent;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod server;
