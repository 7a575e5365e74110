//! # ragcode
//!
//! Retrieval-augmented question answering over an uploaded codebase.
//!
//! A zipped codebase is extracted, its text files are loaded and split into
//! overlapping chunks, every chunk is embedded, and the vectors are persisted
//! as a per-project index. Questions are answered by retrieving the most
//! similar chunks and sending them, with the question, to an
//! OpenAI-compatible chat-completion endpoint (Groq by default).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │ Archive  │──▶│  Loader  │──▶│ Chunker  │──▶│ Project index │
//! │  (zip)   │   │ (walk)   │   │ 1000/100 │   │ embed+persist │
//! └──────────┘   └──────────┘   └──────────┘   └──────┬───────┘
//!                                                      │ top-K cosine
//!                                ┌──────────┐   ┌──────▼───────┐
//!                                │Completion│◀──│   Answerer   │
//!                                │ (HTTP)   │   │ context+query│
//!                                └──────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GROQ_API_KEY=gsk_...
//! ragcode index ./shop.zip                  # extract, chunk, embed, persist
//! ragcode ask shop "where is checkout implemented?"
//! ragcode session                           # index and switch between projects
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Documents, chunks, search hits |
//! | [`archive`] | Zip extraction and project naming |
//! | [`loader`] | Directory walk into documents |
//! | [`chunk`] | Recursive boundary-aware chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persisted per-project vector index |
//! | [`completion`] | Chat-completion client |
//! | [`answer`] | Retrieval and answer assembly |
//! | [`registry`] | Loaded projects and the active selection |
//! | [`pipeline`] | Upload-to-index orchestration |
//! | [`session`] | Interactive multi-project session |
//! | [`stats`] | Index statistics |

pub mod answer;
pub mod archive;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
mod http;
pub mod index;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod stats;
