//! # Context Vault
//!
//! A local-first session memory for long AI-assisted writing projects.
//!
//! Context Vault turns the text of a work session into a small structured
//! summary, keeps an index of every tracked artifact in the project, and
//! produces a compact "resume" block that can be pasted into a fresh chat.
//! Remote search and blob storage are optional mirrors.
//!
//! ## Architecture
//!
//! ```text
//! session text ──▶ SummarizerChain ──▶ session_summaries/*.yaml
//!                  (claude → azure → local)        │
//!                                                  ▼
//! project files ──▶ scanner ──────────────▶ .memory/index.json
//!                                                  │
//!                       ┌──────────────┬───────────┴─────────┐
//!                       ▼              ▼                     ▼
//!                 resume text     search index          blob storage
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pbpaste | vault save --title "Gate review"   # summarize + index
//! vault resume                                 # print the resume block
//! vault status 04                              # chapter 4 artifact status
//! vault index --search --blob                  # rebuild and mirror
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`models`] | Persisted data types |
//! | [`topic`] | Topic classification and folder routing |
//! | [`scanner`] | Tracked-file listing |
//! | [`summarize`] | Summarizer fallback chain and heuristics |
//! | [`session`] | Session-summary store |
//! | [`index`] | Index snapshot builder |
//! | [`resume`] | Resume text |
//! | [`status`] | Project artifact status |
//! | [`search`] | Remote search index client |
//! | [`search_sync`] | Summary push to the search index |
//! | [`blob_sync`] | Incremental summary upload to blob storage |
//! | [`reindex`] | Bulk artifact sync |
//! | [`ask`] | Retrieval-augmented answers |
//! | [`extract`] | Requirement and gate extraction |
//! | [`sources`] | Backend configuration overview |

pub mod ask;
pub mod blob_sync;
pub mod config;
pub mod extract;
pub mod http;
pub mod index;
pub mod llm;
pub mod models;
pub mod reindex;
pub mod resume;
pub mod scanner;
pub mod search;
pub mod search_sync;
pub mod session;
pub mod sources;
pub mod status;
pub mod summarize;
pub mod topic;
