//! # vaultqa
//!
//! Question answering grounded in a local markdown vault.
//!
//! The pure pipeline (section index, aliasing, classification, retrieval,
//! deterministic extraction, assembly) lives in [`vaultqa_core`]. This crate
//! adds the outer layers: configuration, the filesystem scanner, the shared
//! index handle, formatter backends, the CLI, and the HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Vault (.md) │──▶│ IndexHandle  │──▶│  Assemble    │
//! │  walkdir    │   │ Arc snapshot │   │ facts+cites  │
//! └─────────────┘   └──────────────┘   └──────┬──────┘
//!                                             │
//!                                             ▼
//!                                      ┌─────────────┐
//!                                      │  Formatter  │
//!                                      │ (verified)  │
//!                                      └──────┬──────┘
//!                                 ┌───────────┤
//!                                 ▼           ▼
//!                            ┌────────┐  ┌────────┐
//!                            │  CLI   │  │  HTTP  │
//!                            │ (vqa)  │  │ (axum) │
//!                            └────────┘  └────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`vault`] | Filesystem vault scanner |
//! | [`state`] | Index handle with atomic snapshot swap |
//! | [`formatter`] | Formatter backends |
//! | [`answer`] | Answer pipeline and reply verification |
//! | [`search`] | Ranked section search |
//! | [`note`] | Per-note inspection |
//! | [`inspect`] | Classification and extraction output |
//! | [`stats`] | Index summary |
//! | [`server`] | JSON HTTP server |

pub mod answer;
pub mod config;
pub mod formatter;
pub mod inspect;
pub mod note;
pub mod search;
pub mod server;
pub mod state;
pub mod stats;
pub mod vault;
