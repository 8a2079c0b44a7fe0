//! # vaultqa Core
//!
//! Pure, I/O-free logic for vaultqa: the section index over a markdown
//! vault, alias generation, query classification, section retrieval, the
//! deterministic extractors, and the answer assembler.
//!
//! This crate performs no filesystem, process, or network access. The
//! calling application reads the vault into [`index::NoteDocument`]s,
//! builds a [`index::VaultIndex`], and hands the resulting
//! [`assemble::Assembly`] to whatever formats the reply.
//!
//! # Pipeline
//!
//! ```text
//! query ──▶ classify ──▶ retrieve ──▶ extract ──▶ assemble ──▶ formatter
//!              │             │            │
//!           Lexicon      VaultIndex    Extractor
//! ```

pub mod alias;
pub mod assemble;
pub mod classify;
pub mod extract;
pub mod index;
pub mod models;
pub mod parse;
pub mod retrieve;
pub mod text;
pub mod vocab;
