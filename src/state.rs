//! Process-wide index handle.
//!
//! Holds the current [`VaultIndex`] behind `RwLock<Arc<_>>`. Readers clone
//! the `Arc` and release the lock at once; a rebuild scans and builds
//! without blocking readers and only takes the write lock to swap the
//! pointer. Rebuilds are serialized, so a slower scan can never replace a
//! newer one. A failed rebuild leaves the previous snapshot in place.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use vaultqa_core::index::{NoteDocument, VaultIndex};
use vaultqa_core::vocab::Lexicon;

use crate::config::VaultConfig;
use crate::vault::scan_vault;

/// An immutable index plus how and when it was built.
#[derive(Debug)]
pub struct Snapshot {
    pub index: VaultIndex,
    /// SHA-256 over the indexed notes' paths and contents.
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
    /// Scanner and index warnings from the build.
    pub warnings: Vec<String>,
}

/// Summary of a build or rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub notes: usize,
    pub sections: usize,
    pub aliases: usize,
    pub warnings: Vec<String>,
    pub fingerprint: String,
    /// The vault content matched the previous snapshot; nothing was swapped.
    pub unchanged: bool,
    pub built_at: DateTime<Utc>,
    pub duration_ms: u64,
}

pub struct IndexHandle {
    vault: VaultConfig,
    lexicon: Arc<Lexicon>,
    current: RwLock<Arc<Snapshot>>,
    /// Held for the whole of a rebuild.
    rebuilding: Mutex<()>,
}

impl IndexHandle {
    /// Scan the vault and build the first snapshot.
    pub fn build(vault: VaultConfig, lexicon: Arc<Lexicon>) -> Result<(Self, RebuildReport)> {
        let started = Instant::now();
        let snapshot = build_snapshot(&vault, &lexicon)?;
        let report = report(&snapshot, false, started);
        let handle = Self {
            vault,
            lexicon,
            current: RwLock::new(Arc::new(snapshot)),
            rebuilding: Mutex::new(()),
        };
        Ok((handle, report))
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Rescan the vault and swap in a new snapshot.
    ///
    /// Idempotent: when the content fingerprint matches the current
    /// snapshot, the current snapshot is kept and the report says so.
    pub fn rebuild(&self) -> Result<RebuildReport> {
        let _rebuilding = self.rebuilding.lock().unwrap_or_else(|e| e.into_inner());
        let started = Instant::now();
        let snapshot = match build_snapshot(&self.vault, &self.lexicon) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "index rebuild failed; keeping previous index");
                return Err(e);
            }
        };

        let previous = self.snapshot();
        if previous.fingerprint == snapshot.fingerprint {
            let report = report(&previous, true, started);
            tracing::info!(fingerprint = %report.fingerprint, "index unchanged");
            return Ok(report);
        }

        let report = report(&snapshot, false, started);
        {
            let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
            *guard = Arc::new(snapshot);
        }
        tracing::info!(
            notes = report.notes,
            sections = report.sections,
            warnings = report.warnings.len(),
            "index rebuilt"
        );
        Ok(report)
    }
}

fn build_snapshot(vault: &VaultConfig, lexicon: &Lexicon) -> Result<Snapshot> {
    let scan = scan_vault(vault)?;
    let fingerprint = fingerprint(&scan.documents);
    let index = VaultIndex::build(scan.documents, &vault.index_options(), lexicon);

    for warning in index.warnings() {
        tracing::warn!("{}", warning);
    }
    let mut warnings = scan.warnings;
    warnings.extend(index.warnings().iter().cloned());

    Ok(Snapshot {
        index,
        fingerprint,
        built_at: Utc::now(),
        warnings,
    })
}

fn report(snapshot: &Snapshot, unchanged: bool, started: Instant) -> RebuildReport {
    RebuildReport {
        notes: snapshot.index.notes().len(),
        sections: snapshot.index.len(),
        aliases: snapshot.index.aliases().len(),
        warnings: snapshot.warnings.clone(),
        fingerprint: snapshot.fingerprint.clone(),
        unchanged,
        built_at: snapshot.built_at,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

/// Content hash of a sorted document list.
fn fingerprint(docs: &[NoteDocument]) -> String {
    let mut hasher = Sha256::new();
    for doc in docs {
        hasher.update(doc.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.content.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
