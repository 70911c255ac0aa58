//! Sync orchestration
//!
//! One pass walks a repository tree, filters it through revision-token
//! change detection, then chunks, embeds and upserts the survivors before
//! persisting an updated metadata snapshot. Per-file failures never abort
//! sibling files; a failed file simply keeps its old record (or none), so
//! the next pass picks it up again.

use crate::chunk::Chunker;
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::meta::{should_sync, MetadataStore, SyncRecord};
use crate::retry::RetryPolicy;
use crate::revision::RevisionSource;
use crate::store::{
    chunk_point_id, ChunkPayload, ChunkPoint, DistanceMetric, RecreatePolicy, VectorIndex,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use ignore::WalkBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a pass treats an existing collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Upload only changed files into the existing collection; a schema
    /// mismatch is a conflict error.
    Incremental,
    /// Destroy the collection and rebuild it from scratch. Destructive and
    /// therefore always opt-in.
    Full,
}

/// Parameters of one sync pass
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub repo_root: PathBuf,
    pub collection: String,
    pub mode: SyncMode,
    pub concurrency: usize,
}

/// A file that failed during the pass, with enough context to retry
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// End-of-pass summary
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub files_synced: usize,
    pub chunks_upserted: usize,
    pub failures: Vec<FileFailure>,
}

/// A file that passed change detection
struct Candidate {
    abs_path: PathBuf,
    rel_path: String,
    revision_token: String,
}

enum FileOutcome {
    Synced {
        record: SyncRecord,
        chunk_count: usize,
    },
    SkippedBinary,
}

/// Drives a full sync pass with injected service handles, one engine per
/// repository/collection pair.
pub struct SyncEngine {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    revisions: Arc<dyn RevisionSource>,
    chunker: Chunker,
    metric: DistanceMetric,
    batch_size: usize,
    retry: RetryPolicy,
}

impl SyncEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        revisions: Arc<dyn RevisionSource>,
        chunker: Chunker,
        batch_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            index,
            revisions,
            chunker,
            metric: DistanceMetric::Cosine,
            batch_size,
            retry,
        }
    }

    /// Run one pass. The metadata store is exclusively owned by this call:
    /// change detection runs against the snapshot as loaded, and the updated
    /// snapshot is written once at the end.
    pub async fn sync(
        &self,
        meta: &mut MetadataStore,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let collection = options.collection.as_str();
        let dimension = self.embedder.dimension();

        match options.mode {
            SyncMode::Full => {
                // Prior vectors and the records describing them go together
                self.index.delete_collection(collection).await?;
                meta.clear();
                self.index
                    .ensure_collection(collection, dimension, self.metric, RecreatePolicy::Recreate)
                    .await?;
            }
            SyncMode::Incremental => {
                self.index
                    .ensure_collection(collection, dimension, self.metric, RecreatePolicy::Fail)
                    .await?;
            }
        }

        let repo_revision = self.revisions.repo_revision()?;

        // Scanning
        let files = scan_files(&options.repo_root)?;
        let mut report = SyncReport {
            files_scanned: files.len(),
            ..Default::default()
        };
        info!(
            "Scanned {} files in {}",
            files.len(),
            options.repo_root.display()
        );

        // Filtering against the pass-start snapshot
        let mut candidates = Vec::new();
        for (abs_path, rel_path) in files {
            match self.revisions.file_revision(Path::new(&rel_path)) {
                Ok(token) => {
                    if should_sync(meta.get(&rel_path), &token) {
                        candidates.push(Candidate {
                            abs_path,
                            rel_path,
                            revision_token: token,
                        });
                    } else {
                        debug!("Unchanged, skipping {}", rel_path);
                        report.files_skipped += 1;
                    }
                }
                Err(Error::NotFound(_)) => {
                    debug!("No history for {}, skipping", rel_path);
                    report.files_skipped += 1;
                }
                Err(e) => {
                    report.failures.push(FileFailure {
                        path: rel_path,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "{} of {} files need syncing",
            candidates.len(),
            report.files_scanned
        );

        // Chunking, embedding and upserting of distinct files run
        // concurrently; chunk identity is per-file so order does not matter.
        let results: Vec<(String, Result<FileOutcome>)> = stream::iter(candidates)
            .map(|candidate| {
                let rel = candidate.rel_path.clone();
                let repo_revision = repo_revision.clone();
                async move {
                    let outcome = self
                        .process_file(candidate, collection, &repo_revision)
                        .await;
                    (rel, outcome)
                }
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;

        // Single writer merges worker results into the snapshot
        for (rel_path, result) in results {
            match result {
                Ok(FileOutcome::Synced {
                    record,
                    chunk_count,
                }) => {
                    report.files_synced += 1;
                    report.chunks_upserted += chunk_count;
                    meta.insert(rel_path, record);
                }
                Ok(FileOutcome::SkippedBinary) => {
                    debug!("Skipped binary file {}", rel_path);
                    report.files_skipped += 1;
                }
                Err(e) => {
                    // Record left unset: the next pass retries this file
                    warn!("Failed to sync {}: {}", rel_path, e);
                    report.failures.push(FileFailure {
                        path: rel_path,
                        error: e.to_string(),
                    });
                }
            }
        }

        // Persisting
        meta.save()?;

        info!(
            "Sync pass complete: {} synced, {} skipped, {} chunks, {} failures",
            report.files_synced,
            report.files_skipped,
            report.chunks_upserted,
            report.failures.len()
        );

        Ok(report)
    }

    /// Chunk, embed and upsert one file. All chunks upsert as one call, so
    /// the file's record is only produced when every chunk made it in.
    async fn process_file(
        &self,
        candidate: Candidate,
        collection: &str,
        repo_revision: &str,
    ) -> Result<FileOutcome> {
        let content = std::fs::read(&candidate.abs_path)?;
        if is_binary(&content) {
            return Ok(FileOutcome::SkippedBinary);
        }

        let text = String::from_utf8_lossy(&content);
        let chunks: Vec<_> = self.chunker.chunk(&text).collect();
        debug!("{}: {} chunks", candidate.rel_path, chunks.len());

        let chunk_count = chunks.len();
        let mut point_ids = Vec::with_capacity(chunk_count);

        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let embeddings = self
                .retry
                .run("embed", || {
                    embed_in_batches(self.embedder.as_ref(), texts.clone(), self.batch_size)
                })
                .await?;

            let updated_at = Utc::now().to_rfc3339();
            let points: Vec<ChunkPoint> = chunks
                .iter()
                .zip(embeddings)
                .map(|(chunk, vector)| {
                    let id = chunk_point_id(collection, &candidate.rel_path, chunk.index);
                    point_ids.push(id);
                    ChunkPoint {
                        id,
                        vector,
                        payload: ChunkPayload {
                            source_path: candidate.rel_path.clone(),
                            chunk_index: chunk.index as i64,
                            content: chunk.text.clone(),
                            revision_token: candidate.revision_token.clone(),
                            repo_revision: repo_revision.to_string(),
                            updated_at: updated_at.clone(),
                        },
                    }
                })
                .collect();

            self.retry
                .run("upsert", || {
                    self.index.upsert(collection, points.clone())
                })
                .await?;
        }

        Ok(FileOutcome::Synced {
            record: SyncRecord {
                revision_token: candidate.revision_token,
                repo_revision: repo_revision.to_string(),
                collection: collection.to_string(),
                point_ids,
                last_synced: Utc::now(),
            },
            chunk_count,
        })
    }
}

/// Enumerate files under the repository root, excluding hidden entries and
/// version-control internals.
fn scan_files(repo_root: &Path) -> Result<Vec<(PathBuf, String)>> {
    let root = repo_root
        .canonicalize()
        .map_err(|e| Error::NotFound(format!("{}: {}", repo_root.display(), e)))?;

    let mut files = Vec::new();
    let walker = WalkBuilder::new(&root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| Error::Other(e.to_string()))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let abs = entry.path().to_path_buf();
        let rel = abs
            .strip_prefix(&root)
            .map_err(|e| Error::Other(e.to_string()))?
            .to_string_lossy()
            .replace('\\', "/");
        files.push((abs, rel));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Null-byte sniff over the head of the content
fn is_binary(content: &[u8]) -> bool {
    content.iter().take(8000).any(|&b| b == 0)
}
