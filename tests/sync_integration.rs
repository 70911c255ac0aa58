//! End-to-end sync and retrieval tests over a real git repository,
//! a deterministic embedder and the in-process vector index.

use async_trait::async_trait;
use repolens::chunk::Chunker;
use repolens::embed::Embedder;
use repolens::error::{Error, Result};
use repolens::meta::MetadataStore;
use repolens::retry::RetryPolicy;
use repolens::revision::GitRevisions;
use repolens::search::search;
use repolens::store::MemoryIndex;
use repolens::sync::{SyncEngine, SyncMode, SyncOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DIMENSION: usize = 8;

/// Deterministic embedder: identical texts always map to identical vectors
struct FakeEmbedder {
    dimension: usize,
}

impl FakeEmbedder {
    fn new() -> Self {
        Self {
            dimension: DIMENSION,
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.1f32; self.dimension];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dimension] += (b as f32) * ((i % 13) as f32 + 1.0);
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

/// Embedder that fails any batch containing the marker string
struct FailingEmbedder {
    inner: FakeEmbedder,
    marker: &'static str,
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(self.marker)) {
            return Err(Error::ProviderPermanent("provider rejected input".into()));
        }
        self.inner.embed(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        "failing-fake"
    }
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn run_git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("git invocation failed");
    assert!(status.success(), "git {:?} failed", args);
}

fn commit_file(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
    run_git(dir, &["add", name]);
    run_git(dir, &["commit", "-q", "-m", "update"]);
}

/// A two-file git repository: a.py ("def f(): pass") and
/// b.md ("hello world")
fn example_repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    run_git(tmp.path(), &["init", "-q"]);
    commit_file(tmp.path(), "a.py", "def f(): pass");
    commit_file(tmp.path(), "b.md", "hello world");
    tmp
}

fn engine_with(embedder: Arc<dyn Embedder>, index: Arc<MemoryIndex>, repo: &Path) -> SyncEngine {
    let revisions = Arc::new(GitRevisions::open(repo).unwrap());
    SyncEngine::new(
        embedder,
        index,
        revisions,
        Chunker::new(512, 64).unwrap(),
        32,
        RetryPolicy::new(0, Duration::from_millis(1)),
    )
}

fn options(repo: &Path, mode: SyncMode) -> SyncOptions {
    SyncOptions {
        repo_root: repo.to_path_buf(),
        collection: "repo".to_string(),
        mode,
        concurrency: 2,
    }
}

fn state_path(dir: &TempDir) -> PathBuf {
    dir.path().join("state").join("repo.json")
}

#[tokio::test]
async fn first_sync_indexes_then_repeat_is_idempotent() {
    if !git_available() {
        return;
    }
    let repo = example_repo();
    let state = TempDir::new().unwrap();
    let index = Arc::new(MemoryIndex::new());
    let engine = engine_with(Arc::new(FakeEmbedder::new()), index.clone(), repo.path());

    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    let report = engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Incremental))
        .await
        .unwrap();

    assert_eq!(report.files_synced, 2);
    assert_eq!(report.chunks_upserted, 2);
    assert!(report.failures.is_empty());
    assert_eq!(meta.len(), 2);
    assert_eq!(index.total_points(), 2);

    let token_a = meta.get("a.py").unwrap().revision_token.clone();
    let token_b = meta.get("b.md").unwrap().revision_token.clone();

    // Second pass with no changes: nothing re-embedded, snapshot unchanged
    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    let report = engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Incremental))
        .await
        .unwrap();

    assert_eq!(report.files_synced, 0);
    assert_eq!(report.chunks_upserted, 0);
    assert_eq!(report.files_skipped, 2);
    assert_eq!(index.total_points(), 2);
    assert_eq!(meta.get("a.py").unwrap().revision_token, token_a);
    assert_eq!(meta.get("b.md").unwrap().revision_token, token_b);
}

#[tokio::test]
async fn editing_one_file_resyncs_only_that_file() {
    if !git_available() {
        return;
    }
    let repo = example_repo();
    let state = TempDir::new().unwrap();
    let index = Arc::new(MemoryIndex::new());
    let engine = engine_with(Arc::new(FakeEmbedder::new()), index.clone(), repo.path());

    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Incremental))
        .await
        .unwrap();
    let b_record = meta.get("b.md").unwrap().clone();

    commit_file(repo.path(), "a.py", "def f(): return 1");

    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    let report = engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Incremental))
        .await
        .unwrap();

    assert_eq!(report.files_synced, 1);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(meta.get("b.md").unwrap(), &b_record);
    // Replaced, not duplicated
    assert_eq!(index.total_points(), 2);
}

#[tokio::test]
async fn embed_failure_for_one_file_does_not_block_siblings() {
    if !git_available() {
        return;
    }
    let repo = TempDir::new().unwrap();
    run_git(repo.path(), &["init", "-q"]);
    commit_file(repo.path(), "bad.txt", "POISON content");
    commit_file(repo.path(), "good.txt", "wholesome content");

    let state = TempDir::new().unwrap();
    let index = Arc::new(MemoryIndex::new());
    let failing = Arc::new(FailingEmbedder {
        inner: FakeEmbedder::new(),
        marker: "POISON",
    });
    let engine = engine_with(failing, index.clone(), repo.path());

    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    let report = engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Incremental))
        .await
        .unwrap();

    assert_eq!(report.files_synced, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "bad.txt");
    assert!(meta.get("good.txt").is_some());
    assert!(meta.get("bad.txt").is_none());

    // Retry-by-omission: a later pass with a healthy provider picks up
    // exactly the file that failed
    let engine = engine_with(Arc::new(FakeEmbedder::new()), index.clone(), repo.path());
    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    let report = engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Incremental))
        .await
        .unwrap();

    assert_eq!(report.files_synced, 1);
    assert_eq!(report.files_skipped, 1);
    assert!(meta.get("bad.txt").is_some());
}

#[tokio::test]
async fn full_mode_rebuilds_from_scratch() {
    if !git_available() {
        return;
    }
    let repo = example_repo();
    let state = TempDir::new().unwrap();
    let index = Arc::new(MemoryIndex::new());
    let engine = engine_with(Arc::new(FakeEmbedder::new()), index.clone(), repo.path());

    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Incremental))
        .await
        .unwrap();
    assert_eq!(index.total_points(), 2);

    // Full pass re-embeds everything even though nothing changed
    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    let report = engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Full))
        .await
        .unwrap();

    assert_eq!(report.files_synced, 2);
    assert_eq!(index.total_points(), 2);
    assert_eq!(meta.len(), 2);
}

#[tokio::test]
async fn indexed_text_is_retrievable_by_its_own_content() {
    if !git_available() {
        return;
    }
    let repo = example_repo();
    let state = TempDir::new().unwrap();
    let index = Arc::new(MemoryIndex::new());
    let embedder = Arc::new(FakeEmbedder::new());
    let engine = engine_with(embedder.clone(), index.clone(), repo.path());

    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Incremental))
        .await
        .unwrap();

    let hits = search(embedder.as_ref(), index.as_ref(), "repo", "hello world", 1)
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source_path, "b.md");
    assert_eq!(hits[0].content, "hello world");
}

#[tokio::test]
async fn searching_a_missing_collection_fails() {
    let index = MemoryIndex::new();
    let embedder = FakeEmbedder::new();

    let err = search(&embedder, &index, "absent", "anything", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CollectionNotFound(_)));
}

#[tokio::test]
async fn dimension_mismatch_surfaces_as_conflict() {
    if !git_available() {
        return;
    }
    let repo = example_repo();
    let state = TempDir::new().unwrap();
    let index = Arc::new(MemoryIndex::new());
    let engine = engine_with(Arc::new(FakeEmbedder::new()), index.clone(), repo.path());

    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Incremental))
        .await
        .unwrap();

    // Query through an embedder with a different dimension
    let wide = FakeEmbedder { dimension: 16 };
    let err = search(&wide, index.as_ref(), "repo", "hello", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CollectionConflict(_)));

    // An incremental pass against the mismatched collection also conflicts
    let wide_engine = engine_with(Arc::new(FakeEmbedder { dimension: 16 }), index, repo.path());
    let mut meta = MetadataStore::load(&state_path(&state)).unwrap();
    let err = wide_engine
        .sync(&mut meta, &options(repo.path(), SyncMode::Incremental))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CollectionConflict(_)));
}
