//! Ingestion: extract, clean, chunk, embed and store documents.

use crate::chunker::{chunk_with_metadata, ChunkOptions};
use crate::clean::clean_text;
use crate::embeddings::Embedder;
use crate::extract::{PlainTextExtractor, TextExtractor};
use crate::types::EmbeddedChunk;
use crate::vector_index::VectorIndex;
use cdss_core::config::AppConfig;
use cdss_core::{AppError, AppResult};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use walkdir::WalkDir;

/// Options for ingestion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestOptions {
    pub chunking: ChunkOptions,

    /// Texts per embedding call
    pub batch_size: usize,

    /// Also strip page markers while cleaning
    pub aggressive_clean: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkOptions::default(),
            batch_size: 32,
            aggressive_clean: false,
        }
    }
}

impl From<&AppConfig> for IngestOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            chunking: ChunkOptions::from(&config.chunking),
            batch_size: config.embedding.batch_size,
            aggressive_clean: false,
        }
    }
}

/// Result of ingesting one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The source was already stored and re-ingestion was not requested
    Skipped,

    Ingested {
        chunks: usize,
        /// Chunks of a previous version that were deleted
        replaced: usize,
    },
}

/// Statistics from ingesting files.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub files_total: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
    pub chunks: usize,
    pub duration_secs: f64,
}

/// Writes documents into a vector index.
///
/// Ingestion of one `source_id` is serialized; different sources may be
/// ingested concurrently.
pub struct Ingestor {
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
    extractor: PlainTextExtractor,
    options: IngestOptions,
    source_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Ingestor {
    pub fn new(embedder: Arc<Embedder>, index: Arc<dyn VectorIndex>, options: IngestOptions) -> Self {
        Self {
            embedder,
            index,
            extractor: PlainTextExtractor,
            options,
            source_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    fn source_lock(&self, source_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .source_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(source_id.to_string()).or_default())
    }

    /// Ingest one document's text under `source_id`.
    ///
    /// When the source already exists it is skipped, or replaced if
    /// `reingest` is set. The new chunks are embedded before the old ones
    /// are deleted, so a failed embedding leaves the stored version intact.
    pub async fn ingest_text(&self, source_id: &str, text: &str, reingest: bool) -> AppResult<IngestOutcome> {
        let lock = self.source_lock(source_id);
        let _guard = lock.lock().await;

        let exists = self.index.contains_source(source_id).await?;
        if exists && !reingest {
            tracing::info!("Source '{}' already ingested, skipping", source_id);
            return Ok(IngestOutcome::Skipped);
        }

        let cleaned = clean_text(text, self.options.aggressive_clean);
        let chunks = chunk_with_metadata(source_id, &cleaned, &self.options.chunking);
        if chunks.is_empty() {
            return Err(AppError::Knowledge(format!(
                "Source '{}' has no text content",
                source_id
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_many(&texts, self.options.batch_size).await?;

        let records: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk::new(chunk, embedding))
            .collect();

        let replaced = if exists {
            self.index.delete_by_source(source_id).await?
        } else {
            0
        };
        let inserted = self.index.insert_many(&records).await?;

        tracing::info!(
            "Ingested '{}': {} chunks ({} replaced)",
            source_id,
            inserted,
            replaced
        );

        Ok(IngestOutcome::Ingested {
            chunks: inserted,
            replaced,
        })
    }

    /// Ingest a file, using its file name as the source id.
    pub async fn ingest_file(&self, path: &Path, reingest: bool) -> AppResult<IngestOutcome> {
        let source_id = source_id_for(path)?;
        tracing::debug!("Processing file: {:?}", path);
        let text = self.extractor.extract(path)?;
        self.ingest_text(&source_id, &text, reingest).await
    }

    /// Ingest files and directories.
    ///
    /// Directories are walked recursively and only supported files are
    /// considered. A file that fails is logged and counted; a path that does
    /// not exist is an error.
    pub async fn ingest_paths(&self, paths: &[PathBuf], reingest: bool) -> AppResult<IngestStats> {
        let start = Instant::now();
        let files = self.collect_files(paths)?;

        let mut stats = IngestStats {
            files_total: files.len(),
            ..IngestStats::default()
        };

        for file in &files {
            match self.ingest_file(file, reingest).await {
                Ok(IngestOutcome::Skipped) => stats.skipped += 1,
                Ok(IngestOutcome::Ingested { chunks, .. }) => {
                    stats.ingested += 1;
                    stats.chunks += chunks;
                }
                Err(e) => {
                    tracing::warn!("Failed to ingest {:?}: {}", file, e);
                    stats.failed += 1;
                }
            }
        }

        stats.duration_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            "Ingestion completed: {} files, {} ingested, {} skipped, {} failed, {} chunks in {:.2}s",
            stats.files_total,
            stats.ingested,
            stats.skipped,
            stats.failed,
            stats.chunks,
            stats.duration_secs
        );

        Ok(stats)
    }

    fn collect_files(&self, paths: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for path in paths {
            if path.is_file() {
                files.push(path.clone());
            } else if path.is_dir() {
                for entry in WalkDir::new(path)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    let entry_path = entry.path();
                    if entry_path.is_file() && self.extractor.supports(entry_path) {
                        files.push(entry_path.to_path_buf());
                    }
                }
            } else {
                return Err(AppError::Knowledge(format!(
                    "Path does not exist: {}",
                    path.display()
                )));
            }
        }

        Ok(files)
    }
}

fn source_id_for(path: &Path) -> AppResult<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| AppError::Knowledge(format!("Not a file path: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::TrigramProvider;
    use crate::memory_index::InMemoryIndex;
    use tempfile::TempDir;

    const DIMS: usize = 64;

    fn ingestor() -> (Ingestor, Arc<InMemoryIndex>) {
        let embedder = Arc::new(Embedder::with_provider(Arc::new(TrigramProvider::new(DIMS))));
        let index = Arc::new(InMemoryIndex::new(DIMS));
        let options = IngestOptions {
            chunking: ChunkOptions {
                chunk_size: 12,
                chunk_overlap: 4,
                respect_sentences: true,
            },
            batch_size: 4,
            aggressive_clean: false,
        };
        (Ingestor::new(embedder, index.clone(), options), index)
    }

    const GUIDE: &str = "Pathogenic variants cause disease. Null variants are strong evidence. \
        Segregation data supports pathogenicity. Functional studies support classification. \
        Population frequency matters for benign calls.";

    #[tokio::test]
    async fn test_ingest_then_skip() {
        let (ingestor, index) = ingestor();

        let outcome = ingestor.ingest_text("acmg.txt", GUIDE, false).await.unwrap();
        let IngestOutcome::Ingested { chunks, replaced } = outcome else {
            panic!("expected ingestion, got {:?}", outcome);
        };
        assert!(chunks > 1);
        assert_eq!(replaced, 0);
        assert_eq!(index.count().await.unwrap(), chunks);

        let again = ingestor.ingest_text("acmg.txt", GUIDE, false).await.unwrap();
        assert_eq!(again, IngestOutcome::Skipped);
        assert_eq!(index.count().await.unwrap(), chunks);
    }

    #[tokio::test]
    async fn test_reingest_replaces_source() {
        let (ingestor, index) = ingestor();
        ingestor.ingest_text("acmg.txt", GUIDE, false).await.unwrap();
        ingestor.ingest_text("other.txt", "Benign variants do not cause disease.", false).await.unwrap();

        let outcome = ingestor
            .ingest_text("acmg.txt", "Short replacement text.", true)
            .await
            .unwrap();
        assert!(matches!(outcome, IngestOutcome::Ingested { chunks: 1, replaced } if replaced > 1));
        assert_eq!(index.count().await.unwrap(), 2);
        assert_eq!(index.sources().await.unwrap(), vec!["acmg.txt", "other.txt"]);
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let (ingestor, index) = ingestor();
        let err = ingestor.ingest_text("blank.txt", "  \n ", false).await.unwrap_err();
        assert!(matches!(err, AppError::Knowledge(_)));
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reingest_of_one_source_keeps_positions_unique() {
        let (ingestor, index) = ingestor();
        let ingestor = Arc::new(ingestor);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ingestor = Arc::clone(&ingestor);
                tokio::spawn(async move { ingestor.ingest_text("acmg.txt", GUIDE, true).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let expected = chunk_with_metadata("acmg.txt", GUIDE, &ingestor.options().chunking).len();
        assert_eq!(index.count().await.unwrap(), expected);

        let query = vec![1.0 / (DIMS as f32).sqrt(); DIMS];
        let mut positions: Vec<u32> = index
            .search(&query, 100, Some("acmg.txt"))
            .await
            .unwrap()
            .iter()
            .map(|c| c.position)
            .collect();
        positions.sort_unstable();
        assert_eq!(positions, (0..expected as u32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_ingest_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.md"), "# Title\n\nPathogenic variants cause disease.").unwrap();
        std::fs::write(dir.path().join("b.txt"), GUIDE).unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::write(dir.path().join("broken.txt"), [0u8, 159, 146]).unwrap();

        let (ingestor, index) = ingestor();
        let stats = ingestor
            .ingest_paths(&[dir.path().to_path_buf()], false)
            .await
            .unwrap();

        assert_eq!(stats.files_total, 3);
        assert_eq!(stats.ingested, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(index.sources().await.unwrap(), vec!["a.md", "b.txt"]);
        assert_eq!(stats.chunks, index.count().await.unwrap());

        let again = ingestor
            .ingest_paths(&[dir.path().join("b.txt")], false)
            .await
            .unwrap();
        assert_eq!(again.skipped, 1);
    }

    #[tokio::test]
    async fn test_missing_path_is_error() {
        let (ingestor, _) = ingestor();
        let err = ingestor
            .ingest_paths(&[PathBuf::from("/definitely/not/here")], false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Knowledge(_)));
    }
}
