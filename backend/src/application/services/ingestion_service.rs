/// Batch ingestion of source documents into a collection
use crate::application::repositories::VectorStoreError;
use crate::application::services::DocumentStore;
use crate::domain::value_objects::{CollectionName, IngestProgress};
use crate::infrastructure::file_system::{
    discover_text_files, load_manifest, DocumentError, DocumentResult, ManifestError,
};
use crate::infrastructure::text::{ProcessedDocument, TextProcessor};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const DEFAULT_MANIFEST_FILE: &str = "urls.json";

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Vector store error: {0}")]
    Store(#[from] VectorStoreError),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),
}

pub type IngestionResult<T> = Result<T, IngestionError>;

/// Callback type for progress events
pub type ProgressCallback = Arc<dyn Fn(IngestionEvent) + Send + Sync>;

/// Progress event for an ingestion batch
#[derive(Debug, Clone)]
pub enum IngestionEvent {
    Started { total_files: usize },
    FileProcessed { file_path: PathBuf, chunks: usize, progress: IngestProgress },
    FileSkipped { file_path: PathBuf, reason: String },
    Completed { documents_ingested: usize, chunks_stored: usize, duration_ms: u64 },
    Failed { error: String, files_processed: usize },
}

/// Loads documents from disk, chunks them and stores the chunks.
///
/// Two entry points with different failure policies:
/// `ingest_manifest` aborts the whole batch on the first processing error,
/// `ingest_directory_scan` records the error and moves on.
pub struct IngestionService {
    store: Arc<DocumentStore>,
    processor: Arc<TextProcessor>,
    max_concurrent_files: usize,
}

impl IngestionService {
    pub fn new(store: Arc<DocumentStore>, processor: TextProcessor) -> Self {
        IngestionService {
            store,
            processor: Arc::new(processor),
            max_concurrent_files: 4, // Default bounded concurrency
        }
    }

    /// Files read and chunked ahead of storage during a directory scan
    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent_files = max_concurrent.max(1);
        self
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Ingest the files listed in `docs_dir/manifest_file`.
    ///
    /// Every chunk's `source` is set to the entry's URL. Entries whose file
    /// is missing, and files that yield no chunks, are skipped with a warning.
    /// Any other failure aborts the batch; files stored before it stay stored.
    pub async fn ingest_manifest(
        &self,
        docs_dir: &Path,
        manifest_file: &str,
        collection: &CollectionName,
        progress_callback: Option<ProgressCallback>,
    ) -> IngestionResult<IngestionSummary> {
        let start_time = Instant::now();
        ensure_directory(docs_dir).await?;

        let manifest_path = docs_dir.join(manifest_file);
        info!("Loading documents from {}", docs_dir.display());
        info!("Manifest: {}", manifest_path.display());
        let entries = load_manifest(&manifest_path).await?;

        let total_files = entries.len();
        emit(&progress_callback, IngestionEvent::Started { total_files });

        let mut summary = IngestionSummary::new(total_files);
        let mut progress = IngestProgress::new(total_files);

        for entry in entries {
            let file_path = docs_dir.join(&entry.file);
            info!("Processing file: {}", file_path.display());
            progress.set_current_file(Some(file_path.clone()));

            if !is_file(&file_path).await {
                warn!("File not found, skipping: {}", file_path.display());
                summary.skip(&progress_callback, file_path, "file not found");
                progress.increment();
                continue;
            }

            let stored = match self
                .store_document(&file_path, Some(&entry.url), collection)
                .await
            {
                Ok(stored) => stored,
                Err(e) => {
                    error!("Failed to ingest {}: {}", entry.file, e);
                    emit(
                        &progress_callback,
                        IngestionEvent::Failed {
                            error: e.to_string(),
                            files_processed: progress.files_processed(),
                        },
                    );
                    return Err(e);
                }
            };

            progress.increment();
            match stored {
                Some(chunks) => {
                    summary.record(chunks);
                    emit(
                        &progress_callback,
                        IngestionEvent::FileProcessed {
                            file_path,
                            chunks,
                            progress: progress.clone(),
                        },
                    );
                }
                None => {
                    warn!("No chunks produced from {}", entry.file);
                    summary.skip(&progress_callback, file_path, "no chunks produced");
                }
            }
        }

        summary.finish(start_time, &progress_callback);
        Ok(summary)
    }

    /// Ingest every `*.txt` file directly inside `docs_dir`, best effort.
    ///
    /// Up to `max_concurrent_files` files are read and chunked ahead of
    /// storage; chunks are stored in path order.
    /// Per-file failures are logged and collected in the summary.
    pub async fn ingest_directory_scan(
        &self,
        docs_dir: &Path,
        collection: &CollectionName,
        progress_callback: Option<ProgressCallback>,
    ) -> IngestionResult<IngestionSummary> {
        let start_time = Instant::now();
        ensure_directory(docs_dir).await?;

        let files = discover_text_files(docs_dir, "txt").await?;
        let total_files = files.len();
        info!("Found {} text files in {}", total_files, docs_dir.display());
        emit(&progress_callback, IngestionEvent::Started { total_files });

        let spawn_processing = |file_path: PathBuf| {
            let processor = Arc::clone(&self.processor);
            let task = tokio::spawn({
                let file_path = file_path.clone();
                async move { processor.process_file(&file_path).await }
            });
            (file_path, task)
        };

        // Sliding window: at most `max_concurrent_files` documents are being
        // processed or waiting to be stored at any time
        let mut pending = files.into_iter();
        let mut in_flight: VecDeque<(PathBuf, JoinHandle<DocumentResult<ProcessedDocument>>)> =
            pending
                .by_ref()
                .take(self.max_concurrent_files)
                .map(&spawn_processing)
                .collect();

        let mut summary = IngestionSummary::new(total_files);
        let mut progress = IngestProgress::new(total_files);

        while let Some((file_path, task)) = in_flight.pop_front() {
            if let Some(next) = pending.next() {
                in_flight.push_back(spawn_processing(next));
            }
            progress.set_current_file(Some(file_path.clone()));

            let outcome = match task.await {
                Ok(Ok(document)) => self
                    .store_processed(document, None, collection)
                    .await
                    .map_err(|e| e.to_string()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("processing task failed: {}", e)),
            };
            progress.increment();

            match outcome {
                Ok(Some(chunks)) => {
                    info!("Ingested {} ({} chunks)", file_path.display(), chunks);
                    summary.record(chunks);
                    emit(
                        &progress_callback,
                        IngestionEvent::FileProcessed {
                            file_path,
                            chunks,
                            progress: progress.clone(),
                        },
                    );
                }
                Ok(None) => {
                    warn!("No chunks produced from {}", file_path.display());
                    summary.skip(&progress_callback, file_path, "no chunks produced");
                }
                Err(e) => {
                    error!("Failed to ingest {}: {}", file_path.display(), e);
                    summary.errors.push((file_path, e));
                }
            }
        }

        summary.finish(start_time, &progress_callback);
        Ok(summary)
    }

    /// Process one file and store its chunks. `None` when it had no chunks.
    async fn store_document(
        &self,
        file_path: &Path,
        source_url: Option<&str>,
        collection: &CollectionName,
    ) -> IngestionResult<Option<usize>> {
        let document = self.processor.process_file(file_path).await?;
        self.store_processed(document, source_url, collection).await
    }

    async fn store_processed(
        &self,
        document: ProcessedDocument,
        source_url: Option<&str>,
        collection: &CollectionName,
    ) -> IngestionResult<Option<usize>> {
        if document.is_empty() {
            return Ok(None);
        }

        let (texts, mut metadatas) = document.into_parts();
        if let Some(url) = source_url {
            for metadata in &mut metadatas {
                metadata.source = url.to_string();
            }
        }

        let chunks = texts.len();
        self.store.add_documents(collection, texts, metadatas).await?;
        info!("Stored {} chunks in collection '{}'", chunks, collection);
        Ok(Some(chunks))
    }
}

async fn ensure_directory(dir: &Path) -> IngestionResult<()> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => {
            error!("Directory does not exist: {}", dir.display());
            Err(IngestionError::DirectoryNotFound(dir.to_path_buf()))
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

fn emit(callback: &Option<ProgressCallback>, event: IngestionEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}

/// Summary of an ingestion batch
#[derive(Debug)]
pub struct IngestionSummary {
    pub total_files: usize,
    pub documents_ingested: usize,
    pub chunks_stored: usize,
    pub skipped: Vec<PathBuf>,
    pub errors: Vec<(PathBuf, String)>,
    pub duration_ms: u64,
}

impl IngestionSummary {
    fn new(total_files: usize) -> Self {
        IngestionSummary {
            total_files,
            documents_ingested: 0,
            chunks_stored: 0,
            skipped: Vec::new(),
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    fn record(&mut self, chunks: usize) {
        self.documents_ingested += 1;
        self.chunks_stored += chunks;
    }

    fn skip(&mut self, callback: &Option<ProgressCallback>, file_path: PathBuf, reason: &str) {
        emit(
            callback,
            IngestionEvent::FileSkipped {
                file_path: file_path.clone(),
                reason: reason.to_string(),
            },
        );
        self.skipped.push(file_path);
    }

    fn finish(&mut self, start_time: Instant, callback: &Option<ProgressCallback>) {
        self.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Ingestion finished: {} of {} files, {} chunks, {} skipped, {} failed in {} ms",
            self.documents_ingested,
            self.total_files,
            self.chunks_stored,
            self.skipped.len(),
            self.errors.len(),
            self.duration_ms
        );
        emit(
            callback,
            IngestionEvent::Completed {
                documents_ingested: self.documents_ingested,
                chunks_stored: self.chunks_stored,
                duration_ms: self.duration_ms,
            },
        );
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            return 100.0;
        }
        (self.documents_ingested as f64 / self.total_files as f64) * 100.0
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
