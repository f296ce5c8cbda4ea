/// Text cleaning, boundary-aware chunking and chunk metadata
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, error, info};

use crate::domain::base::ConfigurationResult;
use crate::domain::entities::{Chunk, ChunkMetadata};
use crate::domain::value_objects::ChunkingParams;
use crate::infrastructure::file_system::{read_source, DocumentResult, DEFAULT_ENCODINGS};

/// Prefix given to transcripts by the upstream cleaning step
pub const INGESTION_PREFIX: &str = "cleaned_";

const UNKNOWN: &str = "unknown";

/// Splits documents into overlapping, size-bounded chunks
#[derive(Debug, Clone)]
pub struct TextProcessor {
    params: ChunkingParams,
    whitespace_regex: Regex,
    disallowed_regex: Regex,
    segment_suffix_regex: Regex,
}

impl TextProcessor {
    pub fn new(params: ChunkingParams) -> Self {
        TextProcessor {
            params,
            // Runs of spaces, tabs and newlines
            whitespace_regex: Regex::new(r"\s+").unwrap(),
            // Anything except word characters, whitespace and basic punctuation
            disallowed_regex: Regex::new(r"[^\w\s.,!?;:()\-]").unwrap(),
            // Trailing `_<digits>` segment number
            segment_suffix_regex: Regex::new(r"_\d+$").unwrap(),
        }
    }

    /// Build from raw sizes, failing fast on invalid parameters
    pub fn with_sizes(chunk_size: i64, chunk_overlap: i64) -> ConfigurationResult<Self> {
        Ok(Self::new(ChunkingParams::new(chunk_size, chunk_overlap)?))
    }

    /// Shared instance with default parameters
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<TextProcessor> = OnceLock::new();
        INSTANCE.get_or_init(|| TextProcessor::new(ChunkingParams::default()))
    }

    pub fn params(&self) -> ChunkingParams {
        self.params
    }

    /// Collapse whitespace, drop unsupported characters and trim.
    /// Lossy: all lengths in metadata refer to the cleaned text.
    pub fn clean_text(&self, text: &str) -> String {
        let collapsed = self.whitespace_regex.replace_all(text, " ");
        let stripped = self.disallowed_regex.replace_all(&collapsed, "");
        stripped.trim().to_string()
    }

    /// Greedy forward scan producing chunks of at most `chunk_size` characters.
    ///
    /// A chunk ends just after the rightmost `.` in its window when that keeps
    /// the scan moving forward, otherwise it is cut hard at `chunk_size`. The
    /// next chunk starts `chunk_overlap` characters before the previous end.
    pub fn split_into_chunks(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let size = self.params.chunk_size();
        let overlap = self.params.chunk_overlap();

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let end = start + size;

            if end >= len {
                chunks.push(Self::make_chunk(&chars, chunks.len(), start, len));
                break;
            }

            // A period at window offset `p` yields a chunk of `p + 1` chars;
            // it must be longer than the overlap or the scan would stall.
            let split = match chars[start..end].iter().rposition(|&c| c == '.') {
                Some(p) if p > 0 && p + 1 > overlap => start + p + 1,
                _ => end,
            };

            chunks.push(Self::make_chunk(&chars, chunks.len(), start, split));
            start = split - overlap;
        }

        chunks
    }

    fn make_chunk(chars: &[char], index: usize, start: usize, end: usize) -> Chunk {
        Chunk::new(index, chars[start..end].iter().collect::<String>(), start, end)
    }

    /// Size statistics of the chunks a text would produce
    pub fn text_stats(&self, text: &str) -> TextStats {
        let chunks = self.split_into_chunks(text);
        TextStats::from_chunks(text.chars().count(), &chunks)
    }

    /// Derive document-level metadata from the cleaned text and its source
    /// identifier. Pure: the identifier is not required to exist on disk.
    pub fn extract_metadata(&self, text: &str, path: &str) -> SourceMetadata {
        let stem = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        let filename = stem
            .strip_prefix(INGESTION_PREFIX)
            .map(str::to_string)
            .unwrap_or(stem);

        let (topic, filename) = if filename.is_empty() {
            (UNKNOWN.to_string(), UNKNOWN.to_string())
        } else {
            let topic = self.segment_suffix_regex.replace(&filename, "").to_string();
            (topic, filename)
        };

        SourceMetadata {
            path: path.to_string(),
            topic,
            filename,
            document_length: text.chars().count(),
        }
    }

    /// Clean, split, and attach metadata to raw document text
    pub fn process(&self, raw_text: &str, source_identifier: &str) -> ProcessedDocument {
        let cleaned = self.clean_text(raw_text);
        debug!(
            "Text cleaned, size {} -> {} characters",
            raw_text.chars().count(),
            cleaned.chars().count()
        );

        let chunks = self.split_into_chunks(&cleaned);
        let stats = TextStats::from_chunks(cleaned.chars().count(), &chunks);
        info!("Processing stats for {}: {}", source_identifier, stats);

        let base = self.extract_metadata(&cleaned, source_identifier);
        let ingested_at = chrono::Utc::now().to_rfc3339();
        let chunk_total = chunks.len();

        let metadata = chunks
            .iter()
            .map(|chunk| ChunkMetadata {
                path: base.path.clone(),
                source: base.path.clone(),
                topic: base.topic.clone(),
                filename: base.filename.clone(),
                chunk_id: chunk.index(),
                chunk_total,
                chunk_text_length: chunk.char_len(),
                document_length: base.document_length,
                ingested_at: ingested_at.clone(),
            })
            .collect();

        ProcessedDocument {
            chunks,
            metadata,
            stats,
        }
    }

    /// Read a file from disk and process it, using its path as identifier
    pub async fn process_file(&self, file_path: &Path) -> DocumentResult<ProcessedDocument> {
        info!("Processing file: {}", file_path.display());

        let text = read_source(file_path, DEFAULT_ENCODINGS).await.map_err(|e| {
            error!("Failed to read {}: {}", file_path.display(), e);
            e
        })?;
        debug!("File read, {} characters", text.chars().count());

        let document = self.process(&text, &file_path.to_string_lossy());
        info!(
            "Finished processing {}: {} chunks",
            file_path.display(),
            document.chunks.len()
        );
        Ok(document)
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new(ChunkingParams::default())
    }
}

/// Document-level metadata shared by all chunks of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    pub path: String,
    pub topic: String,
    pub filename: String,
    pub document_length: usize,
}

/// Chunk size statistics, in characters
#[derive(Debug, Clone, PartialEq)]
pub struct TextStats {
    pub total_length: usize,
    pub chunks_count: usize,
    pub avg_chunk_size: f64,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
}

impl TextStats {
    fn from_chunks(total_length: usize, chunks: &[Chunk]) -> Self {
        let sizes: Vec<usize> = chunks.iter().map(Chunk::char_len).collect();
        let avg_chunk_size = if sizes.is_empty() {
            0.0
        } else {
            sizes.iter().sum::<usize>() as f64 / sizes.len() as f64
        };

        TextStats {
            total_length,
            chunks_count: sizes.len(),
            avg_chunk_size,
            min_chunk_size: sizes.iter().copied().min().unwrap_or(0),
            max_chunk_size: sizes.iter().copied().max().unwrap_or(0),
        }
    }
}

impl std::fmt::Display for TextStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "length={} chunks={} avg={:.1} min={} max={}",
            self.total_length,
            self.chunks_count,
            self.avg_chunk_size,
            self.min_chunk_size,
            self.max_chunk_size
        )
    }
}

/// Output of processing one document: chunks and metadata, index-aligned
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub chunks: Vec<Chunk>,
    pub metadata: Vec<ChunkMetadata>,
    pub stats: TextStats,
}

impl ProcessedDocument {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk texts and their metadata, ready for upsert
    pub fn into_parts(self) -> (Vec<String>, Vec<ChunkMetadata>) {
        let texts = self.chunks.into_iter().map(Chunk::into_text).collect();
        (texts, self.metadata)
    }
}
