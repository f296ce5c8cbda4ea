use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use history_rag::application::services::{
    DocumentStore, IngestionEvent, IngestionService, ProgressCallback, RagService,
    DEFAULT_MANIFEST_FILE, DEFAULT_TOPIC_LIMIT,
};
use history_rag::domain::value_objects::CollectionName;
use history_rag::infrastructure::config::Settings;
use history_rag::infrastructure::embeddings::EmbeddingProviderKind;
use history_rag::infrastructure::gigachat::GigaChatClient;
use history_rag::infrastructure::llm::GigaChatAnswerGenerator;
use history_rag::infrastructure::text::TextProcessor;

#[derive(Parser, Debug)]
#[command(
    name = "history-rag",
    about = "Ingest historical documents and answer questions about them"
)]
struct Cli {
    /// Collection to operate on (defaults to COLLECTION_NAME)
    #[arg(long, global = true)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest the files listed in a manifest; stops at the first failure
    Ingest {
        #[arg(long)]
        docs_dir: PathBuf,
        #[arg(long, default_value = DEFAULT_MANIFEST_FILE)]
        manifest: String,
    },
    /// Ingest every .txt file in a directory, skipping files that fail
    Scan {
        #[arg(long)]
        docs_dir: PathBuf,
    },
    /// Answer a question from the stored documents
    Ask {
        question: String,
        /// Number of passages to retrieve (defaults to RETRIEVAL_K)
        #[arg(short)]
        k: Option<usize>,
    },
    /// Show collection statistics
    Stats,
    /// List topics, or the chunks of one topic
    Topics {
        #[arg(long)]
        topic: Option<String>,
        #[arg(long, default_value_t = DEFAULT_TOPIC_LIMIT)]
        limit: usize,
    },
    /// Delete the collection
    Delete,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("Invalid configuration")?;

    let collection = match cli.collection {
        Some(name) => CollectionName::new(name).context("Invalid collection name")?,
        None => settings.collection_name.clone(),
    };

    let gigachat = if settings.embedding_provider == EmbeddingProviderKind::GigaChat
        || matches!(cli.command, Command::Ask { .. })
    {
        Some(Arc::new(GigaChatClient::new(settings.gigachat.clone())?))
    } else {
        None
    };

    let embedder = settings
        .embedding_provider
        .build(&settings, gigachat.clone())
        .await?;
    let backend = settings.vector_store.build(&settings)?;
    let store = Arc::new(
        DocumentStore::new(backend, embedder).with_batch_size(settings.embedding_batch_size),
    );

    match cli.command {
        Command::Ingest { docs_dir, manifest } => {
            let service = IngestionService::new(store, TextProcessor::new(settings.chunking));
            let summary = service
                .ingest_manifest(&docs_dir, &manifest, &collection, Some(progress_printer()))
                .await?;
            println!(
                "Ingested {} of {} files ({} chunks, {} skipped) in {} ms",
                summary.documents_ingested,
                summary.total_files,
                summary.chunks_stored,
                summary.skipped.len(),
                summary.duration_ms
            );
        }
        Command::Scan { docs_dir } => {
            let service = IngestionService::new(store, TextProcessor::new(settings.chunking));
            let summary = service
                .ingest_directory_scan(&docs_dir, &collection, Some(progress_printer()))
                .await?;
            println!(
                "Ingested {} of {} files ({} chunks) in {} ms, success rate {:.1}%",
                summary.documents_ingested,
                summary.total_files,
                summary.chunks_stored,
                summary.duration_ms,
                summary.success_rate()
            );
            for (path, error) in &summary.errors {
                println!("  failed: {}: {}", path.display(), error);
            }
        }
        Command::Ask { question, k } => {
            let client = gigachat.context("GigaChat client is required to answer questions")?;
            let generator = Arc::new(GigaChatAnswerGenerator::new(client));
            let rag = RagService::new(store.clone(), generator)
                .with_query_embedder(store.embedder().clone())
                .with_default_k(k.unwrap_or(settings.retrieval_k));
            info!("Answering question against '{}'", collection);
            println!("{}", rag.answer_or_fallback(&question, &collection).await);
        }
        Command::Stats => {
            let stats = store.stats(&collection).await?;
            println!("Collection: {}", stats.name);
            println!("Documents:  {}", stats.count);
            for (key, value) in &stats.metadata {
                println!("{:<11} {}", format!("{}:", key), value);
            }
        }
        Command::Topics { topic, limit } => match topic {
            Some(topic) => {
                for doc in store.documents_by_topic(&collection, &topic, limit).await? {
                    println!(
                        "[{} {}/{}] {}",
                        doc.metadata.filename,
                        doc.metadata.chunk_id + 1,
                        doc.metadata.chunk_total,
                        doc.text
                    );
                }
            }
            None => {
                for topic in store.unique_topics(&collection).await? {
                    println!("{}", topic);
                }
            }
        },
        Command::Delete => {
            if store.delete(&collection).await? {
                println!("Deleted collection '{}'", collection);
            } else {
                println!("Collection '{}' does not exist", collection);
            }
        }
    }

    Ok(())
}

fn progress_printer() -> ProgressCallback {
    Arc::new(|event| match event {
        IngestionEvent::Started { total_files } => println!("Ingesting {} files", total_files),
        IngestionEvent::FileProcessed {
            file_path,
            chunks,
            progress,
        } => println!(
            "[{:>5.1}%] {} ({} chunks)",
            progress.percentage(),
            file_path.display(),
            chunks
        ),
        IngestionEvent::FileSkipped { file_path, reason } => {
            println!("skipped {}: {}", file_path.display(), reason)
        }
        IngestionEvent::Failed { error, .. } => println!("failed: {}", error),
        IngestionEvent::Completed { .. } => {}
    })
}
