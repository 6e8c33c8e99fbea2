use crate::cli::Command;
use analysis::{render_report, AnalysisOrchestrator};
use collector::{resolve_username, CollectionOutcome, CollectionPipeline, PersistenceWriter};
use embedding_engine::EmbeddingEngine;
use inference::{Embedder, HuggingFaceClient, UnavailableModels};
use persona_core::{
    AppConfig, ConfigError, CoreError, EmbeddingBackend, ErrorExt, ErrorReporter, ExportDocument,
    Stage, StageError, StageExt,
};
use reddit_client::RedditClient;
use std::path::Path;
use tracing::{info, warn};
use vector_index::{IndexReport, RetrievalIndexer, VectorIndex};

/// Embedding backend chosen in `[embedding]`.
enum AnyEmbedder {
    Remote(HuggingFaceClient),
    Local(EmbeddingEngine),
}

impl AnyEmbedder {
    fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        match config.embedding.backend {
            EmbeddingBackend::Remote => Ok(Self::Remote(HuggingFaceClient::from_settings(
                &config.inference,
            )?)),
            EmbeddingBackend::Local => {
                let model_dir =
                    config
                        .embedding
                        .model_dir
                        .as_ref()
                        .ok_or_else(|| ConfigError::MissingField {
                            field: "embedding.model_dir".to_string(),
                        })?;
                Ok(Self::Local(EmbeddingEngine::load(model_dir)?))
            }
        }
    }
}

impl Embedder for AnyEmbedder {
    fn dimension(&self) -> Option<usize> {
        match self {
            AnyEmbedder::Remote(client) => client.dimension(),
            AnyEmbedder::Local(engine) => engine.dimension(),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        match self {
            AnyEmbedder::Remote(client) => client.embed(text).await,
            AnyEmbedder::Local(engine) => engine.embed(text).await,
        }
    }
}

pub async fn dispatch(command: Command, config: &AppConfig) -> Result<(), StageError> {
    match command {
        Command::Collect { profile_url } => {
            let outcome = collect(config, &profile_url).await?;
            println!("{}", outcome.path.display());
        }
        Command::Analyze { export, annotate } => {
            let document = PersistenceWriter::load(&export).at_stage(Stage::Analyze)?;
            let writer = PersistenceWriter::new(export.parent().unwrap_or(Path::new(".")));
            analyze(config, &document, &writer, annotate).await?;
        }
        Command::Index { export } => {
            let document = PersistenceWriter::load(&export).at_stage(Stage::Index)?;
            index(config, &document).await?;
        }
        Command::Query {
            username,
            question,
            k,
        } => {
            query(config, &username, &question, k.unwrap_or(config.index.top_k)).await?;
        }
        Command::Run {
            profile_url,
            skip_index,
        } => {
            let outcome = collect(config, &profile_url).await?;
            let writer = PersistenceWriter::new(&config.collection.output_dir);
            analyze(config, &outcome.document, &writer, false).await?;
            if !skip_index {
                index(config, &outcome.document).await?;
            }
        }
    }
    Ok(())
}

async fn collect(config: &AppConfig, profile_url: &str) -> Result<CollectionOutcome, StageError> {
    resolve_username(profile_url).at_stage(Stage::Resolve)?;
    let client = RedditClient::from_app_config(config).at_stage(Stage::Aggregate)?;

    let outcome = CollectionPipeline::from_config(&client, config)
        .run(profile_url)
        .await;

    let metrics = client.api().get_metrics().await;
    info!(
        "Reddit API: {} requests, {:.1}% successful, {} rate limited, {:?} average",
        metrics.total_requests,
        metrics.success_rate() * 100.0,
        metrics.rate_limited_requests,
        metrics.average_response_time()
    );
    let status = client.api().get_rate_limit_status().await;
    if status.is_near_limit() {
        warn!(
            "Reddit rate limit {:.0}% used, {} of {} requests left in burst",
            status.utilization_percentage(),
            status.available_tokens,
            status.max_tokens
        );
    }

    let outcome = outcome?;
    if !outcome.degradations.is_empty() {
        info!(
            "{} lookups degraded to placeholders",
            outcome.degradations.len()
        );
    }
    Ok(outcome)
}

async fn analyze(
    config: &AppConfig,
    document: &ExportDocument,
    writer: &PersistenceWriter,
    annotate: bool,
) -> Result<(), StageError> {
    let outcome = match HuggingFaceClient::from_settings(&config.inference) {
        Ok(client) => {
            AnalysisOrchestrator::new(&client, &client)
                .run(document)
                .await
        }
        Err(e) => {
            ErrorReporter::new().report_warning(&e);
            let reason = e.user_friendly_message();
            warn!("Hosted models unavailable, only keyword traits will be scored");
            let models = UnavailableModels::new(reason);
            AnalysisOrchestrator::new(&models, &models)
                .run(document)
                .await
        }
    };

    let path = writer
        .write_report(&outcome.report)
        .at_stage(Stage::Persist)?;
    if annotate {
        writer.write(&outcome.annotated).at_stage(Stage::Persist)?;
    }

    println!("{}", render_report(&outcome.report));
    println!("Report written to {}", path.display());
    Ok(())
}

async fn index(config: &AppConfig, document: &ExportDocument) -> Result<IndexReport, StageError> {
    let embedder = AnyEmbedder::from_config(config).at_stage(Stage::Index)?;
    let index = VectorIndex::connect(&config.index.database_url)
        .await
        .at_stage(Stage::Index)?;

    let report = RetrievalIndexer::new(&embedder, &index)
        .index_document(document)
        .await
        .at_stage(Stage::Index)?;

    println!(
        "Indexed {} entries for u/{} ({} stale entries removed)",
        report.upserted, report.collection, report.pruned
    );
    Ok(report)
}

async fn query(config: &AppConfig, username: &str, question: &str, k: usize) -> Result<(), StageError> {
    let embedder = AnyEmbedder::from_config(config).at_stage(Stage::Query)?;
    let index = VectorIndex::connect(&config.index.database_url)
        .await
        .at_stage(Stage::Query)?;

    let vector = embedder.embed(question).await.at_stage(Stage::Query)?;
    let hits = index
        .query(username, &vector, k)
        .await
        .at_stage(Stage::Query)?;

    if hits.is_empty() {
        println!("Nothing indexed for u/{}", username);
        return Ok(());
    }
    let json = serde_json::to_string_pretty(&hits).at_stage(Stage::Query)?;
    println!("{}", json);
    Ok(())
}
