use crate::aggregator::{ActivityAggregator, CommunityCache, Degradation};
use crate::normalizer::normalize;
use crate::resolver::resolve_username;
use crate::writer::PersistenceWriter;
use chrono::Utc;
use persona_core::{AppConfig, CoreError, ExportDocument, Stage, StageError, StageExt};
use reddit_client::{ActivitySource, RetryConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub document: ExportDocument,
    pub path: PathBuf,
    pub degradations: Vec<Degradation>,
}

/// Resolve, aggregate, normalize and persist one user's activity.
pub struct CollectionPipeline<'a, S> {
    source: &'a S,
    retry: RetryConfig,
    writer: PersistenceWriter,
    deadline: Duration,
}

impl<'a, S: ActivitySource> CollectionPipeline<'a, S> {
    pub fn new(
        source: &'a S,
        retry: RetryConfig,
        writer: PersistenceWriter,
        deadline: Duration,
    ) -> Self {
        Self {
            source,
            retry,
            writer,
            deadline,
        }
    }

    pub fn from_config(source: &'a S, config: &AppConfig) -> Self {
        Self::new(
            source,
            RetryConfig::from(&config.retry),
            PersistenceWriter::new(config.collection.output_dir.clone()),
            Duration::from_secs(config.collection.deadline_secs),
        )
    }

    pub fn writer(&self) -> &PersistenceWriter {
        &self.writer
    }

    pub async fn run(&self, reference: &str) -> Result<CollectionOutcome, StageError> {
        let username = resolve_username(reference).at_stage(Stage::Resolve)?;

        let mut cache = CommunityCache::new();
        let aggregator = ActivityAggregator::new(self.source, self.retry.clone());
        let raw = timeout(self.deadline, aggregator.aggregate(&username, &mut cache))
            .await
            .unwrap_or_else(|_| {
                Err(CoreError::Timeout {
                    seconds: self.deadline.as_secs(),
                })
            })
            .at_stage(Stage::Aggregate)?;

        let degradations = raw.degradations.clone();
        for degradation in &degradations {
            warn!(
                "Degraded {:?} lookup for {}: {}",
                degradation.kind, degradation.subject, degradation.reason
            );
        }

        let document = normalize(raw, Utc::now());
        let path = self.writer.write(&document).at_stage(Stage::Persist)?;

        info!(
            "Collected u/{}: {} posts, {} comments, {} communities",
            username,
            document.summary.total_posts,
            document.summary.total_comments,
            document.summary.unique_subreddits
        );

        Ok(CollectionOutcome {
            document,
            path,
            degradations,
        })
    }
}
