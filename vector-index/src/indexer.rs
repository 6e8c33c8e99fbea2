use crate::store::{IndexEntry, Metadata, MetadataValue, VectorIndex};
use inference::Embedder;
use persona_core::{CoreError, ErrorRecovery, ExportDocument};
use serde::Serialize;
use tracing::{debug, info};

/// One retrievable unit before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexUnit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexReport {
    pub collection: String,
    pub upserted: usize,
    pub pruned: u64,
}

fn metadata<const N: usize>(pairs: [(&str, MetadataValue); N]) -> Metadata {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Split an export into units: one per community (`sub_<name>`), one per
/// post (`post_<n>`) and one per comment (`comment_<n>`, counted across all
/// groups). Ids only depend on the export, so indexing it again replaces the
/// same rows.
pub fn build_units(document: &ExportDocument) -> Vec<IndexUnit> {
    let mut units = Vec::new();

    for (name, info) in &document.subreddits_master {
        units.push(IndexUnit {
            id: format!("sub_{}", name),
            text: format!("{} {}", info.title, info.public_description),
            metadata: metadata([
                ("type", "subreddit".into()),
                ("subreddit_name", name.as_str().into()),
                ("title", info.title.as_str().into()),
                ("public_description", info.public_description.as_str().into()),
                ("over_18", info.over_18.into()),
                ("url", info.url.as_str().into()),
                ("interactions_count", info.interactions_count.into()),
            ]),
        });
    }

    for (idx, post) in document.posts.iter().enumerate() {
        let info = &post.post_info;
        let flair = info.flair.clone().unwrap_or_default();
        units.push(IndexUnit {
            id: format!("post_{}", idx),
            text: format!(
                "title: {} flair: {} subreddit:{} content: {}",
                info.title, flair, post.subreddit, info.body
            ),
            metadata: metadata([
                ("type", "post".into()),
                ("post_title", info.title.as_str().into()),
                ("post_flair", flair.into()),
                ("post_url", info.reddit_url.as_str().into()),
                ("post_created_at", info.created_at.to_rfc3339().into()),
                ("subreddit_name", post.subreddit.as_str().into()),
                ("body", info.body.as_str().into()),
            ]),
        });
    }

    let comments = document
        .comments
        .iter()
        .flat_map(|group| group.comments.iter().map(move |comment| (group, comment)));
    for (counter, (group, comment)) in comments.enumerate() {
        units.push(IndexUnit {
            id: format!("comment_{}", counter),
            text: format!(
                "content: {} post_title: {} subreddit: {}",
                comment.body, group.post_info.title, group.subreddit
            ),
            metadata: metadata([
                ("type", "comment".into()),
                ("comment_body", comment.body.as_str().into()),
                ("comment_created_at", comment.created_at.to_rfc3339().into()),
                ("comment_url", comment.url.as_str().into()),
                ("post_title", group.post_info.title.as_str().into()),
                ("post_url", group.post_info.reddit_url.as_str().into()),
                ("subreddit_name", group.subreddit.as_str().into()),
            ]),
        });
    }

    units
}

/// Embeds export units and upserts them into a [`VectorIndex`] collection
/// named after the user.
pub struct RetrievalIndexer<'a, E> {
    embedder: &'a E,
    index: &'a VectorIndex,
}

impl<'a, E: Embedder> RetrievalIndexer<'a, E> {
    pub fn new(embedder: &'a E, index: &'a VectorIndex) -> Self {
        Self { embedder, index }
    }

    /// Index every unit of `document`, then drop entries of the same
    /// collection that the export no longer produces.
    pub async fn index_document(&self, document: &ExportDocument) -> Result<IndexReport, CoreError> {
        let collection = document.username().to_string();
        let units = build_units(document);
        info!("Indexing {} units for u/{}", units.len(), collection);

        let mut ids = Vec::with_capacity(units.len());
        for unit in units {
            let embedding = ErrorRecovery::recover(|| self.embedder.embed(&unit.text)).await?;
            debug!("Embedded {} ({} dimensions)", unit.id, embedding.len());

            self.index
                .upsert(
                    &collection,
                    &IndexEntry {
                        id: unit.id.clone(),
                        document: unit.text,
                        embedding,
                        metadata: unit.metadata,
                    },
                )
                .await?;
            ids.push(unit.id);
        }

        let pruned = self.index.retain_only(&collection, &ids).await?;
        info!(
            "Indexed {} entries for u/{} ({} pruned)",
            ids.len(),
            collection,
            pruned
        );

        Ok(IndexReport {
            collection,
            upserted: ids.len(),
            pruned,
        })
    }
}
