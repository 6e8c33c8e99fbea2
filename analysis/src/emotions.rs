use crate::round_to;
use indexmap::IndexMap;
use inference::EmotionClassifier;
use persona_core::{
    CommunityEmotionSummary, CoreError, EmotionScores, ErrorRecovery, ExportDocument,
};
use tracing::{debug, warn};

/// Output of the emotion pass: the export with every post and comment
/// annotated, plus the per-community summaries ranked by interactions.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionPass {
    pub document: ExportDocument,
    pub summaries: Vec<CommunityEmotionSummary>,
}

#[derive(Default)]
struct CommunityTally {
    sums: IndexMap<String, f64>,
    samples: usize,
    dominant: IndexMap<String, usize>,
}

impl CommunityTally {
    fn add(&mut self, emotions: &EmotionScores) {
        if emotions.is_empty() {
            return;
        }
        for (label, score) in emotions {
            *self.sums.entry(label.clone()).or_insert(0.0) += score;
        }
        self.samples += 1;
        if let Some(label) = dominant_emotion(emotions) {
            *self.dominant.entry(label.to_string()).or_insert(0) += 1;
        }
    }

    fn summarize(self, subreddit: String, interactions_count: u64) -> Option<CommunityEmotionSummary> {
        if self.samples == 0 {
            return None;
        }
        let count = self.samples as f64;
        let average_emotions = self
            .sums
            .into_iter()
            .map(|(label, sum)| (label, round_to(sum / count, 4)))
            .collect();

        Some(CommunityEmotionSummary {
            subreddit,
            average_emotions,
            most_common_top_emotion: most_common(&self.dominant).unwrap_or_default(),
            interactions_count,
            samples: self.samples,
        })
    }
}

/// Highest-scoring label; the first one listed wins a tie.
fn dominant_emotion(emotions: &EmotionScores) -> Option<&str> {
    let mut best: Option<(&str, f64)> = None;
    for (label, &score) in emotions {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((label.as_str(), score)),
        }
    }
    best.map(|(label, _)| label)
}

/// Most frequent label; the first one counted wins a tie.
fn most_common(counter: &IndexMap<String, usize>) -> Option<String> {
    let mut best: Option<(&String, usize)> = None;
    for (label, &count) in counter {
        match best {
            Some((_, top)) if count <= top => {}
            _ => best = Some((label, count)),
        }
    }
    best.map(|(label, _)| label.clone())
}

/// Classify one item. Blank text is never sent and yields an empty map.
async fn classify<C: EmotionClassifier>(
    classifier: &C,
    text: &str,
) -> Result<EmotionScores, CoreError> {
    if text.trim().is_empty() {
        return Ok(EmotionScores::new());
    }
    ErrorRecovery::recover(|| classifier.classify_emotions(text)).await
}

/// Run the emotion classifier over every post and comment and average the
/// scores per community.
///
/// Items whose classification fails are logged and left with an empty map.
/// Communities without a single scored item are left out of the summary. The
/// pass fails only when every attempted classification failed.
pub async fn aggregate_emotions<C: EmotionClassifier>(
    classifier: &C,
    document: &ExportDocument,
) -> Result<EmotionPass, CoreError> {
    let mut annotated = document.clone();
    let mut tallies: IndexMap<String, CommunityTally> = IndexMap::new();
    let mut attempted = 0usize;
    let mut last_error: Option<CoreError> = None;

    let mut score = |text: &str, result: Result<EmotionScores, CoreError>| -> EmotionScores {
        if !text.trim().is_empty() {
            attempted += 1;
        }
        match result {
            Ok(emotions) => emotions,
            Err(e) => {
                warn!("Emotion classification failed, skipping item: {}", e);
                last_error = Some(e);
                EmotionScores::new()
            }
        }
    };

    for post in &mut annotated.posts {
        let text = post.post_info.classifier_text().to_string();
        let emotions = score(&text, classify(classifier, &text).await);
        tallies
            .entry(post.subreddit.clone())
            .or_default()
            .add(&emotions);
        post.emotions = Some(emotions);
    }

    for group in &mut annotated.comments {
        for comment in &mut group.comments {
            let emotions = score(&comment.body, classify(classifier, &comment.body).await);
            tallies
                .entry(group.subreddit.clone())
                .or_default()
                .add(&emotions);
            comment.emotions = Some(emotions);
        }
    }

    if let Some(error) = last_error {
        let failed_all = tallies.values().all(|tally| tally.samples == 0);
        if attempted > 0 && failed_all {
            return Err(error);
        }
    }

    let mut summaries: Vec<CommunityEmotionSummary> = tallies
        .into_iter()
        .filter_map(|(subreddit, tally)| {
            let interactions = document.interactions_for(&subreddit);
            tally.summarize(subreddit, interactions)
        })
        .collect();
    summaries.sort_by(|a, b| b.interactions_count.cmp(&a.interactions_count));

    debug!(
        "Emotion pass scored {} items across {} communities",
        attempted,
        summaries.len()
    );

    Ok(EmotionPass {
        document: annotated,
        summaries,
    })
}
