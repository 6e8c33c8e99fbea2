use crate::emotions::aggregate_emotions;
use crate::keyword_traits::score_keyword_traits;
use chrono::Utc;
use inference::{EmotionClassifier, TraitClassifier};
use persona_core::{
    AnalysisReport, CoreError, ErrorRecovery, ExportDocument, PassStatus, PassSummary,
    TraitScores,
};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub report: AnalysisReport,
    /// The export with per-item emotions attached. Equal to the input when
    /// the emotion pass failed.
    pub annotated: ExportDocument,
}

/// Runs the three analysis passes over one export. Each pass is isolated:
/// a failure is logged, marked in [`PassSummary`] and replaced by an empty
/// result.
pub struct AnalysisOrchestrator<'a, T, E> {
    traits: &'a T,
    emotions: &'a E,
}

fn status<T>(pass: &str, result: Result<T, CoreError>) -> (Option<T>, PassStatus) {
    match result {
        Ok(value) => (Some(value), PassStatus::Completed),
        Err(e) => {
            warn!("Analysis pass '{}' failed: {}", pass, e);
            (
                None,
                PassStatus::Failed {
                    reason: e.to_string(),
                },
            )
        }
    }
}

impl<'a, T: TraitClassifier, E: EmotionClassifier> AnalysisOrchestrator<'a, T, E> {
    pub fn new(traits: &'a T, emotions: &'a E) -> Self {
        Self { traits, emotions }
    }

    pub async fn run(&self, document: &ExportDocument) -> AnalysisOutcome {
        let username = document.username().to_string();
        info!("Analyzing u/{}", username);
        let text = document.combined_text();

        let type_indicator = score_keyword_traits(
            &text,
            document.user_info.link_karma,
            document.user_info.comment_karma,
        );
        info!("Keyword type for u/{}: {}", username, type_indicator.code);

        let (big_five, big_five_status) = status("big_five", self.big_five(&text).await);
        let (emotion_pass, emotion_status) = status(
            "community_emotions",
            aggregate_emotions(self.emotions, document).await,
        );

        let (annotated, community_emotions) = match emotion_pass {
            Some(pass) => (pass.document, pass.summaries),
            None => (document.clone(), Vec::new()),
        };

        AnalysisOutcome {
            report: AnalysisReport {
                username,
                generated_at: Utc::now(),
                type_indicator,
                big_five: big_five.unwrap_or_default(),
                community_emotions,
                passes: PassSummary {
                    keyword_traits: PassStatus::Completed,
                    big_five: big_five_status,
                    community_emotions: emotion_status,
                },
            },
            annotated,
        }
    }

    async fn big_five(&self, text: &str) -> Result<TraitScores, CoreError> {
        if text.trim().is_empty() {
            return Ok(TraitScores::new());
        }
        ErrorRecovery::recover(|| self.traits.classify_traits(text)).await
    }
}
