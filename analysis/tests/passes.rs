use analysis::{aggregate_emotions, render_report, AnalysisOrchestrator};
use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use inference::{EmotionClassifier, TraitClassifier, UnavailableModels};
use persona_core::{
    ClassifierError, CommentGroup, CommentRecord, CommunityInfo, CoreError, EmotionScores,
    ExportDocument, PassStatus, PostInfo, PostRecord, SummaryStats, TraitScores, UserProfile,
};
use std::sync::Mutex;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn inference_failed() -> CoreError {
    CoreError::Classifier(ClassifierError::InferenceFailed {
        model: "fake".to_string(),
        reason: "boom".to_string(),
    })
}

struct FakeTraits {
    fail: bool,
}

impl TraitClassifier for FakeTraits {
    async fn classify_traits(&self, _text: &str) -> Result<TraitScores, CoreError> {
        if self.fail {
            return Err(inference_failed());
        }
        Ok([
            ("Extroversion", 0.12),
            ("Neuroticism", -0.4),
            ("Agreeableness", 0.33),
            ("Conscientiousness", 0.05),
            ("Openness", 0.71),
        ]
        .into_iter()
        .map(|(name, score)| (name.to_string(), score))
        .collect())
    }
}

/// Scores texts by keyword: "happy" is joyful, "angry" angry, "boom" fails.
#[derive(Default)]
struct FakeEmotions {
    fail_all: bool,
    seen: Mutex<Vec<String>>,
}

impl EmotionClassifier for FakeEmotions {
    async fn classify_emotions(&self, text: &str) -> Result<EmotionScores, CoreError> {
        self.seen.lock().unwrap().push(text.to_string());
        if self.fail_all || text.contains("boom") {
            return Err(inference_failed());
        }
        let (joy, anger) = if text.contains("angry") { (0.2, 0.8) } else { (0.9, 0.1) };
        Ok([("joy".to_string(), joy), ("anger".to_string(), anger)]
            .into_iter()
            .collect())
    }
}

fn post(title: &str, body: &str, subreddit: &str) -> PostRecord {
    PostRecord {
        post_info: PostInfo {
            title: title.to_string(),
            body: body.to_string(),
            created_at: at(1_690_000_000),
            reddit_url: format!("https://www.reddit.com/r/{}/comments/x/", subreddit),
            flair: None,
        },
        subreddit: subreddit.to_string(),
        emotions: None,
    }
}

fn group(subreddit: &str, bodies: &[&str]) -> CommentGroup {
    CommentGroup {
        post_info: post("parent", "", subreddit).post_info,
        subreddit: subreddit.to_string(),
        comments: bodies
            .iter()
            .enumerate()
            .map(|(i, body)| CommentRecord {
                body: body.to_string(),
                created_at: at(1_700_000_000 + i as i64),
                url: format!("https://www.reddit.com/r/{}/comments/x/c{}/", subreddit, i),
                emotions: None,
            })
            .collect(),
    }
}

fn document(posts: Vec<PostRecord>, comments: Vec<CommentGroup>) -> ExportDocument {
    let mut communities: IndexMap<String, CommunityInfo> = IndexMap::new();
    for name in posts
        .iter()
        .map(|p| p.subreddit.clone())
        .chain(comments.iter().flat_map(|g| vec![g.subreddit.clone(); g.comments.len()]))
    {
        communities
            .entry(name.clone())
            .or_insert_with(|| CommunityInfo::placeholder(&name))
            .interactions_count += 1;
    }

    ExportDocument {
        exported_at: at(1_700_100_000),
        user_info: UserProfile {
            username: "someone".to_string(),
            created_at: at(1_600_000_000),
            link_karma: 0,
            comment_karma: 0,
            trophies: vec![],
            icon_img: None,
            profile_url: UserProfile::profile_url_for("someone"),
        },
        summary: SummaryStats {
            total_posts: posts.len(),
            total_comments: comments.iter().map(|g| g.comments.len()).sum(),
            unique_subreddits: communities.len(),
            most_active_subreddit: communities.keys().next().cloned(),
            account_age_days: 1158,
        },
        subreddits_master: communities,
        comments,
        posts,
    }
}

#[tokio::test]
async fn test_communities_without_samples_are_excluded() {
    let doc = document(
        vec![post("Link post", "", "pics"), post("t", "so happy", "rust")],
        vec![
            group("rust", &["angry about lifetimes", "happy again", "happy"]),
            group("silent", &["   ", ""]),
        ],
    );
    let classifier = FakeEmotions::default();

    let pass = aggregate_emotions(&classifier, &doc).await.unwrap();

    let names: Vec<_> = pass.summaries.iter().map(|s| s.subreddit.as_str()).collect();
    assert_eq!(names, vec!["rust", "pics"]);

    let rust = &pass.summaries[0];
    assert_eq!(rust.interactions_count, 4);
    assert_eq!(rust.samples, 4);
    assert_eq!(rust.most_common_top_emotion, "joy");
    assert_eq!(rust.average_emotions["anger"], 0.275);

    // blank comments are never sent; link posts fall back to the title
    let seen = classifier.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 5);
    assert!(seen.contains(&"Link post".to_string()));

    let silent = &pass.document.comments[1].comments[0];
    assert_eq!(silent.emotions.as_ref().map(|e| e.len()), Some(0));
    assert!(pass.document.posts.iter().all(|p| p.emotions.is_some()));
}

#[tokio::test]
async fn test_single_item_failure_is_skipped() {
    let doc = document(
        vec![],
        vec![group("rust", &["boom", "happy"])],
    );
    let pass = aggregate_emotions(&FakeEmotions::default(), &doc).await.unwrap();

    assert_eq!(pass.summaries.len(), 1);
    assert_eq!(pass.summaries[0].samples, 1);
    assert_eq!(pass.summaries[0].average_emotions["joy"], 0.9);
}

#[tokio::test]
async fn test_failed_passes_fall_back_to_defaults() {
    let doc = document(
        vec![post("t", "social outgoing friends", "rust")],
        vec![group("rust", &["happy"])],
    );
    let traits = FakeTraits { fail: true };
    let emotions = FakeEmotions {
        fail_all: true,
        ..Default::default()
    };

    let outcome = AnalysisOrchestrator::new(&traits, &emotions).run(&doc).await;
    let report = &outcome.report;

    assert_eq!(report.passes.keyword_traits, PassStatus::Completed);
    assert!(report.type_indicator.code.starts_with('E'));
    assert!(report.big_five.is_empty());
    assert!(matches!(report.passes.big_five, PassStatus::Failed { .. }));
    assert!(report.community_emotions.is_empty());
    assert!(matches!(report.passes.community_emotions, PassStatus::Failed { .. }));
    assert_eq!(outcome.annotated, doc);

    let text = render_report(report);
    assert!(text.contains("unavailable"));
}

#[tokio::test]
async fn test_full_analysis() {
    let doc = document(
        vec![post("t", "quiet evening alone", "books")],
        vec![group("books", &["happy to read"])],
    );
    let traits = FakeTraits { fail: false };
    let emotions = FakeEmotions::default();

    let outcome = AnalysisOrchestrator::new(&traits, &emotions).run(&doc).await;
    let report = &outcome.report;

    assert_eq!(report.username, "someone");
    assert!(report.type_indicator.code.starts_with('I'));
    let traits: Vec<_> = report.big_five.keys().map(String::as_str).collect();
    assert_eq!(
        traits,
        vec!["Extroversion", "Neuroticism", "Agreeableness", "Conscientiousness", "Openness"]
    );
    assert!(report.passes.big_five.is_completed());
    assert_eq!(report.community_emotions.len(), 1);
    assert_eq!(report.community_emotions[0].interactions_count, 2);
    assert!(outcome.annotated.comments[0].comments[0].emotions.is_some());
}

#[tokio::test]
async fn test_empty_export_needs_no_classifier_calls() {
    let doc = document(vec![], vec![]);
    let traits = FakeTraits { fail: true };
    let emotions = FakeEmotions::default();

    let outcome = AnalysisOrchestrator::new(&traits, &emotions).run(&doc).await;

    assert!(outcome.report.passes.big_five.is_completed());
    assert!(outcome.report.passes.community_emotions.is_completed());
    assert_eq!(outcome.report.type_indicator.code, "ESTJ");
    assert!(emotions.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_keyword_pass_survives_missing_models() {
    let doc = document(
        vec![post("t", "social outgoing friends", "rust")],
        vec![group("rust", &["happy"])],
    );
    let models = UnavailableModels::new("Required configuration field 'inference.api_token' is missing.");

    let outcome = AnalysisOrchestrator::new(&models, &models).run(&doc).await;
    let report = &outcome.report;

    assert!(report.passes.keyword_traits.is_completed());
    assert!(report.type_indicator.code.starts_with('E'));
    for status in [&report.passes.big_five, &report.passes.community_emotions] {
        match status {
            PassStatus::Failed { reason } => assert!(reason.contains("inference.api_token")),
            other => panic!("expected failed pass, got {:?}", other),
        }
    }

    let text = render_report(report);
    assert!(text.contains(&report.type_indicator.code));
}
