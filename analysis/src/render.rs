use persona_core::{AnalysisReport, PassStatus};
use std::fmt::Write;

fn failed_note(status: &PassStatus) -> Option<String> {
    match status {
        PassStatus::Completed => None,
        PassStatus::Failed { reason } => Some(format!("  (unavailable: {})", reason)),
    }
}

/// Plain-text rendering of a report, three sections in pass order.
pub fn render_report(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let scores = &report.type_indicator.scores;

    let _ = writeln!(out, "Personality report for u/{}", report.username);
    let _ = writeln!(out);
    let _ = writeln!(out, "Keyword type indicator: {}", report.type_indicator.code);
    let _ = writeln!(out, "  Extraversion (E) vs Introversion (I): {:.3}", scores.extraversion_introversion);
    let _ = writeln!(out, "  Sensing (S) vs Intuition (N): {:.3}", scores.sensing_intuition);
    let _ = writeln!(out, "  Thinking (T) vs Feeling (F): {:.3}", scores.thinking_feeling);
    let _ = writeln!(out, "  Judging (J) vs Perceiving (P): {:.3}", scores.judging_perceiving);
    let _ = writeln!(out);

    let _ = writeln!(out, "Big Five:");
    if let Some(note) = failed_note(&report.passes.big_five) {
        let _ = writeln!(out, "{}", note);
    }
    for (name, score) in &report.big_five {
        let _ = writeln!(out, "  {}: {:.4}", name, score);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Communities by interactions:");
    if let Some(note) = failed_note(&report.passes.community_emotions) {
        let _ = writeln!(out, "{}", note);
    }
    for (rank, community) in report.community_emotions.iter().enumerate() {
        let _ = writeln!(out, "{}. r/{}", rank + 1, community.subreddit);
        let _ = writeln!(out, "   Interactions: {}", community.interactions_count);
        let _ = writeln!(out, "   Most common top emotion: {}", community.most_common_top_emotion);
        let _ = writeln!(out, "   Average emotions:");
        for (emotion, score) in &community.average_emotions {
            let _ = writeln!(out, "     {}: {:.4}", emotion, score);
        }
    }

    out
}
