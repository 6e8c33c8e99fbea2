//! Personality and emotion analysis over a collected export.
//!
//! Three passes run independently: keyword trait scoring, a pretrained
//! personality classifier and per-community emotion aggregation. A failing
//! pass leaves the others untouched; see [`AnalysisOrchestrator`].

pub mod emotions;
pub mod keyword_traits;
pub mod orchestrator;
pub mod render;

pub use emotions::{aggregate_emotions, EmotionPass};
pub use keyword_traits::{score_keyword_traits, tokenize, TRAIT_KEYWORDS};
pub use orchestrator::{AnalysisOrchestrator, AnalysisOutcome};
pub use render::render_report;

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::round_to;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(-1.23456, 3), -1.235);
        assert_eq!(round_to(2.0, 3), 2.0);
    }
}
