use crate::round_to;
use indexmap::IndexMap;
use persona_core::{DimensionScores, TypeIndicator};
use std::collections::HashMap;

/// Keywords per pole, in dimension order. The first pole of each pair wins a
/// tied dimension. A keyword may appear under more than one pole.
///
/// Keywords are looked up as whole tokens, so entries containing a space or a
/// hyphen never match tokenized text.
pub const TRAIT_KEYWORDS: [(&str, &[&str]); 8] = [
    (
        "E",
        &[
            "social", "outgoing", "talkative", "lively", "active", "party", "friends", "chatty",
            "extrovert", "hangout", "crowd", "fun", "vibe", "bubbly",
        ],
    ),
    (
        "I",
        &[
            "quiet", "alone", "introverted", "reserved", "solitary", "reflective",
            "introspective", "shy", "lowkey", "chill", "private", "solo", "withdrawn",
            "thoughtful",
        ],
    ),
    (
        "S",
        &[
            "facts", "details", "practical", "realistic", "hands-on", "experience", "real",
            "concrete", "grounded", "traditional", "literal", "specific", "common sense",
        ],
    ),
    (
        "N",
        &[
            "ideas", "concepts", "future", "abstract", "intuitive", "theoretical", "big-picture",
            "vision", "imagine", "possibilities", "dream", "creative", "innovative",
            "open-minded",
        ],
    ),
    (
        "T",
        &[
            "logic", "reasoning", "objective", "analytical", "rational", "decisions", "facts",
            "debate", "critical", "truth", "evidence", "skeptic", "cold", "direct", "fair",
        ],
    ),
    (
        "F",
        &[
            "feelings", "compassion", "emotions", "subjective", "personal", "harmony", "values",
            "caring", "empathy", "warm", "support", "understand", "sensitive", "kind",
        ],
    ),
    (
        "J",
        &[
            "organized", "structured", "planning", "decisive", "predictable", "control",
            "scheduled", "rule", "neat", "on time", "planner", "prepared", "early",
            "responsible",
        ],
    ),
    (
        "P",
        &[
            "flexible", "adaptable", "spontaneous", "open", "improvised", "curious", "chill",
            "go with the flow", "last minute", "laid back", "unplanned", "easygoing",
            "open-ended",
        ],
    ),
];

/// Lowercased runs of letters, digits and underscores.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Score `text` against the keyword sets and adjust by karma.
///
/// `(link_karma + comment_karma) / 1000` is added to E and taken from I; half
/// of it is added to N and taken from S. Each dimension's net score is the
/// first pole minus the second, and a net score of zero or more picks the
/// first pole. Scores are rounded to 3 decimals.
pub fn score_keyword_traits(text: &str, link_karma: i64, comment_karma: i64) -> TypeIndicator {
    let tokens = tokenize(text);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let mut poles: IndexMap<String, f64> = TRAIT_KEYWORDS
        .iter()
        .map(|(pole, keywords)| {
            let hits: usize = keywords
                .iter()
                .map(|keyword| counts.get(keyword).copied().unwrap_or(0))
                .sum();
            (pole.to_string(), hits as f64)
        })
        .collect();

    let adjustment = (link_karma + comment_karma) as f64 / 1000.0;
    adjust(&mut poles, "E", adjustment);
    adjust(&mut poles, "I", -adjustment);
    adjust(&mut poles, "N", 0.5 * adjustment);
    adjust(&mut poles, "S", -0.5 * adjustment);

    let net = |first: &str, second: &str| round_to(pole(&poles, first) - pole(&poles, second), 3);
    let scores = DimensionScores {
        extraversion_introversion: net("E", "I"),
        sensing_intuition: net("S", "N"),
        thinking_feeling: net("T", "F"),
        judging_perceiving: net("J", "P"),
    };

    let code: String = [
        (scores.extraversion_introversion, 'E', 'I'),
        (scores.sensing_intuition, 'S', 'N'),
        (scores.thinking_feeling, 'T', 'F'),
        (scores.judging_perceiving, 'J', 'P'),
    ]
    .iter()
    .map(|&(score, first, second)| if score >= 0.0 { first } else { second })
    .collect();

    for value in poles.values_mut() {
        *value = round_to(*value, 3);
    }

    TypeIndicator {
        code,
        scores,
        pole_scores: poles,
    }
}

fn adjust(poles: &mut IndexMap<String, f64>, pole: &str, delta: f64) {
    if let Some(score) = poles.get_mut(pole) {
        *score += delta;
    }
}

fn pole(poles: &IndexMap<String, f64>, pole: &str) -> f64 {
    poles.get(pole).copied().unwrap_or(0.0)
}
