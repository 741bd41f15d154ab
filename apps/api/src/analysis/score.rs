//! Match-score heuristic over free-form model text.
//!
//! The model is never asked for structured output, so the score is the first
//! 1–3 digit number followed by `%`. First match wins; nothing checks that the
//! number is actually the match score.

use std::sync::OnceLock;

use regex::Regex;

/// Used when the text carries no percentage at all.
pub const DEFAULT_MATCH_PERCENTAGE: u32 = 50;

fn percentage_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{1,3})%").expect("percentage pattern is valid"))
}

/// Extracts the match percentage from `text`, defaulting to 50.
pub fn extract_match_percentage(text: &str) -> u32 {
    percentage_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(DEFAULT_MATCH_PERCENTAGE)
}

/// Fraction for a progress bar. Values above 100 are clamped.
pub fn score_fraction(percentage: u32) -> f32 {
    percentage.min(100) as f32 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_percentage_from_sentence() {
        assert_eq!(
            extract_match_percentage("Overall match: 73% based on skills overlap"),
            73
        );
    }

    #[test]
    fn test_defaults_to_50_without_percent_sign() {
        assert_eq!(extract_match_percentage("Strong candidate, score 8 of 10"), 50);
        assert_eq!(extract_match_percentage(""), 50);
    }

    #[test]
    fn test_first_percentage_wins() {
        // Known limitation: an unrelated figure earlier in the text is taken as the score.
        let text = "Reduced costs by 30%. Overall match: 85%.";
        assert_eq!(extract_match_percentage(text), 30);
    }

    #[test]
    fn test_handles_single_digit_and_hundred() {
        assert_eq!(extract_match_percentage("Match: 5%"), 5);
        assert_eq!(extract_match_percentage("Match: 100%"), 100);
    }

    #[test]
    fn test_long_number_keeps_trailing_three_digits() {
        // Leftmost match that satisfies \d{1,3}% starts one digit in.
        assert_eq!(extract_match_percentage("1250% growth"), 250);
    }

    #[test]
    fn test_percent_with_space_is_not_a_match() {
        assert_eq!(extract_match_percentage("about 60 % overall"), 50);
    }

    #[test]
    fn test_score_fraction_clamps() {
        assert!((score_fraction(73) - 0.73).abs() < f32::EPSILON);
        assert!((score_fraction(250) - 1.0).abs() < f32::EPSILON);
        assert_eq!(score_fraction(0), 0.0);
    }
}
