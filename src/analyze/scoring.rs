//! Content-quality components. Every function returns a value in [0,1].
//!
//! content = 0.4·length + 0.4·keywords + 0.2·links
//! overall = 0.5·interest + 0.5·content

pub const W_LENGTH: f64 = 0.4;
pub const W_KEYWORDS: f64 = 0.4;
pub const W_LINKS: f64 = 0.2;
pub const W_INTEREST: f64 = 0.5;
pub const W_CONTENT: f64 = 0.5;

/// Score used when there is nothing to judge (no links, no interests).
pub const NEUTRAL: f64 = 0.5;

/// Discrete buckets over character count.
pub fn length_score(chars: usize) -> f64 {
    match chars {
        n if n > 2000 => 1.0,
        n if n > 1000 => 0.8,
        n if n > 500 => 0.6,
        n if n > 200 => 0.4,
        _ => 0.2,
    }
}

/// Share of vocabulary terms found in `text_lower`. Terms must be lowercase.
pub fn keyword_score(text_lower: &str, vocabulary: &[String]) -> f64 {
    if vocabulary.is_empty() {
        return 0.0;
    }
    let found = vocabulary
        .iter()
        .filter(|k| text_lower.contains(k.as_str()))
        .count();
    found as f64 / vocabulary.len() as f64
}

/// External share of all links, neutral when there are none.
pub fn link_score(external: usize, total: usize) -> f64 {
    if total == 0 {
        return NEUTRAL;
    }
    (external.min(total)) as f64 / total as f64
}

/// A phrase counts when at least half of its words occur in `text_lower`.
pub fn interest_score(text_lower: &str, interests: &[String]) -> f64 {
    if interests.is_empty() {
        return NEUTRAL;
    }
    let matched = interests
        .iter()
        .filter(|phrase| {
            let words: Vec<String> = phrase
                .split_whitespace()
                .map(|w| w.to_lowercase())
                .collect();
            let hits = words.iter().filter(|w| text_lower.contains(w.as_str())).count();
            hits as f64 >= words.len() as f64 * 0.5
        })
        .count();
    matched as f64 / interests.len() as f64
}

pub fn content_score(length: f64, keywords: f64, links: f64) -> f64 {
    (W_LENGTH * length + W_KEYWORDS * keywords + W_LINKS * links).clamp(0.0, 1.0)
}

pub fn overall_score(interest: f64, content: f64) -> f64 {
    (W_INTEREST * interest + W_CONTENT * content).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_bucket_edges() {
        assert_eq!(length_score(0), 0.2);
        assert_eq!(length_score(200), 0.2);
        assert_eq!(length_score(201), 0.4);
        assert_eq!(length_score(501), 0.6);
        assert_eq!(length_score(1001), 0.8);
        assert_eq!(length_score(2000), 0.8);
        assert_eq!(length_score(2001), 1.0);
    }

    #[test]
    fn neutral_values() {
        assert_eq!(link_score(0, 0), NEUTRAL);
        assert_eq!(interest_score("anything", &[]), NEUTRAL);
        assert_eq!(keyword_score("anything", &[]), 0.0);
    }

    #[test]
    fn half_the_words_is_enough() {
        let interests = vec!["distributed consensus protocols".to_string(), "rust".to_string()];
        // 1 of 3 words: not a match; "rust": match.
        assert_eq!(interest_score("rust and consensus", &interests), 0.5);
        let two = vec!["distributed consensus".to_string()];
        assert_eq!(interest_score("consensus only", &two), 1.0);
    }
}
