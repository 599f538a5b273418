// src/analyze/mod.rs
//! Deterministic content scorer: item text + keyword vocabulary + interest phrases.

pub mod interests;
pub mod scoring;
pub mod text;

use anyhow::Result;
use serde::Serialize;

use crate::config::AnalyzerConfig;
use crate::model::ContentItem;

pub use crate::analyze::interests::load_interests;

/// Quality-signal vocabulary used when no override is configured.
pub const DEFAULT_KEYWORDS: [&str; 16] = [
    "research",
    "study",
    "analysis",
    "guide",
    "tutorial",
    "introduction",
    "review",
    "comparison",
    "best practices",
    "how to",
    "explained",
    "deep dive",
    "architecture",
    "performance",
    "security",
    "scalability",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreComponents {
    pub length: f64,
    pub keywords: f64,
    pub links: f64,
}

/// Derived score of one item. All fields lie in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleScore {
    pub interest: f64,
    pub content: f64,
    pub overall: f64,
    pub components: ScoreComponents,
}

impl ArticleScore {
    /// Human-readable reasons for the score: one per strong signal, or a
    /// single generic line when neither sub-score stands out.
    pub fn reasons(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.interest >= 0.7 {
            out.push("Strongly matches your interests");
        } else if self.interest >= 0.5 {
            out.push("Moderately aligns with your interests");
        }
        if self.content >= 0.7 {
            out.push("High-quality content with detailed information");
        } else if self.content >= 0.5 {
            out.push("Good content quality");
        }
        if out.is_empty() {
            out.push("Balanced combination of relevance and quality");
        }
        out.into_iter().map(String::from).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    keywords: Vec<String>,
    interests: Vec<String>,
}

impl Default for ContentAnalyzer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ContentAnalyzer {
    /// Default vocabulary with the given interest phrases.
    pub fn new(interests: Vec<String>) -> Self {
        Self::with_keywords(DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(), interests)
    }

    pub fn with_keywords(keywords: Vec<String>, interests: Vec<String>) -> Self {
        let keywords = interests::clean_list(keywords)
            .into_iter()
            .map(|k| k.to_lowercase())
            .collect();
        Self {
            keywords,
            interests: interests::clean_list(interests),
        }
    }

    /// Reads the interests file once; an empty keyword override keeps the defaults.
    pub fn from_config(cfg: &AnalyzerConfig) -> Result<Self> {
        let interests = match cfg.interests_path.as_deref() {
            Some(p) => load_interests(p)?,
            None => Vec::new(),
        };
        let analyzer = match cfg.keywords.as_ref().filter(|k| !k.is_empty()) {
            Some(k) => Self::with_keywords(k.clone(), interests),
            None => Self::new(interests),
        };
        tracing::info!(
            target: "config",
            keywords = analyzer.keywords.len(),
            interests = analyzer.interests.len(),
            "content analyzer ready"
        );
        Ok(analyzer)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn interests(&self) -> &[String] {
        &self.interests
    }

    /// Scores the body when it is non-empty, the summary otherwise.
    pub fn analyze(&self, title: &str, summary: &str, body: Option<&str>) -> ArticleScore {
        let source = match body {
            Some(b) if !b.trim().is_empty() => b,
            _ => summary,
        };
        let visible = text::visible_text(source);
        let lower = visible.to_lowercase();

        let anchors = text::anchor_targets(source);
        let external = anchors
            .iter()
            .filter(|href| href.as_deref().is_some_and(text::is_external))
            .count();

        let length = scoring::length_score(visible.chars().count());
        let keywords = scoring::keyword_score(&lower, &self.keywords);
        let links = scoring::link_score(external, anchors.len());
        let content = scoring::content_score(length, keywords, links);

        let interest_text = format!("{} {}", title, visible).to_lowercase();
        let interest = scoring::interest_score(&interest_text, &self.interests);

        ArticleScore {
            interest,
            content,
            overall: scoring::overall_score(interest, content),
            components: ScoreComponents {
                length,
                keywords,
                links,
            },
        }
    }

    pub fn analyze_item(&self, item: &ContentItem) -> ArticleScore {
        self.analyze(&item.title, &item.description, item.content.as_deref())
    }
}
