// src/analyze/text.rs
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("anchor selector"));

/// Visible text of an HTML fragment: entities decoded, tags dropped,
/// whitespace collapsed and trimmed.
pub fn visible_text(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    let joined = doc.root_element().text().collect::<Vec<_>>().join(" ");
    RE_WS.replace_all(&joined, " ").trim().to_string()
}

/// One entry per `<a>` element, holding its `href` when present.
pub fn anchor_targets(html: &str) -> Vec<Option<String>> {
    let doc = Html::parse_fragment(html);
    doc.select(&ANCHOR)
        .map(|a| a.value().attr("href").map(|h| h.trim().to_string()))
        .collect()
}

/// `http://` or `https://`, case-insensitive.
pub fn is_external(href: &str) -> bool {
    let lower = href.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_entities() {
        let s = "<p>Hello&nbsp;<b>world</b></p>\n\n<p>again &amp; again</p>";
        assert_eq!(visible_text(s), "Hello world again & again");
    }

    #[test]
    fn bare_angle_brackets_are_text() {
        assert_eq!(
            visible_text("if a < b and c > d then analysis"),
            "if a < b and c > d then analysis"
        );
        assert_eq!(visible_text("1 &lt; 2 <i>always</i>"), "1 < 2 always");
    }

    #[test]
    fn finds_anchor_hrefs() {
        let s = r#"<a href="https://x.test">x</a> <A HREF='/rel'>r</A> <a name="top">t</a> <abbr>no</abbr> <a href=http://bare.test>b</a>"#;
        let got = anchor_targets(s);
        assert_eq!(
            got,
            vec![
                Some("https://x.test".to_string()),
                Some("/rel".to_string()),
                None,
                Some("http://bare.test".to_string()),
            ]
        );
    }

    #[test]
    fn anchor_hrefs_are_entity_decoded() {
        let got = anchor_targets(r#"<p>see <a href="https://x.test/?a=1&amp;b=2">it</a></p>"#);
        assert_eq!(got, vec![Some("https://x.test/?a=1&b=2".to_string())]);
    }

    #[test]
    fn external_means_http_scheme() {
        assert!(is_external("https://a.test"));
        assert!(is_external("HTTP://a.test"));
        assert!(!is_external("/local"));
        assert!(!is_external("mailto:x@a.test"));
    }
}
