// src/analyze/interests.rs
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Load interest phrases. `.toml` expects `interests = [...]`, `.json` a
/// string array; anything else is one phrase per line with `#` comments.
pub fn load_interests(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading interests from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let parsed = match ext.as_str() {
        "toml" => parse_toml(&content),
        "json" => parse_json(&content),
        _ => Ok(parse_lines(&content)),
    };
    parsed.with_context(|| format!("parsing interests in {}", path.display()))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlInterests {
        interests: Vec<String>,
    }
    let v: TomlInterests = toml::from_str(s)?;
    Ok(clean_list(v.interests))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

fn parse_lines(s: &str) -> Vec<String> {
    clean_list(
        s.lines()
            .filter(|l| !l.trim_start().starts_with('#'))
            .map(str::to_string)
            .collect(),
    )
}

/// Trim, drop empties, keep the first occurrence of each phrase.
pub fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_trim_and_dedup() {
        let toml = r#"interests = [" rust async ", "", "databases", "databases"]"#;
        assert_eq!(
            parse_toml(toml).unwrap(),
            vec!["rust async".to_string(), "databases".to_string()]
        );
        let json = r#"["systems architecture", "  ", "Go"]"#;
        assert_eq!(
            parse_json(json).unwrap(),
            vec!["systems architecture".to_string(), "Go".to_string()]
        );
        let text = "# my topics\nsystems architecture\n\n  compilers  \n#ignored\ncompilers\n";
        assert_eq!(
            parse_lines(text),
            vec!["systems architecture".to_string(), "compilers".to_string()]
        );
    }

    #[test]
    fn file_extension_selects_format() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("interests.json");
        fs::write(&p, r#"["a b"]"#).unwrap();
        assert_eq!(load_interests(&p).unwrap(), vec!["a b".to_string()]);

        let bad = dir.path().join("interests.toml");
        fs::write(&bad, "not = [valid").unwrap();
        assert!(load_interests(&bad).is_err());

        assert!(load_interests(&dir.path().join("missing.txt")).is_err());
    }
}
