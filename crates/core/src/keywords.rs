use crate::error::IngestError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, OneOrMany};

/// One or many keywords. Each keyword is used as a pattern fragment, so
/// regex syntax inside a keyword is honored.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordSet(#[serde_as(as = "OneOrMany<_>")] pub Vec<String>);

impl KeywordSet {
    pub fn one(keyword: impl Into<String>) -> Self {
        Self(vec![keyword.into()])
    }

    pub fn many<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keywords.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pattern source: `((^|\s|\W)kw\b)` per keyword, alternated in input order.
    pub fn pattern_source(&self) -> String {
        self.0
            .iter()
            .map(|keyword| format!(r"((^|\s|\W){keyword}\b)"))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Compiles keywords into one case-insensitive, word-bounded alternation.
/// An empty set compiles to the empty pattern, which matches any text.
pub fn build_keyword_pattern(keywords: &KeywordSet) -> Result<Regex, IngestError> {
    let pattern = RegexBuilder::new(&keywords.pattern_source())
        .case_insensitive(true)
        .build()?;
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_keyword_is_word_bounded() -> Result<(), Box<dyn std::error::Error>> {
        let pattern = build_keyword_pattern(&KeywordSet::one("pa"))?;
        assert!(pattern.is_match("pa red pa"));
        assert!(!pattern.is_match("paper"));
        assert!(pattern.is_match("#pa"));
        Ok(())
    }

    #[test]
    fn matching_ignores_case() -> Result<(), Box<dyn std::error::Error>> {
        let pattern = build_keyword_pattern(&KeywordSet::one("Blue"))?;
        assert!(pattern.is_match("#BLUE sky"));
        Ok(())
    }

    #[test]
    fn several_keywords_alternate() -> Result<(), Box<dyn std::error::Error>> {
        let keywords = KeywordSet::many(["one", "two", "three"]);
        assert_eq!(
            keywords.pattern_source(),
            r"((^|\s|\W)one\b)|((^|\s|\W)two\b)|((^|\s|\W)three\b)"
        );

        let pattern = build_keyword_pattern(&keywords)?;
        assert!(pattern.is_match("count to two"));
        assert!(!pattern.is_match("someone"));
        Ok(())
    }

    #[test]
    fn same_input_builds_same_pattern() -> Result<(), Box<dyn std::error::Error>> {
        let keywords = KeywordSet::many(["yep", "red"]);
        let first = build_keyword_pattern(&keywords)?;
        let second = build_keyword_pattern(&keywords)?;
        assert_eq!(first.as_str(), second.as_str());
        Ok(())
    }

    #[test]
    fn deserializes_one_or_many() -> Result<(), Box<dyn std::error::Error>> {
        let single: KeywordSet = serde_json::from_str(r#""red""#)?;
        let list: KeywordSet = serde_json::from_str(r#"["red", "blue"]"#)?;
        assert_eq!(single, KeywordSet::one("red"));
        assert_eq!(list, KeywordSet::many(["red", "blue"]));
        Ok(())
    }

    #[test]
    fn empty_keyword_set_matches_any_text() -> Result<(), Box<dyn std::error::Error>> {
        let keywords: KeywordSet = serde_json::from_str("[]")?;
        assert!(keywords.is_empty());

        let pattern = build_keyword_pattern(&keywords)?;
        assert_eq!(pattern.as_str(), "");
        assert!(pattern.is_match("hi"));
        assert!(pattern.is_match("paper"));
        Ok(())
    }

    #[test]
    fn broken_keywords_are_rejected() {
        assert!(matches!(
            build_keyword_pattern(&KeywordSet::one("(unclosed")),
            Err(IngestError::Regex(_))
        ));
    }
}
