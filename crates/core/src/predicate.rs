use crate::error::IngestError;
use crate::keywords::{build_keyword_pattern, KeywordSet};
use crate::path::FieldPath;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// Admission test over a record: every `require` path must hold a non-empty
/// value and every `grep` path must hold a value matching its keywords.
/// Both parts empty is vacuously true.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    require: Vec<FieldPath>,
    grep: Vec<GrepCondition>,
}

#[derive(Debug, Clone)]
struct GrepCondition {
    path: FieldPath,
    pattern: Regex,
}

impl Predicate {
    pub fn new(require: &[String], grep: &BTreeMap<String, KeywordSet>) -> Result<Self, IngestError> {
        let require = require
            .iter()
            .map(|raw| FieldPath::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let grep = grep
            .iter()
            .map(|(raw, keywords)| {
                Ok(GrepCondition {
                    path: FieldPath::parse(raw)?,
                    pattern: build_keyword_pattern(keywords)?,
                })
            })
            .collect::<Result<Vec<_>, IngestError>>()?;

        Ok(Self { require, grep })
    }

    pub fn is_empty(&self) -> bool {
        self.require.is_empty() && self.grep.is_empty()
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.matches_require(record) && self.matches_grep(record)
    }

    fn matches_require(&self, record: &Value) -> bool {
        self.require.iter().all(|path| path.resolves(record, None))
    }

    fn matches_grep(&self, record: &Value) -> bool {
        self.grep
            .iter()
            .all(|condition| condition.path.resolves(record, Some(&condition.pattern)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grep_of(entries: &[(&str, KeywordSet)]) -> BTreeMap<String, KeywordSet> {
        entries
            .iter()
            .map(|(path, keywords)| (path.to_string(), keywords.clone()))
            .collect()
    }

    fn grep_sample() -> Value {
        json!({
            "name": {
                "name2": {"name3": "yep pa"},
                "name4": "pa red pa"
            },
            "surname": "#blue sky"
        })
    }

    #[test]
    fn empty_predicate_admits_anything() -> Result<(), Box<dyn std::error::Error>> {
        let predicate = Predicate::new(&[], &BTreeMap::new())?;
        assert!(predicate.is_empty());
        assert!(predicate.matches(&json!({})));
        assert!(predicate.matches(&json!(null)));
        assert!(predicate.matches(&grep_sample()));
        Ok(())
    }

    #[test]
    fn require_needs_every_path() -> Result<(), Box<dyn std::error::Error>> {
        let record = json!({
            "name": {"name2": {"name3": "yeppa"}, "name4": "yuppi"},
            "surname": "yappi"
        });

        let all_present = ["surname", "name", "name.name2.name3", "name.name4"].map(String::from);
        assert!(Predicate::new(&all_present, &BTreeMap::new())?.matches(&record));

        let one_missing = ["surname", "name", "name.name2.name5", "name.name4"].map(String::from);
        assert!(!Predicate::new(&one_missing, &BTreeMap::new())?.matches(&record));
        Ok(())
    }

    #[test]
    fn require_treats_empty_values_as_missing() -> Result<(), Box<dyn std::error::Error>> {
        let record = json!({"entities": {"urls": []}, "retweeted": false, "text": "hi"});
        let require = ["entities.urls".to_string()];
        assert!(!Predicate::new(&require, &BTreeMap::new())?.matches(&record));
        let require = ["retweeted".to_string()];
        assert!(!Predicate::new(&require, &BTreeMap::new())?.matches(&record));
        Ok(())
    }

    #[test]
    fn nested_grep_matches_on_word_boundaries() -> Result<(), Box<dyn std::error::Error>> {
        let record = grep_sample();

        let single = grep_of(&[("name.name2.name3", KeywordSet::many(["yep", "blue", "red"]))]);
        assert!(Predicate::new(&[], &single)?.matches(&record));

        let several = grep_of(&[
            ("name.name2.name3", KeywordSet::many(["yep", "blue", "red"])),
            ("name.name4", KeywordSet::one("red")),
            ("surname", KeywordSet::many(["blue"])),
        ]);
        assert!(Predicate::new(&[], &several)?.matches(&record));

        let partial_word = grep_of(&[("name.name2.name3", KeywordSet::many(["ye", "blue", "red"]))]);
        assert!(!Predicate::new(&[], &partial_word)?.matches(&record));
        Ok(())
    }

    #[test]
    fn grep_on_missing_path_fails() -> Result<(), Box<dyn std::error::Error>> {
        let grep = grep_of(&[("name.name9", KeywordSet::one("pa"))]);
        assert!(!Predicate::new(&[], &grep)?.matches(&grep_sample()));
        Ok(())
    }

    #[test]
    fn grep_without_keywords_checks_presence() -> Result<(), Box<dyn std::error::Error>> {
        let grep = grep_of(&[("text", KeywordSet(Vec::new()))]);
        let predicate = Predicate::new(&[], &grep)?;

        assert!(predicate.matches(&json!({"text": "hi"})));
        assert!(predicate.matches(&json!({"text": 12})));
        assert!(!predicate.matches(&json!({"text": ""})));
        assert!(!predicate.matches(&json!({"text": ["hi"]})));
        assert!(!predicate.matches(&json!({"user": "hi"})));
        Ok(())
    }

    #[test]
    fn require_and_grep_combine_with_and() -> Result<(), Box<dyn std::error::Error>> {
        let record = grep_sample();
        let grep = grep_of(&[("surname", KeywordSet::one("sky"))]);

        assert!(Predicate::new(&["name.name4".to_string()], &grep)?.matches(&record));
        assert!(!Predicate::new(&["missing".to_string()], &grep)?.matches(&record));
        Ok(())
    }

    #[test]
    fn repeated_evaluation_is_stable() -> Result<(), Box<dyn std::error::Error>> {
        let grep = grep_of(&[("name.name4", KeywordSet::one("red"))]);
        let predicate = Predicate::new(&[], &grep)?;
        let hit = grep_sample();
        let miss = json!({"name": {"name4": "reddish"}});

        for _ in 0..3 {
            assert!(predicate.matches(&hit));
            assert!(!predicate.matches(&miss));
        }
        Ok(())
    }

    #[test]
    fn zero_segment_paths_are_configuration_errors() {
        let result = Predicate::new(&["...".to_string()], &BTreeMap::new());
        assert!(matches!(result, Err(IngestError::Configuration(_))));

        let grep = grep_of(&[("", KeywordSet::one("x"))]);
        assert!(matches!(
            Predicate::new(&[], &grep),
            Err(IngestError::Configuration(_))
        ));
    }
}
