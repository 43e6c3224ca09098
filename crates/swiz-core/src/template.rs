//! Token grammars used in configuration values.
//!
//! Two separate grammars exist:
//!
//! - **Replace tokens**: a whole parameter value wrapped in `{{` / `}}`,
//!   e.g. `{{boot.VpcId}}`, resolved against the parameter store.
//! - **Name templates**: `{{identifier:maxLength}}` tokens embedded anywhere in
//!   a string, e.g. the naming scheme `{{env_name:32}}-{{stack_name:32}}`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

const TOKEN_OPEN: &str = "{{";
const TOKEN_CLOSE: &str = "}}";

/// True iff the whole value is wrapped in `{{` / `}}`.
pub fn is_replace_token(value: &str) -> bool {
    value.len() >= TOKEN_OPEN.len() + TOKEN_CLOSE.len()
        && value.starts_with(TOKEN_OPEN)
        && value.ends_with(TOKEN_CLOSE)
}

/// Strip the delimiters from a replace token; other values pass through.
pub fn clean_token(value: &str) -> &str {
    if is_replace_token(value) {
        &value[TOKEN_OPEN.len()..value.len() - TOKEN_CLOSE.len()]
    } else {
        value
    }
}

fn name_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{(\w+):(\d+)\}\}").expect("name token pattern is valid"))
}

/// Substitute every `{{identifier:maxLength}}` token in `template`.
///
/// Values are truncated to at most `maxLength` characters; shorter values are
/// not padded. Unknown identifiers substitute the empty string.
pub fn parse_template_tokens(template: &str, values: &BTreeMap<&str, &str>) -> String {
    name_token_pattern()
        .replace_all(template, |caps: &Captures<'_>| {
            let value = values.get(&caps[1]).copied().unwrap_or_default();
            let max_len = caps[2].parse::<usize>().unwrap_or(usize::MAX);
            value.chars().take(max_len).collect::<String>()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values<'a>(pairs: &[(&'a str, &'a str)]) -> BTreeMap<&'a str, &'a str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_is_replace_token() {
        assert!(is_replace_token("{{boot.Arn}}"));
        assert!(is_replace_token("{{}}"));
        assert!(!is_replace_token("{{boot.Arn}"));
        assert!(!is_replace_token("prefix-{{boot.Arn}}-suffix"));
        assert!(!is_replace_token("{}}"));
        assert!(!is_replace_token("literal"));
    }

    #[test]
    fn test_clean_token() {
        assert_eq!(clean_token("{{boot.Arn}}"), "boot.Arn");
        assert_eq!(clean_token("literal"), "literal");
    }

    #[test]
    fn test_truncates_and_does_not_pad() {
        let out = parse_template_tokens(
            "{{env_name:4}}-{{stack_name:4}}",
            &values(&[("env_name", "Production"), ("stack_name", "Web")]),
        );
        assert_eq!(out, "Prod-Web");
    }

    #[test]
    fn test_unknown_identifier_is_empty() {
        let out = parse_template_tokens(
            "{{region:8}}-{{stack_name:8}}",
            &values(&[("stack_name", "web")]),
        );
        assert_eq!(out, "-web");
    }

    #[test]
    fn test_non_matching_text_untouched() {
        let out = parse_template_tokens("{{env_name}}-x", &values(&[("env_name", "dev")]));
        assert_eq!(out, "{{env_name}}-x");
    }

    #[test]
    fn test_truncation_is_char_based() {
        let out = parse_template_tokens("{{env_name:2}}", &values(&[("env_name", "ééé")]));
        assert_eq!(out, "éé");
    }
}
