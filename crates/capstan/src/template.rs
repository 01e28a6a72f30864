//! URI and name templates with `{param}` placeholders.
//!
//! Each placeholder matches exactly one path segment: a non-empty run of
//! characters without `/`. Patterns are anchored to the whole candidate.

use std::collections::BTreeMap;

use regex::Regex;

use crate::types::{CapstanError, CapstanResult};

/// Parameters extracted from a template match, keyed by placeholder name.
pub type TemplateParams = BTreeMap<String, String>;

const SEGMENT_PATTERN: &str = "([^/]+)";

/// A compiled `{param}` template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    source: String,
    parts: Vec<Part>,
    variables: Vec<String>,
    pattern: Regex,
}

#[derive(Debug, Clone)]
enum Part {
    Literal(String),
    Variable(String),
}

impl UriTemplate {
    /// Compile a template string.
    pub fn parse(template: &str) -> CapstanResult<Self> {
        let invalid = |reason: String| CapstanError::InvalidTemplate {
            template: template.to_string(),
            reason,
        };

        let mut parts = Vec::new();
        let mut variables: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(invalid("unclosed '{'".to_string()));
                    }
                    if name.is_empty() {
                        return Err(invalid("empty placeholder".to_string()));
                    }
                    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(invalid(format!("invalid placeholder name '{name}'")));
                    }
                    if variables.contains(&name) {
                        return Err(invalid(format!("duplicate placeholder '{name}'")));
                    }
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    } else if matches!(parts.last(), Some(Part::Variable(_))) {
                        return Err(invalid("adjacent placeholders are ambiguous".to_string()));
                    }
                    variables.push(name.clone());
                    parts.push(Part::Variable(name));
                }
                '}' => return Err(invalid("unmatched '}'".to_string())),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        let mut pattern = String::from("^");
        for part in &parts {
            match part {
                Part::Literal(text) => pattern.push_str(&regex::escape(text)),
                Part::Variable(_) => pattern.push_str(SEGMENT_PATTERN),
            }
        }
        pattern.push('$');

        let pattern = Regex::new(&pattern).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            source: template.to_string(),
            parts,
            variables,
            pattern,
        })
    }

    /// Whether a key contains a `{param}` placeholder.
    pub fn is_template(key: &str) -> bool {
        key.find('{')
            .is_some_and(|open| key[open..].contains('}'))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names in template order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Match a concrete string against the template.
    ///
    /// Returns `None` when the structure differs or an extracted value is
    /// empty or contains `/`.
    pub fn matches(&self, candidate: &str) -> Option<TemplateParams> {
        let captures = self.pattern.captures(candidate)?;
        let mut params = TemplateParams::new();
        for (i, name) in self.variables.iter().enumerate() {
            let value = captures.get(i + 1)?.as_str();
            if value.is_empty() || value.contains('/') {
                return None;
            }
            params.insert(name.clone(), value.to_string());
        }
        Some(params)
    }

    /// Substitute parameters into the template.
    pub fn expand(&self, params: &TemplateParams) -> CapstanResult<String> {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Variable(name) => {
                    let value = params.get(name).ok_or_else(|| {
                        CapstanError::InvalidInput(format!(
                            "missing value for placeholder '{name}'"
                        ))
                    })?;
                    if value.is_empty() || value.contains('/') {
                        return Err(CapstanError::InvalidInput(format!(
                            "value for placeholder '{name}' must be a single non-empty segment"
                        )));
                    }
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl std::fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Match against templates in order; the first structural match wins.
pub fn match_first<'a, I>(templates: I, candidate: &str) -> Option<(usize, TemplateParams)>
where
    I: IntoIterator<Item = &'a UriTemplate>,
{
    templates
        .into_iter()
        .enumerate()
        .find_map(|(i, t)| t.matches(candidate).map(|params| (i, params)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> TemplateParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_match_single_variable() {
        let t = UriTemplate::parse("file:///logs/{date}").unwrap();
        let got = t.matches("file:///logs/2025-01-01").unwrap();
        assert_eq!(got, params(&[("date", "2025-01-01")]));
    }

    #[test]
    fn test_match_is_anchored() {
        let t = UriTemplate::parse("file:///logs/{date}").unwrap();
        assert!(t.matches("file:///logs/2025-01-01/extra").is_none());
        assert!(t.matches("xfile:///logs/2025").is_none());
        assert!(t.matches("file:///logs/").is_none());
    }

    #[test]
    fn test_value_with_separator_rejected() {
        let t = UriTemplate::parse("db://{table}/rows").unwrap();
        assert!(t.matches("db://a/b/rows").is_none());
        assert!(t.matches("db://users/rows").is_some());
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let t = UriTemplate::parse("calc://{a}+{b}.txt").unwrap();
        assert_eq!(
            t.matches("calc://1+2.txt").unwrap(),
            params(&[("a", "1"), ("b", "2")])
        );
        assert!(t.matches("calc://1+2Xtxt").is_none());
    }

    #[test]
    fn test_multiple_variables() {
        let t = UriTemplate::parse("repo://{owner}/{name}/issues/{id}").unwrap();
        assert_eq!(t.variables(), &["owner", "name", "id"]);
        let got = t.matches("repo://rust-lang/rust/issues/42").unwrap();
        assert_eq!(
            got,
            params(&[("owner", "rust-lang"), ("name", "rust"), ("id", "42")])
        );
    }

    #[test]
    fn test_expand_then_match_roundtrip() {
        let cases = [
            ("file:///logs/{date}", params(&[("date", "2025-01-01")])),
            ("repo://{owner}/{name}", params(&[("owner", "a.b"), ("name", "c d")])),
            ("summarize-{topic}", params(&[("topic", "rust")])),
            ("x://{a}-{b}", params(&[("a", "left"), ("b", "right")])),
        ];
        for (template, values) in cases {
            let t = UriTemplate::parse(template).unwrap();
            let uri = t.expand(&values).unwrap();
            assert_eq!(t.matches(&uri).as_ref(), Some(&values), "template {template}");
        }
    }

    #[test]
    fn test_expand_rejects_separator_and_missing() {
        let t = UriTemplate::parse("file:///logs/{date}").unwrap();
        assert!(t.expand(&params(&[("date", "a/b")])).is_err());
        assert!(t.expand(&params(&[("date", "")])).is_err());
        assert!(t.expand(&TemplateParams::new()).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(UriTemplate::parse("x://{unclosed").is_err());
        assert!(UriTemplate::parse("x://{}").is_err());
        assert!(UriTemplate::parse("x://a}").is_err());
        assert!(UriTemplate::parse("x://{a}/{a}").is_err());
        assert!(UriTemplate::parse("x://{a}{b}").is_err());
        assert!(UriTemplate::parse("x://{a b}").is_err());
    }

    #[test]
    fn test_is_template() {
        assert!(UriTemplate::is_template("file:///logs/{date}"));
        assert!(!UriTemplate::is_template("file:///logs/today"));
        assert!(!UriTemplate::is_template("weird{"));
    }

    #[test]
    fn test_match_first_uses_registration_order() {
        let templates = vec![
            UriTemplate::parse("data://{kind}/latest").unwrap(),
            UriTemplate::parse("data://users/{which}").unwrap(),
        ];
        let (index, got) = match_first(&templates, "data://users/latest").unwrap();
        assert_eq!(index, 0);
        assert_eq!(got, params(&[("kind", "users")]));

        let (index, _) = match_first(&templates, "data://users/7").unwrap();
        assert_eq!(index, 1);
        assert!(match_first(&templates, "other://x").is_none());
    }
}
