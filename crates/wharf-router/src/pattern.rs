//! Route template compilation and matching.
//!
//! Templates capture path parameters two ways: `:name` matches a single
//! segment, `:name:` matches greedily to the end of the path. Everything
//! else is literal.

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

use wharf_http::query::percent_decode;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("empty parameter name in route template: {template}")]
    EmptyName { template: String },

    #[error("route template did not compile: {0}")]
    Compile(#[from] regex::Error),
}

enum Matcher {
    /// Template without placeholders: plain string comparison.
    Literal(String),
    Regex(Regex),
}

/// A compiled route template.
pub struct PathPattern {
    keys: Vec<String>,
    matcher: Matcher,
    whole: bool,
}

impl PathPattern {
    /// Compile `template`. With `whole` the match is anchored at the end of
    /// the path; otherwise a prefix match suffices.
    pub fn compile(template: &str, whole: bool) -> Result<Self, PatternError> {
        let mut keys = Vec::new();
        let mut regex = String::from("^");
        let mut literal = String::new();
        let mut rest = template;

        while let Some(colon) = rest.find(':') {
            let (prefix, after) = rest.split_at(colon);
            literal.push_str(prefix);
            regex.push_str(&regex::escape(prefix));
            let after = &after[1..];

            let name_end = after
                .find(|c| c == '/' || c == ':')
                .unwrap_or(after.len());
            let name = &after[..name_end];
            if name.is_empty() {
                return Err(PatternError::EmptyName {
                    template: template.to_string(),
                });
            }
            keys.push(name.to_string());

            if after[name_end..].starts_with(':') {
                // greedy capture to end of input
                regex.push_str("(.+)");
                rest = &after[name_end + 1..];
            } else {
                regex.push_str(r"([^/\s]+)");
                rest = &after[name_end..];
            }
        }
        literal.push_str(rest);
        regex.push_str(&regex::escape(rest));

        let matcher = if keys.is_empty() {
            Matcher::Literal(literal)
        } else {
            if whole {
                regex.push('$');
            }
            Matcher::Regex(Regex::new(&regex)?)
        };

        Ok(Self {
            keys,
            matcher,
            whole,
        })
    }

    /// Match a path, returning the captured parameter map.
    ///
    /// Duplicate placeholder names resolve last-wins. Captures are
    /// percent-decoded the same way the query parser decodes values; an
    /// undecodable capture fails the match.
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        match &self.matcher {
            Matcher::Literal(literal) => {
                let hit = if self.whole {
                    path == literal
                } else {
                    path.starts_with(literal)
                };
                hit.then(HashMap::new)
            }
            Matcher::Regex(regex) => {
                let captures = regex.captures(path)?;
                let mut params = HashMap::with_capacity(self.keys.len());
                for (index, key) in self.keys.iter().enumerate() {
                    let raw = captures.get(index + 1)?.as_str();
                    params.insert(key.clone(), percent_decode(raw).ok()?);
                }
                Some(params)
            }
        }
    }

    /// Placeholder names in template order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}
