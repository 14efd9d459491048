//! Command template parsing and substitution
//!
//! Placeholders use the syntax `{NAME}`. Extraction reports upper snake case
//! names (`{AMI_ID}`, `{INSTANCE_TYPE}`); substitution replaces any braced
//! name that has a value. Substitution never fails: a placeholder without a
//! value is left in the command verbatim.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Placeholders reported by extraction and pre-flight checks
static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Any brace-delimited text. Variable names are free-form (`db-host`,
/// `app.name`), so substitution looks up whatever sits between the braces.
static SUBSTITUTION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());

/// A parsed shell command template
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    content: String,
    placeholders: Vec<String>,
}

impl CommandTemplate {
    /// Parse a command and collect its placeholders in order of first appearance
    pub fn parse(content: impl Into<String>) -> Self {
        let content = content.into();
        let mut seen = HashSet::new();
        let mut placeholders = Vec::new();

        for caps in PLACEHOLDER_PATTERN.captures_iter(&content) {
            let name = &caps[1];
            if seen.insert(name.to_string()) {
                placeholders.push(name.to_string());
            }
        }

        Self {
            content,
            placeholders,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn has_placeholders(&self) -> bool {
        !self.placeholders.is_empty()
    }

    /// Replace every placeholder that has a value, in a single pass
    pub fn render(&self, values: &HashMap<String, String>) -> String {
        replace_placeholders(&self.content, |name| values.get(name).map(String::as_str))
    }

    /// Like [`render`](Self::render) but skips empty values, for display
    pub fn preview(&self, values: &HashMap<String, String>) -> String {
        replace_placeholders(&self.content, |name| {
            values
                .get(name)
                .map(String::as_str)
                .filter(|value| !value.is_empty())
        })
    }

    /// Placeholders without an entry in `values`
    pub fn missing(&self, values: &HashMap<String, String>) -> Vec<String> {
        self.placeholders
            .iter()
            .filter(|name| !values.contains_key(name.as_str()))
            .cloned()
            .collect()
    }
}

fn replace_placeholders<'a, F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    let replaced: Cow<'_, str> = SUBSTITUTION_PATTERN.replace_all(content, |caps: &Captures| {
        match lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        }
    });
    replaced.into_owned()
}

/// Extract placeholder names from a command, deduplicated
pub fn extract_variables(command: &str) -> Vec<String> {
    CommandTemplate::parse(command).placeholders
}

/// Substitute placeholder values into a command
pub fn substitute(command: &str, values: &HashMap<String, String>) -> String {
    replace_placeholders(command, |name| values.get(name).map(String::as_str))
}

/// Required placeholders absent from `values`
pub fn missing_variables(command: &str, values: &HashMap<String, String>) -> Vec<String> {
    CommandTemplate::parse(command).missing(values)
}
