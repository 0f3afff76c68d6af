//! Expansion of `${...}` placeholders in literal configuration values. The resolver is a pure
//! utility: it carries only its delimiter configuration and receives the lookup capability per
//! call.

use crate::error::BeansError;
use fxhash::FxHashSet;

/// Expands placeholders with configurable delimiters, nested keys, default values and circular
/// reference detection.
///
/// With the default configuration, `${url.${region}:unknown}` first expands `${region}`, queries
/// the computed key and falls back to `unknown` when the key cannot be resolved.
#[derive(Clone, Debug)]
pub struct PlaceholderResolver {
    prefix: String,
    suffix: String,
    separator: Option<String>,
    ignore_unresolved: bool,
}

impl Default for PlaceholderResolver {
    fn default() -> Self {
        Self {
            prefix: "${".to_string(),
            suffix: "}".to_string(),
            separator: Some(":".to_string()),
            ignore_unresolved: false,
        }
    }
}

impl PlaceholderResolver {
    pub fn new(
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        separator: Option<String>,
        ignore_unresolved: bool,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            separator,
            ignore_unresolved,
        }
    }

    /// Leaves unresolvable placeholders in place instead of failing.
    pub fn with_ignore_unresolved(mut self, ignore_unresolved: bool) -> Self {
        self.ignore_unresolved = ignore_unresolved;
        self
    }

    /// Expands all placeholders in `value`, resolving keys through `lookup`.
    pub fn expand(
        &self,
        value: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<String, BeansError> {
        let mut visiting = FxHashSet::default();
        self.parse(value, lookup, &mut visiting)
    }

    fn parse(
        &self,
        value: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
        visiting: &mut FxHashSet<String>,
    ) -> Result<String, BeansError> {
        let mut result = String::new();
        let mut rest = value;

        while let Some(start) = rest.find(&self.prefix) {
            result.push_str(&rest[..start]);
            let after_prefix = &rest[start + self.prefix.len()..];

            match self.find_suffix(after_prefix) {
                Some(end) => {
                    let content = &after_prefix[..end];
                    let resolved = self.resolve_placeholder(content, lookup, visiting)?;
                    result.push_str(&resolved);
                    rest = &after_prefix[end + self.suffix.len()..];
                }
                None => {
                    // unmatched opening delimiter - keep the remainder verbatim
                    result.push_str(&rest[start..]);
                    return Ok(result);
                }
            }
        }

        result.push_str(rest);
        Ok(result)
    }

    fn resolve_placeholder(
        &self,
        content: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
        visiting: &mut FxHashSet<String>,
    ) -> Result<String, BeansError> {
        // keys may themselves contain placeholders, so compute the key first
        let key = self.try_parse(content, lookup, visiting)?;

        if let Some(key) = &key {
            if let Some(value) = lookup(key) {
                return self.expand_resolved(key, &value, lookup, visiting);
            }
        }

        // the separator is searched in the original, unexpanded key so an unresolvable
        // computed key can still fall back to its default
        if let Some(separator) = &self.separator {
            if let Some(split_at) = self.find_top_level(content, separator) {
                let raw_key = &content[..split_at];
                let raw_default = &content[split_at + separator.len()..];

                if let Some(left) = self.try_parse(raw_key, lookup, visiting)? {
                    if let Some(value) = lookup(&left) {
                        return self.expand_resolved(&left, &value, lookup, visiting);
                    }
                }

                return self.parse(raw_default, lookup, visiting);
            }
        }

        if self.ignore_unresolved {
            Ok(format!("{}{}{}", self.prefix, content, self.suffix))
        } else {
            Err(BeansError::UnresolvedPlaceholder(
                key.unwrap_or_else(|| content.to_string()),
            ))
        }
    }

    /// Parses a candidate key, mapping an unresolvable inner placeholder to `None` so callers
    /// can fall through to the default branch.
    fn try_parse(
        &self,
        value: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
        visiting: &mut FxHashSet<String>,
    ) -> Result<Option<String>, BeansError> {
        match self.parse(value, lookup, visiting) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(BeansError::UnresolvedPlaceholder(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    fn expand_resolved(
        &self,
        key: &str,
        value: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
        visiting: &mut FxHashSet<String>,
    ) -> Result<String, BeansError> {
        if !visiting.insert(key.to_string()) {
            return Err(BeansError::CircularPlaceholder(key.to_string()));
        }

        let result = self.parse(value, lookup, visiting);
        visiting.remove(key);
        result
    }

    /// Index of the suffix closing the placeholder opened just before `value`, accounting for
    /// nested placeholders.
    fn find_suffix(&self, value: &str) -> Option<usize> {
        let mut depth = 0_usize;
        let mut index = 0;

        while index < value.len() {
            let rest = &value[index..];
            if rest.starts_with(&self.suffix) {
                if depth == 0 {
                    return Some(index);
                }
                depth -= 1;
                index += self.suffix.len();
            } else if rest.starts_with(&self.prefix) {
                depth += 1;
                index += self.prefix.len();
            } else {
                index += rest.chars().next().map(char::len_utf8).unwrap_or(1);
            }
        }

        None
    }

    /// First occurrence of `needle` outside any nested placeholder.
    fn find_top_level(&self, value: &str, needle: &str) -> Option<usize> {
        let mut depth = 0_usize;
        let mut index = 0;

        while index < value.len() {
            let rest = &value[index..];
            if rest.starts_with(&self.prefix) {
                depth += 1;
                index += self.prefix.len();
            } else if depth > 0 && rest.starts_with(&self.suffix) {
                depth -= 1;
                index += self.suffix.len();
            } else if depth == 0 && rest.starts_with(needle) {
                return Some(index);
            } else {
                index += rest.chars().next().map(char::len_utf8).unwrap_or(1);
            }
        }

        None
    }
}
