//! Category spec parsing
//!
//! Grammar: `label=term1,term2|label2=term3`. A segment without `=` uses its
//! first term as the label. A label may carry a color override as a
//! `#RRGGBB` suffix, e.g. `food#e4572e=restaurant,cafe`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

static COLOR_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<label>.*?)\s*#(?P<hex>[0-9A-Fa-f]{6})$")
        .expect("Invalid color suffix regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub terms: Vec<String>,
    /// Explicit `#rrggbb` color, lowercased
    pub color_override: Option<String>,
}

impl Category {
    /// Terms joined the way providers receive them
    #[must_use]
    pub fn query(&self) -> String {
        self.terms.join(",")
    }
}

/// Ordered, uniquely named categories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySet(Vec<Category>);

impl CategorySet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Category> {
        self.0.iter()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.0.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.name.as_str())
    }
}

impl<'a> IntoIterator for &'a CategorySet {
    type Item = &'a Category;
    type IntoIter = std::slice::Iter<'a, Category>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Parse a category spec into an ordered set
///
/// # Errors
///
/// `ConfigError::InvalidCategorySpec` for an empty spec, a segment with no
/// terms or label, or a duplicate label.
pub fn parse_category_spec(spec: &str) -> Result<CategorySet, ConfigError> {
    let mut categories = Vec::new();
    let mut seen = HashSet::new();

    for segment in spec.split('|').map(str::trim).filter(|s| !s.is_empty()) {
        let (label_part, terms_part) = match segment.split_once('=') {
            Some((label, terms)) => (Some(label.trim()), terms),
            None => (None, segment),
        };

        let (label_part, color_override) = match label_part {
            Some(label) => split_color(label),
            None => (None, None),
        };

        let terms: Vec<String> = terms_part
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .collect();
        let Some(first) = terms.first() else {
            return Err(ConfigError::InvalidCategorySpec(format!(
                "segment '{segment}' has no terms"
            )));
        };

        let name = match label_part {
            Some(label) if !label.is_empty() => label.to_string(),
            Some(_) => {
                return Err(ConfigError::InvalidCategorySpec(format!(
                    "segment '{segment}' has an empty label"
                )));
            }
            None => first.clone(),
        };

        if !seen.insert(name.clone()) {
            return Err(ConfigError::InvalidCategorySpec(format!(
                "duplicate category label '{name}'"
            )));
        }

        categories.push(Category {
            name,
            terms,
            color_override,
        });
    }

    if categories.is_empty() {
        return Err(ConfigError::InvalidCategorySpec(
            "spec contains no categories".to_string(),
        ));
    }
    Ok(CategorySet(categories))
}

fn split_color(label: &str) -> (Option<&str>, Option<String>) {
    match COLOR_SUFFIX.captures(label) {
        Some(caps) => (
            caps.name("label").map(|m| m.as_str().trim()),
            caps.name("hex").map(|m| format!("#{}", m.as_str().to_lowercase())),
        ),
        None => (Some(label), None),
    }
}
