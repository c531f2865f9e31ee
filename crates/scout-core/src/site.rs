//! Site configurations and the ordered, read-only site registry.
//!
//! A registry is loaded once at startup, either from a JSON file or from the
//! built-in default set, and never changes afterwards. Sites are handed out as
//! `Arc<SiteConfig>` so queue entries can carry their configuration cheaply.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

const BUILTIN_SITES: &str = include_str!("../../../config/sites.json");

/// A pure string-to-string transformation applied after extraction.
///
/// Unit variants are written as plain strings in JSON (`"trim"`), the others as
/// single-key objects (`{"prefix": "https://example.com"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Trim,
    Lowercase,
    Uppercase,
    /// Replace every run of whitespace with a single space and trim.
    CollapseWhitespace,
    /// Prepend a fixed string unless the value is empty.
    Prefix(String),
    StripPrefix(String),
    Replace { from: String, to: String },
    /// Keep at most this many characters.
    Truncate(usize),
    /// Apply each transform in order.
    Chain(Vec<Transform>),
}

impl Transform {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Transform::Trim => value.trim().to_string(),
            Transform::Lowercase => value.to_lowercase(),
            Transform::Uppercase => value.to_uppercase(),
            Transform::CollapseWhitespace => value.split_whitespace().collect::<Vec<_>>().join(" "),
            Transform::Prefix(prefix) => {
                if value.is_empty() {
                    String::new()
                } else {
                    format!("{prefix}{value}")
                }
            }
            Transform::StripPrefix(prefix) => {
                value.strip_prefix(prefix.as_str()).unwrap_or(value).to_string()
            }
            Transform::Replace { from, to } => {
                if from.is_empty() {
                    value.to_string()
                } else {
                    value.replace(from.as_str(), to)
                }
            }
            Transform::Truncate(max) => value.chars().take(*max).collect(),
            Transform::Chain(steps) => steps
                .iter()
                .fold(value.to_string(), |acc, step| step.apply(&acc)),
        }
    }
}

/// Declarative description of how to pull one field out of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// CSS selector evaluated against the fetched document.
    pub selector: String,
    /// Attribute to read instead of the element text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

impl ExtractionRule {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: None,
            transform: None,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Apply the rule's transform, if any.
    pub fn finish(&self, value: String) -> String {
        match &self.transform {
            Some(t) => t.apply(&value),
            None => value,
        }
    }
}

/// The named rule slots a site can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Title,
    Content,
    Date,
    Links,
}

impl RuleKind {
    /// Links is the only rule that yields a list.
    pub fn is_list(self) -> bool {
        matches!(self, RuleKind::Links)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::Title => "title",
            RuleKind::Content => "content",
            RuleKind::Date => "date",
            RuleKind::Links => "links",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRules {
    pub title: ExtractionRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ExtractionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<ExtractionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<ExtractionRule>,
}

impl SiteRules {
    pub fn new(title: ExtractionRule) -> Self {
        Self {
            title,
            content: None,
            links: None,
            date: None,
        }
    }

    pub fn get(&self, kind: RuleKind) -> Option<&ExtractionRule> {
        match kind {
            RuleKind::Title => Some(&self.title),
            RuleKind::Content => self.content.as_ref(),
            RuleKind::Date => self.date.as_ref(),
            RuleKind::Links => self.links.as_ref(),
        }
    }

    /// All configured rules with their kind, title first.
    pub fn iter(&self) -> impl Iterator<Item = (RuleKind, &ExtractionRule)> {
        [
            RuleKind::Title,
            RuleKind::Content,
            RuleKind::Date,
            RuleKind::Links,
        ]
        .into_iter()
        .filter_map(|kind| self.get(kind).map(|rule| (kind, rule)))
    }
}

/// Scraping configuration for one external site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    /// Unique, human-readable name; stored as the item `source`.
    pub name: String,
    /// Seed URL fetched once per scheduler cycle.
    pub base_url: String,
    pub rules: SiteRules,
}

impl SiteConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, rules: SiteRules) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            rules,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ConfigError("Site name must not be empty".into()));
        }

        let url = Url::parse(&self.base_url).map_err(|e| {
            AppError::ConfigError(format!(
                "Site '{}' has an invalid baseUrl '{}': {e}",
                self.name, self.base_url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::ConfigError(format!(
                "Site '{}' baseUrl must be http or https",
                self.name
            )));
        }

        for (kind, rule) in self.rules.iter() {
            if rule.selector.trim().is_empty() {
                return Err(AppError::ConfigError(format!(
                    "Site '{}' has an empty {kind} selector",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Ordered, immutable collection of site configurations.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<Arc<SiteConfig>>,
}

impl SiteRegistry {
    /// Build a registry, validating every site and rejecting duplicate names.
    pub fn from_sites(sites: Vec<SiteConfig>) -> Result<Self, AppError> {
        if sites.is_empty() {
            return Err(AppError::ConfigError(
                "Site registry must contain at least one site".into(),
            ));
        }

        let mut seen = HashSet::new();
        for site in &sites {
            site.validate()?;
            if !seen.insert(site.name.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate site name '{}'",
                    site.name
                )));
            }
        }

        Ok(Self {
            sites: sites.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parse a JSON array of site configurations.
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let sites: Vec<SiteConfig> = serde_json::from_str(json)?;
        Self::from_sites(sites)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read sites file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// The default registry shipped with the crate.
    pub fn builtin() -> Result<Self, AppError> {
        Self::from_json_str(BUILTIN_SITES)
    }

    /// Load from `path` when given, otherwise fall back to the built-in sites.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    /// Sites in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SiteConfig>> {
        self.sites.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<SiteConfig>> {
        self.sites.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
