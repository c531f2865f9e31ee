use scout_core::error::AppError;
use scout_core::extract::{ExtractedPage, ExtractedValue, filter_links};
use scout_core::site::{ExtractionRule, RuleKind, SiteRegistry, SiteRules};
use scout_core::traits::Extractor;
use scraper::{Html, Selector};

/// Attribute read by a links rule that does not name one.
const DEFAULT_LINK_ATTRIBUTE: &str = "href";

/// CSS-selector extractor backed by `scraper`.
///
/// Evaluation is pure: the same document and rules always produce the same
/// page. Unmatched rules yield empty values rather than errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorExtractor;

impl SelectorExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, html: &str, rules: &SiteRules) -> Result<ExtractedPage, AppError> {
        let document = Html::parse_document(html);

        let title = match evaluate(&document, &rules.title, RuleKind::Title) {
            Ok(value) => value.into_scalar(),
            Err(e) => {
                return Err(AppError::ExtractionError(format!(
                    "Invalid title selector '{}': {e}",
                    rules.title.selector
                )));
            }
        };

        let mut page = ExtractedPage {
            title,
            ..Default::default()
        };

        for (kind, rule) in rules.iter().filter(|(kind, _)| *kind != RuleKind::Title) {
            let value = match evaluate(&document, rule, kind) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(rule = %kind, selector = %rule.selector, error = %e, "Skipping rule with invalid selector");
                    continue;
                }
            };
            match kind {
                RuleKind::Content => page.content = non_empty(value.into_scalar()),
                RuleKind::Date => page.date = non_empty(value.into_scalar()),
                RuleKind::Links => page.links = filter_links(value.into_list()),
                RuleKind::Title => {}
            }
        }

        Ok(page)
    }
}

/// Evaluate one rule against a parsed document.
///
/// Scalar rules read the first match; list rules read every match in document
/// order. The rule's transform runs on each value. Errors only on a selector
/// that does not parse.
pub fn evaluate(
    document: &Html,
    rule: &ExtractionRule,
    kind: RuleKind,
) -> Result<ExtractedValue, String> {
    let selector = parse_selector(&rule.selector)?;

    if kind.is_list() {
        let attribute = rule.attribute.as_deref().unwrap_or(DEFAULT_LINK_ATTRIBUTE);
        let values = document
            .select(&selector)
            .filter_map(|el| el.value().attr(attribute))
            .map(|raw| rule.finish(raw.trim().to_string()))
            .collect();
        return Ok(ExtractedValue::List(values));
    }

    let raw = document
        .select(&selector)
        .next()
        .map(|el| match rule.attribute.as_deref() {
            Some(attribute) => el.value().attr(attribute).unwrap_or_default().trim().to_string(),
            None => el.text().collect::<String>().trim().to_string(),
        })
        .unwrap_or_default();

    Ok(ExtractedValue::Scalar(rule.finish(raw)))
}

fn parse_selector(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| e.to_string())
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Check that every selector in the registry parses.
///
/// Run once at startup so a typo fails loudly instead of silently producing
/// empty fields every cycle.
pub fn validate_selectors(registry: &SiteRegistry) -> Result<(), AppError> {
    for site in registry.iter() {
        for (kind, rule) in site.rules.iter() {
            parse_selector(&rule.selector).map_err(|e| {
                AppError::ConfigError(format!(
                    "Site '{}' has an invalid {kind} selector '{}': {e}",
                    site.name, rule.selector
                ))
            })?;
        }
    }
    Ok(())
}
