//! Extraction results shared by every [`Extractor`](crate::traits::Extractor)
//! implementation, plus the link filter applied to discovered URLs.

/// Value produced by evaluating one rule.
///
/// Links rules produce a `List`; title, content and date produce a `Scalar`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedValue {
    Scalar(String),
    List(Vec<String>),
}

impl ExtractedValue {
    pub fn into_scalar(self) -> String {
        match self {
            ExtractedValue::Scalar(s) => s,
            ExtractedValue::List(items) => items.into_iter().next().unwrap_or_default(),
        }
    }

    pub fn into_list(self) -> Vec<String> {
        match self {
            ExtractedValue::Scalar(s) if s.is_empty() => Vec::new(),
            ExtractedValue::Scalar(s) => vec![s],
            ExtractedValue::List(items) => items,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ExtractedValue::Scalar(s) => s.is_empty(),
            ExtractedValue::List(items) => items.is_empty(),
        }
    }
}

/// All fields extracted from one document. Missing fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,
    pub content: Option<String>,
    pub date: Option<String>,
    /// Absolute http(s) links only.
    pub links: Vec<String>,
}

/// Returns true for non-empty links with an absolute http or https scheme.
///
/// Relative links are not resolved against the page URL.
pub fn is_followable_link(link: &str) -> bool {
    let link = link.trim();
    link.starts_with("http://") || link.starts_with("https://")
}

/// Keep only followable links, trimmed, preserving document order.
pub fn filter_links<I>(links: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    links
        .into_iter()
        .filter(|l| is_followable_link(l))
        .map(|l| l.trim().to_string())
        .collect()
}
