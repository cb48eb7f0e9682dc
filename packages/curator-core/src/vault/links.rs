//! Wiki-style internal links: `[[Target]]`, `[[Target#Section]]`, `[[Target|Alias]]`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static INTERNAL_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([^\[\]|#]+)(?:#([^\[\]|]*))?(?:\|([^\[\]]*))?\]\]")
        .expect("internal link pattern is valid")
});

/// A link from the document `source` to the document named `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InternalLink {
    pub source: Arc<str>,
    pub target: Arc<str>,
    pub section: Option<String>,
    pub alias: Option<String>,
}

/// Finds all internal links in `text`, in order of appearance.
///
/// Targets written as paths (`[[folder/Name]]`) or with an explicit extension
/// resolve to the bare document name.
pub fn find_links(source: &Arc<str>, text: &str) -> Vec<InternalLink> {
    INTERNAL_LINK
        .captures_iter(text)
        .filter_map(|caps| {
            let target = document_name(caps.get(1)?.as_str())?;
            Some(InternalLink {
                source: source.clone(),
                target: Arc::from(target),
                section: non_empty(caps.get(2).map(|m| m.as_str())),
                alias: non_empty(caps.get(3).map(|m| m.as_str())),
            })
        })
        .collect()
}

fn document_name(target: &str) -> Option<&str> {
    let target = target.trim();
    let name = target.rsplit('/').next().unwrap_or(target);
    let name = name.strip_suffix(".md").unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
