use crate::change::PayloadType;
use crate::changelog::Changelog;
use crate::query::{Query, QueryDefinition, QueryError, QuerySite};
use std::collections::BTreeMap;

const MINIMUM_LEVEL: &str = "minimum-level";
const MAXIMUM_LEVEL: &str = "maximum-level";

/// Table of contents of the hosting document.
pub struct TableOfContentsQuery;

impl Query for TableOfContentsQuery {
    fn name(&self) -> &str {
        "toc"
    }

    fn description(&self) -> &str {
        "Generates a table of contents for the current document."
    }

    fn supported_configuration(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([
            (MINIMUM_LEVEL, "Lowest heading level to include. Defaults to 2."),
            (MAXIMUM_LEVEL, "Highest heading level to include. Defaults to 6."),
        ])
    }

    /// Only edits to the hosting document can change its headings.
    fn is_impacted_by(&self, changelog: &Changelog, site: &QuerySite) -> bool {
        changelog.changes_of(PayloadType::Document).any(|change| {
            change
                .value()
                .as_document()
                .is_some_and(|d| d.name() == site.document().name())
        })
    }

    fn run(&self, definition: &QueryDefinition<'_>) -> Result<String, QueryError> {
        let configuration = definition.configuration();
        let minimum = level(configuration.integer_or(MINIMUM_LEVEL, 2), MINIMUM_LEVEL)?;
        let maximum = level(configuration.integer_or(MAXIMUM_LEVEL, 6), MAXIMUM_LEVEL)?;
        if minimum > maximum {
            return Err(QueryError::invalid(
                MINIMUM_LEVEL,
                format!("{} is greater than {} {}", minimum, MAXIMUM_LEVEL, maximum),
            ));
        }

        let lines: Vec<String> = definition
            .document()
            .sections()
            .filter(|s| (minimum..=maximum).contains(&s.level))
            .map(|s| {
                let indent = "  ".repeat(usize::from(s.level - minimum));
                format!("{}- [[#{}]]", indent, s.anchor())
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

fn level(value: i64, key: &str) -> Result<u8, QueryError> {
    u8::try_from(value)
        .ok()
        .filter(|level| (1..=6).contains(level))
        .ok_or_else(|| QueryError::invalid(key, format!("{} is not a heading level (1-6)", value)))
}
