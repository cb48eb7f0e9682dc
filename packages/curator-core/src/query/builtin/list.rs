use crate::change::{Change, PayloadType};
use crate::changelog::Changelog;
use crate::query::result::{document_link, unordered_list};
use crate::query::{Query, QueryDefinition, QueryError, QuerySite};
use crate::vault::is_within;
use std::collections::BTreeMap;

pub(super) const FOLDER: &str = "folder";
pub(super) const RECURSE: &str = "recurse";
pub(super) const REVERSE: &str = "reverse";

/// The configured folder, or the folder of the hosting document.
pub(super) fn configured_folder(site: &QuerySite) -> String {
    site.configuration()
        .string(FOLDER)
        .map(|f| f.trim_matches('/').to_string())
        .unwrap_or_else(|| site.document().folder().to_string())
}

/// Whether a document change matches `filter` inside the site's configured folder.
pub(super) fn folder_impacted_by(
    changelog: &Changelog,
    site: &QuerySite,
    filter: impl Fn(&Change) -> bool,
) -> bool {
    let folder = configured_folder(site);
    let recurse = site.configuration().bool_or(RECURSE, false);
    let touches = |document_folder: &str| {
        if recurse {
            is_within(document_folder, &folder)
        } else {
            document_folder == folder
        }
    };
    changelog.contains(PayloadType::Folder)
        || changelog.changes_of(PayloadType::Document).any(|change| {
            filter(change)
                && change
                    .value()
                    .as_document()
                    .is_some_and(|d| touches(d.folder()))
        })
}

/// Lists the documents in a folder.
pub struct ListQuery;

impl Query for ListQuery {
    fn name(&self) -> &str {
        "list"
    }

    fn description(&self) -> &str {
        "Lists the documents in a folder, sorted by name."
    }

    fn supported_configuration(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([
            (FOLDER, "Folder to list. Defaults to the folder of the current document."),
            (RECURSE, "Whether to include subfolders. Defaults to false."),
            (REVERSE, "Whether to sort in reverse order. Defaults to false."),
        ])
    }

    fn is_impacted_by(&self, changelog: &Changelog, site: &QuerySite) -> bool {
        // A create or delete changes membership; a move shows up as one of those too.
        folder_impacted_by(changelog, site, |change| {
            !matches!(change, Change::Update { .. })
        })
    }

    fn run(&self, definition: &QueryDefinition<'_>) -> Result<String, QueryError> {
        let folder = configured_folder(definition.site);
        let configuration = definition.configuration();
        let recurse = configuration.bool_or(RECURSE, false);
        let reverse = configuration.bool_or(REVERSE, false);

        if !definition.vault.has_folder(&folder) {
            return Err(QueryError::invalid(
                FOLDER,
                format!("folder '{}' does not exist", folder),
            ));
        }

        let mut names: Vec<&str> = definition
            .vault
            .documents_in(&folder, recurse)
            .map(|d| d.name())
            .filter(|name| *name != definition.document().name())
            .collect();
        names.sort_unstable();
        if reverse {
            names.reverse();
        }
        if names.is_empty() {
            return Ok("No documents found.".to_string());
        }
        Ok(unordered_list(names.into_iter().map(document_link)))
    }
}
