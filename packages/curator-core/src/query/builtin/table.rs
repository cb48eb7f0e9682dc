use super::list::{configured_folder, folder_impacted_by, FOLDER, RECURSE, REVERSE};
use crate::changelog::Changelog;
use crate::query::result::{document_link, table};
use crate::query::{Query, QueryDefinition, QueryError, QuerySite};
use std::collections::BTreeMap;

const COLUMNS: &str = "columns";
const SORT: &str = "sort";
const NAME: &str = "Name";

/// Tabulates the documents in a folder, with front-matter fields as extra columns.
pub struct TableQuery;

impl Query for TableQuery {
    fn name(&self) -> &str {
        "table"
    }

    fn description(&self) -> &str {
        "Generates a sorted table of documents, with optional front matter fields in additional columns."
    }

    fn supported_configuration(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([
            (FOLDER, "Folder to list. Defaults to the folder of the current document."),
            (RECURSE, "Whether to include subfolders. Defaults to false."),
            (REVERSE, "Whether to sort in reverse order. Defaults to false."),
            (COLUMNS, "Front matter fields to add as columns."),
            (SORT, "Column to sort on. Defaults to the document name."),
        ])
    }

    /// Edits count too: any of them may change a front-matter cell.
    fn is_impacted_by(&self, changelog: &Changelog, site: &QuerySite) -> bool {
        folder_impacted_by(changelog, site, |_| true)
    }

    fn run(&self, definition: &QueryDefinition<'_>) -> Result<String, QueryError> {
        let folder = configured_folder(definition.site);
        let configuration = definition.configuration();
        let recurse = configuration.bool_or(RECURSE, false);
        let reverse = configuration.bool_or(REVERSE, false);
        let sort = configuration.string_or(SORT, NAME);

        if !definition.vault.has_folder(&folder) {
            return Err(QueryError::invalid(
                FOLDER,
                format!("folder '{}' does not exist", folder),
            ));
        }

        let mut headers = vec![NAME.to_string()];
        headers.extend(configuration.strings(COLUMNS));
        let Some(sort_column) = headers.iter().position(|h| *h == sort) else {
            return Err(QueryError::invalid(
                SORT,
                format!("'{}' is not one of the columns", sort),
            ));
        };

        let mut documents: Vec<_> = definition.vault.documents_in(&folder, recurse).collect();
        if documents.is_empty() {
            return Ok("No documents found.".to_string());
        }
        documents.sort_unstable_by(|a, b| a.name().cmp(b.name()));

        let mut rows: Vec<Vec<String>> = documents
            .into_iter()
            .map(|document| {
                let front_matter = document.front_matter();
                let mut row = vec![document_link(document.name())];
                row.extend(
                    headers[1..]
                        .iter()
                        .map(|column| front_matter.string(column).unwrap_or_default()),
                );
                row
            })
            .collect();
        rows.sort_by(|a, b| a[sort_column].cmp(&b[sort_column]));
        if reverse {
            rows.reverse();
        }

        if sort_column > 0 {
            let column = headers.remove(sort_column);
            headers.insert(0, column);
            for row in &mut rows {
                let cell = row.remove(sort_column);
                row.insert(0, cell);
            }
        }
        Ok(table(&headers, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Change, Payload};
    use crate::query::QueryCatalog;
    use crate::vault::{Document, Vault};
    use std::sync::Arc;

    fn vault() -> Vault {
        let mut vault = Vault::new("test");
        for (name, folder, date) in [
            ("V", "C", "1976-11-30"),
            ("M", "C", "1977-11-11"),
            ("Y", "C/C", "2003-08-05"),
        ] {
            vault.insert_document(Document::parse(
                name,
                folder,
                0,
                &format!("---\ndate: {}\n---\n", date),
            ));
        }
        vault.insert_folder("X");
        vault
    }

    fn site(header: &str) -> QuerySite {
        let document = Arc::new(Document::parse(
            "V",
            "C",
            0,
            &format!("{}\n<!--/query-->\n", header),
        ));
        let (id, _) = document.query_blocks().next().unwrap();
        QuerySite::new(document, id).unwrap()
    }

    fn run(vault: &Vault, header: &str) -> Result<String, QueryError> {
        let site = site(header);
        let catalog = QueryCatalog::new();
        TableQuery.run(&QueryDefinition::new(&site, vault, &catalog))
    }

    #[test]
    fn test_configuration_options() {
        let keys: Vec<&str> = TableQuery.supported_configuration().into_keys().collect();
        assert_eq!(keys, vec!["columns", "folder", "recurse", "reverse", "sort"]);
    }

    #[test]
    fn test_names_only_by_default() {
        let vault = vault();
        let output = run(&vault, "<!--query:table-->").unwrap();
        assert_eq!(output, "| Name |\n| --- |\n| [[M]] |\n| [[V]] |");
    }

    #[test]
    fn test_front_matter_columns() {
        let vault = vault();
        let output = run(&vault, "<!--query:table\ncolumns: [date]\n-->").unwrap();
        assert_eq!(
            output,
            "| Name | date |\n| --- | --- |\n| [[M]] | 1977-11-11 |\n| [[V]] | 1976-11-30 |"
        );
    }

    #[test]
    fn test_sort_column_moves_first() {
        let vault = vault();
        let output = run(
            &vault,
            "<!--query:table\ncolumns: [date]\nsort: date\nrecurse: true\nreverse: true\n-->",
        )
        .unwrap();
        assert_eq!(
            output,
            "| date | Name |\n| --- | --- |\n\
             | 2003-08-05 | [[Y]] |\n| 1977-11-11 | [[M]] |\n| 1976-11-30 | [[V]] |"
        );
    }

    #[test]
    fn test_empty_folder() {
        let vault = vault();
        let output = run(&vault, "<!--query:table\nfolder: X\n-->").unwrap();
        assert_eq!(output, "No documents found.");
    }

    #[test]
    fn test_unknown_sort_column_is_an_error() {
        let vault = vault();
        assert!(run(&vault, "<!--query:table\nsort: date\n-->").is_err());
        assert!(run(&vault, "<!--query:table\nfolder: nowhere\n-->").is_err());
    }

    #[test]
    fn test_impacted_by_edits_in_folder() {
        let site = site("<!--query:table-->");
        let edited_here = Arc::new(Document::parse("M", "C", 0, "---\ndate: 2000-01-01\n---\n"));
        let edited_elsewhere = Arc::new(Document::parse("Y", "C/C", 0, ""));

        assert!(TableQuery.is_impacted_by(
            &Changelog::of(Change::touch(Payload::Document(edited_here))),
            &site
        ));
        assert!(!TableQuery.is_impacted_by(
            &Changelog::of(Change::touch(Payload::Document(edited_elsewhere))),
            &site
        ));
    }
}
