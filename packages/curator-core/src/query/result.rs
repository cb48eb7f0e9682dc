//! Markdown building blocks for query output.

use std::fmt::Display;

/// `- item` lines, one per item.
pub fn unordered_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Display,
{
    items
        .into_iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A wiki link to a document.
pub fn document_link(name: &str) -> String {
    format!("[[{}]]", name)
}

/// A Markdown table. Pipes inside cells are escaped.
pub fn table<H, R, C>(headers: &[H], rows: R) -> String
where
    H: AsRef<str>,
    R: IntoIterator<Item = Vec<C>>,
    C: AsRef<str>,
{
    let row = |cells: Vec<String>| format!("| {} |", cells.join(" | "));
    let mut lines = vec![
        row(headers.iter().map(|h| escape_cell(h.as_ref())).collect()),
        row(headers.iter().map(|_| "---".to_string()).collect()),
    ];
    lines.extend(
        rows.into_iter()
            .map(|cells| row(cells.iter().map(|c| escape_cell(c.as_ref())).collect())),
    );
    lines.join("\n")
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unordered_list() {
        assert_eq!(unordered_list(["a", "b"]), "- a\n- b");
        assert_eq!(unordered_list(Vec::<String>::new()), "");
    }

    #[test]
    fn test_table() {
        let rendered = table(&["Query", "Description"], vec![vec!["toc", "a|b"]]);
        assert_eq!(
            rendered,
            "| Query | Description |\n| --- | --- |\n| toc | a\\|b |"
        );
    }
}
