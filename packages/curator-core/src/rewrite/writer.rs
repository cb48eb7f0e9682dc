use super::DocumentUpdate;
use crate::error::Result;
use crate::vault::{FragmentKind, COMMENT_END, FRONT_MATTER_MARKER, QUERY_END};

/// Rebuilds the full text of a document with its updates applied.
///
/// Fragments are copied verbatim in structural order, except the front matter
/// when it has an update and query blocks that have new output. A rewritten
/// query block keeps its opening comment as is, followed by the output and a
/// closing marker carrying the output's hash.
pub fn rewrite_document(update: &DocumentUpdate) -> Result<String> {
    let document = &update.document;
    let mut text = String::with_capacity(document.lines().iter().map(String::len).sum());

    for id in document.walk() {
        let fragment = document.fragment(id);
        match &fragment.kind {
            FragmentKind::FrontMatter(_) => match &update.front_matter {
                Some(front_matter) => {
                    text.push_str(FRONT_MATTER_MARKER);
                    text.push('\n');
                    text.push_str(&front_matter.to_yaml()?);
                    text.push_str(FRONT_MATTER_MARKER);
                    text.push('\n');
                }
                None => text.push_str(&document.text_of(fragment.lines.clone())),
            },
            FragmentKind::Query(block) => match update.outputs.get(&id) {
                Some(output) => {
                    text.push_str(&document.text_of(fragment.lines.start..block.output.start));
                    if !output.content.is_empty() {
                        text.push_str(&output.content);
                        text.push('\n');
                    }
                    text.push_str(&format!("{} ({}){}\n", QUERY_END, output.hash, COMMENT_END));
                }
                None => text.push_str(&document.text_of(fragment.lines.clone())),
            },
            _ => text.push_str(&document.text_of(fragment.lines.clone())),
        }
    }
    Ok(text)
}
