//! Parsed Markdown documents.
//!
//! A [`Document`] owns its original lines (terminators included) and an arena
//! of [`Fragment`]s. Every line belongs to exactly one fragment, and walking
//! the fragments in structural order visits the lines in file order, which is
//! what lets the rewriter reproduce untouched content byte for byte.

use super::dictionary::Dictionary;
use super::links::{find_links, InternalLink};
use super::parser;
use std::ops::Range;
use std::sync::Arc;

/// Index of a fragment inside its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(pub(crate) usize);

impl FragmentId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub level: u8,
    pub title: String,
    pub children: Vec<FragmentId>,
}

impl Section {
    /// The anchor used to link to this section from within the vault.
    pub fn anchor(&self) -> String {
        anchor_for(&self.title)
    }
}

/// An embedded query region: opening comment, generated output, closing marker.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBlock {
    /// Lower-cased query name, `none` when the block does not name one.
    pub name: String,
    pub configuration: Dictionary,
    /// Lines holding the previously generated output.
    pub output: Range<usize>,
    /// Hash recorded in the closing marker by the last rewrite.
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FragmentKind {
    /// Always the first root fragment; spans no lines when the file has none.
    FrontMatter(Dictionary),
    Section(Section),
    Text,
    Code { language: Option<String> },
    Query(QueryBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Lines owned by this fragment itself, excluding any children.
    pub lines: Range<usize>,
    pub parent: Option<FragmentId>,
    pub kind: FragmentKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    name: Arc<str>,
    folder: Arc<str>,
    last_modified: u64,
    lines: Vec<String>,
    fragments: Vec<Fragment>,
    roots: Vec<FragmentId>,
}

impl Document {
    /// Parses `text` into a document.
    ///
    /// `folder` is the vault-relative folder path (`""` for the root) and
    /// `last_modified` the file's modification time in milliseconds since the
    /// Unix epoch.
    pub fn parse(name: &str, folder: &str, last_modified: u64, text: &str) -> Self {
        parser::parse(Arc::from(name), Arc::from(folder), last_modified, text)
    }

    pub(crate) fn from_parts(
        name: Arc<str>,
        folder: Arc<str>,
        last_modified: u64,
        lines: Vec<String>,
        fragments: Vec<Fragment>,
        roots: Vec<FragmentId>,
    ) -> Self {
        Self {
            name,
            folder,
            last_modified,
            lines,
            fragments,
            roots,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text_of(&self, range: Range<usize>) -> String {
        self.lines[range].concat()
    }

    pub fn text(&self) -> String {
        self.lines.concat()
    }

    pub fn fragment(&self, id: FragmentId) -> &Fragment {
        &self.fragments[id.0]
    }

    pub fn roots(&self) -> &[FragmentId] {
        &self.roots
    }

    /// All fragments in structural (depth-first, document) order.
    pub fn walk(&self) -> Vec<FragmentId> {
        let mut order = Vec::with_capacity(self.fragments.len());
        let mut stack: Vec<FragmentId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let FragmentKind::Section(section) = &self.fragment(id).kind {
                stack.extend(section.children.iter().rev().copied());
            }
        }
        order
    }

    pub fn front_matter(&self) -> &Dictionary {
        static EMPTY: once_cell::sync::Lazy<Dictionary> =
            once_cell::sync::Lazy::new(Dictionary::new);
        self.roots
            .first()
            .and_then(|id| match &self.fragment(*id).kind {
                FragmentKind::FrontMatter(dictionary) => Some(dictionary),
                _ => None,
            })
            .unwrap_or(&EMPTY)
    }

    pub fn front_matter_id(&self) -> Option<FragmentId> {
        self.roots
            .first()
            .copied()
            .filter(|id| matches!(self.fragment(*id).kind, FragmentKind::FrontMatter(_)))
    }

    pub fn query_blocks(&self) -> impl Iterator<Item = (FragmentId, &QueryBlock)> {
        self.walk()
            .into_iter()
            .filter_map(move |id| match &self.fragment(id).kind {
                FragmentKind::Query(block) => Some((id, block)),
                _ => None,
            })
    }

    pub fn query_block(&self, id: FragmentId) -> Option<&QueryBlock> {
        match &self.fragments.get(id.0)?.kind {
            FragmentKind::Query(block) => Some(block),
            _ => None,
        }
    }

    pub fn has_queries(&self) -> bool {
        self.fragments
            .iter()
            .any(|f| matches!(f.kind, FragmentKind::Query(_)))
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.walk()
            .into_iter()
            .filter_map(move |id| match &self.fragment(id).kind {
                FragmentKind::Section(section) => Some(section),
                _ => None,
            })
    }

    /// The first level-1 heading, else the front-matter `title`, else the name.
    pub fn title(&self) -> String {
        self.sections()
            .find(|s| s.level == 1)
            .map(|s| s.title.clone())
            .or_else(|| self.front_matter().string("title"))
            .unwrap_or_else(|| self.name.to_string())
    }

    /// Links written in headings and prose. Code and query output are skipped.
    pub fn links(&self) -> Vec<InternalLink> {
        self.walk()
            .into_iter()
            .filter(|id| {
                matches!(
                    self.fragment(*id).kind,
                    FragmentKind::Text | FragmentKind::Section(_)
                )
            })
            .flat_map(|id| find_links(&self.name, &self.text_of(self.fragment(id).lines.clone())))
            .collect()
    }
}

/// Anchor text for a heading: markup characters dropped, whitespace collapsed.
pub fn anchor_for(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '[' | ']' | '`' | '^' | '|'))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
