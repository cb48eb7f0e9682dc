//! Line-based splitter that turns Markdown text into document fragments.
//!
//! Only the structure the curator needs is recognised: front matter on the
//! first line, ATX headings, fenced code and query blocks. A block that is
//! never closed is kept as plain text up to the end of the file.

use super::dictionary::Dictionary;
use super::document::{Document, Fragment, FragmentId, FragmentKind, QueryBlock, Section};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use std::sync::Arc;
use tracing::warn;

pub(crate) const FRONT_MATTER_MARKER: &str = "---";
pub(crate) const QUERY_START: &str = "<!--query";
pub(crate) const QUERY_END: &str = "<!--/query";
pub(crate) const COMMENT_END: &str = "-->";
const CODE_MARKER: &str = "```";
const DEFAULT_QUERY_NAME: &str = "none";

static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6}) (.*)$").expect("header pattern is valid"));

pub(crate) fn parse(name: Arc<str>, folder: Arc<str>, last_modified: u64, text: &str) -> Document {
    let lines: Vec<String> = text.split_inclusive('\n').map(str::to_owned).collect();
    let (fragments, roots) = {
        let mut builder = Builder::new(&name, &lines);
        builder.run();
        (builder.fragments, builder.roots)
    };
    Document::from_parts(name, folder, last_modified, lines, fragments, roots)
}

/// Line content without its terminator or trailing blanks.
fn content(line: &str) -> &str {
    line.trim_end()
}

fn is_block_start(line: &str) -> bool {
    line.starts_with(CODE_MARKER) || line.starts_with(QUERY_START) || HEADER.is_match(line)
}

struct Builder<'a> {
    document: &'a str,
    lines: &'a [String],
    fragments: Vec<Fragment>,
    roots: Vec<FragmentId>,
    open_sections: Vec<(FragmentId, u8)>,
}

impl<'a> Builder<'a> {
    fn new(document: &'a str, lines: &'a [String]) -> Self {
        Self {
            document,
            lines,
            fragments: Vec::new(),
            roots: Vec::new(),
            open_sections: Vec::new(),
        }
    }

    fn line(&self, index: usize) -> &'a str {
        content(&self.lines[index])
    }

    fn push(&mut self, lines: Range<usize>, kind: FragmentKind) -> FragmentId {
        let id = FragmentId(self.fragments.len());
        let parent = self.open_sections.last().map(|(parent, _)| *parent);
        self.fragments.push(Fragment {
            lines,
            parent,
            kind,
        });
        match parent {
            Some(parent) => {
                if let FragmentKind::Section(section) = &mut self.fragments[parent.0].kind {
                    section.children.push(id);
                }
            }
            None => self.roots.push(id),
        }
        id
    }

    fn run(&mut self) {
        let mut index = self.front_matter();
        while index < self.lines.len() {
            let line = self.line(index);
            index = if let Some(caps) = HEADER.captures(line) {
                let level = caps[1].len() as u8;
                let title = caps[2].trim().to_string();
                self.section(index, level, title)
            } else if line.starts_with(CODE_MARKER) {
                self.code(index)
            } else if line.starts_with(QUERY_START) {
                self.query(index)
            } else {
                self.text(index)
            };
        }
    }

    fn front_matter(&mut self) -> usize {
        if !self.lines.is_empty() && self.line(0) == FRONT_MATTER_MARKER {
            if let Some(end) = (1..self.lines.len()).find(|i| self.line(*i) == FRONT_MATTER_MARKER)
            {
                let yaml: String = self.lines[1..end].concat();
                let dictionary = Dictionary::from_yaml(&yaml).unwrap_or_else(|e| {
                    warn!(
                        "Invalid front matter in document '{}', ignoring it: {}",
                        self.document, e
                    );
                    Dictionary::new()
                });
                self.push(0..end + 1, FragmentKind::FrontMatter(dictionary));
                return end + 1;
            }
        }
        self.push(0..0, FragmentKind::FrontMatter(Dictionary::new()));
        0
    }

    fn section(&mut self, index: usize, level: u8, title: String) -> usize {
        while matches!(self.open_sections.last(), Some((_, open)) if *open >= level) {
            self.open_sections.pop();
        }
        let id = self.push(
            index..index + 1,
            FragmentKind::Section(Section {
                level,
                title,
                children: Vec::new(),
            }),
        );
        self.open_sections.push((id, level));
        index + 1
    }

    fn text(&mut self, start: usize) -> usize {
        let end = (start + 1..self.lines.len())
            .find(|i| is_block_start(self.line(*i)))
            .unwrap_or(self.lines.len());
        self.push_text(start, end)
    }

    /// Keeps an unterminated block as text up to the end of the file.
    fn push_text(&mut self, start: usize, end: usize) -> usize {
        self.push(start..end, FragmentKind::Text);
        end
    }

    fn code(&mut self, start: usize) -> usize {
        let Some(end) = (start + 1..self.lines.len()).find(|i| self.line(*i).starts_with(CODE_MARKER))
        else {
            return self.push_text(start, self.lines.len());
        };
        let language = self.line(start)[CODE_MARKER.len()..].trim();
        let language = (!language.is_empty()).then(|| language.to_string());
        self.push(start..end + 1, FragmentKind::Code { language });
        end + 1
    }

    fn query(&mut self, start: usize) -> usize {
        let last = self.lines.len();
        let Some(header_end) = (start..last).find(|i| self.line(*i).ends_with(COMMENT_END)) else {
            return self.push_text(start, last);
        };
        let Some(end) = (header_end + 1..last).find(|i| {
            let line = self.line(*i);
            line.starts_with(QUERY_END) && line.ends_with(COMMENT_END)
        }) else {
            return self.push_text(start, last);
        };

        let header: String = self.lines[start..=header_end].concat();
        let (name, configuration) = self.parse_header(&header);
        let block = QueryBlock {
            name,
            configuration,
            output: header_end + 1..end,
            hash: parse_hash(self.line(end)),
        };
        self.push(start..end + 1, FragmentKind::Query(block));
        end + 1
    }

    fn parse_header(&self, header: &str) -> (String, Dictionary) {
        let body = header
            .trim_end()
            .strip_prefix(QUERY_START)
            .unwrap_or(header)
            .strip_suffix(COMMENT_END)
            .unwrap_or(header);

        let (name, rest) = match body.strip_prefix(':') {
            Some(named) => {
                let split = named
                    .find(|c: char| !c.is_ascii_alphanumeric())
                    .unwrap_or(named.len());
                (named[..split].to_ascii_lowercase(), &named[split..])
            }
            None => (String::new(), body),
        };
        let name = if name.is_empty() {
            DEFAULT_QUERY_NAME.to_string()
        } else {
            name
        };

        let configuration = Dictionary::from_yaml(rest).unwrap_or_else(|e| {
            warn!(
                "Invalid configuration for query '{}' in document '{}', using defaults: {}",
                name, self.document, e
            );
            Dictionary::new()
        });
        (name, configuration)
    }
}

fn parse_hash(closing: &str) -> Option<String> {
    let inner = closing
        .strip_prefix(QUERY_END)?
        .strip_suffix(COMMENT_END)?
        .trim();
    let hash = inner.strip_prefix('(')?.strip_suffix(')')?.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}
