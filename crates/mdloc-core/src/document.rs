//! Markdown document model: image references with rewritable URL slots.
//!
//! Parsing uses pulldown-cmark only to find image nodes and their source
//! offsets. Rendering splices resolved local paths into the original text, so
//! everything that is not a rewritten URL round-trips byte for byte.

use std::collections::HashSet;
use std::ops::Range;

use pulldown_cmark::{Event, LinkType, Options, Parser, Tag};

/// One image reference in a document.
///
/// For reference-style images the span points into the link definition,
/// which all uses of that label share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub document_id: String,
    pub url: String,
    span: Range<usize>,
    resolved: Option<String>,
}

impl AssetReference {
    /// Only http(s) URLs are fetched; everything else is left as written.
    pub fn is_remote(&self) -> bool {
        url::Url::parse(&self.url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    /// Byte range of the URL literal in the source text.
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    pub fn resolved(&self) -> Option<&str> {
        self.resolved.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct MarkdownDocument {
    id: String,
    text: String,
    references: Vec<AssetReference>,
}

impl MarkdownDocument {
    pub fn parse(id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        let text = text.into();
        let references = scan(&id, &text);
        Self {
            id,
            text,
            references,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.text
    }

    /// All image references in first-use order.
    pub fn references(&self) -> &[AssetReference] {
        &self.references
    }

    /// Indices and references of the images to localize.
    pub fn remote_references(&self) -> impl Iterator<Item = (usize, &AssetReference)> {
        self.references
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_remote())
    }

    /// Sets the local path for reference `index`. The slot is written once;
    /// returns `false` if it was already set or `index` is out of range.
    pub fn resolve(&mut self, index: usize, path: impl Into<String>) -> bool {
        match self.references.get_mut(index) {
            Some(r) if r.resolved.is_none() => {
                r.resolved = Some(path.into());
                true
            }
            _ => false,
        }
    }

    /// The document text with every resolved reference rewritten.
    pub fn render(&self) -> String {
        let mut edits: Vec<(&Range<usize>, &str)> = self
            .references
            .iter()
            .filter_map(|r| r.resolved.as_deref().map(|p| (&r.span, p)))
            .collect();
        edits.sort_by_key(|(span, _)| span.start);

        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for (span, path) in edits {
            if span.start < cursor {
                continue;
            }
            out.push_str(&self.text[cursor..span.start]);
            out.push_str(path);
            cursor = span.end;
        }
        out.push_str(&self.text[cursor..]);
        out
    }
}

fn scan(id: &str, text: &str) -> Vec<AssetReference> {
    let mut iter = Parser::new_ext(text, Options::empty()).into_offset_iter();
    let images: Vec<(LinkType, String, String, Range<usize>)> = iter
        .by_ref()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                id,
                ..
            }) => Some((link_type, dest_url.into_string(), id.into_string(), range)),
            _ => None,
        })
        .collect();
    let definitions = iter.reference_definitions();

    let mut seen_definitions: HashSet<usize> = HashSet::new();
    let mut references = Vec::new();
    for (link_type, dest, label, range) in images {
        if dest.is_empty() {
            continue;
        }
        let span = match link_type {
            LinkType::Inline => locate_after(text, range, "](", &dest),
            LinkType::Reference | LinkType::Collapsed | LinkType::Shortcut => {
                let def = definitions.get(&label).or_else(|| {
                    definitions
                        .iter()
                        .map(|(_, def)| def)
                        .find(|def| &*def.dest == dest.as_str())
                });
                let Some(def) = def else {
                    continue;
                };
                if !seen_definitions.insert(def.span.start) {
                    continue;
                }
                locate_after(text, def.span.clone(), "]:", &dest)
            }
            _ => None,
        };
        match span {
            Some(span) => references.push(AssetReference {
                document_id: id.to_string(),
                url: dest,
                span,
                resolved: None,
            }),
            None => tracing::debug!(document = id, url = %dest, "image destination not found in source"),
        }
    }
    references
}

/// Finds `dest` written literally after some `marker` inside `within`,
/// skipping whitespace and an opening `<`.
fn locate_after(text: &str, within: Range<usize>, marker: &str, dest: &str) -> Option<Range<usize>> {
    let slice = text.get(within.clone())?;
    for (pos, _) in slice.match_indices(marker) {
        let after = &slice[pos + marker.len()..];
        let trimmed = after.trim_start();
        let trimmed = trimmed.strip_prefix('<').unwrap_or(trimmed);
        if trimmed.starts_with(dest) {
            let start = within.start + (slice.len() - trimmed.len());
            return Some(start..start + dest.len());
        }
    }
    None
}
