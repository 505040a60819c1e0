//! Document model the anchoring code works against
//!
//! An arena of element and text nodes. Every node knows the span of the
//! document's concatenated text it covers, so selectors reduce to character
//! arithmetic.

use super::{AnchorError, AnchorResult, TextRange};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use std::collections::HashMap;

/// Which selector kinds a document supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentKind {
    /// Stable structure: all selector kinds
    #[default]
    Html,
    /// Regenerated on every render: only text position and quote
    Pdf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element { tag: String, id: Option<String> },
    Text,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    start: usize,
    end: usize,
}

/// A snapshot of a rendered document
#[derive(Debug, Clone)]
pub struct Document {
    kind: DocumentKind,
    uri: String,
    nodes: Vec<Node>,
    chars: Vec<char>,
    ids: HashMap<String, NodeId>,
}

const ROOT: NodeId = NodeId(0);

impl Document {
    /// Build a document from Markdown.
    ///
    /// Top-level headings open `section` elements carrying the heading's slug
    /// as id, so spans below a heading can be anchored by fragment.
    pub fn from_markdown(uri: impl Into<String>, markdown: &str) -> Self {
        let slugs = heading_slugs(markdown);
        let mut slugs = slugs.into_iter();

        let mut builder = DocumentBuilder::new(DocumentKind::Html).with_uri(uri);
        let mut sections: Vec<u8> = Vec::new();

        for event in Parser::new_ext(markdown, Options::all()) {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    let level = level as u8;
                    let slug = slugs.next();
                    if builder.depth() == sections.len() {
                        while sections.last().is_some_and(|open| *open >= level) {
                            builder.close();
                            sections.pop();
                        }
                        builder.open("section", slug.as_deref());
                        sections.push(level);
                        builder.open(&format!("h{}", level), None);
                    } else {
                        builder.open(&format!("h{}", level), slug.as_deref());
                    }
                }
                Event::Start(tag) => {
                    builder.open(element_name(&tag), None);
                }
                Event::End(tag) => {
                    builder.close();
                    if is_block(&tag) {
                        builder.text("\n");
                    }
                }
                Event::Text(text) | Event::Code(text) => {
                    builder.text(&text);
                }
                Event::SoftBreak | Event::HardBreak => {
                    builder.text("\n");
                }
                _ => {}
            }
        }

        builder.build()
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// Number of characters of text
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Concatenated text of the whole document
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn slice(&self, range: TextRange) -> AnchorResult<String> {
        self.check(range)?;
        Ok(self.chars[range.start..range.end].iter().collect())
    }

    /// Characters of `range` clipped to the document
    pub(crate) fn chars(&self, start: usize, end: usize) -> &[char] {
        let end = end.min(self.chars.len());
        &self.chars[start.min(end)..end]
    }

    pub(crate) fn check(&self, range: TextRange) -> AnchorResult<()> {
        if range.start > range.end || range.end > self.len() {
            return Err(AnchorError::InvalidRange {
                start: range.start,
                end: range.end,
                len: self.len(),
            });
        }
        Ok(())
    }

    pub fn range_of(&self, node: NodeId) -> TextRange {
        let n = &self.nodes[node.0];
        TextRange::new(n.start, n.end)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text => None,
        }
    }

    pub fn element_id(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { id, .. } => id.as_deref(),
            NodeKind::Text => None,
        }
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    /// Deepest element whose text covers `range`
    pub fn smallest_element_containing(&self, range: TextRange) -> NodeId {
        let mut current = ROOT;
        'descend: loop {
            for &child in &self.nodes[current.0].children {
                if self.tag(child).is_some() && self.range_of(child).contains(&range) {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Element holding the text node the character at `offset` belongs to.
    ///
    /// With `at_end` the character before `offset` is used, so the end of a
    /// span lands in the element the span's last character is in.
    pub(crate) fn element_at(&self, offset: usize, at_end: bool) -> NodeId {
        self.nodes
            .iter()
            .position(|n| {
                matches!(n.kind, NodeKind::Text)
                    && if at_end {
                        n.start < offset && offset <= n.end
                    } else {
                        n.start <= offset && offset < n.end
                    }
            })
            .and_then(|i| self.nodes[i].parent)
            .unwrap_or(ROOT)
    }

    /// Nearest ancestor-or-self element carrying an id
    pub(crate) fn nearest_with_id(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.element_id(n).is_some() {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    /// Path of an element from the root, e.g. `/section[1]/p[2]`
    pub fn path(&self, node: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            let tag = self.tag(current).unwrap_or("#text");
            let index = self.nodes[parent.0]
                .children
                .iter()
                .take_while(|&&c| c != current)
                .filter(|&&c| self.tag(c) == Some(tag))
                .count()
                + 1;
            segments.push(format!("{}[{}]", tag, index));
            current = parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Element at a path produced by [`Document::path`]
    pub fn by_path(&self, path: &str) -> Option<NodeId> {
        let mut current = ROOT;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let (tag, index) = match segment.split_once('[') {
                Some((tag, rest)) => (tag, rest.strip_suffix(']')?.parse::<usize>().ok()?),
                None => (segment, 1),
            };
            current = *self.nodes[current.0]
                .children
                .iter()
                .filter(|&&c| self.tag(c) == Some(tag))
                .nth(index.checked_sub(1)?)?;
        }
        Some(current)
    }
}

/// Incremental builder for [`Document`]
#[derive(Debug)]
pub struct DocumentBuilder {
    kind: DocumentKind,
    uri: String,
    nodes: Vec<Node>,
    chars: Vec<char>,
    stack: Vec<NodeId>,
}

impl DocumentBuilder {
    pub fn new(kind: DocumentKind) -> Self {
        let root = Node {
            kind: NodeKind::Element {
                tag: "body".into(),
                id: None,
            },
            parent: None,
            children: Vec::new(),
            start: 0,
            end: 0,
        };
        Self {
            kind,
            uri: String::new(),
            nodes: vec![root],
            chars: Vec::new(),
            stack: vec![ROOT],
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Open elements below the root
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn open(&mut self, tag: &str, id: Option<&str>) -> &mut Self {
        let start = self.chars.len();
        let node = self.push(Node {
            kind: NodeKind::Element {
                tag: tag.to_string(),
                id: id.filter(|i| !i.is_empty()).map(str::to_string),
            },
            parent: None,
            children: Vec::new(),
            start,
            end: start,
        });
        self.stack.push(node);
        self
    }

    pub fn text(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        let start = self.chars.len();
        self.chars.extend(text.chars());
        let end = self.chars.len();
        self.push(Node {
            kind: NodeKind::Text,
            parent: None,
            children: Vec::new(),
            start,
            end,
        });
        self
    }

    /// Close the innermost open element. The root is never closed.
    pub fn close(&mut self) -> &mut Self {
        if self.stack.len() > 1 {
            if let Some(node) = self.stack.pop() {
                self.nodes[node.0].end = self.chars.len();
            }
        }
        self
    }

    /// Shorthand for an element holding a single text run
    pub fn element(&mut self, tag: &str, id: Option<&str>, text: &str) -> &mut Self {
        self.open(tag, id).text(text).close()
    }

    pub fn build(mut self) -> Document {
        while self.stack.len() > 1 {
            self.close();
        }
        self.nodes[ROOT.0].end = self.chars.len();

        let mut ids = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if let NodeKind::Element { id: Some(id), .. } = &node.kind {
                ids.entry(id.clone()).or_insert(NodeId(i));
            }
        }

        Document {
            kind: self.kind,
            uri: self.uri,
            nodes: self.nodes,
            chars: self.chars,
            ids,
        }
    }

    fn push(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = self.stack.last().copied().unwrap_or(ROOT);
        node.parent = Some(parent);
        self.nodes[parent.0].children.push(id);
        self.nodes.push(node);
        id
    }
}

fn element_name(tag: &Tag<'_>) -> &'static str {
    match tag {
        Tag::Paragraph => "p",
        Tag::BlockQuote => "blockquote",
        Tag::CodeBlock(_) => "pre",
        Tag::List(Some(_)) => "ol",
        Tag::List(None) => "ul",
        Tag::Item => "li",
        Tag::Emphasis => "em",
        Tag::Strong => "strong",
        Tag::Strikethrough => "del",
        Tag::Link { .. } => "a",
        Tag::Image { .. } => "img",
        Tag::Table(_) => "table",
        Tag::TableHead => "thead",
        Tag::TableRow => "tr",
        Tag::TableCell => "td",
        _ => "div",
    }
}

fn is_block(tag: &TagEnd) -> bool {
    matches!(
        tag,
        TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::BlockQuote
            | TagEnd::CodeBlock
            | TagEnd::Item
            | TagEnd::TableRow
    )
}

fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Unique slugs of every heading, in document order
fn heading_slugs(markdown: &str) -> Vec<String> {
    let mut slugs = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut current: Option<String> = None;

    for event in Parser::new_ext(markdown, Options::all()) {
        match event {
            Event::Start(Tag::Heading { .. }) => current = Some(String::new()),
            Event::Text(text) | Event::Code(text) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                let base = slugify(current.take().unwrap_or_default().trim());
                let base = if base.is_empty() { "section".to_string() } else { base };
                let count = seen.entry(base.clone()).or_insert(0);
                let slug = if *count == 0 {
                    base.clone()
                } else {
                    format!("{}-{}", base, count)
                };
                *count += 1;
                slugs.push(slug);
            }
            _ => {}
        }
    }
    slugs
}
