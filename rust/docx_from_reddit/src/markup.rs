//! Inline markup of a message body and its flattening into styled runs.
//!
//! The DOM is classified once into [`Markup`] when a message is read; the
//! flattener then only matches on the enum.

use crate::dom::{children, tag_lower};
use markup5ever_rcdom::{Handle, NodeData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    Text(String),
    Break,
    Link { href: String, children: Vec<Markup> },
    Emphasis(Vec<Markup>),
    Strong(Vec<Markup>),
    ListItem(Vec<Markup>),
    /// A `<p>` whose parent is a `<blockquote>`.
    QuoteParagraph(Vec<Markup>),
    Superscript(Vec<Markup>),
    Strike(Vec<Markup>),
    Container(Vec<Markup>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub superscript: bool,
    pub strike: bool,
}

/// Decorations accumulated on the way from a paragraph root to a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decor {
    pub link: Option<String>,
    pub style: RunStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run {
    Text { text: String, style: RunStyle },
    Link { text: String, href: String },
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Run::Text {
            text: text.into(),
            style: RunStyle::default(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Run::Text { text, .. } | Run::Link { text, .. } => text,
        }
    }
}

pub const LINE_BREAK: &str = "\n";
pub const LIST_BULLET: &str = "\n - ";
pub const QUOTE_MARK: &str = "\n > ";

impl Markup {
    /// Classify a DOM node. `in_blockquote` is whether the node's parent is a
    /// `<blockquote>`. Comments, doctypes and the like have no markup.
    pub fn from_node(node: &Handle, in_blockquote: bool) -> Option<Markup> {
        match &node.data {
            NodeData::Text { contents } => Some(Markup::Text(contents.borrow().to_string())),
            NodeData::Element { .. } => {
                let tag = tag_lower(node)?;
                let kids = || Markup::children_of(node, tag == "blockquote");
                let markup = match tag.as_str() {
                    "br" => Markup::Break,
                    "a" => match crate::dom::attr(node, "href").filter(|h| !h.is_empty()) {
                        Some(href) => Markup::Link {
                            href,
                            children: kids(),
                        },
                        None => Markup::Container(kids()),
                    },
                    "em" => Markup::Emphasis(kids()),
                    "strong" => Markup::Strong(kids()),
                    "li" => Markup::ListItem(kids()),
                    "p" if in_blockquote => Markup::QuoteParagraph(kids()),
                    "sup" => Markup::Superscript(kids()),
                    "del" => Markup::Strike(kids()),
                    _ => Markup::Container(kids()),
                };
                Some(markup)
            }
            _ => None,
        }
    }

    pub fn children_of(node: &Handle, node_is_blockquote: bool) -> Vec<Markup> {
        children(node)
            .iter()
            .filter_map(|c| Markup::from_node(c, node_is_blockquote))
            .collect()
    }

    /// Split a body container into paragraphs, one per child. Whitespace-only
    /// text between blocks is not a paragraph.
    pub fn paragraphs_of(body: &Handle) -> Vec<Vec<Markup>> {
        let mut paragraphs = Vec::new();
        for child in children(body) {
            match &child.data {
                NodeData::Text { contents } => {
                    let text = contents.borrow().to_string();
                    if !text.trim().is_empty() {
                        paragraphs.push(vec![Markup::Text(text)]);
                    }
                }
                NodeData::Element { .. } => {
                    let quote = tag_lower(&child).as_deref() == Some("blockquote");
                    paragraphs.push(Markup::children_of(&child, quote));
                }
                _ => {}
            }
        }
        paragraphs
    }
}

/// Flatten `node` under the decorations in `decor`, appending to `out`.
pub fn flatten_into(node: &Markup, decor: &Decor, out: &mut Vec<Run>) {
    let mut next = decor.clone();
    let kids = match node {
        Markup::Text(raw) => {
            decorate(raw, decor, out);
            return;
        }
        Markup::Break => {
            out.push(Run::plain(LINE_BREAK));
            return;
        }
        Markup::Link { href, children } => {
            next.link = Some(href.clone());
            children
        }
        Markup::Emphasis(children) => {
            next.style.italic = true;
            children
        }
        Markup::Strong(children) => {
            next.style.bold = true;
            children
        }
        Markup::ListItem(children) => {
            out.push(Run::plain(LIST_BULLET));
            children
        }
        Markup::QuoteParagraph(children) => {
            out.push(Run::plain(QUOTE_MARK));
            children
        }
        Markup::Superscript(children) => {
            next.style.superscript = true;
            children
        }
        Markup::Strike(children) => {
            next.style.strike = true;
            children
        }
        Markup::Container(children) => children,
    };
    for child in kids {
        flatten_into(child, &next, out);
    }
}

/// Flatten a body: paragraphs after the first are preceded by a line break run.
pub fn flatten_paragraphs(paragraphs: &[Vec<Markup>]) -> Vec<Run> {
    let mut out = Vec::new();
    let root = Decor::default();
    for (i, paragraph) in paragraphs.iter().enumerate() {
        if i > 0 {
            out.push(Run::plain(LINE_BREAK));
        }
        for node in paragraph {
            flatten_into(node, &root, &mut out);
        }
    }
    out
}

fn decorate(raw: &str, decor: &Decor, out: &mut Vec<Run>) {
    let text = raw.replace('\n', "");
    match &decor.link {
        Some(href) => out.push(Run::Link {
            text,
            href: href.clone(),
        }),
        None => out.push(Run::Text {
            text,
            style: decor.style,
        }),
    }
}
