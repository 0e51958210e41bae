use crate::dom::{attr, children, find_first, has_class, is_element, parent};
use crate::error::{Error, Result};
use crate::hierarchy::HierarchyResolver;
use crate::markup::{flatten_paragraphs, Markup, Run};
use markup5ever_rcdom::Handle;

/// Containers of replies are named `siteTable_<parent id>`.
const CONTAINER_PREFIX_LEN: usize = "siteTable_".len();

pub const DELETED_AUTHOR: &str = "[DELETED] ";
pub const EMPTY_MESSAGE: &str = "<empty message>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// The content container was absent.
    Deleted,
    Paragraphs(Vec<Vec<Markup>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub parent: String,
    pub depth: i64,
    pub author: Option<String>,
    pub body: Body,
}

impl Comment {
    /// Read one comment (or the header post) out of its DOM node.
    ///
    /// With `explicit_parent` the parent comes from batch metadata; otherwise
    /// it is read from the id of the enclosing container. The parent's depth
    /// is resolved (possibly via the deleted-ancestor lookup) before this
    /// comment's own depth is recorded.
    pub fn from_node(
        node: &Handle,
        explicit_parent: Option<&str>,
        resolver: &mut HierarchyResolver<'_>,
    ) -> Result<Comment> {
        let id = attr(node, "data-fullname")
            .ok_or_else(|| Error::MalformedResponse("comment without data-fullname".to_string()))?;

        let parent = match explicit_parent {
            Some(p) => p.to_string(),
            None => structural_parent(node)
                .ok_or_else(|| Error::MalformedResponse(format!("{id} has no enclosing container id")))?,
        };

        let depth = resolver.depth_of(&parent)? + 1;
        resolver.record(&id, depth);

        let author = attr(node, "data-author");
        let body = read_body(node);

        Ok(Comment {
            id,
            parent,
            depth,
            author,
            body,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.body == Body::Deleted
    }

    pub fn author_label(&self) -> String {
        match &self.author {
            Some(name) => format!("[{name}] "),
            None => DELETED_AUTHOR.to_string(),
        }
    }

    pub fn runs(&self) -> Vec<Run> {
        match &self.body {
            Body::Deleted => vec![Run::plain(EMPTY_MESSAGE)],
            Body::Paragraphs(paragraphs) => flatten_paragraphs(paragraphs),
        }
    }
}

fn structural_parent(node: &Handle) -> Option<String> {
    let container = parent(node)?;
    let id = attr(&container, "id")?;
    if id.len() > CONTAINER_PREFIX_LEN {
        Some(id.get(CONTAINER_PREFIX_LEN..)?.to_string())
    } else {
        Some(id)
    }
}

fn is_md(node: &Handle) -> bool {
    is_element(node, "div") && has_class(node, "md")
}

/// The body lives in the comment's own entry; replies under `.child` are not searched.
fn read_body(node: &Handle) -> Body {
    let md = children(node)
        .into_iter()
        .filter(|c| !has_class(c, "child"))
        .find_map(|c| if is_md(&c) { Some(c) } else { find_first(&c, is_md) });
    let Some(md) = md else {
        return Body::Deleted;
    };
    Body::Paragraphs(Markup::paragraphs_of(&md))
}
