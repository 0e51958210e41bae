// Thin navigation layer over the html5ever/rcdom tree.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

pub fn html5_parse(input: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(input)
}

pub fn tag_lower(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
        _ => None,
    }
}

pub fn attr(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| str::eq_ignore_ascii_case(&a.name.local, name))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

pub fn has_attr(node: &Handle, name: &str) -> bool {
    attr(node, name).is_some()
}

pub fn has_class(node: &Handle, class: &str) -> bool {
    attr(node, "class")
        .map(|c| c.split_ascii_whitespace().any(|x| x == class))
        .unwrap_or(false)
}

pub fn children(node: &Handle) -> Vec<Handle> {
    node.children.borrow().clone()
}

pub fn parent(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let strong = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    strong
}

/// All descendants of `root` (excluding `root`) matching `pred`, in document order.
pub fn find_all<P>(root: &Handle, pred: P) -> Vec<Handle>
where
    P: Fn(&Handle) -> bool,
{
    fn walk<P: Fn(&Handle) -> bool>(node: &Handle, pred: &P, out: &mut Vec<Handle>) {
        for c in node.children.borrow().iter() {
            if pred(c) {
                out.push(c.clone());
            }
            walk(c, pred, out);
        }
    }

    let mut out = Vec::new();
    walk(root, &pred, &mut out);
    out
}

/// First descendant of `root` matching `pred`, in document order.
pub fn find_first<P>(root: &Handle, pred: P) -> Option<Handle>
where
    P: Fn(&Handle) -> bool,
{
    fn walk<P: Fn(&Handle) -> bool>(node: &Handle, pred: &P) -> Option<Handle> {
        for c in node.children.borrow().iter() {
            if pred(c) {
                return Some(c.clone());
            }
            if let Some(found) = walk(c, pred) {
                return Some(found);
            }
        }
        None
    }

    walk(root, &pred)
}

pub fn is_element(node: &Handle, tag: &str) -> bool {
    tag_lower(node).is_some_and(|t| t == tag)
}

pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    fn walk(node: &Handle, out: &mut String) {
        if let NodeData::Text { contents } = &node.data {
            out.push_str(&contents.borrow());
        }
        for c in node.children.borrow().iter() {
            walk(c, out);
        }
    }
    walk(node, &mut out);
    out
}
