//! Read-only access to parsed documents and recursive node filtering

use ego_tree::NodeId;
use scraper::{Html, Node};

use crate::utils::ARTICLE_PATH_PREFIX;

/// The kind of a node in a document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    /// Comments, doctypes and processing instructions
    Other,
}

/// A navigable, immutable document tree.
///
/// The link resolution logic only needs these few capabilities, so it can run
/// against a parsed HTML page as well as against hand-built fixtures.
pub trait NodeTree {
    type Id: Copy;

    fn root(&self) -> Self::Id;

    /// Child nodes in document order
    fn children(&self, id: Self::Id) -> Vec<Self::Id>;

    fn kind(&self, id: Self::Id) -> NodeKind;

    /// Tag name of an element node, `None` for every other kind
    fn tag(&self, id: Self::Id) -> Option<&str>;

    fn attr(&self, id: Self::Id, key: &str) -> Option<&str>;

    /// Content of a text node, `None` for every other kind
    fn text(&self, id: Self::Id) -> Option<&str>;

    /// Check whether the node is an element with the given tag name
    fn is_element(&self, id: Self::Id, tag: &str) -> bool {
        self.kind(id) == NodeKind::Element && self.tag(id) == Some(tag)
    }
}

impl NodeTree for Html {
    type Id = NodeId;

    fn root(&self) -> NodeId {
        self.tree.root().id()
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .get(id)
            .map(|node| node.children().map(|child| child.id()).collect())
            .unwrap_or_default()
    }

    fn kind(&self, id: NodeId) -> NodeKind {
        match self.tree.get(id).map(|node| node.value()) {
            Some(Node::Document) | Some(Node::Fragment) => NodeKind::Document,
            Some(Node::Element(_)) => NodeKind::Element,
            Some(Node::Text(_)) => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag(&self, id: NodeId) -> Option<&str> {
        self.tree.get(id)?.value().as_element().map(|element| element.name())
    }

    fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.tree.get(id)?.value().as_element()?.attr(key)
    }

    fn text(&self, id: NodeId) -> Option<&str> {
        match self.tree.get(id)?.value() {
            Node::Text(text) => Some(&**text),
            _ => None,
        }
    }
}

/// Collect all descendants of `root` matching the predicate, in document order
pub fn filter<T, P>(tree: &T, root: T::Id, predicate: P) -> Vec<T::Id>
where
    T: NodeTree + ?Sized,
    P: Fn(&T, T::Id) -> bool,
{
    filter_terminate(tree, root, |_, _| false, predicate)
}

/// Collect all descendants of `root` matching the predicate, in document order.
///
/// Nodes for which `terminate` holds are still tested against the predicate,
/// but their subtrees are never entered.
pub fn filter_terminate<T, F, P>(
    tree: &T,
    root: T::Id,
    terminate: F,
    predicate: P,
) -> Vec<T::Id>
where
    T: NodeTree + ?Sized,
    F: Fn(&T, T::Id) -> bool,
    P: Fn(&T, T::Id) -> bool,
{
    let mut matches = Vec::new();
    collect_matches(tree, root, &terminate, &predicate, &mut matches);
    matches
}

fn collect_matches<T, F, P>(
    tree: &T,
    id: T::Id,
    terminate: &F,
    predicate: &P,
    matches: &mut Vec<T::Id>,
)
where
    T: NodeTree + ?Sized,
    F: Fn(&T, T::Id) -> bool,
    P: Fn(&T, T::Id) -> bool,
{
    for child in tree.children(id) {
        if predicate(tree, child) {
            matches.push(child);
        }
        if !terminate(tree, child) {
            collect_matches(tree, child, terminate, predicate, matches);
        }
    }
}

/// Check if a node is a `<p>` element
pub fn is_paragraph<T: NodeTree + ?Sized>(tree: &T, id: T::Id) -> bool {
    tree.is_element(id, "p")
}

/// Check if a node is a `<table>` element
pub fn is_table<T: NodeTree + ?Sized>(tree: &T, id: T::Id) -> bool {
    tree.is_element(id, "table")
}

/// Check if a node is a link to another article of the same wiki.
///
/// Links into sections (`#fragment`) don't count.
pub fn is_article_link<T: NodeTree + ?Sized>(tree: &T, id: T::Id) -> bool {
    tree.is_element(id, "a")
        && tree
            .attr(id, "href")
            .map_or(false, |href| href.starts_with(ARTICLE_PATH_PREFIX) && !href.contains('#'))
}
