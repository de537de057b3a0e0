use std::collections::HashMap;

use scraper::{ElementRef, Html, Node};

// ============================================================================
// Document tree: arena of nodes built from a scraper parse
// ============================================================================

/// Index of a node inside a `Document` arena.
///
/// Nodes are pushed in pre-order, so comparing two ids compares their
/// position in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// An element's tag name and attributes, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Doctype(String),
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct DocumentNode {
    pub data: NodeData,
    /// Non-owning back-reference; `None` only for the root.
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Read-only markup tree. The root is always `NodeId(0)`.
///
/// The arena is for navigation; serialization goes back to the parsed
/// `Html` through `tree_ids`, which holds the scraper node behind each
/// arena slot.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<DocumentNode>,
    html: Html,
    tree_ids: Vec<ego_tree::NodeId>,
}

/// Elements without an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

impl Document {
    /// Parse a full HTML document.
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut nodes: Vec<DocumentNode> = Vec::new();
        let mut tree_ids = Vec::new();
        let mut index = HashMap::new();

        // descendants() is pre-order, so every parent is imported before its children
        for node in parsed.tree.root().descendants() {
            let data = match node.value() {
                Node::Document | Node::Fragment => NodeData::Document,
                Node::Doctype(doctype) => NodeData::Doctype(doctype.name().to_string()),
                Node::Comment(comment) => NodeData::Comment(comment.to_string()),
                Node::Text(text) => NodeData::Text(text.to_string()),
                Node::Element(element) => NodeData::Element(ElementData {
                    tag: element.name().to_ascii_lowercase(),
                    attrs: element
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                }),
                // processing instructions carry nothing we serialize
                _ => continue,
            };

            let parent = node.parent().and_then(|p| index.get(&p.id()).copied());
            if nodes.is_empty() == parent.is_some() {
                // orphan under a skipped node, or a second root
                continue;
            }

            let id = NodeId(nodes.len());
            if let Some(NodeId(p)) = parent {
                nodes[p].children.push(id);
            }
            nodes.push(DocumentNode {
                data,
                parent,
                children: Vec::new(),
            });
            tree_ids.push(node.id());
            index.insert(node.id(), id);
        }

        if nodes.is_empty() {
            nodes.push(DocumentNode {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            });
            tree_ids.push(parsed.tree.root().id());
        }

        Self {
            nodes,
            html: parsed,
            tree_ids,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> &DocumentNode {
        &self.nodes[id.0]
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// All elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = (NodeId, &ElementData)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| match &n.data {
                NodeData::Element(el) => Some((NodeId(i), el)),
                _ => None,
            })
    }

    /// Ancestors from the parent up to (and including) the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Siblings before `id`, nearest first.
    pub fn preceding_siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let (siblings, pos) = self.sibling_slot(id);
        siblings[..pos].iter().rev().copied()
    }

    /// Siblings after `id`, nearest first.
    pub fn following_siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let (siblings, pos) = self.sibling_slot(id);
        let start = (pos + 1).min(siblings.len());
        siblings[start..].iter().copied()
    }

    fn sibling_slot(&self, id: NodeId) -> (&[NodeId], usize) {
        match self.parent(id) {
            Some(p) => {
                let siblings = self.children(p);
                let pos = siblings.iter().position(|&c| c == id).unwrap_or(siblings.len());
                (siblings, pos)
            }
            None => (&[][..], 0),
        }
    }

    /// First element whose `id` attribute equals `value`.
    pub fn find_by_id(&self, value: &str) -> Option<NodeId> {
        self.find_by_attr("id", value)
    }

    pub fn find_by_attr(&self, name: &str, value: &str) -> Option<NodeId> {
        self.elements()
            .find(|(_, el)| el.attr(name) == Some(value))
            .map(|(id, _)| id)
    }

    // ------------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------------

    /// Serialize a node and its whole subtree with html5ever's rules.
    pub fn outer_html(&self, id: NodeId) -> String {
        let Some(node) = self.html.tree.get(self.tree_ids[id.0]) else {
            return String::new();
        };
        match node.value() {
            Node::Document | Node::Fragment => self.html.html(),
            _ => match ElementRef::wrap(node) {
                Some(element) => element.html(),
                None => {
                    // text, comment, doctype: serialize a one-node fragment
                    let mut fragment = Html::new_fragment();
                    fragment.tree.root_mut().append(node.value().clone());
                    fragment.html()
                }
            },
        }
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.outer_html(self.root())
    }

    /// Open tag of an element with its attributes, e.g. `<form id="f">`.
    /// Empty for non-element nodes.
    pub fn open_tag(&self, id: NodeId) -> String {
        let Some(el) = self.element(id) else {
            return String::new();
        };
        let mut out = format!("<{}", el.tag);
        for (name, value) in &el.attrs {
            out.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
        }
        out.push('>');
        out
    }

    /// Close tag of an element; empty for void elements and non-elements.
    pub fn close_tag(&self, id: NodeId) -> String {
        match self.element(id) {
            Some(el) if !VOID_ELEMENTS.contains(&el.tag.as_str()) => format!("</{}>", el.tag),
            _ => String::new(),
        }
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('\u{a0}', "&nbsp;")
        .replace('"', "&quot;")
}
