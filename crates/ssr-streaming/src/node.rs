//! Component tree with static and async parts.

use std::fmt;
use std::future::Future;

use futures::future::{BoxFuture, FutureExt};

/// The pending computation behind an async node.
pub type Computation = BoxFuture<'static, anyhow::Result<String>>;

/// A subtree whose markup is produced later by a computation.
///
/// Until the computation settles the page shows `fallback` in its place.
pub struct AsyncNode {
    /// Optional caller-chosen key; must be unique within a tree.
    pub key: Option<String>,
    /// Markup shown while the computation is pending.
    pub fallback: String,
    /// Computation resolving to the final markup.
    pub computation: Computation,
}

impl AsyncNode {
    /// Create an async node from a fallback and a future.
    pub fn new<F>(fallback: impl Into<String>, computation: F) -> Self
    where
        F: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            key: None,
            fallback: fallback.into(),
            computation: computation.boxed(),
        }
    }

    /// Attach a key used for diagnostics and duplicate detection.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl fmt::Debug for AsyncNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncNode")
            .field("key", &self.key)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// An HTML element with attributes and children.
#[derive(Debug)]
pub struct Element {
    /// Tag name.
    pub tag: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    /// Child nodes.
    pub children: Vec<ComponentNode>,
}

impl Element {
    /// Create an empty element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Append a child.
    pub fn child(mut self, node: impl Into<ComponentNode>) -> Self {
        self.children.push(node.into());
        self
    }

    /// Append several children.
    pub fn children<I>(mut self, nodes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ComponentNode>,
    {
        self.children.extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Whether this is a void element (no children, no closing tag).
    pub fn is_void(&self) -> bool {
        matches!(
            self.tag.as_str(),
            "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
                | "source" | "track" | "wbr"
        )
    }
}

/// A node in the component tree.
///
/// The tree is consumed by the shell renderer; it is never mutated once
/// rendering begins.
#[derive(Debug)]
pub enum ComponentNode {
    /// Pre-rendered markup, written verbatim.
    Static(String),
    /// Text content, escaped on render.
    Text(String),
    /// An element with children.
    Element(Element),
    /// A list of siblings without a wrapper.
    Fragment(Vec<ComponentNode>),
    /// A pending subtree.
    Async(AsyncNode),
}

impl ComponentNode {
    /// Raw markup node.
    pub fn markup(html: impl Into<String>) -> Self {
        Self::Static(html.into())
    }

    /// Escaped text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Sibling list.
    pub fn fragment<I>(nodes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ComponentNode>,
    {
        Self::Fragment(nodes.into_iter().map(Into::into).collect())
    }

    /// Async boundary showing `fallback` until `computation` settles.
    pub fn suspense<F>(fallback: impl Into<String>, computation: F) -> Self
    where
        F: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self::Async(AsyncNode::new(fallback, computation))
    }

    /// Number of async nodes in this subtree.
    pub fn count_async(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Async(_) => count += 1,
                Self::Element(el) => stack.extend(el.children.iter()),
                Self::Fragment(children) => stack.extend(children.iter()),
                Self::Static(_) | Self::Text(_) => {}
            }
        }
        count
    }
}

impl From<Element> for ComponentNode {
    fn from(el: Element) -> Self {
        Self::Element(el)
    }
}

impl From<AsyncNode> for ComponentNode {
    fn from(node: AsyncNode) -> Self {
        Self::Async(node)
    }
}

/// Escape text for use in HTML content and attribute values.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
