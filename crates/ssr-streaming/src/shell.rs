//! Shell rendering: static markup now, placeholders for pending subtrees.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use ssr_core::{RenderError, SlotId, SlotIdAllocator};

use crate::node::{escape_html, AsyncNode, Computation, ComponentNode, Element};
use crate::patch;

/// A piece of the shell: either fixed markup or a slot reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Markup known at shell time.
    Markup(String),
    /// Position of a pending subtree.
    Slot(SlotId),
}

/// The static part of a rendered tree with holes for every slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellTemplate {
    segments: Vec<Segment>,
    fallbacks: BTreeMap<SlotId, String>,
}

impl ShellTemplate {
    /// Shell markup with every slot wrapped in its placeholder.
    pub fn markup(&self) -> String {
        self.render(|id, fallback| patch::placeholder(id, fallback))
    }

    /// Shell markup with fallbacks inline and no placeholder wrappers.
    pub fn fallback_markup(&self) -> String {
        self.render(|_, fallback| fallback.to_string())
    }

    /// Fully substituted markup.
    ///
    /// Slots missing from `resolved` keep their fallback.
    pub fn substitute(&self, resolved: &BTreeMap<SlotId, String>) -> String {
        self.render(|id, fallback| {
            resolved
                .get(&id)
                .cloned()
                .unwrap_or_else(|| fallback.to_string())
        })
    }

    /// Slot ids in document order.
    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.fallbacks.keys().copied().collect()
    }

    /// Fallback markup for a slot.
    pub fn fallback(&self, id: SlotId) -> Option<&str> {
        self.fallbacks.get(&id).map(String::as_str)
    }

    /// Segments in document order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn render(&self, mut slot: impl FnMut(SlotId, &str) -> String) -> String {
        let mut html = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Markup(markup) => html.push_str(markup),
                Segment::Slot(id) => {
                    let fallback = self.fallbacks.get(id).map(String::as_str).unwrap_or("");
                    html.push_str(&slot(*id, fallback));
                }
            }
        }
        html
    }
}

/// A slot registered during shell rendering, not yet started.
pub struct RenderedSlot {
    /// Allocated id.
    pub id: SlotId,
    /// Key from the async node, if any.
    pub key: Option<String>,
    /// Fallback markup shown in the shell.
    pub fallback: String,
    /// Computation producing the final markup.
    pub computation: Computation,
}

impl fmt::Debug for RenderedSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedSlot")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// Output of the shell renderer.
#[derive(Debug)]
pub struct RenderedShell {
    /// Static markup with slot holes.
    pub template: ShellTemplate,
    /// Pending slots in pre-order.
    pub slots: Vec<RenderedSlot>,
}

impl RenderedShell {
    /// Shell markup with placeholders.
    pub fn markup(&self) -> String {
        self.template.markup()
    }

    /// Split into template and slots.
    pub fn into_parts(self) -> (ShellTemplate, Vec<RenderedSlot>) {
        (self.template, self.slots)
    }
}

enum Work {
    Node(ComponentNode),
    Close(String),
}

/// Walks a component tree once, synchronously.
///
/// Static content is rendered to markup; every async node becomes a slot
/// with a freshly allocated id. Computations are registered but never
/// polled here.
#[derive(Debug, Default)]
pub struct ShellRenderer {
    ids: SlotIdAllocator,
    keys: HashSet<String>,
    buffer: String,
    template: ShellTemplate,
    slots: Vec<RenderedSlot>,
}

impl ShellRenderer {
    /// Create a renderer with an empty id allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `root` into a shell template and its pending slots.
    ///
    /// Uses an explicit stack, so tree depth is bounded by memory only.
    pub fn render(mut self, root: ComponentNode) -> Result<RenderedShell, RenderError> {
        let mut stack = vec![Work::Node(root)];

        while let Some(work) = stack.pop() {
            match work {
                Work::Close(tag) => {
                    self.buffer.push_str("</");
                    self.buffer.push_str(&tag);
                    self.buffer.push('>');
                }
                Work::Node(ComponentNode::Static(markup)) => self.buffer.push_str(&markup),
                Work::Node(ComponentNode::Text(text)) => self.buffer.push_str(&escape_html(&text)),
                Work::Node(ComponentNode::Fragment(children)) => {
                    stack.extend(children.into_iter().rev().map(Work::Node));
                }
                Work::Node(ComponentNode::Element(el)) => self.open_element(el, &mut stack)?,
                Work::Node(ComponentNode::Async(node)) => self.register_slot(node)?,
            }
        }

        self.flush_markup();
        Ok(RenderedShell {
            template: self.template,
            slots: self.slots,
        })
    }

    fn open_element(&mut self, el: Element, stack: &mut Vec<Work>) -> Result<(), RenderError> {
        if !is_valid_name(&el.tag) {
            return Err(RenderError::MalformedTree(format!(
                "invalid tag name '{}'",
                el.tag
            )));
        }

        self.buffer.push('<');
        self.buffer.push_str(&el.tag);
        for (name, value) in &el.attrs {
            if !is_valid_name(name) {
                return Err(RenderError::MalformedTree(format!(
                    "invalid attribute name '{}' on <{}>",
                    name, el.tag
                )));
            }
            self.buffer
                .push_str(&format!(r#" {}="{}""#, name, escape_html(value)));
        }
        self.buffer.push('>');

        if el.is_void() {
            if !el.children.is_empty() {
                return Err(RenderError::MalformedTree(format!(
                    "void element <{}> has children",
                    el.tag
                )));
            }
            return Ok(());
        }

        stack.push(Work::Close(el.tag));
        stack.extend(el.children.into_iter().rev().map(Work::Node));
        Ok(())
    }

    fn register_slot(&mut self, node: AsyncNode) -> Result<(), RenderError> {
        if let Some(key) = &node.key {
            if key.is_empty() {
                return Err(RenderError::MalformedTree(
                    "async node with empty key".to_string(),
                ));
            }
            if !self.keys.insert(key.clone()) {
                return Err(RenderError::MalformedTree(format!(
                    "duplicate async node key '{}'",
                    key
                )));
            }
        }

        let id = self.ids.allocate();
        self.flush_markup();
        self.template.segments.push(Segment::Slot(id));
        if self.template.fallbacks.insert(id, node.fallback.clone()).is_some() {
            return Err(RenderError::MalformedTree(format!(
                "slot id {} assigned twice",
                id
            )));
        }

        self.slots.push(RenderedSlot {
            id,
            key: node.key,
            fallback: node.fallback,
            computation: node.computation,
        });
        Ok(())
    }

    fn flush_markup(&mut self) {
        if !self.buffer.is_empty() {
            let markup = std::mem::take(&mut self.buffer);
            self.template.segments.push(Segment::Markup(markup));
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
}
