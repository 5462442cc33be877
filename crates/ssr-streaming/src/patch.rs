//! Wire format for out-of-order patches.
//!
//! An incremental response is a sequence of text chunks:
//! 1. the shell, with every pending subtree wrapped in a placeholder
//!    `<div data-slot="N">` showing its fallback,
//! 2. one patch per slot, each a `<template data-patch="N">` holding the
//!    final markup plus a script call that swaps it into place,
//! 3. the terminator comment.
//!
//! The first patch is prefixed with the small runtime defining the swap
//! function.

use ssr_core::SlotId;

/// Script defining the client-side swap function.
pub const PATCH_RUNTIME: &str = r#"<script>function $ssrPatch(n){var t=document.querySelector('template[data-patch="'+n+'"]'),p=document.querySelector('[data-slot="'+n+'"]');if(t&&p){p.replaceWith(t.content)}if(t){t.remove()}}</script>"#;

/// Marks the end of an incremental response.
pub const TERMINATOR: &str = "<!--ssr:end-->";

const PLACEHOLDER_OPEN: &str = r#"<div data-slot=""#;
const PATCH_OPEN: &str = r#"<template data-patch=""#;
const PATCH_CALL: &str = "</template><script>$ssrPatch(";

/// Wrap a fallback in the placeholder for `slot`.
pub fn placeholder(slot: SlotId, fallback: &str) -> String {
    format!(r#"{}{}">{}</div>"#, PLACEHOLDER_OPEN, slot, fallback)
}

/// Build the patch record replacing `slot` with `markup`.
pub fn patch_record(slot: SlotId, markup: &str) -> String {
    format!(
        r#"{}{}">{}{}{})</script>"#,
        PATCH_OPEN, slot, markup, PATCH_CALL, slot
    )
}

/// A chunk of an incremental response, as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireChunk {
    /// Initial document with placeholders.
    Shell(String),
    /// Replacement markup for one placeholder.
    Patch {
        /// Placeholder being replaced.
        slot: SlotId,
        /// Final markup.
        markup: String,
    },
    /// End of the response.
    Terminator,
}

impl WireChunk {
    /// Classify one written chunk.
    pub fn classify(chunk: &str) -> Self {
        if chunk == TERMINATOR {
            return Self::Terminator;
        }

        let body = chunk.strip_prefix(PATCH_RUNTIME).unwrap_or(chunk);
        match parse_patch(body) {
            Some((slot, markup)) => Self::Patch {
                slot,
                markup: markup.to_string(),
            },
            None => Self::Shell(chunk.to_string()),
        }
    }

    /// Slot id if this is a patch.
    pub fn slot(&self) -> Option<SlotId> {
        match self {
            Self::Patch { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

fn parse_patch(body: &str) -> Option<(SlotId, &str)> {
    let rest = body.strip_prefix(PATCH_OPEN)?;
    let (id, rest) = rest.split_once("\">")?;
    let slot = SlotId(id.parse().ok()?);
    let end = rest.rfind(PATCH_CALL)?;
    let tail = &rest[end + PATCH_CALL.len()..];
    if tail != format!("{})</script>", slot) {
        return None;
    }
    Some((slot, &rest[..end]))
}

/// Apply patches to shell markup the way the client runtime would.
///
/// Each placeholder element (including its fallback) is replaced by the
/// patch markup. Placeholders without a patch keep their fallback.
pub fn apply_patches(shell: &str, patches: &[(SlotId, String)]) -> String {
    let mut html = shell.to_string();
    for (slot, markup) in patches {
        let open = format!(r#"{}{}">"#, PLACEHOLDER_OPEN, slot);
        let Some(start) = html.find(&open) else {
            continue;
        };
        if let Some(end) = matching_div_end(&html, start + open.len()) {
            html.replace_range(start..end, markup);
        }
    }
    html
}

/// Byte offset just past the `</div>` closing the div opened before `from`.
fn matching_div_end(html: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut pos = from;
    loop {
        let rest = &html[pos..];
        let close = rest.find("</div>")?;
        match find_div_open(rest) {
            Some(open) if open < close => {
                depth += 1;
                pos += open + 4;
            }
            _ => {
                depth -= 1;
                pos += close + 6;
                if depth == 0 {
                    return Some(pos);
                }
            }
        }
    }
}

/// Offset of the next `<div` that opens a div element, not a longer tag
/// name such as `<divider>`.
fn find_div_open(html: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(found) = html[offset..].find("<div") {
        let at = offset + found;
        match html.as_bytes().get(at + 4) {
            Some(b'>' | b'/') => return Some(at),
            Some(b) if b.is_ascii_whitespace() => return Some(at),
            _ => offset = at + 4,
        }
    }
    None
}
