//! Document chrome around application content.

use crate::node::{ComponentNode, Element};

/// Head content for the document.
#[derive(Debug, Clone, Default)]
pub struct HeadContent {
    /// Page title.
    pub title: Option<String>,
    /// Meta tags.
    pub meta: Vec<(String, String)>,
    /// Link and style tags, as raw markup.
    pub links: Vec<String>,
}

impl HeadContent {
    /// Create new head content with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Add a meta tag.
    pub fn with_meta(mut self, name: &str, content: &str) -> Self {
        self.meta.push((name.to_string(), content.to_string()));
        self
    }

    /// Add a stylesheet link.
    pub fn with_stylesheet(mut self, href: &str) -> Self {
        self.links
            .push(format!(r#"<link rel="stylesheet" href="{}">"#, href));
        self
    }

    /// Add inline CSS styles.
    pub fn with_style(mut self, css: &str) -> Self {
        self.links.push(format!("<style>{}</style>", css));
        self
    }

    /// Build the `<head>` element.
    pub fn into_node(self) -> ComponentNode {
        let mut head = Element::new("head");

        if let Some(title) = self.title {
            head = head.child(Element::new("title").child(ComponentNode::text(title)));
        }

        for (name, content) in self.meta {
            head = head.child(Element::new("meta").attr("name", name).attr("content", content));
        }

        for link in self.links {
            head = head.child(ComponentNode::markup(link));
        }

        head.into()
    }
}

/// A full HTML document: `<html>`, head and body.
#[derive(Debug)]
pub struct Document {
    head: HeadContent,
    lang: Option<String>,
    body: Vec<ComponentNode>,
}

impl Document {
    /// Create a document with the given head and an empty body.
    pub fn new(head: HeadContent) -> Self {
        Self {
            head,
            lang: None,
            body: Vec::new(),
        }
    }

    /// Set the `lang` attribute on `<html>`.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Append a body child.
    pub fn child(mut self, node: impl Into<ComponentNode>) -> Self {
        self.body.push(node.into());
        self
    }

    /// Build the component tree for the whole document.
    pub fn into_node(self) -> ComponentNode {
        let mut html = Element::new("html");
        if let Some(lang) = self.lang {
            html = html.attr("lang", lang);
        }
        html.child(self.head.into_node())
            .child(Element::new("body").children(self.body))
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShellRenderer;

    #[test]
    fn test_document_renders_head_and_body() {
        let doc = Document::new(
            HeadContent::new("Hello & welcome")
                .with_meta("viewport", "width=device-width")
                .with_style("p{margin:0}"),
        )
        .with_lang("en")
        .child(Element::new("p").child(ComponentNode::text("hi")));

        let html = ShellRenderer::new().render(doc.into_node()).unwrap().markup();
        assert_eq!(
            html,
            concat!(
                r#"<html lang="en"><head><title>Hello &amp; welcome</title>"#,
                r#"<meta name="viewport" content="width=device-width">"#,
                "<style>p{margin:0}</style></head>",
                "<body><p>hi</p></body></html>"
            )
        );
    }
}
