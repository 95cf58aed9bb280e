//! Markup serialization.

use crate::document::{Document, DomTree};
use crate::node::{NodeId, NodeKind};
use crate::parse::is_void_element;

const RAW_TEXT_PARENTS: &[&str] = &["script", "style"];

/// Escapes text content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

/// Escapes a double-quoted attribute value.
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

fn write_node(tree: &DomTree, id: NodeId, raw: bool, out: &mut String) {
    let Some(node) = tree.node(id) else {
        return;
    };
    match &node.kind {
        NodeKind::Text(text) => {
            if raw {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attrs {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
            }
            out.push('>');
            if is_void_element(&element.tag) {
                return;
            }
            let raw = RAW_TEXT_PARENTS.contains(&element.tag.as_str());
            for &child in &node.children {
                write_node(tree, child, raw, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
        NodeKind::Document { .. } | NodeKind::Fragment | NodeKind::ShadowRoot { .. } => {
            for &child in &node.children {
                write_node(tree, child, false, out);
            }
        }
    }
}

impl Document {
    /// Serializes the children of `id`. Shadow roots are not included.
    pub fn inner_html(&self, id: NodeId) -> String {
        self.with(|t| {
            let raw = t
                .element(id)
                .is_some_and(|e| RAW_TEXT_PARENTS.contains(&e.tag.as_str()));
            let mut out = String::new();
            for &child in t.children(id) {
                write_node(t, child, raw, &mut out);
            }
            out
        })
    }

    /// Serializes `id` itself with its subtree.
    pub fn outer_html(&self, id: NodeId) -> String {
        self.with(|t| {
            let mut out = String::new();
            write_node(t, id, false, &mut out);
            out
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_roundtrip_shape() {
        let html = "<ul class=\"list\"><li data-id=\"1\">a &amp; b</li><li hidden>c</li></ul><br><!--x-->";
        let doc = Document::from_html(html);
        assert_eq!(doc.inner_html(doc.body()), html);
    }

    #[test]
    fn test_attribute_escaping() {
        let doc = Document::new();
        let el = doc.create_element("div");
        doc.set_attribute(el, "title", "say \"hi\" & <go>");
        assert_eq!(
            doc.outer_html(el),
            "<div title=\"say &quot;hi&quot; &amp; <go>\"></div>"
        );
    }

    #[test]
    fn test_script_not_escaped() {
        let doc = Document::from_html("<script>if (a < b) {}</script>");
        assert_eq!(doc.inner_html(doc.body()), "<script>if (a < b) {}</script>");
    }

    #[test]
    fn test_shadow_root_omitted() {
        let doc = Document::from_html(
            "<x-a><template shadowrootmode=\"open\"><b>in</b></template>out</x-a>",
        );
        assert_eq!(doc.inner_html(doc.body()), "<x-a>out</x-a>");
    }
}
