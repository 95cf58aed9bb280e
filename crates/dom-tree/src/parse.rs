//! Tolerant HTML fragment parser.
//!
//! Handles the subset of HTML that templates produce: elements with quoted,
//! unquoted and bare attributes, void elements, raw-text elements, comments,
//! character references and a few implied end tags. Declarative shadow roots
//! (`<template shadowrootmode="open">`) attach their content to the parent
//! element's shadow root. Malformed input never fails; stray end tags are
//! dropped and unclosed elements are closed at the end.

use crate::document::{Document, DomTree};
use crate::node::{ElementData, NodeId, NodeKind, ShadowRootMode};
use smol_str::SmolStr;

/// HTML void elements, which never have children or end tags.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is raw text.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Opening any of these implicitly closes an open `<p>`.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre", "section",
    "table", "ul",
];

/// Returns true if the given element name is an HTML void element.
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str())
}

/// Decodes character references in text or attribute values.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let name = &rest[1..end];
            let ch = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => {
                    let code = if let Some(hex) = name
                        .strip_prefix("#x")
                        .or_else(|| name.strip_prefix("#X"))
                    {
                        u32::from_str_radix(hex, 16).ok()
                    } else if let Some(dec) = name.strip_prefix('#') {
                        dec.parse().ok()
                    } else {
                        None
                    };
                    code.and_then(char::from_u32)
                }
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Open containers, innermost last. The first entry is the fragment.
    stack: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn current(&self) -> NodeId {
        self.stack[self.stack.len() - 1]
    }

    fn append(&self, tree: &mut DomTree, node: NodeId) {
        let parent = self.current();
        tree.nodes[node.index()].parent = Some(parent);
        tree.nodes[parent.index()].children.push(node);
    }

    fn current_tag<'t>(&self, tree: &'t DomTree) -> Option<&'t str> {
        tree.element(self.current()).map(|e| e.tag.as_str())
    }

    fn text(&mut self, tree: &mut DomTree, text: &str) {
        if text.is_empty() {
            return;
        }
        let decoded = decode_entities(text);
        // Merge with a preceding text sibling.
        let parent = self.current();
        if let Some(&last) = tree.children(parent).last() {
            if let Some(NodeKind::Text(existing)) = tree.node_mut(last).map(|n| &mut n.kind) {
                existing.push_str(&decoded);
                return;
            }
        }
        let node = tree.push(NodeKind::Text(decoded));
        self.append(tree, node);
    }

    fn run(&mut self, tree: &mut DomTree) {
        while self.pos < self.src.len() {
            self.step(tree);
        }
    }

    fn end_tag(&mut self, tree: &mut DomTree) {
        let rest = self.rest();
        let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
        let name = rest[2..end]
            .trim_end_matches('>')
            .trim()
            .to_ascii_lowercase();
        self.pos += end;
        self.close(tree, &name);
    }

    /// Pops up to and including the nearest open `name`; ignores stray tags.
    fn close(&mut self, tree: &DomTree, name: &str) {
        let found = self
            .stack
            .iter()
            .rposition(|&id| tree.element(id).is_some_and(|e| e.tag == name));
        if let Some(index) = found {
            if index > 0 {
                self.stack.truncate(index);
            }
        }
    }

    fn start_tag(&mut self, tree: &mut DomTree) {
        let bytes = self.src.as_bytes();
        let mut i = self.pos + 1;
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/'
        {
            i += 1;
        }
        let tag = self.src[name_start..i].to_ascii_lowercase();
        let mut element = ElementData::new(&tag);
        let mut self_closing = false;

        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() {
                break;
            }
            match bytes[i] {
                b'>' => {
                    i += 1;
                    break;
                }
                b'/' => {
                    self_closing = true;
                    i += 1;
                    continue;
                }
                _ => {}
            }
            self_closing = false;
            let attr_start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'=' | b'>')
                && !(bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>'))
            {
                i += 1;
            }
            let name = self.src[attr_start..i].to_ascii_lowercase();
            let mut j = i;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let mut value = String::new();
            if j < bytes.len() && bytes[j] == b'=' {
                j += 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < bytes.len() && (bytes[j] == b'"' || bytes[j] == b'\'') {
                    let quote = bytes[j];
                    let value_start = j + 1;
                    let value_end = self.src[value_start..]
                        .find(quote as char)
                        .map(|k| value_start + k)
                        .unwrap_or(bytes.len());
                    value = decode_entities(&self.src[value_start..value_end]);
                    i = (value_end + 1).min(bytes.len());
                } else {
                    let value_start = j;
                    while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                        j += 1;
                    }
                    value = decode_entities(&self.src[value_start..j]);
                    i = j;
                }
            }
            if !name.is_empty() && !element.attrs.contains_key(name.as_str()) {
                element.attrs.insert(SmolStr::new(&name), value);
            }
        }
        self.pos = i;

        self.imply_end_tags(tree, &tag);

        if tag == "template" {
            let mode = element
                .attrs
                .get("shadowrootmode")
                .and_then(|m| ShadowRootMode::parse(m));
            let host = self.current();
            let can_host = tree.element(host).is_some_and(|e| e.shadow_root.is_none());
            if let (Some(mode), true) = (mode, can_host) {
                let root = tree.push(NodeKind::ShadowRoot { host, mode });
                if let Some(e) = tree.element_mut(host) {
                    e.shadow_root = Some(root);
                }
                self.stack.push(root);
                self.parse_shadow_content(tree);
                return;
            }
        }

        let id = tree.push(NodeKind::Element(element));
        self.append(tree, id);
        if is_void_element(&tag) || self_closing {
            return;
        }
        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            let closer = format!("</{tag}");
            let rest = self.rest();
            let end = find_ascii_ci(rest, &closer).unwrap_or(rest.len());
            let raw = &rest[..end];
            if !raw.is_empty() {
                let text = if tag == "textarea" || tag == "title" {
                    decode_entities(raw)
                } else {
                    raw.to_string()
                };
                let node = tree.push(NodeKind::Text(text));
                tree.nodes[node.index()].parent = Some(id);
                tree.nodes[id.index()].children.push(node);
            }
            self.pos += end;
            let rest = self.rest();
            if !rest.is_empty() {
                let close = rest.find('>').map(|k| k + 1).unwrap_or(rest.len());
                self.pos += close;
            }
            return;
        }
        self.stack.push(id);
    }

    /// Parses until the matching `</template>`, then pops the shadow root.
    fn parse_shadow_content(&mut self, tree: &mut DomTree) {
        let depth = self.stack.len();
        while self.pos < self.src.len() && self.stack.len() >= depth {
            let rest = self.rest();
            if rest.starts_with("</") && self.stack.len() == depth {
                let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
                let name = rest[2..end].trim_end_matches('>').trim().to_ascii_lowercase();
                if name == "template" {
                    self.pos += end;
                    break;
                }
            }
            let before = self.pos;
            self.step(tree);
            if self.pos == before {
                break;
            }
        }
        self.stack.truncate(depth - 1);
    }

    /// Parses one token.
    fn step(&mut self, tree: &mut DomTree) {
        let rest = self.rest();
        if let Some(lt) = rest.find('<') {
            if lt > 0 {
                self.text(tree, &rest[..lt]);
                self.pos += lt;
                return;
            }
        } else {
            self.text(tree, rest);
            self.pos = self.src.len();
            return;
        }
        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body.find("-->").unwrap_or(body.len());
            let node = tree.push(NodeKind::Comment(body[..end].to_string()));
            self.append(tree, node);
            self.pos += 4 + (end + 3).min(body.len());
        } else if rest.starts_with("</") {
            self.end_tag(tree);
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
            self.pos += end;
        } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            self.start_tag(tree);
        } else {
            self.text(tree, "<");
            self.pos += 1;
        }
    }

    fn imply_end_tags(&mut self, tree: &DomTree, tag: &str) {
        let current = self.current_tag(tree).map(str::to_string);
        let Some(current) = current else {
            return;
        };
        let closes = match (current.as_str(), tag) {
            ("li", "li") | ("option", "option") | ("dt" | "dd", "dt" | "dd") => true,
            ("td" | "th", "td" | "th" | "tr") | ("tr", "tr") => true,
            ("p", t) => CLOSES_P.contains(&t),
            _ => false,
        };
        if closes {
            self.stack.pop();
        }
    }
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.len() > h.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Parses `html` into `container`'s child list.
pub(crate) fn parse_into(tree: &mut DomTree, container: NodeId, html: &str) {
    let mut parser = Parser {
        src: html,
        pos: 0,
        stack: vec![container],
    };
    parser.run(tree);
}

impl Document {
    /// Parses markup into a new detached fragment.
    pub fn parse_fragment(&self, html: &str) -> NodeId {
        self.with_mut(|t| {
            let fragment = t.push(NodeKind::Fragment);
            parse_into(t, fragment, html);
            fragment
        })
    }

    /// Replaces the children of `id` with parsed markup.
    pub fn set_inner_html(&self, id: NodeId, html: &str) {
        self.clear_children(id);
        self.with_mut(|t| parse_into(t, id, html));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#39;&#x41;"), "a & b <c> 'A");
        assert_eq!(decode_entities("AT&T &unknown;"), "AT&T &unknown;");
    }

    #[test]
    fn test_parse_attributes() {
        let doc = Document::new();
        let fragment = doc.parse_fragment("<input type=checkbox checked data-x='1' title=\"a &amp; b\">");
        let input = doc.children(fragment)[0];
        assert_eq!(
            doc.attributes(input),
            vec![
                ("type".into(), "checkbox".to_string()),
                ("checked".into(), String::new()),
                ("data-x".into(), "1".to_string()),
                ("title".into(), "a & b".to_string()),
            ]
        );
        assert!(doc.children(input).is_empty());
    }

    #[test]
    fn test_implied_end_tags() {
        let doc = Document::new();
        let fragment = doc.parse_fragment("<ul><li>a<li>b</ul><p>x<div>y</div>");
        let ul = doc.children(fragment)[0];
        assert_eq!(doc.element_children(ul).len(), 2);
        assert_eq!(doc.element_children(fragment).len(), 3);
    }

    #[test]
    fn test_raw_text() {
        let doc = Document::new();
        let fragment = doc.parse_fragment("<style>.a > b { x: 1 }</style><p>t</p>");
        let style = doc.children(fragment)[0];
        assert_eq!(doc.text_content(style), ".a > b { x: 1 }");
        assert_eq!(doc.children(fragment).len(), 2);
    }

    #[test]
    fn test_declarative_shadow_root() {
        let doc = Document::from_html(
            "<x-card><template shadowrootmode=\"open\"><b>inside</b></template><i>light</i></x-card>",
        );
        let host = doc.element_children(doc.body())[0];
        let shadow = doc.shadow_root(host).unwrap();
        assert_eq!(doc.text_content(shadow), "inside");
        assert_eq!(doc.text_content(host), "light");
    }

    #[test]
    fn test_stray_end_tag_dropped() {
        let doc = Document::new();
        let fragment = doc.parse_fragment("a</div>b");
        assert_eq!(doc.text_content(fragment), "ab");
    }
}
