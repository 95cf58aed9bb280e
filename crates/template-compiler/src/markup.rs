//! Markup state tracking across literal template text.
//!
//! Literal markup is split by expressions, so `<a class="{cls}" href={url}>`
//! reaches the compiler as three chunks. [`MarkupTracker`] follows an HTML
//! tokenizer through every chunk so each expression knows whether it sits in
//! element content, inside a quoted attribute, as an unquoted attribute value,
//! or inside a start tag. Single-quoted attribute values are rewritten to
//! double quotes on the way through so rendered markup has one quoting style.

use crate::ast::ExpressionContext;
use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Text,
    Comment,
    /// Inside `<script>` or `<style>` content.
    RawText(SmolStr),
    TagName,
    EndTag,
    InTag,
    AttrName(String),
    AfterAttrName(String),
    BeforeAttrValue(String),
    QuotedValue { name: String, quote: char },
    UnquotedValue,
}

/// Follows HTML tokenizer state through literal chunks.
#[derive(Debug, Clone)]
pub(crate) struct MarkupTracker {
    state: State,
    tag_name: String,
}

impl MarkupTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Text,
            tag_name: String::new(),
        }
    }

    /// The context an expression would have at the current position.
    pub(crate) fn expression_context(&self) -> ExpressionContext {
        match &self.state {
            State::Text | State::Comment | State::RawText(_) => ExpressionContext::Text,
            State::QuotedValue { name, .. } => ExpressionContext::QuotedAttribute {
                name: SmolStr::new(name.to_ascii_lowercase()),
            },
            State::BeforeAttrValue(name) => ExpressionContext::UnquotedAttribute {
                name: SmolStr::new(name.to_ascii_lowercase()),
            },
            State::TagName
            | State::EndTag
            | State::InTag
            | State::AttrName(_)
            | State::AfterAttrName(_)
            | State::UnquotedValue => ExpressionContext::TagBody,
        }
    }

    /// Whether the cursor is somewhere inside a tag.
    pub(crate) fn in_tag(&self) -> bool {
        !matches!(
            self.state,
            State::Text | State::Comment | State::RawText(_)
        )
    }

    /// Records that an expression with `context` was emitted.
    pub(crate) fn after_expression(&mut self, context: &ExpressionContext) {
        match context {
            ExpressionContext::UnquotedAttribute { .. } | ExpressionContext::TagBody => {
                if self.in_tag() {
                    self.state = State::InTag;
                }
            }
            ExpressionContext::Text | ExpressionContext::QuotedAttribute { .. } => {}
        }
    }

    /// Feeds a literal chunk, appending its normalized form to `out`.
    pub(crate) fn feed(&mut self, chunk: &str, out: &mut String) {
        for (i, c) in chunk.char_indices() {
            match &mut self.state {
                State::Text => {
                    if c == '<' {
                        let rest = &chunk[i + 1..];
                        if rest.starts_with("!--") {
                            self.state = State::Comment;
                        } else if rest.starts_with('/') {
                            self.state = State::EndTag;
                        } else if rest.starts_with(|n: char| n.is_ascii_alphabetic()) {
                            self.tag_name.clear();
                            self.state = State::TagName;
                        }
                    }
                    out.push(c);
                }
                State::Comment => {
                    if c == '>' && out.ends_with("--") {
                        self.state = State::Text;
                    }
                    out.push(c);
                }
                State::RawText(tag) => {
                    if c == '<' {
                        let rest = &chunk[i + 1..];
                        let closer = format!("/{tag}");
                        if rest
                            .as_bytes()
                            .get(..closer.len())
                            .is_some_and(|head| head.eq_ignore_ascii_case(closer.as_bytes()))
                        {
                            self.state = State::EndTag;
                        }
                    }
                    out.push(c);
                }
                State::TagName => {
                    if c.is_whitespace() {
                        self.state = State::InTag;
                    } else if c == '>' {
                        self.close_start_tag();
                    } else if c != '/' {
                        self.tag_name.push(c.to_ascii_lowercase());
                    }
                    out.push(c);
                }
                State::EndTag => {
                    if c == '>' {
                        self.state = State::Text;
                    }
                    out.push(c);
                }
                State::InTag => {
                    if c == '>' {
                        self.close_start_tag();
                    } else if !c.is_whitespace() && c != '/' {
                        self.state = State::AttrName(c.to_string());
                    }
                    out.push(c);
                }
                State::AttrName(name) => {
                    if c == '=' {
                        let name = std::mem::take(name);
                        self.state = State::BeforeAttrValue(name);
                    } else if c == '>' {
                        self.close_start_tag();
                    } else if c.is_whitespace() {
                        let name = std::mem::take(name);
                        self.state = State::AfterAttrName(name);
                    } else if c == '/' {
                        self.state = State::InTag;
                    } else {
                        name.push(c);
                    }
                    out.push(c);
                }
                State::AfterAttrName(name) => {
                    if c == '=' {
                        let name = std::mem::take(name);
                        self.state = State::BeforeAttrValue(name);
                    } else if c == '>' {
                        self.close_start_tag();
                    } else if !c.is_whitespace() && c != '/' {
                        self.state = State::AttrName(c.to_string());
                    }
                    out.push(c);
                }
                State::BeforeAttrValue(name) => {
                    if c == '"' || c == '\'' {
                        let name = std::mem::take(name);
                        self.state = State::QuotedValue { name, quote: c };
                        out.push('"');
                    } else if c == '>' {
                        self.close_start_tag();
                        out.push(c);
                    } else if !c.is_whitespace() {
                        self.state = State::UnquotedValue;
                        out.push(c);
                    } else {
                        out.push(c);
                    }
                }
                State::QuotedValue { quote, .. } => {
                    let quote = *quote;
                    if c == quote {
                        self.state = State::InTag;
                        out.push('"');
                    } else if c == '"' {
                        out.push_str("&quot;");
                    } else {
                        out.push(c);
                    }
                }
                State::UnquotedValue => {
                    if c.is_whitespace() {
                        self.state = State::InTag;
                    } else if c == '>' {
                        self.close_start_tag();
                    }
                    out.push(c);
                }
            }
        }
    }

    fn close_start_tag(&mut self) {
        self.state = match self.tag_name.as_str() {
            "script" | "style" | "textarea" | "title" => {
                State::RawText(SmolStr::new(&self.tag_name))
            }
            _ => State::Text,
        };
    }
}

/// Removes a trailing ` name=` (with surrounding whitespace) from `html`.
///
/// Unquoted attribute expressions own their whole attribute, so the name and
/// `=` already copied into the literal markup are taken back out.
pub(crate) fn strip_attribute_prefix(html: &mut String, name: &str) -> bool {
    let trimmed = html.trim_end().len();
    html.truncate(trimmed);
    if !html.ends_with('=') {
        return false;
    }
    html.pop();
    let trimmed = html.trim_end().len();
    html.truncate(trimmed);
    let lower = html.to_ascii_lowercase();
    if !lower.ends_with(&name.to_ascii_lowercase()) {
        return false;
    }
    html.truncate(html.len() - name.len());
    let trimmed = html.trim_end().len();
    html.truncate(trimmed);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(chunks: &[&str]) -> (MarkupTracker, String) {
        let mut tracker = MarkupTracker::new();
        let mut out = String::new();
        for chunk in chunks {
            tracker.feed(chunk, &mut out);
        }
        (tracker, out)
    }

    #[test]
    fn test_text_context() {
        let (tracker, _) = feed(&["<p>Hello "]);
        assert_eq!(tracker.expression_context(), ExpressionContext::Text);
    }

    #[test]
    fn test_quoted_attribute_context() {
        let (tracker, out) = feed(&["<div class='item "]);
        assert_eq!(
            tracker.expression_context(),
            ExpressionContext::QuotedAttribute {
                name: "class".into()
            }
        );
        assert_eq!(out, "<div class=\"item ");
    }

    #[test]
    fn test_unquoted_attribute_context() {
        let (tracker, _) = feed(&["<input type=\"checkbox\" checked="]);
        assert_eq!(
            tracker.expression_context(),
            ExpressionContext::UnquotedAttribute {
                name: "checked".into()
            }
        );
    }

    #[test]
    fn test_tag_body_context() {
        let (tracker, _) = feed(&["<div "]);
        assert_eq!(tracker.expression_context(), ExpressionContext::TagBody);
    }

    #[test]
    fn test_single_quotes_normalized() {
        let (_, out) = feed(&["<div class='content' title='say \"hi\"'>Open</div>"]);
        assert_eq!(
            out,
            "<div class=\"content\" title=\"say &quot;hi&quot;\">Open</div>"
        );
    }

    #[test]
    fn test_single_quote_in_text_untouched() {
        let (_, out) = feed(&["<p>it's</p>"]);
        assert_eq!(out, "<p>it's</p>");
    }

    #[test]
    fn test_state_carries_across_chunks() {
        let mut tracker = MarkupTracker::new();
        let mut out = String::new();
        tracker.feed("<a class='", &mut out);
        let context = tracker.expression_context();
        tracker.after_expression(&context);
        tracker.feed("'>link</a>", &mut out);
        assert_eq!(out, "<a class=\"\">link</a>");
        assert_eq!(tracker.expression_context(), ExpressionContext::Text);
    }

    #[test]
    fn test_style_content_is_text() {
        let (tracker, _) = feed(&["<style>.a "]);
        assert_eq!(tracker.expression_context(), ExpressionContext::Text);
        assert!(!tracker.in_tag());
    }

    #[test]
    fn test_strip_attribute_prefix() {
        let mut html = String::from("<input type=\"checkbox\" checked=");
        assert!(strip_attribute_prefix(&mut html, "checked"));
        assert_eq!(html, "<input type=\"checkbox\"");
    }
}
