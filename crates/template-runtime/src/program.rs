//! Render programs prepared from the AST.
//!
//! Each node sequence of the AST becomes one [`Fragment`]: its literal
//! markup, the dynamic parts between it, and a marked copy of the markup that
//! live instances parse once and hydrate. Markers come in three shapes:
//!
//! - `<!--tmpl:N-->` comments for content positions
//! - ` tmpl-N` attributes for unquoted attribute and tag body expressions
//! - `\u{E000}N\u{E001}` sentinels inside attribute values, comments and raw
//!   text elements, where neither of the others can live

use smol_str::SmolStr;
use std::rc::Rc;
use template_compiler::{
    Branch, EachBlock, Expr, ExpressionContext, ExpressionNode, PartialNode, RerenderMode,
    TemplateNode,
};

/// Opens a sentinel segment.
pub(crate) const OPEN: char = '\u{E000}';
/// Closes a sentinel segment.
pub(crate) const CLOSE: char = '\u{E001}';

const COMMENT_PREFIX: &str = "tmpl:";
pub(crate) const ATTRIBUTE_PREFIX: &str = "tmpl-";

const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea", "title"];

/// A prepared node sequence.
#[derive(Debug)]
pub(crate) struct Fragment {
    pub(crate) pieces: Vec<Piece>,
    pub(crate) parts: Vec<Part>,
    /// The markup with a marker in place of every part.
    pub(crate) marked: String,
}

#[derive(Debug)]
pub(crate) enum Piece {
    Html(String),
    Part(usize),
}

/// A dynamic position of a fragment.
#[derive(Debug)]
pub(crate) enum Part {
    Expression(Rc<ExpressionNode>),
    If(Rc<IfPart>),
    Each(Rc<EachPart>),
    Partial(PartialNode),
    Slot(Option<SmolStr>),
    Rerender(Rc<RerenderPart>),
}

#[derive(Debug)]
pub(crate) struct IfPart {
    /// `(condition, source)` for the `if` and each `else if`.
    pub(crate) conditions: Vec<(Expr, String)>,
    /// One fragment per condition, plus a trailing one for `else`.
    pub(crate) branches: Vec<Rc<Fragment>>,
}

#[derive(Debug)]
pub(crate) struct EachPart {
    pub(crate) over: Expr,
    pub(crate) over_source: String,
    pub(crate) item_as: Option<SmolStr>,
    pub(crate) index_as: Option<SmolStr>,
    pub(crate) key: Option<Expr>,
    pub(crate) content: Rc<Fragment>,
    pub(crate) else_content: Option<Rc<Fragment>>,
}

#[derive(Debug)]
pub(crate) struct RerenderPart {
    pub(crate) mode: RerenderMode,
    pub(crate) expression: Expr,
    pub(crate) source: String,
    pub(crate) content: Rc<Fragment>,
}

/// One piece of a string that holds sentinel segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Text(String),
    Part(usize),
}

impl Fragment {
    /// Prepares a node sequence.
    pub(crate) fn prepare(nodes: &[TemplateNode]) -> Rc<Self> {
        let mut fragment = Fragment {
            pieces: Vec::new(),
            parts: Vec::new(),
            marked: String::new(),
        };
        for node in nodes {
            let part = match node {
                TemplateNode::Html(html) => {
                    fragment.marked.push_str(&html.html);
                    fragment.pieces.push(Piece::Html(html.html.clone()));
                    continue;
                }
                TemplateNode::Expression(expr) => Part::Expression(Rc::new(expr.clone())),
                TemplateNode::If(block) => {
                    let mut conditions = vec![(block.condition.clone(), block.condition_source.clone())];
                    let mut branches = vec![Fragment::prepare(&block.content)];
                    let mut has_else = false;
                    for branch in &block.branches {
                        match branch {
                            Branch::ElseIf(b) => {
                                conditions.push((b.condition.clone(), b.condition_source.clone()));
                                branches.push(Fragment::prepare(&b.content));
                            }
                            Branch::Else(b) => {
                                branches.push(Fragment::prepare(&b.content));
                                has_else = true;
                            }
                        }
                    }
                    if !has_else {
                        branches.push(Fragment::prepare(&[]));
                    }
                    Part::If(Rc::new(IfPart {
                        conditions,
                        branches,
                    }))
                }
                TemplateNode::Each(block) => Part::Each(Rc::new(EachPart::from_block(block))),
                TemplateNode::Template(partial) => Part::Partial(partial.clone()),
                TemplateNode::Slot(slot) => Part::Slot(slot.name.clone()),
                TemplateNode::Rerender(block) => Part::Rerender(Rc::new(RerenderPart {
                    mode: block.mode,
                    expression: block.expression.clone(),
                    source: block.source.clone(),
                    content: Fragment::prepare(&block.content),
                })),
            };
            let index = fragment.parts.len();
            fragment.push_marker(&part, index);
            fragment.pieces.push(Piece::Part(index));
            fragment.parts.push(part);
        }
        Rc::new(fragment)
    }

    fn push_marker(&mut self, part: &Part, index: usize) {
        let context = match part {
            Part::Expression(expr) => Some(&expr.context),
            _ => None,
        };
        match context {
            Some(ExpressionContext::QuotedAttribute { .. }) => self.push_sentinel(index),
            Some(ExpressionContext::UnquotedAttribute { .. } | ExpressionContext::TagBody) => {
                self.marked.push(' ');
                self.marked.push_str(ATTRIBUTE_PREFIX);
                self.marked.push_str(&index.to_string());
            }
            _ if in_comment(&self.marked) || in_raw_text(&self.marked) => {
                self.push_sentinel(index)
            }
            _ => {
                self.marked.push_str("<!--");
                self.marked.push_str(COMMENT_PREFIX);
                self.marked.push_str(&index.to_string());
                self.marked.push_str("-->");
            }
        }
    }

    fn push_sentinel(&mut self, index: usize) {
        self.marked.push(OPEN);
        self.marked.push_str(&index.to_string());
        self.marked.push(CLOSE);
    }
}

impl EachPart {
    fn from_block(block: &EachBlock) -> Self {
        Self {
            over: block.over.clone(),
            over_source: block.over_source.clone(),
            item_as: block.item_as.clone(),
            index_as: block.index_as.clone(),
            key: block.key.clone(),
            content: Fragment::prepare(&block.content),
            else_content: block.else_content.as_deref().map(Fragment::prepare),
        }
    }
}

fn in_comment(markup: &str) -> bool {
    match (markup.rfind("<!--"), markup.rfind("-->")) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}

fn in_raw_text(markup: &str) -> bool {
    let lower = markup.to_ascii_lowercase();
    RAW_TEXT_TAGS.iter().any(|tag| {
        let Some(open) = find_open_tag(&lower, tag) else {
            return false;
        };
        let closed_start = lower[open..].find('>').is_some();
        let close = lower.rfind(&format!("</{tag}"));
        closed_start && close.map_or(true, |close| close < open)
    })
}

/// The byte offset of the last `<tag` that is followed by whitespace or `>`.
fn find_open_tag(lower: &str, tag: &str) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut search = lower.len();
    while let Some(at) = lower[..search].rfind(&needle) {
        let after = lower[at + needle.len()..].chars().next();
        if after.map_or(false, |c| c == '>' || c.is_whitespace() || c == '/') {
            return Some(at);
        }
        search = at;
    }
    None
}

/// Parses the index of a `tmpl:N` marker comment.
pub(crate) fn comment_marker(text: &str) -> Option<usize> {
    text.strip_prefix(COMMENT_PREFIX)?.parse().ok()
}

/// Parses the index of a `tmpl-N` marker attribute.
pub(crate) fn attribute_marker(name: &str) -> Option<usize> {
    name.strip_prefix(ATTRIBUTE_PREFIX)?.parse().ok()
}

/// Whether `text` holds any sentinel segment.
pub(crate) fn has_segments(text: &str) -> bool {
    text.contains(OPEN)
}

/// Splits a string into literal text and sentinel part references.
pub(crate) fn split_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(OPEN) {
        let after = &rest[open + OPEN.len_utf8()..];
        let Some(close) = after.find(CLOSE) else {
            break;
        };
        let Ok(index) = after[..close].parse::<usize>() else {
            break;
        };
        if open > 0 {
            segments.push(Segment::Text(rest[..open].to_string()));
        }
        segments.push(Segment::Part(index));
        rest = &after[close + CLOSE.len_utf8()..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use template_compiler::compile;

    fn prepare(source: &str) -> Rc<Fragment> {
        Fragment::prepare(&compile(source).unwrap().nodes)
    }

    #[test]
    fn test_markers_by_context() {
        let fragment = prepare("<p class=\"a {cls}\" hidden={hide} {attrs}>{text}</p>");
        assert_eq!(
            fragment.marked,
            "<p class=\"a \u{E000}0\u{E001}\" tmpl-1  tmpl-2><!--tmpl:3--></p>"
        );
        assert_eq!(fragment.parts.len(), 4);
    }

    #[test]
    fn test_sentinels_in_comments_and_raw_text() {
        let fragment = prepare("<!-- {a} --><script>var x = {b};</script>{c}");
        assert_eq!(
            fragment.marked,
            "<!-- \u{E000}0\u{E001} --><script>var x = \u{E000}1\u{E001};</script><!--tmpl:2-->"
        );
    }

    #[test]
    fn test_if_without_else_gets_empty_branch() {
        let fragment = prepare("{#if a}x{else if b}y{/if}");
        let Part::If(part) = &fragment.parts[0] else {
            panic!("expected if part");
        };
        assert_eq!(part.conditions.len(), 2);
        assert_eq!(part.branches.len(), 3);
        assert!(part.branches[2].pieces.is_empty());
    }

    #[test]
    fn test_split_segments() {
        assert_eq!(
            split_segments("a \u{E000}0\u{E001} b\u{E000}12\u{E001}"),
            vec![
                Segment::Text("a ".into()),
                Segment::Part(0),
                Segment::Text(" b".into()),
                Segment::Part(12),
            ]
        );
        assert_eq!(comment_marker("tmpl:3"), Some(3));
        assert_eq!(attribute_marker("tmpl-x"), None);
    }
}
