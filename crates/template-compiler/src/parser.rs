//! Block-stack template compiler.
//!
//! The compiler walks the source once. Literal markup between tags is fed
//! through a [`MarkupTracker`] so expressions know their attribute context;
//! block tags push and pop frames on an explicit stack, and closing a frame
//! folds its collected nodes into the parent's sequence.

use crate::ast::*;
use crate::error::{CompileError, CompileErrorKind};
use crate::expression::{parse_expression, parse_named_args, Expr, ExprError};
use crate::lexer::{tokenize, ExprTokenKind};
use crate::markup::{strip_attribute_prefix, MarkupTracker};
use crate::scanner::StringScanner;
use crate::CompileOptions;
use smol_str::SmolStr;
use template_span::Span;

/// Keywords that may follow `#` in an opening tag.
const BLOCK_KEYWORDS: &[&str] = &["if", "each", "rerender", "guard", "html"];

/// Detects the dialect from the first unescaped opening bracket.
pub(crate) fn detect_dialect(source: &str) -> Dialect {
    let scanner = StringScanner::new(source);
    match scanner.find_unescaped("{") {
        Some(at) if source[at + 1..].starts_with('{') => Dialect::Double,
        _ => Dialect::Single,
    }
}

/// What an `if` frame is currently collecting.
enum PendingBranch {
    ElseIf {
        span: Span,
        condition: Expr,
        condition_source: String,
    },
    Else {
        span: Span,
    },
}

enum Block {
    Root,
    If {
        condition: Expr,
        condition_source: String,
        /// Set once the first `else` tag is seen.
        content: Option<Vec<TemplateNode>>,
        branches: Vec<Branch>,
        pending: Option<PendingBranch>,
    },
    Each {
        over: Expr,
        over_source: String,
        item_as: Option<SmolStr>,
        index_as: Option<SmolStr>,
        key: Option<Expr>,
        content: Option<Vec<TemplateNode>>,
    },
    Rerender {
        mode: RerenderMode,
        expression: Expr,
        source: String,
    },
}

impl Block {
    fn keyword(&self) -> &'static str {
        match self {
            Block::Root => "",
            Block::If { .. } => "if",
            Block::Each { .. } => "each",
            Block::Rerender { mode, .. } => mode.keyword(),
        }
    }
}

struct Frame {
    block: Block,
    /// Span of the opening tag.
    open: Span,
    /// The opening tag as written.
    tag: String,
    nodes: Vec<TemplateNode>,
}

/// A tag body classified by its leading sigil.
enum Tag<'src> {
    Comment,
    Open { keyword: &'src str, rest: &'src str },
    Close { keyword: &'src str },
    Else,
    ElseIf { condition: &'src str },
    Slot { name: Option<&'src str> },
    Partial { name: &'src str, args: &'src str },
    Expression(&'src str),
}

/// Splits a leading keyword off `text`, returning `(keyword, rest)`.
fn split_keyword(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| c.is_whitespace())
        .unwrap_or(text.len());
    (&text[..end], text[end..].trim_start())
}

fn classify(body: &str) -> Tag<'_> {
    if body.starts_with('!') {
        return Tag::Comment;
    }
    if let Some(rest) = body.strip_prefix('#') {
        let (keyword, rest) = split_keyword(rest);
        return Tag::Open { keyword, rest };
    }
    if let Some(rest) = body.strip_prefix('/') {
        return Tag::Close {
            keyword: rest.trim(),
        };
    }
    if let Some(rest) = body.strip_prefix('>') {
        let (name, args) = split_keyword(rest.trim_start());
        if name == "slot" {
            return Tag::Slot {
                name: (!args.is_empty()).then_some(args),
            };
        }
        return Tag::Partial { name, args };
    }
    let (keyword, rest) = split_keyword(body);
    match keyword {
        "else" if rest.is_empty() => Tag::Else,
        "else" => match split_keyword(rest) {
            ("if", condition) => Tag::ElseIf { condition },
            _ => Tag::Expression(body),
        },
        "elseif" => Tag::ElseIf { condition: rest },
        _ => Tag::Expression(body),
    }
}

/// Whether a single-bracket tag in a double-bracket template looks like a
/// block tag, which would mean the author mixed dialects.
fn looks_like_block_tag(after_brace: &str) -> bool {
    let word_end = after_brace
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(after_brace.len());
    after_brace.starts_with('#')
        || after_brace.starts_with('/')
        || after_brace.starts_with('>')
        || matches!(&after_brace[..word_end], "else" | "elseif")
}

/// The template compiler.
pub(crate) struct Compiler<'src> {
    source: &'src str,
    scanner: StringScanner<'src>,
    dialect: Dialect,
    markup: MarkupTracker,
    stack: Vec<Frame>,
    pending_html: String,
    pending_span: Option<Span>,
}

impl<'src> Compiler<'src> {
    pub(crate) fn new(source: &'src str, options: &CompileOptions) -> Self {
        let dialect = options.dialect.unwrap_or_else(|| detect_dialect(source));
        Self {
            source,
            scanner: StringScanner::new(source),
            dialect,
            markup: MarkupTracker::new(),
            stack: vec![Frame {
                block: Block::Root,
                open: Span::at(0),
                tag: String::new(),
                nodes: Vec::new(),
            }],
            pending_html: String::new(),
            pending_span: None,
        }
    }

    pub(crate) fn compile(mut self) -> Result<Ast, CompileError> {
        while !self.scanner.is_eof() {
            let Some(tag_start) = self.next_tag_start()? else {
                let start = self.scanner.pos();
                let end = self.source.len();
                self.push_literal(start, end);
                self.scanner.seek(end);
                break;
            };
            let literal_start = self.scanner.pos();
            self.push_literal(literal_start, tag_start);
            self.scanner.seek(tag_start);
            self.compile_tag()?;
        }
        self.flush_html();

        if self.stack.len() > 1 {
            let frame = self.stack.pop().map(|f| (f.open, f.tag, f.block.keyword()));
            if let Some((open, tag, keyword)) = frame {
                return Err(self.unbalanced(
                    tag,
                    format!("unclosed block, expected {}", self.closer(keyword)),
                    open,
                ));
            }
        }
        let nodes = self
            .stack
            .pop()
            .map(|frame| frame.nodes)
            .unwrap_or_default();
        Ok(Ast {
            dialect: self.dialect,
            nodes,
        })
    }

    // === Scanning ===

    /// Finds the start of the next tag, skipping literal single braces in the
    /// double dialect.
    fn next_tag_start(&self) -> Result<Option<usize>, CompileError> {
        let mut probe = self.scanner.clone();
        loop {
            let Some(at) = probe.find_unescaped("{") else {
                return Ok(None);
            };
            let after = &self.source[at + 1..];
            match self.dialect {
                Dialect::Single => {
                    if after.starts_with('{') {
                        return Err(self.malformed(
                            "double-bracket tag in a single-bracket template",
                            Span::from_usize(at, at + 2),
                        ));
                    }
                    return Ok(Some(at));
                }
                Dialect::Double => {
                    if after.starts_with('{') {
                        return Ok(Some(at));
                    }
                    if looks_like_block_tag(after) {
                        return Err(self.malformed(
                            "single-bracket block tag in a double-bracket template",
                            Span::from_usize(at, at + 2),
                        ));
                    }
                    probe.seek(at + 1);
                }
            }
        }
    }

    /// Adds literal source text to the pending markup.
    fn push_literal(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let chunk = self.source[start..end].replace("\\{", "{");
        self.markup.feed(&chunk, &mut self.pending_html);
        let span = Span::from_usize(start, end);
        self.pending_span = Some(match self.pending_span {
            Some(prev) => prev.cover(span),
            None => span,
        });
    }

    fn flush_html(&mut self) {
        if let Some(span) = self.pending_span.take() {
            let html = std::mem::take(&mut self.pending_html);
            if !html.is_empty() {
                self.push_node(TemplateNode::Html(HtmlNode { span, html }));
            }
        }
    }

    fn push_node(&mut self, node: TemplateNode) {
        if let Some(frame) = self.stack.last_mut() {
            frame.nodes.push(node);
        }
    }

    // === Tags ===

    fn compile_tag(&mut self) -> Result<(), CompileError> {
        let start = self.scanner.pos();
        let open = self.dialect.open();
        self.scanner.advance(open.len());
        let Some(raw) = self.scanner.read_balanced(self.dialect.close()) else {
            return Err(self.malformed(
                format!("unterminated tag, expected `{}`", self.dialect.close()),
                Span::from_usize(start, start + open.len()),
            ));
        };
        let span = Span::from_usize(start, self.scanner.pos());
        let body_offset = start + open.len() + (raw.len() - raw.trim_start().len());
        let body = raw.trim();
        let tag_text = self.source[start..self.scanner.pos()].to_string();

        let tag = classify(body);
        if self.markup.in_tag() && !matches!(tag, Tag::Comment | Tag::Expression(_)) {
            return Err(self.malformed(
                format!("`{tag_text}` cannot appear inside an HTML tag"),
                span,
            ));
        }

        match tag {
            Tag::Comment => Ok(()),
            Tag::Expression(expr) => self.expression_tag(expr, body_offset, span, false),
            Tag::Open { keyword, rest } => {
                let rest_offset = body_offset + body.len() - rest.len();
                self.open_tag(keyword, rest, rest_offset, span, tag_text)
            }
            Tag::Close { keyword } => self.close_tag(keyword, span, tag_text),
            Tag::Else => self.else_tag(None, span, tag_text),
            Tag::ElseIf { condition } => {
                let offset = body_offset + body.len() - condition.len();
                let parsed = self.parse_expr(condition, offset)?;
                self.else_tag(Some((parsed, condition.to_string())), span, tag_text)
            }
            Tag::Slot { name } => {
                self.flush_html();
                self.push_node(TemplateNode::Slot(SlotNode {
                    span,
                    name: name.map(SmolStr::new),
                }));
                Ok(())
            }
            Tag::Partial { name, args } => {
                let args_offset = body_offset + body.len() - args.len();
                self.partial_tag(name, args, args_offset, span)
            }
        }
    }

    fn expression_tag(
        &mut self,
        source: &str,
        offset: usize,
        span: Span,
        unsafe_html: bool,
    ) -> Result<(), CompileError> {
        let expr = self.parse_expr(source, offset)?;
        let context = self.markup.expression_context();
        if let ExpressionContext::UnquotedAttribute { name } = &context {
            if !strip_attribute_prefix(&mut self.pending_html, name) {
                return Err(self.malformed(
                    format!("expression for attribute `{name}` must directly follow `{name}=`"),
                    span,
                ));
            }
        }
        if unsafe_html && context != ExpressionContext::Text {
            return Err(self.malformed("`#html` is only allowed in element content", span));
        }
        self.markup.after_expression(&context);
        self.flush_html();
        self.push_node(TemplateNode::Expression(ExpressionNode {
            span,
            source: source.to_string(),
            expr,
            unsafe_html,
            context,
        }));
        Ok(())
    }

    fn open_tag(
        &mut self,
        keyword: &str,
        rest: &str,
        offset: usize,
        span: Span,
        tag: String,
    ) -> Result<(), CompileError> {
        if !BLOCK_KEYWORDS.contains(&keyword) {
            return Err(self.malformed(format!("unknown block `#{keyword}`"), span));
        }
        if keyword == "html" {
            return self.expression_tag(rest, offset, span, true);
        }
        let block = match keyword {
            "if" => Block::If {
                condition: self.parse_expr(rest, offset)?,
                condition_source: rest.to_string(),
                content: None,
                branches: Vec::new(),
                pending: None,
            },
            "each" => self.each_header(rest, offset)?,
            _ => {
                let mode = if keyword == "guard" {
                    RerenderMode::Guard
                } else {
                    RerenderMode::Rerender
                };
                Block::Rerender {
                    mode,
                    expression: self.parse_expr(rest, offset)?,
                    source: rest.to_string(),
                }
            }
        };
        self.flush_html();
        self.stack.push(Frame {
            block,
            open: span,
            tag,
            nodes: Vec::new(),
        });
        Ok(())
    }

    /// Parses `[item[, index] in] collection [by key]`.
    fn each_header(&self, header: &str, offset: usize) -> Result<Block, CompileError> {
        let tokens = tokenize(header);
        let text = |i: usize| &header[tokens[i].range.clone()];
        let is_ident = |i: usize, word: &str| {
            tokens.get(i).map(|t| t.kind) == Some(ExprTokenKind::Ident) && text(i) == word
        };
        let is_name = |i: usize| {
            tokens.get(i).map(|t| t.kind) == Some(ExprTokenKind::Ident) && !text(i).contains('.')
        };

        let (item_as, index_as, first) = if is_name(0) && is_ident(1, "in") {
            (Some(SmolStr::new(text(0))), None, 2)
        } else if is_name(0)
            && tokens.get(1).map(|t| t.kind) == Some(ExprTokenKind::Comma)
            && is_name(2)
            && is_ident(3, "in")
        {
            (Some(SmolStr::new(text(0))), Some(SmolStr::new(text(2))), 4)
        } else {
            (None, None, 0)
        };
        let coll_start = tokens
            .get(first)
            .map(|t| t.range.start)
            .unwrap_or(header.len());

        let mut depth = 0i32;
        let mut by_at = None;
        for (i, token) in tokens.iter().enumerate() {
            if token.range.start < coll_start {
                continue;
            }
            match token.kind {
                ExprTokenKind::LParen | ExprTokenKind::LBracket | ExprTokenKind::LBrace => {
                    depth += 1
                }
                ExprTokenKind::RParen | ExprTokenKind::RBracket | ExprTokenKind::RBrace => {
                    depth -= 1
                }
                ExprTokenKind::Ident if depth == 0 && text(i) == "by" => by_at = Some(i),
                _ => {}
            }
        }

        let (over_source, key) = match by_at {
            Some(i) => {
                let by = tokens[i].range.clone();
                let key_source = header[by.end..].trim();
                let key_offset = offset + header.len() - header[by.end..].trim_start().len();
                let key = self.parse_expr(key_source, key_offset)?;
                (header[coll_start..by.start].trim(), Some(key))
            }
            None => (header[coll_start..].trim(), None),
        };
        let over = self.parse_expr(over_source, offset + coll_start)?;
        Ok(Block::Each {
            over,
            over_source: over_source.to_string(),
            item_as,
            index_as,
            key,
            content: None,
        })
    }

    fn else_tag(
        &mut self,
        condition: Option<(Expr, String)>,
        span: Span,
        tag: String,
    ) -> Result<(), CompileError> {
        self.flush_html();
        let top = self.stack.len() - 1;
        let frame = &mut self.stack[top];
        let current = std::mem::take(&mut frame.nodes);
        let misplaced = match (&mut frame.block, condition) {
            (
                Block::If {
                    content,
                    branches,
                    pending,
                    ..
                },
                condition,
            ) => {
                if matches!(pending, Some(PendingBranch::Else { .. })) {
                    Some("the `else` branch must be the last one")
                } else {
                    match pending.take() {
                        None => *content = Some(current),
                        Some(done) => branches.push(finish_branch(done, current)),
                    }
                    *pending = Some(match condition {
                        Some((condition, condition_source)) => PendingBranch::ElseIf {
                            span,
                            condition,
                            condition_source,
                        },
                        None => PendingBranch::Else { span },
                    });
                    None
                }
            }
            (Block::Each { content, .. }, None) => {
                if content.is_some() {
                    Some("an `each` block takes at most one `else`")
                } else {
                    *content = Some(current);
                    None
                }
            }
            (Block::Each { .. }, Some(_)) => Some("`else if` is only valid inside an `if` block"),
            (Block::Root | Block::Rerender { .. }, _) => {
                Some("`else` is only valid inside an `if` or `each` block")
            }
        };
        match misplaced {
            Some(message) => Err(self.unbalanced(tag, message, span)),
            None => Ok(()),
        }
    }

    fn close_tag(&mut self, keyword: &str, span: Span, tag: String) -> Result<(), CompileError> {
        let top = self.stack.len() - 1;
        let expected = self.stack[top].block.keyword();
        if top == 0 {
            return Err(self.unbalanced(tag, "no open block to close", span));
        }
        if keyword != expected {
            let open_tag = self.stack[top].tag.clone();
            let open_at = template_span::LineIndex::position_of(
                self.source,
                self.stack[top].open.start_usize(),
            );
            return Err(self.unbalanced(
                tag,
                format!(
                    "expected {} to close `{open_tag}` opened at {open_at}",
                    self.closer(expected)
                ),
                span,
            ));
        }
        self.flush_html();
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        let block_span = frame.open.cover(span);
        let node = match frame.block {
            Block::If {
                condition,
                condition_source,
                content,
                mut branches,
                pending,
            } => {
                let content = match (content, pending) {
                    (None, _) => frame.nodes,
                    (Some(content), Some(done)) => {
                        branches.push(finish_branch(done, frame.nodes));
                        content
                    }
                    (Some(content), None) => content,
                };
                TemplateNode::If(IfBlock {
                    span: block_span,
                    condition,
                    condition_source,
                    content,
                    branches,
                })
            }
            Block::Each {
                over,
                over_source,
                item_as,
                index_as,
                key,
                content,
            } => {
                let (content, else_content) = match content {
                    Some(content) => (content, Some(frame.nodes)),
                    None => (frame.nodes, None),
                };
                TemplateNode::Each(EachBlock {
                    span: block_span,
                    over,
                    over_source,
                    item_as,
                    index_as,
                    key,
                    content,
                    else_content,
                })
            }
            Block::Rerender {
                mode,
                expression,
                source,
            } => TemplateNode::Rerender(RerenderBlock {
                span: block_span,
                mode,
                expression,
                source,
                content: frame.nodes,
            }),
            Block::Root => return Ok(()),
        };
        self.push_node(node);
        Ok(())
    }

    fn partial_tag(
        &mut self,
        name: &str,
        args: &str,
        offset: usize,
        span: Span,
    ) -> Result<(), CompileError> {
        if name.is_empty() {
            return Err(self.malformed("partial tag requires a template name", span));
        }
        let named = parse_named_args(args).map_err(|e| self.expr_error(e, offset))?;
        let mut data = Vec::new();
        let mut reactive_data = Vec::new();
        for arg in named {
            match arg.value {
                Expr::Literal(value) => data.push(StaticArg {
                    name: arg.name,
                    value,
                }),
                expr => reactive_data.push(ReactiveArg {
                    name: arg.name,
                    expr,
                    source: arg.source,
                }),
            }
        }
        self.flush_html();
        self.push_node(TemplateNode::Template(PartialNode {
            span,
            name: SmolStr::new(name),
            data,
            reactive_data,
        }));
        Ok(())
    }

    // === Errors ===

    fn parse_expr(&self, source: &str, offset: usize) -> Result<Expr, CompileError> {
        parse_expression(source).map_err(|e| self.expr_error(e, offset))
    }

    fn expr_error(&self, error: ExprError, offset: usize) -> CompileError {
        let at = offset + error.offset;
        let width = self
            .source
            .get(at..)
            .and_then(|rest| rest.chars().next())
            .map_or(1, char::len_utf8);
        self.malformed(error.message, Span::from_usize(at, at + width))
    }

    fn closer(&self, keyword: &str) -> String {
        format!("{}/{keyword}{}", self.dialect.open(), self.dialect.close())
    }

    fn malformed(&self, message: impl Into<String>, span: Span) -> CompileError {
        CompileError::new(
            CompileErrorKind::MalformedTemplate {
                message: message.into(),
            },
            span,
            self.source,
        )
    }

    fn unbalanced(
        &self,
        tag: impl Into<String>,
        message: impl Into<String>,
        span: Span,
    ) -> CompileError {
        CompileError::new(
            CompileErrorKind::UnbalancedBlock {
                tag: tag.into(),
                message: message.into(),
            },
            span,
            self.source,
        )
    }
}

fn finish_branch(pending: PendingBranch, content: Vec<TemplateNode>) -> Branch {
    match pending {
        PendingBranch::ElseIf {
            span,
            condition,
            condition_source,
        } => Branch::ElseIf(ElseIfBranch {
            span,
            condition,
            condition_source,
            content,
        }),
        PendingBranch::Else { span } => Branch::Else(ElseBranch { span, content }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;
    use crate::expression::{Call, Literal, Path};
    use pretty_assertions::assert_eq;

    fn html(node: &TemplateNode) -> &str {
        match node {
            TemplateNode::Html(n) => &n.html,
            other => panic!("expected html node, got {other:?}"),
        }
    }

    #[test]
    fn test_detect_dialect() {
        assert_eq!(detect_dialect("<p>{name}</p>"), Dialect::Single);
        assert_eq!(detect_dialect("<p>{{name}}</p>"), Dialect::Double);
        assert_eq!(detect_dialect("<p>\\{{x}</p>"), Dialect::Single);
        assert_eq!(detect_dialect("plain"), Dialect::Single);
    }

    #[test]
    fn test_compile_text_and_expression() {
        let ast = compile("<p>Hello {name}!</p>").unwrap();
        assert_eq!(ast.nodes.len(), 3);
        assert_eq!(html(&ast.nodes[0]), "<p>Hello ");
        match &ast.nodes[1] {
            TemplateNode::Expression(e) => {
                assert_eq!(e.source, "name");
                assert_eq!(e.expr, Expr::Path(Path::parse("name")));
                assert_eq!(e.context, ExpressionContext::Text);
                assert!(!e.unsafe_html);
            }
            other => panic!("unexpected node {other:?}"),
        }
        assert_eq!(html(&ast.nodes[2]), "!</p>");
    }

    #[test]
    fn test_compile_double_dialect() {
        let ast = compile("{{ name }}<style>.a { color: red }</style>").unwrap();
        assert_eq!(ast.dialect, Dialect::Double);
        assert!(matches!(ast.nodes[0], TemplateNode::Expression(_)));
        assert_eq!(html(&ast.nodes[1]), "<style>.a { color: red }</style>");
    }

    #[test]
    fn test_compile_if_chain() {
        let ast = compile("{#if a}A{else if b}B{elseif c}C{else}D{/if}").unwrap();
        let TemplateNode::If(block) = &ast.nodes[0] else {
            panic!("expected if block");
        };
        assert_eq!(block.condition_source, "a");
        assert_eq!(html(&block.content[0]), "A");
        assert_eq!(block.branches.len(), 3);
        assert!(matches!(block.branches[0], Branch::ElseIf(_)));
        assert!(matches!(block.branches[1], Branch::ElseIf(_)));
        assert!(matches!(block.branches[2], Branch::Else(_)));
        assert_eq!(html(&block.branches[2].content()[0]), "D");
    }

    #[test]
    fn test_compile_each_header_forms() {
        let ast = compile("{#each items}x{/each}").unwrap();
        let TemplateNode::Each(each) = &ast.nodes[0] else {
            panic!("expected each");
        };
        assert_eq!(each.item_as, None);
        assert_eq!(each.over_source, "items");

        let ast = compile("{#each row, i in table.rows by row.id}x{else}none{/each}").unwrap();
        let TemplateNode::Each(each) = &ast.nodes[0] else {
            panic!("expected each");
        };
        assert_eq!(each.item_as.as_deref(), Some("row"));
        assert_eq!(each.index_as.as_deref(), Some("i"));
        assert_eq!(each.over_source, "table.rows");
        assert_eq!(each.key, Some(Expr::Path(Path::parse("row.id"))));
        assert_eq!(html(&each.else_content.as_ref().unwrap()[0]), "none");
    }

    #[test]
    fn test_compile_each_over_call() {
        let ast = compile("{#each n in range 1 3}{n}{/each}").unwrap();
        let TemplateNode::Each(each) = &ast.nodes[0] else {
            panic!("expected each");
        };
        assert_eq!(
            each.over,
            Expr::Call(Call {
                name: "range".into(),
                args: vec![
                    Expr::Literal(Literal::Number(1.0)),
                    Expr::Literal(Literal::Number(3.0)),
                ],
            })
        );
    }

    #[test]
    fn test_compile_partial_args() {
        let ast = compile("{> card title='Hi' size=2 item=selected}").unwrap();
        let TemplateNode::Template(partial) = &ast.nodes[0] else {
            panic!("expected partial");
        };
        assert_eq!(partial.name, "card");
        assert_eq!(partial.data.len(), 2);
        assert_eq!(partial.data[0].value, Literal::String("Hi".into()));
        assert_eq!(partial.reactive_data.len(), 1);
        assert_eq!(partial.reactive_data[0].name, "item");
        assert_eq!(partial.reactive_data[0].source, "selected");
    }

    #[test]
    fn test_compile_slots() {
        let ast = compile("<div>{>slot}{>slot header}</div>").unwrap();
        assert_eq!(
            ast.nodes[1],
            TemplateNode::Slot(SlotNode {
                span: Span::from_usize(5, 12),
                name: None
            })
        );
        let TemplateNode::Slot(named) = &ast.nodes[2] else {
            panic!("expected slot");
        };
        assert_eq!(named.name.as_deref(), Some("header"));
    }

    #[test]
    fn test_compile_guard_and_rerender() {
        let ast = compile("{#guard total}{total}{/guard}{#rerender tick}x{/rerender}").unwrap();
        let TemplateNode::Rerender(guard) = &ast.nodes[0] else {
            panic!("expected guard");
        };
        assert_eq!(guard.mode, RerenderMode::Guard);
        let TemplateNode::Rerender(rerender) = &ast.nodes[1] else {
            panic!("expected rerender");
        };
        assert_eq!(rerender.mode, RerenderMode::Rerender);
    }

    #[test]
    fn test_compile_unsafe_html() {
        let ast = compile("<div>{#html body}</div>").unwrap();
        let TemplateNode::Expression(e) = &ast.nodes[1] else {
            panic!("expected expression");
        };
        assert!(e.unsafe_html);
        assert_eq!(e.source, "body");
    }

    #[test]
    fn test_compile_attribute_contexts() {
        let ast = compile("<input class='a {cls}' checked={on} {extra}>").unwrap();
        assert_eq!(html(&ast.nodes[0]), "<input class=\"a ");
        let TemplateNode::Expression(cls) = &ast.nodes[1] else {
            panic!("expected expression");
        };
        assert_eq!(
            cls.context,
            ExpressionContext::QuotedAttribute {
                name: "class".into()
            }
        );
        assert_eq!(html(&ast.nodes[2]), "\"");
        let TemplateNode::Expression(on) = &ast.nodes[3] else {
            panic!("expected expression");
        };
        assert_eq!(
            on.context,
            ExpressionContext::UnquotedAttribute {
                name: "checked".into()
            }
        );
        let TemplateNode::Expression(extra) = &ast.nodes[5] else {
            panic!("expected expression");
        };
        assert_eq!(extra.context, ExpressionContext::TagBody);
        assert_eq!(html(&ast.nodes[6]), ">");
    }

    #[test]
    fn test_comments_are_dropped() {
        let ast = compile("a{! note }b").unwrap();
        assert_eq!(ast.nodes.len(), 1);
        assert_eq!(html(&ast.nodes[0]), "ab");
    }

    #[test]
    fn test_escaped_brace_is_literal() {
        let ast = compile("a \\{b} {c}").unwrap();
        assert_eq!(html(&ast.nodes[0]), "a {b} ");
    }

    #[test]
    fn test_expression_containing_closing_brace_in_string() {
        let ast = compile("{join items '}'}").unwrap();
        let TemplateNode::Expression(e) = &ast.nodes[0] else {
            panic!("expected expression");
        };
        assert_eq!(e.source, "join items '}'");
    }
}
