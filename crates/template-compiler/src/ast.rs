//! AST types for compiled templates.
//!
//! The AST is the single structural source of truth for rendering: the runtime
//! never re-parses template text, it re-walks these nodes against a data
//! context.

use crate::expression::{Expr, Literal};
use smol_str::SmolStr;
use template_span::Span;

/// A compiled template.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Ast {
    /// The bracket dialect the source was written in.
    pub dialect: Dialect,
    /// Root node sequence.
    pub nodes: Vec<TemplateNode>,
}

impl Ast {
    /// Names of every partial referenced anywhere in the template.
    pub fn partial_names(&self) -> Vec<SmolStr> {
        let mut names = Vec::new();
        walk(&self.nodes, &mut |node| {
            if let TemplateNode::Template(partial) = node {
                if !names.contains(&partial.name) {
                    names.push(partial.name.clone());
                }
            }
        });
        names
    }

    /// Names of every helper or method called anywhere in the template.
    pub fn call_names(&self) -> Vec<SmolStr> {
        let mut names = Vec::new();
        walk(&self.nodes, &mut |node| {
            for expr in node.expressions() {
                expr.call_names(&mut names);
            }
        });
        names.sort();
        names.dedup();
        names
    }

    /// Whether the template contains any dynamic node.
    pub fn is_static(&self) -> bool {
        self.nodes
            .iter()
            .all(|node| matches!(node, TemplateNode::Html(_)))
    }
}

/// Bracket dialect of a template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// `{expr}`
    #[default]
    Single,
    /// `{{expr}}`
    Double,
}

impl Dialect {
    /// The opening delimiter.
    pub fn open(&self) -> &'static str {
        match self {
            Dialect::Single => "{",
            Dialect::Double => "{{",
        }
    }

    /// The closing delimiter.
    pub fn close(&self) -> &'static str {
        match self {
            Dialect::Single => "}",
            Dialect::Double => "}}",
        }
    }
}

/// A node of the template AST.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum TemplateNode {
    /// Literal markup.
    Html(HtmlNode),
    /// An evaluated expression.
    Expression(ExpressionNode),
    /// `{#if}…{else if}…{else}…{/if}`
    If(IfBlock),
    /// `{#each}…{else}…{/each}`
    Each(EachBlock),
    /// `{> name args}`
    Template(PartialNode),
    /// `{>slot name}`
    Slot(SlotNode),
    /// `{#rerender}` / `{#guard}`
    Rerender(RerenderBlock),
}

impl TemplateNode {
    /// Returns the span of this node.
    pub fn span(&self) -> Span {
        match self {
            TemplateNode::Html(n) => n.span,
            TemplateNode::Expression(n) => n.span,
            TemplateNode::If(n) => n.span,
            TemplateNode::Each(n) => n.span,
            TemplateNode::Template(n) => n.span,
            TemplateNode::Slot(n) => n.span,
            TemplateNode::Rerender(n) => n.span,
        }
    }

    /// The expressions owned directly by this node (not its children).
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            TemplateNode::Html(_) | TemplateNode::Slot(_) => Vec::new(),
            TemplateNode::Expression(n) => vec![&n.expr],
            TemplateNode::If(n) => {
                let mut exprs = vec![&n.condition];
                exprs.extend(n.branches.iter().filter_map(|b| match b {
                    Branch::ElseIf(b) => Some(&b.condition),
                    Branch::Else(_) => None,
                }));
                exprs
            }
            TemplateNode::Each(n) => {
                let mut exprs = vec![&n.over];
                exprs.extend(n.key.as_ref());
                exprs
            }
            TemplateNode::Template(n) => n.reactive_data.iter().map(|a| &a.expr).collect(),
            TemplateNode::Rerender(n) => vec![&n.expression],
        }
    }

    /// Child node sequences of this node, in source order.
    pub fn child_sequences(&self) -> Vec<&[TemplateNode]> {
        match self {
            TemplateNode::If(n) => {
                let mut seqs = vec![n.content.as_slice()];
                seqs.extend(n.branches.iter().map(Branch::content));
                seqs
            }
            TemplateNode::Each(n) => {
                let mut seqs = vec![n.content.as_slice()];
                seqs.extend(n.else_content.as_deref());
                seqs
            }
            TemplateNode::Rerender(n) => vec![n.content.as_slice()],
            _ => Vec::new(),
        }
    }
}

/// Visits every node depth-first in source order.
pub fn walk<'a>(nodes: &'a [TemplateNode], visit: &mut dyn FnMut(&'a TemplateNode)) {
    for node in nodes {
        visit(node);
        for seq in node.child_sequences() {
            walk(seq, visit);
        }
    }
}

/// Literal markup.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HtmlNode {
    /// The span of the markup in the source.
    pub span: Span,
    /// The markup, with `\{` escapes resolved and attribute quotes normalized.
    pub html: String,
}

/// Where an expression sits relative to the surrounding markup.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "camelCase"))]
pub enum ExpressionContext {
    /// Element content.
    Text,
    /// Inside a quoted attribute value; always stringified.
    QuotedAttribute {
        /// Attribute name (lowercase).
        name: SmolStr,
    },
    /// The whole value of an unquoted attribute; the expression decides
    /// whether the attribute exists at all.
    UnquotedAttribute {
        /// Attribute name (lowercase).
        name: SmolStr,
    },
    /// Inside a start tag where an attribute name would go.
    TagBody,
}

/// An expression output node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExpressionNode {
    /// The span of the whole tag.
    pub span: Span,
    /// The expression text as written.
    pub source: String,
    /// The parsed expression.
    pub expr: Expr,
    /// Whether the result is inserted as raw markup.
    #[cfg_attr(feature = "serde", serde(rename = "unsafeHTML"))]
    pub unsafe_html: bool,
    /// The markup context of the expression.
    pub context: ExpressionContext,
}

/// An `if` block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IfBlock {
    /// The span from `{#if}` to `{/if}`.
    pub span: Span,
    /// The condition.
    pub condition: Expr,
    /// The condition as written.
    pub condition_source: String,
    /// Nodes rendered when the condition is truthy.
    pub content: Vec<TemplateNode>,
    /// `else if` branches followed by at most one `else`.
    pub branches: Vec<Branch>,
}

/// A continuation of an `if` block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum Branch {
    /// `{else if cond}`
    ElseIf(ElseIfBranch),
    /// `{else}`
    Else(ElseBranch),
}

impl Branch {
    /// The branch content.
    pub fn content(&self) -> &[TemplateNode] {
        match self {
            Branch::ElseIf(b) => &b.content,
            Branch::Else(b) => &b.content,
        }
    }
}

/// `{else if cond}`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ElseIfBranch {
    /// The span of the `else if` tag.
    pub span: Span,
    /// The condition.
    pub condition: Expr,
    /// The condition as written.
    pub condition_source: String,
    /// The branch content.
    pub content: Vec<TemplateNode>,
}

/// `{else}`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ElseBranch {
    /// The span of the `else` tag.
    pub span: Span,
    /// The branch content.
    pub content: Vec<TemplateNode>,
}

/// An `each` block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EachBlock {
    /// The span from `{#each}` to `{/each}`.
    pub span: Span,
    /// The iterated collection.
    pub over: Expr,
    /// The collection expression as written.
    pub over_source: String,
    /// Item binding name; when absent, item properties merge into the context.
    #[cfg_attr(feature = "serde", serde(rename = "as"))]
    pub item_as: Option<SmolStr>,
    /// Index binding name.
    #[cfg_attr(feature = "serde", serde(rename = "indexAs"))]
    pub index_as: Option<SmolStr>,
    /// Optional identity key (`by expr`), evaluated per item.
    pub key: Option<Expr>,
    /// Per-item content.
    pub content: Vec<TemplateNode>,
    /// Content rendered for an empty collection.
    #[cfg_attr(feature = "serde", serde(rename = "else"))]
    pub else_content: Option<Vec<TemplateNode>>,
}

/// A partial (sub-template) reference.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PartialNode {
    /// The span of the tag.
    pub span: Span,
    /// Registered sub-template name.
    pub name: SmolStr,
    /// Literal arguments, merged into the child context once.
    pub data: Vec<StaticArg>,
    /// Expression arguments, each pushed into the child context on change.
    #[cfg_attr(feature = "serde", serde(rename = "reactiveData"))]
    pub reactive_data: Vec<ReactiveArg>,
}

/// A literal partial argument.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StaticArg {
    /// Argument name.
    pub name: SmolStr,
    /// Literal value.
    pub value: Literal,
}

/// An expression partial argument.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReactiveArg {
    /// Argument name.
    pub name: SmolStr,
    /// Value expression.
    pub expr: Expr,
    /// Value as written.
    pub source: String,
}

/// A slot placeholder.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlotNode {
    /// The span of the tag.
    pub span: Span,
    /// Slot name; `None` is the default slot.
    pub name: Option<SmolStr>,
}

/// Re-render granularity of a [`RerenderBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RerenderMode {
    /// Rebuild whenever a dependency of the expression changes.
    Rerender,
    /// Rebuild only when the expression's value changes.
    Guard,
}

impl RerenderMode {
    /// The block keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            RerenderMode::Rerender => "rerender",
            RerenderMode::Guard => "guard",
        }
    }
}

/// A `{#rerender}` or `{#guard}` block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RerenderBlock {
    /// The span of the block.
    pub span: Span,
    /// Rerender or guard.
    pub mode: RerenderMode,
    /// The watched expression.
    pub expression: Expr,
    /// The expression as written.
    pub source: String,
    /// Block content.
    pub content: Vec<TemplateNode>,
}
