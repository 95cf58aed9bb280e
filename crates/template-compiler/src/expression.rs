//! Expression AST and parser.
//!
//! Two call styles share one representation:
//!
//! - lisp style: `formatDate date 'YYYY'`
//! - call style: `formatDate(date, 'YYYY')`
//!
//! Both produce [`Expr::Call`] with the helper name and ordered arguments.
//! Arguments may be literals, dotted paths, array/object literals, call-style
//! calls, or parenthesized lisp-style calls.

use crate::lexer::{tokenize, ExprToken, ExprTokenKind};
use smol_str::SmolStr;
use std::fmt;

/// A parsed template expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Expr {
    /// A literal value.
    Literal(Literal),
    /// A dotted lookup into the data context.
    Path(Path),
    /// A helper or method call.
    Call(Call),
    /// An array literal.
    Array(Vec<Expr>),
    /// An object literal.
    Object(Vec<ObjectEntry>),
}

impl Expr {
    /// Collects the names of every call in this expression, outermost first.
    pub fn call_names(&self, out: &mut Vec<SmolStr>) {
        match self {
            Expr::Call(call) => {
                out.push(call.name.clone());
                for arg in &call.args {
                    arg.call_names(out);
                }
            }
            Expr::Array(items) => items.iter().for_each(|e| e.call_names(out)),
            Expr::Object(entries) => entries.iter().for_each(|e| e.value.call_names(out)),
            Expr::Literal(_) | Expr::Path(_) => {}
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Literal {
    /// `null` or `undefined`.
    Null,
    /// `true` / `false`.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string with escapes resolved.
    String(String),
}

/// A dotted path such as `item.name` or `items.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Path {
    /// The path segments.
    pub segments: Vec<SmolStr>,
}

impl Path {
    /// Splits a dotted path.
    pub fn parse(text: &str) -> Self {
        Self {
            segments: text.split('.').map(SmolStr::new).collect(),
        }
    }

    /// The first segment (the name looked up in the data context).
    pub fn root(&self) -> &str {
        self.segments.first().map(SmolStr::as_str).unwrap_or("")
    }

    /// Whether this path is a single identifier.
    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// A call of a helper or method.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Call {
    /// The helper or method name.
    pub name: SmolStr,
    /// Arguments, evaluated before the call.
    pub args: Vec<Expr>,
}

/// A `key: value` entry of an object literal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ObjectEntry {
    /// The key.
    pub key: SmolStr,
    /// The value expression.
    pub value: Expr,
}

/// A `name=value` argument of a partial tag.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArg {
    /// Argument name.
    pub name: SmolStr,
    /// Argument value.
    pub value: Expr,
    /// Source text of the value.
    pub source: String,
}

/// An expression syntax error. `offset` is relative to the expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprError {
    /// What went wrong.
    pub message: String,
    /// Byte offset of the offending token within the expression.
    pub offset: usize,
}

/// Parses a complete expression.
pub fn parse_expression(source: &str) -> Result<Expr, ExprError> {
    let mut parser = ExprParser::new(source);
    if parser.check(ExprTokenKind::Eof) {
        return Err(parser.error_here("empty expression"));
    }
    let expr = parser.parse_sequence(&[ExprTokenKind::Eof])?;
    parser.expect(ExprTokenKind::Eof)?;
    Ok(expr)
}

/// Parses `name=value` pairs, as written after a partial name.
pub fn parse_named_args(source: &str) -> Result<Vec<NamedArg>, ExprError> {
    let mut parser = ExprParser::new(source);
    let mut args = Vec::new();
    while !parser.check(ExprTokenKind::Eof) {
        if !parser.check(ExprTokenKind::Ident) {
            return Err(parser.error_here("expected `name=value` argument"));
        }
        let name = SmolStr::new(parser.current_text());
        parser.advance();
        parser.expect(ExprTokenKind::Eq)?;
        let start = parser.current().range.start;
        let value = parser.parse_atom()?;
        let end = parser.previous_end();
        args.push(NamedArg {
            name,
            value,
            source: source[start..end].to_string(),
        });
    }
    Ok(args)
}

struct ExprParser<'src> {
    source: &'src str,
    tokens: Vec<ExprToken>,
    pos: usize,
}

impl<'src> ExprParser<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            tokens: tokenize(source),
            pos: 0,
        }
    }

    fn current(&self) -> &ExprToken {
        // `tokenize` always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> ExprTokenKind {
        self.current().kind
    }

    fn current_text(&self) -> &'src str {
        &self.source[self.current().range.clone()]
    }

    fn peek_kind(&self) -> ExprTokenKind {
        self.tokens
            .get(self.pos + 1)
            .map(|t| t.kind)
            .unwrap_or(ExprTokenKind::Eof)
    }

    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.range.end)
            .unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: ExprTokenKind) -> bool {
        self.current_kind() == kind
    }

    fn check_any(&self, kinds: &[ExprTokenKind]) -> bool {
        kinds.contains(&self.current_kind())
    }

    fn expect(&mut self, kind: ExprTokenKind) -> Result<(), ExprError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(&format!(
                "expected {}, found {}",
                kind.name(),
                self.current_kind().name()
            )))
        }
    }

    fn error_here(&self, message: &str) -> ExprError {
        ExprError {
            message: message.to_string(),
            offset: self.current().range.start,
        }
    }

    /// Parses one atom, or a lisp-style call if more atoms follow before a
    /// stop token.
    fn parse_sequence(&mut self, stops: &[ExprTokenKind]) -> Result<Expr, ExprError> {
        let head_is_bare_ident =
            self.check(ExprTokenKind::Ident) && !self.current_text().contains('.');
        let head = self.parse_atom()?;
        if self.check_any(stops) {
            return Ok(head);
        }

        let name = match head {
            Expr::Path(path) if head_is_bare_ident => path.segments[0].clone(),
            _ => {
                return Err(self.error_here(&format!(
                    "unexpected {}; only a helper name can take space-separated arguments",
                    self.current_kind().name()
                )))
            }
        };

        let mut args = Vec::new();
        while !self.check_any(stops) {
            if self.check(ExprTokenKind::Eof) {
                return Err(self.error_here("unexpected end of expression"));
            }
            args.push(self.parse_atom()?);
        }
        Ok(Expr::Call(Call { name, args }))
    }

    fn parse_atom(&mut self) -> Result<Expr, ExprError> {
        match self.current_kind() {
            ExprTokenKind::LParen => {
                self.advance();
                let inner = self.parse_sequence(&[ExprTokenKind::RParen])?;
                self.expect(ExprTokenKind::RParen)?;
                Ok(inner)
            }
            ExprTokenKind::LBracket => {
                self.advance();
                let items = self.parse_list(ExprTokenKind::RBracket)?;
                Ok(Expr::Array(items))
            }
            ExprTokenKind::LBrace => {
                self.advance();
                self.parse_object()
            }
            ExprTokenKind::String => {
                let value = unescape_string(self.current_text());
                self.advance();
                Ok(Expr::Literal(Literal::String(value)))
            }
            ExprTokenKind::Number => {
                let text = self.current_text();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| self.error_here(&format!("invalid number `{text}`")))?;
                self.advance();
                Ok(Expr::Literal(Literal::Number(value)))
            }
            ExprTokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            ExprTokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            ExprTokenKind::Null | ExprTokenKind::Undefined => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            ExprTokenKind::Ident => {
                let text = self.current_text();
                let end = self.current().range.end;
                let call_follows = self.peek_kind() == ExprTokenKind::LParen
                    && self.tokens[self.pos + 1].range.start == end;
                self.advance();
                if call_follows && !text.contains('.') {
                    self.advance();
                    let args = self.parse_list(ExprTokenKind::RParen)?;
                    Ok(Expr::Call(Call {
                        name: SmolStr::new(text),
                        args,
                    }))
                } else {
                    Ok(Expr::Path(Path::parse(text)))
                }
            }
            other => Err(self.error_here(&format!("unexpected {}", other.name()))),
        }
    }

    /// Parses comma-separated expressions up to and including `close`.
    fn parse_list(&mut self, close: ExprTokenKind) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(self.parse_sequence(&[ExprTokenKind::Comma, close])?);
            if !self.check(close) {
                self.expect(ExprTokenKind::Comma)?;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn parse_object(&mut self) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        while !self.check(ExprTokenKind::RBrace) {
            let key = match self.current_kind() {
                ExprTokenKind::Ident => SmolStr::new(self.current_text()),
                ExprTokenKind::String => SmolStr::new(unescape_string(self.current_text())),
                _ => return Err(self.error_here("expected object key")),
            };
            self.advance();
            self.expect(ExprTokenKind::Colon)?;
            let value =
                self.parse_sequence(&[ExprTokenKind::Comma, ExprTokenKind::RBrace])?;
            entries.push(ObjectEntry { key, value });
            if !self.check(ExprTokenKind::RBrace) {
                self.expect(ExprTokenKind::Comma)?;
            }
        }
        self.expect(ExprTokenKind::RBrace)?;
        Ok(Expr::Object(entries))
    }
}

/// Strips the quotes of a string token and resolves backslash escapes.
fn unescape_string(token: &str) -> String {
    let inner = &token[1..token.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path(text: &str) -> Expr {
        Expr::Path(Path::parse(text))
    }

    fn string(text: &str) -> Expr {
        Expr::Literal(Literal::String(text.to_string()))
    }

    #[test]
    fn test_single_path() {
        assert_eq!(parse_expression("item.name").unwrap(), path("item.name"));
    }

    #[test]
    fn test_lisp_and_call_styles_match() {
        let lisp = parse_expression("formatDate date 'YYYY'").unwrap();
        let call = parse_expression("formatDate(date, 'YYYY')").unwrap();
        assert_eq!(lisp, call);
        assert_eq!(
            lisp,
            Expr::Call(Call {
                name: "formatDate".into(),
                args: vec![path("date"), string("YYYY")],
            })
        );
    }

    #[test]
    fn test_nested_calls() {
        let expr = parse_expression("concat (capitalize first) ' ' upper(last)").unwrap();
        assert_eq!(
            expr,
            Expr::Call(Call {
                name: "concat".into(),
                args: vec![
                    Expr::Call(Call {
                        name: "capitalize".into(),
                        args: vec![path("first")],
                    }),
                    string(" "),
                    Expr::Call(Call {
                        name: "upper".into(),
                        args: vec![path("last")],
                    }),
                ],
            })
        );
    }

    #[test]
    fn test_space_before_paren_is_lisp_argument() {
        let expr = parse_expression("not (is a b)").unwrap();
        let Expr::Call(call) = expr else {
            panic!("expected call");
        };
        assert_eq!(call.name, "not");
        assert_eq!(call.args.len(), 1);
    }

    #[test]
    fn test_zero_argument_call() {
        assert_eq!(
            parse_expression("toggle()").unwrap(),
            Expr::Call(Call {
                name: "toggle".into(),
                args: vec![],
            })
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            parse_expression("[1, 'a', true, null]").unwrap(),
            Expr::Array(vec![
                Expr::Literal(Literal::Number(1.0)),
                string("a"),
                Expr::Literal(Literal::Bool(true)),
                Expr::Literal(Literal::Null),
            ])
        );
    }

    #[test]
    fn test_object_literal() {
        let expr = parse_expression("classMap {active: isActive, 'is-open': not closed}").unwrap();
        let Expr::Call(call) = expr else {
            panic!("expected call");
        };
        let Expr::Object(entries) = &call.args[0] else {
            panic!("expected object");
        };
        assert_eq!(entries[0].key, "active");
        assert_eq!(entries[1].key, "is-open");
        assert!(matches!(entries[1].value, Expr::Call(_)));
    }

    #[test]
    fn test_path_cannot_take_arguments() {
        let err = parse_expression("item.name other").unwrap_err();
        assert!(err.message.contains("only a helper name"));
        assert_eq!(err.offset, 10);
    }

    #[test]
    fn test_unclosed_call() {
        assert!(parse_expression("join(items, ','").is_err());
        assert!(parse_expression("").is_err());
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(parse_expression(r#"'it\'s'"#).unwrap(), string("it's"));
    }

    #[test]
    fn test_named_args() {
        let args = parse_named_args("title='Hello' count=items.length total=(count items)").unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args[0].name, "title");
        assert_eq!(args[0].value, string("Hello"));
        assert_eq!(args[1].source, "items.length");
        assert!(matches!(args[2].value, Expr::Call(_)));
    }

    #[test]
    fn test_call_names() {
        let expr = parse_expression("concat (capitalize a) b").unwrap();
        let mut names = Vec::new();
        expr.call_names(&mut names);
        assert_eq!(names, vec![SmolStr::new("concat"), SmolStr::new("capitalize")]);
    }
}
