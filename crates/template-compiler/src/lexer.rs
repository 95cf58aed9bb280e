//! Expression lexer using logos.
//!
//! Tag bodies such as `formatDate(event.start, 'MMM D')` or
//! `classIf isActive 'on' 'off'` are tokenized here before the expression
//! parser builds a call tree out of them. Dotted paths lex as one token.

use logos::Logos;
use std::ops::Range;

/// Token kinds inside a template expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Logos, Default)]
#[logos(skip r"[ \t\r\n]+")]
pub enum ExprTokenKind {
    /// `(`
    #[token("(", priority = 10)]
    LParen,

    /// `)`
    #[token(")", priority = 10)]
    RParen,

    /// `[`
    #[token("[", priority = 10)]
    LBracket,

    /// `]`
    #[token("]", priority = 10)]
    RBracket,

    /// `{`
    #[token("{", priority = 10)]
    LBrace,

    /// `}`
    #[token("}", priority = 10)]
    RBrace,

    /// `,`
    #[token(",", priority = 10)]
    Comma,

    /// `:`
    #[token(":", priority = 10)]
    Colon,

    /// `=` (partial arguments)
    #[token("=", priority = 10)]
    Eq,

    /// `true`
    #[token("true", priority = 5)]
    True,

    /// `false`
    #[token("false", priority = 5)]
    False,

    /// `null`
    #[token("null", priority = 5)]
    Null,

    /// `undefined`
    #[token("undefined", priority = 5)]
    Undefined,

    /// A quoted string literal.
    #[regex(r#""([^"\\]|\\.)*""#, priority = 6)]
    #[regex(r"'([^'\\]|\\.)*'", priority = 6)]
    String,

    /// A number literal.
    #[regex(r"-?[0-9]+(\.[0-9]+)?", priority = 6)]
    Number,

    /// An identifier or dotted path (`item.name`, `items.0`, `@index`).
    #[regex(r"[\p{L}_$@][\p{L}\p{N}_$\-]*(\.[\p{L}\p{N}_$\-]+)*", priority = 3)]
    Ident,

    /// End of input.
    Eof,

    /// Anything the lexer does not recognize.
    #[default]
    Error,
}

impl ExprTokenKind {
    /// Human-readable token name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ExprTokenKind::LParen => "'('",
            ExprTokenKind::RParen => "')'",
            ExprTokenKind::LBracket => "'['",
            ExprTokenKind::RBracket => "']'",
            ExprTokenKind::LBrace => "'{'",
            ExprTokenKind::RBrace => "'}'",
            ExprTokenKind::Comma => "','",
            ExprTokenKind::Colon => "':'",
            ExprTokenKind::Eq => "'='",
            ExprTokenKind::True => "'true'",
            ExprTokenKind::False => "'false'",
            ExprTokenKind::Null => "'null'",
            ExprTokenKind::Undefined => "'undefined'",
            ExprTokenKind::String => "string",
            ExprTokenKind::Number => "number",
            ExprTokenKind::Ident => "identifier",
            ExprTokenKind::Eof => "end of expression",
            ExprTokenKind::Error => "invalid token",
        }
    }
}

/// A token with its byte range in the expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprToken {
    /// The token kind.
    pub kind: ExprTokenKind,
    /// Byte range relative to the start of the expression.
    pub range: Range<usize>,
}

/// Tokenizes a whole expression, always ending with an [`ExprTokenKind::Eof`] token.
pub fn tokenize(source: &str) -> Vec<ExprToken> {
    let mut lexer = ExprTokenKind::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let kind = result.unwrap_or(ExprTokenKind::Error);
        tokens.push(ExprToken {
            kind,
            range: lexer.span(),
        });
    }
    tokens.push(ExprToken {
        kind: ExprTokenKind::Eof,
        range: source.len()..source.len(),
    });
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<ExprTokenKind> {
        tokenize(source)
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| *k != ExprTokenKind::Eof)
            .collect()
    }

    #[test]
    fn test_lisp_call() {
        assert_eq!(
            kinds("classIf isActive 'on'"),
            vec![
                ExprTokenKind::Ident,
                ExprTokenKind::Ident,
                ExprTokenKind::String
            ]
        );
    }

    #[test]
    fn test_paren_call() {
        assert_eq!(
            kinds("join(items, \", \")"),
            vec![
                ExprTokenKind::Ident,
                ExprTokenKind::LParen,
                ExprTokenKind::Ident,
                ExprTokenKind::Comma,
                ExprTokenKind::String,
                ExprTokenKind::RParen
            ]
        );
    }

    #[test]
    fn test_dotted_path_is_one_token() {
        let tokens = tokenize("item.name.first");
        assert_eq!(tokens[0].kind, ExprTokenKind::Ident);
        assert_eq!(tokens[0].range, 0..15);
    }

    #[test]
    fn test_non_ascii_identifiers() {
        let tokens = tokenize("café.名前 x");
        assert_eq!(tokens[0].kind, ExprTokenKind::Ident);
        assert_eq!(tokens[0].range, 0..12);
        assert_eq!(tokens[1].kind, ExprTokenKind::Ident);
    }

    #[test]
    fn test_keywords_versus_identifiers() {
        assert_eq!(
            kinds("true trueish null"),
            vec![
                ExprTokenKind::True,
                ExprTokenKind::Ident,
                ExprTokenKind::Null
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("range 1 -2.5"),
            vec![
                ExprTokenKind::Ident,
                ExprTokenKind::Number,
                ExprTokenKind::Number
            ]
        );
    }

    #[test]
    fn test_escaped_quote_in_string() {
        assert_eq!(kinds(r"'it\'s'"), vec![ExprTokenKind::String]);
    }

    #[test]
    fn test_invalid_character() {
        assert!(kinds("a + b").contains(&ExprTokenKind::Error));
    }
}
