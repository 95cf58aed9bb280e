//! CSS selectors.
//!
//! Supports selector lists, compound selectors (type, universal, `#id`,
//! `.class`, attribute selectors with every standard operator and the `i`
//! flag), the four combinators and a practical set of pseudo-classes:
//! `:not()`, `:is()`, `:where()`, `:first-child`, `:last-child`,
//! `:only-child`, `:nth-child()`, `:nth-last-child()`, `:first-of-type`,
//! `:last-of-type`, `:checked`, `:disabled`, `:enabled`, `:empty` and `:root`.
//!
//! Matching walks the light tree only, so a selector never crosses a shadow
//! boundary.

use crate::document::{Document, DomTree};
use crate::error::SelectorError;
use crate::node::{ElementData, NodeId, NodeKind};
use smol_str::SmolStr;
use std::fmt;
use std::str::FromStr;

/// Selector specificity as `(ids, classes, types)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Specificity(pub u32, pub u32, pub u32);

impl std::ops::Add for Specificity {
    type Output = Specificity;

    fn add(self, rhs: Self) -> Self {
        Specificity(self.0 + rhs.0, self.1 + rhs.1, self.2 + rhs.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq)]
struct AttrSelector {
    name: SmolStr,
    op: AttrOp,
    value: String,
    case_insensitive: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Pseudo {
    Not(Vec<Complex>),
    Is(Vec<Complex>),
    Where(Vec<Complex>),
    NthChild { a: i32, b: i32, from_end: bool },
    FirstOfType,
    LastOfType,
    Checked,
    Disabled,
    Enabled,
    Empty,
    Root,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<SmolStr>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<Pseudo>,
}

/// Compound selectors left to right; `combinators[i]` joins
/// `compounds[i]` and `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    list: Vec<Complex>,
}

impl Selector {
    /// Parses a selector list such as `ul > li.active, [data-x]`.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut parser = SelectorParser { src: source, pos: 0 };
        parser.skip_whitespace();
        if parser.peek().is_none() {
            return Err(parser.error("empty selector"));
        }
        let list = parser.parse_list(false)?;
        Ok(Self {
            source: source.to_string(),
            list,
        })
    }

    /// The selector text as given.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The highest specificity among the selectors in the list.
    pub fn specificity(&self) -> Specificity {
        self.list
            .iter()
            .map(Complex::specificity)
            .max()
            .unwrap_or_default()
    }

    /// The highest specificity among the selectors that match `id`.
    pub(crate) fn match_specificity(&self, tree: &DomTree, id: NodeId) -> Option<Specificity> {
        self.list
            .iter()
            .filter(|c| c.matches(tree, id))
            .map(Complex::specificity)
            .max()
    }

    pub(crate) fn matches_in(&self, tree: &DomTree, id: NodeId) -> bool {
        tree.is_element(id) && self.list.iter().any(|c| c.matches(tree, id))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

// === Parsing ===

struct SelectorParser<'a> {
    src: &'a str,
    pos: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

impl SelectorParser<'_> {
    fn error(&self, message: &str) -> SelectorError {
        SelectorError {
            selector: self.src.to_string(),
            message: message.to_string(),
            offset: self.pos,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
        self.pos > start
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("dangling escape")),
                }
            } else if is_ident_char(c) {
                out.push(c);
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if out.is_empty() || out == "-" || out.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error("expected identifier"));
        }
        Ok(out)
    }

    fn parse_list(&mut self, nested: bool) -> Result<Vec<Complex>, SelectorError> {
        let mut list = Vec::new();
        loop {
            self.skip_whitespace();
            list.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some(')') if nested => return Ok(list),
                None if !nested => return Ok(list),
                None => return Err(self.error("expected `)`")),
                Some(_) => return Err(self.error("unexpected character")),
            }
        }
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::Adjacent,
                Some('~') => Combinator::Sibling,
                Some(',') | Some(')') | None => break,
                Some(_) if had_space => Combinator::Descendant,
                Some(_) => return Err(self.error("unexpected character")),
            };
            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_whitespace();
            }
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let start = self.pos;
        if self.eat('*') {
            // Universal.
        } else if self.peek().is_some_and(|c| is_ident_char(c) || c == '\\') {
            compound.tag = Some(SmolStr::new(self.ident()?.to_ascii_lowercase()));
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attribute()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.pseudos.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }
        if self.pos == start {
            return Err(self.error("expected selector"));
        }
        Ok(compound)
    }

    fn parse_attribute(&mut self) -> Result<AttrSelector, SelectorError> {
        self.skip_whitespace();
        let name = SmolStr::new(self.ident()?.to_ascii_lowercase());
        self.skip_whitespace();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                    case_insensitive: false,
                });
            }
            Some('=') => AttrOp::Equals,
            Some('~') => AttrOp::Includes,
            Some('|') => AttrOp::DashMatch,
            Some('^') => AttrOp::Prefix,
            Some('$') => AttrOp::Suffix,
            Some('*') => AttrOp::Substring,
            _ => return Err(self.error("expected attribute operator")),
        };
        self.pos += 1;
        if op != AttrOp::Equals && !self.eat('=') {
            return Err(self.error("expected `=`"));
        }
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some('\\') => match self.bump() {
                            Some(c) => value.push(c),
                            None => return Err(self.error("unterminated string")),
                        },
                        Some(c) if c == quote => break,
                        Some(c) => value.push(c),
                        None => return Err(self.error("unterminated string")),
                    }
                }
                value
            }
            _ => {
                let start = self.pos;
                while self.peek().is_some_and(is_ident_char) {
                    self.pos += self.peek().map_or(1, char::len_utf8);
                }
                if self.pos == start {
                    return Err(self.error("expected attribute value"));
                }
                self.src[start..self.pos].to_string()
            }
        };
        self.skip_whitespace();
        let case_insensitive = match self.peek() {
            Some('i') | Some('I') => {
                self.pos += 1;
                true
            }
            Some('s') | Some('S') => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        self.skip_whitespace();
        if !self.eat(']') {
            return Err(self.error("expected `]`"));
        }
        Ok(AttrSelector {
            name,
            op,
            value,
            case_insensitive,
        })
    }

    fn parse_pseudo(&mut self) -> Result<Pseudo, SelectorError> {
        if self.peek() == Some(':') {
            return Err(self.error("pseudo-elements are not supported"));
        }
        let name_at = self.pos;
        let name = self.ident()?.to_ascii_lowercase();
        if self.eat('(') {
            let pseudo = match name.as_str() {
                "not" => Pseudo::Not(self.parse_list(true)?),
                "is" | "matches" => Pseudo::Is(self.parse_list(true)?),
                "where" => Pseudo::Where(self.parse_list(true)?),
                "nth-child" | "nth-last-child" => {
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c != ')') {
                        self.pos += 1;
                    }
                    let (a, b) = parse_nth(&self.src[start..self.pos])
                        .ok_or_else(|| self.error("invalid An+B expression"))?;
                    Pseudo::NthChild {
                        a,
                        b,
                        from_end: name == "nth-last-child",
                    }
                }
                _ => {
                    self.pos = name_at;
                    return Err(self.error("unsupported pseudo-class"));
                }
            };
            self.skip_whitespace();
            if !self.eat(')') {
                return Err(self.error("expected `)`"));
            }
            return Ok(pseudo);
        }
        Ok(match name.as_str() {
            "first-child" => Pseudo::NthChild {
                a: 0,
                b: 1,
                from_end: false,
            },
            "last-child" => Pseudo::NthChild {
                a: 0,
                b: 1,
                from_end: true,
            },
            "only-child" => Pseudo::Is(vec![Complex {
                compounds: vec![Compound {
                    pseudos: vec![
                        Pseudo::NthChild {
                            a: 0,
                            b: 1,
                            from_end: false,
                        },
                        Pseudo::NthChild {
                            a: 0,
                            b: 1,
                            from_end: true,
                        },
                    ],
                    ..Compound::default()
                }],
                combinators: Vec::new(),
            }]),
            "first-of-type" => Pseudo::FirstOfType,
            "last-of-type" => Pseudo::LastOfType,
            "checked" => Pseudo::Checked,
            "disabled" => Pseudo::Disabled,
            "enabled" => Pseudo::Enabled,
            "empty" => Pseudo::Empty,
            "root" => Pseudo::Root,
            _ => {
                self.pos = name_at;
                return Err(self.error("unsupported pseudo-class"));
            }
        })
    }
}

/// Parses `An+B`, `odd`, `even` or a plain integer.
fn parse_nth(text: &str) -> Option<(i32, i32)> {
    let text: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match text.as_str() {
        "odd" => return Some((2, 1)),
        "even" => return Some((2, 0)),
        "" => return None,
        _ => {}
    }
    match text.split_once('n') {
        Some((a, b)) => {
            let a = match a {
                "" | "+" => 1,
                "-" => -1,
                a => a.parse().ok()?,
            };
            let b = if b.is_empty() {
                0
            } else {
                let digits = b.strip_prefix('+').unwrap_or(b);
                if !b.starts_with(['+', '-']) {
                    return None;
                }
                digits.parse().ok()?
            };
            Some((a, b))
        }
        None => Some((0, text.parse().ok()?)),
    }
}

fn nth_matches(a: i32, b: i32, position: i32) -> bool {
    if a == 0 {
        return position == b;
    }
    let diff = position - b;
    diff % a == 0 && diff / a >= 0
}

// === Matching ===

impl Complex {
    fn specificity(&self) -> Specificity {
        self.compounds
            .iter()
            .fold(Specificity::default(), |acc, c| acc + c.specificity())
    }

    fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        self.match_at(tree, id, self.compounds.len() - 1)
    }

    fn match_at(&self, tree: &DomTree, id: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(tree, id) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => {
                parent_element(tree, id).is_some_and(|p| self.match_at(tree, p, index - 1))
            }
            Combinator::Descendant => {
                let mut current = parent_element(tree, id);
                while let Some(ancestor) = current {
                    if self.match_at(tree, ancestor, index - 1) {
                        return true;
                    }
                    current = parent_element(tree, ancestor);
                }
                false
            }
            Combinator::Adjacent => {
                let siblings = element_siblings(tree, id);
                let position = siblings.iter().position(|&s| s == id);
                position
                    .and_then(|p| p.checked_sub(1))
                    .is_some_and(|p| self.match_at(tree, siblings[p], index - 1))
            }
            Combinator::Sibling => {
                let siblings = element_siblings(tree, id);
                siblings
                    .iter()
                    .take_while(|&&s| s != id)
                    .any(|&s| self.match_at(tree, s, index - 1))
            }
        }
    }
}

fn parent_element(tree: &DomTree, id: NodeId) -> Option<NodeId> {
    tree.parent(id).filter(|&p| tree.is_element(p))
}

fn element_siblings(tree: &DomTree, id: NodeId) -> Vec<NodeId> {
    match tree.parent(id) {
        Some(parent) => tree
            .children(parent)
            .iter()
            .copied()
            .filter(|&c| tree.is_element(c))
            .collect(),
        None => vec![id],
    }
}

impl Compound {
    fn specificity(&self) -> Specificity {
        let mut s = Specificity(
            self.ids.len() as u32,
            (self.classes.len() + self.attrs.len()) as u32,
            u32::from(self.tag.is_some()),
        );
        for pseudo in &self.pseudos {
            s = s + match pseudo {
                Pseudo::Not(list) | Pseudo::Is(list) => list
                    .iter()
                    .map(Complex::specificity)
                    .max()
                    .unwrap_or_default(),
                Pseudo::Where(_) => Specificity::default(),
                _ => Specificity(0, 1, 0),
            };
        }
        s
    }

    fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        let Some(element) = tree.element(id) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if element.tag != *tag {
                return false;
            }
        }
        if !self
            .ids
            .iter()
            .all(|want| element.attrs.get("id").is_some_and(|v| v == want))
        {
            return false;
        }
        if !self.classes.is_empty() {
            let class = element.attrs.get("class").map(String::as_str).unwrap_or("");
            if !self
                .classes
                .iter()
                .all(|c| class.split_whitespace().any(|have| have == c))
            {
                return false;
            }
        }
        self.attrs.iter().all(|a| a.matches(element))
            && self.pseudos.iter().all(|p| p.matches(tree, id, element))
    }
}

impl AttrSelector {
    fn matches(&self, element: &ElementData) -> bool {
        let Some(actual) = element.attrs.get(self.name.as_str()) else {
            return false;
        };
        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), self.value.to_lowercase())
        } else {
            (actual.clone(), self.value.clone())
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == expected,
            AttrOp::Includes => actual.split_whitespace().any(|w| w == expected),
            AttrOp::DashMatch => {
                actual == expected || actual.starts_with(&format!("{expected}-"))
            }
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Substring => !expected.is_empty() && actual.contains(&expected),
        }
    }
}

const FORM_CONTROLS: &[&str] = &[
    "button", "input", "select", "textarea", "option", "optgroup", "fieldset",
];

impl Pseudo {
    fn matches(&self, tree: &DomTree, id: NodeId, element: &ElementData) -> bool {
        match self {
            Pseudo::Not(list) => !list.iter().any(|c| c.matches(tree, id)),
            Pseudo::Is(list) | Pseudo::Where(list) => list.iter().any(|c| c.matches(tree, id)),
            Pseudo::NthChild { a, b, from_end } => {
                let siblings = element_siblings(tree, id);
                let Some(index) = siblings.iter().position(|&s| s == id) else {
                    return false;
                };
                let position = if *from_end {
                    siblings.len() - index
                } else {
                    index + 1
                };
                nth_matches(*a, *b, position as i32)
            }
            Pseudo::FirstOfType | Pseudo::LastOfType => {
                let same: Vec<NodeId> = element_siblings(tree, id)
                    .into_iter()
                    .filter(|&s| tree.element(s).is_some_and(|e| e.tag == element.tag))
                    .collect();
                let edge = if matches!(self, Pseudo::FirstOfType) {
                    same.first()
                } else {
                    same.last()
                };
                edge == Some(&id)
            }
            Pseudo::Checked => match element.props.get("checked") {
                Some(value) => value.as_bool().unwrap_or(false),
                None => {
                    element.attrs.contains_key("checked")
                        || (element.tag == "option" && element.attrs.contains_key("selected"))
                }
            },
            Pseudo::Disabled => {
                FORM_CONTROLS.contains(&element.tag.as_str())
                    && element.attrs.contains_key("disabled")
            }
            Pseudo::Enabled => {
                FORM_CONTROLS.contains(&element.tag.as_str())
                    && !element.attrs.contains_key("disabled")
            }
            Pseudo::Empty => tree.children(id).iter().all(|&c| {
                match tree.node(c).map(|n| &n.kind) {
                    Some(NodeKind::Comment(_)) => true,
                    Some(NodeKind::Text(text)) => text.is_empty(),
                    _ => false,
                }
            }),
            Pseudo::Root => matches!(
                tree.parent(id).and_then(|p| tree.node(p)).map(|n| &n.kind),
                Some(NodeKind::Document { .. })
            ),
        }
    }
}

// === Document API ===

impl Document {
    /// Whether the element matches the selector.
    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.with(|t| selector.matches_in(t, id))
    }

    /// Light-tree descendants of `root` that match, in document order.
    pub fn select_all(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.with(|t| {
            t.descendants(root)
                .into_iter()
                .filter(|&id| selector.matches_in(t, id))
                .collect()
        })
    }

    /// Parses `selector` and returns every matching light-tree descendant of
    /// `root`.
    pub fn query_selector_all(
        &self,
        root: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_all(root, &selector))
    }

    /// The first matching light-tree descendant of `root`.
    pub fn query_selector(
        &self,
        root: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, SelectorError> {
        Ok(self.query_selector_all(root, selector)?.into_iter().next())
    }

    /// The element itself or its nearest light-tree ancestor that matches.
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        self.with(|t| {
            let mut current = Some(id);
            while let Some(node) = current {
                if selector.matches_in(t, node) {
                    return Some(node);
                }
                current = t.parent(node);
            }
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc() -> Document {
        Document::from_html(concat!(
            "<ul id=\"list\" class=\"menu main\">",
            "<li class=\"item\" data-kind=\"fruit-apple\">a</li>",
            "<li class=\"item active\">b</li>",
            "<li class=\"item\" lang=\"en-US\"><span>c</span></li>",
            "</ul>",
            "<p></p><input type=\"checkbox\" checked><button disabled>x</button>",
        ))
    }

    fn count(doc: &Document, selector: &str) -> usize {
        doc.query_selector_all(doc.root(), selector).unwrap().len()
    }

    #[test]
    fn test_simple_and_compound() {
        let doc = doc();
        assert_eq!(count(&doc, "li"), 3);
        assert_eq!(count(&doc, "li.item.active"), 1);
        assert_eq!(count(&doc, "#list"), 1);
        assert_eq!(count(&doc, "*.menu"), 1);
        assert_eq!(count(&doc, "li, span"), 4);
    }

    #[test]
    fn test_combinators() {
        let doc = doc();
        assert_eq!(count(&doc, "ul > li"), 3);
        assert_eq!(count(&doc, "ul span"), 1);
        assert_eq!(count(&doc, "ul > span"), 0);
        assert_eq!(count(&doc, ".active + li"), 1);
        assert_eq!(count(&doc, "li:first-child ~ li"), 2);
    }

    #[test]
    fn test_attribute_operators() {
        let doc = doc();
        assert_eq!(count(&doc, "[data-kind]"), 1);
        assert_eq!(count(&doc, "[data-kind^=fruit]"), 1);
        assert_eq!(count(&doc, "[data-kind$='apple']"), 1);
        assert_eq!(count(&doc, "[data-kind*=\"t-a\"]"), 1);
        assert_eq!(count(&doc, "[lang|=en]"), 1);
        assert_eq!(count(&doc, "[class~=main]"), 1);
        assert_eq!(count(&doc, "[lang=EN-us i]"), 1);
        assert_eq!(count(&doc, "[lang=EN-us]"), 0);
    }

    #[test]
    fn test_pseudo_classes() {
        let doc = doc();
        assert_eq!(count(&doc, "li:nth-child(2)"), 1);
        assert_eq!(count(&doc, "li:nth-child(odd)"), 2);
        assert_eq!(count(&doc, "li:nth-last-child(1)"), 1);
        assert_eq!(count(&doc, "li:not(.active)"), 2);
        assert_eq!(count(&doc, ":is(p, span)"), 2);
        assert_eq!(count(&doc, "span:only-child"), 1);
        assert_eq!(count(&doc, "p:empty"), 1);
        assert_eq!(count(&doc, ":checked"), 1);
        assert_eq!(count(&doc, "button:disabled"), 1);
        assert_eq!(count(&doc, "input:enabled"), 1);
        assert_eq!(count(&doc, ":root"), 1);
    }

    #[test]
    fn test_specificity() {
        let s = |sel: &str| Selector::parse(sel).unwrap().specificity();
        assert_eq!(s("li"), Specificity(0, 0, 1));
        assert_eq!(s("ul#list > li.item"), Specificity(1, 1, 2));
        assert_eq!(s(":where(#a) .b"), Specificity(0, 1, 0));
        assert_eq!(s(":not(#a)"), Specificity(1, 0, 0));
        assert!(s("#a") > s(".a.b.c"));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "li >", "[x", ":hover", "a::before", "li,", ".", "a )"] {
            assert!(Selector::parse(bad).is_err(), "{bad:?} should fail");
        }
        let err = Selector::parse("div $").unwrap_err();
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_closest_and_shadow_scope() {
        let doc = doc();
        let span = doc.query_selector(doc.root(), "span").unwrap().unwrap();
        let ul = Selector::parse("ul").unwrap();
        assert_eq!(
            doc.closest(span, &ul),
            doc.query_selector(doc.root(), "#list").unwrap()
        );

        let host = doc.create_element("div");
        doc.append_child(doc.body(), host).unwrap();
        let shadow = doc
            .attach_shadow(host, crate::ShadowRootMode::Open)
            .unwrap();
        let inner = doc.create_element("li");
        doc.append_child(shadow, inner).unwrap();
        assert_eq!(count(&doc, "li"), 3);
        assert_eq!(count(&doc, "body li"), 3);
        assert_eq!(doc.query_selector_all(shadow, "li").unwrap(), vec![inner]);
        assert!(!doc.matches(inner, &Selector::parse("div li").unwrap()));
    }
}
