//! Cursor-based scanning over template source.
//!
//! The compiler walks template text with a [`StringScanner`]: literal markup is
//! consumed up to the next tag opener, and tag bodies are cut out with
//! [`StringScanner::read_balanced`], which understands quotes and nested
//! brackets so that `{join(items, '}')}` closes at the right brace.

/// A byte cursor over a source string.
#[derive(Debug, Clone)]
pub struct StringScanner<'src> {
    source: &'src str,
    pos: usize,
}

impl<'src> StringScanner<'src> {
    /// Creates a scanner positioned at the start of `source`.
    pub fn new(source: &'src str) -> Self {
        Self { source, pos: 0 }
    }

    /// The full source being scanned.
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Current byte offset.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to an absolute offset (clamped to the source length).
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.source.len());
    }

    /// Whether the cursor reached the end of the source.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// The unconsumed remainder of the source.
    #[inline]
    pub fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    /// Returns the source between two absolute offsets.
    pub fn slice(&self, start: usize, end: usize) -> &'src str {
        &self.source[start.min(self.source.len())..end.min(self.source.len())]
    }

    /// The character under the cursor.
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// The character `n` characters ahead of the cursor.
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    /// Whether the remainder starts with `prefix`.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    /// Advances by `n` bytes.
    pub fn advance(&mut self, n: usize) {
        self.seek(self.pos + n);
    }

    /// Consumes and returns the next character.
    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consumes `prefix` if the remainder starts with it.
    pub fn consume(&mut self, prefix: &str) -> bool {
        if self.starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    /// Consumes characters while `pred` holds and returns them.
    pub fn consume_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'src str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.source[start..self.pos]
    }

    /// Consumes everything up to (not including) `needle`, or to the end.
    pub fn consume_until(&mut self, needle: &str) -> &'src str {
        let start = self.pos;
        let end = self
            .rest()
            .find(needle)
            .map(|i| start + i)
            .unwrap_or(self.source.len());
        self.pos = end;
        &self.source[start..end]
    }

    /// Skips whitespace, returning how many bytes were skipped.
    pub fn skip_whitespace(&mut self) -> usize {
        self.consume_while(char::is_whitespace).len()
    }

    /// Finds the next occurrence of `needle` that is not escaped by a single
    /// preceding backslash, without moving the cursor.
    pub fn find_unescaped(&self, needle: &str) -> Option<usize> {
        let mut from = self.pos;
        while let Some(rel) = self.source[from..].find(needle) {
            let at = from + rel;
            if !is_escaped(self.source.as_bytes(), at) {
                return Some(at);
            }
            from = at + needle.len();
        }
        None
    }

    /// Reads up to `close`, honoring quotes and nested brackets, and consumes
    /// the closing delimiter.
    ///
    /// Returns the text between the cursor and the delimiter, or `None` (with
    /// the cursor untouched) when the delimiter is never reached at depth zero.
    pub fn read_balanced(&mut self, close: &str) -> Option<&'src str> {
        let start = self.pos;
        let bytes = self.source.as_bytes();
        let mut stack: Vec<u8> = Vec::new();
        let mut quote: Option<u8> = None;
        let mut i = start;

        while i < bytes.len() {
            let b = bytes[i];
            if let Some(q) = quote {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
                i += 1;
                continue;
            }
            if stack.is_empty() && bytes[i..].starts_with(close.as_bytes()) {
                self.pos = i + close.len();
                return Some(&self.source[start..i]);
            }
            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => stack.push(b')'),
                b'[' => stack.push(b']'),
                b'{' => stack.push(b'}'),
                b')' | b']' | b'}' => {
                    if stack.last() == Some(&b) {
                        stack.pop();
                    } else {
                        return None;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        None
    }
}

/// Whether the byte at `at` is preceded by an odd number of backslashes.
pub(crate) fn is_escaped(bytes: &[u8], at: usize) -> bool {
    let backslashes = bytes[..at]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count();
    backslashes % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_and_peek() {
        let mut scanner = StringScanner::new("{#if open}");
        assert_eq!(scanner.peek(), Some('{'));
        assert!(scanner.consume("{#"));
        assert_eq!(scanner.consume_while(|c| c.is_alphabetic()), "if");
        assert_eq!(scanner.skip_whitespace(), 1);
        assert_eq!(scanner.peek_nth(1), Some('p'));
        assert_eq!(scanner.pos(), 5);
    }

    #[test]
    fn test_consume_until() {
        let mut scanner = StringScanner::new("<p>hello {name}</p>");
        assert_eq!(scanner.consume_until("{"), "<p>hello ");
        assert!(scanner.starts_with("{name}"));
        let mut scanner = StringScanner::new("no tags");
        assert_eq!(scanner.consume_until("{"), "no tags");
        assert!(scanner.is_eof());
    }

    #[test]
    fn test_read_balanced_respects_quotes() {
        let mut scanner = StringScanner::new("join(items, '}')} tail");
        assert_eq!(scanner.read_balanced("}"), Some("join(items, '}')"));
        assert_eq!(scanner.rest(), " tail");
    }

    #[test]
    fn test_read_balanced_nested_braces() {
        let mut scanner = StringScanner::new("classMap {active: on}}rest");
        assert_eq!(scanner.read_balanced("}"), Some("classMap {active: on}"));
        assert_eq!(scanner.rest(), "rest");
    }

    #[test]
    fn test_read_balanced_double_close() {
        let mut scanner = StringScanner::new("concat a (b)}}!");
        assert_eq!(scanner.read_balanced("}}"), Some("concat a (b)"));
        assert_eq!(scanner.rest(), "!");
    }

    #[test]
    fn test_read_balanced_unterminated() {
        let mut scanner = StringScanner::new("name");
        assert_eq!(scanner.read_balanced("}"), None);
        assert_eq!(scanner.pos(), 0);
        let mut scanner = StringScanner::new("'open}");
        assert_eq!(scanner.read_balanced("}"), None);
    }

    #[test]
    fn test_find_unescaped() {
        let scanner = StringScanner::new(r"a \{ b { c");
        assert_eq!(scanner.find_unescaped("{"), Some(7));
        let scanner = StringScanner::new(r"a \\{ b");
        assert_eq!(scanner.find_unescaped("{"), Some(4));
    }
}
