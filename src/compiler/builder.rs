//! Tree Builder: one left-to-right scan from characters to tokens, then a
//! bracket-matching pass from tokens to [`WildTree`]s.

use super::error::{CompileError, ErrorKind};
use super::trace::{SourceId, Trace};
use super::wild::{BlockKind, Separator, Token, WildTree};

/// Statement separator used when none is configured.
pub const DEFAULT_SEPARATOR: char = ';';

#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder {
    source: SourceId,
    separator: char,
}

impl TreeBuilder {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            separator: DEFAULT_SEPARATOR,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Parse `text` into one tree per top-level statement.
    pub fn parse(&self, text: &str) -> Result<Vec<WildTree>, CompileError> {
        let tokens = self.tokenize(text)?;
        self.group(&tokens)
    }

    // ── Tokenizer ────────────────────────────────────────────────

    /// Split `text` into words. Brackets, commas, dots and the statement
    /// separator are always words of their own; whitespace ends a word.
    pub fn tokenize(&self, text: &str) -> Result<Vec<Token>, CompileError> {
        let mut lexer = Lexer::new(text, self.source, self.separator);
        lexer.tokenize()?;
        Ok(lexer.tokens)
    }

    /// Tokenize compiler-generated text; every token carries `trace`.
    pub fn tokenize_synthetic(&self, text: &str, trace: Trace) -> Result<Vec<Token>, CompileError> {
        let mut tokens = self.tokenize(text)?;
        for token in &mut tokens {
            token.trace = trace;
        }
        Ok(tokens)
    }

    // ── Grouper ──────────────────────────────────────────────────

    /// Match brackets and split the top level on the statement separator.
    pub fn group(&self, tokens: &[Token]) -> Result<Vec<WildTree>, CompileError> {
        let items = self.collect(tokens)?;
        let trace = tokens.first().map_or(Trace::start(self.source), |t| t.trace);
        let mut lines = Vec::new();
        for piece in split_items(items, self.separator) {
            if !piece.is_empty() {
                lines.push(WildTree::line(into_leaves(piece), trace));
            }
        }
        Ok(lines)
    }

    /// Group `tokens` that form exactly one bracketed group, returning that group.
    pub fn block(&self, tokens: &[Token]) -> Result<WildTree, CompileError> {
        let trace = tokens.first().map_or(Trace::start(self.source), |t| t.trace);
        let mut items = self.collect(tokens)?;
        match (items.pop(), items.is_empty()) {
            (Some(Item::Tree(tree)), true) if tree.is_group() => Ok(tree),
            _ => Err(CompileError::internal("Expected exactly one bracketed group", trace)),
        }
    }

    /// Group `tokens` as a single line without splitting on separators.
    pub fn line(&self, tokens: &[Token]) -> Result<WildTree, CompileError> {
        let items = self.collect(tokens)?;
        let trace = tokens.first().map_or(Trace::start(self.source), |t| t.trace);
        Ok(WildTree::line(into_leaves(items), trace))
    }

    fn collect(&self, tokens: &[Token]) -> Result<Vec<Item>, CompileError> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut top: Vec<Item> = Vec::new();

        for token in tokens {
            let single = single_char(&token.text);

            if let Some(kind) = single.and_then(BlockKind::from_open) {
                stack.push(Frame {
                    kind,
                    trace: token.trace,
                    items: Vec::new(),
                });
                continue;
            }

            if let Some(kind) = single.and_then(BlockKind::from_close) {
                let frame = stack
                    .pop()
                    .ok_or_else(|| CompileError::mismatched_bracket(None, kind.close(), token.trace))?;
                if frame.kind != kind {
                    return Err(CompileError::mismatched_bracket(
                        Some(frame.kind.close()),
                        kind.close(),
                        token.trace,
                    ));
                }
                let tree = finish(frame, self.separator)?;
                match stack.last_mut() {
                    Some(parent) => parent.items.push(Item::Tree(tree)),
                    None => top.push(Item::Tree(tree)),
                }
                continue;
            }

            let item = match single {
                Some(c) if c == self.separator || c == ',' => Item::Sep(token.clone()),
                _ => Item::Tree(WildTree::leaf(token.clone())),
            };
            match stack.last_mut() {
                Some(frame) => frame.items.push(item),
                None => top.push(item),
            }
        }

        if let Some(frame) = stack.pop() {
            return Err(CompileError::new(
                ErrorKind::MismatchedBracket,
                format!("Expected '{}' before the end of input", frame.kind.close()),
                frame.trace,
            ));
        }
        Ok(top)
    }
}

// ── Bracket scanning helpers for statement readers ───────────────

/// Index of the token closing the bracket opened at `open`.
pub fn matching_close(tokens: &[Token], open: usize) -> Result<usize, CompileError> {
    let mut stack: Vec<(BlockKind, Trace)> = Vec::new();
    for (i, token) in tokens.iter().enumerate().skip(open) {
        let Some(c) = single_char(&token.text) else { continue };
        if let Some(kind) = BlockKind::from_open(c) {
            stack.push((kind, token.trace));
        } else if let Some(kind) = BlockKind::from_close(c) {
            let (expected, _) = stack
                .pop()
                .ok_or_else(|| CompileError::mismatched_bracket(None, c, token.trace))?;
            if expected != kind {
                return Err(CompileError::mismatched_bracket(Some(expected.close()), c, token.trace));
            }
            if stack.is_empty() {
                return Ok(i);
            }
        }
    }
    let trace = stack.last().map_or_else(
        || tokens.get(open).map_or(Trace::default(), |t| t.trace),
        |(_, trace)| *trace,
    );
    let close = stack.last().map_or(')', |(kind, _)| kind.close());
    Err(CompileError::new(
        ErrorKind::MismatchedBracket,
        format!("Expected '{close}' before the end of input"),
        trace,
    ))
}

/// Index of the first `separator` at bracket depth zero at or after `start`.
pub fn statement_end(tokens: &[Token], start: usize, separator: char) -> Result<Option<usize>, CompileError> {
    let mut i = start;
    while let Some(token) = tokens.get(i) {
        match single_char(&token.text) {
            Some(c) if BlockKind::from_open(c).is_some() => {
                i = matching_close(tokens, i)?;
            }
            Some(c) if BlockKind::from_close(c).is_some() => {
                return Err(CompileError::mismatched_bracket(None, c, token.trace));
            }
            Some(c) if c == separator => return Ok(Some(i)),
            _ => {}
        }
        i += 1;
    }
    Ok(None)
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

// ── Grouping internals ───────────────────────────────────────────

enum Item {
    Tree(WildTree),
    Sep(Token),
}

struct Frame {
    kind: BlockKind,
    trace: Trace,
    items: Vec<Item>,
}

fn is_sep(item: &Item, c: char) -> bool {
    matches!(item, Item::Sep(token) if single_char(&token.text) == Some(c))
}

fn split_items(items: Vec<Item>, c: char) -> Vec<Vec<Item>> {
    let mut pieces = vec![Vec::new()];
    for item in items {
        if is_sep(&item, c) {
            pieces.push(Vec::new());
        } else if let Some(piece) = pieces.last_mut() {
            piece.push(item);
        }
    }
    pieces
}

/// Separators left inside a line are ordinary words.
fn into_leaves(items: Vec<Item>) -> Vec<WildTree> {
    items
        .into_iter()
        .map(|item| match item {
            Item::Tree(tree) => tree,
            Item::Sep(token) => WildTree::leaf(token),
        })
        .collect()
}

fn finish(frame: Frame, separator: char) -> Result<WildTree, CompileError> {
    let Frame { kind, trace, items } = frame;

    if items.iter().any(|item| is_sep(item, separator)) {
        let children = split_items(items, separator)
            .into_iter()
            .filter(|piece| !piece.is_empty())
            .map(|piece| WildTree::line(into_leaves(piece), trace))
            .collect();
        return Ok(WildTree::group(children, kind, Separator::Statement(separator), trace));
    }

    if items.iter().any(|item| is_sep(item, ',')) {
        let mut children = Vec::new();
        for piece in split_items(items, ',') {
            if piece.is_empty() {
                return Err(CompileError::syntax("Expected a value around ','", trace));
            }
            children.push(WildTree::line(into_leaves(piece), trace));
        }
        return Ok(WildTree::group(children, kind, Separator::Comma, trace));
    }

    Ok(WildTree::group(into_leaves(items), kind, Separator::Space, trace))
}

// ── Lexer ────────────────────────────────────────────────────────

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    source: SourceId,
    separator: char,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str, source: SourceId, separator: char) -> Self {
        Self {
            chars: text.chars().peekable(),
            source,
            separator,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn trace(&self) -> Trace {
        Trace::new(self.source, self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn is_punct(&self, c: char) -> bool {
        c == self.separator
            || c == ','
            || c == '.'
            || BlockKind::from_open(c).is_some()
            || BlockKind::from_close(c).is_some()
    }

    fn tokenize(&mut self) -> Result<(), CompileError> {
        let mut word = String::new();
        let mut word_trace = self.trace();

        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.flush(&mut word, word_trace);
                self.bump();
                continue;
            }

            if c == '/' && word.is_empty() {
                let mut ahead = self.chars.clone();
                ahead.next();
                if ahead.peek() == Some(&'/') {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    continue;
                }
            }

            if c == '"' {
                self.flush(&mut word, word_trace);
                let start = self.trace();
                let literal = self.string_literal(start)?;
                self.tokens.push(Token::new(literal, start));
                continue;
            }

            if self.is_punct(c) {
                self.flush(&mut word, word_trace);
                let trace = self.trace();
                self.bump();
                self.tokens.push(Token::new(c, trace));
                continue;
            }

            if word.is_empty() {
                word_trace = self.trace();
            }
            word.push(c);
            self.bump();
        }

        self.flush(&mut word, word_trace);
        Ok(())
    }

    fn flush(&mut self, word: &mut String, trace: Trace) {
        if !word.is_empty() {
            self.tokens.push(Token::new(std::mem::take(word), trace));
        }
    }

    /// Read a double-quoted literal, keeping the quotes and escapes verbatim.
    fn string_literal(&mut self, start: Trace) -> Result<String, CompileError> {
        let mut literal = String::new();
        if let Some(quote) = self.bump() {
            literal.push(quote);
        }
        while let Some(c) = self.bump() {
            literal.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = self.bump() {
                        literal.push(escaped);
                    }
                }
                '"' => return Ok(literal),
                '\n' => break,
                _ => {}
            }
        }
        Err(CompileError::syntax("Unterminated string literal", start))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn builder() -> TreeBuilder {
        TreeBuilder::new(SourceId(0))
    }

    fn texts(src: &str) -> Vec<String> {
        builder().tokenize(src).unwrap().into_iter().map(|t| t.text).collect()
    }

    fn parse(src: &str) -> Vec<WildTree> {
        builder().parse(src).unwrap()
    }

    #[test]
    fn words_end_at_whitespace_and_brackets() {
        assert_eq!(texts("x = f(a,b);"), vec!["x", "=", "f", "(", "a", ",", "b", ")", ";"]);
        assert_eq!(texts("o.Get(\"@s\")"), vec!["o", ".", "Get", "(", "\"@s\"", ")"]);
        assert_eq!(texts("a >= -5"), vec!["a", ">=", "-5"]);
    }

    #[test]
    fn traces_track_lines_and_columns() {
        let tokens = builder().tokenize("a\n  bb").unwrap();
        assert_eq!((tokens[0].trace.line, tokens[0].trace.column), (1, 1));
        assert_eq!((tokens[1].trace.line, tokens[1].trace.column), (2, 3));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(texts("a // b c\nd"), vec!["a", "d"]);
        assert_eq!(texts("a / b"), vec!["a", "/", "b"]);
    }

    #[test]
    fn string_literals_keep_spaces() {
        assert_eq!(texts("s = \"a b; c\";"), vec!["s", "=", "\"a b; c\"", ";"]);
        let err = builder().tokenize("\"open").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn top_level_split_on_separator() {
        let lines = parse("int x = 1; x = x + 2; y");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].as_children().unwrap().len(), 4);
        assert!(lines[2].is_leaf());
    }

    #[test]
    fn configured_separator() {
        let lines = TreeBuilder::new(SourceId(0)).with_separator('|').parse("a = 1 | b = 2").unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn empty_bracket_is_empty_group() {
        let lines = parse("f()");
        let children = lines[0].as_children().unwrap();
        assert_eq!(children[1].kind(), Some(BlockKind::Paren));
        assert!(children[1].as_children().unwrap().is_empty());
    }

    #[test]
    fn brace_with_statements_uses_statement_separator() {
        let lines = parse("{ a = 1; b = 2; }");
        assert_eq!(lines[0].kind(), Some(BlockKind::Line));
        let block = &lines[0].as_children().unwrap()[0];
        assert_eq!(block.kind(), Some(BlockKind::Brace));
        assert_eq!(block.separator(), Some(Separator::Statement(';')));
        assert_eq!(block.as_children().unwrap().len(), 2);
    }

    #[test]
    fn commas_split_argument_lists() {
        let lines = parse("f(a + 1, b)");
        let args = &lines[0].as_children().unwrap()[1];
        assert_eq!(args.separator(), Some(Separator::Comma));
        assert_eq!(args.as_children().unwrap().len(), 2);
        assert_eq!(builder().parse("f(a,)").unwrap_err().kind, ErrorKind::Syntax);
    }

    #[test]
    fn nested_same_kind_brackets() {
        let lines = parse("((a) (b))");
        let outer = &lines[0].as_children().unwrap()[0];
        assert_eq!(outer.as_children().unwrap().len(), 2);
        assert_eq!(outer.count_leaves(), 2);
    }

    #[test]
    fn mismatched_brackets_fail() {
        for src in ["(a]", "{ a; ", "a )", "[(])"] {
            let err = builder().parse(src).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MismatchedBracket, "{src}");
        }
        let err = builder().parse("x = (a}").unwrap_err();
        assert_eq!((err.trace.line, err.trace.column), (1, 7));
    }

    #[test]
    fn round_trip_is_idempotent() {
        for src in [
            "int x = 1; if (x > 0) { y = 1; } else { y = 2; }",
            "f(a, b c, (d)); { ; } g()",
            "{ if (a) { b = 1; } c = 2; }",
            "o.Set(\"@s\", x * (y + 1));",
        ] {
            let first = parse(src);
            let rendered: Vec<String> = first.iter().map(WildTree::to_text).collect();
            let second = parse(&rendered.join(";"));
            assert_eq!(first.len(), second.len(), "{src}");
            for (a, b) in first.iter().zip(&second) {
                assert!(a.shape_eq(b), "{src}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn matching_close_and_statement_end() {
        let tokens = builder().tokenize("if (a (b)) x = 1; y").unwrap();
        assert_eq!(matching_close(&tokens, 1).unwrap(), 6);
        assert_eq!(statement_end(&tokens, 7, ';').unwrap(), Some(10));
        assert_eq!(statement_end(&tokens, 11, ';').unwrap(), None);
    }
}
