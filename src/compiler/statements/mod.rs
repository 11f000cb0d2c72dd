//! Statements: reading a token stream into one tree per statement, and
//! writing each tree into commands.
//!
//! Keyword statements read their own tokens, because their shape can span
//! several separator-terminated pieces (`if (c) a = 1; else a = 2;`).
//! Everything else runs up to the next top-level separator.

pub mod declare;
pub mod if_stmt;

use super::builder::{matching_close, statement_end, TreeBuilder};
use super::context::Context;
use super::error::CompileError;
use super::expr;
use super::trace::Trace;
use super::wild::{BlockKind, Token, WildTree};

pub type ReadFn = fn(&mut Reader<'_>) -> Result<WildTree, CompileError>;
pub type WriteFn = fn(&mut Context, &WildTree) -> Result<(), CompileError>;

/// A keyword statement. `read` consumes the statement's tokens, starting
/// at the keyword. `write` lowers the tree it produced.
pub struct StatementDef {
    pub keyword: &'static str,
    pub read: ReadFn,
    pub write: WriteFn,
}

pub static STATEMENTS: &[StatementDef] = &[StatementDef {
    keyword: "if",
    read: if_stmt::read,
    write: if_stmt::write,
}];

pub fn keyword(word: &str) -> Option<&'static StatementDef> {
    STATEMENTS.iter().find(|def| def.keyword == word)
}

// ── Reading ──────────────────────────────────────────────────────

/// Cursor over a token stream.
pub struct Reader<'a> {
    tokens: &'a [Token],
    pos: usize,
    builder: TreeBuilder,
}

impl<'a> Reader<'a> {
    pub fn new(tokens: &'a [Token], builder: TreeBuilder) -> Self {
        Self { tokens, pos: 0, builder }
    }

    pub fn builder(&self) -> TreeBuilder {
        self.builder
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_is(&self, text: &str) -> bool {
        self.peek().is_some_and(|token| token.text == text)
    }

    pub fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Where the next token is, or the end of the last one.
    pub fn trace(&self) -> Trace {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(Trace::start(self.builder.source()), |token| token.trace)
    }

    fn is_separator(&self, token: &Token) -> bool {
        let mut chars = token.text.chars();
        chars.next() == Some(self.builder.separator()) && chars.next().is_none()
    }

    pub fn skip_separators(&mut self) {
        while self.peek().is_some_and(|token| self.is_separator(token)) {
            self.pos += 1;
        }
    }

    /// Whether the next token opens a bracket of `kind`.
    pub fn peek_open(&self, kind: BlockKind) -> bool {
        self.peek().is_some_and(|token| token.text.chars().eq(std::iter::once(kind.open())))
    }

    /// Read one bracketed group.
    pub fn read_group(&mut self) -> Result<WildTree, CompileError> {
        let close = matching_close(self.tokens, self.pos)?;
        let tokens = self.tokens.get(self.pos..=close).unwrap_or_default();
        let tree = self.builder.block(tokens)?;
        self.pos = close + 1;
        Ok(tree)
    }

    /// The tokens up to the next top-level separator, which is consumed.
    /// The end of input also ends the statement.
    pub fn read_until_separator(&mut self) -> Result<&'a [Token], CompileError> {
        let end = statement_end(self.tokens, self.pos, self.builder.separator())?;
        let stop = end.unwrap_or(self.tokens.len());
        let tokens = self.tokens.get(self.pos..stop).unwrap_or_default();
        self.pos = end.map_or(stop, |end| end + 1);
        Ok(tokens)
    }
}

pub fn read_statements(reader: &mut Reader<'_>) -> Result<Vec<WildTree>, CompileError> {
    let mut statements = Vec::new();
    loop {
        reader.skip_separators();
        if reader.at_end() {
            return Ok(statements);
        }
        statements.push(read_statement(reader)?);
    }
}

pub fn read_statement(reader: &mut Reader<'_>) -> Result<WildTree, CompileError> {
    if let Some(def) = reader.peek().and_then(|token| keyword(&token.text)) {
        return (def.read)(reader);
    }
    let tokens = reader.read_until_separator()?;
    reader.builder().line(tokens)
}

/// Tokenize and read `text` without compiling it.
pub fn parse_statements(builder: TreeBuilder, text: &str) -> Result<Vec<WildTree>, CompileError> {
    let tokens = builder.tokenize(text)?;
    read_statements(&mut Reader::new(&tokens, builder))
}

// ── Writing ──────────────────────────────────────────────────────

pub fn write_statement(ctx: &mut Context, tree: &WildTree) -> Result<(), CompileError> {
    let items = match tree {
        WildTree::Group(group) if group.kind() == BlockKind::Line => group.children(),
        _ => std::slice::from_ref(tree),
    };
    if let Some(def) = items.first().and_then(WildTree::word).and_then(keyword) {
        return (def.write)(ctx, tree);
    }
    if let Some(stray) = items.first().filter(|item| item.is_word("else")) {
        return Err(CompileError::syntax("'else' without a matching 'if'", stray.trace()));
    }
    if let [block] = items {
        if block.kind() == Some(BlockKind::Brace) {
            let path = compile_block(ctx, block)?;
            let call = ctx.function_call(&path);
            return ctx.emit_lines(vec![call]);
        }
    }
    if declare::is_declaration(ctx, items) {
        return declare::write(ctx, items);
    }
    expr::evaluate_optional(ctx, items, tree.trace()).map(|_| ())
}

fn compile_tokens(ctx: &mut Context, tokens: &[Token]) -> Result<usize, CompileError> {
    let mut reader = Reader::new(tokens, ctx.builder());
    let statements = read_statements(&mut reader)?;
    for statement in &statements {
        write_statement(ctx, statement)?;
    }
    Ok(statements.len())
}

/// Compile a whole source into the entry unit.
pub fn compile_entry(ctx: &mut Context, text: &str) -> Result<(), CompileError> {
    let tokens = ctx.builder().tokenize(text)?;
    let scope = ctx.open_entry_unit()?;
    let count = ctx.in_scope(scope, |ctx| compile_tokens(ctx, &tokens))?;
    log::debug!("compiled entry unit ({count} statements, {} units)", ctx.unit_count());
    Ok(())
}

/// Compile `tokens` as a nested unit of the current scope and return its
/// path. Nothing invokes it yet.
pub fn compile_unit(ctx: &mut Context, tokens: &[Token], trace: Trace) -> Result<String, CompileError> {
    let (path, scope) = ctx.open_unit(trace)?;
    let count = ctx.in_scope(scope, |ctx| compile_tokens(ctx, tokens))?;
    log::debug!("compiled unit {path} ({count} statements)");
    Ok(path)
}

/// Compile a body: the inside of a brace group, or any other tree as-is.
pub fn compile_block(ctx: &mut Context, body: &WildTree) -> Result<String, CompileError> {
    let tokens = match body {
        WildTree::Group(group) if group.kind() == BlockKind::Brace => group.inner_tokens(),
        other => other.tokens(),
    };
    compile_unit(ctx, &tokens, body.trace())
}

/// Compile compiler-generated source as a nested unit. Its tokens all
/// report `trace`.
pub fn compile_synthetic(ctx: &mut Context, text: &str, trace: Trace) -> Result<String, CompileError> {
    let tokens = ctx.builder().tokenize_synthetic(text, trace)?;
    compile_unit(ctx, &tokens, trace)
}
