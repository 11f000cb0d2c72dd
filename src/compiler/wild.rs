//! The uniform parse-tree node: a single word, or a bracketed group of trees.
//!
//! Every later parser (expressions, argument lists, statement bodies) is written
//! once against this type instead of re-implementing bracket matching.

use std::fmt;
use std::ops::{Bound, RangeBounds};

use serde::Serialize;

use super::error::CompileError;
use super::trace::Trace;

/// One word of source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub text: String,
    pub trace: Trace,
}

impl Token {
    pub fn new(text: impl Into<String>, trace: Trace) -> Self {
        Self {
            text: text.into(),
            trace,
        }
    }
}

/// The bracket style that produced a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlockKind {
    Paren,
    Brace,
    Bracket,
    /// Synthetic whole-line kind; renders with spaces instead of brackets.
    Line,
}

impl BlockKind {
    pub fn open(self) -> char {
        match self {
            BlockKind::Paren => '(',
            BlockKind::Brace => '{',
            BlockKind::Bracket => '[',
            BlockKind::Line => ' ',
        }
    }

    pub fn close(self) -> char {
        match self {
            BlockKind::Paren => ')',
            BlockKind::Brace => '}',
            BlockKind::Bracket => ']',
            BlockKind::Line => ' ',
        }
    }

    pub fn from_open(c: char) -> Option<Self> {
        match c {
            '(' => Some(BlockKind::Paren),
            '{' => Some(BlockKind::Brace),
            '[' => Some(BlockKind::Bracket),
            _ => None,
        }
    }

    pub fn from_close(c: char) -> Option<Self> {
        match c {
            ')' => Some(BlockKind::Paren),
            '}' => Some(BlockKind::Brace),
            ']' => Some(BlockKind::Bracket),
            _ => None,
        }
    }

    /// Whether this kind is written with real bracket characters.
    pub fn is_bracketed(self) -> bool {
        self != BlockKind::Line
    }
}

/// How the children of a group were split apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Separator {
    /// A loose sequence of words.
    Space,
    /// An argument or element list.
    Comma,
    /// A statement list; every child is followed by the separator.
    Statement(char),
}

impl Separator {
    pub fn as_char(self) -> char {
        match self {
            Separator::Space => ' ',
            Separator::Comma => ',',
            Separator::Statement(c) => c,
        }
    }
}

/// A bracketed or synthetic sequence of trees.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    children: Vec<WildTree>,
    kind: BlockKind,
    separator: Separator,
    trace: Trace,
}

impl Group {
    pub fn children(&self) -> &[WildTree] {
        &self.children
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn separator(&self) -> Separator {
        self.separator
    }

    pub fn trace(&self) -> Trace {
        self.trace
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum WildTree {
    Leaf(Token),
    Group(Group),
}

impl WildTree {
    pub fn leaf(token: Token) -> Self {
        WildTree::Leaf(token)
    }

    /// Build a group. A line-kind, space-separated group over exactly one word
    /// collapses to that word.
    pub fn group(children: Vec<WildTree>, kind: BlockKind, separator: Separator, trace: Trace) -> Self {
        let mut children = children;
        if kind == BlockKind::Line
            && separator == Separator::Space
            && children.len() == 1
            && children.first().is_some_and(WildTree::is_leaf)
        {
            if let Some(only) = children.pop() {
                return only;
            }
        }
        let trace = children.first().map_or(trace, |c| if kind.is_bracketed() { trace } else { c.trace() });
        WildTree::Group(Group {
            children,
            kind,
            separator,
            trace,
        })
    }

    /// A space-separated line over `children`.
    pub fn line(children: Vec<WildTree>, trace: Trace) -> Self {
        Self::group(children, BlockKind::Line, Separator::Space, trace)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, WildTree::Leaf(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, WildTree::Group(_))
    }

    pub fn as_leaf(&self) -> Result<&Token, CompileError> {
        match self {
            WildTree::Leaf(token) => Ok(token),
            WildTree::Group(group) => Err(CompileError::wrong_variant(
                format!("Expected a single word, but got '{}'", self.to_text().trim()),
                group.trace,
            )),
        }
    }

    pub fn as_group(&self) -> Result<&Group, CompileError> {
        match self {
            WildTree::Group(group) => Ok(group),
            WildTree::Leaf(token) => Err(CompileError::wrong_variant(
                format!("Expected a group, but got the word '{}'", token.text),
                token.trace,
            )),
        }
    }

    pub fn as_children(&self) -> Result<&[WildTree], CompileError> {
        self.as_group().map(Group::children)
    }

    /// The word text when this is a leaf.
    pub fn word(&self) -> Option<&str> {
        match self {
            WildTree::Leaf(token) => Some(&token.text),
            WildTree::Group(_) => None,
        }
    }

    /// Whether this is the leaf `text`.
    pub fn is_word(&self, text: &str) -> bool {
        self.word() == Some(text)
    }

    pub fn kind(&self) -> Option<BlockKind> {
        match self {
            WildTree::Leaf(_) => None,
            WildTree::Group(group) => Some(group.kind),
        }
    }

    pub fn separator(&self) -> Option<Separator> {
        match self {
            WildTree::Leaf(_) => None,
            WildTree::Group(group) => Some(group.separator),
        }
    }

    pub fn trace(&self) -> Trace {
        match self {
            WildTree::Leaf(token) => token.trace,
            WildTree::Group(group) => group.trace,
        }
    }

    /// A new group over a sub-range of the children, keeping kind and separator.
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Result<WildTree, CompileError> {
        let group = self.as_group()?;
        let bounds: (Bound<usize>, Bound<usize>) = (range.start_bound().cloned(), range.end_bound().cloned());
        let children = group.children.get(bounds).ok_or_else(|| {
            CompileError::internal(
                format!("Slice out of range for a group of {} children", group.children.len()),
                group.trace,
            )
        })?;
        Ok(WildTree::group(children.to_vec(), group.kind, group.separator, group.trace))
    }

    /// Number of leaf descendants (1 for a leaf).
    pub fn count_leaves(&self) -> usize {
        match self {
            WildTree::Leaf(_) => 1,
            WildTree::Group(group) => group.children.iter().map(WildTree::count_leaves).sum(),
        }
    }

    pub fn leaves(&self) -> Vec<&Token> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Token>) {
        match self {
            WildTree::Leaf(token) => out.push(token),
            WildTree::Group(group) => {
                for child in &group.children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Reconstruct the literal text this tree was built from.
    pub fn to_text(&self) -> String {
        match self {
            WildTree::Leaf(token) => token.text.clone(),
            WildTree::Group(group) => {
                let open = group.kind.open();
                let close = group.kind.close();
                let sep = group.separator.as_char();
                if group.children.is_empty() {
                    return match group.separator {
                        Separator::Statement(_) => format!("{open}{sep}{close}"),
                        _ => format!("{open}{close}"),
                    };
                }
                let parts: Vec<String> = group.children.iter().map(WildTree::to_text).collect();
                let mut body = parts.join(&sep.to_string());
                if let Separator::Statement(_) = group.separator {
                    body.push(sep);
                }
                format!("{open}{body}{close}")
            }
        }
    }

    /// Flatten back into the token stream the tree was grouped from.
    /// Bracket and separator tokens take the group's trace.
    pub fn tokens(&self) -> Vec<Token> {
        let mut out = Vec::new();
        self.collect_tokens(&mut out);
        out
    }

    fn collect_tokens(&self, out: &mut Vec<Token>) {
        match self {
            WildTree::Leaf(token) => out.push(token.clone()),
            WildTree::Group(group) => {
                if group.kind.is_bracketed() {
                    out.push(Token::new(group.kind.open(), group.trace));
                }
                group.collect_inner_tokens(out);
                if group.kind.is_bracketed() {
                    out.push(Token::new(group.kind.close(), group.trace));
                }
            }
        }
    }

    /// Structural equality, ignoring traces.
    pub fn shape_eq(&self, other: &WildTree) -> bool {
        match (self, other) {
            (WildTree::Leaf(a), WildTree::Leaf(b)) => a.text == b.text,
            (WildTree::Group(a), WildTree::Group(b)) => {
                a.kind == b.kind
                    && a.separator == b.separator
                    && a.children.len() == b.children.len()
                    && a.children.iter().zip(&b.children).all(|(x, y)| x.shape_eq(y))
            }
            _ => false,
        }
    }
}

impl Group {
    /// Tokens of the children without this group's own brackets.
    pub fn inner_tokens(&self) -> Vec<Token> {
        let mut out = Vec::new();
        self.collect_inner_tokens(&mut out);
        out
    }

    fn collect_inner_tokens(&self, out: &mut Vec<Token>) {
        for (i, child) in self.children.iter().enumerate() {
            if self.separator == Separator::Comma && i > 0 {
                out.push(Token::new(',', self.trace));
            }
            child.collect_tokens(out);
            if let Separator::Statement(c) = self.separator {
                out.push(Token::new(c, child.trace()));
            }
        }
    }
}

impl fmt::Display for WildTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
