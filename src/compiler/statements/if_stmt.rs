//! `if (condition) body [else body]`
//!
//! Each body becomes a unit of its own. A constant condition invokes only
//! the taken body. Otherwise the bodies are guarded by the condition's
//! score: nonzero runs the body, zero runs the else body.

use super::super::context::Context;
use super::super::error::CompileError;
use super::super::expr;
use super::super::variables::boolean::BOOL;
use super::super::variables::casting::cast;
use super::super::variables::score::{self, Operand};
use super::super::wild::{BlockKind, Separator, WildTree};
use super::{compile_block, keyword, Reader};

const IF: &str = "if";
const ELSE: &str = "else";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Condition,
    Body,
    Else,
    ElseBody,
    Done,
}

/// Read an if statement into a line of `[if, (condition), body]` or
/// `[if, (condition), body, else, body]`. Bodies that are not braced are
/// wrapped in a brace group of one statement.
pub fn read(reader: &mut Reader<'_>) -> Result<WildTree, CompileError> {
    let Some(keyword_token) = reader.advance().filter(|token| token.text == IF) else {
        return Err(CompileError::internal("Expected 'if'", reader.trace()));
    };
    let trace = keyword_token.trace;
    let mut items = vec![WildTree::leaf(keyword_token.clone())];
    let mut state = State::Condition;

    while state != State::Done {
        state = match state {
            State::Condition => {
                if !reader.peek_open(BlockKind::Paren) {
                    return Err(CompileError::syntax(
                        "Expected parenthesized condition after 'if'",
                        reader.trace(),
                    ));
                }
                items.push(reader.read_group()?);
                State::Body
            }
            State::Body => {
                items.push(read_body(reader, IF)?);
                State::Else
            }
            State::Else => match reader.peek() {
                Some(token) if token.text == ELSE => {
                    items.push(WildTree::leaf(token.clone()));
                    reader.advance();
                    State::ElseBody
                }
                _ => State::Done,
            },
            State::ElseBody => {
                items.push(read_body(reader, ELSE)?);
                State::Done
            }
            State::Done => State::Done,
        };
    }
    Ok(WildTree::line(items, trace))
}

fn read_body(reader: &mut Reader<'_>, after: &str) -> Result<WildTree, CompileError> {
    let trace = reader.trace();
    if reader.at_end() || reader.peek_is(&reader.builder().separator().to_string()) {
        return Err(CompileError::syntax(format!("Expected a statement after '{after}'"), trace));
    }
    if reader.peek_open(BlockKind::Brace) {
        return reader.read_group();
    }
    let statement = match reader.peek().and_then(|token| keyword(&token.text)) {
        Some(def) => (def.read)(reader)?,
        None => {
            let tokens = reader.read_until_separator()?;
            reader.builder().line(tokens)?
        }
    };
    let separator = Separator::Statement(reader.builder().separator());
    Ok(WildTree::group(vec![statement], BlockKind::Brace, separator, trace))
}

pub fn write(ctx: &mut Context, tree: &WildTree) -> Result<(), CompileError> {
    let (condition, body, else_body) = match tree.as_children()? {
        [_, condition, body] => (condition, body, None),
        [_, condition, body, _, else_body] => (condition, body, Some(else_body)),
        _ => return Err(CompileError::internal("Malformed if statement", tree.trace())),
    };
    let trace = condition.trace();
    let existing = ctx.variable_count();

    let value = expr::evaluate(ctx, condition)?;
    let value = cast(ctx, value, BOOL, trace)?;

    match score::operand(ctx, value, trace)? {
        Operand::Constant(v) => {
            log::debug!("if at {trace} is always {}", v != 0);
            let taken = if v != 0 { Some(body) } else { else_body };
            if let Some(taken) = taken {
                let path = compile_block(ctx, taken)?;
                let call = ctx.function_call(&path);
                ctx.emit_lines(vec![call])?;
            }
            Ok(())
        }
        Operand::Resident(register) => {
            // The body may assign the condition's variable, so the else
            // guard must read a copy taken before the body runs.
            let register = if else_body.is_some() && ctx.register_predates(&register, existing) {
                let snapshot = ctx.temporary(BOOL, trace)?;
                let mut lines = Vec::new();
                score::store(ctx, Operand::Resident(register), snapshot, &mut lines, trace)?;
                score::emit(ctx, lines)?;
                match score::operand(ctx, snapshot, trace)? {
                    Operand::Resident(register) => register,
                    Operand::Constant(_) => {
                        return Err(CompileError::internal("Condition snapshot has no register", trace))
                    }
                }
            } else {
                register
            };

            let path = compile_block(ctx, body)?;
            let call = ctx.function_call(&path);
            ctx.emit_lines(vec![format!("execute unless score {register} matches 0 run {call}")])?;

            if let Some(else_body) = else_body {
                let path = compile_block(ctx, else_body)?;
                let call = ctx.function_call(&path);
                ctx.emit_lines(vec![format!("execute if score {register} matches 0 run {call}")])?;
            }
            Ok(())
        }
    }
}
