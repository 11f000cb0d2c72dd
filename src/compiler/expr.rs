//! Expression evaluation over WildTree sequences.
//!
//! Operators are words, so `x > 0` needs its spaces. Binary operators are
//! found by splitting at the rightmost operator of the loosest precedence
//! level, which makes every level left associative. `=` is split first, at
//! its leftmost occurrence, so assignment is right associative.

use super::context::Context;
use super::error::CompileError;
use super::trace::Trace;
use super::variables::{access, invoke_operation, invoke_operation_token, Operation, VarId};
use super::wild::{BlockKind, Separator, Token, WildTree};

const LEVELS: u8 = 5;

/// Evaluate one tree that must produce a value.
pub fn evaluate(ctx: &mut Context, tree: &WildTree) -> Result<VarId, CompileError> {
    match tree {
        WildTree::Leaf(_) => evaluate_items(ctx, std::slice::from_ref(tree), tree.trace()),
        WildTree::Group(group) => match (group.kind(), group.separator()) {
            (BlockKind::Line | BlockKind::Paren, Separator::Space) => {
                evaluate_items(ctx, group.children(), group.trace())
            }
            (BlockKind::Paren, Separator::Comma) => {
                Err(CompileError::syntax("Unexpected ',' in an expression", group.trace()))
            }
            (kind, _) => Err(CompileError::syntax(
                format!("Unexpected '{}' in an expression", kind.open()),
                group.trace(),
            )),
        },
    }
}

/// Evaluate a sequence that must produce a value.
pub fn evaluate_items(ctx: &mut Context, items: &[WildTree], trace: Trace) -> Result<VarId, CompileError> {
    let trace = items.first().map_or(trace, WildTree::trace);
    evaluate_optional(ctx, items, trace)?
        .ok_or_else(|| CompileError::syntax("The expression does not produce a value", trace))
}

/// Evaluate a sequence. Assigning a property produces no value.
pub fn evaluate_optional(ctx: &mut Context, items: &[WildTree], trace: Trace) -> Result<Option<VarId>, CompileError> {
    let Some(first) = items.first() else {
        return Err(CompileError::syntax("Expected a value", trace));
    };
    let trace = first.trace();

    if let Some(i) = items.iter().position(|item| item.is_word("=")) {
        return assignment(ctx, items, i, trace);
    }

    for level in 0..LEVELS {
        if let Some(i) = rightmost_binary(items, level) {
            let left = evaluate_items(ctx, &items[..i], trace)?;
            return invoke_operation_token(ctx, left, &items[i], &items[i + 1..]);
        }
    }

    if first.is_word("!") {
        let operand = evaluate_items(ctx, &items[1..], trace)?;
        return invoke_operation(ctx, operand, Operation::BooleanNot, operand, trace).map(Some);
    }
    if first.is_word("-") {
        let operand = evaluate_items(ctx, &items[1..], trace)?;
        return negate(ctx, operand, trace).map(Some);
    }
    if first.is_word("new") {
        return construction(ctx, items, trace);
    }

    let value = primary(ctx, first)?;
    postfix(ctx, value, &items[1..], trace)
}

fn assignment(ctx: &mut Context, items: &[WildTree], i: usize, trace: Trace) -> Result<Option<VarId>, CompileError> {
    let (target, rest) = items.split_at(i);
    if target.is_empty() {
        return Err(CompileError::syntax("Expected a variable before '='", trace));
    }
    // `a.b = v` assigns through the member.
    if target.len() >= 3 && target[target.len() - 2].is_word(".") {
        let base = evaluate_items(ctx, &target[..target.len() - 2], trace)?;
        return access(ctx, base, &items[i - 1..], trace);
    }
    let target = evaluate_items(ctx, target, trace)?;
    invoke_operation_token(ctx, target, &rest[0], &rest[1..])
}

fn binary_operation(tree: &WildTree) -> Option<Operation> {
    tree.word().and_then(Operation::from_token).filter(|op| op.precedence().is_some())
}

fn is_operator(tree: &WildTree) -> bool {
    tree.word().and_then(Operation::from_token).is_some()
}

/// Index of the rightmost binary operator of `level`. An operator directly
/// after another operator is a prefix, not a binary operator.
fn rightmost_binary(items: &[WildTree], level: u8) -> Option<usize> {
    (1..items.len()).rev().find(|&i| {
        binary_operation(&items[i]).and_then(Operation::precedence) == Some(level) && !is_operator(&items[i - 1])
    })
}

fn negate(ctx: &mut Context, operand: VarId, trace: Trace) -> Result<VarId, CompileError> {
    let zero = ctx.constant_int(0, trace)?;
    invoke_operation(ctx, zero, Operation::Subtract, operand, trace)
}

/// `new T(args)`, optionally followed by member access.
fn construction(ctx: &mut Context, items: &[WildTree], trace: Trace) -> Result<Option<VarId>, CompileError> {
    let Some(type_tree) = items.get(1) else {
        return Err(CompileError::syntax("Expected a type name after 'new'", trace));
    };
    let type_token = type_tree.as_leaf()?;
    let def = ctx.type_def(&type_token.text, type_token.trace)?;
    let construct = def.construct.ok_or_else(|| {
        CompileError::unsupported(format!("The type '{}' cannot be constructed", def.name), type_token.trace)
    })?;
    let Some(args_tree) = items.get(2) else {
        return Err(CompileError::syntax(
            format!("Expected '(...)' after 'new {}'", def.name),
            type_token.trace,
        ));
    };
    let args = evaluate_arguments(ctx, args_tree)?;
    let value = construct(ctx, &args, trace)?;
    postfix(ctx, value, &items[3..], trace)
}

/// Whatever follows a primary value: nothing, or `.` member access.
fn postfix(ctx: &mut Context, value: VarId, rest: &[WildTree], trace: Trace) -> Result<Option<VarId>, CompileError> {
    match rest.split_first() {
        None => Ok(Some(value)),
        Some((dot, path)) if dot.is_word(".") => access(ctx, value, path, trace),
        Some((other, _)) => Err(CompileError::syntax(
            format!("Expected an operator, but got '{}'", other.to_text().trim()),
            other.trace(),
        )),
    }
}

fn primary(ctx: &mut Context, tree: &WildTree) -> Result<VarId, CompileError> {
    match tree {
        WildTree::Leaf(token) => literal(ctx, token),
        WildTree::Group(group) if group.kind() == BlockKind::Paren => evaluate(ctx, tree),
        WildTree::Group(group) => Err(CompileError::syntax(
            format!("Unexpected '{}' in an expression", group.kind().open()),
            group.trace(),
        )),
    }
}

/// A literal, a name, or a name with a glued-on `!` or `-` prefix.
fn literal(ctx: &mut Context, token: &Token) -> Result<VarId, CompileError> {
    let text = token.text.as_str();
    let trace = token.trace;
    match text {
        "true" => return ctx.constant_bool(true, trace),
        "false" => return ctx.constant_bool(false, trace),
        _ => {}
    }
    if text.starts_with('"') {
        let value: String = serde_json::from_str(text)
            .map_err(|e| CompileError::syntax(format!("Invalid string literal {text}: {e}"), trace))?;
        return ctx.constant_text(value, trace);
    }
    if let Ok(value) = text.parse::<i32>() {
        return ctx.constant_int(value, trace);
    }
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(CompileError::syntax(format!("Invalid integer literal '{text}'"), trace));
    }
    if let Some(rest) = text.strip_prefix('!').filter(|rest| !rest.is_empty()) {
        let operand = literal(ctx, &Token::new(rest, trace))?;
        return invoke_operation(ctx, operand, Operation::BooleanNot, operand, trace);
    }
    if let Some(rest) = text.strip_prefix('-').filter(|rest| !rest.is_empty()) {
        let operand = literal(ctx, &Token::new(rest, trace))?;
        return negate(ctx, operand, trace);
    }
    if Operation::from_token(text).is_some() {
        return Err(CompileError::syntax(
            format!("Expected a value, but got the operator '{text}'"),
            trace,
        ));
    }
    ctx.resolve(text).ok_or_else(|| CompileError::unknown_name(text, trace))
}

/// Evaluate each argument of a parenthesized list.
pub fn evaluate_arguments(ctx: &mut Context, tree: &WildTree) -> Result<Vec<VarId>, CompileError> {
    let group = match tree {
        WildTree::Group(group) if group.kind() == BlockKind::Paren => group,
        _ => {
            return Err(CompileError::syntax(
                format!("Expected '(...)', but got '{}'", tree.to_text().trim()),
                tree.trace(),
            ))
        }
    };
    match group.separator() {
        Separator::Comma => group.children().iter().map(|arg| evaluate(ctx, arg)).collect(),
        Separator::Space if group.children().is_empty() => Ok(Vec::new()),
        Separator::Space => Ok(vec![evaluate_items(ctx, group.children(), group.trace())?]),
        Separator::Statement(c) => Err(CompileError::syntax(
            format!("Unexpected '{c}' in an argument list"),
            group.trace(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compiler::error::ErrorKind;
    use crate::compiler::trace::SourceId;
    use crate::compiler::variables::int::INT;
    use crate::compiler::variables::Value;
    use crate::config::CompilerConfig;

    fn context() -> Context {
        let mut ctx = Context::new(CompilerConfig::default(), SourceId(0));
        ctx.open_entry_unit().unwrap();
        ctx
    }

    fn eval(ctx: &mut Context, src: &str) -> Result<VarId, CompileError> {
        let line = ctx.builder().line(&ctx.builder().tokenize(src).unwrap()).unwrap();
        evaluate(ctx, &line)
    }

    fn constant(ctx: &mut Context, src: &str) -> Value {
        let id = eval(ctx, src).unwrap();
        ctx.var(id).unwrap().value.clone()
    }

    #[test]
    fn precedence_and_associativity() {
        let mut ctx = context();
        assert_eq!(constant(&mut ctx, "2 + 3 * 4"), Value::Int(14));
        assert_eq!(constant(&mut ctx, "(2 + 3) * 4"), Value::Int(20));
        assert_eq!(constant(&mut ctx, "10 - 4 - 3"), Value::Int(3));
        assert_eq!(constant(&mut ctx, "7 / 2"), Value::Int(3));
        assert_eq!(constant(&mut ctx, "1 + 1 == 2 && 3 > 4"), Value::Int(0));
        assert_eq!(constant(&mut ctx, "false || !false"), Value::Int(1));
    }

    #[test]
    fn unary_prefixes() {
        let mut ctx = context();
        assert_eq!(constant(&mut ctx, "- 5 + 2"), Value::Int(-3));
        assert_eq!(constant(&mut ctx, "-5"), Value::Int(-5));
        assert_eq!(constant(&mut ctx, "2 * - 3"), Value::Int(-6));
        assert_eq!(constant(&mut ctx, "!true"), Value::Int(0));
    }

    #[test]
    fn string_literals_are_unescaped() {
        let mut ctx = context();
        assert_eq!(constant(&mut ctx, r#""a \"b\"""#), Value::Text("a \"b\"".into()));
        assert_eq!(constant(&mut ctx, r#""n" + 1"#), Value::Text("n1".into()));
    }

    #[test]
    fn names_resolve_through_the_scope_chain() {
        let mut ctx = context();
        let err = eval(&mut ctx, "missing + 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownName);

        ctx.declare_internal(INT, crate::compiler::variables::Access::Private,
            crate::compiler::variables::Usage::Default, "x", Trace::default()).unwrap();
        let child = ctx.create_children(1).unwrap()[0];
        let found = ctx.in_scope(child, |ctx| eval(ctx, "x")).unwrap();
        assert_eq!(ctx.var(found).unwrap().name, "x");
    }

    #[test]
    fn unknown_operator_is_a_syntax_error() {
        let mut ctx = context();
        let err = eval(&mut ctx, "1 <> 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);

        let err = eval(&mut ctx, "1 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert!(err.message.contains("Expected an operator"));
    }

    #[test]
    fn out_of_range_integers_are_rejected() {
        let mut ctx = context();
        let err = eval(&mut ctx, "99999999999").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn new_requires_a_constructor() {
        let mut ctx = context();
        let err = eval(&mut ctx, "new int()").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
        let made = eval(&mut ctx, "new objective(\"dummy\")").unwrap();
        assert!(ctx.var(made).unwrap().constructed);
    }

    #[test]
    fn member_access_on_a_constructed_value() {
        let mut ctx = context();
        let criterion = eval(&mut ctx, "new objective(\"deathCount\", \"d\").Criterion").unwrap();
        assert_eq!(ctx.var(criterion).unwrap().value, Value::Text("deathCount".into()));
        let err = eval(&mut ctx, "new objective().Missing").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownMember);
    }
}
