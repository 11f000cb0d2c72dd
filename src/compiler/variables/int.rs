//! `int`: a 32-bit score, constant-folded when both sides are known.

use super::super::context::Context;
use super::super::error::CompileError;
use super::super::trace::Trace;
use super::boolean::BOOL;
use super::casting::cast;
use super::registry::{Hooks, TypeDef};
use super::score::{self, Operand};
use super::string::STRING;
use super::{unsupported_operation, Access, Operation, OperationKind, Usage, Value, VarId};

pub const INT: &str = "int";

pub static INT_TYPE: TypeDef = TypeDef {
    name: INT,
    access: &[Access::Private, Access::Public],
    usage: &[Usage::Default, Usage::Static, Usage::Constant],
    initialize: score::initialize,
    construct: None,
    operate,
    copy_to,
    casters_to: &[(BOOL, to_bool), (STRING, to_string)],
    casters_from: &[],
    hooks: Hooks::NONE,
};

fn operate(ctx: &mut Context, target: VarId, op: Operation, operand: VarId, trace: Trace) -> Result<VarId, CompileError> {
    match op.kind() {
        OperationKind::Set => {
            let value = cast(ctx, operand, INT, trace)?;
            let source = score::operand(ctx, value, trace)?;
            let mut lines = Vec::new();
            score::store(ctx, source, target, &mut lines, trace)?;
            score::emit(ctx, lines)?;
            Ok(target)
        }
        OperationKind::Arithmetic => {
            let right = cast(ctx, operand, INT, trace)?;
            arithmetic(ctx, target, op, right, trace)
        }
        OperationKind::Comparison => {
            let right = cast(ctx, operand, INT, trace)?;
            let left = score::operand(ctx, target, trace)?;
            let right = score::operand(ctx, right, trace)?;
            score::compare(ctx, left, op, right, trace)
        }
        OperationKind::Boolean | OperationKind::Structural => unsupported_operation(ctx, target, op, trace),
    }
}

/// Fold two constants, or copy the left side into a fresh resident
/// temporary and apply one scoreboard operation to it in place.
pub fn arithmetic(ctx: &mut Context, left: VarId, op: Operation, right: VarId, trace: Trace) -> Result<VarId, CompileError> {
    let lhs = score::operand(ctx, left, trace)?;
    let rhs = score::operand(ctx, right, trace)?;

    if let (Operand::Constant(a), Operand::Constant(b)) = (&lhs, &rhs) {
        let folded = fold(*a, op, *b, trace)?;
        return ctx.constant_int(folded, trace);
    }

    let result = ctx.temporary(INT, trace)?;
    let Some(target) = ctx.var(result)?.value.register().cloned() else {
        return Err(CompileError::internal("An int temporary has no register", trace));
    };

    let mut lines = Vec::new();
    score::store(ctx, lhs, result, &mut lines, trace)?;
    match rhs {
        Operand::Constant(v) if matches!(op, Operation::Add | Operation::Subtract) && v != i32::MIN => {
            let delta = if op == Operation::Subtract { -v } else { v };
            if delta >= 0 {
                lines.push(format!("scoreboard players add {target} {delta}"));
            } else {
                lines.push(format!("scoreboard players remove {target} {}", -delta));
            }
        }
        Operand::Constant(v) => {
            let operand = materialize(ctx, v, trace)?;
            lines.push(format!("scoreboard players operation {target} {}= {operand}", op.symbol()));
        }
        Operand::Resident(operand) => {
            lines.push(format!("scoreboard players operation {target} {}= {operand}", op.symbol()));
        }
    }
    score::emit(ctx, lines)?;
    Ok(result)
}

/// A resident temporary holding `value`, for operations that only take
/// score operands. Its set command is emitted immediately.
fn materialize(ctx: &mut Context, value: i32, trace: Trace) -> Result<super::Register, CompileError> {
    let temp = ctx.temporary(INT, trace)?;
    let mut lines = Vec::new();
    score::store(ctx, Operand::Constant(value), temp, &mut lines, trace)?;
    score::emit(ctx, lines)?;
    ctx.var(temp)?
        .value
        .register()
        .cloned()
        .ok_or_else(|| CompileError::internal("An int temporary has no register", trace))
}

fn fold(a: i32, op: Operation, b: i32, trace: Trace) -> Result<i32, CompileError> {
    let divide_by_zero = || CompileError::unsupported(format!("Division by zero in '{a} {op} {b}'"), trace);
    match op {
        Operation::Add => Ok(a.wrapping_add(b)),
        Operation::Subtract => Ok(a.wrapping_sub(b)),
        Operation::Multiply => Ok(a.wrapping_mul(b)),
        Operation::Divide if b == 0 => Err(divide_by_zero()),
        Operation::Divide => Ok(score::floor_div(a, b).unwrap_or(a)),
        Operation::Modulo if b == 0 => Err(divide_by_zero()),
        Operation::Modulo => Ok(score::floor_mod(a, b).unwrap_or(0)),
        other => Err(CompileError::internal(format!("'{other}' is not arithmetic"), trace)),
    }
}

fn copy_to(ctx: &mut Context, source: VarId, target: VarId, out: &mut Vec<String>, trace: Trace) -> Result<(), CompileError> {
    let target_type = ctx.var(target)?.type_name;
    if target_type != INT {
        return Err(CompileError::unsupported(
            format!("Cannot copy an 'int' into a '{target_type}'"),
            trace,
        ));
    }
    let value = score::operand(ctx, source, trace)?;
    score::store(ctx, value, target, out, trace)
}

// ── Casters ──────────────────────────────────────────────────────

/// Nonzero is true. A resident value is normalised into a fresh 0/1 register.
fn to_bool(ctx: &mut Context, value: VarId, trace: Trace) -> Result<VarId, CompileError> {
    match score::operand(ctx, value, trace)? {
        Operand::Constant(v) => ctx.constant_bool(v != 0, trace),
        Operand::Resident(register) => {
            let result = ctx.temporary(BOOL, trace)?;
            let Some(target) = ctx.var(result)?.value.register().cloned() else {
                return Err(CompileError::internal("A boolean temporary has no register", trace));
            };
            score::emit(
                ctx,
                vec![
                    format!("scoreboard players set {target} 0"),
                    format!("execute unless score {register} matches 0 run scoreboard players set {target} 1"),
                ],
            )?;
            Ok(result)
        }
    }
}

/// Only compile-time numbers have a text form.
fn to_string(ctx: &mut Context, value: VarId, trace: Trace) -> Result<VarId, CompileError> {
    let var = ctx.var(value)?;
    match var.value {
        Value::Int(v) => ctx.constant_text(v.to_string(), trace),
        _ => Err(CompileError::cannot_cast(&var.to_string(), STRING, trace)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compiler::error::ErrorKind;
    use crate::compiler::trace::SourceId;
    use crate::compiler::variables::invoke_operation;
    use crate::config::CompilerConfig;

    fn context() -> Context {
        let mut ctx = Context::new(CompilerConfig::default(), SourceId(0));
        ctx.open_entry_unit().unwrap();
        ctx
    }

    fn t() -> Trace {
        Trace::default()
    }

    #[test]
    fn two_constants_fold_without_commands() {
        let mut ctx = context();
        let before = ctx.emitted_lines();
        let a = ctx.constant_int(2, t()).unwrap();
        let b = ctx.constant_int(3, t()).unwrap();
        let sum = invoke_operation(&mut ctx, a, Operation::Add, b, t()).unwrap();
        assert_eq!(ctx.var(sum).unwrap().value, Value::Int(5));
        assert_eq!(ctx.emitted_lines(), before);
    }

    #[test]
    fn constant_plus_resident_emits_one_arithmetic_command() {
        let mut ctx = context();
        let x = ctx.temporary(INT, t()).unwrap();
        let two = ctx.constant_int(2, t()).unwrap();
        let before = ctx.emitted_lines().len();

        let sum = invoke_operation(&mut ctx, two, Operation::Add, x, t()).unwrap();
        let var = ctx.var(sum).unwrap();
        assert!(var.is_resident());
        assert_ne!(sum, x);

        let lines = ctx.emitted_lines();
        let new = &lines[before..];
        let arithmetic: Vec<&String> = new.iter().filter(|l| l.contains("+=")).collect();
        assert_eq!(arithmetic.len(), 1, "{new:?}");
        assert!(new[0].starts_with("scoreboard players set"));
    }

    #[test]
    fn resident_plus_constant_uses_add_and_remove() {
        let mut ctx = context();
        let x = ctx.temporary(INT, t()).unwrap();
        let five = ctx.constant_int(5, t()).unwrap();
        invoke_operation(&mut ctx, x, Operation::Subtract, five, t()).unwrap();
        let lines = ctx.emitted_lines();
        assert!(lines.last().unwrap().starts_with("scoreboard players remove"));
        assert!(lines.last().unwrap().ends_with(" 5"));
    }

    #[test]
    fn constant_division_by_zero_fails() {
        let mut ctx = context();
        let a = ctx.constant_int(1, t()).unwrap();
        let b = ctx.constant_int(0, t()).unwrap();
        let err = invoke_operation(&mut ctx, a, Operation::Divide, b, t()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn comparison_with_constant_uses_matches_range() {
        let mut ctx = context();
        let x = ctx.temporary(INT, t()).unwrap();
        let zero = ctx.constant_int(0, t()).unwrap();
        let result = invoke_operation(&mut ctx, x, Operation::GreaterThan, zero, t()).unwrap();
        assert_eq!(ctx.var(result).unwrap().type_name, BOOL);
        let lines = ctx.emitted_lines();
        let n = lines.len();
        assert!(lines[n - 2].ends_with(" 0"));
        assert!(lines[n - 1].contains("matches 1.."), "{}", lines[n - 1]);
    }

    #[test]
    fn boolean_operators_are_unsupported() {
        let mut ctx = context();
        let a = ctx.constant_int(1, t()).unwrap();
        let err = invoke_operation(&mut ctx, a, Operation::BooleanAnd, a, t()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
        assert!(err.message.contains("'&&'"));
    }

    #[test]
    fn const_rejects_second_assignment() {
        let mut ctx = context();
        let c = ctx.constant_int(1, t()).unwrap();
        let two = ctx.constant_int(2, t()).unwrap();
        let err = invoke_operation(&mut ctx, c, Operation::Set, two, t()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    }
}
