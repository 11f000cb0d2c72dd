//! `bool`: a 0/1 score. The target machine has no boolean algebra, so `!`,
//! `&&` and `||` on resident values are lowered into tiny conditional units.

use super::super::context::Context;
use super::super::error::CompileError;
use super::super::statements;
use super::super::trace::Trace;
use super::casting::cast;
use super::int::INT;
use super::registry::{Hooks, TypeDef};
use super::score::{self, Operand};
use super::{unsupported_operation, write_copy_to, Access, Operation, OperationKind, Usage, VarId};

pub const BOOL: &str = "bool";

pub static BOOL_TYPE: TypeDef = TypeDef {
    name: BOOL,
    access: &[Access::Private, Access::Public],
    usage: &[Usage::Default, Usage::Static, Usage::Constant],
    initialize: score::initialize,
    construct: None,
    operate,
    copy_to,
    casters_to: &[(INT, to_int)],
    casters_from: &[],
    hooks: Hooks::NONE,
};

fn operate(ctx: &mut Context, target: VarId, op: Operation, operand: VarId, trace: Trace) -> Result<VarId, CompileError> {
    match (op.kind(), op) {
        (OperationKind::Set, _) => {
            let value = cast(ctx, operand, BOOL, trace)?;
            let mut lines = Vec::new();
            write_copy_to(ctx, value, target, &mut lines, trace)?;
            score::emit(ctx, lines)?;
            Ok(target)
        }
        (_, Operation::BooleanNot) => not(ctx, target, trace),
        (_, Operation::BooleanAnd | Operation::BooleanOr) => {
            let right = cast(ctx, operand, BOOL, trace)?;
            and_or(ctx, target, op, right, trace)
        }
        (_, Operation::Equal | Operation::NotEqual) => {
            let right = cast(ctx, operand, BOOL, trace)?;
            let left = score::operand(ctx, target, trace)?;
            let right = score::operand(ctx, right, trace)?;
            score::compare(ctx, left, op, right, trace)
        }
        _ => unsupported_operation(ctx, target, op, trace),
    }
}

fn not(ctx: &mut Context, value: VarId, trace: Trace) -> Result<VarId, CompileError> {
    if let Operand::Constant(v) = score::operand(ctx, value, trace)? {
        return ctx.constant_bool(v == 0, trace);
    }
    let result = copy_into_temporary(ctx, value, trace)?;
    let name = ctx.var(result)?.name.clone();
    let sep = ctx.config().statement_separator;
    let body = format!("if ({name}) {{ {name} = false{sep} }} else {{ {name} = true{sep} }}");
    invoke_synthetic(ctx, &body, trace)?;
    Ok(result)
}

fn and_or(ctx: &mut Context, left: VarId, op: Operation, right: VarId, trace: Trace) -> Result<VarId, CompileError> {
    let is_and = op == Operation::BooleanAnd;
    let lhs = score::operand(ctx, left, trace)?;
    let rhs = score::operand(ctx, right, trace)?;

    match (lhs, rhs) {
        (Operand::Constant(a), Operand::Constant(b)) => {
            let value = if is_and { a != 0 && b != 0 } else { a != 0 || b != 0 };
            return ctx.constant_bool(value, trace);
        }
        // `true && r` is `r`, `false && r` is false; `||` mirrors it.
        (Operand::Constant(a), _) => {
            return if (a != 0) == is_and { Ok(right) } else { ctx.constant_bool(a != 0, trace) };
        }
        (_, Operand::Constant(b)) => {
            return if (b != 0) == is_and { Ok(left) } else { ctx.constant_bool(b != 0, trace) };
        }
        (Operand::Resident(_), Operand::Resident(_)) => {}
    }

    let result = copy_into_temporary(ctx, left, trace)?;
    let name = ctx.var(result)?.name.clone();
    let right_name = nameable(ctx, right, trace)?;
    let sep = ctx.config().statement_separator;
    let body = if is_and {
        format!("if ({name}) {{ {name} = {right_name}{sep} }}")
    } else {
        format!("if ({right_name}) {{ {name} = true{sep} }}")
    };
    invoke_synthetic(ctx, &body, trace)?;
    Ok(result)
}

/// A fresh resident boolean holding a copy of `value`.
fn copy_into_temporary(ctx: &mut Context, value: VarId, trace: Trace) -> Result<VarId, CompileError> {
    let temp = ctx.temporary(BOOL, trace)?;
    let mut lines = Vec::new();
    write_copy_to(ctx, value, temp, &mut lines, trace)?;
    score::emit(ctx, lines)?;
    Ok(temp)
}

/// A name that resolves to `value` from the current scope, copying it into
/// a temporary when it is out of sight (e.g. a member field).
fn nameable(ctx: &mut Context, value: VarId, trace: Trace) -> Result<String, CompileError> {
    let name = ctx.var(value)?.name.clone();
    if ctx.resolve(&name) == Some(value) {
        return Ok(name);
    }
    let temp = copy_into_temporary(ctx, value, trace)?;
    Ok(ctx.var(temp)?.name.clone())
}

/// Compile `body` as a nested unit and invoke it unconditionally.
fn invoke_synthetic(ctx: &mut Context, body: &str, trace: Trace) -> Result<(), CompileError> {
    let path = statements::compile_synthetic(ctx, body, trace)?;
    let call = ctx.function_call(&path);
    ctx.emit_lines(vec![call])
}

fn copy_to(ctx: &mut Context, source: VarId, target: VarId, out: &mut Vec<String>, trace: Trace) -> Result<(), CompileError> {
    let target_type = ctx.var(target)?.type_name;
    if target_type != BOOL {
        return Err(CompileError::unsupported(
            format!("Cannot copy a 'bool' into a '{target_type}'"),
            trace,
        ));
    }
    let value = score::operand(ctx, source, trace)?;
    score::store(ctx, value, target, out, trace)
}

/// Shares the register; a bool is already 0 or 1.
fn to_int(ctx: &mut Context, value: VarId, trace: Trace) -> Result<VarId, CompileError> {
    match score::operand(ctx, value, trace)? {
        Operand::Constant(v) => ctx.constant_int(v, trace),
        Operand::Resident(register) => ctx.alias(INT, register, trace),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compiler::trace::SourceId;
    use crate::compiler::variables::{invoke_operation, Value};
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
    fn constant_not_folds() {
        let mut ctx = context();
        let yes = ctx.constant_bool(true, t()).unwrap();
        let no = invoke_operation(&mut ctx, yes, Operation::BooleanNot, yes, t()).unwrap();
        assert_eq!(ctx.var(no).unwrap().value, Value::Int(0));
        assert_eq!(ctx.unit_count(), 1);
    }

    #[test]
    fn resident_not_compiles_a_nested_if_else() {
        let mut ctx = context();
        let flag = ctx.temporary(BOOL, t()).unwrap();
        let result = invoke_operation(&mut ctx, flag, Operation::BooleanNot, flag, t()).unwrap();
        assert!(ctx.var(result).unwrap().is_resident());
        // The `!` unit plus the two branches of its if/else.
        assert_eq!(ctx.unit_count(), 4);
        let lines = ctx.emitted_lines();
        assert!(lines.iter().any(|l| l.starts_with("function mcs:main/")));
    }

    #[test]
    fn and_with_constant_short_circuits() {
        let mut ctx = context();
        let flag = ctx.temporary(BOOL, t()).unwrap();
        let yes = ctx.constant_bool(true, t()).unwrap();
        let no = ctx.constant_bool(false, t()).unwrap();
        assert_eq!(invoke_operation(&mut ctx, yes, Operation::BooleanAnd, flag, t()).unwrap(), flag);
        let folded = invoke_operation(&mut ctx, no, Operation::BooleanAnd, flag, t()).unwrap();
        assert_eq!(ctx.var(folded).unwrap().value, Value::Int(0));
        let either = invoke_operation(&mut ctx, flag, Operation::BooleanOr, yes, t()).unwrap();
        assert_eq!(ctx.var(either).unwrap().value, Value::Int(1));
        assert_eq!(ctx.unit_count(), 1);
    }

    #[test]
    fn resident_and_compiles_one_conditional_unit() {
        let mut ctx = context();
        let a = ctx.temporary(BOOL, t()).unwrap();
        let b = ctx.temporary(BOOL, t()).unwrap();
        invoke_operation(&mut ctx, a, Operation::BooleanAnd, b, t()).unwrap();
        // The `&&` unit plus the body of its if.
        assert_eq!(ctx.unit_count(), 3);
    }

    #[test]
    fn int_cast_shares_the_register() {
        let mut ctx = context();
        let flag = ctx.temporary(BOOL, t()).unwrap();
        let number = cast(&mut ctx, flag, INT, t()).unwrap();
        assert_eq!(ctx.var(number).unwrap().value, ctx.var(flag).unwrap().value);
    }
}
