//! `string`: compile-time text. It never occupies a register, and no other
//! type converts into it except constant numbers.

use super::super::context::Context;
use super::super::error::CompileError;
use super::super::trace::Trace;
use super::boolean::BOOL;
use super::casting::cast;
use super::registry::{Hooks, TypeDef};
use super::{unsupported_operation, write_copy_to, Access, Operation, Usage, Value, VarId};

pub const STRING: &str = "string";

pub static STRING_TYPE: TypeDef = TypeDef {
    name: STRING,
    access: &[Access::Private, Access::Public],
    usage: &[Usage::Default, Usage::Constant],
    initialize,
    construct: None,
    operate,
    copy_to,
    casters_to: &[],
    casters_from: &[],
    hooks: Hooks::NONE,
};

fn initialize(_ctx: &mut Context, _id: VarId) -> Result<(), CompileError> {
    Ok(())
}

/// The text of a bound string variable.
pub fn text(ctx: &Context, id: VarId, trace: Trace) -> Result<String, CompileError> {
    let var = ctx.var(id)?;
    match &var.value {
        Value::Text(text) => Ok(text.clone()),
        Value::Unset => Err(CompileError::syntax(
            format!("The variable '{}' is used before it is assigned", var.name),
            trace,
        )),
        other => Err(CompileError::internal(format!("'{var}' holds non-text {other:?}"), trace)),
    }
}

fn operate(ctx: &mut Context, target: VarId, op: Operation, operand: VarId, trace: Trace) -> Result<VarId, CompileError> {
    match op {
        Operation::Set => {
            let value = cast(ctx, operand, STRING, trace)?;
            let mut unused = Vec::new();
            write_copy_to(ctx, value, target, &mut unused, trace)?;
            Ok(target)
        }
        Operation::Add => {
            let right = cast(ctx, operand, STRING, trace)?;
            let joined = text(ctx, target, trace)? + &text(ctx, right, trace)?;
            ctx.constant_text(joined, trace)
        }
        Operation::Equal | Operation::NotEqual => {
            let right = cast(ctx, operand, STRING, trace)?;
            let same = text(ctx, target, trace)? == text(ctx, right, trace)?;
            ctx.constant_bool(same == (op == Operation::Equal), trace)
        }
        _ => unsupported_operation(ctx, target, op, trace),
    }
}

/// Bind the target's text once; strings have no run-time storage to copy into.
fn copy_to(ctx: &mut Context, source: VarId, target: VarId, _out: &mut Vec<String>, trace: Trace) -> Result<(), CompileError> {
    let value = text(ctx, source, trace)?;
    let var = ctx.var(target)?;
    if var.type_name != STRING {
        return Err(CompileError::unsupported(
            format!("Cannot copy a 'string' into a '{}'", var.type_name),
            trace,
        ));
    }
    if var.value != Value::Unset {
        return Err(CompileError::unsupported(
            format!("The string '{}' is already assigned", var.name),
            trace,
        ));
    }
    ctx.var_mut(target)?.value = Value::Text(value);
    Ok(())
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

    #[test]
    fn concatenation_accepts_constant_numbers() {
        let mut ctx = context();
        let t = Trace::default();
        let a = ctx.constant_text("score: ".into(), t).unwrap();
        let n = ctx.constant_int(3, t).unwrap();
        let joined = invoke_operation(&mut ctx, a, Operation::Add, n, t).unwrap();
        assert_eq!(text(&ctx, joined, t).unwrap(), "score: 3");
    }

    #[test]
    fn equality_folds_to_a_constant_bool() {
        let mut ctx = context();
        let t = Trace::default();
        let a = ctx.constant_text("x".into(), t).unwrap();
        let b = ctx.constant_text("x".into(), t).unwrap();
        let same = invoke_operation(&mut ctx, a, Operation::Equal, b, t).unwrap();
        assert_eq!(ctx.var(same).unwrap().type_name, BOOL);
        assert_eq!(ctx.var(same).unwrap().value, Value::Int(1));
    }

    #[test]
    fn strings_are_assigned_once() {
        let mut ctx = context();
        let t = Trace::default();
        let a = ctx.constant_text("x".into(), t).unwrap();
        let b = ctx.constant_text("y".into(), t).unwrap();
        let err = invoke_operation(&mut ctx, a, Operation::Set, b, t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);

        let err = invoke_operation(&mut ctx, a, Operation::Multiply, b, t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    }
}
