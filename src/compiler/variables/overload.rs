//! Argument binding for constructors and methods.
//!
//! An overload is skipped only when binding fails with Wrong Argument Count
//! or Cannot Cast. Any other failure aborts the call. A skipped overload
//! leaves no commands behind.

use super::super::context::Context;
use super::super::error::{CompileError, ErrorKind};
use super::super::trace::Trace;
use super::casting::cast;
use super::{write_copy_to, Access, Usage, VarId};

/// One parameter: `(type, name)`.
pub type Param = (&'static str, &'static str);

/// Pick the first overload that accepts `args`. Each overload binds its
/// parameters in its own child scope of the current scope.
/// Returns the overload's index and the bound parameters.
pub fn select(
    ctx: &mut Context,
    what: &str,
    overloads: &[&[Param]],
    args: &[VarId],
    trace: Trace,
) -> Result<(usize, Vec<VarId>), CompileError> {
    let scopes = ctx.create_children(overloads.len())?;
    let mut arity_matched = false;

    for (index, (params, scope)) in overloads.iter().zip(scopes).enumerate() {
        let bound = ctx.in_scope(scope, |ctx| bind(ctx, what, params, args, trace));
        match bound {
            Ok(params) => return Ok((index, params)),
            Err(err) if err.kind == ErrorKind::WrongArgumentCount => {}
            Err(err) if err.kind == ErrorKind::CannotCast => arity_matched = true,
            Err(err) => return Err(err),
        }
        ctx.discard_spies(scope)?;
    }

    if arity_matched {
        return Err(CompileError::cannot_cast(
            &format!("({})", describe_args(ctx, args)?),
            &format!("any overload of '{what}'"),
            trace,
        ));
    }
    let arities: Vec<String> = overloads.iter().map(|params| params.len().to_string()).collect();
    Err(CompileError::wrong_argument_count(what, &arities.join(" or "), args.len(), trace))
}

/// Bind `args` to `params` as parameter variables in the current scope.
/// Every argument is converted before any parameter is declared.
pub fn bind(ctx: &mut Context, what: &str, params: &[Param], args: &[VarId], trace: Trace) -> Result<Vec<VarId>, CompileError> {
    if params.len() != args.len() {
        return Err(CompileError::wrong_argument_count(
            what,
            &params.len().to_string(),
            args.len(),
            trace,
        ));
    }
    let values = params
        .iter()
        .zip(args)
        .map(|(&(type_name, _), arg)| cast(ctx, *arg, type_name, trace))
        .collect::<Result<Vec<_>, _>>()?;

    let mut bound = Vec::with_capacity(params.len());
    for (&(type_name, name), value) in params.iter().zip(values) {
        let param = ctx.declare_internal(type_name, Access::Private, Usage::Parameter, name, trace)?;
        let mut lines = Vec::new();
        write_copy_to(ctx, value, param, &mut lines, trace)?;
        ctx.emit_lines(lines)?;
        bound.push(param);
    }
    Ok(bound)
}

fn describe_args(ctx: &Context, args: &[VarId]) -> Result<String, CompileError> {
    let types = args
        .iter()
        .map(|arg| ctx.var(*arg).map(|var| var.type_name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(types.join(", "))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compiler::trace::SourceId;
    use crate::compiler::variables::boolean::BOOL;
    use crate::compiler::variables::int::INT;
    use crate::compiler::variables::string::STRING;
    use crate::config::CompilerConfig;

    static OVERLOADS: &[&[Param]] = &[&[], &[(STRING, "a")], &[(STRING, "a"), (INT, "b")]];

    fn context() -> Context {
        let mut ctx = Context::new(CompilerConfig::default(), SourceId(0));
        ctx.open_entry_unit().unwrap();
        ctx
    }

    #[test]
    fn picks_overload_by_arity_and_type() {
        let mut ctx = context();
        let t = Trace::default();
        let text = ctx.constant_text("x".into(), t).unwrap();
        let n = ctx.constant_int(1, t).unwrap();

        assert_eq!(select(&mut ctx, "f", OVERLOADS, &[], t).unwrap().0, 0);
        let (index, params) = select(&mut ctx, "f", OVERLOADS, &[text, n], t).unwrap();
        assert_eq!(index, 2);
        assert_eq!(ctx.var(params[1]).unwrap().usage, Usage::Parameter);
    }

    #[test]
    fn integer_arguments_convert_to_text() {
        let mut ctx = context();
        let t = Trace::default();
        let n = ctx.constant_int(1, t).unwrap();
        assert_eq!(select(&mut ctx, "f", OVERLOADS, &[n], t).unwrap().0, 1);
    }

    #[test]
    fn no_matching_arity_is_wrong_argument_count() {
        let mut ctx = context();
        let t = Trace::default();
        let n = ctx.constant_int(1, t).unwrap();
        let err = select(&mut ctx, "f", OVERLOADS, &[n, n, n], t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongArgumentCount);
        assert!(err.message.contains("0 or 1 or 2"), "{}", err.message);
    }

    #[test]
    fn matching_arity_with_bad_types_is_cannot_cast() {
        let mut ctx = context();
        let t = Trace::default();
        let resident = ctx.temporary(INT, t).unwrap();
        let err = select(&mut ctx, "f", OVERLOADS, &[resident], t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CannotCast);
    }

    #[test]
    fn skipped_overload_emits_nothing() {
        let mut ctx = context();
        let t = Trace::default();
        let resident = ctx.temporary(INT, t).unwrap();
        let before = ctx.emitted_lines().len();

        // The flag converts (and emits) before the name fails to.
        let overloads: &[&[Param]] = &[&[(BOOL, "flag"), (STRING, "name")]];
        let err = select(&mut ctx, "f", overloads, &[resident, resident], t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CannotCast);
        assert_eq!(ctx.emitted_lines().len(), before);
    }

    #[test]
    fn only_the_chosen_overload_emits() {
        let t = Trace::default();
        let lines_for = |overloads: &[&[Param]]| {
            let mut ctx = context();
            let resident = ctx.temporary(INT, t).unwrap();
            let (index, _) = select(&mut ctx, "f", overloads, &[resident, resident], t).unwrap();
            (index, ctx.emitted_lines().len())
        };

        let (index, with_skip) = lines_for(&[&[(BOOL, "flag"), (STRING, "name")], &[(BOOL, "flag"), (INT, "n")]]);
        assert_eq!(index, 1);
        let (_, alone) = lines_for(&[&[(BOOL, "flag"), (INT, "n")]]);
        assert_eq!(with_skip, alone);
        assert!(alone > 0);
    }
}
