//! `objective`: a reference to a scoreboard objective.
//!
//! `new objective(...)` creates one. Its setup adds the objective to the
//! world and its teardown removes it again. Copying an objective variable
//! rebinds the reference and never creates a second objective.

use super::super::context::Context;
use super::super::emit::OutputSink;
use super::super::error::CompileError;
use super::super::trace::Trace;
use super::casting::cast;
use super::int::INT;
use super::overload::{self, Param};
use super::registry::{Hooks, TypeDef};
use super::score::{self, Operand};
use super::string::{self, STRING};
use super::{unsupported_operation, Access, Member, Operation, Register, Usage, Value, VarId, Variable};

pub const OBJECTIVE: &str = "objective";

/// Criterion used when none is given.
pub const DEFAULT_CRITERION: &str = "dummy";

pub static OBJECTIVE_TYPE: TypeDef = TypeDef {
    name: OBJECTIVE,
    access: &[Access::Private, Access::Public],
    usage: &[Usage::Default, Usage::Static, Usage::Constant],
    initialize,
    construct: Some(construct),
    operate,
    copy_to,
    casters_to: &[],
    casters_from: &[],
    hooks: Hooks {
        prep: Some(write_prep),
        init: None,
        tick: None,
        demo: Some(write_demo),
    },
};

static CONSTRUCTORS: &[&[Param]] = &[
    &[],
    &[(STRING, "criterion")],
    &[(STRING, "criterion"), (STRING, "name")],
];

const CRITERION_FIELD: &str = "Criterion";

fn initialize(ctx: &mut Context, id: VarId) -> Result<(), CompileError> {
    let inner = ctx.inner_scope(id)?;
    let trace = ctx.var(id)?.trace;
    let criterion = ctx.in_scope(inner, |ctx| {
        ctx.declare_internal(STRING, Access::Public, Usage::Default, CRITERION_FIELD, trace)
    })?;

    let members = &mut ctx.var_mut(id)?.members;
    members.insert(CRITERION_FIELD.to_string(), Member::Field(criterion));
    members.insert(
        "Id".to_string(),
        Member::Property {
            get: Some(get_id),
            set: None,
        },
    );
    members.insert(
        "DisplayName".to_string(),
        Member::Property {
            get: None,
            set: Some(set_display_name),
        },
    );
    members.insert("Get".to_string(), Member::Method(get_score));
    members.insert("Set".to_string(), Member::Method(set_score));
    members.insert("Reset".to_string(), Member::Method(reset_score));
    Ok(())
}

fn construct(ctx: &mut Context, args: &[VarId], trace: Trace) -> Result<VarId, CompileError> {
    let (_, params) = overload::select(ctx, OBJECTIVE, CONSTRUCTORS, args, trace)?;
    let mut params = params.into_iter();
    let criterion = match params.next() {
        Some(param) => string::text(ctx, param, trace)?,
        None => DEFAULT_CRITERION.to_string(),
    };
    let id = match params.next() {
        Some(param) => string::text(ctx, param, trace)?,
        None => ctx.next_objective_id(),
    };
    validate_id(&id, trace)?;
    ctx.claim_objective_id(&id, trace)?;

    let result = ctx.temporary(OBJECTIVE, trace)?;
    bind(ctx, result, Value::Objective { id, criterion }, trace)?;
    ctx.var_mut(result)?.constructed = true;
    Ok(result)
}

/// Objective names are at most 16 characters of `[A-Za-z0-9_.+-]`.
fn validate_id(id: &str, trace: Trace) -> Result<(), CompileError> {
    let valid_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-');
    if id.is_empty() || id.len() > 16 || !id.chars().all(valid_char) {
        return Err(CompileError::invalid_name(id, "not a valid objective name", trace));
    }
    Ok(())
}

/// Point `target` at an objective and refresh its `Criterion` field.
fn bind(ctx: &mut Context, target: VarId, value: Value, trace: Trace) -> Result<(), CompileError> {
    let var = ctx.var(target)?;
    if var.usage == Usage::Constant && var.value != Value::Unset {
        return Err(CompileError::unsupported(
            format!("The constant '{}' is already assigned", var.name),
            trace,
        ));
    }
    let field = match var.members.get(CRITERION_FIELD) {
        Some(Member::Field(field)) => Some(*field),
        _ => None,
    };
    if let (Some(field), Value::Objective { criterion, .. }) = (field, &value) {
        ctx.var_mut(field)?.value = Value::Text(criterion.clone());
    }
    ctx.var_mut(target)?.value = value;
    Ok(())
}

fn operate(ctx: &mut Context, target: VarId, op: Operation, operand: VarId, trace: Trace) -> Result<VarId, CompileError> {
    match op {
        Operation::Set => {
            let value = cast(ctx, operand, OBJECTIVE, trace)?;
            let mut unused = Vec::new();
            copy_to(ctx, value, target, &mut unused, trace)?;
            Ok(target)
        }
        _ => unsupported_operation(ctx, target, op, trace),
    }
}

fn copy_to(ctx: &mut Context, source: VarId, target: VarId, _out: &mut Vec<String>, trace: Trace) -> Result<(), CompileError> {
    if ctx.var(target)?.type_name != OBJECTIVE {
        return Err(CompileError::unsupported(
            format!("Cannot copy an 'objective' into '{}'", ctx.var(target)?),
            trace,
        ));
    }
    let value = referent(ctx, source, trace)?;
    bind(ctx, target, value, trace)
}

fn referent(ctx: &Context, id: VarId, trace: Trace) -> Result<Value, CompileError> {
    let var = ctx.var(id)?;
    match &var.value {
        value @ Value::Objective { .. } => Ok(value.clone()),
        _ => Err(CompileError::syntax(
            format!("The objective '{}' is used before it is assigned", var.name),
            trace,
        )),
    }
}

fn objective_id(ctx: &Context, id: VarId, trace: Trace) -> Result<String, CompileError> {
    match referent(ctx, id, trace)? {
        Value::Objective { id, .. } => Ok(id),
        _ => Err(CompileError::internal("Objective without an id", trace)),
    }
}

// ── Hooks ────────────────────────────────────────────────────────

fn write_prep(var: &Variable, out: &mut dyn OutputSink) {
    if let (true, Value::Objective { id, criterion }) = (var.constructed, &var.value) {
        out.write_line(&format!("scoreboard objectives add {id} {criterion}"));
    }
}

fn write_demo(var: &Variable, out: &mut dyn OutputSink) {
    if let (true, Value::Objective { id, .. }) = (var.constructed, &var.value) {
        out.write_line(&format!("scoreboard objectives remove {id}"));
    }
}

// ── Members ──────────────────────────────────────────────────────

fn get_id(ctx: &mut Context, owner: VarId, trace: Trace) -> Result<VarId, CompileError> {
    let id = objective_id(ctx, owner, trace)?;
    ctx.constant_text(id, trace)
}

fn set_display_name(ctx: &mut Context, owner: VarId, value: VarId, trace: Trace) -> Result<(), CompileError> {
    let id = objective_id(ctx, owner, trace)?;
    let value = cast(ctx, value, STRING, trace)?;
    let name = string::text(ctx, value, trace)?;
    let component = serde_json::to_string(&name)
        .map_err(|e| CompileError::internal(format!("Cannot encode display name: {e}"), trace))?;
    ctx.emit_lines(vec![format!("scoreboard objectives modify {id} displayname {component}")])
}

fn holder_of(ctx: &mut Context, args: &[VarId], what: &str, expected: usize, trace: Trace) -> Result<String, CompileError> {
    if args.len() != expected {
        return Err(CompileError::wrong_argument_count(
            what,
            &expected.to_string(),
            args.len(),
            trace,
        ));
    }
    let Some(first) = args.first() else {
        return Err(CompileError::wrong_argument_count(what, &expected.to_string(), 0, trace));
    };
    let holder = cast(ctx, *first, STRING, trace)?;
    let holder = string::text(ctx, holder, trace)?;
    if holder.is_empty() || holder.chars().any(char::is_whitespace) {
        return Err(CompileError::invalid_name(&holder, "not a valid score holder", trace));
    }
    Ok(holder)
}

/// `o.Get(holder)`: the holder's score, as a resident int.
fn get_score(ctx: &mut Context, owner: VarId, args: &[VarId], trace: Trace) -> Result<Option<VarId>, CompileError> {
    let holder = holder_of(ctx, args, "Get", 1, trace)?;
    let objective = objective_id(ctx, owner, trace)?;
    ctx.alias(INT, Register::new(holder, objective), trace).map(Some)
}

/// `o.Set(holder, value)`
fn set_score(ctx: &mut Context, owner: VarId, args: &[VarId], trace: Trace) -> Result<Option<VarId>, CompileError> {
    let holder = holder_of(ctx, args, "Set", 2, trace)?;
    let objective = objective_id(ctx, owner, trace)?;
    let Some(value) = args.get(1) else {
        return Err(CompileError::wrong_argument_count("Set", "2", args.len(), trace));
    };
    let value = cast(ctx, *value, INT, trace)?;
    let source: Operand = score::operand(ctx, value, trace)?;
    let target = ctx.alias(INT, Register::new(holder, objective), trace)?;
    let mut lines = Vec::new();
    score::store(ctx, source, target, &mut lines, trace)?;
    ctx.emit_lines(lines)?;
    Ok(None)
}

/// `o.Reset(holder)`
fn reset_score(ctx: &mut Context, owner: VarId, args: &[VarId], trace: Trace) -> Result<Option<VarId>, CompileError> {
    let holder = holder_of(ctx, args, "Reset", 1, trace)?;
    let objective = objective_id(ctx, owner, trace)?;
    ctx.emit_lines(vec![format!("scoreboard players reset {holder} {objective}")])?;
    Ok(None)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compiler::error::ErrorKind;
    use crate::compiler::trace::SourceId;
    use crate::config::CompilerConfig;

    fn context() -> Context {
        let mut ctx = Context::new(CompilerConfig::default(), SourceId(0));
        ctx.open_entry_unit().unwrap();
        ctx
    }

    #[test]
    fn constructor_overloads() {
        let mut ctx = context();
        let t = Trace::default();
        let plain = construct(&mut ctx, &[], t).unwrap();
        assert!(matches!(
            &ctx.var(plain).unwrap().value,
            Value::Objective { criterion, .. } if criterion == DEFAULT_CRITERION
        ));

        let criterion = ctx.constant_text("deathCount".into(), t).unwrap();
        let name = ctx.constant_text("deaths".into(), t).unwrap();
        let named = construct(&mut ctx, &[criterion, name], t).unwrap();
        assert_eq!(
            ctx.var(named).unwrap().value,
            Value::Objective {
                id: "deaths".into(),
                criterion: "deathCount".into()
            }
        );

        let err = construct(&mut ctx, &[criterion, name], t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateName);
    }

    #[test]
    fn constructor_argument_errors() {
        let mut ctx = context();
        let t = Trace::default();
        let text = ctx.constant_text("dummy".into(), t).unwrap();
        let err = construct(&mut ctx, &[text, text, text], t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongArgumentCount);

        let resident = ctx.temporary(INT, t).unwrap();
        let err = construct(&mut ctx, &[resident], t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CannotCast);
    }

    #[test]
    fn invalid_objective_names_are_rejected() {
        let mut ctx = context();
        let t = Trace::default();
        let criterion = ctx.constant_text("dummy".into(), t).unwrap();
        let name = ctx.constant_text("has space".into(), t).unwrap();
        let err = construct(&mut ctx, &[criterion, name], t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidName);
    }

    #[test]
    fn hooks_only_run_for_the_constructed_value() {
        let mut ctx = context();
        let t = Trace::default();
        let made = construct(&mut ctx, &[], t).unwrap();
        let copy = ctx.temporary(OBJECTIVE, t).unwrap();
        copy_to(&mut ctx, made, copy, &mut Vec::new(), t).unwrap();

        let mut out = Vec::new();
        write_prep(ctx.var(made).unwrap(), &mut out);
        write_prep(ctx.var(copy).unwrap(), &mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].ends_with(" dummy"));
    }

    #[test]
    fn score_methods_address_the_holder() {
        let mut ctx = context();
        let t = Trace::default();
        let objective = construct(&mut ctx, &[], t).unwrap();
        let holder = ctx.constant_text("@s".into(), t).unwrap();
        let value = ctx.constant_int(4, t).unwrap();

        set_score(&mut ctx, objective, &[holder, value], t).unwrap();
        let score = get_score(&mut ctx, objective, &[holder], t).unwrap().unwrap();
        let id = objective_id(&ctx, objective, t).unwrap();
        assert_eq!(
            ctx.var(score).unwrap().value,
            Value::Register(Register::new("@s", id.clone()))
        );
        let lines = ctx.emitted_lines();
        assert!(lines.contains(&format!("scoreboard players set @s {id} 4")));

        let err = get_score(&mut ctx, objective, &[], t).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongArgumentCount);
    }

    #[test]
    fn display_name_is_a_json_text_component() {
        let mut ctx = context();
        let t = Trace::default();
        let objective = construct(&mut ctx, &[], t).unwrap();
        let name = ctx.constant_text("Kills \"total\"".into(), t).unwrap();
        set_display_name(&mut ctx, objective, name, t).unwrap();
        let last = ctx.emitted_lines().pop().unwrap();
        assert!(last.ends_with(r#"displayname "Kills \"total\"""#), "{last}");
    }
}
