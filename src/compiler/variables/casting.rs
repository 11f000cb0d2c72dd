//! The caster graph: `(from, to)` to a pair of conversion functions.
//!
//! Slot 0 holds the conversion the source type registered, slot 1 the one the
//! target type registered. Lookup prefers slot 0.

use std::collections::HashMap;

use super::super::context::Context;
use super::super::error::{CompileError, ErrorKind};
use super::super::trace::Trace;
use super::registry::TypeDef;
use super::VarId;

pub type Caster = fn(&mut Context, VarId, Trace) -> Result<VarId, CompileError>;

#[derive(Default)]
pub struct CasterGraph {
    edges: HashMap<(&'static str, &'static str), [Option<Caster>; 2]>,
}

impl std::fmt::Debug for CasterGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut edges: Vec<_> = self.edges.keys().collect();
        edges.sort();
        f.debug_struct("CasterGraph").field("edges", &edges).finish()
    }
}

impl CasterGraph {
    /// Register every conversion the given types supply.
    pub fn from_types<'a>(types: impl IntoIterator<Item = &'a TypeDef>) -> Self {
        let mut graph = Self::default();
        for def in types {
            for (to, caster) in def.casters_to {
                graph.register_to(def.name, to, *caster);
            }
            for (from, caster) in def.casters_from {
                graph.register_from(from, def.name, *caster);
            }
        }
        graph
    }

    pub fn register_to(&mut self, from: &'static str, to: &'static str, caster: Caster) {
        self.edges.entry((from, to)).or_default()[0] = Some(caster);
    }

    pub fn register_from(&mut self, from: &'static str, to: &'static str, caster: Caster) {
        self.edges.entry((from, to)).or_default()[1] = Some(caster);
    }

    /// Both slots for an edge; `None` when neither type registered it.
    pub fn lookup(&self, from: &'static str, to: &'static str) -> Option<[Option<Caster>; 2]> {
        self.edges.get(&(from, to)).copied()
    }
}

/// Convert `value` to the type `to`. Same-type casts return `value` itself.
/// The target type's conversion is tried when the source type's refuses.
pub fn cast(ctx: &mut Context, value: VarId, to: &'static str, trace: Trace) -> Result<VarId, CompileError> {
    let var = ctx.var(value)?;
    let from = var.type_name;
    if from == to {
        return Ok(value);
    }
    let describe = var.to_string();
    let [first, second] = ctx
        .casters()
        .lookup(from, to)
        .ok_or_else(|| CompileError::cannot_cast(&describe, to, trace))?;

    log::trace!("cast {describe} to {to}");
    match (first, second) {
        (Some(first), Some(second)) => match first(ctx, value, trace) {
            Err(err) if err.kind == ErrorKind::CannotCast => second(ctx, value, trace),
            result => result,
        },
        (Some(only), None) | (None, Some(only)) => only(ctx, value, trace),
        (None, None) => Err(CompileError::cannot_cast(&describe, to, trace)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compiler::error::ErrorKind;
    use crate::compiler::variables::{boolean::BOOL, int::INT, string::STRING, Value};
    use crate::config::CompilerConfig;
    use crate::compiler::trace::SourceId;

    fn context() -> Context {
        Context::new(CompilerConfig::default(), SourceId(0))
    }

    #[test]
    fn source_registered_caster_only_goes_one_way() {
        let mut ctx = context();
        let number = ctx.constant_int(7, Trace::default()).unwrap();
        let text = cast(&mut ctx, number, STRING, Trace::default()).unwrap();
        assert_eq!(ctx.var(text).unwrap().type_name, STRING);

        let err = cast(&mut ctx, text, INT, Trace::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CannotCast);
    }

    #[test]
    fn same_type_cast_is_identity() {
        let mut ctx = context();
        let flag = ctx.constant_bool(true, Trace::default()).unwrap();
        assert_eq!(cast(&mut ctx, flag, BOOL, Trace::default()).unwrap(), flag);
    }

    fn refuse(_: &mut Context, _: VarId, trace: Trace) -> Result<VarId, CompileError> {
        Err(CompileError::cannot_cast("text", INT, trace))
    }

    fn reject(_: &mut Context, _: VarId, trace: Trace) -> Result<VarId, CompileError> {
        Err(CompileError::unsupported("text has no numeric value", trace))
    }

    fn zero(ctx: &mut Context, _: VarId, trace: Trace) -> Result<VarId, CompileError> {
        ctx.constant_int(0, trace)
    }

    #[test]
    fn target_caster_runs_when_the_source_refuses() {
        let mut ctx = context();
        ctx.casters_mut().register_to(STRING, INT, refuse);
        ctx.casters_mut().register_from(STRING, INT, zero);
        let text = ctx.constant_text("12".to_string(), Trace::default()).unwrap();

        let number = cast(&mut ctx, text, INT, Trace::default()).unwrap();
        let var = ctx.var(number).unwrap();
        assert_eq!(var.type_name, INT);
        assert_eq!(var.value, Value::Int(0));
    }

    #[test]
    fn target_caster_alone_is_enough() {
        let mut ctx = context();
        ctx.casters_mut().register_from(STRING, INT, zero);
        let text = ctx.constant_text("x".to_string(), Trace::default()).unwrap();
        let number = cast(&mut ctx, text, INT, Trace::default()).unwrap();
        assert_eq!(ctx.var(number).unwrap().type_name, INT);
    }

    #[test]
    fn other_source_errors_skip_the_target_caster() {
        let mut ctx = context();
        ctx.casters_mut().register_to(STRING, INT, reject);
        ctx.casters_mut().register_from(STRING, INT, zero);
        let text = ctx.constant_text("12".to_string(), Trace::default()).unwrap();
        let before = ctx.variable_count();

        let err = cast(&mut ctx, text, INT, Trace::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
        assert_eq!(ctx.variable_count(), before);
    }

    #[test]
    fn resident_int_cannot_become_text() {
        let mut ctx = context();
        let resident = ctx.temporary(INT, Trace::default()).unwrap();
        let err = cast(&mut ctx, resident, STRING, Trace::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CannotCast);
    }
}
