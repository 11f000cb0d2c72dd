use indexmap::IndexMap;

use super::super::context::Context;
use super::super::emit::{OutputSink, Phase};
use super::super::error::CompileError;
use super::super::trace::Trace;
use super::casting::Caster;
use super::{boolean, int, objective, string, Access, Operation, Usage, VarId, Variable};

/// Gives a freshly declared variable its storage and members.
pub type Initializer = fn(&mut Context, VarId) -> Result<(), CompileError>;
/// Builds a fully populated variable from an argument list.
pub type Constructor = fn(&mut Context, &[VarId], Trace) -> Result<VarId, CompileError>;
pub type Operator = fn(&mut Context, VarId, Operation, VarId, Trace) -> Result<VarId, CompileError>;
/// Copies the first variable's value into the second's storage.
pub type CopyTo = fn(&mut Context, VarId, VarId, &mut Vec<String>, Trace) -> Result<(), CompileError>;
pub type Hook = fn(&Variable, &mut dyn OutputSink);

/// Per-phase output of a variable, written when its scope is flushed.
#[derive(Clone, Copy)]
pub struct Hooks {
    pub prep: Option<Hook>,
    pub init: Option<Hook>,
    pub tick: Option<Hook>,
    pub demo: Option<Hook>,
}

impl Hooks {
    pub const NONE: Hooks = Hooks {
        prep: None,
        init: None,
        tick: None,
        demo: None,
    };

    pub fn get(&self, phase: Phase) -> Option<Hook> {
        match phase {
            Phase::Prep => self.prep,
            Phase::Init => self.init,
            Phase::Tick => self.tick,
            Phase::Demo => self.demo,
        }
    }
}

/// A concrete variable type: single source of truth for its modifiers,
/// storage, operators, copy behavior and conversions.
/// Adding a type means adding ONE entry to [`BUILTIN_TYPES`].
pub struct TypeDef {
    pub name: &'static str,
    pub access: &'static [Access],
    pub usage: &'static [Usage],
    pub initialize: Initializer,
    pub construct: Option<Constructor>,
    pub operate: Operator,
    pub copy_to: CopyTo,
    /// Conversions this type supplies from itself to others (slot 0).
    pub casters_to: &'static [(&'static str, Caster)],
    /// Conversions this type supplies from others into itself (slot 1).
    pub casters_from: &'static [(&'static str, Caster)],
    pub hooks: Hooks,
}

impl std::fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDef").field("name", &self.name).finish_non_exhaustive()
    }
}

impl TypeDef {
    /// Reject modifiers outside this type's allowed sets. Compiler-assigned
    /// usages are never checked.
    pub fn check_modifiers(&self, access: Access, usage: Usage, trace: Trace) -> Result<(), CompileError> {
        if !self.access.contains(&access) {
            return Err(CompileError::invalid_modifier(access, self.name, trace));
        }
        if usage.is_checked() && !self.usage.contains(&usage) {
            return Err(CompileError::invalid_modifier(usage, self.name, trace));
        }
        Ok(())
    }
}

/// Every type available to scripts, registered before any parsing begins.
pub static BUILTIN_TYPES: &[&TypeDef] = &[
    &int::INT_TYPE,
    &boolean::BOOL_TYPE,
    &string::STRING_TYPE,
    &objective::OBJECTIVE_TYPE,
];

/// Type name to definition; populated once per compilation, then read-only.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: IndexMap<&'static str, &'static TypeDef>,
}

impl TypeRegistry {
    pub fn builtin() -> Self {
        Self::from_defs(BUILTIN_TYPES)
    }

    pub fn from_defs(defs: &[&'static TypeDef]) -> Self {
        Self {
            types: defs.iter().map(|def| (def.name, *def)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static TypeDef> {
        self.types.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static TypeDef> + '_ {
        self.types.values().copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compiler::error::ErrorKind;

    #[test]
    fn builtin_names_are_unique() {
        let registry = TypeRegistry::builtin();
        assert_eq!(registry.iter().count(), BUILTIN_TYPES.len());
        for name in ["int", "bool", "string", "objective"] {
            assert!(registry.contains(name), "{name}");
        }
    }

    #[test]
    fn modifier_sets_are_enforced() {
        let def = TypeRegistry::builtin().get("string").unwrap();
        let err = def
            .check_modifiers(Access::Private, Usage::Static, Trace::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidModifier);
        def.check_modifiers(Access::Public, Usage::Parameter, Trace::default()).unwrap();
    }
}
