//! Per-compilation state. Everything that would otherwise be process-wide
//! (type registry, caster graph, scopes, anonymous counters and the
//! current-scope cursor) lives here, so separate compilations never share it.

use std::collections::HashSet;

use super::builder::TreeBuilder;
use super::emit::Spy;
use super::error::{CompileError, ErrorKind};
use super::scope::{EntryKind, ScopeId, ScopeTree};
use super::trace::{SourceId, Trace};
use super::variables::boolean::BOOL;
use super::variables::casting::CasterGraph;
use super::variables::int::INT;
use super::variables::string::STRING;
use super::variables::{Access, Register, TypeDef, TypeRegistry, Usage, Value, VarId, Variable};
use crate::config::CompilerConfig;

/// Words a variable can never be named.
const RESERVED_WORDS: &[&str] = &["if", "else", "new", "true", "false", "public", "private", "static", "const"];

/// One output function: the commands of a scope and its non-unit descendants.
#[derive(Debug, Clone)]
pub struct Unit {
    pub path: String,
    pub scope: ScopeId,
    pub trace: Trace,
}

/// A user declaration, before its type's initializer runs.
#[derive(Debug, Clone)]
pub struct Declaration<'a> {
    pub type_name: &'a str,
    pub access: Access,
    pub usage: Usage,
    pub name: &'a str,
    pub trace: Trace,
}

#[derive(Debug)]
pub struct Context {
    config: CompilerConfig,
    builder: TreeBuilder,
    types: TypeRegistry,
    casters: CasterGraph,
    scopes: ScopeTree,
    vars: Vec<Variable>,
    units: Vec<Unit>,
    current: ScopeId,
    objective_ids: HashSet<String>,
    next_objective: u64,
}

impl Context {
    /// A context with every built-in type registered and the register
    /// objective's setup and teardown queued in the global scope.
    pub fn new(config: CompilerConfig, source: SourceId) -> Self {
        let types = TypeRegistry::builtin();
        let casters = CasterGraph::from_types(types.iter());
        let scopes = ScopeTree::new();
        let root = scopes.root();
        let builder = TreeBuilder::new(source).with_separator(config.statement_separator);

        let mut ctx = Self {
            config,
            builder,
            types,
            casters,
            scopes,
            vars: Vec::new(),
            units: Vec::new(),
            current: root,
            objective_ids: HashSet::new(),
            next_objective: 0,
        };

        let objective = ctx.config.register_objective.clone();
        ctx.objective_ids.insert(objective.clone());
        let spy = Spy::prep_demo(
            format!("scoreboard objectives add {objective} dummy"),
            format!("scoreboard objectives remove {objective}"),
        );
        let registered = ctx.scopes.register_spy(root, spy);
        debug_assert!(registered.is_ok(), "the root scope always exists");
        ctx
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn builder(&self) -> TreeBuilder {
        self.builder
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn casters(&self) -> &CasterGraph {
        &self.casters
    }

    #[cfg(test)]
    pub(crate) fn casters_mut(&mut self) -> &mut CasterGraph {
        &mut self.casters
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    // ── Scope cursor ─────────────────────────────────────────────

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    pub fn global_scope(&self) -> ScopeId {
        self.scopes.root()
    }

    /// Run `f` with `scope` as the current scope. The previous scope is
    /// restored whether or not `f` succeeds.
    pub fn in_scope<T>(
        &mut self,
        scope: ScopeId,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        let saved = std::mem::replace(&mut self.current, scope);
        let result = f(self);
        self.current = saved;
        result
    }

    pub fn create_children(&mut self, n: usize) -> Result<Vec<ScopeId>, CompileError> {
        let prefix = self.config.anonymous_prefix.clone();
        self.scopes.create_children(self.current, n, &prefix)
    }

    /// The member scope of `id`, created on first use.
    pub fn inner_scope(&mut self, id: VarId) -> Result<ScopeId, CompileError> {
        let var = self.var(id)?;
        if let Some(inner) = var.inner_scope {
            return Ok(inner);
        }
        let (scope, name) = (var.scope, var.name.clone());
        let inner = self.scopes.create_inner(scope, &name)?;
        self.var_mut(id)?.inner_scope = Some(inner);
        Ok(inner)
    }

    /// Look `name` up from the current scope outward.
    pub fn resolve(&self, name: &str) -> Option<VarId> {
        self.scopes.resolve(self.current, name)
    }

    pub fn resolve_in(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        self.scopes.resolve(scope, name)
    }

    // ── Units ────────────────────────────────────────────────────

    /// Open the root unit under the global scope and make it current.
    pub fn open_entry_unit(&mut self) -> Result<ScopeId, CompileError> {
        let entry = self.config.entry.clone();
        let scope = self.scopes.create_child(self.global_scope(), entry.as_str())?;
        self.push_unit(scope, Trace::start(self.builder.source()))?;
        self.current = scope;
        Ok(scope)
    }

    /// Open a nested unit under the current scope, named by its next
    /// anonymous id. The cursor does not move.
    pub fn open_unit(&mut self, trace: Trace) -> Result<(String, ScopeId), CompileError> {
        let name = self.scopes.next_anonymous_id(self.current, &self.config.anonymous_prefix)?;
        let scope = self.scopes.create_child(self.current, name)?;
        let path = self.push_unit(scope, trace)?;
        Ok((path, scope))
    }

    fn push_unit(&mut self, scope: ScopeId, trace: Trace) -> Result<String, CompileError> {
        self.scopes.mark_unit(scope)?;
        let path = self.scopes.path(scope)?;
        log::debug!("open unit {path}");
        self.units.push(Unit {
            path: path.clone(),
            scope,
            trace,
        });
        Ok(path)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// The command that invokes the unit at `path`.
    pub fn function_call(&self, path: &str) -> String {
        format!("function {}:{path}", self.config.namespace)
    }

    // ── Types ────────────────────────────────────────────────────

    pub fn is_type(&self, name: &str) -> bool {
        self.types.contains(name)
    }

    pub fn type_def(&self, name: &str, trace: Trace) -> Result<&'static TypeDef, CompileError> {
        self.types
            .get(name)
            .ok_or_else(|| CompileError::new(ErrorKind::UnknownName, format!("Unknown type '{name}'"), trace))
    }

    pub fn type_of(&self, id: VarId) -> Result<&'static TypeDef, CompileError> {
        let var = self.var(id)?;
        self.type_def(var.type_name, var.trace)
    }

    // ── Variables ────────────────────────────────────────────────

    pub fn var(&self, id: VarId) -> Result<&Variable, CompileError> {
        self.vars
            .get(id.0)
            .ok_or_else(|| CompileError::internal(format!("Unknown variable #{}", id.0), Trace::default()))
    }

    pub fn var_mut(&mut self, id: VarId) -> Result<&mut Variable, CompileError> {
        self.vars
            .get_mut(id.0)
            .ok_or_else(|| CompileError::internal(format!("Unknown variable #{}", id.0), Trace::default()))
    }

    pub fn variable_count(&self) -> usize {
        self.vars.len()
    }

    /// Declare a user-named variable in the current scope.
    pub fn declare(&mut self, decl: &Declaration<'_>) -> Result<VarId, CompileError> {
        self.validate_name(decl.name, decl.trace)?;
        self.declare_internal(decl.type_name, decl.access, decl.usage, decl.name, decl.trace)
    }

    /// Declare `name` in the current scope without checking it as a user
    /// identifier. The type's modifier sets are still enforced.
    pub fn declare_internal(
        &mut self,
        type_name: &str,
        access: Access,
        usage: Usage,
        name: &str,
        trace: Trace,
    ) -> Result<VarId, CompileError> {
        let def = self.type_def(type_name, trace)?;
        def.check_modifiers(access, usage, trace)?;

        let id = VarId(self.vars.len());
        let scope = self.current;
        self.scopes.declare(scope, name, id, trace)?;
        self.vars.push(Variable {
            type_name: def.name,
            access,
            usage,
            name: name.to_string(),
            scope,
            inner_scope: None,
            value: Value::Unset,
            members: indexmap::IndexMap::new(),
            constructed: false,
            trace,
        });
        (def.initialize)(self, id)?;
        Ok(id)
    }

    fn anonymous(&mut self, type_name: &str, usage: Usage, trace: Trace) -> Result<VarId, CompileError> {
        let name = self.scopes.next_anonymous_id(self.current, &self.config.anonymous_prefix)?;
        self.declare_internal(type_name, Access::Private, usage, &name, trace)
    }

    /// A fresh anonymous variable in the current scope. Score types get
    /// their own register.
    pub fn temporary(&mut self, type_name: &str, trace: Trace) -> Result<VarId, CompileError> {
        self.anonymous(type_name, Usage::Default, trace)
    }

    /// An anonymous variable of `type_name` stored in an existing register.
    pub fn alias(&mut self, type_name: &str, register: Register, trace: Trace) -> Result<VarId, CompileError> {
        let id = self.anonymous(type_name, Usage::Return, trace)?;
        self.var_mut(id)?.value = Value::Register(register);
        Ok(id)
    }

    pub fn constant_int(&mut self, value: i32, trace: Trace) -> Result<VarId, CompileError> {
        self.constant(INT, Value::Int(value), trace)
    }

    pub fn constant_bool(&mut self, value: bool, trace: Trace) -> Result<VarId, CompileError> {
        self.constant(BOOL, Value::Int(i32::from(value)), trace)
    }

    pub fn constant_text(&mut self, value: String, trace: Trace) -> Result<VarId, CompileError> {
        self.constant(STRING, Value::Text(value), trace)
    }

    fn constant(&mut self, type_name: &str, value: Value, trace: Trace) -> Result<VarId, CompileError> {
        let id = self.anonymous(type_name, Usage::Constant, trace)?;
        self.var_mut(id)?.value = value;
        Ok(id)
    }

    /// User identifiers: ASCII letters, digits and `_`, not starting with a
    /// digit, not a keyword or type name, and never in the anonymous namespace.
    fn validate_name(&self, name: &str, trace: Trace) -> Result<(), CompileError> {
        let mut chars = name.chars();
        let well_formed = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !well_formed {
            return Err(CompileError::invalid_name(name, "not a valid identifier", trace));
        }
        if RESERVED_WORDS.contains(&name) || self.is_type(name) {
            return Err(CompileError::invalid_name(name, "reserved", trace));
        }
        if name.starts_with(&self.config.anonymous_prefix) {
            return Err(CompileError::invalid_name(
                name,
                "reserved for compiler-generated names",
                trace,
            ));
        }
        Ok(())
    }

    /// The register backing a variable named `name` in `scope`: the scope
    /// path with `.` separators, in the shared register objective.
    pub fn register_for(&self, scope: ScopeId, name: &str) -> Result<Register, CompileError> {
        let path = self.scopes.path(scope)?.replace('/', ".");
        let holder = if path.is_empty() { name.to_string() } else { format!("{path}.{name}") };
        Ok(Register::new(holder, self.config.register_objective.clone()))
    }

    /// Whether a variable created before the first `count` existed already
    /// lives in `register`.
    pub fn register_predates(&self, register: &Register, count: usize) -> bool {
        self.vars
            .iter()
            .take(count)
            .any(|var| var.value.register() == Some(register))
    }

    // ── Objectives ───────────────────────────────────────────────

    /// An objective name no other objective in this compilation uses.
    pub fn next_objective_id(&mut self) -> String {
        loop {
            let id = format!("{}.{}", self.config.namespace, super::scope::to_base62(self.next_objective));
            self.next_objective += 1;
            if !self.objective_ids.contains(&id) {
                return id;
            }
        }
    }

    pub fn claim_objective_id(&mut self, id: &str, trace: Trace) -> Result<(), CompileError> {
        if !self.objective_ids.insert(id.to_string()) {
            return Err(CompileError::new(
                ErrorKind::DuplicateName,
                format!("The objective '{id}' is already defined"),
                trace,
            ));
        }
        Ok(())
    }

    // ── Deferred emission ────────────────────────────────────────

    /// Register a deferred emission unit in the current scope.
    pub fn spy(&mut self, spy: Spy) -> Result<(), CompileError> {
        log::trace!("spy in scope {:?}: {:?}", self.current, spy.init);
        self.scopes.register_spy(self.current, spy)
    }

    /// Register per-activation commands in the current scope.
    pub fn emit_lines(&mut self, lines: Vec<String>) -> Result<(), CompileError> {
        if lines.is_empty() {
            return Ok(());
        }
        self.spy(Spy::init(lines))
    }

    /// Forget what `scope` registered for output, e.g. after an overload
    /// that was tried and skipped.
    pub fn discard_spies(&mut self, scope: ScopeId) -> Result<(), CompileError> {
        self.scopes.discard_spies(scope)
    }

    /// Every per-activation line registered so far, in order, across all units.
    pub fn emitted_lines(&self) -> Vec<String> {
        self.scopes
            .all_entries()
            .into_iter()
            .filter_map(|entry| match &entry.kind {
                EntryKind::Spy(spy) => Some(spy.init.iter().cloned()),
                EntryKind::Variable(_) => None,
            })
            .flatten()
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn context() -> Context {
        let mut ctx = Context::new(CompilerConfig::default(), SourceId(0));
        ctx.open_entry_unit().unwrap();
        ctx
    }

    fn decl<'a>(type_name: &'a str, name: &'a str) -> Declaration<'a> {
        Declaration {
            type_name,
            access: Access::Private,
            usage: Usage::Default,
            name,
            trace: Trace::default(),
        }
    }

    #[test]
    fn registers_follow_the_scope_path() {
        let mut ctx = context();
        let x = ctx.declare(&decl(INT, "x")).unwrap();
        assert_eq!(
            ctx.var(x).unwrap().value,
            Value::Register(Register::new("main.x", "mcs.vars"))
        );
    }

    #[test]
    fn user_names_are_validated() {
        let mut ctx = context();
        for bad in ["anon_1", "1x", "if", "int", "a-b"] {
            let err = ctx.declare(&decl(INT, bad)).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidName, "{bad}");
        }
        let err = ctx.declare(&decl("float", "f")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownName);
    }

    #[test]
    fn in_scope_restores_the_cursor_on_failure() {
        let mut ctx = context();
        let before = ctx.current_scope();
        let child = ctx.create_children(1).unwrap()[0];
        let result: Result<(), CompileError> =
            ctx.in_scope(child, |_| Err(CompileError::syntax("boom", Trace::default())));
        assert!(result.is_err());
        assert_eq!(ctx.current_scope(), before);
    }

    #[test]
    fn temporaries_never_collide() {
        let mut ctx = context();
        let a = ctx.temporary(INT, Trace::default()).unwrap();
        let b = ctx.temporary(INT, Trace::default()).unwrap();
        assert_ne!(ctx.var(a).unwrap().value, ctx.var(b).unwrap().value);
    }

    #[test]
    fn nested_units_are_named_by_anonymous_ids() {
        let mut ctx = context();
        let (path, _) = ctx.open_unit(Trace::default()).unwrap();
        assert_eq!(path, "main/anon_0");
        assert_eq!(ctx.function_call(&path), "function mcs:main/anon_0");
        assert_eq!(ctx.unit_count(), 2);
    }

    #[test]
    fn generated_objective_ids_skip_claimed_ones() {
        let mut ctx = context();
        ctx.claim_objective_id("mcs.0", Trace::default()).unwrap();
        assert_eq!(ctx.next_objective_id(), "mcs.1");
        let err = ctx.claim_objective_id("mcs.vars", Trace::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateName);
    }
}
