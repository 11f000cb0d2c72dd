//! Typed, named, scoped values and the operator/member dispatch over them.
//!
//! A variable is either Constant (its value is known while compiling and is
//! carried inline) or Resident (it lives in a scoreboard register and is only
//! known when the commands run). Concrete types live in the sibling modules
//! and are described by a static [`TypeDef`] table.

pub mod boolean;
pub mod casting;
pub mod int;
pub mod objective;
pub mod overload;
pub mod registry;
pub mod score;
pub mod string;

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use super::context::Context;
use super::error::CompileError;
use super::expr;
use super::scope::ScopeId;
use super::trace::Trace;
use super::wild::WildTree;

pub use registry::{Hooks, TypeDef, TypeRegistry};

/// Index of a variable in the compilation's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

// ── Modifiers ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Access {
    Private,
    Public,
}

impl Access {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "private" => Some(Access::Private),
            "public" => Some(Access::Public),
            _ => None,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Access::Private => "private",
            Access::Public => "public",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Usage {
    Default,
    Static,
    /// Bound once, at compile time.
    Constant,
    /// A function or constructor parameter; not subject to modifier checks.
    Parameter,
    /// A return slot; not subject to modifier checks.
    Return,
}

impl Usage {
    /// Only the modifiers a user can write. `Parameter` and `Return` are
    /// assigned by the compiler.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "static" => Some(Usage::Static),
            "const" => Some(Usage::Constant),
            _ => None,
        }
    }

    pub fn is_checked(self) -> bool {
        !matches!(self, Usage::Parameter | Usage::Return)
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Usage::Default => "default",
            Usage::Static => "static",
            Usage::Constant => "const",
            Usage::Parameter => "parameter",
            Usage::Return => "return",
        })
    }
}

// ── Storage ──────────────────────────────────────────────────────

/// A scoreboard address: a score holder within an objective.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Register {
    pub holder: String,
    pub objective: String,
}

impl Register {
    pub fn new(holder: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            objective: objective.into(),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.holder, self.objective)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Value {
    /// Declared but not yet bound (constants, references, parameters).
    Unset,
    /// Compile-time integer; booleans are stored as 0 or 1.
    Int(i32),
    /// Compile-time text.
    Text(String),
    /// Resident value in a register.
    Register(Register),
    /// A scoreboard objective reference.
    Objective { id: String, criterion: String },
}

impl Value {
    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Text(_))
    }

    pub fn register(&self) -> Option<&Register> {
        match self {
            Value::Register(register) => Some(register),
            _ => None,
        }
    }
}

// ── Members ──────────────────────────────────────────────────────

pub type Getter = fn(&mut Context, VarId, Trace) -> Result<VarId, CompileError>;
pub type Setter = fn(&mut Context, VarId, VarId, Trace) -> Result<(), CompileError>;
pub type Method = fn(&mut Context, VarId, &[VarId], Trace) -> Result<Option<VarId>, CompileError>;

/// What `.name` on a variable resolves to.
#[derive(Clone, Copy)]
pub enum Member {
    Field(VarId),
    Property { get: Option<Getter>, set: Option<Setter> },
    Method(Method),
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Field(id) => f.debug_tuple("Field").field(id).finish(),
            Member::Property { get, set } => f
                .debug_struct("Property")
                .field("get", &get.is_some())
                .field("set", &set.is_some())
                .finish(),
            Member::Method(_) => f.write_str("Method"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub type_name: &'static str,
    pub access: Access,
    pub usage: Usage,
    pub name: String,
    pub scope: ScopeId,
    /// Created on demand for member fields.
    pub inner_scope: Option<ScopeId>,
    pub value: Value,
    pub members: IndexMap<String, Member>,
    /// Set when this variable is the direct result of a constructor, so its
    /// setup and teardown hooks run exactly once.
    pub constructed: bool,
    pub trace: Trace,
}

impl Variable {
    pub fn is_constant(&self) -> bool {
        self.value.is_constant()
    }

    pub fn is_resident(&self) -> bool {
        matches!(self.value, Value::Register(_))
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.type_name, self.name)
    }
}

// ── Operators ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    New,
    Access,
    Set,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    GreaterThan,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    BooleanAnd,
    BooleanOr,
    BooleanNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Set,
    Arithmetic,
    Comparison,
    Boolean,
    /// `.` and `new`; handled by access and construction, never by a type.
    Structural,
}

/// Operator tokens; the single source of truth for the expression evaluator.
pub static OPERATORS: &[(&str, Operation)] = &[
    ("new", Operation::New),
    (".", Operation::Access),
    ("=", Operation::Set),
    ("+", Operation::Add),
    ("-", Operation::Subtract),
    ("*", Operation::Multiply),
    ("/", Operation::Divide),
    ("%", Operation::Modulo),
    (">", Operation::GreaterThan),
    (">=", Operation::GreaterThanOrEqual),
    ("==", Operation::Equal),
    ("!=", Operation::NotEqual),
    ("<", Operation::LessThan),
    ("<=", Operation::LessThanOrEqual),
    ("&&", Operation::BooleanAnd),
    ("||", Operation::BooleanOr),
    ("!", Operation::BooleanNot),
];

impl Operation {
    pub fn from_token(token: &str) -> Option<Self> {
        OPERATORS.iter().find(|(text, _)| *text == token).map(|(_, op)| *op)
    }

    pub fn symbol(self) -> &'static str {
        OPERATORS
            .iter()
            .find(|(_, op)| *op == self)
            .map_or("?", |(text, _)| *text)
    }

    pub fn kind(self) -> OperationKind {
        match self {
            Operation::New | Operation::Access => OperationKind::Structural,
            Operation::Set => OperationKind::Set,
            Operation::Add | Operation::Subtract | Operation::Multiply | Operation::Divide | Operation::Modulo => {
                OperationKind::Arithmetic
            }
            Operation::GreaterThan
            | Operation::GreaterThanOrEqual
            | Operation::Equal
            | Operation::NotEqual
            | Operation::LessThan
            | Operation::LessThanOrEqual => OperationKind::Comparison,
            Operation::BooleanAnd | Operation::BooleanOr | Operation::BooleanNot => OperationKind::Boolean,
        }
    }

    /// Binding strength of a binary operator, loosest first. `=` and the
    /// structural operators are parsed separately.
    pub fn precedence(self) -> Option<u8> {
        match self {
            Operation::BooleanOr => Some(0),
            Operation::BooleanAnd => Some(1),
            Operation::GreaterThan
            | Operation::GreaterThanOrEqual
            | Operation::Equal
            | Operation::NotEqual
            | Operation::LessThan
            | Operation::LessThanOrEqual => Some(2),
            Operation::Add | Operation::Subtract => Some(3),
            Operation::Multiply | Operation::Divide | Operation::Modulo => Some(4),
            Operation::New | Operation::Access | Operation::Set | Operation::BooleanNot => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ── Dispatch ─────────────────────────────────────────────────────

/// Apply `op` with `target` on the left. The target's type decides what the
/// operation means; types fall back to [`unsupported_operation`].
pub fn invoke_operation(
    ctx: &mut Context,
    target: VarId,
    op: Operation,
    operand: VarId,
    trace: Trace,
) -> Result<VarId, CompileError> {
    if op.kind() == OperationKind::Structural {
        return Err(CompileError::internal(
            format!("'{op}' is not dispatched to a type"),
            trace,
        ));
    }
    let def = ctx.type_of(target)?;
    (def.operate)(ctx, target, op, operand, trace)
}

/// The base behavior for operators a type does not define.
pub fn unsupported_operation(
    ctx: &Context,
    target: VarId,
    op: Operation,
    trace: Trace,
) -> Result<VarId, CompileError> {
    let type_name = ctx.var(target)?.type_name;
    Err(CompileError::unsupported(
        format!("Type '{type_name}' has not defined the '{op}' operation"),
        trace,
    ))
}

/// Apply the operator leaf `op_tree` to `target`, evaluating `rest` as the
/// right-hand side. Returns `None` only when a property setter consumed it.
pub fn invoke_operation_token(
    ctx: &mut Context,
    target: VarId,
    op_tree: &WildTree,
    rest: &[WildTree],
) -> Result<Option<VarId>, CompileError> {
    let token = op_tree
        .as_leaf()
        .map_err(|_| CompileError::syntax(format!("Expected an operator, but got '{op_tree}'"), op_tree.trace()))?;
    let trace = token.trace;
    let op = Operation::from_token(&token.text)
        .ok_or_else(|| CompileError::syntax(format!("unknown operator '{}'", token.text), trace))?;
    match op {
        Operation::Access => access(ctx, target, rest, trace),
        Operation::New => Err(CompileError::syntax("Expected an operator before 'new'", trace)),
        Operation::BooleanNot => Err(CompileError::syntax("'!' can only be used as a prefix", trace)),
        _ => {
            if rest.is_empty() {
                return Err(CompileError::syntax(format!("Expected a value after '{op}'"), trace));
            }
            let operand = expr::evaluate_items(ctx, rest, trace)?;
            invoke_operation(ctx, target, op, operand, trace).map(Some)
        }
    }
}

/// The `.` operation: `path` starts with the member name, followed by
/// whatever applies to that member.
pub fn access(ctx: &mut Context, target: VarId, path: &[WildTree], trace: Trace) -> Result<Option<VarId>, CompileError> {
    let Some((name_tree, rest)) = path.split_first() else {
        return Err(CompileError::syntax("Expected a member name after '.'", trace));
    };
    let name_token = name_tree.as_leaf()?;
    let name = name_token.text.as_str();
    let trace = name_token.trace;

    let owner = ctx.var(target)?;
    let member = owner
        .members
        .get(name)
        .copied()
        .ok_or_else(|| CompileError::unknown_member(owner.type_name, name, trace))?;

    match member {
        Member::Field(field) => match rest.split_first() {
            None => Ok(Some(field)),
            Some((op, rest)) => invoke_operation_token(ctx, field, op, rest),
        },
        Member::Property { get, set } => match rest.split_first() {
            Some((op, value)) if op.is_word("=") => {
                let set = set.ok_or_else(|| {
                    CompileError::unsupported(format!("The property '{name}' cannot be assigned"), trace)
                })?;
                if value.is_empty() {
                    return Err(CompileError::syntax("Expected a value after '='", op.trace()));
                }
                let value = expr::evaluate_items(ctx, value, trace)?;
                set(ctx, target, value, trace)?;
                Ok(None)
            }
            next => {
                let get = get.ok_or_else(|| {
                    CompileError::unsupported(format!("The property '{name}' cannot be read"), trace)
                })?;
                let value = get(ctx, target, trace)?;
                match next {
                    None => Ok(Some(value)),
                    Some((op, rest)) => invoke_operation_token(ctx, value, op, rest),
                }
            }
        },
        Member::Method(method) => {
            let Some((args_tree, rest)) = rest.split_first() else {
                return Err(CompileError::syntax(
                    format!("Expected '(...)' after the method '{name}'"),
                    trace,
                ));
            };
            let args = expr::evaluate_arguments(ctx, args_tree)?;
            let result = method(ctx, target, &args, trace)?;
            match (rest.split_first(), result) {
                (None, result) => Ok(result),
                (Some((op, rest)), Some(value)) => invoke_operation_token(ctx, value, op, rest),
                (Some(_), None) => Err(CompileError::unsupported(
                    format!("The method '{name}' does not return a value"),
                    trace,
                )),
            }
        }
    }
}

/// Copy `source` into the existing variable `target`, using the source
/// type's copy behavior.
pub fn write_copy_to(
    ctx: &mut Context,
    source: VarId,
    target: VarId,
    out: &mut Vec<String>,
    trace: Trace,
) -> Result<(), CompileError> {
    let def = ctx.type_of(source)?;
    (def.copy_to)(ctx, source, target, out, trace)
}
