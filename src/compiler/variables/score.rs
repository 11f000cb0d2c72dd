//! Scoreboard-backed storage shared by `int` and `bool`.

use super::super::context::Context;
use super::super::error::CompileError;
use super::super::trace::Trace;
use super::boolean::BOOL;
use super::{Operation, Register, Usage, Value, VarId};

/// A score value as the commands see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Constant(i32),
    Resident(Register),
}

pub fn operand(ctx: &Context, id: VarId, trace: Trace) -> Result<Operand, CompileError> {
    let var = ctx.var(id)?;
    match &var.value {
        Value::Int(v) => Ok(Operand::Constant(*v)),
        Value::Register(register) => Ok(Operand::Resident(register.clone())),
        Value::Unset => Err(CompileError::syntax(
            format!("The variable '{}' is used before it is assigned", var.name),
            trace,
        )),
        other => Err(CompileError::internal(
            format!("'{var}' holds a non-score value {other:?}"),
            trace,
        )),
    }
}

/// Constants stay unbound until assigned; everything else gets a register
/// named after its scope path.
pub fn initialize(ctx: &mut Context, id: VarId) -> Result<(), CompileError> {
    let var = ctx.var(id)?;
    if var.usage == Usage::Constant {
        return Ok(());
    }
    let register = ctx.register_for(var.scope, &var.name)?;
    ctx.var_mut(id)?.value = Value::Register(register);
    Ok(())
}

/// Store `source` into `target`: bind a constant, or emit a set/copy
/// command into `out` for a resident target.
pub fn store(ctx: &mut Context, source: Operand, target: VarId, out: &mut Vec<String>, trace: Trace) -> Result<(), CompileError> {
    let var = ctx.var(target)?;
    let is_bool = var.type_name == BOOL;
    let (usage, name, describe, current) = (var.usage, var.name.clone(), var.to_string(), var.value.clone());
    let source = match source {
        Operand::Constant(v) if is_bool => Operand::Constant(i32::from(v != 0)),
        other => other,
    };
    match (current, source) {
        (Value::Register(to), Operand::Constant(v)) => {
            out.push(format!("scoreboard players set {to} {v}"));
            Ok(())
        }
        (Value::Register(to), Operand::Resident(from)) => {
            if to != from {
                out.push(format!("scoreboard players operation {to} = {from}"));
            }
            Ok(())
        }
        (Value::Unset, Operand::Constant(v)) => {
            ctx.var_mut(target)?.value = Value::Int(v);
            Ok(())
        }
        (Value::Unset, Operand::Resident(_)) if usage == Usage::Constant => Err(CompileError::unsupported(
            format!("The constant '{name}' cannot hold a value only known at run time"),
            trace,
        )),
        (Value::Unset, Operand::Resident(from)) => {
            ctx.var_mut(target)?.value = Value::Register(from);
            Ok(())
        }
        (Value::Int(_), _) => Err(CompileError::unsupported(
            format!("The constant '{name}' is already assigned"),
            trace,
        )),
        (other, _) => Err(CompileError::internal(
            format!("'{describe}' holds a non-score value {other:?}"),
            trace,
        )),
    }
}

/// Register `lines` as per-activation output of the current scope.
pub fn emit(ctx: &mut Context, lines: Vec<String>) -> Result<(), CompileError> {
    if lines.is_empty() {
        return Ok(());
    }
    ctx.emit_lines(lines)
}

// ── Comparison ───────────────────────────────────────────────────

/// Lower a comparison into a fresh boolean temporary: set it to 0, then
/// conditionally to 1. Two constants fold to a constant.
pub fn compare(ctx: &mut Context, left: Operand, op: Operation, right: Operand, trace: Trace) -> Result<VarId, CompileError> {
    let (left, op, right) = match (left, right) {
        (Operand::Constant(a), Operand::Constant(b)) => {
            let holds = constant_predicate(a, op, b, trace)?;
            return ctx.constant_bool(holds, trace);
        }
        (Operand::Constant(c), Operand::Resident(r)) => (r, flip(op, trace)?, Operand::Constant(c)),
        (Operand::Resident(r), right) => (r, op, right),
    };

    let result = ctx.temporary(BOOL, trace)?;
    let Some(target) = ctx.var(result)?.value.register().cloned() else {
        return Err(CompileError::internal("A boolean temporary has no register", trace));
    };
    let set_true = format!("run scoreboard players set {target} 1");
    let mut lines = vec![format!("scoreboard players set {target} 0")];

    match right {
        Operand::Resident(other) => {
            let line = match op {
                Operation::NotEqual => format!("execute unless score {left} = {other} {set_true}"),
                _ => format!("execute if score {left} {} {other} {set_true}", score_symbol(op, trace)?),
            };
            lines.push(line);
        }
        Operand::Constant(c) => match op {
            Operation::NotEqual => lines.push(format!("execute unless score {left} matches {c} {set_true}")),
            _ => {
                if let Some(range) = matches_range(op, c, trace)? {
                    lines.push(format!("execute if score {left} matches {range} {set_true}"));
                }
            }
        },
    }
    emit(ctx, lines)?;
    Ok(result)
}

fn constant_predicate(a: i32, op: Operation, b: i32, trace: Trace) -> Result<bool, CompileError> {
    Ok(match op {
        Operation::GreaterThan => a > b,
        Operation::GreaterThanOrEqual => a >= b,
        Operation::Equal => a == b,
        Operation::NotEqual => a != b,
        Operation::LessThan => a < b,
        Operation::LessThanOrEqual => a <= b,
        other => return Err(CompileError::internal(format!("'{other}' is not a comparison"), trace)),
    })
}

/// `c OP x` rewritten as `x OP' c`.
fn flip(op: Operation, trace: Trace) -> Result<Operation, CompileError> {
    Ok(match op {
        Operation::GreaterThan => Operation::LessThan,
        Operation::GreaterThanOrEqual => Operation::LessThanOrEqual,
        Operation::LessThan => Operation::GreaterThan,
        Operation::LessThanOrEqual => Operation::GreaterThanOrEqual,
        Operation::Equal | Operation::NotEqual => op,
        other => return Err(CompileError::internal(format!("'{other}' is not a comparison"), trace)),
    })
}

fn score_symbol(op: Operation, trace: Trace) -> Result<&'static str, CompileError> {
    Ok(match op {
        Operation::GreaterThan => ">",
        Operation::GreaterThanOrEqual => ">=",
        Operation::Equal => "=",
        Operation::LessThan => "<",
        Operation::LessThanOrEqual => "<=",
        other => return Err(CompileError::internal(format!("'{other}' has no score comparison"), trace)),
    })
}

/// The `matches` range for `x OP c`; `None` when no score can satisfy it.
fn matches_range(op: Operation, c: i32, trace: Trace) -> Result<Option<String>, CompileError> {
    Ok(match op {
        Operation::GreaterThan => c.checked_add(1).map(|low| format!("{low}..")),
        Operation::GreaterThanOrEqual => Some(format!("{c}..")),
        Operation::Equal => Some(c.to_string()),
        Operation::LessThan => c.checked_sub(1).map(|high| format!("..{high}")),
        Operation::LessThanOrEqual => Some(format!("..{c}")),
        other => return Err(CompileError::internal(format!("'{other}' has no score range"), trace)),
    })
}

// ── Scoreboard arithmetic ────────────────────────────────────────

/// Division as the scoreboard performs it: rounding toward negative infinity.
pub fn floor_div(a: i32, b: i32) -> Option<i32> {
    let q = a.checked_div(b)?;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

/// Remainder with the sign of the divisor, matching [`floor_div`].
pub fn floor_mod(a: i32, b: i32) -> Option<i32> {
    let q = floor_div(a, b)?;
    Some(a.wrapping_sub(q.wrapping_mul(b)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn floor_division_rounds_down() {
        assert_eq!(floor_div(7, 2), Some(3));
        assert_eq!(floor_div(-7, 2), Some(-4));
        assert_eq!(floor_div(7, -2), Some(-4));
        assert_eq!(floor_div(-8, 2), Some(-4));
        assert_eq!(floor_div(1, 0), None);
        assert_eq!(floor_mod(-7, 2), Some(1));
        assert_eq!(floor_mod(7, -2), Some(-1));
    }

    #[test]
    fn ranges_for_constant_comparisons() {
        let t = Trace::default();
        assert_eq!(matches_range(Operation::GreaterThan, 0, t).unwrap().unwrap(), "1..");
        assert_eq!(matches_range(Operation::LessThan, 0, t).unwrap().unwrap(), "..-1");
        assert_eq!(matches_range(Operation::GreaterThan, i32::MAX, t).unwrap(), None);
        assert_eq!(flip(Operation::GreaterThan, t).unwrap(), Operation::LessThan);
    }
}
