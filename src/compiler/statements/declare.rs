//! `[public|private] [static|const] type name [= value]`

use super::super::context::{Context, Declaration};
use super::super::error::CompileError;
use super::super::expr;
use super::super::variables::{invoke_operation, Access, Operation, Usage};
use super::super::wild::WildTree;

fn is_modifier(word: &str) -> bool {
    Access::from_keyword(word).is_some() || Usage::from_keyword(word).is_some()
}

/// A statement starting with modifiers, or with a type name followed by a
/// plain word.
pub fn is_declaration(ctx: &Context, items: &[WildTree]) -> bool {
    let modifiers = items
        .iter()
        .take_while(|item| item.word().is_some_and(is_modifier))
        .count();
    if modifiers > 0 {
        return true;
    }
    match (items.first().and_then(WildTree::word), items.get(1)) {
        (Some(type_name), Some(name)) => ctx.is_type(type_name) && name.is_leaf(),
        _ => false,
    }
}

pub fn write(ctx: &mut Context, items: &[WildTree]) -> Result<(), CompileError> {
    let trace = items.first().map(WildTree::trace).unwrap_or_default();
    let mut access = None;
    let mut usage = None;
    let mut rest = items;

    while let Some((first, tail)) = rest.split_first() {
        let Some(word) = first.word() else { break };
        if let Some(a) = Access::from_keyword(word) {
            if access.replace(a).is_some() {
                return Err(CompileError::syntax("Only one access modifier is allowed", first.trace()));
            }
        } else if let Some(u) = Usage::from_keyword(word) {
            if usage.replace(u).is_some() {
                return Err(CompileError::syntax("Only one usage modifier is allowed", first.trace()));
            }
        } else {
            break;
        }
        rest = tail;
    }

    let Some((type_tree, rest)) = rest.split_first() else {
        return Err(CompileError::syntax("Expected a type name after the modifiers", trace));
    };
    let type_token = type_tree.as_leaf()?;
    let def = ctx.type_def(&type_token.text, type_token.trace)?;

    let Some((name_tree, rest)) = rest.split_first() else {
        return Err(CompileError::syntax(
            format!("Expected a name after '{}'", def.name),
            type_token.trace,
        ));
    };
    let name_token = name_tree.as_leaf()?;

    // The initializer is evaluated before the name exists, so `int x = x`
    // refers to an outer `x`.
    let value = match rest.split_first() {
        None => None,
        Some((eq, value)) if eq.is_word("=") => Some(expr::evaluate_items(ctx, value, eq.trace())?),
        Some((other, _)) => {
            return Err(CompileError::syntax(
                format!(
                    "Expected '=' or '{}' after '{}', but got '{}'",
                    ctx.builder().separator(),
                    name_token.text,
                    other.to_text().trim()
                ),
                other.trace(),
            ))
        }
    };

    let usage = usage.unwrap_or(Usage::Default);
    let var = ctx.declare(&Declaration {
        type_name: def.name,
        access: access.unwrap_or(Access::Private),
        usage,
        name: &name_token.text,
        trace: name_token.trace,
    })?;
    log::trace!("declared {} in {:?}", ctx.var(var)?, ctx.current_scope());

    match value {
        Some(value) => invoke_operation(ctx, var, Operation::Set, value, trace).map(|_| ()),
        None if usage == Usage::Constant => Err(CompileError::syntax(
            format!("The constant '{}' must be given a value", name_token.text),
            name_token.trace,
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::compiler::context::Context;
    use crate::compiler::error::ErrorKind;
    use crate::compiler::statements::compile_entry;
    use crate::compiler::trace::SourceId;
    use crate::compiler::variables::{Usage, Value};
    use crate::config::CompilerConfig;

    fn compile(src: &str) -> Result<Context, crate::compiler::error::CompileError> {
        let mut ctx = Context::new(CompilerConfig::default(), SourceId(0));
        compile_entry(&mut ctx, src)?;
        Ok(ctx)
    }

    #[test]
    fn constants_fold_and_emit_nothing() {
        let ctx = compile("const int limit = 4 * 5;").unwrap();
        let limit = ctx.resolve_in(ctx.units()[0].scope, "limit").unwrap();
        let var = ctx.var(limit).unwrap();
        assert_eq!(var.usage, Usage::Constant);
        assert_eq!(var.value, Value::Int(20));
        assert!(ctx.emitted_lines().is_empty());
    }

    #[test]
    fn modifiers_are_checked() {
        let err = compile("public public int x;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        let err = compile("static string s = \"a\";").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidModifier);
        let err = compile("const int x;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn redeclaring_in_the_same_scope_fails() {
        let err = compile("int x; int x;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateName);
        assert!(compile("int x; { int x = 1; }").is_ok());
    }

    #[test]
    fn initializer_type_mismatch_is_cannot_cast() {
        let err = compile("int x = \"a\";").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CannotCast);
    }

    #[test]
    fn unexpected_word_after_the_name() {
        let err = compile("int x y;").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert!(err.message.contains("but got 'y'"), "{}", err.message);
    }
}
