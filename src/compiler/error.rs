use std::fmt;

use super::trace::Trace;

/// A compilation error with source location.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub trace: Trace,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MismatchedBracket,
    WrongVariant,
    Syntax,
    DuplicateName,
    InvalidName,
    UnknownName,
    InvalidModifier,
    UnknownMember,
    UnsupportedOperation,
    CannotCast,
    WrongArgumentCount,
    /// A compiler bug rather than a problem with the script.
    Internal,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::MismatchedBracket => "mismatched bracket",
            ErrorKind::WrongVariant => "wrong variant",
            ErrorKind::Syntax => "syntax",
            ErrorKind::DuplicateName => "duplicate name",
            ErrorKind::InvalidName => "invalid name",
            ErrorKind::UnknownName => "unknown name",
            ErrorKind::InvalidModifier => "invalid modifier",
            ErrorKind::UnknownMember => "unknown member",
            ErrorKind::UnsupportedOperation => "unsupported operation",
            ErrorKind::CannotCast => "cannot cast",
            ErrorKind::WrongArgumentCount => "wrong argument count",
            ErrorKind::Internal => "internal",
        }
    }
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, trace: Trace) -> Self {
        Self {
            message: message.into(),
            trace,
            kind,
        }
    }

    pub fn mismatched_bracket(expected: Option<char>, found: char, trace: Trace) -> Self {
        let message = match expected {
            Some(expected) => format!("Expected '{expected}', but got '{found}'"),
            None => format!("Unexpected '{found}' with no open bracket"),
        };
        Self::new(ErrorKind::MismatchedBracket, message, trace)
    }

    pub fn wrong_variant(message: impl Into<String>, trace: Trace) -> Self {
        Self::new(ErrorKind::WrongVariant, message, trace)
    }

    pub fn syntax(message: impl Into<String>, trace: Trace) -> Self {
        Self::new(ErrorKind::Syntax, message, trace)
    }

    pub fn duplicate_name(name: &str, scope: &str, trace: Trace) -> Self {
        Self::new(
            ErrorKind::DuplicateName,
            format!("Duplicate variable name '{name}' at scope '{scope}'"),
            trace,
        )
    }

    pub fn invalid_name(name: &str, reason: &str, trace: Trace) -> Self {
        Self::new(
            ErrorKind::InvalidName,
            format!("The name '{name}' is {reason}"),
            trace,
        )
    }

    pub fn unknown_name(name: &str, trace: Trace) -> Self {
        Self::new(ErrorKind::UnknownName, format!("Unknown name '{name}'"), trace)
    }

    pub fn invalid_modifier(modifier: impl fmt::Display, type_name: &str, trace: Trace) -> Self {
        Self::new(
            ErrorKind::InvalidModifier,
            format!("The modifier '{modifier}' is not valid for the type '{type_name}'"),
            trace,
        )
    }

    pub fn unknown_member(type_name: &str, member: &str, trace: Trace) -> Self {
        Self::new(
            ErrorKind::UnknownMember,
            format!("Type '{type_name}' has no member '{member}'"),
            trace,
        )
    }

    pub fn unsupported(message: impl Into<String>, trace: Trace) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, message, trace)
    }

    pub fn cannot_cast(value: &str, to: &str, trace: Trace) -> Self {
        Self::new(
            ErrorKind::CannotCast,
            format!("Cannot cast '{value}' to type '{to}'"),
            trace,
        )
    }

    pub fn wrong_argument_count(what: &str, expected: &str, found: usize, trace: Trace) -> Self {
        Self::new(
            ErrorKind::WrongArgumentCount,
            format!("'{what}' expects {expected} argument(s), but {found} were provided"),
            trace,
        )
    }

    pub fn internal(message: impl Into<String>, trace: Trace) -> Self {
        Self::new(ErrorKind::Internal, message, trace)
    }

    pub fn is_internal(&self) -> bool {
        self.kind == ErrorKind::Internal
    }

    /// Format the error with its location, e.g. `[syntax] 0:3:7: Expected ';'`.
    pub fn format_with_source(&self, source_name: &str) -> String {
        format!(
            "[{}] {}:{}:{}: {}",
            self.kind.label(),
            source_name,
            self.trace.line,
            self.trace.column,
            self.message,
        )
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.label(), self.trace, self.message)
    }
}

impl std::error::Error for CompileError {}
