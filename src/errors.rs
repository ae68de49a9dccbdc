//! Umbrella error type for everything the execution engine raises, per
//! SPEC_FULL.md §7. Each submodule keeps its own `thiserror`-derived error
//! enum for the errors specific to it, and converts into `EngineError` at
//! the module boundary the way the teacher's per-module `errors.rs` files
//! convert into `QueryPlannerError`.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ParseError,
    UnresolvedReference,
    InvalidFilterPlacement,
    TypeMismatch,
    OutOfMemory,
    Timeout,
    ProcedureError,
    IndexError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::UnresolvedReference => "UnresolvedReference",
            ErrorKind::InvalidFilterPlacement => "InvalidFilterPlacement",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::OutOfMemory => "OutOfMemory",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::ProcedureError => "ProcedureError",
            ErrorKind::IndexError => "IndexError",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn unresolved_reference(alias: &str) -> Self {
        Self::new(ErrorKind::UnresolvedReference, format!("alias '{alias}' is not bound in this plan"))
    }

    pub fn invalid_filter_placement(aliases: &[String]) -> Self {
        Self::new(
            ErrorKind::InvalidFilterPlacement,
            format!("no operator in the plan resolves all of: {}", aliases.join(", ")),
        )
    }

    pub fn type_mismatch(expected: &str, got: &str) -> Self {
        Self::new(ErrorKind::TypeMismatch, format!("expected {expected}, got {got}"))
    }

    pub fn procedure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProcedureError, message)
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IndexError, message)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "query exceeded its time budget")
    }
}

impl From<crate::cypher_parser::ParseError> for EngineError {
    fn from(e: crate::cypher_parser::ParseError) -> Self {
        EngineError::new(ErrorKind::ParseError, e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
