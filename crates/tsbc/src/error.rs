// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compilation errors.

use thiserror::Error;

use crate::ast::{Expression, NodeKind, Span, Statement};

/// Errors raised while compiling a module.
///
/// Every variant tied to source carries the [`NodeKind`] and [`Span`] of the
/// node that caused it. Compilation of the enclosing unit stops at the first
/// error; no partial artifact is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// An operand type is not valid for the operation.
    #[error("type error in {node} at {span}: {message}")]
    TypeError {
        /// The offending node kind
        node: NodeKind,
        /// Where it was written
        span: Span,
        /// What went wrong
        message: String,
    },

    /// An expression cannot be assigned, updated or deleted.
    #[error("invalid assignment target ({node}) at {span}: {message}")]
    InvalidLvalue {
        /// The offending node kind
        node: NodeKind,
        /// Where it was written
        span: Span,
        /// What went wrong
        message: String,
    },

    /// `break`/`continue` names a label that is not in scope.
    #[error("undefined label '{label}' at {span}")]
    UnresolvedLabel {
        /// The label as written (`<loop>` for an unlabeled jump)
        label: String,
        /// The break/continue statement kind
        node: NodeKind,
        /// Where it was written
        span: Span,
    },

    /// An identifier does not name a local, class or method.
    #[error("cannot find '{name}' at {span}")]
    UnknownIdentifier {
        /// The identifier
        name: String,
        /// The offending node kind
        node: NodeKind,
        /// Where it was written
        span: Span,
    },

    /// A construct the target machine has no lowering for.
    #[error("unsupported {node} at {span}: {message}")]
    Unsupported {
        /// The offending node kind
        node: NodeKind,
        /// Where it was written
        span: Span,
        /// What is missing
        message: String,
    },

    /// A method outgrew one of the configured limits.
    #[error("{what} limit of {limit} exceeded")]
    LimitExceeded {
        /// Which limit
        what: &'static str,
        /// The configured value
        limit: usize,
    },

    /// An invariant of the compiler itself was violated.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

impl CompileError {
    /// A type error at an expression.
    pub fn type_error(expr: &Expression, message: impl Into<String>) -> Self {
        CompileError::TypeError {
            node: expr.node_kind(),
            span: expr.span,
            message: message.into(),
        }
    }

    /// A type error at a statement.
    pub fn type_error_at(stmt: &Statement, message: impl Into<String>) -> Self {
        CompileError::TypeError {
            node: stmt.node_kind(),
            span: stmt.span,
            message: message.into(),
        }
    }

    /// An invalid assignment target.
    pub fn invalid_lvalue(expr: &Expression, message: impl Into<String>) -> Self {
        CompileError::InvalidLvalue {
            node: expr.node_kind(),
            span: expr.span,
            message: message.into(),
        }
    }

    /// An unsupported expression.
    pub fn unsupported(expr: &Expression, message: impl Into<String>) -> Self {
        CompileError::Unsupported {
            node: expr.node_kind(),
            span: expr.span,
            message: message.into(),
        }
    }

    /// An unknown identifier.
    pub fn unknown_identifier(expr: &Expression, name: &str) -> Self {
        CompileError::UnknownIdentifier {
            name: name.to_string(),
            node: expr.node_kind(),
            span: expr.span,
        }
    }

    /// The node kind this error points at, if it has one.
    pub fn node(&self) -> Option<NodeKind> {
        match self {
            CompileError::TypeError { node, .. }
            | CompileError::InvalidLvalue { node, .. }
            | CompileError::UnresolvedLabel { node, .. }
            | CompileError::UnknownIdentifier { node, .. }
            | CompileError::Unsupported { node, .. } => Some(*node),
            CompileError::LimitExceeded { .. } | CompileError::Internal(_) => None,
        }
    }

    /// The source span this error points at, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::TypeError { span, .. }
            | CompileError::InvalidLvalue { span, .. }
            | CompileError::UnresolvedLabel { span, .. }
            | CompileError::UnknownIdentifier { span, .. }
            | CompileError::Unsupported { span, .. } => Some(*span),
            CompileError::LimitExceeded { .. } | CompileError::Internal(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build;

    #[test]
    fn test_invalid_lvalue_display() {
        let err = CompileError::invalid_lvalue(&build::num("5"), "a literal cannot be updated");
        let msg = err.to_string();
        assert!(msg.contains("invalid assignment target"));
        assert!(msg.contains("number literal"));
        assert_eq!(err.node(), Some(NodeKind::NumberLiteral));
    }

    #[test]
    fn test_unresolved_label_display() {
        let err = CompileError::UnresolvedLabel {
            label: "outer".to_string(),
            node: NodeKind::Break,
            span: Span::new(4, 15),
        };
        assert_eq!(err.to_string(), "undefined label 'outer' at 4..15");
        assert_eq!(err.span(), Some(Span::new(4, 15)));
    }

    #[test]
    fn test_limit_has_no_location() {
        let err = CompileError::LimitExceeded {
            what: "constant pool",
            limit: 65535,
        };
        assert_eq!(err.span(), None);
        assert_eq!(err.to_string(), "constant pool limit of 65535 exceeded");
    }
}
