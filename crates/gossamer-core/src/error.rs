#![forbid(unsafe_code)]

//! Error taxonomy shared by every Gossamer crate.
//!
//! # Failure Modes
//!
//! | Error | Cause |
//! |-------|-------|
//! | `MissingMember` | Named property/field/method/event/indexer absent, unreadable, unwritable, or with the wrong return contract |
//! | `ArgumentNull` | A null value passed where an object identity is required |
//! | `ArgumentInvalid` | Wrong object type for a descriptor, out-of-range write, or malformed argument |
//! | `NotSupported` | Registry kind mismatch, unsupported container, non-enumerable collection endpoint |
//! | `TypeMismatch` | A value cannot be coerced to the declared member kind |
//! | `Cleared` | Configuration call on a binding that has already been cleared |
//!
//! A dead weak reference is never an error; reads through it yield the
//! declared default and writes are dropped.

use thiserror::Error;

use crate::value::ValueKind;

/// Errors raised by member access and binding operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    /// The named member does not exist on the runtime type (or cannot be used
    /// the way it was requested).
    #[error("missing member '{member}' on type '{type_name}'")]
    MissingMember { type_name: String, member: String },
    /// A required object argument was null.
    #[error("argument '{0}' must not be null")]
    ArgumentNull(&'static str),
    /// An argument was present but unusable.
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),
    /// The requested operation is not supported for this combination.
    #[error("not supported: {0}")]
    NotSupported(String),
    /// A value could not be coerced to the declared kind.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValueKind, found: ValueKind },
    /// The binding was cleared and can no longer be configured.
    #[error("binding has been cleared")]
    Cleared,
}

impl BindError {
    /// Shorthand for [`BindError::MissingMember`].
    pub fn missing(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::MissingMember {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    #[must_use]
    pub fn is_missing_member(&self) -> bool {
        matches!(self, Self::MissingMember { .. })
    }

    #[must_use]
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}

/// Result alias used across Gossamer.
pub type Result<T> = std::result::Result<T, BindError>;
