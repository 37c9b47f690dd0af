//! Error types raised across the host/native boundary
//!
//! Every error is raised synchronously at the call site. The `Display` text is
//! the exact message the host sees, so the wording here is part of the
//! contract.

/// Result type for runtime operations
pub type BindResult<T> = Result<T, BindError>;

/// One rejected overload in an `OverloadResolutionFailure`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    /// Pretty-printed signature of the candidate
    pub signature: String,
    /// Why the candidate did not match
    pub reason: String,
}

fn render_candidates(candidates: &[CandidateFailure]) -> String {
    candidates
        .iter()
        .map(|c| format!("  {} [{}]", c.signature, c.reason))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runtime error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindError {
    /// A call reached a handle whose instance is gone
    #[error("Object of class {class} has been destroyed already (in {operation})")]
    UseAfterFree {
        /// Class of the detached handle
        class: String,
        /// Operation that was attempted
        operation: String,
    },

    /// An object argument of the wrong class
    #[error(
        "Unexpected object type (expected argument of class {expected}, got {actual}) for argument #{index} in {class}::{method}"
    )]
    TypeMismatch {
        /// Declared class of the parameter
        expected: String,
        /// Class (or value type) actually passed
        actual: String,
        /// 1-based argument index
        index: usize,
        /// Class owning the method
        class: String,
        /// Method name
        method: String,
    },

    /// No overload accepted the arguments
    #[error(
        "Can't match arguments. Variants are:\n{}\n in {class}::{method}",
        render_candidates(.candidates)
    )]
    OverloadResolutionFailure {
        /// Class owning the method
        class: String,
        /// Method name
        method: String,
        /// Every candidate with the reason it was rejected
        candidates: Vec<CandidateFailure>,
    },

    /// A mutating call through a const view
    #[error("Cannot call non-const method {class}::{method} through a const reference")]
    ConstViolation {
        /// Class owning the method
        class: String,
        /// Method name
        method: String,
    },

    /// A value that cannot become the required primitive or boxed type
    #[error("Cannot convert {actual} to {expected} for argument #{index} in {class}::{method}")]
    ConversionError {
        /// Declared parameter type
        expected: String,
        /// Type of the value passed
        actual: String,
        /// 1-based argument index
        index: usize,
        /// Class owning the method
        class: String,
        /// Method name
        method: String,
    },

    /// A value of the wrong type outside of argument binding
    #[error("Expected a value of type {expected}, got {actual}")]
    UnexpectedValue {
        /// Expected type name
        expected: String,
        /// Actual type name
        actual: String,
    },

    /// Method lookup failed on the class chain
    #[error("Undefined method {method} for class {class}")]
    NoSuchMethod {
        /// Class searched
        class: String,
        /// Method name
        method: String,
    },

    /// Event lookup failed on the class chain
    #[error("Undefined event {event} for class {class}")]
    NoSuchEvent {
        /// Class searched
        class: String,
        /// Event name
        event: String,
    },

    /// Class lookup failed
    #[error("Unknown class {0}")]
    NoSuchClass(String),

    /// Enum text that is neither a name nor a `#<N>` literal
    #[error("Invalid value '{text}' for enum {decl}")]
    UnknownEnumName {
        /// Enum declaration name
        decl: String,
        /// Text that failed to parse
        text: String,
    },

    /// A protected method called from outside a subclass override
    #[error("Protected method {class}::{method} can only be called from a subclass")]
    ProtectedAccess {
        /// Class owning the method
        class: String,
        /// Method name
        method: String,
    },

    /// A reference-kind result or argument was nil
    #[error("Null reference for {what} in {class}::{method}")]
    NullReference {
        /// What was nil ("return value", "argument #2", ...)
        what: String,
        /// Class owning the method
        class: String,
        /// Method name
        method: String,
    },

    /// An exception raised by host code (override, event handler or block)
    #[error("{0}")]
    Host(String),

    /// An error raised by native code
    #[error("{0}")]
    Native(String),
}

impl BindError {
    /// Create a host exception
    pub fn host(message: impl Into<String>) -> Self {
        BindError::Host(message.into())
    }

    /// Create a native error
    pub fn native(message: impl Into<String>) -> Self {
        BindError::Native(message.into())
    }

    /// Check if this is a use-after-free error
    pub fn is_use_after_free(&self) -> bool {
        matches!(self, BindError::UseAfterFree { .. })
    }
}

impl From<String> for BindError {
    fn from(s: String) -> Self {
        BindError::Native(s)
    }
}

impl From<&str> for BindError {
    fn from(s: &str) -> Self {
        BindError::Native(s.to_string())
    }
}
