//! Error types for fastdom
//!
//! Every fallible DOM operation fails with exactly one of the named error
//! kinds below. They are all synchronous and caller-correctable: nothing in
//! this crate retries internally, and nothing here wraps I/O.
//!
//! All errors use the `thiserror` crate for minimal boilerplate and proper
//! error trait implementations.

use thiserror::Error;

/// Result type alias for fastdom operations
///
/// # Examples
///
/// ```
/// use fastdom::Result;
///
/// fn build_tree() -> Result<()> {
///   Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, DomError>;

/// Closed set of DOM error kinds
///
/// These mirror the WHATWG `DOMException` names relevant to the tree core.
/// Each variant carries enough context to be actionable in a message without
/// holding references into the tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
  /// Illegal tree placement: wrong parent kind, cycle, or document
  /// cardinality violation.
  #[error("HierarchyRequestError: {0}")]
  HierarchyRequest(String),

  /// A reference node or attribute was not found where the caller claimed.
  #[error("NotFoundError: {0}")]
  NotFound(String),

  /// A name or qualified name failed XML `Name`/`QName` validation.
  #[error("InvalidCharacterError: invalid name '{name}'")]
  InvalidCharacter { name: String },

  /// Prefix/namespace combination is not allowed.
  #[error("NamespaceError: {0}")]
  Namespace(String),

  /// The object is in the wrong state for the operation, e.g. a traversal
  /// filter reentering its own traverser.
  #[error("InvalidStateError: {0}")]
  InvalidState(String),

  /// An offset is out of bounds for the node it addresses.
  #[error("IndexSizeError: offset {offset} is beyond length {length}")]
  IndexSize { offset: u32, length: u32 },

  /// A range operation mixed boundary points from different roots.
  #[error("WrongDocumentError: {0}")]
  WrongDocument(String),

  /// A boundary point addressed a node kind that cannot carry one.
  #[error("InvalidNodeTypeError: {0}")]
  InvalidNodeType(String),

  /// The branch is deliberately unimplemented (e.g. selector matching).
  #[error("NotSupportedError: {0}")]
  NotSupported(String),
}

impl DomError {
  /// Shorthand for the cycle/placement failure used throughout pre-insertion
  /// validation.
  pub(crate) fn hierarchy(msg: impl Into<String>) -> Self {
    DomError::HierarchyRequest(msg.into())
  }

  pub(crate) fn not_found(msg: impl Into<String>) -> Self {
    DomError::NotFound(msg.into())
  }
}
