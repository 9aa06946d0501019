//! An in-memory, mutable document tree with WHATWG DOM semantics.
//!
//! Nodes live in a generational arena owned by a single [`Dom`]; handles are
//! copyable [`NodeId`]s and every operation is a method on the `Dom`. The
//! crate covers the tree core: validated mutation, namespaces and
//! attributes, live ranges and iterators kept consistent across mutation,
//! shadow trees with named slot assignment, mutation observers with deferred
//! delivery, and synchronous event dispatch with shadow retargeting.
//!
//! There is no implicit event loop: observer delivery and slotchange events
//! queue up until the host calls [`Dom::drain_tasks`].

pub mod arena;
pub mod attr;
pub mod character_data;
pub mod collections;
pub mod error;
pub mod event;
pub mod mutation;
pub mod name;
pub mod node;
pub mod observer;
pub mod queue;
pub mod range;
pub mod shadow;
pub mod signal;
pub mod traversal;
pub mod tree;

pub use collections::{ChildNodes, ElementCollection};
pub use error::{DomError, Result};
pub use event::{Event, EventPhase, ListenerHandle, ListenerOptions};
pub use name::{QualifiedName, HTML_NAMESPACE, SVG_NAMESPACE, XMLNS_NAMESPACE, XML_NAMESPACE};
pub use node::{Dom, IteratorId, NodeId, NodeType, RangeId, ShadowRootMode};
pub use observer::{MutationObserver, MutationRecord, MutationRecordType, ObserverOptions};
pub use range::{BoundaryComparison, StaticRange};
pub use shadow::ShadowRootInit;
pub use signal::{AbortController, AbortSignal};
pub use traversal::{FilterDecision, TreeWalker, SHOW_ALL, SHOW_ELEMENT, SHOW_TEXT};
