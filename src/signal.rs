//! Abort signaling
//!
//! A one-shot flag with registered abort algorithms. Aborting runs every
//! algorithm exactly once and clears the set; aborting again is a no-op.
//! Nothing is dispatched as an event; cancellation is cooperative and the
//! registered algorithms decide what "abort" means for their holder.

use crate::node::Dom;
use std::cell::Cell;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type AbortAlgorithm = Box<dyn FnOnce(&mut Dom)>;

#[derive(Default)]
struct SignalInner {
  aborted: Cell<bool>,
  algorithms: RefCell<Vec<AbortAlgorithm>>,
}

/// Shared handle to one abort flag. Clones observe the same state.
#[derive(Clone, Default)]
pub struct AbortSignal {
  inner: Rc<SignalInner>,
}

impl fmt::Debug for AbortSignal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AbortSignal")
      .field("aborted", &self.aborted())
      .field("algorithms", &self.inner.algorithms.borrow().len())
      .finish()
  }
}

impl AbortSignal {
  pub fn aborted(&self) -> bool {
    self.inner.aborted.get()
  }

  /// Register an algorithm to run on abort. Registration on an
  /// already-aborted signal is dropped; the caller checks [`aborted`] first
  /// when it needs to act immediately.
  ///
  /// [`aborted`]: AbortSignal::aborted
  pub fn add_algorithm(&self, algorithm: impl FnOnce(&mut Dom) + 'static) {
    if self.aborted() {
      return;
    }
    self.inner.algorithms.borrow_mut().push(Box::new(algorithm));
  }

  fn signal_abort(&self, dom: &mut Dom) {
    if self.inner.aborted.replace(true) {
      return;
    }
    let algorithms = std::mem::take(&mut *self.inner.algorithms.borrow_mut());
    log::debug!("abort signaled, running {} algorithm(s)", algorithms.len());
    for algorithm in algorithms {
      algorithm(dom);
    }
  }
}

/// Owner side of an [`AbortSignal`].
#[derive(Clone, Debug, Default)]
pub struct AbortController {
  signal: AbortSignal,
}

impl AbortController {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn signal(&self) -> AbortSignal {
    self.signal.clone()
  }

  /// Flip the signal and run its algorithms. Idempotent.
  pub fn abort(&self, dom: &mut Dom) {
    self.signal.signal_abort(dom);
  }
}
