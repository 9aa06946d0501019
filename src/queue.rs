//! Deferred task queue
//!
//! The only deferred work in the crate: mutation-observer delivery and
//! slot-change signaling. Both enqueue here, FIFO, behind a single "flush
//! pending" guard — scheduling while a flush is already pending is a no-op.
//! There is no implicit scheduler; the host calls [`Dom::drain_tasks`] at its
//! own checkpoint.

use crate::event::Event;
use crate::node::Dom;
use crate::node::NodeId;
use crate::observer::ObserverInner;
use std::rc::Rc;

#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
  flush_pending: bool,
  draining: bool,
  signaled_slots: Vec<NodeId>,
  pending_observers: Vec<Rc<ObserverInner>>,
}

impl TaskQueue {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn schedule_flush(&mut self) {
    if self.flush_pending {
      return;
    }
    self.flush_pending = true;
    log::trace!("flush scheduled");
  }

  pub fn flush_pending(&self) -> bool {
    self.flush_pending
  }

  /// Append a slot to the signal list unless it is already queued.
  pub fn signal_slot(&mut self, slot: NodeId) {
    if !self.signaled_slots.contains(&slot) {
      self.signaled_slots.push(slot);
    }
    self.schedule_flush();
  }

  pub fn enqueue_observer(&mut self, observer: Rc<ObserverInner>) {
    if !self
      .pending_observers
      .iter()
      .any(|pending| Rc::ptr_eq(pending, &observer))
    {
      self.pending_observers.push(observer);
    }
  }
}

impl Dom {
  /// Whether a flush has been scheduled and not yet drained.
  pub fn has_pending_tasks(&self) -> bool {
    self.queue.flush_pending()
  }

  /// Host checkpoint: fire `slotchange` events for signaled slots in FIFO
  /// order, then deliver queued records to every pending observer (one
  /// callback invocation per observer, with its whole batch).
  ///
  /// Callbacks may mutate the tree and thereby schedule another flush; that
  /// flush waits for the next drain. Calling `drain_tasks` from inside a
  /// callback is a no-op for the same reason.
  pub fn drain_tasks(&mut self) {
    if !self.queue.flush_pending() || self.queue.draining {
      return;
    }
    self.queue.draining = true;
    self.queue.flush_pending = false;

    let slots = std::mem::take(&mut self.queue.signaled_slots);
    for slot in slots {
      if !self.is_alive(slot) {
        continue;
      }
      log::debug!("firing slotchange at {:?}", slot);
      let mut event = Event::new("slotchange");
      event.bubbles = true;
      // Dispatch failures here would mean the slot vanished mid-drain;
      // treat like a removed listener and move on.
      let _ = self.dispatch_event(slot, &mut event);
    }

    let observers = std::mem::take(&mut self.queue.pending_observers);
    for observer in observers {
      // Transient registrations live only until the delivery after the
      // removal that created them.
      self.remove_transient_registrations(&observer);
      let records = std::mem::take(&mut *observer.records.borrow_mut());
      if records.is_empty() {
        continue;
      }
      log::debug!("delivering {} mutation record(s)", records.len());
      let mut callback = observer.callback.borrow_mut();
      callback(self, records);
    }
    self.queue.draining = false;
  }
}
