//! Event dispatch
//!
//! Synchronous dispatch with a shadow-aware propagation path: ordinary nodes
//! climb to their tree parent, slotted nodes hop to their assigned slot, and
//! shadow roots continue at their host only for composed events. Targets are
//! retargeted at every shadow boundary so listeners outside a shadow tree
//! never see nodes inside it.
//!
//! Listener callbacks may mutate the tree. A callback error is reported and
//! swallowed so the remaining listeners still observe the event; this is the
//! one place the crate intentionally drops an error.

use crate::error::Result;
use crate::node::Dom;
use crate::node::NodeData;
use crate::node::NodeId;
use crate::node::ShadowRootMode;
use crate::signal::AbortSignal;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

pub type ListenerCallback = dyn Fn(&mut Dom, &mut Event) -> Result<()>;
pub type ActivationCallback = dyn Fn(&mut Dom, NodeId, &Event);

/// Per-element activation hook, run at most once per dispatch.
#[derive(Clone)]
pub struct ActivationBehavior {
  pub(crate) activate: Rc<ActivationCallback>,
  /// Run instead of `activate` when the event was canceled.
  pub(crate) legacy_canceled: Option<Rc<ActivationCallback>>,
}

impl fmt::Debug for ActivationBehavior {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActivationBehavior")
      .field("legacy_canceled", &self.legacy_canceled.is_some())
      .finish()
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventPhase {
  None,
  Capturing,
  AtTarget,
  Bubbling,
}

/// A registered listener. Shared between the node's list and any
/// [`ListenerHandle`]s; the removed flag keeps snapshots honest when a
/// listener is unregistered mid-dispatch.
pub(crate) struct ListenerEntry {
  pub event_type: String,
  pub capture: bool,
  pub once: bool,
  pub passive: bool,
  pub callback: Box<ListenerCallback>,
  pub removed: Cell<bool>,
}

impl fmt::Debug for ListenerEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ListenerEntry")
      .field("event_type", &self.event_type)
      .field("capture", &self.capture)
      .field("once", &self.once)
      .field("passive", &self.passive)
      .field("removed", &self.removed.get())
      .finish()
  }
}

/// Identifies a registered listener for removal.
#[derive(Clone, Debug)]
pub struct ListenerHandle {
  entry: Rc<ListenerEntry>,
  node: NodeId,
}

#[derive(Clone, Default)]
pub struct ListenerOptions {
  pub capture: bool,
  pub once: bool,
  pub passive: bool,
  /// Aborting this signal unregisters the listener.
  pub signal: Option<AbortSignal>,
}

impl ListenerOptions {
  pub fn capture() -> Self {
    Self {
      capture: true,
      ..Self::default()
    }
  }

  pub fn once() -> Self {
    Self {
      once: true,
      ..Self::default()
    }
  }
}

/// One hop of the propagation path as visible to `composed_path`.
#[derive(Clone, Copy, Debug)]
struct PathSlot {
  node: NodeId,
  root_of_closed_tree: bool,
  slot_in_closed_tree: bool,
}

/// An event being dispatched. Construction is cheap; state fields reset
/// after every dispatch so the same event value can be dispatched again.
#[derive(Debug)]
pub struct Event {
  pub event_type: String,
  pub bubbles: bool,
  pub cancelable: bool,
  pub composed: bool,
  target: Option<NodeId>,
  related_target: Option<NodeId>,
  current_target: Option<NodeId>,
  phase: EventPhase,
  stop_propagation: bool,
  stop_immediate: bool,
  canceled: bool,
  in_passive_listener: bool,
  dispatching: bool,
  path: Vec<PathSlot>,
}

impl Event {
  pub fn new(event_type: &str) -> Self {
    Self {
      event_type: event_type.to_string(),
      bubbles: false,
      cancelable: false,
      composed: false,
      target: None,
      related_target: None,
      current_target: None,
      phase: EventPhase::None,
      stop_propagation: false,
      stop_immediate: false,
      canceled: false,
      in_passive_listener: false,
      dispatching: false,
      path: Vec::new(),
    }
  }

  pub fn bubbling(event_type: &str) -> Self {
    let mut event = Self::new(event_type);
    event.bubbles = true;
    event
  }

  pub fn target(&self) -> Option<NodeId> {
    self.target
  }

  pub fn related_target(&self) -> Option<NodeId> {
    self.related_target
  }

  pub fn set_related_target(&mut self, node: Option<NodeId>) {
    self.related_target = node;
  }

  pub fn current_target(&self) -> Option<NodeId> {
    self.current_target
  }

  pub fn event_phase(&self) -> EventPhase {
    self.phase
  }

  pub fn stop_propagation(&mut self) {
    self.stop_propagation = true;
  }

  pub fn stop_immediate_propagation(&mut self) {
    self.stop_propagation = true;
    self.stop_immediate = true;
  }

  /// No effect for non-cancelable events or inside a passive listener.
  pub fn prevent_default(&mut self) {
    if self.cancelable && !self.in_passive_listener {
      self.canceled = true;
    } else if self.in_passive_listener {
      log::warn!(
        "preventDefault ignored inside passive listener for {:?}",
        self.event_type
      );
    }
  }

  pub fn default_prevented(&self) -> bool {
    self.canceled
  }

  /// `composedPath()`: the propagation path visible from the current
  /// target, with closed shadow trees hidden. Empty outside dispatch.
  pub fn composed_path(&self) -> Vec<NodeId> {
    let mut composed = Vec::new();
    if self.path.is_empty() {
      return composed;
    }
    let current = match self.current_target {
      Some(current) => current,
      None => return composed,
    };
    composed.push(current);

    let mut current_index = 0;
    let mut current_hidden = 0i32;
    for index in (0..self.path.len()).rev() {
      let slot = self.path[index];
      if slot.root_of_closed_tree {
        current_hidden += 1;
      }
      if slot.node == current {
        current_index = index;
        break;
      }
      if slot.slot_in_closed_tree {
        current_hidden -= 1;
      }
    }

    let mut hidden = current_hidden;
    let mut max_hidden = current_hidden;
    for index in (0..current_index).rev() {
      let slot = self.path[index];
      if slot.root_of_closed_tree {
        hidden += 1;
      }
      if hidden <= max_hidden {
        composed.insert(0, slot.node);
      }
      if slot.slot_in_closed_tree {
        hidden -= 1;
        if hidden < max_hidden {
          max_hidden = hidden;
        }
      }
    }

    hidden = current_hidden;
    max_hidden = current_hidden;
    for slot in &self.path[current_index + 1..] {
      if slot.slot_in_closed_tree {
        hidden += 1;
      }
      if hidden <= max_hidden {
        composed.push(slot.node);
      }
      if slot.root_of_closed_tree {
        hidden -= 1;
        if hidden < max_hidden {
          max_hidden = hidden;
        }
      }
    }
    composed
  }
}

/// One hop of the propagation path.
#[derive(Debug)]
struct PathEntry {
  node: NodeId,
  /// Set where a shadow boundary was crossed; the visible target from this
  /// entry outward.
  shadow_adjusted_target: Option<NodeId>,
  related_target: Option<NodeId>,
  slot_in_closed_tree: bool,
  root_of_closed_tree: bool,
}

enum PhaseHalf {
  Capture,
  Bubble,
}

impl Dom {
  // -- listener registration -----------------------------------------------

  /// `addEventListener`. Returns the handle used to unregister; a handle
  /// for an already-aborted signal is inert.
  pub fn add_event_listener(
    &mut self,
    node: NodeId,
    event_type: &str,
    options: ListenerOptions,
    callback: impl Fn(&mut Dom, &mut Event) -> Result<()> + 'static,
  ) -> ListenerHandle {
    let entry = Rc::new(ListenerEntry {
      event_type: event_type.to_string(),
      capture: options.capture,
      once: options.once,
      passive: options.passive,
      callback: Box::new(callback),
      removed: Cell::new(false),
    });
    let handle = ListenerHandle {
      entry: Rc::clone(&entry),
      node,
    };
    if let Some(signal) = &options.signal {
      if signal.aborted() {
        entry.removed.set(true);
        return handle;
      }
      let abort_handle = handle.clone();
      signal.add_algorithm(move |dom: &mut Dom| {
        dom.remove_event_listener(&abort_handle);
      });
    }
    self.node_mut(node).listeners.push(entry);
    handle
  }

  /// `removeEventListener`. Safe to call during dispatch; the listener will
  /// not run again.
  pub fn remove_event_listener(&mut self, handle: &ListenerHandle) {
    handle.entry.removed.set(true);
    if self.is_alive(handle.node) {
      self
        .node_mut(handle.node)
        .listeners
        .retain(|listener| !Rc::ptr_eq(listener, &handle.entry));
    }
  }

  /// Install the activation hook for an element; `legacy_canceled` runs
  /// instead when the dispatched event was canceled.
  pub fn set_activation_behavior(
    &mut self,
    element: NodeId,
    activate: impl Fn(&mut Dom, NodeId, &Event) + 'static,
    legacy_canceled: Option<Rc<ActivationCallback>>,
  ) {
    if let Some(el) = self.as_element_mut(element) {
      el.activation = Some(ActivationBehavior {
        activate: Rc::new(activate),
        legacy_canceled,
      });
    }
  }

  // -- dispatch ------------------------------------------------------------

  /// `dispatchEvent`. Returns `Ok(false)` when a listener canceled the
  /// event.
  pub fn dispatch_event(&mut self, target: NodeId, event: &mut Event) -> Result<bool> {
    if event.dispatching {
      return Err(crate::error::DomError::InvalidState(
        "event is already being dispatched".to_string(),
      ));
    }
    event.dispatching = true;
    let original_related = event.related_target;

    let (path, activation_target) = self.build_path(target, event);
    event.path = path
      .iter()
      .map(|entry| PathSlot {
        node: entry.node,
        root_of_closed_tree: entry.root_of_closed_tree,
        slot_in_closed_tree: entry.slot_in_closed_tree,
      })
      .collect();

    // Effective target per entry: the nearest retargeted target at or
    // before it (toward the dispatch target).
    let mut effective_targets = Vec::with_capacity(path.len());
    let mut last_target = target;
    for entry in &path {
      if let Some(adjusted) = entry.shadow_adjusted_target {
        last_target = adjusted;
      }
      effective_targets.push(last_target);
    }

    for index in (0..path.len()).rev() {
      if event.stop_propagation {
        break;
      }
      let at_target = path[index].shadow_adjusted_target.is_some();
      event.phase = if at_target {
        EventPhase::AtTarget
      } else {
        EventPhase::Capturing
      };
      self.invoke(&path, &effective_targets, index, event, PhaseHalf::Capture);
    }
    for index in 0..path.len() {
      if event.stop_propagation {
        break;
      }
      let at_target = path[index].shadow_adjusted_target.is_some();
      if !at_target && !event.bubbles {
        continue;
      }
      event.phase = if at_target {
        EventPhase::AtTarget
      } else {
        EventPhase::Bubbling
      };
      self.invoke(&path, &effective_targets, index, event, PhaseHalf::Bubble);
    }

    // A target inside a shadow tree must not outlive the dispatch.
    let clear_targets = std::iter::once(Some(target))
      .chain(std::iter::once(original_related))
      .flatten()
      .any(|node| self.is_shadow_root(self.root(node)));

    event.phase = EventPhase::None;
    event.current_target = None;
    event.path.clear();
    event.dispatching = false;
    event.stop_propagation = false;
    event.stop_immediate = false;
    event.target = if clear_targets { None } else { Some(target) };
    event.related_target = if clear_targets { None } else { original_related };

    if let Some(activation_target) = activation_target {
      let behavior = self
        .as_element(activation_target)
        .and_then(|el| el.activation.clone());
      if let Some(behavior) = behavior {
        if event.canceled {
          if let Some(legacy) = behavior.legacy_canceled {
            legacy(self, activation_target, event);
          }
        } else {
          (behavior.activate)(self, activation_target, event);
        }
      }
    }

    Ok(!event.canceled)
  }

  /// Walk from the target outward, appending one entry per hop and
  /// retargeting whenever the walk leaves a shadow tree.
  fn build_path(&self, target: NodeId, event: &Event) -> (Vec<PathEntry>, Option<NodeId>) {
    let is_activation_event = event.event_type == "click";
    let has_activation =
      |node: NodeId| self.as_element(node).is_some_and(|el| el.activation.is_some());

    let mut path = Vec::new();
    let mut activation_target = if is_activation_event && has_activation(target) {
      Some(target)
    } else {
      None
    };
    path.push(PathEntry {
      node: target,
      shadow_adjusted_target: Some(target),
      related_target: event
        .related_target
        .map(|related| self.retarget(related, target)),
      slot_in_closed_tree: false,
      root_of_closed_tree: false,
    });

    let mut visible_target = target;
    let mut slotable = if self.raw_assigned_slot(target).is_some() {
      Some(target)
    } else {
      None
    };
    let mut slot_in_closed_tree = false;
    let mut parent = self.event_parent(target, event, target);
    while let Some(node) = parent {
      if slotable.is_some() {
        debug_assert!(self.is_slot(node), "assigned slotable must climb to its slot");
        slotable = None;
        let slot_root = self.root(node);
        if self
          .as_shadow_root(slot_root)
          .is_some_and(|sr| sr.mode == ShadowRootMode::Closed)
        {
          slot_in_closed_tree = true;
        }
      }
      if self.raw_assigned_slot(node).is_some() {
        slotable = Some(node);
      }
      let related = event
        .related_target
        .map(|related| self.retarget(related, node));
      let root_of_closed_tree = self
        .as_shadow_root(node)
        .is_some_and(|sr| sr.mode == ShadowRootMode::Closed);

      let inside_target_tree =
        self.is_shadow_including_inclusive_ancestor(self.root(visible_target), node);
      let shadow_adjusted = if inside_target_tree {
        None
      } else {
        // Crossed out of a shadow tree; everything from here up sees the
        // host side.
        visible_target = node;
        Some(node)
      };
      if activation_target.is_none() && is_activation_event && has_activation(node) {
        activation_target = Some(node);
      }
      path.push(PathEntry {
        node,
        shadow_adjusted_target: shadow_adjusted,
        related_target: related,
        slot_in_closed_tree,
        root_of_closed_tree,
      });
      slot_in_closed_tree = false;
      parent = self.event_parent(node, event, target);
    }
    (path, activation_target)
  }

  /// "Get the parent" for event propagation.
  fn event_parent(&self, node: NodeId, event: &Event, original_target: NodeId) -> Option<NodeId> {
    match &self.node(node).data {
      NodeData::ShadowRoot(sr) => {
        if !event.composed && node == self.root(original_target) {
          None
        } else {
          Some(sr.host)
        }
      }
      _ => match self.raw_assigned_slot(node) {
        Some(slot) => Some(slot),
        None => self.parent(node),
      },
    }
  }

  fn invoke(
    &mut self,
    path: &[PathEntry],
    effective_targets: &[NodeId],
    index: usize,
    event: &mut Event,
    half: PhaseHalf,
  ) {
    let entry = &path[index];
    event.target = Some(effective_targets[index]);
    event.related_target = entry.related_target;
    event.current_target = Some(entry.node);
    let node = entry.node;

    // Snapshot: listeners added by a handler mid-dispatch must not run for
    // this event.
    let snapshot: Vec<Rc<ListenerEntry>> = self.node(node).listeners.clone();
    for listener in snapshot {
      if event.stop_immediate {
        break;
      }
      if listener.removed.get() || listener.event_type != event.event_type {
        continue;
      }
      let wanted = match half {
        PhaseHalf::Capture => listener.capture,
        PhaseHalf::Bubble => !listener.capture,
      };
      if !wanted {
        continue;
      }
      if listener.once {
        listener.removed.set(true);
        self
          .node_mut(node)
          .listeners
          .retain(|l| !Rc::ptr_eq(l, &listener));
      }
      event.in_passive_listener = listener.passive;
      if let Err(error) = (listener.callback)(self, event) {
        // Reported, not propagated: sibling listeners still run.
        log::error!(
          "listener for {:?} on {:?} failed: {}",
          event.event_type,
          node,
          error
        );
      }
      event.in_passive_listener = false;
    }
  }
}
