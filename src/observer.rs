//! Mutation observers
//!
//! Observers register on nodes with a set of options; the mutating engine
//! calls [`Dom::queue_mutation_record`] with the raw change description, and
//! this module resolves the interested observers (walking inclusive
//! ancestors, applying the type-specific gates), batches exactly one record
//! per interested observer, and schedules a deferred delivery via the task
//! queue. Delivery itself happens when the host drains the queue.

use crate::error::DomError;
use crate::error::Result;
use crate::node::Dom;
use crate::node::NodeId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationRecordType {
  Attributes,
  CharacterData,
  ChildList,
}

/// One observed change. Node references are handles; the host is expected to
/// consume records before collecting garbage if it wants to inspect removed
/// subtrees.
#[derive(Debug, Clone)]
pub struct MutationRecord {
  pub record_type: MutationRecordType,
  pub target: NodeId,
  pub added_nodes: Vec<NodeId>,
  pub removed_nodes: Vec<NodeId>,
  pub previous_sibling: Option<NodeId>,
  pub next_sibling: Option<NodeId>,
  pub attribute_name: Option<String>,
  pub attribute_namespace: Option<String>,
  pub old_value: Option<String>,
}

/// What a registration is interested in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverOptions {
  pub child_list: bool,
  pub attributes: bool,
  pub character_data: bool,
  pub subtree: bool,
  pub attribute_old_value: bool,
  pub character_data_old_value: bool,
  pub attribute_filter: Option<Vec<String>>,
}

impl ObserverOptions {
  pub fn child_list() -> Self {
    Self {
      child_list: true,
      ..Self::default()
    }
  }

  pub fn subtree_child_list() -> Self {
    Self {
      child_list: true,
      subtree: true,
      ..Self::default()
    }
  }
}

pub(crate) type ObserverCallback = dyn FnMut(&mut Dom, Vec<MutationRecord>);

pub(crate) struct ObserverInner {
  pub records: RefCell<Vec<MutationRecord>>,
  pub callback: RefCell<Box<ObserverCallback>>,
  /// Nodes carrying a registration (permanent or transient) for this
  /// observer; maintained so disconnect need not scan the arena.
  pub observed_nodes: RefCell<Vec<NodeId>>,
}

impl fmt::Debug for ObserverInner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ObserverInner")
      .field("queued_records", &self.records.borrow().len())
      .finish_non_exhaustive()
  }
}

/// A registration riding on a node. Transient registrations are attached by
/// `remove` so subtree observers keep seeing mutations in detached subtrees;
/// they are dropped on the next `observe`, `disconnect`, or delivery.
#[derive(Debug, Clone)]
pub(crate) struct RegisteredObserver {
  pub observer: Rc<ObserverInner>,
  pub options: ObserverOptions,
  pub transient: bool,
}

/// Handle to a mutation observer. Cloning shares the record queue.
#[derive(Debug, Clone)]
pub struct MutationObserver {
  pub(crate) inner: Rc<ObserverInner>,
}

impl MutationObserver {
  pub fn new(callback: impl FnMut(&mut Dom, Vec<MutationRecord>) + 'static) -> Self {
    Self {
      inner: Rc::new(ObserverInner {
        records: RefCell::new(Vec::new()),
        callback: RefCell::new(Box::new(callback)),
        observed_nodes: RefCell::new(Vec::new()),
      }),
    }
  }

  /// Register interest in `target`. Old-value flags imply their base flag;
  /// observing with no interest at all is an error. Re-observing a node this
  /// observer already watches replaces the options and drops the observer's
  /// transient registrations.
  pub fn observe(&self, dom: &mut Dom, target: NodeId, options: ObserverOptions) -> Result<()> {
    let mut options = options;
    if options.attribute_old_value || options.attribute_filter.is_some() {
      options.attributes = true;
    }
    if options.character_data_old_value {
      options.character_data = true;
    }
    if !options.child_list && !options.attributes && !options.character_data {
      return Err(DomError::InvalidState(
        "observe() requires childList, attributes, or characterData".to_string(),
      ));
    }

    self.remove_transients(dom);

    let existing = dom
      .node(target)
      .observers
      .iter()
      .position(|reg| !reg.transient && Rc::ptr_eq(&reg.observer, &self.inner));
    match existing {
      Some(index) => {
        dom.node_mut(target).observers[index].options = options;
      }
      None => {
        dom.node_mut(target).observers.push(RegisteredObserver {
          observer: Rc::clone(&self.inner),
          options,
          transient: false,
        });
        self.inner.observed_nodes.borrow_mut().push(target);
      }
    }
    Ok(())
  }

  /// Remove every registration for this observer and discard queued records.
  pub fn disconnect(&self, dom: &mut Dom) {
    let nodes: Vec<NodeId> = self.inner.observed_nodes.borrow_mut().drain(..).collect();
    for node in nodes {
      if !dom.is_alive(node) {
        continue;
      }
      dom
        .node_mut(node)
        .observers
        .retain(|reg| !Rc::ptr_eq(&reg.observer, &self.inner));
    }
    self.inner.records.borrow_mut().clear();
  }

  /// Drain and return the pending record queue without waiting for delivery.
  pub fn take_records(&self) -> Vec<MutationRecord> {
    std::mem::take(&mut self.inner.records.borrow_mut())
  }

  pub fn pending_record_count(&self) -> usize {
    self.inner.records.borrow().len()
  }

  fn remove_transients(&self, dom: &mut Dom) {
    dom.remove_transient_registrations(&self.inner);
  }
}

/// Everything `queue_mutation_record` needs to know about one change.
#[derive(Debug, Clone)]
pub(crate) struct RecordRequest {
  pub record_type: MutationRecordType,
  pub target: NodeId,
  pub attribute_name: Option<String>,
  pub attribute_namespace: Option<String>,
  pub old_value: Option<String>,
  pub added_nodes: Vec<NodeId>,
  pub removed_nodes: Vec<NodeId>,
  pub previous_sibling: Option<NodeId>,
  pub next_sibling: Option<NodeId>,
}

impl RecordRequest {
  pub fn child_list(
    target: NodeId,
    added: Vec<NodeId>,
    removed: Vec<NodeId>,
    previous_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
  ) -> Self {
    Self {
      record_type: MutationRecordType::ChildList,
      target,
      attribute_name: None,
      attribute_namespace: None,
      old_value: None,
      added_nodes: added,
      removed_nodes: removed,
      previous_sibling,
      next_sibling,
    }
  }

  pub fn attributes(
    target: NodeId,
    name: String,
    namespace: Option<String>,
    old_value: Option<String>,
  ) -> Self {
    Self {
      record_type: MutationRecordType::Attributes,
      target,
      attribute_name: Some(name),
      attribute_namespace: namespace,
      old_value,
      added_nodes: Vec::new(),
      removed_nodes: Vec::new(),
      previous_sibling: None,
      next_sibling: None,
    }
  }

  pub fn character_data(target: NodeId, old_value: String) -> Self {
    Self {
      record_type: MutationRecordType::CharacterData,
      target,
      attribute_name: None,
      attribute_namespace: None,
      old_value: Some(old_value),
      added_nodes: Vec::new(),
      removed_nodes: Vec::new(),
      previous_sibling: None,
      next_sibling: None,
    }
  }
}

impl Dom {
  /// Drop every transient registration for `observer` and prune its
  /// observed-node list. Runs on re-`observe` and once per observer at each
  /// delivery drain.
  pub(crate) fn remove_transient_registrations(&mut self, observer: &Rc<ObserverInner>) {
    let nodes: Vec<NodeId> = observer.observed_nodes.borrow().clone();
    let mut kept = Vec::with_capacity(nodes.len());
    for node in nodes {
      if !self.is_alive(node) {
        continue;
      }
      self
        .node_mut(node)
        .observers
        .retain(|reg| !(reg.transient && Rc::ptr_eq(&reg.observer, observer)));
      let still_registered = self
        .node(node)
        .observers
        .iter()
        .any(|reg| Rc::ptr_eq(&reg.observer, observer));
      if still_registered {
        kept.push(node);
      }
    }
    *observer.observed_nodes.borrow_mut() = kept;
  }

  /// Resolve interested observers for one change and queue exactly one
  /// record per observer, then schedule a delivery flush.
  pub(crate) fn queue_mutation_record(&mut self, request: RecordRequest) {
    // Ordered map: first registration encountered wins the slot, later
    // matching registrations may still upgrade the recorded old value.
    let mut interested: Vec<(Rc<ObserverInner>, Option<String>)> = Vec::new();

    let mut cursor = Some(request.target);
    while let Some(node) = cursor {
      for reg in &self.node(node).observers {
        if node != request.target && !reg.options.subtree {
          continue;
        }
        let opts = &reg.options;
        let wants_old_value = match request.record_type {
          MutationRecordType::Attributes => {
            if !opts.attributes {
              continue;
            }
            if let Some(filter) = &opts.attribute_filter {
              let name_matches = request
                .attribute_name
                .as_deref()
                .is_some_and(|name| filter.iter().any(|f| f == name));
              if !name_matches || request.attribute_namespace.is_some() {
                continue;
              }
            }
            opts.attribute_old_value
          }
          MutationRecordType::CharacterData => {
            if !opts.character_data {
              continue;
            }
            opts.character_data_old_value
          }
          MutationRecordType::ChildList => {
            if !opts.child_list {
              continue;
            }
            false
          }
        };

        let entry = interested
          .iter_mut()
          .find(|(observer, _)| Rc::ptr_eq(observer, &reg.observer));
        let slot = match entry {
          Some((_, value)) => value,
          None => {
            interested.push((Rc::clone(&reg.observer), None));
            &mut interested.last_mut().expect("just pushed").1
          }
        };
        if wants_old_value {
          *slot = request.old_value.clone();
        }
      }
      cursor = self.parent(node);
    }

    if interested.is_empty() {
      return;
    }
    log::trace!(
      "queueing {:?} record at {:?} for {} observer(s)",
      request.record_type,
      request.target,
      interested.len()
    );
    for (observer, old_value) in interested {
      observer.records.borrow_mut().push(MutationRecord {
        record_type: request.record_type,
        target: request.target,
        added_nodes: request.added_nodes.clone(),
        removed_nodes: request.removed_nodes.clone(),
        previous_sibling: request.previous_sibling,
        next_sibling: request.next_sibling,
        attribute_name: request.attribute_name.clone(),
        attribute_namespace: request.attribute_namespace.clone(),
        old_value,
      });
      self.queue.enqueue_observer(observer);
    }
    self.queue.schedule_flush();
  }

  /// Attach transient registrations to `node` for every subtree-observing
  /// registration on `ancestor`. Called by `remove` so observers of an
  /// ancestor keep receiving records from the detached subtree.
  pub(crate) fn append_transient_observers(&mut self, ancestor: NodeId, node: NodeId) {
    let transients: Vec<RegisteredObserver> = self
      .node(ancestor)
      .observers
      .iter()
      .filter(|reg| reg.options.subtree)
      .map(|reg| RegisteredObserver {
        observer: Rc::clone(&reg.observer),
        options: reg.options.clone(),
        transient: true,
      })
      .collect();
    for reg in transients {
      reg.observer.observed_nodes.borrow_mut().push(node);
      self.node_mut(node).observers.push(reg);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn observe_requires_some_interest() {
    let mut dom = Dom::new();
    let doc = dom.create_document();
    let observer = MutationObserver::new(|_, _| {});
    let error = observer
      .observe(&mut dom, doc, ObserverOptions::default())
      .unwrap_err();
    assert!(matches!(error, DomError::InvalidState(_)));
  }

  #[test]
  fn old_value_flags_imply_base_flags() {
    let mut dom = Dom::new();
    let doc = dom.create_document();
    let el = dom.create_element(doc, "div").expect("element");
    let observer = MutationObserver::new(|_, _| {});
    observer
      .observe(
        &mut dom,
        el,
        ObserverOptions {
          attribute_old_value: true,
          ..ObserverOptions::default()
        },
      )
      .expect("observe");
    let reg = &dom.node(el).observers[0];
    assert!(reg.options.attributes);
  }

  #[test]
  fn reobserving_replaces_options() {
    let mut dom = Dom::new();
    let doc = dom.create_document();
    let el = dom.create_element(doc, "div").expect("element");
    let observer = MutationObserver::new(|_, _| {});
    observer
      .observe(&mut dom, el, ObserverOptions::child_list())
      .expect("observe");
    observer
      .observe(&mut dom, el, ObserverOptions::subtree_child_list())
      .expect("observe");
    assert_eq!(dom.node(el).observers.len(), 1);
    assert!(dom.node(el).observers[0].options.subtree);
  }

  #[test]
  fn records_reach_subtree_observers_only_when_asked() {
    let mut dom = Dom::new();
    let doc = dom.create_document();
    let parent = dom.create_element(doc, "div").expect("element");
    let child = dom.create_element(doc, "span").expect("element");
    dom.append_child(parent, child).expect("append");

    let shallow = MutationObserver::new(|_, _| {});
    shallow
      .observe(&mut dom, parent, ObserverOptions::child_list())
      .expect("observe");
    let deep = MutationObserver::new(|_, _| {});
    deep
      .observe(&mut dom, parent, ObserverOptions::subtree_child_list())
      .expect("observe");

    dom.queue_mutation_record(RecordRequest::child_list(child, vec![], vec![], None, None));
    assert_eq!(shallow.pending_record_count(), 0);
    assert_eq!(deep.pending_record_count(), 1);
  }

  #[test]
  fn attribute_filter_gates_names_and_namespaces() {
    let mut dom = Dom::new();
    let doc = dom.create_document();
    let el = dom.create_element(doc, "div").expect("element");
    let observer = MutationObserver::new(|_, _| {});
    observer
      .observe(
        &mut dom,
        el,
        ObserverOptions {
          attribute_filter: Some(vec!["class".to_string()]),
          ..ObserverOptions::default()
        },
      )
      .expect("observe");

    dom.queue_mutation_record(RecordRequest::attributes(el, "id".to_string(), None, None));
    assert_eq!(observer.pending_record_count(), 0, "name not in filter");

    dom.queue_mutation_record(RecordRequest::attributes(
      el,
      "class".to_string(),
      Some("urn:x".to_string()),
      None,
    ));
    assert_eq!(observer.pending_record_count(), 0, "namespaced attr is gated");

    dom.queue_mutation_record(RecordRequest::attributes(el, "class".to_string(), None, None));
    assert_eq!(observer.pending_record_count(), 1);
  }

  #[test]
  fn one_record_per_observer_even_with_two_matching_registrations() {
    let mut dom = Dom::new();
    let doc = dom.create_document();
    let parent = dom.create_element(doc, "div").expect("element");
    let child = dom.create_element(doc, "span").expect("element");
    dom.append_child(parent, child).expect("append");

    let observer = MutationObserver::new(|_, _| {});
    observer
      .observe(&mut dom, parent, ObserverOptions::subtree_child_list())
      .expect("observe");
    observer
      .observe(&mut dom, child, ObserverOptions::child_list())
      .expect("observe");

    dom.queue_mutation_record(RecordRequest::child_list(child, vec![], vec![], None, None));
    assert_eq!(observer.pending_record_count(), 1);
  }

  #[test]
  fn disconnect_discards_queue_and_registrations() {
    let mut dom = Dom::new();
    let doc = dom.create_document();
    let el = dom.create_element(doc, "div").expect("element");
    let observer = MutationObserver::new(|_, _| {});
    observer
      .observe(&mut dom, el, ObserverOptions::child_list())
      .expect("observe");
    dom.queue_mutation_record(RecordRequest::child_list(el, vec![], vec![], None, None));
    assert_eq!(observer.pending_record_count(), 1);

    observer.disconnect(&mut dom);
    assert_eq!(observer.pending_record_count(), 0);
    assert!(dom.node(el).observers.is_empty());
  }
}
