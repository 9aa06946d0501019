use fastdom::Dom;
use fastdom::MutationObserver;
use fastdom::MutationRecord;
use fastdom::MutationRecordType;
use fastdom::NodeId;
use fastdom::ObserverOptions;
use std::cell::RefCell;
use std::rc::Rc;

fn nested_tree(dom: &mut Dom) -> (NodeId, NodeId, NodeId, NodeId) {
  let _ = env_logger::builder().is_test(true).try_init();
  let doc = dom.create_document();
  let root = dom.create_element(doc, "div").expect("element");
  dom.append_child(doc, root).expect("append");
  let child = dom.create_element(doc, "p").expect("element");
  dom.append_child(root, child).expect("append");
  let grandchild = dom.create_text(doc, "leaf");
  dom.append_child(child, grandchild).expect("append");
  (doc, root, child, grandchild)
}

/// Observer whose callback stores every delivered batch.
fn recording_observer() -> (MutationObserver, Rc<RefCell<Vec<Vec<MutationRecord>>>>) {
  let batches = Rc::new(RefCell::new(Vec::new()));
  let sink = Rc::clone(&batches);
  let observer = MutationObserver::new(move |_, records| {
    sink.borrow_mut().push(records);
  });
  (observer, batches)
}

#[test]
fn subtree_observer_sees_grandchild_removal_as_one_record() {
  let mut dom = Dom::new();
  let (_, root, child, grandchild) = nested_tree(&mut dom);
  let (observer, batches) = recording_observer();
  observer
    .observe(&mut dom, root, ObserverOptions::subtree_child_list())
    .expect("observe");

  dom.remove_child(child, grandchild).expect("remove");
  dom.drain_tasks();

  let batches = batches.borrow();
  assert_eq!(batches.len(), 1);
  let records = &batches[0];
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].record_type, MutationRecordType::ChildList);
  assert_eq!(records[0].target, child, "record targets the mutated parent");
  assert_eq!(records[0].removed_nodes, vec![grandchild]);
  assert!(records[0].added_nodes.is_empty());
}

#[test]
fn child_list_record_carries_siblings() {
  let mut dom = Dom::new();
  let (doc, root, child, _) = nested_tree(&mut dom);
  let (observer, batches) = recording_observer();
  observer
    .observe(&mut dom, root, ObserverOptions::child_list())
    .expect("observe");

  let late = dom.create_element(doc, "span").expect("element");
  dom.append_child(root, late).expect("append");
  dom.drain_tasks();

  let batches = batches.borrow();
  assert_eq!(batches[0][0].added_nodes, vec![late]);
  assert_eq!(batches[0][0].previous_sibling, Some(child));
  assert_eq!(batches[0][0].next_sibling, None);
}

#[test]
fn transient_registration_follows_a_detached_subtree() {
  let mut dom = Dom::new();
  let (doc, root, child, _) = nested_tree(&mut dom);
  let (observer, _) = recording_observer();
  observer
    .observe(&mut dom, root, ObserverOptions::subtree_child_list())
    .expect("observe");

  dom.remove_child(root, child).expect("remove");
  assert_eq!(observer.pending_record_count(), 1, "the removal itself");

  // The subtree is detached now, but mutations inside it still reach the
  // observer through the transient registration left behind by remove.
  let extra = dom.create_text(doc, "late");
  dom.append_child(child, extra).expect("append");
  assert_eq!(observer.pending_record_count(), 2);

  // Re-observing drops transients: further detached mutations are silent.
  observer
    .observe(&mut dom, root, ObserverOptions::subtree_child_list())
    .expect("observe");
  let records = observer.take_records();
  assert_eq!(records.len(), 2);
  dom.remove_child(child, extra).expect("remove");
  assert_eq!(observer.pending_record_count(), 0);
}

#[test]
fn attribute_records_respect_filter_and_old_value() {
  let mut dom = Dom::new();
  let (_, root, _, _) = nested_tree(&mut dom);
  let (observer, _) = recording_observer();
  observer
    .observe(
      &mut dom,
      root,
      ObserverOptions {
        attribute_old_value: true,
        attribute_filter: Some(vec!["class".to_string()]),
        ..ObserverOptions::default()
      },
    )
    .expect("observe");

  dom.set_attribute(root, "id", "ignored").expect("attr");
  assert_eq!(observer.pending_record_count(), 0, "id is not in the filter");

  dom.set_attribute(root, "class", "first").expect("attr");
  dom.set_attribute(root, "class", "second").expect("attr");
  let records = observer.take_records();
  assert_eq!(records.len(), 2);
  assert_eq!(records[0].record_type, MutationRecordType::Attributes);
  assert_eq!(records[0].attribute_name.as_deref(), Some("class"));
  assert_eq!(records[0].old_value, None, "attribute did not exist before");
  assert_eq!(records[1].old_value.as_deref(), Some("first"));
}

#[test]
fn character_data_old_value_is_the_text_before_the_edit() {
  let mut dom = Dom::new();
  let (_, root, _, grandchild) = nested_tree(&mut dom);
  let (observer, _) = recording_observer();
  observer
    .observe(
      &mut dom,
      root,
      ObserverOptions {
        character_data_old_value: true,
        subtree: true,
        ..ObserverOptions::default()
      },
    )
    .expect("observe");

  dom.append_data(grandchild, "!").expect("append data");
  let records = observer.take_records();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].record_type, MutationRecordType::CharacterData);
  assert_eq!(records[0].old_value.as_deref(), Some("leaf"));
  assert_eq!(dom.character_data(grandchild), Some("leaf!"));
}

#[test]
fn take_records_preempts_delivery() {
  let mut dom = Dom::new();
  let (doc, root, _, _) = nested_tree(&mut dom);
  let (observer, batches) = recording_observer();
  observer
    .observe(&mut dom, root, ObserverOptions::child_list())
    .expect("observe");

  let span = dom.create_element(doc, "span").expect("element");
  dom.append_child(root, span).expect("append");
  assert_eq!(observer.take_records().len(), 1);

  dom.drain_tasks();
  assert!(batches.borrow().is_empty(), "nothing left to deliver");
}

#[test]
fn delivery_drops_transient_registrations() {
  let mut dom = Dom::new();
  let (doc, root, child, _) = nested_tree(&mut dom);
  let (observer, batches) = recording_observer();
  observer
    .observe(&mut dom, root, ObserverOptions::subtree_child_list())
    .expect("observe");

  dom.remove_child(root, child).expect("remove");
  dom.drain_tasks();
  assert_eq!(batches.borrow().len(), 1, "the removal was delivered");

  // Delivery retired the transient registration riding on the detached
  // subtree, so later mutations inside it go unreported.
  let extra = dom.create_text(doc, "late");
  dom.append_child(child, extra).expect("append");
  assert_eq!(observer.pending_record_count(), 0);
}

#[test]
fn nested_drain_inside_a_callback_is_a_no_op() {
  let mut dom = Dom::new();
  let (doc, root, _, _) = nested_tree(&mut dom);
  let (observer, batches) = recording_observer();
  observer
    .observe(&mut dom, root, ObserverOptions::child_list())
    .expect("observe");

  let reentrant = MutationObserver::new(move |dom: &mut Dom, _records| {
    let extra = dom.create_element(doc, "i").expect("element");
    dom.append_child(root, extra).expect("append");
    // Draining from inside a delivery must not re-enter delivery.
    dom.drain_tasks();
  });
  reentrant
    .observe(&mut dom, root, ObserverOptions::child_list())
    .expect("observe");

  let span = dom.create_element(doc, "span").expect("element");
  dom.append_child(root, span).expect("append");
  dom.drain_tasks();
  assert_eq!(batches.borrow().len(), 1, "nested drain delivered nothing");
  assert!(dom.has_pending_tasks(), "the callback's mutation waits its turn");

  dom.drain_tasks();
  assert_eq!(batches.borrow().len(), 2);
}

#[test]
fn callback_mutations_wait_for_the_next_drain() {
  let mut dom = Dom::new();
  let (doc, root, _, _) = nested_tree(&mut dom);
  let (observer, batches) = recording_observer();
  observer
    .observe(&mut dom, root, ObserverOptions::child_list())
    .expect("observe");

  let reentrant = MutationObserver::new(move |dom: &mut Dom, _records| {
    // Mutating from inside a delivery queues new work for a later drain.
    let extra = dom.create_element(doc, "i").expect("element");
    dom.append_child(root, extra).expect("append");
  });
  reentrant
    .observe(&mut dom, root, ObserverOptions::child_list())
    .expect("observe");

  let span = dom.create_element(doc, "span").expect("element");
  dom.append_child(root, span).expect("append");
  dom.drain_tasks();
  assert_eq!(batches.borrow().len(), 1);
  assert!(dom.has_pending_tasks(), "re-entrant mutation scheduled a flush");

  dom.drain_tasks();
  assert_eq!(batches.borrow().len(), 2, "second batch holds the callback's insert");
}
