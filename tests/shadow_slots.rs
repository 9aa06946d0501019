use fastdom::shadow::ShadowRootInit;
use fastdom::Dom;
use fastdom::DomError;
use fastdom::ListenerOptions;
use fastdom::NodeId;
use std::cell::RefCell;
use std::rc::Rc;

/// Host with an open shadow root containing a default slot and a named slot.
fn shadow_fixture(dom: &mut Dom) -> (NodeId, NodeId, NodeId, NodeId, NodeId) {
  let _ = env_logger::builder().is_test(true).try_init();
  let doc = dom.create_document();
  let host = dom.create_element(doc, "x-card").expect("element");
  dom.append_child(doc, host).expect("append");
  let shadow = dom.attach_shadow(host, ShadowRootInit::open()).expect("shadow");
  let default_slot = dom.create_element(doc, "slot").expect("element");
  dom.append_child(shadow, default_slot).expect("append");
  let named_slot = dom.create_element(doc, "slot").expect("element");
  dom.set_attribute(named_slot, "name", "title").expect("attr");
  dom.append_child(shadow, named_slot).expect("append");
  (doc, host, shadow, default_slot, named_slot)
}

#[test]
fn attach_shadow_rejects_unsupported_hosts_and_double_attach() {
  let mut dom = Dom::new();
  let doc = dom.create_document();
  let img = dom.create_element(doc, "img").expect("element");
  assert!(matches!(
    dom.attach_shadow(img, ShadowRootInit::open()).unwrap_err(),
    DomError::NotSupported(_)
  ));

  let div = dom.create_element(doc, "div").expect("element");
  dom.attach_shadow(div, ShadowRootInit::open()).expect("shadow");
  assert!(matches!(
    dom.attach_shadow(div, ShadowRootInit::open()).unwrap_err(),
    DomError::NotSupported(_)
  ));
}

#[test]
fn light_children_are_assigned_on_insertion() {
  let mut dom = Dom::new();
  let (doc, host, _, default_slot, named_slot) = shadow_fixture(&mut dom);

  let title = dom.create_element(doc, "h1").expect("element");
  dom.set_attribute(title, "slot", "title").expect("attr");
  dom.append_child(host, title).expect("append");
  let body = dom.create_text(doc, "body");
  dom.append_child(host, body).expect("append");

  assert_eq!(dom.assigned_slot(title), Some(named_slot));
  assert_eq!(dom.assigned_slot(body), Some(default_slot));
  assert_eq!(dom.assigned_nodes(named_slot), vec![title]);
  assert_eq!(dom.assigned_nodes(default_slot), vec![body]);
}

#[test]
fn changing_the_slot_attribute_reassigns() {
  let mut dom = Dom::new();
  let (doc, host, _, default_slot, named_slot) = shadow_fixture(&mut dom);
  let child = dom.create_element(doc, "span").expect("element");
  dom.append_child(host, child).expect("append");
  assert_eq!(dom.assigned_slot(child), Some(default_slot));

  dom.set_attribute(child, "slot", "title").expect("attr");
  assert_eq!(dom.assigned_slot(child), Some(named_slot));
  assert!(dom.assigned_nodes(default_slot).is_empty());
}

#[test]
fn removal_unassigns_and_signals() {
  let mut dom = Dom::new();
  let (doc, host, _, default_slot, _) = shadow_fixture(&mut dom);
  let child = dom.create_element(doc, "span").expect("element");
  dom.append_child(host, child).expect("append");
  assert_eq!(dom.assigned_nodes(default_slot), vec![child]);
  dom.drain_tasks();

  dom.remove_child(host, child).expect("remove");
  assert_eq!(dom.assigned_slot(child), None);
  assert!(dom.assigned_nodes(default_slot).is_empty());
  assert!(dom.has_pending_tasks(), "reassignment queued a slotchange");
}

#[test]
fn slotchange_fires_once_per_slot_on_drain() {
  let mut dom = Dom::new();
  let (doc, host, _, default_slot, _) = shadow_fixture(&mut dom);

  let fired = Rc::new(RefCell::new(Vec::new()));
  let sink = Rc::clone(&fired);
  dom.add_event_listener(default_slot, "slotchange", ListenerOptions::default(), move |_, event| {
    sink.borrow_mut().push(event.target());
    Ok(())
  });

  let a = dom.create_element(doc, "span").expect("element");
  let b = dom.create_element(doc, "span").expect("element");
  dom.append_child(host, a).expect("append");
  dom.append_child(host, b).expect("append");

  dom.drain_tasks();
  assert_eq!(fired.borrow().len(), 1, "two assignments, one signal");
  assert_eq!(fired.borrow()[0], Some(default_slot));
}

#[test]
fn flattened_slotables_recurse_through_nested_slots() {
  let mut dom = Dom::new();
  let (doc, host, _, default_slot, _) = shadow_fixture(&mut dom);

  // The outer host's light child is itself a shadow host whose slot
  // forwards into the outer default slot.
  let inner_host = dom.create_element(doc, "x-item").expect("element");
  dom.append_child(host, inner_host).expect("append");
  let inner_shadow = dom
    .attach_shadow(inner_host, ShadowRootInit::open())
    .expect("shadow");
  let inner_slot = dom.create_element(doc, "slot").expect("element");
  dom.append_child(inner_shadow, inner_slot).expect("append");
  let fallback = dom.create_text(doc, "fallback");
  dom.append_child(inner_slot, fallback).expect("append");

  assert_eq!(dom.assigned_nodes(default_slot), vec![inner_host]);
  // Nothing is slotted into the inner slot, so flattening yields its
  // fallback content.
  assert_eq!(dom.find_flattened_slotables(inner_slot), vec![fallback]);
}

#[test]
fn closed_shadow_root_hides_assignment_but_still_slots() {
  let mut dom = Dom::new();
  let doc = dom.create_document();
  let host = dom.create_element(doc, "div").expect("element");
  dom.append_child(doc, host).expect("append");
  let shadow = dom
    .attach_shadow(host, ShadowRootInit::closed())
    .expect("shadow");
  let slot = dom.create_element(doc, "slot").expect("element");
  dom.append_child(shadow, slot).expect("append");
  let child = dom.create_element(doc, "span").expect("element");
  dom.append_child(host, child).expect("append");

  assert_eq!(dom.assigned_slot(child), None, "closed mode is not exposed");
  assert_eq!(dom.assigned_nodes(slot), vec![child], "assignment still happened");
  assert_eq!(dom.open_shadow_root(host), None);
}

#[test]
fn slotchange_event_bubbles_out_of_the_shadow_tree() {
  let mut dom = Dom::new();
  let (doc, host, shadow, _, _) = shadow_fixture(&mut dom);

  let fired = Rc::new(RefCell::new(0));
  let count = Rc::clone(&fired);
  dom.add_event_listener(shadow, "slotchange", ListenerOptions::default(), move |_, _| {
    *count.borrow_mut() += 1;
    Ok(())
  });

  let child = dom.create_element(doc, "span").expect("element");
  dom.append_child(host, child).expect("append");
  dom.drain_tasks();
  assert_eq!(*fired.borrow(), 1, "slotchange bubbles to the shadow root");
}
