use fastdom::Dom;
use fastdom::NodeId;

fn paragraph(dom: &mut Dom, pieces: &[&str]) -> (NodeId, NodeId, Vec<NodeId>) {
  let _ = env_logger::builder().is_test(true).try_init();
  let doc = dom.create_document();
  let p = dom.create_element(doc, "p").expect("element");
  dom.append_child(doc, p).expect("append");
  let texts = pieces
    .iter()
    .map(|piece| {
      let text = dom.create_text(doc, piece);
      dom.append_child(p, text).expect("append");
      text
    })
    .collect();
  (doc, p, texts)
}

#[test]
fn removing_a_boundary_container_relocates_every_range() {
  let mut dom = Dom::new();
  let (doc, p, texts) = paragraph(&mut dom, &["one", "two", "three"]);
  let middle = texts[1];

  let first = dom.create_range(doc);
  dom.set_start(first, middle, 1).expect("start");
  dom.set_end(first, middle, 2).expect("end");
  let second = dom.create_range(doc);
  dom.set_start(second, middle, 0).expect("start");
  dom.set_end(second, texts[2], 3).expect("end");

  dom.remove_child(p, middle).expect("remove");

  // Both boundaries that lived inside the removed node now sit at
  // (parent, index-of-removed).
  assert_eq!(dom.range_start(first), (p, 1));
  assert_eq!(dom.range_end(first), (p, 1));
  assert_eq!(dom.range_start(second), (p, 1));
  assert_eq!(dom.range_end(second), (texts[2], 3), "untouched boundary survives");
}

#[test]
fn insertion_shifts_parent_anchored_boundaries() {
  let mut dom = Dom::new();
  let (doc, p, texts) = paragraph(&mut dom, &["one", "two"]);
  let range = dom.create_range(doc);
  dom.set_start(range, p, 1).expect("start");
  dom.set_end(range, p, 2).expect("end");

  let newcomer = dom.create_text(doc, "zero");
  dom.insert_before(p, newcomer, Some(texts[0])).expect("insert");
  assert_eq!(dom.range_start(range), (p, 2));
  assert_eq!(dom.range_end(range), (p, 3));
}

#[test]
fn character_edits_rehome_offsets() {
  let mut dom = Dom::new();
  let (doc, _, texts) = paragraph(&mut dom, &["hello world"]);
  let text = texts[0];
  let range = dom.create_range(doc);
  dom.set_start(range, text, 6).expect("start");
  dom.set_end(range, text, 11).expect("end");

  // Deleting before the boundaries slides them left.
  dom.delete_data(text, 0, 6).expect("delete");
  assert_eq!(dom.range_start(range), (text, 0));
  assert_eq!(dom.range_end(range), (text, 5));

  // Deleting across a boundary collapses it to the edit point.
  dom.replace_data(text, 2, 3, "").expect("replace");
  assert_eq!(dom.range_end(range), (text, 2));
}

#[test]
fn split_text_moves_trailing_boundaries_to_the_new_node() {
  let mut dom = Dom::new();
  let (doc, _, texts) = paragraph(&mut dom, &["hello world"]);
  let text = texts[0];
  let range = dom.create_range(doc);
  dom.set_start(range, text, 8).expect("start");
  dom.set_end(range, text, 10).expect("end");

  let tail = dom.split_text(text, 5).expect("split");
  assert_eq!(dom.range_start(range), (tail, 3));
  assert_eq!(dom.range_end(range), (tail, 5));
}

#[test]
fn position_is_antisymmetric() {
  use fastdom::BoundaryComparison;

  let mut dom = Dom::new();
  let (doc, p, texts) = paragraph(&mut dom, &["ab", "cd"]);
  let pairs = [
    (texts[0], 0u32),
    (texts[0], 2),
    (texts[1], 1),
    (p, 0),
    (p, 2),
  ];
  for &(node_a, offset_a) in &pairs {
    for &(node_b, offset_b) in &pairs {
      let forward = dom.create_range(doc);
      dom.set_start(forward, node_a, offset_a).expect("start");
      let backward = dom.create_range(doc);
      dom.set_start(backward, node_b, offset_b).expect("start");
      let ab = dom
        .compare_boundary_points(forward, BoundaryComparison::StartToStart, backward)
        .expect("compare");
      let ba = dom
        .compare_boundary_points(backward, BoundaryComparison::StartToStart, forward)
        .expect("compare");
      assert_eq!(ab, -ba, "position({node_a:?},{offset_a}) vs ({node_b:?},{offset_b})");
      dom.detach_range(forward);
      dom.detach_range(backward);
    }
  }
}

#[test]
fn extract_then_reinsert_round_trips_content() {
  let mut dom = Dom::new();
  let (doc, p, texts) = paragraph(&mut dom, &["hello world"]);
  let text = texts[0];
  let range = dom.create_range(doc);
  dom.set_start(range, text, 0).expect("start");
  dom.set_end(range, text, 6).expect("end");

  let fragment = dom.extract_contents(range).expect("extract");
  assert_eq!(dom.text_content(p).as_deref(), Some("world"));
  dom.insert_node_into_range(range, fragment).expect("insert");
  assert_eq!(dom.text_content(p).as_deref(), Some("hello world"));
}

#[test]
fn surround_contents_then_to_string() {
  let mut dom = Dom::new();
  let (doc, p, texts) = paragraph(&mut dom, &["hello world"]);
  let range = dom.create_range(doc);
  dom.set_start(range, texts[0], 6).expect("start");
  dom.set_end(range, texts[0], 11).expect("end");

  let mark = dom.create_element(doc, "mark").expect("element");
  dom.surround_contents(range, mark).expect("surround");
  assert_eq!(dom.text_content(mark).as_deref(), Some("world"));
  assert_eq!(dom.range_to_string(range), "world");
  assert_eq!(dom.text_content(p).as_deref(), Some("hello world"));
}

#[test]
fn iterator_survives_removal_of_its_branch() {
  use fastdom::traversal::SHOW_ELEMENT;

  let mut dom = Dom::new();
  let doc = dom.create_document();
  let root = dom.create_element(doc, "div").expect("element");
  dom.append_child(doc, root).expect("append");
  let left = dom.create_element(doc, "p").expect("element");
  let leaf = dom.create_element(doc, "em").expect("element");
  let right = dom.create_element(doc, "p").expect("element");
  dom.append_child(root, left).expect("append");
  dom.append_child(left, leaf).expect("append");
  dom.append_child(root, right).expect("append");

  let iterator = dom.create_node_iterator(root, SHOW_ELEMENT, None);
  assert_eq!(dom.iterator_next(iterator).expect("next"), Some(root));
  assert_eq!(dom.iterator_next(iterator).expect("next"), Some(left));
  assert_eq!(dom.iterator_next(iterator).expect("next"), Some(leaf));

  dom.remove_child(root, left).expect("remove");
  assert_eq!(
    dom.iterator_next(iterator).expect("next"),
    Some(right),
    "iteration continues past the removed branch",
  );
}
