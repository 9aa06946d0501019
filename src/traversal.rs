//! NodeIterator and TreeWalker
//!
//! Both walk a subtree in tree order through a `whatToShow` bitmask and an
//! optional filter callback. A NodeIterator is registered with its document
//! so removals can reposition it ([`Dom::iterator_pre_remove`]); a
//! [`TreeWalker`] holds a current node the caller moves freely and needs no
//! registration.
//!
//! Filters see the tree read-only. Re-entering a traversal from inside its
//! own filter is an error, not a hang.

use crate::error::DomError;
use crate::error::Result;
use crate::node::Dom;
use crate::node::IteratorId;
use crate::node::NodeId;
use std::fmt;
use std::rc::Rc;

pub const SHOW_ALL: u32 = 0xFFFF_FFFF;
pub const SHOW_ELEMENT: u32 = 0x1;
pub const SHOW_ATTRIBUTE: u32 = 0x2;
pub const SHOW_TEXT: u32 = 0x4;
pub const SHOW_CDATA_SECTION: u32 = 0x8;
pub const SHOW_PROCESSING_INSTRUCTION: u32 = 0x40;
pub const SHOW_COMMENT: u32 = 0x80;
pub const SHOW_DOCUMENT: u32 = 0x100;
pub const SHOW_DOCUMENT_TYPE: u32 = 0x200;
pub const SHOW_DOCUMENT_FRAGMENT: u32 = 0x400;

/// A filter callback's verdict on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
  /// Visit the node.
  Accept,
  /// Skip the node and its whole subtree.
  Reject,
  /// Skip the node but descend into its children.
  Skip,
}

pub type NodeFilter = dyn Fn(&Dom, NodeId) -> FilterDecision;

/// Registered state of a live NodeIterator.
pub(crate) struct IteratorState {
  pub root: NodeId,
  pub reference: NodeId,
  pub pointer_before_reference: bool,
  pub what_to_show: u32,
  pub filter: Option<Rc<NodeFilter>>,
  /// Set while the filter runs; guards against re-entrant traversal.
  pub active: bool,
  pub doc: NodeId,
}

impl fmt::Debug for IteratorState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IteratorState")
      .field("root", &self.root)
      .field("reference", &self.reference)
      .field("pointer_before_reference", &self.pointer_before_reference)
      .field("what_to_show", &format_args!("{:#x}", self.what_to_show))
      .field("filter", &self.filter.as_ref().map(|_| "fn"))
      .field("active", &self.active)
      .finish()
  }
}

/// Whether `what_to_show` admits the node. The mask bit for numeric node
/// type `n` is `1 << (n - 1)`.
fn mask_admits(dom: &Dom, what_to_show: u32, node: NodeId) -> bool {
  let bit = 1u32 << (dom.node_type(node) as u16 - 1);
  what_to_show & bit != 0
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
  Next,
  Previous,
}

impl Dom {
  // -- NodeIterator --------------------------------------------------------

  /// Create a NodeIterator over `root`'s subtree, positioned before `root`,
  /// and register it with `root`'s document.
  pub fn create_node_iterator(
    &mut self,
    root: NodeId,
    what_to_show: u32,
    filter: Option<Rc<NodeFilter>>,
  ) -> IteratorId {
    let doc = self.owner_document(root);
    let id = IteratorId(self.iterators.insert(IteratorState {
      root,
      reference: root,
      pointer_before_reference: true,
      what_to_show,
      filter,
      active: false,
      doc,
    }));
    self.document_data_mut(doc).live_iterators.push(id);
    log::trace!("created iterator {:?} over {:?}", id, root);
    id
  }

  /// Unregister and free a NodeIterator. The handle is dead afterwards.
  pub fn detach_node_iterator(&mut self, id: IteratorId) {
    let doc = self.iterator(id).doc;
    self
      .document_data_mut(doc)
      .live_iterators
      .retain(|&i| i != id);
    self.iterators.remove(id.0);
  }

  fn iterator(&self, id: IteratorId) -> &IteratorState {
    self.iterators.get(id.0).expect("stale iterator handle")
  }

  fn iterator_mut(&mut self, id: IteratorId) -> &mut IteratorState {
    self.iterators.get_mut(id.0).expect("stale iterator handle")
  }

  pub fn iterator_root(&self, id: IteratorId) -> NodeId {
    self.iterator(id).root
  }

  pub fn iterator_reference(&self, id: IteratorId) -> NodeId {
    self.iterator(id).reference
  }

  pub fn iterator_pointer_before_reference(&self, id: IteratorId) -> bool {
    self.iterator(id).pointer_before_reference
  }

  pub fn iterator_next(&mut self, id: IteratorId) -> Result<Option<NodeId>> {
    self.iterator_traverse(id, Direction::Next)
  }

  pub fn iterator_previous(&mut self, id: IteratorId) -> Result<Option<NodeId>> {
    self.iterator_traverse(id, Direction::Previous)
  }

  fn iterator_traverse(&mut self, id: IteratorId, direction: Direction) -> Result<Option<NodeId>> {
    let state = self.iterator(id);
    let root = state.root;
    let mut node = state.reference;
    let mut before = state.pointer_before_reference;

    loop {
      match direction {
        Direction::Next => {
          if before {
            before = false;
          } else {
            node = match self.following_node(node, root) {
              Some(next) => next,
              None => return Ok(None),
            };
          }
        }
        Direction::Previous => {
          if before {
            node = match self.preceding_node(node, root) {
              Some(previous) => previous,
              None => return Ok(None),
            };
          } else {
            before = true;
          }
        }
      }
      if self.iterator_filter(id, node)? == FilterDecision::Accept {
        break;
      }
    }

    let state = self.iterator_mut(id);
    state.reference = node;
    state.pointer_before_reference = direction == Direction::Previous;
    Ok(Some(node))
  }

  fn iterator_filter(&mut self, id: IteratorId, node: NodeId) -> Result<FilterDecision> {
    let state = self.iterator(id);
    if state.active {
      return Err(DomError::InvalidState(
        "traversal re-entered from its own filter".to_string(),
      ));
    }
    if !mask_admits(self, state.what_to_show, node) {
      return Ok(FilterDecision::Skip);
    }
    let filter = match &state.filter {
      Some(filter) => Rc::clone(filter),
      None => return Ok(FilterDecision::Accept),
    };
    self.iterator_mut(id).active = true;
    let decision = filter(self, node);
    self.iterator_mut(id).active = false;
    Ok(decision)
  }

  /// Pre-removal repositioning, invoked by the mutation engine before the
  /// links of `to_remove` are torn down. Moves the iterator off the doomed
  /// subtree so its reference never dangles.
  pub(crate) fn iterator_pre_remove(&mut self, id: IteratorId, to_remove: NodeId) {
    let state = match self.iterators.get(id.0) {
      Some(state) => state,
      None => return,
    };
    let root = state.root;
    if !self.is_inclusive_ancestor(to_remove, state.reference) || to_remove == root {
      return;
    }

    if state.pointer_before_reference {
      // First node after the doomed subtree, inside root.
      let next = self.following_node(self.deepest_last_descendant(to_remove), root);
      if let Some(next) = next {
        self.iterator_mut(id).reference = next;
        return;
      }
      self.iterator_mut(id).pointer_before_reference = false;
    }

    let replacement = match self.previous_sibling(to_remove) {
      Some(previous) => self.deepest_last_descendant(previous),
      None => match self.parent(to_remove) {
        Some(parent) => parent,
        None => return,
      },
    };
    self.iterator_mut(id).reference = replacement;
  }
}

/// A TreeWalker. Unregistered; the caller owns it and passes the [`Dom`] to
/// each movement. `current_node` may be set to any node, even outside root's
/// subtree, and is allowed to go stale — movements simply walk from wherever
/// it points.
pub struct TreeWalker {
  root: NodeId,
  current: NodeId,
  what_to_show: u32,
  filter: Option<Rc<NodeFilter>>,
  active: bool,
}

impl fmt::Debug for TreeWalker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TreeWalker")
      .field("root", &self.root)
      .field("current", &self.current)
      .field("what_to_show", &format_args!("{:#x}", self.what_to_show))
      .field("filter", &self.filter.as_ref().map(|_| "fn"))
      .finish()
  }
}

impl TreeWalker {
  pub fn new(root: NodeId, what_to_show: u32, filter: Option<Rc<NodeFilter>>) -> Self {
    Self {
      root,
      current: root,
      what_to_show,
      filter,
      active: false,
    }
  }

  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn current_node(&self) -> NodeId {
    self.current
  }

  pub fn set_current_node(&mut self, node: NodeId) {
    self.current = node;
  }

  fn filter_node(&mut self, dom: &Dom, node: NodeId) -> Result<FilterDecision> {
    if self.active {
      return Err(DomError::InvalidState(
        "traversal re-entered from its own filter".to_string(),
      ));
    }
    if !mask_admits(dom, self.what_to_show, node) {
      return Ok(FilterDecision::Skip);
    }
    let filter = match &self.filter {
      Some(filter) => Rc::clone(filter),
      None => return Ok(FilterDecision::Accept),
    };
    self.active = true;
    let decision = filter(dom, node);
    self.active = false;
    Ok(decision)
  }

  /// Nearest accepted ancestor within root's subtree.
  pub fn parent_node(&mut self, dom: &Dom) -> Result<Option<NodeId>> {
    let mut node = self.current;
    while node != self.root {
      node = match dom.parent(node) {
        Some(parent) => parent,
        None => break,
      };
      if self.filter_node(dom, node)? == FilterDecision::Accept {
        self.current = node;
        return Ok(Some(node));
      }
    }
    Ok(None)
  }

  pub fn first_child(&mut self, dom: &Dom) -> Result<Option<NodeId>> {
    self.traverse_children(dom, Direction::Next)
  }

  pub fn last_child(&mut self, dom: &Dom) -> Result<Option<NodeId>> {
    self.traverse_children(dom, Direction::Previous)
  }

  pub fn next_sibling(&mut self, dom: &Dom) -> Result<Option<NodeId>> {
    self.traverse_siblings(dom, Direction::Next)
  }

  pub fn previous_sibling(&mut self, dom: &Dom) -> Result<Option<NodeId>> {
    self.traverse_siblings(dom, Direction::Previous)
  }

  fn traverse_children(&mut self, dom: &Dom, direction: Direction) -> Result<Option<NodeId>> {
    let edge_child = |node: NodeId| match direction {
      Direction::Next => dom.first_child(node),
      Direction::Previous => dom.last_child(node),
    };
    let edge_sibling = |node: NodeId| match direction {
      Direction::Next => dom.next_sibling(node),
      Direction::Previous => dom.previous_sibling(node),
    };

    let mut node = match edge_child(self.current) {
      Some(child) => child,
      None => return Ok(None),
    };
    loop {
      let decision = self.filter_node(dom, node)?;
      match decision {
        FilterDecision::Accept => {
          self.current = node;
          return Ok(Some(node));
        }
        FilterDecision::Skip => {
          if let Some(child) = edge_child(node) {
            node = child;
            continue;
          }
        }
        FilterDecision::Reject => {}
      }
      // Climb back out to the next candidate.
      loop {
        if let Some(sibling) = edge_sibling(node) {
          node = sibling;
          break;
        }
        node = match dom.parent(node) {
          Some(parent) if parent != self.root && parent != self.current => parent,
          _ => return Ok(None),
        };
      }
    }
  }

  fn traverse_siblings(&mut self, dom: &Dom, direction: Direction) -> Result<Option<NodeId>> {
    let edge_child = |node: NodeId| match direction {
      Direction::Next => dom.first_child(node),
      Direction::Previous => dom.last_child(node),
    };
    let edge_sibling = |node: NodeId| match direction {
      Direction::Next => dom.next_sibling(node),
      Direction::Previous => dom.previous_sibling(node),
    };

    let mut node = self.current;
    if node == self.root {
      return Ok(None);
    }
    loop {
      let mut sibling = edge_sibling(node);
      while let Some(candidate) = sibling {
        node = candidate;
        let decision = self.filter_node(dom, node)?;
        if decision == FilterDecision::Accept {
          self.current = node;
          return Ok(Some(node));
        }
        sibling = edge_child(node);
        if decision == FilterDecision::Reject || sibling.is_none() {
          sibling = edge_sibling(node);
        }
      }
      node = match dom.parent(node) {
        Some(parent) if parent != self.root => parent,
        _ => return Ok(None),
      };
      if self.filter_node(dom, node)? == FilterDecision::Accept {
        return Ok(None);
      }
    }
  }

  /// Tree-order successor of `current_node` accepted by the filter.
  pub fn next_node(&mut self, dom: &Dom) -> Result<Option<NodeId>> {
    let mut node = self.current;
    let mut decision = FilterDecision::Accept;
    loop {
      while decision != FilterDecision::Reject {
        let child = match dom.first_child(node) {
          Some(child) => child,
          None => break,
        };
        node = child;
        decision = self.filter_node(dom, node)?;
        if decision == FilterDecision::Accept {
          self.current = node;
          return Ok(Some(node));
        }
      }
      let mut temp = Some(node);
      loop {
        let current = match temp {
          Some(current) => current,
          None => return Ok(None),
        };
        if current == self.root {
          return Ok(None);
        }
        if let Some(sibling) = dom.next_sibling(current) {
          node = sibling;
          break;
        }
        temp = dom.parent(current);
      }
      decision = self.filter_node(dom, node)?;
      if decision == FilterDecision::Accept {
        self.current = node;
        return Ok(Some(node));
      }
    }
  }

  /// Tree-order predecessor of `current_node` accepted by the filter.
  pub fn previous_node(&mut self, dom: &Dom) -> Result<Option<NodeId>> {
    let mut node = self.current;
    while node != self.root {
      let mut sibling = dom.previous_sibling(node);
      while let Some(candidate) = sibling {
        node = candidate;
        let mut decision = self.filter_node(dom, node)?;
        while decision != FilterDecision::Reject {
          let child = match dom.last_child(node) {
            Some(child) => child,
            None => break,
          };
          node = child;
          decision = self.filter_node(dom, node)?;
        }
        if decision == FilterDecision::Accept {
          self.current = node;
          return Ok(Some(node));
        }
        sibling = dom.previous_sibling(node);
      }
      if node == self.root {
        return Ok(None);
      }
      node = match dom.parent(node) {
        Some(parent) => parent,
        None => return Ok(None),
      };
      if self.filter_node(dom, node)? == FilterDecision::Accept {
        self.current = node;
        return Ok(Some(node));
      }
    }
    Ok(None)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// div > (p > text("a"), comment, span > text("b"))
  fn sample_tree(dom: &mut Dom) -> (NodeId, NodeId, NodeId, NodeId, NodeId, NodeId, NodeId) {
    let doc = dom.create_document();
    let div = dom.create_element(doc, "div").expect("element");
    dom.append_child(doc, div).expect("append");
    let p = dom.create_element(doc, "p").expect("element");
    let a = dom.create_text(doc, "a");
    let comment = dom.create_comment(doc, "c");
    let span = dom.create_element(doc, "span").expect("element");
    let b = dom.create_text(doc, "b");
    dom.append_child(div, p).expect("append");
    dom.append_child(p, a).expect("append");
    dom.append_child(div, comment).expect("append");
    dom.append_child(div, span).expect("append");
    dom.append_child(span, b).expect("append");
    (doc, div, p, a, comment, span, b)
  }

  #[test]
  fn iterator_walks_whole_subtree_in_tree_order() {
    let mut dom = Dom::new();
    let (_, div, p, a, comment, span, b) = sample_tree(&mut dom);
    let iterator = dom.create_node_iterator(div, SHOW_ALL, None);
    let mut seen = Vec::new();
    while let Some(node) = dom.iterator_next(iterator).expect("next") {
      seen.push(node);
    }
    assert_eq!(seen, vec![div, p, a, comment, span, b]);
    assert_eq!(dom.iterator_next(iterator).expect("next"), None, "stays exhausted");
  }

  #[test]
  fn iterator_previous_retraces_steps() {
    let mut dom = Dom::new();
    let (_, div, p, a, ..) = sample_tree(&mut dom);
    let iterator = dom.create_node_iterator(div, SHOW_ALL, None);
    assert_eq!(dom.iterator_next(iterator).expect("next"), Some(div));
    assert_eq!(dom.iterator_next(iterator).expect("next"), Some(p));
    assert_eq!(dom.iterator_next(iterator).expect("next"), Some(a));
    assert_eq!(dom.iterator_previous(iterator).expect("previous"), Some(a));
    assert_eq!(dom.iterator_previous(iterator).expect("previous"), Some(p));
  }

  #[test]
  fn what_to_show_masks_node_kinds() {
    let mut dom = Dom::new();
    let (_, div, p, _, _, span, _) = sample_tree(&mut dom);
    let iterator = dom.create_node_iterator(div, SHOW_ELEMENT, None);
    let mut seen = Vec::new();
    while let Some(node) = dom.iterator_next(iterator).expect("next") {
      seen.push(node);
    }
    assert_eq!(seen, vec![div, p, span]);
  }

  #[test]
  fn filter_reject_still_descends_for_iterators() {
    // NodeIterator treats Reject like Skip: children are still visited.
    let mut dom = Dom::new();
    let (_, div, p, a, ..) = sample_tree(&mut dom);
    let filter: Rc<NodeFilter> = Rc::new(move |dom, node| {
      if dom.is_element(node) && node != div {
        FilterDecision::Reject
      } else {
        FilterDecision::Accept
      }
    });
    let iterator = dom.create_node_iterator(div, SHOW_ALL, Some(filter));
    assert_eq!(dom.iterator_next(iterator).expect("next"), Some(div));
    let next = dom.iterator_next(iterator).expect("next");
    assert_eq!(next, Some(a), "p is rejected but its text child is reached");
    let _ = p;
  }

  #[test]
  fn removing_the_reference_repositions_the_iterator() {
    let mut dom = Dom::new();
    let (_, div, p, a, comment, ..) = sample_tree(&mut dom);
    let iterator = dom.create_node_iterator(div, SHOW_ALL, None);
    assert_eq!(dom.iterator_next(iterator).expect("next"), Some(div));
    assert_eq!(dom.iterator_next(iterator).expect("next"), Some(p));
    assert_eq!(dom.iterator_next(iterator).expect("next"), Some(a));

    // Reference sits on `a`; removing `p` takes the whole branch.
    dom.remove_child(div, p).expect("remove");
    assert_eq!(dom.iterator_reference(iterator), div);
    assert_eq!(
      dom.iterator_next(iterator).expect("next"),
      Some(comment),
      "iteration resumes after the removed branch",
    );
  }

  #[test]
  fn removal_before_pointer_moves_reference_forward() {
    let mut dom = Dom::new();
    let (_, div, p, _, comment, ..) = sample_tree(&mut dom);
    let iterator = dom.create_node_iterator(div, SHOW_ALL, None);
    assert_eq!(dom.iterator_next(iterator).expect("next"), Some(div));
    assert_eq!(dom.iterator_next(iterator).expect("next"), Some(p));
    assert_eq!(dom.iterator_previous(iterator).expect("previous"), Some(p));
    assert!(dom.iterator_pointer_before_reference(iterator));

    dom.remove_child(div, p).expect("remove");
    assert_eq!(
      dom.iterator_reference(iterator),
      comment,
      "pointer-before reference jumps to the first survivor",
    );
  }

  #[test]
  fn walker_children_and_siblings() {
    let mut dom = Dom::new();
    let (_, div, p, _, _, span, _) = sample_tree(&mut dom);
    let mut walker = TreeWalker::new(div, SHOW_ELEMENT, None);
    assert_eq!(walker.first_child(&dom).expect("first"), Some(p));
    assert_eq!(walker.next_sibling(&dom).expect("sibling"), Some(span));
    assert_eq!(walker.next_sibling(&dom).expect("sibling"), None);
    assert_eq!(walker.previous_sibling(&dom).expect("sibling"), Some(p));
    assert_eq!(walker.parent_node(&dom).expect("parent"), Some(div));
    assert_eq!(walker.parent_node(&dom).expect("parent"), None, "cannot climb past root");
  }

  #[test]
  fn walker_next_node_respects_reject_subtrees() {
    let mut dom = Dom::new();
    let (_, div, p, _, comment, span, b) = sample_tree(&mut dom);
    let filter: Rc<NodeFilter> = Rc::new(move |_, node| {
      if node == p {
        FilterDecision::Reject
      } else {
        FilterDecision::Accept
      }
    });
    let mut walker = TreeWalker::new(div, SHOW_ALL, Some(filter));
    assert_eq!(walker.next_node(&dom).expect("next"), Some(comment), "p's subtree is pruned");
    assert_eq!(walker.next_node(&dom).expect("next"), Some(span));
    assert_eq!(walker.next_node(&dom).expect("next"), Some(b));
    assert_eq!(walker.next_node(&dom).expect("next"), None);
  }

  #[test]
  fn walker_skip_hides_the_node_but_not_its_children() {
    let mut dom = Dom::new();
    let (_, div, p, a, comment, ..) = sample_tree(&mut dom);
    let filter: Rc<NodeFilter> = Rc::new(move |_, node| {
      if node == p {
        FilterDecision::Skip
      } else {
        FilterDecision::Accept
      }
    });
    let mut walker = TreeWalker::new(div, SHOW_ALL, Some(filter));
    assert_eq!(walker.next_node(&dom).expect("next"), Some(a), "descends through the skipped node");
    assert_eq!(walker.next_node(&dom).expect("next"), Some(comment));
  }

  #[test]
  fn walker_previous_node_descends_into_last_children() {
    let mut dom = Dom::new();
    let (_, div, p, a, comment, span, b) = sample_tree(&mut dom);
    let mut walker = TreeWalker::new(div, SHOW_ALL, None);
    walker.set_current_node(b);
    assert_eq!(walker.previous_node(&dom).expect("previous"), Some(span));
    assert_eq!(walker.previous_node(&dom).expect("previous"), Some(comment));
    assert_eq!(walker.previous_node(&dom).expect("previous"), Some(a));
    assert_eq!(walker.previous_node(&dom).expect("previous"), Some(p));
    assert_eq!(walker.previous_node(&dom).expect("previous"), Some(div));
    assert_eq!(walker.previous_node(&dom).expect("previous"), None);
  }

  #[test]
  fn detached_iterator_ignores_later_mutations() {
    let mut dom = Dom::new();
    let (_, div, p, ..) = sample_tree(&mut dom);
    let iterator = dom.create_node_iterator(div, SHOW_ALL, None);
    dom.detach_node_iterator(iterator);
    dom.remove_child(div, p).expect("remove");
  }
}
