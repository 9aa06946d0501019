//! Tree queries
//!
//! Pure read-only algorithms over the node store: ancestry tests (plain and
//! shadow-including), preorder traversal, index/position, root resolution,
//! and shadow retargeting. Nothing here mutates or errors; the mutation
//! engine and the dispatch engine are built on these primitives.

use crate::node::Dom;
use crate::node::NodeData;
use crate::node::NodeId;

pub const DOCUMENT_POSITION_DISCONNECTED: u16 = 0x01;
pub const DOCUMENT_POSITION_PRECEDING: u16 = 0x02;
pub const DOCUMENT_POSITION_FOLLOWING: u16 = 0x04;
pub const DOCUMENT_POSITION_CONTAINS: u16 = 0x08;
pub const DOCUMENT_POSITION_CONTAINED_BY: u16 = 0x10;
pub const DOCUMENT_POSITION_IMPLEMENTATION_SPECIFIC: u16 = 0x20;

impl Dom {
  // -- ancestry -----------------------------------------------------------

  pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
      if current == ancestor {
        return true;
      }
      cursor = self.parent(current);
    }
    false
  }

  pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
    ancestor != node && self.is_inclusive_ancestor(ancestor, node)
  }

  pub fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
    self.is_inclusive_ancestor(ancestor, node)
  }

  /// Shadow-including inclusive ancestor: like ancestry, but a shadow root
  /// continues upward through its host.
  pub fn is_shadow_including_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
      if current == ancestor {
        return true;
      }
      cursor = match self.parent(current) {
        Some(parent) => Some(parent),
        None => self.as_shadow_root(current).map(|sr| sr.host),
      };
    }
    false
  }

  /// `contains` in the DOM sense: other is an inclusive descendant of node.
  pub fn contains(&self, node: NodeId, other: NodeId) -> bool {
    self.is_inclusive_ancestor(node, other)
  }

  // -- roots --------------------------------------------------------------

  /// Walk parent links to the top of the current tree.
  pub fn root(&self, node: NodeId) -> NodeId {
    let mut current = node;
    while let Some(parent) = self.parent(current) {
      current = parent;
    }
    current
  }

  /// Root resolution that keeps climbing through shadow hosts.
  pub fn shadow_including_root(&self, node: NodeId) -> NodeId {
    let mut current = self.root(node);
    while let Some(sr) = self.as_shadow_root(current) {
      current = self.root(sr.host);
    }
    current
  }

  /// `getRootNode(composed)`.
  pub fn get_root_node(&self, node: NodeId, composed: bool) -> NodeId {
    if composed {
      self.shadow_including_root(node)
    } else {
      self.root(node)
    }
  }

  /// Retarget `a` against `b`: while `a`'s root is a shadow root that is not
  /// a shadow-including inclusive ancestor of `b`, step `a` up to that root's
  /// host.
  pub fn retarget(&self, a: NodeId, b: NodeId) -> NodeId {
    let mut current = a;
    loop {
      let root = self.root(current);
      let host = match self.as_shadow_root(root) {
        Some(sr) => sr.host,
        None => return current,
      };
      if self.is_shadow_including_inclusive_ancestor(root, b) {
        return current;
      }
      current = host;
    }
  }

  // -- order and position -------------------------------------------------

  /// Number of preceding siblings.
  pub fn index(&self, node: NodeId) -> u32 {
    let mut index = 0;
    let mut cursor = self.previous_sibling(node);
    while let Some(prev) = cursor {
      index += 1;
      cursor = self.previous_sibling(prev);
    }
    index
  }

  /// Inclusive ancestors, root first.
  pub fn ancestor_chain(&self, node: NodeId) -> Vec<NodeId> {
    let mut chain = vec![node];
    let mut cursor = self.parent(node);
    while let Some(parent) = cursor {
      chain.push(parent);
      cursor = self.parent(parent);
    }
    chain.reverse();
    chain
  }

  /// Tree-order comparison for nodes sharing a root. `None` when the nodes
  /// are in different trees.
  pub fn tree_order(&self, a: NodeId, b: NodeId) -> Option<std::cmp::Ordering> {
    use std::cmp::Ordering;
    if a == b {
      return Some(Ordering::Equal);
    }
    let chain_a = self.ancestor_chain(a);
    let chain_b = self.ancestor_chain(b);
    if chain_a[0] != chain_b[0] {
      return None;
    }
    let mut depth = 0;
    while depth < chain_a.len() && depth < chain_b.len() && chain_a[depth] == chain_b[depth] {
      depth += 1;
    }
    if depth == chain_a.len() {
      // a is an ancestor of b, so a comes first.
      return Some(Ordering::Less);
    }
    if depth == chain_b.len() {
      return Some(Ordering::Greater);
    }
    Some(self.index(chain_a[depth]).cmp(&self.index(chain_b[depth])))
  }

  pub fn is_preceding(&self, a: NodeId, b: NodeId) -> bool {
    self.tree_order(a, b) == Some(std::cmp::Ordering::Less)
  }

  pub fn is_following(&self, a: NodeId, b: NodeId) -> bool {
    self.tree_order(a, b) == Some(std::cmp::Ordering::Greater)
  }

  // -- preorder traversal -------------------------------------------------

  /// Preorder successor bounded by `root` (the traversal never leaves the
  /// `root` subtree).
  pub fn following_node(&self, node: NodeId, root: NodeId) -> Option<NodeId> {
    if let Some(child) = self.first_child(node) {
      return Some(child);
    }
    let mut current = node;
    loop {
      if current == root {
        return None;
      }
      if let Some(sibling) = self.next_sibling(current) {
        return Some(sibling);
      }
      current = self.parent(current)?;
    }
  }

  /// Preorder predecessor bounded by `root`.
  pub fn preceding_node(&self, node: NodeId, root: NodeId) -> Option<NodeId> {
    if node == root {
      return None;
    }
    match self.previous_sibling(node) {
      Some(sibling) => Some(self.deepest_last_descendant(sibling)),
      None => self.parent(node),
    }
  }

  /// The node itself if childless, else the last child's deepest last
  /// descendant.
  pub fn deepest_last_descendant(&self, node: NodeId) -> NodeId {
    let mut current = node;
    while let Some(last) = self.last_child(current) {
      current = last;
    }
    current
  }

  /// Inclusive preorder descendants. With `shadow` set, an element's shadow
  /// root (and its subtree) is visited immediately after the element.
  pub fn inclusive_descendants(&self, root: NodeId, shadow: bool) -> Vec<NodeId> {
    let mut out = Vec::new();
    self.collect_descendants(root, shadow, &mut out);
    out
  }

  /// Exclusive preorder descendants.
  pub fn descendants(&self, root: NodeId, shadow: bool) -> Vec<NodeId> {
    let mut all = self.inclusive_descendants(root, shadow);
    all.remove(0);
    all
  }

  fn collect_descendants(&self, node: NodeId, shadow: bool, out: &mut Vec<NodeId>) {
    out.push(node);
    if shadow {
      if let NodeData::Element(el) = &self.node(node).data {
        if let Some(shadow_root) = el.shadow_root {
          self.collect_descendants(shadow_root, shadow, out);
        }
      }
    }
    let mut cursor = self.first_child(node);
    while let Some(child) = cursor {
      self.collect_descendants(child, shadow, out);
      cursor = self.next_sibling(child);
    }
  }

  // -- document position --------------------------------------------------

  /// `a.compareDocumentPosition(other)`: a bitmask describing where `other`
  /// sits relative to `a`. Disconnected nodes order by arena allocation,
  /// which is deterministic and stable for any given pair.
  pub fn compare_document_position(&self, node: NodeId, other: NodeId) -> u16 {
    if node == other {
      return 0;
    }

    let mut node1 = Some(other);
    let mut node2 = Some(node);
    let mut attr1 = None;
    let mut attr2 = None;

    if let Some(attr) = node1.and_then(|n| self.as_attr(n)) {
      attr1 = node1;
      node1 = attr.owner;
    }
    if let Some(attr) = node2.and_then(|n| self.as_attr(n)) {
      attr2 = node2;
      node2 = attr.owner;
      if let (Some(a1), Some(n1), Some(n2)) = (attr1, node1, node2) {
        if n1 == n2 {
          if let Some(el) = self.as_element(n2) {
            for &attr in &el.attrs {
              if attr == a1 {
                return DOCUMENT_POSITION_IMPLEMENTATION_SPECIFIC | DOCUMENT_POSITION_PRECEDING;
              }
              if Some(attr) == attr2 {
                return DOCUMENT_POSITION_IMPLEMENTATION_SPECIFIC | DOCUMENT_POSITION_FOLLOWING;
              }
            }
          }
        }
      }
    }

    let (node1, node2) = match (node1, node2) {
      (Some(n1), Some(n2)) if self.tree_order(n1, n2).is_some() => (n1, n2),
      _ => {
        let direction = if other.0 < node.0 {
          DOCUMENT_POSITION_PRECEDING
        } else {
          DOCUMENT_POSITION_FOLLOWING
        };
        return DOCUMENT_POSITION_DISCONNECTED | DOCUMENT_POSITION_IMPLEMENTATION_SPECIFIC | direction;
      }
    };

    if self.is_ancestor(node1, node2) || (node1 == node2 && attr2.is_some() && attr1.is_none()) {
      return DOCUMENT_POSITION_CONTAINS | DOCUMENT_POSITION_PRECEDING;
    }
    if self.is_ancestor(node2, node1) || (node1 == node2 && attr1.is_some() && attr2.is_none()) {
      return DOCUMENT_POSITION_CONTAINED_BY | DOCUMENT_POSITION_FOLLOWING;
    }
    if self.is_preceding(node1, node2) {
      DOCUMENT_POSITION_PRECEDING
    } else {
      DOCUMENT_POSITION_FOLLOWING
    }
  }
}
