//! Live ranges and static ranges
//!
//! A live range is a pair of boundary points registered with its document;
//! the mutation algorithms keep registered boundaries valid across every
//! tree edit. Handles are [`RangeId`]s; a range stays live until
//! [`Dom::detach_range`] releases it.
//!
//! [`StaticRange`] is the cheap variant: a plain snapshot that is never
//! adjusted and must be re-validated before use.

use crate::error::DomError;
use crate::error::Result;
use crate::node::Dom;
use crate::node::NodeData;
use crate::node::NodeId;
use crate::node::RangeId;
use std::cmp::Ordering;

/// One end of a range: a node and an offset into it. For character data the
/// offset counts scalar values; for everything else it counts children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Boundary {
  pub node: NodeId,
  pub offset: u32,
}

#[derive(Debug)]
pub(crate) struct RangeState {
  pub start: Boundary,
  pub end: Boundary,
  /// The registering document. Boundary maintenance scans this document's
  /// registry, so a range tracks nodes of the document it was created in.
  pub doc: NodeId,
}

/// Which boundary points `compare_boundary_points` compares, named from the
/// caller's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryComparison {
  StartToStart,
  StartToEnd,
  EndToEnd,
  EndToStart,
}

impl Dom {
  // -- lifecycle -----------------------------------------------------------

  /// Create a live range collapsed at `(doc, 0)` and register it with `doc`.
  pub fn create_range(&mut self, doc: NodeId) -> RangeId {
    let boundary = Boundary { node: doc, offset: 0 };
    let id = RangeId(self.ranges.insert(RangeState {
      start: boundary,
      end: boundary,
      doc,
    }));
    self.document_data_mut(doc).live_ranges.push(id);
    log::trace!("created range {:?} on {:?}", id, doc);
    id
  }

  /// Unregister and free a live range. The handle is dead afterwards.
  pub fn detach_range(&mut self, id: RangeId) {
    let doc = self.range(id).doc;
    self
      .document_data_mut(doc)
      .live_ranges
      .retain(|&r| r != id);
    self.ranges.remove(id.0);
  }

  pub(crate) fn range(&self, id: RangeId) -> &RangeState {
    self.ranges.get(id.0).expect("stale range handle")
  }

  fn range_mut(&mut self, id: RangeId) -> &mut RangeState {
    self.ranges.get_mut(id.0).expect("stale range handle")
  }

  // -- accessors -----------------------------------------------------------

  pub fn range_start(&self, id: RangeId) -> (NodeId, u32) {
    let b = self.range(id).start;
    (b.node, b.offset)
  }

  pub fn range_end(&self, id: RangeId) -> (NodeId, u32) {
    let b = self.range(id).end;
    (b.node, b.offset)
  }

  pub fn range_collapsed(&self, id: RangeId) -> bool {
    let range = self.range(id);
    range.start == range.end
  }

  pub fn range_root(&self, id: RangeId) -> NodeId {
    self.root(self.range(id).start.node)
  }

  /// Deepest node containing both boundary points.
  pub fn range_common_ancestor(&self, id: RangeId) -> NodeId {
    let range = self.range(id);
    self
      .common_inclusive_ancestor(range.start.node, range.end.node)
      .unwrap_or(range.start.node)
  }

  // -- boundary points -----------------------------------------------------

  /// Relative position of boundary `a` to boundary `b`. Both must share a
  /// root.
  pub(crate) fn boundary_position(&self, a: Boundary, b: Boundary) -> Ordering {
    if a.node == b.node {
      return a.offset.cmp(&b.offset);
    }
    if self.is_following(a.node, b.node) {
      return self.boundary_position(b, a).reverse();
    }
    if self.is_ancestor(a.node, b.node) {
      // The child of a.node on the path down to b.node decides.
      let mut child = b.node;
      while self.parent(child) != Some(a.node) {
        child = match self.parent(child) {
          Some(parent) => parent,
          None => return Ordering::Less,
        };
      }
      if self.index(child) < a.offset {
        return Ordering::Greater;
      }
      return Ordering::Less;
    }
    Ordering::Less
  }

  fn check_boundary(&self, node: NodeId, offset: u32) -> Result<()> {
    if matches!(self.node(node).data, NodeData::DocumentType(_)) {
      return Err(DomError::InvalidNodeType(
        "a doctype cannot be a range boundary container".to_string(),
      ));
    }
    let length = self.length(node);
    if offset > length {
      return Err(DomError::IndexSize { offset, length });
    }
    Ok(())
  }

  pub fn set_start(&mut self, id: RangeId, node: NodeId, offset: u32) -> Result<()> {
    self.check_boundary(node, offset)?;
    let boundary = Boundary { node, offset };
    let range = self.range(id);
    let reset_end = self.root(node) != self.root(range.start.node)
      || self.boundary_position(boundary, range.end) == Ordering::Greater;
    let range = self.range_mut(id);
    range.start = boundary;
    if reset_end {
      range.end = boundary;
    }
    Ok(())
  }

  pub fn set_end(&mut self, id: RangeId, node: NodeId, offset: u32) -> Result<()> {
    self.check_boundary(node, offset)?;
    let boundary = Boundary { node, offset };
    let range = self.range(id);
    let reset_start = self.root(node) != self.root(range.start.node)
      || self.boundary_position(boundary, range.start) == Ordering::Less;
    let range = self.range_mut(id);
    range.end = boundary;
    if reset_start {
      range.start = boundary;
    }
    Ok(())
  }

  pub fn set_start_before(&mut self, id: RangeId, node: NodeId) -> Result<()> {
    let parent = self.boundary_parent(node)?;
    self.set_start(id, parent, self.index(node))
  }

  pub fn set_start_after(&mut self, id: RangeId, node: NodeId) -> Result<()> {
    let parent = self.boundary_parent(node)?;
    self.set_start(id, parent, self.index(node) + 1)
  }

  pub fn set_end_before(&mut self, id: RangeId, node: NodeId) -> Result<()> {
    let parent = self.boundary_parent(node)?;
    self.set_end(id, parent, self.index(node))
  }

  pub fn set_end_after(&mut self, id: RangeId, node: NodeId) -> Result<()> {
    let parent = self.boundary_parent(node)?;
    self.set_end(id, parent, self.index(node) + 1)
  }

  fn boundary_parent(&self, node: NodeId) -> Result<NodeId> {
    self
      .parent(node)
      .ok_or_else(|| DomError::InvalidNodeType("node has no parent".to_string()))
  }

  pub fn collapse_range(&mut self, id: RangeId, to_start: bool) {
    let range = self.range_mut(id);
    if to_start {
      range.end = range.start;
    } else {
      range.start = range.end;
    }
  }

  /// Make the range span exactly `node`.
  pub fn select_node(&mut self, id: RangeId, node: NodeId) -> Result<()> {
    let parent = self.boundary_parent(node)?;
    let index = self.index(node);
    let range = self.range_mut(id);
    range.start = Boundary { node: parent, offset: index };
    range.end = Boundary { node: parent, offset: index + 1 };
    Ok(())
  }

  /// Make the range span everything inside `node`.
  pub fn select_node_contents(&mut self, id: RangeId, node: NodeId) -> Result<()> {
    if matches!(self.node(node).data, NodeData::DocumentType(_)) {
      return Err(DomError::InvalidNodeType(
        "a doctype cannot be a range boundary container".to_string(),
      ));
    }
    let length = self.length(node);
    let range = self.range_mut(id);
    range.start = Boundary { node, offset: 0 };
    range.end = Boundary { node, offset: length };
    Ok(())
  }

  /// `compareBoundaryPoints`: -1, 0, or 1 for the chosen pair of points.
  pub fn compare_boundary_points(
    &self,
    id: RangeId,
    how: BoundaryComparison,
    other: RangeId,
  ) -> Result<i8> {
    if self.range_root(id) != self.range_root(other) {
      return Err(DomError::WrongDocument(
        "ranges are rooted in different trees".to_string(),
      ));
    }
    let this = self.range(id);
    let that = self.range(other);
    let (point, other_point) = match how {
      BoundaryComparison::StartToStart => (this.start, that.start),
      BoundaryComparison::StartToEnd => (this.end, that.start),
      BoundaryComparison::EndToEnd => (this.end, that.end),
      BoundaryComparison::EndToStart => (this.start, that.end),
    };
    Ok(match self.boundary_position(point, other_point) {
      Ordering::Less => -1,
      Ordering::Equal => 0,
      Ordering::Greater => 1,
    })
  }

  /// `comparePoint`: -1 before the range, 0 inside, 1 after.
  pub fn compare_point(&self, id: RangeId, node: NodeId, offset: u32) -> Result<i8> {
    if self.root(node) != self.range_root(id) {
      return Err(DomError::WrongDocument(
        "point is in a different tree than the range".to_string(),
      ));
    }
    self.check_boundary(node, offset)?;
    let point = Boundary { node, offset };
    let range = self.range(id);
    if self.boundary_position(point, range.start) == Ordering::Less {
      return Ok(-1);
    }
    if self.boundary_position(point, range.end) == Ordering::Greater {
      return Ok(1);
    }
    Ok(0)
  }

  /// `isPointInRange`. A point in a different tree is simply not in range.
  pub fn is_point_in_range(&self, id: RangeId, node: NodeId, offset: u32) -> Result<bool> {
    if self.root(node) != self.range_root(id) {
      return Ok(false);
    }
    Ok(self.compare_point(id, node, offset)? == 0)
  }

  /// `intersectsNode`.
  pub fn intersects_node(&self, id: RangeId, node: NodeId) -> bool {
    if self.root(node) != self.range_root(id) {
      return false;
    }
    let parent = match self.parent(node) {
      Some(parent) => parent,
      None => return true,
    };
    let offset = self.index(node);
    let range = self.range(id);
    self.boundary_position(Boundary { node: parent, offset }, range.end) == Ordering::Less
      && self.boundary_position(
        Boundary { node: parent, offset: offset + 1 },
        range.start,
      ) == Ordering::Greater
  }

  // -- containment ---------------------------------------------------------

  pub(crate) fn common_inclusive_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
    let chain_a = self.ancestor_chain(a);
    let chain_b = self.ancestor_chain(b);
    if chain_a[0] != chain_b[0] {
      return None;
    }
    let mut depth = 0;
    while depth < chain_a.len() && depth < chain_b.len() && chain_a[depth] == chain_b[depth] {
      depth += 1;
    }
    Some(chain_a[depth - 1])
  }

  /// Fully contained: the whole node sits strictly between the boundaries.
  fn contained_between(&self, node: NodeId, start: Boundary, end: Boundary) -> bool {
    if self.root(node) != self.root(start.node) {
      return false;
    }
    self.boundary_position(Boundary { node, offset: 0 }, start) == Ordering::Greater
      && self.boundary_position(
        Boundary { node, offset: self.length(node) },
        end,
      ) == Ordering::Less
  }

  /// Partially contained: contains exactly one of the two boundary
  /// containers.
  fn partially_contained_between(&self, node: NodeId, start: Boundary, end: Boundary) -> bool {
    self.is_inclusive_ancestor(node, start.node) != self.is_inclusive_ancestor(node, end.node)
  }

  /// Contained nodes whose parent is not contained, in tree order.
  fn top_contained_between(&self, start: Boundary, end: Boundary) -> Vec<NodeId> {
    let root = self.root(start.node);
    self
      .descendants(root, false)
      .into_iter()
      .filter(|&node| {
        self.contained_between(node, start, end)
          && !self
            .parent(node)
            .is_some_and(|parent| self.contained_between(parent, start, end))
      })
      .collect()
  }

  /// Where the range collapses to after its contents are deleted or
  /// extracted: the start point if it survives, otherwise just after the
  /// shallowest start-side ancestor that does not contain the end.
  fn post_removal_boundary(&self, start: Boundary, end: Boundary) -> Boundary {
    if self.is_inclusive_ancestor(start.node, end.node) {
      return start;
    }
    let mut reference = start.node;
    while let Some(parent) = self.parent(reference) {
      if self.is_inclusive_ancestor(parent, end.node) {
        return Boundary {
          node: parent,
          offset: self.index(reference) + 1,
        };
      }
      reference = parent;
    }
    start
  }

  // -- content operations --------------------------------------------------

  /// `deleteContents()`.
  pub fn delete_contents(&mut self, id: RangeId) -> Result<()> {
    if self.range_collapsed(id) {
      return Ok(());
    }
    let RangeState { start, end, .. } = *self.range(id);

    if start.node == end.node && self.is_character_data(start.node) {
      // replace_data's boundary fixups collapse the range on their own.
      return self.replace_data(start.node, start.offset, end.offset - start.offset, "");
    }

    let to_remove = self.top_contained_between(start, end);
    let collapse_to = self.post_removal_boundary(start, end);

    if self.is_character_data(start.node) {
      let length = self.length(start.node);
      self.replace_data(start.node, start.offset, length - start.offset, "")?;
    }
    for node in to_remove {
      self.remove_node(node, false);
    }
    if self.is_character_data(end.node) {
      self.replace_data(end.node, 0, end.offset, "")?;
    }

    let range = self.range_mut(id);
    range.start = collapse_to;
    range.end = collapse_to;
    Ok(())
  }

  /// `extractContents()`: move the selected content into a fresh fragment,
  /// cloning the partially-selected edge nodes.
  pub fn extract_contents(&mut self, id: RangeId) -> Result<NodeId> {
    let RangeState { start, end, .. } = *self.range(id);
    let edge_chardata = start.node == end.node && self.is_character_data(start.node);
    let collapse_to = self.post_removal_boundary(start, end);

    let fragment = self.transfer_between(start, end, true)?;

    if !edge_chardata && start != end {
      let range = self.range_mut(id);
      range.start = collapse_to;
      range.end = collapse_to;
    }
    Ok(fragment)
  }

  /// `cloneContents()`: like extract, without touching the tree or the
  /// range.
  pub fn clone_contents(&mut self, id: RangeId) -> Result<NodeId> {
    let RangeState { start, end, .. } = *self.range(id);
    self.transfer_between(start, end, false)
  }

  /// Shared body of extract and clone. With `take` set the selected content
  /// is moved out (and edge character data deleted); otherwise everything is
  /// deep-cloned.
  fn transfer_between(&mut self, start: Boundary, end: Boundary, take: bool) -> Result<NodeId> {
    let doc = self.owner_document(start.node);
    let fragment = self.create_document_fragment(doc);
    if start == end {
      return Ok(fragment);
    }

    if start.node == end.node && self.is_character_data(start.node) {
      let count = end.offset - start.offset;
      let piece = self.substring_data(start.node, start.offset, count)?;
      let clone = self.clone_node(start.node, false)?;
      if let Some(data) = self.character_data_mut(clone) {
        *data = piece;
      }
      self.append_child(fragment, clone)?;
      if take {
        self.replace_data(start.node, start.offset, count, "")?;
      }
      return Ok(fragment);
    }

    let common = self
      .common_inclusive_ancestor(start.node, end.node)
      .ok_or_else(|| DomError::WrongDocument("range boundaries are in different trees".to_string()))?;
    let first_partial = if self.is_inclusive_ancestor(start.node, end.node) {
      None
    } else {
      self
        .child_ids(common)
        .into_iter()
        .find(|&child| self.partially_contained_between(child, start, end))
    };
    let last_partial = if self.is_inclusive_ancestor(end.node, start.node) {
      None
    } else {
      self
        .child_ids(common)
        .into_iter()
        .rev()
        .find(|&child| self.partially_contained_between(child, start, end))
    };
    let contained: Vec<NodeId> = self
      .child_ids(common)
      .into_iter()
      .filter(|&child| self.contained_between(child, start, end))
      .collect();
    if contained
      .iter()
      .any(|&child| matches!(self.node(child).data, NodeData::DocumentType(_)))
    {
      return Err(DomError::hierarchy("range contents would orphan a doctype"));
    }

    match first_partial {
      Some(first) if self.is_character_data(first) => {
        // first is the original start node here.
        let length = self.length(start.node);
        let piece = self.substring_data(start.node, start.offset, length - start.offset)?;
        let clone = self.clone_node(start.node, false)?;
        if let Some(data) = self.character_data_mut(clone) {
          *data = piece;
        }
        self.append_child(fragment, clone)?;
        if take {
          self.replace_data(start.node, start.offset, length - start.offset, "")?;
        }
      }
      Some(first) => {
        let clone = self.clone_node(first, false)?;
        self.append_child(fragment, clone)?;
        let tail = Boundary {
          node: first,
          offset: self.length(first),
        };
        let sub = self.transfer_between(start, tail, take)?;
        self.append_child(clone, sub)?;
      }
      None => {}
    }

    for child in contained {
      if take {
        self.append_child(fragment, child)?;
      } else {
        let clone = self.clone_node(child, true)?;
        self.append_child(fragment, clone)?;
      }
    }

    match last_partial {
      Some(last) if self.is_character_data(last) => {
        let piece = self.substring_data(end.node, 0, end.offset)?;
        let clone = self.clone_node(end.node, false)?;
        if let Some(data) = self.character_data_mut(clone) {
          *data = piece;
        }
        self.append_child(fragment, clone)?;
        if take {
          self.replace_data(end.node, 0, end.offset, "")?;
        }
      }
      Some(last) => {
        let clone = self.clone_node(last, false)?;
        self.append_child(fragment, clone)?;
        let head = Boundary { node: last, offset: 0 };
        let sub = self.transfer_between(head, end, take)?;
        self.append_child(clone, sub)?;
      }
      None => {}
    }

    Ok(fragment)
  }

  /// `insertNode(node)`: insert at the start boundary, splitting a text
  /// container when needed.
  pub fn insert_node_into_range(&mut self, id: RangeId, node: NodeId) -> Result<()> {
    let start = self.range(id).start;
    let start_is_text = self.is_text(start.node);
    match &self.node(start.node).data {
      NodeData::ProcessingInstruction(_) | NodeData::Comment(_) => {
        return Err(DomError::hierarchy(
          "cannot insert into a comment or processing instruction",
        ));
      }
      _ => {}
    }
    if (start_is_text && self.parent(start.node).is_none()) || start.node == node {
      return Err(DomError::hierarchy("range start cannot receive this node"));
    }

    let mut reference = if start_is_text {
      Some(start.node)
    } else {
      self.child_ids(start.node).get(start.offset as usize).copied()
    };
    let parent = match reference {
      Some(reference) => self.boundary_parent(reference)?,
      None => start.node,
    };
    self.ensure_pre_insertion_validity(node, parent, reference)?;

    if start_is_text {
      reference = Some(self.split_text(start.node, start.offset)?);
    }
    if reference == Some(node) {
      reference = self.next_sibling(node);
    }
    if self.parent(node).is_some() {
      self.remove_node(node, false);
    }
    let mut new_offset = match reference {
      Some(reference) => self.index(reference),
      None => self.length(parent),
    };
    new_offset += if matches!(self.node(node).data, NodeData::DocumentFragment) {
      self.child_count(node) as u32
    } else {
      1
    };

    self.pre_insert(node, parent, reference)?;
    if self.range_collapsed(id) {
      self.range_mut(id).end = Boundary { node: parent, offset: new_offset };
    }
    Ok(())
  }

  /// `surroundContents(newParent)`.
  pub fn surround_contents(&mut self, id: RangeId, new_parent: NodeId) -> Result<()> {
    let RangeState { start, end, .. } = *self.range(id);
    let root = self.range_root(id);
    let splits_non_text = self.descendants(root, false).into_iter().any(|node| {
      self.partially_contained_between(node, start, end) && !self.is_character_data(node)
    });
    if splits_non_text {
      return Err(DomError::InvalidState(
        "range partially selects a non-text node".to_string(),
      ));
    }
    match self.node(new_parent).data {
      NodeData::Document(_) | NodeData::DocumentType(_) | NodeData::DocumentFragment => {
        return Err(DomError::InvalidNodeType(
          "new parent cannot be a document, doctype, or fragment".to_string(),
        ));
      }
      _ => {}
    }

    let fragment = self.extract_contents(id)?;
    if self.has_children(new_parent) {
      self.replace_all(None, new_parent);
    }
    self.insert_node_into_range(id, new_parent)?;
    self.append_child(new_parent, fragment)?;
    self.select_node(id, new_parent)
  }

  /// `cloneRange()`: an independent live range with the same boundaries.
  pub fn clone_range(&mut self, id: RangeId) -> RangeId {
    let RangeState { start, end, doc } = *self.range(id);
    let copy = RangeId(self.ranges.insert(RangeState { start, end, doc }));
    self.document_data_mut(doc).live_ranges.push(copy);
    copy
  }

  /// Stringify: the concatenated text content between the boundaries.
  pub fn range_to_string(&self, id: RangeId) -> String {
    let RangeState { start, end, .. } = *self.range(id);
    let text_like = |node: NodeId| {
      matches!(
        self.node(node).data,
        NodeData::Text(_) | NodeData::CdataSection(_)
      )
    };
    if start.node == end.node && text_like(start.node) {
      return self
        .substring_data(start.node, start.offset, end.offset - start.offset)
        .unwrap_or_default();
    }
    let mut out = String::new();
    if text_like(start.node) {
      let length = self.length(start.node);
      out.push_str(
        &self
          .substring_data(start.node, start.offset, length - start.offset)
          .unwrap_or_default(),
      );
    }
    let root = self.root(start.node);
    for node in self.descendants(root, false) {
      if text_like(node) && self.contained_between(node, start, end) {
        out.push_str(self.character_data(node).unwrap_or_default());
      }
    }
    if text_like(end.node) {
      out.push_str(&self.substring_data(end.node, 0, end.offset).unwrap_or_default());
    }
    out
  }
}

/// A boundary-pair snapshot. Never adjusted by mutations; check
/// [`StaticRange::is_valid`] before acting on one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticRange {
  pub start_container: NodeId,
  pub start_offset: u32,
  pub end_container: NodeId,
  pub end_offset: u32,
}

impl StaticRange {
  pub fn new(
    dom: &Dom,
    start_container: NodeId,
    start_offset: u32,
    end_container: NodeId,
    end_offset: u32,
  ) -> Result<Self> {
    for node in [start_container, end_container] {
      if matches!(
        dom.data(node),
        NodeData::DocumentType(_) | NodeData::Attribute(_)
      ) {
        return Err(DomError::InvalidNodeType(
          "a doctype or attribute cannot be a static range container".to_string(),
        ));
      }
    }
    Ok(Self {
      start_container,
      start_offset,
      end_container,
      end_offset,
    })
  }

  pub fn collapsed(&self) -> bool {
    self.start_container == self.end_container && self.start_offset == self.end_offset
  }

  /// Both containers alive and in one tree, offsets in bounds, start not
  /// after end.
  pub fn is_valid(&self, dom: &Dom) -> bool {
    if !dom.is_alive(self.start_container) || !dom.is_alive(self.end_container) {
      return false;
    }
    if dom.root(self.start_container) != dom.root(self.end_container) {
      return false;
    }
    if self.start_offset > dom.length(self.start_container)
      || self.end_offset > dom.length(self.end_container)
    {
      return false;
    }
    dom.boundary_position(
      Boundary {
        node: self.start_container,
        offset: self.start_offset,
      },
      Boundary {
        node: self.end_container,
        offset: self.end_offset,
      },
    ) != Ordering::Greater
  }
}
