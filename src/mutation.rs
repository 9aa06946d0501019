//! Mutation algorithms
//!
//! The state-mutating engine: pre-insertion validation, insert, remove,
//! replace, and replace-all, plus adoption, cloning, equality, and
//! normalization. This is where the crate's invariants are enforced: every
//! operation leaves sibling/child links, live ranges, live iterators, slot
//! assignment, and observer queues mutually consistent before returning.
//!
//! Validation happens entirely up front; a failed operation leaves the tree
//! untouched.

use crate::error::DomError;
use crate::error::Result;
use crate::node::Dom;
use crate::node::DocumentData;
use crate::node::NodeData;
use crate::node::NodeId;
use crate::observer::RecordRequest;

impl Dom {
  // -- public surface ------------------------------------------------------

  /// `insertBefore(node, child)` on `parent`.
  pub fn insert_before(
    &mut self,
    parent: NodeId,
    node: NodeId,
    child: Option<NodeId>,
  ) -> Result<NodeId> {
    self.pre_insert(node, parent, child)
  }

  /// `appendChild(node)` on `parent`.
  pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> Result<NodeId> {
    self.pre_insert(node, parent, None)
  }

  /// `removeChild(child)` on `parent`.
  pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId> {
    if self.parent(child) != Some(parent) {
      return Err(DomError::not_found("node to remove is not a child of parent"));
    }
    self.remove_node(child, false);
    Ok(child)
  }

  /// `replaceChild(node, child)` on `parent`.
  pub fn replace_child(&mut self, parent: NodeId, node: NodeId, child: NodeId) -> Result<NodeId> {
    self.replace(child, node, parent)
  }

  // -- validation ----------------------------------------------------------

  /// The WHATWG "ensure pre-insertion validity" checks. Everything is
  /// verified before any mutation, so failures cannot leave partial state.
  pub fn ensure_pre_insertion_validity(
    &self,
    node: NodeId,
    parent: NodeId,
    child: Option<NodeId>,
  ) -> Result<()> {
    match &self.node(parent).data {
      NodeData::Document(_) | NodeData::DocumentFragment | NodeData::ShadowRoot(_)
      | NodeData::Element(_) => {}
      NodeData::DocumentType(_)
      | NodeData::Attribute(_)
      | NodeData::Text(_)
      | NodeData::CdataSection(_)
      | NodeData::Comment(_)
      | NodeData::ProcessingInstruction(_) => {
        return Err(DomError::hierarchy(
          "parent must be a document, document fragment, or element",
        ));
      }
    }

    if self.is_shadow_including_inclusive_ancestor(node, parent) {
      return Err(DomError::hierarchy("node is an ancestor of parent"));
    }

    if let Some(child) = child {
      if self.parent(child) != Some(parent) {
        return Err(DomError::not_found("reference child is not a child of parent"));
      }
    }

    match &self.node(node).data {
      NodeData::DocumentFragment
      | NodeData::DocumentType(_)
      | NodeData::Element(_)
      | NodeData::Text(_)
      | NodeData::CdataSection(_)
      | NodeData::Comment(_)
      | NodeData::ProcessingInstruction(_) => {}
      NodeData::Document(_) | NodeData::ShadowRoot(_) | NodeData::Attribute(_) => {
        return Err(DomError::hierarchy("node kind cannot be inserted"));
      }
    }

    let parent_is_document = self.is_document(parent);
    if self.is_text(node) && parent_is_document {
      return Err(DomError::hierarchy("a document cannot contain text directly"));
    }
    if matches!(self.node(node).data, NodeData::DocumentType(_)) && !parent_is_document {
      return Err(DomError::hierarchy("a doctype must be a child of a document"));
    }

    if parent_is_document {
      self.check_document_cardinality(node, parent, child, None)?;
    }
    Ok(())
  }

  /// Document cardinality rules shared by pre-insert and replace. For
  /// replace, `replacing` is the child being swapped out and is exempt from
  /// the "already has one" checks.
  fn check_document_cardinality(
    &self,
    node: NodeId,
    parent: NodeId,
    child: Option<NodeId>,
    replacing: Option<NodeId>,
  ) -> Result<()> {
    let element_child = self
      .child_ids(parent)
      .into_iter()
      .find(|&c| self.is_element(c) && Some(c) != replacing);
    let doctype_child = self.child_ids(parent).into_iter().find(|&c| {
      matches!(self.node(c).data, NodeData::DocumentType(_)) && Some(c) != replacing
    });

    let doctype_follows = |reference: Option<NodeId>| -> bool {
      let mut cursor = reference;
      while let Some(current) = cursor {
        if matches!(self.node(current).data, NodeData::DocumentType(_)) && Some(current) != replacing
        {
          return true;
        }
        cursor = self.next_sibling(current);
      }
      false
    };
    let element_precedes = |reference: NodeId| -> bool {
      let mut cursor = self.previous_sibling(reference);
      while let Some(current) = cursor {
        if self.is_element(current) && Some(current) != replacing {
          return true;
        }
        cursor = self.previous_sibling(current);
      }
      false
    };

    match &self.node(node).data {
      NodeData::DocumentFragment => {
        let children = self.child_ids(node);
        let element_count = children.iter().filter(|&&c| self.is_element(c)).count();
        if element_count > 1 || children.iter().any(|&c| self.is_text(c)) {
          return Err(DomError::hierarchy(
            "fragment would put multiple elements or text into a document",
          ));
        }
        if element_count == 1
          && (element_child.is_some()
            || child.is_some_and(|c| matches!(self.node(c).data, NodeData::DocumentType(_)))
            || child.is_some_and(|c| doctype_follows(self.next_sibling(c))))
        {
          return Err(DomError::hierarchy("document already has a document element"));
        }
      }
      NodeData::Element(_) => {
        if element_child.is_some()
          || child.is_some_and(|c| matches!(self.node(c).data, NodeData::DocumentType(_)))
          || child.is_some_and(|c| doctype_follows(self.next_sibling(c)))
        {
          return Err(DomError::hierarchy("document already has a document element"));
        }
      }
      NodeData::DocumentType(_) => {
        if doctype_child.is_some()
          || child.is_some_and(element_precedes)
          || (child.is_none() && element_child.is_some())
        {
          return Err(DomError::hierarchy("doctype placement violates document order"));
        }
      }
      NodeData::Document(_)
      | NodeData::ShadowRoot(_)
      | NodeData::Attribute(_)
      | NodeData::Text(_)
      | NodeData::CdataSection(_)
      | NodeData::Comment(_)
      | NodeData::ProcessingInstruction(_) => {}
    }
    Ok(())
  }

  // -- pre-insert / insert -------------------------------------------------

  /// Validate, fix up a self-referencing anchor, adopt, and insert.
  pub(crate) fn pre_insert(
    &mut self,
    node: NodeId,
    parent: NodeId,
    child: Option<NodeId>,
  ) -> Result<NodeId> {
    self.ensure_pre_insertion_validity(node, parent, child)?;
    let reference_child = if child == Some(node) {
      self.next_sibling(node)
    } else {
      child
    };
    self.adopt(node, self.owner_document(parent));
    self.insert(node, parent, reference_child, false);
    Ok(node)
  }

  /// The WHATWG "insert" concept. `child` is the anchor the new content goes
  /// before; `None` appends.
  pub(crate) fn insert(
    &mut self,
    node: NodeId,
    parent: NodeId,
    child: Option<NodeId>,
    suppress_observers: bool,
  ) {
    let is_fragment = matches!(
      self.node(node).data,
      NodeData::DocumentFragment | NodeData::ShadowRoot(_)
    );
    let nodes: Vec<NodeId> = if is_fragment {
      self.child_ids(node)
    } else {
      vec![node]
    };
    let count = nodes.len() as u32;
    if count == 0 {
      return;
    }

    if is_fragment {
      for &item in &nodes {
        self.remove_node(item, true);
      }
      self.queue_mutation_record(RecordRequest::child_list(
        node,
        Vec::new(),
        nodes.clone(),
        None,
        None,
      ));
    }

    // Shift range boundaries anchored at parent past the insertion point.
    if let Some(child) = child {
      let anchor = self.index(child);
      let doc = self.owner_document(parent);
      for range_id in self.live_range_ids(doc) {
        if let Some(range) = self.ranges.get_mut(range_id.0) {
          if range.start.node == parent && range.start.offset > anchor {
            range.start.offset += count;
          }
          if range.end.node == parent && range.end.offset > anchor {
            range.end.offset += count;
          }
        }
      }
    }

    let previous_sibling = match child {
      Some(child) => self.previous_sibling(child),
      None => self.last_child(parent),
    };

    let parent_is_shadow_host = self.is_shadow_host(parent);
    for &item in &nodes {
      log::trace!("inserting {:?} into {:?} before {:?}", item, parent, child);
      self.link_before(parent, item, child);

      if parent_is_shadow_host && self.is_slotable(item) {
        self.assign_a_slot(item);
      }
      if self.is_text(item) {
        self.child_text_changed(parent);
      }
      if self.is_shadow_root(self.root(parent))
        && self.is_slot(parent)
        && self.assigned_nodes(parent).is_empty()
      {
        self.signal_a_slot_change(parent);
      }
      let item_root = self.root(item);
      self.assign_slotables_for_tree(item_root);
      for descendant in self.inclusive_descendants(item, true) {
        self.run_insertion_steps(descendant);
      }
    }

    if !suppress_observers {
      self.queue_mutation_record(RecordRequest::child_list(
        parent,
        nodes,
        Vec::new(),
        previous_sibling,
        child,
      ));
    }
  }

  /// Splice `node` into `parent`'s child chain immediately before
  /// `reference` (append when `None`). Pure link surgery.
  fn link_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
    debug_assert!(self.parent(node).is_none(), "node must be detached");
    let (prev, next) = match reference {
      Some(reference) => (self.previous_sibling(reference), Some(reference)),
      None => (self.last_child(parent), None),
    };
    {
      let entry = self.node_mut(node);
      entry.parent = Some(parent);
      entry.prev_sibling = prev;
      entry.next_sibling = next;
    }
    match prev {
      Some(prev) => self.node_mut(prev).next_sibling = Some(node),
      None => self.node_mut(parent).first_child = Some(node),
    }
    match next {
      Some(next) => self.node_mut(next).prev_sibling = Some(node),
      None => self.node_mut(parent).last_child = Some(node),
    }
  }

  fn unlink(&mut self, node: NodeId) {
    let (parent, prev, next) = {
      let entry = self.node(node);
      (entry.parent, entry.prev_sibling, entry.next_sibling)
    };
    let parent = match parent {
      Some(parent) => parent,
      None => return,
    };
    match prev {
      Some(prev) => self.node_mut(prev).next_sibling = next,
      None => self.node_mut(parent).first_child = next,
    }
    match next {
      Some(next) => self.node_mut(next).prev_sibling = prev,
      None => self.node_mut(parent).last_child = prev,
    }
    let entry = self.node_mut(node);
    entry.parent = None;
    entry.prev_sibling = None;
    entry.next_sibling = None;
  }

  // -- remove --------------------------------------------------------------

  /// The WHATWG "remove" concept. Relocates live-range boundaries, repoints
  /// live iterators, maintains slot assignment, attaches transient observer
  /// registrations, and queues the childList record.
  pub(crate) fn remove_node(&mut self, node: NodeId, suppress_observers: bool) {
    let parent = match self.parent(node) {
      Some(parent) => parent,
      None => return,
    };
    let index = self.index(node);
    let doc = self.owner_document(node);
    log::trace!("removing {:?} from {:?} at index {}", node, parent, index);

    // Boundary relocation: boundaries inside the removed subtree collapse to
    // (parent, index); boundaries in parent past the removal point shift
    // down by one.
    for range_id in self.live_range_ids(doc) {
      let (start_node, end_node) = match self.ranges.get(range_id.0) {
        Some(range) => (range.start.node, range.end.node),
        None => continue,
      };
      let start_inside = self.is_inclusive_ancestor(node, start_node);
      let end_inside = self.is_inclusive_ancestor(node, end_node);
      if let Some(range) = self.ranges.get_mut(range_id.0) {
        if start_inside {
          range.start.node = parent;
          range.start.offset = index;
        } else if range.start.node == parent && range.start.offset > index {
          range.start.offset -= 1;
        }
        if end_inside {
          range.end.node = parent;
          range.end.offset = index;
        } else if range.end.node == parent && range.end.offset > index {
          range.end.offset -= 1;
        }
      }
    }

    // Iterators must be repositioned before the links are torn down.
    for iterator_id in self.live_iterator_ids(doc) {
      self.iterator_pre_remove(iterator_id, node);
    }

    let old_previous = self.previous_sibling(node);
    let old_next = self.next_sibling(node);
    self.unlink(node);

    if let Some(slot) = self.raw_assigned_slot(node) {
      self.assign_slotables(slot);
    }
    if self.is_shadow_root(self.root(parent))
      && self.is_slot(parent)
      && self.assigned_nodes(parent).is_empty()
    {
      self.signal_a_slot_change(parent);
    }
    if self
      .inclusive_descendants(node, false)
      .iter()
      .any(|&d| self.is_slot(d))
    {
      let parent_root = self.root(parent);
      self.assign_slotables_for_tree(parent_root);
      self.assign_slotables_for_tree(node);
    }

    self.run_removing_steps(node, parent);
    for descendant in self.descendants(node, true) {
      self.run_removing_steps(descendant, parent);
    }

    // Subtree observers on ancestors keep watching the detached subtree
    // through transient registrations.
    let mut ancestor = Some(parent);
    while let Some(current) = ancestor {
      self.append_transient_observers(current, node);
      ancestor = self.parent(current);
    }

    if !suppress_observers {
      self.queue_mutation_record(RecordRequest::child_list(
        parent,
        Vec::new(),
        vec![node],
        old_previous,
        old_next,
      ));
    }
    if self.is_text(node) {
      self.child_text_changed(parent);
    }
  }

  // -- replace / replace-all -----------------------------------------------

  /// `replaceChild`: equivalent validity checks against the pre-removal
  /// tree, then a suppressed remove + insert and a single combined record.
  pub(crate) fn replace(&mut self, child: NodeId, node: NodeId, parent: NodeId) -> Result<NodeId> {
    match &self.node(parent).data {
      NodeData::Document(_) | NodeData::DocumentFragment | NodeData::ShadowRoot(_)
      | NodeData::Element(_) => {}
      _ => {
        return Err(DomError::hierarchy(
          "parent must be a document, document fragment, or element",
        ));
      }
    }
    if self.is_shadow_including_inclusive_ancestor(node, parent) {
      return Err(DomError::hierarchy("node is an ancestor of parent"));
    }
    if self.parent(child) != Some(parent) {
      return Err(DomError::not_found("child to replace is not a child of parent"));
    }
    match &self.node(node).data {
      NodeData::DocumentFragment
      | NodeData::DocumentType(_)
      | NodeData::Element(_)
      | NodeData::Text(_)
      | NodeData::CdataSection(_)
      | NodeData::Comment(_)
      | NodeData::ProcessingInstruction(_) => {}
      _ => return Err(DomError::hierarchy("node kind cannot be inserted")),
    }
    let parent_is_document = self.is_document(parent);
    if self.is_text(node) && parent_is_document {
      return Err(DomError::hierarchy("a document cannot contain text directly"));
    }
    if matches!(self.node(node).data, NodeData::DocumentType(_)) && !parent_is_document {
      return Err(DomError::hierarchy("a doctype must be a child of a document"));
    }
    if parent_is_document {
      // The child being replaced is exempt from the cardinality scan; its
      // current position must not be re-validated after removal.
      self.check_document_cardinality(node, parent, Some(child), Some(child))?;
    }

    let reference_child = {
      let next = self.next_sibling(child);
      if next == Some(node) {
        self.next_sibling(node)
      } else {
        next
      }
    };
    self.adopt(node, self.owner_document(parent));
    // Capture the added list before insert drains a fragment.
    let added: Vec<NodeId> = if matches!(self.node(node).data, NodeData::DocumentFragment) {
      self.child_ids(node)
    } else {
      vec![node]
    };
    self.remove_node(child, true);
    self.insert(node, parent, reference_child, true);

    let previous_sibling = match added.first() {
      Some(&first) => self.previous_sibling(first),
      None => reference_child.map_or_else(|| self.last_child(parent), |r| self.previous_sibling(r)),
    };
    self.queue_mutation_record(RecordRequest::child_list(
      parent,
      added,
      vec![child],
      previous_sibling,
      reference_child,
    ));
    Ok(child)
  }

  /// The WHATWG "replace all" concept: drop every child, insert `node` (or
  /// nothing), one combined record. No validity checks by design; callers
  /// own the invariants.
  pub(crate) fn replace_all(&mut self, node: Option<NodeId>, parent: NodeId) {
    if let Some(node) = node {
      self.adopt(node, self.owner_document(parent));
    }
    let removed = self.child_ids(parent);
    let added: Vec<NodeId> = match node {
      Some(node) => {
        if matches!(
          self.node(node).data,
          NodeData::DocumentFragment | NodeData::ShadowRoot(_)
        ) {
          self.child_ids(node)
        } else {
          vec![node]
        }
      }
      None => Vec::new(),
    };
    for &child in &removed {
      self.remove_node(child, true);
    }
    if let Some(node) = node {
      self.insert(node, parent, None, true);
    }
    if !added.is_empty() || !removed.is_empty() {
      self.queue_mutation_record(RecordRequest::child_list(parent, added, removed, None, None));
    }
  }

  // -- adoption ------------------------------------------------------------

  /// Move `node` (and its shadow-including subtree, attributes included)
  /// into `doc`.
  pub fn adopt(&mut self, node: NodeId, doc: NodeId) {
    let old_doc = self.owner_document(node);
    if self.parent(node).is_some() {
      self.remove_node(node, false);
    }
    if doc == old_doc {
      return;
    }
    log::debug!("adopting {:?} into {:?}", node, doc);
    for descendant in self.inclusive_descendants(node, true) {
      self.node_mut(descendant).owner_doc = Some(doc);
      let attrs: Vec<NodeId> = self
        .as_element(descendant)
        .map(|el| el.attrs.clone())
        .unwrap_or_default();
      for attr in attrs {
        self.node_mut(attr).owner_doc = Some(doc);
      }
      self.run_adopting_steps(descendant, old_doc);
    }
  }

  // -- clone / equality ----------------------------------------------------

  /// `cloneNode(deep)`. Shadow roots cannot be cloned.
  pub fn clone_node(&mut self, node: NodeId, deep: bool) -> Result<NodeId> {
    if self.is_shadow_root(node) {
      return Err(DomError::NotSupported("shadow roots cannot be cloned".to_string()));
    }
    self.clone_into(node, None, deep)
  }

  fn clone_into(&mut self, node: NodeId, doc_override: Option<NodeId>, deep: bool) -> Result<NodeId> {
    let doc = doc_override.unwrap_or_else(|| self.owner_document(node));
    let copy = match &self.node(node).data {
      NodeData::Document(_) => {
        let copy = self.create_document();
        // Cloned documents own their clone tree.
        return self.clone_children_into(node, copy, copy, deep);
      }
      NodeData::DocumentType(dt) => {
        let dt = dt.clone();
        self.create_doctype(doc, &dt.name, &dt.public_id, &dt.system_id)?
      }
      NodeData::DocumentFragment => self.create_document_fragment(doc),
      NodeData::ShadowRoot(_) => {
        return Err(DomError::NotSupported("shadow roots cannot be cloned".to_string()));
      }
      NodeData::Element(el) => {
        let name = el.name.clone();
        let attrs: Vec<(crate::name::QualifiedName, String)> = el
          .attrs
          .iter()
          .filter_map(|&attr| {
            self
              .as_attr(attr)
              .map(|data| (data.name.clone(), data.value.clone()))
          })
          .collect();
        let copy = self.create_element_ns(
          doc,
          name.namespace.as_deref(),
          &name.qualified(),
        )?;
        for (attr_name, value) in attrs {
          let attr = self.alloc_attribute(doc, attr_name, &value);
          // Structural copy; no change notifications on a fresh clone.
          if let Some(data) = self.as_attr_mut(attr) {
            data.owner = Some(copy);
          }
          if let Some(el) = self.as_element_mut(copy) {
            el.attrs.push(attr);
          }
        }
        copy
      }
      NodeData::Attribute(attr) => {
        let (name, value) = (attr.name.clone(), attr.value.clone());
        self.alloc_attribute(doc, name, &value)
      }
      NodeData::Text(cd) => {
        let data = cd.data.clone();
        self.create_text(doc, &data)
      }
      NodeData::CdataSection(cd) => {
        let data = cd.data.clone();
        self.create_cdata_section(doc, &data)?
      }
      NodeData::Comment(cd) => {
        let data = cd.data.clone();
        self.create_comment(doc, &data)
      }
      NodeData::ProcessingInstruction(pi) => {
        let (target, data) = (pi.target.clone(), pi.data.clone());
        self.create_processing_instruction(doc, &target, &data)?
      }
    };
    self.clone_children_into(node, copy, doc, deep)
  }

  fn clone_children_into(
    &mut self,
    source: NodeId,
    copy: NodeId,
    doc: NodeId,
    deep: bool,
  ) -> Result<NodeId> {
    if deep {
      for child in self.child_ids(source) {
        let child_copy = self.clone_into(child, Some(doc), true)?;
        self.link_before(copy, child_copy, None);
      }
    }
    Ok(copy)
  }

  /// `isEqualNode`: same kind, same variant fields, attribute sets equal
  /// (order-insensitive), children pairwise equal in order.
  pub fn is_equal_node(&self, a: NodeId, b: NodeId) -> bool {
    let equal_shallow = match (&self.node(a).data, &self.node(b).data) {
      (NodeData::Document(_), NodeData::Document(_)) => true,
      (NodeData::DocumentFragment, NodeData::DocumentFragment) => true,
      (NodeData::ShadowRoot(_), NodeData::ShadowRoot(_)) => true,
      (NodeData::DocumentType(x), NodeData::DocumentType(y)) => {
        x.name == y.name && x.public_id == y.public_id && x.system_id == y.system_id
      }
      (NodeData::Element(x), NodeData::Element(y)) => {
        x.name.namespace == y.name.namespace
          && x.name.prefix == y.name.prefix
          && x.name.local == y.name.local
          && x.attrs.len() == y.attrs.len()
          && x.attrs.iter().all(|&xa| {
            let xd = match self.as_attr(xa) {
              Some(d) => d,
              None => return false,
            };
            y.attrs.iter().any(|&ya| {
              self.as_attr(ya).is_some_and(|yd| {
                yd.name.namespace == xd.name.namespace
                  && yd.name.local == xd.name.local
                  && yd.value == xd.value
              })
            })
          })
      }
      (NodeData::Attribute(x), NodeData::Attribute(y)) => {
        x.name.namespace == y.name.namespace && x.name.local == y.name.local && x.value == y.value
      }
      (NodeData::Text(x), NodeData::Text(y)) => x.data == y.data,
      (NodeData::CdataSection(x), NodeData::CdataSection(y)) => x.data == y.data,
      (NodeData::Comment(x), NodeData::Comment(y)) => x.data == y.data,
      (NodeData::ProcessingInstruction(x), NodeData::ProcessingInstruction(y)) => {
        x.target == y.target && x.data == y.data
      }
      _ => false,
    };
    if !equal_shallow {
      return false;
    }
    let children_a = self.child_ids(a);
    let children_b = self.child_ids(b);
    children_a.len() == children_b.len()
      && children_a
        .iter()
        .zip(children_b.iter())
        .all(|(&ca, &cb)| self.is_equal_node(ca, cb))
  }

  /// `isSameNode` is handle identity.
  pub fn is_same_node(&self, a: NodeId, b: NodeId) -> bool {
    a == b
  }

  // -- normalize / text content --------------------------------------------

  /// `normalize()`: merge runs of contiguous exclusive Text descendants into
  /// the run head and drop empty Text nodes, rehoming live-range boundaries
  /// along the way.
  pub fn normalize(&mut self, node: NodeId) -> Result<()> {
    let candidates: Vec<NodeId> = self
      .descendants(node, false)
      .into_iter()
      .filter(|&d| self.is_text(d))
      .collect();
    for text in candidates {
      if !self.is_alive(text) || self.parent(text).is_none() || !self.is_text(text) {
        continue;
      }
      let mut length = self.length(text);
      if length == 0 {
        self.remove_node(text, false);
        continue;
      }
      if self.previous_sibling(text).is_some_and(|p| self.is_text(p)) {
        // Not a run head; the head's pass handles it.
        continue;
      }

      let mut merged = String::new();
      let mut cursor = self.next_sibling(text);
      while let Some(current) = cursor {
        if !self.is_text(current) {
          break;
        }
        merged.push_str(self.character_data(current).unwrap_or_default());
        cursor = self.next_sibling(current);
      }
      if merged.is_empty() && !self.next_sibling(text).is_some_and(|n| self.is_text(n)) {
        continue;
      }
      self.replace_data(text, length, 0, &merged)?;

      let doc = self.owner_document(text);
      let parent = self.parent(text);
      let mut cursor = self.next_sibling(text);
      while let Some(current) = cursor {
        if !self.is_text(current) {
          break;
        }
        let current_index = self.index(current);
        let current_length = self.length(current);
        for range_id in self.live_range_ids(doc) {
          if let Some(range) = self.ranges.get_mut(range_id.0) {
            if range.start.node == current {
              range.start.node = text;
              range.start.offset += length;
            }
            if range.end.node == current {
              range.end.node = text;
              range.end.offset += length;
            }
            if Some(range.start.node) == parent && range.start.offset == current_index {
              range.start.node = text;
              range.start.offset = length;
            }
            if Some(range.end.node) == parent && range.end.offset == current_index {
              range.end.node = text;
              range.end.offset = length;
            }
          }
        }
        length += current_length;
        cursor = self.next_sibling(current);
      }

      loop {
        let next = self.next_sibling(text);
        match next {
          Some(sibling) if self.is_text(sibling) => self.remove_node(sibling, false),
          _ => break,
        }
      }
    }
    Ok(())
  }

  /// `textContent` getter.
  pub fn text_content(&self, node: NodeId) -> Option<String> {
    match &self.node(node).data {
      NodeData::Element(_) | NodeData::DocumentFragment | NodeData::ShadowRoot(_) => {
        let mut out = String::new();
        for descendant in self.descendants(node, false) {
          match &self.node(descendant).data {
            NodeData::Text(cd) | NodeData::CdataSection(cd) => out.push_str(&cd.data),
            _ => {}
          }
        }
        Some(out)
      }
      NodeData::Attribute(attr) => Some(attr.value.clone()),
      NodeData::Text(cd) | NodeData::CdataSection(cd) | NodeData::Comment(cd) => {
        Some(cd.data.clone())
      }
      NodeData::ProcessingInstruction(pi) => Some(pi.data.clone()),
      NodeData::Document(_) | NodeData::DocumentType(_) => None,
    }
  }

  /// `textContent` setter.
  pub fn set_text_content(&mut self, node: NodeId, value: &str) -> Result<()> {
    match self.node(node).data {
      NodeData::Element(_) | NodeData::DocumentFragment | NodeData::ShadowRoot(_) => {
        let replacement = if value.is_empty() {
          None
        } else {
          let doc = self.owner_document(node);
          Some(self.create_text(doc, value))
        };
        self.replace_all(replacement, node);
        Ok(())
      }
      NodeData::Text(_)
      | NodeData::CdataSection(_)
      | NodeData::Comment(_)
      | NodeData::ProcessingInstruction(_) => {
        let length = self.length(node);
        self.replace_data(node, 0, length, value)
      }
      NodeData::Attribute(_) => self.set_attribute_value(node, value),
      NodeData::Document(_) | NodeData::DocumentType(_) => Ok(()),
    }
  }

  // -- registries and hooks ------------------------------------------------

  pub(crate) fn live_range_ids(&self, doc: NodeId) -> Vec<crate::node::RangeId> {
    match &self.node(doc).data {
      NodeData::Document(DocumentData { live_ranges, .. }) => live_ranges.clone(),
      _ => Vec::new(),
    }
  }

  pub(crate) fn live_iterator_ids(&self, doc: NodeId) -> Vec<crate::node::IteratorId> {
    match &self.node(doc).data {
      NodeData::Document(DocumentData { live_iterators, .. }) => live_iterators.clone(),
      _ => Vec::new(),
    }
  }

  /// Child text content changed under `parent`. Hook point for style/layout
  /// invalidation layers; the core only traces it.
  pub(crate) fn child_text_changed(&self, parent: NodeId) {
    log::trace!("child text content changed under {:?}", parent);
  }

  /// Per-node insertion steps (custom-element wiring lives outside the core).
  fn run_insertion_steps(&self, node: NodeId) {
    log::trace!("insertion steps for {:?}", node);
  }

  fn run_removing_steps(&self, node: NodeId, old_parent: NodeId) {
    log::trace!("removing steps for {:?} (was under {:?})", node, old_parent);
  }

  fn run_adopting_steps(&self, node: NodeId, old_doc: NodeId) {
    log::trace!("adopting steps for {:?} (from {:?})", node, old_doc);
  }
}
