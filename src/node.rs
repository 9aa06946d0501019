//! Node store
//!
//! Every node lives in a generational arena owned by [`Dom`]; handles are
//! [`NodeId`]s. The variant set is closed: each "switch on node type" in the
//! algorithms is an exhaustive `match`, so adding a variant forces every
//! algorithm to be revisited at compile time.
//!
//! Parent and sibling links are non-owning handles; the child chain
//! (`first_child`/`last_child` plus sibling links) is the single source of
//! truth for order. Attribute nodes are reachable only through their owner
//! element's attribute list and never participate in the child chain.

use crate::arena::Arena;
use crate::arena::RawId;
use crate::error::DomError;
use crate::error::Result;
use crate::event::ActivationBehavior;
use crate::event::ListenerEntry;
use crate::name::validate_and_extract;
use crate::name::validate_name;
use crate::name::QualifiedName;
use crate::name::HTML_NAMESPACE;
use crate::observer::RegisteredObserver;
use crate::queue::TaskQueue;
use crate::range::RangeState;
use crate::traversal::IteratorState;
use std::rc::Rc;

/// Handle to a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) RawId);

/// Handle to a live range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeId(pub(crate) RawId);

/// Handle to a live node iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IteratorId(pub(crate) RawId);

/// WHATWG numeric node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NodeType {
  Element = 1,
  Attribute = 2,
  Text = 3,
  CdataSection = 4,
  ProcessingInstruction = 7,
  Comment = 8,
  Document = 9,
  DocumentType = 10,
  DocumentFragment = 11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowRootMode {
  Open,
  Closed,
}

/// Variant payloads. A `ShadowRoot` reports the `DocumentFragment` node type
/// but is a distinct variant so shadow-boundary logic stays exhaustive.
#[derive(Debug)]
pub enum NodeData {
  Document(DocumentData),
  DocumentType(DoctypeData),
  DocumentFragment,
  ShadowRoot(ShadowRootData),
  Element(ElementData),
  Attribute(AttrData),
  Text(CharData),
  CdataSection(CharData),
  Comment(CharData),
  ProcessingInstruction(PiData),
}

impl NodeData {
  pub fn node_type(&self) -> NodeType {
    match self {
      NodeData::Document(_) => NodeType::Document,
      NodeData::DocumentType(_) => NodeType::DocumentType,
      NodeData::DocumentFragment | NodeData::ShadowRoot(_) => NodeType::DocumentFragment,
      NodeData::Element(_) => NodeType::Element,
      NodeData::Attribute(_) => NodeType::Attribute,
      NodeData::Text(_) => NodeType::Text,
      NodeData::CdataSection(_) => NodeType::CdataSection,
      NodeData::Comment(_) => NodeType::Comment,
      NodeData::ProcessingInstruction(_) => NodeType::ProcessingInstruction,
    }
  }
}

/// Document payload: the document-scoped registries for live views.
#[derive(Debug, Default)]
pub struct DocumentData {
  pub(crate) live_ranges: Vec<RangeId>,
  pub(crate) live_iterators: Vec<IteratorId>,
}

#[derive(Debug, Clone)]
pub struct DoctypeData {
  pub name: String,
  pub public_id: String,
  pub system_id: String,
}

#[derive(Debug)]
pub struct ShadowRootData {
  pub host: NodeId,
  pub mode: ShadowRootMode,
  pub delegates_focus: bool,
}

#[derive(Debug)]
pub struct ElementData {
  pub name: QualifiedName,
  /// Attribute nodes, in set order. Owned here; attributes have no parent.
  pub attrs: Vec<NodeId>,
  pub shadow_root: Option<NodeId>,
  /// Assigned slotables, only populated when this element is a slot.
  pub assigned_nodes: Vec<NodeId>,
  pub(crate) activation: Option<ActivationBehavior>,
}

impl ElementData {
  fn new(name: QualifiedName) -> Self {
    Self {
      name,
      attrs: Vec::new(),
      shadow_root: None,
      assigned_nodes: Vec::new(),
      activation: None,
    }
  }
}

#[derive(Debug)]
pub struct AttrData {
  pub name: QualifiedName,
  pub value: String,
  pub owner: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct CharData {
  pub data: String,
}

#[derive(Debug, Clone)]
pub struct PiData {
  pub target: String,
  pub data: String,
}

/// One arena slot: tree links, owner document, payload, and the per-node
/// registration lists.
#[derive(Debug)]
pub(crate) struct NodeEntry {
  pub parent: Option<NodeId>,
  pub first_child: Option<NodeId>,
  pub last_child: Option<NodeId>,
  pub prev_sibling: Option<NodeId>,
  pub next_sibling: Option<NodeId>,
  /// `None` only for Document nodes, whose node document is themselves.
  pub owner_doc: Option<NodeId>,
  pub data: NodeData,
  pub assigned_slot: Option<NodeId>,
  pub listeners: Vec<Rc<ListenerEntry>>,
  pub observers: Vec<RegisteredObserver>,
  /// External-handle refcount; nonzero keeps a detached subtree alive.
  pub pins: u32,
}

impl NodeEntry {
  fn new(owner_doc: Option<NodeId>, data: NodeData) -> Self {
    Self {
      parent: None,
      first_child: None,
      last_child: None,
      prev_sibling: None,
      next_sibling: None,
      owner_doc,
      data,
      assigned_slot: None,
      listeners: Vec::new(),
      observers: Vec::new(),
      pins: 0,
    }
  }
}

/// The document model: node arena, live-view arenas, and the deferred task
/// queue. Every operation in the crate is a method on this type; all mutation
/// takes `&mut self`, which is what makes the single-logical-owner model hold.
#[derive(Debug)]
pub struct Dom {
  pub(crate) nodes: Arena<NodeEntry>,
  pub(crate) ranges: Arena<RangeState>,
  pub(crate) iterators: Arena<IteratorState>,
  pub(crate) queue: TaskQueue,
}

impl Default for Dom {
  fn default() -> Self {
    Self::new()
  }
}

impl Dom {
  pub fn new() -> Self {
    Self {
      nodes: Arena::new(),
      ranges: Arena::new(),
      iterators: Arena::new(),
      queue: TaskQueue::new(),
    }
  }

  // -- arena access -------------------------------------------------------

  pub(crate) fn node(&self, id: NodeId) -> &NodeEntry {
    self.nodes.get(id.0).expect("stale NodeId")
  }

  pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeEntry {
    self.nodes.get_mut(id.0).expect("stale NodeId")
  }

  /// Whether the handle still refers to a live node.
  pub fn is_alive(&self, id: NodeId) -> bool {
    self.nodes.contains(id.0)
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  fn alloc(&mut self, owner_doc: Option<NodeId>, data: NodeData) -> NodeId {
    NodeId(self.nodes.insert(NodeEntry::new(owner_doc, data)))
  }

  // -- factories ----------------------------------------------------------

  pub fn create_document(&mut self) -> NodeId {
    self.alloc(None, NodeData::Document(DocumentData::default()))
  }

  pub fn create_doctype(
    &mut self,
    doc: NodeId,
    name: &str,
    public_id: &str,
    system_id: &str,
  ) -> Result<NodeId> {
    validate_name(name)?;
    Ok(self.alloc(
      Some(doc),
      NodeData::DocumentType(DoctypeData {
        name: name.to_string(),
        public_id: public_id.to_string(),
        system_id: system_id.to_string(),
      }),
    ))
  }

  pub fn create_document_fragment(&mut self, doc: NodeId) -> NodeId {
    self.alloc(Some(doc), NodeData::DocumentFragment)
  }

  /// Create an element in the HTML namespace. The local name is
  /// ASCII-lowercased, matching HTML-document element creation.
  pub fn create_element(&mut self, doc: NodeId, local_name: &str) -> Result<NodeId> {
    validate_name(local_name)?;
    let name = QualifiedName {
      namespace: Some(HTML_NAMESPACE.to_string()),
      prefix: None,
      local: local_name.to_ascii_lowercase(),
    };
    Ok(self.alloc(Some(doc), NodeData::Element(ElementData::new(name))))
  }

  pub fn create_element_ns(
    &mut self,
    doc: NodeId,
    namespace: Option<&str>,
    qualified_name: &str,
  ) -> Result<NodeId> {
    let name = validate_and_extract(namespace, qualified_name)?;
    Ok(self.alloc(Some(doc), NodeData::Element(ElementData::new(name))))
  }

  pub fn create_text(&mut self, doc: NodeId, data: &str) -> NodeId {
    self.alloc(
      Some(doc),
      NodeData::Text(CharData {
        data: data.to_string(),
      }),
    )
  }

  pub fn create_cdata_section(&mut self, doc: NodeId, data: &str) -> Result<NodeId> {
    if data.contains("]]>") {
      return Err(DomError::InvalidCharacter {
        name: data.to_string(),
      });
    }
    Ok(self.alloc(
      Some(doc),
      NodeData::CdataSection(CharData {
        data: data.to_string(),
      }),
    ))
  }

  pub fn create_comment(&mut self, doc: NodeId, data: &str) -> NodeId {
    self.alloc(
      Some(doc),
      NodeData::Comment(CharData {
        data: data.to_string(),
      }),
    )
  }

  pub fn create_processing_instruction(
    &mut self,
    doc: NodeId,
    target: &str,
    data: &str,
  ) -> Result<NodeId> {
    validate_name(target)?;
    if data.contains("?>") {
      return Err(DomError::InvalidCharacter {
        name: data.to_string(),
      });
    }
    Ok(self.alloc(
      Some(doc),
      NodeData::ProcessingInstruction(PiData {
        target: target.to_string(),
        data: data.to_string(),
      }),
    ))
  }

  pub fn create_attribute(&mut self, doc: NodeId, local_name: &str) -> Result<NodeId> {
    validate_name(local_name)?;
    let name = QualifiedName {
      namespace: None,
      prefix: None,
      local: local_name.to_ascii_lowercase(),
    };
    Ok(self.alloc(
      Some(doc),
      NodeData::Attribute(AttrData {
        name,
        value: String::new(),
        owner: None,
      }),
    ))
  }

  /// Allocate an attribute node from an already-validated name.
  pub(crate) fn alloc_attribute(
    &mut self,
    doc: NodeId,
    name: QualifiedName,
    value: &str,
  ) -> NodeId {
    self.alloc(
      Some(doc),
      NodeData::Attribute(AttrData {
        name,
        value: value.to_string(),
        owner: None,
      }),
    )
  }

  pub fn create_attribute_ns(
    &mut self,
    doc: NodeId,
    namespace: Option<&str>,
    qualified_name: &str,
  ) -> Result<NodeId> {
    let name = validate_and_extract(namespace, qualified_name)?;
    Ok(self.alloc(
      Some(doc),
      NodeData::Attribute(AttrData {
        name,
        value: String::new(),
        owner: None,
      }),
    ))
  }

  // -- basic accessors ----------------------------------------------------

  pub fn node_type(&self, id: NodeId) -> NodeType {
    self.node(id).data.node_type()
  }

  pub fn data(&self, id: NodeId) -> &NodeData {
    &self.node(id).data
  }

  pub fn parent(&self, id: NodeId) -> Option<NodeId> {
    self.node(id).parent
  }

  pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
    self.node(id).first_child
  }

  pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
    self.node(id).last_child
  }

  pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
    self.node(id).next_sibling
  }

  pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
    self.node(id).prev_sibling
  }

  /// The node document. A document's node document is itself.
  pub fn owner_document(&self, id: NodeId) -> NodeId {
    self.node(id).owner_doc.unwrap_or(id)
  }

  pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut cursor = self.first_child(id);
    while let Some(child) = cursor {
      out.push(child);
      cursor = self.next_sibling(child);
    }
    out
  }

  pub fn child_count(&self, id: NodeId) -> usize {
    let mut count = 0;
    let mut cursor = self.first_child(id);
    while let Some(child) = cursor {
      count += 1;
      cursor = self.next_sibling(child);
    }
    count
  }

  pub fn has_children(&self, id: NodeId) -> bool {
    self.first_child(id).is_some()
  }

  /// Node "length": children for container nodes, scalar-value count of the
  /// payload for character data, zero for doctypes and attributes.
  pub fn length(&self, id: NodeId) -> u32 {
    match &self.node(id).data {
      NodeData::DocumentType(_) | NodeData::Attribute(_) => 0,
      NodeData::Text(cd) | NodeData::CdataSection(cd) | NodeData::Comment(cd) => {
        cd.data.chars().count() as u32
      }
      NodeData::ProcessingInstruction(pi) => pi.data.chars().count() as u32,
      NodeData::Document(_)
      | NodeData::DocumentFragment
      | NodeData::ShadowRoot(_)
      | NodeData::Element(_) => self.child_count(id) as u32,
    }
  }

  pub fn node_name(&self, id: NodeId) -> String {
    match &self.node(id).data {
      NodeData::Document(_) => "#document".to_string(),
      NodeData::DocumentType(dt) => dt.name.clone(),
      NodeData::DocumentFragment | NodeData::ShadowRoot(_) => "#document-fragment".to_string(),
      NodeData::Element(el) => {
        let qualified = el.name.qualified();
        if el.name.namespace.as_deref() == Some(HTML_NAMESPACE) {
          qualified.to_ascii_uppercase()
        } else {
          qualified
        }
      }
      NodeData::Attribute(attr) => attr.name.qualified(),
      NodeData::Text(_) => "#text".to_string(),
      NodeData::CdataSection(_) => "#cdata-section".to_string(),
      NodeData::Comment(_) => "#comment".to_string(),
      NodeData::ProcessingInstruction(pi) => pi.target.clone(),
    }
  }

  pub fn node_value(&self, id: NodeId) -> Option<String> {
    match &self.node(id).data {
      NodeData::Attribute(attr) => Some(attr.value.clone()),
      NodeData::Text(cd) | NodeData::CdataSection(cd) | NodeData::Comment(cd) => {
        Some(cd.data.clone())
      }
      NodeData::ProcessingInstruction(pi) => Some(pi.data.clone()),
      NodeData::Document(_)
      | NodeData::DocumentType(_)
      | NodeData::DocumentFragment
      | NodeData::ShadowRoot(_)
      | NodeData::Element(_) => None,
    }
  }

  // -- typed helpers ------------------------------------------------------

  pub fn is_element(&self, id: NodeId) -> bool {
    matches!(self.node(id).data, NodeData::Element(_))
  }

  pub fn is_text(&self, id: NodeId) -> bool {
    matches!(self.node(id).data, NodeData::Text(_))
  }

  pub fn is_document(&self, id: NodeId) -> bool {
    matches!(self.node(id).data, NodeData::Document(_))
  }

  pub fn is_shadow_root(&self, id: NodeId) -> bool {
    matches!(self.node(id).data, NodeData::ShadowRoot(_))
  }

  /// Character-data family: Text, CDATA, Comment. Processing instructions
  /// share the payload operations but are excluded from sibling text merging.
  pub fn is_character_data(&self, id: NodeId) -> bool {
    matches!(
      self.node(id).data,
      NodeData::Text(_)
        | NodeData::CdataSection(_)
        | NodeData::Comment(_)
        | NodeData::ProcessingInstruction(_)
    )
  }

  pub fn as_element(&self, id: NodeId) -> Option<&ElementData> {
    match &self.node(id).data {
      NodeData::Element(el) => Some(el),
      _ => None,
    }
  }

  pub(crate) fn as_element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
    match &mut self.node_mut(id).data {
      NodeData::Element(el) => Some(el),
      _ => None,
    }
  }

  pub fn as_attr(&self, id: NodeId) -> Option<&AttrData> {
    match &self.node(id).data {
      NodeData::Attribute(attr) => Some(attr),
      _ => None,
    }
  }

  pub(crate) fn as_attr_mut(&mut self, id: NodeId) -> Option<&mut AttrData> {
    match &mut self.node_mut(id).data {
      NodeData::Attribute(attr) => Some(attr),
      _ => None,
    }
  }

  pub fn as_shadow_root(&self, id: NodeId) -> Option<&ShadowRootData> {
    match &self.node(id).data {
      NodeData::ShadowRoot(sr) => Some(sr),
      _ => None,
    }
  }

  pub(crate) fn document_data(&self, doc: NodeId) -> &DocumentData {
    match &self.node(doc).data {
      NodeData::Document(dd) => dd,
      _ => panic!("node is not a document"),
    }
  }

  pub(crate) fn document_data_mut(&mut self, doc: NodeId) -> &mut DocumentData {
    match &mut self.node_mut(doc).data {
      NodeData::Document(dd) => dd,
      _ => panic!("node is not a document"),
    }
  }

  /// Character payload for Text/CDATA/Comment/PI nodes.
  pub fn character_data(&self, id: NodeId) -> Option<&str> {
    match &self.node(id).data {
      NodeData::Text(cd) | NodeData::CdataSection(cd) | NodeData::Comment(cd) => Some(&cd.data),
      NodeData::ProcessingInstruction(pi) => Some(&pi.data),
      _ => None,
    }
  }

  pub(crate) fn character_data_mut(&mut self, id: NodeId) -> Option<&mut String> {
    match &mut self.node_mut(id).data {
      NodeData::Text(cd) | NodeData::CdataSection(cd) | NodeData::Comment(cd) => Some(&mut cd.data),
      NodeData::ProcessingInstruction(pi) => Some(&mut pi.data),
      _ => None,
    }
  }

  /// The document element (first and only Element child of a document).
  pub fn document_element(&self, doc: NodeId) -> Option<NodeId> {
    self.child_ids(doc).into_iter().find(|&c| self.is_element(c))
  }

  /// The doctype child of a document, if any.
  pub fn doctype(&self, doc: NodeId) -> Option<NodeId> {
    self
      .child_ids(doc)
      .into_iter()
      .find(|&c| matches!(self.node(c).data, NodeData::DocumentType(_)))
  }

  // -- lifecycle ----------------------------------------------------------

  /// Take an external pin on a node, keeping its detached subtree alive
  /// across [`Dom::collect_garbage`].
  pub fn pin(&mut self, id: NodeId) {
    self.node_mut(id).pins += 1;
  }

  pub fn unpin(&mut self, id: NodeId) {
    let entry = self.node_mut(id);
    debug_assert!(entry.pins > 0, "unbalanced unpin");
    entry.pins = entry.pins.saturating_sub(1);
  }

  /// Free detached subtrees that no external holder can still reach: no pin
  /// inside, not a document tree, and no live range or iterator referencing
  /// anything inside. Attribute nodes of kept elements are kept.
  ///
  /// Returns the number of nodes freed.
  pub fn collect_garbage(&mut self) -> usize {
    use rustc_hash::FxHashSet;

    let mut keep_roots: FxHashSet<NodeId> = FxHashSet::default();
    for (raw, entry) in self.nodes.iter() {
      let id = NodeId(raw);
      if matches!(entry.data, NodeData::Document(_)) || entry.pins > 0 {
        keep_roots.insert(self.detached_root(id));
      }
    }
    for (_, range) in self.ranges.iter() {
      keep_roots.insert(self.detached_root(range.start.node));
      keep_roots.insert(self.detached_root(range.end.node));
    }
    for (_, iter) in self.iterators.iter() {
      keep_roots.insert(self.detached_root(iter.root));
      keep_roots.insert(self.detached_root(iter.reference));
    }

    let mut keep: FxHashSet<NodeId> = FxHashSet::default();
    for root in keep_roots {
      self.mark_kept(root, &mut keep);
    }

    let doomed: Vec<NodeId> = self
      .nodes
      .ids()
      .into_iter()
      .map(NodeId)
      .filter(|id| !keep.contains(id))
      .collect();
    for &id in &doomed {
      self.nodes.remove(id.0);
    }
    log::debug!("collect_garbage freed {} nodes", doomed.len());
    doomed.len()
  }

  /// Walk to the top of the tree this node currently sits in, treating an
  /// attribute's owner element as its attachment point.
  fn detached_root(&self, id: NodeId) -> NodeId {
    let mut current = id;
    loop {
      let entry = self.node(current);
      let up = match &entry.data {
        NodeData::Attribute(attr) => attr.owner.or(entry.parent),
        _ => entry.parent,
      };
      match up {
        Some(parent) => current = parent,
        None => return current,
      }
    }
  }

  fn mark_kept(&self, id: NodeId, keep: &mut rustc_hash::FxHashSet<NodeId>) {
    if !keep.insert(id) {
      return;
    }
    if let NodeData::Element(el) = &self.node(id).data {
      for &attr in &el.attrs {
        keep.insert(attr);
      }
      if let Some(shadow) = el.shadow_root {
        self.mark_kept(shadow, keep);
      }
    }
    for child in self.child_ids(id) {
      self.mark_kept(child, keep);
    }
  }
}
