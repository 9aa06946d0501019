//! Shadow trees and slot assignment
//!
//! Named slot assignment only: a slotable (element or text child of a shadow
//! host) resolves to the first slot in the host's shadow tree whose name
//! matches the slotable's `slot` attribute. Assignment is recomputed
//! incrementally by the mutation engine; any observable change signals the
//! slot through the deferred task queue.

use crate::error::DomError;
use crate::error::Result;
use crate::name::HTML_NAMESPACE;
use crate::node::Dom;
use crate::node::NodeData;
use crate::node::NodeId;
use crate::node::ShadowRootData;
use crate::node::ShadowRootMode;

/// `attachShadow` parameters.
#[derive(Debug, Clone, Copy)]
pub struct ShadowRootInit {
  pub mode: ShadowRootMode,
  pub delegates_focus: bool,
}

impl ShadowRootInit {
  pub fn open() -> Self {
    Self {
      mode: ShadowRootMode::Open,
      delegates_focus: false,
    }
  }

  pub fn closed() -> Self {
    Self {
      mode: ShadowRootMode::Closed,
      delegates_focus: false,
    }
  }
}

const SHADOW_HOST_NAMES: &[&str] = &[
  "article", "aside", "blockquote", "body", "div", "footer", "h1", "h2", "h3", "h4", "h5", "h6",
  "header", "main", "nav", "p", "section", "span",
];

fn is_valid_custom_element_name(name: &str) -> bool {
  let mut chars = name.chars();
  matches!(chars.next(), Some('a'..='z')) && name.contains('-') && !name.contains(char::is_uppercase)
}

impl Dom {
  /// Attach a shadow root to `host`. Fails with `NotSupported` when the host
  /// is not an HTML element with a shadow-permitting name, or already has a
  /// shadow root.
  pub fn attach_shadow(&mut self, host: NodeId, init: ShadowRootInit) -> Result<NodeId> {
    let el = self
      .as_element(host)
      .ok_or_else(|| DomError::NotSupported("only elements can host shadow trees".to_string()))?;
    if el.name.namespace.as_deref() != Some(HTML_NAMESPACE) {
      return Err(DomError::NotSupported(
        "shadow hosts must be HTML elements".to_string(),
      ));
    }
    let local = el.name.local.clone();
    if !SHADOW_HOST_NAMES.contains(&local.as_str()) && !is_valid_custom_element_name(&local) {
      return Err(DomError::NotSupported(format!(
        "'{}' cannot host a shadow tree",
        local
      )));
    }
    if el.shadow_root.is_some() {
      return Err(DomError::NotSupported(
        "element already hosts a shadow tree".to_string(),
      ));
    }

    let doc = self.owner_document(host);
    let shadow = NodeId(self.nodes_insert_shadow(doc, host, init));
    if let Some(el) = self.as_element_mut(host) {
      el.shadow_root = Some(shadow);
    }
    log::debug!("attached {:?} shadow root {:?} to {:?}", init.mode, shadow, host);
    Ok(shadow)
  }

  fn nodes_insert_shadow(
    &mut self,
    doc: NodeId,
    host: NodeId,
    init: ShadowRootInit,
  ) -> crate::arena::RawId {
    let shadow = self.create_document_fragment(doc);
    // Rebuild the fragment slot as a shadow root; keeps allocation in one
    // place without a dedicated factory on the public surface.
    self.node_mut(shadow).data = NodeData::ShadowRoot(ShadowRootData {
      host,
      mode: init.mode,
      delegates_focus: init.delegates_focus,
    });
    shadow.0
  }

  /// The host's shadow root regardless of mode.
  pub(crate) fn any_shadow_root(&self, host: NodeId) -> Option<NodeId> {
    self.as_element(host).and_then(|el| el.shadow_root)
  }

  /// The host's shadow root if its mode is open (`Element.shadowRoot`).
  pub fn open_shadow_root(&self, host: NodeId) -> Option<NodeId> {
    let shadow = self.any_shadow_root(host)?;
    match self.as_shadow_root(shadow)?.mode {
      ShadowRootMode::Open => Some(shadow),
      ShadowRootMode::Closed => None,
    }
  }

  pub fn is_shadow_host(&self, node: NodeId) -> bool {
    self.any_shadow_root(node).is_some()
  }

  // -- slot identity -------------------------------------------------------

  /// An HTML `slot` element.
  pub fn is_slot(&self, node: NodeId) -> bool {
    self.as_element(node).is_some_and(|el| {
      el.name.namespace.as_deref() == Some(HTML_NAMESPACE) && el.name.local == "slot"
    })
  }

  /// A slot's name: its `name` attribute, defaulting to the empty string.
  pub fn slot_name(&self, slot: NodeId) -> String {
    self.get_attribute(slot, "name").unwrap_or_default()
  }

  /// Elements and Text nodes are slotables.
  pub fn is_slotable(&self, node: NodeId) -> bool {
    matches!(self.node(node).data, NodeData::Element(_) | NodeData::Text(_))
  }

  /// A slotable's requested slot name: its `slot` attribute for elements,
  /// the empty string for text.
  pub fn slotable_name(&self, node: NodeId) -> String {
    if self.is_element(node) {
      self.get_attribute(node, "slot").unwrap_or_default()
    } else {
      String::new()
    }
  }

  /// The slot this node is assigned to, honoring closed-mode opacity
  /// (`assignedSlot` in the DOM API). Reads the committed assignment link;
  /// resolution happens only inside the assignment algorithms.
  pub fn assigned_slot(&self, node: NodeId) -> Option<NodeId> {
    let slot = self.node(node).assigned_slot?;
    let root = self.root(slot);
    match self.as_shadow_root(root)?.mode {
      ShadowRootMode::Open => Some(slot),
      ShadowRootMode::Closed => None,
    }
  }

  pub(crate) fn raw_assigned_slot(&self, node: NodeId) -> Option<NodeId> {
    self.node(node).assigned_slot
  }

  // -- slot resolution -----------------------------------------------------

  /// Find the slot a slotable resolves to: the first slot in document order
  /// within the parent's shadow root whose name matches.
  pub(crate) fn find_a_slot(&self, slotable: NodeId) -> Option<NodeId> {
    if !self.is_slotable(slotable) {
      return None;
    }
    let parent = self.parent(slotable)?;
    let shadow = self.any_shadow_root(parent)?;
    let wanted = self.slotable_name(slotable);
    self
      .inclusive_descendants(shadow, false)
      .into_iter()
      .find(|&node| self.is_slot(node) && self.slot_name(node) == wanted)
  }

  /// The host children currently resolving to `slot`, in tree order.
  pub fn find_slotables(&self, slot: NodeId) -> Vec<NodeId> {
    if !self.is_slot(slot) {
      return Vec::new();
    }
    let root = self.root(slot);
    let host = match self.as_shadow_root(root) {
      Some(sr) => sr.host,
      None => return Vec::new(),
    };
    self
      .child_ids(host)
      .into_iter()
      .filter(|&child| self.is_slotable(child) && self.find_a_slot(child) == Some(slot))
      .collect()
  }

  /// Flattened assignment: assigned slotables, or fallback children, with
  /// nested slots expanded recursively.
  pub fn find_flattened_slotables(&self, slot: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    if !self.is_slot(slot) || !self.is_shadow_root(self.root(slot)) {
      return result;
    }
    let mut slotables = self.find_slotables(slot);
    if slotables.is_empty() {
      slotables = self
        .child_ids(slot)
        .into_iter()
        .filter(|&child| self.is_slotable(child))
        .collect();
    }
    for node in slotables {
      if self.is_slot(node) && self.is_shadow_root(self.root(node)) {
        result.extend(self.find_flattened_slotables(node));
      } else {
        result.push(node);
      }
    }
    result
  }

  // -- assignment ----------------------------------------------------------

  /// Recompute `slot`'s assignment; when the element-wise result differs from
  /// the previous assignment, signal the slot *before* committing the new
  /// assignment and back-pointers.
  pub(crate) fn assign_slotables(&mut self, slot: NodeId) {
    let slotables = self.find_slotables(slot);
    let previous = match self.as_element(slot) {
      Some(el) => el.assigned_nodes.clone(),
      None => return,
    };
    if slotables != previous {
      self.signal_a_slot_change(slot);
    }
    for &stale in &previous {
      if !slotables.contains(&stale) && self.is_alive(stale) {
        if self.node(stale).assigned_slot == Some(slot) {
          self.node_mut(stale).assigned_slot = None;
        }
      }
    }
    for &slotable in &slotables {
      self.node_mut(slotable).assigned_slot = Some(slot);
    }
    if let Some(el) = self.as_element_mut(slot) {
      el.assigned_nodes = slotables;
    }
  }

  /// Recompute every slot in `root`'s inclusive subtree, in tree order.
  pub(crate) fn assign_slotables_for_tree(&mut self, root: NodeId) {
    for node in self.inclusive_descendants(root, false) {
      if self.is_slot(node) {
        self.assign_slotables(node);
      }
    }
  }

  /// Route a slotable to its slot, if any.
  pub(crate) fn assign_a_slot(&mut self, slotable: NodeId) {
    if let Some(slot) = self.find_a_slot(slotable) {
      self.assign_slotables(slot);
    }
  }

  pub(crate) fn signal_a_slot_change(&mut self, slot: NodeId) {
    log::trace!("slot change signaled for {:?}", slot);
    self.queue.signal_slot(slot);
  }

  /// The assigned nodes currently committed on a slot.
  pub fn assigned_nodes(&self, slot: NodeId) -> Vec<NodeId> {
    self
      .as_element(slot)
      .map(|el| el.assigned_nodes.clone())
      .unwrap_or_default()
  }
}
