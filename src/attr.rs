//! Attributes
//!
//! Attribute get/set/remove by qualified name and by namespace + local name,
//! attribute-node operations, and the change-notification hooks every write
//! path funnels through: observer records with old values, and the slot
//! reassignment steps for `slot`/`name` attribute changes.
//!
//! Qualified-name lookups on HTML-namespace elements are ASCII-lowercased,
//! matching HTML-document behavior in the WHATWG model.

use crate::error::DomError;
use crate::error::Result;
use crate::name::validate_and_extract;
use crate::name::validate_name;
use crate::name::QualifiedName;
use crate::name::HTML_NAMESPACE;
use crate::name::XMLNS_NAMESPACE;
use crate::node::Dom;
use crate::node::NodeData;
use crate::node::NodeId;
use crate::observer::RecordRequest;

impl Dom {
  fn lookup_qualified(&self, element: NodeId, qualified_name: &str) -> Option<NodeId> {
    let el = self.as_element(element)?;
    let html = el.name.namespace.as_deref() == Some(HTML_NAMESPACE);
    let wanted = if html {
      qualified_name.to_ascii_lowercase()
    } else {
      qualified_name.to_string()
    };
    el.attrs.iter().copied().find(|&attr| {
      self
        .as_attr(attr)
        .is_some_and(|data| data.name.qualified() == wanted)
    })
  }

  fn lookup_ns_local(&self, element: NodeId, ns: Option<&str>, local: &str) -> Option<NodeId> {
    let el = self.as_element(element)?;
    let ns = match ns {
      Some("") | None => None,
      Some(ns) => Some(ns),
    };
    el.attrs.iter().copied().find(|&attr| {
      self
        .as_attr(attr)
        .is_some_and(|data| data.name.namespace.as_deref() == ns && data.name.local == local)
    })
  }

  // -- reads --------------------------------------------------------------

  pub fn get_attribute(&self, element: NodeId, qualified_name: &str) -> Option<String> {
    let attr = self.lookup_qualified(element, qualified_name)?;
    Some(self.as_attr(attr)?.value.clone())
  }

  pub fn get_attribute_ns(
    &self,
    element: NodeId,
    namespace: Option<&str>,
    local_name: &str,
  ) -> Option<String> {
    let attr = self.lookup_ns_local(element, namespace, local_name)?;
    Some(self.as_attr(attr)?.value.clone())
  }

  pub fn get_attribute_node(&self, element: NodeId, qualified_name: &str) -> Option<NodeId> {
    self.lookup_qualified(element, qualified_name)
  }

  pub fn get_attribute_node_ns(
    &self,
    element: NodeId,
    namespace: Option<&str>,
    local_name: &str,
  ) -> Option<NodeId> {
    self.lookup_ns_local(element, namespace, local_name)
  }

  pub fn has_attribute(&self, element: NodeId, qualified_name: &str) -> bool {
    self.lookup_qualified(element, qualified_name).is_some()
  }

  pub fn has_attribute_ns(
    &self,
    element: NodeId,
    namespace: Option<&str>,
    local_name: &str,
  ) -> bool {
    self.lookup_ns_local(element, namespace, local_name).is_some()
  }

  pub fn has_attributes(&self, element: NodeId) -> bool {
    self.as_element(element).is_some_and(|el| !el.attrs.is_empty())
  }

  /// Attribute qualified names in set order.
  pub fn attribute_names(&self, element: NodeId) -> Vec<String> {
    match self.as_element(element) {
      Some(el) => el
        .attrs
        .iter()
        .filter_map(|&attr| self.as_attr(attr).map(|data| data.name.qualified()))
        .collect(),
      None => Vec::new(),
    }
  }

  // -- writes -------------------------------------------------------------

  /// `setAttribute`: validates the name, lowercases for HTML elements, and
  /// either changes the existing attribute or appends a new one.
  pub fn set_attribute(&mut self, element: NodeId, qualified_name: &str, value: &str) -> Result<()> {
    validate_name(qualified_name)?;
    self.expect_element(element)?;
    if let Some(attr) = self.lookup_qualified(element, qualified_name) {
      return self.change_attribute(attr, value);
    }
    let html = self
      .as_element(element)
      .is_some_and(|el| el.name.namespace.as_deref() == Some(HTML_NAMESPACE));
    let local = if html {
      qualified_name.to_ascii_lowercase()
    } else {
      qualified_name.to_string()
    };
    let doc = self.owner_document(element);
    let attr = self.create_attribute_with_name(
      doc,
      QualifiedName {
        namespace: None,
        prefix: None,
        local,
      },
      value,
    );
    self.append_attribute(element, attr);
    Ok(())
  }

  pub fn set_attribute_ns(
    &mut self,
    element: NodeId,
    namespace: Option<&str>,
    qualified_name: &str,
    value: &str,
  ) -> Result<()> {
    let name = validate_and_extract(namespace, qualified_name)?;
    self.expect_element(element)?;
    if let Some(attr) = self.lookup_ns_local(element, name.namespace.as_deref(), &name.local) {
      return self.change_attribute(attr, value);
    }
    let doc = self.owner_document(element);
    let attr = self.create_attribute_with_name(doc, name, value);
    self.append_attribute(element, attr);
    Ok(())
  }

  /// `removeAttribute`. Removing a missing attribute is a no-op.
  pub fn remove_attribute(&mut self, element: NodeId, qualified_name: &str) -> Option<NodeId> {
    let attr = self.lookup_qualified(element, qualified_name)?;
    self.detach_attribute(attr);
    Some(attr)
  }

  pub fn remove_attribute_ns(
    &mut self,
    element: NodeId,
    namespace: Option<&str>,
    local_name: &str,
  ) -> Option<NodeId> {
    let attr = self.lookup_ns_local(element, namespace, local_name)?;
    self.detach_attribute(attr);
    Some(attr)
  }

  /// `toggleAttribute`: returns whether the attribute is present afterwards.
  pub fn toggle_attribute(
    &mut self,
    element: NodeId,
    qualified_name: &str,
    force: Option<bool>,
  ) -> Result<bool> {
    validate_name(qualified_name)?;
    self.expect_element(element)?;
    let present = self.has_attribute(element, qualified_name);
    match (present, force) {
      (false, Some(false)) => Ok(false),
      (false, _) => {
        self.set_attribute(element, qualified_name, "")?;
        Ok(true)
      }
      (true, None) | (true, Some(false)) => {
        self.remove_attribute(element, qualified_name);
        Ok(false)
      }
      (true, Some(true)) => Ok(true),
    }
  }

  /// `setAttributeNode`/`setAttributeNodeNS`: replaces any attribute with the
  /// same namespace and local name, returning the replaced node.
  pub fn set_attribute_node(&mut self, element: NodeId, attr: NodeId) -> Result<Option<NodeId>> {
    self.expect_element(element)?;
    let (ns, local, owner) = {
      let data = self
        .as_attr(attr)
        .ok_or_else(|| DomError::not_found("node is not an attribute"))?;
      (data.name.namespace.clone(), data.name.local.clone(), data.owner)
    };
    if let Some(owner) = owner {
      if owner != element {
        return Err(DomError::InvalidState(
          "attribute is in use by another element".to_string(),
        ));
      }
      return Ok(Some(attr));
    }
    let old = self.lookup_ns_local(element, ns.as_deref(), &local);
    if let Some(old) = old {
      self.replace_attribute(element, old, attr);
      return Ok(Some(old));
    }
    self.append_attribute(element, attr);
    Ok(None)
  }

  pub fn remove_attribute_node(&mut self, element: NodeId, attr: NodeId) -> Result<NodeId> {
    let owned = self
      .as_attr(attr)
      .and_then(|data| data.owner)
      .is_some_and(|owner| owner == element);
    if !owned {
      return Err(DomError::not_found("attribute not owned by element"));
    }
    self.detach_attribute(attr);
    Ok(attr)
  }

  /// Set an attribute node's value directly (`Attr.value`).
  pub fn set_attribute_value(&mut self, attr: NodeId, value: &str) -> Result<()> {
    if self.as_attr(attr).is_none() {
      return Err(DomError::not_found("node is not an attribute"));
    }
    self.change_attribute(attr, value)
  }

  // -- internals ----------------------------------------------------------

  fn expect_element(&self, element: NodeId) -> Result<()> {
    if self.is_element(element) {
      Ok(())
    } else {
      Err(DomError::hierarchy("attributes live on elements"))
    }
  }

  fn create_attribute_with_name(
    &mut self,
    doc: NodeId,
    name: QualifiedName,
    value: &str,
  ) -> NodeId {
    // Name was already validated by the caller.
    self.alloc_attribute(doc, name, value)
  }

  /// Change an existing attribute's value, with full notification.
  fn change_attribute(&mut self, attr: NodeId, value: &str) -> Result<()> {
    let (owner, old) = {
      let data = self
        .as_attr(attr)
        .ok_or_else(|| DomError::not_found("node is not an attribute"))?;
      (data.owner, data.value.clone())
    };
    if let Some(element) = owner {
      self.notify_attribute_change(element, attr, Some(old), Some(value.to_string()));
    }
    if let Some(data) = self.as_attr_mut(attr) {
      data.value = value.to_string();
    }
    Ok(())
  }

  pub(crate) fn append_attribute(&mut self, element: NodeId, attr: NodeId) {
    self.notify_attribute_change(element, attr, None, {
      self.as_attr(attr).map(|data| data.value.clone())
    });
    if let Some(data) = self.as_attr_mut(attr) {
      data.owner = Some(element);
    }
    if let Some(el) = self.as_element_mut(element) {
      el.attrs.push(attr);
    }
  }

  fn replace_attribute(&mut self, element: NodeId, old: NodeId, new: NodeId) {
    let old_value = self.as_attr(old).map(|data| data.value.clone());
    let new_value = self.as_attr(new).map(|data| data.value.clone());
    self.notify_attribute_change(element, new, old_value, new_value);
    if let Some(el) = self.as_element_mut(element) {
      if let Some(index) = el.attrs.iter().position(|&a| a == old) {
        el.attrs[index] = new;
      }
    }
    if let Some(data) = self.as_attr_mut(old) {
      data.owner = None;
    }
    if let Some(data) = self.as_attr_mut(new) {
      data.owner = Some(element);
    }
  }

  fn detach_attribute(&mut self, attr: NodeId) {
    let owner = self.as_attr(attr).and_then(|data| data.owner);
    let element = match owner {
      Some(element) => element,
      None => return,
    };
    let old_value = self.as_attr(attr).map(|data| data.value.clone());
    self.notify_attribute_change(element, attr, old_value, None);
    if let Some(el) = self.as_element_mut(element) {
      el.attrs.retain(|&a| a != attr);
    }
    if let Some(data) = self.as_attr_mut(attr) {
      data.owner = None;
    }
  }

  /// The shared "handle attribute changes" step: queue the observer record,
  /// then run the slot-related attribute-change steps.
  fn notify_attribute_change(
    &mut self,
    element: NodeId,
    attr: NodeId,
    old_value: Option<String>,
    new_value: Option<String>,
  ) {
    let (local, namespace) = match self.as_attr(attr) {
      Some(data) => (data.name.local.clone(), data.name.namespace.clone()),
      None => return,
    };
    log::trace!(
      "attribute '{}' on {:?}: {:?} -> {:?}",
      local,
      element,
      old_value,
      new_value
    );
    self.queue_mutation_record(RecordRequest::attributes(
      element,
      local.clone(),
      namespace.clone(),
      old_value.clone(),
    ));
    self.attribute_change_steps(element, &local, namespace.as_deref(), old_value, new_value);
  }

  fn attribute_change_steps(
    &mut self,
    element: NodeId,
    local: &str,
    namespace: Option<&str>,
    old_value: Option<String>,
    new_value: Option<String>,
  ) {
    if namespace.is_some() {
      return;
    }
    if local == "slot" && old_value != new_value {
      // Slotable's slot name changed: re-run assignment on the old slot
      // (drops the node) and then try to find it a new one.
      if let Some(assigned) = self.node(element).assigned_slot {
        self.assign_slotables(assigned);
      }
      self.assign_a_slot(element);
    }
    if local == "name" && old_value != new_value && self.is_slot(element) {
      let root = self.root(element);
      if self.is_shadow_root(root) {
        self.assign_slotables_for_tree(root);
      }
    }
  }

  // -- namespace lookups ---------------------------------------------------

  /// `lookupNamespaceURI`: locate the namespace for `prefix` from `node`.
  pub fn lookup_namespace_uri(&self, node: NodeId, prefix: Option<&str>) -> Option<String> {
    let prefix = match prefix {
      Some("") | None => None,
      Some(p) => Some(p),
    };
    self.locate_namespace(node, prefix)
  }

  /// `lookupPrefix`: locate a prefix for `namespace` from `node`.
  pub fn lookup_prefix(&self, node: NodeId, namespace: Option<&str>) -> Option<String> {
    let namespace = match namespace {
      Some("") | None => return None,
      Some(ns) => ns,
    };
    match &self.node(node).data {
      NodeData::Element(_) => self.locate_namespace_prefix(node, namespace),
      NodeData::Document(_) => self
        .document_element(node)
        .and_then(|el| self.locate_namespace_prefix(el, namespace)),
      NodeData::DocumentType(_) | NodeData::DocumentFragment => None,
      NodeData::ShadowRoot(_) => None,
      NodeData::Attribute(attr) => attr
        .owner
        .and_then(|el| self.locate_namespace_prefix(el, namespace)),
      NodeData::Text(_)
      | NodeData::CdataSection(_)
      | NodeData::Comment(_)
      | NodeData::ProcessingInstruction(_) => self
        .parent(node)
        .filter(|&p| self.is_element(p))
        .and_then(|el| self.locate_namespace_prefix(el, namespace)),
    }
  }

  pub fn is_default_namespace(&self, node: NodeId, namespace: Option<&str>) -> bool {
    let namespace = match namespace {
      Some("") | None => None,
      Some(ns) => Some(ns.to_string()),
    };
    self.locate_namespace(node, None) == namespace
  }

  fn locate_namespace(&self, node: NodeId, prefix: Option<&str>) -> Option<String> {
    match &self.node(node).data {
      NodeData::Element(el) => {
        if el.name.namespace.is_some() && el.name.prefix.as_deref() == prefix {
          return el.name.namespace.clone();
        }
        for &attr in &el.attrs {
          let data = self.as_attr(attr)?;
          let matches = match prefix {
            Some(p) => {
              data.name.namespace.as_deref() == Some(XMLNS_NAMESPACE)
                && data.name.prefix.as_deref() == Some("xmlns")
                && data.name.local == p
            }
            None => {
              data.name.namespace.as_deref() == Some(XMLNS_NAMESPACE)
                && data.name.prefix.is_none()
                && data.name.local == "xmlns"
            }
          };
          if matches {
            if data.value.is_empty() {
              return None;
            }
            return Some(data.value.clone());
          }
        }
        let parent = self.parent(node).filter(|&p| self.is_element(p))?;
        self.locate_namespace(parent, prefix)
      }
      NodeData::Document(_) => {
        let element = self.document_element(node)?;
        self.locate_namespace(element, prefix)
      }
      NodeData::DocumentType(_) | NodeData::DocumentFragment | NodeData::ShadowRoot(_) => None,
      NodeData::Attribute(attr) => {
        let owner = attr.owner?;
        self.locate_namespace(owner, prefix)
      }
      NodeData::Text(_)
      | NodeData::CdataSection(_)
      | NodeData::Comment(_)
      | NodeData::ProcessingInstruction(_) => {
        let parent = self.parent(node).filter(|&p| self.is_element(p))?;
        self.locate_namespace(parent, prefix)
      }
    }
  }

  fn locate_namespace_prefix(&self, element: NodeId, namespace: &str) -> Option<String> {
    let el = self.as_element(element)?;
    if el.name.namespace.as_deref() == Some(namespace) {
      if let Some(prefix) = &el.name.prefix {
        return Some(prefix.clone());
      }
    }
    for &attr in &el.attrs {
      if let Some(data) = self.as_attr(attr) {
        if data.name.prefix.as_deref() == Some("xmlns") && data.value == namespace {
          return Some(data.name.local.clone());
        }
      }
    }
    let parent = self.parent(element).filter(|&p| self.is_element(p))?;
    self.locate_namespace_prefix(parent, namespace)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::name::SVG_NAMESPACE;

  fn setup() -> (Dom, NodeId, NodeId) {
    let mut dom = Dom::new();
    let doc = dom.create_document();
    let el = dom.create_element(doc, "div").expect("element");
    (dom, doc, el)
  }

  #[test]
  fn set_get_round_trip_lowercases_for_html() {
    let (mut dom, _, el) = setup();
    dom.set_attribute(el, "CLASS", "a b").expect("set");
    assert_eq!(dom.get_attribute(el, "class").as_deref(), Some("a b"));
    assert_eq!(dom.get_attribute(el, "Class").as_deref(), Some("a b"));
    assert_eq!(dom.attribute_names(el), vec!["class".to_string()]);
  }

  #[test]
  fn setting_twice_updates_in_place() {
    let (mut dom, _, el) = setup();
    dom.set_attribute(el, "id", "one").expect("set");
    dom.set_attribute(el, "id", "two").expect("set");
    assert_eq!(dom.get_attribute(el, "id").as_deref(), Some("two"));
    assert_eq!(dom.attribute_names(el).len(), 1);
  }

  #[test]
  fn namespaced_attributes_are_separate() {
    let (mut dom, _, el) = setup();
    dom.set_attribute(el, "href", "plain").expect("set");
    dom
      .set_attribute_ns(el, Some(SVG_NAMESPACE), "svg:href", "ns")
      .expect("set ns");
    assert_eq!(dom.get_attribute(el, "href").as_deref(), Some("plain"));
    assert_eq!(
      dom.get_attribute_ns(el, Some(SVG_NAMESPACE), "href").as_deref(),
      Some("ns")
    );
  }

  #[test]
  fn remove_attribute_is_idempotent() {
    let (mut dom, _, el) = setup();
    dom.set_attribute(el, "id", "x").expect("set");
    assert!(dom.remove_attribute(el, "id").is_some());
    assert!(dom.remove_attribute(el, "id").is_none());
    assert!(!dom.has_attribute(el, "id"));
  }

  #[test]
  fn toggle_attribute_respects_force() {
    let (mut dom, _, el) = setup();
    assert!(dom.toggle_attribute(el, "hidden", None).expect("toggle"));
    assert!(dom.has_attribute(el, "hidden"));
    assert!(dom.toggle_attribute(el, "hidden", Some(true)).expect("toggle"));
    assert!(dom.has_attribute(el, "hidden"));
    assert!(!dom.toggle_attribute(el, "hidden", None).expect("toggle"));
    assert!(!dom.has_attribute(el, "hidden"));
    assert!(!dom.toggle_attribute(el, "hidden", Some(false)).expect("toggle"));
  }

  #[test]
  fn invalid_names_are_rejected() {
    let (mut dom, _, el) = setup();
    let error = dom.set_attribute(el, "1bad", "x").unwrap_err();
    assert!(matches!(error, DomError::InvalidCharacter { .. }));
  }

  #[test]
  fn attribute_node_transplant_is_guarded() {
    let (mut dom, doc, el) = setup();
    let other = dom.create_element(doc, "span").expect("element");
    let attr = dom.create_attribute(doc, "id").expect("attr");
    dom.set_attribute_value(attr, "v").expect("value");
    assert!(dom.set_attribute_node(el, attr).expect("set node").is_none());
    let error = dom.set_attribute_node(other, attr).unwrap_err();
    assert!(matches!(error, DomError::InvalidState(_)));
  }

  #[test]
  fn xmlns_declarations_resolve_namespaces() {
    let (mut dom, doc, el) = setup();
    let child = dom.create_element(doc, "span").expect("element");
    dom.append_child(el, child).expect("append");
    dom
      .set_attribute_ns(el, Some(XMLNS_NAMESPACE), "xmlns:svg", SVG_NAMESPACE)
      .expect("declare");
    assert_eq!(
      dom.lookup_namespace_uri(child, Some("svg")).as_deref(),
      Some(SVG_NAMESPACE)
    );
    assert_eq!(
      dom.lookup_prefix(child, Some(SVG_NAMESPACE)).as_deref(),
      Some("svg")
    );
  }

  #[test]
  fn default_namespace_of_html_elements() {
    let (dom, _, el) = setup();
    assert!(dom.is_default_namespace(el, Some(HTML_NAMESPACE)));
    assert!(!dom.is_default_namespace(el, Some(SVG_NAMESPACE)));
  }
}
