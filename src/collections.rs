//! Live collections
//!
//! NodeList/HTMLCollection equivalents as explicit accessors. A collection
//! stores only its anchor and filter; every call re-reads the tree, which is
//! what makes it live. Indexing is `item(dom, i)`, never operator sugar.

use crate::name::HTML_NAMESPACE;
use crate::node::Dom;
use crate::node::NodeId;

/// Live view of a node's children.
#[derive(Clone, Copy, Debug)]
pub struct ChildNodes {
  parent: NodeId,
}

impl ChildNodes {
  pub fn length(&self, dom: &Dom) -> usize {
    dom.child_count(self.parent)
  }

  pub fn item(&self, dom: &Dom, index: usize) -> Option<NodeId> {
    let mut cursor = dom.first_child(self.parent);
    let mut remaining = index;
    while let Some(node) = cursor {
      if remaining == 0 {
        return Some(node);
      }
      remaining -= 1;
      cursor = dom.next_sibling(node);
    }
    None
  }

  pub fn iter<'a>(&self, dom: &'a Dom) -> impl Iterator<Item = NodeId> + 'a {
    let mut cursor = dom.first_child(self.parent);
    std::iter::from_fn(move || {
      let node = cursor?;
      cursor = dom.next_sibling(node);
      Some(node)
    })
  }
}

#[derive(Clone, Debug)]
enum ElementFilter {
  /// `*` matches every element.
  AnyTag,
  /// Case-sensitive for non-HTML elements, lowercased match for HTML ones.
  Tag(String),
  ClassName(String),
}

/// Live, filtered view of an element subtree, in tree order.
#[derive(Clone, Debug)]
pub struct ElementCollection {
  root: NodeId,
  filter: ElementFilter,
}

impl ElementCollection {
  fn matches(&self, dom: &Dom, node: NodeId) -> bool {
    let element = match dom.as_element(node) {
      Some(element) => element,
      None => return false,
    };
    match &self.filter {
      ElementFilter::AnyTag => true,
      ElementFilter::Tag(name) => {
        if element.name.namespace.as_deref() == Some(HTML_NAMESPACE) {
          element.name.local == name.to_ascii_lowercase()
        } else {
          element.name.qualified() == *name
        }
      }
      ElementFilter::ClassName(class) => dom
        .get_attribute(node, "class")
        .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class)),
    }
  }

  fn collect(&self, dom: &Dom) -> Vec<NodeId> {
    dom
      .descendants(self.root, false)
      .into_iter()
      .filter(|&node| self.matches(dom, node))
      .collect()
  }

  pub fn length(&self, dom: &Dom) -> usize {
    self.collect(dom).len()
  }

  pub fn item(&self, dom: &Dom, index: usize) -> Option<NodeId> {
    self.collect(dom).into_iter().nth(index)
  }

  /// First matching element whose `id` attribute equals `key`, else the
  /// first whose `name` attribute does.
  pub fn named_item(&self, dom: &Dom, key: &str) -> Option<NodeId> {
    if key.is_empty() {
      return None;
    }
    let all = self.collect(dom);
    all
      .iter()
      .copied()
      .find(|&node| dom.get_attribute(node, "id").as_deref() == Some(key))
      .or_else(|| {
        all
          .into_iter()
          .find(|&node| dom.get_attribute(node, "name").as_deref() == Some(key))
      })
  }

  pub fn iter(&self, dom: &Dom) -> impl Iterator<Item = NodeId> {
    self.collect(dom).into_iter()
  }
}

impl Dom {
  pub fn child_nodes(&self, parent: NodeId) -> ChildNodes {
    ChildNodes { parent }
  }

  /// `getElementsByTagName`. `*` matches all elements.
  pub fn elements_by_tag_name(&self, root: NodeId, name: &str) -> ElementCollection {
    let filter = if name == "*" {
      ElementFilter::AnyTag
    } else {
      ElementFilter::Tag(name.to_string())
    };
    ElementCollection { root, filter }
  }

  /// `getElementsByClassName`, single class token.
  pub fn elements_by_class_name(&self, root: NodeId, class: &str) -> ElementCollection {
    ElementCollection {
      root,
      filter: ElementFilter::ClassName(class.to_string()),
    }
  }

  /// First element in tree order with the given `id` attribute.
  pub fn get_element_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
    if id.is_empty() {
      return None;
    }
    self
      .descendants(root, false)
      .into_iter()
      .find(|&node| self.is_element(node) && self.get_attribute(node, "id").as_deref() == Some(id))
  }
}
