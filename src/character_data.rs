//! Character data algorithms
//!
//! substringData/appendData/insertData/deleteData/replaceData plus
//! splitText. Everything funnels through [`Dom::replace_data`], which owns
//! the record queueing and live-range boundary fixups. Offsets count Unicode
//! scalar values, matching [`Dom::length`].

use crate::error::DomError;
use crate::error::Result;
use crate::node::Dom;
use crate::node::NodeData;
use crate::node::NodeId;
use crate::observer::RecordRequest;

/// Byte index of the `chars`-th scalar value in `s`. `chars` must be within
/// bounds (callers validate against the node length first).
fn byte_offset(s: &str, chars: u32) -> usize {
  s
    .char_indices()
    .nth(chars as usize)
    .map_or(s.len(), |(index, _)| index)
}

impl Dom {
  /// `substringData(offset, count)`. `count` is clamped to the available
  /// length; an out-of-bounds `offset` is an error.
  pub fn substring_data(&self, node: NodeId, offset: u32, count: u32) -> Result<String> {
    let data = self.require_character_data(node)?;
    let length = data.chars().count() as u32;
    if offset > length {
      return Err(DomError::IndexSize { offset, length });
    }
    let count = count.min(length - offset);
    let start = byte_offset(data, offset);
    let end = byte_offset(data, offset + count);
    Ok(data[start..end].to_string())
  }

  pub fn append_data(&mut self, node: NodeId, data: &str) -> Result<()> {
    let length = self.length(node);
    self.replace_data(node, length, 0, data)
  }

  pub fn insert_data(&mut self, node: NodeId, offset: u32, data: &str) -> Result<()> {
    self.replace_data(node, offset, 0, data)
  }

  pub fn delete_data(&mut self, node: NodeId, offset: u32, count: u32) -> Result<()> {
    self.replace_data(node, offset, count, "")
  }

  /// The WHATWG "replace data" concept: splice `data` over `count` scalar
  /// values starting at `offset`, queue a characterData record carrying the
  /// old value, and rehome live-range boundaries inside or after the
  /// replaced region.
  pub fn replace_data(&mut self, node: NodeId, offset: u32, count: u32, data: &str) -> Result<()> {
    let old = self.require_character_data(node)?.to_string();
    let length = old.chars().count() as u32;
    if offset > length {
      return Err(DomError::IndexSize { offset, length });
    }
    let count = count.min(length - offset);

    self.queue_mutation_record(RecordRequest::character_data(node, old.clone()));

    let start = byte_offset(&old, offset);
    let end = byte_offset(&old, offset + count);
    let mut next = String::with_capacity(old.len() - (end - start) + data.len());
    next.push_str(&old[..start]);
    next.push_str(data);
    next.push_str(&old[end..]);
    if let Some(slot) = self.character_data_mut(node) {
      *slot = next;
    }

    // Boundaries inside the replaced region collapse to its start;
    // boundaries past it shift by the length delta.
    let inserted = data.chars().count() as u32;
    let doc = self.owner_document(node);
    for range_id in self.live_range_ids(doc) {
      if let Some(range) = self.ranges.get_mut(range_id.0) {
        if range.start.node == node {
          if range.start.offset > offset && range.start.offset <= offset + count {
            range.start.offset = offset;
          } else if range.start.offset > offset + count {
            range.start.offset = range.start.offset + inserted - count;
          }
        }
        if range.end.node == node {
          if range.end.offset > offset && range.end.offset <= offset + count {
            range.end.offset = offset;
          } else if range.end.offset > offset + count {
            range.end.offset = range.end.offset + inserted - count;
          }
        }
      }
    }

    if let Some(parent) = self.parent(node) {
      self.child_text_changed(parent);
    }
    Ok(())
  }

  /// `splitText(offset)`: move everything after `offset` into a fresh
  /// sibling of the same kind. Live ranges anchored past the split follow
  /// the moved text.
  pub fn split_text(&mut self, node: NodeId, offset: u32) -> Result<NodeId> {
    let is_cdata = matches!(self.node(node).data, NodeData::CdataSection(_));
    if !self.is_text(node) && !is_cdata {
      return Err(DomError::InvalidNodeType("splitText requires a text node".to_string()));
    }
    let length = self.length(node);
    if offset > length {
      return Err(DomError::IndexSize { offset, length });
    }
    let count = length - offset;
    let moved = self.substring_data(node, offset, count)?;
    let doc = self.owner_document(node);
    let new_node = if is_cdata {
      self.create_cdata_section(doc, &moved)?
    } else {
      self.create_text(doc, &moved)
    };

    let parent = self.parent(node);
    if let Some(parent) = parent {
      let next = self.next_sibling(node);
      self.insert(new_node, parent, next, false);

      let node_index = self.index(node);
      for range_id in self.live_range_ids(doc) {
        if let Some(range) = self.ranges.get_mut(range_id.0) {
          if range.start.node == node && range.start.offset > offset {
            range.start.node = new_node;
            range.start.offset -= offset;
          }
          if range.end.node == node && range.end.offset > offset {
            range.end.node = new_node;
            range.end.offset -= offset;
          }
          if range.start.node == parent && range.start.offset == node_index + 1 {
            range.start.offset += 1;
          }
          if range.end.node == parent && range.end.offset == node_index + 1 {
            range.end.offset += 1;
          }
        }
      }
    }

    self.replace_data(node, offset, count, "")?;
    Ok(new_node)
  }

  /// `nodeValue` setter; a no-op for node kinds whose value is null.
  pub fn set_node_value(&mut self, node: NodeId, value: &str) -> Result<()> {
    match self.node(node).data {
      NodeData::Text(_)
      | NodeData::CdataSection(_)
      | NodeData::Comment(_)
      | NodeData::ProcessingInstruction(_) => {
        let length = self.length(node);
        self.replace_data(node, 0, length, value)
      }
      NodeData::Attribute(_) => self.set_attribute_value(node, value),
      _ => Ok(()),
    }
  }

  fn require_character_data(&self, node: NodeId) -> Result<&str> {
    self
      .character_data(node)
      .ok_or_else(|| DomError::InvalidNodeType("node does not hold character data".to_string()))
  }
}
