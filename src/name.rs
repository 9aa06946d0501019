//! Qualified-name validation and namespace handling
//!
//! Element and attribute creation funnels through [`validate_and_extract`],
//! which enforces the XML `Name`/`QName` productions and the WHATWG
//! prefix/namespace consistency rules (`xml`, `xmlns`, and the reserved
//! namespace URIs).

use crate::error::DomError;
use crate::error::Result;

pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// A validated, split qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
  pub namespace: Option<String>,
  pub prefix: Option<String>,
  pub local: String,
}

impl QualifiedName {
  /// The `prefix:local` form, or just `local` when there is no prefix.
  pub fn qualified(&self) -> String {
    match &self.prefix {
      Some(prefix) => format!("{}:{}", prefix, self.local),
      None => self.local.clone(),
    }
  }
}

fn is_name_start_char(c: char) -> bool {
  matches!(c,
    ':'
    | 'A'..='Z'
    | '_'
    | 'a'..='z'
    | '\u{C0}'..='\u{D6}'
    | '\u{D8}'..='\u{F6}'
    | '\u{F8}'..='\u{2FF}'
    | '\u{370}'..='\u{37D}'
    | '\u{37F}'..='\u{1FFF}'
    | '\u{200C}'..='\u{200D}'
    | '\u{2070}'..='\u{218F}'
    | '\u{2C00}'..='\u{2FEF}'
    | '\u{3001}'..='\u{D7FF}'
    | '\u{F900}'..='\u{FDCF}'
    | '\u{FDF0}'..='\u{FFFD}'
    | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
  is_name_start_char(c)
    || matches!(c,
      '-'
      | '.'
      | '0'..='9'
      | '\u{B7}'
      | '\u{300}'..='\u{36F}'
      | '\u{203F}'..='\u{2040}')
}

/// Whether `name` matches the XML `Name` production.
pub fn is_valid_name(name: &str) -> bool {
  let mut chars = name.chars();
  match chars.next() {
    Some(first) if is_name_start_char(first) => chars.all(is_name_char),
    _ => false,
  }
}

/// Whether `name` matches the XML `QName` production: one or two `NCName`s
/// joined by at most one colon, with neither part empty.
pub fn is_valid_qualified_name(name: &str) -> bool {
  let mut parts = name.split(':');
  let first = match parts.next() {
    Some(part) => part,
    None => return false,
  };
  match parts.next() {
    None => is_ncname(first),
    Some(second) => parts.next().is_none() && is_ncname(first) && is_ncname(second),
  }
}

fn is_ncname(part: &str) -> bool {
  !part.is_empty() && is_valid_name(part) && !part.contains(':')
}

/// Validate `name` as an XML `Name`, for un-namespaced attribute setting and
/// processing-instruction targets.
pub fn validate_name(name: &str) -> Result<()> {
  if is_valid_name(name) {
    return Ok(());
  }
  Err(DomError::InvalidCharacter {
    name: name.to_string(),
  })
}

/// Validate and extract a namespace/qualified-name pair.
///
/// Applies the WHATWG "validate and extract" algorithm: the empty namespace
/// collapses to none, the qualified name must be a `QName`, and the reserved
/// `xml`/`xmlns` prefixes must pair with their fixed namespace URIs.
pub fn validate_and_extract(namespace: Option<&str>, qualified_name: &str) -> Result<QualifiedName> {
  let namespace = match namespace {
    Some("") | None => None,
    Some(ns) => Some(ns),
  };

  if !is_valid_qualified_name(qualified_name) {
    return Err(DomError::InvalidCharacter {
      name: qualified_name.to_string(),
    });
  }

  let (prefix, local) = match qualified_name.split_once(':') {
    Some((prefix, local)) => (Some(prefix), local),
    None => (None, qualified_name),
  };

  if prefix.is_some() && namespace.is_none() {
    return Err(DomError::Namespace(format!(
      "prefix '{}' requires a namespace",
      prefix.unwrap_or_default()
    )));
  }
  if prefix == Some("xml") && namespace != Some(XML_NAMESPACE) {
    return Err(DomError::Namespace(
      "the 'xml' prefix is reserved for the XML namespace".to_string(),
    ));
  }
  if (qualified_name == "xmlns" || prefix == Some("xmlns")) && namespace != Some(XMLNS_NAMESPACE) {
    return Err(DomError::Namespace(
      "'xmlns' is reserved for the XMLNS namespace".to_string(),
    ));
  }
  if namespace == Some(XMLNS_NAMESPACE) && qualified_name != "xmlns" && prefix != Some("xmlns") {
    return Err(DomError::Namespace(
      "the XMLNS namespace requires the 'xmlns' prefix".to_string(),
    ));
  }

  Ok(QualifiedName {
    namespace: namespace.map(str::to_string),
    prefix: prefix.map(str::to_string),
    local: local.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_names_validate() {
    assert!(is_valid_name("div"));
    assert!(is_valid_name("_underscore"));
    assert!(is_valid_name("with-dash"));
    assert!(is_valid_name("ns:local"));
  }

  #[test]
  fn names_starting_with_digits_or_dashes_fail() {
    assert!(!is_valid_name("1digit"));
    assert!(!is_valid_name("-leading"));
    assert!(!is_valid_name(""));
    assert!(!is_valid_name("spa ce"));
  }

  #[test]
  fn qualified_names_allow_one_colon() {
    assert!(is_valid_qualified_name("svg:rect"));
    assert!(is_valid_qualified_name("plain"));
    assert!(!is_valid_qualified_name("a:b:c"));
    assert!(!is_valid_qualified_name(":local"));
    assert!(!is_valid_qualified_name("prefix:"));
  }

  #[test]
  fn extract_splits_prefix_and_local() {
    let name = validate_and_extract(Some(SVG_NAMESPACE), "svg:rect").expect("valid");
    assert_eq!(name.prefix.as_deref(), Some("svg"));
    assert_eq!(name.local, "rect");
    assert_eq!(name.qualified(), "svg:rect");
  }

  #[test]
  fn empty_namespace_collapses_to_none() {
    let name = validate_and_extract(Some(""), "div").expect("valid");
    assert_eq!(name.namespace, None);
  }

  #[test]
  fn prefix_without_namespace_is_a_namespace_error() {
    let error = validate_and_extract(None, "svg:rect").unwrap_err();
    assert!(matches!(error, DomError::Namespace(_)));
  }

  #[test]
  fn xml_prefix_requires_xml_namespace() {
    assert!(validate_and_extract(Some(XML_NAMESPACE), "xml:lang").is_ok());
    let error = validate_and_extract(Some(HTML_NAMESPACE), "xml:lang").unwrap_err();
    assert!(matches!(error, DomError::Namespace(_)));
  }

  #[test]
  fn xmlns_rules_are_symmetric() {
    assert!(validate_and_extract(Some(XMLNS_NAMESPACE), "xmlns").is_ok());
    assert!(validate_and_extract(Some(XMLNS_NAMESPACE), "xmlns:svg").is_ok());
    assert!(validate_and_extract(Some(HTML_NAMESPACE), "xmlns:svg").is_err());
    assert!(validate_and_extract(Some(XMLNS_NAMESPACE), "svg:rect").is_err());
  }

  #[test]
  fn malformed_qname_is_invalid_character() {
    let error = validate_and_extract(Some(HTML_NAMESPACE), "9div").unwrap_err();
    assert!(matches!(error, DomError::InvalidCharacter { .. }));
  }
}
