//! The path specification: one storage layer plus a link to its parent.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::is_credential_attribute;
use crate::{AttributeValue, Attributes, TypeIndicator, VfsError};

/// Key of the layer type in the serialized form.
pub(crate) const TYPE_INDICATOR_KEY: &str = "type_indicator";
/// Key of the nested parent layer in the serialized form.
pub(crate) const PARENT_KEY: &str = "parent";

/// Descriptor of one storage layer and, through `parent`, of every layer
/// underneath it.
///
/// A chain reads from the leaf toward the root:
///
/// ```text
/// BDE ──parent──▶ TSK_PARTITION ──parent──▶ RAW ──parent──▶ OS
/// ```
///
/// Equality and hashing are structural: two path specifications are equal
/// when their types, their attributes and their whole parent chains are
/// equal. The same identity is available as a string through
/// [`comparable`](Self::comparable), which resolver caches and the key chain
/// use as their key.
///
/// Path specifications are built through [`PathSpec::new`], [`PathSpec::os`]
/// or a [`Factory`](crate::Factory), all of which validate the layer's
/// construction rules.
///
/// # Example
///
/// ```rust
/// use stackvfs::{Attributes, PathSpec, TypeIndicator};
///
/// let os = PathSpec::os("/images/disk.raw");
/// let raw = PathSpec::new(TypeIndicator::RAW, Some(os.clone()), Attributes::new()).unwrap();
///
/// assert_eq!(raw.parent(), Some(&os));
/// assert_eq!(raw.depth(), 2);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PathSpec {
    type_indicator: TypeIndicator,
    parent: Option<Box<PathSpec>>,
    attributes: Attributes,
}

impl PathSpec {
    /// Assemble a path specification without validation.
    ///
    /// Only layer kinds call this, after checking their rules.
    pub(crate) fn from_parts(
        type_indicator: TypeIndicator,
        parent: Option<PathSpec>,
        attributes: Attributes,
    ) -> Self {
        Self {
            type_indicator,
            parent: parent.map(Box::new),
            attributes,
        }
    }

    /// Path specification of an operating system file or device.
    ///
    /// The OS layer is the root of every chain and has no parent.
    pub fn os(location: impl Into<String>) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert("location".to_owned(), AttributeValue::Text(location.into()));
        Self::from_parts(TypeIndicator::OS, None, attributes)
    }

    /// The layer type.
    #[inline]
    pub fn type_indicator(&self) -> &TypeIndicator {
        &self.type_indicator
    }

    /// The layer underneath this one, if any.
    #[inline]
    pub fn parent(&self) -> Option<&PathSpec> {
        self.parent.as_deref()
    }

    /// Replace the parent layer.
    ///
    /// Construction rules are not re-checked here. A chain whose required
    /// parent was removed fails when it is resolved.
    pub fn set_parent(&mut self, parent: Option<PathSpec>) {
        self.parent = parent.map(Box::new);
    }

    /// Returns `true` if this layer has a parent.
    #[inline]
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Returns `true` for root layers, i.e. layers without a parent.
    #[inline]
    pub fn is_system_level(&self) -> bool {
        self.parent.is_none()
    }

    /// All attributes of this layer.
    #[inline]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// A single attribute of this layer.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// A text attribute of this layer.
    pub fn text_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(AttributeValue::as_text)
    }

    /// An integer attribute of this layer.
    pub fn integer_attribute(&self, name: &str) -> Option<u64> {
        self.attribute(name).and_then(AttributeValue::as_integer)
    }

    /// A bytes attribute of this layer.
    pub fn bytes_attribute(&self, name: &str) -> Option<&[u8]> {
        self.attribute(name).and_then(AttributeValue::as_bytes)
    }

    /// Iterate over this layer and its ancestors, leaf first.
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    /// Number of layers in the chain, including this one.
    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    /// The structural identity as a string.
    ///
    /// One line per layer, root first. Attribute values are quoted or
    /// hex-encoded so that distinct specifications never share a string.
    /// The string contains secrets; log the `Display` form instead.
    pub fn comparable(&self) -> String {
        let mut out = String::new();
        self.write_layers(&mut out, false);
        out
    }

    fn write_layers(&self, out: &mut String, redact: bool) {
        if let Some(parent) = &self.parent {
            parent.write_layers(out, redact);
        }
        out.push_str("type: ");
        out.push_str(self.type_indicator.as_str());
        for (name, value) in &self.attributes {
            out.push_str(", ");
            out.push_str(name);
            out.push_str(": ");
            if redact && is_credential_attribute(name) {
                out.push_str("***");
            } else {
                value.write_comparable(out);
            }
        }
        out.push('\n');
    }

    /// The serialized form as a JSON value.
    ///
    /// Each layer is an object with a `type_indicator` key, one key per
    /// attribute and, unless it is a root layer, a nested `parent` object.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            TYPE_INDICATOR_KEY.to_owned(),
            Value::String(self.type_indicator.as_str().to_owned()),
        );
        for (name, value) in &self.attributes {
            let value = match value {
                AttributeValue::Integer(integer) => Value::from(*integer),
                AttributeValue::Text(text) => Value::String(text.clone()),
                AttributeValue::Bytes(bytes) => {
                    Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
                }
            };
            object.insert(name.clone(), value);
        }
        if let Some(parent) = &self.parent {
            object.insert(PARENT_KEY.to_owned(), parent.to_value());
        }
        Value::Object(object)
    }

    /// The serialized form as a JSON string.
    pub fn to_json(&self) -> Result<String, VfsError> {
        serde_json::to_string(&self.to_value()).map_err(|e| VfsError::format(e.to_string()))
    }
}

impl Serialize for PathSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Same layout as [`PathSpec::comparable`] with credential values masked.
impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_layers(&mut out, true);
        f.write_str(out.trim_end())
    }
}

impl fmt::Debug for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSpec")
            .field("type_indicator", &self.type_indicator)
            .field("attributes", &RedactedAttributes(&self.attributes))
            .field("parent", &self.parent)
            .finish()
    }
}

struct RedactedAttributes<'a>(&'a Attributes);

impl fmt::Debug for RedactedAttributes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.0 {
            if is_credential_attribute(name) {
                map.entry(name, &"<redacted>");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

/// Iterator over a path specification and its ancestors, leaf first.
///
/// Returned by [`PathSpec::chain`].
#[derive(Debug, Clone)]
pub struct Chain<'a> {
    next: Option<&'a PathSpec>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a PathSpec;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bde(parent: PathSpec, password: &str) -> PathSpec {
        let mut attributes = Attributes::new();
        attributes.insert("password".to_owned(), AttributeValue::from(password));
        PathSpec::from_parts(TypeIndicator::BDE, Some(parent), attributes)
    }

    #[test]
    fn equality_is_structural() {
        let a = bde(PathSpec::os("/a.raw"), "x");
        let b = bde(PathSpec::os("/a.raw"), "x");
        let c = bde(PathSpec::os("/b.raw"), "x");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.comparable(), b.comparable());
        assert_ne!(a.comparable(), c.comparable());
    }

    #[test]
    fn comparable_lists_root_first() {
        let spec = bde(PathSpec::os("/a.raw"), "x");
        assert_eq!(
            spec.comparable(),
            "type: OS, location: \"/a.raw\"\ntype: BDE, password: \"x\"\n"
        );
    }

    #[test]
    fn display_and_debug_redact_credentials() {
        let spec = bde(PathSpec::os("/a.raw"), "bde-TEST");

        let shown = spec.to_string();
        assert!(shown.contains("password: ***"));
        assert!(!shown.contains("bde-TEST"));
        assert!(!format!("{spec:?}").contains("bde-TEST"));
    }

    #[test]
    fn chain_walks_to_root() {
        let spec = bde(PathSpec::os("/a.raw"), "x");
        let types: Vec<_> = spec.chain().map(|p| p.type_indicator().as_str()).collect();
        assert_eq!(types, ["BDE", "OS"]);
        assert_eq!(spec.depth(), 2);
        assert!(spec.parent().unwrap().is_system_level());
    }

    #[test]
    fn set_parent_changes_identity() {
        let mut spec = bde(PathSpec::os("/a.raw"), "x");
        let before = spec.comparable();
        spec.set_parent(None);
        assert!(!spec.has_parent());
        assert_ne!(spec.comparable(), before);
    }

    #[test]
    fn to_value_nests_parent() {
        let spec = bde(PathSpec::os("/a.raw"), "x");
        let value = spec.to_value();

        assert_eq!(value["type_indicator"], "BDE");
        assert_eq!(value["password"], "x");
        assert_eq!(value["parent"]["type_indicator"], "OS");
        assert_eq!(value["parent"]["location"], "/a.raw");
        assert!(value["parent"].get("parent").is_none());
    }

    #[test]
    fn bytes_serialize_as_arrays() {
        let mut attributes = Attributes::new();
        attributes.insert("key".to_owned(), AttributeValue::Bytes(vec![1, 2]));
        let spec = PathSpec::from_parts(
            TypeIndicator::ENCRYPTED_STREAM,
            Some(PathSpec::os("/e")),
            attributes,
        );
        assert_eq!(spec.to_value()["key"], serde_json::json!([1, 2]));
    }
}
