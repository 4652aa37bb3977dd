//! Construction rules for each layer type.

use std::sync::LazyLock;

use crate::path::spec::{PARENT_KEY, TYPE_INDICATOR_KEY};
use crate::{AttributeValue, Attributes, ParentRequirement, PathSpec, TypeIndicator, VfsError};

/// Strategy trait for constructing path specifications of one layer type.
///
/// A kind decides, at construction time, whether a layer is well formed:
/// whether it needs a parent and which attributes it accepts. Construction
/// errors are never deferred to resolution.
///
/// Most kinds are described declaratively with [`LayerKind`]; implement this
/// trait directly for rules that do not fit that shape.
///
/// # Thread Safety
///
/// Kinds live in a shared [`Factory`](crate::Factory) and must be `Send + Sync`.
pub trait PathSpecKind: Send + Sync {
    /// The layer type this kind constructs.
    fn type_indicator(&self) -> TypeIndicator;

    /// Whether layers of this kind need a parent.
    fn parent_requirement(&self) -> ParentRequirement;

    /// Check a prospective layer.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if the parent or an attribute is invalid
    fn validate(&self, parent: Option<&PathSpec>, attributes: &Attributes) -> Result<(), VfsError>;

    /// Validate and build a path specification.
    fn new_path_spec(
        &self,
        parent: Option<PathSpec>,
        attributes: Attributes,
    ) -> Result<PathSpec, VfsError> {
        self.validate(parent.as_ref(), &attributes)?;
        Ok(PathSpec::from_parts(self.type_indicator(), parent, attributes))
    }
}

/// The value type an attribute accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// Unsigned integer.
    Integer,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Bytes,
    /// Text or raw bytes.
    TextOrBytes,
}

impl AttributeType {
    fn accepts(self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (Self::Integer, AttributeValue::Integer(_))
                | (Self::Text | Self::TextOrBytes, AttributeValue::Text(_))
                | (Self::Bytes | Self::TextOrBytes, AttributeValue::Bytes(_))
        )
    }
}

/// One attribute a [`LayerKind`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRule {
    /// Attribute name.
    pub name: &'static str,
    /// Accepted value type.
    pub value_type: AttributeType,
    /// Whether construction fails without it.
    pub required: bool,
}

impl AttributeRule {
    /// A required attribute.
    pub const fn required(name: &'static str, value_type: AttributeType) -> Self {
        Self {
            name,
            value_type,
            required: true,
        }
    }

    /// An optional attribute.
    pub const fn optional(name: &'static str, value_type: AttributeType) -> Self {
        Self {
            name,
            value_type,
            required: false,
        }
    }
}

/// Declarative [`PathSpecKind`]: a parent requirement and a closed set of
/// attribute rules.
///
/// Unknown attribute names are rejected, as are the reserved names
/// `type_indicator` and `parent`.
///
/// # Example
///
/// ```rust
/// use stackvfs::{AttributeRule, AttributeType, Factory, LayerKind, ParentRequirement, TypeIndicator};
///
/// let factory = Factory::with_builtin();
/// factory
///     .register(
///         LayerKind::new(TypeIndicator::new("SPLIT"), ParentRequirement::Required)
///             .with_rule(AttributeRule::required("segment_count", AttributeType::Integer)),
///     )
///     .unwrap();
/// assert!(factory.is_registered(&TypeIndicator::new("SPLIT")));
/// ```
#[derive(Debug, Clone)]
pub struct LayerKind {
    type_indicator: TypeIndicator,
    parent: ParentRequirement,
    rules: Vec<AttributeRule>,
}

impl LayerKind {
    /// A kind with no attributes.
    pub fn new(type_indicator: TypeIndicator, parent: ParentRequirement) -> Self {
        Self {
            type_indicator,
            parent,
            rules: Vec::new(),
        }
    }

    /// Accept one more attribute.
    pub fn with_rule(mut self, rule: AttributeRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Accept several more attributes.
    pub fn with_rules(mut self, rules: &[AttributeRule]) -> Self {
        self.rules.extend_from_slice(rules);
        self
    }

    /// The attribute rules of this kind.
    pub fn rules(&self) -> &[AttributeRule] {
        &self.rules
    }

    /// The built-in kind for a type indicator.
    pub fn builtin(type_indicator: &TypeIndicator) -> Option<&'static LayerKind> {
        BUILTIN_KINDS
            .iter()
            .find(|kind| &kind.type_indicator == type_indicator)
    }

    /// Every built-in kind.
    pub fn builtins() -> &'static [LayerKind] {
        &BUILTIN_KINDS
    }

    fn invalid(&self, reason: impl std::fmt::Display) -> VfsError {
        VfsError::configuration(format!("{}: {reason}", self.type_indicator))
    }
}

impl PathSpecKind for LayerKind {
    fn type_indicator(&self) -> TypeIndicator {
        self.type_indicator.clone()
    }

    fn parent_requirement(&self) -> ParentRequirement {
        self.parent
    }

    fn validate(&self, parent: Option<&PathSpec>, attributes: &Attributes) -> Result<(), VfsError> {
        if let Some(reason) = self.parent.violation(parent.is_some()) {
            return Err(self.invalid(reason));
        }

        for (name, value) in attributes {
            if name == TYPE_INDICATOR_KEY || name == PARENT_KEY {
                return Err(self.invalid(format_args!("reserved attribute name: {name}")));
            }
            let rule = self
                .rules
                .iter()
                .find(|rule| rule.name == name)
                .ok_or_else(|| self.invalid(format_args!("unsupported attribute: {name}")))?;
            if !rule.value_type.accepts(value) {
                return Err(self.invalid(format_args!(
                    "attribute {name} does not accept {} values",
                    value.kind_name()
                )));
            }
        }

        if let Some(missing) = self
            .rules
            .iter()
            .find(|rule| rule.required && !attributes.contains_key(rule.name))
        {
            return Err(self.invalid(format_args!("missing attribute: {}", missing.name)));
        }

        Ok(())
    }
}

use AttributeType::{Bytes, Integer, Text, TextOrBytes};

const LOCATION: AttributeRule = AttributeRule::optional("location", Text);
const PASSWORD: AttributeRule = AttributeRule::optional("password", Text);
const RECOVERY_PASSWORD: AttributeRule = AttributeRule::optional("recovery_password", Text);

static BUILTIN_KINDS: LazyLock<Vec<LayerKind>> = LazyLock::new(|| {
    use ParentRequirement::{Forbidden, Required};

    vec![
        LayerKind::new(TypeIndicator::OS, Forbidden)
            .with_rule(AttributeRule::required("location", Text)),
        LayerKind::new(TypeIndicator::RAW, Required),
        LayerKind::new(TypeIndicator::DATA_RANGE, Required).with_rules(&[
            AttributeRule::required("range_offset", Integer),
            AttributeRule::required("range_size", Integer),
        ]),
        LayerKind::new(TypeIndicator::ENCRYPTED_STREAM, Required).with_rules(&[
            AttributeRule::required("encryption_method", Text),
            AttributeRule::optional("key", TextOrBytes),
            AttributeRule::optional("initialization_vector", Bytes),
        ]),
        LayerKind::new(TypeIndicator::COMPRESSED_STREAM, Required)
            .with_rule(AttributeRule::required("compression_method", Text)),
        LayerKind::new(TypeIndicator::BDE, Required).with_rules(&[
            PASSWORD,
            RECOVERY_PASSWORD,
            AttributeRule::optional("startup_key", TextOrBytes),
        ]),
        LayerKind::new(TypeIndicator::FVDE, Required).with_rules(&[
            PASSWORD,
            RECOVERY_PASSWORD,
            AttributeRule::optional("encrypted_root_plist", Text),
        ]),
        LayerKind::new(TypeIndicator::LUKSDE, Required).with_rule(PASSWORD),
        LayerKind::new(TypeIndicator::VHDI, Required),
        LayerKind::new(TypeIndicator::VMDK, Required),
        LayerKind::new(TypeIndicator::QCOW, Required),
        LayerKind::new(TypeIndicator::EWF, Required),
        LayerKind::new(TypeIndicator::TSK_PARTITION, Required).with_rules(&[
            LOCATION,
            AttributeRule::optional("part_index", Integer),
            AttributeRule::optional("start_offset", Integer),
        ]),
        LayerKind::new(TypeIndicator::VSHADOW, Required).with_rules(&[
            LOCATION,
            AttributeRule::optional("store_index", Integer),
        ]),
    ]
});

impl PathSpec {
    /// Build a path specification of a built-in layer type.
    ///
    /// Custom layer types are built through a [`Factory`](crate::Factory).
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotSupported`] if the type is not built in
    /// - [`VfsError::Configuration`] if the parent or an attribute is invalid
    ///
    /// # Example
    ///
    /// ```rust
    /// use stackvfs::{Attributes, PathSpec, TypeIndicator, VfsError};
    ///
    /// let err = PathSpec::new(TypeIndicator::VHDI, None, Attributes::new()).unwrap_err();
    /// assert!(matches!(err, VfsError::Configuration { .. }));
    /// ```
    pub fn new<K, V>(
        type_indicator: TypeIndicator,
        parent: Option<PathSpec>,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<PathSpec, VfsError>
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        let kind = LayerKind::builtin(&type_indicator)
            .ok_or_else(|| VfsError::not_supported(type_indicator.clone(), "new_path_spec"))?;
        kind.new_path_spec(parent, collect_attributes(attributes))
    }
}

pub(crate) fn collect_attributes<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    attributes
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os() -> PathSpec {
        PathSpec::os("/image.raw")
    }

    #[test]
    fn every_parented_kind_rejects_missing_parent() {
        for kind in LayerKind::builtins() {
            if kind.parent_requirement() != ParentRequirement::Required {
                continue;
            }
            let attributes: Attributes = kind
                .rules()
                .iter()
                .filter(|rule| rule.required)
                .map(|rule| {
                    let value = match rule.value_type {
                        Integer => AttributeValue::Integer(0),
                        Bytes => AttributeValue::Bytes(vec![0]),
                        Text | TextOrBytes => AttributeValue::from("x"),
                    };
                    (rule.name.to_owned(), value)
                })
                .collect();

            let err = kind.new_path_spec(None, attributes.clone()).unwrap_err();
            assert!(
                matches!(err, VfsError::Configuration { .. }),
                "{}",
                kind.type_indicator()
            );
            kind.new_path_spec(Some(os()), attributes).unwrap();
        }
    }

    #[test]
    fn os_rejects_parent() {
        let err = PathSpec::new(TypeIndicator::OS, Some(os()), [("location", "/x")]).unwrap_err();
        assert!(matches!(err, VfsError::Configuration { .. }));
    }

    #[test]
    fn os_requires_location() {
        let err = PathSpec::new(TypeIndicator::OS, None, Attributes::new()).unwrap_err();
        assert!(err.to_string().contains("missing attribute: location"));
    }

    #[test]
    fn unknown_attribute_rejected() {
        let err = PathSpec::new(TypeIndicator::RAW, Some(os()), [("colour", "blue")]).unwrap_err();
        assert!(err.to_string().contains("unsupported attribute: colour"));
    }

    #[test]
    fn reserved_attribute_rejected() {
        let err = PathSpec::new(TypeIndicator::RAW, Some(os()), [("parent", "x")]).unwrap_err();
        assert!(err.to_string().contains("reserved attribute name"));
    }

    #[test]
    fn attribute_type_checked() {
        let err = PathSpec::new(
            TypeIndicator::DATA_RANGE,
            Some(os()),
            [("range_offset", "zero"), ("range_size", "ten")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not accept text values"));
    }

    #[test]
    fn partition_attributes_accepted() {
        let spec = PathSpec::new(
            TypeIndicator::TSK_PARTITION,
            Some(os()),
            [("part_index", 2u64), ("start_offset", 1_048_576u64)],
        )
        .unwrap();
        assert_eq!(spec.integer_attribute("part_index"), Some(2));
        assert_eq!(spec.integer_attribute("start_offset"), Some(1_048_576));
    }

    #[test]
    fn custom_type_is_not_builtin() {
        let err = PathSpec::new(TypeIndicator::new("ZIP"), Some(os()), Attributes::new())
            .unwrap_err();
        assert!(matches!(err, VfsError::NotSupported { .. }));
    }
}
