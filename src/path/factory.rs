//! Registry of layer kinds; builds and deserializes path specification chains.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::path::kinds::collect_attributes;
use crate::path::spec::{PARENT_KEY, TYPE_INDICATOR_KEY};
use crate::{AttributeValue, Attributes, LayerKind, PathSpec, PathSpecKind, TypeIndicator, VfsError};

/// Process-scoped registry mapping type indicators to [`PathSpecKind`]s.
///
/// The factory builds path specifications generically, by type indicator,
/// and rebuilds whole chains from their serialized form. Nothing registers
/// itself implicitly: start from [`Factory::with_builtin`] (or an empty
/// [`Factory::new`]) and register custom kinds before first use.
///
/// # Example
///
/// ```rust
/// use stackvfs::{Attributes, Factory, TypeIndicator};
///
/// let factory = Factory::with_builtin();
/// let os = factory
///     .new_path_spec(TypeIndicator::OS, None, [("location", "/images/disk.raw")])
///     .unwrap();
/// let raw = factory
///     .new_path_spec(TypeIndicator::RAW, Some(os), Attributes::new())
///     .unwrap();
///
/// let json = raw.to_json().unwrap();
/// assert_eq!(factory.new_path_spec_from_json(&json).unwrap(), raw);
/// ```
pub struct Factory {
    kinds: RwLock<BTreeMap<TypeIndicator, Arc<dyn PathSpecKind>>>,
}

impl Factory {
    /// An empty factory.
    pub fn new() -> Self {
        Self {
            kinds: RwLock::new(BTreeMap::new()),
        }
    }

    /// A factory with every built-in layer kind registered.
    pub fn with_builtin() -> Self {
        let kinds = LayerKind::builtins()
            .iter()
            .map(|kind| {
                let kind: Arc<dyn PathSpecKind> = Arc::new(kind.clone());
                (kind.type_indicator(), kind)
            })
            .collect();
        Self {
            kinds: RwLock::new(kinds),
        }
    }

    /// Register a layer kind.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if the type is already registered
    pub fn register(&self, kind: impl PathSpecKind + 'static) -> Result<(), VfsError> {
        let type_indicator = kind.type_indicator();
        let mut kinds = self.kinds.write();
        if kinds.contains_key(&type_indicator) {
            return Err(VfsError::configuration(format!(
                "path specification type {type_indicator} is already registered"
            )));
        }
        debug!(%type_indicator, "registered path specification kind");
        kinds.insert(type_indicator, Arc::new(kind));
        Ok(())
    }

    /// Remove a layer kind.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if the type is not registered
    pub fn deregister(&self, type_indicator: &TypeIndicator) -> Result<(), VfsError> {
        self.kinds
            .write()
            .remove(type_indicator)
            .map(drop)
            .ok_or_else(|| {
                VfsError::configuration(format!(
                    "path specification type {type_indicator} is not registered"
                ))
            })
    }

    /// Returns `true` if a kind is registered for the type.
    pub fn is_registered(&self, type_indicator: &TypeIndicator) -> bool {
        self.kinds.read().contains_key(type_indicator)
    }

    /// The registered type indicators, sorted.
    pub fn type_indicators(&self) -> Vec<TypeIndicator> {
        self.kinds.read().keys().cloned().collect()
    }

    /// The kind registered for the type.
    pub fn kind(&self, type_indicator: &TypeIndicator) -> Option<Arc<dyn PathSpecKind>> {
        self.kinds.read().get(type_indicator).cloned()
    }

    /// Build a path specification of the given type.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotSupported`] if the type is not registered
    /// - [`VfsError::Configuration`] if the kind rejects the parent or an attribute
    pub fn new_path_spec<K, V>(
        &self,
        type_indicator: TypeIndicator,
        parent: Option<PathSpec>,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<PathSpec, VfsError>
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        let kind = self
            .kind(&type_indicator)
            .ok_or_else(|| VfsError::not_supported(type_indicator, "new_path_spec"))?;
        kind.new_path_spec(parent, collect_attributes(attributes))
    }

    /// Rebuild a chain from its serialized JSON value, parent first.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Format`] if the structure is malformed or a layer type is
    ///   not registered
    /// - [`VfsError::Configuration`] if a kind rejects a layer
    pub fn new_path_spec_from_value(&self, value: &Value) -> Result<PathSpec, VfsError> {
        let object = value
            .as_object()
            .ok_or_else(|| VfsError::format("path specification must be an object"))?;

        let type_indicator = object
            .get(TYPE_INDICATOR_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| VfsError::format("missing or non-string type_indicator"))?;
        let kind = self
            .kind(&TypeIndicator::new(type_indicator))
            .ok_or_else(|| {
                VfsError::format(format!("unsupported type indicator: {type_indicator}"))
            })?;

        let parent = match object.get(PARENT_KEY) {
            None | Some(Value::Null) => None,
            Some(parent) if parent.is_object() => Some(self.new_path_spec_from_value(parent)?),
            Some(_) => {
                return Err(VfsError::format(format!(
                    "{type_indicator}: parent must be an object"
                )));
            }
        };

        let mut attributes = Attributes::new();
        for (name, value) in object {
            if name == TYPE_INDICATOR_KEY || name == PARENT_KEY {
                continue;
            }
            let value = serde_json::from_value::<AttributeValue>(value.clone()).map_err(|_| {
                VfsError::format(format!(
                    "{type_indicator}: attribute {name} must be an unsigned integer, a string or an array of bytes"
                ))
            })?;
            attributes.insert(name.clone(), value);
        }

        kind.new_path_spec(parent, attributes)
    }

    /// Rebuild a chain from its serialized JSON string.
    ///
    /// # Errors
    ///
    /// Same as [`new_path_spec_from_value`](Self::new_path_spec_from_value),
    /// plus [`VfsError::Format`] for invalid JSON.
    pub fn new_path_spec_from_json(&self, json: &str) -> Result<PathSpec, VfsError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| VfsError::format(e.to_string()))?;
        self.new_path_spec_from_value(&value)
    }
}

impl Default for Factory {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("type_indicators", &self.type_indicators())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParentRequirement;
    use serde_json::json;

    fn chain(factory: &Factory) -> PathSpec {
        let os = factory
            .new_path_spec(TypeIndicator::OS, None, [("location", "/cases/bdetogo.raw")])
            .unwrap();
        let range = factory
            .new_path_spec(
                TypeIndicator::DATA_RANGE,
                Some(os),
                [("range_offset", 512u64), ("range_size", 4096u64)],
            )
            .unwrap();
        factory
            .new_path_spec(
                TypeIndicator::BDE,
                Some(range),
                [("password", AttributeValue::from("bde-TEST"))],
            )
            .unwrap()
    }

    #[test]
    fn duplicate_registration_fails() {
        let factory = Factory::with_builtin();
        let err = factory
            .register(LayerKind::new(TypeIndicator::RAW, ParentRequirement::Required))
            .unwrap_err();
        assert!(matches!(err, VfsError::Configuration { .. }));
    }

    #[test]
    fn deregister_then_register() {
        let factory = Factory::with_builtin();
        factory.deregister(&TypeIndicator::VMDK).unwrap();
        assert!(!factory.is_registered(&TypeIndicator::VMDK));
        assert!(factory.deregister(&TypeIndicator::VMDK).is_err());
        factory
            .register(LayerKind::new(TypeIndicator::VMDK, ParentRequirement::Required))
            .unwrap();
    }

    #[test]
    fn empty_factory_knows_nothing() {
        let factory = Factory::new();
        let err = factory
            .new_path_spec(TypeIndicator::OS, None, [("location", "/x")])
            .unwrap_err();
        assert!(matches!(err, VfsError::NotSupported { .. }));
    }

    #[test]
    fn round_trip_through_value() {
        let factory = Factory::with_builtin();
        let spec = chain(&factory);
        let rebuilt = factory.new_path_spec_from_value(&spec.to_value()).unwrap();
        assert_eq!(rebuilt, spec);
    }

    #[test]
    fn round_trip_keeps_bytes() {
        let factory = Factory::with_builtin();
        let spec = factory
            .new_path_spec(
                TypeIndicator::ENCRYPTED_STREAM,
                Some(PathSpec::os("/e.bin")),
                [
                    ("encryption_method", AttributeValue::from("sha256-ctr")),
                    ("key", AttributeValue::Bytes(vec![0, 1, 2, 250])),
                ],
            )
            .unwrap();
        let json = spec.to_json().unwrap();
        assert_eq!(factory.new_path_spec_from_json(&json).unwrap(), spec);
    }

    #[test]
    fn unregistered_type_is_format_error() {
        let factory = Factory::with_builtin();
        let err = factory
            .new_path_spec_from_value(&json!({"type_indicator": "NOPE"}))
            .unwrap_err();
        assert!(matches!(err, VfsError::Format { .. }));
    }

    #[test]
    fn malformed_structures_are_format_errors() {
        let factory = Factory::with_builtin();
        for value in [
            json!("OS"),
            json!({"location": "/x"}),
            json!({"type_indicator": 7}),
            json!({"type_indicator": "RAW", "parent": "OS"}),
            json!({"type_indicator": "OS", "location": {"nested": true}}),
        ] {
            let err = factory.new_path_spec_from_value(&value).unwrap_err();
            assert!(matches!(err, VfsError::Format { .. }), "{value}");
        }
        assert!(matches!(
            factory.new_path_spec_from_json("{not json").unwrap_err(),
            VfsError::Format { .. }
        ));
    }

    #[test]
    fn missing_parent_in_serialized_form_is_configuration_error() {
        let factory = Factory::with_builtin();
        let err = factory
            .new_path_spec_from_value(&json!({"type_indicator": "BDE"}))
            .unwrap_err();
        assert!(matches!(err, VfsError::Configuration { .. }));
    }

    #[test]
    fn null_parent_treated_as_absent() {
        let factory = Factory::with_builtin();
        let spec = factory
            .new_path_spec_from_value(&json!({
                "type_indicator": "OS",
                "location": "/x",
                "parent": null,
            }))
            .unwrap();
        assert!(spec.is_system_level());
    }
}
