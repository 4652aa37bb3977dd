//! Core types shared by path specifications, the key chain and the resolver.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute names whose values are secrets.
///
/// These are redacted from `Display` and `Debug` output of path specifications
/// and never appear in log records.
pub const CREDENTIAL_ATTRIBUTES: &[&str] = &[
    "password",
    "recovery_password",
    "startup_key",
    "key",
    "key_data",
    "initialization_vector",
    "encrypted_root_plist",
];

/// Returns `true` if the attribute name holds a secret.
#[inline]
pub fn is_credential_attribute(name: &str) -> bool {
    CREDENTIAL_ATTRIBUTES.contains(&name)
}

/// Identifies the kind of storage layer a path specification describes.
///
/// Type indicators are string-backed so that callers can register their own
/// layer kinds next to the built-in ones.
///
/// # Example
///
/// ```rust
/// use stackvfs::TypeIndicator;
///
/// assert_eq!(TypeIndicator::BDE.as_str(), "BDE");
/// assert_eq!(TypeIndicator::new("BDE"), TypeIndicator::BDE);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeIndicator(Cow<'static, str>);

impl TypeIndicator {
    /// Operating system file or device. The root of every chain.
    pub const OS: Self = Self::from_static("OS");
    /// Raw storage media image.
    pub const RAW: Self = Self::from_static("RAW");
    /// Byte range window over the parent layer.
    pub const DATA_RANGE: Self = Self::from_static("DATA_RANGE");
    /// Stream encrypted with a symmetric keystream.
    pub const ENCRYPTED_STREAM: Self = Self::from_static("ENCRYPTED_STREAM");
    /// Compressed stream.
    pub const COMPRESSED_STREAM: Self = Self::from_static("COMPRESSED_STREAM");
    /// BitLocker Drive Encryption volume.
    pub const BDE: Self = Self::from_static("BDE");
    /// FileVault Drive Encryption volume.
    pub const FVDE: Self = Self::from_static("FVDE");
    /// LUKS encrypted volume.
    pub const LUKSDE: Self = Self::from_static("LUKSDE");
    /// Virtual Hard Disk image.
    pub const VHDI: Self = Self::from_static("VHDI");
    /// VMware Virtual Disk image.
    pub const VMDK: Self = Self::from_static("VMDK");
    /// QEMU Copy-On-Write image.
    pub const QCOW: Self = Self::from_static("QCOW");
    /// Expert Witness Format image.
    pub const EWF: Self = Self::from_static("EWF");
    /// Partition within a partitioned volume.
    pub const TSK_PARTITION: Self = Self::from_static("TSK_PARTITION");
    /// Volume Shadow Snapshot store.
    pub const VSHADOW: Self = Self::from_static("VSHADOW");

    const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Create a type indicator for a custom layer kind.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The string form, as used in serialized path specifications.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TypeIndicator {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

/// Value of a path specification attribute.
///
/// Serialized untagged: integers as JSON numbers, text as JSON strings and
/// bytes as arrays of numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Unsigned integer (offsets, sizes, indexes).
    Integer(u64),
    /// UTF-8 text (locations, passwords, method names).
    Text(String),
    /// Raw bytes (keys, initialization vectors).
    Bytes(Vec<u8>),
}

impl AttributeValue {
    /// Returns the text value, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the byte value, if this is bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Writes the value in the unambiguous form used by comparable strings.
    pub(crate) fn write_comparable(&self, out: &mut String) {
        use fmt::Write;

        // Writing into a String cannot fail.
        let _ = match self {
            Self::Integer(value) => write!(out, "{value}"),
            Self::Text(text) => write!(out, "{text:?}"),
            Self::Bytes(bytes) => {
                out.push_str("0x");
                bytes.iter().try_for_each(|b| write!(out, "{b:02x}"))
            }
        };
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for AttributeValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// Attribute map of a single path specification layer, sorted by name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A secret used to unlock an encrypted layer.
///
/// `Debug` output never includes the secret itself.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialValue {
    /// Textual secret, e.g. a password or recovery password.
    Text(String),
    /// Binary secret, e.g. key material.
    Bytes(Vec<u8>),
}

impl CredentialValue {
    /// The secret as bytes. Text secrets are returned as their UTF-8 encoding.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    /// The secret as text, if it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }

    /// Converts an inline path specification attribute into a credential.
    ///
    /// Integer attributes are not credentials and yield `None`.
    pub fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Text(text) => Some(Self::Text(text.clone())),
            AttributeValue::Bytes(bytes) => Some(Self::Bytes(bytes.clone())),
            AttributeValue::Integer(_) => None,
        }
    }
}

impl fmt::Debug for CredentialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(_) => f.write_str("CredentialValue::Text(<redacted>)"),
            Self::Bytes(_) => f.write_str("CredentialValue::Bytes(<redacted>)"),
        }
    }
}

impl From<&str> for CredentialValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for CredentialValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for CredentialValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for CredentialValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// Whether a layer kind needs a parent layer underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentRequirement {
    /// The layer decodes bytes of its parent; a parent must be present.
    Required,
    /// The layer is a root (e.g. the operating system); a parent is invalid.
    Forbidden,
    /// Either is acceptable.
    Optional,
}

impl ParentRequirement {
    /// Returns the reason a layer with or without a parent violates this
    /// requirement, or `None` if it is satisfied.
    pub fn violation(self, has_parent: bool) -> Option<&'static str> {
        match (self, has_parent) {
            (Self::Required, false) => Some("missing parent path specification"),
            (Self::Forbidden, true) => Some("unexpected parent path specification"),
            _ => None,
        }
    }
}
