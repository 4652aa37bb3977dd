//! Credential store for encrypted layers.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::{CredentialValue, PathSpec};

/// Which source wins when a secret is both inline in a path specification
/// and stored in the [`KeyChain`].
///
/// Each format declares one precedence and every lookup for that format
/// goes through [`KeyChain::resolve_credential`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CredentialPrecedence {
    /// Inline attribute first, then the key chain.
    #[default]
    PathSpecFirst,
    /// Key chain first, then the inline attribute.
    KeyChainFirst,
}

/// Credentials stored for one path specification, by name.
pub type Credentials = BTreeMap<String, CredentialValue>;

/// In-process store of secrets keyed by (path specification, credential name).
///
/// Entries are keyed by the structural identity of the path specification,
/// so any equal path specification finds them. Missing entries are `None`,
/// never errors, so callers can fall back to inline attributes.
///
/// The key chain is read concurrently during resolution and written only by
/// explicit calls.
///
/// # Example
///
/// ```rust
/// use stackvfs::{Attributes, KeyChain, PathSpec, TypeIndicator};
///
/// let os = PathSpec::os("/images/bdetogo.raw");
/// let bde = PathSpec::new(TypeIndicator::BDE, Some(os), Attributes::new()).unwrap();
///
/// let key_chain = KeyChain::new();
/// key_chain.set_credential(&bde, "password", "bde-TEST");
///
/// let password = key_chain.get_credential(&bde, "password").unwrap();
/// assert_eq!(password.as_text(), Some("bde-TEST"));
/// assert!(key_chain.get_credential(&bde, "recovery_password").is_none());
/// ```
#[derive(Default)]
pub struct KeyChain {
    credentials: RwLock<HashMap<String, Credentials>>,
}

impl KeyChain {
    /// An empty key chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a secret for a path specification, replacing any previous value.
    pub fn set_credential(
        &self,
        path_spec: &PathSpec,
        name: impl Into<String>,
        value: impl Into<CredentialValue>,
    ) {
        self.credentials
            .write()
            .entry(path_spec.comparable())
            .or_default()
            .insert(name.into(), value.into());
    }

    /// A stored secret, or `None` if there is none.
    pub fn get_credential(&self, path_spec: &PathSpec, name: &str) -> Option<CredentialValue> {
        self.credentials
            .read()
            .get(&path_spec.comparable())
            .and_then(|credentials| credentials.get(name))
            .cloned()
    }

    /// Every secret stored for a path specification.
    pub fn get_credentials(&self, path_spec: &PathSpec) -> Credentials {
        self.credentials
            .read()
            .get(&path_spec.comparable())
            .cloned()
            .unwrap_or_default()
    }

    /// Forget every secret stored for a path specification.
    ///
    /// Returns `true` if anything was removed.
    pub fn remove_credentials(&self, path_spec: &PathSpec) -> bool {
        self.credentials
            .write()
            .remove(&path_spec.comparable())
            .is_some()
    }

    /// Forget every secret.
    pub fn clear(&self) {
        self.credentials.write().clear();
    }

    /// Number of path specifications with stored secrets.
    pub fn len(&self) -> usize {
        self.credentials.read().len()
    }

    /// Returns `true` if no secrets are stored.
    pub fn is_empty(&self) -> bool {
        self.credentials.read().is_empty()
    }

    /// Look a secret up in both the path specification and the key chain.
    ///
    /// Integer attributes are never treated as secrets.
    pub fn resolve_credential(
        &self,
        path_spec: &PathSpec,
        name: &str,
        precedence: CredentialPrecedence,
    ) -> Option<CredentialValue> {
        let inline = || {
            path_spec
                .attribute(name)
                .and_then(CredentialValue::from_attribute)
        };
        match precedence {
            CredentialPrecedence::PathSpecFirst => {
                inline().or_else(|| self.get_credential(path_spec, name))
            }
            CredentialPrecedence::KeyChainFirst => {
                self.get_credential(path_spec, name).or_else(inline)
            }
        }
    }

    /// Resolve several secrets at once, skipping the ones that are missing.
    pub fn resolve_credentials(
        &self,
        path_spec: &PathSpec,
        names: &[&str],
        precedence: CredentialPrecedence,
    ) -> Credentials {
        names
            .iter()
            .filter_map(|name| {
                self.resolve_credential(path_spec, name, precedence)
                    .map(|value| ((*name).to_owned(), value))
            })
            .collect()
    }
}

impl std::fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyChain")
            .field("path_specs", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttributeValue, Attributes, TypeIndicator};

    fn bde(password: Option<&str>) -> PathSpec {
        let os = PathSpec::os("/bdetogo.raw");
        let attributes: Attributes = password
            .map(|p| ("password".to_owned(), AttributeValue::from(p)))
            .into_iter()
            .collect();
        PathSpec::new(TypeIndicator::BDE, Some(os), attributes).unwrap()
    }

    #[test]
    fn lookup_uses_structural_identity() {
        let key_chain = KeyChain::new();
        key_chain.set_credential(&bde(None), "password", "bde-TEST");

        let value = key_chain.get_credential(&bde(None), "password");
        assert_eq!(value, Some(CredentialValue::from("bde-TEST")));
        assert!(key_chain.get_credential(&PathSpec::os("/bdetogo.raw"), "password").is_none());
    }

    #[test]
    fn set_replaces_value() {
        let key_chain = KeyChain::new();
        let spec = bde(None);
        key_chain.set_credential(&spec, "password", "first");
        key_chain.set_credential(&spec, "password", "second");
        assert_eq!(
            key_chain.get_credential(&spec, "password"),
            Some(CredentialValue::from("second"))
        );
        assert_eq!(key_chain.len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let key_chain = KeyChain::new();
        let spec = bde(None);
        key_chain.set_credential(&spec, "password", "x");
        key_chain.set_credential(&spec, "recovery_password", "y");
        assert_eq!(key_chain.get_credentials(&spec).len(), 2);

        assert!(key_chain.remove_credentials(&spec));
        assert!(!key_chain.remove_credentials(&spec));

        key_chain.set_credential(&spec, "password", "x");
        key_chain.clear();
        assert!(key_chain.is_empty());
    }

    #[test]
    fn precedence_is_applied() {
        let key_chain = KeyChain::new();
        let spec = bde(Some("inline"));
        key_chain.set_credential(&spec, "password", "stored");

        for _ in 0..3 {
            assert_eq!(
                key_chain.resolve_credential(&spec, "password", CredentialPrecedence::PathSpecFirst),
                Some(CredentialValue::from("inline"))
            );
            assert_eq!(
                key_chain.resolve_credential(&spec, "password", CredentialPrecedence::KeyChainFirst),
                Some(CredentialValue::from("stored"))
            );
        }
    }

    #[test]
    fn fallback_to_other_source() {
        let key_chain = KeyChain::new();
        let inline_only = bde(Some("inline"));
        let stored_only = bde(None);
        key_chain.set_credential(&stored_only, "password", "stored");

        assert_eq!(
            key_chain.resolve_credential(&inline_only, "password", CredentialPrecedence::KeyChainFirst),
            Some(CredentialValue::from("inline"))
        );
        assert_eq!(
            key_chain.resolve_credential(&stored_only, "password", CredentialPrecedence::PathSpecFirst),
            Some(CredentialValue::from("stored"))
        );
    }

    #[test]
    fn resolve_credentials_skips_missing() {
        let key_chain = KeyChain::new();
        let spec = bde(Some("inline"));
        let credentials = key_chain.resolve_credentials(
            &spec,
            &["password", "recovery_password"],
            CredentialPrecedence::PathSpecFirst,
        );
        assert_eq!(credentials.len(), 1);
        assert!(credentials.contains_key("password"));
    }

    #[test]
    fn debug_hides_secrets() {
        let key_chain = KeyChain::new();
        key_chain.set_credential(&bde(None), "password", "bde-TEST");
        assert!(!format!("{key_chain:?}").contains("bde-TEST"));
    }
}
