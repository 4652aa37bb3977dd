//! Resolver helpers: one per layer type, each knowing how to open its layer
//! on top of an already opened parent.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::formats::{
    CompressedStreamResolverHelper, DataRangeResolverHelper, DecodeEngine, EncryptedStreamResolverHelper,
    EngineResolverHelper, OsResolverHelper, RawResolverHelper,
};
use crate::{Context, FileIo, FileObject, FileSystem, ParentRequirement, PathSpec, TypeIndicator, VfsError};

/// Per-type strategy for turning a path specification into an opened object.
///
/// Helpers are stateless and shared by every chain through `Arc`. The
/// [`Context`] checks [`parent_requirement`](Self::parent_requirement) and
/// resolves the parent before calling the helper, so `parent` is `Some`
/// exactly when the requirement allows it and the path specification has
/// one.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use stackvfs::{
///     Context, FileIo, FileObject, ParentRequirement, PathSpec, ResolverHelper, TypeIndicator,
///     VfsError,
/// };
///
/// /// Exposes the parent unchanged.
/// struct Mirror;
///
/// impl ResolverHelper for Mirror {
///     fn type_indicator(&self) -> TypeIndicator {
///         TypeIndicator::new("MIRROR")
///     }
///
///     fn parent_requirement(&self) -> ParentRequirement {
///         ParentRequirement::Required
///     }
///
///     fn new_file_object(
///         &self,
///         _context: &Context,
///         path_spec: &PathSpec,
///         parent: Option<FileObject>,
///     ) -> Result<Arc<dyn FileIo>, VfsError> {
///         let parent = stackvfs::require_parent(path_spec, parent)?;
///         Ok(Arc::new(stackvfs::RawFile::new(parent)))
///     }
/// }
/// ```
pub trait ResolverHelper: Send + Sync {
    /// The layer type this helper opens.
    fn type_indicator(&self) -> TypeIndicator;

    /// Whether the layer must, must not, or may sit on a parent layer.
    fn parent_requirement(&self) -> ParentRequirement;

    /// Open the layer as a byte source.
    ///
    /// # Errors
    ///
    /// - [`VfsError::PathSpec`] if a required attribute is missing
    /// - [`VfsError::Credential`] if the layer cannot be unlocked
    /// - [`VfsError::NotSupported`] if a method named by the layer is unknown
    /// - [`VfsError::Io`] if reading the parent fails
    fn new_file_object(
        &self,
        context: &Context,
        path_spec: &PathSpec,
        parent: Option<FileObject>,
    ) -> Result<Arc<dyn FileIo>, VfsError>;

    /// Returns `true` if [`new_file_system`](Self::new_file_system) is implemented.
    fn supports_file_system(&self) -> bool {
        false
    }

    /// Open the layer as a file system.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotSupported`] unless overridden
    fn new_file_system(
        &self,
        context: &Context,
        path_spec: &PathSpec,
        parent: Option<FileObject>,
    ) -> Result<Arc<dyn FileSystem>, VfsError> {
        let _ = (context, parent);
        Err(VfsError::not_supported(
            path_spec.type_indicator().clone(),
            "new_file_system",
        ))
    }
}

/// Unwrap the parent handle a helper was given.
///
/// # Errors
///
/// - [`VfsError::PathSpec`] if there is none
pub fn require_parent(path_spec: &PathSpec, parent: Option<FileObject>) -> Result<FileObject, VfsError> {
    parent.ok_or_else(|| {
        VfsError::path_spec(
            path_spec.type_indicator().clone(),
            "missing parent path specification",
        )
    })
}

/// Process-scoped registry of [`ResolverHelper`]s by type indicator.
///
/// Built explicitly: [`ResolverHelperRegistry::with_builtin`] registers the
/// helpers for `OS`, `RAW`, `DATA_RANGE`, `ENCRYPTED_STREAM` and
/// `COMPRESSED_STREAM`. Container and encrypted volume types become
/// resolvable once a [`DecodeEngine`] is registered for them.
pub struct ResolverHelperRegistry {
    helpers: RwLock<BTreeMap<TypeIndicator, Arc<dyn ResolverHelper>>>,
}

impl ResolverHelperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            helpers: RwLock::new(BTreeMap::new()),
        }
    }

    /// A registry with every built-in helper.
    pub fn with_builtin() -> Self {
        let builtin: [Arc<dyn ResolverHelper>; 5] = [
            Arc::new(OsResolverHelper),
            Arc::new(RawResolverHelper),
            Arc::new(DataRangeResolverHelper),
            Arc::new(EncryptedStreamResolverHelper),
            Arc::new(CompressedStreamResolverHelper),
        ];
        let helpers = builtin
            .into_iter()
            .map(|helper| (helper.type_indicator(), helper))
            .collect();
        Self {
            helpers: RwLock::new(helpers),
        }
    }

    /// Register a helper.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if a helper is already registered for the type
    pub fn register(&self, helper: Arc<dyn ResolverHelper>) -> Result<(), VfsError> {
        let type_indicator = helper.type_indicator();
        let mut helpers = self.helpers.write();
        if helpers.contains_key(&type_indicator) {
            return Err(VfsError::configuration(format!(
                "resolver helper for {type_indicator} is already registered"
            )));
        }
        debug!(%type_indicator, "registered resolver helper");
        helpers.insert(type_indicator, helper);
        Ok(())
    }

    /// Register a decode engine as the helper for its type.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if a helper is already registered for the type
    pub fn register_engine(&self, engine: Arc<dyn DecodeEngine>) -> Result<(), VfsError> {
        self.register(Arc::new(EngineResolverHelper::new(engine)))
    }

    /// Remove the helper for a type.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if no helper is registered for the type
    pub fn deregister(&self, type_indicator: &TypeIndicator) -> Result<(), VfsError> {
        self.helpers
            .write()
            .remove(type_indicator)
            .map(drop)
            .ok_or_else(|| {
                VfsError::configuration(format!(
                    "resolver helper for {type_indicator} is not registered"
                ))
            })
    }

    /// The helper for a type.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotSupported`] if no helper is registered for the type
    pub fn get(&self, type_indicator: &TypeIndicator) -> Result<Arc<dyn ResolverHelper>, VfsError> {
        self.helpers
            .read()
            .get(type_indicator)
            .cloned()
            .ok_or_else(|| VfsError::not_supported(type_indicator.clone(), "resolver helper"))
    }

    /// Returns `true` if a helper is registered for the type.
    pub fn is_registered(&self, type_indicator: &TypeIndicator) -> bool {
        self.helpers.read().contains_key(type_indicator)
    }

    /// The registered type indicators, sorted.
    pub fn type_indicators(&self) -> Vec<TypeIndicator> {
        self.helpers.read().keys().cloned().collect()
    }
}

impl Default for ResolverHelperRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for ResolverHelperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverHelperRegistry")
            .field("type_indicators", &self.type_indicators())
            .finish()
    }
}
