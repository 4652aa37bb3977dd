//! External decode engines for container and encrypted volume formats.

use std::sync::Arc;

use tracing::debug;

use crate::helpers::require_parent;
use crate::{
    Context, CredentialPrecedence, Credentials, FileIo, FileObject, FileSystem, ParentRequirement, PathSpec,
    ResolverHelper, TypeIndicator, VfsError,
};

/// A decoder for one container or encrypted volume format.
///
/// Engines parse a format's structure; the resolver supplies the opened
/// parent layer and the credentials the engine asks for. Register one with
/// [`ResolverHelperRegistry::register_engine`](crate::ResolverHelperRegistry::register_engine).
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use stackvfs::{Credentials, DecodeEngine, FileIo, FileObject, PathSpec, RawFile, TypeIndicator, VfsError};
///
/// /// Accepts any VMDK and exposes its parent as is.
/// struct FlatVmdk;
///
/// impl DecodeEngine for FlatVmdk {
///     fn type_indicator(&self) -> TypeIndicator {
///         TypeIndicator::VMDK
///     }
///
///     fn open(
///         &self,
///         source: FileObject,
///         _path_spec: &PathSpec,
///         _credentials: &Credentials,
///     ) -> Result<Arc<dyn FileIo>, VfsError> {
///         Ok(Arc::new(RawFile::new(source)))
///     }
/// }
/// ```
pub trait DecodeEngine: Send + Sync {
    /// The layer type this engine decodes.
    fn type_indicator(&self) -> TypeIndicator;

    /// Names of the credentials the engine uses.
    fn credential_names(&self) -> &[&'static str] {
        &[]
    }

    /// Which credential source wins for this format.
    fn credential_precedence(&self) -> CredentialPrecedence {
        CredentialPrecedence::PathSpecFirst
    }

    /// Decode `source` into a byte stream.
    ///
    /// `credentials` holds every name from
    /// [`credential_names`](Self::credential_names) that was found.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Credential`] if a secret is missing or wrong
    /// - Any error reading `source`
    fn open(
        &self,
        source: FileObject,
        path_spec: &PathSpec,
        credentials: &Credentials,
    ) -> Result<Arc<dyn FileIo>, VfsError>;

    /// Returns `true` if [`open_file_system`](Self::open_file_system) is implemented.
    fn supports_file_system(&self) -> bool {
        false
    }

    /// Decode `source` into a file system.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotSupported`] unless overridden
    fn open_file_system(
        &self,
        source: FileObject,
        path_spec: &PathSpec,
        credentials: &Credentials,
    ) -> Result<Arc<dyn FileSystem>, VfsError> {
        let _ = (source, credentials);
        Err(VfsError::not_supported(
            path_spec.type_indicator().clone(),
            "new_file_system",
        ))
    }
}

/// Adapts a [`DecodeEngine`] to the [`ResolverHelper`] contract.
pub struct EngineResolverHelper {
    engine: Arc<dyn DecodeEngine>,
}

impl EngineResolverHelper {
    /// Wrap `engine`.
    pub fn new(engine: Arc<dyn DecodeEngine>) -> Self {
        Self { engine }
    }

    fn credentials(&self, context: &Context, path_spec: &PathSpec) -> Credentials {
        let credentials = context.key_chain().resolve_credentials(
            path_spec,
            self.engine.credential_names(),
            self.engine.credential_precedence(),
        );
        debug!(
            type_indicator = %self.engine.type_indicator(),
            found = credentials.len(),
            "resolved engine credentials"
        );
        credentials
    }
}

impl ResolverHelper for EngineResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        self.engine.type_indicator()
    }

    fn parent_requirement(&self) -> ParentRequirement {
        ParentRequirement::Required
    }

    fn new_file_object(
        &self,
        context: &Context,
        path_spec: &PathSpec,
        parent: Option<FileObject>,
    ) -> Result<Arc<dyn FileIo>, VfsError> {
        let source = require_parent(path_spec, parent)?;
        let credentials = self.credentials(context, path_spec);
        self.engine.open(source, path_spec, &credentials)
    }

    fn supports_file_system(&self) -> bool {
        self.engine.supports_file_system()
    }

    fn new_file_system(
        &self,
        context: &Context,
        path_spec: &PathSpec,
        parent: Option<FileObject>,
    ) -> Result<Arc<dyn FileSystem>, VfsError> {
        let source = require_parent(path_spec, parent)?;
        let credentials = self.credentials(context, path_spec);
        self.engine.open_file_system(source, path_spec, &credentials)
    }
}

impl std::fmt::Debug for EngineResolverHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineResolverHelper")
            .field("type_indicator", &self.engine.type_indicator())
            .finish()
    }
}
