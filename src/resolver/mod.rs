//! Resolution of path specification chains into opened objects.

mod cache;
mod context;

use std::sync::Arc;

use tracing::warn;

pub(crate) use context::CacheTicket;
pub use context::Context;

use crate::{ContextConfig, Factory, FileObject, FileSystemHandle, KeyChain, PathSpec, ResolverHelperRegistry, VfsError};

/// Entry point bundling the registries, a key chain and a default
/// [`Context`].
///
/// # Example
///
/// ```rust,no_run
/// use stackvfs::{Attributes, PathSpec, Resolver, TypeIndicator};
///
/// let resolver = Resolver::with_builtin();
/// let os = PathSpec::os("/cases/image.raw");
/// let raw = PathSpec::new(TypeIndicator::RAW, Some(os), Attributes::new())?;
///
/// let mut file = resolver.open_file_object(&raw)?;
/// let header = file.read(512)?;
/// # Ok::<(), stackvfs::VfsError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Resolver {
    factory: Arc<Factory>,
    helpers: Arc<ResolverHelperRegistry>,
    key_chain: Arc<KeyChain>,
    context: Context,
}

impl Resolver {
    /// A resolver over the given registries and key chain.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if `config` is invalid
    pub fn new(
        factory: Arc<Factory>,
        helpers: Arc<ResolverHelperRegistry>,
        key_chain: Arc<KeyChain>,
        config: ContextConfig,
    ) -> Result<Self, VfsError> {
        let context = Context::new(config, Arc::clone(&helpers), Arc::clone(&key_chain))?;
        Ok(Self {
            factory,
            helpers,
            key_chain,
            context,
        })
    }

    /// A resolver with every built-in kind and helper, an empty key chain and
    /// default limits.
    pub fn with_builtin() -> Self {
        let helpers = Arc::new(ResolverHelperRegistry::with_builtin());
        let key_chain = Arc::new(KeyChain::new());
        let context = Context::with_valid_config(
            ContextConfig::default(),
            Arc::clone(&helpers),
            Arc::clone(&key_chain),
        );
        Self {
            factory: Arc::new(Factory::with_builtin()),
            helpers,
            key_chain,
            context,
        }
    }

    /// Like [`with_builtin`](Self::with_builtin) with custom limits.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if `config` is invalid
    pub fn with_config(config: ContextConfig) -> Result<Self, VfsError> {
        Self::new(
            Arc::new(Factory::with_builtin()),
            Arc::new(ResolverHelperRegistry::with_builtin()),
            Arc::new(KeyChain::new()),
            config,
        )
    }

    /// The path specification factory.
    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// The resolver helpers.
    pub fn helpers(&self) -> &ResolverHelperRegistry {
        &self.helpers
    }

    /// The key chain shared by every context of this resolver.
    pub fn key_chain(&self) -> &KeyChain {
        &self.key_chain
    }

    /// The default context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// A fresh context with its own caches, sharing the registries, the key
    /// chain and the default context's limits.
    pub fn new_context(&self) -> Context {
        Context::with_valid_config(
            self.context.config().clone(),
            Arc::clone(&self.helpers),
            Arc::clone(&self.key_chain),
        )
    }

    /// Open a chain as a byte stream in the default context.
    ///
    /// # Errors
    ///
    /// See [`Context::open_file_object`].
    pub fn open_file_object(&self, path_spec: &PathSpec) -> Result<FileObject, VfsError> {
        self.context.open_file_object(path_spec).inspect_err(|error| {
            warn!(path_spec = %path_spec, %error, "unable to open file object");
        })
    }

    /// Open a chain as a file system in the default context.
    ///
    /// # Errors
    ///
    /// See [`Context::open_file_system`].
    pub fn open_file_system(&self, path_spec: &PathSpec) -> Result<FileSystemHandle, VfsError> {
        self.context.open_file_system(path_spec).inspect_err(|error| {
            warn!(path_spec = %path_spec, %error, "unable to open file system");
        })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::with_builtin()
    }
}
