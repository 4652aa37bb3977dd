//! Resolution context: owns the object caches and resolves chains through them.

use std::sync::{Arc, Weak};

use tracing::debug;

use super::cache::ObjectCache;
use crate::{
    ContextConfig, FileIo, FileObject, FileSystem, FileSystemHandle, KeyChain, PathSpec, ResolverHelper,
    ResolverHelperRegistry, TypeIndicator, VfsError,
};

#[derive(Debug, Clone, Copy)]
enum CacheKind {
    FileObject,
    FileSystem,
}

/// The reference a handle holds on a cached object.
pub(crate) struct CacheTicket {
    context: Weak<ContextInner>,
    kind: CacheKind,
    key: String,
    generation: u64,
}

impl CacheTicket {
    pub(crate) fn release(self, type_indicator: &TypeIndicator) {
        let Some(inner) = self.context.upgrade() else {
            return;
        };
        match self.kind {
            CacheKind::FileObject => inner
                .file_objects
                .release(&self.key, self.generation, type_indicator),
            CacheKind::FileSystem => inner
                .file_systems
                .release(&self.key, self.generation, type_indicator),
        }
    }
}

struct ContextInner {
    config: ContextConfig,
    helpers: Arc<ResolverHelperRegistry>,
    key_chain: Arc<KeyChain>,
    file_objects: ObjectCache<dyn FileIo>,
    file_systems: ObjectCache<dyn FileSystem>,
}

/// A resolution scope holding the reference-counted caches of opened
/// objects.
///
/// Each distinct path specification is opened at most once per context:
/// repeated and concurrent requests share the opened object and receive
/// their own handle on it. The object is torn down when the last handle is
/// dropped. `Context` is cheap to clone; clones share the same caches.
///
/// Parents are resolved before the layers that sit on them, through the same
/// cache, so opening two layers on one image opens the image once.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use stackvfs::{Context, ContextConfig, KeyChain, PathSpec, ResolverHelperRegistry};
///
/// let context = Context::new(
///     ContextConfig::default(),
///     Arc::new(ResolverHelperRegistry::with_builtin()),
///     Arc::new(KeyChain::new()),
/// )
/// .unwrap();
///
/// let missing = PathSpec::os("/definitely/not/here.raw");
/// assert!(context.open_file_object(&missing).is_err());
/// assert_eq!(context.cached_file_objects(), 0);
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// A context resolving through `helpers`, with secrets from `key_chain`.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Configuration`] if `config` is invalid
    pub fn new(
        config: ContextConfig,
        helpers: Arc<ResolverHelperRegistry>,
        key_chain: Arc<KeyChain>,
    ) -> Result<Self, VfsError> {
        config.validate()?;
        Ok(Self::with_valid_config(config, helpers, key_chain))
    }

    pub(crate) fn with_valid_config(
        config: ContextConfig,
        helpers: Arc<ResolverHelperRegistry>,
        key_chain: Arc<KeyChain>,
    ) -> Self {
        let inner = ContextInner {
            file_objects: ObjectCache::new("file object", config.maximum_file_objects),
            file_systems: ObjectCache::new("file system", config.maximum_file_systems),
            config,
            helpers,
            key_chain,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The limits this context was created with.
    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// The key chain helpers read secrets from.
    pub fn key_chain(&self) -> &KeyChain {
        &self.inner.key_chain
    }

    /// The helpers this context resolves through.
    pub fn helpers(&self) -> &ResolverHelperRegistry {
        &self.inner.helpers
    }

    fn check_parent(helper: &dyn ResolverHelper, path_spec: &PathSpec) -> Result<(), VfsError> {
        match helper.parent_requirement().violation(path_spec.has_parent()) {
            Some(reason) => Err(VfsError::path_spec(path_spec.type_indicator().clone(), reason)),
            None => Ok(()),
        }
    }

    fn open_parent(&self, path_spec: &PathSpec) -> Result<Option<FileObject>, VfsError> {
        path_spec
            .parent()
            .map(|parent| self.open_file_object(parent))
            .transpose()
    }

    fn ticket(&self, kind: CacheKind, key: String, generation: u64) -> CacheTicket {
        CacheTicket {
            context: Arc::downgrade(&self.inner),
            kind,
            key,
            generation,
        }
    }

    /// Open the outermost layer of a chain as a byte stream.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotSupported`] if no helper is registered for a layer
    /// - [`VfsError::PathSpec`] if a layer's parent is missing or forbidden,
    ///   or the chain resolves back into itself
    /// - [`VfsError::CacheFull`] if the context already holds its maximum
    /// - Any error the helpers return for the layers of the chain
    pub fn open_file_object(&self, path_spec: &PathSpec) -> Result<FileObject, VfsError> {
        let type_indicator = path_spec.type_indicator();
        let helper = self.inner.helpers.get(type_indicator)?;
        Self::check_parent(helper.as_ref(), path_spec)?;
        let key = path_spec.comparable();

        let lease = self
            .inner
            .file_objects
            .acquire(&key, type_indicator, || {
                debug!(path_spec = %path_spec, "opening file object");
                let parent = self.open_parent(path_spec)?;
                helper.new_file_object(self, path_spec, parent)
            })
            .inspect_err(|error| {
                debug!(%type_indicator, %error, "file object resolution failed");
            })?;

        let ticket = self.ticket(CacheKind::FileObject, key, lease.generation);
        Ok(FileObject::cached(path_spec.clone(), lease.object, ticket))
    }

    /// Open the outermost layer of a chain as a file system.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotSupported`] if no helper is registered for the layer
    ///   or the layer has no file system, checked before any I/O
    /// - Otherwise as [`open_file_object`](Self::open_file_object)
    pub fn open_file_system(&self, path_spec: &PathSpec) -> Result<FileSystemHandle, VfsError> {
        let type_indicator = path_spec.type_indicator();
        let helper = self.inner.helpers.get(type_indicator)?;
        if !helper.supports_file_system() {
            return Err(VfsError::not_supported(type_indicator.clone(), "open_file_system"));
        }
        Self::check_parent(helper.as_ref(), path_spec)?;
        let key = path_spec.comparable();

        let lease = self
            .inner
            .file_systems
            .acquire(&key, type_indicator, || {
                debug!(path_spec = %path_spec, "opening file system");
                let parent = self.open_parent(path_spec)?;
                helper.new_file_system(self, path_spec, parent)
            })
            .inspect_err(|error| {
                debug!(%type_indicator, %error, "file system resolution failed");
            })?;

        let ticket = self.ticket(CacheKind::FileSystem, key, lease.generation);
        Ok(FileSystemHandle::cached(lease.object, ticket))
    }

    /// Number of open handles on the file object for `path_spec`, or `None`
    /// if it is not cached.
    pub fn file_object_references(&self, path_spec: &PathSpec) -> Option<usize> {
        self.inner.file_objects.references(&path_spec.comparable())
    }

    /// Number of open handles on the file system for `path_spec`, or `None`
    /// if it is not cached.
    pub fn file_system_references(&self, path_spec: &PathSpec) -> Option<usize> {
        self.inner.file_systems.references(&path_spec.comparable())
    }

    /// Number of distinct cached file objects.
    pub fn cached_file_objects(&self) -> usize {
        self.inner.file_objects.len()
    }

    /// Number of distinct cached file systems.
    pub fn cached_file_systems(&self) -> usize {
        self.inner.file_systems.len()
    }

    /// Forget every cached object.
    ///
    /// Handles that are still open keep their objects alive and can keep
    /// reading; the next open of any path specification starts afresh.
    pub fn empty(&self) {
        self.inner.file_systems.clear();
        self.inner.file_objects.clear();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.inner.config)
            .field("file_objects", &self.cached_file_objects())
            .field("file_systems", &self.cached_file_systems())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MEMORY_SIZE, MemoryResolverHelper, memory_path_spec as memory};
    use crate::Attributes;

    fn context_with(limit: usize) -> Context {
        let helpers = ResolverHelperRegistry::with_builtin();
        helpers.register(Arc::new(MemoryResolverHelper::default())).unwrap();
        let config = ContextConfig {
            maximum_file_objects: limit,
            ..ContextConfig::default()
        };
        Context::new(config, Arc::new(helpers), Arc::new(KeyChain::new())).unwrap()
    }

    fn raw_over(name: &str) -> PathSpec {
        PathSpec::new(TypeIndicator::RAW, Some(memory(name)), Attributes::new()).unwrap()
    }

    #[test]
    fn invalid_config_rejected() {
        let config = ContextConfig {
            maximum_file_systems: 0,
            ..ContextConfig::default()
        };
        let result = Context::new(
            config,
            Arc::new(ResolverHelperRegistry::with_builtin()),
            Arc::new(KeyChain::new()),
        );
        assert!(matches!(result, Err(VfsError::Configuration { .. })));
    }

    #[test]
    fn parent_cached_with_child() {
        let context = context_with(8);
        let raw = context.open_file_object(&raw_over("disk")).unwrap();

        assert_eq!(context.cached_file_objects(), 2);
        assert_eq!(context.file_object_references(&memory("disk")), Some(1));
        assert_eq!(raw.read_at(0, &mut [0u8; 4]).unwrap(), 4);

        drop(raw);
        assert_eq!(context.cached_file_objects(), 0);
    }

    #[test]
    fn layers_share_parent() {
        let context = context_with(8);
        let raw = context.open_file_object(&raw_over("disk")).unwrap();
        let direct = context.open_file_object(&memory("disk")).unwrap();

        assert_eq!(context.file_object_references(&memory("disk")), Some(2));
        drop(raw);
        assert_eq!(context.file_object_references(&memory("disk")), Some(1));
        drop(direct);
        assert_eq!(context.file_object_references(&memory("disk")), None);
    }

    #[test]
    fn unknown_type_is_not_supported() {
        let context = context_with(8);
        let spec = PathSpec::new(TypeIndicator::VMDK, Some(memory("disk")), Attributes::new()).unwrap();
        let err = context.open_file_object(&spec).unwrap_err();
        assert!(matches!(err, VfsError::NotSupported { .. }));
        assert_eq!(context.cached_file_objects(), 0);
    }

    #[test]
    fn nulled_parent_is_path_spec_error() {
        let context = context_with(8);
        let mut spec = raw_over("disk");
        spec.set_parent(None);
        let err = context.open_file_object(&spec).unwrap_err();
        assert!(matches!(err, VfsError::PathSpec { .. }));
    }

    #[test]
    fn limit_counts_parents() {
        let context = context_with(1);
        let err = context.open_file_object(&raw_over("disk")).unwrap_err();
        assert!(matches!(err, VfsError::CacheFull { .. }));
        assert_eq!(context.cached_file_objects(), 0);

        let direct = context.open_file_object(&memory("disk")).unwrap();
        assert_eq!(direct.size(), MEMORY_SIZE);
    }

    #[test]
    fn empty_keeps_open_handles_readable() {
        let context = context_with(8);
        let mut first = context.open_file_object(&memory("disk")).unwrap();
        context.empty();
        assert_eq!(context.cached_file_objects(), 0);

        let second = context.open_file_object(&memory("disk")).unwrap();
        assert!(!first.same_object(&second));
        assert!(!first.read(2).unwrap().is_empty());

        drop(first);
        assert_eq!(context.file_object_references(&memory("disk")), Some(1));
    }

    #[test]
    fn concurrent_opens_share_one_underlying_open() {
        let helper = MemoryResolverHelper::default();
        let opens = Arc::clone(&helper.opens);
        let helpers = ResolverHelperRegistry::with_builtin();
        helpers.register(Arc::new(helper)).unwrap();
        let context = Context::new(
            ContextConfig::default(),
            Arc::new(helpers),
            Arc::new(KeyChain::new()),
        )
        .unwrap();

        let spec = raw_over("shared");
        let barrier = std::sync::Barrier::new(8);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let file = context.open_file_object(&spec).unwrap();
                    barrier.wait();
                    drop(file);
                });
            }
        });

        assert_eq!(opens.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(context.cached_file_objects(), 0);
    }

    #[test]
    fn handles_outlive_context() {
        let context = context_with(8);
        let mut file = context.open_file_object(&raw_over("disk")).unwrap();
        drop(context);
        assert_eq!(file.read(3).unwrap().len(), 3);
    }
}
