//! In-memory root layer for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::file_io::MemoryIo;
use crate::{
    AttributeRule, AttributeType, AttributeValue, Context, FileIo, FileObject, LayerKind, ParentRequirement, PathSpec,
    PathSpecKind, ResolverHelper, TypeIndicator, VfsError,
};

pub(crate) const MEMORY_SIZE: u64 = 4096;

pub(crate) fn memory_type() -> TypeIndicator {
    TypeIndicator::new("MEMORY")
}

/// Deterministic content of every memory layer.
pub(crate) fn memory_content() -> Vec<u8> {
    (0..MEMORY_SIZE).map(|i| (i % 251) as u8).collect()
}

pub(crate) fn memory_path_spec(name: &str) -> PathSpec {
    LayerKind::new(memory_type(), ParentRequirement::Forbidden)
        .with_rule(AttributeRule::required("name", AttributeType::Text))
        .new_path_spec(None, [("name".to_owned(), AttributeValue::from(name))].into_iter().collect())
        .unwrap()
}

/// Root helper serving [`memory_content`] and counting its opens.
#[derive(Default)]
pub(crate) struct MemoryResolverHelper {
    pub(crate) opens: Arc<AtomicUsize>,
}

impl ResolverHelper for MemoryResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        memory_type()
    }

    fn parent_requirement(&self) -> ParentRequirement {
        ParentRequirement::Forbidden
    }

    fn new_file_object(
        &self,
        _context: &Context,
        _path_spec: &PathSpec,
        _parent: Option<FileObject>,
    ) -> Result<Arc<dyn FileIo>, VfsError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryIo(memory_content())))
    }
}
