//! A window of bytes over the parent layer.

use std::sync::Arc;

use crate::helpers::require_parent;
use crate::{Context, FileIo, FileObject, ParentRequirement, PathSpec, ResolverHelper, TypeIndicator, VfsError};

/// `[range_offset, range_offset + range_size)` of the parent, clamped to
/// the parent's size.
#[derive(Debug)]
pub struct DataRangeFile {
    parent: FileObject,
    start: u64,
    size: u64,
}

impl DataRangeFile {
    /// A window over `parent`. Parts of the range past the parent's end are
    /// dropped.
    pub fn new(parent: FileObject, range_offset: u64, range_size: u64) -> Self {
        let start = range_offset.min(parent.size());
        let size = range_size.min(parent.size() - start);
        Self {
            parent,
            start,
            size,
        }
    }
}

impl FileIo for DataRangeFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        if offset >= self.size {
            return Ok(0);
        }
        let available = usize::try_from(self.size - offset).unwrap_or(usize::MAX);
        let len = buf.len().min(available);
        self.parent.read_at(self.start + offset, &mut buf[..len])
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// Opens `DATA_RANGE` layers.
#[derive(Debug, Default)]
pub struct DataRangeResolverHelper;

impl ResolverHelper for DataRangeResolverHelper {
    fn type_indicator(&self) -> TypeIndicator {
        TypeIndicator::DATA_RANGE
    }

    fn parent_requirement(&self) -> ParentRequirement {
        ParentRequirement::Required
    }

    fn new_file_object(
        &self,
        _context: &Context,
        path_spec: &PathSpec,
        parent: Option<FileObject>,
    ) -> Result<Arc<dyn FileIo>, VfsError> {
        let integer = |name: &str| {
            path_spec.integer_attribute(name).ok_or_else(|| {
                VfsError::path_spec(TypeIndicator::DATA_RANGE, format!("missing {name}"))
            })
        };
        let range_offset = integer("range_offset")?;
        let range_size = integer("range_size")?;
        let parent = require_parent(path_spec, parent)?;
        Ok(Arc::new(DataRangeFile::new(parent, range_offset, range_size)))
    }
}
